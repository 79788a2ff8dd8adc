//! # Procedural Geometry Generation
//!
//! This module provides functions to generate common 3D primitive shapes procedurally,
//! eliminating the need for external model files for basic shapes.
//!
//! ## Supported Primitives
//!
//! - **Cube**: Flat-shaded cube
//! - **Sphere**: UV sphere with configurable resolution
//! - **Plane**: Horizontal plane with configurable size and subdivisions
//! - **Cylinder**: Capped cylinder along the Y axis
//!
//! ## Usage
//!
//! ```rust
//! use prism3d::gfx::geometry::{generate_cube, generate_sphere, PrimitiveShape};
//!
//! let cube = generate_cube(1.0).to_mesh();
//! let sphere = generate_sphere(0.5, 32, 16);
//! let plane = PrimitiveShape::Plane { width: 10.0, depth: 10.0 }.to_mesh();
//! assert_eq!(plane.index_count(), 6);
//! ```

pub mod primitives;

pub use primitives::*;

use crate::gfx::scene::mesh::Mesh;
use crate::gfx::scene::vertex::Vertex3D;

/// Represents generated geometry data ready for GPU upload
#[derive(Debug, Clone, Default)]
pub struct GeometryData {
    /// Vertex positions (x, y, z)
    pub vertices: Vec<[f32; 3]>,
    /// Texture coordinates (u, v)
    pub tex_coords: Vec<[f32; 2]>,
    /// Normal vectors (x, y, z)
    pub normals: Vec<[f32; 3]>,
    /// Triangle indices (counter-clockwise winding)
    pub indices: Vec<u32>,
}

impl GeometryData {
    /// Create a new empty geometry data structure
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of vertices in this geometry
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles in this geometry
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Interleaves the attribute streams into a [`Mesh`]
    pub fn to_mesh(&self) -> Mesh {
        let vertices = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, position)| {
                Vertex3D::new(
                    *position,
                    self.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                    self.tex_coords.get(i).copied().unwrap_or([0.0, 0.0]),
                )
            })
            .collect();

        Mesh::new(vertices, self.indices.clone())
    }
}

/// Built-in shapes a primitive scene node can carry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveShape {
    Cube { size: f32 },
    Sphere { radius: f32, segments: u32, rings: u32 },
    Plane { width: f32, depth: f32 },
    Cylinder { radius: f32, height: f32, segments: u32 },
}

impl PrimitiveShape {
    pub fn unit_cube() -> Self {
        PrimitiveShape::Cube { size: 1.0 }
    }

    pub fn unit_sphere() -> Self {
        PrimitiveShape::Sphere {
            radius: 0.5,
            segments: 32,
            rings: 16,
        }
    }

    pub fn geometry(&self) -> GeometryData {
        match *self {
            PrimitiveShape::Cube { size } => generate_cube(size),
            PrimitiveShape::Sphere {
                radius,
                segments,
                rings,
            } => generate_sphere(radius, segments, rings),
            PrimitiveShape::Plane { width, depth } => generate_plane(width, depth, 1, 1),
            PrimitiveShape::Cylinder {
                radius,
                height,
                segments,
            } => generate_cylinder(radius, height, segments),
        }
    }

    pub fn to_mesh(&self) -> Mesh {
        self.geometry().to_mesh()
    }
}
