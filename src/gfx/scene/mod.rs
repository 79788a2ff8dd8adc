//! # Scene Management Module
//!
//! Retained 3D scene description consumed by the renderer.
//!
//! ## Key Components
//!
//! - [`SceneGraph`] - Arena of nodes plus the meshes, materials and textures they use
//! - [`SceneNode`] / [`NodeKind`] - Transformable node carrying a mesh, primitive, light or camera
//! - [`Material`] - PBR material values shared between nodes by [`MaterialId`]
//! - [`Light`] - Directional, point and spot light sources
//! - [`Vertex3D`] - 3D vertex data structure with position, normal, and texture coordinates
//!
//! ## Usage
//!
//! ```rust
//! use prism3d::gfx::geometry::PrimitiveShape;
//! use prism3d::gfx::scene::{Material, SceneGraph, SceneNode, Transform};
//! use cgmath::Vector3;
//!
//! let mut scene = SceneGraph::new();
//! let red = scene.add_material(Material::default().with_color(1.0, 0.0, 0.0));
//! let group = scene.add_root(SceneNode::group("props"));
//! scene.add_child(
//!     group,
//!     SceneNode::primitive("box", PrimitiveShape::unit_cube())
//!         .with_material(red)
//!         .with_transform(Transform::from_position(Vector3::new(0.0, 0.5, 0.0))),
//! );
//! assert_eq!(scene.snapshot().objects.len(), 1);
//! ```

pub mod color;
pub mod light;
pub mod material;
pub mod mesh;
pub mod scene_graph;
pub mod transform;
pub mod vertex;

pub use color::Color;
pub use light::{Attenuation, Light, LightInstance, LightKind, ShadowParams};
pub use material::{Material, MaterialId, TextureData, TextureId};
pub use mesh::{Mesh, MeshId};
pub use scene_graph::{
    FrameSnapshot, NodeId, NodeKind, NodeKindTag, RenderObject, SceneGraph, SceneNode,
};
pub use transform::Transform;
pub use vertex::Vertex3D;
