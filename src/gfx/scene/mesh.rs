//! Triangle meshes stored in the scene graph's mesh arena

use slotmap::new_key_type;

use super::vertex::Vertex3D;
use crate::gfx::geometry::GeometryData;
use crate::gfx::picking::Aabb;

new_key_type! {
    /// Stable id of a mesh in a [`SceneGraph`](super::SceneGraph)
    pub struct MeshId;
}

/// Immutable indexed triangle list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vertex3D>,
    indices: Vec<u32>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex3D>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn vertices(&self) -> &[Vertex3D] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Local-space bounding box, `None` for a mesh without vertices
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().map(|v| v.position))
    }

    /// Positions of each complete triangle
    pub fn triangles(&self) -> impl Iterator<Item = [[f32; 3]; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            let a = self.vertices.get(tri[0] as usize)?;
            let b = self.vertices.get(tri[1] as usize)?;
            let c = self.vertices.get(tri[2] as usize)?;
            Some([a.position, b.position, c.position])
        })
    }
}

impl From<GeometryData> for Mesh {
    fn from(data: GeometryData) -> Self {
        data.to_mesh()
    }
}
