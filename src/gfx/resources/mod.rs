//! GPU resource management
//!
//! Caches that turn scene-side assets (meshes, materials, textures) into device
//! handles, plus the uniform layouts shared with the shaders.
//!
//! Caches are keyed by the scene's slotmap ids and read assets through
//! [`AssetSource`], so any store of meshes and materials can feed the renderer.

pub mod material_cache;
pub mod mesh_cache;
pub mod texture_cache;
pub mod uniform_buffer;
pub mod uniforms;

use std::rc::Rc;

pub use material_cache::{material_layout_desc, MaterialCache};
pub use mesh_cache::{GpuMesh, MeshCache};
pub use texture_cache::TextureCache;
pub use uniform_buffer::UniformBuffer;

use crate::gfx::scene::{Material, MaterialId, Mesh, MeshId, SceneGraph, TextureData, TextureId};

/// Read access to the CPU-side assets the caches upload
pub trait AssetSource {
    fn mesh(&self, id: MeshId) -> Option<Rc<Mesh>>;

    /// Changes whenever the mesh geometry is replaced
    fn mesh_revision(&self, id: MeshId) -> Option<u64>;

    fn material(&self, id: MaterialId) -> Option<&Material>;

    fn texture(&self, id: TextureId) -> Option<&TextureData>;
}

impl AssetSource for SceneGraph {
    fn mesh(&self, id: MeshId) -> Option<Rc<Mesh>> {
        SceneGraph::mesh(self, id)
    }

    fn mesh_revision(&self, id: MeshId) -> Option<u64> {
        SceneGraph::mesh_revision(self, id)
    }

    fn material(&self, id: MaterialId) -> Option<&Material> {
        SceneGraph::material(self, id)
    }

    fn texture(&self, id: TextureId) -> Option<&TextureData> {
        SceneGraph::texture(self, id)
    }
}
