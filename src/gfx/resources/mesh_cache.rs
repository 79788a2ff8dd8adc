//! Device-local vertex and index buffers for scene meshes

use std::collections::HashMap;

use super::AssetSource;
use crate::gfx::backend::{BufferDesc, BufferHandle, BufferUsage, GraphicsDevice, MemoryProperties};
use crate::gfx::error::RenderResult;
use crate::gfx::scene::{Mesh, MeshId};

/// Smallest allocation; lets empty meshes keep valid buffers
const MIN_BUFFER_SIZE: u64 = 32;

/// GPU buffers of one mesh revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMesh {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
    pub revision: u64,
}

/// Uploaded meshes keyed by [`MeshId`]
///
/// Ids are compared with their slot version, so a mesh added into a reused
/// slot never aliases the entry of the mesh it replaced.
#[derive(Default)]
pub struct MeshCache {
    entries: HashMap<MeshId, GpuMesh>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: MeshId) -> Option<GpuMesh> {
        self.entries.get(&id).copied()
    }

    /// Buffers for the current revision of `id`, uploading them when missing or stale
    ///
    /// # Returns
    /// `None` when `assets` no longer has the mesh
    pub fn get_or_create(
        &mut self,
        device: &mut dyn GraphicsDevice,
        id: MeshId,
        assets: &dyn AssetSource,
    ) -> RenderResult<Option<GpuMesh>> {
        let (Some(mesh), Some(revision)) = (assets.mesh(id), assets.mesh_revision(id)) else {
            self.invalidate(device, id);
            return Ok(None);
        };

        if let Some(entry) = self.entries.get(&id) {
            if entry.revision == revision {
                return Ok(Some(*entry));
            }
            log::debug!(
                "Mesh {:?} changed from revision {} to {}, re-uploading",
                id,
                entry.revision,
                revision
            );
            self.invalidate(device, id);
        }

        let entry = upload_mesh(device, &mesh, revision)?;
        self.entries.insert(id, entry);
        Ok(Some(entry))
    }

    /// Releases the buffers of `id`; the next request uploads again
    pub fn invalidate(&mut self, device: &mut dyn GraphicsDevice, id: MeshId) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                device.destroy_buffer(entry.vertex_buffer);
                device.destroy_buffer(entry.index_buffer);
                true
            }
            None => false,
        }
    }

    /// Releases entries whose mesh is gone from `assets`
    ///
    /// # Returns
    /// Number of entries released
    pub fn prune(&mut self, device: &mut dyn GraphicsDevice, assets: &dyn AssetSource) -> usize {
        let stale: Vec<MeshId> = self
            .entries
            .keys()
            .filter(|id| assets.mesh_revision(**id).is_none())
            .copied()
            .collect();
        for id in &stale {
            self.invalidate(device, *id);
        }
        if !stale.is_empty() {
            log::debug!("Pruned {} meshes no longer in the scene", stale.len());
        }
        stale.len()
    }

    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, entry) in self.entries.drain() {
            device.destroy_buffer(entry.vertex_buffer);
            device.destroy_buffer(entry.index_buffer);
        }
    }
}

fn upload_mesh(device: &mut dyn GraphicsDevice, mesh: &Mesh, revision: u64) -> RenderResult<GpuMesh> {
    let vertex_buffer = upload_buffer(
        device,
        "Mesh Vertex Buffer",
        bytemuck::cast_slice(mesh.vertices()),
        BufferUsage::VERTEX,
    )?;
    let index_buffer = match upload_buffer(
        device,
        "Mesh Index Buffer",
        bytemuck::cast_slice(mesh.indices()),
        BufferUsage::INDEX,
    ) {
        Ok(buffer) => buffer,
        Err(err) => {
            device.destroy_buffer(vertex_buffer);
            return Err(err);
        }
    };

    log::debug!(
        "Uploaded mesh: {} vertices, {} indices",
        mesh.vertices().len(),
        mesh.index_count()
    );
    Ok(GpuMesh {
        vertex_buffer,
        index_buffer,
        index_count: mesh.index_count(),
        revision,
    })
}

/// Fills a device-local buffer through a temporary host-visible staging buffer
fn upload_buffer(
    device: &mut dyn GraphicsDevice,
    label: &str,
    bytes: &[u8],
    usage: BufferUsage,
) -> RenderResult<BufferHandle> {
    let size = (bytes.len() as u64).max(MIN_BUFFER_SIZE);
    let staging = device.create_buffer(&BufferDesc {
        label: &format!("{} (staging)", label),
        size,
        usage: BufferUsage::TRANSFER_SRC,
        memory: MemoryProperties::HOST_SHARED,
    })?;

    let buffer = device.create_buffer(&BufferDesc {
        label,
        size,
        usage: usage | BufferUsage::TRANSFER_DST,
        memory: MemoryProperties::DEVICE_LOCAL,
    });
    let copied = buffer.and_then(|buffer| {
        if !bytes.is_empty() {
            let copy = device
                .write_buffer(staging, 0, bytes)
                .and_then(|_| device.copy_buffer_to_buffer(staging, buffer, bytes.len() as u64));
            if let Err(err) = copy {
                device.destroy_buffer(buffer);
                return Err(err);
            }
        }
        Ok(buffer)
    });

    device.destroy_buffer(staging);
    copied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::software::SoftwareDevice;
    use crate::gfx::geometry::PrimitiveShape;
    use crate::gfx::scene::SceneGraph;

    #[test]
    fn test_same_revision_returns_same_buffers() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        let id = scene.add_mesh(PrimitiveShape::unit_cube().to_mesh());
        let mut cache = MeshCache::new();

        let first = cache.get_or_create(&mut device, id, &scene).unwrap().unwrap();
        let live = device.live_handle_count();
        let second = cache.get_or_create(&mut device, id, &scene).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.index_count, 36);
        // staging buffers are gone, only the two device-local buffers remain
        assert_eq!(live, 2);
        assert_eq!(device.live_handle_count(), live);
    }

    #[test]
    fn test_revision_bump_reuploads() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        let id = scene.add_mesh(PrimitiveShape::unit_cube().to_mesh());
        let mut cache = MeshCache::new();
        let before = cache.get_or_create(&mut device, id, &scene).unwrap().unwrap();

        scene.set_mesh_geometry(id, Vec::new(), Vec::new());
        let after = cache.get_or_create(&mut device, id, &scene).unwrap().unwrap();
        assert_ne!(before.vertex_buffer, after.vertex_buffer);
        assert_eq!(after.index_count, 0);
        assert_eq!(after.revision, 1);
        assert!(!device.destroy_buffer(before.vertex_buffer));
        assert_eq!(device.live_handle_count(), 2);
    }

    #[test]
    fn test_removed_mesh_is_dropped() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        let id = scene.add_mesh(PrimitiveShape::unit_cube().to_mesh());
        let mut cache = MeshCache::new();
        cache.get_or_create(&mut device, id, &scene).unwrap();

        scene.remove_mesh(id);
        assert!(cache.get_or_create(&mut device, id, &scene).unwrap().is_none());
        assert!(cache.is_empty());
        assert_eq!(device.live_handle_count(), 0);
    }

    #[test]
    fn test_reused_slot_does_not_leak_old_buffers() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        let mut cache = MeshCache::new();
        let old = scene.add_mesh(PrimitiveShape::unit_cube().to_mesh());
        let old_mesh = cache.get_or_create(&mut device, old, &scene).unwrap().unwrap();

        scene.remove_mesh(old);
        let new = scene.add_mesh(PrimitiveShape::unit_cube().to_mesh());
        assert_ne!(old, new);
        let new_mesh = cache.get_or_create(&mut device, new, &scene).unwrap().unwrap();
        assert_ne!(old_mesh.vertex_buffer, new_mesh.vertex_buffer);
        assert_eq!(cache.len(), 2);

        cache.clear(&mut device);
        assert_eq!(device.live_handle_count(), 0);
    }

    #[test]
    fn test_prune_releases_removed_meshes() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        let mut cache = MeshCache::new();
        let kept = scene.add_mesh(PrimitiveShape::unit_cube().to_mesh());
        let removed = scene.add_mesh(PrimitiveShape::unit_cube().to_mesh());
        cache.get_or_create(&mut device, kept, &scene).unwrap();
        cache.get_or_create(&mut device, removed, &scene).unwrap();

        scene.remove_mesh(removed);
        assert_eq!(cache.prune(&mut device, &scene), 1);
        assert_eq!(cache.prune(&mut device, &scene), 0);
        assert!(cache.get(kept).is_some());
        assert!(cache.get(removed).is_none());
        assert_eq!(device.live_handle_count(), 2);
    }
}
