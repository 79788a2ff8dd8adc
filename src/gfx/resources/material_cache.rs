//! Material system GPU resources
//!
//! Each cached material owns a [`UniformBuffer`] with its [`MaterialUniforms`]
//! and a descriptor set binding that buffer, its albedo texture and a shared
//! sampler. Materials without a texture bind a 1x1 white texture instead, so
//! the geometry and forward shaders never branch on a missing binding.
//!
//! Objects without a material (or with a stale id) draw with the default
//! material, which the cache keeps for its whole lifetime.

use std::collections::HashMap;

use super::texture_cache::{upload_texture, TextureCache};
use super::uniform_buffer::UniformBuffer;
use super::uniforms::MaterialUniforms;
use super::AssetSource;
use crate::gfx::backend::{
    AddressMode, DescriptorBinding, DescriptorKind, DescriptorSetHandle, DescriptorSetLayoutDesc,
    DescriptorSetLayoutHandle, DescriptorWrite, FilterMode, GraphicsDevice, SamplerDesc,
    SamplerHandle, ShaderStages, TextureHandle, TextureViewKind,
};
use crate::gfx::error::RenderResult;
use crate::gfx::scene::{Material, MaterialId, TextureData};

type MaterialUbo = UniformBuffer<MaterialUniforms>;

/// Bindings of the material descriptor set
///
/// | binding | resource                 |
/// |---------|--------------------------|
/// | 0       | [`MaterialUniforms`]     |
/// | 1       | albedo texture (2D)      |
/// | 2       | filtering sampler        |
pub fn material_layout_desc() -> DescriptorSetLayoutDesc<'static> {
    DescriptorSetLayoutDesc {
        label: "Material Descriptor Set",
        bindings: vec![
            DescriptorBinding {
                binding: 0,
                kind: DescriptorKind::UniformBuffer,
                stages: ShaderStages::FRAGMENT,
            },
            DescriptorBinding {
                binding: 1,
                kind: DescriptorKind::Texture {
                    view: TextureViewKind::D2,
                    depth: false,
                    filterable: true,
                },
                stages: ShaderStages::FRAGMENT,
            },
            DescriptorBinding {
                binding: 2,
                kind: DescriptorKind::Sampler {
                    comparison: false,
                    filtering: true,
                },
                stages: ShaderStages::FRAGMENT,
            },
        ],
    }
}

struct GpuMaterial {
    ubo: MaterialUbo,
    set: DescriptorSetHandle,
    bound_texture: Option<TextureHandle>,
}

impl GpuMaterial {
    fn destroy(mut self, device: &mut dyn GraphicsDevice) {
        device.destroy_descriptor_set(self.set);
        self.ubo.destroy(device);
    }
}

/// Shared handles every material set binds
#[derive(Clone, Copy)]
struct SharedBindings {
    layout: DescriptorSetLayoutHandle,
    sampler: SamplerHandle,
    white_texture: TextureHandle,
}

impl SharedBindings {
    fn create_material(
        &self,
        device: &mut dyn GraphicsDevice,
        uniforms: &MaterialUniforms,
        texture: Option<TextureHandle>,
    ) -> RenderResult<GpuMaterial> {
        let mut ubo = MaterialUbo::new_with_data(device, uniforms)?;
        let set = match device.create_descriptor_set(self.layout) {
            Ok(set) => set,
            Err(err) => {
                ubo.destroy(device);
                return Err(err);
            }
        };
        let material = GpuMaterial {
            ubo,
            set,
            bound_texture: texture,
        };
        let written = device.update_descriptor_set(
            set,
            &[
                DescriptorWrite::buffer(0, material.ubo.buffer()),
                DescriptorWrite::texture(1, texture.unwrap_or(self.white_texture)),
                DescriptorWrite::sampler(2, self.sampler),
            ],
        );
        if let Err(err) = written {
            material.destroy(device);
            return Err(err);
        }
        Ok(material)
    }
}

/// Material descriptor sets keyed by [`MaterialId`]
pub struct MaterialCache {
    shared: SharedBindings,
    default_material: GpuMaterial,
    entries: HashMap<MaterialId, GpuMaterial>,
}

impl MaterialCache {
    /// Creates the shared layout, sampler, white texture and default material
    pub fn new(device: &mut dyn GraphicsDevice) -> RenderResult<Self> {
        let layout = device.create_descriptor_set_layout(&material_layout_desc())?;
        let sampler = device.create_sampler(&SamplerDesc {
            label: "Material Sampler",
            filter: FilterMode::Linear,
            address: AddressMode::Repeat,
            compare: false,
        })?;
        let white_texture = upload_texture(device, "Default White Texture", &TextureData::solid([255; 4]))?;
        let shared = SharedBindings {
            layout,
            sampler,
            white_texture,
        };
        let default_material =
            shared.create_material(device, &Material::default().to_uniforms(false), None)?;

        log::debug!("Material cache ready");
        Ok(Self {
            shared,
            default_material,
            entries: HashMap::new(),
        })
    }

    /// Layout every material set is created with
    pub fn layout(&self) -> DescriptorSetLayoutHandle {
        self.shared.layout
    }

    pub fn default_set(&self) -> DescriptorSetHandle {
        self.default_material.set
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptor set for `id`, falling back to the default material
    ///
    /// The uniform buffer is refreshed from the current material values on every
    /// call; unchanged values cost no upload.
    pub fn get_or_create(
        &mut self,
        device: &mut dyn GraphicsDevice,
        id: Option<MaterialId>,
        assets: &dyn AssetSource,
        textures: &mut TextureCache,
    ) -> RenderResult<DescriptorSetHandle> {
        let Some((id, material)) = id.and_then(|id| Some((id, assets.material(id)?))) else {
            return Ok(self.default_material.set);
        };

        let texture = match material.albedo_texture {
            Some(texture) => textures.get_or_create(device, texture, assets)?,
            None => None,
        };
        let uniforms = material.to_uniforms(texture.is_some());

        if !self.entries.contains_key(&id) {
            let created = self.shared.create_material(device, &uniforms, texture)?;
            log::debug!("Created GPU material {:?}", id);
            self.entries.insert(id, created);
        }

        let shared = self.shared;
        let Some(entry) = self.entries.get_mut(&id) else {
            return Ok(self.default_material.set);
        };
        entry.ubo.update(device, &uniforms)?;
        if entry.bound_texture != texture {
            device.update_descriptor_set(
                entry.set,
                &[DescriptorWrite::texture(1, texture.unwrap_or(shared.white_texture))],
            )?;
            entry.bound_texture = texture;
        }
        Ok(entry.set)
    }

    /// Releases the GPU side of `id`; the next request rebuilds it
    pub fn invalidate(&mut self, device: &mut dyn GraphicsDevice, id: MaterialId) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                entry.destroy(device);
                true
            }
            None => false,
        }
    }

    /// Releases sets of materials that `assets` no longer has
    pub fn prune(&mut self, device: &mut dyn GraphicsDevice, assets: &dyn AssetSource) -> usize {
        let stale: Vec<MaterialId> = self
            .entries
            .keys()
            .filter(|id| assets.material(**id).is_none())
            .copied()
            .collect();
        for id in &stale {
            self.invalidate(device, *id);
        }
        stale.len()
    }

    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, entry) in self.entries.drain() {
            entry.destroy(device);
        }
    }

    /// Releases everything including the shared bindings. Safe to call more than once.
    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        self.clear(device);
        device.destroy_descriptor_set(self.default_material.set);
        self.default_material.ubo.destroy(device);
        device.destroy_texture(self.shared.white_texture);
        device.destroy_sampler(self.shared.sampler);
        device.destroy_descriptor_set_layout(self.shared.layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::software::SoftwareDevice;
    use crate::gfx::scene::SceneGraph;

    #[test]
    fn test_missing_material_uses_default_set() {
        let mut device = SoftwareDevice::new();
        let scene = SceneGraph::new();
        let mut textures = TextureCache::new();
        let mut cache = MaterialCache::new(&mut device).unwrap();

        let set = cache.get_or_create(&mut device, None, &scene, &mut textures).unwrap();
        assert_eq!(set, cache.default_set());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_recreates_set() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        let id = scene.add_material(Material::default().with_color(1.0, 0.0, 0.0));
        let mut textures = TextureCache::new();
        let mut cache = MaterialCache::new(&mut device).unwrap();

        let first = cache.get_or_create(&mut device, Some(id), &scene, &mut textures).unwrap();
        let again = cache.get_or_create(&mut device, Some(id), &scene, &mut textures).unwrap();
        assert_eq!(first, again);

        let live = device.live_handle_count();
        assert!(cache.invalidate(&mut device, id));
        // descriptor set and uniform buffer
        assert_eq!(device.live_handle_count(), live - 2);
        let rebuilt = cache.get_or_create(&mut device, Some(id), &scene, &mut textures).unwrap();
        assert_ne!(first, rebuilt);
        assert_eq!(device.live_handle_count(), live);
    }

    #[test]
    fn test_albedo_texture_goes_through_texture_cache() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        let texture = scene.add_texture(TextureData::solid([0, 255, 0, 255]));
        let id = scene.add_material(Material::default().with_albedo_texture(texture));
        let mut textures = TextureCache::new();
        let mut cache = MaterialCache::new(&mut device).unwrap();

        cache.get_or_create(&mut device, Some(id), &scene, &mut textures).unwrap();
        assert_eq!(textures.len(), 1);
    }

    #[test]
    fn test_dispose_releases_everything() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        let id = scene.add_material(Material::default());
        let mut textures = TextureCache::new();
        let mut cache = MaterialCache::new(&mut device).unwrap();
        cache.get_or_create(&mut device, Some(id), &scene, &mut textures).unwrap();

        cache.dispose(&mut device);
        cache.dispose(&mut device);
        assert_eq!(device.live_handle_count(), 0);
    }

    #[test]
    fn test_reused_slot_and_prune_do_not_leak() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        let mut textures = TextureCache::new();
        let mut cache = MaterialCache::new(&mut device).unwrap();
        let baseline = device.live_handle_count();

        let old = scene.add_material(Material::default().with_color(1.0, 0.0, 0.0));
        let old_set = cache.get_or_create(&mut device, Some(old), &scene, &mut textures).unwrap();
        scene.remove_material(old);
        let new = scene.add_material(Material::default().with_color(0.0, 1.0, 0.0));
        let new_set = cache.get_or_create(&mut device, Some(new), &scene, &mut textures).unwrap();
        assert_ne!(old_set, new_set);
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.prune(&mut device, &scene), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(device.live_handle_count(), baseline + 2);

        cache.dispose(&mut device);
        assert_eq!(device.live_handle_count(), 0);
    }
}
