//! Sampled RGBA8 textures for material albedo maps

use std::collections::HashMap;

use super::AssetSource;
use crate::gfx::backend::{GraphicsDevice, TextureDesc, TextureFormat, TextureHandle, TextureUsage};
use crate::gfx::error::RenderResult;
use crate::gfx::scene::{TextureData, TextureId};

/// Uploads `data` into a new texture ready for sampling
pub fn upload_texture(
    device: &mut dyn GraphicsDevice,
    label: &str,
    data: &TextureData,
) -> RenderResult<TextureHandle> {
    let texture = device.create_texture(&TextureDesc::d2(
        label,
        data.width,
        data.height,
        TextureFormat::Rgba8Unorm,
        TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
    ))?;
    let ready = device
        .write_texture(texture, 0, &data.rgba8)
        .and_then(|_| device.transition_for_sampling(texture));
    if let Err(err) = ready {
        device.destroy_texture(texture);
        return Err(err);
    }
    Ok(texture)
}

/// Uploaded textures keyed by [`TextureId`]
#[derive(Default)]
pub struct TextureCache {
    entries: HashMap<TextureId, TextureHandle>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// # Returns
    /// `None` when `assets` no longer has the texture
    pub fn get_or_create(
        &mut self,
        device: &mut dyn GraphicsDevice,
        id: TextureId,
        assets: &dyn AssetSource,
    ) -> RenderResult<Option<TextureHandle>> {
        let Some(data) = assets.texture(id) else {
            self.invalidate(device, id);
            return Ok(None);
        };
        if let Some(texture) = self.entries.get(&id) {
            return Ok(Some(*texture));
        }

        let texture = upload_texture(device, "Albedo Texture", data)?;
        log::debug!("Uploaded texture {:?} ({}x{})", id, data.width, data.height);
        self.entries.insert(id, texture);
        Ok(Some(texture))
    }

    pub fn invalidate(&mut self, device: &mut dyn GraphicsDevice, id: TextureId) -> bool {
        match self.entries.remove(&id) {
            Some(texture) => device.destroy_texture(texture),
            None => false,
        }
    }

    /// Releases textures that `assets` no longer has
    pub fn prune(&mut self, device: &mut dyn GraphicsDevice, assets: &dyn AssetSource) -> usize {
        let stale: Vec<TextureId> = self
            .entries
            .keys()
            .filter(|id| assets.texture(**id).is_none())
            .copied()
            .collect();
        for id in &stale {
            self.invalidate(device, *id);
        }
        stale.len()
    }

    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, texture) in self.entries.drain() {
            device.destroy_texture(texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::software::SoftwareDevice;
    use crate::gfx::backend::TextureState;
    use crate::gfx::scene::SceneGraph;

    #[test]
    fn test_uploaded_texture_is_ready_for_sampling() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        let id = scene.add_texture(TextureData::solid([255, 0, 0, 255]));
        let mut cache = TextureCache::new();

        let texture = cache.get_or_create(&mut device, id, &scene).unwrap().unwrap();
        assert_eq!(device.texture_state(texture), Some(TextureState::ShaderRead));
        assert_eq!(cache.get_or_create(&mut device, id, &scene).unwrap(), Some(texture));

        assert!(cache.invalidate(&mut device, id));
        assert!(!cache.invalidate(&mut device, id));
        assert_eq!(device.live_handle_count(), 0);
    }

    #[test]
    fn test_reused_slot_keeps_both_textures_accounted() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        let mut cache = TextureCache::new();
        let old = scene.add_texture(TextureData::solid([255, 0, 0, 255]));
        cache.get_or_create(&mut device, old, &scene).unwrap();

        scene.remove_texture(old);
        let new = scene.add_texture(TextureData::solid([0, 0, 255, 255]));
        cache.get_or_create(&mut device, new, &scene).unwrap();
        assert_eq!(cache.prune(&mut device, &scene), 1);
        assert_eq!(device.live_handle_count(), 1);

        cache.clear(&mut device);
        assert_eq!(device.live_handle_count(), 0);
    }
}
