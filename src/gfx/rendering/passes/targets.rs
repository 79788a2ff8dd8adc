//! Size-dependent render targets

use crate::gfx::backend::{GraphicsDevice, TextureDesc, TextureFormat, TextureHandle, TextureUsage};
use crate::gfx::error::{RenderError, RenderResult};

/// Position, normal+metallic, albedo+roughness, emission+AO
pub const GBUFFER_FORMATS: [TextureFormat; 4] = [
    TextureFormat::Rgba32Float,
    TextureFormat::Rgba16Float,
    TextureFormat::Rgba8Unorm,
    TextureFormat::Rgba16Float,
];
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
pub const OUTPUT_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Largest accepted render target edge
pub const MAX_TARGET_SIZE: u32 = 16384;

/// G-buffer, HDR and output textures for one viewport size
#[derive(Debug)]
pub struct RenderTargets {
    width: u32,
    height: u32,
    gbuffer: [TextureHandle; 4],
    depth: TextureHandle,
    hdr: TextureHandle,
    output: TextureHandle,
}

pub fn validate_size(width: u32, height: u32) -> RenderResult<()> {
    if width == 0 || height == 0 || width > MAX_TARGET_SIZE || height > MAX_TARGET_SIZE {
        return Err(RenderError::InvalidSize { width, height });
    }
    Ok(())
}

impl RenderTargets {
    pub fn new(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> RenderResult<Self> {
        validate_size(width, height)?;

        let mut created = Vec::with_capacity(7);
        let result = Self::create_all(device, width, height, &mut created);
        if result.is_err() {
            for texture in created {
                device.destroy_texture(texture);
            }
        }
        result
    }

    fn create_all(
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
        created: &mut Vec<TextureHandle>,
    ) -> RenderResult<Self> {
        let mut create = |label: &str, format: TextureFormat, usage: TextureUsage| {
            let texture = device.create_texture(&TextureDesc::d2(label, width, height, format, usage))?;
            created.push(texture);
            Ok::<_, RenderError>(texture)
        };

        let sampled_target = TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED;
        let gbuffer = [
            create("G-Buffer Position", GBUFFER_FORMATS[0], sampled_target)?,
            create("G-Buffer Normal Metallic", GBUFFER_FORMATS[1], sampled_target)?,
            create("G-Buffer Albedo Roughness", GBUFFER_FORMATS[2], sampled_target)?,
            create("G-Buffer Emission AO", GBUFFER_FORMATS[3], sampled_target)?,
        ];
        let depth = create("G-Buffer Depth", DEPTH_FORMAT, TextureUsage::RENDER_TARGET)?;
        let hdr = create("HDR Target", HDR_FORMAT, sampled_target)?;
        let output = create(
            "Output Target",
            OUTPUT_FORMAT,
            sampled_target | TextureUsage::TRANSFER_SRC,
        )?;

        log::debug!("Created {}x{} render targets", width, height);
        Ok(Self {
            width,
            height,
            gbuffer,
            depth,
            hdr,
            output,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn gbuffer(&self) -> [TextureHandle; 4] {
        self.gbuffer
    }

    pub fn depth(&self) -> TextureHandle {
        self.depth
    }

    pub fn hdr(&self) -> TextureHandle {
        self.hdr
    }

    pub fn output(&self) -> TextureHandle {
        self.output
    }

    pub fn destroy(&self, device: &mut dyn GraphicsDevice) {
        for texture in self.gbuffer {
            device.destroy_texture(texture);
        }
        device.destroy_texture(self.depth);
        device.destroy_texture(self.hdr);
        device.destroy_texture(self.output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::software::SoftwareDevice;

    #[test]
    fn test_zero_size_is_rejected() {
        let mut device = SoftwareDevice::new();
        assert_eq!(
            RenderTargets::new(&mut device, 0, 10).unwrap_err(),
            RenderError::InvalidSize { width: 0, height: 10 }
        );
        assert_eq!(device.live_handle_count(), 0);
    }

    #[test]
    fn test_destroy_releases_all_targets() {
        let mut device = SoftwareDevice::new();
        let targets = RenderTargets::new(&mut device, 8, 4).unwrap();
        assert_eq!(device.live_handle_count(), 7);
        targets.destroy(&mut device);
        targets.destroy(&mut device);
        assert_eq!(device.live_handle_count(), 0);
    }
}
