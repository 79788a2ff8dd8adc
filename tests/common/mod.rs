#![allow(dead_code)]

use prism3d::gfx::backend::software::SoftwareDevice;
use prism3d::prelude::*;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Settings with small shadow maps so software renders stay quick
pub fn small_settings() -> RenderSettings {
    RenderSettings::default().with_shadows(
        ShadowSettings::default()
            .with_shadow_map_size(128)
            .with_cube_face_size(32),
    )
}

pub fn software_renderer(width: u32, height: u32) -> anyhow::Result<Renderer3D> {
    let mut renderer = Renderer3D::new(Box::new(SoftwareDevice::new()), small_settings());
    renderer.initialize(width, height)?;
    Ok(renderer)
}

/// RGBA8 pixel at (`x`, `y`) of a tightly packed image
pub fn pixel(rgba: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let offset = ((y * width + x) * 4) as usize;
    [rgba[offset], rgba[offset + 1], rgba[offset + 2], rgba[offset + 3]]
}

pub fn luminance(px: [u8; 4]) -> f32 {
    0.2126 * px[0] as f32 + 0.7152 * px[1] as f32 + 0.0722 * px[2] as f32
}
