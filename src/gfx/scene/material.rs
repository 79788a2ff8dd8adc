//! Material definitions for PBR rendering
//!
//! Materials are plain values stored in the scene graph's material arena.
//! Nodes reference them by [`MaterialId`], so one material can be shared by
//! any number of nodes. GPU resources live in the renderer's material cache.

use slotmap::new_key_type;

use super::color::Color;
use crate::gfx::resources::uniforms::MaterialUniforms;

new_key_type! {
    /// Stable id of a material in a [`SceneGraph`](super::SceneGraph)
    pub struct MaterialId;
    /// Stable id of a texture in a [`SceneGraph`](super::SceneGraph)
    pub struct TextureId;
}

/// Material definition with PBR properties
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub albedo: Color,
    pub metallic: f32,
    pub roughness: f32,
    pub emission: [f32; 3],
    pub ao: f32,
    pub albedo_texture: Option<TextureId>,
    /// Rendered in the forward pass with alpha blending
    pub transparent: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Color::new(0.8, 0.8, 0.8, 1.0),
            metallic: 0.0,
            roughness: 0.5,
            emission: [0.0, 0.0, 0.0],
            ao: 1.0,
            albedo_texture: None,
            transparent: false,
        }
    }
}

impl Material {
    /// Creates a new material with basic PBR properties
    ///
    /// # Arguments
    /// * `albedo` - RGBA base color
    /// * `metallic` - Metallic factor (0.0 = dielectric, 1.0 = metallic)
    /// * `roughness` - Surface roughness (0.0 = mirror, 1.0 = rough)
    pub fn new(albedo: Color, metallic: f32, roughness: f32) -> Self {
        Self {
            albedo,
            metallic: metallic.clamp(0.0, 1.0),
            roughness: roughness.clamp(0.0, 1.0),
            ..Default::default()
        }
    }

    /// Builder pattern: Set base color from RGB values
    pub fn with_color(mut self, r: f32, g: f32, b: f32) -> Self {
        self.albedo = Color::new(r, g, b, self.albedo.a());
        self
    }

    /// Builder pattern: Set alpha and mark the material transparent when below one
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        let alpha = alpha.clamp(0.0, 1.0);
        self.albedo.0[3] = alpha;
        self.transparent = alpha < 1.0;
        self
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic.clamp(0.0, 1.0);
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    pub fn with_emission(mut self, r: f32, g: f32, b: f32) -> Self {
        self.emission = [r, g, b];
        self
    }

    pub fn with_ao(mut self, ao: f32) -> Self {
        self.ao = ao.clamp(0.0, 1.0);
        self
    }

    pub fn with_albedo_texture(mut self, texture: TextureId) -> Self {
        self.albedo_texture = Some(texture);
        self
    }

    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Uniform block uploaded for this material
    pub fn to_uniforms(&self, has_albedo_texture: bool) -> MaterialUniforms {
        MaterialUniforms {
            albedo: self.albedo.0,
            emission: self.emission,
            metallic: self.metallic,
            roughness: self.roughness,
            ao: self.ao,
            has_albedo_texture: if has_albedo_texture { 1.0 } else { 0.0 },
            _padding: 0.0,
        }
    }
}

/// CPU-side RGBA8 texture data
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows, top row first
    pub rgba8: Vec<u8>,
}

impl TextureData {
    /// Returns `None` when `rgba8` does not hold exactly `width * height` texels
    pub fn new(width: u32, height: u32, rgba8: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || rgba8.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            rgba8,
        })
    }

    /// A single-texel texture
    pub fn solid(color: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            rgba8: color.to_vec(),
        }
    }
}
