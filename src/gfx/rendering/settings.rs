//! Renderer configuration
//!
//! Capacity limits here are runtime values clamped below the compile-time
//! maxima the shaders are built with.

use crate::gfx::backend::factory::{parse_backend_order, BACKEND_ENV_VAR, DEFAULT_BACKEND_ORDER};
use crate::gfx::resources::uniforms::{MAX_LIGHTS, MAX_SHADOW_MAPS_2D, MAX_SHADOW_MAPS_CUBE};

pub const SHADOW_MAP_SIZE_ENV_VAR: &str = "PRISM3D_SHADOW_MAP_SIZE";
pub const EXPOSURE_ENV_VAR: &str = "PRISM3D_EXPOSURE";

/// Largest shadow map edge accepted from settings
pub const MAX_SHADOW_MAP_SIZE: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    pub enabled: bool,
    /// Directional and spot light slots
    pub max_shadow_maps_2d: usize,
    /// Point light slots
    pub max_shadow_maps_cube: usize,
    pub shadow_map_size: u32,
    pub cube_face_size: u32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_shadow_maps_2d: MAX_SHADOW_MAPS_2D,
            max_shadow_maps_cube: MAX_SHADOW_MAPS_CUBE,
            shadow_map_size: 2048,
            cube_face_size: 1024,
        }
    }
}

impl ShadowSettings {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_max_shadow_maps(mut self, max_2d: usize, max_cube: usize) -> Self {
        self.max_shadow_maps_2d = max_2d;
        self.max_shadow_maps_cube = max_cube;
        self
    }

    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size;
        self
    }

    pub fn with_cube_face_size(mut self, size: u32) -> Self {
        self.cube_face_size = size;
        self
    }

    /// Slot counts limited to the shader maxima, sizes limited to 1..=8192
    pub fn clamped(&self) -> Self {
        Self {
            enabled: self.enabled,
            max_shadow_maps_2d: self.max_shadow_maps_2d.min(MAX_SHADOW_MAPS_2D),
            max_shadow_maps_cube: self.max_shadow_maps_cube.min(MAX_SHADOW_MAPS_CUBE),
            shadow_map_size: self.shadow_map_size.clamp(1, MAX_SHADOW_MAP_SIZE),
            cube_face_size: self.cube_face_size.clamp(1, MAX_SHADOW_MAP_SIZE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessSettings {
    pub exposure: f32,
    pub gamma: f32,
}

impl Default for PostProcessSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            gamma: 2.2,
        }
    }
}

impl PostProcessSettings {
    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }
}

/// Everything the renderer can be configured with
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub shadows: ShadowSettings,
    pub post: PostProcessSettings,
    /// Lights beyond this count are dropped per frame
    pub max_lights: usize,
    /// Backend names tried in order by [`BackendFactory`](crate::gfx::backend::BackendFactory)
    pub backend_order: Vec<String>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadows: ShadowSettings::default(),
            post: PostProcessSettings::default(),
            max_lights: MAX_LIGHTS,
            backend_order: DEFAULT_BACKEND_ORDER.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RenderSettings {
    pub fn with_shadows(mut self, shadows: ShadowSettings) -> Self {
        self.shadows = shadows;
        self
    }

    pub fn with_post(mut self, post: PostProcessSettings) -> Self {
        self.post = post;
        self
    }

    pub fn with_max_lights(mut self, max_lights: usize) -> Self {
        self.max_lights = max_lights;
        self
    }

    pub fn with_backend_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.backend_order = order
            .into_iter()
            .map(|s| s.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    /// Light count actually used per frame
    pub fn effective_max_lights(&self) -> usize {
        self.max_lights.min(MAX_LIGHTS)
    }

    /// Defaults overridden by `PRISM3D_BACKEND`, `PRISM3D_SHADOW_MAP_SIZE` and `PRISM3D_EXPOSURE`
    pub fn from_env() -> Self {
        Self::default().apply_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from any key/value lookup. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(BACKEND_ENV_VAR) {
            let order = parse_backend_order(&value);
            if order.is_empty() {
                log::warn!("Ignoring empty {}", BACKEND_ENV_VAR);
            } else {
                self.backend_order = order;
            }
        }
        if let Some(value) = lookup(SHADOW_MAP_SIZE_ENV_VAR) {
            match value.trim().parse::<u32>() {
                Ok(size) if size > 0 => self.shadows.shadow_map_size = size,
                _ => log::warn!("Ignoring invalid {}='{}'", SHADOW_MAP_SIZE_ENV_VAR, value),
            }
        }
        if let Some(value) = lookup(EXPOSURE_ENV_VAR) {
            match value.trim().parse::<f32>() {
                Ok(exposure) if exposure.is_finite() && exposure >= 0.0 => {
                    self.post.exposure = exposure
                }
                _ => log::warn!("Ignoring invalid {}='{}'", EXPOSURE_ENV_VAR, value),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = RenderSettings::default();
        assert_eq!(settings.shadows.max_shadow_maps_2d, 4);
        assert_eq!(settings.shadows.max_shadow_maps_cube, 4);
        assert_eq!(settings.shadows.shadow_map_size, 2048);
        assert_eq!(settings.shadows.cube_face_size, 1024);
        assert_eq!(settings.post.exposure, 1.0);
        assert_eq!(settings.post.gamma, 2.2);
        assert_eq!(settings.backend_order, vec!["wgpu", "software"]);
    }

    #[test]
    fn test_overrides_apply() {
        let settings = RenderSettings::default().apply_overrides(lookup(&[
            ("PRISM3D_BACKEND", "Software, wgpu"),
            ("PRISM3D_SHADOW_MAP_SIZE", "512"),
            ("PRISM3D_EXPOSURE", "1.5"),
        ]));
        assert_eq!(settings.backend_order, vec!["software", "wgpu"]);
        assert_eq!(settings.shadows.shadow_map_size, 512);
        assert_eq!(settings.post.exposure, 1.5);
    }

    #[test]
    fn test_invalid_overrides_are_ignored() {
        let settings = RenderSettings::default().apply_overrides(lookup(&[
            ("PRISM3D_BACKEND", " , "),
            ("PRISM3D_SHADOW_MAP_SIZE", "huge"),
            ("PRISM3D_EXPOSURE", "-2"),
        ]));
        assert_eq!(settings, RenderSettings::default());
    }

    #[test]
    fn test_clamped_to_shader_maxima() {
        let shadows = ShadowSettings::default()
            .with_max_shadow_maps(16, 9)
            .with_shadow_map_size(0)
            .clamped();
        assert_eq!(shadows.max_shadow_maps_2d, MAX_SHADOW_MAPS_2D);
        assert_eq!(shadows.max_shadow_maps_cube, MAX_SHADOW_MAPS_CUBE);
        assert_eq!(shadows.shadow_map_size, 1);

        let settings = RenderSettings::default().with_max_lights(100);
        assert_eq!(settings.effective_max_lights(), MAX_LIGHTS);
    }
}
