//! Light sources

use cgmath::{InnerSpace, Matrix4, Vector3};

use super::color::Color;
use super::scene_graph::NodeId;
use crate::gfx::resources::uniforms::{
    GpuLight, LIGHT_TYPE_DIRECTIONAL, LIGHT_TYPE_POINT, LIGHT_TYPE_SPOT,
};

/// Distance falloff `1 / (constant + linear * d + quadratic * d^2)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    /// Inverse-square falloff
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.0,
            quadratic: 1.0,
        }
    }
}

/// Per-light shadow tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowParams {
    /// Depth offset subtracted before the comparison
    pub bias: f32,
    /// World-space offset along the surface normal before projecting
    pub normal_bias: f32,
    /// 0 disables darkening, 1 makes occluded points fully unlit
    pub strength: f32,
}

impl Default for ShadowParams {
    fn default() -> Self {
        Self {
            bias: 0.005,
            normal_bias: 0.02,
            strength: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional {
        direction: Vector3<f32>,
        /// Depth range of the shadow camera
        shadow_distance: f32,
        /// Width and height in world units covered by the shadow map
        shadow_extent: f32,
    },
    Point {
        position: Vector3<f32>,
        range: f32,
        attenuation: Attenuation,
    },
    Spot {
        position: Vector3<f32>,
        direction: Vector3<f32>,
        range: f32,
        attenuation: Attenuation,
        /// Full-intensity half angle in degrees
        inner_angle: f32,
        /// Cut-off half angle in degrees
        outer_angle: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
    pub enabled: bool,
    pub cast_shadows: bool,
    pub shadow: ShadowParams,
}

fn normalized_or_down(direction: Vector3<f32>) -> Vector3<f32> {
    if direction.magnitude2() > 1e-12 {
        direction.normalize()
    } else {
        Vector3::new(0.0, -1.0, 0.0)
    }
}

impl Light {
    fn with_kind(kind: LightKind) -> Self {
        Self {
            kind,
            color: Color::WHITE,
            intensity: 1.0,
            enabled: true,
            cast_shadows: false,
            shadow: ShadowParams::default(),
        }
    }

    pub fn directional(direction: Vector3<f32>) -> Self {
        Self::with_kind(LightKind::Directional {
            direction: normalized_or_down(direction),
            shadow_distance: 50.0,
            shadow_extent: 20.0,
        })
    }

    pub fn point(position: Vector3<f32>, range: f32) -> Self {
        Self::with_kind(LightKind::Point {
            position,
            range,
            attenuation: Attenuation::default(),
        })
    }

    pub fn spot(
        position: Vector3<f32>,
        direction: Vector3<f32>,
        range: f32,
        inner_angle: f32,
        outer_angle: f32,
    ) -> Self {
        Self::with_kind(LightKind::Spot {
            position,
            direction: normalized_or_down(direction),
            range,
            attenuation: Attenuation::default(),
            inner_angle,
            outer_angle,
        })
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn with_shadows(mut self, cast_shadows: bool) -> Self {
        self.cast_shadows = cast_shadows;
        self
    }

    pub fn with_shadow_params(mut self, shadow: ShadowParams) -> Self {
        self.shadow = shadow;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Replaces the attenuation of point and spot lights
    pub fn with_attenuation(mut self, value: Attenuation) -> Self {
        match &mut self.kind {
            LightKind::Point { attenuation, .. } | LightKind::Spot { attenuation, .. } => {
                *attenuation = value
            }
            LightKind::Directional { .. } => {}
        }
        self
    }

    pub fn is_directional(&self) -> bool {
        matches!(self.kind, LightKind::Directional { .. })
    }

    pub fn is_point(&self) -> bool {
        matches!(self.kind, LightKind::Point { .. })
    }

    /// The same light moved into the space described by `world`
    pub fn transformed(&self, world: &Matrix4<f32>) -> Light {
        let point = |p: Vector3<f32>| (world * p.extend(1.0)).truncate();
        let direction = |d: Vector3<f32>| normalized_or_down((world * d.extend(0.0)).truncate());
        let kind = match self.kind {
            LightKind::Directional {
                direction: d,
                shadow_distance,
                shadow_extent,
            } => LightKind::Directional {
                direction: direction(d),
                shadow_distance,
                shadow_extent,
            },
            LightKind::Point {
                position,
                range,
                attenuation,
            } => LightKind::Point {
                position: point(position),
                range,
                attenuation,
            },
            LightKind::Spot {
                position,
                direction: d,
                range,
                attenuation,
                inner_angle,
                outer_angle,
            } => LightKind::Spot {
                position: point(position),
                direction: direction(d),
                range,
                attenuation,
                inner_angle,
                outer_angle,
            },
        };
        Light { kind, ..*self }
    }

    /// Light record for the lighting shaders
    ///
    /// `shadow_index` points into the frame's shadow records, -1 for none.
    pub fn to_gpu(&self, shadow_index: i32) -> GpuLight {
        let color = self.color.to_rgb();
        let mut gpu = GpuLight {
            color,
            intensity: self.intensity,
            shadow_index,
            ..Default::default()
        };
        match self.kind {
            LightKind::Directional { direction, .. } => {
                gpu.light_type = LIGHT_TYPE_DIRECTIONAL;
                gpu.position_or_direction = direction.into();
                gpu.direction = direction.into();
                gpu.range = f32::MAX;
                gpu.constant_att = 1.0;
            }
            LightKind::Point {
                position,
                range,
                attenuation,
            } => {
                gpu.light_type = LIGHT_TYPE_POINT;
                gpu.position_or_direction = position.into();
                gpu.range = range;
                gpu.constant_att = attenuation.constant;
                gpu.linear_att = attenuation.linear;
                gpu.quadratic_att = attenuation.quadratic;
            }
            LightKind::Spot {
                position,
                direction,
                range,
                attenuation,
                inner_angle,
                outer_angle,
            } => {
                gpu.light_type = LIGHT_TYPE_SPOT;
                gpu.position_or_direction = position.into();
                gpu.direction = direction.into();
                gpu.range = range;
                gpu.constant_att = attenuation.constant;
                gpu.linear_att = attenuation.linear;
                gpu.quadratic_att = attenuation.quadratic;
                gpu.inner_cutoff = inner_angle.to_radians().cos();
                gpu.outer_cutoff = outer_angle.to_radians().cos();
            }
        }
        gpu
    }
}

/// A light resolved to world space for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightInstance {
    /// Scene node the light came from, `None` for lights passed directly
    pub node: Option<NodeId>,
    pub light: Light,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_attenuation_is_inverse_square() {
        let gpu = Light::point(Vector3::new(0.0, 1.0, 0.0), 10.0).to_gpu(-1);
        assert_eq!((gpu.constant_att, gpu.linear_att, gpu.quadratic_att), (1.0, 0.0, 1.0));
        assert_eq!(gpu.light_type, LIGHT_TYPE_POINT);
        assert_eq!(gpu.shadow_index, -1);
    }

    #[test]
    fn test_spot_cutoffs_are_cosines() {
        let gpu = Light::spot(Vector3::new(0.0, 0.0, 0.0), -Vector3::unit_y(), 5.0, 0.0, 60.0).to_gpu(2);
        assert_relative_eq!(gpu.inner_cutoff, 1.0);
        assert_relative_eq!(gpu.outer_cutoff, 0.5, epsilon = 1e-6);
        assert_eq!(gpu.shadow_index, 2);
    }

    #[test]
    fn test_transformed_moves_position_and_rotates_direction() {
        let world = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0))
            * Matrix4::from_angle_z(cgmath::Deg(90.0));
        let spot = Light::spot(Vector3::new(1.0, 0.0, 0.0), Vector3::unit_x(), 5.0, 10.0, 20.0)
            .transformed(&world);
        let LightKind::Spot { position, direction, .. } = spot.kind else {
            panic!("kind changed");
        };
        assert_relative_eq!(position, Vector3::new(1.0, 3.0, 3.0), epsilon = 1e-5);
        assert_relative_eq!(direction, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-5);
    }
}
