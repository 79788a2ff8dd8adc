//! Uniform buffer layouts shared with the shaders
//!
//! Every struct here is `#[repr(C)]` with explicit padding and MUST match the
//! corresponding struct in `src/gfx/shaders/*.wgsl` byte for byte. vec3 fields
//! are followed by a scalar or a pad so each one starts on a 16-byte boundary.
//! Reordering a field is a silent correctness bug, which is why the sizes and
//! offsets are pinned by the tests at the bottom of this file.

use cgmath::{Matrix4, SquareMatrix, Vector3};

/// Maximum number of lights the lighting shaders accumulate
pub const MAX_LIGHTS: usize = 8;
/// Maximum 2D shadow maps (directional + spot) the shaders can address
pub const MAX_SHADOW_MAPS_2D: usize = 4;
/// Maximum cube shadow maps (point lights) the shaders can address
pub const MAX_SHADOW_MAPS_CUBE: usize = 4;
/// Total shadow records per frame
pub const MAX_SHADOWS: usize = MAX_SHADOW_MAPS_2D + MAX_SHADOW_MAPS_CUBE;

pub const LIGHT_TYPE_DIRECTIONAL: i32 = 0;
pub const LIGHT_TYPE_POINT: i32 = 1;
pub const LIGHT_TYPE_SPOT: i32 = 2;

pub const SHADOW_TYPE_2D: i32 = 0;
pub const SHADOW_TYPE_CUBE: i32 = 1;

pub fn matrix_to_array(matrix: Matrix4<f32>) -> [[f32; 4]; 4] {
    matrix.into()
}

/// Per-object uniform block
///
/// The canonical object UBO: model/view/projection, one key light, ambient,
/// camera position and a tint color. `receive_shadows` is 1.0 or 0.0.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub light_direction: [f32; 3],
    pub _padding0: f32,
    pub light_color: [f32; 3],
    pub _padding1: f32,
    pub ambient_color: [f32; 3],
    pub _padding2: f32,
    pub view_position: [f32; 3],
    pub receive_shadows: f32,
    pub object_color: [f32; 4],
}
// Total: 3 * 64 + 4 * 16 + 16 = 272 bytes

impl Default for ObjectUniforms {
    fn default() -> Self {
        let identity = matrix_to_array(Matrix4::identity());
        Self {
            model: identity,
            view: identity,
            projection: identity,
            light_direction: [0.0, -1.0, 0.0],
            _padding0: 0.0,
            light_color: [1.0, 1.0, 1.0],
            _padding1: 0.0,
            ambient_color: [0.0, 0.0, 0.0],
            _padding2: 0.0,
            view_position: [0.0, 0.0, 0.0],
            receive_shadows: 1.0,
            object_color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

/// Per-material uniform block
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniforms {
    pub albedo: [f32; 4],
    pub emission: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
    /// 1.0 when the albedo texture should be sampled
    pub has_albedo_texture: f32,
    pub _padding: f32,
}
// Total: 16 + 16 + 16 = 48 bytes

/// Light record as consumed by the lighting shaders
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuLight {
    /// World direction for directional lights, world position otherwise
    pub position_or_direction: [f32; 3],
    pub light_type: i32,
    pub color: [f32; 3],
    pub intensity: f32,
    pub direction: [f32; 3],
    pub range: f32,
    pub constant_att: f32,
    pub linear_att: f32,
    pub quadratic_att: f32,
    /// Cosine of the inner cone angle
    pub inner_cutoff: f32,
    /// Cosine of the outer cone angle
    pub outer_cutoff: f32,
    /// Index into [`ShadowUniforms::infos`], or -1 when unshadowed
    pub shadow_index: i32,
    pub _padding: [f32; 2],
}
// Total: 5 * 16 = 80 bytes

/// Camera, ambient and light list for the lighting and forward passes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightingUniforms {
    pub camera_position: [f32; 3],
    pub _padding0: f32,
    /// Ambient color already multiplied by the ambient intensity
    pub ambient_color: [f32; 3],
    pub _padding1: f32,
    pub light_count: i32,
    pub _padding2: [i32; 3],
    pub lights: [GpuLight; MAX_LIGHTS],
}
// Total: 16 + 16 + 16 + 8 * 80 = 688 bytes

impl Default for LightingUniforms {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

/// Per-light shadow record, rebuilt every frame
///
/// This is the only shadow record layout; the shadow manager fills it and the
/// lighting shaders read it unchanged.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowInfo {
    pub light_view_proj: [[f32; 4]; 4],
    pub light_position: [f32; 3],
    pub far_plane: f32,
    pub shadow_map_index: i32,
    /// [`SHADOW_TYPE_2D`] or [`SHADOW_TYPE_CUBE`]
    pub shadow_type: i32,
    pub bias: f32,
    pub normal_bias: f32,
    pub strength: f32,
    pub _padding: [f32; 3],
}
// Total: 64 + 16 + 16 + 16 = 112 bytes

impl Default for ShadowInfo {
    fn default() -> Self {
        Self {
            light_view_proj: matrix_to_array(Matrix4::identity()),
            light_position: [0.0; 3],
            far_plane: 1.0,
            shadow_map_index: -1,
            shadow_type: SHADOW_TYPE_2D,
            bias: 0.0,
            normal_bias: 0.0,
            strength: 0.0,
            _padding: [0.0; 3],
        }
    }
}

/// Shadow records for every shadowed light of the frame
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowUniforms {
    pub count: i32,
    pub _padding: [i32; 3],
    pub infos: [ShadowInfo; MAX_SHADOWS],
}
// Total: 16 + 8 * 112 = 912 bytes

impl Default for ShadowUniforms {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

/// Light-space camera for one depth-only shadow view
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowViewUniforms {
    pub light_view_proj: [[f32; 4]; 4],
    pub light_position: [f32; 3],
    /// Far plane used for linear cube-map depth
    pub far_plane: f32,
}
// Total: 64 + 16 = 80 bytes

impl ShadowViewUniforms {
    pub fn new(light_view_proj: Matrix4<f32>, light_position: Vector3<f32>, far_plane: f32) -> Self {
        Self {
            light_view_proj: matrix_to_array(light_view_proj),
            light_position: light_position.into(),
            far_plane,
        }
    }
}

/// Tone-mapping parameters
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PostProcessUniforms {
    pub background: [f32; 4],
    pub exposure: f32,
    pub gamma: f32,
    pub _padding: [f32; 2],
}
// Total: 16 + 16 = 32 bytes

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_uniform_sizes_match_shaders() {
        assert_eq!(size_of::<ObjectUniforms>(), 272);
        assert_eq!(size_of::<MaterialUniforms>(), 48);
        assert_eq!(size_of::<GpuLight>(), 80);
        assert_eq!(size_of::<LightingUniforms>(), 688);
        assert_eq!(size_of::<ShadowInfo>(), 112);
        assert_eq!(size_of::<ShadowUniforms>(), 912);
        assert_eq!(size_of::<ShadowViewUniforms>(), 80);
        assert_eq!(size_of::<PostProcessUniforms>(), 32);
    }

    #[test]
    fn test_vec3_fields_are_16_byte_aligned() {
        assert_eq!(offset_of!(ObjectUniforms, light_direction), 192);
        assert_eq!(offset_of!(ObjectUniforms, light_color), 208);
        assert_eq!(offset_of!(ObjectUniforms, ambient_color), 224);
        assert_eq!(offset_of!(ObjectUniforms, view_position), 240);
        assert_eq!(offset_of!(ObjectUniforms, receive_shadows), 252);
        assert_eq!(offset_of!(ObjectUniforms, object_color), 256);
        assert_eq!(offset_of!(GpuLight, color), 16);
        assert_eq!(offset_of!(GpuLight, direction), 32);
        assert_eq!(offset_of!(GpuLight, constant_att), 48);
        assert_eq!(offset_of!(GpuLight, outer_cutoff), 64);
        assert_eq!(offset_of!(LightingUniforms, lights), 48);
        assert_eq!(offset_of!(ShadowInfo, light_position), 64);
        assert_eq!(offset_of!(ShadowInfo, shadow_map_index), 80);
        assert_eq!(offset_of!(ShadowInfo, strength), 96);
        assert_eq!(offset_of!(ShadowUniforms, infos), 16);
    }
}
