//! CPU reference of the shading model
//!
//! These functions mirror `lighting_common.wgsl` and `post_process.wgsl`. The
//! software backend runs them per pixel; tests use them to check properties of
//! the shading model without a device.

use cgmath::{InnerSpace, Matrix4, Vector3, Vector4};

use crate::gfx::backend::CubeFace;
use crate::gfx::resources::uniforms::{
    GpuLight, LightingUniforms, ShadowInfo, ShadowUniforms, LIGHT_TYPE_DIRECTIONAL,
    LIGHT_TYPE_SPOT, MAX_LIGHTS, MAX_SHADOWS, SHADOW_TYPE_CUBE,
};

const PI: f32 = std::f32::consts::PI;

/// View direction and up vector of each cube face, in [`CubeFace`] order
pub const CUBE_FACE_VIEWS: [([f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, -1.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, 0.0, 1.0], [0.0, -1.0, 0.0]),
    ([0.0, 0.0, -1.0], [0.0, -1.0, 0.0]),
];

/// Surface attributes reconstructed from the G-buffer
#[derive(Debug, Clone, Copy)]
pub struct SurfaceSample {
    pub position: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub albedo: Vector3<f32>,
    pub metallic: f32,
    pub roughness: f32,
    pub emission: Vector3<f32>,
    pub ao: f32,
    /// Shadow maps are ignored for surfaces that do not receive shadows
    pub receive_shadows: bool,
}

/// Depth comparison lookups into the shadow textures
///
/// Both methods return 1.0 when `reference <= stored depth` (lit) and 0.0 otherwise.
pub trait ShadowLookup {
    fn compare_2d(&self, layer: u32, uv: [f32; 2], reference: f32) -> f32;
    fn compare_cube(&self, layer: u32, uv: [f32; 2], reference: f32) -> f32;
}

/// Lookup used when no shadow maps are bound; everything is lit
pub struct NoShadows;

impl ShadowLookup for NoShadows {
    fn compare_2d(&self, _layer: u32, _uv: [f32; 2], _reference: f32) -> f32 {
        1.0
    }

    fn compare_cube(&self, _layer: u32, _uv: [f32; 2], _reference: f32) -> f32 {
        1.0
    }
}

fn mul3(a: Vector3<f32>, b: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(a.x * b.x, a.y * b.y, a.z * b.z)
}

fn splat(v: f32) -> Vector3<f32> {
    Vector3::new(v, v, v)
}

pub fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * denom * denom)
}

fn geometry_schlick_ggx(n_dot_v: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = (r * r) / 8.0;
    n_dot_v / (n_dot_v * (1.0 - k) + k)
}

pub fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness)
}

pub fn fresnel_schlick(cos_theta: f32, f0: Vector3<f32>) -> Vector3<f32> {
    let factor = (1.0 - cos_theta).clamp(0.0, 1.0).powi(5);
    f0 + (splat(1.0) - f0) * factor
}

/// `1 / (c + l*d + q*d^2)`; with the default (1, 0, 1) this is an inverse-square falloff
pub fn attenuation(distance: f32, constant: f32, linear: f32, quadratic: f32) -> f32 {
    1.0 / (constant + linear * distance + quadratic * distance * distance).max(1e-4)
}

/// Radiance reflected toward the viewer from one light, before shadowing
pub fn light_contribution(
    light: &GpuLight,
    surface: &SurfaceSample,
    view_dir: Vector3<f32>,
) -> Vector3<f32> {
    let n = surface.normal;
    let mut spot_effect = 1.0;
    let mut falloff = 1.0;

    let l = if light.light_type == LIGHT_TYPE_DIRECTIONAL {
        (-Vector3::from(light.position_or_direction)).normalize()
    } else {
        let to_light = Vector3::from(light.position_or_direction) - surface.position;
        let distance = to_light.magnitude();
        if distance > light.range || distance <= 1e-6 {
            return splat(0.0);
        }
        falloff = attenuation(
            distance,
            light.constant_att,
            light.linear_att,
            light.quadratic_att,
        );
        let l = to_light / distance;
        if light.light_type == LIGHT_TYPE_SPOT {
            let theta = l.dot((-Vector3::from(light.direction)).normalize());
            let epsilon = (light.inner_cutoff - light.outer_cutoff).max(1e-4);
            spot_effect = ((theta - light.outer_cutoff) / epsilon).clamp(0.0, 1.0);
        }
        l
    };

    let n_dot_l = n.dot(l).max(0.0);
    if n_dot_l <= 0.0 {
        return splat(0.0);
    }
    let n_dot_v = n.dot(view_dir).max(0.0);
    let h = (view_dir + l).normalize();
    let radiance = Vector3::from(light.color) * (light.intensity * falloff * spot_effect);

    let f0 = splat(0.04) * (1.0 - surface.metallic) + surface.albedo * surface.metallic;
    let ndf = distribution_ggx(n.dot(h).max(0.0), surface.roughness);
    let g = geometry_smith(n_dot_v, n_dot_l, surface.roughness);
    let f = fresnel_schlick(h.dot(view_dir).max(0.0), f0);

    let specular = f * (ndf * g / (4.0 * n_dot_v * n_dot_l + 1e-4));
    let k_d = (splat(1.0) - f) * (1.0 - surface.metallic);
    let diffuse = mul3(k_d, surface.albedo) / PI;

    mul3(diffuse + specular, radiance) * n_dot_l
}

/// Texture coordinate of a light-space clip position, y pointing down
pub fn clip_to_uv(clip: Vector4<f32>) -> Option<([f32; 2], f32)> {
    if clip.w.abs() < 1e-6 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    Some(([ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5], ndc.z))
}

/// Picks the cube face a direction points into and its face-local texture coordinate
pub fn cube_face_uv(direction: Vector3<f32>) -> (CubeFace, [f32; 2]) {
    let abs = Vector3::new(direction.x.abs(), direction.y.abs(), direction.z.abs());
    let face = if abs.x >= abs.y && abs.x >= abs.z {
        if direction.x >= 0.0 {
            CubeFace::PositiveX
        } else {
            CubeFace::NegativeX
        }
    } else if abs.y >= abs.z {
        if direction.y >= 0.0 {
            CubeFace::PositiveY
        } else {
            CubeFace::NegativeY
        }
    } else if direction.z >= 0.0 {
        CubeFace::PositiveZ
    } else {
        CubeFace::NegativeZ
    };

    let (forward, up) = CUBE_FACE_VIEWS[face as usize];
    let forward = Vector3::from(forward);
    let side = forward.cross(Vector3::from(up)).normalize();
    let true_up = side.cross(forward);
    let depth = direction.dot(forward).max(1e-6);
    let x = direction.dot(side) / depth;
    let y = direction.dot(true_up) / depth;
    (face, [x * 0.5 + 0.5, 0.5 - y * 0.5])
}

/// Visibility of a surface point from a shadowed light, scaled by shadow strength
///
/// Returns 1.0 for fully lit and `1 - strength` for fully occluded.
pub fn shadow_factor(info: &ShadowInfo, surface: &SurfaceSample, lookup: &dyn ShadowLookup) -> f32 {
    if info.shadow_map_index < 0 {
        return 1.0;
    }
    let biased = surface.position + surface.normal * info.normal_bias;

    let visibility = if info.shadow_type == SHADOW_TYPE_CUBE {
        let to_fragment = biased - Vector3::from(info.light_position);
        let distance = to_fragment.magnitude();
        if distance >= info.far_plane {
            return 1.0;
        }
        let (face, uv) = cube_face_uv(to_fragment);
        let reference = distance / info.far_plane - info.bias;
        lookup.compare_cube(face.layer(info.shadow_map_index as u32), uv, reference)
    } else {
        let light_view_proj = Matrix4::from(info.light_view_proj);
        let Some((uv, depth)) = clip_to_uv(light_view_proj * biased.extend(1.0)) else {
            return 1.0;
        };
        if !(0.0..=1.0).contains(&uv[0]) || !(0.0..=1.0).contains(&uv[1]) || depth > 1.0 {
            return 1.0;
        }
        lookup.compare_2d(info.shadow_map_index as u32, uv, depth - info.bias)
    };

    1.0 - info.strength * (1.0 - visibility)
}

/// Full lighting of one surface point: lights, shadows, flat ambient and emission
pub fn shade(
    surface: &SurfaceSample,
    lighting: &LightingUniforms,
    shadows: &ShadowUniforms,
    lookup: &dyn ShadowLookup,
) -> Vector3<f32> {
    let view_dir = (Vector3::from(lighting.camera_position) - surface.position).normalize();
    let count = (lighting.light_count.max(0) as usize).min(MAX_LIGHTS);

    let mut lo = splat(0.0);
    for light in &lighting.lights[..count] {
        let contribution = light_contribution(light, surface, view_dir);
        let shadow = match light.shadow_index {
            index
                if surface.receive_shadows
                    && index >= 0
                    && (index as usize) < MAX_SHADOWS
                    && index < shadows.count =>
            {
                shadow_factor(&shadows.infos[index as usize], surface, lookup)
            }
            _ => 1.0,
        };
        lo += contribution * shadow;
    }

    let ambient = mul3(Vector3::from(lighting.ambient_color), surface.albedo) * surface.ao;
    ambient + lo + surface.emission
}

/// Reinhard operator `c / (c + 1)` per channel
pub fn reinhard(color: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(
        color.x / (color.x + 1.0),
        color.y / (color.y + 1.0),
        color.z / (color.z + 1.0),
    )
}

/// Exposure, Reinhard tone mapping and gamma encoding of a linear HDR color
pub fn tone_map(hdr: Vector3<f32>, exposure: f32, gamma: f32) -> Vector3<f32> {
    let exposed = Vector3::new(hdr.x.max(0.0), hdr.y.max(0.0), hdr.z.max(0.0)) * exposure.max(0.0);
    let mapped = reinhard(exposed);
    let inv_gamma = 1.0 / gamma.max(1e-3);
    Vector3::new(
        mapped.x.powf(inv_gamma),
        mapped.y.powf(inv_gamma),
        mapped.z.powf(inv_gamma),
    )
}
