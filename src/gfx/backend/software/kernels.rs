//! CPU kernels for the embedded shader programs
//!
//! Each kernel reads the same bindings and produces the same outputs as the
//! WGSL entry points in `src/gfx/shaders`, so the software device renders the
//! frame the GPU would.

use std::collections::HashMap;

use bytemuck::Pod;
use cgmath::{InnerSpace, Matrix4, Vector3, Vector4};
use slotmap::SlotMap;

use super::raster::{ClipVertex, FragmentInput, FragmentOutput, Kernel, VertexSource, MAX_COLOR_TARGETS};
use super::texture::SoftTexture;
use crate::gfx::backend::{
    BufferHandle, DescriptorBinding, DescriptorResource, ShaderProgram, TextureHandle,
};
use crate::gfx::error::{RenderError, RenderResult};
use crate::gfx::resources::uniforms::{
    LightingUniforms, MaterialUniforms, ObjectUniforms, PostProcessUniforms, ShadowUniforms,
    ShadowViewUniforms,
};
use crate::gfx::shading::{self, ShadowLookup, SurfaceSample};

#[derive(Debug)]
pub(crate) struct SoftBuffer {
    pub data: Vec<u8>,
    pub usage: crate::gfx::backend::BufferUsage,
    pub memory: crate::gfx::backend::MemoryProperties,
}

#[derive(Debug)]
pub(crate) struct SoftDescriptorSet {
    pub layout: crate::gfx::backend::DescriptorSetLayoutHandle,
    pub bindings: Vec<DescriptorBinding>,
    pub resources: HashMap<u32, DescriptorResource>,
}

/// Resources visible to one draw call
pub(crate) struct Bindings<'a> {
    pub sets: Vec<&'a SoftDescriptorSet>,
    pub buffers: &'a SlotMap<BufferHandle, SoftBuffer>,
    pub textures: &'a SlotMap<TextureHandle, SoftTexture>,
}

impl<'a> Bindings<'a> {
    fn resource(&self, set: usize, binding: u32) -> RenderResult<DescriptorResource> {
        let descriptor_set = self.sets.get(set).ok_or_else(|| {
            RenderError::InvalidState(format!("descriptor set {} is not bound", set))
        })?;
        descriptor_set.resources.get(&binding).copied().ok_or_else(|| {
            RenderError::InvalidState(format!("set {} binding {} was never written", set, binding))
        })
    }

    fn uniform<T: Pod>(&self, set: usize, binding: u32) -> RenderResult<T> {
        let DescriptorResource::Buffer(handle) = self.resource(set, binding)? else {
            return Err(RenderError::InvalidState(format!(
                "set {} binding {} is not a buffer",
                set, binding
            )));
        };
        let buffer = self
            .buffers
            .get(handle)
            .ok_or(RenderError::InvalidHandle("buffer"))?;
        let size = std::mem::size_of::<T>();
        if buffer.data.len() < size {
            return Err(RenderError::InvalidState(format!(
                "uniform buffer holds {} bytes, shader expects {}",
                buffer.data.len(),
                size
            )));
        }
        Ok(bytemuck::pod_read_unaligned(&buffer.data[..size]))
    }

    fn texture(&self, set: usize, binding: u32) -> RenderResult<&'a SoftTexture> {
        let DescriptorResource::Texture(handle) = self.resource(set, binding)? else {
            return Err(RenderError::InvalidState(format!(
                "set {} binding {} is not a texture",
                set, binding
            )));
        };
        self.textures
            .get(handle)
            .ok_or(RenderError::InvalidHandle("texture"))
    }
}

/// Builds the kernel for `program` with its uniforms resolved once per draw
pub(crate) fn prepare<'a>(
    program: ShaderProgram,
    bindings: &Bindings<'a>,
) -> RenderResult<Box<dyn Kernel + 'a>> {
    Ok(match program {
        ShaderProgram::ShadowDepth => {
            let view: ShadowViewUniforms = bindings.uniform(0, 0)?;
            let object: ObjectUniforms = bindings.uniform(1, 0)?;
            Box::new(ShadowDepthKernel {
                transform: Matrix4::from(view.light_view_proj) * Matrix4::from(object.model),
            })
        }
        ShaderProgram::PointShadowDepth => {
            let view: ShadowViewUniforms = bindings.uniform(0, 0)?;
            let object: ObjectUniforms = bindings.uniform(1, 0)?;
            Box::new(PointShadowKernel {
                view_proj: Matrix4::from(view.light_view_proj),
                model: Matrix4::from(object.model),
                light_position: Vector3::from(view.light_position),
                far_plane: view.far_plane.max(1e-4),
            })
        }
        ShaderProgram::GeometryPass => Box::new(SurfaceKernel::new(bindings)?),
        ShaderProgram::Forward => {
            let surface = SurfaceKernel::new(bindings)?;
            Box::new(ForwardKernel {
                surface,
                scene: SceneLighting::new(bindings, 2)?,
            })
        }
        ShaderProgram::Lighting => Box::new(LightingKernel {
            position: bindings.texture(0, 0)?,
            normal_metallic: bindings.texture(0, 1)?,
            albedo_roughness: bindings.texture(0, 2)?,
            emission_ao: bindings.texture(0, 3)?,
            scene: SceneLighting::new(bindings, 1)?,
        }),
        ShaderProgram::PostProcess => Box::new(PostProcessKernel {
            hdr: bindings.texture(0, 0)?,
            params: bindings.uniform(0, 1)?,
        }),
    })
}

fn fullscreen_vertex(index: u32) -> ClipVertex {
    let u = ((index << 1) & 2) as f32;
    let v = (index & 2) as f32;
    let mut out = ClipVertex::new(Vector4::new(u * 2.0 - 1.0, 1.0 - v * 2.0, 0.0, 1.0));
    out.varyings[0] = u;
    out.varyings[1] = v;
    out
}

fn mesh_vertex(input: VertexSource) -> ([f32; 3], [f32; 3], [f32; 2]) {
    match input {
        VertexSource::Mesh(vertex) => (vertex.position, vertex.normal, vertex.tex_coord),
        VertexSource::Index(_) => ([0.0; 3], [0.0, 1.0, 0.0], [0.0; 2]),
    }
}

struct ShadowDepthKernel {
    transform: Matrix4<f32>,
}

impl Kernel for ShadowDepthKernel {
    fn vertex(&self, input: VertexSource) -> ClipVertex {
        let (position, _, _) = mesh_vertex(input);
        ClipVertex::new(self.transform * Vector3::from(position).extend(1.0))
    }

    fn fragment(&self, _input: &FragmentInput) -> Option<FragmentOutput> {
        Some(FragmentOutput::depth_only(None))
    }
}

struct PointShadowKernel {
    view_proj: Matrix4<f32>,
    model: Matrix4<f32>,
    light_position: Vector3<f32>,
    far_plane: f32,
}

impl Kernel for PointShadowKernel {
    fn vertex(&self, input: VertexSource) -> ClipVertex {
        let (position, _, _) = mesh_vertex(input);
        let world = self.model * Vector3::from(position).extend(1.0);
        let mut out = ClipVertex::new(self.view_proj * world);
        out.varyings[..3].copy_from_slice(&[world.x, world.y, world.z]);
        out
    }

    fn fragment(&self, input: &FragmentInput) -> Option<FragmentOutput> {
        let world = Vector3::new(input.varyings[0], input.varyings[1], input.varyings[2]);
        let distance = (world - self.light_position).magnitude();
        Some(FragmentOutput::depth_only(Some(
            (distance / self.far_plane).clamp(0.0, 1.0),
        )))
    }

    fn writes_depth(&self) -> bool {
        true
    }
}

/// G-buffer position alpha for surfaces that receive shadows; 0.75 for those that do not.
/// Anything below 0.5 is background.
const POSITION_ALPHA_RECEIVES: f32 = 1.0;
const POSITION_ALPHA_NO_SHADOWS: f32 = 0.75;
const POSITION_ALPHA_RECEIVE_THRESHOLD: f32 = 0.875;

/// Shared vertex stage and material evaluation of the geometry and forward programs
struct SurfaceKernel<'a> {
    model: Matrix4<f32>,
    receive_shadows: bool,
    view_proj: Matrix4<f32>,
    material: MaterialUniforms,
    albedo_texture: Option<&'a SoftTexture>,
}

impl<'a> SurfaceKernel<'a> {
    fn new(bindings: &Bindings<'a>) -> RenderResult<Self> {
        let object: ObjectUniforms = bindings.uniform(0, 0)?;
        let material: MaterialUniforms = bindings.uniform(1, 0)?;
        let albedo_texture = if material.has_albedo_texture > 0.5 {
            Some(bindings.texture(1, 1)?)
        } else {
            None
        };
        Ok(Self {
            model: Matrix4::from(object.model),
            receive_shadows: object.receive_shadows > 0.5,
            view_proj: Matrix4::from(object.projection) * Matrix4::from(object.view),
            material,
            albedo_texture,
        })
    }

    fn vertex(&self, input: VertexSource) -> ClipVertex {
        let (position, normal, tex_coord) = mesh_vertex(input);
        let world = self.model * Vector3::from(position).extend(1.0);
        let world_normal = (self.model * Vector3::from(normal).extend(0.0)).truncate();
        let mut out = ClipVertex::new(self.view_proj * world);
        out.varyings[..8].copy_from_slice(&[
            world.x,
            world.y,
            world.z,
            world_normal.x,
            world_normal.y,
            world_normal.z,
            tex_coord[0],
            tex_coord[1],
        ]);
        out
    }

    fn surface(&self, input: &FragmentInput) -> (SurfaceSample, f32) {
        let v = &input.varyings;
        let mut albedo = self.material.albedo;
        if let Some(texture) = self.albedo_texture {
            let texel = texture.sample_linear(0, [v[6], v[7]]);
            for i in 0..4 {
                albedo[i] *= texel[i];
            }
        }
        let normal = Vector3::new(v[3], v[4], v[5]);
        let normal = if normal.magnitude2() > 1e-12 {
            normal.normalize()
        } else {
            Vector3::unit_y()
        };
        let sample = SurfaceSample {
            position: Vector3::new(v[0], v[1], v[2]),
            normal,
            albedo: Vector3::new(albedo[0], albedo[1], albedo[2]),
            metallic: self.material.metallic,
            roughness: self.material.roughness.max(0.04),
            emission: Vector3::from(self.material.emission),
            ao: self.material.ao,
            receive_shadows: self.receive_shadows,
        };
        (sample, albedo[3])
    }
}

impl Kernel for SurfaceKernel<'_> {
    fn vertex(&self, input: VertexSource) -> ClipVertex {
        SurfaceKernel::vertex(self, input)
    }

    fn fragment(&self, input: &FragmentInput) -> Option<FragmentOutput> {
        let (s, _) = self.surface(input);
        let mut colors = [[0.0; 4]; MAX_COLOR_TARGETS];
        let marker = if s.receive_shadows {
            POSITION_ALPHA_RECEIVES
        } else {
            POSITION_ALPHA_NO_SHADOWS
        };
        colors[0] = [s.position.x, s.position.y, s.position.z, marker];
        colors[1] = [
            s.normal.x * 0.5 + 0.5,
            s.normal.y * 0.5 + 0.5,
            s.normal.z * 0.5 + 0.5,
            s.metallic,
        ];
        colors[2] = [s.albedo.x, s.albedo.y, s.albedo.z, self.material.roughness];
        colors[3] = [s.emission.x, s.emission.y, s.emission.z, s.ao];
        Some(FragmentOutput {
            colors,
            depth: None,
        })
    }
}

/// Lights, shadow records and shadow maps bound as one descriptor set
struct SceneLighting<'a> {
    lighting: LightingUniforms,
    shadows: ShadowUniforms,
    maps: SoftShadowMaps<'a>,
}

impl<'a> SceneLighting<'a> {
    fn new(bindings: &Bindings<'a>, set: usize) -> RenderResult<Self> {
        Ok(Self {
            lighting: bindings.uniform(set, 0)?,
            shadows: bindings.uniform(set, 1)?,
            maps: SoftShadowMaps {
                array: bindings.texture(set, 2)?,
                cube_array: bindings.texture(set, 3)?,
            },
        })
    }

    fn shade(&self, surface: &SurfaceSample) -> Vector3<f32> {
        shading::shade(surface, &self.lighting, &self.shadows, &self.maps)
    }
}

struct SoftShadowMaps<'a> {
    array: &'a SoftTexture,
    cube_array: &'a SoftTexture,
}

impl ShadowLookup for SoftShadowMaps<'_> {
    fn compare_2d(&self, layer: u32, uv: [f32; 2], reference: f32) -> f32 {
        self.array.compare(layer, uv, reference)
    }

    fn compare_cube(&self, layer: u32, uv: [f32; 2], reference: f32) -> f32 {
        self.cube_array.compare(layer, uv, reference)
    }
}

struct LightingKernel<'a> {
    position: &'a SoftTexture,
    normal_metallic: &'a SoftTexture,
    albedo_roughness: &'a SoftTexture,
    emission_ao: &'a SoftTexture,
    scene: SceneLighting<'a>,
}

impl Kernel for LightingKernel<'_> {
    fn vertex(&self, input: VertexSource) -> ClipVertex {
        match input {
            VertexSource::Index(index) => fullscreen_vertex(index),
            VertexSource::Mesh(_) => ClipVertex::new(Vector4::new(0.0, 0.0, 0.0, 1.0)),
        }
    }

    fn fragment(&self, input: &FragmentInput) -> Option<FragmentOutput> {
        let x = input.frag_coord[0].floor() as i32;
        let y = input.frag_coord[1].floor() as i32;
        let position = self.position.load(0, x, y);
        if position[3] < 0.5 {
            return None;
        }
        let normal_metallic = self.normal_metallic.load(0, x, y);
        let albedo_roughness = self.albedo_roughness.load(0, x, y);
        let emission_ao = self.emission_ao.load(0, x, y);

        let normal = Vector3::new(
            normal_metallic[0] * 2.0 - 1.0,
            normal_metallic[1] * 2.0 - 1.0,
            normal_metallic[2] * 2.0 - 1.0,
        );
        let surface = SurfaceSample {
            position: Vector3::new(position[0], position[1], position[2]),
            normal: if normal.magnitude2() > 1e-12 {
                normal.normalize()
            } else {
                Vector3::unit_y()
            },
            albedo: Vector3::new(albedo_roughness[0], albedo_roughness[1], albedo_roughness[2]),
            metallic: normal_metallic[3],
            roughness: albedo_roughness[3].max(0.04),
            emission: Vector3::new(emission_ao[0], emission_ao[1], emission_ao[2]),
            ao: emission_ao[3],
            receive_shadows: position[3] > POSITION_ALPHA_RECEIVE_THRESHOLD,
        };
        let color = self.scene.shade(&surface);
        Some(FragmentOutput::color([color.x, color.y, color.z, 1.0]))
    }
}

struct ForwardKernel<'a> {
    surface: SurfaceKernel<'a>,
    scene: SceneLighting<'a>,
}

impl Kernel for ForwardKernel<'_> {
    fn vertex(&self, input: VertexSource) -> ClipVertex {
        self.surface.vertex(input)
    }

    fn fragment(&self, input: &FragmentInput) -> Option<FragmentOutput> {
        let (surface, alpha) = self.surface.surface(input);
        let color = self.scene.shade(&surface);
        Some(FragmentOutput::color([color.x, color.y, color.z, alpha]))
    }
}

struct PostProcessKernel<'a> {
    hdr: &'a SoftTexture,
    params: PostProcessUniforms,
}

impl Kernel for PostProcessKernel<'_> {
    fn vertex(&self, input: VertexSource) -> ClipVertex {
        match input {
            VertexSource::Index(index) => fullscreen_vertex(index),
            VertexSource::Mesh(_) => ClipVertex::new(Vector4::new(0.0, 0.0, 0.0, 1.0)),
        }
    }

    fn fragment(&self, input: &FragmentInput) -> Option<FragmentOutput> {
        let x = input.frag_coord[0].floor() as i32;
        let y = input.frag_coord[1].floor() as i32;
        let hdr = self.hdr.load(0, x, y);
        let mapped = shading::tone_map(
            Vector3::new(hdr[0], hdr[1], hdr[2]),
            self.params.exposure,
            self.params.gamma,
        );
        let coverage = hdr[3].clamp(0.0, 1.0);
        let background = self.params.background;
        let mix = |bg: f32, fg: f32| bg + (fg - bg) * coverage;
        Some(FragmentOutput::color([
            mix(background[0], mapped.x),
            mix(background[1], mapped.y),
            mix(background[2], mapped.z),
            coverage + background[3] * (1.0 - coverage),
        ]))
    }
}
