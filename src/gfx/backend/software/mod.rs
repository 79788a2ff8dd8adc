//! # Software Device
//!
//! A CPU implementation of [`GraphicsDevice`]. It needs no adapter, so it is
//! the last entry of the default backend order and the device the test suite
//! renders with.
//!
//! Shader programs are executed by Rust kernels that mirror the embedded WGSL
//! entry points. The device still receives the WGSL source and checks that the
//! requested entry points exist, so pipeline setup fails the same way on both
//! backends.

mod kernels;
mod raster;
mod texture;

use std::collections::HashMap;

use slotmap::SlotMap;

use self::kernels::{Bindings, SoftBuffer, SoftDescriptorSet};
use self::raster::{ClipVertex, ColorTarget, RasterState, RenderTarget, VertexSource};
use self::texture::{quantize, SoftTexture, Texels};
use super::*;
use crate::gfx::error::{RenderError, RenderResult};
use crate::gfx::scene::vertex::Vertex3D;

#[derive(Debug)]
struct SoftShader {
    program: ShaderProgram,
    source: String,
}

#[derive(Debug, Clone)]
struct SoftRenderPass {
    color_formats: Vec<TextureFormat>,
    depth_format: Option<TextureFormat>,
    color_load: LoadOp,
    depth_load: LoadOp,
}

#[derive(Debug)]
struct SoftFramebuffer {
    render_pass: RenderPassHandle,
    color_attachments: Vec<TextureHandle>,
    depth_attachment: Option<TextureHandle>,
    width: u32,
    height: u32,
}

#[derive(Debug)]
struct SoftPipeline {
    program: ShaderProgram,
    vertex_input: VertexInput,
    set_layouts: Vec<DescriptorSetLayoutHandle>,
    render_pass: RenderPassHandle,
    state: RasterState,
}

/// CPU rasterizer implementing the full device interface
#[derive(Default)]
pub struct SoftwareDevice {
    buffers: SlotMap<BufferHandle, SoftBuffer>,
    textures: SlotMap<TextureHandle, SoftTexture>,
    samplers: SlotMap<SamplerHandle, SamplerDesc<'static>>,
    shaders: SlotMap<ShaderHandle, SoftShader>,
    layouts: SlotMap<DescriptorSetLayoutHandle, Vec<DescriptorBinding>>,
    sets: SlotMap<DescriptorSetHandle, SoftDescriptorSet>,
    render_passes: SlotMap<RenderPassHandle, SoftRenderPass>,
    framebuffers: SlotMap<FramebufferHandle, SoftFramebuffer>,
    pipelines: SlotMap<PipelineHandle, SoftPipeline>,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        log::debug!("Created software graphics device");
        Self::default()
    }

    fn texture(&self, texture: TextureHandle) -> RenderResult<&SoftTexture> {
        self.textures
            .get(texture)
            .ok_or(RenderError::InvalidHandle("texture"))
    }

    fn texture_mut(&mut self, texture: TextureHandle) -> RenderResult<&mut SoftTexture> {
        self.textures
            .get_mut(texture)
            .ok_or(RenderError::InvalidHandle("texture"))
    }

    /// Checks every texture the pass samples against the attachments it writes
    fn validate_sampled_textures(
        &self,
        pass: &PassRecording,
        attachments: &[TextureHandle],
    ) -> RenderResult<()> {
        for draw in &pass.draws {
            for set_handle in &draw.descriptor_sets {
                let set = self
                    .sets
                    .get(*set_handle)
                    .ok_or(RenderError::InvalidHandle("descriptor set"))?;
                for resource in set.resources.values() {
                    let DescriptorResource::Texture(handle) = resource else {
                        continue;
                    };
                    if attachments.contains(handle) {
                        return Err(RenderError::InvalidState(format!(
                            "pass '{}' samples a texture it also renders to",
                            pass.label
                        )));
                    }
                    let texture = self.texture(*handle)?;
                    if texture.state != TextureState::ShaderRead {
                        return Err(RenderError::InvalidState(format!(
                            "pass '{}' samples a texture in state {:?}",
                            pass.label, texture.state
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn fetch_vertices(&self, buffer: Option<BufferHandle>) -> RenderResult<Vec<Vertex3D>> {
        let handle = buffer.ok_or_else(|| {
            RenderError::InvalidState("mesh pipeline drawn without a vertex buffer".to_string())
        })?;
        let buffer = self
            .buffers
            .get(handle)
            .ok_or(RenderError::InvalidHandle("buffer"))?;
        let stride = std::mem::size_of::<Vertex3D>();
        Ok(buffer
            .data
            .chunks_exact(stride)
            .map(bytemuck::pod_read_unaligned::<Vertex3D>)
            .collect())
    }

    fn fetch_indices(&self, buffer: Option<BufferHandle>, count: u32) -> RenderResult<Vec<u32>> {
        let Some(handle) = buffer else {
            return Ok((0..count).collect());
        };
        let buffer = self
            .buffers
            .get(handle)
            .ok_or(RenderError::InvalidHandle("buffer"))?;
        let needed = count as usize * 4;
        if buffer.data.len() < needed {
            return Err(RenderError::InvalidState(format!(
                "index buffer holds {} bytes, draw needs {}",
                buffer.data.len(),
                needed
            )));
        }
        Ok(buffer.data[..needed]
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn run_draw(&self, draw: &DrawCall, pass: &SoftRenderPass, target: &mut RenderTarget) -> RenderResult<usize> {
        let pipeline = self
            .pipelines
            .get(draw.pipeline)
            .ok_or(RenderError::InvalidHandle("pipeline"))?;
        let pipeline_pass = self
            .render_passes
            .get(pipeline.render_pass)
            .ok_or(RenderError::InvalidHandle("render pass"))?;
        if pipeline_pass.color_formats != pass.color_formats
            || pipeline_pass.depth_format != pass.depth_format
        {
            return Err(RenderError::InvalidState(
                "pipeline was built for an incompatible render pass".to_string(),
            ));
        }
        if draw.descriptor_sets.len() < pipeline.set_layouts.len() {
            return Err(RenderError::InvalidState(format!(
                "pipeline expects {} descriptor sets, draw binds {}",
                pipeline.set_layouts.len(),
                draw.descriptor_sets.len()
            )));
        }

        let mut sets = Vec::with_capacity(draw.descriptor_sets.len());
        for (index, handle) in draw.descriptor_sets.iter().enumerate() {
            let set = self
                .sets
                .get(*handle)
                .ok_or(RenderError::InvalidHandle("descriptor set"))?;
            if pipeline.set_layouts.get(index).is_some_and(|layout| *layout != set.layout) {
                return Err(RenderError::InvalidState(format!(
                    "descriptor set {} does not match the pipeline layout",
                    index
                )));
            }
            sets.push(set);
        }
        let bindings = Bindings {
            sets,
            buffers: &self.buffers,
            textures: &self.textures,
        };
        let kernel = kernels::prepare(pipeline.program, &bindings)?;

        let indices = self.fetch_indices(draw.index_buffer, draw.count)?;
        let clip: Vec<ClipVertex> = match pipeline.vertex_input {
            VertexInput::Mesh => {
                let vertices = self.fetch_vertices(draw.vertex_buffer)?;
                let transformed: Vec<ClipVertex> = vertices
                    .iter()
                    .map(|v| kernel.vertex(VertexSource::Mesh(v)))
                    .collect();
                indices
                    .iter()
                    .map(|&i| {
                        transformed.get(i as usize).copied().ok_or_else(|| {
                            RenderError::InvalidState(format!("vertex index {} out of range", i))
                        })
                    })
                    .collect::<RenderResult<_>>()?
            }
            VertexInput::None => indices
                .iter()
                .map(|&i| kernel.vertex(VertexSource::Index(i)))
                .collect(),
        };

        let mut shaded = 0;
        for triangle in clip.chunks_exact(3) {
            shaded += raster::draw_triangle(
                kernel.as_ref(),
                [triangle[0], triangle[1], triangle[2]],
                &pipeline.state,
                target,
            );
        }
        Ok(shaded)
    }
}

fn check_color_attachment_format(
    pass: &SoftRenderPass,
    index: usize,
    format: TextureFormat,
) -> RenderResult<()> {
    match pass.color_formats.get(index) {
        Some(expected) if *expected == format => Ok(()),
        expected => Err(RenderError::ResourceCreation(format!(
            "color attachment {} is {:?}, render pass expects {:?}",
            index, format, expected
        ))),
    }
}

impl GraphicsDevice for SoftwareDevice {
    fn backend_name(&self) -> &'static str {
        "software"
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> RenderResult<BufferHandle> {
        if desc.size == 0 {
            return Err(RenderError::ResourceCreation(format!(
                "buffer '{}' has zero size",
                desc.label
            )));
        }
        Ok(self.buffers.insert(SoftBuffer {
            data: vec![0; desc.size as usize],
            usage: desc.usage,
            memory: desc.memory,
        }))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> RenderResult<()> {
        let buffer = self
            .buffers
            .get_mut(buffer)
            .ok_or(RenderError::InvalidHandle("buffer"))?;
        if !buffer.memory.contains(MemoryProperties::HOST_VISIBLE)
            && !buffer.usage.contains(BufferUsage::TRANSFER_DST)
        {
            return Err(RenderError::InvalidState(
                "buffer is neither host visible nor a transfer destination".to_string(),
            ));
        }
        let start = offset as usize;
        let end = start + data.len();
        if end > buffer.data.len() {
            return Err(RenderError::InvalidState(format!(
                "write of {} bytes at offset {} overflows buffer of {} bytes",
                data.len(),
                offset,
                buffer.data.len()
            )));
        }
        buffer.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn copy_buffer_to_buffer(
        &mut self,
        src: BufferHandle,
        dst: BufferHandle,
        size: u64,
    ) -> RenderResult<()> {
        let [from, to] = self
            .buffers
            .get_disjoint_mut([src, dst])
            .ok_or(RenderError::InvalidHandle("buffer"))?;
        if !from.usage.contains(BufferUsage::TRANSFER_SRC)
            || !to.usage.contains(BufferUsage::TRANSFER_DST)
        {
            return Err(RenderError::InvalidState(
                "buffer copy requires TRANSFER_SRC and TRANSFER_DST usage".to_string(),
            ));
        }
        let size = size as usize;
        if size > from.data.len() || size > to.data.len() {
            return Err(RenderError::InvalidState(format!(
                "copy of {} bytes exceeds buffer bounds",
                size
            )));
        }
        to.data[..size].copy_from_slice(&from.data[..size]);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> bool {
        self.buffers.remove(buffer).is_some()
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::InvalidSize {
                width: desc.width,
                height: desc.height,
            });
        }
        let layers_ok = match desc.dimension {
            TextureDimension::D2 => desc.layers == 1,
            TextureDimension::Cube => desc.layers == 6,
            TextureDimension::D2Array => desc.layers >= 1,
            TextureDimension::CubeArray => desc.layers >= 6 && desc.layers % 6 == 0,
        };
        if !layers_ok {
            return Err(RenderError::ResourceCreation(format!(
                "texture '{}' has {} layers, invalid for {:?}",
                desc.label, desc.layers, desc.dimension
            )));
        }
        Ok(self.textures.insert(SoftTexture::new(desc)))
    }

    fn write_texture(&mut self, texture: TextureHandle, layer: u32, data: &[u8]) -> RenderResult<()> {
        let texture = self.texture_mut(texture)?;
        if !texture.usage.contains(TextureUsage::TRANSFER_DST) {
            return Err(RenderError::InvalidState(
                "texture upload requires TRANSFER_DST usage".to_string(),
            ));
        }
        texture.write_layer(layer, data)?;
        texture.state = TextureState::TransferDst;
        Ok(())
    }

    fn read_texture(&mut self, texture: TextureHandle, layer: u32) -> RenderResult<Vec<u8>> {
        let texture = self.texture(texture)?;
        if !texture.usage.contains(TextureUsage::TRANSFER_SRC) {
            return Err(RenderError::Readback(
                "texture was not created with TRANSFER_SRC usage".to_string(),
            ));
        }
        texture.read_layer(layer)
    }

    fn copy_texture_to_array_layer(
        &mut self,
        src: TextureHandle,
        dst: TextureHandle,
        layer: u32,
    ) -> RenderResult<()> {
        let [from, to] = self
            .textures
            .get_disjoint_mut([src, dst])
            .ok_or(RenderError::InvalidHandle("texture"))?;
        if !from.usage.contains(TextureUsage::TRANSFER_SRC)
            || !to.usage.contains(TextureUsage::TRANSFER_DST)
        {
            return Err(RenderError::InvalidState(
                "texture copy requires TRANSFER_SRC and TRANSFER_DST usage".to_string(),
            ));
        }
        to.copy_layer_from(from, layer)?;
        to.state = TextureState::TransferDst;
        Ok(())
    }

    fn transition_for_sampling(&mut self, texture: TextureHandle) -> RenderResult<()> {
        let texture = self.texture_mut(texture)?;
        if !texture.usage.contains(TextureUsage::SAMPLED) {
            return Err(RenderError::InvalidState(
                "texture was not created with SAMPLED usage".to_string(),
            ));
        }
        texture.state = TextureState::ShaderRead;
        Ok(())
    }

    fn texture_state(&self, texture: TextureHandle) -> Option<TextureState> {
        self.textures.get(texture).map(|t| t.state)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> bool {
        self.textures.remove(texture).is_some()
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> RenderResult<SamplerHandle> {
        Ok(self.samplers.insert(SamplerDesc {
            label: "sampler",
            filter: desc.filter,
            address: desc.address,
            compare: desc.compare,
        }))
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) -> bool {
        self.samplers.remove(sampler).is_some()
    }

    fn create_shader(&mut self, source: &ShaderSource) -> RenderResult<ShaderHandle> {
        if source.wgsl.trim().is_empty() {
            return Err(RenderError::ShaderCompilation(format!(
                "shader '{}' is empty",
                source.label
            )));
        }
        Ok(self.shaders.insert(SoftShader {
            program: source.program,
            source: source.wgsl.to_string(),
        }))
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) -> bool {
        self.shaders.remove(shader).is_some()
    }

    fn create_descriptor_set_layout(
        &mut self,
        desc: &DescriptorSetLayoutDesc,
    ) -> RenderResult<DescriptorSetLayoutHandle> {
        Ok(self.layouts.insert(desc.bindings.clone()))
    }

    fn destroy_descriptor_set_layout(&mut self, layout: DescriptorSetLayoutHandle) -> bool {
        self.layouts.remove(layout).is_some()
    }

    fn create_descriptor_set(
        &mut self,
        layout: DescriptorSetLayoutHandle,
    ) -> RenderResult<DescriptorSetHandle> {
        let bindings = self
            .layouts
            .get(layout)
            .ok_or(RenderError::InvalidHandle("descriptor set layout"))?
            .clone();
        Ok(self.sets.insert(SoftDescriptorSet {
            layout,
            bindings,
            resources: HashMap::new(),
        }))
    }

    fn update_descriptor_set(
        &mut self,
        set: DescriptorSetHandle,
        writes: &[DescriptorWrite],
    ) -> RenderResult<()> {
        let descriptor_set = self
            .sets
            .get(set)
            .ok_or(RenderError::InvalidHandle("descriptor set"))?;
        for write in writes {
            let binding = descriptor_set
                .bindings
                .iter()
                .find(|b| b.binding == write.binding)
                .ok_or_else(|| {
                    RenderError::InvalidState(format!("layout has no binding {}", write.binding))
                })?;
            match (binding.kind, write.resource) {
                (DescriptorKind::UniformBuffer, DescriptorResource::Buffer(handle)) => {
                    let buffer = self
                        .buffers
                        .get(handle)
                        .ok_or(RenderError::InvalidHandle("buffer"))?;
                    if !buffer.usage.contains(BufferUsage::UNIFORM) {
                        return Err(RenderError::InvalidState(
                            "bound buffer lacks UNIFORM usage".to_string(),
                        ));
                    }
                }
                (DescriptorKind::Texture { .. }, DescriptorResource::Texture(handle)) => {
                    if !self.texture(handle)?.usage.contains(TextureUsage::SAMPLED) {
                        return Err(RenderError::InvalidState(
                            "bound texture lacks SAMPLED usage".to_string(),
                        ));
                    }
                }
                (DescriptorKind::Sampler { .. }, DescriptorResource::Sampler(handle)) => {
                    if !self.samplers.contains_key(handle) {
                        return Err(RenderError::InvalidHandle("sampler"));
                    }
                }
                (kind, resource) => {
                    return Err(RenderError::InvalidState(format!(
                        "binding {} expects {:?}, got {:?}",
                        write.binding, kind, resource
                    )))
                }
            }
        }
        if let Some(descriptor_set) = self.sets.get_mut(set) {
            for write in writes {
                descriptor_set.resources.insert(write.binding, write.resource);
            }
        }
        Ok(())
    }

    fn destroy_descriptor_set(&mut self, set: DescriptorSetHandle) -> bool {
        self.sets.remove(set).is_some()
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> RenderResult<RenderPassHandle> {
        if desc.color_formats.iter().any(|f| f.is_depth()) {
            return Err(RenderError::ResourceCreation(
                "depth format used as a color attachment".to_string(),
            ));
        }
        if desc.depth_format.is_some_and(|f| !f.is_depth()) {
            return Err(RenderError::ResourceCreation(
                "color format used as the depth attachment".to_string(),
            ));
        }
        Ok(self.render_passes.insert(SoftRenderPass {
            color_formats: desc.color_formats.clone(),
            depth_format: desc.depth_format,
            color_load: desc.color_load,
            depth_load: desc.depth_load,
        }))
    }

    fn destroy_render_pass(&mut self, pass: RenderPassHandle) -> bool {
        self.render_passes.remove(pass).is_some()
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> RenderResult<FramebufferHandle> {
        let pass = self
            .render_passes
            .get(desc.render_pass)
            .ok_or(RenderError::InvalidHandle("render pass"))?;
        if desc.color_attachments.len() != pass.color_formats.len() {
            return Err(RenderError::ResourceCreation(format!(
                "framebuffer '{}' has {} color attachments, render pass expects {}",
                desc.label,
                desc.color_attachments.len(),
                pass.color_formats.len()
            )));
        }
        let attachments = desc
            .color_attachments
            .iter()
            .copied()
            .map(|t| (t, false))
            .chain(desc.depth_attachment.map(|t| (t, true)));
        for (index, (handle, is_depth)) in attachments.enumerate() {
            let texture = self.texture(handle)?;
            if texture.width != desc.width || texture.height != desc.height || texture.layers != 1 {
                return Err(RenderError::ResourceCreation(format!(
                    "attachment of framebuffer '{}' is not a single {}x{} layer",
                    desc.label, desc.width, desc.height
                )));
            }
            if !texture.usage.contains(TextureUsage::RENDER_TARGET) {
                return Err(RenderError::ResourceCreation(
                    "attachment lacks RENDER_TARGET usage".to_string(),
                ));
            }
            if is_depth {
                if pass.depth_format != Some(texture.format) {
                    return Err(RenderError::ResourceCreation(
                        "depth attachment does not match the render pass".to_string(),
                    ));
                }
            } else {
                check_color_attachment_format(pass, index, texture.format)?;
            }
        }
        if desc.depth_attachment.is_none() && pass.depth_format.is_some() {
            return Err(RenderError::ResourceCreation(
                "render pass expects a depth attachment".to_string(),
            ));
        }
        Ok(self.framebuffers.insert(SoftFramebuffer {
            render_pass: desc.render_pass,
            color_attachments: desc.color_attachments.clone(),
            depth_attachment: desc.depth_attachment,
            width: desc.width,
            height: desc.height,
        }))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) -> bool {
        self.framebuffers.remove(framebuffer).is_some()
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> RenderResult<PipelineHandle> {
        let shader = self
            .shaders
            .get(desc.shader)
            .ok_or(RenderError::InvalidHandle("shader"))?;
        for entry in std::iter::once(desc.vertex_entry).chain(desc.fragment_entry) {
            if !shader.source.contains(&format!("fn {}(", entry)) {
                return Err(RenderError::ShaderCompilation(format!(
                    "pipeline '{}' references missing entry point '{}'",
                    desc.label, entry
                )));
            }
        }
        if !self.render_passes.contains_key(desc.render_pass) {
            return Err(RenderError::InvalidHandle("render pass"));
        }
        if desc.set_layouts.iter().any(|l| !self.layouts.contains_key(*l)) {
            return Err(RenderError::InvalidHandle("descriptor set layout"));
        }
        let program = shader.program;
        Ok(self.pipelines.insert(SoftPipeline {
            program,
            vertex_input: desc.vertex_input,
            set_layouts: desc.set_layouts.clone(),
            render_pass: desc.render_pass,
            state: RasterState {
                cull_mode: desc.cull_mode,
                depth: desc.depth,
                blend: desc.blend,
            },
        }))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) -> bool {
        self.pipelines.remove(pipeline).is_some()
    }

    fn execute_pass(&mut self, pass: &PassRecording) -> RenderResult<()> {
        let framebuffer = self
            .framebuffers
            .get(pass.framebuffer)
            .ok_or(RenderError::InvalidHandle("framebuffer"))?;
        let render_pass = self
            .render_passes
            .get(framebuffer.render_pass)
            .ok_or(RenderError::InvalidHandle("render pass"))?
            .clone();
        let (width, height) = (framebuffer.width, framebuffer.height);
        let color_handles = framebuffer.color_attachments.clone();
        let depth_handle = framebuffer.depth_attachment;

        let attachments: Vec<TextureHandle> =
            color_handles.iter().copied().chain(depth_handle).collect();
        for handle in &attachments {
            self.texture(*handle)?;
        }
        self.validate_sampled_textures(pass, &attachments)?;

        // Attachment texels move out of the slotmap for the duration of the pass
        let mut color_texels = Vec::with_capacity(color_handles.len());
        for handle in &color_handles {
            let texture = self.texture_mut(*handle)?;
            let format = texture.format;
            match texture.texels.take() {
                Texels::Color(data) => color_texels.push((data, format)),
                Texels::Depth(_) => {
                    return Err(RenderError::InvalidState(
                        "depth texture bound as a color attachment".to_string(),
                    ))
                }
            }
        }
        let mut depth_texels = match depth_handle {
            Some(handle) => match self.texture_mut(handle)?.texels.take() {
                Texels::Depth(data) => Some(data),
                Texels::Color(_) => None,
            },
            None => None,
        };

        if render_pass.color_load == LoadOp::Clear {
            for (index, (data, format)) in color_texels.iter_mut().enumerate() {
                let clear = pass.clear_colors.get(index).copied().unwrap_or([0.0; 4]);
                data.fill(quantize(*format, clear));
            }
        }
        if render_pass.depth_load == LoadOp::Clear {
            if let Some(depth) = depth_texels.as_mut() {
                depth.fill(pass.clear_depth);
            }
        }

        let result = {
            let mut target = RenderTarget {
                width,
                height,
                colors: color_texels
                    .iter_mut()
                    .map(|(texels, format)| ColorTarget {
                        texels: texels.as_mut_slice(),
                        format: *format,
                    })
                    .collect(),
                depth: depth_texels.as_deref_mut(),
            };
            let mut shaded = 0;
            let mut outcome = Ok(());
            for draw in &pass.draws {
                match self.run_draw(draw, &render_pass, &mut target) {
                    Ok(count) => shaded += count,
                    Err(err) => {
                        outcome = Err(err);
                        break;
                    }
                }
            }
            log::trace!("Pass '{}' shaded {} fragments", pass.label, shaded);
            outcome
        };

        for (handle, (data, _)) in color_handles.iter().zip(color_texels) {
            let texture = self.texture_mut(*handle)?;
            texture.texels = Texels::Color(data);
            texture.state = TextureState::RenderTarget;
        }
        if let (Some(handle), Some(data)) = (depth_handle, depth_texels) {
            let texture = self.texture_mut(handle)?;
            texture.texels = Texels::Depth(data);
            texture.state = TextureState::RenderTarget;
        }
        result
    }

    fn wait_idle(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn live_handle_count(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.samplers.len()
            + self.shaders.len()
            + self.layouts.len()
            + self.sets.len()
            + self.render_passes.len()
            + self.framebuffers.len()
            + self.pipelines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_target(device: &mut SoftwareDevice, usage: TextureUsage) -> TextureHandle {
        device
            .create_texture(&TextureDesc::d2("target", 4, 4, TextureFormat::Rgba8Unorm, usage))
            .unwrap()
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut device = SoftwareDevice::new();
        let buffer = device
            .create_buffer(&BufferDesc {
                label: "b",
                size: 16,
                usage: BufferUsage::UNIFORM,
                memory: MemoryProperties::HOST_SHARED,
            })
            .unwrap();
        assert_eq!(device.live_handle_count(), 1);
        assert!(device.destroy_buffer(buffer));
        assert!(!device.destroy_buffer(buffer));
        assert_eq!(device.live_handle_count(), 0);
        assert_eq!(
            device.write_buffer(buffer, 0, &[0; 4]),
            Err(RenderError::InvalidHandle("buffer"))
        );
    }

    #[test]
    fn test_buffer_write_bounds_checked() {
        let mut device = SoftwareDevice::new();
        let buffer = device
            .create_buffer(&BufferDesc {
                label: "b",
                size: 8,
                usage: BufferUsage::UNIFORM,
                memory: MemoryProperties::HOST_SHARED,
            })
            .unwrap();
        assert!(device.write_buffer(buffer, 4, &[1; 4]).is_ok());
        assert!(matches!(
            device.write_buffer(buffer, 6, &[1; 4]),
            Err(RenderError::InvalidState(_))
        ));
    }

    #[test]
    fn test_texture_state_transitions() {
        let mut device = SoftwareDevice::new();
        let texture = color_target(
            &mut device,
            TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST | TextureUsage::TRANSFER_SRC,
        );
        assert_eq!(device.texture_state(texture), Some(TextureState::Undefined));
        device.write_texture(texture, 0, &[255; 64]).unwrap();
        assert_eq!(device.texture_state(texture), Some(TextureState::TransferDst));
        device.transition_for_sampling(texture).unwrap();
        assert_eq!(device.texture_state(texture), Some(TextureState::ShaderRead));
        assert_eq!(device.read_texture(texture, 0).unwrap(), vec![255; 64]);
    }

    #[test]
    fn test_framebuffer_rejects_mismatched_attachment() {
        let mut device = SoftwareDevice::new();
        let pass = device
            .create_render_pass(&RenderPassDesc {
                label: "p",
                color_formats: vec![TextureFormat::Rgba16Float],
                depth_format: None,
                color_load: LoadOp::Clear,
                depth_load: LoadOp::Clear,
            })
            .unwrap();
        let texture = color_target(&mut device, TextureUsage::RENDER_TARGET);
        let result = device.create_framebuffer(&FramebufferDesc {
            label: "fb",
            render_pass: pass,
            color_attachments: vec![texture],
            depth_attachment: None,
            width: 4,
            height: 4,
        });
        assert!(matches!(result, Err(RenderError::ResourceCreation(_))));
    }

    #[test]
    fn test_empty_pass_clears_attachments() {
        let mut device = SoftwareDevice::new();
        let pass = device
            .create_render_pass(&RenderPassDesc {
                label: "p",
                color_formats: vec![TextureFormat::Rgba8Unorm],
                depth_format: None,
                color_load: LoadOp::Clear,
                depth_load: LoadOp::Clear,
            })
            .unwrap();
        let texture = color_target(&mut device, TextureUsage::RENDER_TARGET | TextureUsage::TRANSFER_SRC);
        let framebuffer = device
            .create_framebuffer(&FramebufferDesc {
                label: "fb",
                render_pass: pass,
                color_attachments: vec![texture],
                depth_attachment: None,
                width: 4,
                height: 4,
            })
            .unwrap();
        device
            .execute_pass(
                &PassRecording::new("clear", framebuffer).with_clear_colors(vec![[1.0, 0.0, 0.0, 1.0]]),
            )
            .unwrap();
        let pixels = device.read_texture(texture, 0).unwrap();
        assert_eq!(&pixels[..4], &[255, 0, 0, 255]);
        assert_eq!(device.texture_state(texture), Some(TextureState::RenderTarget));
    }

    #[test]
    fn test_pipeline_requires_entry_points() {
        let mut device = SoftwareDevice::new();
        let shader = device
            .create_shader(&ShaderSource {
                label: "s",
                program: ShaderProgram::PostProcess,
                wgsl: "@vertex fn vs_main() {}",
            })
            .unwrap();
        let pass = device
            .create_render_pass(&RenderPassDesc {
                label: "p",
                color_formats: vec![TextureFormat::Rgba8Unorm],
                depth_format: None,
                color_load: LoadOp::Clear,
                depth_load: LoadOp::Clear,
            })
            .unwrap();
        let result = device.create_pipeline(&PipelineDesc {
            label: "post",
            shader,
            vertex_entry: "vs_main",
            fragment_entry: Some("fs_main"),
            vertex_input: VertexInput::None,
            set_layouts: Vec::new(),
            render_pass: pass,
            cull_mode: CullMode::None,
            depth: DepthState::DISABLED,
            blend: BlendMode::Replace,
        });
        assert!(matches!(result, Err(RenderError::ShaderCompilation(_))));
    }
}
