//! # WGPU Device
//!
//! Native GPU implementation of [`GraphicsDevice`]. Construction requests a
//! headless adapter and reports `None` instead of panicking when no adapter
//! or device is available, which lets the backend factory fall back.
//!
//! Each [`PassRecording`] is encoded and submitted on its own, so queue writes
//! issued between two passes are ordered before the second one.

use std::collections::HashMap;

use slotmap::SlotMap;

use super::*;
use crate::gfx::error::{RenderError, RenderResult};
use crate::gfx::scene::vertex::Vertex3D;
use crate::wgpu_utils::binding_types;

struct GpuBuffer {
    buffer: wgpu::Buffer,
    size: u64,
    usage: BufferUsage,
    memory: MemoryProperties,
}

struct GpuTexture {
    texture: wgpu::Texture,
    width: u32,
    height: u32,
    layers: u32,
    format: TextureFormat,
    usage: TextureUsage,
    state: TextureState,
}

struct GpuLayout {
    layout: wgpu::BindGroupLayout,
    bindings: Vec<DescriptorBinding>,
}

struct GpuDescriptorSet {
    layout: DescriptorSetLayoutHandle,
    resources: HashMap<u32, DescriptorResource>,
    bind_group: Option<wgpu::BindGroup>,
}

#[derive(Clone)]
struct GpuRenderPass {
    color_formats: Vec<TextureFormat>,
    depth_format: Option<TextureFormat>,
    color_load: LoadOp,
    depth_load: LoadOp,
}

struct GpuFramebuffer {
    render_pass: RenderPassHandle,
    color_attachments: Vec<TextureHandle>,
    depth_attachment: Option<TextureHandle>,
    color_views: Vec<wgpu::TextureView>,
    depth_view: Option<wgpu::TextureView>,
}

struct GpuPipeline {
    pipeline: wgpu::RenderPipeline,
    vertex_input: VertexInput,
}

/// GPU device backed by wgpu
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    buffers: SlotMap<BufferHandle, GpuBuffer>,
    textures: SlotMap<TextureHandle, GpuTexture>,
    samplers: SlotMap<SamplerHandle, wgpu::Sampler>,
    shaders: SlotMap<ShaderHandle, wgpu::ShaderModule>,
    layouts: SlotMap<DescriptorSetLayoutHandle, GpuLayout>,
    sets: SlotMap<DescriptorSetHandle, GpuDescriptorSet>,
    render_passes: SlotMap<RenderPassHandle, GpuRenderPass>,
    framebuffers: SlotMap<FramebufferHandle, GpuFramebuffer>,
    pipelines: SlotMap<PipelineHandle, GpuPipeline>,
}

fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

fn buffer_usages(usage: BufferUsage, memory: MemoryProperties) -> wgpu::BufferUsages {
    let mut out = wgpu::BufferUsages::empty();
    if usage.contains(BufferUsage::VERTEX) {
        out |= wgpu::BufferUsages::VERTEX;
    }
    if usage.contains(BufferUsage::INDEX) {
        out |= wgpu::BufferUsages::INDEX;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        out |= wgpu::BufferUsages::UNIFORM;
    }
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        out |= wgpu::BufferUsages::COPY_SRC;
    }
    // Host writes go through the queue, which needs COPY_DST
    if usage.contains(BufferUsage::TRANSFER_DST) || memory.contains(MemoryProperties::HOST_VISIBLE) {
        out |= wgpu::BufferUsages::COPY_DST;
    }
    out
}

fn texture_usages(usage: TextureUsage) -> wgpu::TextureUsages {
    let mut out = wgpu::TextureUsages::empty();
    if usage.contains(TextureUsage::SAMPLED) {
        out |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.contains(TextureUsage::RENDER_TARGET) {
        out |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.contains(TextureUsage::TRANSFER_SRC) {
        out |= wgpu::TextureUsages::COPY_SRC;
    }
    if usage.contains(TextureUsage::TRANSFER_DST) {
        out |= wgpu::TextureUsages::COPY_DST;
    }
    out
}

fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(address: AddressMode) -> wgpu::AddressMode {
    match address {
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

fn shader_stages(stages: ShaderStages) -> wgpu::ShaderStages {
    let mut out = wgpu::ShaderStages::NONE;
    if stages.contains(ShaderStages::VERTEX) {
        out |= wgpu::ShaderStages::VERTEX;
    }
    if stages.contains(ShaderStages::FRAGMENT) {
        out |= wgpu::ShaderStages::FRAGMENT;
    }
    out
}

fn blend_state(blend: BlendMode) -> Option<wgpu::BlendState> {
    match blend {
        BlendMode::Replace => None,
        BlendMode::Alpha => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        }),
    }
}

/// Render target byte cost of the four G-buffer attachments
const GBUFFER_BYTES_PER_SAMPLE: u32 = 40;

/// Rounds a byte count up to wgpu's copy alignment
/// Error for a blocking poll that gave up before the queue drained
fn poll_failed(operation: &str, err: wgpu::PollError) -> RenderError {
    RenderError::Readback(format!("{} did not complete: {}", operation, err))
}

fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

impl WgpuDevice {
    /// Requests a headless adapter and device
    ///
    /// # Returns
    /// `None` when no adapter or device is available
    pub fn try_new() -> Option<Self> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Option<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(err) => {
                log::info!("No wgpu adapter available: {}", err);
                return None;
            }
        };

        let supported = adapter.limits();
        if supported.max_color_attachment_bytes_per_sample < GBUFFER_BYTES_PER_SAMPLE {
            log::info!(
                "wgpu adapter supports only {} color bytes per sample",
                supported.max_color_attachment_bytes_per_sample
            );
            return None;
        }

        let (device, queue) = match adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Prism3D Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: 4096,
                    max_color_attachment_bytes_per_sample: GBUFFER_BYTES_PER_SAMPLE,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
        {
            Ok(pair) => pair,
            Err(err) => {
                log::info!("wgpu device request failed: {}", err);
                return None;
            }
        };

        let adapter_name = adapter.get_info().name;
        log::info!("Created wgpu device on adapter '{}'", adapter_name);

        Some(Self {
            device,
            queue,
            adapter_name,
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            layouts: SlotMap::with_key(),
            sets: SlotMap::with_key(),
            render_passes: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn texture(&self, texture: TextureHandle) -> RenderResult<&GpuTexture> {
        self.textures
            .get(texture)
            .ok_or(RenderError::InvalidHandle("texture"))
    }

    /// Runs `f` inside a validation error scope and turns a captured error into `err`
    fn scoped<T>(&self, f: impl FnOnce() -> T, err: impl FnOnce(String) -> RenderError) -> RenderResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(err(error.to_string())),
            None => Ok(value),
        }
    }

    fn default_view(texture: &wgpu::Texture) -> wgpu::TextureView {
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Builds the bind group of a descriptor set if it is missing or stale
    fn ensure_bind_group(&mut self, set: DescriptorSetHandle) -> RenderResult<()> {
        let descriptor_set = self
            .sets
            .get(set)
            .ok_or(RenderError::InvalidHandle("descriptor set"))?;
        if descriptor_set.bind_group.is_some() {
            return Ok(());
        }
        let layout = self
            .layouts
            .get(descriptor_set.layout)
            .ok_or(RenderError::InvalidHandle("descriptor set layout"))?;

        enum Bound<'a> {
            Buffer(&'a wgpu::Buffer),
            View(wgpu::TextureView),
            Sampler(&'a wgpu::Sampler),
        }

        let mut bound = Vec::with_capacity(layout.bindings.len());
        for binding in &layout.bindings {
            let resource = descriptor_set.resources.get(&binding.binding).ok_or_else(|| {
                RenderError::InvalidState(format!("binding {} was never written", binding.binding))
            })?;
            let entry = match (*resource, binding.kind) {
                (DescriptorResource::Buffer(handle), _) => Bound::Buffer(
                    &self
                        .buffers
                        .get(handle)
                        .ok_or(RenderError::InvalidHandle("buffer"))?
                        .buffer,
                ),
                (DescriptorResource::Texture(handle), DescriptorKind::Texture { view, .. }) => {
                    let texture = self.texture(handle)?;
                    Bound::View(texture.texture.create_view(&wgpu::TextureViewDescriptor {
                        dimension: Some(binding_types::view_dimension(view)),
                        ..Default::default()
                    }))
                }
                (DescriptorResource::Sampler(handle), _) => Bound::Sampler(
                    self.samplers
                        .get(handle)
                        .ok_or(RenderError::InvalidHandle("sampler"))?,
                ),
                (DescriptorResource::Texture(_), kind) => {
                    return Err(RenderError::InvalidState(format!(
                        "texture written to {:?} binding",
                        kind
                    )))
                }
            };
            bound.push((binding.binding, entry));
        }

        let entries: Vec<wgpu::BindGroupEntry> = bound
            .iter()
            .map(|(binding, entry)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: match entry {
                    Bound::Buffer(buffer) => buffer.as_entire_binding(),
                    Bound::View(view) => wgpu::BindingResource::TextureView(view),
                    Bound::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler),
                },
            })
            .collect();

        let bind_group = self.scoped(
            || {
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Descriptor Set"),
                    layout: &layout.layout,
                    entries: &entries,
                })
            },
            RenderError::InvalidState,
        )?;
        drop(entries);
        drop(bound);

        if let Some(descriptor_set) = self.sets.get_mut(set) {
            descriptor_set.bind_group = Some(bind_group);
        }
        Ok(())
    }

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
                    let state = self.texture(*handle)?.state;
                    if state != TextureState::ShaderRead {
                        return Err(RenderError::InvalidState(format!(
                            "pass '{}' samples a texture in state {:?}",
                            pass.label, state
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl GraphicsDevice for WgpuDevice {
    fn backend_name(&self) -> &'static str {
        "wgpu"
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> RenderResult<BufferHandle> {
        if desc.size == 0 {
            return Err(RenderError::ResourceCreation(format!(
                "buffer '{}' has zero size",
                desc.label
            )));
        }
        let buffer = self.scoped(
            || {
                self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(desc.label),
                    size: align_to(desc.size, wgpu::COPY_BUFFER_ALIGNMENT),
                    usage: buffer_usages(desc.usage, desc.memory),
                    mapped_at_creation: false,
                })
            },
            RenderError::ResourceCreation,
        )?;
        Ok(self.buffers.insert(GpuBuffer {
            buffer,
            size: desc.size,
            usage: desc.usage,
            memory: desc.memory,
        }))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> RenderResult<()> {
        let buffer = self
            .buffers
            .get(buffer)
            .ok_or(RenderError::InvalidHandle("buffer"))?;
        if !buffer.memory.contains(MemoryProperties::HOST_VISIBLE)
            && !buffer.usage.contains(BufferUsage::TRANSFER_DST)
        {
            return Err(RenderError::InvalidState(
                "buffer is neither host visible nor a transfer destination".to_string(),
            ));
        }
        if offset + data.len() as u64 > buffer.size {
            return Err(RenderError::InvalidState(format!(
                "write of {} bytes at offset {} overflows buffer of {} bytes",
                data.len(),
                offset,
                buffer.size
            )));
        }
        if data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
            self.queue.write_buffer(&buffer.buffer, offset, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(align_to(data.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT) as usize, 0);
            self.queue.write_buffer(&buffer.buffer, offset, &padded);
        }
        Ok(())
    }

    fn copy_buffer_to_buffer(
        &mut self,
        src: BufferHandle,
        dst: BufferHandle,
        size: u64,
    ) -> RenderResult<()> {
        let from = self.buffers.get(src).ok_or(RenderError::InvalidHandle("buffer"))?;
        let to = self.buffers.get(dst).ok_or(RenderError::InvalidHandle("buffer"))?;
        if !from.usage.contains(BufferUsage::TRANSFER_SRC)
            || !to.usage.contains(BufferUsage::TRANSFER_DST)
        {
            return Err(RenderError::InvalidState(
                "buffer copy requires TRANSFER_SRC and TRANSFER_DST usage".to_string(),
            ));
        }
        if size > from.size || size > to.size {
            return Err(RenderError::InvalidState(format!(
                "copy of {} bytes exceeds buffer bounds",
                size
            )));
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Buffer Copy Encoder"),
            });
        encoder.copy_buffer_to_buffer(
            &from.buffer,
            0,
            &to.buffer,
            0,
            align_to(size, wgpu::COPY_BUFFER_ALIGNMENT),
        );
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> bool {
        match self.buffers.remove(buffer) {
            Some(gpu) => {
                gpu.buffer.destroy();
                true
            }
            None => false,
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::InvalidSize {
                width: desc.width,
                height: desc.height,
            });
        }
        let layers = desc.layers.max(1);
        let texture = self.scoped(
            || {
                self.device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(desc.label),
                    size: wgpu::Extent3d {
                        width: desc.width,
                        height: desc.height,
                        depth_or_array_layers: layers,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: texture_format(desc.format),
                    usage: texture_usages(desc.usage),
                    view_formats: &[],
                })
            },
            RenderError::ResourceCreation,
        )?;
        Ok(self.textures.insert(GpuTexture {
            texture,
            width: desc.width,
            height: desc.height,
            layers,
            format: desc.format,
            usage: desc.usage,
            state: TextureState::Undefined,
        }))
    }

    fn write_texture(&mut self, texture: TextureHandle, layer: u32, data: &[u8]) -> RenderResult<()> {
        let gpu = self
            .textures
            .get_mut(texture)
            .ok_or(RenderError::InvalidHandle("texture"))?;
        if !gpu.usage.contains(TextureUsage::TRANSFER_DST) {
            return Err(RenderError::InvalidState(
                "texture upload requires TRANSFER_DST usage".to_string(),
            ));
        }
        if layer >= gpu.layers {
            return Err(RenderError::InvalidState(format!("layer {} out of range", layer)));
        }
        let bytes_per_pixel = gpu.format.bytes_per_pixel();
        let expected = (gpu.width * gpu.height * bytes_per_pixel) as usize;
        if data.len() != expected {
            return Err(RenderError::ResourceCreation(format!(
                "texture upload expects {} bytes, got {}",
                expected,
                data.len()
            )));
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_pixel * gpu.width),
                rows_per_image: Some(gpu.height),
            },
            wgpu::Extent3d {
                width: gpu.width,
                height: gpu.height,
                depth_or_array_layers: 1,
            },
        );
        gpu.state = TextureState::TransferDst;
        Ok(())
    }

    fn read_texture(&mut self, texture: TextureHandle, layer: u32) -> RenderResult<Vec<u8>> {
        let gpu = self.texture(texture)?;
        if !gpu.usage.contains(TextureUsage::TRANSFER_SRC) {
            return Err(RenderError::Readback(
                "texture was not created with TRANSFER_SRC usage".to_string(),
            ));
        }
        if layer >= gpu.layers {
            return Err(RenderError::Readback(format!("layer {} out of range", layer)));
        }

        let bytes_per_pixel = gpu.format.bytes_per_pixel();
        let unpadded_row = bytes_per_pixel * gpu.width;
        let padded_row = align_to(unpadded_row as u64, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64) as u32;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging Buffer"),
            size: padded_row as u64 * gpu.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(gpu.height),
                },
            },
            wgpu::Extent3d {
                width: gpu.width,
                height: gpu.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        // the map callback only fires from a completed poll
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| poll_failed("texture readback", err))?;

        match futures::executor::block_on(rx) {
            Ok(Ok(())) => {
                let mapped = slice.get_mapped_range();
                let mut pixels = Vec::with_capacity((unpadded_row * gpu.height) as usize);
                for row in mapped.chunks(padded_row as usize) {
                    pixels.extend_from_slice(&row[..unpadded_row as usize]);
                }
                drop(mapped);
                staging.unmap();
                Ok(pixels)
            }
            Ok(Err(err)) => Err(RenderError::Readback(err.to_string())),
            Err(_) => Err(RenderError::Readback("map callback was dropped".to_string())),
        }
    }

    fn copy_texture_to_array_layer(
        &mut self,
        src: TextureHandle,
        dst: TextureHandle,
        layer: u32,
    ) -> RenderResult<()> {
        let from = self.texture(src)?;
        let to = self.texture(dst)?;
        if !from.usage.contains(TextureUsage::TRANSFER_SRC)
            || !to.usage.contains(TextureUsage::TRANSFER_DST)
        {
            return Err(RenderError::InvalidState(
                "texture copy requires TRANSFER_SRC and TRANSFER_DST usage".to_string(),
            ));
        }
        if from.width != to.width || from.height != to.height || from.format != to.format {
            return Err(RenderError::InvalidState(
                "copy source does not match destination".to_string(),
            ));
        }
        if layer >= to.layers {
            return Err(RenderError::InvalidState(format!("layer {} out of range", layer)));
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Layer Copy Encoder"),
            });
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &from.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &to.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: from.width,
                height: from.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(to) = self.textures.get_mut(dst) {
            to.state = TextureState::TransferDst;
        }
        Ok(())
    }

    fn transition_for_sampling(&mut self, texture: TextureHandle) -> RenderResult<()> {
        let gpu = self
            .textures
            .get_mut(texture)
            .ok_or(RenderError::InvalidHandle("texture"))?;
        if !gpu.usage.contains(TextureUsage::SAMPLED) {
            return Err(RenderError::InvalidState(
                "texture was not created with SAMPLED usage".to_string(),
            ));
        }
        // wgpu inserts the barrier itself; only the tracked state changes
        gpu.state = TextureState::ShaderRead;
        Ok(())
    }

    fn texture_state(&self, texture: TextureHandle) -> Option<TextureState> {
        self.textures.get(texture).map(|t| t.state)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> bool {
        match self.textures.remove(texture) {
            Some(gpu) => {
                gpu.texture.destroy();
                true
            }
            None => false,
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> RenderResult<SamplerHandle> {
        let filter = filter_mode(desc.filter);
        let address = address_mode(desc.address);
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(desc.label),
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: desc.compare.then_some(wgpu::CompareFunction::LessEqual),
            lod_min_clamp: 0.0,
            lod_max_clamp: 100.0,
            ..Default::default()
        });
        Ok(self.samplers.insert(sampler))
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) -> bool {
        self.samplers.remove(sampler).is_some()
    }

    fn create_shader(&mut self, source: &ShaderSource) -> RenderResult<ShaderHandle> {
        let module = self.scoped(
            || {
                self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(source.label),
                    source: wgpu::ShaderSource::Wgsl(source.wgsl.into()),
                })
            },
            RenderError::ShaderCompilation,
        )?;
        Ok(self.shaders.insert(module))
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) -> bool {
        self.shaders.remove(shader).is_some()
    }

    fn create_descriptor_set_layout(
        &mut self,
        desc: &DescriptorSetLayoutDesc,
    ) -> RenderResult<DescriptorSetLayoutHandle> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = desc
            .bindings
            .iter()
            .map(|b| wgpu::BindGroupLayoutEntry {
                binding: b.binding,
                visibility: shader_stages(b.stages),
                ty: binding_types::from_kind(b.kind),
                count: None,
            })
            .collect();
        let layout = self.scoped(
            || {
                self.device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(desc.label),
                        entries: &entries,
                    })
            },
            RenderError::ResourceCreation,
        )?;
        Ok(self.layouts.insert(GpuLayout {
            layout,
            bindings: desc.bindings.clone(),
        }))
    }

    fn destroy_descriptor_set_layout(&mut self, layout: DescriptorSetLayoutHandle) -> bool {
        self.layouts.remove(layout).is_some()
    }

    fn create_descriptor_set(
        &mut self,
        layout: DescriptorSetLayoutHandle,
    ) -> RenderResult<DescriptorSetHandle> {
        if !self.layouts.contains_key(layout) {
            return Err(RenderError::InvalidHandle("descriptor set layout"));
        }
        Ok(self.sets.insert(GpuDescriptorSet {
            layout,
            resources: HashMap::new(),
            bind_group: None,
        }))
    }

    fn update_descriptor_set(
        &mut self,
        set: DescriptorSetHandle,
        writes: &[DescriptorWrite],
    ) -> RenderResult<()> {
        let layout_handle = self
            .sets
            .get(set)
            .ok_or(RenderError::InvalidHandle("descriptor set"))?
            .layout;
        let layout = self
            .layouts
            .get(layout_handle)
            .ok_or(RenderError::InvalidHandle("descriptor set layout"))?;
        for write in writes {
            let binding = layout
                .bindings
                .iter()
                .find(|b| b.binding == write.binding)
                .ok_or_else(|| {
                    RenderError::InvalidState(format!("layout has no binding {}", write.binding))
                })?;
            let matches = matches!(
                (binding.kind, write.resource),
                (DescriptorKind::UniformBuffer, DescriptorResource::Buffer(_))
                    | (DescriptorKind::Texture { .. }, DescriptorResource::Texture(_))
                    | (DescriptorKind::Sampler { .. }, DescriptorResource::Sampler(_))
            );
            if !matches {
                return Err(RenderError::InvalidState(format!(
                    "binding {} expects {:?}, got {:?}",
                    write.binding, binding.kind, write.resource
                )));
            }
        }
        if let Some(descriptor_set) = self.sets.get_mut(set) {
            for write in writes {
                descriptor_set.resources.insert(write.binding, write.resource);
            }
            descriptor_set.bind_group = None;
        }
        Ok(())
    }

    fn destroy_descriptor_set(&mut self, set: DescriptorSetHandle) -> bool {
        self.sets.remove(set).is_some()
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> RenderResult<RenderPassHandle> {
        if desc.color_formats.iter().any(|f| f.is_depth())
            || desc.depth_format.is_some_and(|f| !f.is_depth())
        {
            return Err(RenderError::ResourceCreation(
                "attachment format does not match its slot".to_string(),
            ));
        }
        Ok(self.render_passes.insert(GpuRenderPass {
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
        if desc.color_attachments.len() != pass.color_formats.len()
            || desc.depth_attachment.is_some() != pass.depth_format.is_some()
        {
            return Err(RenderError::ResourceCreation(format!(
                "framebuffer '{}' attachments do not match its render pass",
                desc.label
            )));
        }

        let mut color_views = Vec::with_capacity(desc.color_attachments.len());
        for (index, handle) in desc.color_attachments.iter().enumerate() {
            let texture = self.texture(*handle)?;
            if texture.width != desc.width
                || texture.height != desc.height
                || texture.format != pass.color_formats[index]
                || !texture.usage.contains(TextureUsage::RENDER_TARGET)
            {
                return Err(RenderError::ResourceCreation(format!(
                    "color attachment {} of framebuffer '{}' is incompatible",
                    index, desc.label
                )));
            }
            color_views.push(Self::default_view(&texture.texture));
        }
        let depth_view = match desc.depth_attachment {
            Some(handle) => {
                let texture = self.texture(handle)?;
                if texture.width != desc.width
                    || texture.height != desc.height
                    || Some(texture.format) != pass.depth_format
                    || !texture.usage.contains(TextureUsage::RENDER_TARGET)
                {
                    return Err(RenderError::ResourceCreation(format!(
                        "depth attachment of framebuffer '{}' is incompatible",
                        desc.label
                    )));
                }
                Some(Self::default_view(&texture.texture))
            }
            None => None,
        };

        Ok(self.framebuffers.insert(GpuFramebuffer {
            render_pass: desc.render_pass,
            color_attachments: desc.color_attachments.clone(),
            depth_attachment: desc.depth_attachment,
            color_views,
            depth_view,
        }))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) -> bool {
        self.framebuffers.remove(framebuffer).is_some()
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> RenderResult<PipelineHandle> {
        let module = self
            .shaders
            .get(desc.shader)
            .ok_or(RenderError::InvalidHandle("shader"))?;
        let pass = self
            .render_passes
            .get(desc.render_pass)
            .ok_or(RenderError::InvalidHandle("render pass"))?;
        let mut bind_group_layouts = Vec::with_capacity(desc.set_layouts.len());
        for handle in &desc.set_layouts {
            bind_group_layouts.push(
                &self
                    .layouts
                    .get(*handle)
                    .ok_or(RenderError::InvalidHandle("descriptor set layout"))?
                    .layout,
            );
        }

        let targets: Vec<Option<wgpu::ColorTargetState>> = pass
            .color_formats
            .iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format: texture_format(*format),
                    blend: blend_state(desc.blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();
        let vertex_buffers = match desc.vertex_input {
            VertexInput::Mesh => vec![Vertex3D::desc()],
            VertexInput::None => Vec::new(),
        };

        let pipeline = self.scoped(
            || {
                let layout = self
                    .device
                    .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some(desc.label),
                        bind_group_layouts: &bind_group_layouts,
                        push_constant_ranges: &[],
                    });
                self.device
                    .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some(desc.label),
                        layout: Some(&layout),
                        vertex: wgpu::VertexState {
                            module,
                            entry_point: Some(desc.vertex_entry),
                            compilation_options: Default::default(),
                            buffers: &vertex_buffers,
                        },
                        fragment: desc.fragment_entry.map(|entry| wgpu::FragmentState {
                            module,
                            entry_point: Some(entry),
                            compilation_options: Default::default(),
                            targets: &targets,
                        }),
                        primitive: wgpu::PrimitiveState {
                            topology: wgpu::PrimitiveTopology::TriangleList,
                            strip_index_format: None,
                            front_face: wgpu::FrontFace::Ccw,
                            cull_mode: match desc.cull_mode {
                                CullMode::None => None,
                                CullMode::Back => Some(wgpu::Face::Back),
                            },
                            polygon_mode: wgpu::PolygonMode::Fill,
                            unclipped_depth: false,
                            conservative: false,
                        },
                        depth_stencil: pass.depth_format.map(|format| wgpu::DepthStencilState {
                            format: texture_format(format),
                            depth_write_enabled: desc.depth.write,
                            depth_compare: if desc.depth.test {
                                wgpu::CompareFunction::Less
                            } else {
                                wgpu::CompareFunction::Always
                            },
                            stencil: wgpu::StencilState::default(),
                            bias: wgpu::DepthBiasState::default(),
                        }),
                        multisample: wgpu::MultisampleState::default(),
                        multiview: None,
                        cache: None,
                    })
            },
            RenderError::ShaderCompilation,
        )?;

        Ok(self.pipelines.insert(GpuPipeline {
            pipeline,
            vertex_input: desc.vertex_input,
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
        let attachments: Vec<TextureHandle> = framebuffer
            .color_attachments
            .iter()
            .copied()
            .chain(framebuffer.depth_attachment)
            .collect();
        let render_pass = self
            .render_passes
            .get(framebuffer.render_pass)
            .ok_or(RenderError::InvalidHandle("render pass"))?
            .clone();
        for handle in &attachments {
            self.texture(*handle)?;
        }
        self.validate_sampled_textures(pass, &attachments)?;
        for draw in &pass.draws {
            for set in &draw.descriptor_sets {
                self.ensure_bind_group(*set)?;
            }
        }

        let framebuffer = self
            .framebuffers
            .get(pass.framebuffer)
            .ok_or(RenderError::InvalidHandle("framebuffer"))?;
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = framebuffer
            .color_views
            .iter()
            .enumerate()
            .map(|(index, view)| {
                let load = match render_pass.color_load {
                    LoadOp::Clear => {
                        let c = pass.clear_colors.get(index).copied().unwrap_or([0.0; 4]);
                        wgpu::LoadOp::Clear(wgpu::Color {
                            r: c[0] as f64,
                            g: c[1] as f64,
                            b: c[2] as f64,
                            a: c[3] as f64,
                        })
                    }
                    LoadOp::Load => wgpu::LoadOp::Load,
                };
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();
        let depth_attachment = framebuffer.depth_view.as_ref().map(|view| {
            wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: match render_pass.depth_load {
                        LoadOp::Clear => wgpu::LoadOp::Clear(pass.clear_depth),
                        LoadOp::Load => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(pass.label.as_str()),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(pass.label.as_str()),
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &pass.draws {
                let pipeline = self
                    .pipelines
                    .get(draw.pipeline)
                    .ok_or(RenderError::InvalidHandle("pipeline"))?;
                rpass.set_pipeline(&pipeline.pipeline);
                for (index, handle) in draw.descriptor_sets.iter().enumerate() {
                    let bind_group = self
                        .sets
                        .get(*handle)
                        .and_then(|s| s.bind_group.as_ref())
                        .ok_or(RenderError::InvalidHandle("descriptor set"))?;
                    rpass.set_bind_group(index as u32, bind_group, &[]);
                }
                if pipeline.vertex_input == VertexInput::Mesh {
                    let vertex_buffer = draw
                        .vertex_buffer
                        .and_then(|h| self.buffers.get(h))
                        .ok_or(RenderError::InvalidHandle("buffer"))?;
                    rpass.set_vertex_buffer(0, vertex_buffer.buffer.slice(..));
                }
                match draw.index_buffer {
                    Some(handle) => {
                        let index_buffer = self
                            .buffers
                            .get(handle)
                            .ok_or(RenderError::InvalidHandle("buffer"))?;
                        rpass.set_index_buffer(index_buffer.buffer.slice(..), wgpu::IndexFormat::Uint32);
                        rpass.draw_indexed(0..draw.count, 0, 0..1);
                    }
                    None => rpass.draw(0..draw.count, 0..1),
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        for handle in attachments {
            if let Some(texture) = self.textures.get_mut(handle) {
                texture.state = TextureState::RenderTarget;
            }
        }
        Ok(())
    }

    fn wait_idle(&mut self) -> RenderResult<()> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|err| poll_failed("wait for idle", err))
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

    #[test]
    fn test_host_visible_buffers_accept_queue_writes() {
        let usages = buffer_usages(BufferUsage::UNIFORM, MemoryProperties::HOST_SHARED);
        assert!(usages.contains(wgpu::BufferUsages::COPY_DST));
        assert!(usages.contains(wgpu::BufferUsages::UNIFORM));
        let device_local = buffer_usages(BufferUsage::VERTEX, MemoryProperties::DEVICE_LOCAL);
        assert!(!device_local.contains(wgpu::BufferUsages::COPY_DST));
    }

    #[test]
    fn test_copy_alignment() {
        assert_eq!(align_to(0, 4), 0);
        assert_eq!(align_to(5, 4), 8);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
    }

    #[test]
    fn test_alpha_blend_matches_forward_pass() {
        let blend = blend_state(BlendMode::Alpha).unwrap();
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(blend.alpha.src_factor, wgpu::BlendFactor::One);
        assert!(blend_state(BlendMode::Replace).is_none());
    }

    #[test]
    fn test_poll_timeout_becomes_readback_error() {
        match poll_failed("texture readback", wgpu::PollError::Timeout) {
            RenderError::Readback(message) => assert!(message.starts_with("texture readback")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_readback_when_an_adapter_exists() {
        let Some(mut device) = WgpuDevice::try_new() else {
            return;
        };
        let texture = device
            .create_texture(&TextureDesc::d2(
                "readback",
                4,
                2,
                TextureFormat::Rgba8Unorm,
                TextureUsage::TRANSFER_SRC | TextureUsage::TRANSFER_DST,
            ))
            .unwrap();
        let bytes: Vec<u8> = (0..32).collect();
        device.write_texture(texture, 0, &bytes).unwrap();
        assert_eq!(device.read_texture(texture, 0).unwrap(), bytes);
        device.wait_idle().unwrap();
    }
}
