//! # Graphics Backend Abstraction
//!
//! Capability-oriented interface over a concrete GPU API. The deferred pipeline,
//! shadow manager and resource caches are written once against
//! [`GraphicsDevice`]; backends only implement the trait.
//!
//! ## Backends
//!
//! - [`wgpu_device::WgpuDevice`] - native GPU path through wgpu
//! - [`software::SoftwareDevice`] - CPU reference rasterizer, always available
//!
//! ## Ownership
//!
//! Every `create_*` call returns an owning handle. The caller releases it with
//! the matching `destroy_*` call. Destroying a stale handle is a no-op that
//! returns `false`, so teardown paths can release unconditionally.

pub mod factory;
pub mod handles;
pub mod software;
pub mod types;
pub mod wgpu_device;

pub use factory::BackendFactory;
pub use handles::*;
pub use types::*;

use crate::gfx::error::RenderResult;

/// Texture layout states tracked by devices
///
/// A texture must be in [`TextureState::ShaderRead`] before a pass samples it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureState {
    Undefined,
    RenderTarget,
    TransferDst,
    ShaderRead,
}

/// A graphics device owning every GPU object it hands out
pub trait GraphicsDevice {
    /// Short backend identifier ("wgpu", "software")
    fn backend_name(&self) -> &'static str;

    fn create_buffer(&mut self, desc: &BufferDesc) -> RenderResult<BufferHandle>;

    /// Writes `data` at `offset`. The buffer must be host visible or a transfer destination.
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> RenderResult<()>;

    /// Copies `size` bytes from the start of `src` to the start of `dst`
    fn copy_buffer_to_buffer(
        &mut self,
        src: BufferHandle,
        dst: BufferHandle,
        size: u64,
    ) -> RenderResult<()>;

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> bool;

    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureHandle>;

    /// Uploads one full layer of tightly packed texel data
    fn write_texture(&mut self, texture: TextureHandle, layer: u32, data: &[u8]) -> RenderResult<()>;

    /// Reads one full layer back as tightly packed texel data
    fn read_texture(&mut self, texture: TextureHandle, layer: u32) -> RenderResult<Vec<u8>>;

    /// Copies a single-layer 2D texture into `layer` of an array texture
    fn copy_texture_to_array_layer(
        &mut self,
        src: TextureHandle,
        dst: TextureHandle,
        layer: u32,
    ) -> RenderResult<()>;

    /// Copies a single-layer 2D texture into one face of a cube-array texture
    fn copy_texture_to_cube_face(
        &mut self,
        src: TextureHandle,
        dst: TextureHandle,
        cube_index: u32,
        face: CubeFace,
    ) -> RenderResult<()> {
        self.copy_texture_to_array_layer(src, dst, face.layer(cube_index))
    }

    /// Moves a texture into the shader-readable state
    fn transition_for_sampling(&mut self, texture: TextureHandle) -> RenderResult<()>;

    fn texture_state(&self, texture: TextureHandle) -> Option<TextureState>;

    fn destroy_texture(&mut self, texture: TextureHandle) -> bool;

    fn create_sampler(&mut self, desc: &SamplerDesc) -> RenderResult<SamplerHandle>;

    fn destroy_sampler(&mut self, sampler: SamplerHandle) -> bool;

    /// Compiles embedded shader source into a backend module
    fn create_shader(&mut self, source: &ShaderSource) -> RenderResult<ShaderHandle>;

    fn destroy_shader(&mut self, shader: ShaderHandle) -> bool;

    fn create_descriptor_set_layout(
        &mut self,
        desc: &DescriptorSetLayoutDesc,
    ) -> RenderResult<DescriptorSetLayoutHandle>;

    fn destroy_descriptor_set_layout(&mut self, layout: DescriptorSetLayoutHandle) -> bool;

    fn create_descriptor_set(
        &mut self,
        layout: DescriptorSetLayoutHandle,
    ) -> RenderResult<DescriptorSetHandle>;

    fn update_descriptor_set(
        &mut self,
        set: DescriptorSetHandle,
        writes: &[DescriptorWrite],
    ) -> RenderResult<()>;

    fn destroy_descriptor_set(&mut self, set: DescriptorSetHandle) -> bool;

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> RenderResult<RenderPassHandle>;

    fn destroy_render_pass(&mut self, pass: RenderPassHandle) -> bool;

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> RenderResult<FramebufferHandle>;

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) -> bool;

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> RenderResult<PipelineHandle>;

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) -> bool;

    /// Runs one render pass. Attachments end up in [`TextureState::RenderTarget`].
    fn execute_pass(&mut self, pass: &PassRecording) -> RenderResult<()>;

    /// Blocks until all submitted work has finished
    fn wait_idle(&mut self) -> RenderResult<()>;

    /// Number of live objects across every handle type
    fn live_handle_count(&self) -> usize;
}
