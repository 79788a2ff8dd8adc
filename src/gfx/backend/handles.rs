//! Opaque handles to device-owned GPU objects
//!
//! Every handle is a generation-counted slotmap key. A handle that outlives its
//! object is simply stale: lookups fail with [`RenderError::InvalidHandle`] and
//! destroying it again is a no-op.
//!
//! [`RenderError::InvalidHandle`]: crate::gfx::error::RenderError::InvalidHandle

use slotmap::new_key_type;

new_key_type! {
    /// Vertex, index, uniform or staging buffer
    pub struct BufferHandle;
    /// 2D, cube, array or cube-array texture
    pub struct TextureHandle;
    /// Filtering or comparison sampler
    pub struct SamplerHandle;
    /// Compiled shader module
    pub struct ShaderHandle;
    /// Layout describing the bindings of a descriptor set
    pub struct DescriptorSetLayoutHandle;
    /// Bound group of buffers, textures and samplers
    pub struct DescriptorSetHandle;
    /// Graphics pipeline
    pub struct PipelineHandle;
    /// Attachment formats and load operations of a pass
    pub struct RenderPassHandle;
    /// Concrete attachments bound to a render pass
    pub struct FramebufferHandle;
}
