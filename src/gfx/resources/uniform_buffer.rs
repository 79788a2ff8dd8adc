//! Typed uniform buffer over a [`GraphicsDevice`]

use std::marker::PhantomData;

use crate::gfx::backend::{BufferDesc, BufferHandle, BufferUsage, GraphicsDevice, MemoryProperties};
use crate::gfx::error::RenderResult;

/// Host-visible uniform buffer holding one `Content`
///
/// Remembers the last uploaded bytes so unchanged updates cost nothing.
pub struct UniformBuffer<Content> {
    buffer: BufferHandle,
    content_type: PhantomData<Content>,
    previous_content: Vec<u8>,
}

impl<Content: bytemuck::Pod> UniformBuffer<Content> {
    fn name() -> &'static str {
        let type_name = std::any::type_name::<Content>();
        match type_name.rfind(':') {
            Some(pos) => &type_name[(pos + 1)..],
            None => type_name,
        }
    }

    /// Creates the buffer without uploading anything
    pub fn new(device: &mut dyn GraphicsDevice) -> RenderResult<Self> {
        let buffer = device.create_buffer(&BufferDesc {
            label: &format!("UniformBuffer: {}", Self::name()),
            size: std::mem::size_of::<Content>() as u64,
            usage: BufferUsage::UNIFORM,
            memory: MemoryProperties::HOST_SHARED,
        })?;
        Ok(Self {
            buffer,
            content_type: PhantomData,
            previous_content: Vec::new(),
        })
    }

    /// Creates the buffer and uploads `initial_content`
    pub fn new_with_data(device: &mut dyn GraphicsDevice, initial_content: &Content) -> RenderResult<Self> {
        let mut uniform = Self::new(device)?;
        uniform.force_update(device, initial_content)?;
        Ok(uniform)
    }

    /// Uploads `content` unless it matches the previous upload byte for byte
    ///
    /// # Returns
    /// Whether a write was issued
    pub fn update(&mut self, device: &mut dyn GraphicsDevice, content: &Content) -> RenderResult<bool> {
        let new_content = bytemuck::bytes_of(content);
        if self.previous_content == new_content {
            return Ok(false);
        }
        self.force_update(device, content)?;
        Ok(true)
    }

    /// Uploads `content` unconditionally
    pub fn force_update(&mut self, device: &mut dyn GraphicsDevice, content: &Content) -> RenderResult<()> {
        let new_content = bytemuck::bytes_of(content);
        device.write_buffer(self.buffer, 0, new_content)?;
        self.previous_content.clear();
        self.previous_content.extend_from_slice(new_content);
        Ok(())
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn size(&self) -> u64 {
        std::mem::size_of::<Content>() as u64
    }

    /// Releases the buffer. Safe to call more than once.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) -> bool {
        self.previous_content.clear();
        device.destroy_buffer(self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::software::SoftwareDevice;
    use crate::gfx::resources::uniforms::PostProcessUniforms;

    #[test]
    fn test_update_skips_unchanged_content() {
        let mut device = SoftwareDevice::new();
        let params = PostProcessUniforms {
            background: [0.0; 4],
            exposure: 1.0,
            gamma: 2.2,
            _padding: [0.0; 2],
        };
        let mut uniform = UniformBuffer::new_with_data(&mut device, &params).unwrap();
        assert!(!uniform.update(&mut device, &params).unwrap());

        let brighter = PostProcessUniforms {
            exposure: 2.0,
            ..params
        };
        assert!(uniform.update(&mut device, &brighter).unwrap());
        assert_eq!(uniform.size(), 32);
        assert!(uniform.destroy(&mut device));
        assert!(!uniform.destroy(&mut device));
    }
}
