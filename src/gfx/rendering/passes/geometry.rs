//! Opaque surfaces into the G-buffer

use super::targets::{RenderTargets, DEPTH_FORMAT, GBUFFER_FORMATS};
use super::DrawItem;
use crate::gfx::backend::{
    CullMode, DepthState, DescriptorSetLayoutHandle, FramebufferDesc, FramebufferHandle,
    GraphicsDevice, LoadOp, PassRecording, RenderPassDesc, RenderPassHandle, ShaderProgram,
};
use crate::gfx::error::RenderResult;
use crate::gfx::rendering::pipeline_manager::{PipelineConfig, PipelineManager};

pub struct GeometryPass {
    render_pass: RenderPassHandle,
    framebuffer: FramebufferHandle,
}

impl GeometryPass {
    pub const PIPELINE: &'static str = "geometry";

    pub fn new(
        device: &mut dyn GraphicsDevice,
        pipelines: &mut PipelineManager,
        targets: &RenderTargets,
        object_layout: DescriptorSetLayoutHandle,
        material_layout: DescriptorSetLayoutHandle,
    ) -> RenderResult<Self> {
        let render_pass = device.create_render_pass(&RenderPassDesc {
            label: "Geometry Pass",
            color_formats: GBUFFER_FORMATS.to_vec(),
            depth_format: Some(DEPTH_FORMAT),
            color_load: LoadOp::Clear,
            depth_load: LoadOp::Clear,
        })?;
        pipelines.register_pipeline(
            Self::PIPELINE,
            PipelineConfig::new(ShaderProgram::GeometryPass, render_pass)
                .with_label("Geometry Pipeline")
                .with_cull_mode(CullMode::Back)
                .with_depth(DepthState::READ_WRITE)
                .with_set_layouts(vec![object_layout, material_layout]),
        );
        let framebuffer = Self::create_framebuffer(device, render_pass, targets)?;
        Ok(Self {
            render_pass,
            framebuffer,
        })
    }

    fn create_framebuffer(
        device: &mut dyn GraphicsDevice,
        render_pass: RenderPassHandle,
        targets: &RenderTargets,
    ) -> RenderResult<FramebufferHandle> {
        device.create_framebuffer(&FramebufferDesc {
            label: "G-Buffer Framebuffer",
            render_pass,
            color_attachments: targets.gbuffer().to_vec(),
            depth_attachment: Some(targets.depth()),
            width: targets.width(),
            height: targets.height(),
        })
    }

    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, targets: &RenderTargets) -> RenderResult<()> {
        device.destroy_framebuffer(self.framebuffer);
        self.framebuffer = Self::create_framebuffer(device, self.render_pass, targets)?;
        Ok(())
    }

    /// Clears the G-buffer and draws `items`. Position alpha stays 0 where
    /// nothing was drawn.
    pub fn execute(
        &self,
        device: &mut dyn GraphicsDevice,
        pipelines: &mut PipelineManager,
        items: &[DrawItem],
    ) -> RenderResult<()> {
        let pipeline = pipelines.get_pipeline(device, Self::PIPELINE)?;
        let mut pass = PassRecording::new("Geometry Pass", self.framebuffer)
            .with_clear_colors(vec![[0.0; 4]; GBUFFER_FORMATS.len()]);
        for item in items {
            pass.push(item.draw(pipeline, &[]));
        }
        device.execute_pass(&pass)
    }

    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        device.destroy_framebuffer(self.framebuffer);
        device.destroy_render_pass(self.render_pass);
    }
}
