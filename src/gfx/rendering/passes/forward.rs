//! Transparent surfaces, alpha blended over the lit HDR image

use super::lighting::SceneLightingBindings;
use super::targets::{RenderTargets, DEPTH_FORMAT, HDR_FORMAT};
use super::DrawItem;
use crate::gfx::backend::{
    BlendMode, CullMode, DepthState, DescriptorSetLayoutHandle, FramebufferDesc, FramebufferHandle,
    GraphicsDevice, LoadOp, PassRecording, RenderPassDesc, RenderPassHandle, ShaderProgram,
};
use crate::gfx::error::RenderResult;
use crate::gfx::rendering::pipeline_manager::{PipelineConfig, PipelineManager};

/// Draws into the HDR target against the G-buffer depth, testing without writing
pub struct ForwardPass {
    render_pass: RenderPassHandle,
    framebuffer: FramebufferHandle,
}

impl ForwardPass {
    pub const PIPELINE: &'static str = "forward";

    pub fn new(
        device: &mut dyn GraphicsDevice,
        pipelines: &mut PipelineManager,
        targets: &RenderTargets,
        object_layout: DescriptorSetLayoutHandle,
        material_layout: DescriptorSetLayoutHandle,
        scene_layout: DescriptorSetLayoutHandle,
    ) -> RenderResult<Self> {
        let render_pass = device.create_render_pass(&RenderPassDesc {
            label: "Forward Pass",
            color_formats: vec![HDR_FORMAT],
            depth_format: Some(DEPTH_FORMAT),
            color_load: LoadOp::Load,
            depth_load: LoadOp::Load,
        })?;
        pipelines.register_pipeline(
            Self::PIPELINE,
            PipelineConfig::new(ShaderProgram::Forward, render_pass)
                .with_label("Forward Pipeline")
                .with_cull_mode(CullMode::Back)
                .with_depth(DepthState::READ_ONLY)
                .with_blend(BlendMode::Alpha)
                .with_set_layouts(vec![object_layout, material_layout, scene_layout]),
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
            label: "Forward Framebuffer",
            render_pass,
            color_attachments: vec![targets.hdr()],
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

    /// `items` are expected back to front
    pub fn execute(
        &self,
        device: &mut dyn GraphicsDevice,
        pipelines: &mut PipelineManager,
        scene: &SceneLightingBindings,
        items: &[DrawItem],
    ) -> RenderResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        let pipeline = pipelines.get_pipeline(device, Self::PIPELINE)?;
        let mut pass = PassRecording::new("Forward Pass", self.framebuffer);
        for item in items {
            pass.push(item.draw(pipeline, &[scene.set()]));
        }
        device.execute_pass(&pass)
    }

    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        device.destroy_framebuffer(self.framebuffer);
        device.destroy_render_pass(self.render_pass);
    }
}
