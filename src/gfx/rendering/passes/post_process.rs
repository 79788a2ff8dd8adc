//! Tone mapping of the HDR image into the RGBA8 output

use super::full_screen_draw;
use super::targets::{RenderTargets, OUTPUT_FORMAT};
use crate::gfx::backend::{
    CullMode, DepthState, DescriptorBinding, DescriptorKind, DescriptorSetHandle,
    DescriptorSetLayoutDesc, DescriptorSetLayoutHandle, DescriptorWrite, FramebufferDesc,
    FramebufferHandle, GraphicsDevice, LoadOp, PassRecording, RenderPassDesc, RenderPassHandle,
    ShaderProgram, ShaderStages, TextureViewKind,
};
use crate::gfx::error::RenderResult;
use crate::gfx::rendering::pipeline_manager::{PipelineConfig, PipelineManager};
use crate::gfx::rendering::settings::PostProcessSettings;
use crate::gfx::resources::uniform_buffer::UniformBuffer;
use crate::gfx::resources::uniforms::PostProcessUniforms;
use crate::gfx::scene::Color;

fn post_layout_desc() -> DescriptorSetLayoutDesc<'static> {
    DescriptorSetLayoutDesc {
        label: "Post Process Descriptor Set",
        bindings: vec![
            DescriptorBinding {
                binding: 0,
                kind: DescriptorKind::Texture {
                    view: TextureViewKind::D2,
                    depth: false,
                    filterable: false,
                },
                stages: ShaderStages::FRAGMENT,
            },
            DescriptorBinding {
                binding: 1,
                kind: DescriptorKind::UniformBuffer,
                stages: ShaderStages::FRAGMENT,
            },
        ],
    }
}

pub struct PostProcessPass {
    render_pass: RenderPassHandle,
    framebuffer: FramebufferHandle,
    layout: DescriptorSetLayoutHandle,
    set: DescriptorSetHandle,
    params: UniformBuffer<PostProcessUniforms>,
}

impl PostProcessPass {
    pub const PIPELINE: &'static str = "post_process";

    pub fn new(
        device: &mut dyn GraphicsDevice,
        pipelines: &mut PipelineManager,
        targets: &RenderTargets,
    ) -> RenderResult<Self> {
        let render_pass = device.create_render_pass(&RenderPassDesc {
            label: "Post Process Pass",
            color_formats: vec![OUTPUT_FORMAT],
            depth_format: None,
            color_load: LoadOp::Clear,
            depth_load: LoadOp::Clear,
        })?;
        let layout = device.create_descriptor_set_layout(&post_layout_desc())?;
        pipelines.register_pipeline(
            Self::PIPELINE,
            PipelineConfig::new(ShaderProgram::PostProcess, render_pass)
                .with_label("Post Process Pipeline")
                .with_cull_mode(CullMode::None)
                .with_depth(DepthState::DISABLED)
                .with_no_vertex_buffers()
                .with_set_layouts(vec![layout]),
        );
        let params = UniformBuffer::new(device)?;
        let set = device.create_descriptor_set(layout)?;
        device.update_descriptor_set(set, &[DescriptorWrite::buffer(1, params.buffer())])?;
        let framebuffer = Self::bind_targets(device, render_pass, set, targets)?;
        Ok(Self {
            render_pass,
            framebuffer,
            layout,
            set,
            params,
        })
    }

    fn bind_targets(
        device: &mut dyn GraphicsDevice,
        render_pass: RenderPassHandle,
        set: DescriptorSetHandle,
        targets: &RenderTargets,
    ) -> RenderResult<FramebufferHandle> {
        device.update_descriptor_set(set, &[DescriptorWrite::texture(0, targets.hdr())])?;
        device.create_framebuffer(&FramebufferDesc {
            label: "Output Framebuffer",
            render_pass,
            color_attachments: vec![targets.output()],
            depth_attachment: None,
            width: targets.width(),
            height: targets.height(),
        })
    }

    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, targets: &RenderTargets) -> RenderResult<()> {
        device.destroy_framebuffer(self.framebuffer);
        self.framebuffer = Self::bind_targets(device, self.render_pass, self.set, targets)?;
        Ok(())
    }

    /// The HDR target must already be in the shader-read state
    pub fn execute(
        &mut self,
        device: &mut dyn GraphicsDevice,
        pipelines: &mut PipelineManager,
        settings: &PostProcessSettings,
        background: Color,
    ) -> RenderResult<()> {
        self.params.update(
            device,
            &PostProcessUniforms {
                background: background.0,
                exposure: settings.exposure,
                gamma: settings.gamma,
                _padding: [0.0; 2],
            },
        )?;
        let pipeline = pipelines.get_pipeline(device, Self::PIPELINE)?;
        let mut pass = PassRecording::new("Post Process Pass", self.framebuffer)
            .with_clear_colors(vec![background.0]);
        pass.push(full_screen_draw(pipeline, vec![self.set]));
        device.execute_pass(&pass)
    }

    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        device.destroy_framebuffer(self.framebuffer);
        device.destroy_descriptor_set(self.set);
        self.params.destroy(device);
        device.destroy_descriptor_set_layout(self.layout);
        device.destroy_render_pass(self.render_pass);
    }
}
