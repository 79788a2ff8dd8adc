//! Full-screen deferred lighting from the G-buffer into the HDR target

use super::targets::{RenderTargets, HDR_FORMAT};
use super::full_screen_draw;
use crate::gfx::backend::{
    AddressMode, CullMode, DepthState, DescriptorBinding, DescriptorKind, DescriptorSetHandle,
    DescriptorSetLayoutDesc, DescriptorSetLayoutHandle, DescriptorWrite, FilterMode, FramebufferDesc,
    FramebufferHandle, GraphicsDevice, LoadOp, PassRecording, RenderPassDesc, RenderPassHandle,
    SamplerDesc, SamplerHandle, ShaderProgram, ShaderStages, TextureHandle, TextureViewKind,
};
use crate::gfx::error::RenderResult;
use crate::gfx::rendering::pipeline_manager::{PipelineConfig, PipelineManager};
use crate::gfx::resources::uniform_buffer::UniformBuffer;
use crate::gfx::resources::uniforms::{LightingUniforms, ShadowUniforms};

fn fragment_binding(binding: u32, kind: DescriptorKind) -> DescriptorBinding {
    DescriptorBinding {
        binding,
        kind,
        stages: ShaderStages::FRAGMENT,
    }
}

/// Lights, shadow records, shadow maps and the comparison sampler
///
/// | binding | resource                  |
/// |---------|---------------------------|
/// | 0       | [`LightingUniforms`]      |
/// | 1       | [`ShadowUniforms`]        |
/// | 2       | 2D shadow map array       |
/// | 3       | cube shadow maps as array |
/// | 4       | comparison sampler        |
pub fn scene_lighting_layout_desc() -> DescriptorSetLayoutDesc<'static> {
    let shadow_maps = DescriptorKind::Texture {
        view: TextureViewKind::D2Array,
        depth: true,
        filterable: false,
    };
    DescriptorSetLayoutDesc {
        label: "Scene Lighting Descriptor Set",
        bindings: vec![
            fragment_binding(0, DescriptorKind::UniformBuffer),
            fragment_binding(1, DescriptorKind::UniformBuffer),
            fragment_binding(2, shadow_maps),
            fragment_binding(3, shadow_maps),
            fragment_binding(
                4,
                DescriptorKind::Sampler {
                    comparison: true,
                    filtering: true,
                },
            ),
        ],
    }
}

fn gbuffer_layout_desc() -> DescriptorSetLayoutDesc<'static> {
    let texel = DescriptorKind::Texture {
        view: TextureViewKind::D2,
        depth: false,
        filterable: false,
    };
    DescriptorSetLayoutDesc {
        label: "G-Buffer Descriptor Set",
        bindings: (0..4).map(|binding| fragment_binding(binding, texel)).collect(),
    }
}

/// Per-frame lighting state shared by the lighting and forward passes
pub struct SceneLightingBindings {
    layout: DescriptorSetLayoutHandle,
    set: DescriptorSetHandle,
    lighting_ubo: UniformBuffer<LightingUniforms>,
    shadow_ubo: UniformBuffer<ShadowUniforms>,
    sampler: SamplerHandle,
}

impl SceneLightingBindings {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        shadow_array: TextureHandle,
        shadow_cube_array: TextureHandle,
    ) -> RenderResult<Self> {
        let layout = device.create_descriptor_set_layout(&scene_lighting_layout_desc())?;
        let lighting_ubo = UniformBuffer::new_with_data(device, &LightingUniforms::default())?;
        let shadow_ubo = UniformBuffer::new_with_data(device, &ShadowUniforms::default())?;
        let sampler = device.create_sampler(&SamplerDesc {
            label: "Shadow Comparison Sampler",
            filter: FilterMode::Linear,
            address: AddressMode::ClampToEdge,
            compare: true,
        })?;
        let set = device.create_descriptor_set(layout)?;
        device.update_descriptor_set(
            set,
            &[
                DescriptorWrite::buffer(0, lighting_ubo.buffer()),
                DescriptorWrite::buffer(1, shadow_ubo.buffer()),
                DescriptorWrite::texture(2, shadow_array),
                DescriptorWrite::texture(3, shadow_cube_array),
                DescriptorWrite::sampler(4, sampler),
            ],
        )?;
        Ok(Self {
            layout,
            set,
            lighting_ubo,
            shadow_ubo,
            sampler,
        })
    }

    pub fn layout(&self) -> DescriptorSetLayoutHandle {
        self.layout
    }

    pub fn set(&self) -> DescriptorSetHandle {
        self.set
    }

    pub fn update(
        &mut self,
        device: &mut dyn GraphicsDevice,
        lighting: &LightingUniforms,
        shadows: &ShadowUniforms,
    ) -> RenderResult<()> {
        self.lighting_ubo.update(device, lighting)?;
        self.shadow_ubo.update(device, shadows)?;
        Ok(())
    }

    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        device.destroy_descriptor_set(self.set);
        self.lighting_ubo.destroy(device);
        self.shadow_ubo.destroy(device);
        device.destroy_sampler(self.sampler);
        device.destroy_descriptor_set_layout(self.layout);
    }
}

pub struct LightingPass {
    render_pass: RenderPassHandle,
    framebuffer: FramebufferHandle,
    gbuffer_layout: DescriptorSetLayoutHandle,
    gbuffer_set: DescriptorSetHandle,
}

impl LightingPass {
    pub const PIPELINE: &'static str = "lighting";

    pub fn new(
        device: &mut dyn GraphicsDevice,
        pipelines: &mut PipelineManager,
        targets: &RenderTargets,
        scene_layout: DescriptorSetLayoutHandle,
    ) -> RenderResult<Self> {
        let render_pass = device.create_render_pass(&RenderPassDesc {
            label: "Lighting Pass",
            color_formats: vec![HDR_FORMAT],
            depth_format: None,
            color_load: LoadOp::Clear,
            depth_load: LoadOp::Clear,
        })?;
        let gbuffer_layout = device.create_descriptor_set_layout(&gbuffer_layout_desc())?;
        pipelines.register_pipeline(
            Self::PIPELINE,
            PipelineConfig::new(ShaderProgram::Lighting, render_pass)
                .with_label("Lighting Pipeline")
                .with_cull_mode(CullMode::None)
                .with_depth(DepthState::DISABLED)
                .with_no_vertex_buffers()
                .with_set_layouts(vec![gbuffer_layout, scene_layout]),
        );
        let gbuffer_set = device.create_descriptor_set(gbuffer_layout)?;
        let framebuffer = Self::bind_targets(device, render_pass, gbuffer_set, targets)?;
        Ok(Self {
            render_pass,
            framebuffer,
            gbuffer_layout,
            gbuffer_set,
        })
    }

    fn bind_targets(
        device: &mut dyn GraphicsDevice,
        render_pass: RenderPassHandle,
        gbuffer_set: DescriptorSetHandle,
        targets: &RenderTargets,
    ) -> RenderResult<FramebufferHandle> {
        let writes: Vec<DescriptorWrite> = targets
            .gbuffer()
            .iter()
            .enumerate()
            .map(|(binding, texture)| DescriptorWrite::texture(binding as u32, *texture))
            .collect();
        device.update_descriptor_set(gbuffer_set, &writes)?;
        device.create_framebuffer(&FramebufferDesc {
            label: "HDR Framebuffer",
            render_pass,
            color_attachments: vec![targets.hdr()],
            depth_attachment: None,
            width: targets.width(),
            height: targets.height(),
        })
    }

    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, targets: &RenderTargets) -> RenderResult<()> {
        device.destroy_framebuffer(self.framebuffer);
        self.framebuffer = Self::bind_targets(device, self.render_pass, self.gbuffer_set, targets)?;
        Ok(())
    }

    /// Shades every covered G-buffer texel. Uncovered texels keep alpha 0 so
    /// the post pass shows the background there.
    pub fn execute(
        &self,
        device: &mut dyn GraphicsDevice,
        pipelines: &mut PipelineManager,
        scene: &SceneLightingBindings,
    ) -> RenderResult<()> {
        let pipeline = pipelines.get_pipeline(device, Self::PIPELINE)?;
        let mut pass =
            PassRecording::new("Lighting Pass", self.framebuffer).with_clear_colors(vec![[0.0; 4]]);
        pass.push(full_screen_draw(pipeline, vec![self.gbuffer_set, scene.set()]));
        device.execute_pass(&pass)
    }

    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        device.destroy_framebuffer(self.framebuffer);
        device.destroy_descriptor_set(self.gbuffer_set);
        device.destroy_descriptor_set_layout(self.gbuffer_layout);
        device.destroy_render_pass(self.render_pass);
    }
}
