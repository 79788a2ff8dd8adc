//! Render passes of the deferred pipeline
//!
//! Each pass owns its render pass object and framebuffer and registers its
//! pipeline with the shared [`PipelineManager`](super::pipeline_manager::PipelineManager).
//! Size-dependent textures live in [`RenderTargets`]; passes rebuild their
//! framebuffers against a new set of targets on resize.

pub mod forward;
pub mod geometry;
pub mod lighting;
pub mod post_process;
pub mod targets;

pub use forward::ForwardPass;
pub use geometry::GeometryPass;
pub use lighting::{LightingPass, SceneLightingBindings};
pub use post_process::PostProcessPass;
pub use targets::{RenderTargets, GBUFFER_FORMATS, HDR_FORMAT, OUTPUT_FORMAT};

use crate::gfx::backend::{DescriptorSetHandle, DrawCall, PipelineHandle};
use crate::gfx::resources::mesh_cache::GpuMesh;

/// Object transform set, material set and mesh buffers of one draw
#[derive(Debug, Clone, Copy)]
pub struct DrawItem {
    pub object_set: DescriptorSetHandle,
    pub material_set: DescriptorSetHandle,
    pub mesh: GpuMesh,
}

impl DrawItem {
    fn draw(&self, pipeline: PipelineHandle, extra_sets: &[DescriptorSetHandle]) -> DrawCall {
        let mut descriptor_sets = vec![self.object_set, self.material_set];
        descriptor_sets.extend_from_slice(extra_sets);
        DrawCall {
            pipeline,
            descriptor_sets,
            vertex_buffer: Some(self.mesh.vertex_buffer),
            index_buffer: Some(self.mesh.index_buffer),
            count: self.mesh.index_count,
        }
    }
}

/// One triangle covering the viewport; vertices come from the vertex index
fn full_screen_draw(pipeline: PipelineHandle, descriptor_sets: Vec<DescriptorSetHandle>) -> DrawCall {
    DrawCall {
        pipeline,
        descriptor_sets,
        vertex_buffer: None,
        index_buffer: None,
        count: 3,
    }
}
