//! Embedded WGSL programs
//!
//! Every program is assembled from `common.wgsl` (uniform layouts and the
//! full-screen triangle) plus the pieces it needs. The software backend runs
//! CPU kernels with identical bindings, so the entry point names here are what
//! both backends validate against.

use crate::gfx::backend::{ShaderProgram, ShaderSource};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

pub const SHADOW_DEPTH_SHADER: &str = concat!(
    include_str!("common.wgsl"),
    include_str!("shadow_depth.wgsl"),
);

pub const POINT_SHADOW_DEPTH_SHADER: &str = concat!(
    include_str!("common.wgsl"),
    include_str!("point_shadow_depth.wgsl"),
);

pub const GEOMETRY_PASS_SHADER: &str = concat!(
    include_str!("common.wgsl"),
    include_str!("surface_common.wgsl"),
    include_str!("geometry_pass.wgsl"),
);

pub const LIGHTING_SHADER: &str = concat!(
    include_str!("common.wgsl"),
    include_str!("lighting_common.wgsl"),
    include_str!("lighting.wgsl"),
);

pub const FORWARD_SHADER: &str = concat!(
    include_str!("common.wgsl"),
    include_str!("surface_common.wgsl"),
    include_str!("lighting_common.wgsl"),
    include_str!("forward.wgsl"),
);

pub const POST_PROCESS_SHADER: &str = concat!(
    include_str!("common.wgsl"),
    include_str!("post_process.wgsl"),
);

/// Source text and label for `program`
pub fn source(program: ShaderProgram) -> ShaderSource<'static> {
    let (label, wgsl) = match program {
        ShaderProgram::ShadowDepth => ("Shadow Depth Shader", SHADOW_DEPTH_SHADER),
        ShaderProgram::PointShadowDepth => ("Point Shadow Depth Shader", POINT_SHADOW_DEPTH_SHADER),
        ShaderProgram::GeometryPass => ("Geometry Pass Shader", GEOMETRY_PASS_SHADER),
        ShaderProgram::Lighting => ("Lighting Shader", LIGHTING_SHADER),
        ShaderProgram::Forward => ("Forward Shader", FORWARD_SHADER),
        ShaderProgram::PostProcess => ("Post Process Shader", POST_PROCESS_SHADER),
    };
    ShaderSource {
        label,
        program,
        wgsl,
    }
}

/// Whether `program` has a fragment stage
pub fn has_fragment_stage(program: ShaderProgram) -> bool {
    !matches!(program, ShaderProgram::ShadowDepth)
}
