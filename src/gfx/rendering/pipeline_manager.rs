//! Render pipeline management over a [`GraphicsDevice`]
//!
//! Pipelines are registered by name with a [`PipelineConfig`] and created
//! lazily on first request. Shader modules are compiled once per
//! [`ShaderProgram`] and shared by every pipeline built from that program.

use std::collections::HashMap;

use crate::gfx::backend::{
    BlendMode, CullMode, DepthState, DescriptorSetLayoutHandle, GraphicsDevice, PipelineDesc,
    PipelineHandle, RenderPassHandle, ShaderHandle, ShaderProgram, VertexInput,
};
use crate::gfx::error::{RenderError, RenderResult};
use crate::gfx::shaders;

/// Configuration for creating a render pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub label: String,
    pub program: ShaderProgram,
    pub render_pass: RenderPassHandle,
    pub set_layouts: Vec<DescriptorSetLayoutHandle>,
    pub cull_mode: CullMode,
    pub depth: DepthState,
    pub blend: BlendMode,
    pub vertex_only: bool,       // depth-only shadow pass
    pub no_vertex_buffers: bool, // full-screen triangles
}

impl PipelineConfig {
    pub fn new(program: ShaderProgram, render_pass: RenderPassHandle) -> Self {
        Self {
            label: format!("{:?} Pipeline", program),
            program,
            render_pass,
            set_layouts: Vec::new(),
            cull_mode: CullMode::Back,
            depth: DepthState::READ_WRITE,
            blend: BlendMode::Replace,
            vertex_only: !shaders::has_fragment_stage(program),
            no_vertex_buffers: false,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_owned();
        self
    }

    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    pub fn with_vertex_only(mut self) -> Self {
        self.vertex_only = true;
        self
    }

    pub fn with_set_layouts(mut self, layouts: Vec<DescriptorSetLayoutHandle>) -> Self {
        self.set_layouts = layouts;
        self
    }

    pub fn with_depth(mut self, depth: DepthState) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    /// Vertices come from the vertex index; no vertex buffer is bound
    pub fn with_no_vertex_buffers(mut self) -> Self {
        self.no_vertex_buffers = true;
        self
    }
}

/// Manages render pipelines with caching and lazy creation
pub struct PipelineManager {
    pipelines: HashMap<String, PipelineHandle>,
    pipeline_configs: HashMap<String, PipelineConfig>,
    shader_modules: HashMap<ShaderProgram, ShaderHandle>,
    pending_pipelines: Vec<String>,
}

impl Default for PipelineManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineManager {
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
            pipeline_configs: HashMap::new(),
            shader_modules: HashMap::new(),
            pending_pipelines: Vec::new(),
        }
    }

    /// Registers a pipeline configuration without creating it
    ///
    /// Re-registering a name replaces its configuration; an already created
    /// pipeline of that name is kept until [`PipelineManager::dispose`].
    pub fn register_pipeline(&mut self, name: &str, config: PipelineConfig) {
        self.pipeline_configs.insert(name.to_string(), config);
        if !self.pipelines.contains_key(name) && !self.pending_pipelines.iter().any(|n| n == name) {
            self.pending_pipelines.push(name.to_string());
        }
    }

    /// Compiles the embedded source of `program`, once
    pub fn load_shader(
        &mut self,
        device: &mut dyn GraphicsDevice,
        program: ShaderProgram,
    ) -> RenderResult<ShaderHandle> {
        if let Some(shader) = self.shader_modules.get(&program) {
            return Ok(*shader);
        }
        let shader = device.create_shader(&shaders::source(program))?;
        log::debug!("Loaded shader for {:?}", program);
        self.shader_modules.insert(program, shader);
        Ok(shader)
    }

    /// Gets or creates a pipeline
    pub fn get_pipeline(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
    ) -> RenderResult<PipelineHandle> {
        if let Some(pipeline) = self.pipelines.get(name) {
            return Ok(*pipeline);
        }
        let config = self
            .pipeline_configs
            .get(name)
            .cloned()
            .ok_or_else(|| RenderError::InvalidState(format!("pipeline '{}' is not registered", name)))?;

        let pipeline = self.create_pipeline_from_config(device, &config)?;
        self.pipelines.insert(name.to_string(), pipeline);
        self.pending_pipelines.retain(|n| n != name);
        Ok(pipeline)
    }

    /// Already created pipeline, without creating it
    pub fn pipeline(&self, name: &str) -> Option<PipelineHandle> {
        self.pipelines.get(name).copied()
    }

    /// Creates all pending pipelines immediately
    pub fn create_all_pipelines(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        let pending = self.pending_pipelines.clone();
        for name in pending {
            self.get_pipeline(device, &name)?;
        }
        Ok(())
    }

    fn create_pipeline_from_config(
        &mut self,
        device: &mut dyn GraphicsDevice,
        config: &PipelineConfig,
    ) -> RenderResult<PipelineHandle> {
        let shader = self.load_shader(device, config.program)?;

        let fragment_entry = if config.vertex_only {
            None
        } else {
            Some(shaders::FRAGMENT_ENTRY)
        };
        let vertex_input = if config.no_vertex_buffers {
            VertexInput::None
        } else {
            VertexInput::Mesh
        };

        let pipeline = device.create_pipeline(&PipelineDesc {
            label: &config.label,
            shader,
            vertex_entry: shaders::VERTEX_ENTRY,
            fragment_entry,
            vertex_input,
            set_layouts: config.set_layouts.clone(),
            render_pass: config.render_pass,
            cull_mode: config.cull_mode,
            depth: config.depth,
            blend: config.blend,
        })?;
        log::debug!("Created pipeline '{}'", config.label);
        Ok(pipeline)
    }

    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            total_pipelines: self.pipelines.len(),
            pending_pipelines: self.pending_pipelines.len(),
            loaded_shaders: self.shader_modules.len(),
        }
    }

    pub fn list_pipelines(&self) -> Vec<&String> {
        self.pipeline_configs.keys().collect()
    }

    /// True if the pipeline config exists (created or pending)
    pub fn has_pipeline(&self, name: &str) -> bool {
        self.pipeline_configs.contains_key(name)
    }

    /// Destroys every created pipeline and shader. Registrations are kept, so
    /// later requests recreate them.
    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        for (name, pipeline) in self.pipelines.drain() {
            device.destroy_pipeline(pipeline);
            self.pending_pipelines.push(name);
        }
        for (_, shader) in self.shader_modules.drain() {
            device.destroy_shader(shader);
        }
    }
}

/// Statistics about pipeline manager state
#[derive(Debug, PartialEq, Eq)]
pub struct PipelineStats {
    pub total_pipelines: usize,
    pub pending_pipelines: usize,
    pub loaded_shaders: usize,
}
