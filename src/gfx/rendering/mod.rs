//! Core rendering functionality
//!
//! Deferred frame orchestration, its passes, shadow maps and the pipeline
//! registry they share. Everything here is written against
//! [`GraphicsDevice`](crate::gfx::backend::GraphicsDevice).

pub mod deferred_pipeline;
pub mod passes;
pub mod pipeline_manager;
pub mod settings;
pub mod shadow_manager;

// Re-export main types
pub use deferred_pipeline::{DeferredPipeline, FrameInput};
pub use pipeline_manager::{PipelineConfig, PipelineManager, PipelineStats};
pub use settings::{PostProcessSettings, RenderSettings, ShadowSettings};
pub use shadow_manager::{ShadowManager, ShadowState};
