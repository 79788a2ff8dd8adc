//! prism3d 3D Renderer
//!
//! A deferred PBR renderer with shadow mapping, written against a small
//! graphics device abstraction with wgpu and software backends.

pub mod gfx;
pub mod prelude;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use gfx::{RenderError, RenderResult, Renderer3D};

/// Creates a renderer on the first available backend, honoring `PRISM3D_*` overrides
pub fn default() -> RenderResult<Renderer3D> {
    Renderer3D::from_settings(gfx::rendering::RenderSettings::from_env())
}
