//! Error types for the rendering core
//!
//! Backend construction never produces a `RenderError`; it reports `None` so the
//! backend factory can move on to the next candidate. Everything after a device
//! exists reports through [`RenderError`].

use thiserror::Error;

/// Errors raised by devices, caches, the shadow manager and the renderer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// No backend in the preferred order could be constructed
    #[error("No graphics backend available: {0}")]
    BackendUnavailable(String),

    /// GPU object creation failed (out of memory, unsupported format, bad descriptor)
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    /// A handle was used after it was destroyed
    #[error("Invalid or destroyed {0} handle")]
    InvalidHandle(&'static str),

    /// An operation was issued in the wrong order (e.g. sampling before transition)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// `render` or a surface query ran before `initialize`
    #[error("Renderer used before initialization")]
    NotInitialized,

    /// Zero or oversized render target dimensions
    #[error("Invalid render target size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    /// Shader source failed to compile or no kernel exists for it
    #[error("Shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// Reading pixels back from the device failed
    #[error("Readback failed: {0}")]
    Readback(String),
}

/// Result alias used throughout the rendering core
pub type RenderResult<T> = Result<T, RenderError>;
