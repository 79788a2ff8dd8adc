//! WGPU utility functions and helpers
//!
//! Conversions from the backend-neutral descriptors to their wgpu counterparts.

pub mod binding_types;

pub use binding_types::*;
