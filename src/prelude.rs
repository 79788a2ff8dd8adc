//! # prism3d Prelude
//!
//! Commonly used types in one import.
//!
//! ```rust
//! use prism3d::prelude::*;
//!
//! let mut scene = SceneGraph::new();
//! let sun = scene.add_root(SceneNode::light(
//!     "sun",
//!     Light::directional(Vector3::new(-1.0, -1.0, 0.0)).with_shadows(true),
//! ));
//! assert!(scene.contains(sun));
//! ```

// Renderer and configuration
pub use crate::gfx::backend::{BackendFactory, GraphicsDevice};
pub use crate::gfx::error::{RenderError, RenderResult};
pub use crate::gfx::renderer::{RenderSurface, Renderer3D};
pub use crate::gfx::rendering::{PostProcessSettings, RenderSettings, ShadowSettings};

// Scene types
pub use crate::gfx::camera::Camera3D;
pub use crate::gfx::geometry::PrimitiveShape;
pub use crate::gfx::scene::{
    Attenuation, Color, Light, LightKind, Material, MaterialId, Mesh, MeshId, NodeId, NodeKind,
    RenderObject, SceneGraph, SceneNode, ShadowParams, TextureData, Transform, Vertex3D,
};

// Picking
pub use crate::gfx::picking::{GizmoAxis, GizmoMode, HitResult, Ray};

// Math
pub use cgmath::{Matrix4, Vector3, Vector4};
