//! # Graphics Module
//!
//! Everything the prism3d renderer is made of, from the device abstraction up
//! to the [`Renderer3D`] façade.
//!
//! ## Architecture Overview
//!
//! - **Backends** ([`backend`]) - [`GraphicsDevice`](backend::GraphicsDevice) with wgpu and software implementations
//! - **Scene** ([`scene`]) - Arena scene graph, meshes, materials and lights
//! - **Resources** ([`resources`]) - Caches turning scene assets into device handles
//! - **Rendering** ([`rendering`]) - Deferred pipeline, passes and shadow maps
//! - **Picking** ([`picking`]) - Ray casts against the scene and transform gizmos
//! - **Shaders** ([`shaders`]) - Embedded WGSL, with [`shading`] as its CPU reference
//!
//! ## Usage
//!
//! ```no_run
//! use prism3d::gfx::backend::BackendFactory;
//! use prism3d::gfx::camera::Camera3D;
//! use prism3d::gfx::rendering::RenderSettings;
//! use prism3d::gfx::scene::{Color, SceneGraph};
//! use prism3d::gfx::Renderer3D;
//!
//! let device = BackendFactory::with_defaults().create().expect("no backend");
//! let mut renderer = Renderer3D::new(device, RenderSettings::default());
//! renderer.initialize(800, 600).unwrap();
//! renderer
//!     .render(&SceneGraph::new(), &Camera3D::default(), Color::BLACK, Color::WHITE, 0.2)
//!     .unwrap();
//! ```

pub mod backend;
pub mod camera;
pub mod error;
pub mod geometry;
pub mod picking;
pub mod renderer;
pub mod rendering;
pub mod resources;
pub mod scene;
pub mod shaders;
pub mod shading;

// Re-export commonly used types
pub use error::{RenderError, RenderResult};
pub use renderer::{RenderSurface, Renderer3D};
