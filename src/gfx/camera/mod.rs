pub mod camera3d;
pub mod camera_utils;

// Re-export main types
pub use camera3d::Camera3D;
pub use camera_utils::{ortho_wgpu, perspective_wgpu, Camera, OPENGL_TO_WGPU_MATRIX};
