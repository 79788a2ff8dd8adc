//! High-level renderer façade
//!
//! [`Renderer3D`] owns a graphics device and, once initialized, a
//! [`DeferredPipeline`] sized to the output. It renders a [`SceneGraph`] (or an
//! explicit object list) into an RGBA8 texture that a compositor can sample
//! through [`RenderSurface`] or copy out with [`Renderer3D::download_pixels`].
//!
//! ```no_run
//! use prism3d::gfx::camera::Camera3D;
//! use prism3d::gfx::renderer::Renderer3D;
//! use prism3d::gfx::rendering::RenderSettings;
//! use prism3d::gfx::scene::{Color, SceneGraph};
//!
//! let mut renderer = Renderer3D::from_settings(RenderSettings::from_env())?;
//! renderer.initialize(640, 480)?;
//! let scene = SceneGraph::new();
//! renderer.render(&scene, &Camera3D::default(), Color::BLACK, Color::WHITE, 0.1)?;
//! let rgba = renderer.download_pixels()?;
//! assert_eq!(rgba.len(), 640 * 480 * 4);
//! # Ok::<(), prism3d::gfx::error::RenderError>(())
//! ```

use cgmath::Vector3;

use crate::gfx::backend::{BackendFactory, GraphicsDevice, TextureFormat, TextureHandle};
use crate::gfx::camera::Camera3D;
use crate::gfx::error::{RenderError, RenderResult};
use crate::gfx::picking::{self, GizmoAxis, GizmoMode, HitResult};
use crate::gfx::rendering::passes::{targets::validate_size, OUTPUT_FORMAT};
use crate::gfx::rendering::{DeferredPipeline, FrameInput, RenderSettings};
use crate::gfx::resources::AssetSource;
use crate::gfx::scene::{Color, Light, NodeId, RenderObject, SceneGraph};

/// The renderer's output texture as seen by a compositor
///
/// The texture stays owned by the renderer and is replaced on resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSurface {
    pub texture: TextureHandle,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

pub struct Renderer3D {
    device: Box<dyn GraphicsDevice>,
    settings: RenderSettings,
    pipeline: Option<DeferredPipeline>,
}

impl Renderer3D {
    pub fn new(device: Box<dyn GraphicsDevice>, settings: RenderSettings) -> Self {
        log::info!("Renderer created on the {} backend", device.backend_name());
        Self {
            device,
            settings,
            pipeline: None,
        }
    }

    /// Picks the first available backend from `settings.backend_order`
    pub fn from_settings(settings: RenderSettings) -> RenderResult<Self> {
        let device = BackendFactory::with_defaults()
            .create_with_order(&settings.backend_order)
            .ok_or_else(|| RenderError::BackendUnavailable(settings.backend_order.join(", ")))?;
        Ok(Self::new(device, settings))
    }

    pub fn backend_name(&self) -> &'static str {
        self.device.backend_name()
    }

    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn is_initialized(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn pipeline(&self) -> Option<&DeferredPipeline> {
        self.pipeline.as_ref()
    }

    /// Output size, `None` before [`Renderer3D::initialize`]
    pub fn size(&self) -> Option<(u32, u32)> {
        self.pipeline
            .as_ref()
            .map(|pipeline| (pipeline.width(), pipeline.height()))
    }

    /// Creates the pipeline and its targets. Calling it again resizes.
    pub fn initialize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        validate_size(width, height)?;
        if self.pipeline.is_some() {
            log::warn!("Renderer already initialized, resizing to {}x{}", width, height);
            return self.resize(width, height);
        }
        let pipeline = DeferredPipeline::new(self.device.as_mut(), width, height, self.settings.clone())?;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Recreates the size-dependent targets; same size is a no-op
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        validate_size(width, height)?;
        let pipeline = self.pipeline.as_mut().ok_or(RenderError::NotInitialized)?;
        if pipeline.width() == width && pipeline.height() == height {
            return Ok(());
        }
        pipeline.resize(self.device.as_mut(), width, height)
    }

    /// Renders the visible part of `scene`
    pub fn render(
        &mut self,
        scene: &SceneGraph,
        camera: &Camera3D,
        background: Color,
        ambient_color: Color,
        ambient_intensity: f32,
    ) -> RenderResult<()> {
        let snapshot = scene.snapshot();
        let lights = snapshot.lights();
        self.render_objects(
            camera,
            &snapshot.objects,
            &lights,
            scene,
            background,
            ambient_color,
            ambient_intensity,
        )
    }

    /// Renders an explicit object and light list
    ///
    /// `lights` are in world space. Meshes, materials and textures are read
    /// from `assets`.
    #[allow(clippy::too_many_arguments)]
    pub fn render_objects(
        &mut self,
        camera: &Camera3D,
        objects: &[RenderObject],
        lights: &[Light],
        assets: &dyn AssetSource,
        background: Color,
        ambient_color: Color,
        ambient_intensity: f32,
    ) -> RenderResult<()> {
        let pipeline = self.pipeline.as_mut().ok_or(RenderError::NotInitialized)?;
        pipeline.render(
            self.device.as_mut(),
            &FrameInput {
                camera,
                objects,
                lights,
                assets,
                background,
                ambient_color,
                ambient_intensity,
            },
        )
    }

    /// Handle to the last rendered image
    pub fn create_surface(&self) -> RenderResult<RenderSurface> {
        let pipeline = self.pipeline.as_ref().ok_or(RenderError::NotInitialized)?;
        Ok(RenderSurface {
            texture: pipeline.output(),
            width: pipeline.width(),
            height: pipeline.height(),
            format: OUTPUT_FORMAT,
        })
    }

    /// Last rendered image as tightly packed RGBA8 rows, top row first
    pub fn download_pixels(&mut self) -> RenderResult<Vec<u8>> {
        let pipeline = self.pipeline.as_ref().ok_or(RenderError::NotInitialized)?;
        let output = pipeline.output();
        let expected = pipeline.width() as usize * pipeline.height() as usize * 4;
        let pixels = self.device.read_texture(output, 0)?;
        if pixels.len() != expected {
            return Err(RenderError::Readback(format!(
                "expected {} bytes, device returned {}",
                expected,
                pixels.len()
            )));
        }
        Ok(pixels)
    }

    /// Closest object under `point`, in output pixels
    pub fn hit_test(&self, scene: &SceneGraph, camera: &Camera3D, point: (f32, f32)) -> Option<HitResult> {
        let (width, height) = self.size()?;
        picking::hit_test(scene, camera, point, width, height)
    }

    /// Every object under `point`, closest first
    pub fn hit_test_all(&self, scene: &SceneGraph, camera: &Camera3D, point: (f32, f32)) -> Vec<HitResult> {
        match self.size() {
            Some((width, height)) => picking::hit_test_all(scene, camera, point, width, height),
            None => Vec::new(),
        }
    }

    /// Closest hit and the node path from its root
    pub fn hit_test_with_path(
        &self,
        scene: &SceneGraph,
        camera: &Camera3D,
        point: (f32, f32),
    ) -> Option<(HitResult, Vec<NodeId>)> {
        let (width, height) = self.size()?;
        picking::hit_test_with_path(scene, camera, point, width, height)
    }

    /// Gizmo handle under `point`; `rotation` is in degrees
    pub fn gizmo_hit_test(
        &self,
        point: (f32, f32),
        camera: &Camera3D,
        position: Vector3<f32>,
        rotation: Vector3<f32>,
        mode: GizmoMode,
    ) -> GizmoAxis {
        match self.size() {
            Some((width, height)) => {
                picking::gizmo_hit_test(point, width, height, camera, position, rotation, mode)
            }
            None => GizmoAxis::None,
        }
    }

    /// Releases every device object the renderer created. Safe to call more
    /// than once; the renderer can be initialized again afterwards.
    pub fn dispose(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.dispose(self.device.as_mut());
            if let Err(err) = self.device.wait_idle() {
                log::warn!("Device did not go idle on dispose: {}", err);
            }
            log::info!("Renderer disposed");
        }
    }
}

impl Drop for Renderer3D {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::software::SoftwareDevice;
    use crate::gfx::geometry::PrimitiveShape;
    use crate::gfx::rendering::ShadowSettings;
    use crate::gfx::scene::SceneNode;

    fn renderer() -> Renderer3D {
        let settings = RenderSettings::default().with_shadows(
            ShadowSettings::default()
                .with_shadow_map_size(64)
                .with_cube_face_size(32),
        );
        Renderer3D::new(Box::new(SoftwareDevice::new()), settings)
    }

    fn camera() -> Camera3D {
        Camera3D::new(Vector3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, 0.0), 60.0, 1.0)
    }

    #[test]
    fn test_render_before_initialize_fails() {
        let mut renderer = renderer();
        let scene = SceneGraph::new();
        let result = renderer.render(&scene, &camera(), Color::BLACK, Color::WHITE, 0.1);
        assert_eq!(result, Err(RenderError::NotInitialized));
        assert_eq!(renderer.create_surface(), Err(RenderError::NotInitialized));
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let mut renderer = renderer();
        assert_eq!(
            renderer.initialize(0, 10),
            Err(RenderError::InvalidSize { width: 0, height: 10 })
        );
        renderer.initialize(8, 8).unwrap();
        assert!(matches!(renderer.resize(8, 0), Err(RenderError::InvalidSize { .. })));
        assert_eq!(renderer.size(), Some((8, 8)));
    }

    #[test]
    fn test_same_size_resize_keeps_surface() {
        let mut renderer = renderer();
        renderer.initialize(16, 16).unwrap();
        let before = renderer.create_surface().unwrap();
        renderer.resize(16, 16).unwrap();
        assert_eq!(renderer.create_surface().unwrap(), before);

        renderer.resize(32, 8).unwrap();
        let after = renderer.create_surface().unwrap();
        assert_ne!(after.texture, before.texture);
        assert_eq!((after.width, after.height), (32, 8));
        assert_eq!(after.format, TextureFormat::Rgba8Unorm);
    }

    #[test]
    fn test_download_has_background_where_empty() {
        let mut renderer = renderer();
        renderer.initialize(4, 4).unwrap();
        let scene = SceneGraph::new();
        renderer
            .render(&scene, &camera(), Color::new(1.0, 0.0, 0.0, 1.0), Color::WHITE, 0.1)
            .unwrap();
        let pixels = renderer.download_pixels().unwrap();
        assert_eq!(pixels.len(), 4 * 4 * 4);
        assert!(pixels.chunks(4).all(|px| px == [255, 0, 0, 255]));
    }

    #[test]
    fn test_hit_test_uses_output_size() {
        let mut renderer = renderer();
        let mut scene = SceneGraph::new();
        let cube = scene.add_root(SceneNode::primitive("cube", PrimitiveShape::unit_cube()));
        assert!(renderer.hit_test(&scene, &camera(), (50.0, 50.0)).is_none());

        renderer.initialize(100, 100).unwrap();
        let hit = renderer.hit_test(&scene, &camera(), (50.0, 50.0)).unwrap();
        assert_eq!(hit.node, cube);
        let (_, path) = renderer.hit_test_with_path(&scene, &camera(), (50.0, 50.0)).unwrap();
        assert_eq!(path, vec![cube]);
        assert!(renderer.hit_test_all(&scene, &camera(), (1.0, 1.0)).is_empty());
    }

    #[test]
    fn test_dispose_twice_releases_everything() {
        let mut renderer = renderer();
        renderer.initialize(8, 8).unwrap();
        renderer.dispose();
        renderer.dispose();
        assert_eq!(renderer.device().live_handle_count(), 0);
        assert!(!renderer.is_initialized());
    }
}
