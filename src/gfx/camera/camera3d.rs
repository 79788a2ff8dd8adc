//! Perspective scene camera with lazily cached matrices

use std::cell::Cell;

use cgmath::{Angle, Deg, EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, Vector3, Zero};

use super::camera_utils::{perspective_wgpu, Camera};

/// Look-at camera described by position, target and a vertical field of view
///
/// View and projection matrices are computed on first use and cached. Every
/// setter invalidates the cache, so reads after a change always see fresh
/// matrices.
///
/// Setters accept any value. A camera that cannot produce finite matrices
/// reports [`Camera3D::is_degenerate`] and yields all-zero matrices, which
/// have no inverse.
#[derive(Debug, Clone)]
pub struct Camera3D {
    position: Vector3<f32>,
    target: Vector3<f32>,
    up: Vector3<f32>,
    /// Vertical field of view in degrees
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
    view: Cell<Option<Matrix4<f32>>>,
    projection: Cell<Option<Matrix4<f32>>>,
}

impl Default for Camera3D {
    fn default() -> Self {
        Self::new(
            Vector3::new(0.0, 2.0, 5.0),
            Vector3::new(0.0, 0.0, 0.0),
            60.0,
            16.0 / 9.0,
        )
    }
}

impl Camera3D {
    pub fn new(position: Vector3<f32>, target: Vector3<f32>, fov_y: f32, aspect: f32) -> Self {
        Self {
            position,
            target,
            up: Vector3::unit_y(),
            fov_y,
            aspect,
            near: 0.1,
            far: 1000.0,
            view: Cell::new(None),
            projection: Cell::new(None),
        }
    }

    fn invalidate(&self) {
        self.view.set(None);
        self.projection.set(None);
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn target(&self) -> Vector3<f32> {
        self.target
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    /// Unit vector from the camera towards its target
    pub fn forward(&self) -> Vector3<f32> {
        let dir = self.target - self.position;
        if dir.magnitude2() > 1e-12 {
            dir.normalize()
        } else {
            -Vector3::unit_z()
        }
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        self.invalidate();
    }

    pub fn set_target(&mut self, target: Vector3<f32>) {
        self.target = target;
        self.invalidate();
    }

    pub fn set_up(&mut self, up: Vector3<f32>) {
        self.up = up;
        self.invalidate();
    }

    pub fn set_fov_y(&mut self, fov_y: f32) {
        self.fov_y = fov_y;
        self.invalidate();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.invalidate();
    }

    /// Sets the aspect from a viewport size, ignoring zero heights
    pub fn resize_projection(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.set_aspect(width as f32 / height as f32);
        }
    }

    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
        self.invalidate();
    }

    /// True when the view or projection cannot be built
    ///
    /// Covers coincident position and target, an up vector parallel to the
    /// view direction, non-finite values, a field of view outside (0°, 180°),
    /// a non-positive aspect and clip planes with `near <= 0` or `far <= near`.
    pub fn is_degenerate(&self) -> bool {
        !self.has_valid_view() || !self.has_valid_projection()
    }

    fn has_valid_view(&self) -> bool {
        let finite = |v: Vector3<f32>| v.x.is_finite() && v.y.is_finite() && v.z.is_finite();
        if !finite(self.position) || !finite(self.target) || !finite(self.up) {
            return false;
        }
        let dir = self.target - self.position;
        if dir.magnitude2() <= 1e-12 || self.up.magnitude2() <= 1e-12 {
            return false;
        }
        dir.normalize().cross(self.up.normalize()).magnitude2() > 1e-12
    }

    fn has_valid_projection(&self) -> bool {
        let fovy: Rad<f32> = Deg(self.fov_y).into();
        fovy > Rad::zero()
            && fovy < Rad::turn_div_2()
            && self.aspect > 0.0
            && self.aspect.is_finite()
            && self.near > 0.0
            && self.far > self.near
            && self.far.is_finite()
    }
}

impl Camera for Camera3D {
    fn view_matrix(&self) -> Matrix4<f32> {
        if let Some(view) = self.view.get() {
            return view;
        }
        if !self.has_valid_view() {
            return Matrix4::zero();
        }
        let view = Matrix4::look_at_rh(
            Point3::from_vec(self.position),
            Point3::from_vec(self.target),
            self.up,
        );
        self.view.set(Some(view));
        view
    }

    fn projection_matrix(&self) -> Matrix4<f32> {
        if let Some(projection) = self.projection.get() {
            return projection;
        }
        if !self.has_valid_projection() {
            return Matrix4::zero();
        }
        let projection = perspective_wgpu(Deg(self.fov_y).into(), self.aspect, self.near, self.far);
        self.projection.set(Some(projection));
        projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Transform, Vector4};

    #[test]
    fn test_setter_invalidates_cached_view() {
        let mut camera = Camera3D::new(Vector3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, 0.0), 60.0, 1.0);
        let before = camera.view_matrix();
        camera.set_position(Vector3::new(0.0, 0.0, 10.0));
        let after = camera.view_matrix();
        assert_ne!(before, after);

        let origin = after.transform_point(Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(origin.z, -10.0, epsilon = 1e-5);
    }

    #[test]
    fn test_target_projects_to_screen_center() {
        let camera = Camera3D::new(Vector3::new(3.0, 4.0, 5.0), Vector3::new(0.0, 1.0, 0.0), 45.0, 1.5);
        let clip = camera.build_view_projection_matrix() * Vector4::new(0.0, 1.0, 0.0, 1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
        let depth = clip.z / clip.w;
        assert!(depth > 0.0 && depth < 1.0);
    }

    #[test]
    fn test_degenerate_cameras_are_detected() {
        let valid = Camera3D::default();
        assert!(!valid.is_degenerate());

        let collapsed = Camera3D::new(Vector3::zero(), Vector3::zero(), 60.0, 1.0);
        assert!(collapsed.is_degenerate());
        assert_eq!(collapsed.view_matrix(), Matrix4::zero());

        let mut straight_down = Camera3D::new(Vector3::new(0.0, 5.0, 0.0), Vector3::zero(), 60.0, 1.0);
        assert!(straight_down.is_degenerate());
        straight_down.set_up(Vector3::unit_z());
        assert!(!straight_down.is_degenerate());

        for fov in [0.0, -10.0, 180.0, 270.0, f32::NAN] {
            let mut camera = Camera3D::default();
            camera.set_fov_y(fov);
            assert!(camera.is_degenerate(), "fov {}", fov);
            assert_eq!(camera.projection_matrix(), Matrix4::zero());
        }

        let mut flat = Camera3D::default();
        flat.set_aspect(0.0);
        assert!(flat.is_degenerate());

        let mut inverted = Camera3D::default();
        inverted.set_clip_planes(10.0, 1.0);
        assert!(inverted.is_degenerate());
        inverted.set_clip_planes(0.0, 10.0);
        assert!(inverted.is_degenerate());
    }
}
