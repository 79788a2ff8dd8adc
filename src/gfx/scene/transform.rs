//! Local transforms of scene nodes

use cgmath::{Deg, Matrix4, Vector3};

/// Position, Euler rotation in degrees and scale
///
/// Rotation is applied as yaw (Y), then pitch (X), then roll (Z):
/// `R = Ry(rotation.y) * Rx(rotation.x) * Rz(rotation.z)`. The local matrix
/// is `T * R * S`, so scale applies first and translation last.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    /// Pitch (x), yaw (y) and roll (z) in degrees
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    pub fn from_position(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation_degrees: Vector3<f32>) -> Self {
        self.rotation = rotation_degrees;
        self
    }

    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_uniform_scale(self, scale: f32) -> Self {
        self.with_scale(Vector3::new(scale, scale, scale))
    }

    /// Rotation from Euler angles in degrees, yaw-pitch-roll order
    pub fn rotation_matrix_from_degrees(rotation: Vector3<f32>) -> Matrix4<f32> {
        Matrix4::from_angle_y(Deg(rotation.y))
            * Matrix4::from_angle_x(Deg(rotation.x))
            * Matrix4::from_angle_z(Deg(rotation.z))
    }

    pub fn rotation_matrix(&self) -> Matrix4<f32> {
        Self::rotation_matrix_from_degrees(self.rotation)
    }

    /// Local-to-parent matrix
    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * self.rotation_matrix()
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Point3, Transform as _};

    #[test]
    fn test_scale_then_rotate_then_translate() {
        let transform = Transform::from_position(Vector3::new(10.0, 0.0, 0.0))
            .with_rotation(Vector3::new(0.0, 90.0, 0.0))
            .with_uniform_scale(2.0);
        let p = transform.matrix().transform_point(Point3::new(1.0, 0.0, 0.0));
        // (1,0,0) scaled to (2,0,0), yawed 90 degrees to (0,0,-2), then moved
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, -2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_roll_applies_before_yaw() {
        let transform = Transform::default().with_rotation(Vector3::new(0.0, 90.0, 90.0));
        // Roll takes +X to +Y, and yaw leaves +Y alone
        let p = transform.matrix().transform_point(Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-5);
    }
}
