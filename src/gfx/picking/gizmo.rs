//! Hit testing for the transform gizmo handles
//!
//! The gizmo is drawn by the editor; this module only answers which handle
//! sits under the cursor. Handle sizes are in gizmo-local units and are a
//! little larger than the drawn handles so they are easy to grab.

use std::f32::consts::TAU;

use cgmath::{InnerSpace, Matrix, Vector3};

use super::{Aabb, Ray};
use crate::gfx::camera::Camera3D;
use crate::gfx::scene::Transform;

const ARROW_LENGTH: f32 = 1.0;
const ARROW_RADIUS: f32 = 0.08;
const ARROW_TIP_SCALE: f32 = 1.5;
const RING_RADIUS: f32 = 0.8;
const RING_THICKNESS: f32 = 0.08;
const RING_SIDE_SAMPLES: usize = 8;
const SCALE_LINE_LENGTH: f32 = 0.8;
const SCALE_LINE_RADIUS: f32 = 0.05;
const SCALE_CUBE_SIZE: f32 = 0.12;
const CENTER_CUBE_SIZE: f32 = 0.15;
const PLANE_OFFSET: f32 = 0.0;
const PLANE_SIZE: f32 = 0.2;
const PLANE_PADDING: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GizmoMode {
    #[default]
    None,
    Translate,
    Rotate,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GizmoAxis {
    #[default]
    None,
    X,
    Y,
    Z,
    XY,
    YZ,
    ZX,
    /// Uniform scale handle
    All,
}

/// Handle under a viewport point
///
/// `rotation` is the target's Euler rotation in degrees. Rotate and scale
/// handles follow it; translate handles stay world-aligned.
pub fn gizmo_hit_test(
    point: (f32, f32),
    width: u32,
    height: u32,
    camera: &Camera3D,
    position: Vector3<f32>,
    rotation: Vector3<f32>,
    mode: GizmoMode,
) -> GizmoAxis {
    if mode == GizmoMode::None {
        return GizmoAxis::None;
    }
    match Ray::from_screen(point, width, height, camera) {
        Some(ray) => gizmo_hit_test_ray(&ray, position, rotation, mode)
            .map(|(axis, _)| axis)
            .unwrap_or(GizmoAxis::None),
        None => GizmoAxis::None,
    }
}

/// Closest handle hit by a world-space ray and its ray parameter
pub fn gizmo_hit_test_ray(
    ray: &Ray,
    position: Vector3<f32>,
    rotation: Vector3<f32>,
    mode: GizmoMode,
) -> Option<(GizmoAxis, f32)> {
    let local = match mode {
        GizmoMode::None => return None,
        GizmoMode::Translate => Ray::unnormalized(ray.origin - position, ray.direction),
        GizmoMode::Rotate | GizmoMode::Scale => {
            // Pure rotation: the inverse is the transpose
            let inverse = Transform::rotation_matrix_from_degrees(rotation).transpose();
            let origin = (inverse * (ray.origin - position).extend(1.0)).truncate();
            let direction = (inverse * ray.direction.extend(0.0)).truncate();
            Ray::new(origin, direction)
        }
    };

    let mut closest: Option<(GizmoAxis, f32)> = None;
    let mut consider = |axis: GizmoAxis, distance: Option<f32>| {
        if let Some(distance) = distance {
            if closest.map_or(true, |(_, best)| distance < best) {
                closest = Some((axis, distance));
            }
        }
    };

    let axes = [
        (GizmoAxis::X, Vector3::unit_x()),
        (GizmoAxis::Y, Vector3::unit_y()),
        (GizmoAxis::Z, Vector3::unit_z()),
    ];
    for (axis, direction) in axes {
        let distance = match mode {
            GizmoMode::Translate => arrow_hit(&local, direction, ARROW_LENGTH, ARROW_RADIUS),
            GizmoMode::Rotate => ring_hit(&local, direction),
            GizmoMode::Scale => scale_handle_hit(&local, direction),
            GizmoMode::None => None,
        };
        consider(axis, distance);
    }

    match mode {
        GizmoMode::Translate => {
            let planes = [
                (GizmoAxis::XY, Vector3::unit_x(), Vector3::unit_y()),
                (GizmoAxis::YZ, Vector3::unit_y(), Vector3::unit_z()),
                (GizmoAxis::ZX, Vector3::unit_z(), Vector3::unit_x()),
            ];
            for (axis, a, b) in planes {
                consider(axis, plane_quad_hit(&local, a, b));
            }
        }
        GizmoMode::Scale => consider(GizmoAxis::All, cube_hit(&local, Vector3::new(0.0, 0.0, 0.0), CENTER_CUBE_SIZE)),
        GizmoMode::Rotate | GizmoMode::None => {}
    }

    closest
}

/// Infinite cylinder around `axis` clipped to `[0, length]`, with a sphere cap at the tip
fn arrow_hit(ray: &Ray, axis: Vector3<f32>, length: f32, radius: f32) -> Option<f32> {
    let w = ray.origin;
    let d_dot_a = ray.direction.dot(axis);
    let w_dot_a = w.dot(axis);

    let a = ray.direction.dot(ray.direction) - d_dot_a * d_dot_a;
    let b = 2.0 * (ray.direction.dot(w) - d_dot_a * w_dot_a);
    let c = w.dot(w) - w_dot_a * w_dot_a - radius * radius;

    let shaft = smallest_non_negative_root(a, b, c)
        .filter(|t| (0.0..=length).contains(&ray.point_at(*t).dot(axis)));
    shaft.or_else(|| sphere_hit(ray, axis * length, radius * ARROW_TIP_SCALE))
}

fn ring_hit(ray: &Ray, axis: Vector3<f32>) -> Option<f32> {
    let denom = ray.direction.dot(axis);
    if denom.abs() < 0.001 {
        return ring_side_hit(ray, axis);
    }

    let t = -ray.origin.dot(axis) / denom;
    if t < 0.0 {
        return None;
    }
    let hit = ray.point_at(t);
    let radial = (hit - axis * hit.dot(axis)).magnitude();
    let inner = RING_RADIUS - RING_THICKNESS;
    let outer = RING_RADIUS + RING_THICKNESS;
    (inner..=outer).contains(&radial).then_some(t)
}

/// Edge-on rings are approximated by spheres spaced around the circle
fn ring_side_hit(ray: &Ray, axis: Vector3<f32>) -> Option<f32> {
    let up = if axis.dot(Vector3::unit_y()).abs() < 0.99 {
        Vector3::unit_y()
    } else {
        Vector3::unit_x()
    };
    let tangent1 = axis.cross(up).normalize();
    let tangent2 = axis.cross(tangent1).normalize();

    (0..RING_SIDE_SAMPLES)
        .filter_map(|i| {
            let angle = i as f32 * TAU / RING_SIDE_SAMPLES as f32;
            let center = (tangent1 * angle.cos() + tangent2 * angle.sin()) * RING_RADIUS;
            sphere_hit(ray, center, RING_THICKNESS)
        })
        .min_by(f32::total_cmp)
}

fn scale_handle_hit(ray: &Ray, axis: Vector3<f32>) -> Option<f32> {
    let line = arrow_hit(ray, axis, SCALE_LINE_LENGTH, SCALE_LINE_RADIUS);
    let cube = cube_hit(ray, axis * SCALE_LINE_LENGTH, SCALE_CUBE_SIZE);
    match (line, cube) {
        (Some(line), Some(cube)) => Some(line.min(cube)),
        (line, cube) => line.or(cube),
    }
}

fn plane_quad_hit(ray: &Ray, axis1: Vector3<f32>, axis2: Vector3<f32>) -> Option<f32> {
    let normal = axis1.cross(axis2).normalize();
    let denom = ray.direction.dot(normal);
    if denom.abs() < 1e-4 {
        return None;
    }

    let center_offset = PLANE_OFFSET + PLANE_SIZE * 0.5;
    let center = axis1 * center_offset + axis2 * center_offset;
    let t = (center - ray.origin).dot(normal) / denom;
    if t < 0.0 {
        return None;
    }

    let hit = ray.point_at(t);
    let bounds = (PLANE_OFFSET - PLANE_PADDING)..=(PLANE_OFFSET + PLANE_SIZE + PLANE_PADDING);
    (bounds.contains(&hit.dot(axis1)) && bounds.contains(&hit.dot(axis2))).then_some(t)
}

fn sphere_hit(ray: &Ray, center: Vector3<f32>, radius: f32) -> Option<f32> {
    let oc = ray.origin - center;
    let a = ray.direction.dot(ray.direction);
    let b = 2.0 * oc.dot(ray.direction);
    let c = oc.dot(oc) - radius * radius;
    smallest_non_negative_root(a, b, c)
}

fn cube_hit(ray: &Ray, center: Vector3<f32>, size: f32) -> Option<f32> {
    let half = Vector3::new(size, size, size) * 0.5;
    Aabb::new(center - half, center + half).intersect_ray(ray)
}

fn smallest_non_negative_root(a: f32, b: f32, c: f32) -> Option<f32> {
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 || a.abs() < f32::EPSILON {
        return None;
    }
    let sqrt = discriminant.sqrt();
    let near = (-b - sqrt) / (2.0 * a);
    if near >= 0.0 {
        return Some(near);
    }
    let far = (-b + sqrt) / (2.0 * a);
    (far >= 0.0).then_some(far)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down_ray(x: f32, z: f32) -> Ray {
        Ray::new(Vector3::new(x, 5.0, z), Vector3::new(0.0, -1.0, 0.0))
    }

    fn zero() -> Vector3<f32> {
        Vector3::new(0.0, 0.0, 0.0)
    }

    #[test]
    fn test_translate_arrow_hit() {
        let hit = gizmo_hit_test_ray(&down_ray(0.6, 0.0), zero(), zero(), GizmoMode::Translate);
        assert_eq!(hit.map(|(axis, _)| axis), Some(GizmoAxis::X));
    }

    #[test]
    fn test_translate_plane_quad_hit() {
        let ray = Ray::new(Vector3::new(0.1, 0.1, 5.0), Vector3::new(0.0, 0.0, -1.0));
        let hit = gizmo_hit_test_ray(&ray, zero(), zero(), GizmoMode::Translate);
        assert_eq!(hit.map(|(axis, _)| axis), Some(GizmoAxis::XY));
    }

    #[test]
    fn test_translate_ignores_rotation() {
        let rotated = Vector3::new(0.0, 90.0, 0.0);
        let hit = gizmo_hit_test_ray(&down_ray(0.6, 0.0), zero(), rotated, GizmoMode::Translate);
        assert_eq!(hit.map(|(axis, _)| axis), Some(GizmoAxis::X));
    }

    #[test]
    fn test_rotate_ring_hit_follows_rotation() {
        // Looking down Y at the ring around Y, between the edge-on samples of the Z ring
        let (x, z) = (0.8 * 22.5f32.to_radians().cos(), 0.8 * 22.5f32.to_radians().sin());
        let hit = gizmo_hit_test_ray(&down_ray(x, z), zero(), zero(), GizmoMode::Rotate);
        assert_eq!(hit.map(|(axis, _)| axis), Some(GizmoAxis::Y));

        // Rolled 90 degrees about Z the Y ring faces along X
        let ray = Ray::new(Vector3::new(5.0, x, z), Vector3::new(-1.0, 0.0, 0.0));
        let rolled = Vector3::new(0.0, 0.0, 90.0);
        let hit = gizmo_hit_test_ray(&ray, zero(), rolled, GizmoMode::Rotate);
        assert_eq!(hit.map(|(axis, _)| axis), Some(GizmoAxis::Y));
    }

    #[test]
    fn test_scale_center_cube_is_all() {
        // Diagonal view so no end cube lies in front of the center
        let position = Vector3::new(3.0, 0.0, 0.0);
        let ray = Ray::new(position + Vector3::new(2.0, 2.0, 2.0), Vector3::new(-1.0, -1.0, -1.0));
        let hit = gizmo_hit_test_ray(&ray, position, zero(), GizmoMode::Scale);
        assert_eq!(hit.map(|(axis, _)| axis), Some(GizmoAxis::All));
    }

    #[test]
    fn test_mode_none_and_miss() {
        assert!(gizmo_hit_test_ray(&down_ray(0.6, 0.0), zero(), zero(), GizmoMode::None).is_none());
        assert!(gizmo_hit_test_ray(&down_ray(3.0, 3.0), zero(), zero(), GizmoMode::Translate).is_none());
    }

    #[test]
    fn test_screen_query_through_camera() {
        let camera = Camera3D::new(Vector3::new(3.0, 3.0, 3.0), zero(), 60.0, 1.0);
        let axis = gizmo_hit_test((50.0, 50.0), 100, 100, &camera, zero(), zero(), GizmoMode::Scale);
        assert_eq!(axis, GizmoAxis::All);
        let none = gizmo_hit_test((50.0, 50.0), 100, 100, &camera, zero(), zero(), GizmoMode::None);
        assert_eq!(none, GizmoAxis::None);
    }
}
