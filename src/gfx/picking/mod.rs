//! # Object Picking System
//!
//! Ray casting against the scene graph for selecting objects with the mouse.
//!
//! ## How it works
//!
//! 1. **Screen to Ray**: [`Ray::from_screen`] unprojects a viewport point into a world-space ray
//! 2. **Broad phase**: the ray is moved into each mesh node's local space and tested against the mesh [`Aabb`]
//! 3. **Narrow phase**: boxes that are hit have their triangles tested with [`intersect_triangle`]
//! 4. **Selection**: hits are ordered by world-space distance
//!
//! ## Usage
//!
//! ```rust
//! use prism3d::gfx::camera::Camera3D;
//! use prism3d::gfx::geometry::PrimitiveShape;
//! use prism3d::gfx::picking::hit_test;
//! use prism3d::gfx::scene::{SceneGraph, SceneNode};
//! use cgmath::Vector3;
//!
//! let mut scene = SceneGraph::new();
//! let cube = scene.add_root(SceneNode::primitive("cube", PrimitiveShape::unit_cube()));
//! let camera = Camera3D::new(Vector3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, 0.0), 60.0, 1.0);
//!
//! let hit = hit_test(&scene, &camera, (50.0, 50.0), 100, 100).unwrap();
//! assert_eq!(hit.node, cube);
//! ```

pub mod gizmo;

use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector3, Vector4};

use crate::gfx::camera::{Camera, Camera3D};
use crate::gfx::scene::{NodeId, SceneGraph};

pub use gizmo::{gizmo_hit_test, gizmo_hit_test_ray, GizmoAxis, GizmoMode};

/// Directions closer to parallel with a slab than this are treated as parallel
const SLAB_EPSILON: f32 = 1e-6;
const TRIANGLE_EPSILON: f32 = 1e-8;

/// A 3D ray for intersection testing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vector3<f32>,
    /// Unit length unless built with [`Ray::unnormalized`]
    pub direction: Vector3<f32>,
}

impl Ray {
    /// Create a new ray with a normalized direction
    pub fn new(origin: Vector3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Ray whose parameter keeps the scale of `direction`
    ///
    /// A world ray moved into a scaled local space this way still reports hit
    /// parameters in world units.
    pub fn unnormalized(origin: Vector3<f32>, direction: Vector3<f32>) -> Self {
        Self { origin, direction }
    }

    /// Get a point along the ray at parameter t
    pub fn point_at(&self, t: f32) -> Vector3<f32> {
        self.origin + self.direction * t
    }

    /// Moves the ray by `matrix`, keeping the parameterisation
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Ray {
        let origin = matrix * self.origin.extend(1.0);
        let direction = matrix * self.direction.extend(0.0);
        Ray::unnormalized(origin.truncate() / origin.w, direction.truncate())
    }

    /// World-space ray through a viewport point
    ///
    /// `point` is in pixels with the origin at the top-left corner. Returns
    /// `None` for an empty viewport, a degenerate camera, matrices that cannot
    /// be inverted or a ray that is not finite.
    pub fn from_screen(point: (f32, f32), width: u32, height: u32, camera: &Camera3D) -> Option<Ray> {
        if width == 0 || height == 0 || camera.is_degenerate() {
            return None;
        }
        let ndc_x = 2.0 * point.0 / width as f32 - 1.0;
        let ndc_y = 1.0 - 2.0 * point.1 / height as f32;

        let inv_projection = camera.projection_matrix().invert()?;
        let inv_view = camera.view_matrix().invert()?;

        let unproject = |depth: f32| -> Option<Vector3<f32>> {
            let eye = inv_projection * Vector4::new(ndc_x, ndc_y, depth, 1.0);
            let world = inv_view * eye;
            if world.w.abs() < f32::EPSILON {
                return None;
            }
            Some(world.truncate() / world.w)
        };

        let near = unproject(0.0)?;
        let far = unproject(1.0)?;
        let direction = far - near;
        let finite = |v: Vector3<f32>| v.x.is_finite() && v.y.is_finite() && v.z.is_finite();
        if !finite(near) || !finite(direction) || direction.magnitude2() < f32::EPSILON {
            return None;
        }
        Some(Ray::new(near, direction))
    }
}

/// Axis-aligned bounding box for intersection testing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Aabb {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    /// Tightest box around `points`, `None` when there are none
    pub fn from_points(points: impl IntoIterator<Item = [f32; 3]>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = Vector3::from(points.next()?);
        let mut bounds = Self::new(first, first);
        for point in points {
            bounds.grow(Vector3::from(point));
        }
        Some(bounds)
    }

    fn grow(&mut self, point: Vector3<f32>) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        out.grow(other.min);
        out.grow(other.max);
        out
    }

    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn contains_point(&self, point: Vector3<f32>) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    /// Box around the 8 transformed corners
    pub fn transform(&self, matrix: &Matrix4<f32>) -> Self {
        let corners = [
            Vector3::new(self.min.x, self.min.y, self.min.z),
            Vector3::new(self.max.x, self.min.y, self.min.z),
            Vector3::new(self.min.x, self.max.y, self.min.z),
            Vector3::new(self.min.x, self.min.y, self.max.z),
            Vector3::new(self.max.x, self.max.y, self.min.z),
            Vector3::new(self.max.x, self.min.y, self.max.z),
            Vector3::new(self.min.x, self.max.y, self.max.z),
            Vector3::new(self.max.x, self.max.y, self.max.z),
        ];

        let first = transform_point(matrix, corners[0]);
        let mut out = Self::new(first, first);
        for corner in &corners[1..] {
            out.grow(transform_point(matrix, *corner));
        }
        out
    }

    /// Slab test returning the entry and exit parameters
    ///
    /// The interval may start behind the origin; it is `None` when the ray
    /// misses or when the box lies entirely behind it.
    pub fn intersect_ray_interval(&self, ray: &Ray) -> Option<(f32, f32)> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let direction = ray.direction[axis];
            if direction.abs() > SLAB_EPSILON {
                let mut t1 = (self.min[axis] - origin) / direction;
                let mut t2 = (self.max[axis] - origin) / direction;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return None;
                }
            } else if origin < self.min[axis] || origin > self.max[axis] {
                return None;
            }
        }

        (t_max >= 0.0).then_some((t_min, t_max))
    }

    /// Parameter of the first hit in front of the ray origin
    ///
    /// A ray starting inside the box reports the exit point.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let (t_min, t_max) = self.intersect_ray_interval(ray)?;
        Some(if t_min >= 0.0 { t_min } else { t_max })
    }
}

fn transform_point(matrix: &Matrix4<f32>, point: Vector3<f32>) -> Vector3<f32> {
    let p = matrix * point.extend(1.0);
    p.truncate() / p.w
}

/// Möller–Trumbore ray/triangle test
///
/// Both faces count as hits. Returns the ray parameter of the hit.
pub fn intersect_triangle(ray: &Ray, v0: Vector3<f32>, v1: Vector3<f32>, v2: Vector3<f32>) -> Option<f32> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);
    if a.abs() < TRIANGLE_EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    (t > TRIANGLE_EPSILON).then_some(t)
}

/// Result of a picking query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    pub node: NodeId,
    /// World-space distance from the ray origin
    pub distance: f32,
    /// World-space hit point
    pub point: Vector3<f32>,
}

/// Every visible mesh node hit by a world-space ray, closest first
pub fn raycast(scene: &SceneGraph, ray: &Ray) -> Vec<HitResult> {
    let mut hits = Vec::new();
    let mut stack: Vec<(NodeId, Matrix4<f32>)> = scene
        .roots()
        .iter()
        .rev()
        .map(|root| (*root, Matrix4::identity()))
        .collect();

    while let Some((id, parent_world)) = stack.pop() {
        let Some(node) = scene.node(id) else {
            continue;
        };
        if !node.enabled {
            continue;
        }
        let world = parent_world * node.transform.matrix();

        if let Some(distance) = hit_node_mesh(scene, id, &world, ray) {
            hits.push(HitResult {
                node: id,
                distance,
                point: ray.point_at(distance),
            });
        }

        for child in node.children().iter().rev() {
            stack.push((*child, world));
        }
    }

    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits
}

fn hit_node_mesh(scene: &SceneGraph, id: NodeId, world: &Matrix4<f32>, ray: &Ray) -> Option<f32> {
    let mesh = scene.mesh(scene.node_mesh(id)?)?;
    let inverse = world.invert()?;
    let local_ray = ray.transformed(&inverse);

    mesh.bounds()?.intersect_ray(&local_ray)?;

    mesh.triangles()
        .filter_map(|[a, b, c]| {
            intersect_triangle(&local_ray, Vector3::from(a), Vector3::from(b), Vector3::from(c))
        })
        .min_by(f32::total_cmp)
}

/// Closest visible object under a viewport point
pub fn hit_test(
    scene: &SceneGraph,
    camera: &Camera3D,
    point: (f32, f32),
    width: u32,
    height: u32,
) -> Option<HitResult> {
    hit_test_all(scene, camera, point, width, height).into_iter().next()
}

/// All visible objects under a viewport point, closest first
pub fn hit_test_all(
    scene: &SceneGraph,
    camera: &Camera3D,
    point: (f32, f32),
    width: u32,
    height: u32,
) -> Vec<HitResult> {
    match Ray::from_screen(point, width, height, camera) {
        Some(ray) => raycast(scene, &ray),
        None => Vec::new(),
    }
}

/// Closest hit plus the node ids from its root down to the hit node
pub fn hit_test_with_path(
    scene: &SceneGraph,
    camera: &Camera3D,
    point: (f32, f32),
    width: u32,
    height: u32,
) -> Option<(HitResult, Vec<NodeId>)> {
    let hit = hit_test(scene, camera, point, width, height)?;
    Some((hit, scene.path_to(hit.node)))
}
