mod common;

use approx::assert_relative_eq;
use cgmath::SquareMatrix;
use prism3d::gfx::picking::{raycast, Ray};
use prism3d::prelude::*;
use rand::Rng;

fn random_transform(rng: &mut impl Rng) -> Transform {
    Transform::from_position(Vector3::new(
        rng.random_range(-5.0..5.0),
        rng.random_range(-5.0..5.0),
        rng.random_range(-5.0..5.0),
    ))
    .with_rotation(Vector3::new(
        rng.random_range(-180.0..180.0),
        rng.random_range(-180.0..180.0),
        rng.random_range(-180.0..180.0),
    ))
    .with_uniform_scale(rng.random_range(0.5..2.0))
}

#[test]
fn test_world_matrix_composes_along_random_chains() {
    common::init_logging();
    let mut rng = rand::rng();

    for _ in 0..20 {
        let mut scene = SceneGraph::new();
        let depth = rng.random_range(1..8);
        let mut expected = Matrix4::identity();
        let mut parent: Option<NodeId> = None;
        let mut last = None;

        for level in 0..depth {
            let transform = random_transform(&mut rng);
            expected = expected * transform.matrix();
            let node = SceneNode::group(format!("level {}", level)).with_transform(transform);
            let id = match parent {
                Some(parent) => scene.add_child(parent, node).unwrap(),
                None => scene.add_root(node),
            };
            parent = Some(id);
            last = Some(id);
        }

        let world = scene.world_matrix(last.unwrap()).unwrap();
        assert_relative_eq!(world, expected, epsilon = 1e-3, max_relative = 1e-4);
    }
}

#[test]
fn test_snapshot_uses_world_matrices() {
    let mut scene = SceneGraph::new();
    let root = scene.add_root(
        SceneNode::group("root").with_transform(Transform::from_position(Vector3::new(1.0, 0.0, 0.0))),
    );
    let cube = scene
        .add_child(
            root,
            SceneNode::primitive("cube", PrimitiveShape::unit_cube())
                .with_transform(Transform::from_position(Vector3::new(0.0, 2.0, 0.0))),
        )
        .unwrap();

    let snapshot = scene.snapshot();
    assert_eq!(snapshot.objects.len(), 1);
    assert_eq!(snapshot.objects[0].node, Some(cube));
    assert_eq!(snapshot.objects[0].world, scene.world_matrix(cube).unwrap());

    scene.node_mut(root).unwrap().enabled = false;
    assert!(scene.snapshot().objects.is_empty());
}

#[test]
fn test_mesh_hits_lie_inside_world_bounds() {
    let mut rng = rand::rng();
    let mut scene = SceneGraph::new();
    for i in 0..10 {
        let shape = if i % 2 == 0 {
            PrimitiveShape::unit_cube()
        } else {
            PrimitiveShape::unit_sphere()
        };
        scene.add_root(SceneNode::primitive(format!("shape {}", i), shape).with_transform(random_transform(&mut rng)));
    }

    for _ in 0..200 {
        let origin = Vector3::new(
            rng.random_range(-15.0..15.0),
            rng.random_range(-15.0..15.0),
            rng.random_range(-15.0..15.0),
        );
        let target = Vector3::new(
            rng.random_range(-5.0..5.0),
            rng.random_range(-5.0..5.0),
            rng.random_range(-5.0..5.0),
        );
        let ray = Ray::new(origin, target - origin);

        for hit in raycast(&scene, &ray) {
            let bounds = scene.world_bounds(hit.node).unwrap();
            let (near, far) = bounds
                .intersect_ray_interval(&ray)
                .expect("mesh hit outside its world bounds");
            assert!(hit.distance >= near.max(0.0) - 1e-3, "{} < {}", hit.distance, near);
            assert!(hit.distance <= far + 1e-3, "{} > {}", hit.distance, far);
        }
    }
}
