mod common;

use prism3d::gfx::camera::Camera;
use prism3d::prelude::*;

fn ground_and_block(scene: &mut SceneGraph) {
    let ground = scene.add_material(Material::new(Color::rgb(0.8, 0.8, 0.8), 0.0, 0.8));
    scene.add_root(
        SceneNode::primitive("ground", PrimitiveShape::Plane { width: 10.0, depth: 10.0 })
            .with_material(ground)
            .with_shadows(false, true),
    );
    scene.add_root(
        SceneNode::primitive("block", PrimitiveShape::unit_cube())
            .with_transform(Transform::from_position(Vector3::new(0.0, 1.5, 0.0))),
    );
}

fn screen_position(camera: &Camera3D, point: Vector3<f32>, width: u32, height: u32) -> (u32, u32) {
    let clip = camera.build_view_projection_matrix() * point.extend(1.0);
    let ndc = clip.truncate() / clip.w;
    let x = (ndc.x + 1.0) * 0.5 * width as f32;
    let y = (1.0 - ndc.y) * 0.5 * height as f32;
    (x as u32, y as u32)
}

#[test]
fn test_shadowed_ground_is_darker() -> anyhow::Result<()> {
    common::init_logging();
    let (width, height) = (96, 96);
    let mut renderer = common::software_renderer(width, height)?;

    let mut scene = SceneGraph::new();
    ground_and_block(&mut scene);
    scene.add_root(SceneNode::light(
        "sun",
        Light::directional(Vector3::new(0.0, -1.0, 0.0))
            .with_intensity(3.0)
            .with_shadows(true),
    ));
    let camera = Camera3D::new(Vector3::new(0.0, 6.0, 8.0), Vector3::new(0.0, 0.0, 0.0), 50.0, 1.0);

    renderer.render(&scene, &camera, Color::BLACK, Color::WHITE, 0.1)?;
    let pixels = renderer.download_pixels()?;

    let (sx, sy) = screen_position(&camera, Vector3::new(0.0, 0.0, 0.0), width, height);
    let (lx, ly) = screen_position(&camera, Vector3::new(3.0, 0.0, 0.0), width, height);
    let shadowed = common::luminance(common::pixel(&pixels, width, sx, sy));
    let lit = common::luminance(common::pixel(&pixels, width, lx, ly));
    assert!(shadowed < lit, "shadowed {} should be darker than lit {}", shadowed, lit);

    let shadows = renderer.pipeline().unwrap().shadows();
    assert_eq!(shadows.assigned_2d().len(), 1);
    assert_eq!(shadows.shadow_infos().len(), 1);
    Ok(())
}

fn pixel_under_block(receive_shadows: bool, cast_shadows: bool) -> anyhow::Result<[u8; 4]> {
    let (width, height) = (64, 64);
    let mut renderer = common::software_renderer(width, height)?;
    let mut scene = SceneGraph::new();
    ground_and_block(&mut scene);
    let ground = scene.find_by_name("ground").unwrap();
    scene.node_mut(ground).unwrap().receive_shadows = receive_shadows;
    scene.add_root(SceneNode::light(
        "sun",
        Light::directional(Vector3::new(0.0, -1.0, 0.0))
            .with_intensity(3.0)
            .with_shadows(cast_shadows),
    ));
    let camera = Camera3D::new(Vector3::new(0.0, 6.0, 8.0), Vector3::new(0.0, 0.0, 0.0), 50.0, 1.0);

    renderer.render(&scene, &camera, Color::BLACK, Color::WHITE, 0.1)?;
    let pixels = renderer.download_pixels()?;
    let (x, y) = screen_position(&camera, Vector3::new(0.0, 0.0, 0.0), width, height);
    Ok(common::pixel(&pixels, width, x, y))
}

#[test]
fn test_receive_shadows_off_ignores_shadow_maps() -> anyhow::Result<()> {
    let ignored = pixel_under_block(false, true)?;
    let unshadowed = pixel_under_block(true, false)?;
    let shadowed = pixel_under_block(true, true)?;
    for channel in 0..3 {
        assert!(ignored[channel].abs_diff(unshadowed[channel]) <= 1, "{:?} vs {:?}", ignored, unshadowed);
    }
    assert!(common::luminance(shadowed) < common::luminance(unshadowed));
    Ok(())
}

#[test]
fn test_casters_beyond_capacity_render_unshadowed() -> anyhow::Result<()> {
    common::init_logging();
    let mut renderer = common::software_renderer(32, 32)?;
    let mut scene = SceneGraph::new();
    ground_and_block(&mut scene);
    for i in 0..5 {
        scene.add_root(SceneNode::light(
            format!("sun {}", i),
            Light::directional(Vector3::new(i as f32 * 0.1, -1.0, 0.0)).with_shadows(true),
        ));
    }
    scene.add_root(SceneNode::light(
        "lamp",
        Light::point(Vector3::new(0.0, 3.0, 0.0), 8.0).with_shadows(true),
    ));
    let camera = Camera3D::new(Vector3::new(0.0, 6.0, 8.0), Vector3::new(0.0, 0.0, 0.0), 50.0, 1.0);

    renderer.render(&scene, &camera, Color::BLACK, Color::WHITE, 0.1)?;

    let shadows = renderer.pipeline().unwrap().shadows();
    assert_eq!(shadows.assigned_2d().len(), 4);
    assert_eq!(shadows.shadow_index(4), -1);
    assert_eq!(shadows.assigned_cube().len(), 1);
    assert_eq!(shadows.shadow_index(5), 4);
    assert_eq!(shadows.shadow_infos().len(), 5);
    Ok(())
}

#[test]
fn test_disabled_shadows_render_without_slots() -> anyhow::Result<()> {
    let settings = common::small_settings()
        .with_shadows(ShadowSettings::default().with_enabled(false).with_shadow_map_size(16));
    let mut renderer = Renderer3D::new(
        Box::new(prism3d::gfx::backend::software::SoftwareDevice::new()),
        settings,
    );
    renderer.initialize(16, 16)?;
    let mut scene = SceneGraph::new();
    ground_and_block(&mut scene);
    scene.add_root(SceneNode::light(
        "sun",
        Light::directional(Vector3::new(0.0, -1.0, 0.0)).with_shadows(true),
    ));
    renderer.render(&scene, &Camera3D::default(), Color::BLACK, Color::WHITE, 0.1)?;
    assert!(renderer.pipeline().unwrap().shadows().assigned_2d().is_empty());
    Ok(())
}
