mod common;

use prism3d::gfx::backend::software::SoftwareDevice;
use prism3d::gfx::backend::{BackendFactory, GraphicsDevice, TextureState};
use prism3d::gfx::rendering::passes::{PostProcessPass, RenderTargets};
use prism3d::gfx::rendering::PipelineManager;
use prism3d::prelude::*;

fn demo_scene() -> SceneGraph {
    let mut scene = SceneGraph::new();
    let glass = scene.add_material(Material::default().with_alpha(0.4).with_transparent(true));
    scene.add_root(SceneNode::primitive("ground", PrimitiveShape::Plane { width: 6.0, depth: 6.0 }));
    scene.add_root(
        SceneNode::primitive("cube", PrimitiveShape::unit_cube())
            .with_transform(Transform::from_position(Vector3::new(0.0, 0.5, 0.0))),
    );
    scene.add_root(
        SceneNode::primitive("glass", PrimitiveShape::unit_cube())
            .with_material(glass)
            .with_transform(Transform::from_position(Vector3::new(1.0, 0.5, 1.0))),
    );
    scene.add_root(SceneNode::light(
        "sun",
        Light::directional(Vector3::new(-0.3, -1.0, -0.2)).with_shadows(true),
    ));
    scene.add_root(SceneNode::light(
        "lamp",
        Light::point(Vector3::new(1.0, 2.0, 1.0), 6.0).with_shadows(true),
    ));
    scene
}

#[test]
fn test_render_before_initialize_is_an_error() {
    common::init_logging();
    let mut renderer = Renderer3D::new(Box::new(SoftwareDevice::new()), common::small_settings());
    let result = renderer.render(&demo_scene(), &Camera3D::default(), Color::BLACK, Color::WHITE, 0.1);
    assert_eq!(result, Err(RenderError::NotInitialized));
    assert_eq!(renderer.download_pixels(), Err(RenderError::NotInitialized));
    assert_eq!(renderer.resize(10, 10), Err(RenderError::NotInitialized));
}

#[test]
fn test_resize_round_trip_keeps_handle_count() -> anyhow::Result<()> {
    common::init_logging();
    let mut renderer = common::software_renderer(800, 600)?;
    let baseline = renderer.device().live_handle_count();

    renderer.resize(1920, 1080)?;
    assert_eq!(renderer.size(), Some((1920, 1080)));
    renderer.resize(800, 600)?;
    assert_eq!(renderer.device().live_handle_count(), baseline);
    Ok(())
}

#[test]
fn test_render_after_resize_reads_back_new_size() -> anyhow::Result<()> {
    let mut renderer = common::software_renderer(24, 16)?;
    let scene = demo_scene();
    let camera = Camera3D::new(Vector3::new(3.0, 3.0, 4.0), Vector3::new(0.0, 0.0, 0.0), 60.0, 1.5);
    renderer.render(&scene, &camera, Color::BLACK, Color::WHITE, 0.2)?;
    let live = renderer.device().live_handle_count();

    renderer.resize(12, 8)?;
    renderer.render(&scene, &camera, Color::BLACK, Color::WHITE, 0.2)?;
    assert_eq!(renderer.download_pixels()?.len(), 12 * 8 * 4);
    assert_eq!(renderer.device().live_handle_count(), live);

    let surface = renderer.create_surface()?;
    assert_eq!((surface.width, surface.height), (12, 8));
    assert_eq!(renderer.device().texture_state(surface.texture), Some(TextureState::ShaderRead));
    Ok(())
}

#[test]
fn test_dispose_is_idempotent_and_drop_safe() -> anyhow::Result<()> {
    let mut renderer = common::software_renderer(16, 16)?;
    renderer.render(&demo_scene(), &Camera3D::default(), Color::BLACK, Color::WHITE, 0.1)?;
    renderer.dispose();
    renderer.dispose();
    assert_eq!(renderer.device().live_handle_count(), 0);
    assert_eq!(
        renderer.render(&demo_scene(), &Camera3D::default(), Color::BLACK, Color::WHITE, 0.1),
        Err(RenderError::NotInitialized)
    );
    drop(renderer);
    Ok(())
}

#[test]
fn test_factory_falls_back_past_unavailable_backend() {
    common::init_logging();
    let mut factory = BackendFactory::empty();
    factory
        .register("missing", || None)
        .register("software", || Some(Box::new(SoftwareDevice::new()) as Box<dyn GraphicsDevice>))
        .set_preferred_order(["missing", "software"]);
    let device = factory.create().expect("software backend should construct");
    assert_eq!(device.backend_name(), "software");

    let renderer = Renderer3D::from_settings(common::small_settings().with_backend_order(["software"]));
    assert_eq!(renderer.map(|r| r.backend_name()).ok(), Some("software"));

    let unavailable = Renderer3D::from_settings(common::small_settings().with_backend_order(["nope"]));
    assert!(matches!(unavailable, Err(RenderError::BackendUnavailable(_))));
}

#[test]
fn test_sampling_before_transition_is_rejected() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::new();
    let mut pipelines = PipelineManager::new();
    let targets = RenderTargets::new(&mut device, 8, 8)?;
    let mut post = PostProcessPass::new(&mut device, &mut pipelines, &targets)?;
    let settings = PostProcessSettings::default();

    // the HDR target was never rendered or transitioned
    let result = post.execute(&mut device, &mut pipelines, &settings, Color::BLACK);
    assert!(matches!(result, Err(RenderError::InvalidState(_))), "{:?}", result);

    device.transition_for_sampling(targets.hdr())?;
    post.execute(&mut device, &mut pipelines, &settings, Color::BLACK)?;
    Ok(())
}

#[test]
fn test_picking_through_the_renderer() -> anyhow::Result<()> {
    let renderer = common::software_renderer(100, 100)?;
    let scene = demo_scene();
    let camera = Camera3D::new(Vector3::new(0.0, 0.5, 5.0), Vector3::new(0.0, 0.5, 0.0), 60.0, 1.0);
    let hit = renderer.hit_test(&scene, &camera, (50.0, 50.0)).expect("cube under center");
    assert_eq!(Some(hit.node), scene.find_by_name("cube"));

    let axis = renderer.gizmo_hit_test(
        (50.0, 50.0),
        &camera,
        Vector3::new(0.0, 0.5, 0.0),
        Vector3::new(0.0, 0.0, 0.0),
        GizmoMode::None,
    );
    assert_eq!(axis, GizmoAxis::None);
    Ok(())
}

#[test]
fn test_degenerate_camera_renders_nothing_and_picks_nothing() -> anyhow::Result<()> {
    common::init_logging();
    let mut renderer = common::software_renderer(64, 64)?;
    let scene = demo_scene();
    let good = Camera3D::new(Vector3::new(3.0, 3.0, 4.0), Vector3::new(0.0, 0.0, 0.0), 60.0, 1.0);
    renderer.render(&scene, &good, Color::BLACK, Color::WHITE, 0.2)?;

    let collapsed = Camera3D::new(Vector3::new(1.0, 1.0, 1.0), Vector3::new(1.0, 1.0, 1.0), 60.0, 1.0);
    let mut wide = good.clone();
    wide.set_fov_y(180.0);
    for camera in [&collapsed, &wide] {
        assert!(matches!(
            renderer.render(&scene, camera, Color::BLACK, Color::WHITE, 0.2),
            Err(RenderError::InvalidState(_))
        ));
        assert!(renderer.hit_test(&scene, camera, (32.0, 32.0)).is_none());
        assert!(renderer.hit_test_all(&scene, camera, (32.0, 32.0)).is_empty());
    }

    // a rejected frame leaves the renderer usable
    renderer.render(&scene, &good, Color::BLACK, Color::WHITE, 0.2)?;
    Ok(())
}
