mod common;

use prism3d::gfx::backend::software::SoftwareDevice;
use prism3d::gfx::backend::{BufferDesc, BufferUsage, MemoryProperties, TextureDesc, TextureFormat, TextureUsage};
use prism3d::gfx::resources::{MaterialCache, MeshCache, TextureCache};
use prism3d::prelude::*;

#[test]
fn test_mesh_cache_identity_and_invalidation() -> anyhow::Result<()> {
    common::init_logging();
    let mut device = SoftwareDevice::new();
    let mut scene = SceneGraph::new();
    let mesh = scene.add_mesh(PrimitiveShape::unit_cube().to_mesh());
    let mut cache = MeshCache::new();

    let first = cache.get_or_create(&mut device, mesh, &scene)?.unwrap();
    let again = cache.get_or_create(&mut device, mesh, &scene)?.unwrap();
    assert_eq!(first, again);
    let live = device.live_handle_count();

    assert!(cache.invalidate(&mut device, mesh));
    assert_eq!(device.live_handle_count(), live - 2);
    assert!(!device.destroy_buffer(first.vertex_buffer));

    let rebuilt = cache.get_or_create(&mut device, mesh, &scene)?.unwrap();
    assert_ne!(rebuilt.vertex_buffer, first.vertex_buffer);
    assert_eq!(device.live_handle_count(), live);
    Ok(())
}

#[test]
fn test_mesh_edit_reuploads_on_next_request() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::new();
    let mut scene = SceneGraph::new();
    let mesh = scene.add_mesh(PrimitiveShape::unit_cube().to_mesh());
    let mut cache = MeshCache::new();
    let before = cache.get_or_create(&mut device, mesh, &scene)?.unwrap();
    let live = device.live_handle_count();

    let plane = PrimitiveShape::Plane { width: 1.0, depth: 1.0 }.to_mesh();
    scene.set_mesh_geometry(mesh, plane.vertices().to_vec(), plane.indices().to_vec());
    let after = cache.get_or_create(&mut device, mesh, &scene)?.unwrap();
    assert_ne!(before.vertex_buffer, after.vertex_buffer);
    assert_eq!(after.index_count, plane.index_count());
    assert_eq!(device.live_handle_count(), live);

    scene.remove_mesh(mesh);
    assert!(cache.get_or_create(&mut device, mesh, &scene)?.is_none());
    assert!(cache.is_empty());
    Ok(())
}

#[test]
fn test_empty_mesh_still_gets_buffers() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::new();
    let mut scene = SceneGraph::new();
    let mesh = scene.add_mesh(Mesh::new(Vec::new(), Vec::new()));
    let mut cache = MeshCache::new();
    let gpu = cache.get_or_create(&mut device, mesh, &scene)?.unwrap();
    assert_eq!(gpu.index_count, 0);
    Ok(())
}

#[test]
fn test_material_sets_are_stable_across_frames() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::new();
    let mut scene = SceneGraph::new();
    let texture = scene.add_texture(TextureData::solid([10, 20, 30, 255]));
    let id = scene.add_material(Material::default().with_albedo_texture(texture));
    let mut textures = TextureCache::new();
    let mut materials = MaterialCache::new(&mut device)?;

    let first = materials.get_or_create(&mut device, Some(id), &scene, &mut textures)?;
    scene.material_mut(id).unwrap().roughness = 0.2;
    let second = materials.get_or_create(&mut device, Some(id), &scene, &mut textures)?;
    assert_eq!(first, second);
    assert_eq!(materials.len(), 1);
    assert_eq!(textures.len(), 1);

    materials.dispose(&mut device);
    textures.clear(&mut device);
    assert_eq!(device.live_handle_count(), 0);
    Ok(())
}

#[test]
fn test_destroy_twice_is_harmless() {
    let mut device = SoftwareDevice::new();
    let buffer = device
        .create_buffer(&BufferDesc {
            label: "scratch",
            size: 64,
            usage: BufferUsage::UNIFORM,
            memory: MemoryProperties::HOST_SHARED,
        })
        .unwrap();
    let texture = device
        .create_texture(&TextureDesc::d2(
            "scratch",
            4,
            4,
            TextureFormat::Rgba8Unorm,
            TextureUsage::SAMPLED,
        ))
        .unwrap();

    assert!(device.destroy_buffer(buffer));
    assert!(!device.destroy_buffer(buffer));
    assert!(device.destroy_texture(texture));
    assert!(!device.destroy_texture(texture));
    assert_eq!(device.live_handle_count(), 0);
}

#[test]
fn test_replaced_assets_release_their_handles_across_frames() -> anyhow::Result<()> {
    common::init_logging();
    let mut renderer = common::software_renderer(32, 32)?;
    let camera = Camera3D::new(Vector3::new(0.0, 2.0, 5.0), Vector3::new(0.0, 0.0, 0.0), 60.0, 1.0);
    let mut scene = SceneGraph::new();

    let mesh = scene.add_mesh(PrimitiveShape::unit_cube().to_mesh());
    let material = scene.add_material(Material::default().with_color(1.0, 0.0, 0.0));
    let node = scene.add_root(SceneNode::mesh("first", mesh).with_material(material));
    renderer.render(&scene, &camera, Color::BLACK, Color::WHITE, 0.2)?;
    let live = renderer.device().live_handle_count();

    scene.remove_node(node);
    scene.remove_mesh(mesh);
    scene.remove_material(material);
    let mesh = scene.add_mesh(PrimitiveShape::unit_cube().to_mesh());
    let material = scene.add_material(Material::default().with_color(0.0, 0.0, 1.0));
    scene.add_root(SceneNode::mesh("second", mesh).with_material(material));
    renderer.render(&scene, &camera, Color::BLACK, Color::WHITE, 0.2)?;

    let pipeline = renderer.pipeline().unwrap();
    assert_eq!(pipeline.mesh_cache().len(), 1);
    assert_eq!(pipeline.material_cache().len(), 1);
    assert_eq!(renderer.device().live_handle_count(), live);

    renderer.dispose();
    assert_eq!(renderer.device().live_handle_count(), 0);
    Ok(())
}
