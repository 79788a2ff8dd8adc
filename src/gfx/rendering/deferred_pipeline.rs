//! Frame orchestration for the deferred renderer
//!
//! One frame runs, in order:
//!
//! 1. shadow maps for every light that was given a slot
//! 2. opaque objects into the G-buffer
//! 3. full-screen lighting into the HDR target
//! 4. transparent objects, blended over the HDR target, back to front
//! 5. tone mapping into the RGBA8 output
//!
//! Every step talks to the device through [`GraphicsDevice`], so the order is
//! written once for all backends.

use cgmath::{InnerSpace, Matrix4, Vector3, Vector4, Zero};

use super::passes::{
    DrawItem, ForwardPass, GeometryPass, LightingPass, PostProcessPass, RenderTargets,
    SceneLightingBindings,
};
use super::pipeline_manager::PipelineManager;
use super::settings::RenderSettings;
use super::shadow_manager::{ShadowCaster, ShadowManager};
use crate::gfx::backend::{
    DescriptorBinding, DescriptorKind, DescriptorSetHandle, DescriptorSetLayoutDesc,
    DescriptorSetLayoutHandle, DescriptorWrite, GraphicsDevice, ShaderStages, TextureHandle,
};
use crate::gfx::camera::{Camera, Camera3D};
use crate::gfx::error::{RenderError, RenderResult};
use crate::gfx::picking::Aabb;
use crate::gfx::resources::uniform_buffer::UniformBuffer;
use crate::gfx::resources::uniforms::{matrix_to_array, LightingUniforms, ObjectUniforms};
use crate::gfx::resources::{AssetSource, MaterialCache, MeshCache, TextureCache};
use crate::gfx::scene::{Color, Light, LightKind, RenderObject};

/// Everything one frame is rendered from
pub struct FrameInput<'a> {
    pub camera: &'a Camera3D,
    pub objects: &'a [RenderObject],
    /// World-space lights; entries past the light limit are ignored
    pub lights: &'a [Light],
    pub assets: &'a dyn AssetSource,
    pub background: Color,
    pub ambient_color: Color,
    pub ambient_intensity: f32,
}

/// Bindings of the per-object descriptor set: a single [`ObjectUniforms`] buffer
pub fn object_layout_desc() -> DescriptorSetLayoutDesc<'static> {
    DescriptorSetLayoutDesc {
        label: "Object Descriptor Set",
        bindings: vec![DescriptorBinding {
            binding: 0,
            kind: DescriptorKind::UniformBuffer,
            stages: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
        }],
    }
}

struct ObjectSlot {
    ubo: UniformBuffer<ObjectUniforms>,
    set: DescriptorSetHandle,
}

/// Resolved per-object draw state for the current frame
struct PreparedObject {
    item: DrawItem,
    transparent: bool,
    cast_shadows: bool,
    /// World-space origin, used for back-to-front sorting
    origin: Vector3<f32>,
}

pub struct DeferredPipeline {
    settings: RenderSettings,
    targets: RenderTargets,
    object_layout: DescriptorSetLayoutHandle,
    object_slots: Vec<ObjectSlot>,
    pipelines: PipelineManager,
    scene_bindings: SceneLightingBindings,
    geometry: GeometryPass,
    lighting: LightingPass,
    forward: ForwardPass,
    post: PostProcessPass,
    shadows: ShadowManager,
    meshes: MeshCache,
    materials: MaterialCache,
    textures: TextureCache,
    disposed: bool,
}

impl DeferredPipeline {
    /// Creates every target, pass and pipeline for a `width` x `height` output
    pub fn new(
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
        settings: RenderSettings,
    ) -> RenderResult<Self> {
        let targets = RenderTargets::new(device, width, height)?;
        let object_layout = device.create_descriptor_set_layout(&object_layout_desc())?;
        let materials = MaterialCache::new(device)?;
        let shadows = ShadowManager::new(device, settings.shadows, object_layout)?;
        let scene_bindings =
            SceneLightingBindings::new(device, shadows.shadow_array(), shadows.shadow_cube_array())?;

        let mut pipelines = PipelineManager::new();
        let geometry = GeometryPass::new(
            device,
            &mut pipelines,
            &targets,
            object_layout,
            materials.layout(),
        )?;
        let lighting = LightingPass::new(device, &mut pipelines, &targets, scene_bindings.layout())?;
        let forward = ForwardPass::new(
            device,
            &mut pipelines,
            &targets,
            object_layout,
            materials.layout(),
            scene_bindings.layout(),
        )?;
        let post = PostProcessPass::new(device, &mut pipelines, &targets)?;
        pipelines.create_all_pipelines(device)?;

        log::info!(
            "Deferred pipeline ready at {}x{} on the {} backend",
            width,
            height,
            device.backend_name()
        );
        Ok(Self {
            settings,
            targets,
            object_layout,
            object_slots: Vec::new(),
            pipelines,
            scene_bindings,
            geometry,
            lighting,
            forward,
            post,
            shadows,
            meshes: MeshCache::new(),
            materials,
            textures: TextureCache::new(),
            disposed: false,
        })
    }

    pub fn width(&self) -> u32 {
        self.targets.width()
    }

    pub fn height(&self) -> u32 {
        self.targets.height()
    }

    /// Final RGBA8 image, left in the shader-read state after each frame
    pub fn output(&self) -> TextureHandle {
        self.targets.output()
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn shadows(&self) -> &ShadowManager {
        &self.shadows
    }

    pub fn pipelines(&self) -> &PipelineManager {
        &self.pipelines
    }

    pub fn mesh_cache(&self) -> &MeshCache {
        &self.meshes
    }

    pub fn material_cache(&self) -> &MaterialCache {
        &self.materials
    }

    /// Rebuilds every size-dependent target and framebuffer
    ///
    /// The new targets are created before the old ones are released, so a
    /// failed resize leaves the pipeline usable at its previous size.
    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> RenderResult<()> {
        let targets = RenderTargets::new(device, width, height)?;
        let old = std::mem::replace(&mut self.targets, targets);
        old.destroy(device);

        self.geometry.resize(device, &self.targets)?;
        self.lighting.resize(device, &self.targets)?;
        self.forward.resize(device, &self.targets)?;
        self.post.resize(device, &self.targets)?;
        log::info!("Render targets resized to {}x{}", width, height);
        Ok(())
    }

    /// Renders one frame into [`DeferredPipeline::output`]
    ///
    /// A camera without finite matrices is rejected with [`RenderError::InvalidState`]
    /// before any GPU work.
    pub fn render(&mut self, device: &mut dyn GraphicsDevice, frame: &FrameInput) -> RenderResult<()> {
        if frame.camera.is_degenerate() {
            return Err(RenderError::InvalidState(format!(
                "degenerate camera at {:?} looking at {:?} (fov {}, aspect {})",
                frame.camera.position(),
                frame.camera.target(),
                frame.camera.fov_y(),
                frame.camera.aspect()
            )));
        }
        let result = self.render_frame(device, frame);
        if result.is_err() {
            self.shadows.reset();
        }
        result
    }

    fn render_frame(&mut self, device: &mut dyn GraphicsDevice, frame: &FrameInput) -> RenderResult<()> {
        let max_lights = self.settings.effective_max_lights();
        let lights = if frame.lights.len() > max_lights {
            log::debug!(
                "{} lights submitted, only the first {} are used",
                frame.lights.len(),
                max_lights
            );
            &frame.lights[..max_lights]
        } else {
            frame.lights
        };

        let prepared = self.prepare_objects(device, frame, lights)?;

        // 1. shadows
        self.shadows.begin_frame()?;
        self.shadows.collect(lights)?;
        let casters: Vec<ShadowCaster> = prepared
            .iter()
            .filter(|object| object.cast_shadows)
            .map(|object| ShadowCaster {
                object_set: object.item.object_set,
                mesh: object.item.mesh,
            })
            .collect();
        let center = scene_center(frame.objects, frame.assets);
        self.shadows.render_shadows(device, &casters, center)?;
        self.shadows.prepare_for_sampling(device)?;

        let lighting = lighting_uniforms(frame, lights, |index| self.shadows.shadow_index(index));
        self.scene_bindings
            .update(device, &lighting, &self.shadows.shadow_uniforms())?;

        // 2. geometry
        let opaque: Vec<DrawItem> = prepared
            .iter()
            .filter(|object| !object.transparent)
            .map(|object| object.item)
            .collect();
        self.geometry.execute(device, &mut self.pipelines, &opaque)?;
        for texture in self.targets.gbuffer() {
            device.transition_for_sampling(texture)?;
        }

        // 3. lighting
        self.lighting
            .execute(device, &mut self.pipelines, &self.scene_bindings)?;

        // 4. transparent surfaces, farthest first
        let eye = frame.camera.position();
        let mut transparent: Vec<&PreparedObject> =
            prepared.iter().filter(|object| object.transparent).collect();
        transparent.sort_by(|a, b| {
            (b.origin - eye)
                .magnitude2()
                .total_cmp(&(a.origin - eye).magnitude2())
        });
        let transparent: Vec<DrawItem> = transparent.iter().map(|object| object.item).collect();
        self.forward
            .execute(device, &mut self.pipelines, &self.scene_bindings, &transparent)?;
        device.transition_for_sampling(self.targets.hdr())?;

        // 5. tone mapping
        self.post
            .execute(device, &mut self.pipelines, &self.settings.post, frame.background)?;
        device.transition_for_sampling(self.targets.output())?;

        self.shadows.end_frame()
    }

    /// Uploads meshes and materials and writes one object uniform block per draw
    fn prepare_objects(
        &mut self,
        device: &mut dyn GraphicsDevice,
        frame: &FrameInput,
        lights: &[Light],
    ) -> RenderResult<Vec<PreparedObject>> {
        let view = frame.camera.view_matrix();
        let projection = frame.camera.projection_matrix();
        let ambient = frame.ambient_color.scaled_rgb(frame.ambient_intensity);
        let (key_direction, key_color) = key_light(lights);

        self.materials.prune(device, frame.assets);
        self.textures.prune(device, frame.assets);
        self.meshes.prune(device, frame.assets);

        let mut prepared = Vec::with_capacity(frame.objects.len());
        for object in frame.objects {
            let Some(mesh) = self.meshes.get_or_create(device, object.mesh, frame.assets)? else {
                log::debug!("Skipping object with missing mesh {:?}", object.mesh);
                continue;
            };
            let material_set = self.materials.get_or_create(
                device,
                object.material,
                frame.assets,
                &mut self.textures,
            )?;
            let material_transparent = object
                .material
                .and_then(|id| frame.assets.material(id))
                .is_some_and(|material| material.transparent);

            let uniforms = ObjectUniforms {
                model: matrix_to_array(object.world),
                view: matrix_to_array(view),
                projection: matrix_to_array(projection),
                light_direction: key_direction,
                light_color: key_color,
                ambient_color: ambient,
                view_position: frame.camera.position().into(),
                receive_shadows: if object.receive_shadows { 1.0 } else { 0.0 },
                ..Default::default()
            };
            let object_set = self.object_slot(device, prepared.len(), &uniforms)?;

            prepared.push(PreparedObject {
                item: DrawItem {
                    object_set,
                    material_set,
                    mesh,
                },
                transparent: object.transparent || material_transparent,
                cast_shadows: object.cast_shadows,
                origin: world_origin(&object.world),
            });
        }
        Ok(prepared)
    }

    /// Object set `index`, growing the pool on demand
    fn object_slot(
        &mut self,
        device: &mut dyn GraphicsDevice,
        index: usize,
        uniforms: &ObjectUniforms,
    ) -> RenderResult<DescriptorSetHandle> {
        if let Some(slot) = self.object_slots.get_mut(index) {
            slot.ubo.update(device, uniforms)?;
            return Ok(slot.set);
        }

        let mut ubo = UniformBuffer::new_with_data(device, uniforms)?;
        let set = match device.create_descriptor_set(self.object_layout) {
            Ok(set) => set,
            Err(err) => {
                ubo.destroy(device);
                return Err(err);
            }
        };
        if let Err(err) = device.update_descriptor_set(set, &[DescriptorWrite::buffer(0, ubo.buffer())]) {
            device.destroy_descriptor_set(set);
            ubo.destroy(device);
            return Err(err);
        }
        self.object_slots.push(ObjectSlot { ubo, set });
        Ok(set)
    }

    /// Releases every device object. Safe to call more than once.
    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        for mut slot in self.object_slots.drain(..) {
            device.destroy_descriptor_set(slot.set);
            slot.ubo.destroy(device);
        }
        self.meshes.clear(device);
        self.materials.dispose(device);
        self.textures.clear(device);
        self.pipelines.dispose(device);
        self.geometry.dispose(device);
        self.lighting.dispose(device);
        self.forward.dispose(device);
        self.post.dispose(device);
        self.scene_bindings.dispose(device);
        self.shadows.dispose(device);
        device.destroy_descriptor_set_layout(self.object_layout);
        self.targets.destroy(device);
        log::debug!("Deferred pipeline disposed");
    }
}

fn world_origin(world: &Matrix4<f32>) -> Vector3<f32> {
    (world * Vector4::new(0.0, 0.0, 0.0, 1.0)).truncate()
}

/// Direction and color of the first directional light, for the object block
fn key_light(lights: &[Light]) -> ([f32; 3], [f32; 3]) {
    lights
        .iter()
        .find_map(|light| match light.kind {
            LightKind::Directional { direction, .. } => {
                Some((direction.into(), light.color.scaled_rgb(light.intensity)))
            }
            _ => None,
        })
        .unwrap_or(([0.0, -1.0, 0.0], [0.0; 3]))
}

/// Center of the union of every object's world bounds, origin when empty
pub fn scene_center(objects: &[RenderObject], assets: &dyn AssetSource) -> Vector3<f32> {
    objects
        .iter()
        .filter_map(|object| {
            let bounds = assets.mesh(object.mesh)?.bounds()?;
            Some(bounds.transform(&object.world))
        })
        .reduce(|a: Aabb, b| a.union(&b))
        .map_or(Vector3::zero(), |bounds| bounds.center())
}

fn lighting_uniforms(
    frame: &FrameInput,
    lights: &[Light],
    shadow_index: impl Fn(usize) -> i32,
) -> LightingUniforms {
    let mut uniforms = LightingUniforms {
        camera_position: frame.camera.position().into(),
        ambient_color: frame.ambient_color.scaled_rgb(frame.ambient_intensity),
        ..Default::default()
    };
    let mut count = 0;
    for (index, light) in lights.iter().enumerate() {
        if !light.enabled || count >= uniforms.lights.len() {
            continue;
        }
        uniforms.lights[count] = light.to_gpu(shadow_index(index));
        count += 1;
    }
    uniforms.light_count = count as i32;
    uniforms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::software::SoftwareDevice;
    use crate::gfx::backend::TextureState;
    use crate::gfx::geometry::PrimitiveShape;
    use crate::gfx::rendering::settings::ShadowSettings;
    use crate::gfx::scene::{Material, SceneGraph, SceneNode, Transform};
    use approx::assert_relative_eq;

    fn small_settings() -> RenderSettings {
        RenderSettings::default().with_shadows(
            ShadowSettings::default()
                .with_shadow_map_size(64)
                .with_cube_face_size(32),
        )
    }

    fn camera() -> Camera3D {
        Camera3D::new(Vector3::new(0.0, 3.0, 6.0), Vector3::new(0.0, 0.0, 0.0), 60.0, 1.0)
    }

    #[test]
    fn test_render_leaves_output_samplable() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        scene.add_root(SceneNode::primitive("cube", PrimitiveShape::unit_cube()));
        scene.add_root(SceneNode::light(
            "sun",
            Light::directional(Vector3::new(-0.3, -1.0, -0.2)).with_shadows(true),
        ));
        let snapshot = scene.snapshot();
        let lights = snapshot.lights();
        let camera = camera();

        let mut pipeline = DeferredPipeline::new(&mut device, 32, 32, small_settings()).unwrap();
        pipeline
            .render(
                &mut device,
                &FrameInput {
                    camera: &camera,
                    objects: &snapshot.objects,
                    lights: &lights,
                    assets: &scene,
                    background: Color::default(),
                    ambient_color: Color::default(),
                    ambient_intensity: 0.1,
                },
            )
            .unwrap();

        assert_eq!(device.texture_state(pipeline.output()), Some(TextureState::ShaderRead));
        assert_eq!(pipeline.shadows().assigned_2d().len(), 1);
        assert_eq!(pipeline.mesh_cache().len(), 1);
    }

    #[test]
    fn test_lights_are_truncated_to_the_limit() {
        let mut scene = SceneGraph::new();
        scene.add_root(SceneNode::primitive("cube", PrimitiveShape::unit_cube()));
        let snapshot = scene.snapshot();
        let lights: Vec<Light> = (0..12)
            .map(|i| Light::point(Vector3::new(i as f32, 1.0, 0.0), 5.0).with_shadows(true))
            .collect();
        let camera = camera();
        let frame = FrameInput {
            camera: &camera,
            objects: &snapshot.objects,
            lights: &lights,
            assets: &scene,
            background: Color::default(),
            ambient_color: Color::default(),
            ambient_intensity: 1.0,
        };
        let uniforms = lighting_uniforms(&frame, &lights[..8], |_| -1);
        assert_eq!(uniforms.light_count, 8);
        assert_eq!(uniforms.lights[7].position_or_direction, [7.0, 1.0, 0.0]);

        let mut device = SoftwareDevice::new();
        let mut pipeline = DeferredPipeline::new(&mut device, 16, 16, small_settings()).unwrap();
        pipeline.render(&mut device, &frame).unwrap();
        // the first four point lights take the cube slots
        let assigned: Vec<usize> = pipeline
            .shadows()
            .assigned_cube()
            .iter()
            .map(|a| a.light_index)
            .collect();
        assert_eq!(assigned, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_scene_center_is_union_of_world_bounds() {
        let mut scene = SceneGraph::new();
        scene.add_root(
            SceneNode::primitive("a", PrimitiveShape::unit_cube())
                .with_transform(Transform::from_position(Vector3::new(-2.0, 0.0, 0.0))),
        );
        scene.add_root(
            SceneNode::primitive("b", PrimitiveShape::unit_cube())
                .with_transform(Transform::from_position(Vector3::new(4.0, 2.0, 0.0))),
        );
        let snapshot = scene.snapshot();
        let center = scene_center(&snapshot.objects, &scene);
        assert_relative_eq!(center, Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-5);
        assert_eq!(scene_center(&[], &scene), Vector3::zero());
    }

    #[test]
    fn test_transparent_material_goes_forward() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        let glass = scene.add_material(Material::default().with_alpha(0.5).with_transparent(true));
        scene.add_root(SceneNode::primitive("glass", PrimitiveShape::unit_cube()).with_material(glass));
        let snapshot = scene.snapshot();
        let camera = camera();
        let frame = FrameInput {
            camera: &camera,
            objects: &snapshot.objects,
            lights: &[],
            assets: &scene,
            background: Color::default(),
            ambient_color: Color::default(),
            ambient_intensity: 1.0,
        };

        let mut pipeline = DeferredPipeline::new(&mut device, 16, 16, small_settings()).unwrap();
        let lights: Vec<Light> = Vec::new();
        let prepared = pipeline.prepare_objects(&mut device, &frame, &lights).unwrap();
        assert_eq!(prepared.len(), 1);
        assert!(prepared[0].transparent);
    }

    #[test]
    fn test_degenerate_camera_is_rejected() {
        let mut device = SoftwareDevice::new();
        let mut scene = SceneGraph::new();
        scene.add_root(SceneNode::primitive("cube", PrimitiveShape::unit_cube()));
        let snapshot = scene.snapshot();
        let mut pipeline = DeferredPipeline::new(&mut device, 16, 16, small_settings()).unwrap();

        let mut zero_fov = camera();
        zero_fov.set_fov_y(0.0);
        let collapsed = Camera3D::new(Vector3::zero(), Vector3::zero(), 60.0, 1.0);
        for camera in [&zero_fov, &collapsed] {
            let result = pipeline.render(
                &mut device,
                &FrameInput {
                    camera,
                    objects: &snapshot.objects,
                    lights: &[],
                    assets: &scene,
                    background: Color::default(),
                    ambient_color: Color::default(),
                    ambient_intensity: 1.0,
                },
            );
            assert!(matches!(result, Err(RenderError::InvalidState(_))));
        }
        assert!(pipeline.mesh_cache().is_empty());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut device = SoftwareDevice::new();
        let mut pipeline = DeferredPipeline::new(&mut device, 16, 16, small_settings()).unwrap();
        pipeline.dispose(&mut device);
        pipeline.dispose(&mut device);
        assert_eq!(device.live_handle_count(), 0);
    }
}
