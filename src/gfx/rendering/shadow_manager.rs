//! Shadow map allocation and rendering
//!
//! Directional and spot lights render into layers of one `D2Array` depth
//! texture; point lights render six faces each into a `CubeArray` depth
//! texture. Every view is drawn into a single-layer scratch target first and
//! then copied into its layer, so framebuffers never reference array layers.
//!
//! A frame walks the manager through a fixed sequence of states:
//!
//! ```text
//! Idle --begin_frame--> Collecting --render_shadows--> Rendering
//!      <--end_frame---- Prepared   <--prepare_for_sampling--
//! ```
//!
//! Any call out of that order fails with [`RenderError::InvalidState`].

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3};

use super::pipeline_manager::{PipelineConfig, PipelineManager};
use super::settings::ShadowSettings;
use crate::gfx::backend::{
    CubeFace, CullMode, DescriptorBinding, DescriptorKind, DescriptorSetHandle,
    DescriptorSetLayoutDesc, DescriptorSetLayoutHandle, DescriptorWrite, DrawCall, FramebufferDesc,
    FramebufferHandle, GraphicsDevice, LoadOp, PassRecording, RenderPassDesc, RenderPassHandle,
    ShaderProgram, ShaderStages, TextureDesc, TextureDimension, TextureFormat, TextureHandle,
    TextureUsage,
};
use crate::gfx::camera::{ortho_wgpu, perspective_wgpu};
use crate::gfx::error::{RenderError, RenderResult};
use crate::gfx::resources::mesh_cache::GpuMesh;
use crate::gfx::resources::uniform_buffer::UniformBuffer;
use crate::gfx::resources::uniforms::{
    matrix_to_array, ShadowInfo, ShadowUniforms, ShadowViewUniforms, MAX_SHADOWS, SHADOW_TYPE_2D,
    SHADOW_TYPE_CUBE,
};
use crate::gfx::scene::{Light, LightKind};
use crate::gfx::shading::CUBE_FACE_VIEWS;

/// Near plane of every light-space projection
pub const SHADOW_NEAR_PLANE: f32 = 0.1;

const SHADOW_PIPELINE: &str = "shadow_depth";
const POINT_SHADOW_PIPELINE: &str = "point_shadow_depth";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowState {
    Idle,
    Collecting,
    Rendering,
    Prepared,
}

/// A shadow-casting light that received a slot this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowAssignment {
    /// Position of the light in the list given to [`ShadowManager::collect`]
    pub light_index: usize,
    /// Array layer (2D) or cube index (point)
    pub slot: u32,
    /// Position of the light's record in [`ShadowManager::shadow_infos`]
    pub info_index: usize,
    pub light: Light,
}

/// Mesh buffers and object descriptor set of one shadow-casting draw
#[derive(Debug, Clone, Copy)]
pub struct ShadowCaster {
    pub object_set: DescriptorSetHandle,
    pub mesh: GpuMesh,
}

fn up_for(direction: Vector3<f32>) -> Vector3<f32> {
    if direction.dot(Vector3::unit_y()).abs() > 0.99 {
        Vector3::unit_z()
    } else {
        Vector3::unit_y()
    }
}

fn normalized_or_down(direction: Vector3<f32>) -> Vector3<f32> {
    if direction.magnitude2() > 1e-12 {
        direction.normalize()
    } else {
        -Vector3::unit_y()
    }
}

/// Light-space view-projection and eye position of a directional light
///
/// The eye sits half the shadow distance behind `center` and looks at it
/// through an orthographic box `extent` units wide.
pub fn directional_light_view_proj(
    direction: Vector3<f32>,
    center: Vector3<f32>,
    shadow_distance: f32,
    extent: f32,
) -> (Matrix4<f32>, Vector3<f32>) {
    let direction = normalized_or_down(direction);
    let position = center - direction * shadow_distance * 0.5;
    let view = Matrix4::look_at_rh(
        Point3::from_vec(position),
        Point3::from_vec(center),
        up_for(direction),
    );
    let half = extent * 0.5;
    let projection = ortho_wgpu(-half, half, -half, half, SHADOW_NEAR_PLANE, shadow_distance);
    (projection * view, position)
}

/// Cone angle of a spot light shadow projection, in radians
pub fn spot_shadow_fov(outer_angle: f32) -> f32 {
    (outer_angle * 2.0)
        .to_radians()
        .clamp(0.1, std::f32::consts::PI - 0.1)
}

pub fn spot_light_view_proj(
    position: Vector3<f32>,
    direction: Vector3<f32>,
    outer_angle: f32,
    range: f32,
) -> Matrix4<f32> {
    let direction = normalized_or_down(direction);
    let view = Matrix4::look_to_rh(Point3::from_vec(position), direction, up_for(direction));
    let projection = perspective_wgpu(Rad(spot_shadow_fov(outer_angle)), 1.0, SHADOW_NEAR_PLANE, range);
    projection * view
}

/// View-projection of one 90 degree cube face around a point light
pub fn point_face_view_proj(position: Vector3<f32>, face: CubeFace, range: f32) -> Matrix4<f32> {
    let (forward, up) = CUBE_FACE_VIEWS[face as usize];
    let view = Matrix4::look_to_rh(
        Point3::from_vec(position),
        Vector3::from(forward),
        Vector3::from(up),
    );
    let projection = perspective_wgpu(
        Rad(std::f32::consts::FRAC_PI_2),
        1.0,
        SHADOW_NEAR_PLANE,
        range,
    );
    projection * view
}

fn view_layout_desc() -> DescriptorSetLayoutDesc<'static> {
    DescriptorSetLayoutDesc {
        label: "Shadow View Descriptor Set",
        bindings: vec![DescriptorBinding {
            binding: 0,
            kind: DescriptorKind::UniformBuffer,
            stages: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
        }],
    }
}

/// Depth targets, pipelines and per-frame slot assignment for shadow maps
pub struct ShadowManager {
    settings: ShadowSettings,
    state: ShadowState,
    shadow_array: TextureHandle,
    shadow_cube_array: TextureHandle,
    scratch_2d: TextureHandle,
    scratch_cube: TextureHandle,
    depth_pass: RenderPassHandle,
    framebuffer_2d: FramebufferHandle,
    framebuffer_cube: FramebufferHandle,
    view_layout: DescriptorSetLayoutHandle,
    view_ubo: UniformBuffer<ShadowViewUniforms>,
    view_set: DescriptorSetHandle,
    pipelines: PipelineManager,
    assigned_2d: Vec<ShadowAssignment>,
    assigned_cube: Vec<ShadowAssignment>,
    infos: Vec<ShadowInfo>,
}

impl ShadowManager {
    /// Creates shadow textures and pipelines
    ///
    /// `object_layout` is the per-object descriptor set layout the casters'
    /// `object_set`s were created with; it is bound at set 1.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        settings: ShadowSettings,
        object_layout: DescriptorSetLayoutHandle,
    ) -> RenderResult<Self> {
        let settings = settings.clamped();
        let map_size = settings.shadow_map_size;
        let face_size = settings.cube_face_size;

        let shadow_array = device.create_texture(&TextureDesc {
            label: "Shadow Map Array",
            width: map_size,
            height: map_size,
            layers: settings.max_shadow_maps_2d.max(1) as u32,
            dimension: TextureDimension::D2Array,
            format: TextureFormat::Depth32Float,
            usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
        })?;
        let shadow_cube_array = device.create_texture(&TextureDesc {
            label: "Shadow Cube Map Array",
            width: face_size,
            height: face_size,
            layers: 6 * settings.max_shadow_maps_cube.max(1) as u32,
            dimension: TextureDimension::CubeArray,
            format: TextureFormat::Depth32Float,
            usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
        })?;
        let scratch_usage = TextureUsage::RENDER_TARGET | TextureUsage::TRANSFER_SRC;
        let scratch_2d = device.create_texture(&TextureDesc::d2(
            "Shadow Scratch Depth",
            map_size,
            map_size,
            TextureFormat::Depth32Float,
            scratch_usage,
        ))?;
        let scratch_cube = device.create_texture(&TextureDesc::d2(
            "Shadow Cube Face Scratch Depth",
            face_size,
            face_size,
            TextureFormat::Depth32Float,
            scratch_usage,
        ))?;

        let depth_pass = device.create_render_pass(&RenderPassDesc {
            label: "Shadow Depth Pass",
            color_formats: Vec::new(),
            depth_format: Some(TextureFormat::Depth32Float),
            color_load: LoadOp::Clear,
            depth_load: LoadOp::Clear,
        })?;
        let framebuffer_2d = device.create_framebuffer(&FramebufferDesc {
            label: "Shadow Map Framebuffer",
            render_pass: depth_pass,
            color_attachments: Vec::new(),
            depth_attachment: Some(scratch_2d),
            width: map_size,
            height: map_size,
        })?;
        let framebuffer_cube = device.create_framebuffer(&FramebufferDesc {
            label: "Shadow Cube Face Framebuffer",
            render_pass: depth_pass,
            color_attachments: Vec::new(),
            depth_attachment: Some(scratch_cube),
            width: face_size,
            height: face_size,
        })?;

        let view_layout = device.create_descriptor_set_layout(&view_layout_desc())?;
        let view_ubo = UniformBuffer::new(device)?;
        let view_set = device.create_descriptor_set(view_layout)?;
        device.update_descriptor_set(view_set, &[DescriptorWrite::buffer(0, view_ubo.buffer())])?;

        // No culling - both faces write depth so thin geometry does not leak light
        let mut pipelines = PipelineManager::new();
        pipelines.register_pipeline(
            SHADOW_PIPELINE,
            PipelineConfig::new(ShaderProgram::ShadowDepth, depth_pass)
                .with_label("Shadow Depth Pipeline")
                .with_cull_mode(CullMode::None)
                .with_vertex_only()
                .with_set_layouts(vec![view_layout, object_layout]),
        );
        pipelines.register_pipeline(
            POINT_SHADOW_PIPELINE,
            PipelineConfig::new(ShaderProgram::PointShadowDepth, depth_pass)
                .with_label("Point Shadow Depth Pipeline")
                .with_cull_mode(CullMode::None)
                .with_set_layouts(vec![view_layout, object_layout]),
        );
        pipelines.create_all_pipelines(device)?;

        log::debug!(
            "Shadow manager ready: {} x {}px 2D maps, {} x {}px cube maps",
            settings.max_shadow_maps_2d,
            map_size,
            settings.max_shadow_maps_cube,
            face_size
        );

        Ok(Self {
            settings,
            state: ShadowState::Idle,
            shadow_array,
            shadow_cube_array,
            scratch_2d,
            scratch_cube,
            depth_pass,
            framebuffer_2d,
            framebuffer_cube,
            view_layout,
            view_ubo,
            view_set,
            pipelines,
            assigned_2d: Vec::new(),
            assigned_cube: Vec::new(),
            infos: Vec::new(),
        })
    }

    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    pub fn state(&self) -> ShadowState {
        self.state
    }

    fn expect_state(&self, expected: ShadowState, operation: &str) -> RenderResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RenderError::InvalidState(format!(
                "shadow manager {} requires state {:?}, found {:?}",
                operation, expected, self.state
            )))
        }
    }

    /// Idle -> Collecting; forgets the previous frame's assignments
    pub fn begin_frame(&mut self) -> RenderResult<()> {
        self.expect_state(ShadowState::Idle, "begin_frame")?;
        self.assigned_2d.clear();
        self.assigned_cube.clear();
        self.infos.clear();
        self.state = ShadowState::Collecting;
        Ok(())
    }

    /// Assigns shadow slots to casting lights in list order
    ///
    /// Directional and spot lights share the 2D slots, point lights take cube
    /// slots. Casters beyond the configured capacity render unshadowed.
    pub fn collect(&mut self, lights: &[Light]) -> RenderResult<()> {
        self.expect_state(ShadowState::Collecting, "collect")?;
        self.assigned_2d.clear();
        self.assigned_cube.clear();
        if !self.settings.enabled {
            return Ok(());
        }

        let mut info_index = 0;
        for (light_index, light) in lights.iter().enumerate() {
            if !light.enabled || !light.cast_shadows {
                continue;
            }
            if info_index >= MAX_SHADOWS {
                log::debug!("Shadow record limit reached, light {} renders unshadowed", light_index);
                continue;
            }
            let (assigned, capacity) = if light.is_point() {
                (&mut self.assigned_cube, self.settings.max_shadow_maps_cube)
            } else {
                (&mut self.assigned_2d, self.settings.max_shadow_maps_2d)
            };
            if assigned.len() >= capacity {
                log::debug!(
                    "No free {} shadow slot for light {}, skipping its shadow",
                    if light.is_point() { "cube" } else { "2D" },
                    light_index
                );
                continue;
            }
            assigned.push(ShadowAssignment {
                light_index,
                slot: assigned.len() as u32,
                info_index,
                light: *light,
            });
            info_index += 1;
        }
        Ok(())
    }

    /// Index into this frame's shadow records for the light at `light_index`, -1 for none
    pub fn shadow_index(&self, light_index: usize) -> i32 {
        self.assigned_2d
            .iter()
            .chain(&self.assigned_cube)
            .find(|a| a.light_index == light_index)
            .map_or(-1, |a| a.info_index as i32)
    }

    /// Renders every assigned shadow view (Collecting -> Rendering)
    ///
    /// `scene_center` anchors the orthographic view of directional lights.
    pub fn render_shadows(
        &mut self,
        device: &mut dyn GraphicsDevice,
        casters: &[ShadowCaster],
        scene_center: Vector3<f32>,
    ) -> RenderResult<()> {
        self.expect_state(ShadowState::Collecting, "render_shadows")?;
        self.state = ShadowState::Rendering;

        let count = self.assigned_2d.len() + self.assigned_cube.len();
        self.infos = vec![ShadowInfo::default(); count];

        for assignment in self.assigned_2d.clone() {
            let (view_proj, position, far_plane) = match assignment.light.kind {
                LightKind::Directional {
                    direction,
                    shadow_distance,
                    shadow_extent,
                } => {
                    let (view_proj, position) = directional_light_view_proj(
                        direction,
                        scene_center,
                        shadow_distance,
                        shadow_extent,
                    );
                    (view_proj, position, shadow_distance)
                }
                LightKind::Spot {
                    position,
                    direction,
                    range,
                    outer_angle,
                    ..
                } => (
                    spot_light_view_proj(position, direction, outer_angle, range),
                    position,
                    range,
                ),
                LightKind::Point { .. } => continue,
            };

            self.view_ubo
                .update(device, &ShadowViewUniforms::new(view_proj, position, far_plane))?;
            let pipeline = self.pipelines.get_pipeline(device, SHADOW_PIPELINE)?;
            let label = format!("Shadow Map {}", assignment.slot);
            self.draw_casters(device, &label, self.framebuffer_2d, pipeline, casters)?;
            device.copy_texture_to_array_layer(self.scratch_2d, self.shadow_array, assignment.slot)?;

            self.infos[assignment.info_index] = ShadowInfo {
                light_view_proj: matrix_to_array(view_proj),
                light_position: position.into(),
                far_plane,
                shadow_map_index: assignment.slot as i32,
                shadow_type: SHADOW_TYPE_2D,
                bias: assignment.light.shadow.bias,
                normal_bias: assignment.light.shadow.normal_bias,
                strength: assignment.light.shadow.strength,
                ..Default::default()
            };
        }

        for assignment in self.assigned_cube.clone() {
            let LightKind::Point { position, range, .. } = assignment.light.kind else {
                continue;
            };
            let pipeline = self.pipelines.get_pipeline(device, POINT_SHADOW_PIPELINE)?;
            for face in CubeFace::ALL {
                let view_proj = point_face_view_proj(position, face, range);
                self.view_ubo
                    .update(device, &ShadowViewUniforms::new(view_proj, position, range))?;
                let label = format!("Point Shadow {} Face {:?}", assignment.slot, face);
                self.draw_casters(device, &label, self.framebuffer_cube, pipeline, casters)?;
                device.copy_texture_to_cube_face(
                    self.scratch_cube,
                    self.shadow_cube_array,
                    assignment.slot,
                    face,
                )?;
            }

            self.infos[assignment.info_index] = ShadowInfo {
                light_view_proj: matrix_to_array(Matrix4::identity()),
                light_position: position.into(),
                far_plane: range,
                shadow_map_index: assignment.slot as i32,
                shadow_type: SHADOW_TYPE_CUBE,
                bias: assignment.light.shadow.bias,
                normal_bias: assignment.light.shadow.normal_bias,
                strength: assignment.light.shadow.strength,
                ..Default::default()
            };
        }

        log::trace!(
            "Rendered {} 2D and {} cube shadow maps for {} casters",
            self.assigned_2d.len(),
            self.assigned_cube.len(),
            casters.len()
        );
        Ok(())
    }

    fn draw_casters(
        &self,
        device: &mut dyn GraphicsDevice,
        label: &str,
        framebuffer: FramebufferHandle,
        pipeline: crate::gfx::backend::PipelineHandle,
        casters: &[ShadowCaster],
    ) -> RenderResult<()> {
        let mut pass = PassRecording::new(label, framebuffer);
        for caster in casters {
            pass.push(DrawCall {
                pipeline,
                descriptor_sets: vec![self.view_set, caster.object_set],
                vertex_buffer: Some(caster.mesh.vertex_buffer),
                index_buffer: Some(caster.mesh.index_buffer),
                count: caster.mesh.index_count,
            });
        }
        device.execute_pass(&pass)
    }

    /// Makes both shadow textures samplable (Rendering -> Prepared)
    pub fn prepare_for_sampling(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        self.expect_state(ShadowState::Rendering, "prepare_for_sampling")?;
        device.transition_for_sampling(self.shadow_array)?;
        device.transition_for_sampling(self.shadow_cube_array)?;
        self.state = ShadowState::Prepared;
        Ok(())
    }

    /// Prepared -> Idle. Shadow records stay readable until the next `begin_frame`.
    pub fn end_frame(&mut self) -> RenderResult<()> {
        self.expect_state(ShadowState::Prepared, "end_frame")?;
        self.state = ShadowState::Idle;
        Ok(())
    }

    /// Returns to Idle after a frame was abandoned part way
    pub fn reset(&mut self) {
        if self.state != ShadowState::Idle {
            log::debug!("Shadow manager reset from {:?}", self.state);
        }
        self.state = ShadowState::Idle;
    }

    /// This frame's shadow records, indexed by `GpuLight::shadow_index`
    pub fn shadow_infos(&self) -> &[ShadowInfo] {
        &self.infos
    }

    /// Shadow records packed for the lighting shaders
    pub fn shadow_uniforms(&self) -> ShadowUniforms {
        let mut uniforms = ShadowUniforms::default();
        let count = self.infos.len().min(MAX_SHADOWS);
        uniforms.count = count as i32;
        uniforms.infos[..count].copy_from_slice(&self.infos[..count]);
        uniforms
    }

    pub fn shadow_array(&self) -> TextureHandle {
        self.shadow_array
    }

    pub fn shadow_cube_array(&self) -> TextureHandle {
        self.shadow_cube_array
    }

    pub fn assigned_2d(&self) -> &[ShadowAssignment] {
        &self.assigned_2d
    }

    pub fn assigned_cube(&self) -> &[ShadowAssignment] {
        &self.assigned_cube
    }

    /// Releases every device object. Safe to call more than once.
    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        self.pipelines.dispose(device);
        device.destroy_descriptor_set(self.view_set);
        self.view_ubo.destroy(device);
        device.destroy_descriptor_set_layout(self.view_layout);
        device.destroy_framebuffer(self.framebuffer_2d);
        device.destroy_framebuffer(self.framebuffer_cube);
        device.destroy_render_pass(self.depth_pass);
        device.destroy_texture(self.scratch_2d);
        device.destroy_texture(self.scratch_cube);
        device.destroy_texture(self.shadow_array);
        device.destroy_texture(self.shadow_cube_array);
        self.assigned_2d.clear();
        self.assigned_cube.clear();
        self.infos.clear();
        self.state = ShadowState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::software::SoftwareDevice;
    use crate::gfx::backend::TextureState;
    use approx::assert_relative_eq;
    use cgmath::{Transform, Vector4};

    fn small_settings() -> ShadowSettings {
        ShadowSettings::default()
            .with_shadow_map_size(16)
            .with_cube_face_size(8)
    }

    fn object_layout(device: &mut SoftwareDevice) -> DescriptorSetLayoutHandle {
        device
            .create_descriptor_set_layout(&DescriptorSetLayoutDesc {
                label: "Object",
                bindings: vec![DescriptorBinding {
                    binding: 0,
                    kind: DescriptorKind::UniformBuffer,
                    stages: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                }],
            })
            .unwrap()
    }

    fn casting(light: Light) -> Light {
        light.with_shadows(true)
    }

    #[test]
    fn test_calls_out_of_order_are_rejected() {
        let mut device = SoftwareDevice::new();
        let layout = object_layout(&mut device);
        let mut manager = ShadowManager::new(&mut device, small_settings(), layout).unwrap();

        assert!(matches!(manager.collect(&[]), Err(RenderError::InvalidState(_))));
        assert!(matches!(
            manager.render_shadows(&mut device, &[], Vector3::new(0.0, 0.0, 0.0)),
            Err(RenderError::InvalidState(_))
        ));
        assert!(manager.end_frame().is_err());

        manager.begin_frame().unwrap();
        assert!(manager.begin_frame().is_err());
        assert!(manager.prepare_for_sampling(&mut device).is_err());
        manager.collect(&[]).unwrap();
        manager
            .render_shadows(&mut device, &[], Vector3::new(0.0, 0.0, 0.0))
            .unwrap();
        manager.prepare_for_sampling(&mut device).unwrap();
        manager.end_frame().unwrap();
        assert_eq!(manager.state(), ShadowState::Idle);
    }

    #[test]
    fn test_slots_assigned_in_order_until_full() {
        let mut device = SoftwareDevice::new();
        let layout = object_layout(&mut device);
        let settings = small_settings().with_max_shadow_maps(2, 1);
        let mut manager = ShadowManager::new(&mut device, settings, layout).unwrap();

        let lights = [
            casting(Light::directional(Vector3::new(0.0, -1.0, 0.0))),
            casting(Light::point(Vector3::new(0.0, 2.0, 0.0), 10.0)),
            Light::directional(Vector3::new(1.0, -1.0, 0.0)),
            casting(Light::spot(
                Vector3::new(0.0, 3.0, 0.0),
                Vector3::new(0.0, -1.0, 0.0),
                10.0,
                20.0,
                30.0,
            )),
            casting(Light::directional(Vector3::new(0.0, -1.0, 1.0))),
            casting(Light::point(Vector3::new(1.0, 2.0, 0.0), 10.0)),
        ];
        manager.begin_frame().unwrap();
        manager.collect(&lights).unwrap();

        let lit_2d: Vec<usize> = manager.assigned_2d().iter().map(|a| a.light_index).collect();
        let lit_cube: Vec<usize> = manager.assigned_cube().iter().map(|a| a.light_index).collect();
        assert_eq!(lit_2d, vec![0, 3]);
        assert_eq!(lit_cube, vec![1]);
        assert_eq!(manager.shadow_index(0), 0);
        assert_eq!(manager.shadow_index(1), 1);
        assert_eq!(manager.shadow_index(2), -1);
        assert_eq!(manager.shadow_index(3), 2);
        assert_eq!(manager.shadow_index(4), -1);
        assert_eq!(manager.shadow_index(5), -1);
    }

    #[test]
    fn test_disabled_shadows_assign_nothing() {
        let mut device = SoftwareDevice::new();
        let layout = object_layout(&mut device);
        let settings = small_settings().with_enabled(false);
        let mut manager = ShadowManager::new(&mut device, settings, layout).unwrap();
        manager.begin_frame().unwrap();
        manager
            .collect(&[casting(Light::directional(Vector3::new(0.0, -1.0, 0.0)))])
            .unwrap();
        assert!(manager.assigned_2d().is_empty());
    }

    #[test]
    fn test_render_fills_shadow_records_and_prepares_textures() {
        let mut device = SoftwareDevice::new();
        let layout = object_layout(&mut device);
        let mut manager = ShadowManager::new(&mut device, small_settings(), layout).unwrap();

        manager.begin_frame().unwrap();
        manager
            .collect(&[
                casting(Light::point(Vector3::new(0.0, 2.0, 0.0), 12.0)),
                casting(Light::directional(Vector3::new(0.0, -1.0, 0.0))),
            ])
            .unwrap();
        manager
            .render_shadows(&mut device, &[], Vector3::new(0.0, 0.0, 0.0))
            .unwrap();
        manager.prepare_for_sampling(&mut device).unwrap();

        let infos = manager.shadow_infos();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].shadow_type, SHADOW_TYPE_CUBE);
        assert_eq!(infos[0].far_plane, 12.0);
        assert_eq!(infos[0].light_view_proj, matrix_to_array(Matrix4::identity()));
        assert_eq!(infos[1].shadow_type, SHADOW_TYPE_2D);
        assert_eq!(infos[1].shadow_map_index, 0);
        assert_eq!(manager.shadow_uniforms().count, 2);

        assert_eq!(
            device.texture_state(manager.shadow_array()),
            Some(TextureState::ShaderRead)
        );
        assert_eq!(
            device.texture_state(manager.shadow_cube_array()),
            Some(TextureState::ShaderRead)
        );
    }

    #[test]
    fn test_directional_view_looks_at_center() {
        let center = Vector3::new(1.0, 0.0, 2.0);
        let (view_proj, position) =
            directional_light_view_proj(Vector3::new(0.0, -1.0, 0.0), center, 40.0, 20.0);
        assert_relative_eq!(position, Vector3::new(1.0, 20.0, 2.0), epsilon = 1e-5);

        let clip = view_proj * Vector4::new(center.x, center.y, center.z, 1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.z / clip.w, (20.0 - SHADOW_NEAR_PLANE) / (40.0 - SHADOW_NEAR_PLANE), epsilon = 1e-4);

        // half the extent from the center reaches the edge of the map
        let edge = view_proj.transform_point(Point3::new(11.0, 0.0, 2.0));
        assert_relative_eq!(edge.x.abs(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_spot_fov_is_clamped() {
        assert_relative_eq!(spot_shadow_fov(30.0), 60f32.to_radians());
        assert_relative_eq!(spot_shadow_fov(0.0), 0.1);
        assert_relative_eq!(spot_shadow_fov(120.0), std::f32::consts::PI - 0.1);
    }

    #[test]
    fn test_point_faces_cover_their_axis() {
        let position = Vector3::new(0.0, 1.0, 0.0);
        for face in CubeFace::ALL {
            let (forward, _) = CUBE_FACE_VIEWS[face as usize];
            let target = position + Vector3::from(forward) * 5.0;
            let clip = point_face_view_proj(position, face, 10.0)
                * Vector4::new(target.x, target.y, target.z, 1.0);
            assert!(clip.w > 0.0, "{:?}", face);
            assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
            assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut device = SoftwareDevice::new();
        let layout = object_layout(&mut device);
        let mut manager = ShadowManager::new(&mut device, small_settings(), layout).unwrap();
        manager.dispose(&mut device);
        manager.dispose(&mut device);
        assert_eq!(device.live_handle_count(), 1);
    }
}
