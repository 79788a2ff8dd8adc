//! # Scene Graph
//!
//! [`SceneGraph`] owns every node in a slotmap arena together with the meshes,
//! materials and textures the nodes reference. Nodes form a forest: each node
//! has at most one parent and an ordered list of children. Removing a node
//! removes its whole subtree.
//!
//! The renderer never walks the graph directly. [`SceneGraph::snapshot`]
//! flattens the visible part of the graph into a [`FrameSnapshot`] of draw
//! records and world-space lights once per frame.

use std::cell::RefCell;
use std::rc::Rc;

use cgmath::{Matrix4, SquareMatrix};
use slotmap::{new_key_type, SlotMap};

use super::light::{Light, LightInstance};
use super::material::{Material, MaterialId, TextureData, TextureId};
use super::mesh::{Mesh, MeshId};
use super::transform::Transform;
use super::vertex::Vertex3D;
use crate::gfx::camera::Camera3D;
use crate::gfx::geometry::PrimitiveShape;
use crate::gfx::picking::Aabb;

new_key_type! {
    /// Stable id of a node in a [`SceneGraph`]
    pub struct NodeId;
}

/// What a node contributes to the frame
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Pure transform node without geometry
    Group,
    Mesh(MeshId),
    /// Built-in shape, turned into a mesh on first use
    Primitive(PrimitiveShape),
    /// Light positioned by the node's world transform
    Light(Light),
    Camera(Camera3D),
}

/// Field-less discriminant of [`NodeKind`] for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKindTag {
    Group,
    Mesh,
    Primitive,
    Light,
    Camera,
}

impl NodeKind {
    pub fn tag(&self) -> NodeKindTag {
        match self {
            NodeKind::Group => NodeKindTag::Group,
            NodeKind::Mesh(_) => NodeKindTag::Mesh,
            NodeKind::Primitive(_) => NodeKindTag::Primitive,
            NodeKind::Light(_) => NodeKindTag::Light,
            NodeKind::Camera(_) => NodeKindTag::Camera,
        }
    }
}

/// A node of the scene graph
///
/// Parent and child links are maintained by the graph and are read through
/// [`SceneGraph::parent`] and [`SceneGraph::children`].
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    /// Disabled nodes and their subtrees are skipped by rendering and picking
    pub enabled: bool,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    /// `None` renders with the default material
    pub material: Option<MaterialId>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            kind,
            enabled: true,
            cast_shadows: true,
            receive_shadows: true,
            material: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn mesh(name: impl Into<String>, mesh: MeshId) -> Self {
        Self::new(name, NodeKind::Mesh(mesh))
    }

    pub fn primitive(name: impl Into<String>, shape: PrimitiveShape) -> Self {
        Self::new(name, NodeKind::Primitive(shape))
    }

    pub fn light(name: impl Into<String>, light: Light) -> Self {
        Self::new(name, NodeKind::Light(light))
    }

    pub fn camera(name: impl Into<String>, camera: Camera3D) -> Self {
        Self::new(name, NodeKind::Camera(camera))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_shadows(mut self, cast: bool, receive: bool) -> Self {
        self.cast_shadows = cast;
        self.receive_shadows = receive;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// One draw of the frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderObject {
    pub node: Option<NodeId>,
    pub mesh: MeshId,
    pub material: Option<MaterialId>,
    pub world: Matrix4<f32>,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    pub transparent: bool,
}

impl RenderObject {
    /// Draw record for a mesh outside any scene graph
    pub fn new(mesh: MeshId, material: Option<MaterialId>, world: Matrix4<f32>) -> Self {
        Self {
            node: None,
            mesh,
            material,
            world,
            cast_shadows: true,
            receive_shadows: true,
            transparent: false,
        }
    }
}

/// Everything the renderer needs from the graph for one frame
#[derive(Debug, Clone, Default)]
pub struct FrameSnapshot {
    pub objects: Vec<RenderObject>,
    pub lights: Vec<LightInstance>,
}

impl FrameSnapshot {
    pub fn lights(&self) -> Vec<Light> {
        self.lights.iter().map(|instance| instance.light).collect()
    }
}

struct MeshSlot {
    mesh: Rc<Mesh>,
    revision: u64,
}

/// Arena-backed scene graph
#[derive(Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, SceneNode>,
    roots: Vec<NodeId>,
    meshes: RefCell<SlotMap<MeshId, MeshSlot>>,
    primitive_meshes: RefCell<Vec<(PrimitiveShape, MeshId)>>,
    materials: SlotMap<MaterialId, Material>,
    textures: SlotMap<TextureId, TextureData>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    pub fn add_root(&mut self, node: SceneNode) -> NodeId {
        let id = self.insert_detached(node, None);
        self.roots.push(id);
        id
    }

    /// Adds `node` as the last child of `parent`, or as a root for `None`
    ///
    /// # Returns
    /// `None` if `parent` does not exist
    pub fn add_node(&mut self, parent: Option<NodeId>, node: SceneNode) -> Option<NodeId> {
        match parent {
            Some(parent) => self.add_child(parent, node),
            None => Some(self.add_root(node)),
        }
    }

    pub fn add_child(&mut self, parent: NodeId, node: SceneNode) -> Option<NodeId> {
        let index = self.nodes.get(parent)?.children.len();
        self.insert_child(parent, index, node)
    }

    /// Inserts `node` at `index` among the children of `parent` (clamped to the end)
    pub fn insert_child(&mut self, parent: NodeId, index: usize, node: SceneNode) -> Option<NodeId> {
        if !self.nodes.contains_key(parent) {
            return None;
        }
        let id = self.insert_detached(node, Some(parent));
        let children = &mut self.nodes[parent].children;
        children.insert(index.min(children.len()), id);
        Some(id)
    }

    fn insert_detached(&mut self, mut node: SceneNode, parent: Option<NodeId>) -> NodeId {
        node.parent = parent;
        node.children.clear();
        self.nodes.insert(node)
    }

    /// Removes `id` and its whole subtree
    ///
    /// # Returns
    /// Number of nodes removed, 0 for a stale id
    pub fn remove_node(&mut self, id: NodeId) -> usize {
        let Some(node) = self.nodes.get(id) else {
            return 0;
        };
        match node.parent {
            Some(parent) => {
                if let Some(parent) = self.nodes.get_mut(parent) {
                    parent.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }

        let mut doomed = vec![id];
        doomed.extend(self.descendants(id));
        for node in &doomed {
            self.nodes.remove(*node);
        }
        doomed.len()
    }

    /// Moves `id` under `new_parent` (or to the roots), keeping its subtree
    ///
    /// Fails when either node is missing or when `new_parent` lies inside the subtree of `id`.
    pub fn reparent(&mut self, id: NodeId, new_parent: Option<NodeId>) -> bool {
        let Some(old_parent) = self.nodes.get(id).map(|node| node.parent) else {
            return false;
        };
        if let Some(target) = new_parent {
            if !self.nodes.contains_key(target) || target == id || self.descendants(id).contains(&target) {
                return false;
            }
        }

        match old_parent {
            Some(parent) => self.nodes[parent].children.retain(|child| *child != id),
            None => self.roots.retain(|root| *root != id),
        }
        match new_parent {
            Some(parent) => self.nodes[parent].children.push(id),
            None => self.roots.push(id),
        }
        self.nodes[id].parent = new_parent;
        true
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// All nodes below `id` in depth-first pre-order, excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Every node in depth-first pre-order, roots in insertion order
    pub fn iter_depth_first(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for root in &self.roots {
            out.push(*root);
            out.extend(self.descendants(*root));
        }
        out
    }

    /// First node named `name` in depth-first order
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.iter_depth_first()
            .into_iter()
            .find(|id| self.nodes[*id].name == name)
    }

    pub fn nodes_of_kind(&self, tag: NodeKindTag) -> Vec<NodeId> {
        self.iter_depth_first()
            .into_iter()
            .filter(|id| self.nodes[*id].kind.tag() == tag)
            .collect()
    }

    /// Node ids from the root down to and including `id`
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = self.nodes.contains_key(id).then_some(id);
        while let Some(node) = current {
            path.push(node);
            current = self.nodes[node].parent;
        }
        path.reverse();
        path
    }

    /// `world(node) = world(parent) * local(node)`
    pub fn world_matrix(&self, id: NodeId) -> Option<Matrix4<f32>> {
        let mut world = Matrix4::identity();
        for node in self.path_to(id) {
            world = world * self.nodes[node].transform.matrix();
        }
        self.nodes.contains_key(id).then_some(world)
    }

    /// Whether `id` and all of its ancestors are enabled
    pub fn is_visible(&self, id: NodeId) -> bool {
        let path = self.path_to(id);
        !path.is_empty() && path.iter().all(|node| self.nodes[*node].enabled)
    }

    /// Bounds in the node's own space
    ///
    /// Covers the node's mesh and every descendant, each child transformed by its
    /// local matrix. `None` when nothing below the node has geometry.
    pub fn local_bounds(&self, id: NodeId) -> Option<Aabb> {
        let node = self.nodes.get(id)?;
        let mut bounds = self.node_mesh(id).and_then(|mesh| self.mesh(mesh)?.bounds());
        for child in &node.children {
            let Some(child_bounds) = self.local_bounds(*child) else {
                continue;
            };
            let local = child_bounds.transform(&self.nodes[*child].transform.matrix());
            bounds = Some(match bounds {
                Some(existing) => existing.union(&local),
                None => local,
            });
        }
        bounds
    }

    pub fn world_bounds(&self, id: NodeId) -> Option<Aabb> {
        let world = self.world_matrix(id)?;
        Some(self.local_bounds(id)?.transform(&world))
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.get_mut().insert(MeshSlot {
            mesh: Rc::new(mesh),
            revision: 0,
        })
    }

    pub fn mesh(&self, id: MeshId) -> Option<Rc<Mesh>> {
        self.meshes.borrow().get(id).map(|slot| slot.mesh.clone())
    }

    /// Bumped on every [`set_mesh_geometry`](Self::set_mesh_geometry)
    pub fn mesh_revision(&self, id: MeshId) -> Option<u64> {
        self.meshes.borrow().get(id).map(|slot| slot.revision)
    }

    /// Replaces the geometry of a mesh and bumps its revision
    pub fn set_mesh_geometry(&mut self, id: MeshId, vertices: Vec<Vertex3D>, indices: Vec<u32>) -> bool {
        match self.meshes.get_mut().get_mut(id) {
            Some(slot) => {
                slot.mesh = Rc::new(Mesh::new(vertices, indices));
                slot.revision += 1;
                true
            }
            None => false,
        }
    }

    pub fn remove_mesh(&mut self, id: MeshId) -> bool {
        self.primitive_meshes.get_mut().retain(|(_, mesh)| *mesh != id);
        self.meshes.get_mut().remove(id).is_some()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.borrow().len()
    }

    /// Mesh drawn for a node
    ///
    /// Primitive shapes are turned into meshes the first time they are asked
    /// for; nodes with equal shapes share one mesh.
    pub fn node_mesh(&self, id: NodeId) -> Option<MeshId> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Mesh(mesh) => Some(*mesh),
            NodeKind::Primitive(shape) => Some(self.primitive_mesh(shape)),
            NodeKind::Group | NodeKind::Light(_) | NodeKind::Camera(_) => None,
        }
    }

    fn primitive_mesh(&self, shape: &PrimitiveShape) -> MeshId {
        if let Some((_, mesh)) = self
            .primitive_meshes
            .borrow()
            .iter()
            .find(|(cached, _)| cached == shape)
        {
            return *mesh;
        }
        let mesh = self.meshes.borrow_mut().insert(MeshSlot {
            mesh: Rc::new(shape.to_mesh()),
            revision: 0,
        });
        log::debug!("Generated mesh for {:?}", shape);
        self.primitive_meshes.borrow_mut().push((*shape, mesh));
        mesh
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id)
    }

    pub fn remove_material(&mut self, id: MaterialId) -> bool {
        self.materials.remove(id).is_some()
    }

    pub fn materials(&self) -> &SlotMap<MaterialId, Material> {
        &self.materials
    }

    pub fn add_texture(&mut self, texture: TextureData) -> TextureId {
        self.textures.insert(texture)
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureData> {
        self.textures.get(id)
    }

    pub fn remove_texture(&mut self, id: TextureId) -> bool {
        self.textures.remove(id).is_some()
    }

    pub fn textures(&self) -> &SlotMap<TextureId, TextureData> {
        &self.textures
    }

    /// Flattens the visible part of the graph for one frame
    ///
    /// Disabled nodes hide their whole subtree. Groups and cameras produce no
    /// draw; lights come out in world space; disabled lights are dropped.
    pub fn snapshot(&self) -> FrameSnapshot {
        let mut snapshot = FrameSnapshot::default();
        let mut stack: Vec<(NodeId, Matrix4<f32>)> = self
            .roots
            .iter()
            .rev()
            .map(|root| (*root, Matrix4::identity()))
            .collect();

        while let Some((id, parent_world)) = stack.pop() {
            let node = &self.nodes[id];
            if !node.enabled {
                continue;
            }
            let world = parent_world * node.transform.matrix();

            match &node.kind {
                NodeKind::Mesh(_) | NodeKind::Primitive(_) => {
                    if let Some(mesh) = self.node_mesh(id) {
                        let transparent = node
                            .material
                            .and_then(|material| self.materials.get(material))
                            .is_some_and(|material| material.transparent);
                        snapshot.objects.push(RenderObject {
                            node: Some(id),
                            mesh,
                            material: node.material,
                            world,
                            cast_shadows: node.cast_shadows,
                            receive_shadows: node.receive_shadows,
                            transparent,
                        });
                    }
                }
                NodeKind::Light(light) if light.enabled => {
                    snapshot.lights.push(LightInstance {
                        node: Some(id),
                        light: light.transformed(&world),
                    });
                }
                NodeKind::Light(_) | NodeKind::Group | NodeKind::Camera(_) => {}
            }

            for child in node.children.iter().rev() {
                stack.push((*child, world));
            }
        }

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::scene::color::Color;
    use cgmath::{Vector3, Vector4};

    fn translated(x: f32, y: f32, z: f32) -> Transform {
        Transform::from_position(Vector3::new(x, y, z))
    }

    #[test]
    fn test_children_order_and_insert() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root(SceneNode::group("root"));
        let a = graph.add_child(root, SceneNode::group("a")).unwrap();
        let c = graph.add_child(root, SceneNode::group("c")).unwrap();
        let b = graph.insert_child(root, 1, SceneNode::group("b")).unwrap();
        let first = graph.insert_child(root, 99, SceneNode::group("last")).unwrap();

        assert_eq!(graph.children(root), &[a, b, c, first]);
        assert_eq!(graph.parent(b), Some(root));
        assert_eq!(graph.find_by_name("c"), Some(c));
    }

    #[test]
    fn test_descendants_are_pre_order() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root(SceneNode::group("root"));
        let a = graph.add_child(root, SceneNode::group("a")).unwrap();
        let a1 = graph.add_child(a, SceneNode::group("a1")).unwrap();
        let b = graph.add_child(root, SceneNode::group("b")).unwrap();
        assert_eq!(graph.descendants(root), vec![a, a1, b]);
        assert_eq!(graph.path_to(a1), vec![root, a, a1]);
    }

    #[test]
    fn test_remove_node_removes_subtree() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root(SceneNode::group("root"));
        let a = graph.add_child(root, SceneNode::group("a")).unwrap();
        let a1 = graph.add_child(a, SceneNode::group("a1")).unwrap();
        let b = graph.add_child(root, SceneNode::group("b")).unwrap();

        assert_eq!(graph.remove_node(a), 2);
        assert!(!graph.contains(a1));
        assert_eq!(graph.children(root), &[b]);
        assert_eq!(graph.remove_node(a), 0);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_add_to_missing_parent_fails() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root(SceneNode::group("root"));
        graph.remove_node(root);
        assert!(graph.add_node(Some(root), SceneNode::group("orphan")).is_none());
    }

    #[test]
    fn test_reparent_rejects_cycles() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root(SceneNode::group("root"));
        let child = graph.add_child(root, SceneNode::group("child")).unwrap();
        assert!(!graph.reparent(root, Some(child)));
        assert!(graph.reparent(child, None));
        assert_eq!(graph.roots(), &[root, child]);
        assert_eq!(graph.parent(child), None);
    }

    #[test]
    fn test_world_matrix_composes_parent_first() {
        let mut graph = SceneGraph::new();
        let parent = graph.add_root(
            SceneNode::group("parent").with_transform(
                translated(5.0, 0.0, 0.0).with_rotation(Vector3::new(0.0, 90.0, 0.0)),
            ),
        );
        let child = graph
            .add_child(parent, SceneNode::group("child").with_transform(translated(1.0, 0.0, 0.0)))
            .unwrap();
        let world = graph.world_matrix(child).unwrap();
        let origin = world * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin.x - 5.0).abs() < 1e-5);
        assert!((origin.z + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_group_bounds_cover_children() {
        let mut graph = SceneGraph::new();
        let group = graph.add_root(SceneNode::group("group").with_transform(translated(0.0, 10.0, 0.0)));
        assert!(graph.local_bounds(group).is_none());

        graph.add_child(
            group,
            SceneNode::primitive("cube", PrimitiveShape::Cube { size: 2.0 })
                .with_transform(translated(3.0, 0.0, 0.0)),
        );
        let local = graph.local_bounds(group).unwrap();
        assert_eq!(local.min, Vector3::new(2.0, -1.0, -1.0));
        assert_eq!(local.max, Vector3::new(4.0, 1.0, 1.0));
        let world = graph.world_bounds(group).unwrap();
        assert_eq!(world.min.y, 9.0);
    }

    #[test]
    fn test_primitive_meshes_are_generated_once() {
        let mut graph = SceneGraph::new();
        let a = graph.add_root(SceneNode::primitive("a", PrimitiveShape::unit_cube()));
        let b = graph.add_root(SceneNode::primitive("b", PrimitiveShape::unit_cube()));
        assert_eq!(graph.mesh_count(), 0);
        let mesh = graph.node_mesh(a).unwrap();
        assert_eq!(graph.node_mesh(b), Some(mesh));
        assert_eq!(graph.mesh_count(), 1);
    }

    #[test]
    fn test_set_mesh_geometry_bumps_revision() {
        let mut graph = SceneGraph::new();
        let mesh = graph.add_mesh(PrimitiveShape::unit_cube().to_mesh());
        assert_eq!(graph.mesh_revision(mesh), Some(0));
        assert!(graph.set_mesh_geometry(mesh, Vec::new(), Vec::new()));
        assert_eq!(graph.mesh_revision(mesh), Some(1));
        assert_eq!(graph.mesh(mesh).unwrap().index_count(), 0);
    }

    #[test]
    fn test_snapshot_skips_disabled_subtrees() {
        let mut graph = SceneGraph::new();
        let glass = graph.add_material(Material::default().with_alpha(0.5));
        let visible = graph.add_root(SceneNode::primitive("visible", PrimitiveShape::unit_cube()).with_material(glass));
        let hidden = graph.add_root(SceneNode::group("hidden").with_enabled(false));
        graph.add_child(hidden, SceneNode::primitive("inner", PrimitiveShape::unit_sphere()));
        graph.add_child(
            hidden,
            SceneNode::light("lamp", Light::point(Vector3::new(0.0, 1.0, 0.0), 5.0)),
        );
        graph.add_root(SceneNode::light(
            "sun",
            Light::directional(-Vector3::unit_y()).with_color(Color::WHITE),
        ));
        graph.add_root(SceneNode::light("off", Light::directional(-Vector3::unit_y()).with_enabled(false)));

        let snapshot = graph.snapshot();
        assert_eq!(snapshot.objects.len(), 1);
        assert_eq!(snapshot.objects[0].node, Some(visible));
        assert!(snapshot.objects[0].transparent);
        assert_eq!(snapshot.lights.len(), 1);
        assert!(!graph.is_visible(graph.find_by_name("inner").unwrap()));
    }

    #[test]
    fn test_nodes_of_kind() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root(SceneNode::group("root"));
        let light = graph
            .add_child(root, SceneNode::light("l", Light::point(Vector3::new(0.0, 0.0, 0.0), 1.0)))
            .unwrap();
        graph.add_child(root, SceneNode::camera("cam", Camera3D::default()));
        assert_eq!(graph.nodes_of_kind(NodeKindTag::Light), vec![light]);
        assert_eq!(graph.nodes_of_kind(NodeKindTag::Group), vec![root]);
        assert_eq!(graph.nodes_of_kind(NodeKindTag::Camera).len(), 1);
    }
}
