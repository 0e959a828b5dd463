use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use glam::{Mat4, Vec3};

use crate::math::Pose;
use crate::mesh::{self, Mesh};

use super::{
    Color, Geometry, Light, LightKind, Material, MeshId, Node, NodeId, NodeKind, ObjectId,
    SceneId, Visual,
};

const ROOT_PREFIX: &str = "_ROOT_";

/// One piece of geometry ready to draw: a mesh and its full world transform.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderItem {
    pub node: NodeId,
    pub mesh: MeshId,
    /// World transform including scale.
    pub transform: Mat4,
    /// `laser_retro` of the effective material, 0 without one.
    pub retro: f32,
}

/// A scene: node hierarchy plus the materials and meshes it references.
#[derive(Debug)]
pub struct Scene {
    id: SceneId,
    name: String,
    ambient: Color,
    background: Color,
    next_object_id: u32,
    root: NodeId,
    nodes: HashMap<NodeId, Node>,
    node_names: HashMap<String, NodeId>,
    materials: HashMap<String, Material>,
    meshes: Vec<Mesh>,
    mesh_names: HashMap<String, MeshId>,
}

impl Scene {
    pub(crate) fn new(id: SceneId, name: impl Into<String>) -> Self {
        let mut scene = Self {
            id,
            name: name.into(),
            ambient: Color::rgb(0.3, 0.3, 0.3),
            background: Color::BLACK,
            next_object_id: 0,
            root: ObjectId(0),
            nodes: HashMap::new(),
            node_names: HashMap::new(),
            materials: HashMap::new(),
            meshes: Vec::new(),
            mesh_names: HashMap::new(),
        };
        scene.root = scene.insert_root();
        scene
    }

    fn insert_root(&mut self) -> NodeId {
        let id = self.create_object_id();
        let name = self.create_object_name(id, ROOT_PREFIX);
        let node = Node::new(id, name.clone(), NodeKind::Visual(Visual::default()));
        self.node_names.insert(name, id);
        self.nodes.insert(id, node);
        id
    }

    #[inline]
    pub fn id(&self) -> SceneId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn ambient_light(&self) -> Color {
        self.ambient
    }

    pub fn set_ambient_light(&mut self, color: Color) {
        self.ambient = color;
    }

    pub fn background_color(&self) -> Color {
        self.background
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.background = color;
    }

    /// Allocates the next object id; ids are never reused.
    pub fn create_object_id(&mut self) -> ObjectId {
        let id = ObjectId(self.next_object_id);
        self.next_object_id += 1;
        id
    }

    /// Generated object name, `"<scene>::<prefix>(<id>)"`.
    pub fn create_object_name(&self, id: ObjectId, prefix: &str) -> String {
        format!("{}::{}({})", self.name, prefix, id.0)
    }

    // ── nodes ────────────────────────────────────────────────────────────

    fn create_node(&mut self, name: &str, kind: NodeKind) -> Result<NodeId> {
        if !name.is_empty() && self.node_names.contains_key(name) {
            log::error!("scene `{}`: object named `{name}` already exists", self.name);
            bail!("object named `{name}` already exists in scene `{}`", self.name);
        }
        let id = self.create_object_id();
        let name = if name.is_empty() {
            self.create_object_name(id, kind.prefix())
        } else {
            name.to_owned()
        };
        let mut node = Node::new(id, name.clone(), kind);
        node.parent = Some(self.root);
        if let Some(root) = self.nodes.get_mut(&self.root) {
            root.children.push(id);
        }
        self.node_names.insert(name, id);
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Creates an empty visual under the root. An empty `name` generates one.
    pub fn create_visual(&mut self, name: &str) -> Result<NodeId> {
        self.create_node(name, NodeKind::Visual(Visual::default()))
    }

    pub fn create_camera(&mut self, name: &str) -> Result<NodeId> {
        self.create_node(name, NodeKind::Camera)
    }

    pub(crate) fn create_sensor_node(&mut self, name: &str) -> Result<NodeId> {
        self.create_node(name, NodeKind::Sensor)
    }

    pub fn create_directional_light(&mut self, name: &str) -> Result<NodeId> {
        self.create_node(name, NodeKind::Light(Light::new(LightKind::Directional)))
    }

    pub fn create_point_light(&mut self, name: &str) -> Result<NodeId> {
        self.create_node(name, NodeKind::Light(Light::new(LightKind::Point)))
    }

    pub fn create_spot_light(&mut self, name: &str) -> Result<NodeId> {
        let kind = LightKind::Spot {
            inner_angle: 0.0,
            outer_angle: 0.5,
            falloff: 1.0,
        };
        self.create_node(name, NodeKind::Light(Light::new(kind)))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.node_names.get(name).and_then(|id| self.nodes.get(id))
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Node count, root excluded.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn visual_count(&self) -> usize {
        self.count_kind(|k| matches!(k, NodeKind::Visual(_)))
    }

    pub fn sensor_count(&self) -> usize {
        self.count_kind(|k| matches!(k, NodeKind::Sensor | NodeKind::Camera))
    }

    pub fn light_count(&self) -> usize {
        self.count_kind(|k| matches!(k, NodeKind::Light(_)))
    }

    fn count_kind(&self, pred: impl Fn(&NodeKind) -> bool) -> usize {
        self.nodes
            .values()
            .filter(|n| n.id != self.root && pred(&n.kind))
            .count()
    }

    fn node_or_err(&mut self, id: NodeId) -> Result<&mut Node> {
        let scene = &self.name;
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| anyhow!("node {id} does not exist in scene `{scene}`"))
    }

    /// Re-parents `child` under `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if child == self.root {
            bail!("the root node cannot be re-parented");
        }
        if !self.has_node(parent) || !self.has_node(child) {
            bail!("add_child({parent}, {child}): unknown node");
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                log::error!("scene `{}`: attaching {child} under {parent} creates a cycle", self.name);
                bail!("attaching node {child} under {parent} would create a cycle");
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent);
        }

        let old_parent = self.nodes.get(&child).and_then(|n| n.parent);
        if let Some(old) = old_parent.and_then(|p| self.nodes.get_mut(&p)) {
            old.children.retain(|c| *c != child);
        }
        self.node_or_err(parent)?.children.push(child);
        self.node_or_err(child)?.parent = Some(parent);
        Ok(())
    }

    /// Removes a node and its whole subtree.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            bail!("the root node cannot be removed");
        }
        let parent = self.node_or_err(id)?.parent;
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                self.node_names.remove(&node.name);
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    /// Removes every node except the root. Materials and meshes are kept.
    pub fn clear(&mut self) {
        let children = self
            .nodes
            .get(&self.root)
            .map(|r| r.children.clone())
            .unwrap_or_default();
        for child in children {
            // Children of the root always exist.
            let _ = self.remove_node(child);
        }
    }

    pub fn set_local_pose(&mut self, id: NodeId, pose: Pose) -> Result<()> {
        self.node_or_err(id)?.local_pose = pose;
        Ok(())
    }

    pub fn set_local_scale(&mut self, id: NodeId, scale: Vec3) -> Result<()> {
        self.node_or_err(id)?.local_scale = scale;
        Ok(())
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<()> {
        self.node_or_err(id)?.visible = visible;
        Ok(())
    }

    pub fn set_visibility_flags(&mut self, id: NodeId, flags: u32) -> Result<()> {
        self.node_or_err(id)?.visibility_flags = flags;
        Ok(())
    }

    /// Composition of local poses from the root down to `id`.
    pub fn world_pose(&self, id: NodeId) -> Option<Pose> {
        let mut node = self.nodes.get(&id)?;
        let mut pose = node.local_pose;
        while let Some(parent) = node.parent.and_then(|p| self.nodes.get(&p)) {
            pose = parent.local_pose * pose;
            node = parent;
        }
        Some(pose)
    }

    /// Component-wise product of local scales from the root down to `id`.
    pub fn world_scale(&self, id: NodeId) -> Option<Vec3> {
        let mut node = self.nodes.get(&id)?;
        let mut scale = node.local_scale;
        while let Some(parent) = node.parent.and_then(|p| self.nodes.get(&p)) {
            scale *= parent.local_scale;
            node = parent;
        }
        Some(scale)
    }

    /// World pose and world scale combined into one matrix.
    pub fn world_transform(&self, id: NodeId) -> Option<Mat4> {
        let pose = self.world_pose(id)?;
        let scale = self.world_scale(id)?;
        Some(Mat4::from_scale_rotation_translation(scale, pose.rotation, pose.position))
    }

    // ── meshes ───────────────────────────────────────────────────────────

    /// Adds a mesh to the store. Names are unique.
    pub fn add_mesh(&mut self, mesh: Mesh) -> Result<MeshId> {
        if self.mesh_names.contains_key(mesh.name()) {
            log::error!("scene `{}`: mesh `{}` already exists", self.name, mesh.name());
            bail!("mesh `{}` already exists in scene `{}`", mesh.name(), self.name);
        }
        let id = MeshId(self.meshes.len() as u32);
        self.mesh_names.insert(mesh.name().to_owned(), id);
        self.meshes.push(mesh);
        Ok(id)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0 as usize)
    }

    pub fn mesh_id(&self, name: &str) -> Option<MeshId> {
        self.mesh_names.get(name).copied()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    fn primitive_mesh(&mut self, name: &str) -> Result<MeshId> {
        if let Some(id) = self.mesh_id(name) {
            return Ok(id);
        }
        let mesh = mesh::primitive(name).ok_or_else(|| anyhow!("unknown primitive `{name}`"))?;
        self.add_mesh(mesh)
    }

    /// Appends a geometry referencing `mesh` to a visual.
    pub fn add_geometry(&mut self, visual: NodeId, mesh: MeshId) -> Result<()> {
        if self.mesh(mesh).is_none() {
            bail!("mesh {} does not exist in scene `{}`", mesh.0, self.name);
        }
        let node = self.node_or_err(visual)?;
        let name = node.name.clone();
        let v = node
            .visual_mut()
            .ok_or_else(|| anyhow!("node `{name}` is not a visual"))?;
        v.geometries.push(Geometry { mesh, material: None });
        Ok(())
    }

    fn create_primitive_visual(&mut self, name: &str, primitive: &str) -> Result<NodeId> {
        let mesh = self.primitive_mesh(primitive)?;
        let id = self.create_visual(name)?;
        self.add_geometry(id, mesh)?;
        Ok(id)
    }

    /// Visual holding a unit cube centred on its origin.
    pub fn create_box(&mut self, name: &str) -> Result<NodeId> {
        self.create_primitive_visual(name, "unit_box")
    }

    /// Visual holding a sphere of diameter 1.
    pub fn create_sphere(&mut self, name: &str) -> Result<NodeId> {
        self.create_primitive_visual(name, "unit_sphere")
    }

    /// Visual holding a Z-aligned cylinder of diameter 1 and height 1.
    pub fn create_cylinder(&mut self, name: &str) -> Result<NodeId> {
        self.create_primitive_visual(name, "unit_cylinder")
    }

    pub fn create_cone(&mut self, name: &str) -> Result<NodeId> {
        self.create_primitive_visual(name, "unit_cone")
    }

    /// Visual holding a 1x1 plane in XY facing +Z.
    pub fn create_plane(&mut self, name: &str) -> Result<NodeId> {
        self.create_primitive_visual(name, "unit_plane")
    }

    /// Visual holding a mesh from the store, looked up by name.
    pub fn create_mesh_visual(&mut self, name: &str, mesh_name: &str) -> Result<NodeId> {
        let mesh = self
            .mesh_id(mesh_name)
            .ok_or_else(|| anyhow!("mesh `{mesh_name}` does not exist in scene `{}`", self.name))?;
        let id = self.create_visual(name)?;
        self.add_geometry(id, mesh)?;
        Ok(id)
    }

    // ── materials ────────────────────────────────────────────────────────

    /// Creates a material. An empty `name` generates one.
    pub fn create_material(&mut self, name: &str) -> Result<&mut Material> {
        let name = if name.is_empty() {
            let id = self.create_object_id();
            self.create_object_name(id, "material")
        } else {
            name.to_owned()
        };
        if self.materials.contains_key(&name) {
            log::error!("scene `{}`: material `{name}` already exists", self.name);
            bail!("material `{name}` already exists in scene `{}`", self.name);
        }
        Ok(self
            .materials
            .entry(name.clone())
            .or_insert_with(|| Material::new(name)))
    }

    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    pub fn material_mut(&mut self, name: &str) -> Option<&mut Material> {
        self.materials.get_mut(name)
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Assigns a material to a visual and all of its geometries' defaults.
    pub fn set_material(&mut self, visual: NodeId, material: &str) -> Result<()> {
        if !self.materials.contains_key(material) {
            bail!("material `{material}` does not exist in scene `{}`", self.name);
        }
        let node = self.node_or_err(visual)?;
        let name = node.name.clone();
        let v = node
            .visual_mut()
            .ok_or_else(|| anyhow!("node `{name}` is not a visual"))?;
        v.material = Some(material.to_owned());
        Ok(())
    }

    fn retro_of(&self, geometry: &Geometry, visual: Option<&str>) -> f32 {
        geometry
            .material
            .as_deref()
            .or(visual)
            .and_then(|m| self.materials.get(m))
            .map_or(0.0, |m| m.laser_retro)
    }

    // ── rendering ────────────────────────────────────────────────────────

    /// Flattens visible geometry whose node flags intersect `mask`.
    ///
    /// A hidden node hides its subtree. Flags are tested per node and are
    /// not inherited.
    pub fn render_items(&self, mask: u32) -> Vec<RenderItem> {
        let mut items = Vec::new();
        let mut stack = vec![(self.root, Pose::IDENTITY, Vec3::ONE)];
        while let Some((id, parent_pose, parent_scale)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else { continue };
            if !node.visible {
                continue;
            }
            let pose = parent_pose * node.local_pose;
            let scale = parent_scale * node.local_scale;

            if let NodeKind::Visual(visual) = &node.kind {
                if node.visibility_flags & mask != 0 {
                    let transform =
                        Mat4::from_scale_rotation_translation(scale, pose.rotation, pose.position);
                    for geometry in &visual.geometries {
                        items.push(RenderItem {
                            node: id,
                            mesh: geometry.mesh,
                            transform,
                            retro: self.retro_of(geometry, visual.material.as_deref()),
                        });
                    }
                }
            }
            stack.extend(node.children.iter().rev().map(|c| (*c, pose, scale)));
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn scene() -> Scene {
        Scene::new(SceneId(0), "scene")
    }

    // ── ids & names ──────────────────────────────────────────────────────

    #[test]
    fn root_exists_and_is_not_counted() {
        let s = scene();
        assert_eq!(s.node(s.root()).map(Node::name), Some("scene::_ROOT_(0)"));
        assert_eq!(s.node_by_name("scene::_ROOT_(0)").map(Node::id), Some(s.root()));
        assert_eq!(s.node_count(), 0);
    }

    #[test]
    fn generated_names_use_scene_prefix_and_id() {
        let mut s = scene();
        let id = s.create_visual("").unwrap();
        let name = s.node(id).unwrap().name().to_owned();
        assert_eq!(name, format!("scene::visual({})", id.raw()));
        assert!(s.node_by_name(&name).is_some());
    }

    #[test]
    fn object_ids_increase() {
        let mut s = scene();
        let a = s.create_object_id();
        let b = s.create_object_id();
        assert!(b > a);
    }

    #[test]
    fn duplicate_names_fail() {
        let mut s = scene();
        s.create_box("wall").unwrap();
        assert!(s.create_visual("wall").is_err());
        assert!(s.create_camera("wall").is_err());
        assert_eq!(s.visual_count(), 1);
    }

    // ── hierarchy ────────────────────────────────────────────────────────

    #[test]
    fn world_pose_composes_parents() {
        let mut s = scene();
        let parent = s.create_visual("parent").unwrap();
        let child = s.create_visual("child").unwrap();
        s.add_child(parent, child).unwrap();
        s.set_local_pose(parent, Pose::from_xyz_rpy(1.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2))
            .unwrap();
        s.set_local_pose(child, Pose::from_xyz_rpy(2.0, 0.0, 0.0, 0.0, 0.0, 0.0)).unwrap();

        let p = s.world_pose(child).unwrap().position;
        assert!((p - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn world_scale_multiplies() {
        let mut s = scene();
        let parent = s.create_visual("parent").unwrap();
        let child = s.create_visual("child").unwrap();
        s.add_child(parent, child).unwrap();
        s.set_local_scale(parent, Vec3::splat(2.0)).unwrap();
        s.set_local_scale(child, Vec3::new(1.0, 3.0, 1.0)).unwrap();
        assert_eq!(s.world_scale(child), Some(Vec3::new(2.0, 6.0, 2.0)));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut s = scene();
        let a = s.create_visual("a").unwrap();
        let b = s.create_visual("b").unwrap();
        s.add_child(a, b).unwrap();
        assert!(s.add_child(b, a).is_err());
        assert!(s.add_child(a, a).is_err());
        assert!(s.add_child(a, s.root()).is_err());
    }

    #[test]
    fn remove_node_drops_subtree_and_names() {
        let mut s = scene();
        let a = s.create_visual("a").unwrap();
        let b = s.create_visual("b").unwrap();
        s.add_child(a, b).unwrap();
        s.remove_node(a).unwrap();
        assert!(!s.has_node(b));
        assert!(s.node_by_name("b").is_none());
        assert!(s.create_visual("b").is_ok());
        assert!(s.remove_node(s.root()).is_err());
    }

    #[test]
    fn clear_keeps_root_and_materials() {
        let mut s = scene();
        s.create_box("").unwrap();
        s.create_point_light("").unwrap();
        s.create_material("red").unwrap();
        s.clear();
        assert_eq!(s.node_count(), 0);
        assert!(s.material("red").is_some());
    }

    // ── geometry & materials ─────────────────────────────────────────────

    #[test]
    fn primitives_share_one_mesh() {
        let mut s = scene();
        s.create_box("").unwrap();
        s.create_box("").unwrap();
        s.create_sphere("").unwrap();
        assert_eq!(s.mesh_count(), 2);
        assert!(s.mesh_id("unit_box").is_some());
    }

    #[test]
    fn geometry_requires_visual() {
        let mut s = scene();
        let light = s.create_directional_light("sun").unwrap();
        let mesh = s.add_mesh(Mesh::new("empty")).unwrap();
        assert!(s.add_geometry(light, mesh).is_err());
        assert!(s.add_mesh(Mesh::new("empty")).is_err());
    }

    #[test]
    fn material_names_are_unique() {
        let mut s = scene();
        s.create_material("m").unwrap().laser_retro = 3.0;
        assert!(s.create_material("m").is_err());
        assert_eq!(s.material("m").map(|m| m.laser_retro), Some(3.0));
    }

    // ── render items ─────────────────────────────────────────────────────

    #[test]
    fn render_items_carry_retro_and_transform() {
        let mut s = scene();
        let wall = s.create_box("wall").unwrap();
        s.create_material("shiny").unwrap().laser_retro = 100.0;
        s.set_material(wall, "shiny").unwrap();
        s.set_local_pose(wall, Pose::from_xyz_rpy(5.0, 0.0, 0.0, 0.0, 0.0, 0.0)).unwrap();
        s.set_local_scale(wall, Vec3::new(0.1, 4.0, 2.0)).unwrap();

        let items = s.render_items(u32::MAX);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].retro, 100.0);
        let corner = items[0].transform.transform_point3(Vec3::splat(0.5));
        assert!((corner - Vec3::new(5.05, 2.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn hidden_parent_hides_children() {
        let mut s = scene();
        let parent = s.create_visual("parent").unwrap();
        let child = s.create_box("child").unwrap();
        s.add_child(parent, child).unwrap();
        s.set_visible(parent, false).unwrap();
        assert!(s.render_items(u32::MAX).is_empty());
    }

    #[test]
    fn visibility_mask_filters_per_node() {
        let mut s = scene();
        let a = s.create_box("a").unwrap();
        s.create_box("b").unwrap();
        s.set_visibility_flags(a, 0b10).unwrap();
        assert_eq!(s.render_items(0b01).len(), 1);
        assert_eq!(s.render_items(0b11).len(), 2);
    }
}
