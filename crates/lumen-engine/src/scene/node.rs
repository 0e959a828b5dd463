use glam::Vec3;

use crate::math::Pose;

use super::{Color, MeshId, NodeId};

/// Every regular object.
pub const VISIBILITY_ALL: u32 = 0x0FFF_FFFF;
/// Editor/GUI-only helpers.
pub const VISIBILITY_GUI: u32 = 0x0000_0001;
/// Objects that can be picked.
pub const VISIBILITY_SELECTABLE: u32 = 0x1000_0000;

/// One drawable piece of a visual.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub mesh: MeshId,
    /// Overrides the owning visual's material.
    pub material: Option<String>,
}

/// Drawable node payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Visual {
    pub geometries: Vec<Geometry>,
    pub material: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LightKind {
    /// Light along the node's +X axis, position ignored.
    Directional,
    Point,
    Spot { inner_angle: f32, outer_angle: f32, falloff: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub diffuse: Color,
    pub specular: Color,
    pub attenuation_range: f32,
    pub cast_shadows: bool,
}

impl Light {
    pub(crate) fn new(kind: LightKind) -> Self {
        Self {
            kind,
            diffuse: Color::WHITE,
            specular: Color::WHITE,
            attenuation_range: 100.0,
            cast_shadows: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Visual(Visual),
    Camera,
    Sensor,
    Light(Light),
}

impl NodeKind {
    /// Prefix used for generated names.
    pub(crate) fn prefix(&self) -> &'static str {
        match self {
            NodeKind::Visual(_) => "visual",
            NodeKind::Camera => "camera",
            NodeKind::Sensor => "sensor",
            NodeKind::Light(_) => "light",
        }
    }
}

/// Entry of the scene hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub local_pose: Pose,
    /// Multiplies into the world scale of this node's geometry and its
    /// descendants' geometry. Child positions are not scaled.
    pub local_scale: Vec3,
    /// Hidden nodes hide their whole subtree.
    pub visible: bool,
    /// Matched against a sensor's visibility mask.
    pub visibility_flags: u32,
    pub kind: NodeKind,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, kind: NodeKind) -> Self {
        Self {
            id,
            name,
            parent: None,
            children: Vec::new(),
            local_pose: Pose::IDENTITY,
            local_scale: Vec3::ONE,
            visible: true,
            visibility_flags: VISIBILITY_ALL,
            kind,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn visual(&self) -> Option<&Visual> {
        match &self.kind {
            NodeKind::Visual(v) => Some(v),
            _ => None,
        }
    }

    pub fn visual_mut(&mut self) -> Option<&mut Visual> {
        match &mut self.kind {
            NodeKind::Visual(v) => Some(v),
            _ => None,
        }
    }

    pub fn light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(l) => Some(l),
            _ => None,
        }
    }
}
