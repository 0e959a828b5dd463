//! Scene object model.
//!
//! Responsibilities:
//! - allocate scene-unique object ids and generated names
//! - own the node hierarchy (visuals, cameras, sensors, lights) and poses
//! - own materials and meshes referenced by geometry
//! - flatten visible geometry into [`RenderItem`]s for the backends
//!
//! Nodes are addressed by [`NodeId`]; the hierarchy stores ids rather than
//! references so sensors can hold on to their node while the scene is
//! borrowed by a backend.

mod color;
mod id;
mod material;
mod node;
mod scene;

pub use color::Color;
pub use id::{MeshId, NodeId, ObjectId, SceneId};
pub use material::Material;
pub use node::{
    Geometry, Light, LightKind, Node, NodeKind, Visual, VISIBILITY_ALL, VISIBILITY_GUI,
    VISIBILITY_SELECTABLE,
};
pub use scene::{RenderItem, Scene};
