/// Scene-unique object id.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u32);

impl ObjectId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Nodes are objects; the alias documents intent at call sites.
pub type NodeId = ObjectId;

/// Engine-unique scene id.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SceneId(pub(crate) u32);

impl SceneId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Index into a scene's mesh store.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub(crate) u32);

impl MeshId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}
