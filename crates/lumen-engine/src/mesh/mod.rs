//! CPU-side meshes.
//!
//! A [`Mesh`] is a named list of [`SubMesh`]es. Scene geometry uses triangle
//! sub-meshes; the range sensor's undistortion mesh is a single point
//! sub-mesh.

mod primitives;
mod submesh;

pub use primitives::{primitive, PRIMITIVE_NAMES};
pub use submesh::{PrimitiveType, SubMesh};

use glam::Vec3;

/// Named collection of sub-meshes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    name: String,
    sub_meshes: Vec<SubMesh>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sub_meshes: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn add_sub_mesh(&mut self, sub_mesh: SubMesh) {
        self.sub_meshes.push(sub_mesh);
    }

    #[inline]
    pub fn sub_meshes(&self) -> &[SubMesh] {
        &self.sub_meshes
    }

    pub fn sub_mesh_count(&self) -> usize {
        self.sub_meshes.len()
    }

    /// Total vertex count over all sub-meshes.
    pub fn vertex_count(&self) -> usize {
        self.sub_meshes.iter().map(SubMesh::vertex_count).sum()
    }

    /// Total index count over all sub-meshes.
    pub fn index_count(&self) -> usize {
        self.sub_meshes.iter().map(SubMesh::index_count).sum()
    }

    /// Axis-aligned bounds over all sub-meshes, `None` when empty.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.sub_meshes
            .iter()
            .filter_map(SubMesh::bounds)
            .reduce(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)))
    }

    /// Iterates the triangles of every triangle sub-mesh.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.sub_meshes
            .iter()
            .filter(|s| s.primitive_type() == PrimitiveType::Triangles)
            .flat_map(|s| s.triangles())
    }
}
