use glam::{Vec2, Vec3};

/// How the indices of a sub-mesh are assembled.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum PrimitiveType {
    /// One primitive per index.
    Points,
    /// Three indices per triangle, counter-clockwise front faces.
    #[default]
    Triangles,
}

/// Vertex, texture-coordinate and index streams of one primitive batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubMesh {
    primitive: PrimitiveType,
    vertices: Vec<Vec3>,
    tex_coords: Vec<Vec2>,
    indices: Vec<u32>,
}

impl SubMesh {
    pub fn new(primitive: PrimitiveType) -> Self {
        Self {
            primitive,
            ..Self::default()
        }
    }

    pub fn with_capacity(primitive: PrimitiveType, vertices: usize) -> Self {
        Self {
            primitive,
            vertices: Vec::with_capacity(vertices),
            tex_coords: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(vertices),
        }
    }

    #[inline]
    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive
    }

    pub fn set_primitive_type(&mut self, primitive: PrimitiveType) {
        self.primitive = primitive;
    }

    #[inline]
    pub fn add_vertex(&mut self, v: Vec3) {
        self.vertices.push(v);
    }

    #[inline]
    pub fn add_tex_coord(&mut self, uv: Vec2) {
        self.tex_coords.push(uv);
    }

    #[inline]
    pub fn add_index(&mut self, i: u32) {
        self.indices.push(i);
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    #[inline]
    pub fn tex_coords(&self) -> &[Vec2] {
        &self.tex_coords
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }

    /// Iterates complete triangles; a trailing partial triangle and
    /// out-of-range indices are skipped.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            Some([
                *self.vertices.get(tri[0] as usize)?,
                *self.vertices.get(tri[1] as usize)?,
                *self.vertices.get(tri[2] as usize)?,
            ])
        })
    }
}
