//! Rendering backends.
//!
//! A backend owns render textures and knows how to run the two passes the
//! range sensors need. Everything above this module talks to a
//! `&mut dyn RenderBackend`.
//!
//! Implementations:
//! - [`WgpuBackend`]: hardware rasterisation through wgpu
//! - [`RaycastBackend`]: CPU ray casting, parallel over rows

pub(crate) mod composite;
mod gpu;
mod raycast;

pub use gpu::WgpuBackend;
pub use raycast::RaycastBackend;

use anyhow::Result;

use crate::math::Pose;
use crate::mesh::Mesh;
use crate::scene::{Scene, SceneId};
use crate::texture::{RenderTextureDesc, TextureId};

/// One first-pass camera.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthView {
    /// World pose of the camera (+X forward).
    pub pose: Pose,
    pub hfov: f32,
    pub vfov: f32,
    pub near: f32,
    pub far: f32,
    /// Only nodes whose visibility flags intersect this mask are drawn.
    pub visibility_mask: u32,
    /// Value written to texels no geometry covers.
    pub background: [f32; 3],
}

impl DepthView {
    #[inline]
    pub fn tan_half_h(&self) -> f32 {
        (self.hfov * 0.5).tan()
    }

    #[inline]
    pub fn tan_half_v(&self) -> f32 {
        (self.vfov * 0.5).tan()
    }
}

/// Interface between sensors and a rendering implementation.
pub trait RenderBackend: Send {
    /// Engine name, e.g. `"wgpu"`.
    fn name(&self) -> &str;

    fn create_render_texture(&mut self, desc: RenderTextureDesc) -> Result<TextureId>;

    /// Unknown ids are ignored.
    fn destroy_render_texture(&mut self, id: TextureId);

    fn texture_desc(&self, id: TextureId) -> Option<&RenderTextureDesc>;

    /// Number of live render textures.
    fn texture_count(&self) -> usize;

    /// Largest accepted texture dimension.
    fn max_texture_size(&self) -> u32;

    /// Drops cached per-scene resources after a scene is destroyed.
    fn release_scene(&mut self, _scene: SceneId) {}

    /// First pass. Each texel of `target` receives `(range, retro, 0)`
    /// where `range` is the distance from the camera origin to the closest
    /// surface, clamped to `view.far`.
    fn render_depth(&mut self, scene: &Scene, view: &DepthView, target: TextureId) -> Result<()>;

    /// Second pass. Resolves every point of the undistortion `mesh` against
    /// `sources` and writes the samples into `target`.
    fn render_composite(
        &mut self,
        mesh: &Mesh,
        sources: &[TextureId],
        target: TextureId,
        background: [f32; 3],
    ) -> Result<()>;

    /// Blocking readback, tightly packed with the format's channel count.
    fn read_texture(&mut self, id: TextureId, out: &mut Vec<f32>) -> Result<()>;
}
