//! CPU ray-casting backend.
//!
//! Renders the same images the wgpu backend rasterises, by casting one ray
//! through every texel centre. Rows are traced in parallel with rayon.

mod texture;
mod tracer;

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow, ensure};
use glam::Vec3;
use rayon::prelude::*;

use crate::math::pixel_ray;
use crate::mesh::Mesh;
use crate::scene::Scene;
use crate::texture::{RenderTextureDesc, TextureId};
use crate::time::PassTimer;

use super::composite::{composite_projection, mirror_texel, target_texel, texture_index};
use super::{DepthView, RenderBackend};

use texture::{CpuTexture, write_texel};
use tracer::TraceScene;

const MAX_TEXTURE_SIZE: u32 = 16384;

/// Ray-casting implementation of [`RenderBackend`].
pub struct RaycastBackend {
    textures: HashMap<TextureId, CpuTexture>,
    next_texture: u32,
    pool: Option<rayon::ThreadPool>,
}

impl RaycastBackend {
    /// `threads == 0` uses rayon's global pool.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = if threads == 0 {
            None
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("lumen-raycast-{i}"))
                .build()
                .context("failed to build raycast thread pool")?;
            Some(pool)
        };
        log::info!(
            "raycast backend ready ({} threads)",
            pool.as_ref()
                .map_or_else(rayon::current_num_threads, |p| p.current_num_threads())
        );
        Ok(Self {
            textures: HashMap::new(),
            next_texture: 0,
            pool,
        })
    }

    fn texture(&self, id: TextureId) -> Result<&CpuTexture> {
        self.textures
            .get(&id)
            .ok_or_else(|| anyhow!("render texture {} does not exist", id.raw()))
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl RenderBackend for RaycastBackend {
    fn name(&self) -> &str {
        "raycast"
    }

    fn create_render_texture(&mut self, desc: RenderTextureDesc) -> Result<TextureId> {
        desc.validate()?;
        ensure!(
            desc.width <= MAX_TEXTURE_SIZE && desc.height <= MAX_TEXTURE_SIZE,
            "render texture `{}` exceeds {MAX_TEXTURE_SIZE} texels per side",
            desc.label
        );
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        log::debug!("raycast: created `{}` {}x{} {}", desc.label, desc.width, desc.height, desc.format);
        self.textures.insert(id, CpuTexture::new(desc));
        Ok(id)
    }

    fn destroy_render_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
    }

    fn texture_desc(&self, id: TextureId) -> Option<&RenderTextureDesc> {
        self.textures.get(&id).map(|t| &t.desc)
    }

    fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn max_texture_size(&self) -> u32 {
        MAX_TEXTURE_SIZE
    }

    fn render_depth(&mut self, scene: &Scene, view: &DepthView, target: TextureId) -> Result<()> {
        let timer = PassTimer::start();
        let to_camera = view.pose.inverse().to_mat4();
        let trace = TraceScene::build(scene, to_camera, view.visibility_mask);

        let mut tex = self
            .textures
            .remove(&target)
            .ok_or_else(|| anyhow!("render texture {} does not exist", target.raw()))?;
        let (w, h) = (tex.desc.width, tex.desc.height);
        let format = tex.desc.format;
        let channels = tex.channels();
        let (tan_h, tan_v) = (view.tan_half_h(), view.tan_half_v());
        let [bg0, bg1, bg2] = view.background;
        let background = [bg0, bg1, bg2, 1.0];

        self.install(|| {
            tex.data
                .par_chunks_mut(w as usize * channels)
                .enumerate()
                .for_each(|(row, line)| {
                    let v = (row as f32 + 0.5) / h as f32;
                    for (col, texel) in line.chunks_exact_mut(channels).enumerate() {
                        let u = (col as f32 + 0.5) / w as f32;
                        let dir = pixel_ray(u, v, tan_h, tan_v);
                        // Clip planes bound the forward depth, not the range.
                        let t_min = view.near / dir.x;
                        let t_max = view.far / dir.x;
                        let value = match trace.closest_hit(Vec3::ZERO, dir, t_min, t_max) {
                            Some(hit) => [hit.t.min(view.far), hit.retro, 0.0, 1.0],
                            None => background,
                        };
                        write_texel(format, texel, value);
                    }
                });
        });
        self.textures.insert(target, tex);

        log::trace!(
            "raycast depth pass {}x{} over {} triangles in {:?}",
            w,
            h,
            trace.triangle_count(),
            timer.elapsed()
        );
        Ok(())
    }

    fn render_composite(
        &mut self,
        mesh: &Mesh,
        sources: &[TextureId],
        target: TextureId,
        background: [f32; 3],
    ) -> Result<()> {
        ensure!(!sources.is_empty(), "composite pass needs at least one source texture");
        let sources: Vec<&CpuTexture> = sources
            .iter()
            .map(|id| self.texture(*id))
            .collect::<Result<_>>()?;

        let dst = self.texture(target)?;
        let (w, h) = (dst.desc.width, dst.desc.height);
        let format = dst.desc.format;
        let channels = dst.channels();
        let proj = composite_projection(w, h);

        let mut writes = Vec::with_capacity(mesh.vertex_count());
        for sub in mesh.sub_meshes() {
            let vertices = sub.vertices();
            let uvs = sub.tex_coords();
            let order: Box<dyn Iterator<Item = usize>> = if sub.indices().is_empty() {
                Box::new(0..vertices.len())
            } else {
                Box::new(sub.indices().iter().map(|i| *i as usize))
            };
            for k in order {
                let (Some(pos), Some(uv)) = (vertices.get(k), uvs.get(k)) else { continue };
                let Some((col, row)) = target_texel(&proj, *pos, w, h) else { continue };
                let src = sources[texture_index(*pos).min(sources.len() - 1)];
                let sample = src.texel(
                    mirror_texel(uv.x, src.desc.width),
                    mirror_texel(uv.y, src.desc.height),
                );
                let mut value = [0.0, 0.0, 0.0, 1.0];
                value[..sample.len()].copy_from_slice(sample);
                writes.push(((row as usize * w as usize + col as usize) * channels, value));
            }
        }

        let dst = self
            .textures
            .get_mut(&target)
            .ok_or_else(|| anyhow!("render texture {} does not exist", target.raw()))?;
        let [bg0, bg1, bg2] = background;
        dst.fill([bg0, bg1, bg2, 1.0]);
        for (offset, value) in writes {
            write_texel(format, &mut dst.data[offset..offset + channels], value);
        }
        Ok(())
    }

    fn read_texture(&mut self, id: TextureId, out: &mut Vec<f32>) -> Result<()> {
        let tex = self.texture(id)?;
        out.clear();
        out.extend_from_slice(&tex.data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Pose;
    use crate::mesh::{PrimitiveType, SubMesh};
    use crate::scene::SceneId;
    use crate::texture::PixelFormat;
    use glam::Vec2;

    fn wall_scene(x: f32) -> Scene {
        let mut scene = Scene::new(SceneId(0), "raycast");
        let wall = scene.create_box("wall").unwrap();
        scene
            .set_local_pose(wall, Pose::from_xyz_rpy(x, 0.0, 0.0, 0.0, 0.0, 0.0))
            .unwrap();
        scene.set_local_scale(wall, Vec3::new(0.2, 20.0, 20.0)).unwrap();
        scene
    }

    fn view(far: f32) -> DepthView {
        DepthView {
            pose: Pose::IDENTITY,
            hfov: 1.0,
            vfov: 1.0,
            near: 0.1,
            far,
            visibility_mask: u32::MAX,
            background: [far; 3],
        }
    }

    fn rgb(backend: &mut RaycastBackend, w: u32, h: u32) -> TextureId {
        backend
            .create_render_texture(RenderTextureDesc::new("t", w, h, PixelFormat::Float32Rgb))
            .unwrap()
    }

    // ── textures ─────────────────────────────────────────────────────────

    #[test]
    fn textures_are_tracked() {
        let mut backend = RaycastBackend::new(0).unwrap();
        let id = rgb(&mut backend, 4, 2);
        assert_eq!(backend.texture_count(), 1);
        assert_eq!(backend.texture_desc(id).map(|d| d.width), Some(4));
        backend.destroy_render_texture(id);
        assert_eq!(backend.texture_count(), 0);
        assert!(backend.read_texture(id, &mut Vec::new()).is_err());
    }

    #[test]
    fn zero_sized_textures_are_rejected() {
        let mut backend = RaycastBackend::new(0).unwrap();
        let desc = RenderTextureDesc::new("bad", 0, 3, PixelFormat::Float32Rgb);
        assert!(backend.create_render_texture(desc).is_err());
    }

    // ── depth pass ───────────────────────────────────────────────────────

    #[test]
    fn depth_pass_reports_range() {
        let mut backend = RaycastBackend::new(2).unwrap();
        let target = rgb(&mut backend, 9, 9);
        backend.render_depth(&wall_scene(5.0), &view(100.0), target).unwrap();

        let mut out = Vec::new();
        backend.read_texture(target, &mut out).unwrap();
        assert_eq!(out.len(), 9 * 9 * 3);
        // Centre texel looks straight down +X.
        let centre = (4 * 9 + 4) * 3;
        assert!((out[centre] - 4.9).abs() < 1e-3);
        // Off-axis texels see the wall further away.
        assert!(out[0] > 4.9);
    }

    #[test]
    fn empty_scene_is_background() {
        let mut backend = RaycastBackend::new(0).unwrap();
        let target = rgb(&mut backend, 3, 3);
        let scene = Scene::new(SceneId(1), "empty");
        backend.render_depth(&scene, &view(30.0), target).unwrap();
        let mut out = Vec::new();
        backend.read_texture(target, &mut out).unwrap();
        assert!(out.iter().all(|v| *v == 30.0));
    }

    #[test]
    fn far_clip_is_applied_to_depth() {
        let mut backend = RaycastBackend::new(0).unwrap();
        let target = rgb(&mut backend, 1, 1);
        backend.render_depth(&wall_scene(5.0), &view(3.0), target).unwrap();
        let mut out = Vec::new();
        backend.read_texture(target, &mut out).unwrap();
        assert_eq!(out, vec![3.0, 3.0, 3.0]);
    }

    #[test]
    fn near_clip_reveals_back_face() {
        let mut backend = RaycastBackend::new(0).unwrap();
        let target = rgb(&mut backend, 1, 1);
        let mut v = view(100.0);
        v.near = 5.0;
        backend.render_depth(&wall_scene(5.0), &v, target).unwrap();
        let mut out = Vec::new();
        backend.read_texture(target, &mut out).unwrap();
        assert!((out[0] - 5.1).abs() < 1e-3);
    }

    // ── composite pass ───────────────────────────────────────────────────

    #[test]
    fn composite_routes_samples_by_texture_index() {
        let mut backend = RaycastBackend::new(0).unwrap();
        let a = rgb(&mut backend, 2, 1);
        let b = rgb(&mut backend, 2, 1);
        backend.textures.get_mut(&a).unwrap().fill([1.0, 10.0, 0.0, 1.0]);
        backend.textures.get_mut(&b).unwrap().fill([2.0, 20.0, 0.0, 1.0]);
        let target = rgb(&mut backend, 3, 1);

        // One row of three points: texel 0 from a, texel 1 from b, texel 2 unset.
        let mut sub = SubMesh::new(PrimitiveType::Points);
        for (i, tex) in [(0u32, 0.0f32), (1, 0.001)] {
            sub.add_vertex(Vec3::new(tex, -0.1 * i as f32, 0.1));
            sub.add_tex_coord(Vec2::new(0.25, 0.5));
            sub.add_index(i);
        }
        let mut mesh = Mesh::new("undistortion");
        mesh.add_sub_mesh(sub);

        backend.render_composite(&mesh, &[a, b], target, [9.0; 3]).unwrap();
        let mut out = Vec::new();
        backend.read_texture(target, &mut out).unwrap();
        assert_eq!(out, vec![1.0, 10.0, 0.0, 2.0, 20.0, 0.0, 9.0, 9.0, 9.0]);
    }
}
