use glam::{Mat4, Vec3};

use crate::scene::Scene;

const EPSILON: f32 = 1e-7;

/// Triangle pre-processed for Möller–Trumbore tests.
#[derive(Debug, Copy, Clone)]
struct Triangle {
    a: Vec3,
    e1: Vec3,
    e2: Vec3,
}

impl Triangle {
    fn new([a, b, c]: [Vec3; 3]) -> Self {
        Self { a, e1: b - a, e2: c - a }
    }

    /// Distance along `dir` to the triangle, both faces count.
    fn intersect(&self, origin: Vec3, dir: Vec3, t_min: f32, t_max: f32) -> Option<f32> {
        let p = dir.cross(self.e2);
        let det = self.e1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = origin - self.a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(self.e1);
        let v = dir.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = self.e2.dot(q) * inv_det;
        (t >= t_min && t <= t_max).then_some(t)
    }
}

/// Triangles of one render item plus their bounds.
#[derive(Debug)]
struct Object {
    min: Vec3,
    max: Vec3,
    triangles: Vec<Triangle>,
    retro: f32,
}

impl Object {
    fn slab_test(&self, origin: Vec3, inv_dir: Vec3, t_min: f32, t_max: f32) -> bool {
        let t0 = (self.min - origin) * inv_dir;
        let t1 = (self.max - origin) * inv_dir;
        let near = t0.min(t1).max_element().max(t_min);
        let far = t0.max(t1).min_element().min(t_max);
        near <= far
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Hit {
    pub t: f32,
    pub retro: f32,
}

/// Scene geometry flattened into one frame for ray queries.
#[derive(Debug, Default)]
pub(crate) struct TraceScene {
    objects: Vec<Object>,
}

impl TraceScene {
    /// Collects every visible item matching `mask`, transformed by
    /// `to_frame` (world → trace frame).
    pub(crate) fn build(scene: &Scene, to_frame: Mat4, mask: u32) -> Self {
        let objects = scene
            .render_items(mask)
            .into_iter()
            .filter_map(|item| {
                let mesh = scene.mesh(item.mesh)?;
                let m = to_frame * item.transform;
                let triangles: Vec<Triangle> = mesh
                    .triangles()
                    .map(|t| Triangle::new(t.map(|p| m.transform_point3(p))))
                    .collect();
                if triangles.is_empty() {
                    return None;
                }
                let (min, max) = triangles.iter().fold(
                    (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
                    |(lo, hi), t| {
                        let b = t.a + t.e1;
                        let c = t.a + t.e2;
                        (lo.min(t.a).min(b).min(c), hi.max(t.a).max(b).max(c))
                    },
                );
                Some(Object { min, max, triangles, retro: item.retro })
            })
            .collect();
        Self { objects }
    }

    pub(crate) fn triangle_count(&self) -> usize {
        self.objects.iter().map(|o| o.triangles.len()).sum()
    }

    /// Closest hit with `t` in `[t_min, t_max]`; `dir` must be normalised.
    pub(crate) fn closest_hit(&self, origin: Vec3, dir: Vec3, t_min: f32, t_max: f32) -> Option<Hit> {
        let inv_dir = dir.recip();
        let mut best: Option<Hit> = None;
        for object in &self.objects {
            let limit = best.map_or(t_max, |h| h.t);
            if !object.slab_test(origin, inv_dir, t_min, limit) {
                continue;
            }
            for tri in &object.triangles {
                let limit = best.map_or(t_max, |h| h.t);
                if let Some(t) = tri.intersect(origin, dir, t_min, limit) {
                    best = Some(Hit { t, retro: object.retro });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Pose;
    use crate::scene::SceneId;

    fn wall_scene(x: f32) -> Scene {
        let mut scene = Scene::new(SceneId(0), "trace");
        let wall = scene.create_box("wall").unwrap();
        scene
            .set_local_pose(wall, Pose::from_xyz_rpy(x, 0.0, 0.0, 0.0, 0.0, 0.0))
            .unwrap();
        scene.set_local_scale(wall, Vec3::new(0.2, 10.0, 10.0)).unwrap();
        scene.create_material("retro").unwrap().laser_retro = 7.0;
        scene.set_material(wall, "retro").unwrap();
        scene
    }

    #[test]
    fn hits_front_face() {
        let trace = TraceScene::build(&wall_scene(3.0), Mat4::IDENTITY, u32::MAX);
        assert_eq!(trace.triangle_count(), 12);
        let hit = trace.closest_hit(Vec3::ZERO, Vec3::X, 0.0, 100.0).unwrap();
        assert!((hit.t - 2.9).abs() < 1e-4);
        assert_eq!(hit.retro, 7.0);
    }

    #[test]
    fn t_min_skips_to_back_face() {
        let trace = TraceScene::build(&wall_scene(3.0), Mat4::IDENTITY, u32::MAX);
        let hit = trace.closest_hit(Vec3::ZERO, Vec3::X, 2.95, 100.0).unwrap();
        assert!((hit.t - 3.1).abs() < 1e-4);
    }

    #[test]
    fn misses_behind_and_beyond() {
        let trace = TraceScene::build(&wall_scene(3.0), Mat4::IDENTITY, u32::MAX);
        assert!(trace.closest_hit(Vec3::ZERO, -Vec3::X, 0.0, 100.0).is_none());
        assert!(trace.closest_hit(Vec3::ZERO, Vec3::X, 0.0, 2.0).is_none());
    }

    #[test]
    fn frame_transform_applies() {
        let scene = wall_scene(3.0);
        // Trace frame shifted one metre forward.
        let to_frame = Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0));
        let trace = TraceScene::build(&scene, to_frame, u32::MAX);
        let hit = trace.closest_hit(Vec3::ZERO, Vec3::X, 0.0, 100.0).unwrap();
        assert!((hit.t - 1.9).abs() < 1e-4);
    }
}
