//! Point mesh that resamples the first-pass images onto the ray grid.
//!
//! Vertex `(i, j)` stands for horizontal ray `i` of row `j`. Its position
//! encodes the source texture (`x = texture / 1000`) and the output texel
//! (`y = -0.1 i`, `z = h / 10 - dy j`); its texture coordinate is where the
//! ray pierces the source camera's image plane.

use glam::{Vec2, Vec3};

use crate::mesh::{Mesh, PrimitiveType, SubMesh};

use super::RigLayout;

const DX: f32 = 0.1;
const ROW_STEP: f32 = 0.1;

/// Builds the undistortion mesh for `rig`.
///
/// The last ray (`δ = hfov`) keeps its angle and samples the left edge of the
/// last camera; it is not shifted back by one ray step.
pub fn undistortion_mesh(name: &str, rig: &RigLayout) -> Mesh {
    let (w, h) = (rig.width, rig.height);
    let n = rig.camera_count;
    let theta = rig.camera_hfov;
    let tan_half_theta = (theta * 0.5).tan();
    let cos_half_theta = (theta * 0.5).cos();
    let phi = rig.phi();
    let tan_phi_camera = rig.phi_camera().tan();

    let dy = if h == 1 { 0.0 } else { ROW_STEP };
    let hstep = if w > 1 { rig.hfov / (w - 1) as f32 } else { 0.0 };
    let vstep = if h > 1 { 2.0 * phi / (h - 1) as f32 } else { 0.0 };

    let mut sub = SubMesh::with_capacity(PrimitiveType::Points, (w * h) as usize);
    for j in 0..h {
        let gamma = if h == 1 {
            0.0
        } else {
            vstep * j as f32 - phi + rig.vertical_half_angle
        };
        let start_y = h as f32 / 10.0 - dy * j as f32;

        for i in 0..w {
            let delta = if w == 1 { rig.hfov * 0.5 } else { hstep * i as f32 };
            let texture = ((delta / theta).floor().max(0.0) as u32).min(n - 1);
            let delta_camera = delta - texture as f32 * theta - theta * 0.5;

            let u = if w == 1 {
                0.5
            } else {
                0.5 - delta_camera.tan() / (2.0 * tan_half_theta)
            };
            let v = if h == 1 {
                0.5
            } else {
                0.5 - gamma.tan() * cos_half_theta / (2.0 * tan_phi_camera * delta_camera.cos())
            };

            sub.add_vertex(Vec3::new(texture as f32 / 1000.0, -DX * i as f32, start_y));
            sub.add_tex_coord(Vec2::new(u, v));
            sub.add_index(w * j + i);
        }
    }

    let mut mesh = Mesh::new(format!("{name}_undistortion_mesh"));
    mesh.add_sub_mesh(sub);
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::composite::{composite_projection, target_texel, texture_index};
    use crate::sensors::gpu_rays::GpuRaysConfig;

    /// Wide enough for three cameras.
    const WIDE_FAN: f32 = 6.0;

    fn rig(angle: f32, w: u32, h: u32, vertical: f32) -> RigLayout {
        let cfg = GpuRaysConfig {
            angle_min: -angle * 0.5,
            angle_max: angle * 0.5,
            ray_count: w,
            vertical_angle_min: -vertical * 0.5,
            vertical_angle_max: vertical * 0.5,
            vertical_ray_count: h,
            ..Default::default()
        };
        RigLayout::new(&cfg, w, h, 8192).unwrap()
    }

    #[test]
    fn one_point_per_ray() {
        let r = rig(2.0, 11, 3, 0.4);
        let mesh = undistortion_mesh("lidar", &r);
        assert_eq!(mesh.name(), "lidar_undistortion_mesh");
        assert_eq!(mesh.sub_mesh_count(), 1);
        assert_eq!(mesh.vertex_count(), 33);
        let sub = &mesh.sub_meshes()[0];
        assert_eq!(sub.primitive_type(), PrimitiveType::Points);
        assert_eq!(sub.indices()[14], 14);
    }

    #[test]
    fn points_address_their_own_texel() {
        let r = rig(WIDE_FAN, 9, 4, 0.4);
        let mesh = undistortion_mesh("lidar", &r);
        let proj = composite_projection(9, 4);
        let sub = &mesh.sub_meshes()[0];
        for (k, p) in sub.vertices().iter().enumerate() {
            let expected = ((k % 9) as u32, (k / 9) as u32);
            assert_eq!(target_texel(&proj, *p, 9, 4), Some(expected));
        }
    }

    #[test]
    fn texture_index_walks_the_cameras() {
        let r = rig(WIDE_FAN, 9, 1, 0.0);
        assert_eq!(r.camera_count, 3);
        let mesh = undistortion_mesh("lidar", &r);
        let tex: Vec<usize> = mesh.sub_meshes()[0]
            .vertices()
            .iter()
            .map(|p| texture_index(*p))
            .collect();
        assert_eq!(tex, vec![0, 0, 0, 1, 1, 1, 2, 2, 2]);

        let last = mesh.sub_meshes()[0].tex_coords()[8];
        assert!(last.x.abs() < 1e-4, "last ray at u = {}", last.x);
    }

    #[test]
    fn edge_rays_hit_image_edges() {
        let r = rig(2.0, 5, 1, 0.0);
        let mesh = undistortion_mesh("lidar", &r);
        let uv = mesh.sub_meshes()[0].tex_coords();
        // First ray is the rightmost: right image edge.
        assert!((uv[0].x - 1.0).abs() < 1e-5);
        assert!((uv[2].x - 0.5).abs() < 1e-5);
        assert!(uv[4].x.abs() < 1e-5);
        assert!(uv.iter().all(|t| t.y == 0.5));
    }

    #[test]
    fn rows_run_from_lowest_to_highest() {
        let r = rig(1.0, 3, 3, 0.4);
        let mesh = undistortion_mesh("lidar", &r);
        let uv = mesh.sub_meshes()[0].tex_coords();
        // Row 0 looks down, so it samples below the image centre.
        assert!(uv[1].y > 0.5);
        assert!((uv[4].y - 0.5).abs() < 1e-6);
        assert!(uv[7].y < 0.5);
        assert!((uv[1].y - 0.5 + uv[7].y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn single_ray_looks_down_the_axis() {
        let r = rig(0.0, 1, 1, 0.0);
        let mesh = undistortion_mesh("lidar", &r);
        assert_eq!(mesh.sub_meshes()[0].tex_coords(), &[Vec2::new(0.5, 0.5)]);
    }
}
