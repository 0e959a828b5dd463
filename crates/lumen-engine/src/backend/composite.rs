//! Undistortion-mesh conventions shared by both compositors.
//!
//! A mesh vertex at `(t / 1000, -0.1 i, h / 10 - dy j)` addresses target
//! texel `(i, j)` of a `w × h` image through the scaled orthographic
//! projection below and samples source texture `t`.

use glam::{Mat4, Vec3, Vec4};

use crate::math::build_scaled_ortho_matrix;

/// Camera-space depth the mesh is placed at; maps to the middle of the
/// `[0, 1]` clip depth range.
pub(crate) const MESH_DEPTH: f32 = -0.0175;

/// Source texture a vertex samples from.
#[inline]
pub(crate) fn texture_index(pos: Vec3) -> usize {
    (pos.x * 1000.0).round().max(0.0) as usize
}

/// Orthographic projection covering a `width × height` point grid.
pub(crate) fn composite_projection(width: u32, height: u32) -> Mat4 {
    build_scaled_ortho_matrix(
        -0.05,
        width as f32 / 10.0 - 0.05,
        0.05,
        height as f32 / 10.0 + 0.05,
        0.01,
        0.02,
    )
}

/// Position a mesh vertex is drawn at, in the composite camera frame.
#[inline]
pub(crate) fn composite_position(pos: Vec3) -> Vec4 {
    Vec4::new(-pos.y, pos.z, MESH_DEPTH, 1.0)
}

/// Target texel `(col, row)` of a vertex, `None` outside the image.
pub(crate) fn target_texel(proj: &Mat4, pos: Vec3, width: u32, height: u32) -> Option<(u32, u32)> {
    let clip = *proj * composite_position(pos);
    let ndc = clip.truncate() / clip.w;
    let col = ((ndc.x + 1.0) * 0.5 * width as f32).floor();
    let row = ((1.0 - ndc.y) * 0.5 * height as f32).floor();
    if col < 0.0 || row < 0.0 || col >= width as f32 || row >= height as f32 {
        return None;
    }
    Some((col as u32, row as u32))
}

/// Mirrored-repeat wrap of a texture coordinate into `[0, 1]`.
#[inline]
pub(crate) fn mirror_coord(u: f32) -> f32 {
    let t = u - 2.0 * (u * 0.5).floor();
    if t > 1.0 { 2.0 - t } else { t }
}

/// Nearest texel index along an axis of `size` texels.
#[inline]
pub(crate) fn mirror_texel(u: f32, size: u32) -> u32 {
    let t = mirror_coord(u);
    ((t * size as f32).floor() as u32).min(size.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_vertices_land_on_their_texel() {
        let (w, h) = (7u32, 4u32);
        let proj = composite_projection(w, h);
        for j in 0..h {
            for i in 0..w {
                let pos = Vec3::new(0.002, -0.1 * i as f32, h as f32 / 10.0 - 0.1 * j as f32);
                assert_eq!(target_texel(&proj, pos, w, h), Some((i, j)));
            }
        }
    }

    #[test]
    fn single_row_lands_on_row_zero() {
        let proj = composite_projection(5, 1);
        let pos = Vec3::new(0.0, -0.3, 0.1);
        assert_eq!(target_texel(&proj, pos, 5, 1), Some((3, 0)));
    }

    #[test]
    fn mesh_depth_is_inside_the_clip_volume() {
        for (w, h) in [(1, 1), (3, 3), (640, 1), (1024, 64)] {
            let proj = composite_projection(w, h);
            let clip = proj * composite_position(Vec3::new(0.0, -0.1, 0.3));
            let z = clip.z / clip.w;
            assert!((z - 0.5).abs() < 1e-4, "{w}x{h}: z = {z}");
        }
    }

    #[test]
    fn texture_index_decodes() {
        assert_eq!(texture_index(Vec3::new(0.002, 0.0, 0.0)), 2);
        assert_eq!(texture_index(Vec3::new(0.0, -5.0, 1.0)), 0);
    }

    #[test]
    fn mirror_wraps() {
        assert!((mirror_coord(0.25) - 0.25).abs() < 1e-6);
        assert!((mirror_coord(1.25) - 0.75).abs() < 1e-6);
        assert!((mirror_coord(-0.25) - 0.25).abs() < 1e-6);
        assert_eq!(mirror_texel(1.0, 4), 3);
        assert_eq!(mirror_texel(0.0, 4), 0);
        assert_eq!(mirror_texel(0.5, 4), 2);
    }
}
