use glam::{Mat4, Vec3, Vec4};

/// Builds an OpenGL-style orthographic projection for the box
/// `[left, right] × [bottom, top] × [-near, -far]`.
///
/// The compositor maps undistortion-mesh vertices to texels with it.
pub fn build_scaled_ortho_matrix(
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
) -> Mat4 {
    let invw = 1.0 / (right - left);
    let invh = 1.0 / (top - bottom);
    let invd = 1.0 / (far - near);

    Mat4::from_cols(
        Vec4::new(2.0 * invw, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * invh, 0.0, 0.0),
        Vec4::new(0.0, 0.0, -2.0 * invd, 0.0),
        Vec4::new(
            -(right + left) * invw,
            -(top + bottom) * invh,
            -(far + near) * invd,
            1.0,
        ),
    )
}

/// Perspective projection for a camera looking along +X (Y left, Z up).
///
/// Output is wgpu clip space: image left maps to NDC x = -1, image top to
/// NDC y = +1, and depth is `0` at `near` and `1` at `far`.
pub fn ray_projection(hfov: f32, vfov: f32, near: f32, far: f32) -> Mat4 {
    let tan_h = (hfov * 0.5).tan();
    let tan_v = (vfov * 0.5).tan();
    let depth = far / (far - near);

    Mat4::from_cols(
        Vec4::new(0.0, 0.0, depth, 1.0),
        Vec4::new(-1.0 / tan_h, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 1.0 / tan_v, 0.0, 0.0),
        Vec4::new(0.0, 0.0, -near * depth, 0.0),
    )
}

/// Unit ray direction in the camera frame through image coordinate `(u, v)`.
///
/// `(0, 0)` is the top-left image corner; `tan_h`/`tan_v` are the tangents of
/// the half fields of view.
#[inline]
pub fn pixel_ray(u: f32, v: f32, tan_h: f32, tan_v: f32) -> Vec3 {
    Vec3::new(1.0, (0.5 - u) * 2.0 * tan_h, (0.5 - v) * 2.0 * tan_v).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ndc(m: Mat4, p: Vec3) -> Vec3 {
        let c = m * p.extend(1.0);
        c.truncate() / c.w
    }

    #[test]
    fn ortho_maps_box_corners_to_unit_cube() {
        let m = build_scaled_ortho_matrix(-0.05, 1.95, 0.05, 0.45, 0.01, 0.02);
        let lo = ndc(m, Vec3::new(-0.05, 0.05, -0.01));
        let hi = ndc(m, Vec3::new(1.95, 0.45, -0.02));
        assert!((lo - Vec3::new(-1.0, -1.0, -1.0)).length() < 1e-5);
        assert!((hi - Vec3::new(1.0, 1.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn projection_depth_spans_near_to_far() {
        let m = ray_projection(1.0, 0.5, 0.1, 10.0);
        assert!(ndc(m, Vec3::new(0.1, 0.0, 0.0)).z.abs() < 1e-6);
        assert!((ndc(m, Vec3::new(10.0, 0.0, 0.0)).z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn projection_puts_left_of_camera_on_the_left_edge() {
        let hfov = 1.2f32;
        let m = ray_projection(hfov, 0.8, 0.1, 10.0);
        let edge = Vec3::new(1.0, (hfov * 0.5).tan(), 0.0);
        assert!((ndc(m, edge).x + 1.0).abs() < 1e-5);
    }

    #[test]
    fn pixel_ray_agrees_with_projection() {
        let (hfov, vfov) = (1.4f32, 0.9f32);
        let m = ray_projection(hfov, vfov, 0.1, 100.0);
        let (u, v) = (0.2f32, 0.7f32);
        let dir = pixel_ray(u, v, (hfov * 0.5).tan(), (vfov * 0.5).tan());
        let p = ndc(m, dir * 5.0);
        assert!(((p.x + 1.0) * 0.5 - u).abs() < 1e-5);
        assert!(((1.0 - p.y) * 0.5 - v).abs() < 1e-5);
    }
}
