use std::f32::consts::{FRAC_PI_2, TAU};

use crate::error::ConfigError;
use crate::math::Pose;

use super::GpuRaysConfig;

/// Widest horizontal field one first-pass camera may cover.
pub const MAX_CAMERA_HFOV: f32 = 2.8;

/// Fan width used when every ray points the same way.
const MIN_HFOV: f32 = 1e-4;

/// First-pass camera arrangement derived from a [`GpuRaysConfig`] and the
/// second-pass range count.
#[derive(Debug, Clone, PartialEq)]
pub struct RigLayout {
    pub camera_count: u32,
    /// Horizontal laser field covered by all cameras together.
    pub hfov: f32,
    /// Horizontal field of one camera.
    pub camera_hfov: f32,
    /// Heading of the fan centre relative to the sensor.
    pub horizontal_half_angle: f32,
    /// Vertical laser field, capped at pi/2.
    pub vfov: f32,
    /// Elevation of the fan centre.
    pub vertical_half_angle: f32,
    /// Vertical camera field, padded for the vertical offset and for rays
    /// at the camera's horizontal edges.
    pub camera_vfov: f32,
    /// `tan(camera_hfov / 2) / tan(camera_vfov / 2)`.
    pub ray_count_ratio: f32,
    /// Second-pass size (rays per row, rows).
    pub width: u32,
    pub height: u32,
    /// First-pass texture size.
    pub texture_width: u32,
    pub texture_height: u32,
    /// Yaw of each camera relative to the fan centre; camera 0 is the
    /// rightmost.
    pub camera_yaws: Vec<f32>,
}

impl RigLayout {
    /// `max_texture_size` is the backend limit; the tighter of it and the
    /// configured limit applies.
    pub fn new(
        config: &GpuRaysConfig,
        width: u32,
        height: u32,
        max_texture_size: u32,
    ) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::new(
                "range_count",
                format!("{width}x{height} has no rays"),
            ));
        }

        let mut hfov = config.horizontal_fov();
        if hfov > TAU {
            log::warn!("horizontal field {hfov:.3} rad exceeds 2*pi; clamped");
            hfov = TAU;
        }
        let hfov = hfov.max(MIN_HFOV);

        let camera_count = match config.camera_count {
            Some(n) if hfov / n as f32 <= MAX_CAMERA_HFOV => n,
            Some(n) => {
                return Err(ConfigError::new(
                    "camera_count",
                    format!(
                        "{n} cameras cover {:.3} rad each, more than {MAX_CAMERA_HFOV}",
                        hfov / n as f32
                    ),
                ));
            }
            None if hfov <= MAX_CAMERA_HFOV => 1,
            None if hfov <= 2.0 * MAX_CAMERA_HFOV => 2,
            None => 3,
        };
        let camera_hfov = hfov / camera_count as f32;
        let horizontal_half_angle = (config.angle_max + config.angle_min) * 0.5;

        let mut vfov = config.vertical_fov();
        if vfov > FRAC_PI_2 {
            log::warn!("vertical field {vfov:.3} rad exceeds pi/2; capped");
            vfov = FRAC_PI_2;
        }
        let vertical_half_angle = (config.vertical_angle_max + config.vertical_angle_min) * 0.5;

        let max_size = config.max_texture_size.min(max_texture_size).max(1);
        let tan_h = (camera_hfov * 0.5).tan();
        let per_camera = width.div_ceil(camera_count);
        let mut texture_width = config.min_texture_width.max(per_camera);
        if texture_width > max_size {
            log::warn!("first-pass width {texture_width} clamped to {max_size}");
            texture_width = max_size;
        }

        let (camera_vfov, texture_height) = if height == 1 {
            // Square pixels: one texel row as tall as a texel is wide.
            (2.0 * (tan_h / texture_width as f32).atan(), 1)
        } else {
            let phi_camera = vfov * 0.5 + vertical_half_angle.abs();
            let camera_vfov = 2.0 * (phi_camera.tan() / (camera_hfov * 0.5).cos()).atan();
            let ratio = tan_h / (camera_vfov * 0.5).tan();
            let mut texture_height = ((texture_width as f32 / ratio).ceil() as u32).max(height);
            if texture_height > max_size {
                log::warn!("first-pass height {texture_height} clamped to {max_size}");
                texture_height = max_size;
            }
            (camera_vfov, texture_height)
        };
        let ray_count_ratio = tan_h / (camera_vfov * 0.5).tan();

        let mid = (camera_count as f32 - 1.0) * 0.5;
        let camera_yaws = (0..camera_count)
            .map(|i| (i as f32 - mid) * camera_hfov)
            .collect();

        Ok(Self {
            camera_count,
            hfov,
            camera_hfov,
            horizontal_half_angle,
            vfov,
            vertical_half_angle,
            camera_vfov,
            ray_count_ratio,
            width,
            height,
            texture_width,
            texture_height,
            camera_yaws,
        })
    }

    /// World pose of first-pass camera `camera` for a sensor at `sensor`.
    pub fn view_pose(&self, sensor: Pose, camera: usize) -> Pose {
        let yaw = self.camera_yaws.get(camera).copied().unwrap_or(0.0);
        sensor.with_local_yaw(self.horizontal_half_angle + yaw)
    }

    /// Half of the vertical laser field, 0 for a planar scan.
    #[inline]
    pub fn phi(&self) -> f32 {
        if self.height == 1 { 0.0 } else { self.vfov * 0.5 }
    }

    /// Half of the padded camera vertical field before the edge correction.
    #[inline]
    pub fn phi_camera(&self) -> f32 {
        self.phi() + self.vertical_half_angle.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::f32::consts::PI;

    fn config(angle: f32) -> GpuRaysConfig {
        GpuRaysConfig {
            angle_min: -angle * 0.5,
            angle_max: angle * 0.5,
            ..Default::default()
        }
    }

    // ── camera count ─────────────────────────────────────────────────────

    #[test]
    fn camera_count_follows_fan_width() {
        assert_eq!(RigLayout::new(&config(2.0), 100, 1, 8192).unwrap().camera_count, 1);
        assert_eq!(RigLayout::new(&config(2.8), 100, 1, 8192).unwrap().camera_count, 1);
        assert_eq!(RigLayout::new(&config(PI), 100, 1, 8192).unwrap().camera_count, 2);
        assert_eq!(RigLayout::new(&config(TAU), 100, 1, 8192).unwrap().camera_count, 3);
    }

    #[test]
    fn override_is_checked_against_camera_width() {
        let mut cfg = config(PI);
        cfg.camera_count = Some(4);
        assert_eq!(RigLayout::new(&cfg, 100, 1, 8192).unwrap().camera_count, 4);
        cfg.camera_count = Some(1);
        assert!(RigLayout::new(&cfg, 100, 1, 8192).is_err());
    }

    #[test]
    fn oversized_fan_is_clamped_to_full_circle() {
        let rig = RigLayout::new(&config(8.0), 100, 1, 8192).unwrap();
        assert!((rig.hfov - TAU).abs() < 1e-6);
    }

    // ── yaws ─────────────────────────────────────────────────────────────

    #[test]
    fn yaws_are_centred_with_camera_zero_rightmost() {
        let rig = RigLayout::new(&config(TAU), 100, 1, 8192).unwrap();
        let c = rig.camera_hfov;
        assert_eq!(rig.camera_yaws.len(), 3);
        assert!((rig.camera_yaws[0] + c).abs() < 1e-6);
        assert!(rig.camera_yaws[1].abs() < 1e-6);
        assert!((rig.camera_yaws[2] - c).abs() < 1e-6);
    }

    #[test]
    fn view_pose_adds_fan_heading() {
        let cfg = GpuRaysConfig {
            angle_min: 0.0,
            angle_max: 1.0,
            ..Default::default()
        };
        let rig = RigLayout::new(&cfg, 10, 1, 8192).unwrap();
        let fwd = rig.view_pose(Pose::IDENTITY, 0).forward();
        assert!((fwd - Vec3::new(0.5f32.cos(), 0.5f32.sin(), 0.0)).length() < 1e-5);
    }

    // ── texture sizes ────────────────────────────────────────────────────

    #[test]
    fn planar_scan_uses_one_row_of_square_texels() {
        let rig = RigLayout::new(&config(2.0), 640, 1, 8192).unwrap();
        assert_eq!(rig.texture_width, 2048);
        assert_eq!(rig.texture_height, 1);
        let texel_h = 2.0 * (rig.camera_vfov * 0.5).tan();
        let texel_w = 2.0 * (rig.camera_hfov * 0.5).tan() / 2048.0;
        assert!((texel_h - texel_w).abs() < 1e-6);
    }

    #[test]
    fn wide_range_counts_grow_the_texture() {
        let mut cfg = config(2.0);
        cfg.min_texture_width = 16;
        let rig = RigLayout::new(&cfg, 3000, 1, 8192).unwrap();
        assert_eq!(rig.texture_width, 3000);
    }

    #[test]
    fn multi_row_texels_are_square() {
        let mut cfg = config(2.0);
        cfg.vertical_angle_min = -0.2;
        cfg.vertical_angle_max = 0.2;
        cfg.vertical_ray_count = 16;
        cfg.min_texture_width = 400;
        let rig = RigLayout::new(&cfg, 640, 16, 8192).unwrap();
        let expected = (rig.texture_width as f32 / rig.ray_count_ratio).ceil() as u32;
        assert_eq!(rig.texture_height, expected.max(16));
        // Edge padding widens the camera field beyond the laser field.
        assert!(rig.camera_vfov > rig.vfov);
    }

    #[test]
    fn textures_respect_the_tighter_limit() {
        let mut cfg = config(2.0);
        cfg.vertical_angle_min = -0.7;
        cfg.vertical_angle_max = 0.7;
        cfg.vertical_ray_count = 8;
        let rig = RigLayout::new(&cfg, 640, 8, 1024).unwrap();
        assert_eq!(rig.texture_width, 1024);
        assert!(rig.texture_height <= 1024);
    }

    #[test]
    fn vertical_field_is_capped() {
        let mut cfg = config(2.0);
        cfg.vertical_angle_min = -1.2;
        cfg.vertical_angle_max = 1.2;
        cfg.vertical_ray_count = 8;
        let rig = RigLayout::new(&cfg, 10, 8, 8192).unwrap();
        assert!((rig.vfov - FRAC_PI_2).abs() < 1e-6);
    }
}
