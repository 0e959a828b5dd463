use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scene::VISIBILITY_ALL;

/// Range sensor description. Angles are radians, distances metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuRaysConfig {
    /// Horizontal angle of the first ray; 0 is straight ahead, positive left.
    pub angle_min: f32,
    pub angle_max: f32,
    pub ray_count: u32,
    /// Elevation of the lowest ray row.
    pub vertical_angle_min: f32,
    pub vertical_angle_max: f32,
    pub vertical_ray_count: u32,
    pub near_clip: f32,
    pub far_clip: f32,
    /// Lower bound on the width of each first-pass texture.
    pub min_texture_width: u32,
    /// Upper bound on either first-pass texture dimension.
    pub max_texture_size: u32,
    /// Forces the number of first-pass cameras (1..=4).
    pub camera_count: Option<u32>,
    pub visibility_mask: u32,
}

impl Default for GpuRaysConfig {
    fn default() -> Self {
        Self {
            angle_min: -FRAC_PI_2,
            angle_max: FRAC_PI_2,
            ray_count: 640,
            vertical_angle_min: 0.0,
            vertical_angle_max: 0.0,
            vertical_ray_count: 1,
            near_clip: 0.08,
            far_clip: 10.0,
            min_texture_width: 2048,
            max_texture_size: 8192,
            camera_count: None,
            visibility_mask: VISIBILITY_ALL,
        }
    }
}

impl GpuRaysConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [
            ("angle_min", self.angle_min),
            ("angle_max", self.angle_max),
            ("vertical_angle_min", self.vertical_angle_min),
            ("vertical_angle_max", self.vertical_angle_max),
            ("near_clip", self.near_clip),
            ("far_clip", self.far_clip),
        ];
        if let Some((key, _)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::new(*key, "must be finite"));
        }

        if self.ray_count == 0 {
            return Err(ConfigError::new("ray_count", "must be at least 1"));
        }
        if self.vertical_ray_count == 0 {
            return Err(ConfigError::new("vertical_ray_count", "must be at least 1"));
        }
        if self.angle_max < self.angle_min
            || (self.ray_count > 1 && self.angle_max == self.angle_min)
        {
            return Err(ConfigError::new("angle_max", "must exceed angle_min"));
        }
        if self.vertical_angle_max < self.vertical_angle_min
            || (self.vertical_ray_count > 1 && self.vertical_angle_max == self.vertical_angle_min)
        {
            return Err(ConfigError::new(
                "vertical_angle_max",
                "must exceed vertical_angle_min",
            ));
        }
        if self.vertical_angle_min <= -FRAC_PI_2 || self.vertical_angle_max >= FRAC_PI_2 {
            return Err(ConfigError::new(
                "vertical_angle_min",
                "vertical angles must lie strictly between -pi/2 and pi/2",
            ));
        }
        if self.near_clip <= 0.0 {
            return Err(ConfigError::new("near_clip", "must be positive"));
        }
        if self.far_clip <= self.near_clip {
            return Err(ConfigError::new("far_clip", "must exceed near_clip"));
        }
        if self.min_texture_width == 0 {
            return Err(ConfigError::new("min_texture_width", "must be at least 1"));
        }
        if self.max_texture_size == 0 {
            return Err(ConfigError::new("max_texture_size", "must be at least 1"));
        }
        if let Some(n) = self.camera_count {
            if !(1..=4).contains(&n) {
                return Err(ConfigError::new("camera_count", format!("{n} is outside 1..=4")));
            }
        }
        Ok(())
    }

    /// Horizontal fan width.
    #[inline]
    pub fn horizontal_fov(&self) -> f32 {
        self.angle_max - self.angle_min
    }

    /// Vertical fan height.
    #[inline]
    pub fn vertical_fov(&self) -> f32 {
        self.vertical_angle_max - self.vertical_angle_min
    }
}
