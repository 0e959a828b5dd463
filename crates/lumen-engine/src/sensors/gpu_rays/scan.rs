use serde::Serialize;

use super::GpuRaysConfig;

/// Host-side view of one range frame.
///
/// Rays are row-major: `ranges[j * count + i]` is horizontal ray `i` of
/// vertical row `j`, with row 0 the lowest. Rays that hit nothing report
/// `+inf` and zero intensity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaserScan {
    pub angle_min: f32,
    pub angle_max: f32,
    pub angle_step: f32,
    pub count: u32,
    pub vertical_angle_min: f32,
    pub vertical_angle_max: f32,
    pub vertical_angle_step: f32,
    pub vertical_count: u32,
    pub range_min: f32,
    pub range_max: f32,
    pub ranges: Vec<f32>,
    pub intensities: Vec<f32>,
}

fn step(min: f32, max: f32, count: u32) -> f32 {
    if count > 1 { (max - min) / (count - 1) as f32 } else { 0.0 }
}

impl LaserScan {
    /// Converts a `(range, retro, 0)` buffer of `width × height` rays.
    pub fn from_buffer(config: &GpuRaysConfig, width: u32, height: u32, data: &[f32]) -> Self {
        let far = config.far_clip;
        let (ranges, intensities): (Vec<f32>, Vec<f32>) = data
            .chunks_exact(3)
            .take(width as usize * height as usize)
            .map(|s| {
                if s[0] >= far {
                    (f32::INFINITY, 0.0)
                } else {
                    (s[0], s[1])
                }
            })
            .unzip();

        Self {
            angle_min: config.angle_min,
            angle_max: config.angle_max,
            angle_step: step(config.angle_min, config.angle_max, width),
            count: width,
            vertical_angle_min: config.vertical_angle_min,
            vertical_angle_max: config.vertical_angle_max,
            vertical_angle_step: step(config.vertical_angle_min, config.vertical_angle_max, height),
            vertical_count: height,
            range_min: config.near_clip,
            range_max: far,
            ranges,
            intensities,
        }
    }

    /// Range of ray `i` in row `j`.
    pub fn range(&self, i: u32, j: u32) -> Option<f32> {
        if i >= self.count {
            return None;
        }
        self.ranges.get((j * self.count + i) as usize).copied()
    }

    /// Horizontal angle of ray `i`.
    pub fn angle(&self, i: u32) -> f32 {
        self.angle_min + self.angle_step * i as f32
    }

    /// Nearest finite return, if any.
    pub fn min_range(&self) -> Option<f32> {
        self.ranges
            .iter()
            .copied()
            .filter(|r| r.is_finite())
            .reduce(f32::min)
    }

    pub fn hit_count(&self) -> usize {
        self.ranges.iter().filter(|r| r.is_finite()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misses_become_infinite() {
        let cfg = GpuRaysConfig {
            angle_min: -1.0,
            angle_max: 1.0,
            ray_count: 3,
            far_clip: 10.0,
            ..Default::default()
        };
        let data = [2.0, 5.0, 0.0, 10.0, 10.0, 10.0, 3.0, 0.0, 0.0];
        let scan = LaserScan::from_buffer(&cfg, 3, 1, &data);
        assert_eq!(scan.ranges[0], 2.0);
        assert!(scan.ranges[1].is_infinite());
        assert_eq!(scan.intensities, vec![5.0, 0.0, 0.0]);
        assert_eq!(scan.angle_step, 1.0);
        assert_eq!(scan.angle(2), 1.0);
        assert_eq!(scan.min_range(), Some(2.0));
        assert_eq!(scan.hit_count(), 2);
        assert_eq!(scan.range(2, 0), Some(3.0));
        assert_eq!(scan.range(3, 0), None);
    }

    #[test]
    fn serializes_misses_as_null() {
        let cfg = GpuRaysConfig::default();
        let scan = LaserScan::from_buffer(&cfg, 1, 1, &[cfg.far_clip, 0.0, 0.0]);
        let json = serde_json::to_value(&scan).unwrap();
        assert!(json["ranges"][0].is_null());
        assert_eq!(json["count"], 1);
    }
}
