use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use lumen_engine::LaserScan;

/// Scan plus how it was produced, as written by `--output`.
#[derive(Debug, Serialize)]
pub struct ScanReport<'a> {
    pub engine: &'a str,
    pub frames: u32,
    pub mean_frame_ms: f64,
    pub scan: &'a LaserScan,
}

impl<'a> ScanReport<'a> {
    pub fn new(engine: &'a str, frames: u32, total: Duration, scan: &'a LaserScan) -> Self {
        let mean_frame_ms = if frames == 0 {
            0.0
        } else {
            total.as_secs_f64() * 1e3 / f64::from(frames)
        };
        Self {
            engine,
            frames,
            mean_frame_ms,
            scan,
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize scan")?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let scan = self.scan;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "engine {}: {} frame(s), {:.2} ms/frame",
            self.engine, self.frames, self.mean_frame_ms
        );
        let _ = writeln!(
            out,
            "rays: {} x {} over [{:.3}, {:.3}] rad",
            scan.count, scan.vertical_count, scan.angle_min, scan.angle_max
        );
        let _ = writeln!(out, "hits: {} / {}", scan.hit_count(), scan.ranges.len());
        match scan.min_range() {
            Some(r) => {
                let _ = writeln!(out, "nearest return: {r:.3} m");
            }
            None => {
                let _ = writeln!(out, "nearest return: none within {:.3} m", scan.range_max);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_engine::GpuRaysConfig;

    fn scan() -> LaserScan {
        let cfg = GpuRaysConfig {
            angle_min: -0.5,
            angle_max: 0.5,
            ray_count: 2,
            far_clip: 10.0,
            ..Default::default()
        };
        LaserScan::from_buffer(&cfg, 2, 1, &[2.5, 1.0, 0.0, 10.0, 10.0, 10.0])
    }

    #[test]
    fn summary_lists_hits_and_nearest() {
        let scan = scan();
        let report = ScanReport::new("raycast", 4, Duration::from_millis(20), &scan);
        assert!((report.mean_frame_ms - 5.0).abs() < 1e-9);
        let text = report.summary();
        assert!(text.contains("hits: 1 / 2"));
        assert!(text.contains("nearest return: 2.500 m"));
    }

    #[test]
    fn misses_serialize_as_null() {
        let scan = scan();
        let report = ScanReport::new("raycast", 1, Duration::ZERO, &scan);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["scan"]["ranges"][0], 2.5);
        assert!(value["scan"]["ranges"][1].is_null());
        assert_eq!(value["engine"], "raycast");
    }
}
