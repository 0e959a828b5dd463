use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use anyhow::{Result, anyhow, ensure};
use serde::{Deserialize, Serialize};

use crate::backend::{DepthView, RenderBackend};
use crate::error::ConfigError;
use crate::event::{Connection, FrameEvent, FrameInfo};
use crate::math::pixel_ray;
use crate::scene::{NodeId, Scene, SceneId, VISIBILITY_ALL};
use crate::texture::{PixelFormat, RenderTextureDesc, TextureId};
use crate::time::PassTimer;

/// Pinhole depth sensor description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthCameraConfig {
    pub width: u32,
    pub height: u32,
    /// Horizontal field of view; the vertical one follows from square pixels.
    pub hfov: f32,
    pub near_clip: f32,
    pub far_clip: f32,
    pub visibility_mask: u32,
}

impl Default for DepthCameraConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            hfov: FRAC_PI_2,
            near_clip: 0.1,
            far_clip: 10.0,
            visibility_mask: VISIBILITY_ALL,
        }
    }
}

impl DepthCameraConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::new("width", "image must not be empty"));
        }
        if !(self.hfov > 0.0 && self.hfov < 3.0) {
            return Err(ConfigError::new("hfov", "must lie in (0, 3) rad"));
        }
        if !(self.near_clip > 0.0) {
            return Err(ConfigError::new("near_clip", "must be positive"));
        }
        if !(self.far_clip > self.near_clip) || !self.far_clip.is_finite() {
            return Err(ConfigError::new("far_clip", "must exceed near_clip"));
        }
        Ok(())
    }

    /// Vertical field of view for square pixels.
    pub fn vfov(&self) -> f32 {
        let tan_v = (self.hfov * 0.5).tan() * self.height as f32 / self.width as f32;
        2.0 * tan_v.atan()
    }
}

/// Single-camera depth sensor.
///
/// Each [`update`](Self::update) renders one first pass and publishes the
/// range image and an XYZ point cloud in the camera frame.
pub struct DepthCamera {
    name: String,
    node: NodeId,
    scene: SceneId,
    config: DepthCameraConfig,
    texture: Option<TextureId>,
    readback: Vec<f32>,
    depth: Vec<f32>,
    points: Vec<f32>,
    new_depth_frame: FrameEvent,
    new_point_cloud: FrameEvent,
    last_render: Duration,
}

impl Scene {
    /// Creates a depth camera attached to a new sensor node under the root.
    pub fn create_depth_camera(
        &mut self,
        name: &str,
        config: DepthCameraConfig,
    ) -> Result<DepthCamera> {
        if let Err(e) = config.validate() {
            log::error!("scene `{}`: cannot create depth camera `{name}`: {e}", self.name());
            return Err(e.into());
        }
        let node = self.create_sensor_node(name)?;
        let name = self
            .node(node)
            .map(|n| n.name().to_owned())
            .unwrap_or_default();
        Ok(DepthCamera {
            name,
            node,
            scene: self.id(),
            config,
            texture: None,
            readback: Vec::new(),
            depth: Vec::new(),
            points: Vec::new(),
            new_depth_frame: FrameEvent::new(),
            new_point_cloud: FrameEvent::new(),
            last_render: Duration::ZERO,
        })
    }
}

impl DepthCamera {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn config(&self) -> &DepthCameraConfig {
        &self.config
    }

    pub fn image_width(&self) -> u32 {
        self.config.width
    }

    pub fn image_height(&self) -> u32 {
        self.config.height
    }

    pub fn last_render_duration(&self) -> Duration {
        self.last_render
    }

    /// Latest range image, row-major, `width × height` floats.
    pub fn depth_data(&self) -> &[f32] {
        &self.depth
    }

    /// Latest XYZ point cloud, `width × height × 3` floats.
    pub fn point_cloud(&self) -> &[f32] {
        &self.points
    }

    #[must_use = "dropping the connection unsubscribes immediately"]
    pub fn connect_new_depth_frame<F>(&self, callback: F) -> Connection
    where
        F: FnMut(&[f32], &FrameInfo) + Send + 'static,
    {
        self.new_depth_frame.connect(callback)
    }

    #[must_use = "dropping the connection unsubscribes immediately"]
    pub fn connect_new_point_cloud<F>(&self, callback: F) -> Connection
    where
        F: FnMut(&[f32], &FrameInfo) + Send + 'static,
    {
        self.new_point_cloud.connect(callback)
    }

    fn ensure_texture(&mut self, backend: &mut dyn RenderBackend) -> Result<TextureId> {
        if let Some(id) = self.texture {
            return Ok(id);
        }
        let desc = RenderTextureDesc::new(
            format!("{}_depth", self.name),
            self.config.width,
            self.config.height,
            PixelFormat::Float32Rgb,
        );
        let id = backend.create_render_texture(desc)?;
        self.texture = Some(id);
        Ok(id)
    }

    /// Renders, reads back and publishes one frame.
    pub fn update(&mut self, scene: &Scene, backend: &mut dyn RenderBackend) -> Result<()> {
        ensure!(
            scene.id() == self.scene,
            "depth camera `{}` belongs to another scene than `{}`",
            self.name,
            scene.name()
        );
        let timer = PassTimer::start();
        let texture = self.ensure_texture(backend)?;
        let pose = scene
            .world_pose(self.node)
            .ok_or_else(|| anyhow!("depth camera `{}`: sensor node was removed", self.name))?;

        let cfg = &self.config;
        let far = cfg.far_clip;
        let view = DepthView {
            pose,
            hfov: cfg.hfov,
            vfov: cfg.vfov(),
            near: cfg.near_clip,
            far,
            visibility_mask: cfg.visibility_mask,
            background: [far; 3],
        };
        backend.render_depth(scene, &view, texture)?;
        backend.read_texture(texture, &mut self.readback)?;

        let (w, h) = (cfg.width, cfg.height);
        let (tan_h, tan_v) = (view.tan_half_h(), view.tan_half_v());
        self.depth.clear();
        self.points.clear();
        for (k, texel) in self.readback.chunks_exact(3).enumerate() {
            let range = texel[0];
            self.depth.push(range);
            if range >= far {
                self.points.extend([f32::INFINITY; 3]);
            } else {
                let (col, row) = ((k as u32 % w) as f32, (k as u32 / w) as f32);
                let dir = pixel_ray((col + 0.5) / w as f32, (row + 0.5) / h as f32, tan_h, tan_v);
                self.points.extend((dir * range).to_array());
            }
        }
        self.last_render = timer.elapsed();

        self.new_depth_frame.signal(
            &self.depth,
            &FrameInfo {
                width: w,
                height: h,
                channels: 1,
                format: PixelFormat::Float32R.name(),
            },
        );
        self.new_point_cloud.signal(
            &self.points,
            &FrameInfo {
                width: w,
                height: h,
                channels: 3,
                format: PixelFormat::Float32Rgb.name(),
            },
        );
        Ok(())
    }

    /// Releases the backend texture.
    pub fn destroy(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(id) = self.texture.take() {
            backend.destroy_render_texture(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use glam::Vec3;

    use crate::backend::RaycastBackend;
    use crate::math::Pose;

    fn small() -> DepthCameraConfig {
        DepthCameraConfig {
            width: 5,
            height: 3,
            hfov: 1.0,
            far_clip: 20.0,
            ..Default::default()
        }
    }

    #[test]
    fn config_validation() {
        assert!(DepthCameraConfig::default().validate().is_ok());
        let bad = DepthCameraConfig {
            hfov: 0.0,
            ..Default::default()
        };
        assert_eq!(bad.validate().unwrap_err().key, "hfov");
    }

    #[test]
    fn square_pixel_vfov() {
        let cfg = DepthCameraConfig {
            width: 100,
            height: 100,
            ..Default::default()
        };
        assert!((cfg.vfov() - cfg.hfov).abs() < 1e-6);
    }

    #[test]
    fn depth_and_point_cloud_of_a_wall() {
        let mut scene = Scene::new(SceneId(0), "world");
        let wall = scene.create_box("wall").unwrap();
        scene
            .set_local_pose(wall, Pose::from_xyz_rpy(4.05, 0.0, 0.0, 0.0, 0.0, 0.0))
            .unwrap();
        scene.set_local_scale(wall, Vec3::new(0.1, 40.0, 40.0)).unwrap();

        let mut backend = RaycastBackend::new(1).unwrap();
        let mut camera = scene.create_depth_camera("depth", small()).unwrap();
        let frames = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&frames);
        let _conn = camera.connect_new_point_cloud(move |data, info| {
            assert_eq!(data.len(), info.len());
            assert_eq!(info.format, "PF_FLOAT32_RGB");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        camera.update(&scene, &mut backend).unwrap();
        assert_eq!(frames.load(Ordering::SeqCst), 1);
        assert_eq!(camera.depth_data().len(), 15);

        // Every point lies on the wall plane.
        for p in camera.point_cloud().chunks_exact(3) {
            assert!((p[0] - 4.0).abs() < 1e-3);
        }
        // Centre pixel looks straight ahead.
        assert!((camera.depth_data()[7] - 4.0).abs() < 1e-3);
    }

    #[test]
    fn misses_are_infinite_points() {
        let mut scene = Scene::new(SceneId(0), "world");
        let mut backend = RaycastBackend::new(1).unwrap();
        let mut camera = scene.create_depth_camera("", small()).unwrap();
        camera.update(&scene, &mut backend).unwrap();
        assert!(camera.point_cloud().iter().all(|v| v.is_infinite()));
        assert!(camera.depth_data().iter().all(|v| *v == 20.0));

        camera.destroy(&mut backend);
        assert_eq!(backend.texture_count(), 0);
    }
}
