use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail, ensure};

use crate::backend::{DepthView, RenderBackend};
use crate::error::ConfigError;
use crate::event::{Connection, FrameEvent, FrameInfo};
use crate::mesh::Mesh;
use crate::scene::{NodeId, Scene, SceneId};
use crate::texture::{PixelFormat, RenderTextureDesc, TextureId};
use crate::time::{PassTimer, RenderTiming};

use super::{GpuRaysConfig, LaserScan, RigLayout, undistortion_mesh};

const CHANNELS: u32 = 3;

/// Range sensor rendered in two passes.
///
/// The first pass renders `camera_count` narrow perspective images holding
/// `(range, retro, 0)` per texel. The second pass resamples them through
/// the undistortion mesh into a `width × height` grid of equally spaced
/// rays.
///
/// Backend textures are created by [`init`](Self::init) and released by
/// [`destroy`](Self::destroy); dropping the sensor frees only host buffers.
pub struct GpuRays {
    name: String,
    node: NodeId,
    scene: SceneId,
    config: GpuRaysConfig,
    range_count: (u32, u32),

    layout: Option<RigLayout>,
    first_pass: Vec<TextureId>,
    second_pass: Option<TextureId>,
    mesh: Option<Mesh>,
    dirty: bool,

    laser_buffer: Option<Vec<f32>>,
    scan_buffer: Option<Vec<f32>>,
    new_laser_frame: FrameEvent,
    timing: RenderTiming,
}

impl std::fmt::Debug for GpuRays {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuRays")
            .field("name", &self.name)
            .field("range_count", &self.range_count)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl Scene {
    /// Creates a range sensor attached to a new sensor node under the root.
    pub fn create_gpu_rays(&mut self, name: &str, config: GpuRaysConfig) -> Result<GpuRays> {
        if let Err(e) = config.validate() {
            log::error!("scene `{}`: cannot create gpu rays `{name}`: {e}", self.name());
            return Err(e.into());
        }
        let node = self.create_sensor_node(name)?;
        let name = self
            .node(node)
            .map(|n| n.name().to_owned())
            .unwrap_or_default();
        Ok(GpuRays::new(name, node, self.id(), config))
    }
}

impl GpuRays {
    fn new(name: String, node: NodeId, scene: SceneId, config: GpuRaysConfig) -> Self {
        let range_count = (config.ray_count, config.vertical_ray_count);
        Self {
            name,
            node,
            scene,
            config,
            range_count,
            layout: None,
            first_pass: Vec::new(),
            second_pass: None,
            mesh: None,
            dirty: true,
            laser_buffer: None,
            scan_buffer: None,
            new_laser_frame: FrameEvent::new(),
            timing: RenderTiming::default(),
        }
    }

    // ── setup ────────────────────────────────────────────────────────────

    /// Builds the rig: layout, first- and second-pass textures and the
    /// undistortion mesh. Does nothing if the rig is current.
    pub fn init(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        if !self.dirty && self.layout.is_some() {
            return Ok(());
        }
        self.release_textures(backend);

        let (w, h) = self.range_count;
        let layout = RigLayout::new(&self.config, w, h, backend.max_texture_size())
            .with_context(|| format!("gpu rays `{}`: invalid rig", self.name))?;

        for i in 0..layout.camera_count {
            let desc = RenderTextureDesc::new(
                format!("gpu_rays_texture_first_pass_{i}"),
                layout.texture_width,
                layout.texture_height,
                PixelFormat::Float32Rgb,
            );
            let id = backend.create_render_texture(desc)?;
            self.first_pass.push(id);
        }
        let desc = RenderTextureDesc::new(
            "gpu_rays_texture_second_pass",
            layout.width,
            layout.height,
            PixelFormat::Float32Rgb,
        );
        self.second_pass = Some(backend.create_render_texture(desc)?);
        self.mesh = Some(undistortion_mesh(&self.name, &layout));

        log::debug!(
            "gpu rays `{}`: {} camera(s) of {:.3}x{:.3} rad at {}x{}, output {}x{}",
            self.name,
            layout.camera_count,
            layout.camera_hfov,
            layout.camera_vfov,
            layout.texture_width,
            layout.texture_height,
            layout.width,
            layout.height
        );
        self.layout = Some(layout);
        self.dirty = false;
        Ok(())
    }

    /// Changes the output grid. Host buffers are dropped and the rig is
    /// rebuilt on the next [`init`](Self::init) or [`render`](Self::render).
    pub fn set_range_count(&mut self, width: u32, height: u32) -> Result<(), ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::new(
                "range_count",
                format!("{width}x{height} has no rays"),
            ));
        }
        if (width, height) != self.range_count {
            self.range_count = (width, height);
            self.laser_buffer = None;
            self.scan_buffer = None;
            self.dirty = true;
        }
        Ok(())
    }

    /// Replaces the configuration; the rig is rebuilt on next use.
    pub fn set_config(&mut self, config: GpuRaysConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.range_count = (config.ray_count, config.vertical_ray_count);
        self.config = config;
        self.laser_buffer = None;
        self.scan_buffer = None;
        self.dirty = true;
        Ok(())
    }

    pub fn set_visibility_mask(&mut self, mask: u32) {
        self.config.visibility_mask = mask;
    }

    fn release_textures(&mut self, backend: &mut dyn RenderBackend) {
        for id in self.first_pass.drain(..) {
            backend.destroy_render_texture(id);
        }
        if let Some(id) = self.second_pass.take() {
            backend.destroy_render_texture(id);
        }
        self.mesh = None;
        self.layout = None;
    }

    /// Releases backend textures and host buffers. The sensor can be
    /// initialised again afterwards.
    pub fn destroy(&mut self, backend: &mut dyn RenderBackend) {
        self.release_textures(backend);
        self.laser_buffer = None;
        self.scan_buffer = None;
        self.dirty = true;
    }

    // ── frame ────────────────────────────────────────────────────────────

    /// Runs both passes from the sensor node's current world pose.
    pub fn render(&mut self, scene: &Scene, backend: &mut dyn RenderBackend) -> Result<()> {
        ensure!(
            scene.id() == self.scene,
            "gpu rays `{}` belongs to another scene than `{}`",
            self.name,
            scene.name()
        );
        self.init(backend)?;

        let pose = scene
            .world_pose(self.node)
            .ok_or_else(|| anyhow!("gpu rays `{}`: sensor node was removed", self.name))?;
        let (Some(layout), Some(mesh), Some(target)) =
            (self.layout.as_ref(), self.mesh.as_ref(), self.second_pass)
        else {
            return Err(anyhow!("gpu rays `{}` is not initialised", self.name));
        };

        let far = self.config.far_clip;
        let mut timer = PassTimer::start();
        for (i, texture) in self.first_pass.iter().enumerate() {
            let view = DepthView {
                pose: layout.view_pose(pose, i),
                hfov: layout.camera_hfov,
                vfov: layout.camera_vfov,
                near: self.config.near_clip,
                far,
                visibility_mask: self.config.visibility_mask,
                background: [far; 3],
            };
            backend
                .render_depth(scene, &view, *texture)
                .with_context(|| format!("gpu rays `{}`: first pass {i} failed", self.name))?;
        }
        let first_pass = timer.restart();

        backend
            .render_composite(mesh, &self.first_pass, target, [far; 3])
            .with_context(|| format!("gpu rays `{}`: second pass failed", self.name))?;
        let second_pass = timer.elapsed();

        self.timing = RenderTiming {
            first_pass,
            second_pass,
        };
        log::trace!(
            "gpu rays `{}`: first pass {:?}, second pass {:?}",
            self.name,
            first_pass,
            second_pass
        );
        Ok(())
    }

    /// Reads the second pass back, copies it to the scan buffer and
    /// notifies subscribers.
    pub fn post_render(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        // A rig changed since the last render still holds old-size textures.
        ensure!(
            !self.dirty,
            "gpu rays `{}`: rig changed since the last render",
            self.name
        );
        let texture = self
            .second_pass
            .ok_or_else(|| anyhow!("gpu rays `{}` has not rendered yet", self.name))?;
        let (w, h) = self.range_count;
        let len = (w * h * CHANNELS) as usize;

        let laser = self
            .laser_buffer
            .get_or_insert_with(|| Vec::with_capacity(len));
        backend.read_texture(texture, laser)?;
        if laser.len() != len {
            let read = laser.len();
            self.laser_buffer = None;
            bail!("gpu rays `{}`: read {read} floats, expected {len}", self.name);
        }

        let scan = self.scan_buffer.get_or_insert_with(|| vec![0.0; len]);
        scan.copy_from_slice(laser);

        let info = FrameInfo {
            width: w,
            height: h,
            channels: CHANNELS,
            format: PixelFormat::Float32Rgb.name(),
        };
        self.new_laser_frame.signal(scan, &info);
        Ok(())
    }

    /// [`render`](Self::render) followed by [`post_render`](Self::post_render).
    pub fn update(&mut self, scene: &Scene, backend: &mut dyn RenderBackend) -> Result<()> {
        self.render(scene, backend)?;
        self.post_render(backend)
    }

    // ── output ───────────────────────────────────────────────────────────

    /// Latest readback, `w × h × 3` floats of `(range, retro, 0)`.
    pub fn laser_data(&self) -> Option<&[f32]> {
        self.laser_buffer.as_deref()
    }

    /// Latest frame converted to per-ray ranges and intensities.
    pub fn laser_scan(&self) -> Option<LaserScan> {
        let (w, h) = self.range_count;
        self.scan_buffer
            .as_deref()
            .map(|data| LaserScan::from_buffer(&self.config, w, h, data))
    }

    /// Subscribes to new frames: `(scan, width, height, 3, "PF_FLOAT32_RGB")`.
    #[must_use = "dropping the connection unsubscribes immediately"]
    pub fn connect_new_laser_frame<F>(&self, callback: F) -> Connection
    where
        F: FnMut(&[f32], &FrameInfo) + Send + 'static,
    {
        self.new_laser_frame.connect(callback)
    }

    /// Wall time of the last [`render`](Self::render), both passes.
    pub fn last_render_duration(&self) -> Duration {
        self.timing.total()
    }

    pub fn render_timing(&self) -> RenderTiming {
        self.timing
    }

    // ── accessors ────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scene node carrying the sensor pose.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn scene_id(&self) -> SceneId {
        self.scene
    }

    pub fn config(&self) -> &GpuRaysConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        !self.dirty && self.layout.is_some()
    }

    pub fn layout(&self) -> Option<&RigLayout> {
        self.layout.as_ref()
    }

    pub fn range_count_width(&self) -> u32 {
        self.range_count.0
    }

    pub fn range_count_height(&self) -> u32 {
        self.range_count.1
    }

    pub fn ray_count(&self) -> u32 {
        self.config.ray_count
    }

    pub fn vertical_ray_count(&self) -> u32 {
        self.config.vertical_ray_count
    }

    pub fn near_clip(&self) -> f32 {
        self.config.near_clip
    }

    pub fn far_clip(&self) -> f32 {
        self.config.far_clip
    }

    /// First-pass camera count, once initialised.
    pub fn camera_count(&self) -> Option<u32> {
        self.layout.as_ref().map(|l| l.camera_count)
    }

    pub fn camera_hfov(&self) -> Option<f32> {
        self.layout.as_ref().map(|l| l.camera_hfov)
    }

    pub fn camera_vfov(&self) -> Option<f32> {
        self.layout.as_ref().map(|l| l.camera_vfov)
    }

    pub fn ray_count_ratio(&self) -> Option<f32> {
        self.layout.as_ref().map(|l| l.ray_count_ratio)
    }

    /// First-pass texture size.
    pub fn texture_size(&self) -> Option<(u32, u32)> {
        self.layout
            .as_ref()
            .map(|l| (l.texture_width, l.texture_height))
    }

    pub fn horizontal_half_angle(&self) -> f32 {
        (self.config.angle_max + self.config.angle_min) * 0.5
    }

    pub fn vertical_half_angle(&self) -> f32 {
        (self.config.vertical_angle_max + self.config.vertical_angle_min) * 0.5
    }

    /// First-pass textures, one per camera.
    pub fn first_pass_textures(&self) -> &[TextureId] {
        &self.first_pass
    }

    pub fn second_pass_texture(&self) -> Option<TextureId> {
        self.second_pass
    }

    pub fn undistortion_mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }
}
