//! Sensors rendered through a [`RenderBackend`](crate::backend::RenderBackend).

mod depth_camera;
pub mod gpu_rays;

pub use depth_camera::{DepthCamera, DepthCameraConfig};
pub use gpu_rays::{GpuRays, GpuRaysConfig, LaserScan, RigLayout};
