//! GPU range sensor.
//!
//! Setup flow:
//! 1. [`Scene::create_gpu_rays`](crate::scene::Scene::create_gpu_rays)
//!    validates a [`GpuRaysConfig`] and adds a sensor node
//! 2. [`GpuRays::init`] derives the [`RigLayout`], creates the textures and
//!    builds the undistortion mesh
//! 3. [`GpuRays::update`] renders, reads back and publishes one frame

mod config;
mod rig;
mod scan;
mod sensor;
mod undistortion;

pub use config::GpuRaysConfig;
pub use rig::{MAX_CAMERA_HFOV, RigLayout};
pub use scan::LaserScan;
pub use sensor::GpuRays;
pub use undistortion::undistortion_mesh;
