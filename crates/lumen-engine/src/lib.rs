//! Lumen rendering layer.
//!
//! This crate owns the scene graph, the render-engine registry and the
//! backends that rasterize or ray-cast it, plus the range sensors built on top.

pub mod backend;
pub mod device;
pub mod engine;
pub mod error;
pub mod event;
pub mod logging;
pub mod math;
pub mod mesh;
pub mod scene;
pub mod sensors;
pub mod texture;
pub mod time;

pub use backend::{RaycastBackend, RenderBackend, WgpuBackend};
pub use engine::{EngineParams, RenderEngine, RenderEngineManager};
pub use error::ConfigError;
pub use math::Pose;
pub use scene::Scene;
pub use sensors::{DepthCamera, DepthCameraConfig, GpuRays, GpuRaysConfig, LaserScan};
