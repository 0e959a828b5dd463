//! Engine registry.
//!
//! [`RenderEngineManager`] maps engine names to [`RenderEnginePlugin`]s and
//! keeps every [`RenderEngine`] it has loaded. An engine pairs one
//! [`RenderBackend`](crate::backend::RenderBackend) with the scenes drawn by
//! it.

mod manager;
mod params;
mod plugin;
mod render_engine;

pub use manager::RenderEngineManager;
pub use params::{EngineParams, GraphicsApi};
pub use plugin::{RaycastPlugin, RenderEnginePlugin, WgpuPlugin};
pub use render_engine::RenderEngine;
