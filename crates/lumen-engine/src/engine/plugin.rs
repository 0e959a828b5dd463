use anyhow::Result;

use crate::backend::{RaycastBackend, RenderBackend, WgpuBackend};

use super::EngineParams;

/// Factory for one kind of render engine.
pub trait RenderEnginePlugin: Send + Sync {
    /// Name engines of this kind are requested by.
    fn name(&self) -> &str;

    fn create(&self, params: &EngineParams) -> Result<Box<dyn RenderBackend>>;
}

/// Hardware rasterisation through wgpu.
#[derive(Debug, Default)]
pub struct WgpuPlugin;

impl RenderEnginePlugin for WgpuPlugin {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn create(&self, params: &EngineParams) -> Result<Box<dyn RenderBackend>> {
        Ok(Box::new(WgpuBackend::new(params.gpu_init())?))
    }
}

/// CPU ray casting; needs no GPU.
#[derive(Debug, Default)]
pub struct RaycastPlugin;

impl RenderEnginePlugin for RaycastPlugin {
    fn name(&self) -> &str {
        "raycast"
    }

    fn create(&self, params: &EngineParams) -> Result<Box<dyn RenderBackend>> {
        Ok(Box::new(RaycastBackend::new(params.threads)?))
    }
}
