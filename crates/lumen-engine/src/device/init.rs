/// Initialization parameters for the headless GPU layer.
///
/// Keep this structure small. Add fields only when a concrete backend
/// requirement exists.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Graphics APIs wgpu may pick an adapter from.
    pub backends: wgpu::Backends,

    /// Adapter preference between discrete and integrated GPUs.
    pub power_preference: wgpu::PowerPreference,

    /// Use a software adapter even when hardware is available.
    pub force_fallback_adapter: bool,

    /// Required wgpu features.
    ///
    /// The range pipeline only needs core features; keep this empty for
    /// portability.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        }
    }
}
