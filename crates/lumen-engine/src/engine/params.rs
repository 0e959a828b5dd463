use std::collections::HashMap;
use std::str::FromStr;

use crate::device::GpuInit;
use crate::error::ConfigError;

/// Graphics API the wgpu backend is restricted to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum GraphicsApi {
    #[default]
    Auto,
    Vulkan,
    Metal,
    Dx12,
    Gl,
}

impl GraphicsApi {
    pub fn backends(self) -> wgpu::Backends {
        match self {
            GraphicsApi::Auto => wgpu::Backends::all(),
            GraphicsApi::Vulkan => wgpu::Backends::VULKAN,
            GraphicsApi::Metal => wgpu::Backends::METAL,
            GraphicsApi::Dx12 => wgpu::Backends::DX12,
            GraphicsApi::Gl => wgpu::Backends::GL,
        }
    }
}

impl FromStr for GraphicsApi {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(GraphicsApi::Auto),
            "vulkan" => Ok(GraphicsApi::Vulkan),
            "metal" => Ok(GraphicsApi::Metal),
            "dx12" | "d3d12" => Ok(GraphicsApi::Dx12),
            "gl" | "opengl" | "gles" => Ok(GraphicsApi::Gl),
            other => Err(ConfigError::new(
                "graphics_api",
                format!("unknown graphics API `{other}` (expected auto|vulkan|metal|dx12|gl)"),
            )),
        }
    }
}

/// Engine load parameters, parsed from a string map.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineParams {
    /// Off-screen only. Window output is not supported, so `false` only
    /// produces a warning.
    pub headless: bool,
    pub graphics_api: GraphicsApi,
    pub power_preference: wgpu::PowerPreference,
    pub fallback_adapter: bool,
    /// Ray-cast worker threads; 0 uses rayon's global pool.
    pub threads: usize,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            headless: true,
            graphics_api: GraphicsApi::Auto,
            power_preference: wgpu::PowerPreference::HighPerformance,
            fallback_adapter: false,
            threads: 0,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::new(key, format!("expected a boolean, got `{value}`"))),
    }
}

impl EngineParams {
    /// Parses known keys; unknown keys are logged and ignored.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut params = Self::default();
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();

        for key in keys {
            let value = map[key].trim();
            match key.as_str() {
                "headless" => params.headless = parse_bool(key, value)?,
                "graphics_api" => params.graphics_api = value.parse()?,
                "metal" => {
                    if parse_bool(key, value)? {
                        params.graphics_api = GraphicsApi::Metal;
                    }
                }
                "power" => {
                    params.power_preference = match value {
                        "high" => wgpu::PowerPreference::HighPerformance,
                        "low" => wgpu::PowerPreference::LowPower,
                        _ => {
                            return Err(ConfigError::new(
                                key.as_str(),
                                format!("expected high|low, got `{value}`"),
                            ));
                        }
                    }
                }
                "fallback_adapter" => params.fallback_adapter = parse_bool(key, value)?,
                "threads" => {
                    params.threads = value.parse().map_err(|_| {
                        ConfigError::new(key.as_str(), format!("expected a thread count, got `{value}`"))
                    })?
                }
                _ => log::debug!("ignoring unknown engine parameter `{key}`"),
            }
        }

        if !params.headless {
            log::warn!("windowed rendering is not supported; rendering off-screen");
        }
        Ok(params)
    }

    pub fn gpu_init(&self) -> GpuInit {
        GpuInit {
            backends: self.graphics_api.backends(),
            power_preference: self.power_preference,
            force_fallback_adapter: self.fallback_adapter,
            ..GpuInit::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_when_empty() {
        let params = EngineParams::from_map(&HashMap::new()).unwrap();
        assert_eq!(params, EngineParams::default());
        assert!(params.headless);
    }

    #[test]
    fn parses_known_keys() {
        let params = EngineParams::from_map(&map(&[
            ("graphics_api", "vulkan"),
            ("power", "low"),
            ("fallback_adapter", "true"),
            ("threads", "3"),
            ("something_else", "ignored"),
        ]))
        .unwrap();
        assert_eq!(params.graphics_api, GraphicsApi::Vulkan);
        assert_eq!(params.power_preference, wgpu::PowerPreference::LowPower);
        assert!(params.fallback_adapter);
        assert_eq!(params.threads, 3);
        assert_eq!(params.gpu_init().backends, wgpu::Backends::VULKAN);
    }

    #[test]
    fn metal_flag_selects_metal() {
        let params = EngineParams::from_map(&map(&[("metal", "1")])).unwrap();
        assert_eq!(params.graphics_api, GraphicsApi::Metal);
    }

    #[test]
    fn malformed_values_name_their_key() {
        let err = EngineParams::from_map(&map(&[("threads", "many")])).unwrap_err();
        assert_eq!(err.key, "threads");
        let err = EngineParams::from_map(&map(&[("graphics_api", "glide")])).unwrap_err();
        assert_eq!(err.key, "graphics_api");
    }
}
