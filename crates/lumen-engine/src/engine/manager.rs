use std::collections::HashMap;

use anyhow::{Result, anyhow};

use super::{EngineParams, RaycastPlugin, RenderEngine, RenderEnginePlugin, WgpuPlugin};

/// Registry of engine plugins and the engines loaded from them.
///
/// Engines are loaded on first request and kept until [`unload`] is called.
///
/// [`unload`]: RenderEngineManager::unload
#[derive(Default)]
pub struct RenderEngineManager {
    plugins: HashMap<String, Box<dyn RenderEnginePlugin>>,
    engines: HashMap<String, RenderEngine>,
}

impl RenderEngineManager {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `wgpu` and `raycast` plugins.
    pub fn with_default_plugins() -> Self {
        let mut manager = Self::new();
        manager.register(Box::new(WgpuPlugin));
        manager.register(Box::new(RaycastPlugin));
        manager
    }

    /// Adds a plugin. Returns `false` if its name is taken.
    pub fn register(&mut self, plugin: Box<dyn RenderEnginePlugin>) -> bool {
        let name = plugin.name().to_owned();
        if self.plugins.contains_key(&name) {
            log::warn!("render engine plugin `{name}` is already registered");
            return false;
        }
        self.plugins.insert(name, plugin);
        true
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Registered plugin names, sorted.
    pub fn plugin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the engine called `name`, loading it with `params` on first
    /// use. Parameters are ignored for an engine that is already loaded.
    pub fn engine(
        &mut self,
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<&mut RenderEngine> {
        if !self.engines.contains_key(name) {
            let plugin = self.plugins.get(name).ok_or_else(|| {
                log::error!("no render engine plugin named `{name}`");
                anyhow!("unknown render engine `{name}` (available: {})", self.plugin_names().join(", "))
            })?;
            let params = EngineParams::from_map(params)?;
            let backend = plugin.create(&params)?;
            log::info!("loaded render engine `{name}`");
            self.engines
                .insert(name.to_owned(), RenderEngine::new(name, backend));
        }
        self.engines
            .get_mut(name)
            .ok_or_else(|| anyhow!("render engine `{name}` failed to load"))
    }

    /// An already loaded engine.
    pub fn loaded(&mut self, name: &str) -> Option<&mut RenderEngine> {
        self.engines.get_mut(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    /// Loaded engine names, sorted.
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.engines.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    /// Destroys and forgets a loaded engine. Returns `false` if it was not
    /// loaded.
    pub fn unload(&mut self, name: &str) -> bool {
        match self.engines.remove(name) {
            Some(mut engine) => {
                engine.destroy();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn default_plugins_are_registered() {
        let manager = RenderEngineManager::with_default_plugins();
        assert_eq!(manager.plugin_names(), vec!["raycast", "wgpu"]);
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let mut manager = RenderEngineManager::with_default_plugins();
        assert!(!manager.register(Box::new(RaycastPlugin)));
    }

    #[test]
    fn loads_once_and_unloads() {
        let mut manager = RenderEngineManager::with_default_plugins();
        let engine = manager.engine("raycast", &params(&[("threads", "1")])).unwrap();
        let id = engine.create_scene("world").unwrap();

        // Second request returns the same engine, scenes intact.
        let engine = manager.engine("raycast", &HashMap::new()).unwrap();
        assert!(engine.has_scene(id));
        assert_eq!(manager.loaded_names(), vec!["raycast"]);

        assert!(manager.unload("raycast"));
        assert!(!manager.unload("raycast"));
        assert_eq!(manager.engine_count(), 0);
    }

    #[test]
    fn unknown_engines_and_bad_params_fail() {
        let mut manager = RenderEngineManager::with_default_plugins();
        assert!(manager.engine("ogre", &HashMap::new()).is_err());
        assert!(manager.engine("raycast", &params(&[("threads", "x")])).is_err());
        assert!(!manager.is_loaded("raycast"));
    }
}
