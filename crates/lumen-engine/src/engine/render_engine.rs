use anyhow::{Result, anyhow, bail};

use crate::backend::RenderBackend;
use crate::scene::{Scene, SceneId};

/// A loaded engine: one backend plus the scenes rendered with it.
pub struct RenderEngine {
    name: String,
    backend: Box<dyn RenderBackend>,
    scenes: Vec<Scene>,
    next_scene_id: u32,
}

impl std::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("name", &self.name)
            .field("backend", &self.backend.name())
            .field("scenes", &self.scenes.len())
            .finish()
    }
}

impl RenderEngine {
    pub fn new(name: impl Into<String>, backend: Box<dyn RenderBackend>) -> Self {
        Self {
            name: name.into(),
            backend,
            scenes: Vec::new(),
            next_scene_id: 0,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn RenderBackend {
        self.backend.as_mut()
    }

    /// Creates an empty scene. Names are unique per engine; an empty name
    /// generates one.
    pub fn create_scene(&mut self, name: &str) -> Result<SceneId> {
        if !name.is_empty() && self.scene_by_name(name).is_some() {
            log::error!("engine `{}`: scene `{name}` already exists", self.name);
            bail!("scene `{name}` already exists in engine `{}`", self.name);
        }
        let id = SceneId(self.next_scene_id);
        self.next_scene_id += 1;
        let name = if name.is_empty() {
            format!("scene({})", id.0)
        } else {
            name.to_owned()
        };
        log::debug!("engine `{}`: created scene `{name}`", self.name);
        self.scenes.push(Scene::new(id, name));
        Ok(id)
    }

    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id() == id)
    }

    pub fn scene_mut(&mut self, id: SceneId) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.id() == id)
    }

    pub fn scene_by_name(&self, name: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.name() == name)
    }

    /// Scenes in creation order.
    pub fn scene_by_index(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    pub fn has_scene(&self, id: SceneId) -> bool {
        self.scene(id).is_some()
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    /// Returns `false` when no such scene exists.
    pub fn destroy_scene(&mut self, id: SceneId) -> bool {
        let Some(index) = self.scenes.iter().position(|s| s.id() == id) else {
            return false;
        };
        let scene = self.scenes.remove(index);
        self.backend.release_scene(id);
        log::debug!("engine `{}`: destroyed scene `{}`", self.name, scene.name());
        true
    }

    /// Borrows a scene together with the backend that renders it.
    pub fn split(&mut self, id: SceneId) -> Result<(&Scene, &mut dyn RenderBackend)> {
        let scene = self
            .scenes
            .iter()
            .find(|s| s.id() == id)
            .ok_or_else(|| anyhow!("scene {} does not exist in engine `{}`", id.0, self.name))?;
        Ok((scene, self.backend.as_mut()))
    }

    /// Destroys every scene.
    pub fn destroy(&mut self) {
        let ids: Vec<SceneId> = self.scenes.iter().map(Scene::id).collect();
        for id in ids {
            self.destroy_scene(id);
        }
        log::info!("engine `{}` destroyed", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RaycastBackend;

    fn engine() -> RenderEngine {
        RenderEngine::new("raycast", Box::new(RaycastBackend::new(1).unwrap()))
    }

    #[test]
    fn scene_names_are_unique() {
        let mut e = engine();
        let a = e.create_scene("world").unwrap();
        assert!(e.create_scene("world").is_err());
        assert_eq!(e.scene_by_name("world").map(Scene::id), Some(a));
        assert_eq!(e.scene_count(), 1);
    }

    #[test]
    fn generated_scene_names() {
        let mut e = engine();
        let id = e.create_scene("").unwrap();
        assert_eq!(e.scene(id).map(Scene::name), Some("scene(0)"));
    }

    #[test]
    fn destroy_scene_frees_the_name() {
        let mut e = engine();
        let id = e.create_scene("world").unwrap();
        assert!(e.destroy_scene(id));
        assert!(!e.destroy_scene(id));
        assert!(!e.has_scene(id));
        let again = e.create_scene("world").unwrap();
        assert_ne!(again, id);
    }

    #[test]
    fn split_borrows_scene_and_backend() {
        let mut e = engine();
        let id = e.create_scene("world").unwrap();
        let (scene, backend) = e.split(id).unwrap();
        assert_eq!(scene.name(), "world");
        assert_eq!(backend.name(), "raycast");
        assert!(e.split(SceneId(99)).is_err());
    }

    #[test]
    fn destroy_removes_all_scenes() {
        let mut e = engine();
        e.create_scene("a").unwrap();
        e.create_scene("b").unwrap();
        e.destroy();
        assert_eq!(e.scene_count(), 0);
    }
}
