use super::Color;

/// Surface description consumed by the backends.
///
/// Only `laser_retro` influences range rendering; the colours are carried for
/// completeness of the scene description.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    name: String,
    pub ambient: Color,
    pub diffuse: Color,
    /// Retro-reflectivity reported as intensity by range sensors.
    pub laser_retro: f32,
    depth_range: Option<(f32, f32)>,
}

impl Material {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ambient: Color::rgb(0.3, 0.3, 0.3),
            diffuse: Color::rgb(0.7, 0.7, 0.7),
            laser_retro: 0.0,
            depth_range: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Turns this into a depth material encoding distances in `[near, far]`.
    pub fn set_depth_material(&mut self, far: f32, near: f32) {
        self.depth_range = Some((near, far));
    }

    /// `(near, far)` when this is a depth material.
    #[inline]
    pub fn depth_range(&self) -> Option<(f32, f32)> {
        self.depth_range
    }
}
