//! JSON scene description.
//!
//! ```json
//! {
//!   "shapes": [{ "kind": "box", "position": [4, 0, 0], "scale": [0.1, 8, 2], "retro": 1.0 }],
//!   "sensor": { "position": [0, 0, 0.5], "config": { "ray_count": 720 } }
//! }
//! ```

use std::f32::consts::PI;
use std::path::Path;

use anyhow::{Context, Result, bail};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use lumen_engine::math::Pose;
use lumen_engine::scene::{NodeId, Scene, VISIBILITY_ALL};
use lumen_engine::sensors::{GpuRays, GpuRaysConfig};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Box,
    Sphere,
    Cylinder,
    Cone,
    Plane,
}

/// Position in metres and roll/pitch/yaw in radians.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseDesc {
    pub position: [f32; 3],
    pub rpy: [f32; 3],
}

impl PoseDesc {
    fn pose(&self) -> Pose {
        let [x, y, z] = self.position;
        let [roll, pitch, yaw] = self.rpy;
        Pose::from_xyz_rpy(x, y, z, roll, pitch, yaw)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDesc {
    #[serde(default)]
    pub name: String,
    pub kind: ShapeKind,
    #[serde(flatten)]
    pub pose: PoseDesc,
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
    #[serde(default)]
    pub retro: f32,
    #[serde(default = "all_flags")]
    pub visibility_flags: u32,
}

fn unit_scale() -> [f32; 3] {
    [1.0; 3]
}

fn all_flags() -> u32 {
    VISIBILITY_ALL
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorDesc {
    pub name: String,
    #[serde(flatten)]
    pub pose: PoseDesc,
    pub config: GpuRaysConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDesc {
    pub shapes: Vec<ShapeDesc>,
    pub sensor: SensorDesc,
}

impl SceneDesc {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scene file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse scene file {}", path.display()))
    }

    /// A sensor in a 10 m square room with a pillar and a cone.
    pub fn demo() -> Self {
        let wall = |name: &str, x: f32, y: f32, yaw: f32| ShapeDesc {
            name: name.to_owned(),
            kind: ShapeKind::Box,
            pose: PoseDesc {
                position: [x, y, 1.0],
                rpy: [0.0, 0.0, yaw],
            },
            scale: [0.2, 10.0, 2.0],
            retro: 0.5,
            visibility_flags: VISIBILITY_ALL,
        };
        let prop = |name: &str, kind: ShapeKind, x: f32, y: f32, retro: f32| ShapeDesc {
            name: name.to_owned(),
            kind,
            pose: PoseDesc {
                position: [x, y, 0.5],
                rpy: [0.0; 3],
            },
            scale: [0.6, 0.6, 1.0],
            retro,
            visibility_flags: VISIBILITY_ALL,
        };

        Self {
            shapes: vec![
                wall("north_wall", 5.0, 0.0, 0.0),
                wall("south_wall", -5.0, 0.0, 0.0),
                wall("west_wall", 0.0, 5.0, PI / 2.0),
                wall("east_wall", 0.0, -5.0, PI / 2.0),
                prop("pillar", ShapeKind::Cylinder, 2.0, 1.5, 1.0),
                prop("marker", ShapeKind::Cone, -1.5, -2.0, 0.0),
            ],
            sensor: SensorDesc {
                name: "lidar".to_owned(),
                pose: PoseDesc {
                    position: [0.0, 0.0, 0.5],
                    rpy: [0.0; 3],
                },
                config: GpuRaysConfig {
                    angle_min: -PI,
                    angle_max: PI,
                    ray_count: 720,
                    far_clip: 20.0,
                    ..GpuRaysConfig::default()
                },
            },
        }
    }

    /// Adds every shape and the sensor to `scene`.
    pub fn populate(&self, scene: &mut Scene) -> Result<GpuRays> {
        for shape in &self.shapes {
            let node = add_shape(scene, shape)?;
            log::debug!("added {:?} `{}`", shape.kind, scene.node(node).map_or("", |n| n.name()));
        }

        let sensor = &self.sensor;
        let name = if sensor.name.is_empty() { "lidar" } else { &sensor.name };
        let rays = scene.create_gpu_rays(name, sensor.config.clone())?;
        scene.set_local_pose(rays.node(), sensor.pose.pose())?;
        Ok(rays)
    }
}

fn add_shape(scene: &mut Scene, shape: &ShapeDesc) -> Result<NodeId> {
    if shape.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        bail!("shape `{}`: scale must be positive", shape.name);
    }
    let node = match shape.kind {
        ShapeKind::Box => scene.create_box(&shape.name)?,
        ShapeKind::Sphere => scene.create_sphere(&shape.name)?,
        ShapeKind::Cylinder => scene.create_cylinder(&shape.name)?,
        ShapeKind::Cone => scene.create_cone(&shape.name)?,
        ShapeKind::Plane => scene.create_plane(&shape.name)?,
    };
    scene.set_local_pose(node, shape.pose.pose())?;
    scene.set_local_scale(node, Vec3::from_array(shape.scale))?;
    scene.set_visibility_flags(node, shape.visibility_flags)?;

    if shape.retro != 0.0 {
        let material = format!("{}_material", scene.node(node).map_or("shape", |n| n.name()));
        scene.create_material(&material)?.laser_retro = shape.retro;
        scene.set_material(node, &material)?;
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_description() {
        let desc: SceneDesc = serde_json::from_str(
            r#"{
                "shapes": [{ "kind": "sphere", "position": [3, 0, 0] }],
                "sensor": { "position": [0, 0, 1], "config": { "ray_count": 16 } }
            }"#,
        )
        .unwrap();
        assert_eq!(desc.shapes.len(), 1);
        assert_eq!(desc.shapes[0].kind, ShapeKind::Sphere);
        assert_eq!(desc.shapes[0].scale, [1.0; 3]);
        assert_eq!(desc.shapes[0].pose.position, [3.0, 0.0, 0.0]);
        assert_eq!(desc.sensor.pose.position[2], 1.0);
        assert_eq!(desc.sensor.config.ray_count, 16);
    }

    #[test]
    fn unknown_shape_kind_is_rejected() {
        let err = serde_json::from_str::<SceneDesc>(r#"{ "shapes": [{ "kind": "torus" }] }"#);
        assert!(err.is_err());
    }

    #[test]
    fn demo_is_valid() {
        let demo = SceneDesc::demo();
        assert!(demo.sensor.config.validate().is_ok());
        assert_eq!(demo.shapes.len(), 6);
    }
}
