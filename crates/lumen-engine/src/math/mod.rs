//! Pose and projection maths shared by the scene, the backends and sensors.
//!
//! Frame convention (world and every camera):
//! - +X forward
//! - +Y left
//! - +Z up
//!
//! Angles are radians; positive yaw turns counter-clockwise (towards +Y).

mod pose;
mod projection;

pub use pose::Pose;
pub use projection::{build_scaled_ortho_matrix, pixel_ray, ray_projection};
