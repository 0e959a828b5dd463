use core::ops::Mul;

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Rigid transform: rotation followed by translation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[inline]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Builds a pose from a position and roll/pitch/yaw (applied yaw, then
    /// pitch, then roll about the rotated axes).
    pub fn from_xyz_rpy(x: f32, y: f32, z: f32, roll: f32, pitch: f32, yaw: f32) -> Self {
        Self {
            position: Vec3::new(x, y, z),
            rotation: Quat::from_euler(EulerRot::ZYX, yaw, pitch, roll),
        }
    }

    #[inline]
    pub fn from_position(position: Vec3) -> Self {
        Self { position, rotation: Quat::IDENTITY }
    }

    /// Returns this pose rotated about its own Z axis.
    ///
    /// Used to fan out sensor cameras: the rotation is in the local frame, so
    /// a tilted sensor keeps its tilt.
    pub fn with_local_yaw(self, yaw: f32) -> Self {
        Self {
            position: self.position,
            rotation: (self.rotation * Quat::from_rotation_z(yaw)).normalize(),
        }
    }

    /// Pose of `child` (expressed in this frame) in the parent frame.
    #[inline]
    pub fn compose(self, child: Pose) -> Pose {
        Pose {
            position: self.position + self.rotation * child.position,
            rotation: (self.rotation * child.rotation).normalize(),
        }
    }

    pub fn inverse(self) -> Pose {
        let inv = self.rotation.inverse();
        Pose {
            position: -(inv * self.position),
            rotation: inv,
        }
    }

    #[inline]
    pub fn transform_point(self, p: Vec3) -> Vec3 {
        self.position + self.rotation * p
    }

    #[inline]
    pub fn rotate(self, v: Vec3) -> Vec3 {
        self.rotation * v
    }

    /// Unit viewing direction (+X of the local frame).
    #[inline]
    pub fn forward(self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn to_mat4(self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    pub fn is_finite(self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Pose {
    type Output = Pose;
    #[inline]
    fn mul(self, rhs: Pose) -> Pose {
        self.compose(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn yaw_turns_forward_to_the_left() {
        let pose = Pose::from_xyz_rpy(0.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2);
        assert!(close(pose.forward(), Vec3::Y));
    }

    #[test]
    fn compose_then_inverse_is_identity() {
        let a = Pose::from_xyz_rpy(1.0, 2.0, 3.0, 0.1, -0.2, 0.7);
        let b = Pose::from_xyz_rpy(-0.5, 0.0, 4.0, 0.0, 0.3, -1.1);
        let ab = a * b;
        let back = a.inverse() * ab;
        assert!(close(back.position, b.position));
        assert!(back.rotation.angle_between(b.rotation) < 1e-4);
    }

    #[test]
    fn compose_applies_parent_rotation_to_child_offset() {
        let parent = Pose::from_xyz_rpy(1.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2);
        let child = Pose::from_position(Vec3::new(2.0, 0.0, 0.0));
        assert!(close((parent * child).position, Vec3::new(1.0, 2.0, 0.0)));
    }

    #[test]
    fn local_yaw_keeps_pitch() {
        let pitched = Pose::from_xyz_rpy(0.0, 0.0, 0.0, 0.0, -0.5, 0.0);
        let turned = pitched.with_local_yaw(0.3);
        // Rotating about the local Z keeps the angle to the local Z axis.
        let up = pitched.rotate(Vec3::Z);
        assert!(turned.forward().dot(up).abs() < 1e-5);
    }

    #[test]
    fn to_mat4_matches_transform_point() {
        let pose = Pose::from_xyz_rpy(0.5, -1.0, 2.0, 0.2, 0.1, -0.4);
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert!(close(pose.to_mat4().transform_point3(p), pose.transform_point(p)));
    }
}
