use glam::{Mat4, Quat, Vec3};

use super::interpolate::Interpolate;

/// A translation, rotation and scale that can be blended and converted into a 4x4 matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(position: Vec3, orientation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            orientation,
            scale,
        }
    }

    /// Create a new pose from a translation.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn from_orientation(orientation: Quat) -> Self {
        Self {
            orientation,
            ..Self::IDENTITY
        }
    }

    /// Decompose an affine matrix. Shear is lost.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, orientation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            orientation,
            scale,
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Blend two poses. The factor is clamped to `[0, 1]`; position and scale are blended
    /// linearly and the orientation spherically.
    pub fn interpolate(first: &Pose, second: &Pose, factor: f32) -> Pose {
        let factor = factor.clamp(0.0, 1.0);
        Pose {
            position: Vec3::interpolate(first.position, second.position, factor),
            orientation: Quat::interpolate(first.orientation, second.orientation, factor),
            scale: Vec3::interpolate(first.scale, second.scale, factor),
        }
    }

    /// `translation * rotation * scale`.
    pub fn transformation_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_quat(self.orientation)
            * Mat4::from_scale(self.scale)
    }
}

impl Interpolate for Pose {
    #[inline]
    fn interpolate(left: Self, right: Self, n: f32) -> Self {
        Pose::interpolate(&left, &right, n)
    }
}
