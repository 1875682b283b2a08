use glam::{Quat, Vec3};

/// Values that can be blended between two keys. `n` is expected in `[0, 1]`.
pub trait Interpolate: Copy {
    fn interpolate(left: Self, right: Self, n: f32) -> Self;
}

impl Interpolate for f32 {
    #[inline]
    fn interpolate(left: Self, right: Self, n: f32) -> Self {
        left * (1.0 - n) + right * n
    }
}

impl Interpolate for Vec3 {
    #[inline]
    fn interpolate(left: Self, right: Self, n: f32) -> Self {
        left * (1.0 - n) + right * n
    }
}

impl Interpolate for Quat {
    #[inline]
    fn interpolate(left: Self, right: Self, n: f32) -> Self {
        left.slerp(right, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_points_are_exact() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-4.0, 0.5, 9.0);
        assert_eq!(Vec3::interpolate(a, b, 0.0), a);
        assert_eq!(Vec3::interpolate(a, b, 1.0), b);
        assert_eq!(f32::interpolate(2.0, 6.0, 0.25), 3.0);
    }

    #[test]
    fn quaternion_midpoint() {
        let a = Quat::IDENTITY;
        let b = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let mid = Quat::interpolate(a, b, 0.5);
        let expected = Quat::from_rotation_z(std::f32::consts::FRAC_PI_4);
        assert!(mid.dot(expected).abs() > 1.0 - 1e-5);
    }
}
