//! Minimal 3-D math for cursor transforms.
//!
//! Matrices are row-major and act on column vectors, so `a * b` applies `b`
//! first. Only what the interpreter needs is here: composition of
//! translate / rotate / scale frames and point transformation.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

// ══════════════════════════════════════════════════════════════════════════════
// Vec3
// ══════════════════════════════════════════════════════════════════════════════

/// A 3-component vector of `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Component-wise product.
    pub fn mul_elem(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Approximate equality with an absolute tolerance.
    pub fn approx_eq(self, other: Vec3, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps
            && (self.y - other.y).abs() <= eps
            && (self.z - other.z).abs() <= eps
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Vec3::new(v[0], v[1], v[2])
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Mat4
// ══════════════════════════════════════════════════════════════════════════════

/// A 4×4 affine matrix, `m[row][col]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat4 {
    pub m: [[f64; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Self = Self {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn translation(v: Vec3) -> Self {
        let mut out = Self::IDENTITY;
        out.m[0][3] = v.x;
        out.m[1][3] = v.y;
        out.m[2][3] = v.z;
        out
    }

    pub fn scale(v: Vec3) -> Self {
        let mut out = Self::IDENTITY;
        out.m[0][0] = v.x;
        out.m[1][1] = v.y;
        out.m[2][2] = v.z;
        out
    }

    pub fn rotation_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut out = Self::IDENTITY;
        out.m[1][1] = c;
        out.m[1][2] = -s;
        out.m[2][1] = s;
        out.m[2][2] = c;
        out
    }

    pub fn rotation_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut out = Self::IDENTITY;
        out.m[0][0] = c;
        out.m[0][2] = s;
        out.m[2][0] = -s;
        out.m[2][2] = c;
        out
    }

    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut out = Self::IDENTITY;
        out.m[0][0] = c;
        out.m[0][1] = -s;
        out.m[1][0] = s;
        out.m[1][1] = c;
        out
    }

    /// XYZ Euler rotation in radians: X is applied first, then Y, then Z.
    pub fn from_euler_xyz(euler: Vec3) -> Self {
        Self::rotation_z(euler.z) * Self::rotation_y(euler.y) * Self::rotation_x(euler.x)
    }

    /// The translation column.
    pub fn translation_part(&self) -> Vec3 {
        Vec3::new(self.m[0][3], self.m[1][3], self.m[2][3])
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let m = &self.m;
        Vec3::new(
            m[0][0] * p.x + m[0][1] * p.y + m[0][2] * p.z + m[0][3],
            m[1][0] * p.x + m[1][1] * p.y + m[1][2] * p.z + m[1][3],
            m[2][0] * p.x + m[2][1] * p.y + m[2][2] * p.z + m[2][3],
        )
    }

    /// Inverse of an affine matrix, or `None` when the linear part is singular.
    pub fn inverse_affine(&self) -> Option<Mat4> {
        let m = &self.m;
        let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
        if det.abs() < f64::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let mut out = Self::IDENTITY;
        out.m[0][0] = (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det;
        out.m[0][1] = (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det;
        out.m[0][2] = (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det;
        out.m[1][0] = (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det;
        out.m[1][1] = (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det;
        out.m[1][2] = (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det;
        out.m[2][0] = (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det;
        out.m[2][1] = (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det;
        out.m[2][2] = (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det;
        let t = self.translation_part();
        for r in 0..3 {
            out.m[r][3] = -(out.m[r][0] * t.x + out.m[r][1] * t.y + out.m[r][2] * t.z);
        }
        Some(out)
    }

    /// Approximate element-wise equality.
    pub fn approx_eq(&self, other: &Mat4, eps: f64) -> bool {
        self.m
            .iter()
            .flatten()
            .zip(other.m.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= eps)
    }
}

impl Mul for Mat4 {
    type Output = Mat4;

    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut out = [[0.0; 4]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.m[r][k] * rhs.m[k][c]).sum();
            }
        }
        Mat4 { m: out }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// LocalTransform
// ══════════════════════════════════════════════════════════════════════════════

/// Accumulated offset relative to a link's world frame.
///
/// Magnitudes accumulate in whatever order operations arrive, but the
/// composed matrix always applies translation, then rotation, then scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalTransform {
    pub location: Vec3,
    /// XYZ Euler angles in radians.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl LocalTransform {
    pub const IDENTITY: Self = Self {
        location: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Set (`absolute`) or add to the translation.
    pub fn translate(&mut self, v: Vec3, absolute: bool) {
        self.location = if absolute { v } else { self.location + v };
    }

    /// Set (`absolute`) or add to the Euler angles.
    pub fn rotate(&mut self, euler: Vec3, absolute: bool) {
        self.rotation = if absolute { euler } else { self.rotation + euler };
    }

    /// Set (`absolute`) or multiply component-wise into the scale.
    pub fn rescale(&mut self, v: Vec3, absolute: bool) {
        self.scale = if absolute { v } else { self.scale.mul_elem(v) };
    }

    /// `T(location) * R(rotation) * S(scale)`.
    pub fn matrix(&self) -> Mat4 {
        Mat4::translation(self.location)
            * Mat4::from_euler_xyz(self.rotation)
            * Mat4::scale(self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    #[test]
    fn identity_is_neutral() {
        let t = Mat4::translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(Mat4::IDENTITY * t, t);
        assert_eq!(t * Mat4::IDENTITY, t);
    }

    #[test]
    fn rotation_z_quarter_turn() {
        let p = Mat4::rotation_z(FRAC_PI_2).transform_point(Vec3::new(1.0, 0.0, 0.0));
        assert!(p.approx_eq(Vec3::new(0.0, 1.0, 0.0), EPS));
    }

    #[test]
    fn local_transform_applies_scale_before_translation() {
        let mut local = LocalTransform::IDENTITY;
        // Issue scale after move; composition order stays T * R * S.
        local.translate(Vec3::new(10.0, 0.0, 0.0), false);
        local.rescale(Vec3::new(2.0, 2.0, 2.0), false);
        let p = local.matrix().transform_point(Vec3::new(1.0, 0.0, 0.0));
        assert!(p.approx_eq(Vec3::new(12.0, 0.0, 0.0), EPS));
    }

    #[test]
    fn relative_and_absolute_updates() {
        let mut local = LocalTransform::IDENTITY;
        local.translate(Vec3::new(1.0, 0.0, 0.0), false);
        local.translate(Vec3::new(1.0, 0.0, 0.0), false);
        assert_eq!(local.location, Vec3::new(2.0, 0.0, 0.0));
        local.translate(Vec3::new(0.0, 5.0, 0.0), true);
        assert_eq!(local.location, Vec3::new(0.0, 5.0, 0.0));

        local.rescale(Vec3::new(2.0, 3.0, 4.0), false);
        local.rescale(Vec3::new(2.0, 1.0, 0.5), false);
        assert_eq!(local.scale, Vec3::new(4.0, 3.0, 2.0));

        local.rotate(Vec3::new(0.1, 0.0, 0.0), false);
        local.rotate(Vec3::new(0.1, 0.0, 0.0), false);
        assert!(local.rotation.approx_eq(Vec3::new(0.2, 0.0, 0.0), EPS));
    }

    #[test]
    fn affine_inverse_round_trips() {
        let mut local = LocalTransform::IDENTITY;
        local.translate(Vec3::new(3.0, -2.0, 5.0), true);
        local.rotate(Vec3::new(0.3, 1.1, -0.4), true);
        local.rescale(Vec3::new(2.0, 0.5, 1.5), true);
        let m = local.matrix();
        let inv = m.inverse_affine().unwrap();
        assert!((m * inv).approx_eq(&Mat4::IDENTITY, 1e-9));
        assert!(Mat4::scale(Vec3::new(1.0, 0.0, 1.0)).inverse_affine().is_none());
    }

    #[test]
    fn euler_applies_x_before_z() {
        // X quarter turn takes +Y to +Z; a following Z turn leaves +Z alone.
        let m = Mat4::from_euler_xyz(Vec3::new(FRAC_PI_2, 0.0, FRAC_PI_2));
        let p = m.transform_point(Vec3::new(0.0, 1.0, 0.0));
        assert!(p.approx_eq(Vec3::new(0.0, 0.0, 1.0), EPS));
    }
}
