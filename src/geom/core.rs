use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::Serialize;

// ─────────────────────────────────────────────────────────────────────────────
// Vec3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub const fn length_squared(self) -> f64 {
        self.dot(self)
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[must_use]
    pub const fn cross(self, rhs: Self) -> Self {
        Self {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len.is_finite() && len > 0.0 {
            Some(Self::new(self.x / len, self.y / len, self.z / len))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn mul_scalar(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Self::Output {
        Vec3::new(self * rhs.x, self * rhs.y, self * rhs.z)
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Point3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// The origin point (0, 0, 0).
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Convert point to a position vector from the origin.
    #[must_use]
    pub const fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    #[must_use]
    pub const fn add_vec(self, v: Vec3) -> Self {
        Self::new(self.x + v.x, self.y + v.y, self.z + v.z)
    }

    #[must_use]
    pub const fn sub_point(self, rhs: Self) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    /// Linear interpolation between two points.
    /// Returns `self * (1 - t) + rhs * t`.
    #[must_use]
    pub fn lerp(self, rhs: Self, t: f64) -> Self {
        Self::new(
            self.x + (rhs.x - self.x) * t,
            self.y + (rhs.y - self.y) * t,
            self.z + (rhs.z - self.z) * t,
        )
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        self.sub_point(other).length()
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared_to(self, other: Self) -> f64 {
        self.sub_point(other).length_squared()
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y), self.z.min(rhs.z))
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y), self.z.max(rhs.z))
    }

    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Default for Point3 {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }
}

impl Add<Vec3> for Point3 {
    type Output = Self;
    fn add(self, rhs: Vec3) -> Self::Output {
        self.add_vec(rhs)
    }
}

impl Sub for Point3 {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Self::Output {
        self.sub_point(rhs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mat2
// ─────────────────────────────────────────────────────────────────────────────

/// Dense 2x2 matrix, row-major by name: `[[xx, xy], [yx, yy]]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mat2 {
    pub xx: f64,
    pub xy: f64,
    pub yx: f64,
    pub yy: f64,
}

impl Mat2 {
    #[must_use]
    pub const fn new(xx: f64, xy: f64, yx: f64, yy: f64) -> Self {
        Self { xx, xy, yx, yy }
    }

    #[must_use]
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0)
    }

    #[must_use]
    pub const fn determinant(self) -> f64 {
        self.xx * self.yy - self.xy * self.yx
    }

    /// Analytic inverse. Returns `None` when `|det| < min_abs_det`.
    #[must_use]
    pub fn inverse(self, min_abs_det: f64) -> Option<Self> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < min_abs_det {
            return None;
        }
        let inv = 1.0 / det;
        Some(Self::new(
            self.yy * inv,
            -self.xy * inv,
            -self.yx * inv,
            self.xx * inv,
        ))
    }

    #[must_use]
    pub const fn mul_vec(self, v: [f64; 2]) -> [f64; 2] {
        [
            self.xx * v[0] + self.xy * v[1],
            self.yx * v[0] + self.yy * v[1],
        ]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BBox
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min: Point3,
    pub max: Point3,
}

impl BBox {
    #[must_use]
    pub const fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_points(points: &[Point3]) -> Option<Self> {
        let mut iter = points.iter().copied();
        let first = iter.next()?;
        let mut min = first;
        let mut max = first;
        for p in iter {
            min = min.min(p);
            max = max.max(p);
        }
        Some(Self::new(min, max))
    }

    /// Check if a point is inside the bounding box (inclusive).
    #[must_use]
    pub fn contains_point(self, p: Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Overlap test with slack `eps` on every axis.
    ///
    /// The overlap region is `[max(min), min(max)]`; the boxes count as
    /// overlapping when that region is non-empty after widening by `eps`.
    /// Closed on every axis, so touching or flat boxes overlap at `eps = 0`.
    #[must_use]
    pub fn overlaps_within(self, other: Self, eps: f64) -> bool {
        let lo = self.min.max(other.min);
        let hi = self.max.min(other.max);
        lo.x <= hi.x + eps && lo.y <= hi.y + eps && lo.z <= hi.z + eps
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tolerance
// ─────────────────────────────────────────────────────────────────────────────

/// Relative step sizes for the numeric derivative fallbacks of [`Curve3`].
///
/// [`Curve3`]: super::Curve3
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub eps: f64,
}

impl Tolerance {
    /// First derivative step, as a fraction of the domain span.
    pub const DERIVATIVE: Self = Self { eps: 1e-6 };

    /// Second derivative step, as a fraction of the domain span.
    pub const SECOND_DERIVATIVE: Self = Self { eps: 1e-4 };

    #[must_use]
    pub const fn new(eps: f64) -> Self {
        Self { eps }
    }

    #[must_use]
    pub fn relative_to(self, span: f64) -> f64 {
        self.eps * span.abs()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operators() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(2.0 * a, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(a / 2.0, Vec3::new(0.5, 1.0, 1.5));
        assert_eq!(-a, Vec3::new(-1.0, -2.0, -3.0));
    }

    #[test]
    fn test_point3_operators() {
        let p = Point3::new(1.0, 2.0, 3.0);
        let v = Vec3::new(1.0, 1.0, 1.0);

        assert_eq!(p + v, Point3::new(2.0, 3.0, 4.0));

        let q = Point3::new(4.0, 5.0, 6.0);
        assert_eq!(q - p, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(p.lerp(q, 0.5), Point3::new(2.5, 3.5, 4.5));
    }

    #[test]
    fn test_mat2_inverse() {
        let m = Mat2::new(4.0, 1.0, 2.0, 3.0);
        let inv = m.inverse(1e-12).expect("invertible");
        let v = inv.mul_vec(m.mul_vec([1.5, -2.0]));
        assert!((v[0] - 1.5).abs() < 1e-12);
        assert!((v[1] + 2.0).abs() < 1e-12);

        let singular = Mat2::new(1.0, 2.0, 2.0, 4.0);
        assert!(singular.inverse(1e-12).is_none());
        assert_eq!(Mat2::identity().determinant(), 1.0);
    }

    #[test]
    fn test_bbox_overlaps_within() {
        let a = BBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0));
        let b = BBox::new(Point3::new(1.05, 0.0, 0.0), Point3::new(2.0, 1.0, 0.0));

        assert!(!a.overlaps_within(b, 0.01));
        assert!(a.overlaps_within(b, 0.1));
        assert!(a.union(b).contains_point(Point3::new(1.5, 0.5, 0.0)));
    }

    #[test]
    fn test_bbox_touching_and_flat_overlap_at_zero_slack() {
        let left = BBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0));
        let right = BBox::new(Point3::new(1.0, 0.5, 0.0), Point3::new(2.0, 2.0, 0.0));
        assert!(left.overlaps_within(right, 0.0));
        assert!(right.overlaps_within(left, 0.0));

        let apart = BBox::new(Point3::new(1.0 + 1e-9, 0.0, 0.0), Point3::new(2.0, 1.0, 0.0));
        assert!(!left.overlaps_within(apart, 0.0));
    }

    #[test]
    fn test_bbox_from_points() {
        let bbox = BBox::from_points(&[
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(-2.0, 3.0, 0.5),
        ])
        .expect("non-empty");
        assert_eq!(bbox.min, Point3::new(-2.0, -1.0, 0.0));
        assert_eq!(bbox.max, Point3::new(1.0, 3.0, 0.5));
        assert!(BBox::from_points(&[]).is_none());
    }

    #[test]
    fn test_tolerance_steps() {
        assert!(Tolerance::DERIVATIVE.eps < Tolerance::SECOND_DERIVATIVE.eps);
        assert!((Tolerance::new(1e-3).relative_to(-4.0) - 4e-3).abs() < 1e-15);
    }
}
