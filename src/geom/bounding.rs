//! Control-hull bounding boxes over curve sub-intervals.
//!
//! A B-spline lies inside the convex hull of its control polygon, so the
//! axis-aligned box over the control points of a (trimmed) curve bounds the
//! curve over its whole parameter interval. The intersection engine pairs
//! such a box with the parameter interval it was built from.

use super::core::{BBox, Point3};
use super::curve::BSplineCurve;

/// Parameters closer than this are the same knot for range bookkeeping.
pub const PARAM_EPS: f64 = 1e-15;

/// Closed parameter interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
}

impl ParamRange {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn mid(self) -> f64 {
        0.5 * (self.min + self.max)
    }

    /// Both ends match within [`PARAM_EPS`].
    #[must_use]
    pub fn same_as(self, other: Self) -> bool {
        (self.min - other.min).abs() <= PARAM_EPS && (self.max - other.max).abs() <= PARAM_EPS
    }

    /// `self` ends where `next` starts.
    #[must_use]
    pub fn touches(self, next: Self) -> bool {
        (self.max - next.min).abs() <= PARAM_EPS
    }
}

/// Axis-aligned box over a curve's control polygon plus the parameter
/// interval of that curve piece.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRange {
    pub bounds: BBox,
    pub range: ParamRange,
}

impl BoundingRange {
    #[must_use]
    pub const fn new(bounds: BBox, range: ParamRange) -> Self {
        Self { bounds, range }
    }

    /// Box over the control points of `curve`, range over its full domain.
    #[must_use]
    pub fn from_curve<C: BSplineCurve>(curve: &C) -> Self {
        let (start, end) = curve.domain();
        let bounds = BBox::from_points(curve.control_points()).unwrap_or_else(|| {
            let p = curve.point_at(start);
            BBox::new(p, p)
        });
        Self::new(bounds, ParamRange::new(start, end))
    }

    /// Overlap on every axis within `eps`.
    #[must_use]
    pub fn intersects(&self, other: &Self, eps: f64) -> bool {
        self.bounds.overlaps_within(other.bounds, eps)
    }

    #[must_use]
    pub fn is_adjacent(&self, next: &Self) -> bool {
        self.range.touches(next.range)
    }

    /// Joins `self` with the range that follows it.
    ///
    /// Returns `None` unless `next` starts where `self` ends.
    #[must_use]
    pub fn merge(&self, next: &Self) -> Option<Self> {
        if !self.is_adjacent(next) {
            return None;
        }
        Some(Self::new(
            self.bounds.union(next.bounds),
            ParamRange::new(self.range.min, next.range.max),
        ))
    }
}

/// Control polygon length divided by its chord.
///
/// `1.0` means the control points are collinear and ordered. A polygon that
/// closes on itself (zero chord) is straight only when it has no length at
/// all; otherwise it is reported as infinitely curved so it keeps splitting.
#[must_use]
pub fn curvature<C: BSplineCurve>(curve: &C) -> f64 {
    polygon_curvature(curve.control_points())
}

pub(crate) fn polygon_curvature(points: &[Point3]) -> f64 {
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return 1.0;
    };

    let length: f64 = points
        .windows(2)
        .map(|pair| pair[0].distance_to(pair[1]))
        .sum();
    let chord = first.distance_to(last);

    if chord <= f64::EPSILON * length.max(1.0) {
        return if length <= f64::EPSILON { 1.0 } else { f64::INFINITY };
    }
    length / chord
}
