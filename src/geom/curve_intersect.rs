//! Curve-curve intersection by curvature-adaptive bisection.
//!
//! Both curves are bisected until every piece is nearly straight (control
//! polygon length over chord at most [`IntersectionOptions::straightness`]);
//! piece pairs whose control hulls overlap become "vessels". Vessel ranges of
//! each curve are deduplicated and joined where they touch, and every pair of
//! joined ranges that still overlaps is refined with the 2d Newton optimizer
//! on the squared point distance. A refined pair is reported when the two
//! curve points are within `max(tolerance, 1e-10)`.
//!
//! Each candidate yields at most one point, so a tangential overlap of the
//! two curves is reported as a single intersection rather than a continuum.

use super::bounding::{BoundingRange, curvature};
use super::core::{Mat2, Point3, Vec3};
use super::curve::{BSplineCurve, Curve3};
use super::metrics::{GeomMetrics, TimingBucket};
use super::objective::{Hessian, Objective};
use super::optimize::{OptimizeOptions, optimize_newton_2d};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const DEFAULT_TOLERANCE: f64 = 1e-5;
pub const DEFAULT_MAX_DEPTH: usize = 64;
pub const DEFAULT_STRAIGHTNESS: f64 = 1.0005;
/// Floor on the acceptance distance.
pub const MIN_ACCEPT_DISTANCE: f64 = 1e-10;

const REFINE_GRAD_TOL: f64 = 1e-10;
const REFINE_OF_TOL: f64 = 1e-12;

/// Options for curve-curve intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionOptions {
    /// Maximum distance between the two curve points of a reported hit;
    /// also the slack of the bounding-box overlap test.
    pub tolerance: f64,
    /// Bisection depth at which a curved piece is kept as a vessel anyway.
    pub max_depth: usize,
    /// Curvature ratio at or below which a piece counts as straight.
    pub straightness: f64,
}

impl IntersectionOptions {
    #[must_use]
    pub const fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            max_depth: DEFAULT_MAX_DEPTH,
            straightness: DEFAULT_STRAIGHTNESS,
        }
    }

    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub const fn with_straightness(mut self, straightness: f64) -> Self {
        self.straightness = straightness;
        self
    }

    fn validate(&self) -> Result<(), IntersectionError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(IntersectionError::InvalidTolerance {
                tolerance: self.tolerance,
            });
        }
        if self.max_depth == 0 {
            return Err(IntersectionError::InvalidOptions {
                reason: "max_depth must be at least 1".to_string(),
            });
        }
        if !(self.straightness >= 1.0) || !self.straightness.is_finite() {
            return Err(IntersectionError::InvalidOptions {
                reason: format!("straightness must be finite and >= 1, got {}", self.straightness),
            });
        }
        Ok(())
    }
}

impl Default for IntersectionOptions {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntersectionError {
    #[error("intersection tolerance must be finite and >= 0, got {tolerance}")]
    InvalidTolerance { tolerance: f64 },

    #[error("invalid intersection options: {reason}")]
    InvalidOptions { reason: String },
}

/// One intersection: the parameter on each curve and the midpoint of the
/// two curve points.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CurveIntersection {
    pub parameter1: f64,
    pub parameter2: f64,
    pub point: Point3,
}

/// Bookkeeping of one intersection query.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IntersectionDiagnostics {
    /// Recursive bisection calls, including the top-level one.
    pub bisection_calls: usize,
    pub vessel_count: usize,
    /// Curve-1 ranges left after dedup and joining touching ranges.
    pub merged_first_ranges: usize,
    /// Curve-2 ranges left after dedup and joining touching ranges.
    pub merged_second_ranges: usize,
    pub candidate_count: usize,
    /// Candidates dropped because the optimizer failed.
    pub optimizer_failures: usize,
    /// Candidates dropped because the refined distance exceeded the tolerance.
    pub tolerance_rejections: usize,
    /// Bisections or refinements skipped because a curve could not be trimmed.
    pub trim_failures: usize,
    /// Curved pieces kept as vessels because the depth cap was reached.
    pub depth_limit_hits: usize,
}

/// Intersects two curves with default options apart from `tolerance`.
///
/// # Errors
/// Returns an error if `tolerance` is negative or not finite.
pub fn intersect_curves<C1, C2>(
    curve1: &C1,
    curve2: &C2,
    tolerance: f64,
) -> Result<Vec<CurveIntersection>, IntersectionError>
where
    C1: BSplineCurve,
    C2: BSplineCurve,
{
    intersect_curves_with_options(curve1, curve2, IntersectionOptions::new(tolerance))
        .map(|(hits, _)| hits)
}

/// Intersects two curves, returning the hits together with diagnostics.
///
/// Hits are in candidate order (by curve-1 range, then curve-2 range), not
/// sorted by parameter.
///
/// # Errors
/// Returns an error if the options are invalid.
pub fn intersect_curves_with_options<C1, C2>(
    curve1: &C1,
    curve2: &C2,
    options: IntersectionOptions,
) -> Result<(Vec<CurveIntersection>, IntersectionDiagnostics), IntersectionError>
where
    C1: BSplineCurve,
    C2: BSplineCurve,
{
    let mut metrics = GeomMetrics::default();
    intersect_curves_with_metrics(curve1, curve2, options, &mut metrics)
}

/// [`intersect_curves_with_options`] with bisection and refinement timed
/// into `metrics`.
///
/// # Errors
/// Returns an error if the options are invalid.
pub fn intersect_curves_with_metrics<C1, C2>(
    curve1: &C1,
    curve2: &C2,
    options: IntersectionOptions,
    metrics: &mut GeomMetrics,
) -> Result<(Vec<CurveIntersection>, IntersectionDiagnostics), IntersectionError>
where
    C1: BSplineCurve,
    C2: BSplineCurve,
{
    options.validate()?;
    let mut diagnostics = IntersectionDiagnostics::default();

    let vessels = metrics.time(TimingBucket::CurveBisection, || {
        let mut bisection = Bisection {
            options: &options,
            diagnostics: &mut diagnostics,
            vessels: Vec::new(),
        };
        bisection.run(curve1, curve2, 0);
        bisection.vessels
    });
    diagnostics.vessel_count = vessels.len();

    let candidates = collect_candidates(&vessels, options.tolerance, &mut diagnostics);
    log::debug!(
        "curve intersection: {} vessels, {}x{} merged ranges, {} candidates",
        diagnostics.vessel_count,
        diagnostics.merged_first_ranges,
        diagnostics.merged_second_ranges,
        diagnostics.candidate_count
    );

    let hits = metrics.time(TimingBucket::CandidateRefinement, || {
        candidates
            .iter()
            .filter_map(|candidate| refine(curve1, curve2, candidate, options.tolerance, &mut diagnostics))
            .collect::<Vec<_>>()
    });

    log::debug!(
        "curve intersection: {} hits ({} optimizer failures, {} rejected by tolerance)",
        hits.len(),
        diagnostics.optimizer_failures,
        diagnostics.tolerance_rejections
    );
    Ok((hits, diagnostics))
}

/// Runs independent intersection queries, one per curve pair.
#[cfg(feature = "parallel")]
pub fn intersect_curve_pairs<C1, C2>(
    pairs: &[(C1, C2)],
    options: IntersectionOptions,
) -> Vec<Result<(Vec<CurveIntersection>, IntersectionDiagnostics), IntersectionError>>
where
    C1: BSplineCurve + Sync,
    C2: BSplineCurve + Sync,
{
    pairs
        .par_iter()
        .map(|(c1, c2)| intersect_curves_with_options(c1, c2, options))
        .collect()
}

/// Runs independent intersection queries, one per curve pair.
#[cfg(not(feature = "parallel"))]
pub fn intersect_curve_pairs<C1, C2>(
    pairs: &[(C1, C2)],
    options: IntersectionOptions,
) -> Vec<Result<(Vec<CurveIntersection>, IntersectionDiagnostics), IntersectionError>>
where
    C1: BSplineCurve + Sync,
    C2: BSplineCurve + Sync,
{
    pairs
        .iter()
        .map(|(c1, c2)| intersect_curves_with_options(c1, c2, options))
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Vessel {
    first: BoundingRange,
    second: BoundingRange,
}

struct Bisection<'a> {
    options: &'a IntersectionOptions,
    diagnostics: &'a mut IntersectionDiagnostics,
    vessels: Vec<Vessel>,
}

impl Bisection<'_> {
    fn run<C1: BSplineCurve, C2: BSplineCurve>(&mut self, curve1: &C1, curve2: &C2, depth: usize) {
        self.diagnostics.bisection_calls += 1;

        let first = BoundingRange::from_curve(curve1);
        let second = BoundingRange::from_curve(curve2);
        if !first.intersects(&second, self.options.tolerance) {
            return;
        }

        let split1 = curvature(curve1) > self.options.straightness;
        let split2 = curvature(curve2) > self.options.straightness;
        if !split1 && !split2 {
            self.vessels.push(Vessel { first, second });
            return;
        }
        if depth >= self.options.max_depth {
            self.diagnostics.depth_limit_hits += 1;
            self.vessels.push(Vessel { first, second });
            return;
        }

        let halves1 = if split1 { self.halves(curve1, &first) } else { None };
        let halves2 = if split2 { self.halves(curve2, &second) } else { None };
        if halves1.is_none() && halves2.is_none() {
            self.vessels.push(Vessel { first, second });
            return;
        }

        let pieces1: Vec<&C1> = match &halves1 {
            Some((left, right)) => vec![left, right],
            None => vec![curve1],
        };
        let pieces2: Vec<&C2> = match &halves2 {
            Some((left, right)) => vec![left, right],
            None => vec![curve2],
        };
        for piece1 in &pieces1 {
            for piece2 in &pieces2 {
                self.run(*piece1, *piece2, depth + 1);
            }
        }
    }

    /// Splits at the middle of the range; `None` when the range is too
    /// narrow to split or trimming fails.
    fn halves<C: BSplineCurve>(&mut self, curve: &C, bounds: &BoundingRange) -> Option<(C, C)> {
        let range = bounds.range;
        let mid = range.mid();
        if !(mid > range.min && mid < range.max) {
            return None;
        }
        match (curve.trimmed(range.min, mid), curve.trimmed(mid, range.max)) {
            (Ok(left), Ok(right)) => Some((left, right)),
            (Err(err), _) | (_, Err(err)) => {
                self.diagnostics.trim_failures += 1;
                log::debug!("curve intersection: cannot split [{}, {}]: {err}", range.min, range.max);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    first: BoundingRange,
    second: BoundingRange,
}

fn collect_candidates(
    vessels: &[Vessel],
    tolerance: f64,
    diagnostics: &mut IntersectionDiagnostics,
) -> Vec<Candidate> {
    let firsts = merge_ranges(vessels.iter().map(|v| v.first).collect());
    let seconds = merge_ranges(vessels.iter().map(|v| v.second).collect());
    diagnostics.merged_first_ranges = firsts.len();
    diagnostics.merged_second_ranges = seconds.len();

    let candidates: Vec<Candidate> = firsts
        .iter()
        .flat_map(|first| {
            seconds
                .iter()
                .filter(move |second| first.intersects(second, tolerance))
                .map(move |second| Candidate {
                    first: *first,
                    second: *second,
                })
        })
        .collect();
    diagnostics.candidate_count = candidates.len();
    candidates
}

/// Sorts by range start, drops duplicate ranges, then joins touching ones.
fn merge_ranges(mut ranges: Vec<BoundingRange>) -> Vec<BoundingRange> {
    ranges.sort_by(|a, b| {
        a.range
            .min
            .total_cmp(&b.range.min)
            .then(a.range.max.total_cmp(&b.range.max))
    });
    ranges.dedup_by(|next, kept| next.range.same_as(kept.range));

    let mut merged: Vec<BoundingRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        if let Some(last) = merged.last_mut() {
            if let Some(joined) = last.merge(&range) {
                *last = joined;
                continue;
            }
        }
        merged.push(range);
    }
    merged
}

fn refine<C1: BSplineCurve, C2: BSplineCurve>(
    curve1: &C1,
    curve2: &C2,
    candidate: &Candidate,
    tolerance: f64,
    diagnostics: &mut IntersectionDiagnostics,
) -> Option<CurveIntersection> {
    let r1 = candidate.first.range;
    let r2 = candidate.second.range;

    let trimmed = curve1
        .trimmed(r1.min, r1.max)
        .and_then(|piece1| curve2.trimmed(r2.min, r2.max).map(|piece2| (piece1, piece2)));
    let (piece1, piece2) = match trimmed {
        Ok(pieces) => pieces,
        Err(err) => {
            diagnostics.trim_failures += 1;
            log::debug!("curve intersection: dropping candidate {r1:?} x {r2:?}: {err}");
            return None;
        }
    };

    let objective = CurvePairDistance::new(&piece1, &piece2);
    let mut x = [0.0, 0.0];
    if let Err(err) = optimize_newton_2d(
        &objective,
        &mut x,
        OptimizeOptions::new(REFINE_GRAD_TOL, REFINE_OF_TOL),
    ) {
        diagnostics.optimizer_failures += 1;
        log::debug!("curve intersection: dropping candidate {r1:?} x {r2:?}: {err}");
        return None;
    }

    let (t1, t2) = objective.parameters(&x);
    let p1 = piece1.point_at(t1);
    let p2 = piece2.point_at(t2);
    let distance = p1.distance_to(p2);
    if distance > tolerance.max(MIN_ACCEPT_DISTANCE) {
        diagnostics.tolerance_rejections += 1;
        log::debug!("curve intersection: candidate {r1:?} x {r2:?} too far apart ({distance:e})");
        return None;
    }

    Some(CurveIntersection {
        parameter1: t1,
        parameter2: t2,
        point: p1.lerp(p2, 0.5),
    })
}

/// `|c1(t1(s1)) - c2(t2(s2))|^2` with `t = mid + half * sin(s)`, so every
/// `s` maps into the curve's domain and `s = 0` is its midpoint.
pub(crate) struct CurvePairDistance<'a, C1, C2> {
    curve1: &'a C1,
    curve2: &'a C2,
    mid: [f64; 2],
    half: [f64; 2],
}

impl<'a, C1: Curve3, C2: Curve3> CurvePairDistance<'a, C1, C2> {
    pub(crate) fn new(curve1: &'a C1, curve2: &'a C2) -> Self {
        let (a1, b1) = curve1.domain();
        let (a2, b2) = curve2.domain();
        Self {
            curve1,
            curve2,
            mid: [0.5 * (a1 + b1), 0.5 * (a2 + b2)],
            half: [0.5 * (b1 - a1), 0.5 * (b2 - a2)],
        }
    }

    pub(crate) fn parameters(&self, x: &[f64]) -> (f64, f64) {
        (
            self.mid[0] + self.half[0] * x[0].sin(),
            self.mid[1] + self.half[1] * x[1].sin(),
        )
    }

    fn difference(&self, x: &[f64]) -> Vec3 {
        let (t1, t2) = self.parameters(x);
        self.curve1.point_at(t1) - self.curve2.point_at(t2)
    }
}

impl<C1: Curve3, C2: Curve3> Objective for CurvePairDistance<'_, C1, C2> {
    fn parameter_count(&self) -> usize {
        2
    }

    fn value(&self, x: &[f64]) -> f64 {
        self.difference(x).length_squared()
    }

    fn has_gradient(&self) -> bool {
        true
    }

    fn has_hessian(&self) -> bool {
        true
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        let (t1, t2) = self.parameters(x);
        let diff = self.difference(x);
        let d1 = self.curve1.derivative_at(t1);
        let d2 = self.curve2.derivative_at(t2);
        grad[0] = 2.0 * diff.dot(d1) * self.half[0] * x[0].cos();
        grad[1] = -2.0 * diff.dot(d2) * self.half[1] * x[1].cos();
    }

    fn hessian(&self, x: &[f64]) -> Hessian {
        let mut grad = [0.0; 2];
        self.gradient_and_hessian(x, &mut grad)
    }

    fn gradient_and_hessian(&self, x: &[f64], grad: &mut [f64]) -> Hessian {
        let (t1, t2) = self.parameters(x);
        let diff = self.difference(x);
        let d1 = self.curve1.derivative_at(t1);
        let d2 = self.curve2.derivative_at(t2);
        let dd1 = self.curve1.second_derivative_at(t1);
        let dd2 = self.curve2.second_derivative_at(t2);

        // dt/ds and d2t/ds2 of the sine reparametrisation.
        let (sin1, cos1) = x[0].sin_cos();
        let (sin2, cos2) = x[1].sin_cos();
        let j1 = self.half[0] * cos1;
        let j2 = self.half[1] * cos2;
        let k1 = -self.half[0] * sin1;
        let k2 = -self.half[1] * sin2;

        let diff_d1 = diff.dot(d1);
        let diff_d2 = diff.dot(d2);
        grad[0] = 2.0 * diff_d1 * j1;
        grad[1] = -2.0 * diff_d2 * j2;

        let h11 = (2.0 * d1.length_squared() + 2.0 * diff.dot(dd1)) * j1 * j1 + 2.0 * diff_d1 * k1;
        let h22 = (2.0 * d2.length_squared() - 2.0 * diff.dot(dd2)) * j2 * j2 - 2.0 * diff_d2 * k2;
        let h12 = -2.0 * d1.dot(d2) * j1 * j2;
        Hessian::from_mat2(Mat2::new(h11, h12, h12, h22))
    }
}
