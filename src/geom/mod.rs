mod bounding;
mod core;
mod curve;
mod curve_intersect;
mod metrics;
mod objective;
mod optimize;
mod quad_patch;

pub use bounding::{BoundingRange, PARAM_EPS, ParamRange, curvature};
pub use core::{BBox, Mat2, Point3, Tolerance, Vec3};
pub use curve::{BSplineCurve, Curve3, CurveError, NurbsCurve3};
pub use curve_intersect::{
    CurveIntersection, DEFAULT_MAX_DEPTH, DEFAULT_STRAIGHTNESS, DEFAULT_TOLERANCE,
    IntersectionDiagnostics, IntersectionError, IntersectionOptions, MIN_ACCEPT_DISTANCE,
    intersect_curve_pairs, intersect_curves, intersect_curves_with_metrics,
    intersect_curves_with_options,
};
pub use metrics::{GeomMetrics, GeomTimingReport, TimingBucket};
pub use objective::{
    DEFAULT_DIFFERENCE_STEP, FnObjective, Hessian, Objective, forward_difference_gradient,
    forward_difference_hessian,
};
pub use optimize::{
    ARMIJO_COEFFICIENT, BACKTRACK_FACTOR, DESCENT_SLOPE, MAX_BACKTRACKS, MAX_ITERATIONS,
    OptimizeError, OptimizeOptions, OptimizeReport, SINGULAR_DETERMINANT, StopReason,
    optimize_newton_2d,
};
pub use quad_patch::{BilinearPatch, PatchAxis, PatchError};

#[cfg(test)]
mod tests;
