//! Bilinear quadrilateral patches and point inversion.
//!
//! A patch over the corners `x1` (front-left), `x2` (front-right),
//! `x3` (back-left) and `x4` (back-right) is
//!
//! ```text
//! p(eta, xsi) = eta * a + xsi * b + eta * xsi * c + d
//! a = x2 - x1,  b = x3 - x1,  c = x1 - x2 - x3 + x4,  d = x1
//! ```
//!
//! so `eta` runs front-left to front-right and `xsi` runs front-left to
//! back-left.

use super::core::{Mat2, Point3, Vec3};
use super::metrics::{GeomMetrics, TimingBucket};
use super::objective::{Hessian, Objective};
use super::optimize::{OptimizeError, OptimizeOptions, optimize_newton_2d};

/// Samples per direction of the start-point grid, `0.0, 0.2, .., 1.0`.
const SEED_GRID: usize = 6;
const GRAD_TOL_FACTOR: f64 = 1e-7;
const OF_TOL: f64 = 1e-8;

/// Parameter direction on a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchAxis {
    Eta,
    Xsi,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    /// The optimizer failed; `eta`/`xsi` is its last iterate and is not a
    /// reliable answer.
    #[error("point inversion did not converge (last iterate eta={eta}, xsi={xsi})")]
    NotConverged {
        eta: f64,
        xsi: f64,
        #[source]
        source: OptimizeError,
    },

    #[error("point inversion target must be finite")]
    NonFiniteInput,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilinearPatch {
    a: Vec3,
    b: Vec3,
    c: Vec3,
    d: Point3,
}

impl BilinearPatch {
    #[must_use]
    pub fn new(x1: Point3, x2: Point3, x3: Point3, x4: Point3) -> Self {
        Self {
            a: x2 - x1,
            b: x3 - x1,
            c: x1.to_vec3() - x2.to_vec3() - x3.to_vec3() + x4.to_vec3(),
            d: x1,
        }
    }

    /// `[x1, x2, x3, x4]`
    #[must_use]
    pub fn corners(&self) -> [Point3; 4] {
        [
            self.d,
            self.d + self.a,
            self.d + self.b,
            self.d + self.a + self.b + self.c,
        ]
    }

    /// Forward evaluation; defined for any `eta`, `xsi`.
    #[must_use]
    pub fn point_at(&self, eta: f64, xsi: f64) -> Point3 {
        self.d + self.a * eta + self.b * xsi + self.c * (eta * xsi)
    }

    /// Partial derivative along `axis`.
    #[must_use]
    pub fn tangent(&self, axis: PatchAxis, eta: f64, xsi: f64) -> Vec3 {
        match axis {
            PatchAxis::Eta => self.a + self.c * xsi,
            PatchAxis::Xsi => self.b + self.c * eta,
        }
    }

    /// Unit normal `dp/deta x dp/dxsi`, `None` where the patch degenerates.
    #[must_use]
    pub fn normal(&self, eta: f64, xsi: f64) -> Option<Vec3> {
        self.tangent(PatchAxis::Eta, eta, xsi)
            .cross(self.tangent(PatchAxis::Xsi, eta, xsi))
            .normalized()
    }

    /// Finds `(eta, xsi)` minimising the distance from the patch to `target`.
    ///
    /// # Errors
    /// [`PatchError::NotConverged`] carries the optimizer's last iterate.
    pub fn invert(&self, target: Point3) -> Result<(f64, f64), PatchError> {
        if !target.is_finite() {
            return Err(PatchError::NonFiniteInput);
        }

        let objective = PatchDistance::new(self, target);
        let mut x = self.seed(target);
        let scale = (self.a.length() * self.b.length()).max(1.0);
        let options = OptimizeOptions::new(GRAD_TOL_FACTOR * scale, OF_TOL);

        match optimize_newton_2d(&objective, &mut x, options) {
            Ok(report) => {
                log::debug!(
                    "patch inversion: eta={} xsi={} after {} iterations",
                    x[0],
                    x[1],
                    report.iterations
                );
                Ok((x[0], x[1]))
            }
            Err(source) => {
                let [x1, x2, x3, x4] = self.corners();
                log::warn!(
                    "patch inversion failed: {source}; target={target:?} \
                     x1={x1:?} x2={x2:?} x3={x3:?} x4={x4:?}"
                );
                Err(PatchError::NotConverged {
                    eta: x[0],
                    xsi: x[1],
                    source,
                })
            }
        }
    }

    /// [`invert`](Self::invert) timed under [`TimingBucket::PointInversion`].
    ///
    /// # Errors
    /// Same as [`invert`](Self::invert).
    pub fn invert_with_metrics(
        &self,
        target: Point3,
        metrics: &mut GeomMetrics,
    ) -> Result<(f64, f64), PatchError> {
        metrics.time(TimingBucket::PointInversion, || self.invert(target))
    }

    /// Closest point on the patch to `target`.
    ///
    /// # Errors
    /// Fails exactly when [`invert`](Self::invert) fails.
    pub fn project(&self, target: Point3) -> Result<Point3, PatchError> {
        let (eta, xsi) = self.invert(target)?;
        Ok(self.point_at(eta, xsi))
    }

    fn seed(&self, target: Point3) -> [f64; 2] {
        let step = 1.0 / (SEED_GRID - 1) as f64;
        let mut best = [0.0, 0.0];
        let mut best_dist = f64::INFINITY;
        for i in 0..SEED_GRID {
            for j in 0..SEED_GRID {
                let eta = i as f64 * step;
                let xsi = j as f64 * step;
                let dist = self.point_at(eta, xsi).distance_squared_to(target);
                if dist < best_dist {
                    best_dist = dist;
                    best = [eta, xsi];
                }
            }
        }
        best
    }
}

/// `|p(eta, xsi) - target|^2` with exact derivatives.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PatchDistance<'a> {
    patch: &'a BilinearPatch,
    target: Point3,
}

impl<'a> PatchDistance<'a> {
    pub(crate) const fn new(patch: &'a BilinearPatch, target: Point3) -> Self {
        Self { patch, target }
    }

    fn residual(&self, x: &[f64]) -> Vec3 {
        self.patch.point_at(x[0], x[1]) - self.target
    }
}

impl Objective for PatchDistance<'_> {
    fn parameter_count(&self) -> usize {
        2
    }

    fn value(&self, x: &[f64]) -> f64 {
        self.residual(x).length_squared()
    }

    fn has_gradient(&self) -> bool {
        true
    }

    fn has_hessian(&self) -> bool {
        true
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        let r = self.residual(x);
        grad[0] = 2.0 * r.dot(self.patch.tangent(PatchAxis::Eta, x[0], x[1]));
        grad[1] = 2.0 * r.dot(self.patch.tangent(PatchAxis::Xsi, x[0], x[1]));
    }

    fn hessian(&self, x: &[f64]) -> Hessian {
        let r = self.residual(x);
        let t_eta = self.patch.tangent(PatchAxis::Eta, x[0], x[1]);
        let t_xsi = self.patch.tangent(PatchAxis::Xsi, x[0], x[1]);
        let mixed = 2.0 * t_eta.dot(t_xsi) + 2.0 * r.dot(self.patch.c);
        Hessian::from_mat2(Mat2::new(
            2.0 * t_eta.length_squared(),
            mixed,
            mixed,
            2.0 * t_xsi.length_squared(),
        ))
    }
}
