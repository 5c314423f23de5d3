//! Damped Newton minimisation in two parameters.
//!
//! Each iteration takes the Newton step `-H^-1 g` when it is a descent
//! direction and the steepest-descent step `-g` otherwise, then backtracks
//! along it until the Armijo condition holds. The constants below are fixed
//! so that a given objective and start point always converge the same way.

use super::objective::Objective;

pub const MAX_ITERATIONS: usize = 100;
/// Hessians with `|det|` below this are treated as singular.
pub const SINGULAR_DETERMINANT: f64 = 1e-12;
/// A direction is descending when `g . dir` is below this.
pub const DESCENT_SLOPE: f64 = -1e-15;
pub const ARMIJO_COEFFICIENT: f64 = 0.1;
pub const BACKTRACK_FACTOR: f64 = 0.5;
pub const MAX_BACKTRACKS: usize = 20;

/// Stopping tolerances for [`optimize_newton_2d`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizeOptions {
    /// Upper bound on the gradient norm at convergence.
    pub grad_tol: f64,
    /// Upper bound on `|f_prev - f| / max(1, |f|)` at convergence.
    pub of_tol: f64,
}

impl OptimizeOptions {
    #[must_use]
    pub const fn new(grad_tol: f64, of_tol: f64) -> Self {
        Self { grad_tol, of_tol }
    }
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self::new(1e-8, 1e-8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum StopReason {
    /// Both tolerances were met.
    Converged,
    /// [`MAX_ITERATIONS`] ran out first; still a success.
    IterationCap,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct OptimizeReport {
    pub iterations: usize,
    pub value: f64,
    pub gradient_norm: f64,
    pub stop: StopReason,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizeError {
    #[error("newton 2d optimizer needs an objective with 2 parameters, got {found}")]
    ParameterCount { found: usize },

    #[error("singular hessian at iteration {iteration} (det = {determinant:e})")]
    SingularHessian { iteration: usize, determinant: f64 },

    #[error("line search found no sufficient decrease at iteration {iteration}")]
    LineSearchExhausted { iteration: usize },

    #[error("objective is not finite at iteration {iteration}")]
    NonFiniteValue { iteration: usize },
}

impl OptimizeError {
    /// Caller bug rather than a numeric failure; never worth retrying.
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(self, Self::ParameterCount { .. })
    }
}

/// Minimises `objective` starting from `x`, leaving the last iterate in `x`.
///
/// Stops successfully when the relative decrease of the objective since the
/// previous iteration is below `of_tol` and the gradient norm is below
/// `grad_tol`, or after [`MAX_ITERATIONS`] iterations.
///
/// # Errors
/// [`OptimizeError::ParameterCount`] before any evaluation if the objective
/// does not take exactly 2 parameters; otherwise the numeric failure that
/// ended the iteration. `x` then holds the last accepted iterate.
pub fn optimize_newton_2d<O: Objective + ?Sized>(
    objective: &O,
    x: &mut [f64; 2],
    options: OptimizeOptions,
) -> Result<OptimizeReport, OptimizeError> {
    let found = objective.parameter_count();
    if found != 2 {
        return Err(OptimizeError::ParameterCount { found });
    }

    let mut value = objective.value(x);
    if !value.is_finite() {
        return Err(OptimizeError::NonFiniteValue { iteration: 0 });
    }
    let mut previous = f64::INFINITY;
    let mut grad = [0.0; 2];
    let mut gradient_norm = f64::INFINITY;

    for iteration in 0..MAX_ITERATIONS {
        let hessian = objective.gradient_and_hessian(x, &mut grad);
        gradient_norm = grad[0].hypot(grad[1]);
        if !gradient_norm.is_finite() {
            return Err(OptimizeError::NonFiniteValue { iteration });
        }

        let decrease = (previous - value).abs() / value.abs().max(1.0);
        log::trace!(
            "newton2d it={iteration} x=({:.17e}, {:.17e}) f={value:e} |g|={gradient_norm:e}",
            x[0],
            x[1]
        );
        if decrease < options.of_tol && gradient_norm < options.grad_tol {
            log::debug!("newton2d converged after {iteration} iterations, f={value:e}");
            return Ok(OptimizeReport {
                iterations: iteration,
                value,
                gradient_norm,
                stop: StopReason::Converged,
            });
        }

        let h = hessian
            .to_mat2()
            .ok_or(OptimizeError::ParameterCount { found: hessian.dim() })?;
        let Some(inverse) = h.inverse(SINGULAR_DETERMINANT) else {
            let determinant = h.determinant();
            log::debug!("newton2d: singular hessian at iteration {iteration}, det={determinant:e}");
            return Err(OptimizeError::SingularHessian {
                iteration,
                determinant,
            });
        };

        let newton = inverse.mul_vec(grad);
        let mut dir = [-newton[0], -newton[1]];
        let mut slope = dir[0] * grad[0] + dir[1] * grad[1];
        if !(slope < DESCENT_SLOPE) {
            dir = [-grad[0], -grad[1]];
            slope = -(gradient_norm * gradient_norm);
        }

        let Some((step, trial, trial_value)) = backtrack(objective, x, dir, value, slope) else {
            log::debug!("newton2d: line search exhausted at iteration {iteration}");
            return Err(OptimizeError::LineSearchExhausted { iteration });
        };
        log::trace!("newton2d it={iteration} step={step:e}");

        *x = trial;
        previous = value;
        value = trial_value;
    }

    objective.gradient(x, &mut grad);
    if grad[0].is_finite() && grad[1].is_finite() {
        gradient_norm = grad[0].hypot(grad[1]);
    }
    log::debug!("newton2d stopped at iteration cap, f={value:e} |g|={gradient_norm:e}");
    Ok(OptimizeReport {
        iterations: MAX_ITERATIONS,
        value,
        gradient_norm,
        stop: StopReason::IterationCap,
    })
}

/// Armijo backtracking from a unit step. Returns `(step, x + step*dir, f)`.
fn backtrack<O: Objective + ?Sized>(
    objective: &O,
    x: &[f64; 2],
    dir: [f64; 2],
    value: f64,
    slope: f64,
) -> Option<(f64, [f64; 2], f64)> {
    let mut step = 1.0;
    for _ in 0..=MAX_BACKTRACKS {
        let trial = [x[0] + step * dir[0], x[1] + step * dir[1]];
        let trial_value = objective.value(&trial);
        if trial_value <= value + ARMIJO_COEFFICIENT * step * slope {
            return Some((step, trial, trial_value));
        }
        step *= BACKTRACK_FACTOR;
    }
    None
}
