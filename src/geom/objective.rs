//! Scalar objective functions with optional analytic derivatives.
//!
//! Implementors provide [`Objective::value`]; gradient and Hessian fall back
//! to forward differences unless overridden. Override
//! [`Objective::has_gradient`] / [`Objective::has_hessian`] together with the
//! matching method so callers can tell which derivatives are exact.

use super::core::Mat2;

/// Forward-difference step used when an objective supplies no derivatives.
pub const DEFAULT_DIFFERENCE_STEP: f64 = 1e-10;

/// Dense, row-major `n x n` Hessian.
#[derive(Debug, Clone, PartialEq)]
pub struct Hessian {
    dim: usize,
    entries: Vec<f64>,
}

impl Hessian {
    #[must_use]
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            entries: vec![0.0; dim * dim],
        }
    }

    #[must_use]
    pub fn from_mat2(m: Mat2) -> Self {
        Self {
            dim: 2,
            entries: vec![m.xx, m.xy, m.yx, m.yy],
        }
    }

    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.entries[row * self.dim + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.entries[row * self.dim + col] = value;
    }

    /// The 2x2 view, or `None` for other dimensions.
    #[must_use]
    pub fn to_mat2(&self) -> Option<Mat2> {
        (self.dim == 2).then(|| Mat2::new(self.get(0, 0), self.get(0, 1), self.get(1, 0), self.get(1, 1)))
    }
}

pub trait Objective {
    fn parameter_count(&self) -> usize;

    fn value(&self, x: &[f64]) -> f64;

    fn has_gradient(&self) -> bool {
        false
    }

    fn has_hessian(&self) -> bool {
        false
    }

    fn difference_step(&self) -> f64 {
        DEFAULT_DIFFERENCE_STEP
    }

    /// Writes the gradient at `x` into `grad` (length [`parameter_count`](Self::parameter_count)).
    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        forward_difference_gradient(self, x, grad);
    }

    fn hessian(&self, x: &[f64]) -> Hessian {
        forward_difference_hessian(self, x)
    }

    /// Gradient into `grad`, Hessian returned. Override when both share work.
    fn gradient_and_hessian(&self, x: &[f64], grad: &mut [f64]) -> Hessian {
        self.gradient(x, grad);
        self.hessian(x)
    }
}

/// `grad_i = (f(x + h e_i) - f(x)) / h`
pub fn forward_difference_gradient<O: Objective + ?Sized>(objective: &O, x: &[f64], grad: &mut [f64]) {
    let h = objective.difference_step();
    let f0 = objective.value(x);
    let mut shifted = x.to_vec();
    for (i, g) in grad.iter_mut().enumerate().take(x.len()) {
        shifted[i] = x[i] + h;
        *g = (objective.value(&shifted) - f0) / h;
        shifted[i] = x[i];
    }
}

/// Forward differences of [`Objective::gradient`], which may itself be analytic.
#[must_use]
pub fn forward_difference_hessian<O: Objective + ?Sized>(objective: &O, x: &[f64]) -> Hessian {
    let n = x.len();
    let h = objective.difference_step();
    let mut hessian = Hessian::zeros(n);

    let mut g0 = vec![0.0; n];
    let mut gi = vec![0.0; n];
    objective.gradient(x, &mut g0);

    let mut shifted = x.to_vec();
    for i in 0..n {
        shifted[i] = x[i] + h;
        objective.gradient(&shifted, &mut gi);
        shifted[i] = x[i];
        for j in 0..n {
            hessian.set(i, j, (gi[j] - g0[j]) / h);
        }
    }
    hessian
}

/// Objective from a closure, derivatives by forward differences.
pub struct FnObjective<F> {
    parameter_count: usize,
    step: f64,
    f: F,
}

impl<F> FnObjective<F>
where
    F: Fn(&[f64]) -> f64,
{
    pub const fn new(parameter_count: usize, f: F) -> Self {
        Self {
            parameter_count,
            step: DEFAULT_DIFFERENCE_STEP,
            f,
        }
    }

    #[must_use]
    pub const fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }
}

impl<F> Objective for FnObjective<F>
where
    F: Fn(&[f64]) -> f64,
{
    fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    fn value(&self, x: &[f64]) -> f64 {
        (self.f)(x)
    }

    fn difference_step(&self) -> f64 {
        self.step
    }
}

impl<F> std::fmt::Debug for FnObjective<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnObjective")
            .field("parameter_count", &self.parameter_count)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fd_gradient_of_quadratic() {
        let obj = FnObjective::new(2, |x: &[f64]| x[0] * x[0] + 3.0 * x[1]).with_step(1e-7);
        let mut grad = [0.0; 2];
        obj.gradient(&[2.0, 5.0], &mut grad);
        assert!((grad[0] - 4.0).abs() < 1e-5);
        assert!((grad[1] - 3.0).abs() < 1e-5);
        assert!(!obj.has_gradient());
    }

    #[test]
    fn fd_hessian_of_quadratic() {
        let obj = FnObjective::new(2, |x: &[f64]| x[0] * x[0] + x[0] * x[1] + 2.0 * x[1] * x[1])
            .with_step(1e-4);
        let h = obj.hessian(&[0.3, -0.2]).to_mat2().expect("2x2");
        assert!((h.xx - 2.0).abs() < 1e-2);
        assert!((h.xy - 1.0).abs() < 1e-2);
        assert!((h.yx - 1.0).abs() < 1e-2);
        assert!((h.yy - 4.0).abs() < 1e-2);
    }

    #[test]
    fn hessian_dimension_guard() {
        assert!(Hessian::zeros(3).to_mat2().is_none());
        let m = Mat2::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(Hessian::from_mat2(m).to_mat2(), Some(m));
    }

    #[test]
    fn default_step_is_used() {
        let obj = FnObjective::new(1, |x: &[f64]| x[0]);
        assert_eq!(obj.difference_step(), DEFAULT_DIFFERENCE_STEP);
    }
}
