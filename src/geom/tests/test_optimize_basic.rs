use crate::geom::{
    FnObjective, Hessian, Mat2, MAX_ITERATIONS, Objective, OptimizeError, OptimizeOptions,
    StopReason, optimize_newton_2d,
};

/// `100 (y - x^2)^2 + (1 - x)^2`
struct Rosenbrock;

impl Objective for Rosenbrock {
    fn parameter_count(&self) -> usize {
        2
    }

    fn value(&self, x: &[f64]) -> f64 {
        let a = x[1] - x[0] * x[0];
        let b = 1.0 - x[0];
        100.0 * a * a + b * b
    }

    fn has_gradient(&self) -> bool {
        true
    }

    fn has_hessian(&self) -> bool {
        true
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        let a = x[1] - x[0] * x[0];
        grad[0] = -400.0 * x[0] * a - 2.0 * (1.0 - x[0]);
        grad[1] = 200.0 * a;
    }

    fn hessian(&self, x: &[f64]) -> Hessian {
        let xx = 1200.0 * x[0] * x[0] - 400.0 * x[1] + 2.0;
        let xy = -400.0 * x[0];
        Hessian::from_mat2(Mat2::new(xx, xy, xy, 200.0))
    }
}

/// `(x + y)^2`, singular everywhere.
struct Ridge;

impl Objective for Ridge {
    fn parameter_count(&self) -> usize {
        2
    }

    fn value(&self, x: &[f64]) -> f64 {
        (x[0] + x[1]).powi(2)
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        grad[0] = 2.0 * (x[0] + x[1]);
        grad[1] = grad[0];
    }

    fn hessian(&self, _x: &[f64]) -> Hessian {
        Hessian::from_mat2(Mat2::new(2.0, 2.0, 2.0, 2.0))
    }
}

/// `x^2 + y^2` with exact derivatives.
struct Bowl;

impl Objective for Bowl {
    fn parameter_count(&self) -> usize {
        2
    }

    fn value(&self, x: &[f64]) -> f64 {
        x[0] * x[0] + x[1] * x[1]
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        grad[0] = 2.0 * x[0];
        grad[1] = 2.0 * x[1];
    }

    fn hessian(&self, _x: &[f64]) -> Hessian {
        Hessian::from_mat2(Mat2::new(2.0, 0.0, 0.0, 2.0))
    }
}

#[test]
fn newton_solves_rosenbrock() {
    let mut x = [-1.2, 1.0];
    let report = optimize_newton_2d(&Rosenbrock, &mut x, OptimizeOptions::new(1e-8, 1e-12))
        .expect("converges");
    assert_eq!(report.stop, StopReason::Converged);
    assert!(report.iterations < MAX_ITERATIONS);
    assert!((x[0] - 1.0).abs() < 1e-6, "x = {x:?}");
    assert!((x[1] - 1.0).abs() < 1e-6, "x = {x:?}");
    assert!(report.gradient_norm < 1e-8);
}

#[test]
fn newton_with_difference_fallbacks() {
    let objective = FnObjective::new(2, |x: &[f64]| {
        (x[0] - 1.0).powi(2) + 2.0 * (x[1] + 2.0).powi(2) + 0.5 * x[0] * x[1]
    })
    .with_step(1e-5);
    assert!(!objective.has_hessian());

    // Forward differences bias the gradient by about `h`, so the gradient
    // tolerance stays well above it.
    let mut x = [0.0, 0.0];
    optimize_newton_2d(&objective, &mut x, OptimizeOptions::new(1e-4, 1e-12)).expect("converges");

    // grad = 0 at x1 = -8.5 / 3.875, x0 = 1 - x1 / 4
    let y = -8.5 / 3.875;
    let expected = [1.0 - 0.25 * y, y];
    assert!((x[0] - expected[0]).abs() < 1e-4, "x = {x:?}");
    assert!((x[1] - expected[1]).abs() < 1e-4, "x = {x:?}");
}

#[test]
fn wrong_parameter_count_is_a_usage_error() {
    let objective = FnObjective::new(3, |x: &[f64]| x.iter().map(|v| v * v).sum());
    let mut x = [0.5, 0.5];
    let err = optimize_newton_2d(&objective, &mut x, OptimizeOptions::default()).unwrap_err();
    assert_eq!(err, OptimizeError::ParameterCount { found: 3 });
    assert!(err.is_usage_error());
    assert_eq!(x, [0.5, 0.5]);
}

#[test]
fn singular_hessian_fails() {
    let mut x = [1.0, 1.0];
    let err = optimize_newton_2d(&Ridge, &mut x, OptimizeOptions::default()).unwrap_err();
    assert!(matches!(err, OptimizeError::SingularHessian { iteration: 0, .. }));
    assert!(!err.is_usage_error());
}

#[test]
fn non_finite_objective_fails() {
    let objective = FnObjective::new(2, |_x: &[f64]| f64::NAN);
    let mut x = [0.0, 0.0];
    let err = optimize_newton_2d(&objective, &mut x, OptimizeOptions::default()).unwrap_err();
    assert_eq!(err, OptimizeError::NonFiniteValue { iteration: 0 });
}

#[test]
fn iteration_cap_counts_as_success() {
    let mut x = [3.0, -4.0];
    let report = optimize_newton_2d(&Bowl, &mut x, OptimizeOptions::new(0.0, 1e-12))
        .expect("cap is not a failure");
    assert_eq!(report.stop, StopReason::IterationCap);
    assert_eq!(report.iterations, MAX_ITERATIONS);
    assert_eq!(x, [0.0, 0.0]);
}

#[test]
fn runs_are_reproducible() {
    let mut a = [-1.2, 1.0];
    let mut b = [-1.2, 1.0];
    let ra = optimize_newton_2d(&Rosenbrock, &mut a, OptimizeOptions::default()).expect("converges");
    let rb = optimize_newton_2d(&Rosenbrock, &mut b, OptimizeOptions::default()).expect("converges");
    assert_eq!(a, b);
    assert_eq!(ra, rb);
}
