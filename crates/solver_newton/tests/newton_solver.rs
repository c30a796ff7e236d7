//! End-to-end tests for the Newton solver.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use solver_core::{
    CapabilityError, ConvergedReason, CsrMatrix, DenseMatrix, DenseVector, SolverError, Tolerances,
    Vector,
};
use solver_krylov::KrylovRegistry;
use solver_newton::{
    BasicNoNormsLineSearch, JacobianUpdate, LineSearchKind, LineSearchParams, LineSearchRegistry,
    NewtonOptions, NewtonSolver, NonlinearFunction, NonlinearTolerances,
};

// ========================================
// Test problems
// ========================================

/// `F(x) = x² - 4`, root at 2.
struct Square;

impl NonlinearFunction<DenseVector> for Square {
    fn residual(&mut self, x: &DenseVector, f: &mut DenseVector) -> Result<(), CapabilityError> {
        f[0] = x[0] * x[0] - 4.0;
        Ok(())
    }

    fn jacobian(&mut self, x: &DenseVector) -> Result<JacobianUpdate<DenseVector>, CapabilityError> {
        Ok(JacobianUpdate::new(Arc::new(DenseMatrix::from_diagonal(&[2.0 * x[0]]))))
    }
}

/// `F(x) = atan(x)`; plain Newton from |x| > 1.4 diverges.
struct Atan;

impl NonlinearFunction<DenseVector> for Atan {
    fn residual(&mut self, x: &DenseVector, f: &mut DenseVector) -> Result<(), CapabilityError> {
        f[0] = x[0].atan();
        Ok(())
    }

    fn jacobian(&mut self, x: &DenseVector) -> Result<JacobianUpdate<DenseVector>, CapabilityError> {
        let d = 1.0 / (1.0 + x[0] * x[0]);
        Ok(JacobianUpdate::new(Arc::new(DenseMatrix::from_diagonal(&[d]))))
    }
}

/// `F(x) = x` with a Jacobian of the wrong sign: every direction climbs.
struct WrongSign;

impl NonlinearFunction<DenseVector> for WrongSign {
    fn residual(&mut self, x: &DenseVector, f: &mut DenseVector) -> Result<(), CapabilityError> {
        f.copy_from(x);
        Ok(())
    }

    fn jacobian(&mut self, x: &DenseVector) -> Result<JacobianUpdate<DenseVector>, CapabilityError> {
        Ok(JacobianUpdate::new(Arc::new(DenseMatrix::scaled_identity(x.len(), -1.0))))
    }
}

/// `F(x) = A x + x³ - 1` with `A = tridiag(-1, 2, -1)`; SPD Jacobian.
struct CubicDiffusion {
    n: usize,
}

impl NonlinearFunction<DenseVector> for CubicDiffusion {
    fn residual(&mut self, x: &DenseVector, f: &mut DenseVector) -> Result<(), CapabilityError> {
        for i in 0..self.n {
            let left = if i > 0 { x[i - 1] } else { 0.0 };
            let right = if i + 1 < self.n { x[i + 1] } else { 0.0 };
            f[i] = 2.0 * x[i] - left - right + x[i].powi(3) - 1.0;
        }
        Ok(())
    }

    fn jacobian(&mut self, x: &DenseVector) -> Result<JacobianUpdate<DenseVector>, CapabilityError> {
        let mut triplets = Vec::with_capacity(3 * self.n);
        for i in 0..self.n {
            triplets.push((i, i, 2.0 + 3.0 * x[i] * x[i]));
            if i > 0 {
                triplets.push((i, i - 1, -1.0));
            }
            if i + 1 < self.n {
                triplets.push((i, i + 1, -1.0));
            }
        }
        Ok(JacobianUpdate::new(Arc::new(CsrMatrix::from_triplets(self.n, self.n, triplets)?)))
    }
}

/// Residual evaluation that always fails.
struct Broken;

impl NonlinearFunction<DenseVector> for Broken {
    fn residual(&mut self, _x: &DenseVector, _f: &mut DenseVector) -> Result<(), CapabilityError> {
        Err(CapabilityError::Failed("model blew up".to_string()))
    }

    fn jacobian(&mut self, _x: &DenseVector) -> Result<JacobianUpdate<DenseVector>, CapabilityError> {
        Err(CapabilityError::Failed("unreachable".to_string()))
    }
}

fn newton() -> NewtonSolver<DenseVector> {
    let mut snes = NewtonSolver::new();
    snes.ksp_mut().set_tolerances(Tolerances::new(1e-12, 1e-50, 200));
    snes
}

// ========================================
// Convergence
// ========================================

#[test]
fn test_scalar_quadratic_converges() {
    let mut snes = newton();
    let mut x = DenseVector::from(vec![3.0]);
    let result = snes.solve(&mut Square, &mut x).unwrap();

    assert!(result.converged(), "reason: {}", result.reason);
    assert_relative_eq!(x[0], 2.0, epsilon = 1e-8);
    assert_eq!(result.history.len(), result.iterations + 1);
    assert_eq!(result.history[0], 5.0);
    assert!(result.linear_iterations >= result.iterations);
    assert_eq!(snes.reason(), result.reason);
    assert!(snes.solution_update().is_some());
}

#[test]
fn test_coupled_system_converges() {
    let n = 8;
    let mut snes = newton();
    let mut x = DenseVector::zeros(n);
    let result = snes.solve(&mut CubicDiffusion { n }, &mut x).unwrap();
    assert!(result.converged(), "reason: {}", result.reason);

    let mut f = DenseVector::zeros(n);
    CubicDiffusion { n }.residual(&x, &mut f).unwrap();
    assert!(f.norm2() <= 1e-6 * result.history[0]);
    assert_relative_eq!(f.norm2(), result.function_norm, epsilon = 1e-12);
}

#[test]
fn test_every_line_search_converges_from_nearby_start() {
    for kind in [LineSearchKind::Basic, LineSearchKind::Quadratic, LineSearchKind::Cubic] {
        let mut options = NewtonOptions::default();
        options.line_search = kind;
        let mut snes = NewtonSolver::<DenseVector>::new();
        snes.set_from_options(
            &LineSearchRegistry::with_defaults(),
            &KrylovRegistry::with_defaults(),
            &options,
        )
        .unwrap();
        let mut x = DenseVector::from(vec![0.5]);
        let result = snes.solve(&mut Atan, &mut x).unwrap();
        assert!(result.converged(), "{} ended with {}", kind, result.reason);
        assert!(x[0].abs() < 1e-6, "{} stopped at {}", kind, x[0]);
    }
}

#[test]
fn test_backtracking_globalises_atan() {
    let mut snes = newton();
    let mut x = DenseVector::from(vec![2.0]);
    let result = snes.solve(&mut Atan, &mut x).unwrap();
    assert!(result.converged(), "reason: {}", result.reason);
    assert!(x[0].abs() < 1e-6);
    // The first step backtracked, so more evaluations than iterations + 1.
    assert!(result.function_evaluations > result.iterations + 1);
}

#[test]
fn test_zero_initial_residual() {
    let mut snes = newton();
    let mut x = DenseVector::from(vec![2.0]);
    let result = snes.solve(&mut Square, &mut x).unwrap();
    assert_eq!(result.reason, ConvergedReason::ConvergedFnormAbs);
    assert_eq!(result.iterations, 0);
    assert_eq!(result.function_evaluations, 1);
    assert_eq!(result.linear_iterations, 0);
}

// ========================================
// Failure modes
// ========================================

#[test]
fn test_line_search_failure_keeps_iterate() {
    let mut snes = newton();
    snes.set_line_search_params(LineSearchParams {
        step_tolerance: 1e-6,
        ..Default::default()
    });
    let mut x = DenseVector::from(vec![1.0]);
    let result = snes.solve(&mut WrongSign, &mut x).unwrap();

    assert_eq!(result.reason, ConvergedReason::DivergedLineSearch);
    assert_eq!(result.iterations, 0);
    assert_eq!(x[0], 1.0);
    assert_eq!(result.function_norm, 1.0);
}

#[test]
fn test_function_count_limit() {
    let mut snes = newton();
    snes.set_tolerances(NonlinearTolerances {
        max_function_evaluations: 2,
        ..Default::default()
    });
    let mut x = DenseVector::from(vec![2.0]);
    let result = snes.solve(&mut Atan, &mut x).unwrap();
    assert_eq!(result.reason, ConvergedReason::DivergedFunctionCount);
    assert_eq!(result.iterations, 1);
}

#[test]
fn test_iteration_limit() {
    let mut snes = newton();
    snes.set_tolerances(NonlinearTolerances {
        max_iterations: 1,
        ..Default::default()
    });
    let mut x = DenseVector::from(vec![3.0]);
    let result = snes.solve(&mut Square, &mut x).unwrap();
    assert_eq!(result.reason, ConvergedReason::DivergedIterations);
    assert_eq!(result.iterations, 1);
}

#[test]
fn test_residual_error_propagates() {
    let mut snes = newton();
    let mut x = DenseVector::from(vec![1.0]);
    match snes.solve(&mut Broken, &mut x) {
        Err(SolverError::Capability(CapabilityError::Failed(msg))) => {
            assert_eq!(msg, "model blew up")
        }
        other => panic!("Expected capability failure, got {:?}", other),
    }
}

// ========================================
// Basic without norms
// ========================================

#[test]
fn test_basic_no_norms_requires_disabled_judge() {
    let mut snes = newton();
    snes.set_line_search(Box::new(BasicNoNormsLineSearch));
    let x = DenseVector::from(vec![3.0]);
    match snes.set_up(&x) {
        Err(SolverError::InvalidParameter { name, .. }) => assert_eq!(name, "line_search"),
        other => panic!("Expected InvalidParameter, got {:?}", other),
    }
}

#[test]
fn test_basic_no_norms_runs_full_budget() {
    let mut snes = newton();
    snes.set_line_search(Box::new(BasicNoNormsLineSearch));
    snes.set_convergence_test_enabled(false);
    snes.set_tolerances(NonlinearTolerances {
        max_iterations: 4,
        ..Default::default()
    });
    let mut x = DenseVector::from(vec![3.0]);
    let result = snes.solve(&mut Square, &mut x).unwrap();

    assert_eq!(result.reason, ConvergedReason::ConvergedIterations);
    assert_eq!(result.iterations, 4);
    // Initial evaluation plus one per step except the last.
    assert_eq!(result.function_evaluations, 4);
    assert_eq!(result.history, vec![5.0]);
    assert_relative_eq!(x[0], 2.0, epsilon = 1e-8);
}

// ========================================
// Step check
// ========================================

#[test]
fn test_step_check_runs_once_per_accepted_step() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut snes = newton();
    snes.set_step_check(move |_x: &DenseVector, _y: &mut DenseVector| -> Result<bool, CapabilityError> {
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(false)
    });
    let mut x = DenseVector::from(vec![3.0]);
    let result = snes.solve(&mut Square, &mut x).unwrap();
    assert!(result.converged());
    assert_eq!(calls.load(Ordering::Relaxed), result.iterations);
}

#[test]
fn test_step_check_projection_recomputes_residual() {
    let mut snes = newton();
    snes.set_step_check(|_x: &DenseVector, y: &mut DenseVector| -> Result<bool, CapabilityError> {
        if y[0] < 1.0 {
            y[0] = 1.0;
            return Ok(true);
        }
        Ok(false)
    });
    let mut x = DenseVector::from(vec![0.5]);
    let result = snes.solve(&mut Square, &mut x).unwrap();

    assert!(result.converged(), "reason: {}", result.reason);
    assert_relative_eq!(x[0], 2.0, epsilon = 1e-8);
    assert_eq!(result.history[0], 3.75);
    // The first accepted step landed at 0.875 and was projected to 1.
    assert_relative_eq!(result.history[1], 3.0, epsilon = 1e-12);
}

// ========================================
// Introspection and lifecycle
// ========================================

#[test]
fn test_view_nests_linear_solver() {
    let snes = NewtonSolver::<DenseVector>::new();
    let mut out = String::new();
    snes.view(&mut out).unwrap();
    assert!(out.starts_with("SNES Object: type=ls\n"));
    assert!(out.contains("  line search variant: cubic\n"));
    assert!(out.contains("  alpha=1e-4, maxstep=1e8, steptol=1e-12\n"));
    assert!(out.contains("  KSP Object: type=tfqmr\n"));
    assert!(out.contains("    PC: none\n"));
}

#[test]
fn test_destroy_releases() {
    let mut snes = newton();
    assert_eq!(snes.reference().unwrap(), 2);
    assert!(!snes.destroy());
    assert!(snes.destroy());
    assert!(!snes.is_alive());
    assert!(!snes.ksp().is_alive());

    let mut x = DenseVector::from(vec![3.0]);
    assert!(matches!(snes.solve(&mut Square, &mut x), Err(SolverError::Destroyed)));
    assert!(!snes.destroy());
}
