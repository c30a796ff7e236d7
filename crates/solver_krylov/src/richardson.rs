//! Damped Richardson iteration.
//!
//! ```text
//! x ← x + scale · M⁻¹ (b − A x)
//! ```
//!
//! Right preconditioning is not supported; a symmetric split is applied as
//! the full `M⁻¹`. When the preconditioner provides its own Richardson
//! sweep the whole solve is delegated to it.

use std::any::Any;
use std::fmt;

use solver_core::{ConvergedReason, KrylovOptions, PcSide, Preconditioner, SolverError, Vector, Viewer};
use tracing::debug;

use crate::solver::{KrylovContext, KrylovMethod, MethodOutcome};

/// Richardson method state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Richardson {
    scale: f64,
}

impl Default for Richardson {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl Richardson {
    /// Registered name.
    pub const NAME: &'static str = "richardson";

    /// Method with the given damping factor.
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }

    /// Damping factor.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Change the damping factor.
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }
}

impl<V: Vector> KrylovMethod<V> for Richardson {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_pc_side(&self) -> PcSide {
        PcSide::Left
    }

    fn check_pc_side(&self, side: PcSide, _pc: &dyn Preconditioner<V>) -> Result<(), SolverError> {
        if side == PcSide::Right {
            return Err(SolverError::UnsupportedPcSide {
                method: Self::NAME,
                side: side.to_string(),
            });
        }
        Ok(())
    }

    fn work_vector_count(&self, _side: PcSide) -> usize {
        2
    }

    fn solve(&mut self, ctx: KrylovContext<'_, V>, b: &V, x: &mut V) -> Result<MethodOutcome, SolverError> {
        let KrylovContext {
            operator,
            preconditioner,
            mut judge,
            work,
            initial_guess_nonzero,
            use_preconditioned_norm,
            ..
        } = ctx;
        let max_it = judge.max_iterations();
        let [r, z] = work.as_array_mut::<2>()?;

        if preconditioner.has_richardson_fast_path() {
            debug!(pc = preconditioner.name(), max_it, "richardson delegated to preconditioner");
            preconditioner.apply_richardson(b, x, r, max_it)?;
            operator.apply(x, r)?;
            r.aypx(-1.0, b);
            return Ok(MethodOutcome::new(
                max_it,
                ConvergedReason::ConvergedIterations,
                r.norm2(),
            ));
        }

        if initial_guess_nonzero {
            operator.apply(x, r)?;
            r.aypx(-1.0, b);
        } else {
            r.copy_from(b);
        }

        for i in 0..max_it {
            preconditioner.apply(r, z)?;
            let rnorm = if use_preconditioned_norm { z.norm2() } else { r.norm2() };
            let reason = judge.check(i, rnorm);
            if !reason.is_iterating() {
                return Ok(MethodOutcome::new(i, reason, rnorm));
            }
            x.axpy(self.scale, z);
            operator.apply(x, r)?;
            r.aypx(-1.0, b);
        }

        let rnorm = if use_preconditioned_norm {
            preconditioner.apply(r, z)?;
            z.norm2()
        } else {
            r.norm2()
        };
        let mut reason = judge.check(max_it, rnorm);
        if reason.is_iterating() {
            reason = ConvergedReason::DivergedIterations;
        }
        Ok(MethodOutcome::new(max_it, reason, rnorm))
    }

    fn view(&self, viewer: &mut Viewer<'_>) -> fmt::Result {
        viewer.line(format_args!("Richardson: damping factor={}", self.scale))
    }

    fn set_from_options(&mut self, options: &KrylovOptions) -> Result<(), SolverError> {
        self.scale = options.richardson_scale;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use approx::assert_relative_eq;
    use solver_core::{
        CapabilityError, DenseMatrix, DenseVector, JacobiPreconditioner, MatStructure, Tolerances,
    };

    use crate::solver::KrylovSolver;

    fn solver(a: DenseMatrix, scale: f64) -> KrylovSolver<DenseVector> {
        let mut ksp = KrylovSolver::new(Box::new(Richardson::new(scale)));
        ksp.set_operators(Arc::new(a), None, MatStructure::default());
        ksp
    }

    #[test]
    fn test_scaled_identity_converges_in_one_step() {
        let mut ksp = solver(DenseMatrix::scaled_identity(2, 2.0), 0.5);
        ksp.set_tolerances(Tolerances::new(1e-5, 1e-10, 50));
        let b = DenseVector::from(vec![4.0, 6.0]);
        let mut x = DenseVector::zeros(2);
        let result = ksp.solve(&b, &mut x).unwrap();

        assert_eq!(result.iterations, 1);
        assert_eq!(result.reason, ConvergedReason::ConvergedAtol);
        assert_relative_eq!(x[0], 2.0);
        assert_relative_eq!(x[1], 3.0);
        assert_eq!(result.history.len(), 2);
    }

    #[test]
    fn test_iteration_limit_reports_divergence() {
        let a = DenseMatrix::from_rows(&[vec![2.0, 1.0], vec![1.0, 2.0]]).unwrap();
        let mut ksp = solver(a, 0.1);
        ksp.set_tolerances(Tolerances::new(1e-12, 1e-50, 3));
        let b = DenseVector::from(vec![1.0, 0.0]);
        let mut x = DenseVector::zeros(2);
        let result = ksp.solve(&b, &mut x).unwrap();

        assert_eq!(result.iterations, 3);
        assert_eq!(result.reason, ConvergedReason::DivergedIterations);
        assert_eq!(result.history.len(), 4);
    }

    #[test]
    fn test_right_preconditioning_rejected() {
        let mut ksp = solver(DenseMatrix::identity(2), 1.0);
        ksp.set_pc_side(PcSide::Right);
        match ksp.set_up(&DenseVector::zeros(2)) {
            Err(SolverError::UnsupportedPcSide { method, side }) => {
                assert_eq!(method, "richardson");
                assert_eq!(side, "right");
            }
            other => panic!("Expected UnsupportedPcSide, got {:?}", other),
        }
    }

    /// Preconditioner that solves a diagonal system exactly in its fast path.
    struct ExactDiagonal(Vec<f64>);

    impl Preconditioner<DenseVector> for ExactDiagonal {
        fn name(&self) -> &str {
            "exact-diagonal"
        }

        fn apply(&self, x: &DenseVector, y: &mut DenseVector) -> Result<(), CapabilityError> {
            for i in 0..x.len() {
                y[i] = x[i] / self.0[i];
            }
            Ok(())
        }

        fn has_richardson_fast_path(&self) -> bool {
            true
        }

        fn apply_richardson(
            &self,
            b: &DenseVector,
            x: &mut DenseVector,
            _work: &mut DenseVector,
            _max_iterations: usize,
        ) -> Result<(), CapabilityError> {
            self.apply(b, x)
        }
    }

    #[test]
    fn test_fast_path_reports_budget() {
        let mut ksp = solver(DenseMatrix::from_diagonal(&[2.0, 4.0]), 1.0);
        ksp.set_preconditioner(Box::new(ExactDiagonal(vec![2.0, 4.0])));
        ksp.set_tolerances(Tolerances::new(1e-5, 1e-50, 7));
        let b = DenseVector::from(vec![2.0, 8.0]);
        let mut x = DenseVector::zeros(2);
        let result = ksp.solve(&b, &mut x).unwrap();

        assert_eq!(result.iterations, 7);
        assert_eq!(result.reason, ConvergedReason::ConvergedIterations);
        assert!(result.history.is_empty());
        assert_eq!(x.as_slice(), &[1.0, 2.0]);
        assert_eq!(result.residual_norm, 0.0);
    }

    #[test]
    fn test_preconditioned_norm_changes_tested_quantity() {
        let a = DenseMatrix::from_diagonal(&[10.0, 10.0]);
        let mut ksp = solver(a, 1.0);
        ksp.set_preconditioner(Box::new(JacobiPreconditioner::new()));
        ksp.set_use_preconditioned_norm(true);
        ksp.set_tolerances(Tolerances::new(1e-5, 1e-50, 0));
        let b = DenseVector::from(vec![10.0, 0.0]);
        let mut x = DenseVector::zeros(2);
        let result = ksp.solve(&b, &mut x).unwrap();
        assert_relative_eq!(result.history[0], 1.0);
        assert_eq!(result.reason, ConvergedReason::DivergedIterations);
    }

    #[test]
    fn test_view_mentions_scale() {
        let ksp = solver(DenseMatrix::identity(1), 0.25);
        let mut out = String::new();
        ksp.view(&mut out).unwrap();
        assert!(out.contains("type=richardson"));
        assert!(out.contains("damping factor=0.25"));
    }
}
