//! Transpose-free quasi-minimal residual (TFQMR).
//!
//! Each outer iteration performs two quasi-minimisation half-steps. The
//! judge sees the estimate `√(m+1)·τ`, never a recomputed true residual, so
//! no extra operator application is spent on convergence testing.
//!
//! Left preconditioning iterates on `M⁻¹A x = M⁻¹b`. Right preconditioning
//! iterates on `A M⁻¹ y = r0` and unwinds with `x ← x0 + M⁻¹ y`.
//!
//! A vanishing `s = r̃ᵗv` or `ρ = r̃ᵗr` (relative to `ρ0`) stops the solve
//! with [`ConvergedReason::DivergedBreakdown`].

use std::any::Any;
use std::fmt;

use solver_core::{
    CapabilityError, ConvergedReason, LinearOperator, PcSide, Preconditioner, SolverError, Vector,
    Viewer,
};
use tracing::warn;

use crate::solver::{ConvergenceJudge, KrylovContext, KrylovMethod, MethodOutcome};

const BASE_WORK_VECTORS: usize = 10;

/// TFQMR method state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tfqmr {
    tau_history: Vec<f64>,
}

impl Tfqmr {
    /// Registered name.
    pub const NAME: &'static str = "tfqmr";

    /// τ after every half-step of the last solve, starting with `‖r0‖`.
    pub fn tau_history(&self) -> &[f64] {
        &self.tau_history
    }
}

/// The preconditioned operator `K` for the chosen side.
struct Preconditioned<'a, V: Vector> {
    operator: &'a dyn LinearOperator<V>,
    preconditioner: &'a dyn Preconditioner<V>,
    side: PcSide,
}

impl<V: Vector> Preconditioned<'_, V> {
    fn apply(&self, input: &V, out: &mut V, tmp: &mut V) -> Result<(), CapabilityError> {
        match self.side {
            PcSide::Right => {
                self.preconditioner.apply(input, tmp)?;
                self.operator.apply(tmp, out)
            }
            PcSide::Left | PcSide::Symmetric => {
                self.operator.apply(input, tmp)?;
                self.preconditioner.apply(tmp, out)
            }
        }
    }
}

impl Tfqmr {
    /// Runs the recurrence, accumulating the update into `sol`.
    ///
    /// `vecs[0]` must hold the initial (preconditioned, for left) residual.
    fn iterate<V: Vector>(
        &mut self,
        k: &Preconditioned<'_, V>,
        judge: &mut ConvergenceJudge<'_>,
        vecs: &mut [V; BASE_WORK_VECTORS],
        sol: &mut V,
    ) -> Result<MethodOutcome, SolverError> {
        let [r, rp, v, t, q, p, _binvf, u, d, t1] = vecs;
        let max_it = judge.max_iterations();

        let dp0 = r.norm2();
        self.tau_history.push(dp0);
        let mut reason = judge.check(0, dp0);
        if !reason.is_iterating() {
            return Ok(MethodOutcome::new(0, reason, dp0));
        }

        rp.copy_from(r);
        let mut rhoold = rp.dot(r);
        let breakdown_tol = f64::EPSILON * f64::EPSILON * rhoold.abs();
        let broke_down = |value: f64| !value.is_finite() || value.abs() <= breakdown_tol;

        u.copy_from(r);
        p.copy_from(r);
        k.apply(p, v, t1)?;
        d.set(0.0);

        let mut etaold = 0.0;
        let mut psiold = 0.0;
        let mut tau = dp0;
        let mut dpold = dp0;
        let mut rnorm = dp0;
        let mut diagnostic = None;
        let mut i = 0;

        while i < max_it {
            let s = v.dot(rp);
            if broke_down(s) {
                diagnostic = Some(format!("s = r̃ᵗv = {:e} vanished at iteration {}", s, i));
                reason = ConvergedReason::DivergedBreakdown;
                break;
            }
            let a = rhoold / s;
            q.waxpy(-a, v, u);
            t.waxpy(1.0, u, q);
            // v is free until the direction update below, so it holds K(u + q).
            k.apply(t, v, t1)?;
            r.axpy(-a, v);
            let dp = r.norm2();

            for m in 0..2 {
                let w = if m == 0 { (dp * dpold).sqrt() } else { dp };
                let psi = w / tau;
                let cm = 1.0 / (1.0 + psi * psi).sqrt();
                tau *= psi * cm;
                let eta = cm * cm * a;
                let cf = psiold * psiold * etaold / a;
                if m == 0 {
                    d.aypx(cf, u);
                } else {
                    d.aypx(cf, q);
                }
                sol.axpy(eta, d);
                self.tau_history.push(tau);

                rnorm = ((m + 1) as f64).sqrt() * tau;
                reason = judge.check(i + 1, rnorm);
                if !reason.is_iterating() {
                    break;
                }
                etaold = eta;
                psiold = psi;
            }
            i += 1;
            if !reason.is_iterating() {
                break;
            }

            let rho = rp.dot(r);
            if broke_down(rho) {
                diagnostic = Some(format!("rho = r̃ᵗr = {:e} vanished at iteration {}", rho, i));
                reason = ConvergedReason::DivergedBreakdown;
                break;
            }
            let beta = rho / rhoold;
            u.waxpy(beta, q, r);
            q.axpy(beta, p);
            p.waxpy(beta, q, u);
            k.apply(p, v, t1)?;
            rhoold = rho;
            dpold = dp;
        }

        if reason.is_iterating() {
            reason = ConvergedReason::DivergedIterations;
        }
        if let Some(detail) = &diagnostic {
            warn!(iteration = i, detail = %detail, "tfqmr breakdown");
        }
        Ok(MethodOutcome {
            iterations: i,
            reason,
            residual_norm: rnorm,
            diagnostic,
        })
    }
}

fn unsupported_side(side: PcSide) -> SolverError {
    SolverError::UnsupportedPcSide {
        method: Tfqmr::NAME,
        side: side.to_string(),
    }
}

impl<V: Vector> KrylovMethod<V> for Tfqmr {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_pc_side(&self) -> PcSide {
        PcSide::Left
    }

    fn check_pc_side(&self, side: PcSide, _pc: &dyn Preconditioner<V>) -> Result<(), SolverError> {
        match side {
            PcSide::Left | PcSide::Right => Ok(()),
            PcSide::Symmetric => Err(unsupported_side(side)),
        }
    }

    fn work_vector_count(&self, side: PcSide) -> usize {
        match side {
            PcSide::Right => BASE_WORK_VECTORS + 1,
            _ => BASE_WORK_VECTORS,
        }
    }

    fn solve(&mut self, ctx: KrylovContext<'_, V>, b: &V, x: &mut V) -> Result<MethodOutcome, SolverError> {
        let KrylovContext {
            operator,
            preconditioner,
            pc_side,
            mut judge,
            work,
            initial_guess_nonzero,
            ..
        } = ctx;
        self.tau_history.clear();
        let k = Preconditioned {
            operator,
            preconditioner,
            side: pc_side,
        };

        match pc_side {
            PcSide::Left => {
                let vecs = work.as_array_mut::<BASE_WORK_VECTORS>()?;
                let [r, _, _, _, _, _, binvf, ..] = &mut *vecs;
                if initial_guess_nonzero {
                    operator.apply(x, binvf)?;
                    binvf.aypx(-1.0, b);
                } else {
                    binvf.copy_from(b);
                }
                preconditioner.apply(binvf, r)?;
                self.iterate(&k, &mut judge, vecs, x)
            }
            PcSide::Right => {
                let all = work.as_array_mut::<{ BASE_WORK_VECTORS + 1 }>()?;
                let (head, tail) = all.split_at_mut(BASE_WORK_VECTORS);
                let vecs = <&mut [V; BASE_WORK_VECTORS]>::try_from(head).map_err(|_| {
                    SolverError::NotConfigured("tfqmr work vectors are not allocated".to_string())
                })?;
                let y = &mut tail[0];
                {
                    let r = &mut vecs[0];
                    if initial_guess_nonzero {
                        operator.apply(x, r)?;
                        r.aypx(-1.0, b);
                    } else {
                        r.copy_from(b);
                    }
                }
                y.set(0.0);
                let outcome = self.iterate(&k, &mut judge, vecs, y)?;

                let t = &mut vecs[3];
                preconditioner.apply(y, t)?;
                x.axpy(1.0, t);
                Ok(outcome)
            }
            PcSide::Symmetric => Err(unsupported_side(pc_side)),
        }
    }

    fn view(&self, viewer: &mut Viewer<'_>) -> fmt::Result {
        viewer.line(format_args!(
            "TFQMR: convergence tested on estimated residual norm sqrt(m+1)*tau"
        ))
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

    use solver_core::{
        CsrMatrix, DenseMatrix, DenseVector, JacobiPreconditioner, MatStructure, Tolerances,
    };

    use crate::solver::KrylovSolver;

    fn residual_norm(a: &dyn LinearOperator<DenseVector>, b: &DenseVector, x: &DenseVector) -> f64 {
        let mut r = DenseVector::zeros(b.len());
        a.apply(x, &mut r).unwrap();
        r.aypx(-1.0, b);
        r.norm2()
    }

    fn solver(a: Arc<dyn LinearOperator<DenseVector>>) -> KrylovSolver<DenseVector> {
        let mut ksp = KrylovSolver::new(Box::new(Tfqmr::default()));
        ksp.set_operators(a, None, MatStructure::default());
        ksp.set_tolerances(Tolerances::new(1e-10, 1e-50, 500));
        ksp
    }

    #[test]
    fn test_poisson_left_identity() {
        let a = Arc::new(CsrMatrix::tridiagonal(20, -1.0, 2.0, -1.0));
        let mut ksp = solver(a.clone());
        let b = DenseVector::filled(20, 1.0);
        let mut x = DenseVector::zeros(20);
        let result = ksp.solve(&b, &mut x).unwrap();

        assert!(result.converged(), "reason: {}", result.reason);
        assert!(residual_norm(a.as_ref(), &b, &x) < 1e-6 * b.norm2());

        let taus = ksp.tfqmr_tau_history().unwrap();
        assert_eq!(taus.len(), result.history.len());
        for w in taus.windows(2) {
            assert!(w[1] <= w[0] * (1.0 + 1e-12), "tau increased: {} -> {}", w[0], w[1]);
        }
    }

    #[test]
    fn test_right_jacobi_with_initial_guess() {
        let a = DenseMatrix::from_rows(&[
            vec![4.0, 1.0, 0.0],
            vec![2.0, 5.0, 1.0],
            vec![0.0, 1.0, 3.0],
        ])
        .unwrap();
        let a = Arc::new(a);
        let mut ksp = solver(a.clone());
        ksp.set_pc_side(PcSide::Right);
        ksp.set_preconditioner(Box::new(JacobiPreconditioner::new()));
        ksp.set_initial_guess_nonzero(true);

        let b = DenseVector::from(vec![1.0, 2.0, 3.0]);
        let mut x = DenseVector::from(vec![0.5, -0.5, 0.5]);
        let result = ksp.solve(&b, &mut x).unwrap();

        assert!(result.converged(), "reason: {}", result.reason);
        assert!(residual_norm(a.as_ref(), &b, &x) < 1e-6);
    }

    #[test]
    fn test_symmetric_side_rejected() {
        let mut ksp = solver(Arc::new(DenseMatrix::identity(2)));
        ksp.set_pc_side(PcSide::Symmetric);
        assert!(matches!(
            ksp.set_up(&DenseVector::zeros(2)),
            Err(SolverError::UnsupportedPcSide { method: "tfqmr", .. })
        ));
    }

    #[test]
    fn test_skew_operator_breaks_down() {
        let a = DenseMatrix::from_rows(&[vec![0.0, 1.0], vec![-1.0, 0.0]]).unwrap();
        let mut ksp = solver(Arc::new(a));
        let b = DenseVector::from(vec![1.0, 0.0]);
        let mut x = DenseVector::zeros(2);
        let result = ksp.solve(&b, &mut x).unwrap();

        assert_eq!(result.reason, ConvergedReason::DivergedBreakdown);
        assert_eq!(result.iterations, 0);
        let diagnostic = result.diagnostic.unwrap();
        assert!(diagnostic.starts_with("s ="), "diagnostic: {}", diagnostic);
        assert_eq!(x.as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_iteration_limit() {
        let mut ksp = solver(Arc::new(CsrMatrix::tridiagonal(50, -1.0, 2.0, -1.0)));
        ksp.set_tolerances(Tolerances::new(1e-14, 1e-50, 2));
        let b = DenseVector::filled(50, 1.0);
        let mut x = DenseVector::zeros(50);
        let result = ksp.solve(&b, &mut x).unwrap();
        assert_eq!(result.reason, ConvergedReason::DivergedIterations);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.history.len(), 5);
    }
}
