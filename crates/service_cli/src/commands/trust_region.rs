//! `itsolve trust-region`: QCG step on a shifted 1-D Laplacian.

use std::sync::Arc;

use serde::Serialize;
use solver_core::{ConvergedReason, CsrMatrix, DenseVector, KrylovOptions, MatStructure};
use solver_krylov::{KrylovRegistry, KrylovSolver, Qcg};
use tracing::info;

use super::output::{emit, Report};
use super::preconditioner;
use crate::config::OutputFormat;
use crate::{CliError, Result};

/// Arguments of the `trust-region` command.
#[derive(Debug, Clone)]
pub struct TrustRegionArgs {
    pub size: usize,
    pub radius: f64,
    /// Added to the Laplacian diagonal; below `-4 sin²(π/2(n+1))` the model is indefinite.
    pub shift: f64,
    pub pc: String,
}

/// Outcome of a trust-region step.
#[derive(Debug, Clone, Serialize)]
pub struct TrustRegionReport {
    pub size: usize,
    pub radius: f64,
    pub shift: f64,
    pub iterations: usize,
    pub reason: ConvergedReason,
    pub reason_code: i32,
    pub step_norm: f64,
    pub quadratic_value: f64,
    pub residual_norm: f64,
}

impl Report for TrustRegionReport {
    fn title(&self) -> String {
        format!("Trust-region step: qcg (n = {}, radius = {})", self.size, self.radius)
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("diagonal shift", self.shift.to_string()),
            ("iterations", self.iterations.to_string()),
            ("reason", format!("{} [{}]", self.reason, self.reason_code)),
            ("step norm", format!("{:.6e}", self.step_norm)),
            ("model value", format!("{:.6e}", self.quadratic_value)),
            ("residual norm", format!("{:.6e}", self.residual_norm)),
        ]
    }
}

/// Minimise `bᵗx + ½xᵗAx` subject to `‖x‖ ≤ radius` with `b = 1`.
pub fn execute(options: &KrylovOptions, args: &TrustRegionArgs) -> Result<TrustRegionReport> {
    if args.size == 0 {
        return Err(CliError::InvalidArgument("size must be positive".to_string()));
    }
    let mut options = options.clone();
    options.ksp_type = Qcg::NAME.to_string();
    options.trust_region_radius = Some(args.radius);

    let registry = KrylovRegistry::<DenseVector>::with_defaults();
    let mut ksp = KrylovSolver::with_type(&registry, Qcg::NAME)?;
    ksp.set_from_options(&registry, &options)?;
    ksp.set_operators(
        Arc::new(CsrMatrix::tridiagonal(args.size, -1.0, 2.0 + args.shift, -1.0)),
        None,
        MatStructure::default(),
    );
    ksp.set_preconditioner(preconditioner(&args.pc)?);

    let b = DenseVector::filled(args.size, 1.0);
    let mut x = DenseVector::zeros(args.size);
    let result = ksp.solve(&b, &mut x)?;
    let step_norm = ksp.qcg_step_norm().unwrap_or(0.0);
    let quadratic_value = ksp.qcg_quadratic_value().unwrap_or(0.0);
    info!(
        iterations = result.iterations,
        reason = %result.reason,
        step_norm,
        quadratic_value,
        "trust-region step finished"
    );

    Ok(TrustRegionReport {
        size: args.size,
        radius: args.radius,
        shift: args.shift,
        iterations: result.iterations,
        reason: result.reason,
        reason_code: result.reason.code(),
        step_norm,
        quadratic_value,
        residual_norm: result.residual_norm,
    })
}

/// Run the `trust-region` command.
pub fn run(options: &KrylovOptions, args: &TrustRegionArgs, format: OutputFormat) -> Result<()> {
    let report = execute(options, args)?;
    emit(&report, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use solver_core::SolverError;

    fn args(radius: f64, shift: f64) -> TrustRegionArgs {
        TrustRegionArgs {
            size: 8,
            radius,
            shift,
            pc: "none".to_string(),
        }
    }

    #[test]
    fn test_small_radius_constrains_first_step() {
        let report = execute(&KrylovOptions::default(), &args(0.1, 0.0)).unwrap();
        assert_eq!(report.reason, ConvergedReason::ConvergedConstrainedStep);
        assert_eq!(report.iterations, 1);
        assert_relative_eq!(report.step_norm, 0.1);
        assert!(report.quadratic_value < 0.0);
    }

    #[test]
    fn test_indefinite_model_follows_negative_curvature() {
        let report = execute(&KrylovOptions::default(), &args(0.5, -3.0)).unwrap();
        assert_eq!(report.reason, ConvergedReason::ConvergedNegativeCurvature);
        assert_relative_eq!(report.step_norm, 0.5);
    }

    #[test]
    fn test_large_radius_reaches_interior_minimiser() {
        let mut a = args(1e6, 0.0);
        a.size = 4;
        let options = KrylovOptions {
            rtol: 1e-10,
            ..Default::default()
        };
        let report = execute(&options, &a).unwrap();
        assert!(report.reason.is_converged(), "reason: {}", report.reason);
        assert!(report.step_norm < 1e6);
        assert!(report.quadratic_value < 0.0);
    }

    #[test]
    fn test_non_positive_radius_rejected() {
        match execute(&KrylovOptions::default(), &args(0.0, 0.0)) {
            Err(CliError::Solver(SolverError::InvalidParameter { name, .. })) => {
                assert_eq!(name, "trust_region_radius")
            }
            other => panic!("Expected InvalidParameter, got {:?}", other),
        }
    }
}
