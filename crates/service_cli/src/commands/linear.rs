//! `itsolve linear`: Krylov solve of a model linear system.

use std::sync::Arc;

use serde::Serialize;
use solver_core::{
    ConvergedReason, CsrMatrix, DenseMatrix, DenseVector, KrylovOptions, LinearOperator,
    MatStructure, PcSide, SolverError, Vector,
};
use solver_krylov::{KrylovRegistry, KrylovSolver};
use tracing::info;

use super::output::{emit, history_lines, Report};
use super::preconditioner;
use crate::config::OutputFormat;
use crate::{CliError, Result};

/// Model problems available to `linear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problem {
    /// 1-D Laplacian `tridiag(-1, 2, -1)` in CSR storage.
    Poisson,
    /// `2 I` in dense storage.
    Identity,
}

impl Problem {
    /// Parse a `--problem` value.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "poisson" => Ok(Problem::Poisson),
            "identity" => Ok(Problem::Identity),
            other => Err(CliError::InvalidArgument(format!(
                "Unknown problem: {}. Supported: poisson, identity",
                other
            ))),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Problem::Poisson => "poisson",
            Problem::Identity => "identity",
        }
    }

    fn operator(&self, size: usize) -> Arc<dyn LinearOperator<DenseVector>> {
        match self {
            Problem::Poisson => Arc::new(CsrMatrix::tridiagonal(size, -1.0, 2.0, -1.0)),
            Problem::Identity => Arc::new(DenseMatrix::scaled_identity(size, 2.0)),
        }
    }
}

/// Arguments of the `linear` command.
#[derive(Debug, Clone)]
pub struct LinearArgs {
    pub size: usize,
    pub problem: String,
    pub ksp_type: Option<String>,
    pub pc: String,
    pub pc_side: Option<String>,
    pub rtol: Option<f64>,
    pub max_iterations: Option<usize>,
    pub view: bool,
}

impl LinearArgs {
    /// Layer command-line flags over the configured options.
    pub fn apply_overrides(&self, options: &mut KrylovOptions) -> Result<()> {
        if let Some(ksp_type) = &self.ksp_type {
            options.ksp_type = ksp_type.clone();
        }
        if let Some(side) = &self.pc_side {
            options.pc_side = Some(side.parse::<PcSide>()?);
        }
        if let Some(rtol) = self.rtol {
            options.rtol = rtol;
        }
        if let Some(max_iterations) = self.max_iterations {
            options.max_iterations = max_iterations;
        }
        Ok(())
    }
}

/// Outcome of a linear solve.
#[derive(Debug, Clone, Serialize)]
pub struct LinearReport {
    pub problem: &'static str,
    pub size: usize,
    pub method: &'static str,
    pub preconditioner: String,
    pub pc_side: PcSide,
    pub iterations: usize,
    pub reason: ConvergedReason,
    pub reason_code: i32,
    pub residual_norm: f64,
    pub true_residual_norm: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    pub history: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

impl Report for LinearReport {
    fn title(&self) -> String {
        format!("Linear solve: {} (n = {})", self.problem, self.size)
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("method", self.method.to_string()),
            ("preconditioner", format!("{} ({})", self.preconditioner, self.pc_side)),
            ("iterations", self.iterations.to_string()),
            ("reason", format!("{} [{}]", self.reason, self.reason_code)),
            ("residual norm", format!("{:.6e}", self.residual_norm)),
            ("true residual", format!("{:.6e}", self.true_residual_norm)),
        ];
        if let Some(diagnostic) = &self.diagnostic {
            rows.push(("diagnostic", diagnostic.clone()));
        }
        rows
    }

    fn details(&self) -> Vec<String> {
        let mut lines = history_lines("residual history", &self.history);
        if let Some(view) = &self.view {
            lines.extend(view.lines().map(str::to_string));
        }
        lines
    }
}

/// Solve `A x = 1` for the chosen model problem.
pub fn execute(options: &KrylovOptions, args: &LinearArgs) -> Result<LinearReport> {
    if args.size == 0 {
        return Err(CliError::InvalidArgument("size must be positive".to_string()));
    }
    let problem = Problem::parse(&args.problem)?;
    let mut options = options.clone();
    args.apply_overrides(&mut options)?;

    let registry = KrylovRegistry::<DenseVector>::with_defaults();
    let mut ksp = KrylovSolver::with_type(&registry, &options.ksp_type)?;
    ksp.set_from_options(&registry, &options)?;
    let operator = problem.operator(args.size);
    ksp.set_operators(Arc::clone(&operator), None, MatStructure::default());
    ksp.set_preconditioner(preconditioner(&args.pc)?);

    info!(
        problem = problem.name(),
        size = args.size,
        method = ksp.method_name(),
        pc = %args.pc,
        "starting linear solve"
    );
    let b = DenseVector::filled(args.size, 1.0);
    let mut x = DenseVector::zeros(args.size);
    let result = ksp.solve(&b, &mut x)?;

    let mut r = b.duplicate();
    operator.apply(&x, &mut r).map_err(SolverError::from)?;
    r.axpy(-1.0, &b);
    let true_residual_norm = r.norm2();
    info!(
        iterations = result.iterations,
        reason = %result.reason,
        true_residual_norm,
        "linear solve finished"
    );

    let view = if args.view {
        let mut text = String::new();
        ksp.view(&mut text)?;
        Some(text)
    } else {
        None
    };

    Ok(LinearReport {
        problem: problem.name(),
        size: args.size,
        method: ksp.method_name(),
        preconditioner: ksp.preconditioner_name().to_string(),
        pc_side: ksp.pc_side(),
        iterations: result.iterations,
        reason: result.reason,
        reason_code: result.reason.code(),
        residual_norm: result.residual_norm,
        true_residual_norm,
        diagnostic: result.diagnostic,
        history: result.history,
        view,
    })
}

/// Run the `linear` command.
pub fn run(options: &KrylovOptions, args: &LinearArgs, format: OutputFormat) -> Result<()> {
    let report = execute(options, args)?;
    emit(&report, format)
}
