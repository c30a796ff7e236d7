//! `itsolve newton`: the 1-D Bratu problem.
//!
//! Solves `-u'' - λ eᵘ = 0` on `(0, 1)` with `u(0) = u(1) = 0`, discretised
//! with central differences on `n` interior points.

use std::sync::Arc;

use serde::Serialize;
use solver_core::{CapabilityError, ConvergedReason, CsrMatrix, DenseVector};
use solver_krylov::KrylovRegistry;
use solver_newton::{
    JacobianUpdate, LineSearchKind, LineSearchRegistry, NewtonOptions, NewtonSolver,
    NonlinearFunction,
};
use tracing::info;

use super::output::{emit, history_lines, Report};
use super::preconditioner;
use crate::config::OutputFormat;
use crate::{CliError, Result};

/// Discrete Bratu residual and Jacobian.
#[derive(Debug, Clone)]
pub struct Bratu {
    lambda: f64,
    inv_h2: f64,
}

impl Bratu {
    /// Problem on `n` interior grid points.
    pub fn new(n: usize, lambda: f64) -> Self {
        let h = 1.0 / (n as f64 + 1.0);
        Self {
            lambda,
            inv_h2: 1.0 / (h * h),
        }
    }
}

impl NonlinearFunction<DenseVector> for Bratu {
    fn residual(&mut self, x: &DenseVector, f: &mut DenseVector) -> std::result::Result<(), CapabilityError> {
        let u = x.as_slice();
        let n = u.len();
        for (i, fi) in f.as_mut_slice().iter_mut().enumerate() {
            let left = if i > 0 { u[i - 1] } else { 0.0 };
            let right = if i + 1 < n { u[i + 1] } else { 0.0 };
            *fi = (2.0 * u[i] - left - right) * self.inv_h2 - self.lambda * u[i].exp();
        }
        Ok(())
    }

    fn jacobian(&mut self, x: &DenseVector) -> std::result::Result<JacobianUpdate<DenseVector>, CapabilityError> {
        let u = x.as_slice();
        let n = u.len();
        let mut triplets = Vec::with_capacity(3 * n);
        for (i, ui) in u.iter().enumerate() {
            if i > 0 {
                triplets.push((i, i - 1, -self.inv_h2));
            }
            triplets.push((i, i, 2.0 * self.inv_h2 - self.lambda * ui.exp()));
            if i + 1 < n {
                triplets.push((i, i + 1, -self.inv_h2));
            }
        }
        let jacobian = CsrMatrix::from_triplets(n, n, triplets)?;
        Ok(JacobianUpdate::new(Arc::new(jacobian)))
    }
}

/// Arguments of the `newton` command.
#[derive(Debug, Clone)]
pub struct NewtonArgs {
    pub size: usize,
    pub lambda: f64,
    pub line_search: Option<String>,
    pub max_iterations: Option<usize>,
    pub pc: String,
    pub view: bool,
}

impl NewtonArgs {
    /// Layer command-line flags over the configured options.
    pub fn apply_overrides(&self, options: &mut NewtonOptions) -> Result<()> {
        if let Some(name) = &self.line_search {
            options.line_search = name.parse::<LineSearchKind>()?;
        }
        if let Some(max_iterations) = self.max_iterations {
            options.max_iterations = max_iterations;
        }
        Ok(())
    }
}

/// Outcome of a Bratu solve.
#[derive(Debug, Clone, Serialize)]
pub struct NewtonReport {
    pub size: usize,
    pub lambda: f64,
    pub line_search: &'static str,
    pub linear_method: &'static str,
    pub iterations: usize,
    pub reason: ConvergedReason,
    pub reason_code: i32,
    pub function_norm: f64,
    pub linear_iterations: usize,
    pub function_evaluations: usize,
    pub max_u: f64,
    pub history: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

impl Report for NewtonReport {
    fn title(&self) -> String {
        format!("Bratu problem: lambda = {} (n = {})", self.lambda, self.size)
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("line search", self.line_search.to_string()),
            ("linear solver", self.linear_method.to_string()),
            ("iterations", self.iterations.to_string()),
            ("reason", format!("{} [{}]", self.reason, self.reason_code)),
            ("function norm", format!("{:.6e}", self.function_norm)),
            ("linear iterations", self.linear_iterations.to_string()),
            ("function evaluations", self.function_evaluations.to_string()),
            ("max u", format!("{:.6}", self.max_u)),
        ]
    }

    fn details(&self) -> Vec<String> {
        let mut lines = history_lines("function norm history", &self.history);
        if let Some(view) = &self.view {
            lines.extend(view.lines().map(str::to_string));
        }
        lines
    }
}

/// Solve the Bratu problem from `u = 0`.
pub fn execute(options: &NewtonOptions, args: &NewtonArgs) -> Result<NewtonReport> {
    if args.size == 0 {
        return Err(CliError::InvalidArgument("size must be positive".to_string()));
    }
    let mut options = options.clone();
    args.apply_overrides(&mut options)?;

    let mut snes: NewtonSolver<DenseVector> = NewtonSolver::new();
    snes.set_from_options(
        &LineSearchRegistry::with_defaults(),
        &KrylovRegistry::with_defaults(),
        &options,
    )?;
    snes.ksp_mut().set_preconditioner(preconditioner(&args.pc)?);

    info!(
        size = args.size,
        lambda = args.lambda,
        line_search = snes.line_search_name(),
        "starting Bratu solve"
    );
    let mut problem = Bratu::new(args.size, args.lambda);
    let mut u = DenseVector::zeros(args.size);
    let result = snes.solve(&mut problem, &mut u)?;
    let max_u = u.as_slice().iter().copied().fold(f64::NEG_INFINITY, f64::max);
    info!(
        iterations = result.iterations,
        reason = %result.reason,
        function_norm = result.function_norm,
        "Bratu solve finished"
    );

    let view = if args.view {
        let mut text = String::new();
        snes.view(&mut text)?;
        Some(text)
    } else {
        None
    };

    Ok(NewtonReport {
        size: args.size,
        lambda: args.lambda,
        line_search: snes.line_search_name(),
        linear_method: snes.ksp().method_name(),
        iterations: result.iterations,
        reason: result.reason,
        reason_code: result.reason.code(),
        function_norm: result.function_norm,
        linear_iterations: result.linear_iterations,
        function_evaluations: result.function_evaluations,
        max_u,
        history: result.history,
        view,
    })
}

/// Run the `newton` command.
pub fn run(options: &NewtonOptions, args: &NewtonArgs, format: OutputFormat) -> Result<()> {
    let report = execute(options, args)?;
    emit(&report, format)
}
