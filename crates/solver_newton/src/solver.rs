//! Newton line-search solver.
//!
//! Each iteration solves `J(x) y = F(x)` with the inner [`KrylovSolver`],
//! hands the direction to the line search, and swaps in the new iterate
//! when the search succeeds.

use std::fmt;

use serde::Serialize;
use solver_core::{
    ConvergedReason, ConvergenceMonitor, Lifecycle, SolverError, Vector, Viewer, WorkVectors,
};
use solver_krylov::{KrylovRegistry, KrylovSolver, Tfqmr};
use tracing::{debug, warn};

use crate::convergence::{DefaultNonlinearConvergence, NonlinearConvergenceTest, NonlinearState};
use crate::function::NonlinearFunction;
use crate::line_search::{
    BacktrackingLineSearch, LineSearch, LineSearchContext, LineSearchStatus, LineSearchVectors,
    StepCheck,
};
use crate::options::{LineSearchParams, NewtonOptions, NonlinearTolerances};
use crate::registry::LineSearchRegistry;

/// Residual, direction, trial residual, scratch and last update.
const WORK_VECTORS: usize = 5;
const UPDATE: usize = 4;

/// Outcome of a nonlinear solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewtonResult {
    /// Completed Newton iterations.
    pub iterations: usize,
    /// Terminal reason.
    pub reason: ConvergedReason,
    /// Last computed `‖F‖`.
    pub function_norm: f64,
    /// Linear iterations summed over all Newton steps.
    pub linear_iterations: usize,
    /// Residual evaluations.
    pub function_evaluations: usize,
    /// `‖F‖` per iteration, starting with the initial residual.
    pub history: Vec<f64>,
}

impl NewtonResult {
    /// `true` for a convergent reason.
    pub fn converged(&self) -> bool {
        self.reason.is_converged()
    }
}

/// Newton's method with a pluggable line search.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use solver_core::{CapabilityError, DenseMatrix, DenseVector};
/// use solver_newton::{JacobianUpdate, NewtonSolver, NonlinearFunction};
///
/// /// F(x) = x² - 4
/// struct Square;
///
/// impl NonlinearFunction<DenseVector> for Square {
///     fn residual(&mut self, x: &DenseVector, f: &mut DenseVector) -> Result<(), CapabilityError> {
///         f[0] = x[0] * x[0] - 4.0;
///         Ok(())
///     }
///
///     fn jacobian(&mut self, x: &DenseVector) -> Result<JacobianUpdate<DenseVector>, CapabilityError> {
///         Ok(JacobianUpdate::new(Arc::new(DenseMatrix::from_diagonal(&[2.0 * x[0]]))))
///     }
/// }
///
/// let mut snes: NewtonSolver<DenseVector> = NewtonSolver::new();
/// let mut x = DenseVector::from(vec![3.0]);
/// let result = snes.solve(&mut Square, &mut x).unwrap();
/// assert!(result.converged());
/// assert!((x[0] - 2.0).abs() < 1e-6);
/// ```
pub struct NewtonSolver<V: Vector> {
    ksp: KrylovSolver<V>,
    line_search: Box<dyn LineSearch<V>>,
    params: LineSearchParams,
    tolerances: NonlinearTolerances,
    convergence_test: Box<dyn NonlinearConvergenceTest>,
    convergence_test_enabled: bool,
    step_check: Option<Box<dyn StepCheck<V>>>,
    work: WorkVectors<V>,
    setup_len: Option<usize>,
    monitor: ConvergenceMonitor,
    last: Option<NewtonResult>,
    lifecycle: Lifecycle,
}

impl<V: Vector> Default for NewtonSolver<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Vector> NewtonSolver<V> {
    /// Cubic line search, TFQMR inner solver, default tolerances.
    pub fn new() -> Self {
        Self {
            ksp: KrylovSolver::new(Box::new(Tfqmr::default())),
            line_search: Box::new(BacktrackingLineSearch::cubic()),
            params: LineSearchParams::default(),
            tolerances: NonlinearTolerances::default(),
            convergence_test: Box::new(DefaultNonlinearConvergence::new()),
            convergence_test_enabled: true,
            step_check: None,
            work: WorkVectors::new(),
            setup_len: None,
            monitor: ConvergenceMonitor::new("newton"),
            last: None,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Inner linear solver.
    pub fn ksp(&self) -> &KrylovSolver<V> {
        &self.ksp
    }

    /// Inner linear solver, for configuration.
    pub fn ksp_mut(&mut self) -> &mut KrylovSolver<V> {
        &mut self.ksp
    }

    /// Replace the line search.
    pub fn set_line_search(&mut self, line_search: Box<dyn LineSearch<V>>) {
        self.line_search = line_search;
        self.setup_len = None;
    }

    /// Select a registered line search by name.
    pub fn set_line_search_type(
        &mut self,
        registry: &LineSearchRegistry<V>,
        name: &str,
    ) -> Result<(), SolverError> {
        self.set_line_search(registry.create(name)?);
        Ok(())
    }

    /// Name of the current line search.
    pub fn line_search_name(&self) -> &'static str {
        self.line_search.name()
    }

    /// Replace the line-search parameters.
    pub fn set_line_search_params(&mut self, params: LineSearchParams) {
        self.params = params;
    }

    /// Line-search parameters in force.
    pub fn line_search_params(&self) -> &LineSearchParams {
        &self.params
    }

    /// Replace the nonlinear tolerances.
    pub fn set_tolerances(&mut self, tolerances: NonlinearTolerances) {
        self.tolerances = tolerances;
        self.setup_len = None;
    }

    /// Nonlinear tolerances in force.
    pub fn tolerances(&self) -> &NonlinearTolerances {
        &self.tolerances
    }

    /// Install a custom convergence judge (and enable judging).
    pub fn set_convergence_test(&mut self, test: impl NonlinearConvergenceTest + 'static) {
        self.convergence_test = Box::new(test);
        self.convergence_test_enabled = true;
        self.setup_len = None;
    }

    /// Turn judging on or off; without it the solver runs the full budget.
    pub fn set_convergence_test_enabled(&mut self, enabled: bool) {
        self.convergence_test_enabled = enabled;
        self.setup_len = None;
    }

    /// Install a hook that may rewrite each accepted iterate.
    pub fn set_step_check(&mut self, check: impl StepCheck<V> + 'static) {
        self.step_check = Some(Box::new(check));
    }

    /// Remove the step check.
    pub fn clear_step_check(&mut self) {
        self.step_check = None;
    }

    /// Keep at most `len` residual norms per solve.
    pub fn set_residual_history(&mut self, len: Option<usize>) {
        self.monitor.set_capacity(len);
    }

    /// Apply serde options to this solver and its inner linear solver.
    pub fn set_from_options(
        &mut self,
        line_searches: &LineSearchRegistry<V>,
        methods: &KrylovRegistry<V>,
        options: &NewtonOptions,
    ) -> Result<(), SolverError> {
        options.validate()?;
        self.set_line_search_type(line_searches, options.line_search.as_str())?;
        self.params = options.line_search_params();
        self.set_tolerances(options.tolerances());
        self.set_convergence_test_enabled(options.convergence_test);
        self.ksp.set_from_options(methods, &options.linear)
    }

    /// Validate the configuration and allocate work vectors shaped like `template`.
    ///
    /// # Errors
    ///
    /// - [`SolverError::InvalidParameter`] for bad parameters, or a line
    ///   search that cannot run with the current judge settings
    pub fn set_up(&mut self, template: &V) -> Result<(), SolverError> {
        self.lifecycle.ensure_alive()?;
        self.params.validate()?;
        self.tolerances.validate()?;
        self.line_search
            .validate(self.convergence_test_enabled, self.tolerances.max_iterations)?;
        if self.work.allocate(template, WORK_VECTORS) {
            debug!(count = WORK_VECTORS, len = template.len(), "allocated newton work vectors");
        }
        self.setup_len = Some(template.len());
        Ok(())
    }

    /// Solve `F(x) = 0` starting from `x`.
    ///
    /// Linear solves that fail to converge do not stop the iteration; a
    /// failed line search does, leaving `x` at the last accepted iterate.
    pub fn solve(
        &mut self,
        problem: &mut dyn NonlinearFunction<V>,
        x: &mut V,
    ) -> Result<NewtonResult, SolverError> {
        self.lifecycle.ensure_alive()?;
        if self.setup_len != Some(x.len()) {
            self.set_up(x)?;
        }
        self.last = None;
        self.monitor.reset();

        let tolerances = self.tolerances;
        let judging = self.convergence_test_enabled;
        let [f, y, g, w, update] = self.work.as_array_mut::<WORK_VECTORS>()?;

        let mut evaluations = 1;
        problem.residual(x, f)?;
        let mut fnorm = f.norm2();
        let mut iterations = 0;
        let mut linear_iterations = 0;
        self.monitor.record(0, fnorm);

        let mut reason = if fnorm < tolerances.atol {
            ConvergedReason::ConvergedFnormAbs
        } else if judging {
            let state = NonlinearState {
                iteration: 0,
                xnorm: x.norm2(),
                ynorm: 0.0,
                fnorm,
                function_evaluations: evaluations,
            };
            self.convergence_test.check(&state, &tolerances)
        } else {
            ConvergedReason::Iterating
        };

        let mut i = 0;
        while reason.is_iterating() && i < tolerances.max_iterations {
            let update_j = problem.jacobian(x)?;
            self.ksp.set_operators(
                update_j.jacobian.clone(),
                update_j.preconditioner_matrix.clone(),
                update_j.structure,
            );
            let linear = self.ksp.solve(f, y)?;
            linear_iterations += linear.iterations;
            debug!(
                iteration = i,
                linear_iterations = linear.iterations,
                linear_reason = %linear.reason,
                "newton direction computed"
            );
            update.copy_from(y);

            let step_check = match self.step_check.as_mut() {
                Some(check) => Some(&mut **check as &mut dyn StepCheck<V>),
                None => None,
            };
            let mut ctx = LineSearchContext {
                function: &mut *problem,
                jacobian: update_j.jacobian.as_ref(),
                step_check,
                params: self.params,
                atol: tolerances.atol,
                iteration: i,
                max_iterations: tolerances.max_iterations,
                function_evaluations: evaluations,
            };
            let vecs = LineSearchVectors {
                x: &*x,
                f: &*f,
                y: &mut *y,
                g: &mut *g,
                w: &mut *w,
            };
            let outcome = self.line_search.search(&mut ctx, vecs, fnorm)?;
            evaluations = ctx.function_evaluations;

            if outcome.status == LineSearchStatus::Failure {
                warn!(
                    iteration = i,
                    lambda = outcome.lambda,
                    fnorm,
                    code = outcome.status.code(),
                    "line search failed"
                );
                reason = ConvergedReason::DivergedLineSearch;
                break;
            }

            std::mem::swap(x, y);
            std::mem::swap(f, g);
            i += 1;
            iterations = i;
            if outcome.norms_computed {
                fnorm = outcome.gnorm;
                self.monitor.record(i, fnorm);
            }
            debug!(
                iteration = i,
                fnorm,
                lambda = outcome.lambda,
                ynorm = outcome.ynorm,
                "newton step accepted"
            );

            if judging {
                let state = NonlinearState {
                    iteration: i,
                    xnorm: x.norm2(),
                    ynorm: outcome.ynorm,
                    fnorm,
                    function_evaluations: evaluations,
                };
                reason = self.convergence_test.check(&state, &tolerances);
            }
        }

        if reason.is_iterating() {
            reason = if judging {
                ConvergedReason::DivergedIterations
            } else {
                ConvergedReason::ConvergedIterations
            };
        }

        let result = NewtonResult {
            iterations,
            reason,
            function_norm: fnorm,
            linear_iterations,
            function_evaluations: evaluations,
            history: self.monitor.history().to_vec(),
        };
        if result.reason.is_diverged() {
            warn!(
                iterations = result.iterations,
                reason = %result.reason,
                fnorm,
                "nonlinear solve did not converge"
            );
        } else {
            debug!(
                iterations = result.iterations,
                reason = %result.reason,
                fnorm,
                linear_iterations,
                "nonlinear solve finished"
            );
        }
        self.last = Some(result.clone());
        Ok(result)
    }

    /// Result of the last solve.
    pub fn last_result(&self) -> Option<&NewtonResult> {
        self.last.as_ref()
    }

    /// Newton iterations of the last solve.
    pub fn iterations(&self) -> usize {
        self.last.as_ref().map_or(0, |r| r.iterations)
    }

    /// Terminal reason of the last solve.
    pub fn reason(&self) -> ConvergedReason {
        self.last.as_ref().map_or(ConvergedReason::Iterating, |r| r.reason)
    }

    /// Residual norms of the last solve.
    pub fn history(&self) -> &[f64] {
        self.monitor.history()
    }

    /// The last Newton direction, available after a solve.
    pub fn solution_update(&self) -> Option<&V> {
        self.last.as_ref().and(self.work.get(UPDATE))
    }

    /// Write a textual description to `sink`.
    pub fn view(&self, sink: &mut dyn fmt::Write) -> fmt::Result {
        let mut viewer = Viewer::new(sink);
        viewer.line(format_args!("SNES Object: type=ls"))?;
        viewer.indented(|v| {
            v.line(format_args!(
                "maximum iterations={}, maximum function evaluations={}",
                self.tolerances.max_iterations, self.tolerances.max_function_evaluations
            ))?;
            v.line(format_args!(
                "tolerances: relative={:e}, absolute={:e}, solution={:e}",
                self.tolerances.rtol, self.tolerances.atol, self.tolerances.xtol
            ))?;
            if !self.convergence_test_enabled {
                v.line(format_args!("convergence test disabled"))?;
            }
            v.line(format_args!("line search variant: {}", self.line_search.name()))?;
            v.line(format_args!(
                "alpha={:e}, maxstep={:e}, steptol={:e}",
                self.params.alpha, self.params.max_step, self.params.step_tolerance
            ))?;
            self.ksp.view_into(v)
        })
    }

    /// Add a reference to this handle.
    pub fn reference(&mut self) -> Result<usize, SolverError> {
        self.lifecycle.reference()
    }

    /// Drop a reference; the inner solver and buffers go with the last one.
    pub fn destroy(&mut self) -> bool {
        let released = self.lifecycle.destroy();
        if released {
            self.ksp.destroy();
            self.work.release();
            self.step_check = None;
            self.last = None;
            self.monitor.reset();
            self.setup_len = None;
            debug!("newton solver destroyed");
        }
        released
    }

    /// `false` once the last reference has been destroyed.
    pub fn is_alive(&self) -> bool {
        self.lifecycle.is_alive()
    }
}
