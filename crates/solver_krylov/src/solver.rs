//! Linear solver dispatch object.
//!
//! [`KrylovSolver`] owns the operators, preconditioner, tolerances, judge and
//! work vectors, and forwards `solve` to the selected [`KrylovMethod`]. The
//! method only ever sees a [`KrylovContext`] borrowed for one solve.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use solver_core::{
    ConvergedReason, ConvergenceMonitor, ConvergenceTest, DefaultConvergence,
    IdentityPreconditioner, KrylovOptions, Lifecycle, LinearOperator, MatStructure, PcSide,
    Preconditioner, SolverError, Tolerances, Vector, Viewer, WorkVectors,
};
use tracing::{debug, warn};

use crate::qcg::Qcg;
use crate::registry::KrylovRegistry;
use crate::richardson::Richardson;
use crate::tfqmr::Tfqmr;

/// Judge plus monitor for one solve.
///
/// Every norm handed to [`check`](Self::check) is recorded in the history
/// before the verdict is taken.
pub struct ConvergenceJudge<'a> {
    test: &'a mut dyn ConvergenceTest,
    monitor: &'a mut ConvergenceMonitor,
    tolerances: Tolerances,
}

impl<'a> ConvergenceJudge<'a> {
    /// Bundle a test with its monitor.
    pub fn new(
        test: &'a mut dyn ConvergenceTest,
        monitor: &'a mut ConvergenceMonitor,
        tolerances: Tolerances,
    ) -> Self {
        Self {
            test,
            monitor,
            tolerances,
        }
    }

    /// Record `rnorm` and return the verdict.
    pub fn check(&mut self, iteration: usize, rnorm: f64) -> ConvergedReason {
        self.monitor.record(iteration, rnorm);
        self.test.check(iteration, rnorm, &self.tolerances)
    }

    /// Tolerances in force.
    pub fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    /// Iteration cap.
    pub fn max_iterations(&self) -> usize {
        self.tolerances.max_iterations
    }
}

/// Everything a method needs for one solve.
pub struct KrylovContext<'a, V: Vector> {
    /// System operator `A`.
    pub operator: &'a dyn LinearOperator<V>,
    /// Set-up preconditioner.
    pub preconditioner: &'a dyn Preconditioner<V>,
    /// Side validated at setup.
    pub pc_side: PcSide,
    /// Convergence judge.
    pub judge: ConvergenceJudge<'a>,
    /// Work vectors allocated at setup.
    pub work: &'a mut WorkVectors<V>,
    /// `x` holds a caller-supplied initial guess.
    pub initial_guess_nonzero: bool,
    /// Test `‖M⁻¹r‖` instead of `‖r‖` where the method supports it.
    pub use_preconditioned_norm: bool,
}

/// What a method reports back to the dispatch object.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodOutcome {
    /// Completed iterations.
    pub iterations: usize,
    /// Terminal reason; never `Iterating`.
    pub reason: ConvergedReason,
    /// Last norm handed to the judge.
    pub residual_norm: f64,
    /// Free-text detail for breakdowns.
    pub diagnostic: Option<String>,
}

impl MethodOutcome {
    /// Outcome without a diagnostic.
    pub fn new(iterations: usize, reason: ConvergedReason, residual_norm: f64) -> Self {
        Self {
            iterations,
            reason,
            residual_norm,
            diagnostic: None,
        }
    }
}

/// Result of [`KrylovSolver::solve`].
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    /// Completed iterations.
    pub iterations: usize,
    /// Terminal reason.
    pub reason: ConvergedReason,
    /// Final (possibly estimated) residual norm.
    pub residual_norm: f64,
    /// Norms passed to the judge, oldest first.
    pub history: Vec<f64>,
    /// Free-text detail for breakdowns.
    pub diagnostic: Option<String>,
}

impl SolveResult {
    /// `true` if the reason is convergent.
    pub fn converged(&self) -> bool {
        self.reason.is_converged()
    }
}

/// One concrete Krylov iteration.
pub trait KrylovMethod<V: Vector>: Send {
    /// Registered name.
    fn name(&self) -> &'static str;

    /// Side used when the caller does not choose one.
    fn default_pc_side(&self) -> PcSide;

    /// Reject sides (or preconditioners) the method cannot use.
    fn check_pc_side(&self, side: PcSide, pc: &dyn Preconditioner<V>) -> Result<(), SolverError>;

    /// Work vectors needed for `side`.
    fn work_vector_count(&self, side: PcSide) -> usize;

    /// Validate method-private state before the first solve.
    fn set_up(&mut self) -> Result<(), SolverError> {
        Ok(())
    }

    /// Run the iteration on `A x = b`.
    fn solve(&mut self, ctx: KrylovContext<'_, V>, b: &V, x: &mut V) -> Result<MethodOutcome, SolverError>;

    /// Method-specific view lines.
    fn view(&self, viewer: &mut Viewer<'_>) -> fmt::Result;

    /// Pick up method-specific options.
    fn set_from_options(&mut self, options: &KrylovOptions) -> Result<(), SolverError> {
        let _ = options;
        Ok(())
    }

    /// Downcast hook for method-specific setters.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast hook.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Polymorphic linear solver.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use solver_core::{ConvergedReason, DenseMatrix, DenseVector, MatStructure, Tolerances};
/// use solver_krylov::{KrylovRegistry, KrylovSolver};
///
/// let registry = KrylovRegistry::<DenseVector>::with_defaults();
/// let mut ksp = KrylovSolver::with_type(&registry, "richardson").unwrap();
/// ksp.set_operators(Arc::new(DenseMatrix::scaled_identity(2, 2.0)), None, MatStructure::default());
/// ksp.set_tolerances(Tolerances::new(1e-5, 1e-10, 100));
/// ksp.richardson_set_scale(0.5);
///
/// let b = DenseVector::from(vec![4.0, 6.0]);
/// let mut x = DenseVector::zeros(2);
/// let result = ksp.solve(&b, &mut x).unwrap();
/// assert_eq!(x.as_slice(), &[2.0, 3.0]);
/// assert_eq!(result.iterations, 1);
/// assert_eq!(result.reason, ConvergedReason::ConvergedAtol);
/// ```
pub struct KrylovSolver<V: Vector> {
    method: Box<dyn KrylovMethod<V>>,
    operator: Option<Arc<dyn LinearOperator<V>>>,
    pmat: Option<Arc<dyn LinearOperator<V>>>,
    preconditioner: Box<dyn Preconditioner<V>>,
    pc_ready: bool,
    pc_side: Option<PcSide>,
    tolerances: Tolerances,
    convergence_test: Box<dyn ConvergenceTest>,
    initial_guess_nonzero: bool,
    use_preconditioned_norm: bool,
    monitor: ConvergenceMonitor,
    work: WorkVectors<V>,
    setup_len: Option<usize>,
    last: Option<SolveResult>,
    lifecycle: Lifecycle,
}

impl<V: Vector> KrylovSolver<V> {
    /// Solver running `method` with an identity preconditioner and default tolerances.
    pub fn new(method: Box<dyn KrylovMethod<V>>) -> Self {
        let monitor = ConvergenceMonitor::new(method.name());
        Self {
            method,
            operator: None,
            pmat: None,
            preconditioner: Box::new(IdentityPreconditioner),
            pc_ready: false,
            pc_side: None,
            tolerances: Tolerances::default(),
            convergence_test: Box::new(DefaultConvergence::new()),
            initial_guess_nonzero: false,
            use_preconditioned_norm: false,
            monitor,
            work: WorkVectors::new(),
            setup_len: None,
            last: None,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Solver for the registered method `name`.
    pub fn with_type(registry: &KrylovRegistry<V>, name: &str) -> Result<Self, SolverError> {
        Ok(Self::new(registry.create(name)?))
    }

    /// Replace the method; setup runs again before the next solve.
    pub fn set_type(&mut self, registry: &KrylovRegistry<V>, name: &str) -> Result<(), SolverError> {
        self.lifecycle.ensure_alive()?;
        if self.method.name() == name {
            return Ok(());
        }
        self.method = registry.create(name)?;
        self.monitor.set_solver(self.method.name());
        self.invalidate_setup();
        Ok(())
    }

    /// Registered name of the current method.
    pub fn method_name(&self) -> &'static str {
        self.method.name()
    }

    /// Set the system operator and, optionally, a distinct preconditioner matrix.
    pub fn set_operators(
        &mut self,
        operator: Arc<dyn LinearOperator<V>>,
        pmat: Option<Arc<dyn LinearOperator<V>>>,
        structure: MatStructure,
    ) {
        self.pmat = Some(pmat.unwrap_or_else(|| Arc::clone(&operator)));
        self.operator = Some(operator);
        if structure != MatStructure::SamePreconditioner {
            self.pc_ready = false;
        }
        self.setup_len = None;
    }

    /// Replace the preconditioner; it is set up again before the next solve.
    pub fn set_preconditioner(&mut self, preconditioner: Box<dyn Preconditioner<V>>) {
        self.preconditioner = preconditioner;
        self.pc_ready = false;
        self.setup_len = None;
    }

    /// Name of the current preconditioner.
    pub fn preconditioner_name(&self) -> &str {
        self.preconditioner.name()
    }

    /// Choose the preconditioning side (validated at setup).
    pub fn set_pc_side(&mut self, side: PcSide) {
        self.pc_side = Some(side);
        self.setup_len = None;
    }

    /// Side in effect: the explicit choice or the method default.
    pub fn pc_side(&self) -> PcSide {
        self.pc_side.unwrap_or_else(|| self.method.default_pc_side())
    }

    /// Replace all tolerances.
    pub fn set_tolerances(&mut self, tolerances: Tolerances) {
        self.tolerances = tolerances;
    }

    /// Tolerances in force.
    pub fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    /// Install a custom convergence judge.
    pub fn set_convergence_test(&mut self, test: impl ConvergenceTest + 'static) {
        self.convergence_test = Box::new(test);
    }

    /// Treat the incoming `x` as the initial guess instead of zero.
    ///
    /// QCG ignores this: its step always starts at zero.
    pub fn set_initial_guess_nonzero(&mut self, nonzero: bool) {
        self.initial_guess_nonzero = nonzero;
    }

    /// Test `‖M⁻¹r‖` instead of `‖r‖` (Richardson).
    pub fn set_use_preconditioned_norm(&mut self, flag: bool) {
        self.use_preconditioned_norm = flag;
    }

    /// Keep at most `len` residual norms per solve; `None` keeps all.
    pub fn set_residual_history(&mut self, len: Option<usize>) {
        self.monitor.set_capacity(len);
    }

    /// Apply serde options. The method type may change.
    pub fn set_from_options(
        &mut self,
        registry: &KrylovRegistry<V>,
        options: &KrylovOptions,
    ) -> Result<(), SolverError> {
        options.validate()?;
        self.set_type(registry, &options.ksp_type)?;
        self.tolerances = options.tolerances();
        if let Some(side) = options.pc_side {
            self.set_pc_side(side);
        }
        self.initial_guess_nonzero = options.initial_guess_nonzero;
        self.use_preconditioned_norm = options.use_preconditioned_norm;
        self.monitor.set_capacity(options.residual_history);
        self.method.set_from_options(options)
    }

    /// Validate the configuration and allocate work vectors shaped like `template`.
    ///
    /// # Errors
    ///
    /// - [`SolverError::NotConfigured`] without operators
    /// - [`SolverError::DimensionMismatch`] for a non-square or wrongly sized operator
    /// - [`SolverError::UnsupportedPcSide`] when the method rejects the side
    /// - method and preconditioner setup failures
    pub fn set_up(&mut self, template: &V) -> Result<(), SolverError> {
        self.lifecycle.ensure_alive()?;
        let operator = self
            .operator
            .as_ref()
            .ok_or_else(|| SolverError::NotConfigured("operators have not been set".to_string()))?;
        for dim in [operator.rows(), operator.cols()] {
            if dim != template.len() {
                return Err(SolverError::DimensionMismatch {
                    expected: template.len(),
                    found: dim,
                });
            }
        }
        self.tolerances.validate()?;

        let side = self.pc_side();
        self.method.check_pc_side(side, self.preconditioner.as_ref())?;
        self.method.set_up()?;

        if !self.pc_ready {
            let pmat = self.pmat.as_ref().unwrap_or(operator);
            self.preconditioner.set_up(pmat.as_ref(), template)?;
            self.pc_ready = true;
        }

        let count = self.method.work_vector_count(side);
        if self.work.allocate(template, count) {
            debug!(
                method = self.method.name(),
                count,
                len = template.len(),
                "allocated work vectors"
            );
        }
        self.setup_len = Some(template.len());
        Ok(())
    }

    /// Solve `A x = b`.
    ///
    /// Runs setup first if needed. Numerical failures are reported through
    /// [`SolveResult::reason`]; capability failures abort with an error.
    pub fn solve(&mut self, b: &V, x: &mut V) -> Result<SolveResult, SolverError> {
        self.lifecycle.ensure_alive()?;
        if self.setup_len.is_none() {
            self.set_up(b)?;
        }
        let expected = self.setup_len.unwrap_or(b.len());
        for found in [b.len(), x.len()] {
            if found != expected {
                return Err(SolverError::DimensionMismatch { expected, found });
            }
        }
        let operator = self
            .operator
            .as_ref()
            .ok_or_else(|| SolverError::NotConfigured("operators have not been set".to_string()))?;

        if !self.initial_guess_nonzero {
            x.set(0.0);
        }
        self.monitor.reset();
        self.last = None;

        let ctx = KrylovContext {
            operator: operator.as_ref(),
            preconditioner: self.preconditioner.as_ref(),
            pc_side: self.pc_side.unwrap_or_else(|| self.method.default_pc_side()),
            judge: ConvergenceJudge::new(
                self.convergence_test.as_mut(),
                &mut self.monitor,
                self.tolerances,
            ),
            work: &mut self.work,
            initial_guess_nonzero: self.initial_guess_nonzero,
            use_preconditioned_norm: self.use_preconditioned_norm,
        };
        let outcome = self.method.solve(ctx, b, x)?;

        let result = SolveResult {
            iterations: outcome.iterations,
            reason: outcome.reason,
            residual_norm: outcome.residual_norm,
            history: self.monitor.history().to_vec(),
            diagnostic: outcome.diagnostic,
        };
        if result.reason.is_diverged() {
            warn!(
                method = self.method.name(),
                iterations = result.iterations,
                reason = %result.reason,
                "linear solve did not converge"
            );
        } else {
            debug!(
                method = self.method.name(),
                iterations = result.iterations,
                residual_norm = result.residual_norm,
                reason = %result.reason,
                "linear solve finished"
            );
        }
        self.last = Some(result.clone());
        Ok(result)
    }

    /// Result of the last solve.
    pub fn last_result(&self) -> Option<&SolveResult> {
        self.last.as_ref()
    }

    /// Iterations of the last solve (0 before any solve).
    pub fn iterations(&self) -> usize {
        self.last.as_ref().map_or(0, |r| r.iterations)
    }

    /// Reason of the last solve (`Iterating` before any solve).
    pub fn reason(&self) -> ConvergedReason {
        self.last.as_ref().map_or(ConvergedReason::Iterating, |r| r.reason)
    }

    /// Final residual norm of the last solve.
    pub fn residual_norm(&self) -> Option<f64> {
        self.last.as_ref().map(|r| r.residual_norm)
    }

    /// Residual history of the last solve.
    pub fn history(&self) -> &[f64] {
        self.monitor.history()
    }

    /// Set the Richardson damping factor; no effect on other methods.
    pub fn richardson_set_scale(&mut self, scale: f64) {
        if let Some(method) = self.method.as_any_mut().downcast_mut::<Richardson>() {
            method.set_scale(scale);
        }
    }

    /// Set the QCG trust-region radius; no effect on other methods.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidParameter`] for a non-positive radius.
    pub fn qcg_set_trust_region_radius(&mut self, radius: f64) -> Result<(), SolverError> {
        if !(radius > 0.0) {
            return Err(SolverError::InvalidParameter {
                name: "trust_region_radius",
                value: radius.to_string(),
                expected: "> 0",
            });
        }
        if let Some(method) = self.method.as_any_mut().downcast_mut::<Qcg>() {
            method.set_trust_region_radius(radius);
        }
        Ok(())
    }

    /// Scaled norm of the last QCG step.
    pub fn qcg_step_norm(&self) -> Option<f64> {
        self.method
            .as_any()
            .downcast_ref::<Qcg>()
            .and_then(Qcg::step_norm)
    }

    /// Model value `bᵗx + ½xᵗAx` at the last QCG step.
    pub fn qcg_quadratic_value(&self) -> Option<f64> {
        self.method
            .as_any()
            .downcast_ref::<Qcg>()
            .and_then(Qcg::quadratic_value)
    }

    /// τ sequence of the last TFQMR solve.
    pub fn tfqmr_tau_history(&self) -> Option<&[f64]> {
        self.method
            .as_any()
            .downcast_ref::<Tfqmr>()
            .map(Tfqmr::tau_history)
    }

    /// Write a textual description to `sink`.
    pub fn view(&self, sink: &mut dyn fmt::Write) -> fmt::Result {
        self.view_into(&mut Viewer::new(sink))
    }

    /// Write the description through an existing viewer, keeping its indentation.
    pub fn view_into(&self, viewer: &mut Viewer<'_>) -> fmt::Result {
        viewer.line(format_args!("KSP Object: type={}", self.method.name()))?;
        viewer.indented(|v| {
            v.line(format_args!(
                "maximum iterations={}, initial guess is {}",
                self.tolerances.max_iterations,
                if self.initial_guess_nonzero { "nonzero" } else { "zero" }
            ))?;
            v.line(format_args!(
                "tolerances: relative={:e}, absolute={:e}, divergence={:e}",
                self.tolerances.rtol, self.tolerances.atol, self.tolerances.dtol
            ))?;
            v.line(format_args!("{} preconditioning", self.pc_side()))?;
            v.line(format_args!("PC: {}", self.preconditioner.name()))?;
            self.method.view(v)
        })
    }

    /// Add a reference to this handle.
    pub fn reference(&mut self) -> Result<usize, SolverError> {
        self.lifecycle.reference()
    }

    /// Drop a reference; resources are released with the last one.
    ///
    /// Returns `true` when this call released the solver. Destroying a
    /// released solver is a no-op.
    pub fn destroy(&mut self) -> bool {
        let released = self.lifecycle.destroy();
        if released {
            self.work.release();
            self.operator = None;
            self.pmat = None;
            self.last = None;
            self.monitor.reset();
            self.invalidate_setup();
            debug!(method = self.method.name(), "solver destroyed");
        }
        released
    }

    /// `false` once the last reference has been destroyed.
    pub fn is_alive(&self) -> bool {
        self.lifecycle.is_alive()
    }

    fn invalidate_setup(&mut self) {
        self.setup_len = None;
    }
}
