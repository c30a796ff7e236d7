//! Termination verdicts, tolerances and convergence judges.

use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::error::SolverError;

/// Outcome of an iterative solve.
///
/// Exactly one terminal reason is set per solve. Convergent reasons have a
/// positive [`code`](Self::code), divergent ones a negative code, and
/// [`ConvergedReason::Iterating`] is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergedReason {
    /// No terminal verdict yet.
    #[default]
    Iterating,
    /// Residual norm fell below the relative tolerance.
    ConvergedRtol,
    /// Residual norm fell below the absolute tolerance.
    ConvergedAtol,
    /// Iteration budget used with convergence testing disabled.
    ConvergedIterations,
    /// Trust-region step stopped on a direction of non-positive curvature.
    ConvergedNegativeCurvature,
    /// Trust-region step stopped on the boundary.
    ConvergedConstrainedStep,
    /// Nonlinear residual norm below the absolute tolerance.
    ConvergedFnormAbs,
    /// Nonlinear residual norm reduced by the relative tolerance.
    ConvergedFnormRelative,
    /// Newton step small relative to the iterate.
    ConvergedStepRelative,
    /// A custom judge declared convergence.
    ConvergedCustom,
    /// Iteration limit reached without convergence.
    DivergedIterations,
    /// Residual grew past the divergence tolerance.
    DivergedDtol,
    /// A recurrence denominator vanished.
    DivergedBreakdown,
    /// The line search could not reduce the residual.
    DivergedLineSearch,
    /// Residual norm is NaN.
    DivergedNaN,
    /// Function evaluation budget exhausted.
    DivergedFunctionCount,
    /// A custom judge declared divergence.
    DivergedCustom,
}

impl ConvergedReason {
    /// Machine-readable code: positive converged, negative diverged, 0 iterating.
    pub fn code(&self) -> i32 {
        match self {
            ConvergedReason::Iterating => 0,
            ConvergedReason::ConvergedRtol => 2,
            ConvergedReason::ConvergedAtol => 3,
            ConvergedReason::ConvergedIterations => 4,
            ConvergedReason::ConvergedNegativeCurvature => 5,
            ConvergedReason::ConvergedConstrainedStep => 6,
            ConvergedReason::ConvergedFnormAbs => 7,
            ConvergedReason::ConvergedFnormRelative => 8,
            ConvergedReason::ConvergedStepRelative => 9,
            ConvergedReason::ConvergedCustom => 10,
            ConvergedReason::DivergedCustom => -1,
            ConvergedReason::DivergedIterations => -3,
            ConvergedReason::DivergedDtol => -4,
            ConvergedReason::DivergedBreakdown => -5,
            ConvergedReason::DivergedLineSearch => -6,
            ConvergedReason::DivergedNaN => -9,
            ConvergedReason::DivergedFunctionCount => -10,
        }
    }

    /// `true` for every convergent reason.
    pub fn is_converged(&self) -> bool {
        self.code() > 0
    }

    /// `true` for every divergent reason.
    pub fn is_diverged(&self) -> bool {
        self.code() < 0
    }

    /// `true` while no verdict has been reached.
    pub fn is_iterating(&self) -> bool {
        *self == ConvergedReason::Iterating
    }
}

impl fmt::Display for ConvergedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConvergedReason::Iterating => "iterating",
            ConvergedReason::ConvergedRtol => "converged (relative)",
            ConvergedReason::ConvergedAtol => "converged (absolute)",
            ConvergedReason::ConvergedIterations => "converged (iteration budget)",
            ConvergedReason::ConvergedNegativeCurvature => "converged (negative curvature)",
            ConvergedReason::ConvergedConstrainedStep => "converged (constrained step)",
            ConvergedReason::ConvergedFnormAbs => "converged (function norm absolute)",
            ConvergedReason::ConvergedFnormRelative => "converged (function norm relative)",
            ConvergedReason::ConvergedStepRelative => "converged (step relative)",
            ConvergedReason::ConvergedCustom => "converged (custom)",
            ConvergedReason::DivergedIterations => "diverged (iteration limit)",
            ConvergedReason::DivergedDtol => "diverged (divergence tolerance)",
            ConvergedReason::DivergedBreakdown => "diverged (breakdown)",
            ConvergedReason::DivergedLineSearch => "diverged (line search failure)",
            ConvergedReason::DivergedNaN => "diverged (NaN)",
            ConvergedReason::DivergedFunctionCount => "diverged (function count)",
            ConvergedReason::DivergedCustom => "diverged (custom)",
        };
        f.write_str(text)
    }
}

/// Linear solve tolerances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    /// Relative decrease of the residual norm.
    pub rtol: f64,
    /// Absolute residual norm.
    pub atol: f64,
    /// Divergence factor relative to the initial residual.
    pub dtol: f64,
    /// Iteration cap.
    pub max_iterations: usize,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            rtol: 1e-5,
            atol: 1e-50,
            dtol: 1e5,
            max_iterations: 10_000,
        }
    }
}

impl Tolerances {
    /// Tolerances with the given relative/absolute values and defaults elsewhere.
    pub fn new(rtol: f64, atol: f64, max_iterations: usize) -> Self {
        Self {
            rtol,
            atol,
            max_iterations,
            ..Default::default()
        }
    }

    /// Check that every tolerance is in range.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidParameter`] naming the first bad field.
    pub fn validate(&self) -> Result<(), SolverError> {
        if !(self.rtol >= 0.0 && self.rtol < 1.0) {
            return Err(SolverError::InvalidParameter {
                name: "rtol",
                value: self.rtol.to_string(),
                expected: "0 <= rtol < 1",
            });
        }
        if !(self.atol >= 0.0) {
            return Err(SolverError::InvalidParameter {
                name: "atol",
                value: self.atol.to_string(),
                expected: ">= 0",
            });
        }
        if !(self.dtol > 1.0) {
            return Err(SolverError::InvalidParameter {
                name: "dtol",
                value: self.dtol.to_string(),
                expected: "> 1",
            });
        }
        Ok(())
    }
}

/// Pluggable termination predicate.
///
/// Called with iteration 0 for the initial residual and then once per
/// completed iteration. Any closure `FnMut(usize, f64) -> ConvergedReason`
/// is a judge.
pub trait ConvergenceTest: Send {
    /// Verdict for `rnorm` at `iteration`.
    fn check(&mut self, iteration: usize, rnorm: f64, tolerances: &Tolerances) -> ConvergedReason;
}

impl<F> ConvergenceTest for F
where
    F: FnMut(usize, f64) -> ConvergedReason + Send,
{
    fn check(&mut self, iteration: usize, rnorm: f64, _tolerances: &Tolerances) -> ConvergedReason {
        self(iteration, rnorm)
    }
}

/// Default residual-based judge.
///
/// At iteration 0 the target `max(rtol·‖r0‖, atol)` is fixed; afterwards the
/// residual is compared against it and against `dtol·‖r0‖`.
#[derive(Debug, Clone, Default)]
pub struct DefaultConvergence {
    initial_norm: f64,
    target: f64,
}

impl DefaultConvergence {
    /// New judge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Target norm fixed at the last iteration 0.
    pub fn target(&self) -> f64 {
        self.target
    }
}

impl ConvergenceTest for DefaultConvergence {
    fn check(&mut self, iteration: usize, rnorm: f64, tolerances: &Tolerances) -> ConvergedReason {
        if rnorm.is_nan() {
            return ConvergedReason::DivergedNaN;
        }
        if iteration == 0 {
            self.initial_norm = rnorm;
            self.target = (tolerances.rtol * rnorm).max(tolerances.atol);
            if rnorm <= tolerances.atol {
                return ConvergedReason::ConvergedAtol;
            }
        }
        if rnorm <= self.target {
            if rnorm < tolerances.atol {
                ConvergedReason::ConvergedAtol
            } else {
                ConvergedReason::ConvergedRtol
            }
        } else if iteration > 0 && rnorm >= tolerances.dtol * self.initial_norm {
            ConvergedReason::DivergedDtol
        } else {
            ConvergedReason::Iterating
        }
    }
}

/// Judge that never stops early; the iteration cap decides.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipConvergence;

impl ConvergenceTest for SkipConvergence {
    fn check(&mut self, _iteration: usize, _rnorm: f64, _tolerances: &Tolerances) -> ConvergedReason {
        ConvergedReason::Iterating
    }
}

/// Residual history recorder.
///
/// Every norm handed to the judge passes through here and is emitted as a
/// `trace!` event; at most `capacity` norms are kept.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceMonitor {
    history: Vec<f64>,
    capacity: Option<usize>,
    solver: &'static str,
}

impl ConvergenceMonitor {
    /// Monitor labelled with the owning method's name.
    pub fn new(solver: &'static str) -> Self {
        Self {
            solver,
            ..Default::default()
        }
    }

    /// Keep at most `capacity` entries; `None` keeps everything.
    pub fn set_capacity(&mut self, capacity: Option<usize>) {
        self.capacity = capacity;
    }

    /// Relabel (after a method change).
    pub fn set_solver(&mut self, solver: &'static str) {
        self.solver = solver;
    }

    /// Forget the previous solve.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Record one residual norm.
    pub fn record(&mut self, iteration: usize, rnorm: f64) {
        trace!(solver = self.solver, iteration, rnorm, "residual norm");
        if self.capacity.map_or(true, |cap| self.history.len() < cap) {
            self.history.push(rnorm);
        }
    }

    /// Recorded norms, oldest first.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Move the recorded norms out.
    pub fn take_history(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.history)
    }
}
