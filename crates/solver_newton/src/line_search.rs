//! Line searches for the Newton update.
//!
//! Every strategy receives the current iterate `x`, its residual `f` and the
//! Newton direction `y` (the solution of `J y = F`), and proposes a new iterate
//! `x − λ y` together with its residual. The backtracking strategies accept
//! a step once
//!
//! ```text
//! ½‖F(x − λy)‖² ≤ ½‖F(x)‖² + α·λ·s,     s = Fᵗ J y  (forced negative)
//! ```
//!
//! and otherwise shrink `λ` by minimising a quadratic (then cubic) model of
//! `½‖F‖²` along the direction, keeping every new `λ` in `[0.1 λ, 0.5 λ]`.

use num_traits::Float;
use solver_core::{CapabilityError, LinearOperator, SolverError, Vector};
use tracing::{debug, trace};

use crate::function::NonlinearFunction;
use crate::options::{LineSearchKind, LineSearchParams, NonlinearTolerances};

fn constant<T: Float>(value: f64) -> T {
    T::from(value).unwrap_or_else(T::nan)
}

/// Slope of `½‖F‖²` used by the sufficient-decrease test.
///
/// `fᵗJy` is negated when positive and replaced by `−1` when zero, so the
/// test always demands a decrease.
pub fn descent_slope<T: Float>(ftjy: T) -> T {
    if ftjy > T::zero() {
        -ftjy
    } else if ftjy == T::zero() {
        -T::one()
    } else {
        ftjy
    }
}

/// `½‖g‖² ≤ ½‖f‖² + α·λ·s`.
pub fn sufficient_decrease<T: Float>(fnorm: T, gnorm: T, lambda: T, slope: T, alpha: T) -> bool {
    let half = constant::<T>(0.5);
    half * gnorm * gnorm <= half * fnorm * fnorm + alpha * lambda * slope
}

/// Minimiser of the quadratic through `½‖f‖²` (slope `s`) and `½‖g‖²` at `λ`.
///
/// ```
/// use solver_newton::line_search::quadratic_minimizer;
///
/// // At λ = 1 this is -s / (g² - f² - 2s).
/// let lambda = quadratic_minimizer(-2.0_f64, 1.0, 1.0, 2.0);
/// assert_eq!(lambda, 2.0 / 7.0);
/// ```
pub fn quadratic_minimizer<T: Float>(slope: T, fnorm: T, lambda: T, gnorm: T) -> T {
    let two = constant::<T>(2.0);
    -slope * lambda * lambda / (gnorm * gnorm - fnorm * fnorm - two * slope * lambda)
}

/// Minimiser of the cubic through `½‖f‖²` (slope `s`) and the two most
/// recent trials `(λ, ‖g‖)` and `(λprev, ‖gprev‖)`.
pub fn cubic_minimizer<T: Float>(
    slope: T,
    fnorm: T,
    lambda: T,
    gnorm: T,
    lambda_prev: T,
    gnorm_prev: T,
) -> T {
    let half = constant::<T>(0.5);
    let two = constant::<T>(2.0);
    let three = constant::<T>(3.0);
    let fsq = fnorm * fnorm;

    let t1 = half * (gnorm * gnorm - fsq) - lambda * slope;
    let t2 = half * (gnorm_prev * gnorm_prev - fsq) - lambda_prev * slope;
    let lsq = lambda * lambda;
    let lpsq = lambda_prev * lambda_prev;
    let a = (t1 / lsq - t2 / lpsq) / (lambda - lambda_prev);
    let b = (-lambda_prev * t1 / lsq + lambda * t2 / lpsq) / (lambda - lambda_prev);
    let d = (b * b - three * a * slope).max(T::zero());
    if a == T::zero() {
        -slope / (two * b)
    } else {
        (-b + d.sqrt()) / (three * a)
    }
}

/// Keep a model minimiser inside `[0.1 λ, 0.5 λ]`.
///
/// Non-finite proposals fall back to `0.1 λ`.
pub fn safeguard_step<T: Float>(proposal: T, lambda: T) -> T {
    let lower = constant::<T>(0.1) * lambda;
    let upper = constant::<T>(0.5) * lambda;
    if !proposal.is_finite() || proposal <= lower {
        lower
    } else {
        proposal.min(upper)
    }
}

/// Hook that may rewrite a proposed iterate (bounds, positivity, ...).
pub trait StepCheck<V: Vector>: Send {
    /// Inspect the proposal `y` next to the current iterate `x`; return
    /// `true` when `y` was modified.
    fn check(&mut self, x: &V, y: &mut V) -> Result<bool, CapabilityError>;
}

impl<V, F> StepCheck<V> for F
where
    V: Vector,
    F: FnMut(&V, &mut V) -> Result<bool, CapabilityError> + Send,
{
    fn check(&mut self, x: &V, y: &mut V) -> Result<bool, CapabilityError> {
        self(x, y)
    }
}

/// Result flag of a line search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearchStatus {
    /// A step was accepted.
    Success,
    /// The step length fell below the tolerance.
    Failure,
}

impl LineSearchStatus {
    /// `0` on success, `-1` on failure.
    pub fn code(&self) -> i32 {
        match self {
            LineSearchStatus::Success => 0,
            LineSearchStatus::Failure => -1,
        }
    }
}

/// What a line search reports back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchOutcome {
    /// Accepted (or last tried) step length.
    pub lambda: f64,
    /// Length of the step actually taken.
    pub ynorm: f64,
    /// `‖F‖` at the new iterate.
    pub gnorm: f64,
    /// `false` when the strategy skipped the norms; `gnorm` then carries the
    /// incoming `‖F‖` and `ynorm` is zero.
    pub norms_computed: bool,
    /// Success flag.
    pub status: LineSearchStatus,
}

/// Vectors handed to a line search.
pub struct LineSearchVectors<'a, V> {
    /// Current iterate.
    pub x: &'a V,
    /// `F(x)`.
    pub f: &'a V,
    /// On entry the Newton direction, on exit the new iterate.
    pub y: &'a mut V,
    /// On exit `F` at the new iterate.
    pub g: &'a mut V,
    /// Scratch.
    pub w: &'a mut V,
}

/// Problem access and parameters for one line search.
pub struct LineSearchContext<'a, V: Vector> {
    /// Residual evaluator.
    pub function: &'a mut dyn NonlinearFunction<V>,
    /// Jacobian at the current iterate.
    pub jacobian: &'a dyn LinearOperator<V>,
    /// Optional iterate check.
    pub step_check: Option<&'a mut dyn StepCheck<V>>,
    /// Backtracking parameters.
    pub params: LineSearchParams,
    /// Directions shorter than this are treated as zero.
    pub atol: f64,
    /// Newton iteration being performed.
    pub iteration: usize,
    /// Newton iteration cap.
    pub max_iterations: usize,
    /// Residual evaluations so far; incremented by [`evaluate`](Self::evaluate).
    pub function_evaluations: usize,
}

impl<'a, V: Vector> LineSearchContext<'a, V> {
    /// Context with default tolerances, no step check and no evaluations yet.
    pub fn new(
        function: &'a mut dyn NonlinearFunction<V>,
        jacobian: &'a dyn LinearOperator<V>,
        params: LineSearchParams,
    ) -> Self {
        let tol = NonlinearTolerances::default();
        Self {
            function,
            jacobian,
            step_check: None,
            params,
            atol: tol.atol,
            iteration: 0,
            max_iterations: tol.max_iterations,
            function_evaluations: 0,
        }
    }

    /// `f ← F(x)`, counted.
    pub fn evaluate(&mut self, x: &V, f: &mut V) -> Result<(), SolverError> {
        self.function_evaluations += 1;
        self.function.residual(x, f)?;
        Ok(())
    }

    /// Run the step check if one is installed.
    pub fn check_step(&mut self, x: &V, y: &mut V) -> Result<bool, SolverError> {
        match self.step_check.as_mut() {
            Some(check) => Ok(check.check(x, y)?),
            None => Ok(false),
        }
    }
}

/// Line-search strategy.
pub trait LineSearch<V: Vector>: Send {
    /// Strategy selector.
    fn kind(&self) -> LineSearchKind;

    /// Registered name.
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Whether the strategy fits the solver configuration.
    fn validate(&self, convergence_test: bool, max_iterations: usize) -> Result<(), SolverError> {
        let _ = (convergence_test, max_iterations);
        Ok(())
    }

    /// Propose the next iterate; see [`LineSearchVectors`] for the data flow.
    fn search(
        &mut self,
        ctx: &mut LineSearchContext<'_, V>,
        vecs: LineSearchVectors<'_, V>,
        fnorm: f64,
    ) -> Result<LineSearchOutcome, SolverError>;
}

/// Full Newton step with norms.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicLineSearch;

impl<V: Vector> LineSearch<V> for BasicLineSearch {
    fn kind(&self) -> LineSearchKind {
        LineSearchKind::Basic
    }

    fn search(
        &mut self,
        ctx: &mut LineSearchContext<'_, V>,
        vecs: LineSearchVectors<'_, V>,
        _fnorm: f64,
    ) -> Result<LineSearchOutcome, SolverError> {
        let LineSearchVectors { x, y, g, w, .. } = vecs;
        let mut ynorm = y.norm2();
        y.aypx(-1.0, x);
        if ctx.check_step(x, y)? {
            w.waxpy(-1.0, x, y);
            ynorm = w.norm2();
        }
        ctx.evaluate(y, g)?;
        Ok(LineSearchOutcome {
            lambda: 1.0,
            ynorm,
            gnorm: g.norm2(),
            norms_computed: true,
            status: LineSearchStatus::Success,
        })
    }
}

/// Full Newton step without norms.
///
/// The residual is not evaluated on the final iteration. Only usable with
/// the convergence judge disabled or a single iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicNoNormsLineSearch;

impl<V: Vector> LineSearch<V> for BasicNoNormsLineSearch {
    fn kind(&self) -> LineSearchKind {
        LineSearchKind::BasicNoNorms
    }

    fn validate(&self, convergence_test: bool, max_iterations: usize) -> Result<(), SolverError> {
        if convergence_test && max_iterations > 1 {
            return Err(SolverError::InvalidParameter {
                name: "line_search",
                value: LineSearchKind::BasicNoNorms.to_string(),
                expected: "convergence test disabled or max_iterations <= 1",
            });
        }
        Ok(())
    }

    fn search(
        &mut self,
        ctx: &mut LineSearchContext<'_, V>,
        vecs: LineSearchVectors<'_, V>,
        fnorm: f64,
    ) -> Result<LineSearchOutcome, SolverError> {
        let LineSearchVectors { x, y, g, .. } = vecs;
        y.aypx(-1.0, x);
        ctx.check_step(x, y)?;
        if ctx.iteration + 1 < ctx.max_iterations {
            ctx.evaluate(y, g)?;
        }
        Ok(LineSearchOutcome {
            lambda: 1.0,
            ynorm: 0.0,
            gnorm: fnorm,
            norms_computed: false,
            status: LineSearchStatus::Success,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Model {
    Quadratic,
    Cubic,
}

/// Backtracking line search with a quadratic or cubic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktrackingLineSearch {
    model: Model,
}

impl Default for BacktrackingLineSearch {
    fn default() -> Self {
        Self::cubic()
    }
}

impl BacktrackingLineSearch {
    /// Quadratic model at every backtrack.
    pub fn quadratic() -> Self {
        Self {
            model: Model::Quadratic,
        }
    }

    /// Quadratic model first, cubic afterwards.
    pub fn cubic() -> Self {
        Self { model: Model::Cubic }
    }
}

impl<V: Vector> LineSearch<V> for BacktrackingLineSearch {
    fn kind(&self) -> LineSearchKind {
        match self.model {
            Model::Quadratic => LineSearchKind::Quadratic,
            Model::Cubic => LineSearchKind::Cubic,
        }
    }

    fn search(
        &mut self,
        ctx: &mut LineSearchContext<'_, V>,
        vecs: LineSearchVectors<'_, V>,
        fnorm: f64,
    ) -> Result<LineSearchOutcome, SolverError> {
        let LineSearchVectors { x, f, y, g, w } = vecs;
        let params = ctx.params;

        let mut ynorm = y.norm2();
        if ynorm < ctx.atol {
            debug!(ynorm, "search direction and size are zero");
            y.copy_from(x);
            g.copy_from(f);
            return Ok(LineSearchOutcome {
                lambda: 0.0,
                ynorm,
                gnorm: fnorm,
                norms_computed: true,
                status: LineSearchStatus::Success,
            });
        }
        if ynorm > params.max_step {
            debug!(ynorm, max_step = params.max_step, "scaling step to maximum length");
            y.scale(params.max_step / ynorm);
            ynorm = params.max_step;
        }
        let min_lambda = params.step_tolerance / ynorm;

        ctx.jacobian.apply(y, w)?;
        let slope = descent_slope(f.dot(w));

        let mut lambda = 1.0;
        w.waxpy(-lambda, y, x);
        ctx.evaluate(w, g)?;
        let mut gnorm = g.norm2();
        let mut previous: Option<(f64, f64)> = None;

        let status = loop {
            if sufficient_decrease(fnorm, gnorm, lambda, slope, params.alpha) {
                break LineSearchStatus::Success;
            }
            if lambda <= min_lambda {
                debug!(lambda, min_lambda, gnorm, "line search step below tolerance");
                break LineSearchStatus::Failure;
            }
            let proposal = match (self.model, previous) {
                (Model::Cubic, Some((lambda_prev, gnorm_prev))) => {
                    cubic_minimizer(slope, fnorm, lambda, gnorm, lambda_prev, gnorm_prev)
                }
                _ => quadratic_minimizer(slope, fnorm, lambda, gnorm),
            };
            previous = Some((lambda, gnorm));
            lambda = safeguard_step(proposal, lambda);
            w.waxpy(-lambda, y, x);
            ctx.evaluate(w, g)?;
            gnorm = g.norm2();
            trace!(lambda, gnorm, "line search trial");
        };

        y.copy_from(w);
        let mut step = lambda * ynorm;
        if status == LineSearchStatus::Success && ctx.check_step(x, y)? {
            ctx.evaluate(y, g)?;
            gnorm = g.norm2();
            w.waxpy(-1.0, x, y);
            step = w.norm2();
        }
        Ok(LineSearchOutcome {
            lambda,
            ynorm: step,
            gnorm,
            norms_computed: true,
            status,
        })
    }
}
