//! Nonlinear convergence judge.

use solver_core::ConvergedReason;

use crate::options::NonlinearTolerances;

/// Quantities the judge sees after every Newton iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonlinearState {
    /// Completed iterations.
    pub iteration: usize,
    /// `‖x‖`.
    pub xnorm: f64,
    /// Length of the last step.
    pub ynorm: f64,
    /// `‖F(x)‖`.
    pub fnorm: f64,
    /// Residual evaluations so far.
    pub function_evaluations: usize,
}

/// Decides when the Newton iteration stops.
pub trait NonlinearConvergenceTest: Send {
    /// Verdict for `state`; [`ConvergedReason::Iterating`] keeps going.
    fn check(&mut self, state: &NonlinearState, tolerances: &NonlinearTolerances) -> ConvergedReason;
}

impl<F> NonlinearConvergenceTest for F
where
    F: FnMut(&NonlinearState) -> ConvergedReason + Send,
{
    fn check(&mut self, state: &NonlinearState, _tolerances: &NonlinearTolerances) -> ConvergedReason {
        self(state)
    }
}

/// Residual-norm and step-length tests.
///
/// The relative target `rtol·‖F0‖` is fixed at iteration 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNonlinearConvergence {
    target: f64,
}

impl DefaultNonlinearConvergence {
    /// Fresh judge.
    pub fn new() -> Self {
        Self::default()
    }
}

impl NonlinearConvergenceTest for DefaultNonlinearConvergence {
    fn check(&mut self, state: &NonlinearState, tolerances: &NonlinearTolerances) -> ConvergedReason {
        if state.iteration == 0 {
            self.target = state.fnorm * tolerances.rtol;
        }
        if state.fnorm.is_nan() {
            return ConvergedReason::DivergedNaN;
        }
        if state.fnorm < tolerances.atol {
            return ConvergedReason::ConvergedFnormAbs;
        }
        if state.function_evaluations >= tolerances.max_function_evaluations {
            return ConvergedReason::DivergedFunctionCount;
        }
        if state.iteration > 0 {
            if state.fnorm <= self.target {
                return ConvergedReason::ConvergedFnormRelative;
            }
            if state.ynorm < tolerances.xtol * state.xnorm {
                return ConvergedReason::ConvergedStepRelative;
            }
        }
        ConvergedReason::Iterating
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(iteration: usize, fnorm: f64) -> NonlinearState {
        NonlinearState {
            iteration,
            xnorm: 1.0,
            ynorm: 1.0,
            fnorm,
            function_evaluations: iteration + 1,
        }
    }

    #[test]
    fn test_relative_target_fixed_at_start() {
        let tol = NonlinearTolerances::default();
        let mut judge = DefaultNonlinearConvergence::new();
        assert_eq!(judge.check(&state(0, 10.0), &tol), ConvergedReason::Iterating);
        assert_eq!(judge.check(&state(1, 1e-6), &tol), ConvergedReason::Iterating);
        assert_eq!(judge.check(&state(2, 1e-7), &tol), ConvergedReason::ConvergedFnormRelative);
    }

    #[test]
    fn test_absolute_nan_and_count() {
        let tol = NonlinearTolerances {
            atol: 1e-3,
            max_function_evaluations: 3,
            ..Default::default()
        };
        let mut judge = DefaultNonlinearConvergence::new();
        assert_eq!(judge.check(&state(0, 1e-4), &tol), ConvergedReason::ConvergedFnormAbs);
        assert_eq!(judge.check(&state(1, f64::NAN), &tol), ConvergedReason::DivergedNaN);
        assert_eq!(judge.check(&state(2, 1.0), &tol), ConvergedReason::DivergedFunctionCount);
    }

    #[test]
    fn test_step_relative() {
        let tol = NonlinearTolerances::default();
        let mut judge = DefaultNonlinearConvergence::new();
        judge.check(&state(0, 1.0), &tol);
        let tiny_step = NonlinearState {
            ynorm: 1e-10,
            xnorm: 1.0,
            ..state(1, 0.5)
        };
        assert_eq!(judge.check(&tiny_step, &tol), ConvergedReason::ConvergedStepRelative);
    }

    #[test]
    fn test_closure_judge() {
        let mut judge = |s: &NonlinearState| {
            if s.iteration >= 2 {
                ConvergedReason::ConvergedCustom
            } else {
                ConvergedReason::Iterating
            }
        };
        let tol = NonlinearTolerances::default();
        assert!(NonlinearConvergenceTest::check(&mut judge, &state(1, 1.0), &tol).is_iterating());
        assert_eq!(
            NonlinearConvergenceTest::check(&mut judge, &state(2, 1.0), &tol),
            ConvergedReason::ConvergedCustom
        );
    }
}
