//! Newton solver options and parameter sets.
//!
//! [`NewtonOptions`] is the serde face used by configuration files. It
//! resolves into [`LineSearchParams`] and [`NonlinearTolerances`], which the
//! solver validates before every setup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solver_core::{KrylovOptions, SolverError};

/// Line-search strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineSearchKind {
    /// Full Newton step with norms.
    Basic,
    /// Full Newton step, no norms computed.
    BasicNoNorms,
    /// Backtracking with a quadratic model.
    Quadratic,
    /// Backtracking with a quadratic then cubic model.
    #[default]
    Cubic,
}

impl LineSearchKind {
    /// Every selectable strategy.
    pub const ALL: [LineSearchKind; 4] = [
        LineSearchKind::Basic,
        LineSearchKind::BasicNoNorms,
        LineSearchKind::Quadratic,
        LineSearchKind::Cubic,
    ];

    /// Registered name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineSearchKind::Basic => "basic",
            LineSearchKind::BasicNoNorms => "basicnonorms",
            LineSearchKind::Quadratic => "quadratic",
            LineSearchKind::Cubic => "cubic",
        }
    }
}

impl fmt::Display for LineSearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LineSearchKind {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| SolverError::UnknownType {
                kind: "line search",
                name: s.to_string(),
            })
    }
}

/// Parameters shared by the backtracking line searches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchParams {
    /// Sufficient-decrease scalar.
    pub alpha: f64,
    /// Longest allowed step; longer directions are scaled down.
    pub max_step: f64,
    /// Relative step-length floor; the search fails below it.
    pub step_tolerance: f64,
}

impl Default for LineSearchParams {
    fn default() -> Self {
        Self {
            alpha: 1e-4,
            max_step: 1e8,
            step_tolerance: 1e-12,
        }
    }
}

impl LineSearchParams {
    /// Range-check the parameters.
    pub fn validate(&self) -> Result<(), SolverError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(invalid("alpha", self.alpha, "in (0, 1)"));
        }
        if !(self.max_step > 0.0) {
            return Err(invalid("max_step", self.max_step, "> 0"));
        }
        if !(self.step_tolerance > 0.0) {
            return Err(invalid("step_tolerance", self.step_tolerance, "> 0"));
        }
        Ok(())
    }
}

/// Stopping parameters of the nonlinear iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonlinearTolerances {
    /// Relative decrease of `‖F‖`.
    pub rtol: f64,
    /// Absolute `‖F‖` threshold.
    pub atol: f64,
    /// Relative step-length threshold.
    pub xtol: f64,
    /// Newton iteration cap.
    pub max_iterations: usize,
    /// Residual evaluation cap.
    pub max_function_evaluations: usize,
}

impl Default for NonlinearTolerances {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-50,
            xtol: 1e-8,
            max_iterations: 50,
            max_function_evaluations: 10_000,
        }
    }
}

impl NonlinearTolerances {
    /// Range-check the tolerances.
    pub fn validate(&self) -> Result<(), SolverError> {
        if !(0.0..1.0).contains(&self.rtol) {
            return Err(invalid("rtol", self.rtol, "in [0, 1)"));
        }
        if !(self.atol >= 0.0) {
            return Err(invalid("atol", self.atol, ">= 0"));
        }
        if !(self.xtol >= 0.0) {
            return Err(invalid("xtol", self.xtol, ">= 0"));
        }
        if self.max_function_evaluations == 0 {
            return Err(SolverError::InvalidParameter {
                name: "max_function_evaluations",
                value: "0".to_string(),
                expected: ">= 1",
            });
        }
        Ok(())
    }
}

fn invalid(name: &'static str, value: f64, expected: &'static str) -> SolverError {
    SolverError::InvalidParameter {
        name,
        value: value.to_string(),
        expected,
    }
}

/// Options for the Newton solver and its inner linear solver.
///
/// # Example
///
/// ```
/// use solver_newton::{LineSearchKind, NewtonOptions};
///
/// let options: NewtonOptions = toml::from_str(r#"
///     line_search = "quadratic"
///     max_iterations = 20
///
///     [linear]
///     ksp_type = "richardson"
/// "#).unwrap();
/// assert_eq!(options.line_search, LineSearchKind::Quadratic);
/// assert_eq!(options.alpha, 1e-4);
/// assert_eq!(options.linear.ksp_type, "richardson");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonOptions {
    /// Line-search strategy.
    pub line_search: LineSearchKind,
    /// Sufficient-decrease scalar.
    pub alpha: f64,
    /// Longest allowed step.
    pub max_step: f64,
    /// Relative step-length floor.
    pub step_tolerance: f64,
    /// Relative residual tolerance.
    pub rtol: f64,
    /// Absolute residual tolerance.
    pub atol: f64,
    /// Relative step tolerance.
    pub xtol: f64,
    /// Newton iteration cap.
    pub max_iterations: usize,
    /// Residual evaluation cap.
    pub max_function_evaluations: usize,
    /// Run the convergence judge; `false` iterates to the budget.
    pub convergence_test: bool,
    /// Inner linear solver.
    pub linear: KrylovOptions,
}

impl Default for NewtonOptions {
    fn default() -> Self {
        let params = LineSearchParams::default();
        let tol = NonlinearTolerances::default();
        Self {
            line_search: LineSearchKind::default(),
            alpha: params.alpha,
            max_step: params.max_step,
            step_tolerance: params.step_tolerance,
            rtol: tol.rtol,
            atol: tol.atol,
            xtol: tol.xtol,
            max_iterations: tol.max_iterations,
            max_function_evaluations: tol.max_function_evaluations,
            convergence_test: true,
            linear: KrylovOptions::default(),
        }
    }
}

impl NewtonOptions {
    /// Line-search parameters carried by these options.
    pub fn line_search_params(&self) -> LineSearchParams {
        LineSearchParams {
            alpha: self.alpha,
            max_step: self.max_step,
            step_tolerance: self.step_tolerance,
        }
    }

    /// Nonlinear tolerances carried by these options.
    pub fn tolerances(&self) -> NonlinearTolerances {
        NonlinearTolerances {
            rtol: self.rtol,
            atol: self.atol,
            xtol: self.xtol,
            max_iterations: self.max_iterations,
            max_function_evaluations: self.max_function_evaluations,
        }
    }

    /// Range-check every value, including the inner linear options.
    pub fn validate(&self) -> Result<(), SolverError> {
        self.line_search_params().validate()?;
        self.tolerances().validate()?;
        self.linear.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = NewtonOptions::default();
        assert_eq!(options.line_search, LineSearchKind::Cubic);
        assert_eq!(options.max_iterations, 50);
        assert_eq!(options.max_function_evaluations, 10_000);
        assert_eq!(options.step_tolerance, 1e-12);
        assert!(options.convergence_test);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("BasicNoNorms".parse::<LineSearchKind>().unwrap(), LineSearchKind::BasicNoNorms);
        assert_eq!(LineSearchKind::Quadratic.to_string(), "quadratic");
        match "wolfe".parse::<LineSearchKind>() {
            Err(SolverError::UnknownType { kind, name }) => {
                assert_eq!(kind, "line search");
                assert_eq!(name, "wolfe");
            }
            other => panic!("Expected UnknownType, got {:?}", other),
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&LineSearchKind::BasicNoNorms).unwrap();
        assert_eq!(json, "\"basicnonorms\"");
    }

    #[test]
    fn test_partial_toml() {
        let options: NewtonOptions = toml::from_str("alpha = 0.001\nconvergence_test = false").unwrap();
        assert_eq!(options.alpha, 0.001);
        assert!(!options.convergence_test);
        assert_eq!(options.linear, KrylovOptions::default());
    }

    #[test]
    fn test_validation() {
        let mut options = NewtonOptions::default();
        options.alpha = 1.5;
        assert!(matches!(
            options.validate(),
            Err(SolverError::InvalidParameter { name: "alpha", .. })
        ));

        let mut options = NewtonOptions::default();
        options.linear.rtol = 2.0;
        assert!(options.validate().is_err());

        let tol = NonlinearTolerances {
            max_function_evaluations: 0,
            ..Default::default()
        };
        assert!(tol.validate().is_err());
    }
}
