//! Serde-backed solver options.
//!
//! Options are resolved before `set_up` and applied with `set_from_options`.
//! Every field has a default, so partial TOML tables are accepted.

use serde::{Deserialize, Serialize};

use crate::convergence::Tolerances;
use crate::error::SolverError;
use crate::preconditioner::PcSide;

/// Options for a linear (Krylov) solver.
///
/// # Example
///
/// ```
/// use solver_core::KrylovOptions;
///
/// let options: KrylovOptions = toml::from_str(r#"
///     ksp_type = "qcg"
///     trust_region_radius = 0.5
///     pc_side = "symmetric"
/// "#).unwrap();
/// assert_eq!(options.ksp_type, "qcg");
/// assert_eq!(options.rtol, 1e-5);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KrylovOptions {
    /// Registered method name (`richardson`, `tfqmr`, `qcg`).
    pub ksp_type: String,
    /// Relative residual tolerance.
    pub rtol: f64,
    /// Absolute residual tolerance.
    pub atol: f64,
    /// Divergence tolerance.
    pub dtol: f64,
    /// Iteration cap.
    pub max_iterations: usize,
    /// Richardson damping factor.
    pub richardson_scale: f64,
    /// QCG trust-region radius; must be positive when given.
    pub trust_region_radius: Option<f64>,
    /// Preconditioning side; the method's default when absent.
    pub pc_side: Option<PcSide>,
    /// Use the incoming solution as the initial guess.
    pub initial_guess_nonzero: bool,
    /// Test the preconditioned residual norm (Richardson).
    pub use_preconditioned_norm: bool,
    /// Number of residual norms to keep; unlimited when absent.
    pub residual_history: Option<usize>,
}

impl Default for KrylovOptions {
    fn default() -> Self {
        let tol = Tolerances::default();
        Self {
            ksp_type: "tfqmr".to_string(),
            rtol: tol.rtol,
            atol: tol.atol,
            dtol: tol.dtol,
            max_iterations: tol.max_iterations,
            richardson_scale: 1.0,
            trust_region_radius: None,
            pc_side: None,
            initial_guess_nonzero: false,
            use_preconditioned_norm: false,
            residual_history: None,
        }
    }
}

impl KrylovOptions {
    /// Tolerances carried by these options.
    pub fn tolerances(&self) -> Tolerances {
        Tolerances {
            rtol: self.rtol,
            atol: self.atol,
            dtol: self.dtol,
            max_iterations: self.max_iterations,
        }
    }

    /// Range-check every value.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidParameter`] for the first bad field.
    pub fn validate(&self) -> Result<(), SolverError> {
        self.tolerances().validate()?;
        if !self.richardson_scale.is_finite() {
            return Err(SolverError::InvalidParameter {
                name: "richardson_scale",
                value: self.richardson_scale.to_string(),
                expected: "finite",
            });
        }
        if let Some(radius) = self.trust_region_radius {
            if !(radius > 0.0) {
                return Err(SolverError::InvalidParameter {
                    name: "trust_region_radius",
                    value: radius.to_string(),
                    expected: "> 0",
                });
            }
        }
        Ok(())
    }
}
