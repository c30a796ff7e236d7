//! Error types for structured error handling.
//!
//! This module provides:
//! - `CapabilityError`: Failures raised by external capabilities (operators,
//!   preconditioners, residual and Jacobian evaluators)
//! - `SolverError`: Usage errors raised by solver objects, plus transparent
//!   propagation of capability failures
//!
//! Numerical breakdown and line-search failure are not errors: they surface
//! as a terminal [`ConvergedReason`](crate::ConvergedReason) on the result.

use thiserror::Error;

/// Failure reported by an external numeric capability.
///
/// Operators, preconditioners and nonlinear function evaluators return this
/// type. Solvers never swallow it: it is wrapped into
/// [`SolverError::Capability`] and returned to the caller unchanged.
///
/// # Examples
/// ```
/// use solver_core::CapabilityError;
///
/// let err = CapabilityError::Unsupported {
///     capability: "symmetric application",
///     provider: "sor".to_string(),
/// };
/// assert!(format!("{}", err).contains("symmetric application"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    /// The provider does not implement the requested operation.
    #[error("Capability '{capability}' is not supported by {provider}")]
    Unsupported {
        /// Name of the missing operation
        capability: &'static str,
        /// Name of the provider that was asked
        provider: String,
    },

    /// Vector or operator sizes are inconsistent.
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected length
        expected: usize,
        /// Length actually supplied
        found: usize,
    },

    /// The capability failed for a provider-specific reason.
    #[error("Capability failure: {0}")]
    Failed(String),
}

/// Errors from solver setup and solve operations.
///
/// # Variants
/// - `InvalidParameter`: A configuration value is out of range
/// - `UnsupportedPcSide`: The method cannot use the requested preconditioning side
/// - `UnknownType`: A registry lookup failed
/// - `NotConfigured`: A required collaborator (operator, trust-region radius, ...) is missing
/// - `DimensionMismatch`: Vector lengths disagree with the set-up sizes
/// - `Destroyed`: The handle was used after its last reference was destroyed
/// - `Capability`: An external capability failed
///
/// # Examples
/// ```
/// use solver_core::SolverError;
///
/// let err = SolverError::InvalidParameter {
///     name: "trust_region_radius",
///     value: "0".to_string(),
///     expected: "> 0",
/// };
/// assert!(format!("{}", err).contains("trust_region_radius"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// A configuration value is outside its valid range.
    #[error("Invalid parameter: {name} = {value} (expected {expected})")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Offending value, formatted
        value: String,
        /// Description of the valid range
        expected: &'static str,
    },

    /// The preconditioning side is not supported by the method.
    #[error("Method {method} does not support {side} preconditioning")]
    UnsupportedPcSide {
        /// Method name
        method: &'static str,
        /// Requested side, formatted
        side: String,
    },

    /// No factory is registered under the requested name.
    #[error("Unknown {kind} type: {name}")]
    UnknownType {
        /// Registry kind (e.g. "Krylov method")
        kind: &'static str,
        /// Requested name
        name: String,
    },

    /// A required collaborator or value has not been supplied.
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Vector lengths disagree with the sizes fixed at setup.
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Length fixed at setup
        expected: usize,
        /// Length supplied
        found: usize,
    },

    /// The object has already been destroyed.
    #[error("Object has been destroyed")]
    Destroyed,

    /// An external capability failed; propagated unchanged.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}
