//! Nonlinear problem capability.

use std::sync::Arc;

use solver_core::{CapabilityError, LinearOperator, MatStructure, Vector};

/// Jacobian handed back by [`NonlinearFunction::jacobian`].
pub struct JacobianUpdate<V: Vector> {
    /// `J(x)`, used for the linear solve and the line-search slope.
    pub jacobian: Arc<dyn LinearOperator<V>>,
    /// Matrix the preconditioner is built from; `jacobian` when `None`.
    pub preconditioner_matrix: Option<Arc<dyn LinearOperator<V>>>,
    /// Whether the preconditioner must be rebuilt.
    pub structure: MatStructure,
}

impl<V: Vector> JacobianUpdate<V> {
    /// Jacobian that also serves as the preconditioner matrix.
    pub fn new(jacobian: Arc<dyn LinearOperator<V>>) -> Self {
        Self {
            jacobian,
            preconditioner_matrix: None,
            structure: MatStructure::DifferentNonzeroPattern,
        }
    }
}

/// Residual and Jacobian evaluator supplied by the problem owner.
pub trait NonlinearFunction<V: Vector>: Send {
    /// `f ← F(x)`.
    fn residual(&mut self, x: &V, f: &mut V) -> Result<(), CapabilityError>;

    /// Jacobian at `x`.
    fn jacobian(&mut self, x: &V) -> Result<JacobianUpdate<V>, CapabilityError>;
}
