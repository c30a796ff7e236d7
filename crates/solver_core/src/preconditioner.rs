//! Preconditioner capability.
//!
//! A preconditioner approximates `A⁻¹`. Krylov methods apply it on the left,
//! on the right, or split symmetrically as `M = Dᵗ D` with the two halves
//! applied separately. Providers that offer a complete Richardson iteration
//! of their own can advertise it through the fast-path hooks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CapabilityError, SolverError};
use crate::operator::LinearOperator;
use crate::vector::{DenseVector, Vector};

/// Side on which the preconditioner is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PcSide {
    /// Solve `M⁻¹ A x = M⁻¹ b`.
    Left,
    /// Solve `A M⁻¹ y = b`, then `x = M⁻¹ y`.
    Right,
    /// Solve `D⁻ᵗ A D⁻¹ y = D⁻ᵗ b`, then `x = D⁻¹ y`.
    Symmetric,
}

impl PcSide {
    /// Lowercase name used in options and views.
    pub fn as_str(&self) -> &'static str {
        match self {
            PcSide::Left => "left",
            PcSide::Right => "right",
            PcSide::Symmetric => "symmetric",
        }
    }
}

impl fmt::Display for PcSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PcSide {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(PcSide::Left),
            "right" => Ok(PcSide::Right),
            "symmetric" => Ok(PcSide::Symmetric),
            _ => Err(SolverError::UnknownType {
                kind: "preconditioner side",
                name: s.to_string(),
            }),
        }
    }
}

fn unsupported(capability: &'static str, provider: &str) -> CapabilityError {
    CapabilityError::Unsupported {
        capability,
        provider: provider.to_string(),
    }
}

/// Approximate inverse applied by the Krylov methods.
pub trait Preconditioner<V: Vector>: Send {
    /// Provider name, used in views and error messages.
    fn name(&self) -> &str;

    /// Build the preconditioner from the preconditioner matrix.
    ///
    /// Called by the solver's `set_up` unless the matrix structure flag says
    /// the preconditioner is unchanged.
    fn set_up(&mut self, pmat: &dyn LinearOperator<V>, template: &V) -> Result<(), CapabilityError> {
        let _ = (pmat, template);
        Ok(())
    }

    /// `y ← M⁻¹ x` (used for both left and right preconditioning).
    fn apply(&self, x: &V, y: &mut V) -> Result<(), CapabilityError>;

    /// `y ← D⁻ᵗ x`, the left half of a symmetric split.
    fn apply_symmetric_left(&self, x: &V, y: &mut V) -> Result<(), CapabilityError> {
        let _ = (x, y);
        Err(unsupported("symmetric left application", self.name()))
    }

    /// `y ← D⁻¹ x`, the right half of a symmetric split.
    fn apply_symmetric_right(&self, x: &V, y: &mut V) -> Result<(), CapabilityError> {
        let _ = (x, y);
        Err(unsupported("symmetric right application", self.name()))
    }

    /// Whether the symmetric halves are implemented.
    fn supports_symmetric(&self) -> bool {
        false
    }

    /// Whether [`apply_richardson`](Self::apply_richardson) is available.
    fn has_richardson_fast_path(&self) -> bool {
        false
    }

    /// Run `max_iterations` Richardson sweeps on `A x = b` directly.
    ///
    /// `work` is scratch space of the solution's size.
    fn apply_richardson(
        &self,
        b: &V,
        x: &mut V,
        work: &mut V,
        max_iterations: usize,
    ) -> Result<(), CapabilityError> {
        let _ = (b, x, work, max_iterations);
        Err(unsupported("richardson fast path", self.name()))
    }
}

/// `M = I`. Supports every side.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPreconditioner;

impl<V: Vector> Preconditioner<V> for IdentityPreconditioner {
    fn name(&self) -> &str {
        "none"
    }

    fn apply(&self, x: &V, y: &mut V) -> Result<(), CapabilityError> {
        y.copy_from(x);
        Ok(())
    }

    fn apply_symmetric_left(&self, x: &V, y: &mut V) -> Result<(), CapabilityError> {
        y.copy_from(x);
        Ok(())
    }

    fn apply_symmetric_right(&self, x: &V, y: &mut V) -> Result<(), CapabilityError> {
        y.copy_from(x);
        Ok(())
    }

    fn supports_symmetric(&self) -> bool {
        true
    }
}

/// Diagonal (Jacobi) preconditioner `M = diag(A)`.
///
/// The symmetric split uses `D = diag(√|A_ii|)`.
#[derive(Debug, Clone, Default)]
pub struct JacobiPreconditioner {
    inv_diag: Vec<f64>,
    inv_sqrt_diag: Vec<f64>,
}

impl JacobiPreconditioner {
    /// Create an empty Jacobi preconditioner; call `set_up` before use.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_ready(&self, len: usize) -> Result<(), CapabilityError> {
        if self.inv_diag.is_empty() && len > 0 {
            return Err(CapabilityError::Failed(
                "jacobi preconditioner used before set_up".to_string(),
            ));
        }
        if self.inv_diag.len() != len {
            return Err(CapabilityError::DimensionMismatch {
                expected: self.inv_diag.len(),
                found: len,
            });
        }
        Ok(())
    }

    fn scale_into(factors: &[f64], x: &DenseVector, y: &mut DenseVector) {
        for ((yi, xi), f) in y.as_mut_slice().iter_mut().zip(x.as_slice()).zip(factors) {
            *yi = xi * f;
        }
    }
}

impl Preconditioner<DenseVector> for JacobiPreconditioner {
    fn name(&self) -> &str {
        "jacobi"
    }

    fn set_up(
        &mut self,
        pmat: &dyn LinearOperator<DenseVector>,
        template: &DenseVector,
    ) -> Result<(), CapabilityError> {
        let mut diag = template.duplicate();
        pmat.diagonal(&mut diag)?;
        if let Some(row) = diag.as_slice().iter().position(|&d| d == 0.0 || !d.is_finite()) {
            return Err(CapabilityError::Failed(format!(
                "jacobi: zero or non-finite diagonal entry in row {}",
                row
            )));
        }
        self.inv_diag = diag.as_slice().iter().map(|d| 1.0 / d).collect();
        self.inv_sqrt_diag = diag.as_slice().iter().map(|d| 1.0 / d.abs().sqrt()).collect();
        Ok(())
    }

    fn apply(&self, x: &DenseVector, y: &mut DenseVector) -> Result<(), CapabilityError> {
        self.ensure_ready(x.len())?;
        Self::scale_into(&self.inv_diag, x, y);
        Ok(())
    }

    fn apply_symmetric_left(&self, x: &DenseVector, y: &mut DenseVector) -> Result<(), CapabilityError> {
        self.ensure_ready(x.len())?;
        Self::scale_into(&self.inv_sqrt_diag, x, y);
        Ok(())
    }

    fn apply_symmetric_right(&self, x: &DenseVector, y: &mut DenseVector) -> Result<(), CapabilityError> {
        self.ensure_ready(x.len())?;
        Self::scale_into(&self.inv_sqrt_diag, x, y);
        Ok(())
    }

    fn supports_symmetric(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{CsrMatrix, DenseMatrix};
    use approx::assert_relative_eq;

    #[test]
    fn test_pc_side_parse_and_display() {
        assert_eq!("Left".parse::<PcSide>().unwrap(), PcSide::Left);
        assert_eq!("symmetric".parse::<PcSide>().unwrap(), PcSide::Symmetric);
        assert!("upper".parse::<PcSide>().is_err());
        assert_eq!(PcSide::Right.to_string(), "right");
    }

    #[test]
    fn test_identity_copies() {
        let pc = IdentityPreconditioner;
        let x = DenseVector::from(vec![1.0, -2.0]);
        let mut y = DenseVector::zeros(2);
        pc.apply_symmetric_left(&x, &mut y).unwrap();
        assert_eq!(y, x);
        assert!(Preconditioner::<DenseVector>::supports_symmetric(&pc));
        assert!(!Preconditioner::<DenseVector>::has_richardson_fast_path(&pc));
    }

    #[test]
    fn test_jacobi_apply_and_split() {
        let a = DenseMatrix::from_diagonal(&[4.0, 9.0]);
        let mut pc = JacobiPreconditioner::new();
        pc.set_up(&a, &DenseVector::zeros(2)).unwrap();

        let x = DenseVector::from(vec![8.0, 9.0]);
        let mut y = DenseVector::zeros(2);
        pc.apply(&x, &mut y).unwrap();
        assert_relative_eq!(y[0], 2.0);
        assert_relative_eq!(y[1], 1.0);

        pc.apply_symmetric_right(&x, &mut y).unwrap();
        assert_relative_eq!(y[0], 4.0);
        assert_relative_eq!(y[1], 3.0);
    }

    #[test]
    fn test_jacobi_rejects_zero_diagonal() {
        let a = CsrMatrix::from_triplets(2, 2, vec![(0, 0, 1.0), (1, 0, 1.0)]).unwrap();
        let mut pc = JacobiPreconditioner::new();
        match pc.set_up(&a, &DenseVector::zeros(2)) {
            Err(CapabilityError::Failed(msg)) => assert!(msg.contains("row 1")),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_jacobi_before_set_up_fails() {
        let pc = JacobiPreconditioner::new();
        let x = DenseVector::zeros(2);
        let mut y = DenseVector::zeros(2);
        assert!(pc.apply(&x, &mut y).is_err());
    }

    #[test]
    fn test_default_fast_path_is_unsupported() {
        let pc = JacobiPreconditioner::new();
        let b = DenseVector::zeros(1);
        let mut x = DenseVector::zeros(1);
        let mut w = DenseVector::zeros(1);
        assert!(matches!(
            pc.apply_richardson(&b, &mut x, &mut w, 3),
            Err(CapabilityError::Unsupported { .. })
        ));
    }
}
