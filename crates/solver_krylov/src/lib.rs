//! # solver_krylov: Krylov linear solvers for itsolve
//!
//! ## Layer 2 (Linear) Role
//!
//! Provides the [`KrylovSolver`] dispatch object and three methods:
//! - [`Richardson`]: damped fixed-point iteration
//! - [`Tfqmr`]: transpose-free quasi-minimal residual
//! - [`Qcg`]: trust-region constrained conjugate gradients
//!
//! Methods are looked up by name in an explicit [`KrylovRegistry`].
//!
//! ## Usage Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use solver_core::{CsrMatrix, DenseVector, MatStructure, Tolerances};
//! use solver_krylov::{KrylovRegistry, KrylovSolver};
//!
//! let registry = KrylovRegistry::<DenseVector>::with_defaults();
//! let mut ksp = KrylovSolver::with_type(&registry, "tfqmr").unwrap();
//! ksp.set_operators(
//!     Arc::new(CsrMatrix::tridiagonal(10, -1.0, 2.0, -1.0)),
//!     None,
//!     MatStructure::default(),
//! );
//! ksp.set_tolerances(Tolerances::new(1e-8, 1e-50, 200));
//!
//! let b = DenseVector::filled(10, 1.0);
//! let mut x = DenseVector::zeros(10);
//! let result = ksp.solve(&b, &mut x).unwrap();
//! assert!(result.converged());
//! ```

#![deny(missing_docs)]

pub mod qcg;
pub mod registry;
pub mod richardson;
pub mod solver;
pub mod tfqmr;

pub use qcg::Qcg;
pub use registry::{KrylovFactory, KrylovRegistry};
pub use richardson::Richardson;
pub use solver::{ConvergenceJudge, KrylovContext, KrylovMethod, KrylovSolver, MethodOutcome, SolveResult};
pub use tfqmr::Tfqmr;
