//! # solver_core: Foundation for the itsolve iterative-solver runtime
//!
//! ## Layer 1 (Foundation) Role
//!
//! solver_core holds everything the solver crates share:
//! - Numeric container and operator capabilities (`vector`, `operator`)
//! - Preconditioner capability with identity and Jacobi providers (`preconditioner`)
//! - Termination reasons, tolerances and convergence judges (`convergence`)
//! - Work-vector arena, reference-counted lifecycle and registries
//!   (`workspace`, `lifecycle`, `registry`)
//! - Error taxonomy (`error`) and serde option structs (`options`)
//!
//! Solvers are generic over [`Vector`]; [`DenseVector`], [`DenseMatrix`] and
//! [`CsrMatrix`] are reference implementations for tests and small problems.
//!
//! ## Usage Examples
//!
//! ```rust
//! use solver_core::{
//!     ConvergedReason, ConvergenceTest, DefaultConvergence, DenseVector, Tolerances, Vector,
//! };
//!
//! let r = DenseVector::from(vec![3.0, 4.0]);
//! let mut judge = DefaultConvergence::new();
//! let tol = Tolerances::new(1e-5, 1e-10, 100);
//! assert_eq!(judge.check(0, r.norm2(), &tol), ConvergedReason::Iterating);
//! assert_eq!(judge.check(1, 1e-12, &tol), ConvergedReason::ConvergedAtol);
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel` (default): rayon-backed reductions in [`DenseVector`] for long vectors

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod convergence;
pub mod error;
pub mod lifecycle;
pub mod operator;
pub mod options;
pub mod preconditioner;
pub mod registry;
pub mod vector;
pub mod view;
pub mod workspace;

pub use convergence::{
    ConvergedReason, ConvergenceMonitor, ConvergenceTest, DefaultConvergence, SkipConvergence,
    Tolerances,
};
pub use error::{CapabilityError, SolverError};
pub use lifecycle::Lifecycle;
pub use operator::{CsrMatrix, DenseMatrix, LinearOperator, MatStructure};
pub use options::KrylovOptions;
pub use preconditioner::{IdentityPreconditioner, JacobiPreconditioner, PcSide, Preconditioner};
pub use registry::Registry;
pub use vector::{DenseVector, Vector};
pub use view::Viewer;
pub use workspace::WorkVectors;
