//! # solver_newton: Newton line-search solver for itsolve
//!
//! ## Layer 3 (Nonlinear) Role
//!
//! Solves `F(x) = 0` by Newton's method. The linear system for each
//! direction is handed to a [`solver_krylov::KrylovSolver`]; the step length
//! is chosen by one of four line searches:
//! - `basic`: the full Newton step
//! - `basicnonorms`: the full step without computing norms
//! - `quadratic`: backtracking on a quadratic model
//! - `cubic`: backtracking on a quadratic, then cubic model (default)
//!
//! ## Usage Examples
//!
//! ```rust
//! use solver_core::DenseVector;
//! use solver_krylov::KrylovRegistry;
//! use solver_newton::{LineSearchRegistry, NewtonOptions, NewtonSolver};
//!
//! let mut options = NewtonOptions::default();
//! options.line_search = "quadratic".parse().unwrap();
//! options.linear.ksp_type = "richardson".to_string();
//!
//! let mut snes = NewtonSolver::<DenseVector>::new();
//! snes.set_from_options(
//!     &LineSearchRegistry::with_defaults(),
//!     &KrylovRegistry::with_defaults(),
//!     &options,
//! )
//! .unwrap();
//! assert_eq!(snes.line_search_name(), "quadratic");
//! assert_eq!(snes.ksp().method_name(), "richardson");
//! ```

#![deny(missing_docs)]

pub mod convergence;
pub mod function;
pub mod line_search;
pub mod options;
pub mod registry;
pub mod solver;

pub use convergence::{DefaultNonlinearConvergence, NonlinearConvergenceTest, NonlinearState};
pub use function::{JacobianUpdate, NonlinearFunction};
pub use line_search::{
    BacktrackingLineSearch, BasicLineSearch, BasicNoNormsLineSearch, LineSearch,
    LineSearchContext, LineSearchOutcome, LineSearchStatus, LineSearchVectors, StepCheck,
};
pub use options::{LineSearchKind, LineSearchParams, NewtonOptions, NonlinearTolerances};
pub use registry::{LineSearchFactory, LineSearchRegistry};
pub use solver::{NewtonResult, NewtonSolver};
