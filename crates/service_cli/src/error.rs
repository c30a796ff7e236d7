//! CLI error types.

use solver_core::SolverError;
use solver_ordering::OrderingError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by `itsolve` commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad configuration file, environment or flags.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Solver usage or capability failure.
    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    /// Ordering construction or translation failure.
    #[error("Ordering error: {0}")]
    Ordering(#[from] OrderingError),

    /// Invalid command argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Solver or ordering description could not be rendered.
    #[error("Failed to render view: {0}")]
    View(#[from] std::fmt::Error),

    /// Report serialisation failure.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Result alias for CLI commands.
pub type Result<T> = std::result::Result<T, CliError>;
