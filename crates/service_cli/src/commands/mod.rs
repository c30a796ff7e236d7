//! CLI command implementations
//!
//! Each submodule implements one `itsolve` subcommand as an `execute`
//! function returning a serialisable report, plus a `run` wrapper that
//! prints it.

pub mod linear;
pub mod newton;
pub mod ordering;
pub mod output;
pub mod trust_region;
pub mod types;

use solver_core::{DenseVector, IdentityPreconditioner, JacobiPreconditioner, Preconditioner};

use crate::{CliError, Result};

/// Preconditioners selectable with `--pc`.
pub const PRECONDITIONERS: [&str; 2] = ["none", "jacobi"];

/// Build the preconditioner named on the command line.
pub fn preconditioner(name: &str) -> Result<Box<dyn Preconditioner<DenseVector>>> {
    match name {
        "none" => Ok(Box::new(IdentityPreconditioner)),
        "jacobi" => Ok(Box::new(JacobiPreconditioner::new())),
        other => Err(CliError::InvalidArgument(format!(
            "Unknown preconditioner: {}. Supported: none, jacobi",
            other
        ))),
    }
}

/// Parse a comma-separated list of signed indices.
pub fn parse_index_list(list: &str) -> Result<Vec<i64>> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<i64>()
                .map_err(|_| CliError::InvalidArgument(format!("Invalid index: {}", item)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index_list() {
        assert_eq!(parse_index_list("3, 1,0,-1").unwrap(), vec![3, 1, 0, -1]);
        assert_eq!(parse_index_list("").unwrap(), Vec::<i64>::new());
        match parse_index_list("1,x") {
            Err(CliError::InvalidArgument(msg)) => assert!(msg.contains('x')),
            other => panic!("Expected InvalidArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_preconditioner_lookup() {
        for name in PRECONDITIONERS {
            assert_eq!(preconditioner(name).unwrap().name(), name);
        }
        assert!(matches!(preconditioner("ilu"), Err(CliError::InvalidArgument(_))));
    }
}
