//! Error types for application orderings.

use solver_core::SolverError;
use thiserror::Error;

/// Ordering construction and translation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderingError {
    /// Block index sets have no translation.
    #[error("Cannot translate block index sets")]
    BlockIndexSet,

    /// Non-negative index outside `0..size`.
    #[error("Index {index} out of range for ordering of size {size}")]
    OutOfRange {
        /// Offending entry
        index: i64,
        /// Number of elements in the ordering
        size: usize,
    },

    /// Input table is not a permutation of `0..size`.
    #[error("{which} indices are not a permutation of 0..{size}: {reason}")]
    NotPermutation {
        /// `"application"` or `"native"`
        which: &'static str,
        /// Expected size
        size: usize,
        /// First violation found
        reason: String,
    },

    /// Application and native tables differ in length.
    #[error("Length mismatch: {application} application indices, {native} native indices")]
    LengthMismatch {
        /// Application table length
        application: usize,
        /// Native table length
        native: usize,
    },

    /// Lifecycle violation, e.g. use after destroy.
    #[error(transparent)]
    Solver(#[from] SolverError),
}
