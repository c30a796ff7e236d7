//! # solver_ordering: Application orderings for itsolve
//!
//! ## Layer 2 (Indexing) Role
//!
//! Maps between the solver's native index numbering and an application's
//! own numbering:
//! - [`ApplicationOrdering`]: dispatch object with in-place translation of
//!   raw buffers and [`IndexSet`]s in both directions
//! - [`BasicOrdering`]: explicit permutation tables
//!
//! Negative entries are sentinels and are never translated.

#![deny(missing_docs)]

pub mod basic;
pub mod error;
pub mod index_set;
pub mod ordering;

pub use basic::BasicOrdering;
pub use error::OrderingError;
pub use index_set::IndexSet;
pub use ordering::{ApplicationOrdering, OrderingMap};
