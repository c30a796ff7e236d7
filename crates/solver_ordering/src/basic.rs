//! Basic ordering: both permutation tables held in full on every process.

use std::fmt;

use solver_core::Viewer;

use crate::error::OrderingError;
use crate::ordering::OrderingMap;

/// Explicit permutation between native and application numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicOrdering {
    application_of_native: Vec<i64>,
    native_of_application: Vec<i64>,
}

fn check_permutation(which: &'static str, indices: &[i64]) -> Result<(), OrderingError> {
    let size = indices.len();
    let mut seen = vec![false; size];
    for (position, &index) in indices.iter().enumerate() {
        if index < 0 || index as usize >= size {
            return Err(OrderingError::NotPermutation {
                which,
                size,
                reason: format!("entry {} at position {} is out of range", index, position),
            });
        }
        if std::mem::replace(&mut seen[index as usize], true) {
            return Err(OrderingError::NotPermutation {
                which,
                size,
                reason: format!("entry {} repeats at position {}", index, position),
            });
        }
    }
    Ok(())
}

impl BasicOrdering {
    /// Registered name.
    pub const NAME: &'static str = "basic";

    /// Ordering where native index `native[i]` corresponds to application
    /// index `application[i]`. `native` defaults to `0..n`.
    ///
    /// # Errors
    ///
    /// - [`OrderingError::LengthMismatch`] when the tables differ in length
    /// - [`OrderingError::NotPermutation`] when either table is not a
    ///   permutation of `0..n`
    pub fn new(application: &[i64], native: Option<&[i64]>) -> Result<Self, OrderingError> {
        let n = application.len();
        let identity: Vec<i64>;
        let native = match native {
            Some(native) => native,
            None => {
                identity = (0..n as i64).collect();
                &identity
            }
        };
        if native.len() != n {
            return Err(OrderingError::LengthMismatch {
                application: n,
                native: native.len(),
            });
        }
        check_permutation("application", application)?;
        check_permutation("native", native)?;

        let mut application_of_native = vec![0; n];
        let mut native_of_application = vec![0; n];
        for (&nat, &app) in native.iter().zip(application) {
            application_of_native[nat as usize] = app;
            native_of_application[app as usize] = nat;
        }
        Ok(Self {
            application_of_native,
            native_of_application,
        })
    }

    /// Application index of every native index.
    pub fn application_of_native(&self) -> &[i64] {
        &self.application_of_native
    }
}

impl OrderingMap for BasicOrdering {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        self.application_of_native.len()
    }

    fn native_to_application(&self, index: usize) -> i64 {
        self.application_of_native[index]
    }

    fn application_to_native(&self, index: usize) -> i64 {
        self.native_of_application[index]
    }

    fn view(&self, viewer: &mut Viewer<'_>) -> fmt::Result {
        viewer.line(format_args!("Number of elements in ordering {}", self.size()))?;
        viewer.line(format_args!("{:>6}  {:>11}", "native", "application"))?;
        for (native, application) in self.application_of_native.iter().enumerate() {
            viewer.line(format_args!("{:>6}  {:>11}", native, application))?;
        }
        Ok(())
    }
}
