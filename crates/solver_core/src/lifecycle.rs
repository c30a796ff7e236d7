//! Reference-counted object lifecycle.

use crate::error::SolverError;

/// Reference count shared by solver and ordering handles.
///
/// A handle starts with one reference. [`destroy`](Self::destroy) drops one
/// reference and reports whether the object was released; once released,
/// further destroys are no-ops and every other use is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    references: usize,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self { references: 1 }
    }
}

impl Lifecycle {
    /// Live object with one reference.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reference.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::Destroyed`] on a released object.
    pub fn reference(&mut self) -> Result<usize, SolverError> {
        self.ensure_alive()?;
        self.references += 1;
        Ok(self.references)
    }

    /// Drop a reference; returns `true` when this call released the object.
    pub fn destroy(&mut self) -> bool {
        match self.references {
            0 => false,
            1 => {
                self.references = 0;
                true
            }
            _ => {
                self.references -= 1;
                false
            }
        }
    }

    /// Current reference count (0 once released).
    pub fn references(&self) -> usize {
        self.references
    }

    /// `true` until the last reference is destroyed.
    pub fn is_alive(&self) -> bool {
        self.references > 0
    }

    /// Error if the object has been released.
    pub fn ensure_alive(&self) -> Result<(), SolverError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(SolverError::Destroyed)
        }
    }
}
