//! Reusable work vectors.
//!
//! A solver declares how many vectors it needs; they are allocated once at
//! setup, sized like the solution, and borrowed by role for every solve.
//! Nothing is allocated mid-solve.

use crate::error::SolverError;
use crate::vector::Vector;

/// Fixed set of work vectors owned by one solver instance.
///
/// # Example
///
/// ```
/// use solver_core::{DenseVector, Vector, WorkVectors};
///
/// let mut work = WorkVectors::new();
/// work.allocate(&DenseVector::zeros(4), 2);
/// let [r, z] = work.as_array_mut::<2>().unwrap();
/// r.set(1.0);
/// z.copy_from(r);
/// assert_eq!(z.norm2(), 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct WorkVectors<V> {
    vectors: Vec<V>,
}

impl<V> Default for WorkVectors<V> {
    fn default() -> Self {
        Self {
            vectors: Vec::new(),
        }
    }
}

impl<V: Vector> WorkVectors<V> {
    /// Empty set; nothing is allocated until [`allocate`](Self::allocate).
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `count` zero vectors shaped like `template`.
    ///
    /// Returns `false` without reallocating when the current set already
    /// matches in count and length.
    pub fn allocate(&mut self, template: &V, count: usize) -> bool {
        if self.vectors.len() == count && self.vector_len() == Some(template.len()) {
            return false;
        }
        self.vectors = (0..count).map(|_| template.duplicate()).collect();
        true
    }

    /// Number of allocated vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// `true` before allocation or after release.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Length of each vector, if any are allocated.
    pub fn vector_len(&self) -> Option<usize> {
        self.vectors.first().map(Vector::len)
    }

    /// Borrow the vector at `index`.
    pub fn get(&self, index: usize) -> Option<&V> {
        self.vectors.get(index)
    }

    /// Borrow the first `N` vectors for destructuring by role.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::NotConfigured`] if fewer than `N` vectors are
    /// allocated (setup was skipped).
    pub fn as_array_mut<const N: usize>(&mut self) -> Result<&mut [V; N], SolverError> {
        let available = self.vectors.len();
        self.vectors
            .get_mut(..N)
            .and_then(|slice| <&mut [V; N]>::try_from(slice).ok())
            .ok_or_else(|| {
                SolverError::NotConfigured(format!(
                    "{} work vectors requested, {} allocated",
                    N, available
                ))
            })
    }

    /// Drop every vector.
    pub fn release(&mut self) {
        self.vectors.clear();
    }
}
