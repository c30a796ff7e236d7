//! Numeric container capability.
//!
//! Every solver in the workspace manipulates vectors exclusively through the
//! [`Vector`] trait, so distributed or GPU-backed containers can be plugged in
//! without touching the algorithms. [`DenseVector`] is the reference
//! implementation used by tests, benchmarks and the CLI.

use std::fmt;
use std::ops::{Index, IndexMut};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Vector operations consumed by the iterative solvers.
///
/// Reductions (`dot`, `norm2`) are collective in a distributed setting: all
/// processes holding pieces of the vector must call them in the same order.
///
/// Length mismatches between operands are programming errors; solvers
/// validate sizes once at setup and implementations may panic on mismatch.
pub trait Vector: Clone + fmt::Debug + Send + Sync + 'static {
    /// Global length of the vector.
    fn len(&self) -> usize;

    /// Returns `true` if the vector has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// New zero vector with the same layout as `self`.
    fn duplicate(&self) -> Self;

    /// Inner product `selfᵗ other`.
    fn dot(&self, other: &Self) -> f64;

    /// Euclidean norm.
    fn norm2(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// `self ← alpha · self`.
    fn scale(&mut self, alpha: f64);

    /// Set every entry to `value`.
    fn set(&mut self, value: f64);

    /// `self ← src`.
    fn copy_from(&mut self, src: &Self);

    /// `self ← self + alpha · x`.
    fn axpy(&mut self, alpha: f64, x: &Self);

    /// `self ← x + alpha · self`.
    fn aypx(&mut self, alpha: f64, x: &Self);

    /// `self ← alpha · x + y`.
    fn waxpy(&mut self, alpha: f64, x: &Self, y: &Self);
}

/// Minimum length before the `parallel` feature switches to rayon.
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 4096;

/// Contiguous, heap-allocated `f64` vector.
///
/// # Example
///
/// ```
/// use solver_core::{DenseVector, Vector};
///
/// let mut y = DenseVector::from(vec![1.0, 2.0]);
/// let x = DenseVector::from(vec![3.0, 4.0]);
/// y.axpy(2.0, &x);
/// assert_eq!(y.as_slice(), &[7.0, 10.0]);
/// assert_eq!(x.norm2(), 5.0);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DenseVector {
    data: Vec<f64>,
}

impl DenseVector {
    /// Zero vector of length `n`.
    pub fn zeros(n: usize) -> Self {
        Self {
            data: vec![0.0; n],
        }
    }

    /// Vector of length `n` filled with `value`.
    pub fn filled(n: usize, value: f64) -> Self {
        Self {
            data: vec![value; n],
        }
    }

    /// Borrow the entries.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutably borrow the entries.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Consume the vector and return its entries.
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    #[inline]
    fn check_len(&self, other: usize) {
        assert_eq!(
            self.data.len(),
            other,
            "DenseVector: length mismatch ({} vs {})",
            self.data.len(),
            other
        );
    }
}

impl From<Vec<f64>> for DenseVector {
    fn from(data: Vec<f64>) -> Self {
        Self { data }
    }
}

impl From<&[f64]> for DenseVector {
    fn from(data: &[f64]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }
}

impl Index<usize> for DenseVector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.data[i]
    }
}

impl IndexMut<usize> for DenseVector {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.data[i]
    }
}

impl Vector for DenseVector {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn duplicate(&self) -> Self {
        Self::zeros(self.data.len())
    }

    fn dot(&self, other: &Self) -> f64 {
        self.check_len(other.len());
        #[cfg(feature = "parallel")]
        if self.data.len() >= PARALLEL_THRESHOLD {
            return self
                .data
                .par_iter()
                .zip(other.data.par_iter())
                .map(|(a, b)| a * b)
                .sum();
        }
        self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum()
    }

    fn scale(&mut self, alpha: f64) {
        #[cfg(feature = "parallel")]
        if self.data.len() >= PARALLEL_THRESHOLD {
            self.data.par_iter_mut().for_each(|v| *v *= alpha);
            return;
        }
        self.data.iter_mut().for_each(|v| *v *= alpha);
    }

    fn set(&mut self, value: f64) {
        self.data.fill(value);
    }

    fn copy_from(&mut self, src: &Self) {
        self.check_len(src.len());
        self.data.copy_from_slice(&src.data);
    }

    fn axpy(&mut self, alpha: f64, x: &Self) {
        self.check_len(x.len());
        #[cfg(feature = "parallel")]
        if self.data.len() >= PARALLEL_THRESHOLD {
            self.data
                .par_iter_mut()
                .zip(x.data.par_iter())
                .for_each(|(s, xi)| *s += alpha * xi);
            return;
        }
        for (s, xi) in self.data.iter_mut().zip(&x.data) {
            *s += alpha * xi;
        }
    }

    fn aypx(&mut self, alpha: f64, x: &Self) {
        self.check_len(x.len());
        #[cfg(feature = "parallel")]
        if self.data.len() >= PARALLEL_THRESHOLD {
            self.data
                .par_iter_mut()
                .zip(x.data.par_iter())
                .for_each(|(s, xi)| *s = xi + alpha * *s);
            return;
        }
        for (s, xi) in self.data.iter_mut().zip(&x.data) {
            *s = xi + alpha * *s;
        }
    }

    fn waxpy(&mut self, alpha: f64, x: &Self, y: &Self) {
        self.check_len(x.len());
        self.check_len(y.len());
        #[cfg(feature = "parallel")]
        if self.data.len() >= PARALLEL_THRESHOLD {
            self.data
                .par_iter_mut()
                .zip(x.data.par_iter().zip(y.data.par_iter()))
                .for_each(|(w, (xi, yi))| *w = alpha * xi + yi);
            return;
        }
        for ((w, xi), yi) in self.data.iter_mut().zip(&x.data).zip(&y.data) {
            *w = alpha * xi + yi;
        }
    }
}
