//! Linear operator capability and reference matrix formats.
//!
//! Solvers only ever call [`LinearOperator::apply`] (and, for the Jacobi
//! preconditioner, [`LinearOperator::diagonal`]). Storage layout is the
//! provider's business; [`DenseMatrix`] and [`CsrMatrix`] are provided for
//! tests, benchmarks and small problems.

use crate::error::CapabilityError;
use crate::vector::{DenseVector, Vector};

/// How the preconditioner matrix changed since the previous `set_operators`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatStructure {
    /// Values changed, nonzero pattern unchanged.
    SameNonzeroPattern,
    /// Values and nonzero pattern may both have changed.
    #[default]
    DifferentNonzeroPattern,
    /// Reuse the existing preconditioner without rebuilding it.
    SamePreconditioner,
}

/// Matrix-vector product capability: `y ← A x`.
pub trait LinearOperator<V: Vector>: Send + Sync {
    /// Number of rows.
    fn rows(&self) -> usize;

    /// Number of columns.
    fn cols(&self) -> usize;

    /// Compute `y ← A x`.
    ///
    /// # Errors
    ///
    /// Provider-specific failures are returned as [`CapabilityError`] and
    /// abort the calling solve.
    fn apply(&self, x: &V, y: &mut V) -> Result<(), CapabilityError>;

    /// Write the main diagonal into `d`.
    ///
    /// Operators that cannot expose their diagonal (matrix-free operators,
    /// for example) keep the default, which reports the capability as
    /// unsupported.
    fn diagonal(&self, d: &mut V) -> Result<(), CapabilityError> {
        let _ = d;
        Err(CapabilityError::Unsupported {
            capability: "diagonal extraction",
            provider: "operator".to_string(),
        })
    }
}

fn check_dims(expected: usize, found: usize) -> Result<(), CapabilityError> {
    if expected != found {
        return Err(CapabilityError::DimensionMismatch { expected, found });
    }
    Ok(())
}

/// Row-major dense matrix.
///
/// # Example
///
/// ```
/// use solver_core::{DenseMatrix, DenseVector, LinearOperator};
///
/// let a = DenseMatrix::scaled_identity(2, 2.0);
/// let x = DenseVector::from(vec![1.0, 3.0]);
/// let mut y = DenseVector::zeros(2);
/// a.apply(&x, &mut y).unwrap();
/// assert_eq!(y.as_slice(), &[2.0, 6.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    /// Build a matrix from row-major entries.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::DimensionMismatch`] when
    /// `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, CapabilityError> {
        check_dims(rows * cols, data.len())?;
        Ok(Self { rows, cols, data })
    }

    /// Build a matrix from a list of equally long rows.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::DimensionMismatch`] on ragged input.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, CapabilityError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            check_dims(cols, row.len())?;
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// `n × n` identity.
    pub fn identity(n: usize) -> Self {
        Self::scaled_identity(n, 1.0)
    }

    /// `n × n` identity scaled by `s`.
    pub fn scaled_identity(n: usize, s: f64) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = s;
        }
        Self {
            rows: n,
            cols: n,
            data,
        }
    }

    /// Square diagonal matrix.
    pub fn from_diagonal(diag: &[f64]) -> Self {
        let n = diag.len();
        let mut m = Self::scaled_identity(n, 0.0);
        for (i, &d) in diag.iter().enumerate() {
            m.data[i * n + i] = d;
        }
        m
    }

    /// Entry `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    /// Overwrite entry `(i, j)`.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.cols + j] = value;
    }
}

impl LinearOperator<DenseVector> for DenseMatrix {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn apply(&self, x: &DenseVector, y: &mut DenseVector) -> Result<(), CapabilityError> {
        check_dims(self.cols, x.len())?;
        check_dims(self.rows, y.len())?;
        let xs = x.as_slice();
        for (yi, row) in y
            .as_mut_slice()
            .iter_mut()
            .zip(self.data.chunks_exact(self.cols.max(1)))
        {
            *yi = row.iter().zip(xs).map(|(a, b)| a * b).sum();
        }
        Ok(())
    }

    fn diagonal(&self, d: &mut DenseVector) -> Result<(), CapabilityError> {
        check_dims(self.rows.min(self.cols), d.len())?;
        for (i, di) in d.as_mut_slice().iter_mut().enumerate() {
            *di = self.get(i, i);
        }
        Ok(())
    }
}

/// Compressed sparse row matrix.
///
/// # Example
///
/// ```
/// use solver_core::{CsrMatrix, DenseVector, LinearOperator};
///
/// let a = CsrMatrix::tridiagonal(3, -1.0, 2.0, -1.0);
/// assert_eq!(a.nnz(), 7);
/// let x = DenseVector::filled(3, 1.0);
/// let mut y = DenseVector::zeros(3);
/// a.apply(&x, &mut y).unwrap();
/// assert_eq!(y.as_slice(), &[1.0, 0.0, 1.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    /// Row pointers: row `i` occupies `row_ptr[i]..row_ptr[i + 1]`.
    pub row_ptr: Vec<usize>,
    /// Column index of each stored entry.
    pub col_indices: Vec<usize>,
    /// Value of each stored entry.
    pub values: Vec<f64>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl CsrMatrix {
    /// Assemble from `(row, col, value)` triplets; duplicates are summed.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Failed`] for an out-of-range triplet.
    pub fn from_triplets(
        rows: usize,
        cols: usize,
        mut triplets: Vec<(usize, usize, f64)>,
    ) -> Result<Self, CapabilityError> {
        if let Some(&(r, c, _)) = triplets.iter().find(|&&(r, c, _)| r >= rows || c >= cols) {
            return Err(CapabilityError::Failed(format!(
                "entry ({}, {}) outside {}x{} matrix",
                r, c, rows, cols
            )));
        }
        triplets.sort_by_key(|&(r, c, _)| (r, c));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_indices = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;
        for (r, c, v) in triplets {
            if last == Some((r, c)) {
                if let Some(slot) = values.last_mut() {
                    *slot += v;
                }
                continue;
            }
            col_indices.push(c);
            values.push(v);
            row_ptr[r + 1] += 1;
            last = Some((r, c));
        }
        for i in 0..rows {
            row_ptr[i + 1] += row_ptr[i];
        }
        Ok(Self {
            row_ptr,
            col_indices,
            values,
            rows,
            cols,
        })
    }

    /// Square tridiagonal matrix with constant bands.
    pub fn tridiagonal(n: usize, lower: f64, diag: f64, upper: f64) -> Self {
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_indices = Vec::with_capacity(3 * n);
        let mut values = Vec::with_capacity(3 * n);
        row_ptr.push(0);
        for i in 0..n {
            if i > 0 {
                col_indices.push(i - 1);
                values.push(lower);
            }
            col_indices.push(i);
            values.push(diag);
            if i + 1 < n {
                col_indices.push(i + 1);
                values.push(upper);
            }
            row_ptr.push(col_indices.len());
        }
        Self {
            row_ptr,
            col_indices,
            values,
            rows: n,
            cols: n,
        }
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Add `shift` to every diagonal entry that is stored.
    pub fn shift_diagonal(&mut self, shift: f64) {
        for row in 0..self.rows {
            for idx in self.row_ptr[row]..self.row_ptr[row + 1] {
                if self.col_indices[idx] == row {
                    self.values[idx] += shift;
                }
            }
        }
    }
}

impl LinearOperator<DenseVector> for CsrMatrix {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn apply(&self, x: &DenseVector, y: &mut DenseVector) -> Result<(), CapabilityError> {
        check_dims(self.cols, x.len())?;
        check_dims(self.rows, y.len())?;
        let xs = x.as_slice();
        for (i, yi) in y.as_mut_slice().iter_mut().enumerate() {
            let start = self.row_ptr[i];
            let end = self.row_ptr[i + 1];
            *yi = self.col_indices[start..end]
                .iter()
                .zip(&self.values[start..end])
                .map(|(&c, v)| v * xs[c])
                .sum();
        }
        Ok(())
    }

    fn diagonal(&self, d: &mut DenseVector) -> Result<(), CapabilityError> {
        check_dims(self.rows.min(self.cols), d.len())?;
        d.set(0.0);
        for row in 0..d.len() {
            for idx in self.row_ptr[row]..self.row_ptr[row + 1] {
                if self.col_indices[idx] == row {
                    d[row] += self.values[idx];
                }
            }
        }
        Ok(())
    }
}
