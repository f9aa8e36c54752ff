//! Sparse matrix and conjugate gradient solver for the conformal system.
//!
//! The LSCM normal equations are symmetric positive semi-definite and, with
//! the penalty-pinned rows, badly scaled; the solver therefore runs conjugate
//! gradient with a Jacobi (diagonal) preconditioner.

use nalgebra::DVector;

use crate::error::{AtlasError, Result};

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    /// row_ptr[i] is the index in col_idx/values where row i starts;
    /// row_ptr[rows] == nnz.
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from triplets (row, col, value).
    ///
    /// Duplicate entries at the same (row, col) are summed.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        // row_ptr[r + 1] first holds the entry count of row r, then the
        // prefix sum turns it into the CSR row offsets.
        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());

        let mut prev: Option<(usize, usize)> = None;
        for (row, col, val) in triplets {
            debug_assert!(row < rows && col < cols);
            if prev == Some((row, col)) {
                *values.last_mut().unwrap() += val;
            } else {
                col_idx.push(col);
                values.push(val);
                row_ptr[row + 1] += 1;
                prev = Some((row, col));
            }
        }

        for r in 0..rows {
            row_ptr[r + 1] += row_ptr[r];
        }

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Get the number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Get the number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Get the number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Multiply matrix by vector: y = A * x.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.cols, "vector dimension mismatch");

        let mut y = DVector::zeros(self.rows);
        for i in 0..self.rows {
            let mut sum = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[k] * x[self.col_idx[k]];
            }
            y[i] = sum;
        }
        y
    }

    /// Extract the diagonal, substituting 1.0 for empty or zero entries so it
    /// can serve as a Jacobi preconditioner.
    pub fn diagonal(&self) -> DVector<f64> {
        let mut d = DVector::from_element(self.rows, 1.0);
        for i in 0..self.rows {
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                if self.col_idx[k] == i && self.values[k].abs() > 1e-30 {
                    d[i] = self.values[k];
                }
            }
        }
        d
    }
}

/// Solve A*x = b with Jacobi-preconditioned conjugate gradient.
///
/// Requires A symmetric positive (semi-)definite.
///
/// # Errors
///
/// [`AtlasError::ConvergenceFailed`] if the relative residual does not drop
/// below `tolerance` within `max_iter` iterations, or if the search direction
/// collapses (singular system).
pub fn conjugate_gradient(
    a: &CsrMatrix,
    b: &DVector<f64>,
    max_iter: usize,
    tolerance: f64,
) -> Result<DVector<f64>> {
    let n = b.len();
    assert_eq!(a.nrows(), n, "matrix-vector dimension mismatch");
    assert_eq!(a.ncols(), n, "matrix must be square");

    let b_norm = b.norm();
    let mut x = DVector::zeros(n);
    if b_norm < 1e-30 {
        return Ok(x);
    }

    let inv_diag = a.diagonal().map(|d| 1.0 / d);

    let mut r = b.clone(); // r = b - A*0
    let mut z = r.component_mul(&inv_diag);
    let mut p = z.clone();
    let mut rz = r.dot(&z);

    for _iter in 0..max_iter {
        let ap = a.mul_vec(&p);
        let p_ap = p.dot(&ap);
        if p_ap.abs() < 1e-30 {
            return Err(AtlasError::ConvergenceFailed {
                iterations: max_iter,
            });
        }

        let alpha = rz / p_ap;
        x += alpha * &p;
        r -= alpha * &ap;

        if r.norm() / b_norm < tolerance {
            return Ok(x);
        }

        z = r.component_mul(&inv_diag);
        let rz_new = r.dot(&z);
        let beta = rz_new / rz;
        p = &z + beta * &p;
        rz = rz_new;
    }

    Err(AtlasError::ConvergenceFailed {
        iterations: max_iter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csr_from_triplets() {
        // [ 4  1 ]
        // [ 1  3 ]
        let triplets = vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)];
        let a = CsrMatrix::from_triplets(2, 2, triplets);

        assert_eq!(a.nrows(), 2);
        assert_eq!(a.ncols(), 2);
        assert_eq!(a.nnz(), 4);
    }

    #[test]
    fn test_csr_duplicates_summed() {
        let triplets = vec![
            (0, 0, 2.0),
            (0, 0, 2.0), // should sum to 4.0
            (0, 1, 1.0),
            (1, 0, 1.0),
            (1, 1, 3.0),
        ];
        let a = CsrMatrix::from_triplets(2, 2, triplets);
        assert_eq!(a.nnz(), 4);

        let x = DVector::from_vec(vec![1.0, 0.0]);
        let y = a.mul_vec(&x);
        assert!((y[0] - 4.0).abs() < 1e-12);
        assert!((y[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_csr_empty_rows() {
        // Row 1 is entirely empty.
        let triplets = vec![(0, 0, 2.0), (2, 2, 5.0)];
        let a = CsrMatrix::from_triplets(3, 3, triplets);

        let x = DVector::from_vec(vec![1.0, 1.0, 1.0]);
        let y = a.mul_vec(&x);
        assert!((y[0] - 2.0).abs() < 1e-12);
        assert!(y[1].abs() < 1e-12);
        assert!((y[2] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_cg_simple() {
        // [ 4  1 ] [x]   [1]
        // [ 1  3 ] [y] = [2]  =>  x = 1/11, y = 7/11
        let triplets = vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)];
        let a = CsrMatrix::from_triplets(2, 2, triplets);
        let b = DVector::from_vec(vec![1.0, 2.0]);

        let x = conjugate_gradient(&a, &b, 100, 1e-10).unwrap();

        assert!((x[0] - 1.0 / 11.0).abs() < 1e-8);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-8);
    }

    #[test]
    fn test_cg_badly_scaled() {
        // Mimics the penalty-pinned system: one huge diagonal entry.
        let triplets = vec![
            (0, 0, 1e10),
            (1, 1, 2.0),
            (1, 2, 1.0),
            (2, 1, 1.0),
            (2, 2, 2.0),
        ];
        let a = CsrMatrix::from_triplets(3, 3, triplets);
        let b = DVector::from_vec(vec![1e10, 1.0, 0.0]);

        let x = conjugate_gradient(&a, &b, 200, 1e-10).unwrap();
        let residual = a.mul_vec(&x) - &b;
        assert!(residual.norm() / b.norm() < 1e-8);
        assert!((x[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cg_zero_rhs() {
        let triplets = vec![(0, 0, 1.0), (1, 1, 1.0)];
        let a = CsrMatrix::from_triplets(2, 2, triplets);
        let b = DVector::zeros(2);

        let x = conjugate_gradient(&a, &b, 10, 1e-10).unwrap();
        assert!(x.norm() < 1e-12);
    }
}
