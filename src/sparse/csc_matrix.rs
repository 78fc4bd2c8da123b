//! CSC matrix: pattern plus aligned values

use crate::error::{Error, Result};
use crate::matrix::Matrix;

use super::format::SparseStorage;
use super::pattern::Sparsity;

/// Sparse matrix in CSC format
///
/// `values[k]` belongs to the k-th structural nonzero of `sparsity`.
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix {
    sparsity: Sparsity,
    values: Vec<f64>,
}

impl CscMatrix {
    /// Create a CSC matrix from a pattern and aligned values
    pub fn new(sparsity: Sparsity, values: Vec<f64>) -> Result<Self> {
        if values.len() != sparsity.nnz() {
            return Err(Error::shape_mismatch(&[sparsity.nnz()], &[values.len()]));
        }
        Ok(Self { sparsity, values })
    }

    /// Project a dense matrix onto a pattern
    ///
    /// Entries outside the pattern are dropped.
    pub fn from_dense(dense: &Matrix, sparsity: &Sparsity) -> Result<Self> {
        dense.check_shape((sparsity.nrows(), sparsity.ncols()))?;
        let mut values = Vec::with_capacity(sparsity.nnz());
        for j in 0..sparsity.ncols() {
            let col = dense.col(j);
            values.extend(sparsity.col(j).iter().map(|&i| col[i]));
        }
        Ok(Self {
            sparsity: sparsity.clone(),
            values,
        })
    }

    /// Dense matrix with a fully dense pattern
    pub fn from_dense_full(dense: &Matrix) -> Self {
        Self {
            sparsity: Sparsity::dense(dense.nrows(), dense.ncols()),
            values: dense.data().to_vec(),
        }
    }

    /// Dense matrix keeping only its exact nonzeros
    pub fn from_dense_nonzeros(dense: &Matrix) -> Self {
        let (nrows, ncols) = dense.shape();
        let mut col_ptrs = vec![0usize; ncols + 1];
        let mut row_indices = Vec::new();
        let mut values = Vec::new();
        for j in 0..ncols {
            for (i, &v) in dense.col(j).iter().enumerate() {
                if v != 0.0 {
                    row_indices.push(i);
                    values.push(v);
                }
            }
            col_ptrs[j + 1] = row_indices.len();
        }
        let sparsity = Sparsity::from_parts(nrows, ncols, col_ptrs, row_indices);
        Self { sparsity, values }
    }

    /// Nonzero pattern
    #[inline]
    pub fn sparsity(&self) -> &Sparsity {
        &self.sparsity
    }

    /// Values aligned with the pattern
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable values aligned with the pattern
    #[inline]
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Element (i, j), zero outside the pattern
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.sparsity
            .get_nz(i, j)
            .map(|k| self.values[k])
            .unwrap_or(0.0)
    }

    /// Densify
    pub fn to_dense(&self) -> Matrix {
        let mut dense = Matrix::zeros(self.sparsity.nrows(), self.sparsity.ncols());
        for j in 0..self.sparsity.ncols() {
            let start = self.sparsity.col_ptrs()[j];
            for (k, &i) in self.sparsity.col(j).iter().enumerate() {
                dense.set(i, j, self.values[start + k]);
            }
        }
        dense
    }

    /// Transposed copy
    pub fn transpose(&self) -> CscMatrix {
        let (sparsity, mapping) = self.sparsity.transpose();
        let values = mapping.iter().map(|&k| self.values[k]).collect();
        CscMatrix { sparsity, values }
    }

    /// Sparse matrix times dense matrix
    pub fn matmul_dense(&self, x: &Matrix) -> Result<Matrix> {
        if x.nrows() != self.sparsity.ncols() {
            return Err(Error::shape_mismatch(
                &[self.sparsity.ncols(), x.ncols()],
                &[x.nrows(), x.ncols()],
            ));
        }
        let mut y = Matrix::zeros(self.sparsity.nrows(), x.ncols());
        for c in 0..x.ncols() {
            for j in 0..self.sparsity.ncols() {
                let xj = x.get(j, c);
                if xj == 0.0 {
                    continue;
                }
                let start = self.sparsity.col_ptrs()[j];
                for (k, &i) in self.sparsity.col(j).iter().enumerate() {
                    let v = y.get(i, c) + self.values[start + k] * xj;
                    y.set(i, c, v);
                }
            }
        }
        Ok(y)
    }
}

impl SparseStorage for CscMatrix {
    fn shape(&self) -> [usize; 2] {
        self.sparsity.shape()
    }

    fn nnz(&self) -> usize {
        self.values.len()
    }
}
