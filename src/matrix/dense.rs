//! Dense column-major matrix

use std::fmt;

use crate::error::{Error, Result};

/// Matrix shape as `(nrows, ncols)`
pub type Shape = (usize, usize);

/// Dense column-major matrix of `f64`
///
/// Element `(i, j)` lives at `data[j * nrows + i]`, so a column is a
/// contiguous slice. This is the layout the factorization backends solve in
/// place.
#[derive(Clone, PartialEq)]
pub struct Matrix {
    nrows: usize,
    ncols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a matrix of zeros
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            data: vec![0.0; nrows * ncols],
        }
    }

    /// Create a zero matrix with the given shape
    pub fn zeros_like_shape(shape: Shape) -> Self {
        Self::zeros(shape.0, shape.1)
    }

    /// Create a 1x1 matrix
    pub fn scalar(value: f64) -> Self {
        Self {
            nrows: 1,
            ncols: 1,
            data: vec![value],
        }
    }

    /// Create an n x n identity matrix
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Create a column vector
    pub fn column(values: &[f64]) -> Self {
        Self {
            nrows: values.len(),
            ncols: 1,
            data: values.to_vec(),
        }
    }

    /// Create a matrix from column-major data
    pub fn from_col_major(nrows: usize, ncols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != nrows * ncols {
            return Err(Error::InvalidArgument {
                arg: "data",
                reason: format!(
                    "length {} does not match {}x{} = {}",
                    data.len(),
                    nrows,
                    ncols,
                    nrows * ncols
                ),
            });
        }
        Ok(Self { nrows, ncols, data })
    }

    /// Create a matrix from row arrays
    ///
    /// ```
    /// # use sensgraph::matrix::Matrix;
    /// let a = Matrix::from_rows(&[[2.0, 0.0], [0.0, 3.0]]);
    /// assert_eq!(a.get(1, 1), 3.0);
    /// ```
    pub fn from_rows<const C: usize>(rows: &[[f64; C]]) -> Self {
        let nrows = rows.len();
        let mut m = Self::zeros(nrows, C);
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                m.data[j * nrows + i] = v;
            }
        }
        m
    }

    /// Number of rows
    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns
    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Shape as `(nrows, ncols)`
    #[inline]
    pub fn shape(&self) -> Shape {
        (self.nrows, self.ncols)
    }

    /// Number of elements
    #[inline]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// True for 1x1 matrices
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.nrows == 1 && self.ncols == 1
    }

    /// Column-major element slice
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Mutable column-major element slice
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Consume into column-major data
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Element (i, j)
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[j * self.nrows + i]
    }

    /// Set element (i, j)
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[j * self.nrows + i] = value;
    }

    /// Value of a 1x1 matrix
    pub fn as_scalar(&self) -> Option<f64> {
        self.is_scalar().then(|| self.data[0])
    }

    /// Column j as a slice
    pub fn col(&self, j: usize) -> &[f64] {
        &self.data[j * self.nrows..(j + 1) * self.nrows]
    }

    /// Columns `start..start + count` as a new matrix
    pub fn col_block(&self, start: usize, count: usize) -> Matrix {
        Matrix {
            nrows: self.nrows,
            ncols: count,
            data: self.data[start * self.nrows..(start + count) * self.nrows].to_vec(),
        }
    }

    /// Concatenate matrices with equal row counts side by side
    pub fn hcat(blocks: &[Matrix]) -> Result<Matrix> {
        let Some(first) = blocks.first() else {
            return Ok(Matrix::zeros(0, 0));
        };
        let nrows = first.nrows;
        let mut data = Vec::with_capacity(blocks.iter().map(Matrix::numel).sum());
        let mut ncols = 0;
        for b in blocks {
            if b.nrows != nrows {
                return Err(Error::shape_mismatch(&[nrows, b.ncols], &[b.nrows, b.ncols]));
            }
            data.extend_from_slice(&b.data);
            ncols += b.ncols;
        }
        Ok(Matrix { nrows, ncols, data })
    }

    /// Check that this matrix has the given shape
    pub fn check_shape(&self, expected: Shape) -> Result<()> {
        if self.shape() != expected {
            return Err(Error::shape_mismatch(
                &[expected.0, expected.1],
                &[self.nrows, self.ncols],
            ));
        }
        Ok(())
    }

    /// Set every element to `value`, keeping the allocation
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Overwrite with the contents of `other` (same shape), keeping the allocation
    pub fn copy_from(&mut self, other: &Matrix) -> Result<()> {
        other.check_shape(self.shape())?;
        self.data.copy_from_slice(&other.data);
        Ok(())
    }

    /// Accumulate `other` into `self`
    pub fn add_assign(&mut self, other: &Matrix) -> Result<()> {
        other.check_shape(self.shape())?;
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
        Ok(())
    }

    /// Apply `f` elementwise
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        Matrix {
            nrows: self.nrows,
            ncols: self.ncols,
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Combine two matrices elementwise
    ///
    /// A 1x1 operand is broadcast against the other.
    pub fn zip_map(&self, other: &Matrix, f: impl Fn(f64, f64) -> f64) -> Result<Matrix> {
        if self.shape() == other.shape() {
            let data = self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect();
            return Ok(Matrix {
                nrows: self.nrows,
                ncols: self.ncols,
                data,
            });
        }
        if let Some(a) = self.as_scalar() {
            return Ok(other.map(|b| f(a, b)));
        }
        if let Some(b) = other.as_scalar() {
            return Ok(self.map(|a| f(a, b)));
        }
        Err(Error::shape_mismatch(
            &[self.nrows, self.ncols],
            &[other.nrows, other.ncols],
        ))
    }

    /// Multiply every element by `alpha`
    pub fn scaled(&self, alpha: f64) -> Matrix {
        self.map(|x| alpha * x)
    }

    /// Transposed copy
    pub fn transpose(&self) -> Matrix {
        let mut t = Matrix::zeros(self.ncols, self.nrows);
        for j in 0..self.ncols {
            for i in 0..self.nrows {
                t.data[i * self.ncols + j] = self.data[j * self.nrows + i];
            }
        }
        t
    }

    /// Matrix product `self * other`
    pub fn matmul(&self, other: &Matrix) -> Result<Matrix> {
        if self.ncols != other.nrows {
            return Err(Error::shape_mismatch(
                &[self.ncols, other.ncols],
                &[other.nrows, other.ncols],
            ));
        }
        let (m, k, n) = (self.nrows, self.ncols, other.ncols);
        let mut out = Matrix::zeros(m, n);
        for j in 0..n {
            for p in 0..k {
                let b = other.data[j * k + p];
                if b == 0.0 {
                    continue;
                }
                let a_col = &self.data[p * m..(p + 1) * m];
                let out_col = &mut out.data[j * m..(j + 1) * m];
                for (o, &a) in out_col.iter_mut().zip(a_col) {
                    *o += a * b;
                }
            }
        }
        Ok(out)
    }

    /// Sum of all elements
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Largest absolute elementwise difference, `None` on shape mismatch
    pub fn max_abs_diff(&self, other: &Matrix) -> Option<f64> {
        if self.shape() != other.shape() {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max),
        )
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matrix({}x{})[", self.nrows, self.ncols)?;
        for i in 0..self.nrows {
            if i > 0 {
                write!(f, "; ")?;
            }
            for j in 0..self.ncols {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", self.get(i, j))?;
            }
        }
        write!(f, "]")
    }
}
