//! Dense LU with partial pivoting

use crate::error::{Error, FactorStage, Result};
use crate::linsol::{FactorizationBackend, LinsolOptions};
use crate::sparse::Sparsity;

use super::{
    densify, numerical_rank, pivot_tolerance, validate_rhs, validate_structurally_nonsingular,
    validate_values,
};

/// `PA = LU` on a dense column-major copy of the matrix
///
/// - L is unit lower triangular (diagonal implicit), stored below the diagonal
/// - U is upper triangular, stored on and above the diagonal
/// - `perm[k]` is the original row moved to position k
#[derive(Debug, Clone)]
struct DenseLu {
    n: usize,
    lu: Vec<f64>,
    perm: Vec<usize>,
}

impl DenseLu {
    #[inline]
    fn at(&self, i: usize, j: usize) -> f64 {
        self.lu[j * self.n + i]
    }

    fn solve_in_place(&self, b: &mut [f64], work: &mut [f64]) {
        let n = self.n;
        // L y = P b
        for k in 0..n {
            work[k] = b[self.perm[k]];
        }
        for j in 0..n {
            let yj = work[j];
            if yj != 0.0 {
                for i in (j + 1)..n {
                    work[i] -= self.at(i, j) * yj;
                }
            }
        }
        // U x = y
        for j in (0..n).rev() {
            work[j] /= self.at(j, j);
            let xj = work[j];
            for i in 0..j {
                work[i] -= self.at(i, j) * xj;
            }
        }
        b.copy_from_slice(work);
    }

    fn solve_transposed_in_place(&self, b: &mut [f64], work: &mut [f64]) {
        let n = self.n;
        // Aᵀ = Uᵀ Lᵀ P
        // Uᵀ z = b
        for i in 0..n {
            let mut s = b[i];
            for k in 0..i {
                s -= self.at(k, i) * work[k];
            }
            work[i] = s / self.at(i, i);
        }
        // Lᵀ w = z
        for i in (0..n).rev() {
            let mut s = work[i];
            for k in (i + 1)..n {
                s -= self.at(k, i) * work[k];
            }
            work[i] = s;
        }
        // P x = w
        for k in 0..n {
            b[self.perm[k]] = work[k];
        }
    }
}

/// Dense LU factorization backend (`lu`)
#[derive(Debug, Clone)]
pub struct DenseLuBackend {
    options: LinsolOptions,
    n: Option<usize>,
    factors: Option<DenseLu>,
}

impl DenseLuBackend {
    /// Registry name
    pub const NAME: &'static str = "lu";

    /// Create an unfactored backend
    pub fn new(options: LinsolOptions) -> Self {
        Self {
            options,
            n: None,
            factors: None,
        }
    }

    fn factors(&self) -> Result<&DenseLu> {
        self.factors
            .as_ref()
            .ok_or_else(|| Error::Internal("lu: no numeric factors".to_string()))
    }
}

impl FactorizationBackend for DenseLuBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn symbolic(&mut self, sparsity: &Sparsity) -> Result<()> {
        self.n = None;
        self.factors = None;
        self.n = Some(validate_structurally_nonsingular(sparsity)?);
        Ok(())
    }

    fn numeric(&mut self, sparsity: &Sparsity, values: &[f64]) -> Result<()> {
        self.factors = None;
        let n = validate_values(self.n, sparsity, values)?;
        let tol = pivot_tolerance(self.options.pivot_threshold, values);
        let mut lu = densify(sparsity, values);
        let mut perm: Vec<usize> = (0..n).collect();

        for col in 0..n {
            // Find pivot: max absolute value in column col, rows col..n
            let mut pivot_row = col;
            let mut max_val = lu[col * n + col].abs();
            for row in (col + 1)..n {
                let val = lu[col * n + row].abs();
                if val > max_val {
                    max_val = val;
                    pivot_row = row;
                }
            }

            if max_val <= tol {
                return Err(Error::factorization(
                    FactorStage::Nfact,
                    format!("zero pivot in column {} (|pivot| = {:e})", col, max_val),
                ));
            }

            if pivot_row != col {
                for j in 0..n {
                    lu.swap(j * n + col, j * n + pivot_row);
                }
                perm.swap(col, pivot_row);
            }

            let pivot = lu[col * n + col];
            for row in (col + 1)..n {
                lu[col * n + row] /= pivot;
            }

            // Update trailing submatrix
            for j in (col + 1)..n {
                let u = lu[j * n + col];
                if u == 0.0 {
                    continue;
                }
                for row in (col + 1)..n {
                    lu[j * n + row] -= lu[col * n + row] * u;
                }
            }
        }

        self.factors = Some(DenseLu { n, lu, perm });
        Ok(())
    }

    fn solve(&self, rhs: &mut [f64], nrhs: usize, transpose: bool) -> Result<()> {
        let f = self.factors()?;
        validate_rhs(f.n, rhs, nrhs)?;
        if f.n == 0 {
            return Ok(());
        }
        let mut work = vec![0.0; f.n];
        for b in rhs.chunks_mut(f.n) {
            if transpose {
                f.solve_transposed_in_place(b, &mut work);
            } else {
                f.solve_in_place(b, &mut work);
            }
        }
        Ok(())
    }

    fn rank(&self) -> Result<usize> {
        let f = self.factors()?;
        Ok(numerical_rank(
            (0..f.n).map(|k| f.at(k, k)),
            self.options.rank_tolerance,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;
    use crate::sparse::CscMatrix;

    fn factorize(a: &Matrix) -> DenseLuBackend {
        let csc = CscMatrix::from_dense_full(a);
        let mut b = DenseLuBackend::new(LinsolOptions::default());
        b.symbolic(csc.sparsity()).unwrap();
        b.numeric(csc.sparsity(), csc.values()).unwrap();
        b
    }

    #[test]
    fn test_solve_needs_pivoting() {
        // Zero in the (0, 0) position forces a row swap
        let a = Matrix::from_rows(&[[0.0, 2.0, 1.0], [1.0, 1.0, 0.0], [3.0, 0.0, 1.0]]);
        let x = Matrix::column(&[1.0, -2.0, 0.5]);
        let b = a.matmul(&x).unwrap();
        let lu = factorize(&a);

        let mut sol = b.clone().into_data();
        lu.solve(&mut sol, 1, false).unwrap();
        for (s, e) in sol.iter().zip(x.data()) {
            assert!((s - e).abs() < 1e-12);
        }

        let bt = a.transpose().matmul(&x).unwrap();
        let mut sol = bt.into_data();
        lu.solve(&mut sol, 1, true).unwrap();
        for (s, e) in sol.iter().zip(x.data()) {
            assert!((s - e).abs() < 1e-12);
        }
        assert_eq!(lu.rank().unwrap(), 3);
    }

    #[test]
    fn test_multiple_rhs() {
        let a = Matrix::from_rows(&[[2.0, 1.0], [1.0, 3.0]]);
        let lu = factorize(&a);
        let mut rhs = Matrix::identity(2).into_data();
        lu.solve(&mut rhs, 2, false).unwrap();
        let inv = Matrix::from_col_major(2, 2, rhs).unwrap();
        let eye = a.matmul(&inv).unwrap();
        assert!(eye.max_abs_diff(&Matrix::identity(2)).unwrap() < 1e-14);
    }

    #[test]
    fn test_pivot_threshold_scales_with_matrix() {
        let lu = factorize(&Matrix::from_rows(&[[1e-13, 0.0], [0.0, 1e-13]]));
        let mut sol = vec![1e-13, 2e-13];
        lu.solve(&mut sol, 1, false).unwrap();
        assert!((sol[0] - 1.0).abs() < 1e-12);
        assert!((sol[1] - 2.0).abs() < 1e-12);
        assert_eq!(lu.rank().unwrap(), 2);
    }

    #[test]
    fn test_singular_values_fail_numeric() {
        let sp = Sparsity::dense(2, 2);
        let mut b = DenseLuBackend::new(LinsolOptions::default());
        b.symbolic(&sp).unwrap();
        let err = b.numeric(&sp, &[1.0, 2.0, 2.0, 4.0]).unwrap_err();
        assert_eq!(err.stage(), Some(FactorStage::Nfact));
        assert!(b.solve(&mut [1.0, 1.0], 1, false).is_err());
    }
}
