//! Built-in factorization backends
//!
//! | name        | method                                   | rank | Cholesky | neig |
//! |-------------|------------------------------------------|------|----------|------|
//! | `lu`        | dense LU, partial pivoting               | yes  | no       | no   |
//! | `sparse_lu` | left-looking sparse LU, partial pivoting | yes  | no       | no   |
//! | `qr`        | dense Householder QR, column pivoting    | yes  | no       | no   |
//! | `cholesky`  | up-looking sparse Cholesky               | yes  | yes      | yes  |
//!
//! Pivot and rank thresholds are relative to the largest matrix entry.

mod cholesky;
mod dense_lu;
mod qr;
mod sparse_lu;

pub use cholesky::CholeskyBackend;
pub use dense_lu::DenseLuBackend;
pub use qr::QrBackend;
pub use sparse_lu::SparseLuBackend;

use crate::error::{Error, FactorStage, Result};
use crate::sparse::{SparseStorage, Sparsity};

/// Dimension of a square pattern
pub(crate) fn validate_square(sparsity: &Sparsity) -> Result<usize> {
    if !sparsity.is_square() {
        return Err(Error::factorization(
            FactorStage::Sfact,
            format!(
                "matrix must be square, got {}x{}",
                sparsity.nrows(),
                sparsity.ncols()
            ),
        ));
    }
    Ok(sparsity.nrows())
}

/// Dimension of a square pattern that admits a nonsingular matrix
pub(crate) fn validate_structurally_nonsingular(sparsity: &Sparsity) -> Result<usize> {
    let n = validate_square(sparsity)?;
    let rank = sparsity.structural_rank();
    if rank < n {
        return Err(Error::factorization(
            FactorStage::Sfact,
            format!("pattern is structurally singular (structural rank {} < {})", rank, n),
        ));
    }
    Ok(n)
}

/// Check that numeric values belong to the analysed pattern
pub(crate) fn validate_values(analysed_n: Option<usize>, sparsity: &Sparsity, values: &[f64]) -> Result<usize> {
    let n = analysed_n.ok_or_else(|| {
        Error::factorization(FactorStage::Nfact, "no symbolic factorization available")
    })?;
    if sparsity.nrows() != n || sparsity.ncols() != n {
        return Err(Error::shape_mismatch(&[n, n], &[sparsity.nrows(), sparsity.ncols()]));
    }
    if values.len() != sparsity.nnz() {
        return Err(Error::shape_mismatch(&[sparsity.nnz()], &[values.len()]));
    }
    Ok(n)
}

/// Check a column-major right-hand side block
pub(crate) fn validate_rhs(n: usize, rhs: &[f64], nrhs: usize) -> Result<()> {
    if rhs.len() != n * nrhs {
        return Err(Error::shape_mismatch(&[n, nrhs], &[rhs.len()]));
    }
    Ok(())
}

/// Pivot magnitude at or below which a matrix is treated as singular
///
/// Relative to the largest entry of the matrix, so rescaling a system does
/// not change whether it factorizes.
pub(crate) fn pivot_tolerance(threshold: f64, values: &[f64]) -> f64 {
    threshold * values.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
}

/// Scatter CSC values into a dense column-major buffer
pub(crate) fn densify(sparsity: &Sparsity, values: &[f64]) -> Vec<f64> {
    let n = sparsity.nrows();
    let mut dense = vec![0.0; n * sparsity.ncols()];
    for j in 0..sparsity.ncols() {
        let start = sparsity.col_ptrs()[j];
        for (k, &i) in sparsity.col(j).iter().enumerate() {
            dense[j * n + i] = values[start + k];
        }
    }
    dense
}

/// Number of diagonal entries above `tolerance` relative to the largest one
pub(crate) fn numerical_rank(diag: impl Iterator<Item = f64> + Clone, tolerance: f64) -> usize {
    let max = diag.clone().fold(0.0_f64, |m, d| m.max(d.abs()));
    if max == 0.0 {
        return 0;
    }
    diag.filter(|d| d.abs() > tolerance * max).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structurally_singular_rejected() {
        // Column 1 is empty
        let sp = Sparsity::new(2, 2, vec![0, 2, 2], vec![0, 1]).unwrap();
        let err = validate_structurally_nonsingular(&sp).unwrap_err();
        assert_eq!(err.stage(), Some(FactorStage::Sfact));
        assert!(validate_square(&Sparsity::dense(2, 3)).is_err());
    }

    #[test]
    fn test_numerical_rank() {
        let d = [3.0, -1.0, 1e-14];
        assert_eq!(numerical_rank(d.iter().copied(), 1e-10), 2);
        assert_eq!(numerical_rank([0.0, 0.0].iter().copied(), 1e-10), 0);
    }
}
