//! Factorization backend contract

use crate::error::{Error, Result};
use crate::sparse::{CscMatrix, Sparsity};

/// A concrete factorization strategy behind a [`super::LinearSolver`]
///
/// The handle drives a backend through three calls:
///
/// 1. [`symbolic`](Self::symbolic) once per nonzero pattern,
/// 2. [`numeric`](Self::numeric) once per set of values on that pattern,
/// 3. [`solve`](Self::solve) any number of times.
///
/// The handle guarantees this order; a backend never sees `numeric` without
/// a preceding successful `symbolic` on the same pattern, nor `solve`
/// without a successful `numeric`. Failures are plain errors; the handle
/// tags them with the lifecycle stage.
pub trait FactorizationBackend: Send {
    /// Registry name of the backend
    fn name(&self) -> &'static str;

    /// Analyse a square nonzero pattern
    fn symbolic(&mut self, sparsity: &Sparsity) -> Result<()>;

    /// Factorize values aligned with the pattern given to `symbolic`
    fn numeric(&mut self, sparsity: &Sparsity, values: &[f64]) -> Result<()>;

    /// Solve in place for `nrhs` column-major right-hand sides
    ///
    /// `rhs.len() == n * nrhs`. With `transpose` the system is `Aᵀ x = b`.
    fn solve(&self, rhs: &mut [f64], nrhs: usize, transpose: bool) -> Result<()>;

    /// Numerical rank of the factorized matrix
    fn rank(&self) -> Result<usize>;

    /// Whether the Cholesky operations are available
    fn supports_cholesky(&self) -> bool {
        false
    }

    /// Cholesky factor: `L` with `A = L Lᵀ`, or `Lᵀ` when `transpose`
    fn cholesky(&self, _transpose: bool) -> Result<CscMatrix> {
        Err(Error::NotSupported {
            backend: self.name(),
            operation: "cholesky",
        })
    }

    /// Pattern of the Cholesky factor
    fn cholesky_sparsity(&self, transpose: bool) -> Result<Sparsity> {
        Ok(self.cholesky(transpose)?.sparsity().clone())
    }

    /// Solve with one triangular Cholesky factor only
    ///
    /// Solves `L x = b`, or `Lᵀ x = b` when `transpose`.
    fn solve_cholesky(&self, _rhs: &mut [f64], _nrhs: usize, _transpose: bool) -> Result<()> {
        Err(Error::NotSupported {
            backend: self.name(),
            operation: "solve_cholesky",
        })
    }

    /// Number of negative eigenvalues of the factorized matrix
    ///
    /// Only backends that factorize symmetric matrices can report this.
    fn neig(&self) -> Result<usize> {
        Err(Error::NotSupported {
            backend: self.name(),
            operation: "neig",
        })
    }
}
