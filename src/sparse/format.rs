//! Common interface of sparse storage

/// Trait for sparse storage
///
/// Implemented by the bare pattern ([`super::Sparsity`]) and by the pattern
/// with values ([`super::CscMatrix`]).
pub trait SparseStorage {
    /// Returns the shape as [nrows, ncols]
    fn shape(&self) -> [usize; 2];

    /// Returns the number of rows
    #[inline]
    fn nrows(&self) -> usize {
        self.shape()[0]
    }

    /// Returns the number of columns
    #[inline]
    fn ncols(&self) -> usize {
        self.shape()[1]
    }

    /// Returns the number of structural non-zero elements
    fn nnz(&self) -> usize;

    /// Returns true for square shapes
    #[inline]
    fn is_square(&self) -> bool {
        self.nrows() == self.ncols()
    }

    /// Fraction of structural nonzeros
    fn density(&self) -> f64 {
        let total = self.nrows() * self.ncols();
        if total == 0 {
            0.0
        } else {
            self.nnz() as f64 / total as f64
        }
    }
}
