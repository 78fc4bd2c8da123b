//! Sparse matrix patterns for the linear-solver layer
//!
//! Linear solvers work on a fixed nonzero pattern ([`Sparsity`]) and a value
//! array aligned with that pattern ([`CscMatrix`]). Both use compressed
//! sparse column (CSC) storage:
//!
//! ```text
//! [2 0 1]      col_ptrs    = [0, 2, 3, 5]
//! [0 3 0]  ->  row_indices = [0, 2, 1, 0, 2]
//! [4 0 5]      values      = [2, 4, 3, 1, 5]
//! ```
//!
//! Row indices are sorted and unique within each column. Separating the
//! pattern from the values is what allows a symbolic factorization to be
//! reused across many numeric factorizations.

mod csc_matrix;
mod format;
mod matching;
mod pattern;

pub use csc_matrix::CscMatrix;
pub use format::SparseStorage;
pub use matching::{MatchingResult, hopcroft_karp};
pub use pattern::Sparsity;
