//! CSC nonzero pattern

use crate::error::{Error, Result};

use super::format::SparseStorage;
use super::matching::hopcroft_karp;

/// Nonzero pattern of a sparse matrix in CSC layout
///
/// Values are stored separately (see [`super::CscMatrix`]) so that the
/// pattern can be analysed once and reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sparsity {
    nrows: usize,
    ncols: usize,
    col_ptrs: Vec<usize>,
    row_indices: Vec<usize>,
}

impl Sparsity {
    /// Create a pattern from CSC components
    ///
    /// Column pointers must start at 0, be non-decreasing and end at the
    /// number of row indices; rows must be in range and strictly increasing
    /// within every column.
    pub fn new(
        nrows: usize,
        ncols: usize,
        col_ptrs: Vec<usize>,
        row_indices: Vec<usize>,
    ) -> Result<Self> {
        if col_ptrs.len() != ncols + 1 {
            return Err(Error::InvalidArgument {
                arg: "col_ptrs",
                reason: format!(
                    "length {} does not match ncols + 1 = {}",
                    col_ptrs.len(),
                    ncols + 1
                ),
            });
        }
        if col_ptrs[0] != 0 || col_ptrs[ncols] != row_indices.len() {
            return Err(Error::InvalidArgument {
                arg: "col_ptrs",
                reason: format!(
                    "must span [0, {}], got [{}, {}]",
                    row_indices.len(),
                    col_ptrs[0],
                    col_ptrs[ncols]
                ),
            });
        }
        for j in 0..ncols {
            if col_ptrs[j] > col_ptrs[j + 1] {
                return Err(Error::InvalidArgument {
                    arg: "col_ptrs",
                    reason: format!("decreasing at column {}", j),
                });
            }
            let rows = &row_indices[col_ptrs[j]..col_ptrs[j + 1]];
            for (k, &i) in rows.iter().enumerate() {
                if i >= nrows {
                    return Err(Error::InvalidArgument {
                        arg: "row_indices",
                        reason: format!("row {} out of range for {} rows", i, nrows),
                    });
                }
                if k > 0 && rows[k - 1] >= i {
                    return Err(Error::InvalidArgument {
                        arg: "row_indices",
                        reason: format!("rows not strictly increasing in column {}", j),
                    });
                }
            }
        }
        Ok(Self {
            nrows,
            ncols,
            col_ptrs,
            row_indices,
        })
    }

    /// Assemble a pattern already known to be valid
    pub(crate) fn from_parts(
        nrows: usize,
        ncols: usize,
        col_ptrs: Vec<usize>,
        row_indices: Vec<usize>,
    ) -> Self {
        debug_assert_eq!(col_ptrs.len(), ncols + 1);
        Self {
            nrows,
            ncols,
            col_ptrs,
            row_indices,
        }
    }

    /// Fully dense pattern
    pub fn dense(nrows: usize, ncols: usize) -> Self {
        let col_ptrs = (0..=ncols).map(|j| j * nrows).collect();
        let row_indices = (0..ncols).flat_map(|_| 0..nrows).collect();
        Self {
            nrows,
            ncols,
            col_ptrs,
            row_indices,
        }
    }

    /// Diagonal pattern of an n x n matrix
    pub fn diagonal(n: usize) -> Self {
        Self {
            nrows: n,
            ncols: n,
            col_ptrs: (0..=n).collect(),
            row_indices: (0..n).collect(),
        }
    }

    /// Build a pattern from (row, col) pairs; duplicates are merged
    pub fn from_triplets(nrows: usize, ncols: usize, rows: &[usize], cols: &[usize]) -> Result<Self> {
        if rows.len() != cols.len() {
            return Err(Error::shape_mismatch(&[rows.len()], &[cols.len()]));
        }
        let mut entries: Vec<(usize, usize)> = Vec::with_capacity(rows.len());
        for (&i, &j) in rows.iter().zip(cols) {
            if i >= nrows || j >= ncols {
                return Err(Error::InvalidArgument {
                    arg: "triplets",
                    reason: format!("({}, {}) outside {}x{}", i, j, nrows, ncols),
                });
            }
            entries.push((j, i));
        }
        entries.sort_unstable();
        entries.dedup();

        let mut col_ptrs = vec![0usize; ncols + 1];
        let mut row_indices = Vec::with_capacity(entries.len());
        for &(j, i) in &entries {
            col_ptrs[j + 1] += 1;
            row_indices.push(i);
        }
        for j in 0..ncols {
            col_ptrs[j + 1] += col_ptrs[j];
        }
        Ok(Self {
            nrows,
            ncols,
            col_ptrs,
            row_indices,
        })
    }

    /// Column pointers (length ncols + 1)
    #[inline]
    pub fn col_ptrs(&self) -> &[usize] {
        &self.col_ptrs
    }

    /// Row indices (length nnz)
    #[inline]
    pub fn row_indices(&self) -> &[usize] {
        &self.row_indices
    }

    /// Row indices of column j
    #[inline]
    pub fn col(&self, j: usize) -> &[usize] {
        &self.row_indices[self.col_ptrs[j]..self.col_ptrs[j + 1]]
    }

    /// Position of (i, j) in the value array, if structurally nonzero
    pub fn get_nz(&self, i: usize, j: usize) -> Option<usize> {
        if j >= self.ncols {
            return None;
        }
        let start = self.col_ptrs[j];
        self.col(j).binary_search(&i).ok().map(|k| start + k)
    }

    /// True when every diagonal entry is structurally present
    pub fn has_full_diagonal(&self) -> bool {
        (0..self.nrows.min(self.ncols)).all(|k| self.get_nz(k, k).is_some())
    }

    /// Size of a maximum matching between rows and columns
    ///
    /// A square pattern with structural rank below n is singular for every
    /// choice of values.
    pub fn structural_rank(&self) -> usize {
        hopcroft_karp(self.nrows, self.ncols, &self.col_ptrs, &self.row_indices).structural_rank
    }

    /// Transposed pattern plus, for each transposed nonzero, its position in `self`
    pub fn transpose(&self) -> (Sparsity, Vec<usize>) {
        let nnz = self.nnz();
        let mut counts = vec![0usize; self.nrows + 1];
        for &i in &self.row_indices {
            counts[i + 1] += 1;
        }
        for i in 0..self.nrows {
            counts[i + 1] += counts[i];
        }
        let col_ptrs = counts.clone();
        let mut next = counts;
        let mut row_indices = vec![0usize; nnz];
        let mut mapping = vec![0usize; nnz];
        for j in 0..self.ncols {
            for k in self.col_ptrs[j]..self.col_ptrs[j + 1] {
                let i = self.row_indices[k];
                let dest = next[i];
                row_indices[dest] = j;
                mapping[dest] = k;
                next[i] += 1;
            }
        }
        (
            Sparsity {
                nrows: self.ncols,
                ncols: self.nrows,
                col_ptrs,
                row_indices,
            },
            mapping,
        )
    }

    /// Lower-triangular part including the diagonal
    pub fn lower(&self) -> Sparsity {
        let mut col_ptrs = vec![0usize; self.ncols + 1];
        let mut row_indices = Vec::new();
        for j in 0..self.ncols {
            row_indices.extend(self.col(j).iter().copied().filter(|&i| i >= j));
            col_ptrs[j + 1] = row_indices.len();
        }
        Sparsity {
            nrows: self.nrows,
            ncols: self.ncols,
            col_ptrs,
            row_indices,
        }
    }
}

impl SparseStorage for Sparsity {
    fn shape(&self) -> [usize; 2] {
        [self.nrows, self.ncols]
    }

    fn nnz(&self) -> usize {
        self.row_indices.len()
    }
}
