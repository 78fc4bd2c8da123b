//! Sparse LU factorization
//!
//! Gilbert-Peierls left-looking algorithm with partial pivoting. Column k of
//! the factors is obtained by a sparse triangular solve with the columns of
//! L computed so far; the set of columns that take part is the reach of
//! A[:, k]'s pattern in the graph of L, found by depth-first search.

use crate::error::{Error, FactorStage, Result};
use crate::linsol::{FactorizationBackend, LinsolOptions};
use crate::sparse::Sparsity;

use super::{
    numerical_rank, pivot_tolerance, validate_rhs, validate_structurally_nonsingular,
    validate_values,
};

/// Result of sparse LU factorization: PA = LU
///
/// - `l_cols[j]` holds the strictly-lower entries of column j as
///   `(original row, value)`; the unit diagonal is implicit
/// - `u_cols[k]` holds the strictly-upper entries of column k as
///   `(pivot step, value)`; the diagonal is in `u_diag`
/// - `pinv[row]` is the pivot step at which original `row` was chosen
#[derive(Debug, Clone)]
struct SparseLu {
    n: usize,
    l_cols: Vec<Vec<(usize, f64)>>,
    u_cols: Vec<Vec<(usize, f64)>>,
    u_diag: Vec<f64>,
    pinv: Vec<usize>,
}

impl SparseLu {
    fn solve_in_place(&self, b: &mut [f64], c: &mut [f64]) {
        // L y = P b
        for (row, &step) in self.pinv.iter().enumerate() {
            c[step] = b[row];
        }
        for j in 0..self.n {
            let cj = c[j];
            if cj != 0.0 {
                for &(row, l) in &self.l_cols[j] {
                    c[self.pinv[row]] -= l * cj;
                }
            }
        }
        // U x = y, column oriented
        for k in (0..self.n).rev() {
            c[k] /= self.u_diag[k];
            let xk = c[k];
            for &(j, u) in &self.u_cols[k] {
                c[j] -= u * xk;
            }
        }
        b.copy_from_slice(c);
    }

    fn solve_transposed_in_place(&self, b: &mut [f64], w: &mut [f64]) {
        // Aᵀ = Uᵀ Lᵀ P
        // Uᵀ z = b
        for k in 0..self.n {
            let mut s = b[k];
            for &(j, u) in &self.u_cols[k] {
                s -= u * w[j];
            }
            w[k] = s / self.u_diag[k];
        }
        // Lᵀ v = z
        for j in (0..self.n).rev() {
            let mut s = w[j];
            for &(row, l) in &self.l_cols[j] {
                s -= l * w[self.pinv[row]];
            }
            w[j] = s;
        }
        // P x = v
        for (row, &step) in self.pinv.iter().enumerate() {
            b[row] = w[step];
        }
    }
}

/// Reusable buffers for the column-by-column factorization
struct LuWorkspace {
    x: Vec<f64>,
    mark: Vec<usize>,
    stack: Vec<(usize, usize)>,
    post: Vec<usize>,
}

impl LuWorkspace {
    fn new(n: usize) -> Self {
        Self {
            x: vec![0.0; n],
            mark: vec![0; n],
            stack: Vec::with_capacity(n),
            post: Vec::with_capacity(n),
        }
    }
}

/// Rows reachable from `starts` through the graph of L, in topological order
///
/// An edge runs from a pivoted row to every row of its L column. The
/// returned order places every row before the rows its L column updates.
fn reach(
    starts: &[usize],
    l_cols: &[Vec<(usize, f64)>],
    pinv: &[Option<usize>],
    stamp: usize,
    ws: &mut LuWorkspace,
) -> Vec<usize> {
    ws.post.clear();
    for &start in starts {
        if ws.mark[start] == stamp {
            continue;
        }
        ws.mark[start] = stamp;
        ws.stack.push((start, 0));
        while let Some(top) = ws.stack.last_mut() {
            let (row, next) = *top;
            let children: &[(usize, f64)] = match pinv[row] {
                Some(j) => &l_cols[j],
                None => &[],
            };
            if let Some(&(child, _)) = children.get(next) {
                top.1 += 1;
                if ws.mark[child] != stamp {
                    ws.mark[child] = stamp;
                    ws.stack.push((child, 0));
                }
            } else {
                ws.post.push(row);
                ws.stack.pop();
            }
        }
    }
    ws.post.iter().rev().copied().collect()
}

/// Left-looking sparse LU backend (`sparse_lu`)
#[derive(Debug, Clone)]
pub struct SparseLuBackend {
    options: LinsolOptions,
    n: Option<usize>,
    factors: Option<SparseLu>,
}

impl SparseLuBackend {
    /// Registry name
    pub const NAME: &'static str = "sparse_lu";

    /// Create an unfactored backend
    pub fn new(options: LinsolOptions) -> Self {
        Self {
            options,
            n: None,
            factors: None,
        }
    }

    fn factors(&self) -> Result<&SparseLu> {
        self.factors
            .as_ref()
            .ok_or_else(|| Error::Internal("sparse_lu: no numeric factors".to_string()))
    }

    /// Number of stored entries in L and U, diagonal of U included
    pub fn factor_nnz(&self) -> Option<(usize, usize)> {
        self.factors.as_ref().map(|f| {
            let l: usize = f.l_cols.iter().map(Vec::len).sum();
            let u: usize = f.u_cols.iter().map(Vec::len).sum::<usize>() + f.n;
            (l, u)
        })
    }
}

impl FactorizationBackend for SparseLuBackend {
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

        let mut l_cols: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
        let mut u_cols: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
        let mut u_diag = Vec::with_capacity(n);
        let mut pinv: Vec<Option<usize>> = vec![None; n];
        let mut ws = LuWorkspace::new(n);

        for k in 0..n {
            let rows = sparsity.col(k);
            let start = sparsity.col_ptrs()[k];
            let pattern = reach(rows, &l_cols, &pinv, k + 1, &mut ws);

            // Scatter A[:, k]
            for (p, &i) in rows.iter().enumerate() {
                ws.x[i] = values[start + p];
            }

            // Sparse triangular solve with the finished columns of L
            let mut u_col = Vec::new();
            for &row in &pattern {
                if let Some(j) = pinv[row] {
                    let xj = ws.x[row];
                    u_col.push((j, xj));
                    if xj != 0.0 {
                        for &(r, l) in &l_cols[j] {
                            ws.x[r] -= l * xj;
                        }
                    }
                }
            }

            // Partial pivoting among rows not pivoted yet
            let mut pivot_row = None;
            let mut max_val = 0.0_f64;
            for &row in &pattern {
                if pinv[row].is_none() && (pivot_row.is_none() || ws.x[row].abs() > max_val) {
                    max_val = ws.x[row].abs();
                    pivot_row = Some(row);
                }
            }
            let Some(pivot_row) = pivot_row.filter(|_| max_val > tol)
            else {
                for &row in &pattern {
                    ws.x[row] = 0.0;
                }
                return Err(Error::factorization(
                    FactorStage::Nfact,
                    format!("zero pivot in column {} (|pivot| = {:e})", k, max_val),
                ));
            };

            let pivot = ws.x[pivot_row];
            pinv[pivot_row] = Some(k);
            let mut l_col = Vec::new();
            for &row in &pattern {
                if pinv[row].is_none() {
                    let v = ws.x[row];
                    if v != 0.0 {
                        l_col.push((row, v / pivot));
                    }
                }
                ws.x[row] = 0.0;
            }

            u_col.sort_unstable_by_key(|&(j, _)| j);
            l_cols.push(l_col);
            u_cols.push(u_col);
            u_diag.push(pivot);
        }

        // Every row was pivoted exactly once
        let pinv = pinv
            .into_iter()
            .collect::<Option<Vec<usize>>>()
            .ok_or_else(|| Error::Internal("sparse_lu: incomplete row permutation".to_string()))?;

        self.factors = Some(SparseLu {
            n,
            l_cols,
            u_cols,
            u_diag,
            pinv,
        });
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
        Ok(numerical_rank(f.u_diag.iter().copied(), self.options.rank_tolerance))
    }
}
