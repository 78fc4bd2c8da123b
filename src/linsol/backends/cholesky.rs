//! Sparse Cholesky factorization
//!
//! Up-looking `A = L Lᵀ` for symmetric positive definite matrices. Only the
//! lower triangle of the pattern is read. The symbolic phase builds the
//! elimination tree and the exact pattern of L; row k of L is the reach of
//! row k of A in that tree.

use crate::error::{Error, FactorStage, Result};
use crate::linsol::{FactorizationBackend, LinsolOptions};
use crate::sparse::{CscMatrix, SparseStorage, Sparsity};

use super::{numerical_rank, pivot_tolerance, validate_rhs, validate_square, validate_values};

/// Symbolic analysis of the lower triangle
#[derive(Debug, Clone)]
struct CholSymbolic {
    n: usize,
    /// Elimination tree: parent[j] = parent of column j, None at roots
    parent: Vec<Option<usize>>,
    /// Upper triangle as CSC: column k lists rows i <= k of row k of tril(A)
    upper: Sparsity,
    /// For each entry of `upper`, its position in the input value array
    upper_src: Vec<usize>,
    /// Pattern of L (diagonal first in every column)
    l_pattern: Sparsity,
}

/// Nonzero pattern of row k of L, excluding the diagonal, in topological
/// order (every column before its ancestors in the elimination tree)
fn ereach(
    upper: &Sparsity,
    k: usize,
    parent: &[Option<usize>],
    mark: &mut [usize],
    stamp: usize,
) -> Vec<usize> {
    mark[k] = stamp;
    let mut rev = Vec::new();
    let mut path = Vec::new();
    for &i in upper.col(k) {
        if i >= k {
            continue;
        }
        path.clear();
        let mut node = Some(i);
        while let Some(j) = node {
            if mark[j] == stamp {
                break;
            }
            mark[j] = stamp;
            path.push(j);
            node = parent[j];
        }
        rev.extend(path.iter().rev());
    }
    rev.reverse();
    rev
}

fn analyse(sparsity: &Sparsity) -> Result<CholSymbolic> {
    let n = validate_square(sparsity)?;
    if !sparsity.has_full_diagonal() {
        return Err(Error::factorization(
            FactorStage::Sfact,
            "pattern lacks a full diagonal",
        ));
    }

    let lower = sparsity.lower();
    let (upper, _) = lower.transpose();
    let mut upper_src = Vec::with_capacity(upper.nnz());
    for k in 0..n {
        for &i in upper.col(k) {
            // upper(i, k) = tril(A)(k, i)
            let src = sparsity.get_nz(k, i).ok_or_else(|| {
                Error::Internal(format!("cholesky: entry ({}, {}) vanished", k, i))
            })?;
            upper_src.push(src);
        }
    }

    // Elimination tree with path compression through `ancestor`
    let mut parent = vec![None; n];
    let mut ancestor: Vec<Option<usize>> = vec![None; n];
    for k in 0..n {
        for &i in upper.col(k) {
            let mut node = Some(i);
            while let Some(j) = node {
                if j >= k {
                    break;
                }
                let next = ancestor[j];
                ancestor[j] = Some(k);
                if next.is_none() {
                    parent[j] = Some(k);
                }
                node = next;
            }
        }
    }

    // Column j of L receives row k for every j in ereach(k)
    let mut cols: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut mark = vec![0usize; n];
    for k in 0..n {
        cols[k].push(k);
        for j in ereach(&upper, k, &parent, &mut mark, k + 1) {
            cols[j].push(k);
        }
    }
    let mut col_ptrs = Vec::with_capacity(n + 1);
    col_ptrs.push(0);
    let mut row_indices = Vec::new();
    for col in &cols {
        row_indices.extend_from_slice(col);
        col_ptrs.push(row_indices.len());
    }
    let l_pattern = Sparsity::new(n, n, col_ptrs, row_indices)?;

    Ok(CholSymbolic {
        n,
        parent,
        upper,
        upper_src,
        l_pattern,
    })
}

/// Sparse Cholesky backend (`cholesky`)
#[derive(Debug, Clone)]
pub struct CholeskyBackend {
    options: LinsolOptions,
    symbolic: Option<CholSymbolic>,
    l: Option<CscMatrix>,
}

impl CholeskyBackend {
    /// Registry name
    pub const NAME: &'static str = "cholesky";

    /// Create an unfactored backend
    pub fn new(options: LinsolOptions) -> Self {
        Self {
            options,
            symbolic: None,
            l: None,
        }
    }

    fn factor(&self) -> Result<&CscMatrix> {
        self.l
            .as_ref()
            .ok_or_else(|| Error::Internal("cholesky: no numeric factor".to_string()))
    }

    // L x = b
    fn lower_solve(l: &CscMatrix, x: &mut [f64]) {
        let sp = l.sparsity();
        let lx = l.values();
        for j in 0..sp.ncols() {
            let p0 = sp.col_ptrs()[j];
            x[j] /= lx[p0];
            let xj = x[j];
            for p in (p0 + 1)..sp.col_ptrs()[j + 1] {
                x[sp.row_indices()[p]] -= lx[p] * xj;
            }
        }
    }

    // Lᵀ x = b
    fn upper_solve(l: &CscMatrix, x: &mut [f64]) {
        let sp = l.sparsity();
        let lx = l.values();
        for j in (0..sp.ncols()).rev() {
            let p0 = sp.col_ptrs()[j];
            let mut s = x[j];
            for p in (p0 + 1)..sp.col_ptrs()[j + 1] {
                s -= lx[p] * x[sp.row_indices()[p]];
            }
            x[j] = s / lx[p0];
        }
    }
}

impl FactorizationBackend for CholeskyBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn symbolic(&mut self, sparsity: &Sparsity) -> Result<()> {
        self.symbolic = None;
        self.l = None;
        self.symbolic = Some(analyse(sparsity)?);
        Ok(())
    }

    fn numeric(&mut self, sparsity: &Sparsity, values: &[f64]) -> Result<()> {
        self.l = None;
        let sym = self.symbolic.as_ref().ok_or_else(|| {
            Error::factorization(FactorStage::Nfact, "no symbolic factorization available")
        })?;
        let n = validate_values(Some(sym.n), sparsity, values)?;
        let tol = pivot_tolerance(self.options.pivot_threshold, values);

        let lp = sym.l_pattern.col_ptrs();
        let li = sym.l_pattern.row_indices();
        let mut lx = vec![0.0; li.len()];
        let mut next = lp[..n].to_vec();
        let mut x = vec![0.0; n];
        let mut mark = vec![0usize; n];

        for k in 0..n {
            let reach = ereach(&sym.upper, k, &sym.parent, &mut mark, k + 1);

            // Scatter column k of triu(A)
            let start = sym.upper.col_ptrs()[k];
            for (p, &i) in sym.upper.col(k).iter().enumerate() {
                x[i] = values[sym.upper_src[start + p]];
            }
            let mut d = x[k];
            x[k] = 0.0;

            for &i in &reach {
                let lki = x[i] / lx[lp[i]];
                x[i] = 0.0;
                for p in (lp[i] + 1)..next[i] {
                    x[li[p]] -= lx[p] * lki;
                }
                d -= lki * lki;
                lx[next[i]] = lki;
                next[i] += 1;
            }

            if d <= tol {
                for &i in &reach {
                    x[i] = 0.0;
                }
                return Err(Error::factorization(
                    FactorStage::Nfact,
                    format!("matrix is not positive definite (pivot {:e} in column {})", d, k),
                ));
            }
            lx[next[k]] = d.sqrt();
            next[k] += 1;
        }

        self.l = Some(CscMatrix::new(sym.l_pattern.clone(), lx)?);
        Ok(())
    }

    fn solve(&self, rhs: &mut [f64], nrhs: usize, _transpose: bool) -> Result<()> {
        // A is symmetric, so A x = b and Aᵀ x = b coincide
        let l = self.factor()?;
        let n = l.nrows();
        validate_rhs(n, rhs, nrhs)?;
        if n == 0 {
            return Ok(());
        }
        for b in rhs.chunks_mut(n) {
            Self::lower_solve(l, b);
            Self::upper_solve(l, b);
        }
        Ok(())
    }

    fn rank(&self) -> Result<usize> {
        let l = self.factor()?;
        let sp = l.sparsity();
        Ok(numerical_rank(
            (0..sp.ncols()).map(|j| {
                let d = l.values()[sp.col_ptrs()[j]];
                d * d
            }),
            self.options.rank_tolerance,
        ))
    }

    fn supports_cholesky(&self) -> bool {
        true
    }

    fn cholesky(&self, transpose: bool) -> Result<CscMatrix> {
        let l = self.factor()?;
        Ok(if transpose { l.transpose() } else { l.clone() })
    }

    fn cholesky_sparsity(&self, transpose: bool) -> Result<Sparsity> {
        let sym = self.symbolic.as_ref().ok_or_else(|| {
            Error::Internal("cholesky: no symbolic factorization".to_string())
        })?;
        Ok(if transpose {
            sym.l_pattern.transpose().0
        } else {
            sym.l_pattern.clone()
        })
    }

    fn solve_cholesky(&self, rhs: &mut [f64], nrhs: usize, transpose: bool) -> Result<()> {
        let l = self.factor()?;
        let n = l.nrows();
        validate_rhs(n, rhs, nrhs)?;
        if n == 0 {
            return Ok(());
        }
        for b in rhs.chunks_mut(n) {
            if transpose {
                Self::upper_solve(l, b);
            } else {
                Self::lower_solve(l, b);
            }
        }
        Ok(())
    }

    fn neig(&self) -> Result<usize> {
        // A successful factorization proves positive definiteness
        self.factor()?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;

    fn spd() -> Matrix {
        // Arrow matrix: the dense last row and column produce no fill
        Matrix::from_rows(&[
            [4.0, 0.0, 0.0, 1.0],
            [0.0, 5.0, 0.0, 2.0],
            [0.0, 0.0, 6.0, 1.0],
            [1.0, 2.0, 1.0, 7.0],
        ])
    }

    fn factorize(a: &CscMatrix) -> CholeskyBackend {
        let mut b = CholeskyBackend::new(LinsolOptions::default());
        b.symbolic(a.sparsity()).unwrap();
        b.numeric(a.sparsity(), a.values()).unwrap();
        b
    }

    #[test]
    fn test_factor_reproduces_matrix() {
        let a = spd();
        let chol = factorize(&CscMatrix::from_dense_nonzeros(&a));
        let l = chol.cholesky(false).unwrap().to_dense();
        let lt = chol.cholesky(true).unwrap().to_dense();
        let llt = l.matmul(&lt).unwrap();
        assert!(llt.max_abs_diff(&a).unwrap() < 1e-12);
        assert_eq!(chol.cholesky_sparsity(false).unwrap().nnz(), 7);
        assert_eq!(chol.rank().unwrap(), 4);
        assert_eq!(chol.neig().unwrap(), 0);
    }

    #[test]
    fn test_small_scale_matrix_factorizes() {
        let a = Matrix::from_rows(&[[2e-13, 1e-14], [1e-14, 3e-13]]);
        let chol = factorize(&CscMatrix::from_dense_nonzeros(&a));
        let x = Matrix::column(&[1.0, -2.0]);
        let mut b = a.matmul(&x).unwrap().into_data();
        chol.solve(&mut b, 1, false).unwrap();
        for (s, e) in b.iter().zip(x.data()) {
            assert!((s - e).abs() < 1e-10);
        }
    }

    #[test]
    fn test_fill_in_is_predicted() {
        // Reverse arrow: the dense first column fills L completely
        let a = Matrix::from_rows(&[[7.0, 1.0, 1.0], [1.0, 4.0, 0.0], [1.0, 0.0, 5.0]]);
        let chol = factorize(&CscMatrix::from_dense_nonzeros(&a));
        assert_eq!(chol.cholesky_sparsity(false).unwrap().nnz(), 6);
        let l = chol.cholesky(false).unwrap().to_dense();
        let llt = l.matmul(&l.transpose()).unwrap();
        assert!(llt.max_abs_diff(&a).unwrap() < 1e-12);
    }

    #[test]
    fn test_solve_and_triangular_solves() {
        let a = spd();
        let chol = factorize(&CscMatrix::from_dense_nonzeros(&a));
        let x = Matrix::column(&[1.0, -1.0, 2.0, 0.5]);
        let mut b = a.matmul(&x).unwrap().into_data();
        chol.solve(&mut b, 1, false).unwrap();
        for (s, e) in b.iter().zip(x.data()) {
            assert!((s - e).abs() < 1e-12);
        }

        let l = chol.cholesky(false).unwrap().to_dense();
        let mut y = l.matmul(&x).unwrap().into_data();
        chol.solve_cholesky(&mut y, 1, false).unwrap();
        for (s, e) in y.iter().zip(x.data()) {
            assert!((s - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_indefinite_fails() {
        let a = CscMatrix::from_dense_full(&Matrix::from_rows(&[[1.0, 2.0], [2.0, 1.0]]));
        let mut b = CholeskyBackend::new(LinsolOptions::default());
        b.symbolic(a.sparsity()).unwrap();
        let err = b.numeric(a.sparsity(), a.values()).unwrap_err();
        assert_eq!(err.stage(), Some(FactorStage::Nfact));
    }

    #[test]
    fn test_missing_diagonal_rejected() {
        let sp = Sparsity::from_triplets(2, 2, &[1, 0], &[0, 1]).unwrap();
        let mut b = CholeskyBackend::new(LinsolOptions::default());
        assert_eq!(b.symbolic(&sp).unwrap_err().stage(), Some(FactorStage::Sfact));
    }
}
