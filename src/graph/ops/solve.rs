//! Implicit linear solve as a graph node

use std::fmt;

use log::trace;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::graph::Operation;
use crate::linsol::LinearSolver;
use crate::matrix::{Matrix, Shape};
use crate::sparse::{CscMatrix, SparseStorage, Sparsity};

use super::check_arity;

struct SolveState {
    solver: LinearSolver,
    // Pattern values of A used for the current numeric factorization
    factored: Option<Vec<f64>>,
}

/// `x = A⁻¹ b`, or `x = A⁻ᵀ b` when transposed
///
/// Operands are `[A, b]`. `A` is read through a fixed nonzero pattern;
/// entries outside it are ignored and receive no sensitivity. The node owns
/// a [`LinearSolver`] and refactorizes only when the pattern values of `A`
/// change, so value, forward and adjoint sweeps at the same point share one
/// factorization.
///
/// Derivatives (non-transposed case):
///
/// - forward: `ẋ = A⁻¹ (ḃ − Ȧ x)`
/// - adjoint: `b̄ = A⁻ᵀ x̄`, `Ā = −b̄ xᵀ`
pub struct Solve {
    sparsity: Sparsity,
    transpose: bool,
    state: Mutex<SolveState>,
}

impl Solve {
    /// Create a solve node using the registered backend `backend`
    pub fn new(backend: &str, sparsity: Sparsity, transpose: bool) -> Result<Self> {
        if !sparsity.is_square() {
            return Err(Error::shape_mismatch(
                &[sparsity.nrows(), sparsity.nrows()],
                &[sparsity.nrows(), sparsity.ncols()],
            ));
        }
        let solver = LinearSolver::new("solve", backend, sparsity.clone())?;
        Ok(Self {
            sparsity,
            transpose,
            state: Mutex::new(SolveState {
                solver,
                factored: None,
            }),
        })
    }

    /// Pattern through which `A` is read
    pub fn sparsity(&self) -> &Sparsity {
        &self.sparsity
    }

    /// True for `x = A⁻ᵀ b`
    pub fn is_transposed(&self) -> bool {
        self.transpose
    }

    /// Backend serving this node
    pub fn plugin_name(&self) -> String {
        self.state.lock().solver.plugin_name().to_string()
    }

    /// Solve with the factorization of `a`, refactorizing if `a` changed
    ///
    /// With `transpose_again` the opposite system is solved, as needed by
    /// the adjoint.
    fn solve_with(&self, a: &Matrix, rhs: &mut Matrix, transpose_again: bool) -> Result<()> {
        let a = CscMatrix::from_dense(a, &self.sparsity)?;
        let mut state = self.state.lock();
        if state.factored.as_deref() != Some(a.values()) {
            trace!("solve: refactorizing {}x{} system", a.nrows(), a.ncols());
            state.factored = None;
            state.solver.numeric_factorize(&a)?;
            state.factored = Some(a.values().to_vec());
        }
        state.solver.solve(rhs, self.transpose != transpose_again)
    }

    /// `Ȧ x` (or `Ȧᵀ x`) with `Ȧ` read through the pattern
    fn seed_times(&self, a_dot: &Matrix, x: &Matrix) -> Result<Matrix> {
        let a_dot = CscMatrix::from_dense(a_dot, &self.sparsity)?;
        if self.transpose {
            a_dot.transpose().matmul_dense(x)
        } else {
            a_dot.matmul_dense(x)
        }
    }

    /// Sensitivity of `A` restricted to the pattern
    fn a_bar(&self, x: &Matrix, b_bar: &Matrix) -> Result<Matrix> {
        let outer = if self.transpose {
            x.matmul(&b_bar.transpose())?
        } else {
            b_bar.matmul(&x.transpose())?
        };
        Ok(CscMatrix::from_dense(&outer.scaled(-1.0), &self.sparsity)?.to_dense())
    }
}

impl fmt::Debug for Solve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solve")
            .field("shape", &self.sparsity.shape())
            .field("nnz", &self.sparsity.nnz())
            .field("transpose", &self.transpose)
            .finish()
    }
}

impl Operation for Solve {
    fn name(&self) -> &'static str {
        "solve"
    }

    fn arity(&self) -> usize {
        2
    }

    fn output_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        check_arity(self.name(), 2, inputs.len())?;
        let n = self.sparsity.nrows();
        let (a, b) = (inputs[0], inputs[1]);
        if a != (n, n) {
            return Err(Error::shape_mismatch(&[n, n], &[a.0, a.1]));
        }
        if b.0 != n {
            return Err(Error::shape_mismatch(&[n, b.1], &[b.0, b.1]));
        }
        Ok(b)
    }

    fn evaluate(&self, inputs: &[&Matrix]) -> Result<Matrix> {
        check_arity(self.name(), 2, inputs.len())?;
        let mut x = inputs[1].clone();
        self.solve_with(inputs[0], &mut x, false)?;
        Ok(x)
    }

    fn forward(&self, inputs: &[&Matrix], output: &Matrix, seeds: &[&Matrix]) -> Result<Matrix> {
        let mut out = self.forward_batch(inputs, output, &[seeds.to_vec()])?;
        out.pop()
            .ok_or_else(|| Error::Internal("solve: empty forward batch".to_string()))
    }

    fn adjoint(
        &self,
        inputs: &[&Matrix],
        output: &Matrix,
        seed: &Matrix,
    ) -> Result<Vec<Option<Matrix>>> {
        let mut out = self.adjoint_batch(inputs, output, &[seed])?;
        out.pop()
            .ok_or_else(|| Error::Internal("solve: empty adjoint batch".to_string()))
    }

    fn forward_batch(
        &self,
        inputs: &[&Matrix],
        output: &Matrix,
        seeds: &[Vec<&Matrix>],
    ) -> Result<Vec<Matrix>> {
        check_arity(self.name(), 2, inputs.len())?;
        if seeds.is_empty() {
            return Ok(Vec::new());
        }
        // All directions share one factorization and one multi-column solve
        let rhs = seeds
            .iter()
            .map(|dir| {
                check_arity(self.name(), 2, dir.len())?;
                let mut r = dir[1].clone();
                let ax = self.seed_times(dir[0], output)?;
                for (v, w) in r.data_mut().iter_mut().zip(ax.data()) {
                    *v -= w;
                }
                Ok(r)
            })
            .collect::<Result<Vec<_>>>()?;
        let mut rhs = Matrix::hcat(&rhs)?;
        self.solve_with(inputs[0], &mut rhs, false)?;
        let m = output.ncols();
        Ok((0..seeds.len()).map(|d| rhs.col_block(d * m, m)).collect())
    }

    fn adjoint_batch(
        &self,
        inputs: &[&Matrix],
        output: &Matrix,
        seeds: &[&Matrix],
    ) -> Result<Vec<Vec<Option<Matrix>>>> {
        check_arity(self.name(), 2, inputs.len())?;
        if seeds.is_empty() {
            return Ok(Vec::new());
        }
        let blocks: Vec<Matrix> = seeds.iter().map(|s| (*s).clone()).collect();
        let mut rhs = Matrix::hcat(&blocks)?;
        self.solve_with(inputs[0], &mut rhs, true)?;
        let m = output.ncols();
        (0..seeds.len())
            .map(|d| {
                let b_bar = rhs.col_block(d * m, m);
                let a_bar = self.a_bar(output, &b_bar)?;
                Ok(vec![Some(a_bar), Some(b_bar)])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &Matrix, b: &Matrix) -> f64 {
        a.data().iter().zip(b.data()).map(|(x, y)| x * y).sum()
    }

    fn check_dot_product_identity(backend: &str, transpose: bool) {
        let a = Matrix::from_rows(&[[4.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]]);
        let sp = CscMatrix::from_dense_nonzeros(&a).sparsity().clone();
        let op = Solve::new(backend, sp, transpose).unwrap();
        let b = Matrix::from_rows(&[[1.0, 0.5], [2.0, -1.0], [3.0, 0.0]]);
        let x = op.evaluate(&[&a, &b]).unwrap();

        let a_dot = Matrix::from_rows(&[[0.3, -0.2, 0.0], [0.1, 0.4, 0.5], [0.0, -0.6, 0.2]]);
        let b_dot = Matrix::from_rows(&[[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]]);
        let x_bar = Matrix::from_rows(&[[0.7, 0.1], [-0.4, 0.2], [1.1, -0.3]]);

        let x_dot = op.forward(&[&a, &b], &x, &[&a_dot, &b_dot]).unwrap();
        let bars = op.adjoint(&[&a, &b], &x, &x_bar).unwrap();
        let lhs = dot(&x_dot, &x_bar);
        let rhs = dot(bars[0].as_ref().unwrap(), &a_dot) + dot(bars[1].as_ref().unwrap(), &b_dot);
        assert!((lhs - rhs).abs() < 1e-12, "{} vs {}", lhs, rhs);
    }

    #[test]
    fn test_dot_product_identity() {
        for backend in ["lu", "sparse_lu", "qr"] {
            check_dot_product_identity(backend, false);
            check_dot_product_identity(backend, true);
        }
    }

    #[test]
    fn test_evaluate_solves_system() {
        let a = Matrix::from_rows(&[[2.0, 1.0], [1.0, 3.0]]);
        let op = Solve::new("lu", Sparsity::dense(2, 2), false).unwrap();
        let b = Matrix::column(&[3.0, 5.0]);
        let x = op.evaluate(&[&a, &b]).unwrap();
        let ax = a.matmul(&x).unwrap();
        assert!(ax.max_abs_diff(&b).unwrap() < 1e-14);

        let t = Solve::new("lu", Sparsity::dense(2, 2), true).unwrap();
        let a = Matrix::from_rows(&[[2.0, 1.0], [0.0, 3.0]]);
        let x = t.evaluate(&[&a, &b]).unwrap();
        let atx = a.transpose().matmul(&x).unwrap();
        assert!(atx.max_abs_diff(&b).unwrap() < 1e-14);
    }

    #[test]
    fn test_entries_outside_pattern_are_ignored() {
        let op = Solve::new("sparse_lu", Sparsity::diagonal(2), false).unwrap();
        let a = Matrix::from_rows(&[[2.0, 100.0], [100.0, 4.0]]);
        let b = Matrix::column(&[2.0, 4.0]);
        let x = op.evaluate(&[&a, &b]).unwrap();
        assert_eq!(x.data(), &[1.0, 1.0]);
        let bars = op.adjoint(&[&a, &b], &x, &Matrix::column(&[1.0, 1.0])).unwrap();
        let a_bar = bars[0].as_ref().unwrap();
        assert_eq!(a_bar.get(0, 1), 0.0);
        assert_eq!(a_bar.get(1, 0), 0.0);
    }

    #[test]
    fn test_shape_checks() {
        assert!(Solve::new("lu", Sparsity::dense(2, 3), false).is_err());
        assert!(Solve::new("missing", Sparsity::dense(2, 2), false).is_err());
        let op = Solve::new("lu", Sparsity::dense(2, 2), false).unwrap();
        assert_eq!(op.output_shape(&[(2, 2), (2, 3)]).unwrap(), (2, 3));
        assert!(op.output_shape(&[(3, 3), (3, 1)]).is_err());
        assert!(op.output_shape(&[(2, 2), (3, 1)]).is_err());
    }
}
