//! Factorization lifecycle of the linear solver handle

mod common;

use common::{assert_allclose_f64, init_logging, spd_tridiagonal};
use sensgraph::error::{Error, FactorStage};
use sensgraph::linsol::{
    FactorState, FactorizationBackend, LinearSolver, LinsolOptions, backend_doc, backend_names,
    has_backend, load_backend, register_backend,
};
use sensgraph::matrix::Matrix;
use sensgraph::sparse::{CscMatrix, SparseStorage, Sparsity};

const BUILTIN: [&str; 4] = ["lu", "sparse_lu", "qr", "cholesky"];

#[test]
fn test_diagonal_system_and_refactorization() {
    init_logging();
    let a = CscMatrix::from_dense_nonzeros(&Matrix::from_rows(&[[2.0, 0.0], [0.0, 3.0]]));
    let mut solver = LinearSolver::new("diag", "sparse_lu", a.sparsity().clone()).unwrap();
    solver.symbolic_factorize(a.sparsity()).unwrap();
    solver.numeric_factorize(&a).unwrap();

    let mut x = Matrix::column(&[4.0, 9.0]);
    solver.solve(&mut x, false).unwrap();
    assert_allclose_f64(x.data(), &[2.0, 3.0], 1e-15, 1e-15, "first rhs");

    // New values on the same pattern; only the numeric stage is repeated
    let a2 = CscMatrix::new(a.sparsity().clone(), vec![4.0, 5.0]).unwrap();
    solver.numeric_factorize(&a2).unwrap();
    let mut x = Matrix::column(&[8.0, -10.0]);
    solver.solve(&mut x, false).unwrap();
    assert_allclose_f64(x.data(), &[2.0, -2.0], 1e-15, 1e-15, "after refactorization");
    assert_eq!(solver.state(), FactorState::NumericallyFactored);
}

#[test]
fn test_singular_matrix_blocks_solve() {
    init_logging();
    for plugin in ["lu", "sparse_lu", "qr"] {
        let a = CscMatrix::from_dense_full(&Matrix::from_rows(&[[1.0, 2.0], [2.0, 4.0]]));
        let mut solver = LinearSolver::new("singular", plugin, a.sparsity().clone()).unwrap();
        solver.symbolic_factorize(a.sparsity()).unwrap();

        let mut x = Matrix::column(&[1.0, 2.0]);
        match plugin {
            // QR factorizes rank-deficient systems and refuses at solve time
            "qr" => {
                solver.numeric_factorize(&a).unwrap();
                assert_eq!(solver.rank().unwrap(), 1);
                let err = solver.solve(&mut x, false).unwrap_err();
                assert_eq!(err.stage(), Some(FactorStage::Solve), "{}", plugin);
            }
            _ => {
                let err = solver.numeric_factorize(&a).unwrap_err();
                assert_eq!(err.stage(), Some(FactorStage::Nfact), "{}", plugin);
                let err = solver.solve(&mut x, false).unwrap_err();
                assert!(err.is_precondition(), "{}: {}", plugin, err);
            }
        }
    }
}

#[test]
fn test_solve_requires_factorization() {
    let mut solver = LinearSolver::new("fresh", "lu", Sparsity::dense(3, 3)).unwrap();
    let mut x = Matrix::column(&[1.0, 2.0, 3.0]);
    assert!(solver.solve(&mut x, false).unwrap_err().is_precondition());
    assert!(solver.rank().unwrap_err().is_precondition());

    solver.symbolic_factorize(&Sparsity::dense(3, 3)).unwrap();
    assert!(solver.solve(&mut x, false).unwrap_err().is_precondition());
}

#[test]
fn test_numeric_factorize_reanalyses_changed_pattern() {
    init_logging();
    let dense = spd_tridiagonal(4);
    let band = CscMatrix::from_dense_nonzeros(&dense);
    let mut solver = LinearSolver::new("policy", "sparse_lu", Sparsity::diagonal(4)).unwrap();

    // No sfact at all: performed implicitly
    solver.numeric_factorize(&CscMatrix::from_dense(&dense, &Sparsity::diagonal(4)).unwrap())
        .unwrap();
    assert_eq!(solver.sparsity(), &Sparsity::diagonal(4));

    // Pattern changed without a new sfact: re-analysed and adopted
    solver.numeric_factorize(&band).unwrap();
    assert_eq!(solver.state(), FactorState::NumericallyFactored);
    assert_eq!(solver.sparsity(), band.sparsity());

    let b = Matrix::column(&[1.0, 2.0, 3.0, 4.0]);
    let mut x = b.clone();
    solver.solve(&mut x, false).unwrap();
    let ax = dense.matmul(&x).unwrap();
    assert_allclose_f64(ax.data(), b.data(), 1e-12, 1e-12, "A x = b");
}

#[test]
fn test_backend_parity_on_spd_system() {
    init_logging();
    let n = 6;
    let dense = spd_tridiagonal(n);
    let a = CscMatrix::from_dense_nonzeros(&dense);
    let b = Matrix::from_col_major(n, 2, (0..2 * n).map(|i| i as f64 - 3.0).collect()).unwrap();

    let mut reference: Option<Matrix> = None;
    for plugin in BUILTIN {
        let mut solver = LinearSolver::new("parity", plugin, a.sparsity().clone()).unwrap();
        solver.numeric_factorize(&a).unwrap();
        assert_eq!(solver.rank().unwrap(), n, "{}", plugin);
        assert_eq!(solver.nullity().unwrap(), 0, "{}", plugin);
        let mut x = b.clone();
        solver.solve(&mut x, false).unwrap();
        match &reference {
            None => reference = Some(x),
            Some(r) => assert_allclose_f64(x.data(), r.data(), 1e-12, 1e-12, plugin),
        }
    }
}

#[test]
fn test_small_scale_system_solves_on_every_backend() {
    init_logging();
    let dense = Matrix::from_rows(&[[1e-13, 0.0], [0.0, 1e-13]]);
    let b = Matrix::column(&[1e-13, 2e-13]);
    for plugin in BUILTIN {
        let mut solver = LinearSolver::new("tiny", plugin, Sparsity::dense(2, 2)).unwrap();
        let x = solver.solve_dense(&dense, &b, false).unwrap();
        assert_allclose_f64(x.data(), &[1.0, 2.0], 1e-12, 1e-12, plugin);
        assert_eq!(solver.rank().unwrap(), 2, "{}", plugin);
    }
}

#[test]
fn test_transposed_solves_agree() {
    let dense = Matrix::from_rows(&[[3.0, 1.0, 0.0], [0.0, 2.0, 1.0], [1.0, 0.0, 4.0]]);
    let b = Matrix::column(&[1.0, -2.0, 0.5]);
    for plugin in ["lu", "sparse_lu", "qr"] {
        let mut solver = LinearSolver::new("t", plugin, Sparsity::dense(3, 3)).unwrap();
        let x = solver.solve_dense(&dense, &b, true).unwrap();
        let atx = dense.transpose().matmul(&x).unwrap();
        assert_allclose_f64(atx.data(), b.data(), 1e-12, 1e-12, plugin);
    }
}

#[test]
fn test_cholesky_factor_reproduces_matrix() {
    let dense = spd_tridiagonal(5);
    let a = CscMatrix::from_dense_nonzeros(&dense);
    let mut solver = LinearSolver::new("chol", "cholesky", a.sparsity().clone()).unwrap();
    solver.numeric_factorize(&a).unwrap();

    let l = solver.cholesky(false).unwrap().to_dense();
    let lt = solver.cholesky(true).unwrap().to_dense();
    let llt = l.matmul(&lt).unwrap();
    assert_allclose_f64(llt.data(), dense.data(), 1e-12, 1e-12, "L Lᵀ");
    // Tridiagonal: no fill, diagonal plus one subdiagonal
    assert_eq!(solver.cholesky_sparsity(false).unwrap().nnz(), 9);

    let mut lu = LinearSolver::new("no_chol", "lu", a.sparsity().clone()).unwrap();
    lu.numeric_factorize(&a).unwrap();
    assert!(matches!(lu.cholesky(false), Err(Error::NotSupported { .. })));
}

#[test]
fn test_negative_eigenvalue_count() {
    let dense = spd_tridiagonal(4);
    let a = CscMatrix::from_dense_nonzeros(&dense);

    let mut chol = LinearSolver::new("neig", "cholesky", a.sparsity().clone()).unwrap();
    assert!(chol.neig().unwrap_err().is_precondition());
    chol.symbolic_factorize(a.sparsity()).unwrap();
    assert!(chol.neig().unwrap_err().is_precondition());
    chol.numeric_factorize(&a).unwrap();
    assert_eq!(chol.neig().unwrap(), 0);

    for plugin in ["lu", "sparse_lu", "qr"] {
        let mut solver = LinearSolver::new("neig", plugin, a.sparsity().clone()).unwrap();
        assert!(solver.neig().unwrap_err().is_precondition(), "{}", plugin);
        solver.numeric_factorize(&a).unwrap();
        assert!(
            matches!(solver.neig(), Err(Error::NotSupported { operation: "neig", .. })),
            "{}",
            plugin
        );
    }
}

#[derive(Debug, Default)]
struct Diagonal {
    inv: Vec<f64>,
}

impl FactorizationBackend for Diagonal {
    fn name(&self) -> &'static str {
        "test_diagonal"
    }

    fn symbolic(&mut self, sparsity: &Sparsity) -> sensgraph::error::Result<()> {
        if *sparsity != Sparsity::diagonal(sparsity.nrows()) {
            return Err(Error::factorization(FactorStage::Sfact, "pattern is not diagonal"));
        }
        Ok(())
    }

    fn numeric(&mut self, _sparsity: &Sparsity, values: &[f64]) -> sensgraph::error::Result<()> {
        self.inv = values.iter().map(|v| 1.0 / v).collect();
        Ok(())
    }

    fn solve(&self, rhs: &mut [f64], nrhs: usize, _transpose: bool) -> sensgraph::error::Result<()> {
        let n = self.inv.len();
        for k in 0..nrhs {
            for (v, d) in rhs[k * n..(k + 1) * n].iter_mut().zip(&self.inv) {
                *v *= d;
            }
        }
        Ok(())
    }

    fn rank(&self) -> sensgraph::error::Result<usize> {
        Ok(self.inv.len())
    }
}

#[test]
fn test_custom_backend_registration() {
    register_backend("test_diagonal", "diagonal systems only", |_: &LinsolOptions| {
        Box::new(Diagonal::default()) as Box<dyn FactorizationBackend>
    });
    assert!(has_backend("test_diagonal"));
    load_backend("test_diagonal").unwrap();
    assert_eq!(backend_doc("test_diagonal").unwrap(), "diagonal systems only");
    for name in BUILTIN {
        assert!(backend_names().iter().any(|n| n == name));
    }

    let mut solver = LinearSolver::new("custom", "test_diagonal", Sparsity::diagonal(3)).unwrap();
    let a = CscMatrix::new(Sparsity::diagonal(3), vec![2.0, 4.0, 8.0]).unwrap();
    solver.numeric_factorize(&a).unwrap();
    let mut x = Matrix::column(&[2.0, 2.0, 2.0]);
    solver.solve(&mut x, false).unwrap();
    assert_eq!(x.data(), &[1.0, 0.5, 0.25]);

    let err = solver.symbolic_factorize(&Sparsity::dense(3, 3)).unwrap_err();
    assert_eq!(err.stage(), Some(FactorStage::Sfact));
    assert_eq!(solver.state(), FactorState::Unfactored);
}

#[test]
fn test_unknown_backend() {
    assert!(!has_backend("no_such_backend"));
    assert!(matches!(
        load_backend("no_such_backend"),
        Err(Error::BackendNotFound { .. })
    ));
    assert!(matches!(
        LinearSolver::new("x", "no_such_backend", Sparsity::dense(1, 1)),
        Err(Error::BackendNotFound { .. })
    ));
}
