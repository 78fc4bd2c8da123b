//! Common test utilities
#![allow(dead_code)]

use sensgraph::graph::{Graph, NodeId};
use sensgraph::matrix::Matrix;

/// Install a test logger; repeated calls are harmless
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert two matrices have the same shape and close elements
pub fn assert_matrix_close(a: &Matrix, b: &Matrix, tol: f64, msg: &str) {
    assert_eq!(a.shape(), b.shape(), "{}: shape mismatch", msg);
    assert_allclose_f64(a.data(), b.data(), tol, tol, msg);
}

/// Sum of elementwise products
pub fn dot(a: &Matrix, b: &Matrix) -> f64 {
    a.data().iter().zip(b.data()).map(|(x, y)| x * y).sum()
}

/// `y = x1 * x2 + x1` on scalars
pub fn product_plus_first() -> (Graph, [NodeId; 2], NodeId) {
    let mut g = Graph::new();
    let x1 = g.symbol("x1", 1, 1);
    let x2 = g.symbol("x2", 1, 1);
    let p = g.mul(x1, x2).unwrap();
    let y = g.add(p, x1).unwrap();
    (g, [x1, x2], y)
}

/// Symmetric positive definite tridiagonal matrix with 4 on the diagonal
pub fn spd_tridiagonal(n: usize) -> Matrix {
    let mut a = Matrix::zeros(n, n);
    for i in 0..n {
        a.set(i, i, 4.0);
        if i + 1 < n {
            a.set(i, i + 1, -1.0);
            a.set(i + 1, i, -1.0);
        }
    }
    a
}
