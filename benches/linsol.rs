#![allow(dead_code)]

use std::hint::black_box;

use fluxbench::{Bencher, flux};
use sensgraph::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// 2D Poisson (5-point) matrix on a `k` x `k` grid
fn poisson(k: usize) -> CscMatrix {
    let n = k * k;
    let mut a = Matrix::zeros(n, n);
    for i in 0..k {
        for j in 0..k {
            let p = i * k + j;
            a.set(p, p, 4.0);
            if i > 0 {
                a.set(p, p - k, -1.0);
            }
            if i + 1 < k {
                a.set(p, p + k, -1.0);
            }
            if j > 0 {
                a.set(p, p - 1, -1.0);
            }
            if j + 1 < k {
                a.set(p, p + 1, -1.0);
            }
        }
    }
    CscMatrix::from_dense_nonzeros(&a)
}

fn factorize(plugin: &str, a: &CscMatrix) -> LinearSolver {
    let mut solver = LinearSolver::new("bench", plugin, a.sparsity().clone()).unwrap();
    solver.numeric_factorize(a).unwrap();
    solver
}

// ---------------------------------------------------------------------------
// Numeric factorization (pattern analysed once)
// ---------------------------------------------------------------------------

fn bench_nfact(b: &mut Bencher, plugin: &str) {
    let a = poisson(16);
    let mut solver = factorize(plugin, &a);
    b.iter(|| black_box(solver.numeric_factorize(&a).unwrap()));
}

#[flux::bench(group = "nfact_poisson_16")]
fn nfact_lu(b: &mut Bencher) {
    bench_nfact(b, "lu");
}

#[flux::bench(group = "nfact_poisson_16")]
fn nfact_sparse_lu(b: &mut Bencher) {
    bench_nfact(b, "sparse_lu");
}

#[flux::bench(group = "nfact_poisson_16")]
fn nfact_qr(b: &mut Bencher) {
    bench_nfact(b, "qr");
}

#[flux::bench(group = "nfact_poisson_16")]
fn nfact_cholesky(b: &mut Bencher) {
    bench_nfact(b, "cholesky");
}

// ---------------------------------------------------------------------------
// Solve with existing factors
// ---------------------------------------------------------------------------

fn bench_solve(b: &mut Bencher, plugin: &str) {
    let a = poisson(16);
    let solver = factorize(plugin, &a);
    let rhs = Matrix::column(&vec![1.0; 256]);
    b.iter(|| {
        let mut x = rhs.clone();
        solver.solve(&mut x, false).unwrap();
        black_box(x)
    });
}

#[flux::bench(group = "solve_poisson_16")]
fn solve_lu(b: &mut Bencher) {
    bench_solve(b, "lu");
}

#[flux::bench(group = "solve_poisson_16")]
fn solve_sparse_lu(b: &mut Bencher) {
    bench_solve(b, "sparse_lu");
}

#[flux::bench(group = "solve_poisson_16")]
fn solve_cholesky(b: &mut Bencher) {
    bench_solve(b, "cholesky");
}

#[flux::bench(group = "sfact_poisson", args = [8, 16, 32])]
fn sfact_sparse_lu(b: &mut Bencher, k: usize) {
    let a = poisson(k);
    let mut solver = LinearSolver::new("bench", "sparse_lu", a.sparsity().clone()).unwrap();
    b.iter(|| black_box(solver.symbolic_factorize(a.sparsity()).unwrap()));
}

fn main() {
    fluxbench::run().unwrap();
}
