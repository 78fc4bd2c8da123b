#![allow(dead_code)]

use std::hint::black_box;
use std::sync::Arc;

use fluxbench::{Bencher, flux};
use sensgraph::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Chain of `depth` layers `x <- sin(x) * x + x` on a column of length `n`
fn layered(n: usize, depth: usize) -> (Function, Vec<Matrix>) {
    let mut g = Graph::new();
    let x = g.symbol("x", n, 1);
    let mut h = x;
    for _ in 0..depth {
        let s = g.sin(h).unwrap();
        let p = g.mul(s, h).unwrap();
        h = g.add(p, h).unwrap();
    }
    let y = g.sum(h).unwrap();
    let f = Function::new("layered", Arc::new(g), &[x], &[y]).unwrap();
    let input = Matrix::column(&(0..n).map(|i| (i % 7) as f64 * 0.1).collect::<Vec<_>>());
    (f, vec![input])
}

fn shifted(inputs: &[Matrix], k: usize) -> Vec<Matrix> {
    vec![inputs[0].map(|v| v + k as f64 * 1e-9)]
}

// ---------------------------------------------------------------------------
// Value sweep
// ---------------------------------------------------------------------------

#[flux::bench(group = "value_sweep", args = [16, 64, 256])]
fn value_sweep(b: &mut Bencher, depth: usize) {
    let (mut f, x) = layered(64, depth);
    let mut k = 0;
    b.iter(|| {
        k += 1;
        black_box(f.evaluate(&shifted(&x, k)).unwrap())
    });
}

// ---------------------------------------------------------------------------
// Forward and adjoint sweeps
// ---------------------------------------------------------------------------

#[flux::bench(group = "forward_sweep", args = [1, 4, 16])]
fn forward_sweep(b: &mut Bencher, ndir: usize) {
    let (mut f, x) = layered(64, 64);
    let seeds: Vec<Vec<Matrix>> = (0..ndir)
        .map(|d| vec![Matrix::column(&vec![d as f64 + 1.0; 64])])
        .collect();
    b.iter(|| black_box(f.forward(&x, &seeds).unwrap()));
}

#[flux::bench(group = "adjoint_sweep", args = [1, 4, 16])]
fn adjoint_sweep(b: &mut Bencher, ndir: usize) {
    let (mut f, x) = layered(64, 64);
    let seeds: Vec<Vec<Matrix>> = (0..ndir).map(|d| vec![Matrix::scalar(d as f64 + 1.0)]).collect();
    b.iter(|| black_box(f.adjoint(&x, &seeds).unwrap()));
}

#[flux::bench(group = "compile", args = [64, 1024])]
fn compile_layered(b: &mut Bencher, depth: usize) {
    let mut g = Graph::new();
    let x = g.symbol("x", 4, 1);
    let mut h = x;
    for _ in 0..depth {
        let s = g.sin(h).unwrap();
        h = g.add(s, h).unwrap();
    }
    let g = Arc::new(g);
    b.iter(|| black_box(compile(g.clone(), &[x], &[h]).unwrap()));
}

fn main() {
    fluxbench::run().unwrap();
}
