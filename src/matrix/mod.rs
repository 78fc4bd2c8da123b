//! Dense matrix storage
//!
//! Every value flowing through an expression graph is a [`Matrix`]: a dense,
//! column-major block of `f64`. Vectors are `n x 1` matrices and scalars are
//! `1 x 1`. Only the handful of kernels the evaluator and the built-in
//! operators need live here; this is storage, not a linear-algebra library.

mod dense;

pub use dense::{Matrix, Shape};
