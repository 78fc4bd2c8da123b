//! # sensgraph
//!
//! **Compiled expression graphs with forward and adjoint sensitivities.**
//!
//! sensgraph builds matrix-valued expressions as an arena of nodes, compiles
//! the part of the graph a set of outputs depends on into a flat execution
//! plan, and sweeps that plan for values, directional derivatives and
//! reverse-mode sensitivities.
//!
//! ## Features
//!
//! - **Expression graphs**: symbols, constants and operations with shared
//!   subexpressions evaluated once per sweep
//! - **Forward and adjoint sweeps**: any number of directions per call
//! - **Jacobians**: dense blocks in forward or adjoint mode, whichever is
//!   cheaper
//! - **Linear solvers**: symbolic/numeric factorization lifecycle over
//!   pluggable backends (dense LU, sparse LU, QR, Cholesky)
//! - **Implicit solves in graphs**: `x = A⁻¹ b` as a differentiable node
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use sensgraph::prelude::*;
//!
//! let mut g = Graph::new();
//! let x1 = g.symbol("x1", 1, 1);
//! let x2 = g.symbol("x2", 1, 1);
//! let p = g.mul(x1, x2)?;
//! let y = g.add(p, x1)?;
//!
//! let mut f = Function::new("f", Arc::new(g), &[x1, x2], &[y])?;
//! let x = [Matrix::scalar(3.0), Matrix::scalar(4.0)];
//! let fwd = f.forward(&x, &[vec![Matrix::scalar(1.0), Matrix::scalar(0.0)]])?;
//! assert_eq!(fwd.sensitivities[0][0].as_scalar(), Some(5.0));
//! # Ok::<(), sensgraph::error::Error>(())
//! ```
//!
//! ## Logging
//!
//! The crate logs through the `log` facade: compilation summaries and
//! factorization lifecycle transitions at `debug`, per-element sweep
//! progress at `trace`. Install any logger to see them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod function;
pub mod graph;
pub mod linsol;
pub mod matrix;
pub mod sparse;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, FactorStage, GraphError, Result};
    pub use crate::function::{AdjointResult, ForwardResult, Function, SweepState, compile};
    pub use crate::graph::{Graph, NodeId, Operation};
    pub use crate::linsol::{FactorState, FactorizationBackend, LinearSolver, LinsolOptions};
    pub use crate::matrix::Matrix;
    pub use crate::sparse::{CscMatrix, SparseStorage, Sparsity};
}
