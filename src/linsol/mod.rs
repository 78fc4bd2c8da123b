//! Linear solvers with a symbolic/numeric factorization lifecycle
//!
//! A [`LinearSolver`] solves `A x = b` for a fixed kind of system. Work is
//! split into three stages so that expensive parts can be reused:
//!
//! 1. **symbolic factorization** analyses the nonzero pattern of `A`;
//! 2. **numeric factorization** computes factors for concrete values;
//! 3. **solve** applies the factors to any number of right-hand sides.
//!
//! ```text
//! Unfactored --sfact--> SymbolicallyFactored --nfact--> NumericallyFactored
//!      ^                        ^   |                         |   ^
//!      |                        |   +------ nfact failed -----+   |
//!      +---- new pattern / sfact failed                solve(..) -+
//! ```
//!
//! The factorization itself is delegated to a [`FactorizationBackend`]
//! looked up by name in a process-wide registry (see [`register_backend`]).
//! Built-in backends: `lu`, `sparse_lu`, `qr` and `cholesky`.

pub mod backends;

mod backend;
mod handle;
mod memory;
mod options;
mod registry;

pub use backend::FactorizationBackend;
pub use handle::LinearSolver;
pub use memory::{FactorState, LinsolMemory};
pub use options::LinsolOptions;
pub use registry::{
    BackendFactory, backend_doc, backend_names, create_backend, has_backend, load_backend,
    register_backend,
};
