//! Standard operations
//!
//! Elementwise arithmetic and math, linear-algebra primitives and the
//! implicit linear solve. Each type implements [`super::Operation`] with its
//! own local derivative rules.

mod arithmetic;
mod linear;
mod solve;
mod unary;

pub use arithmetic::{Binary, BinaryKind};
pub use linear::{MatMul, Sum, Transpose};
pub use solve::Solve;
pub use unary::{Unary, UnaryKind};

use crate::error::{GraphError, Result};

/// Check operand count inside an operation
pub(crate) fn check_arity(op: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(GraphError::Arity { op, expected, got }.into());
    }
    Ok(())
}
