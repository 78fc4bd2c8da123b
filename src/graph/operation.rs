//! Node capability contract

use crate::error::Result;
use crate::matrix::{Matrix, Shape};

/// Capability set every operation node provides
///
/// The evaluator never looks at operator semantics beyond this trait. For an
/// operation `y = f(u_0, ..., u_{k-1})`:
///
/// - [`evaluate`](Operation::evaluate) computes `y`,
/// - [`forward`](Operation::forward) computes the directional derivative
///   `ẏ = Σ ∂f/∂u_i · u̇_i` for one direction,
/// - [`adjoint`](Operation::adjoint) computes the contributions
///   `ū_i = (∂f/∂u_i)ᵀ · ȳ`, which the evaluator adds into each operand.
///
/// Both derivative methods receive the operand values and the output value of
/// the current value sweep, so operations never need to cache anything
/// between calls.
pub trait Operation: Send + Sync {
    /// Short name for logs and errors
    fn name(&self) -> &'static str;

    /// Number of operands
    fn arity(&self) -> usize;

    /// Output shape for the given operand shapes
    ///
    /// Called once when the node is added to a graph; returns an error when
    /// the operand shapes are incompatible.
    fn output_shape(&self, inputs: &[Shape]) -> Result<Shape>;

    /// Compute the output value
    fn evaluate(&self, inputs: &[&Matrix]) -> Result<Matrix>;

    /// Forward sensitivity for one direction
    ///
    /// `seeds[i]` is the sensitivity of operand `i` and has its shape.
    fn forward(&self, inputs: &[&Matrix], output: &Matrix, seeds: &[&Matrix]) -> Result<Matrix>;

    /// Adjoint contributions for one direction
    ///
    /// Returns one entry per operand, shaped like the operand; `None` means
    /// the operand receives no contribution.
    fn adjoint(
        &self,
        inputs: &[&Matrix],
        output: &Matrix,
        seed: &Matrix,
    ) -> Result<Vec<Option<Matrix>>>;

    /// Forward sensitivities for several directions at once
    ///
    /// `seeds[d][i]` is direction `d` for operand `i`. The default runs the
    /// directions one by one; operations with an expensive shared step (a
    /// factorization, for instance) override it.
    fn forward_batch(
        &self,
        inputs: &[&Matrix],
        output: &Matrix,
        seeds: &[Vec<&Matrix>],
    ) -> Result<Vec<Matrix>> {
        seeds
            .iter()
            .map(|dir| self.forward(inputs, output, dir))
            .collect()
    }

    /// Adjoint contributions for several directions at once
    ///
    /// Result is indexed `[direction][operand]`.
    fn adjoint_batch(
        &self,
        inputs: &[&Matrix],
        output: &Matrix,
        seeds: &[&Matrix],
    ) -> Result<Vec<Vec<Option<Matrix>>>> {
        seeds
            .iter()
            .map(|seed| self.adjoint(inputs, output, seed))
            .collect()
    }
}

/// Sum a broadcast sensitivity back down to an operand's shape
///
/// Elementwise operations broadcast 1x1 operands; the adjoint of that
/// broadcast is a sum over all elements.
pub fn reduce_to_shape(grad: Matrix, shape: Shape) -> Matrix {
    if grad.shape() == shape {
        grad
    } else {
        Matrix::scalar(grad.sum())
    }
}
