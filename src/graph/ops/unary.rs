//! Elementwise unary math

use crate::error::Result;
use crate::graph::Operation;
use crate::matrix::{Matrix, Shape};

use super::check_arity;

/// Which unary function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryKind {
    /// `-a`
    Neg,
    /// `sin(a)`
    Sin,
    /// `cos(a)`
    Cos,
    /// `exp(a)`
    Exp,
    /// `ln(a)`
    Log,
    /// `sqrt(a)`
    Sqrt,
}

/// Elementwise unary function
#[derive(Debug, Clone, Copy)]
pub struct Unary {
    kind: UnaryKind,
}

impl Unary {
    /// Create a unary operation
    pub fn new(kind: UnaryKind) -> Self {
        Self { kind }
    }

    /// Which function this is
    pub fn kind(&self) -> UnaryKind {
        self.kind
    }

    /// Pointwise derivative f'(x), given x and y = f(x)
    fn derivative(&self, x: f64, y: f64) -> f64 {
        match self.kind {
            UnaryKind::Neg => -1.0,
            UnaryKind::Sin => x.cos(),
            UnaryKind::Cos => -x.sin(),
            UnaryKind::Exp => y,
            UnaryKind::Log => 1.0 / x,
            UnaryKind::Sqrt => 0.5 / y,
        }
    }

    fn local_jacobian(&self, x: &Matrix, y: &Matrix) -> Result<Matrix> {
        x.zip_map(y, |a, b| self.derivative(a, b))
    }
}

impl Operation for Unary {
    fn name(&self) -> &'static str {
        match self.kind {
            UnaryKind::Neg => "neg",
            UnaryKind::Sin => "sin",
            UnaryKind::Cos => "cos",
            UnaryKind::Exp => "exp",
            UnaryKind::Log => "log",
            UnaryKind::Sqrt => "sqrt",
        }
    }

    fn arity(&self) -> usize {
        1
    }

    fn output_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        check_arity(self.name(), 1, inputs.len())?;
        Ok(inputs[0])
    }

    fn evaluate(&self, inputs: &[&Matrix]) -> Result<Matrix> {
        check_arity(self.name(), 1, inputs.len())?;
        let x = inputs[0];
        Ok(match self.kind {
            UnaryKind::Neg => x.map(|v| -v),
            UnaryKind::Sin => x.map(f64::sin),
            UnaryKind::Cos => x.map(f64::cos),
            UnaryKind::Exp => x.map(f64::exp),
            UnaryKind::Log => x.map(f64::ln),
            UnaryKind::Sqrt => x.map(f64::sqrt),
        })
    }

    fn forward(&self, inputs: &[&Matrix], output: &Matrix, seeds: &[&Matrix]) -> Result<Matrix> {
        check_arity(self.name(), 1, seeds.len())?;
        let jac = self.local_jacobian(inputs[0], output)?;
        jac.zip_map(seeds[0], |d, s| d * s)
    }

    fn adjoint(
        &self,
        inputs: &[&Matrix],
        output: &Matrix,
        seed: &Matrix,
    ) -> Result<Vec<Option<Matrix>>> {
        let jac = self.local_jacobian(inputs[0], output)?;
        Ok(vec![Some(jac.zip_map(seed, |d, s| d * s)?)])
    }
}
