//! Elementwise binary arithmetic
//!
//! A 1x1 operand is broadcast against the other; its adjoint is reduced back
//! with [`reduce_to_shape`].

use crate::error::{Error, Result};
use crate::graph::{Operation, reduce_to_shape};
use crate::matrix::{Matrix, Shape};

use super::check_arity;

/// Which binary operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b` (elementwise)
    Mul,
    /// `a / b` (elementwise)
    Div,
}

/// Elementwise binary operation with scalar broadcasting
#[derive(Debug, Clone, Copy)]
pub struct Binary {
    kind: BinaryKind,
}

impl Binary {
    /// Create a binary operation
    pub fn new(kind: BinaryKind) -> Self {
        Self { kind }
    }

    /// Which operation this is
    pub fn kind(&self) -> BinaryKind {
        self.kind
    }
}

fn broadcast_shape(a: Shape, b: Shape) -> Result<Shape> {
    if a == b || b == (1, 1) {
        Ok(a)
    } else if a == (1, 1) {
        Ok(b)
    } else {
        Err(Error::shape_mismatch(&[a.0, a.1], &[b.0, b.1]))
    }
}

impl Operation for Binary {
    fn name(&self) -> &'static str {
        match self.kind {
            BinaryKind::Add => "add",
            BinaryKind::Sub => "sub",
            BinaryKind::Mul => "mul",
            BinaryKind::Div => "div",
        }
    }

    fn arity(&self) -> usize {
        2
    }

    fn output_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        check_arity(self.name(), 2, inputs.len())?;
        broadcast_shape(inputs[0], inputs[1])
    }

    fn evaluate(&self, inputs: &[&Matrix]) -> Result<Matrix> {
        check_arity(self.name(), 2, inputs.len())?;
        let (a, b) = (inputs[0], inputs[1]);
        match self.kind {
            BinaryKind::Add => a.zip_map(b, |x, y| x + y),
            BinaryKind::Sub => a.zip_map(b, |x, y| x - y),
            BinaryKind::Mul => a.zip_map(b, |x, y| x * y),
            BinaryKind::Div => a.zip_map(b, |x, y| x / y),
        }
    }

    fn forward(&self, inputs: &[&Matrix], output: &Matrix, seeds: &[&Matrix]) -> Result<Matrix> {
        check_arity(self.name(), 2, seeds.len())?;
        let (a, b) = (inputs[0], inputs[1]);
        let (da, db) = (seeds[0], seeds[1]);
        match self.kind {
            BinaryKind::Add => da.zip_map(db, |x, y| x + y),
            BinaryKind::Sub => da.zip_map(db, |x, y| x - y),
            // d(ab) = da b + a db
            BinaryKind::Mul => {
                let left = da.zip_map(b, |x, y| x * y)?;
                let right = a.zip_map(db, |x, y| x * y)?;
                left.zip_map(&right, |x, y| x + y)
            }
            // d(a/b) = (da - y db) / b
            BinaryKind::Div => {
                let y_db = output.zip_map(db, |x, y| x * y)?;
                let num = da.zip_map(&y_db, |x, y| x - y)?;
                num.zip_map(b, |x, y| x / y)
            }
        }
    }

    fn adjoint(
        &self,
        inputs: &[&Matrix],
        output: &Matrix,
        seed: &Matrix,
    ) -> Result<Vec<Option<Matrix>>> {
        check_arity(self.name(), 2, inputs.len())?;
        let (a, b) = (inputs[0], inputs[1]);
        let (ga, gb) = match self.kind {
            BinaryKind::Add => (seed.clone(), seed.clone()),
            BinaryKind::Sub => (seed.clone(), seed.scaled(-1.0)),
            BinaryKind::Mul => (
                seed.zip_map(b, |g, y| g * y)?,
                seed.zip_map(a, |g, x| g * x)?,
            ),
            BinaryKind::Div => {
                let ga = seed.zip_map(b, |g, y| g / y)?;
                // d/db (a/b) = -(a/b) / b
                let gb = ga.zip_map(output, |g, y| -g * y)?;
                (ga, gb)
            }
        };
        Ok(vec![
            Some(reduce_to_shape(ga, a.shape())),
            Some(reduce_to_shape(gb, b.shape())),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_adjoint_matches_forward(kind: BinaryKind, a: Matrix, b: Matrix) {
        let op = Binary::new(kind);
        let y = op.evaluate(&[&a, &b]).unwrap();
        // <ȳ, J [ȧ; ḃ]> == <Jᵀ ȳ, [ȧ; ḃ]>
        let da = a.map(|x| 0.3 * x + 0.1);
        let db = b.map(|x| -0.2 * x + 0.7);
        let ybar = y.map(|x| x.sin() + 1.0);
        let dy = op.forward(&[&a, &b], &y, &[&da, &db]).unwrap();
        let lhs: f64 = dy.data().iter().zip(ybar.data()).map(|(p, q)| p * q).sum();
        let bars = op.adjoint(&[&a, &b], &y, &ybar).unwrap();
        let abar = bars[0].as_ref().unwrap();
        let bbar = bars[1].as_ref().unwrap();
        let rhs: f64 = abar.data().iter().zip(da.data()).map(|(p, q)| p * q).sum::<f64>()
            + bbar.data().iter().zip(db.data()).map(|(p, q)| p * q).sum::<f64>();
        assert!((lhs - rhs).abs() < 1e-12, "{:?}: {} vs {}", kind, lhs, rhs);
    }

    #[test]
    fn test_dot_product_identity() {
        let a = Matrix::column(&[1.0, 2.0, 3.0]);
        let b = Matrix::column(&[0.5, -1.5, 4.0]);
        for kind in [BinaryKind::Add, BinaryKind::Sub, BinaryKind::Mul, BinaryKind::Div] {
            check_adjoint_matches_forward(kind, a.clone(), b.clone());
            check_adjoint_matches_forward(kind, a.clone(), Matrix::scalar(2.5));
            check_adjoint_matches_forward(kind, Matrix::scalar(-1.5), b.clone());
        }
    }

    #[test]
    fn test_broadcast_shape() {
        let op = Binary::new(BinaryKind::Add);
        assert_eq!(op.output_shape(&[(1, 1), (3, 2)]).unwrap(), (3, 2));
        assert!(op.output_shape(&[(2, 1), (3, 1)]).is_err());
    }
}
