//! Matrix product, transpose and reduction

use crate::error::{Error, Result};
use crate::graph::Operation;
use crate::matrix::{Matrix, Shape};

use super::check_arity;

/// Matrix product `a * b`
#[derive(Debug, Clone, Copy, Default)]
pub struct MatMul;

impl Operation for MatMul {
    fn name(&self) -> &'static str {
        "matmul"
    }

    fn arity(&self) -> usize {
        2
    }

    fn output_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        check_arity(self.name(), 2, inputs.len())?;
        let ((m, k), (k2, n)) = (inputs[0], inputs[1]);
        if k != k2 {
            return Err(Error::shape_mismatch(&[k, n], &[k2, n]));
        }
        Ok((m, n))
    }

    fn evaluate(&self, inputs: &[&Matrix]) -> Result<Matrix> {
        check_arity(self.name(), 2, inputs.len())?;
        inputs[0].matmul(inputs[1])
    }

    fn forward(&self, inputs: &[&Matrix], _output: &Matrix, seeds: &[&Matrix]) -> Result<Matrix> {
        check_arity(self.name(), 2, seeds.len())?;
        // d(AB) = dA B + A dB
        let mut out = seeds[0].matmul(inputs[1])?;
        out.add_assign(&inputs[0].matmul(seeds[1])?)?;
        Ok(out)
    }

    fn adjoint(
        &self,
        inputs: &[&Matrix],
        _output: &Matrix,
        seed: &Matrix,
    ) -> Result<Vec<Option<Matrix>>> {
        let abar = seed.matmul(&inputs[1].transpose())?;
        let bbar = inputs[0].transpose().matmul(seed)?;
        Ok(vec![Some(abar), Some(bbar)])
    }
}

/// Transpose
#[derive(Debug, Clone, Copy, Default)]
pub struct Transpose;

impl Operation for Transpose {
    fn name(&self) -> &'static str {
        "transpose"
    }

    fn arity(&self) -> usize {
        1
    }

    fn output_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        check_arity(self.name(), 1, inputs.len())?;
        let (m, n) = inputs[0];
        Ok((n, m))
    }

    fn evaluate(&self, inputs: &[&Matrix]) -> Result<Matrix> {
        check_arity(self.name(), 1, inputs.len())?;
        Ok(inputs[0].transpose())
    }

    fn forward(&self, _inputs: &[&Matrix], _output: &Matrix, seeds: &[&Matrix]) -> Result<Matrix> {
        check_arity(self.name(), 1, seeds.len())?;
        Ok(seeds[0].transpose())
    }

    fn adjoint(
        &self,
        _inputs: &[&Matrix],
        _output: &Matrix,
        seed: &Matrix,
    ) -> Result<Vec<Option<Matrix>>> {
        Ok(vec![Some(seed.transpose())])
    }
}

/// Sum of all elements
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Operation for Sum {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn arity(&self) -> usize {
        1
    }

    fn output_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        check_arity(self.name(), 1, inputs.len())?;
        Ok((1, 1))
    }

    fn evaluate(&self, inputs: &[&Matrix]) -> Result<Matrix> {
        check_arity(self.name(), 1, inputs.len())?;
        Ok(Matrix::scalar(inputs[0].sum()))
    }

    fn forward(&self, _inputs: &[&Matrix], _output: &Matrix, seeds: &[&Matrix]) -> Result<Matrix> {
        check_arity(self.name(), 1, seeds.len())?;
        Ok(Matrix::scalar(seeds[0].sum()))
    }

    fn adjoint(
        &self,
        inputs: &[&Matrix],
        _output: &Matrix,
        seed: &Matrix,
    ) -> Result<Vec<Option<Matrix>>> {
        let g = seed.as_scalar().ok_or_else(|| {
            Error::shape_mismatch(&[1, 1], &[seed.nrows(), seed.ncols()])
        })?;
        let mut out = Matrix::zeros_like_shape(inputs[0].shape());
        out.fill(g);
        Ok(vec![Some(out)])
    }
}
