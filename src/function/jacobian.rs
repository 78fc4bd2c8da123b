//! Dense Jacobian blocks

use log::debug;

use crate::error::{Error, Result};
use crate::matrix::{Matrix, Shape};

use super::Function;

impl Function {
    /// Dense Jacobian of output `output` with respect to input `input`
    ///
    /// Row `k` corresponds to element `k` of the output and column `j` to
    /// element `j` of the input, both in column-major order. Uses one forward
    /// direction per input element when the input is the smaller side, one
    /// adjoint direction per output element otherwise.
    pub fn jacobian(&mut self, input: usize, output: usize, inputs: &[Matrix]) -> Result<Matrix> {
        let in_shape = self.input_shape(input).ok_or_else(|| Error::InvalidArgument {
            arg: "input",
            reason: format!("index {} out of range for {} inputs", input, self.n_inputs()),
        })?;
        let out_shape = self.output_shape(output).ok_or_else(|| Error::InvalidArgument {
            arg: "output",
            reason: format!("index {} out of range for {} outputs", output, self.n_outputs()),
        })?;
        let n_in = in_shape.0 * in_shape.1;
        let n_out = out_shape.0 * out_shape.1;
        let mut jac = Matrix::zeros(n_out, n_in);

        if n_in <= n_out {
            debug!("{}: jacobian {}x{} by {} forward directions", self.name(), n_out, n_in, n_in);
            let seeds: Vec<Vec<Matrix>> = (0..n_in)
                .map(|j| unit_seeds(self.n_inputs(), input, j, |i| self.input_shape(i)))
                .collect();
            let fwd = self.forward(inputs, &seeds)?;
            for (j, dir) in fwd.sensitivities.iter().enumerate() {
                for (k, &v) in dir[output].data().iter().enumerate() {
                    jac.set(k, j, v);
                }
            }
        } else {
            debug!("{}: jacobian {}x{} by {} adjoint directions", self.name(), n_out, n_in, n_out);
            let seeds: Vec<Vec<Matrix>> = (0..n_out)
                .map(|k| unit_seeds(self.n_outputs(), output, k, |o| self.output_shape(o)))
                .collect();
            let adj = self.adjoint(inputs, &seeds)?;
            for (k, dir) in adj.sensitivities.iter().enumerate() {
                for (j, &v) in dir[input].data().iter().enumerate() {
                    jac.set(k, j, v);
                }
            }
        }
        Ok(jac)
    }
}

/// Zero seeds for every slot except a unit at element `elem` of `slot`
fn unit_seeds(
    count: usize,
    slot: usize,
    elem: usize,
    shape_of: impl Fn(usize) -> Option<Shape>,
) -> Vec<Matrix> {
    (0..count)
        .map(|s| {
            let mut m = Matrix::zeros_like_shape(shape_of(s).unwrap_or((0, 0)));
            if s == slot {
                m.data_mut()[elem] = 1.0;
            }
            m
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::graph::Graph;

    use super::*;

    #[test]
    fn test_forward_and_adjoint_paths_agree() {
        // y = A x with A 3x2 (forward path), z = sum(y) (adjoint path)
        let mut g = Graph::new();
        let x = g.symbol("x", 2, 1);
        let a = g.constant(Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]));
        let y = g.matmul(a, x).unwrap();
        let z = g.sum(y).unwrap();
        let mut f = Function::new("f", Arc::new(g), &[x], &[y, z]).unwrap();
        let inputs = [Matrix::column(&[0.5, -1.0])];

        let jy = f.jacobian(0, 0, &inputs).unwrap();
        assert_eq!(jy, Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]));
        let jz = f.jacobian(0, 1, &inputs).unwrap();
        assert_eq!(jz, Matrix::from_rows(&[[9.0, 12.0]]));
    }

    #[test]
    fn test_out_of_range_indices() {
        let mut g = Graph::new();
        let x = g.symbol("x", 1, 1);
        let y = g.exp(x).unwrap();
        let mut f = Function::new("f", Arc::new(g), &[x], &[y]).unwrap();
        let inputs = [Matrix::scalar(0.0)];
        assert!(matches!(
            f.jacobian(1, 0, &inputs),
            Err(Error::InvalidArgument { arg: "input", .. })
        ));
        assert!(f.jacobian(0, 2, &inputs).is_err());
        assert_eq!(f.jacobian(0, 0, &inputs).unwrap().as_scalar(), Some(1.0));
    }
}
