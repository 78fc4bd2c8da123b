//! Dense Householder QR with column pivoting
//!
//! `A P = Q R` with `Q = H_0 H_1 ... H_{n-1}`. Column pivoting makes the
//! diagonal of R non-increasing in magnitude, so the factorization succeeds
//! on singular matrices and reports their numerical rank; only solves
//! require full rank.

use crate::error::{Error, FactorStage, Result};
use crate::linsol::{FactorizationBackend, LinsolOptions};
use crate::sparse::Sparsity;

use super::{densify, numerical_rank, validate_rhs, validate_structurally_nonsingular, validate_values};

#[derive(Debug, Clone)]
struct DenseQr {
    n: usize,
    // R on and above the diagonal, column-major
    r: Vec<f64>,
    // Householder vectors; reflector k acts on rows k..n
    reflectors: Vec<Vec<f64>>,
    betas: Vec<f64>,
    // (A P)[:, k] = A[:, perm[k]]
    perm: Vec<usize>,
    rank: usize,
}

impl DenseQr {
    #[inline]
    fn r_at(&self, i: usize, j: usize) -> f64 {
        self.r[j * self.n + i]
    }

    fn reflect(&self, k: usize, x: &mut [f64]) {
        let v = &self.reflectors[k];
        let beta = self.betas[k];
        if beta == 0.0 {
            return;
        }
        let tail = &mut x[k..];
        let s: f64 = v.iter().zip(tail.iter()).map(|(a, b)| a * b).sum();
        let s = beta * s;
        for (t, &vi) in tail.iter_mut().zip(v) {
            *t -= s * vi;
        }
    }

    fn solve_in_place(&self, b: &mut [f64], work: &mut [f64]) {
        let n = self.n;
        // c = Qᵀ b
        work.copy_from_slice(b);
        for k in 0..n {
            self.reflect(k, work);
        }
        // R y = c
        for j in (0..n).rev() {
            work[j] /= self.r_at(j, j);
            let yj = work[j];
            for i in 0..j {
                work[i] -= self.r_at(i, j) * yj;
            }
        }
        // x = P y
        for k in 0..n {
            b[self.perm[k]] = work[k];
        }
    }

    fn solve_transposed_in_place(&self, b: &mut [f64], work: &mut [f64]) {
        let n = self.n;
        // Aᵀ = P Rᵀ Qᵀ, so Rᵀ (Qᵀ x) = Pᵀ b
        for k in 0..n {
            work[k] = b[self.perm[k]];
        }
        for i in 0..n {
            let mut s = work[i];
            for k in 0..i {
                s -= self.r_at(k, i) * work[k];
            }
            work[i] = s / self.r_at(i, i);
        }
        // x = Q z
        for k in (0..n).rev() {
            self.reflect(k, work);
        }
        b.copy_from_slice(work);
    }
}

/// Rank-revealing dense QR backend (`qr`)
#[derive(Debug, Clone)]
pub struct QrBackend {
    options: LinsolOptions,
    n: Option<usize>,
    factors: Option<DenseQr>,
}

impl QrBackend {
    /// Registry name
    pub const NAME: &'static str = "qr";

    /// Create an unfactored backend
    pub fn new(options: LinsolOptions) -> Self {
        Self {
            options,
            n: None,
            factors: None,
        }
    }

    fn factors(&self) -> Result<&DenseQr> {
        self.factors
            .as_ref()
            .ok_or_else(|| Error::Internal("qr: no numeric factors".to_string()))
    }
}

impl FactorizationBackend for QrBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn symbolic(&mut self, sparsity: &Sparsity) -> Result<()> {
        self.n = None;
        self.factors = None;
        self.n = Some(validate_structurally_nonsingular(sparsity)?);
        Ok(())
    }

    fn numeric(&mut self, sparsity: &Sparsity, values: &[f64]) -> Result<()> {
        self.factors = None;
        let n = validate_values(self.n, sparsity, values)?;
        let mut a = densify(sparsity, values);
        let mut perm: Vec<usize> = (0..n).collect();
        let mut reflectors = Vec::with_capacity(n);
        let mut betas = Vec::with_capacity(n);

        for k in 0..n {
            // Pivot on the largest remaining column norm
            let col_norm2 = |a: &[f64], j: usize| -> f64 {
                a[j * n + k..(j + 1) * n].iter().map(|v| v * v).sum()
            };
            let mut pivot = k;
            let mut best = col_norm2(a.as_slice(), k);
            for j in (k + 1)..n {
                let norm = col_norm2(a.as_slice(), j);
                if norm > best {
                    best = norm;
                    pivot = j;
                }
            }
            if pivot != k {
                for i in 0..n {
                    a.swap(k * n + i, pivot * n + i);
                }
                perm.swap(k, pivot);
            }

            // Householder reflector mapping a[k.., k] onto alpha e_k
            let norm = best.sqrt();
            let mut v: Vec<f64> = a[k * n + k..(k + 1) * n].to_vec();
            if norm == 0.0 {
                reflectors.push(v);
                betas.push(0.0);
                continue;
            }
            let alpha = if v[0] >= 0.0 { -norm } else { norm };
            v[0] -= alpha;
            let vnorm2: f64 = v.iter().map(|x| x * x).sum();
            let beta = if vnorm2 > 0.0 { 2.0 / vnorm2 } else { 0.0 };

            for j in k..n {
                let col = &mut a[j * n + k..(j + 1) * n];
                let s: f64 = beta * v.iter().zip(col.iter()).map(|(p, q)| p * q).sum::<f64>();
                for (c, &vi) in col.iter_mut().zip(&v) {
                    *c -= s * vi;
                }
            }
            a[k * n + k] = alpha;
            for i in (k + 1)..n {
                a[k * n + i] = 0.0;
            }
            reflectors.push(v);
            betas.push(beta);
        }

        let rank = numerical_rank((0..n).map(|k| a[k * n + k]), self.options.rank_tolerance);
        self.factors = Some(DenseQr {
            n,
            r: a,
            reflectors,
            betas,
            perm,
            rank,
        });
        Ok(())
    }

    fn solve(&self, rhs: &mut [f64], nrhs: usize, transpose: bool) -> Result<()> {
        let f = self.factors()?;
        validate_rhs(f.n, rhs, nrhs)?;
        if f.rank < f.n {
            return Err(Error::factorization(
                FactorStage::Solve,
                format!("matrix is rank deficient (rank {} < {})", f.rank, f.n),
            ));
        }
        if f.n == 0 {
            return Ok(());
        }
        let mut work = vec![0.0; f.n];
        for b in rhs.chunks_mut(f.n) {
            if transpose {
                f.solve_transposed_in_place(b, &mut work);
            } else {
                f.solve_in_place(b, &mut work);
            }
        }
        Ok(())
    }

    fn rank(&self) -> Result<usize> {
        Ok(self.factors()?.rank)
    }
}
