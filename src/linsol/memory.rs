//! Per-call factorization state

use std::fmt;

use log::debug;

use crate::error::{Error, FactorStage, Result};
use crate::matrix::Matrix;
use crate::sparse::{CscMatrix, SparseStorage, Sparsity};

use super::backend::FactorizationBackend;

/// Where a memory slot is in the factorization lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactorState {
    /// No usable analysis; the next numeric factorization will analyse first
    Unfactored,
    /// Pattern analysed, no valid numeric factors
    SymbolicallyFactored,
    /// Factors available; solves are allowed
    NumericallyFactored,
}

impl FactorState {
    /// True once a symbolic factorization has succeeded
    #[inline]
    pub fn is_sfact(self) -> bool {
        !matches!(self, FactorState::Unfactored)
    }

    /// True once a numeric factorization has succeeded
    #[inline]
    pub fn is_nfact(self) -> bool {
        matches!(self, FactorState::NumericallyFactored)
    }
}

/// Attach the lifecycle stage to a backend failure
fn at_stage(stage: FactorStage, err: Error) -> Error {
    match err {
        Error::Factorization { reason, .. } => Error::factorization(stage, reason),
        other => Error::factorization(stage, other.to_string()),
    }
}

/// One independent factorization of a [`super::LinearSolver`]
///
/// Each slot owns its own backend instance, so several factorizations of
/// the same kind of system can be kept alive side by side.
pub struct LinsolMemory {
    backend: Box<dyn FactorizationBackend>,
    sparsity: Sparsity,
    state: FactorState,
}

impl LinsolMemory {
    pub(crate) fn new(backend: Box<dyn FactorizationBackend>, sparsity: Sparsity) -> Self {
        Self {
            backend,
            sparsity,
            state: FactorState::Unfactored,
        }
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> FactorState {
        self.state
    }

    /// Pattern the slot was last analysed with (or created with)
    #[inline]
    pub fn sparsity(&self) -> &Sparsity {
        &self.sparsity
    }

    /// Name of the backend serving this slot
    #[inline]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Analyse a nonzero pattern
    ///
    /// Invalidates any previous factorization first, so on failure the slot
    /// is left `Unfactored`.
    pub fn symbolic_factorize(&mut self, sparsity: &Sparsity) -> Result<()> {
        self.state = FactorState::Unfactored;
        if !sparsity.is_square() {
            return Err(Error::factorization(
                FactorStage::Sfact,
                format!(
                    "matrix must be square, got {}x{}",
                    sparsity.nrows(),
                    sparsity.ncols()
                ),
            ));
        }
        if *sparsity != self.sparsity {
            self.sparsity = sparsity.clone();
        }
        self.backend
            .symbolic(&self.sparsity)
            .map_err(|e| at_stage(FactorStage::Sfact, e))?;
        self.state = FactorState::SymbolicallyFactored;
        debug!(
            "{}: symbolic factorization of {}x{} pattern ({} nonzeros, density {:.3})",
            self.backend.name(),
            self.sparsity.nrows(),
            self.sparsity.ncols(),
            self.sparsity.nnz(),
            self.sparsity.density()
        );
        Ok(())
    }

    /// Compute numeric factors
    ///
    /// Re-runs the symbolic analysis on `a`'s pattern when no analysis exists
    /// or when the pattern differs from the analysed one.
    pub fn numeric_factorize(&mut self, a: &CscMatrix) -> Result<()> {
        if !self.state.is_sfact() || *a.sparsity() != self.sparsity {
            debug!(
                "{}: (re)analysing pattern before numeric factorization",
                self.backend.name()
            );
            self.symbolic_factorize(a.sparsity())?;
        }
        self.state = FactorState::SymbolicallyFactored;
        self.backend
            .numeric(&self.sparsity, a.values())
            .map_err(|e| at_stage(FactorStage::Nfact, e))?;
        self.state = FactorState::NumericallyFactored;
        debug!("{}: numeric factorization done", self.backend.name());
        Ok(())
    }

    fn require_nfact(&self) -> Result<()> {
        if !self.state.is_nfact() {
            return Err(Error::precondition("linear system has not been factorized"));
        }
        Ok(())
    }

    fn require_cholesky(&self) -> Result<()> {
        self.require_nfact()?;
        if !self.backend.supports_cholesky() {
            return Err(Error::NotSupported {
                backend: self.backend.name(),
                operation: "cholesky",
            });
        }
        Ok(())
    }

    fn check_rhs(&self, rhs: &Matrix) -> Result<()> {
        let n = self.sparsity.nrows();
        if rhs.nrows() != n {
            return Err(Error::shape_mismatch(&[n, rhs.ncols()], &[rhs.nrows(), rhs.ncols()]));
        }
        Ok(())
    }

    /// Solve `A x = b` (or `Aᵀ x = b`) for every column of `rhs`, in place
    pub fn solve(&self, rhs: &mut Matrix, transpose: bool) -> Result<()> {
        self.require_nfact()?;
        self.check_rhs(rhs)?;
        let nrhs = rhs.ncols();
        if nrhs == 0 {
            return Ok(());
        }
        self.backend
            .solve(rhs.data_mut(), nrhs, transpose)
            .map_err(|e| at_stage(FactorStage::Solve, e))
    }

    /// Numerical rank of the factorized matrix
    pub fn rank(&self) -> Result<usize> {
        self.require_nfact()?;
        self.backend.rank()
    }

    /// Dimension of the null space, `n - rank`
    pub fn nullity(&self) -> Result<usize> {
        Ok(self.sparsity.ncols() - self.rank()?)
    }

    /// Number of negative eigenvalues of the factorized matrix
    pub fn neig(&self) -> Result<usize> {
        self.require_nfact()?;
        self.backend.neig()
    }

    /// Cholesky factor `L` (or `Lᵀ` when `transpose`)
    pub fn cholesky(&self, transpose: bool) -> Result<CscMatrix> {
        self.require_cholesky()?;
        self.backend.cholesky(transpose)
    }

    /// Pattern of the Cholesky factor
    pub fn cholesky_sparsity(&self, transpose: bool) -> Result<Sparsity> {
        self.require_cholesky()?;
        self.backend.cholesky_sparsity(transpose)
    }

    /// Solve with the triangular Cholesky factor only
    pub fn solve_cholesky(&self, rhs: &mut Matrix, transpose: bool) -> Result<()> {
        self.require_cholesky()?;
        self.check_rhs(rhs)?;
        let nrhs = rhs.ncols();
        if nrhs == 0 {
            return Ok(());
        }
        self.backend
            .solve_cholesky(rhs.data_mut(), nrhs, transpose)
            .map_err(|e| at_stage(FactorStage::Solve, e))
    }
}

impl fmt::Debug for LinsolMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinsolMemory")
            .field("backend", &self.backend.name())
            .field("shape", &self.sparsity.shape())
            .field("state", &self.state)
            .finish()
    }
}
