//! User-facing linear solver handle

use log::debug;

use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::sparse::{CscMatrix, SparseStorage, Sparsity};

use super::memory::{FactorState, LinsolMemory};
use super::options::LinsolOptions;
use super::registry::create_backend;

/// Linear solver for systems with a given nonzero pattern
///
/// Wraps a named backend and tracks the symbolic/numeric factorization
/// lifecycle. Lifecycle calls on the handle act on memory slot 0; further
/// independent slots are obtained with [`checkout`](Self::checkout).
///
/// ```
/// # use sensgraph::linsol::LinearSolver;
/// # use sensgraph::matrix::Matrix;
/// # use sensgraph::sparse::{CscMatrix, Sparsity};
/// let a = Matrix::from_rows(&[[4.0, 1.0], [1.0, 3.0]]);
/// let mut solver = LinearSolver::new("demo", "lu", Sparsity::dense(2, 2))?;
/// solver.numeric_factorize(&CscMatrix::from_dense_full(&a))?;
/// let mut x = Matrix::column(&[1.0, 2.0]);
/// solver.solve(&mut x, false)?;
/// assert!((4.0 * x.get(0, 0) + x.get(1, 0) - 1.0).abs() < 1e-12);
/// # Ok::<(), sensgraph::error::Error>(())
/// ```
#[derive(Debug)]
pub struct LinearSolver {
    name: String,
    plugin: String,
    sparsity: Sparsity,
    options: LinsolOptions,
    primary: LinsolMemory,
    // Slots 1.. from checkout; `None` once released
    extra: Vec<Option<LinsolMemory>>,
}

impl LinearSolver {
    /// Create a solver using the registered backend `plugin`
    pub fn new(name: &str, plugin: &str, sparsity: Sparsity) -> Result<Self> {
        Self::with_options(name, plugin, sparsity, LinsolOptions::default())
    }

    /// Create a solver with explicit backend options
    pub fn with_options(
        name: &str,
        plugin: &str,
        sparsity: Sparsity,
        options: LinsolOptions,
    ) -> Result<Self> {
        let backend = create_backend(plugin, &options)?;
        debug!(
            "linear solver '{}' using '{}' for {}x{} pattern",
            name,
            plugin,
            sparsity.nrows(),
            sparsity.ncols()
        );
        let primary = LinsolMemory::new(backend, sparsity.clone());
        Ok(Self {
            name: name.to_string(),
            plugin: plugin.to_string(),
            sparsity,
            options,
            primary,
            extra: Vec::new(),
        })
    }

    /// Name given at construction
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry name of the backend
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Pattern currently analysed by slot 0
    pub fn sparsity(&self) -> &Sparsity {
        self.primary.sparsity()
    }

    /// Backend options
    pub fn options(&self) -> &LinsolOptions {
        &self.options
    }

    /// Lifecycle state of slot 0
    pub fn state(&self) -> FactorState {
        self.primary.state()
    }

    // ========================================================================
    // Memory slots
    // ========================================================================

    /// Allocate an independent memory slot and return its index
    pub fn checkout(&mut self) -> Result<usize> {
        let backend = create_backend(&self.plugin, &self.options)?;
        let slot = LinsolMemory::new(backend, self.sparsity.clone());
        if let Some(free) = self.extra.iter().position(Option::is_none) {
            self.extra[free] = Some(slot);
            return Ok(free + 1);
        }
        self.extra.push(Some(slot));
        Ok(self.extra.len())
    }

    /// Free a slot obtained from [`checkout`](Self::checkout)
    pub fn release(&mut self, mem: usize) -> Result<()> {
        if mem == 0 {
            return Err(Error::InvalidArgument {
                arg: "mem",
                reason: "slot 0 belongs to the handle and cannot be released".to_string(),
            });
        }
        match self.extra.get_mut(mem - 1) {
            Some(slot @ Some(_)) => {
                *slot = None;
                Ok(())
            }
            _ => Err(Self::bad_slot(mem)),
        }
    }

    fn bad_slot(mem: usize) -> Error {
        Error::InvalidArgument {
            arg: "mem",
            reason: format!("no memory slot {}", mem),
        }
    }

    /// Number of live memory slots
    pub fn n_memories(&self) -> usize {
        1 + self.extra.iter().filter(|m| m.is_some()).count()
    }

    /// Access a memory slot
    pub fn memory(&self, mem: usize) -> Result<&LinsolMemory> {
        if mem == 0 {
            return Ok(&self.primary);
        }
        self.extra
            .get(mem - 1)
            .and_then(Option::as_ref)
            .ok_or_else(|| Self::bad_slot(mem))
    }

    /// Mutable access to a memory slot
    pub fn memory_mut(&mut self, mem: usize) -> Result<&mut LinsolMemory> {
        if mem == 0 {
            return Ok(&mut self.primary);
        }
        self.extra
            .get_mut(mem - 1)
            .and_then(Option::as_mut)
            .ok_or_else(|| Self::bad_slot(mem))
    }

    // ========================================================================
    // Lifecycle (slot 0)
    // ========================================================================

    /// Analyse a nonzero pattern; see [`LinsolMemory::symbolic_factorize`]
    pub fn symbolic_factorize(&mut self, sparsity: &Sparsity) -> Result<()> {
        self.primary.symbolic_factorize(sparsity)
    }

    /// Compute numeric factors; see [`LinsolMemory::numeric_factorize`]
    pub fn numeric_factorize(&mut self, a: &CscMatrix) -> Result<()> {
        self.primary.numeric_factorize(a)
    }

    /// Solve in place for every column of `rhs`
    pub fn solve(&self, rhs: &mut Matrix, transpose: bool) -> Result<()> {
        self.primary.solve(rhs, transpose)
    }

    /// Numerical rank
    pub fn rank(&self) -> Result<usize> {
        self.primary.rank()
    }

    /// Dimension of the null space
    pub fn nullity(&self) -> Result<usize> {
        self.primary.nullity()
    }

    /// Number of negative eigenvalues
    pub fn neig(&self) -> Result<usize> {
        self.primary.neig()
    }

    /// Cholesky factor
    pub fn cholesky(&self, transpose: bool) -> Result<CscMatrix> {
        self.primary.cholesky(transpose)
    }

    /// Pattern of the Cholesky factor
    pub fn cholesky_sparsity(&self, transpose: bool) -> Result<Sparsity> {
        self.primary.cholesky_sparsity(transpose)
    }

    /// Solve with the triangular Cholesky factor only
    pub fn solve_cholesky(&self, rhs: &mut Matrix, transpose: bool) -> Result<()> {
        self.primary.solve_cholesky(rhs, transpose)
    }

    /// One-shot dense solve: factorize `a` and return the solution for `b`
    ///
    /// `a` is taken with a fully dense pattern; `b` is not modified.
    pub fn solve_dense(&mut self, a: &Matrix, b: &Matrix, transpose: bool) -> Result<Matrix> {
        if a.nrows() != b.nrows() {
            return Err(Error::shape_mismatch(
                &[a.nrows(), b.ncols()],
                &[b.nrows(), b.ncols()],
            ));
        }
        let a = CscMatrix::from_dense_full(a);
        self.symbolic_factorize(a.sparsity())?;
        self.numeric_factorize(&a)?;
        let mut x = b.clone();
        self.solve(&mut x, transpose)?;
        Ok(x)
    }
}
