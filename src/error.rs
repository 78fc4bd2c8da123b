//! Error types for sensgraph

use std::fmt;

use thiserror::Error;

use crate::graph::NodeId;

/// Result type alias using sensgraph's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of the factorization lifecycle that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactorStage {
    /// Symbolic factorization (pattern analysis)
    Sfact,
    /// Numeric factorization (computing factors)
    Nfact,
    /// Triangular solve with existing factors
    Solve,
}

impl FactorStage {
    /// Short stage name as reported in error messages
    pub fn name(&self) -> &'static str {
        match self {
            FactorStage::Sfact => "sfact",
            FactorStage::Nfact => "nfact",
            FactorStage::Solve => "solve",
        }
    }
}

impl fmt::Display for FactorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Structural problems with an expression graph or its declared interface
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Handle does not belong to the graph arena
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// Declared input is not a symbolic leaf
    #[error("input {index} ({node:?}) is not a symbol; inputs must be leaves")]
    InputNotSymbol {
        /// Position in the declared input list
        index: usize,
        /// Offending node
        node: NodeId,
    },

    /// The same node was declared as input twice
    #[error("node {node:?} declared as input more than once")]
    DuplicateInput {
        /// Offending node
        node: NodeId,
    },

    /// A symbol reachable from the outputs is not among the declared inputs
    #[error("undeclared free variable '{name}' ({node:?})")]
    FreeVariable {
        /// Symbol name
        name: String,
        /// Offending node
        node: NodeId,
    },

    /// Number of supplied values does not match the declared interface
    #[error("expected {expected} {what}, got {got}")]
    CountMismatch {
        /// What was being counted (inputs, seeds, ...)
        what: &'static str,
        /// Declared count
        expected: usize,
        /// Supplied count
        got: usize,
    },

    /// Operation received the wrong number of operands
    #[error("operation '{op}' takes {expected} operands, got {got}")]
    Arity {
        /// Operation name
        op: &'static str,
        /// Operand count the operation accepts
        expected: usize,
        /// Operand count supplied
        got: usize,
    },
}

/// Errors that can occur in sensgraph operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed graph or graph interface
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Dimension mismatch between operands or between declared and supplied values
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Factorization or solve rejected by the backend
    #[error("{stage} failed: {reason}")]
    Factorization {
        /// Lifecycle stage that failed
        stage: FactorStage,
        /// Backend-provided reason
        reason: String,
    },

    /// Operation invoked in a state that does not satisfy its prerequisite
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// No backend registered under the requested name
    #[error("Linear solver backend '{name}' not found")]
    BackendNotFound {
        /// Requested backend name
        name: String,
    },

    /// Backend does not implement an optional capability
    #[error("Backend '{backend}' does not support '{operation}'")]
    NotSupported {
        /// Backend name
        backend: &'static str,
        /// Requested capability
        operation: &'static str,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create a factorization error for the given stage
    pub fn factorization(stage: FactorStage, reason: impl Into<String>) -> Self {
        Self::Factorization {
            stage,
            reason: reason.into(),
        }
    }

    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Lifecycle stage for factorization errors
    pub fn stage(&self) -> Option<FactorStage> {
        match self {
            Error::Factorization { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// True for structural and dimension errors of a graph or its interface
    pub fn is_graph_error(&self) -> bool {
        matches!(self, Error::Graph(_) | Error::ShapeMismatch { .. })
    }

    /// True for lifecycle precondition violations
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }
}
