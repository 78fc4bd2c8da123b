//! Expression arena

use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{Error, GraphError, Result};
use crate::matrix::{Matrix, Shape};
use crate::sparse::Sparsity;

use super::node::{Node, NodeId, NodeKind};
use super::ops::{Binary, BinaryKind, MatMul, Solve, Sum, Transpose, Unary, UnaryKind};
use super::Operation;

/// Append-only arena of expression nodes
///
/// Children are always added before their parents, so arena order is itself
/// a valid evaluation order; the compiler still performs its own traversal
/// to restrict evaluation to what the declared outputs need.
///
/// A `Graph` is immutable once shared: wrap it in an `Arc` and hand it to as
/// many compiled functions as needed.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the graph has no nodes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.index())
            .ok_or(Error::Graph(GraphError::UnknownNode(id)))
    }

    /// Operand handles of a node
    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.node(id)?.children())
    }

    /// Shape of a node's value
    pub fn shape(&self, id: NodeId) -> Result<Shape> {
        Ok(self.node(id)?.shape())
    }

    /// Iterate over all handles in arena order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| NodeId(i as u32))
    }

    fn push(&mut self, kind: NodeKind, children: SmallVec<[NodeId; 4]>, shape: Shape) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            children,
            shape,
        });
        id
    }

    /// Add a free variable of the given shape
    pub fn symbol(&mut self, name: impl Into<String>, nrows: usize, ncols: usize) -> NodeId {
        self.push(
            NodeKind::Symbol { name: name.into() },
            SmallVec::new(),
            (nrows, ncols),
        )
    }

    /// Add a constant
    pub fn constant(&mut self, value: Matrix) -> NodeId {
        let shape = value.shape();
        self.push(NodeKind::Constant(value), SmallVec::new(), shape)
    }

    /// Add a 1x1 constant
    pub fn scalar(&mut self, value: f64) -> NodeId {
        self.constant(Matrix::scalar(value))
    }

    /// Apply an operation to existing nodes
    pub fn apply(&mut self, op: impl Operation + 'static, children: &[NodeId]) -> Result<NodeId> {
        self.apply_shared(Arc::new(op), children)
    }

    /// Apply a shared operation instance to existing nodes
    pub fn apply_shared(&mut self, op: Arc<dyn Operation>, children: &[NodeId]) -> Result<NodeId> {
        if children.len() != op.arity() {
            return Err(GraphError::Arity {
                op: op.name(),
                expected: op.arity(),
                got: children.len(),
            }
            .into());
        }
        let shapes = children
            .iter()
            .map(|&c| self.shape(c))
            .collect::<Result<Vec<_>>>()?;
        let shape = op.output_shape(&shapes)?;
        Ok(self.push(NodeKind::Apply(op), children.iter().copied().collect(), shape))
    }

    /// Elementwise `a + b`
    pub fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply(Binary::new(BinaryKind::Add), &[a, b])
    }

    /// Elementwise `a - b`
    pub fn sub(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply(Binary::new(BinaryKind::Sub), &[a, b])
    }

    /// Elementwise `a * b`
    pub fn mul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply(Binary::new(BinaryKind::Mul), &[a, b])
    }

    /// Elementwise `a / b`
    pub fn div(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply(Binary::new(BinaryKind::Div), &[a, b])
    }

    /// Elementwise `-a`
    pub fn neg(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply(Unary::new(UnaryKind::Neg), &[a])
    }

    /// Elementwise `sin(a)`
    pub fn sin(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply(Unary::new(UnaryKind::Sin), &[a])
    }

    /// Elementwise `cos(a)`
    pub fn cos(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply(Unary::new(UnaryKind::Cos), &[a])
    }

    /// Elementwise `exp(a)`
    pub fn exp(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply(Unary::new(UnaryKind::Exp), &[a])
    }

    /// Elementwise natural logarithm
    pub fn log(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply(Unary::new(UnaryKind::Log), &[a])
    }

    /// Elementwise square root
    pub fn sqrt(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply(Unary::new(UnaryKind::Sqrt), &[a])
    }

    /// Matrix product `a * b`
    pub fn matmul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply(MatMul, &[a, b])
    }

    /// Transpose
    pub fn transpose(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply(Transpose, &[a])
    }

    /// Sum of all elements, as a 1x1 value
    pub fn sum(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply(Sum, &[a])
    }

    /// Solve `A x = b` (or `Aᵀ x = b`) with a dense pattern for `A`
    ///
    /// `backend` names a registered factorization backend.
    pub fn solve(&mut self, a: NodeId, b: NodeId, backend: &str, transpose: bool) -> Result<NodeId> {
        let (n, m) = self.shape(a)?;
        self.solve_sparse(a, b, backend, Sparsity::dense(n, m), transpose)
    }

    /// Solve `A x = b` (or `Aᵀ x = b`) where `A` has the given nonzero pattern
    ///
    /// Entries of `A` outside `sparsity` are ignored.
    pub fn solve_sparse(
        &mut self,
        a: NodeId,
        b: NodeId,
        backend: &str,
        sparsity: Sparsity,
        transpose: bool,
    ) -> Result<NodeId> {
        let op = Solve::new(backend, sparsity, transpose)?;
        self.apply(op, &[a, b])
    }
}
