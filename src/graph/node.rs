//! Graph nodes and their handles

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::matrix::{Matrix, Shape};

use super::Operation;

/// Stable handle of a node inside one [`super::Graph`]
///
/// Handles are dense indices into the arena and are never reused, so they
/// double as node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Position of the node in its arena
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// What a node computes
#[derive(Clone)]
pub enum NodeKind {
    /// Free variable; bound to a value when declared as a function input
    Symbol {
        /// Display name
        name: String,
    },
    /// Fixed value
    Constant(Matrix),
    /// Operation applied to the node's children
    Apply(Arc<dyn Operation>),
}

impl NodeKind {
    /// Short description used in logs and errors
    pub fn label(&self) -> &str {
        match self {
            NodeKind::Symbol { name } => name,
            NodeKind::Constant(_) => "const",
            NodeKind::Apply(op) => op.name(),
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Symbol { name } => f.debug_struct("Symbol").field("name", name).finish(),
            NodeKind::Constant(m) => f.debug_tuple("Constant").field(m).finish(),
            NodeKind::Apply(op) => f.debug_tuple("Apply").field(&op.name()).finish(),
        }
    }
}

/// One immutable entry of the arena
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) children: SmallVec<[NodeId; 4]>,
    pub(crate) shape: Shape,
}

impl Node {
    /// What the node computes
    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Operand handles, in operand order
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Shape of the node's value
    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// True for symbols
    #[inline]
    pub fn is_symbol(&self) -> bool {
        matches!(self.kind, NodeKind::Symbol { .. })
    }
}
