//! Compiled execution plan

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::graph::{Graph, NodeId};
use crate::matrix::{Matrix, Shape};

/// Runtime storage for one reachable node
///
/// Sensitivity slots are indexed by direction and keep their allocations
/// between sweeps.
#[derive(Debug, Clone)]
pub struct RuntimeElement {
    pub(crate) node: NodeId,
    pub(crate) value: Matrix,
    pub(crate) children: SmallVec<[usize; 4]>,
    pub(crate) fwd_sens: Vec<Matrix>,
    pub(crate) adj_seed: Vec<Matrix>,
}

impl RuntimeElement {
    pub(crate) fn new(node: NodeId, shape: Shape, children: SmallVec<[usize; 4]>) -> Self {
        Self {
            node,
            value: Matrix::zeros_like_shape(shape),
            children,
            fwd_sens: vec![Matrix::zeros_like_shape(shape)],
            adj_seed: vec![Matrix::zeros_like_shape(shape)],
        }
    }

    /// Originating graph node
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Value written by the last value sweep
    #[inline]
    pub fn value(&self) -> &Matrix {
        &self.value
    }

    /// Plan positions of the operands
    #[inline]
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// Forward sensitivity of direction `dir` from the last forward sweep
    pub fn forward_sensitivity(&self, dir: usize) -> Option<&Matrix> {
        self.fwd_sens.get(dir)
    }

    /// Accumulated adjoint seed of direction `dir` from the last adjoint sweep
    pub fn adjoint_seed(&self, dir: usize) -> Option<&Matrix> {
        self.adj_seed.get(dir)
    }
}

/// Dependency-ordered sequence of runtime elements
///
/// Every child precedes its parents. Built once by [`super::compile`]; only
/// the numeric slots change afterwards.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub(crate) graph: Arc<Graph>,
    pub(crate) elements: Vec<RuntimeElement>,
    pub(crate) node_index: HashMap<NodeId, usize>,
    pub(crate) input_bindings: Vec<usize>,
    pub(crate) output_bindings: Vec<usize>,
}

impl ExecutionPlan {
    /// Graph the plan was compiled from
    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// Number of runtime elements
    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True if the plan has no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element at plan position `i`
    pub fn element(&self, i: usize) -> Option<&RuntimeElement> {
        self.elements.get(i)
    }

    /// All elements in execution order
    pub fn elements(&self) -> &[RuntimeElement] {
        &self.elements
    }

    /// Plan position of a graph node
    pub fn find(&self, node: NodeId) -> Option<usize> {
        self.node_index.get(&node).copied()
    }

    /// True if the node is part of the plan
    pub fn contains(&self, node: NodeId) -> bool {
        self.node_index.contains_key(&node)
    }

    /// Plan position bound to declared input `i`
    pub fn input_binding(&self, i: usize) -> Option<usize> {
        self.input_bindings.get(i).copied()
    }

    /// Plan position bound to declared output `o`
    pub fn output_binding(&self, o: usize) -> Option<usize> {
        self.output_bindings.get(o).copied()
    }

    /// Number of declared inputs
    pub fn n_inputs(&self) -> usize {
        self.input_bindings.len()
    }

    /// Number of declared outputs
    pub fn n_outputs(&self) -> usize {
        self.output_bindings.len()
    }

    /// Make room for `ndir` forward directions
    pub(crate) fn reserve_forward(&mut self, ndir: usize) {
        for el in &mut self.elements {
            let shape = el.value.shape();
            while el.fwd_sens.len() < ndir {
                el.fwd_sens.push(Matrix::zeros_like_shape(shape));
            }
        }
    }

    /// Make room for `ndir` adjoint directions
    pub(crate) fn reserve_adjoint(&mut self, ndir: usize) {
        for el in &mut self.elements {
            let shape = el.value.shape();
            while el.adj_seed.len() < ndir {
                el.adj_seed.push(Matrix::zeros_like_shape(shape));
            }
        }
    }
}
