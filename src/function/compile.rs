//! Graph compiler
//!
//! Turns the part of a [`Graph`] reachable from the declared outputs into an
//! [`ExecutionPlan`]: a depth-first post-order traversal with a visited set
//! keyed by [`NodeId`], so each shared subexpression becomes exactly one
//! runtime element.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;
use smallvec::SmallVec;

use crate::error::{GraphError, Result};
use crate::graph::{Graph, NodeId, NodeKind};

use super::plan::{ExecutionPlan, RuntimeElement};

/// Compile `graph` for the given inputs and outputs
///
/// Inputs must be distinct symbols. Every symbol reachable from an output
/// must be a declared input. Declared inputs that no output depends on are
/// still bound (their sensitivities are zero).
///
/// # Errors
///
/// - [`GraphError::UnknownNode`] for a handle outside the arena
/// - [`GraphError::InputNotSymbol`] if an input is a constant or an operation
/// - [`GraphError::DuplicateInput`] if a node is declared as input twice
/// - [`GraphError::FreeVariable`] for a reachable, undeclared symbol
pub fn compile(graph: Arc<Graph>, inputs: &[NodeId], outputs: &[NodeId]) -> Result<ExecutionPlan> {
    let mut elements: Vec<RuntimeElement> = Vec::new();
    let mut node_index: HashMap<NodeId, usize> = HashMap::new();
    let mut declared: HashSet<NodeId> = HashSet::with_capacity(inputs.len());

    // Inputs are leaves, so placing them first keeps the order topological
    let mut input_bindings = Vec::with_capacity(inputs.len());
    for (index, &id) in inputs.iter().enumerate() {
        let node = graph.node(id)?;
        if !node.is_symbol() {
            return Err(GraphError::InputNotSymbol { index, node: id }.into());
        }
        if !declared.insert(id) {
            return Err(GraphError::DuplicateInput { node: id }.into());
        }
        node_index.insert(id, elements.len());
        input_bindings.push(elements.len());
        elements.push(RuntimeElement::new(id, node.shape(), SmallVec::new()));
    }

    // Iterative DFS; each stack entry is (node, next child to visit)
    let mut stack: Vec<(NodeId, usize)> = Vec::new();
    for &root in outputs {
        graph.node(root)?;
        if node_index.contains_key(&root) {
            continue;
        }
        stack.push((root, 0));
        while let Some(top) = stack.last_mut() {
            let (id, next) = *top;
            let node = graph.node(id)?;
            if let Some(&child) = node.children().get(next) {
                top.1 += 1;
                if !node_index.contains_key(&child) {
                    stack.push((child, 0));
                }
                continue;
            }
            stack.pop();
            // Reached twice through a diamond before finishing
            if node_index.contains_key(&id) {
                continue;
            }
            if let NodeKind::Symbol { name } = node.kind() {
                return Err(GraphError::FreeVariable {
                    name: name.clone(),
                    node: id,
                }
                .into());
            }
            let children = node
                .children()
                .iter()
                .map(|c| {
                    node_index
                        .get(c)
                        .copied()
                        .ok_or(GraphError::UnknownNode(*c))
                })
                .collect::<std::result::Result<SmallVec<[usize; 4]>, _>>()?;
            let mut element = RuntimeElement::new(id, node.shape(), children);
            if let NodeKind::Constant(value) = node.kind() {
                element.value.copy_from(value)?;
            }
            node_index.insert(id, elements.len());
            elements.push(element);
        }
    }

    let output_bindings = outputs
        .iter()
        .map(|o| node_index.get(o).copied().ok_or(GraphError::UnknownNode(*o)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(
        "compiled plan: {} elements from {} graph nodes, {} inputs, {} outputs",
        elements.len(),
        graph.len(),
        input_bindings.len(),
        output_bindings.len()
    );

    Ok(ExecutionPlan {
        graph,
        elements,
        node_index,
        input_bindings,
        output_bindings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::matrix::Matrix;

    #[test]
    fn test_shared_node_compiled_once() {
        let mut g = Graph::new();
        let x = g.symbol("x", 1, 1);
        let s = g.sin(x).unwrap();
        let a = g.mul(s, s).unwrap();
        let b = g.add(a, s).unwrap();
        let g = Arc::new(g);
        let plan = compile(g.clone(), &[x], &[b, a]).unwrap();

        assert_eq!(plan.len(), 4);
        assert_eq!(plan.elements().iter().filter(|e| e.node() == s).count(), 1);
        for (i, el) in plan.elements().iter().enumerate() {
            for &c in el.children() {
                assert!(c < i);
            }
        }
        assert_eq!(plan.output_binding(0), plan.find(b));
        assert_eq!(plan.output_binding(1), plan.find(a));
        let a_el = plan.element(plan.find(a).unwrap()).unwrap();
        let s_pos = plan.find(s).unwrap();
        assert_eq!(a_el.children(), &[s_pos, s_pos]);
    }

    #[test]
    fn test_unreached_nodes_left_out() {
        let mut g = Graph::new();
        let x = g.symbol("x", 1, 1);
        let used = g.exp(x).unwrap();
        let unused = g.cos(x).unwrap();
        let plan = compile(Arc::new(g), &[x], &[used]).unwrap();
        assert!(plan.contains(used));
        assert!(!plan.contains(unused));
    }

    #[test]
    fn test_free_variable_rejected() {
        let mut g = Graph::new();
        let x = g.symbol("x", 1, 1);
        let p = g.symbol("p", 1, 1);
        let y = g.mul(x, p).unwrap();
        let err = compile(Arc::new(g), &[x], &[y]).unwrap_err();
        assert!(matches!(
            err,
            Error::Graph(GraphError::FreeVariable { ref name, node }) if name == "p" && node == p
        ));
    }

    #[test]
    fn test_inputs_must_be_distinct_symbols() {
        let mut g = Graph::new();
        let x = g.symbol("x", 1, 1);
        let c = g.scalar(2.0);
        let y = g.mul(x, c).unwrap();
        let g = Arc::new(g);

        let err = compile(g.clone(), &[y], &[y]).unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::InputNotSymbol { index: 0, .. })));
        let err = compile(g.clone(), &[x, c], &[y]).unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::InputNotSymbol { index: 1, .. })));
        let err = compile(g.clone(), &[x, x], &[y]).unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::DuplicateInput { .. })));
        let err = compile(g, &[x], &[NodeId(99)]).unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::UnknownNode(_))));
    }

    #[test]
    fn test_constants_and_unused_inputs() {
        let mut g = Graph::new();
        let x = g.symbol("x", 2, 1);
        let unused = g.symbol("u", 3, 1);
        let c = g.constant(Matrix::column(&[1.0, 2.0]));
        let y = g.add(x, c).unwrap();
        let plan = compile(Arc::new(g), &[x, unused], &[y, c]).unwrap();
        assert_eq!(plan.input_binding(1), Some(1));
        let c_el = plan.element(plan.find(c).unwrap()).unwrap();
        assert_eq!(c_el.value().data(), &[1.0, 2.0]);
        assert_eq!(plan.n_outputs(), 2);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let mut g = Graph::new();
        let x = g.symbol("x", 1, 1);
        let mut y = x;
        for _ in 0..50_000 {
            y = g.neg(y).unwrap();
        }
        let plan = compile(Arc::new(g), &[x], &[y]).unwrap();
        assert_eq!(plan.len(), 50_001);
    }
}
