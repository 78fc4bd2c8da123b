//! Value, forward and adjoint sweeps over an execution plan
//!
//! All three walk the flat element array. The value and forward sweeps go in
//! plan order, the adjoint sweep in reverse. Splitting the array at the
//! current position gives shared access to the already computed children
//! and exclusive access to the current element.

use log::trace;

use crate::error::{Error, Result};
use crate::graph::NodeKind;
use crate::matrix::Matrix;

use super::plan::ExecutionPlan;

impl ExecutionPlan {
    /// Copy input values into the bound elements
    pub(crate) fn bind_inputs(&mut self, inputs: &[Matrix]) -> Result<()> {
        for (&pos, value) in self.input_bindings.iter().zip(inputs) {
            self.elements[pos].value.copy_from(value)?;
        }
        Ok(())
    }

    /// Recompute every operation node from its children's values
    pub(crate) fn value_sweep(&mut self) -> Result<()> {
        let Self {
            graph, elements, ..
        } = self;
        for i in 0..elements.len() {
            let (done, rest) = elements.split_at_mut(i);
            let el = &mut rest[0];
            let NodeKind::Apply(op) = graph.node(el.node)?.kind() else {
                continue;
            };
            let value = {
                let args: Vec<&Matrix> = el.children.iter().map(|&c| &done[c].value).collect();
                op.evaluate(&args)?
            };
            el.value.copy_from(&value)?;
            trace!("value {} {}: {:?}", i, op.name(), el.value.shape());
        }
        Ok(())
    }

    /// Propagate `seeds[d][i]` (direction `d`, input `i`) to every element
    ///
    /// Requires a current value sweep.
    pub(crate) fn forward_sweep(&mut self, seeds: &[Vec<Matrix>]) -> Result<()> {
        let ndir = seeds.len();
        self.reserve_forward(ndir);
        let Self {
            graph,
            elements,
            input_bindings,
            ..
        } = self;

        for (d, dir) in seeds.iter().enumerate() {
            for (&pos, seed) in input_bindings.iter().zip(dir) {
                elements[pos].fwd_sens[d].copy_from(seed)?;
            }
        }

        for i in 0..elements.len() {
            let (done, rest) = elements.split_at_mut(i);
            let el = &mut rest[0];
            let op = match graph.node(el.node)?.kind() {
                NodeKind::Apply(op) => op,
                NodeKind::Constant(_) => {
                    for s in &mut el.fwd_sens[..ndir] {
                        s.fill(0.0);
                    }
                    continue;
                }
                NodeKind::Symbol { .. } => continue,
            };
            let sens = {
                let args: Vec<&Matrix> = el.children.iter().map(|&c| &done[c].value).collect();
                let dir_seeds: Vec<Vec<&Matrix>> = (0..ndir)
                    .map(|d| el.children.iter().map(|&c| &done[c].fwd_sens[d]).collect())
                    .collect();
                op.forward_batch(&args, &el.value, &dir_seeds)?
            };
            if sens.len() != ndir {
                return Err(Error::Internal(format!(
                    "{}: forward returned {} directions, expected {}",
                    op.name(),
                    sens.len(),
                    ndir
                )));
            }
            for (slot, s) in el.fwd_sens.iter_mut().zip(&sens) {
                slot.copy_from(s)?;
            }
            trace!("forward {} {}: {} directions", i, op.name(), ndir);
        }
        Ok(())
    }

    /// Pull `seeds[d][o]` (direction `d`, output `o`) back to every element
    ///
    /// Requires a current value sweep. Slots are zeroed first and every
    /// contribution is added, so an element bound to several outputs or
    /// consumed by several parents accumulates all of them.
    pub(crate) fn adjoint_sweep(&mut self, seeds: &[Vec<Matrix>]) -> Result<()> {
        let ndir = seeds.len();
        self.reserve_adjoint(ndir);
        let Self {
            graph,
            elements,
            output_bindings,
            ..
        } = self;

        for el in elements.iter_mut() {
            for s in &mut el.adj_seed[..ndir] {
                s.fill(0.0);
            }
        }
        for (d, dir) in seeds.iter().enumerate() {
            for (&pos, seed) in output_bindings.iter().zip(dir) {
                elements[pos].adj_seed[d].add_assign(seed)?;
            }
        }

        for i in (0..elements.len()).rev() {
            let (done, rest) = elements.split_at_mut(i);
            let el = &rest[0];
            let NodeKind::Apply(op) = graph.node(el.node)?.kind() else {
                continue;
            };
            let contributions = {
                let args: Vec<&Matrix> = el.children.iter().map(|&c| &done[c].value).collect();
                let dir_seeds: Vec<&Matrix> = el.adj_seed[..ndir].iter().collect();
                op.adjoint_batch(&args, &el.value, &dir_seeds)?
            };
            if contributions.len() != ndir {
                return Err(Error::Internal(format!(
                    "{}: adjoint returned {} directions, expected {}",
                    op.name(),
                    contributions.len(),
                    ndir
                )));
            }
            for (d, per_child) in contributions.into_iter().enumerate() {
                if per_child.len() != el.children.len() {
                    return Err(Error::Internal(format!(
                        "{}: adjoint returned {} contributions for {} operands",
                        op.name(),
                        per_child.len(),
                        el.children.len()
                    )));
                }
                for (&c, contrib) in el.children.iter().zip(per_child) {
                    if let Some(m) = contrib {
                        done[c].adj_seed[d].add_assign(&m)?;
                    }
                }
            }
            trace!("adjoint {} {}: {} directions", i, op.name(), ndir);
        }
        Ok(())
    }
}
