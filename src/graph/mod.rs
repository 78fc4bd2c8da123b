//! Symbolic expression graphs
//!
//! An expression graph is an append-only arena ([`Graph`]) of nodes addressed
//! by stable [`NodeId`] handles. A node is a symbol (a free variable that can
//! be declared as a function input), a constant, or the application of an
//! [`Operation`] to earlier nodes. Referencing the same handle from several
//! parents is how shared subexpressions are expressed; the compiler in
//! [`crate::function`] deduplicates on handle, so a shared node is computed
//! once per sweep no matter how many consumers it has.
//!
//! ```
//! # use sensgraph::graph::Graph;
//! let mut g = Graph::new();
//! let x1 = g.symbol("x1", 1, 1);
//! let x2 = g.symbol("x2", 1, 1);
//! let p = g.mul(x1, x2)?;
//! let y = g.add(p, x1)?; // x1 is shared by two parents
//! assert_eq!(g.children(y)?, &[p, x1]);
//! # Ok::<(), sensgraph::error::Error>(())
//! ```

mod expr;
mod node;
mod operation;
pub mod ops;

pub use expr::Graph;
pub use node::{Node, NodeId, NodeKind};
pub use operation::{Operation, reduce_to_shape};
