//! Query graph for incremental maintenance of live queries.
//!
//! This module provides the node arena, the structural deduplication of
//! filters and compositions, and the update/propagation algorithm.

mod graph;
pub mod node;

pub use graph::QueryGraph;
pub use node::{CompositeNode, FilterNode, Node, NodeKind, PredicateFn};
