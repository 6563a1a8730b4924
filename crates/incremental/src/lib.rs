//! Vigil Incremental - incremental maintenance of live entity queries.
//!
//! Queries are nodes of a small dataflow graph. Filter nodes hold a
//! predicate over one entity plus the attribute keys it depends on;
//! composite nodes intersect other nodes. Every node keeps a materialized
//! snapshot of the entities currently matching it, and mutations are pushed
//! through the graph instead of re-running queries.
//!
//! # Core Concepts
//!
//! - `EntityStore`: Owns entities and allocates their ids
//! - `InfluenceTable`: Entity -> filter nodes its changes can affect
//! - `PredicateCache`: Bounded LRU of last predicate outcomes per filter
//! - `QueryGraph`: Node arena, deduplication and the update algorithm
//! - `NodeChange`: A membership delta of one node for one entity
//!
//! # Example
//!
//! ```rust
//! use vigil_core::{attrs, DependencySpec, Entity, Value};
//! use vigil_incremental::{EntityStore, NodeChange, QueryGraph};
//!
//! let mut store = EntityStore::new();
//! let mut graph = QueryGraph::new();
//!
//! let alive = graph
//!     .register_filter(
//!         &store,
//!         "flag(alive)",
//!         DependencySpec::key("alive"),
//!         Box::new(|e: &Entity| Ok(e.get("alive").map_or(false, Value::is_truthy))),
//!     )
//!     .unwrap();
//!
//! let id = store.create();
//! let mut out = Vec::new();
//! graph.on_insert(&store, id, &mut out).unwrap();
//!
//! let changed = store.set_attributes(id, attrs([("alive", true)])).unwrap();
//! graph.on_update(&store, id, &changed, &mut out).unwrap();
//!
//! assert_eq!(out, vec![NodeChange::added(alive, id)]);
//! assert_eq!(graph.snapshot(alive).unwrap(), vec![id]);
//! ```

#![no_std]

extern crate alloc;

pub mod cache;
pub mod dataflow;
pub mod delta;
pub mod influence;
pub mod store;

pub use cache::{PredicateCache, DEFAULT_CACHE_SIZE};
pub use dataflow::{CompositeNode, FilterNode, Node, NodeKind, PredicateFn, QueryGraph};
pub use delta::{Delta, NodeChange};
pub use influence::InfluenceTable;
pub use store::EntityStore;
