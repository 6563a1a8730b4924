//! Vigil Core - Core types for the Vigil live-query engine.
//!
//! This crate provides the foundational types shared by every Vigil crate:
//!
//! - `EntityId` / `IdGenerator`: Entity identifiers and their allocation
//! - `Entity` / `Attributes`: A keyed record with a mutable attribute map
//! - `Value`: Dynamically typed attribute values
//! - `DependencySpec`: The attribute keys a predicate depends on
//! - `Error`: Error types for entity and query operations
//!
//! # Example
//!
//! ```rust
//! use vigil_core::{attrs, DependencySpec, Entity, Value};
//!
//! let mut entity = Entity::new(1);
//! let changed = entity.merge(attrs([("hp", 10i64), ("alive", 1i64)]));
//! assert_eq!(changed.len(), 2);
//!
//! let spec = DependencySpec::key("hp");
//! assert!(spec.intersects(changed.iter().map(|k| k.as_str())));
//! assert_eq!(entity.get("hp"), Some(&Value::Int64(10)));
//! ```

#![no_std]

extern crate alloc;

mod dependency;
mod entity;
mod error;
mod value;

pub use dependency::DependencySpec;
pub use entity::{attrs, Attributes, Entity, EntityId, IdGenerator};
pub use error::{Error, Result};
pub use value::Value;

/// Unique identifier for a node in the query graph.
pub type NodeId = u32;
