//! Vigil - live queries over keyed entities.
//!
//! Entities are keyed attribute maps. Queries are declared once as filters
//! (a predicate plus the attribute keys it reads) and AND-compositions of
//! filters; their results are kept up to date as entities change instead of
//! being recomputed.
//!
//! # Core Components
//!
//! - `World`: Entities, queries, subscriptions and mutation delivery
//! - `WorldOptions`: Delivery mode, batch limit, cache size, update rules
//! - `Filter`: Filter declarations and presets (`flag`, `has`)
//! - `QueryBuilder`: Chained `flag().has().build()` queries
//! - `jobs`: Named-job scheduler
//!
//! # Example
//!
//! ```rust
//! use vigil::{Filter, World, WorldOptions};
//! use vigil_core::attrs;
//!
//! let mut world = World::with_options(WorldOptions::new().with_defer_delivery(true));
//! let i = world.register(Filter::flag("i")).unwrap();
//! let j = world.register(Filter::flag("j")).unwrap();
//! let both = world.compose_and(&[i, j]).unwrap();
//!
//! let id = world.create_entity_with(attrs([("i", true), ("j", true)])).unwrap();
//! assert!(world.snapshot(both).unwrap().is_empty());
//!
//! world.end_turn().unwrap();
//! assert_eq!(world.snapshot(both).unwrap(), vec![id]);
//! ```

extern crate alloc;

pub mod filter;
pub mod jobs;
pub mod options;
pub mod query;
pub mod world;

pub use filter::Filter;
pub use jobs::{JobSystem, Task};
pub use options::WorldOptions;
pub use query::QueryBuilder;
pub use world::{DeliverCallback, NodeHandle, Touched, World};

// Re-export commonly used types from dependencies
pub use vigil_core::{attrs, Attributes, DependencySpec, Entity, EntityId, Error, Result, Value};
pub use vigil_reactive::{ChangeSet, OpKind, SubscriptionId};
