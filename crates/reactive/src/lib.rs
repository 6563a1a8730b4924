//! Vigil Reactive - change notification and mutation batching.
//!
//! This crate sits between the query graph and its consumers. Node changes
//! are consolidated per node into `ChangeSet`s and handed to subscribers
//! only after a mutation (or a whole batch) has been applied. In deferred
//! mode mutations are coalesced per operation kind and delivered at the end
//! of the turn.
//!
//! # Core Concepts
//!
//! - `ChangeSet`: Net snapshot changes of one node (added, removed ids)
//! - `SubscriptionManager` / `Listener`: Per-node subscribers
//! - `NotificationHub`: Records node changes and dispatches them
//! - `TurnQueue`: Explicit end-of-turn task scheduler
//! - `Batcher`: Per-kind pending lists with overflow-forced flushes
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use vigil_incremental::NodeChange;
//! use vigil_reactive::{Listener, NotificationHub};
//!
//! let mut hub = NotificationHub::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! hub.subscribe(0, Listener::split(move |ids| sink.borrow_mut().extend_from_slice(ids), |_| {}));
//!
//! hub.record(&[NodeChange::added(0, 7)]);
//! hub.dispatch();
//! assert_eq!(*seen.borrow(), vec![7]);
//! ```

#![no_std]

extern crate alloc;

pub mod batch;
pub mod change_set;
pub mod notify;
pub mod subscription;
pub mod turn;

pub use batch::{Batch, Batcher, Drained, Mutation, OpKind};
pub use change_set::ChangeSet;
pub use notify::NotificationHub;
pub use subscription::{
    ChangeCallback, IdsCallback, Listener, Subscription, SubscriptionId, SubscriptionManager,
    SubscriptionTable,
};
pub use turn::{TaskId, TurnQueue};

// Re-export commonly used types from dependencies
pub use vigil_incremental::{Delta, NodeChange};
