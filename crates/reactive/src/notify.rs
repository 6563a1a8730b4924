//! Notification routing.
//!
//! `NotificationHub` collects the node changes produced while a mutation or
//! a batch is applied and hands each watched node its consolidated
//! `ChangeSet` once everything has been applied. Subscribers therefore never
//! observe a half-propagated graph.

use crate::change_set::ChangeSet;
use crate::subscription::{Listener, SubscriptionId, SubscriptionTable};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use tracing::trace;
use vigil_core::NodeId;
use vigil_incremental::NodeChange;

/// Routes node changes to node subscribers.
#[derive(Default)]
pub struct NotificationHub {
    subscriptions: SubscriptionTable,
    /// Node -> changes recorded since the last dispatch
    pending: BTreeMap<NodeId, Vec<NodeChange>>,
}

impl NotificationHub {
    /// Creates a hub with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a listener to a node.
    pub fn subscribe(&mut self, node: NodeId, listener: Listener) -> SubscriptionId {
        self.subscriptions.subscribe(node, listener)
    }

    /// Removes a subscription. Returns true if it existed.
    pub fn unsubscribe(&mut self, node: NodeId, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(node, id)
    }

    /// Records changes for later dispatch. Changes of unwatched nodes are
    /// dropped.
    pub fn record(&mut self, changes: &[NodeChange]) {
        for change in changes {
            if self.subscriptions.is_watched(change.node) {
                self.pending
                    .entry(change.node)
                    .or_default()
                    .push(change.clone());
            }
        }
    }

    /// Returns true if recorded changes await dispatch.
    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Delivers every recorded change, in ascending node order.
    ///
    /// Returns the number of non-empty change sets delivered.
    pub fn dispatch(&mut self) -> usize {
        let pending = core::mem::take(&mut self.pending);
        let mut delivered = 0;
        for (node, recorded) in pending {
            let changes = ChangeSet::from_changes(&recorded);
            if changes.is_empty() {
                continue;
            }
            if let Some(manager) = self.subscriptions.get(node) {
                trace!(
                    node,
                    added = changes.added.len(),
                    removed = changes.removed.len(),
                    "dispatching change set"
                );
                manager.notify_all(&changes);
                delivered += 1;
            }
        }
        delivered
    }

    /// Returns the subscription table.
    #[inline]
    pub fn subscriptions(&self) -> &SubscriptionTable {
        &self.subscriptions
    }
}
