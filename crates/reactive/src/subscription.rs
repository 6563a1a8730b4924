//! Subscription management for query nodes.
//!
//! A subscriber either receives the whole `ChangeSet` of a delivery or a
//! pair of add/remove callbacks that are only called for non-empty sides.

use crate::change_set::ChangeSet;
use alloc::boxed::Box;
use alloc::vec::Vec;
use hashbrown::HashMap;
use vigil_core::{EntityId, NodeId};

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback type for change notifications.
pub type ChangeCallback = Box<dyn Fn(&ChangeSet)>;

/// Callback receiving the ids that entered or left a snapshot.
pub type IdsCallback = Box<dyn Fn(&[EntityId])>;

/// What a subscription calls on delivery.
pub enum Listener {
    /// Called once per non-empty change set.
    Changes(ChangeCallback),
    /// Called with `added` and `removed` separately.
    Split {
        on_add: IdsCallback,
        on_remove: IdsCallback,
    },
}

impl Listener {
    /// Wraps a change-set callback.
    pub fn changes<F>(callback: F) -> Self
    where
        F: Fn(&ChangeSet) + 'static,
    {
        Listener::Changes(Box::new(callback))
    }

    /// Wraps a pair of add/remove callbacks.
    pub fn split<A, R>(on_add: A, on_remove: R) -> Self
    where
        A: Fn(&[EntityId]) + 'static,
        R: Fn(&[EntityId]) + 'static,
    {
        Listener::Split {
            on_add: Box::new(on_add),
            on_remove: Box::new(on_remove),
        }
    }

    fn call(&self, changes: &ChangeSet) {
        match self {
            Listener::Changes(callback) => callback(changes),
            Listener::Split { on_add, on_remove } => {
                if !changes.added.is_empty() {
                    on_add(&changes.added);
                }
                if !changes.removed.is_empty() {
                    on_remove(&changes.removed);
                }
            }
        }
    }
}

/// A subscription to one node's changes.
pub struct Subscription {
    id: SubscriptionId,
    listener: Listener,
}

impl Subscription {
    /// Creates a new subscription.
    pub fn new(id: SubscriptionId, listener: Listener) -> Self {
        Self { id, listener }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Notifies this subscription of changes. Empty change sets are skipped.
    pub fn notify(&self, changes: &ChangeSet) {
        if !changes.is_empty() {
            self.listener.call(changes);
        }
    }
}

/// Manages the subscriptions of one node.
///
/// Subscribers are notified in subscription order.
pub struct SubscriptionManager {
    subscriptions: Vec<Subscription>,
    /// Next subscription ID to assign
    next_id: SubscriptionId,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            next_id: 1,
        }
    }

    /// Adds a listener and returns its subscription ID.
    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.push(Subscription::new(id, listener));
        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != id);
        self.subscriptions.len() != before
    }

    /// Notifies all subscriptions of changes.
    pub fn notify_all(&self, changes: &ChangeSet) {
        for sub in &self.subscriptions {
            sub.notify(changes);
        }
    }

    /// Returns the number of subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns all subscription IDs in subscription order.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.iter().map(Subscription::id).collect()
    }

    /// Clears all subscriptions.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

/// Subscriptions of every node that was ever subscribed to.
///
/// Managers are kept once created so subscription ids are never reused
/// for the same node.
#[derive(Default)]
pub struct SubscriptionTable {
    managers: HashMap<NodeId, SubscriptionManager>,
}

impl SubscriptionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` to `node`.
    pub fn subscribe(&mut self, node: NodeId, listener: Listener) -> SubscriptionId {
        self.managers.entry(node).or_default().subscribe(listener)
    }

    /// Removes a subscription of `node`. Returns true if it existed.
    pub fn unsubscribe(&mut self, node: NodeId, id: SubscriptionId) -> bool {
        self.managers
            .get_mut(&node)
            .map_or(false, |manager| manager.unsubscribe(id))
    }

    /// Returns the manager of `node`, if it was ever subscribed to.
    #[inline]
    pub fn get(&self, node: NodeId) -> Option<&SubscriptionManager> {
        self.managers.get(&node)
    }

    /// Returns true if `node` has subscribers.
    #[inline]
    pub fn is_watched(&self, node: NodeId) -> bool {
        self.managers.get(&node).map_or(false, |m| !m.is_empty())
    }

    /// Returns the total number of subscriptions.
    pub fn len(&self) -> usize {
        self.managers.values().map(SubscriptionManager::len).sum()
    }

    /// Returns true if there are no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.managers.values().all(SubscriptionManager::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;

    #[test]
    fn test_subscription_new() {
        let sub = Subscription::new(1, Listener::changes(|_| {}));
        assert_eq!(sub.id(), 1);
    }

    #[test]
    fn test_subscription_skips_empty() {
        let called = Rc::new(RefCell::new(false));
        let called_clone = called.clone();
        let sub = Subscription::new(
            1,
            Listener::changes(move |_| {
                *called_clone.borrow_mut() = true;
            }),
        );

        sub.notify(&ChangeSet::new());
        assert!(!*called.borrow());

        sub.notify(&ChangeSet::initial(vec![1]));
        assert!(*called.borrow());
    }

    #[test]
    fn test_split_listener_sides() {
        let added = Rc::new(RefCell::new(Vec::new()));
        let removed = Rc::new(RefCell::new(Vec::new()));
        let (a, r) = (added.clone(), removed.clone());
        let sub = Subscription::new(
            1,
            Listener::split(
                move |ids| a.borrow_mut().push(ids.to_vec()),
                move |ids| r.borrow_mut().push(ids.to_vec()),
            ),
        );

        sub.notify(&ChangeSet::initial(vec![1, 2]));
        assert_eq!(*added.borrow(), vec![vec![1, 2]]);
        // the empty side is not called
        assert!(removed.borrow().is_empty());

        sub.notify(&ChangeSet {
            added: Vec::new(),
            removed: vec![2],
        });
        assert_eq!(*removed.borrow(), vec![vec![2]]);
        assert_eq!(added.borrow().len(), 1);
    }

    #[test]
    fn test_subscription_manager_subscribe() {
        let mut manager = SubscriptionManager::new();

        let id1 = manager.subscribe(Listener::changes(|_| {}));
        let id2 = manager.subscribe(Listener::changes(|_| {}));

        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(manager.subscription_ids(), vec![1, 2]);
    }

    #[test]
    fn test_subscription_manager_unsubscribe() {
        let mut manager = SubscriptionManager::new();

        let id = manager.subscribe(Listener::changes(|_| {}));
        assert!(manager.unsubscribe(id));
        assert!(manager.is_empty());
        assert!(!manager.unsubscribe(id)); // Already removed
    }

    #[test]
    fn test_subscription_manager_notifies_in_order() {
        let mut manager = SubscriptionManager::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (l1, l2) = (log.clone(), log.clone());

        manager.subscribe(Listener::changes(move |_| l1.borrow_mut().push(1)));
        manager.subscribe(Listener::changes(move |_| l2.borrow_mut().push(2)));
        manager.notify_all(&ChangeSet::initial(vec![7]));

        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_table_unsubscribe() {
        let mut table = SubscriptionTable::new();
        let id = table.subscribe(3, Listener::changes(|_| {}));
        assert!(table.is_watched(3));
        assert_eq!(table.len(), 1);

        assert!(!table.unsubscribe(4, id));
        assert!(table.unsubscribe(3, id));
        assert!(!table.is_watched(3));
        assert!(table.is_empty());

        // ids keep counting on the same node
        assert_eq!(table.subscribe(3, Listener::changes(|_| {})), id + 1);
    }
}
