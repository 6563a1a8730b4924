//! Membership deltas.
//!
//! A Delta records that an item entered (+1) or left (-1) a node's snapshot.

use vigil_core::{EntityId, NodeId};

/// A differential change to a data item.
///
/// The `diff` field indicates the direction of the change:
/// - `+1` means the item entered the snapshot
/// - `-1` means the item left the snapshot
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delta<T> {
    /// The data being changed
    pub data: T,
    /// The differential: +1 for insert, -1 for delete
    pub diff: i32,
}

impl<T> Delta<T> {
    /// Creates an insertion delta (+1).
    #[inline]
    pub fn insert(data: T) -> Self {
        Self { data, diff: 1 }
    }

    /// Creates a deletion delta (-1).
    #[inline]
    pub fn delete(data: T) -> Self {
        Self { data, diff: -1 }
    }

    /// Returns true if this is an insertion (diff > 0).
    #[inline]
    pub fn is_insert(&self) -> bool {
        self.diff > 0
    }

    /// Returns true if this is a deletion (diff < 0).
    #[inline]
    pub fn is_delete(&self) -> bool {
        self.diff < 0
    }

    /// Returns a reference to the data.
    #[inline]
    pub fn data(&self) -> &T {
        &self.data
    }
}

/// A membership delta emitted by one node of the query graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeChange {
    /// Node whose snapshot changed.
    pub node: NodeId,
    /// The entity that entered or left the snapshot.
    pub delta: Delta<EntityId>,
    /// Whether the entity was in the snapshot just before this change.
    pub was_member: bool,
}

impl NodeChange {
    /// An entity entered `node`'s snapshot.
    #[inline]
    pub fn added(node: NodeId, entity: EntityId) -> Self {
        Self {
            node,
            delta: Delta::insert(entity),
            was_member: false,
        }
    }

    /// An entity left `node`'s snapshot.
    #[inline]
    pub fn removed(node: NodeId, entity: EntityId) -> Self {
        Self::evicted(node, entity, true)
    }

    /// A deleted entity was purged from `node`, whether or not it was a
    /// member.
    #[inline]
    pub fn evicted(node: NodeId, entity: EntityId, was_member: bool) -> Self {
        Self {
            node,
            delta: Delta::delete(entity),
            was_member,
        }
    }

    /// Returns the entity id carried by the delta.
    #[inline]
    pub fn entity(&self) -> EntityId {
        self.delta.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_insert() {
        let d = Delta::insert(42);
        assert!(d.is_insert());
        assert!(!d.is_delete());
        assert_eq!(d.diff, 1);
        assert_eq!(*d.data(), 42);
    }

    #[test]
    fn test_delta_delete() {
        let d = Delta::delete(42);
        assert!(!d.is_insert());
        assert!(d.is_delete());
        assert_eq!(d.diff, -1);
    }

    #[test]
    fn test_node_change() {
        let added = NodeChange::added(3, 7);
        assert_eq!(added.node, 3);
        assert_eq!(added.entity(), 7);
        assert!(added.delta.is_insert());
        assert!(!added.was_member);
        assert!(NodeChange::removed(3, 7).delta.is_delete());
        assert!(NodeChange::removed(3, 7).was_member);
        assert!(!NodeChange::evicted(3, 7, false).was_member);
    }
}
