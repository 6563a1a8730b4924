//! Change set for tracking snapshot changes of one query node.
//!
//! A ChangeSet is the net difference of a node's snapshot over one delivered
//! mutation or batch: the ids that entered it and the ids that left it.

use alloc::vec::Vec;
use hashbrown::HashMap;
use vigil_core::EntityId;
use vigil_incremental::NodeChange;

/// First-known and latest membership of one entity.
struct Net {
    before: bool,
    after: bool,
    only_removals: bool,
}

/// A set of changes to a node's snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Entities that entered the snapshot
    pub added: Vec<EntityId>,
    /// Entities that left the snapshot
    pub removed: Vec<EntityId>,
}

impl ChangeSet {
    /// Creates a new empty change set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consolidates the changes one node went through into their net effect.
    ///
    /// Each entity is judged by the membership recorded with its first
    /// change and by the direction of its last one, so an entity that enters
    /// and leaves within the sequence is not reported. An entity that only
    /// ever saw removals is reported as removed even when it was not a
    /// member, which is how a deletion reaches every node that may have held
    /// it. Ids keep the order of their first change.
    pub fn from_changes(changes: &[NodeChange]) -> Self {
        let mut order: Vec<EntityId> = Vec::new();
        let mut net: HashMap<EntityId, Net> = HashMap::new();
        for change in changes {
            let now = change.delta.is_insert();
            net.entry(change.entity())
                .and_modify(|net| {
                    net.after = now;
                    net.only_removals &= !now;
                })
                .or_insert_with(|| {
                    order.push(change.entity());
                    Net {
                        before: change.was_member,
                        after: now,
                        only_removals: !now,
                    }
                });
        }

        let mut result = Self::new();
        for id in order {
            let Some(net) = net.get(&id) else {
                continue;
            };
            if net.after && !net.before {
                result.added.push(id);
            } else if !net.after && (net.before || net.only_removals) {
                result.removed.push(id);
            }
        }
        result
    }

    /// Creates a change set representing an initial snapshot.
    pub fn initial(ids: Vec<EntityId>) -> Self {
        Self {
            added: ids,
            removed: Vec::new(),
        }
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Returns the total number of changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    /// Clears all changes.
    pub fn clear(&mut self) {
        self.added.clear();
        self.removed.clear();
    }
}
