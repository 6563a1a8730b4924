//! Mutation batching.
//!
//! In deferred mode mutations are queued per operation kind. The first
//! mutation of a kind in a turn schedules one delivery task for that kind on
//! the `TurnQueue`; later mutations of the same kind only append. Draining
//! merges every kind back into submission order, so conflicting operations
//! on one entity resolve exactly as they were submitted.

use crate::turn::{TaskId, TurnQueue};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use tracing::debug;
use vigil_core::{Attributes, EntityId};

/// Kind of a submitted mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    /// Entity creation
    Create,
    /// Attribute merge from outside the update pipeline
    SetAttributes,
    /// Update pipeline write of existing attributes
    Update,
    /// Entity removal
    Remove,
}

impl OpKind {
    /// Every kind, in delivery report order.
    pub const ALL: [OpKind; 4] = [
        OpKind::Create,
        OpKind::SetAttributes,
        OpKind::Update,
        OpKind::Remove,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpKind::Create => "create",
            OpKind::SetAttributes => "set_attributes",
            OpKind::Update => "update",
            OpKind::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// A mutation waiting to be applied.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    /// Insert an entity under an id allocated at submission.
    Create { id: EntityId, attributes: Attributes },
    /// Merge attributes; changed keys are detected on apply.
    SetAttributes { id: EntityId, attributes: Attributes },
    /// Store `values` without change detection, then treat `keys` as changed.
    Update {
        id: EntityId,
        keys: Vec<String>,
        values: Attributes,
    },
    /// Remove an entity.
    Remove { id: EntityId },
}

impl Mutation {
    /// Returns the kind of this mutation.
    pub fn kind(&self) -> OpKind {
        match self {
            Mutation::Create { .. } => OpKind::Create,
            Mutation::SetAttributes { .. } => OpKind::SetAttributes,
            Mutation::Update { .. } => OpKind::Update,
            Mutation::Remove { .. } => OpKind::Remove,
        }
    }

    /// Returns the target entity.
    pub fn id(&self) -> EntityId {
        match self {
            Mutation::Create { id, .. }
            | Mutation::SetAttributes { id, .. }
            | Mutation::Update { id, .. }
            | Mutation::Remove { id } => *id,
        }
    }
}

/// Ids of one kind delivered together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    pub kind: OpKind,
    /// Target ids in submission order.
    pub ids: Vec<EntityId>,
}

/// Everything drained from the batcher at once.
#[derive(Debug, Default)]
pub struct Drained {
    /// All mutations in submission order.
    pub mutations: Vec<Mutation>,
    /// One batch per non-empty kind.
    pub batches: Vec<Batch>,
}

impl Drained {
    /// Returns true if nothing was pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Per-kind pending lists with one scheduled delivery per kind.
#[derive(Debug)]
pub struct Batcher {
    pending: [Vec<(u64, Mutation)>; 4],
    scheduled: [Option<TaskId>; 4],
    next_seq: u64,
    max_batch_size: usize,
}

impl Batcher {
    /// Creates a batcher that forces a flush once a kind holds
    /// `max_batch_size` mutations. A limit of zero behaves like one.
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            pending: Default::default(),
            scheduled: [None; 4],
            next_seq: 0,
            max_batch_size: max_batch_size.max(1),
        }
    }

    /// Queues a mutation, scheduling a delivery task if its kind has none.
    ///
    /// Returns true when the kind reached the size limit and the caller
    /// must flush now.
    pub fn submit(&mut self, mutation: Mutation, turns: &mut TurnQueue<OpKind>) -> bool {
        let kind = mutation.kind();
        let slot = kind.index();
        if self.scheduled[slot].is_none() {
            self.scheduled[slot] = Some(turns.schedule(kind));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending[slot].push((seq, mutation));

        let full = self.pending[slot].len() >= self.max_batch_size;
        if full {
            debug!(
                kind = %kind,
                pending = self.pending[slot].len(),
                "batch size limit reached"
            );
        }
        full
    }

    /// Takes every pending mutation and cancels the scheduled deliveries.
    pub fn drain(&mut self, turns: &mut TurnQueue<OpKind>) -> Drained {
        let mut tagged: Vec<(u64, Mutation)> = Vec::new();
        let mut batches = Vec::new();
        for kind in OpKind::ALL {
            let slot = kind.index();
            if let Some(task) = self.scheduled[slot].take() {
                turns.cancel(task);
            }
            let pending = core::mem::take(&mut self.pending[slot]);
            if pending.is_empty() {
                continue;
            }
            batches.push(Batch {
                kind,
                ids: pending.iter().map(|(_, m)| m.id()).collect(),
            });
            tagged.extend(pending);
        }
        tagged.sort_unstable_by_key(|&(seq, _)| seq);

        Drained {
            mutations: tagged.into_iter().map(|(_, m)| m).collect(),
            batches,
        }
    }

    /// Forgets the delivery task of `kind` once it has been taken off the
    /// queue.
    pub fn task_started(&mut self, kind: OpKind, task: TaskId) {
        let slot = kind.index();
        if self.scheduled[slot] == Some(task) {
            self.scheduled[slot] = None;
        }
    }

    /// Returns the number of pending mutations of a kind.
    #[inline]
    pub fn pending_len(&self, kind: OpKind) -> usize {
        self.pending[kind.index()].len()
    }

    /// Returns the scheduled delivery task of a kind.
    #[inline]
    pub fn scheduled(&self, kind: OpKind) -> Option<TaskId> {
        self.scheduled[kind.index()]
    }

    /// Returns true if no mutation is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.iter().all(Vec::is_empty)
    }

    /// Returns the size limit per kind.
    #[inline]
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

impl Default for Batcher {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use vigil_core::attrs;

    fn create(id: EntityId) -> Mutation {
        Mutation::Create {
            id,
            attributes: Attributes::new(),
        }
    }

    #[test]
    fn test_one_task_per_kind() {
        let mut turns = TurnQueue::new();
        let mut batcher = Batcher::default();

        assert!(!batcher.submit(create(1), &mut turns));
        assert!(!batcher.submit(create(2), &mut turns));
        assert!(!batcher.submit(Mutation::Remove { id: 1 }, &mut turns));

        assert_eq!(turns.len(), 2);
        assert_eq!(batcher.pending_len(OpKind::Create), 2);
        assert_eq!(batcher.pending_len(OpKind::Remove), 1);
        assert!(batcher.scheduled(OpKind::Update).is_none());
    }

    #[test]
    fn test_drain_restores_submission_order() {
        let mut turns = TurnQueue::new();
        let mut batcher = Batcher::default();

        batcher.submit(create(1), &mut turns);
        batcher.submit(Mutation::Remove { id: 1 }, &mut turns);
        batcher.submit(create(2), &mut turns);
        batcher.submit(
            Mutation::SetAttributes {
                id: 2,
                attributes: attrs([("a", true)]),
            },
            &mut turns,
        );

        let drained = batcher.drain(&mut turns);
        let order: Vec<(OpKind, EntityId)> =
            drained.mutations.iter().map(|m| (m.kind(), m.id())).collect();
        assert_eq!(
            order,
            vec![
                (OpKind::Create, 1),
                (OpKind::Remove, 1),
                (OpKind::Create, 2),
                (OpKind::SetAttributes, 2),
            ]
        );
        assert_eq!(
            drained.batches,
            vec![
                Batch { kind: OpKind::Create, ids: vec![1, 2] },
                Batch { kind: OpKind::SetAttributes, ids: vec![2] },
                Batch { kind: OpKind::Remove, ids: vec![1] },
            ]
        );

        // scheduled deliveries are invalidated
        assert!(turns.is_empty());
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_size_limit() {
        let mut turns = TurnQueue::new();
        let mut batcher = Batcher::new(2);

        assert!(!batcher.submit(create(1), &mut turns));
        assert!(batcher.submit(create(2), &mut turns));
        assert_eq!(batcher.drain(&mut turns).mutations.len(), 2);

        // a new turn's worth of tasks after the forced flush
        assert!(!batcher.submit(create(3), &mut turns));
        assert_eq!(turns.len(), 1);
    }

    #[test]
    fn test_zero_limit_flushes_every_mutation() {
        let mut turns = TurnQueue::new();
        let mut batcher = Batcher::new(0);
        assert_eq!(batcher.max_batch_size(), 1);
        assert!(batcher.submit(create(1), &mut turns));
    }

    #[test]
    fn test_task_started() {
        let mut turns = TurnQueue::new();
        let mut batcher = Batcher::default();
        batcher.submit(create(1), &mut turns);

        let (task, kind) = turns.pop().unwrap();
        batcher.task_started(kind, task);
        assert!(batcher.scheduled(OpKind::Create).is_none());
        assert_eq!(batcher.pending_len(OpKind::Create), 1);
    }
}
