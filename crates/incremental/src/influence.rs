//! Influence table.
//!
//! Reverse index from entity id to the filter nodes whose declared
//! dependencies that entity can affect. Rows grow lazily: a filter is added to
//! a row the first time the entity carries one of the filter's dependency
//! keys. A missing connection only means "not yet known", never a stale
//! positive.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use hashbrown::HashMap;
use vigil_core::{EntityId, NodeId};

/// Entity id -> interested filter nodes.
#[derive(Debug, Default)]
pub struct InfluenceTable {
    rows: HashMap<EntityId, BTreeSet<NodeId>>,
}

impl InfluenceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty row for a new entity. Existing rows are kept.
    pub fn add_row(&mut self, id: EntityId) {
        self.rows.entry(id).or_default();
    }

    /// Marks `node` as interested in `id`.
    ///
    /// Returns true if the connection is new.
    pub fn connect(&mut self, id: EntityId, node: NodeId) -> bool {
        self.rows.entry(id).or_default().insert(node)
    }

    /// Returns the interested nodes of an entity.
    #[inline]
    pub fn get(&self, id: EntityId) -> Option<&BTreeSet<NodeId>> {
        self.rows.get(&id)
    }

    /// Returns the interested nodes of an entity as a Vec.
    pub fn get_vec(&self, id: EntityId) -> Vec<NodeId> {
        self.rows
            .get(&id)
            .map(|row| row.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns true if `node` is already marked interested in `id`.
    pub fn is_connected(&self, id: EntityId, node: NodeId) -> bool {
        self.rows.get(&id).map_or(false, |row| row.contains(&node))
    }

    /// Drops the row of a removed entity.
    pub fn remove(&mut self, id: EntityId) -> Option<BTreeSet<NodeId>> {
        self.rows.remove(&id)
    }

    /// Returns true if the entity has a row.
    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.rows.contains_key(&id)
    }

    /// Returns the number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
