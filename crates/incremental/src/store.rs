//! Entity store.
//!
//! Keyed map from entity id to its mutable attribute map. The store knows
//! nothing about queries; the graph reads it during evaluation.

use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;
use vigil_core::{Attributes, Entity, EntityId, Error, IdGenerator, Result, Value};

/// Canonical storage for every live entity.
#[derive(Debug, Default)]
pub struct EntityStore {
    /// Entity id -> record.
    entities: HashMap<EntityId, Entity>,
    /// Allocates ids for new entities.
    ids: IdGenerator,
}

impl EntityStore {
    /// Creates an empty store with the incremental id generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with a caller supplied id generator.
    pub fn with_generator(ids: IdGenerator) -> Self {
        Self {
            entities: HashMap::new(),
            ids,
        }
    }

    /// Allocates an id without inserting a record.
    ///
    /// Used when creation is deferred: the id is handed out immediately and
    /// the record appears once the batch is delivered.
    pub fn allocate_id(&mut self) -> EntityId {
        self.ids.next_id()
    }

    /// Creates an entity without attributes and returns its id.
    pub fn create(&mut self) -> EntityId {
        let id = self.allocate_id();
        self.entities.insert(id, Entity::new(id));
        id
    }

    /// Inserts an empty record under a known id.
    ///
    /// Returns false if the id is already live.
    pub fn insert(&mut self, id: EntityId) -> bool {
        if self.entities.contains_key(&id) {
            return false;
        }
        self.ids.observe(id);
        self.entities.insert(id, Entity::new(id));
        true
    }

    /// Merges `partial` into the entity's attributes.
    ///
    /// Returns the keys whose stored value changed.
    pub fn set_attributes(&mut self, id: EntityId, partial: Attributes) -> Result<Vec<String>> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(Error::unknown_entity(id))?;
        Ok(entity.merge(partial))
    }

    /// Writes a single attribute directly, bypassing query maintenance.
    ///
    /// Returns true if the stored value changed.
    pub fn apply_internal(&mut self, id: EntityId, key: impl Into<String>, value: Value) -> Result<bool> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(Error::unknown_entity(id))?;
        Ok(entity.set(key.into(), value))
    }

    /// Removes an entity and returns its last record.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity> {
        self.entities.remove(&id).ok_or(Error::unknown_entity(id))
    }

    /// Gets an entity by id.
    #[inline]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Gets a mutable entity by id. Writes made through it are internal.
    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Returns true if the entity is live.
    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Returns the number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity is live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates over all live entities in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    /// Returns all live ids in ascending order.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
