//! Entity structure and id allocation.
//!
//! This module defines the `Entity` struct, a keyed record with a mutable
//! attribute map, and the `IdGenerator` that hands out entity ids.

use crate::value::Value;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Unique identifier for an entity.
pub type EntityId = u64;

/// Attribute map of an entity, ordered by key.
pub type Attributes = BTreeMap<String, Value>;

/// Builds an attribute map from key/value pairs.
pub fn attrs<K, V, I>(pairs: I) -> Attributes
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Source of entity ids.
///
/// The incremental generator yields `start + 1`, `start + 2`, ... A custom
/// generator is any closure the caller supplies; it must never return an id
/// that is still live.
pub enum IdGenerator {
    /// Counts upwards from the last handed out id.
    Incremental { last: EntityId },
    /// Caller supplied generator.
    Custom(Box<dyn FnMut() -> EntityId>),
}

impl IdGenerator {
    /// Creates an incremental generator whose first id is `start + 1`.
    pub fn incremental(start: EntityId) -> Self {
        IdGenerator::Incremental { last: start }
    }

    /// Wraps a caller supplied generator.
    pub fn custom<F>(generator: F) -> Self
    where
        F: FnMut() -> EntityId + 'static,
    {
        IdGenerator::Custom(Box::new(generator))
    }

    /// Gets the next id.
    pub fn next_id(&mut self) -> EntityId {
        match self {
            IdGenerator::Incremental { last } => {
                *last += 1;
                *last
            }
            IdGenerator::Custom(generator) => generator(),
        }
    }

    /// Records an id that entered the store without going through the
    /// generator, so the incremental counter never hands it out again.
    pub fn observe(&mut self, id: EntityId) {
        if let IdGenerator::Incremental { last } = self {
            if id > *last {
                *last = id;
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::incremental(0)
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdGenerator::Incremental { last } => {
                f.debug_struct("Incremental").field("last", last).finish()
            }
            IdGenerator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A keyed record with a mutable attribute map.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    /// Unique identifier for this entity.
    id: EntityId,
    /// Attribute values by key.
    attributes: Attributes,
}

impl Entity {
    /// Creates an entity without attributes.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            attributes: Attributes::new(),
        }
    }

    /// Creates an entity with the given attributes.
    pub fn with_attributes(id: EntityId, attributes: Attributes) -> Self {
        Self { id, attributes }
    }

    /// Returns the entity ID.
    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the attribute map.
    #[inline]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns a mutable reference to the attribute map.
    #[inline]
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Gets the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Returns true if the entity carries `key`.
    pub fn has(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Iterates over the attribute keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.attributes.keys().map(|k| k.as_str())
    }

    /// Stores a single value. Returns true if the stored value changed.
    pub fn set(&mut self, key: String, value: Value) -> bool {
        match self.attributes.get(&key) {
            Some(old) if *old == value => false,
            _ => {
                self.attributes.insert(key, value);
                true
            }
        }
    }

    /// Shallow merge, last write wins per key.
    ///
    /// Returns the keys whose stored value changed.
    pub fn merge(&mut self, partial: Attributes) -> Vec<String> {
        let mut changed = Vec::new();
        for (key, value) in partial {
            if self.set(key.clone(), value) {
                changed.push(key);
            }
        }
        changed
    }

    /// Returns the number of attributes.
    #[inline]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if the entity has no attributes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
