//! Bounded per-node predicate cache.
//!
//! Each filter node remembers its last predicate outcome per entity. The
//! cache is a small LRU: when full, the least recently used entry is
//! forgotten. Forgetting only costs an extra predicate evaluation on the next
//! touch; it never yields a wrong value.

use alloc::collections::BTreeMap;
use hashbrown::HashMap;
use vigil_core::EntityId;

/// Default number of cached outcomes per filter node.
pub const DEFAULT_CACHE_SIZE: usize = 1000;

/// Cache entry with access tracking for LRU eviction.
#[derive(Clone, Copy, Debug)]
struct CacheEntry {
    value: bool,
    last_access: u64,
}

/// LRU cache of predicate outcomes keyed by entity id.
#[derive(Debug)]
pub struct PredicateCache {
    /// Cached outcomes indexed by entity.
    entries: HashMap<EntityId, CacheEntry>,
    /// Access tick -> entity, oldest first.
    recency: BTreeMap<u64, EntityId>,
    /// Maximum number of entries.
    capacity: usize,
    /// Global access counter for LRU tracking.
    access_counter: u64,
    /// Cache statistics.
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl PredicateCache {
    /// Creates a cache holding at most `capacity` outcomes.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            capacity,
            access_counter: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Gets the cached outcome for an entity and marks it recently used.
    pub fn get(&mut self, id: EntityId) -> Option<bool> {
        self.access_counter += 1;
        let tick = self.access_counter;
        match self.entries.get_mut(&id) {
            Some(entry) => {
                self.recency.remove(&entry.last_access);
                entry.last_access = tick;
                self.recency.insert(tick, id);
                self.hits += 1;
                Some(entry.value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Returns the cached outcome without touching recency.
    pub fn peek(&self, id: EntityId) -> Option<bool> {
        self.entries.get(&id).map(|entry| entry.value)
    }

    /// Stores an outcome. Evicts the least recently used entry when full.
    pub fn insert(&mut self, id: EntityId, value: bool) {
        if self.capacity == 0 {
            return;
        }

        self.access_counter += 1;
        let tick = self.access_counter;

        if let Some(old) = self.entries.insert(
            id,
            CacheEntry {
                value,
                last_access: tick,
            },
        ) {
            self.recency.remove(&old.last_access);
        } else if self.entries.len() > self.capacity {
            self.evict_lru();
        }
        self.recency.insert(tick, id);
    }

    /// Forgets the outcome of an entity.
    pub fn remove(&mut self, id: EntityId) -> Option<bool> {
        let entry = self.entries.remove(&id)?;
        self.recency.remove(&entry.last_access);
        Some(entry.value)
    }

    fn evict_lru(&mut self) {
        if let Some((_, oldest)) = self.recency.pop_first() {
            self.entries.remove(&oldest);
            self.evictions += 1;
        }
    }

    /// Returns true if an outcome is cached for the entity.
    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Returns the number of cached outcomes.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the maximum number of entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns (hits, misses, evictions).
    pub fn stats(&self) -> (u64, u64, u64) {
        (self.hits, self.misses, self.evictions)
    }
}

impl Default for PredicateCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}
