//! Chained query builder.

use crate::filter::Filter;
use crate::world::{NodeHandle, World};
use alloc::string::String;
use alloc::vec::Vec;
use vigil_core::{Error, Result};

/// Accumulates filters and registers them as one AND query.
///
/// ```
/// use vigil::World;
/// use vigil_core::{attrs, Value};
///
/// let mut world = World::new();
/// let id = world.create_entity_with(attrs([("alive", Value::from(true)), ("hp", Value::from(3i64))])).unwrap();
/// let query = world.query().flag("alive").has("hp").build().unwrap();
/// assert_eq!(world.snapshot(query).unwrap(), vec![id]);
/// ```
pub struct QueryBuilder<'w> {
    world: &'w mut World,
    filters: Vec<Filter>,
}

impl<'w> QueryBuilder<'w> {
    pub(crate) fn new(world: &'w mut World) -> Self {
        Self {
            world,
            filters: Vec::new(),
        }
    }

    /// Adds `Filter::flag(key)`.
    pub fn flag(self, key: impl Into<String>) -> Self {
        self.filter(Filter::flag(key))
    }

    /// Adds `Filter::has(key)`.
    pub fn has(self, key: impl Into<String>) -> Self {
        self.filter(Filter::has(key))
    }

    /// Adds any filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Registers every filter and returns the node for their conjunction.
    ///
    /// A single distinct filter is returned as is.
    pub fn build(self) -> Result<NodeHandle> {
        if self.filters.is_empty() {
            return Err(Error::invalid_operation("query has no filters"));
        }

        let mut handles: Vec<NodeHandle> = Vec::with_capacity(self.filters.len());
        for filter in self.filters {
            let handle = self.world.register(filter)?;
            if !handles.contains(&handle) {
                handles.push(handle);
            }
        }

        match handles.as_slice() {
            [single] => Ok(*single),
            _ => self.world.compose_and(&handles),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use vigil_core::{attrs, DependencySpec, Value};

    #[test]
    fn test_build_composes() {
        let mut world = World::new();
        let both = world.create_entity_with(attrs([("a", true), ("b", true)])).unwrap();
        world.create_entity_with(attrs([("a", true)])).unwrap();

        let query = world.query().flag("a").flag("b").build().unwrap();
        assert_eq!(world.snapshot(query).unwrap(), vec![both]);

        let a = world.register(Filter::flag("a")).unwrap();
        let b = world.register(Filter::flag("b")).unwrap();
        assert_eq!(world.compose_and(&[b, a]).unwrap(), query);
    }

    #[test]
    fn test_build_single_and_duplicate_filters() {
        let mut world = World::new();
        let one = world.query().flag("a").build().unwrap();
        let same = world.query().flag("a").flag("a").build().unwrap();
        assert_eq!(one, same);
    }

    #[test]
    fn test_build_empty() {
        let mut world = World::new();
        assert!(matches!(
            world.query().build(),
            Err(Error::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_build_custom_filter() {
        let mut world = World::new();
        let old = world.create_entity_with(attrs([("age", Value::from(70i64)), ("alive", Value::from(true))])).unwrap();
        world.create_entity_with(attrs([("age", Value::from(7i64)), ("alive", Value::from(true))])).unwrap();

        let query = world
            .query()
            .flag("alive")
            .filter(Filter::new("senior", DependencySpec::key("age"), |e| {
                e.get("age").and_then(Value::as_i64).map_or(false, |age| age >= 65)
            }))
            .build()
            .unwrap();
        assert_eq!(world.snapshot(query).unwrap(), vec![old]);
    }
}
