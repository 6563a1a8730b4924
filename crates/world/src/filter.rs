//! Filter declarations.
//!
//! A `Filter` bundles what `World::register_filter` needs: a structural
//! identity key, the attribute keys the predicate reads and the predicate.
//! Two filters with the same identity key are the same query node.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use vigil_core::{DependencySpec, Entity, Result, Value};
use vigil_incremental::PredicateFn;

/// A filter waiting to be registered.
pub struct Filter {
    identity: String,
    dependencies: DependencySpec,
    predicate: PredicateFn,
}

impl Filter {
    /// Matches entities whose `key` attribute is present and truthy.
    pub fn flag(key: impl Into<String>) -> Self {
        let key = key.into();
        let identity = format!("flag({})", key);
        let dependencies = DependencySpec::key(key.clone());
        Self {
            identity,
            dependencies,
            predicate: Box::new(move |entity: &Entity| {
                Ok(entity.get(&key).map_or(false, Value::is_truthy))
            }),
        }
    }

    /// Matches entities carrying the `key` attribute, whatever its value.
    pub fn has(key: impl Into<String>) -> Self {
        let key = key.into();
        let identity = format!("has({})", key);
        let dependencies = DependencySpec::key(key.clone());
        Self {
            identity,
            dependencies,
            predicate: Box::new(move |entity: &Entity| Ok(entity.has(&key))),
        }
    }

    /// Creates a filter from an infallible predicate.
    pub fn new<F>(identity: impl Into<String>, dependencies: DependencySpec, predicate: F) -> Self
    where
        F: Fn(&Entity) -> bool + 'static,
    {
        Self {
            identity: identity.into(),
            dependencies,
            predicate: Box::new(move |entity: &Entity| Ok(predicate(entity))),
        }
    }

    /// Creates a filter from a fallible predicate.
    pub fn try_new<F>(identity: impl Into<String>, dependencies: DependencySpec, predicate: F) -> Self
    where
        F: Fn(&Entity) -> Result<bool> + 'static,
    {
        Self {
            identity: identity.into(),
            dependencies,
            predicate: Box::new(predicate),
        }
    }

    /// Returns the structural identity key.
    #[inline]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Returns the attribute keys the predicate depends on.
    #[inline]
    pub fn dependencies(&self) -> &DependencySpec {
        &self.dependencies
    }

    /// Evaluates the predicate against an entity.
    pub fn matches(&self, entity: &Entity) -> Result<bool> {
        (self.predicate)(entity)
    }

    pub(crate) fn into_parts(self) -> (String, DependencySpec, PredicateFn) {
        (self.identity, self.dependencies, self.predicate)
    }
}

impl core::fmt::Debug for Filter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Filter")
            .field("identity", &self.identity)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{attrs, Attributes, Error};

    fn entity(attributes: Attributes) -> Entity {
        Entity::with_attributes(1, attributes)
    }

    #[test]
    fn test_flag() {
        let filter = Filter::flag("alive");
        assert_eq!(filter.identity(), "flag(alive)");
        assert!(filter.dependencies().depends_on("alive"));

        assert!(filter.matches(&entity(attrs([("alive", true)]))).unwrap());
        assert!(!filter.matches(&entity(attrs([("alive", false)]))).unwrap());
        assert!(!filter.matches(&entity(Attributes::new())).unwrap());
    }

    #[test]
    fn test_has() {
        let filter = Filter::has("a");
        assert_eq!(filter.identity(), "has(a)");
        assert!(filter.matches(&entity(attrs([("a", 0i64)]))).unwrap());
        assert!(!filter.matches(&entity(attrs([("b", 1i64)]))).unwrap());
    }

    #[test]
    fn test_custom_filters() {
        let adult = Filter::new("adult", DependencySpec::key("age"), |e| {
            e.get("age").and_then(Value::as_i64).map_or(false, |age| age >= 18)
        });
        assert!(adult.matches(&entity(attrs([("age", 20i64)]))).unwrap());
        assert!(!adult.matches(&entity(attrs([("age", 9i64)]))).unwrap());

        let strict = Filter::try_new("strict", DependencySpec::All, |e| match e.get("age") {
            Some(value) => value.as_i64().map(|age| age > 0).ok_or(Error::invalid_operation("age")),
            None => Ok(false),
        });
        assert!(strict.matches(&entity(attrs([("age", "x")]))).is_err());
    }
}
