//! Dependency specifications of filter predicates.

use crate::error::{Error, Result};
use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;

/// The attribute keys whose change can affect a predicate outcome.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DependencySpec {
    /// Re-evaluate on any attribute change.
    All,
    /// Re-evaluate only when one of these keys changes. Never empty.
    Keys(BTreeSet<String>),
}

impl DependencySpec {
    /// Creates a key-set dependency.
    ///
    /// Fails with `InvalidOperation` when no key is given.
    pub fn keys<K, I>(keys: I) -> Result<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = K>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(Error::invalid_operation(
                "dependency key set must not be empty",
            ));
        }
        Ok(DependencySpec::Keys(keys))
    }

    /// Creates a dependency on a single key.
    pub fn key(key: impl Into<String>) -> Self {
        let mut keys = BTreeSet::new();
        keys.insert(key.into());
        DependencySpec::Keys(keys)
    }

    /// Returns true for the `All` sentinel.
    #[inline]
    pub fn is_all(&self) -> bool {
        matches!(self, DependencySpec::All)
    }

    /// Returns true if a change to `key` can affect the predicate.
    pub fn depends_on(&self, key: &str) -> bool {
        match self {
            DependencySpec::All => true,
            DependencySpec::Keys(keys) => keys.contains(key),
        }
    }

    /// Returns true if any of the given keys is a dependency.
    pub fn intersects<'a, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        match self {
            DependencySpec::All => true,
            DependencySpec::Keys(deps) => keys.into_iter().any(|k| deps.contains(k)),
        }
    }

    /// Returns the declared keys, empty for `All`.
    pub fn key_list(&self) -> Vec<&str> {
        match self {
            DependencySpec::All => Vec::new(),
            DependencySpec::Keys(keys) => keys.iter().map(|k| k.as_str()).collect(),
        }
    }
}
