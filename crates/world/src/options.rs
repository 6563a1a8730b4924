//! World configuration.

use vigil_incremental::DEFAULT_CACHE_SIZE;

/// Options recognized by `World`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldOptions {
    /// Coalesce mutations until the end of the turn instead of applying
    /// them on the spot.
    pub defer_delivery: bool,
    /// Pending mutations of one kind that force an immediate flush.
    pub max_batch_size: usize,
    /// Predicate outcomes cached per filter node.
    pub cache_size: usize,
    /// Create unknown entities (and missing attributes) on update instead
    /// of failing.
    pub create_missing_on_update: bool,
    /// Store the value passed to `request_update`. When false the caller
    /// has already written it through `apply_internal`.
    pub overwrite_on_update: bool,
    /// Count every node membership change.
    pub count_events: bool,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            defer_delivery: false,
            max_batch_size: usize::MAX,
            cache_size: DEFAULT_CACHE_SIZE,
            create_missing_on_update: true,
            overwrite_on_update: true,
            count_events: false,
        }
    }
}

impl WorldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defer_delivery(mut self, value: bool) -> Self {
        self.defer_delivery = value;
        self
    }

    pub fn with_max_batch_size(mut self, value: usize) -> Self {
        self.max_batch_size = value;
        self
    }

    pub fn with_cache_size(mut self, value: usize) -> Self {
        self.cache_size = value;
        self
    }

    pub fn with_create_missing_on_update(mut self, value: bool) -> Self {
        self.create_missing_on_update = value;
        self
    }

    pub fn with_overwrite_on_update(mut self, value: bool) -> Self {
        self.overwrite_on_update = value;
        self
    }

    pub fn with_count_events(mut self, value: bool) -> Self {
        self.count_events = value;
        self
    }
}
