//! World - Main entry point for entity and live-query operations.
//!
//! `World` owns the entity store, the query graph and the notification
//! layer. Every mutation goes through one pipeline: it is either applied on
//! the spot or queued in the batcher, and node changes are dispatched to
//! subscribers only once the mutation or the whole batch has been applied.

use crate::filter::Filter;
use crate::query::QueryBuilder;
use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use hashbrown::HashSet;
use tracing::debug;
use vigil_core::{Attributes, DependencySpec, Entity, EntityId, Error, IdGenerator, NodeId, Result, Value};
use vigil_incremental::{EntityStore, NodeChange, QueryGraph};
use vigil_reactive::{
    Batcher, ChangeSet, Listener, Mutation, NotificationHub, OpKind, SubscriptionId, TurnQueue,
};

use crate::options::WorldOptions;

/// Global world id counter, so handles cannot cross worlds.
static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(1);

/// Callback told about every delivered batch.
pub type DeliverCallback = Box<dyn Fn(OpKind, &[EntityId])>;

/// Handle to a query node of one world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    world: u64,
    node: NodeId,
}

impl NodeHandle {
    /// Returns the node id inside its world.
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// Which attributes an `each` callback changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Touched {
    Nothing,
    Keys(Vec<String>),
    /// Every attribute the entity carries afterwards
    All,
}

/// Entities, live queries and their subscribers.
pub struct World {
    id: u64,
    options: WorldOptions,
    store: EntityStore,
    graph: QueryGraph,
    hub: NotificationHub,
    batcher: Batcher,
    turns: TurnQueue<OpKind>,
    /// Ids created by mutations that are still queued
    pending_creates: HashSet<EntityId>,
    deliver_listeners: Vec<DeliverCallback>,
    /// Failure of a flush forced by a creation, reported by the next
    /// `flush` or `end_turn`
    held_failure: Option<Error>,
    event_count: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates a world with default options.
    pub fn new() -> Self {
        Self::with_options(WorldOptions::default())
    }

    /// Creates a world with the given options.
    pub fn with_options(options: WorldOptions) -> Self {
        Self::with_generator(options, IdGenerator::default())
    }

    /// Creates a world that takes entity ids from `ids`.
    pub fn with_generator(options: WorldOptions, ids: IdGenerator) -> Self {
        Self {
            id: NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed),
            graph: QueryGraph::with_cache_size(options.cache_size),
            batcher: Batcher::new(options.max_batch_size),
            store: EntityStore::with_generator(ids),
            hub: NotificationHub::new(),
            turns: TurnQueue::new(),
            pending_creates: HashSet::new(),
            deliver_listeners: Vec::new(),
            held_failure: None,
            event_count: 0,
            options,
        }
    }

    /// Returns the options in effect.
    #[inline]
    pub fn options(&self) -> &WorldOptions {
        &self.options
    }

    /// Switches between deferred and immediate delivery.
    ///
    /// Leaving deferred mode delivers everything pending first; its failure,
    /// if any, is returned once the switch is done.
    pub fn set_defer_delivery(&mut self, enabled: bool) -> Result<()> {
        let result = if self.options.defer_delivery && !enabled {
            self.deliver()
        } else {
            Ok(())
        };
        self.options.defer_delivery = enabled;
        result
    }

    // ---- entities ----

    /// Creates an entity with no attributes.
    pub fn create_entity(&mut self) -> Result<EntityId> {
        self.create_entity_with(Attributes::new())
    }

    /// Creates an entity with initial attributes.
    ///
    /// The id is allocated right away, also when delivery is deferred. When
    /// the creation fills its batch, failures of the forced flush are held
    /// for the next `flush` or `end_turn` so the id is still returned.
    pub fn create_entity_with(&mut self, attributes: Attributes) -> Result<EntityId> {
        let id = self.store.allocate_id();
        if !self.options.defer_delivery {
            return self.submit(Mutation::Create { id, attributes }).map(|_| id);
        }

        self.pending_creates.insert(id);
        if let Err(err) = self.submit(Mutation::Create { id, attributes }) {
            debug!(entity = id, error = %err, "holding forced flush failure");
            self.held_failure.get_or_insert(err);
        }
        Ok(id)
    }

    /// Merges attributes into an entity.
    ///
    /// An unknown id creates the entity when `create_missing_on_update` is
    /// set and fails with `UnknownEntity` otherwise.
    pub fn set_attributes(&mut self, id: EntityId, attributes: Attributes) -> Result<()> {
        if !self.is_known(id) && !self.options.create_missing_on_update {
            return Err(Error::unknown_entity(id));
        }
        self.submit(Mutation::SetAttributes { id, attributes })
    }

    /// Writes one existing attribute through the update pipeline.
    ///
    /// With `overwrite_on_update` unset the value is not stored and only
    /// `key` is reported as changed; the caller is expected to have written
    /// it with `apply_internal`. A missing entity or attribute goes through
    /// `set_attributes` when `create_missing_on_update` is set.
    pub fn request_update(&mut self, id: EntityId, key: &str, value: impl Into<Value>) -> Result<()> {
        let has_key = self.store.get(id).map(|entity| entity.has(key));
        match has_key {
            Some(true) => {
                let mut values = Attributes::new();
                if self.options.overwrite_on_update {
                    values.insert(String::from(key), value.into());
                }
                self.submit(Mutation::Update {
                    id,
                    keys: alloc::vec![String::from(key)],
                    values,
                })
            }
            // queued creations are not in the store yet; merging is always right
            _ if self.options.create_missing_on_update || self.pending_creates.contains(&id) => {
                let mut attributes = Attributes::new();
                attributes.insert(String::from(key), value.into());
                self.submit(Mutation::SetAttributes { id, attributes })
            }
            Some(false) => Err(Error::invalid_operation(format!(
                "entity {} has no attribute {}",
                id, key
            ))),
            None => Err(Error::unknown_entity(id)),
        }
    }

    /// Writes an attribute straight into the store. Nothing is re-evaluated.
    pub fn apply_internal(&mut self, id: EntityId, key: &str, value: impl Into<Value>) -> Result<()> {
        self.store.apply_internal(id, key, value.into()).map(|_| ())
    }

    /// Removes an entity and evicts it from every query it may be part of.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<()> {
        if !self.is_known(id) {
            return Err(Error::unknown_entity(id));
        }
        self.submit(Mutation::Remove { id })
    }

    /// Gets an entity by id.
    #[inline]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.store.get(id)
    }

    /// Returns the number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if there are no entities.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Returns every live entity id in ascending order.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.store.ids()
    }

    /// Returns the number of node membership changes seen so far. Only
    /// counted when `count_events` is set.
    #[inline]
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    fn is_known(&self, id: EntityId) -> bool {
        self.store.contains(id) || self.pending_creates.contains(&id)
    }

    // ---- queries ----

    /// Registers a filter node, or returns the node registered under the
    /// same identity key.
    pub fn register_filter<F>(
        &mut self,
        dependencies: DependencySpec,
        predicate: F,
        identity: impl Into<String>,
    ) -> Result<NodeHandle>
    where
        F: Fn(&Entity) -> Result<bool> + 'static,
    {
        self.register(Filter::try_new(identity, dependencies, predicate))
    }

    /// Registers a prepared filter.
    pub fn register(&mut self, filter: Filter) -> Result<NodeHandle> {
        let (identity, dependencies, predicate) = filter.into_parts();
        let node = self
            .graph
            .register_filter(&self.store, identity, dependencies, predicate)?;
        Ok(self.handle(node))
    }

    /// Returns the AND of the given nodes. Order and nesting of the inputs
    /// do not matter; equal leaf sets give the same handle.
    pub fn compose_and(&mut self, inputs: &[NodeHandle]) -> Result<NodeHandle> {
        let nodes = inputs
            .iter()
            .map(|handle| self.resolve(*handle))
            .collect::<Result<Vec<_>>>()?;
        let node = self.graph.compose_and(&nodes)?;
        Ok(self.handle(node))
    }

    /// Starts a chained query.
    pub fn query(&mut self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }

    /// Returns the ids currently matching a node, ascending.
    pub fn snapshot(&self, handle: NodeHandle) -> Result<Vec<EntityId>> {
        self.graph.snapshot(self.resolve(handle)?)
    }

    /// Returns true if an entity currently matches a node.
    pub fn contains(&self, handle: NodeHandle, id: EntityId) -> Result<bool> {
        self.graph.contains(self.resolve(handle)?, id)
    }

    /// Returns the query graph.
    #[inline]
    pub fn graph(&self) -> &QueryGraph {
        &self.graph
    }

    fn handle(&self, node: NodeId) -> NodeHandle {
        NodeHandle {
            world: self.id,
            node,
        }
    }

    fn resolve(&self, handle: NodeHandle) -> Result<NodeId> {
        if handle.world != self.id || self.graph.node(handle.node).is_none() {
            return Err(Error::unattached_query(handle.node));
        }
        Ok(handle.node)
    }

    // ---- subscriptions ----

    /// Subscribes to a node with separate add and remove callbacks. Each
    /// callback only fires with a non-empty id list.
    pub fn subscribe<A, R>(&mut self, handle: NodeHandle, on_add: A, on_remove: R) -> Result<SubscriptionId>
    where
        A: Fn(&[EntityId]) + 'static,
        R: Fn(&[EntityId]) + 'static,
    {
        let node = self.resolve(handle)?;
        Ok(self.hub.subscribe(node, Listener::split(on_add, on_remove)))
    }

    /// Subscribes to a node's change sets.
    pub fn observe<F>(&mut self, handle: NodeHandle, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&ChangeSet) + 'static,
    {
        let node = self.resolve(handle)?;
        Ok(self.hub.subscribe(node, Listener::changes(callback)))
    }

    /// Removes a subscription. Returns false if it did not exist.
    pub fn unsubscribe(&mut self, handle: NodeHandle, id: SubscriptionId) -> Result<bool> {
        let node = self.resolve(handle)?;
        Ok(self.hub.unsubscribe(node, id))
    }

    /// Registers a callback told about every delivered batch.
    pub fn on_deliver<F>(&mut self, callback: F)
    where
        F: Fn(OpKind, &[EntityId]) + 'static,
    {
        self.deliver_listeners.push(Box::new(callback));
    }

    // ---- projection ----

    /// Visits every entity matching a node and lets `f` edit its attributes
    /// in place.
    ///
    /// Edits are internal writes; the keys `f` reports as touched are then
    /// submitted as one update per entity.
    pub fn each<F>(&mut self, handle: NodeHandle, mut f: F) -> Result<()>
    where
        F: FnMut(EntityId, &mut Attributes) -> Touched,
    {
        let ids = self.snapshot(handle)?;
        let mut failure = None;
        for id in ids {
            let Some(entity) = self.store.get_mut(id) else {
                continue;
            };
            let keys = match f(id, entity.attributes_mut()) {
                Touched::Nothing => continue,
                Touched::Keys(keys) => keys,
                Touched::All => entity.keys().map(String::from).collect(),
            };
            if keys.is_empty() {
                continue;
            }
            let update = Mutation::Update {
                id,
                keys,
                values: Attributes::new(),
            };
            if let Err(err) = self.submit(update) {
                failure.get_or_insert(err);
            }
        }
        failure.map_or(Ok(()), Err)
    }

    // ---- delivery ----

    /// Delivers every pending mutation now. Already scheduled end-of-turn
    /// deliveries become no-ops.
    pub fn flush(&mut self) -> Result<()> {
        self.deliver()
    }

    /// Ends the current turn, running the scheduled deliveries.
    pub fn end_turn(&mut self) -> Result<()> {
        let mut failure = None;
        while let Some((task, kind)) = self.turns.pop() {
            self.batcher.task_started(kind, task);
            debug!(task, kind = %kind, "end of turn delivery");
            if let Err(err) = self.deliver() {
                failure.get_or_insert(err);
            }
        }
        match failure.or_else(|| self.held_failure.take()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Returns true if mutations are waiting for delivery.
    pub fn has_pending(&self) -> bool {
        !self.batcher.is_empty()
    }

    fn submit(&mut self, mutation: Mutation) -> Result<()> {
        if self.options.defer_delivery {
            if self.batcher.submit(mutation, &mut self.turns) {
                debug!(limit = self.batcher.max_batch_size(), "forced flush");
                return self.deliver();
            }
            return Ok(());
        }

        let kind = mutation.kind();
        let id = mutation.id();
        let mut changes = Vec::new();
        let result = self.apply(mutation, &mut changes);
        self.record(&changes);
        if !matches!(result, Err(Error::UnknownEntity { .. })) {
            self.notify_delivered(kind, &[id]);
        }
        self.hub.dispatch();
        result
    }

    fn deliver(&mut self) -> Result<()> {
        let drained = self.batcher.drain(&mut self.turns);
        self.pending_creates.clear();
        let mut failure = self.held_failure.take();
        if drained.is_empty() {
            return failure.map_or(Ok(()), Err);
        }
        debug!(
            mutations = drained.mutations.len(),
            batches = drained.batches.len(),
            "delivering batch"
        );

        let mut changes = Vec::new();
        for mutation in drained.mutations {
            if let Err(err) = self.apply(mutation, &mut changes) {
                failure.get_or_insert(err);
            }
        }
        self.record(&changes);
        for batch in &drained.batches {
            self.notify_delivered(batch.kind, &batch.ids);
        }
        self.hub.dispatch();
        failure.map_or(Ok(()), Err)
    }

    fn apply(&mut self, mutation: Mutation, out: &mut Vec<NodeChange>) -> Result<()> {
        match mutation {
            Mutation::Create { id, attributes } => self.insert(id, attributes, out),
            Mutation::SetAttributes { id, attributes } => {
                if !self.store.contains(id) {
                    if !self.options.create_missing_on_update {
                        return Err(Error::unknown_entity(id));
                    }
                    return self.insert(id, attributes, out);
                }
                let changed = self.store.set_attributes(id, attributes)?;
                self.graph.on_update(&self.store, id, &changed, out)
            }
            Mutation::Update { id, keys, values } => {
                if !self.store.contains(id) {
                    return Err(Error::unknown_entity(id));
                }
                for (key, value) in values {
                    self.store.apply_internal(id, key, value)?;
                }
                self.graph.on_update(&self.store, id, &keys, out)
            }
            Mutation::Remove { id } => {
                self.store.remove(id)?;
                self.graph.on_remove(id, out);
                Ok(())
            }
        }
    }

    fn insert(&mut self, id: EntityId, attributes: Attributes, out: &mut Vec<NodeChange>) -> Result<()> {
        if !self.store.insert(id) {
            return Err(Error::invalid_operation(format!("entity {} already exists", id)));
        }
        self.store.set_attributes(id, attributes)?;
        self.graph.on_insert(&self.store, id, out)
    }

    fn record(&mut self, changes: &[NodeChange]) {
        if self.options.count_events {
            self.event_count += changes.len() as u64;
        }
        self.hub.record(changes);
    }

    fn notify_delivered(&self, kind: OpKind, ids: &[EntityId]) {
        for listener in &self.deliver_listeners {
            listener(kind, ids);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;
    use vigil_core::attrs;

    #[test]
    fn test_create_and_snapshot() {
        let mut world = World::new();
        let alive = world.register(Filter::flag("alive")).unwrap();
        let id = world.create_entity_with(attrs([("alive", true)])).unwrap();
        let _dead = world.create_entity_with(attrs([("alive", false)])).unwrap();

        assert_eq!(world.snapshot(alive).unwrap(), vec![id]);
        assert_eq!(world.len(), 2);
    }

    #[test]
    fn test_handles_do_not_cross_worlds() {
        let mut first = World::new();
        let mut second = World::new();
        let handle = first.register(Filter::has("a")).unwrap();

        assert_eq!(
            second.snapshot(handle),
            Err(Error::unattached_query(handle.node()))
        );
        assert!(second.compose_and(&[handle, handle]).is_err());
    }

    #[test]
    fn test_set_attributes_unknown_entity() {
        let options = WorldOptions::new().with_create_missing_on_update(false);
        let mut world = World::with_options(options);
        assert_eq!(
            world.set_attributes(9, attrs([("a", true)])),
            Err(Error::unknown_entity(9))
        );
        assert!(world.is_empty());
    }

    #[test]
    fn test_set_attributes_creates_missing() {
        let mut world = World::new();
        let a = world.register(Filter::flag("a")).unwrap();
        world.set_attributes(9, attrs([("a", true)])).unwrap();
        assert_eq!(world.snapshot(a).unwrap(), vec![9]);
        // generated ids continue past the inserted one
        assert_eq!(world.create_entity().unwrap(), 10);
    }

    #[test]
    fn test_request_update_overwrite() {
        let mut world = World::new();
        let a = world.register(Filter::flag("a")).unwrap();
        let id = world.create_entity_with(attrs([("a", false)])).unwrap();

        world.request_update(id, "a", true).unwrap();
        assert_eq!(world.snapshot(a).unwrap(), vec![id]);
    }

    #[test]
    fn test_request_update_without_overwrite() {
        let options = WorldOptions::new().with_overwrite_on_update(false);
        let mut world = World::with_options(options);
        let a = world.register(Filter::flag("a")).unwrap();
        let id = world.create_entity_with(attrs([("a", false)])).unwrap();

        // the value passed is ignored, the stored one is re-evaluated
        world.request_update(id, "a", true).unwrap();
        assert!(world.snapshot(a).unwrap().is_empty());

        world.apply_internal(id, "a", true).unwrap();
        assert!(world.snapshot(a).unwrap().is_empty());
        world.request_update(id, "a", false).unwrap();
        assert_eq!(world.snapshot(a).unwrap(), vec![id]);
    }

    #[test]
    fn test_request_update_missing_key() {
        let mut world = World::new();
        let a = world.register(Filter::flag("a")).unwrap();
        let id = world.create_entity().unwrap();
        world.request_update(id, "a", true).unwrap();
        assert_eq!(world.snapshot(a).unwrap(), vec![id]);

        let options = WorldOptions::new().with_create_missing_on_update(false);
        let mut strict = World::with_options(options);
        let id = strict.create_entity().unwrap();
        assert!(matches!(
            strict.request_update(id, "a", true),
            Err(Error::InvalidOperation { .. })
        ));
        assert_eq!(strict.request_update(42, "a", true), Err(Error::unknown_entity(42)));
    }

    #[test]
    fn test_subscribe_split_callbacks() {
        let mut world = World::new();
        let a = world.register(Filter::flag("a")).unwrap();
        let added = Rc::new(RefCell::new(Vec::new()));
        let removed = Rc::new(RefCell::new(Vec::new()));
        let (add_sink, remove_sink) = (added.clone(), removed.clone());
        world
            .subscribe(
                a,
                move |ids| add_sink.borrow_mut().extend_from_slice(ids),
                move |ids| remove_sink.borrow_mut().extend_from_slice(ids),
            )
            .unwrap();

        let id = world.create_entity_with(attrs([("a", true)])).unwrap();
        world.set_attributes(id, attrs([("a", false)])).unwrap();

        assert_eq!(*added.borrow(), vec![id]);
        assert_eq!(*removed.borrow(), vec![id]);
    }

    #[test]
    fn test_each_updates_through_pipeline() {
        let mut world = World::new();
        let a = world.register(Filter::flag("a")).unwrap();
        let b = world.register(Filter::flag("b")).unwrap();
        for _ in 0..3 {
            world.create_entity_with(attrs([("a", true), ("b", false)])).unwrap();
        }

        world
            .each(a, |_, attributes| {
                attributes.insert(String::from("b"), Value::Boolean(true));
                Touched::Keys(vec![String::from("b")])
            })
            .unwrap();
        assert_eq!(world.snapshot(b).unwrap(), vec![1, 2, 3]);

        // untouched edits are not propagated
        world
            .each(a, |_, attributes| {
                attributes.insert(String::from("b"), Value::Boolean(false));
                Touched::Nothing
            })
            .unwrap();
        assert_eq!(world.snapshot(b).unwrap(), vec![1, 2, 3]);

        world.each(a, |_, _| Touched::All).unwrap();
        assert!(world.snapshot(b).unwrap().is_empty());
    }

    #[test]
    fn test_event_count() {
        let options = WorldOptions::new().with_count_events(true);
        let mut world = World::with_options(options);
        let a = world.register(Filter::flag("a")).unwrap();
        let b = world.register(Filter::flag("b")).unwrap();
        world.compose_and(&[a, b]).unwrap();

        world.create_entity_with(attrs([("a", true), ("b", true)])).unwrap();
        assert_eq!(world.event_count(), 3);

        assert_eq!(World::new().event_count(), 0);
    }

    #[test]
    fn test_leaving_deferred_mode_delivers_pending() {
        let mut world = World::with_options(WorldOptions::new().with_defer_delivery(true));
        let a = world.register(Filter::flag("a")).unwrap();
        let id = world.create_entity_with(attrs([("a", true)])).unwrap();
        assert!(world.has_pending());
        assert!(world.snapshot(a).unwrap().is_empty());

        world.set_defer_delivery(false).unwrap();
        assert!(!world.options().defer_delivery);
        assert!(!world.has_pending());
        assert_eq!(world.snapshot(a).unwrap(), vec![id]);

        // the cancelled end-of-turn task is a no-op
        world.end_turn().unwrap();
        let other = world.create_entity_with(attrs([("a", true)])).unwrap();
        assert_eq!(world.snapshot(a).unwrap(), vec![id, other]);

        world.set_defer_delivery(true).unwrap();
        world.set_attributes(other, attrs([("a", false)])).unwrap();
        assert_eq!(world.snapshot(a).unwrap(), vec![id, other]);
        world.end_turn().unwrap();
        assert_eq!(world.snapshot(a).unwrap(), vec![id]);
    }

    #[test]
    fn test_on_deliver_immediate() {
        let mut world = World::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        world.on_deliver(move |kind, ids| sink.borrow_mut().push((kind, ids.to_vec())));

        let id = world.create_entity().unwrap();
        world.remove_entity(id).unwrap();
        assert!(world.remove_entity(id).is_err());

        assert_eq!(
            *log.borrow(),
            vec![(OpKind::Create, vec![id]), (OpKind::Remove, vec![id])]
        );
    }
}
