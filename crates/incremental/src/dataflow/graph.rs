//! Query graph management.
//!
//! The graph is an arena of nodes addressed by `NodeId`. Filter nodes are
//! the leaves; composite nodes intersect two or more inputs. Nodes are only
//! ever created on top of existing ones, so ascending id order is a
//! topological order and propagation can walk successors with a min-first
//! worklist, visiting every composite at most once per mutation.

use crate::cache::DEFAULT_CACHE_SIZE;
use crate::dataflow::node::{FilterNode, Node, NodeKind, PredicateFn};
use crate::delta::NodeChange;
use crate::influence::InfluenceTable;
use crate::store::EntityStore;
use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};
use tracing::{debug, trace, warn};
use vigil_core::{DependencySpec, Entity, EntityId, Error, NodeId, Result};

/// The DAG of filter and composite nodes plus the influence table.
pub struct QueryGraph {
    /// Node arena, indexed by node id
    nodes: Vec<Node>,
    /// Filter identity key -> node
    filters_by_identity: HashMap<String, NodeId>,
    /// Sorted leaf set -> composite node
    composites_by_leaves: HashMap<Vec<NodeId>, NodeId>,
    /// Attribute key -> filters depending on it
    filters_by_key: HashMap<String, Vec<NodeId>>,
    /// Filters depending on every attribute
    all_filters: Vec<NodeId>,
    /// Entity -> interested filters
    influence: InfluenceTable,
    /// Capacity of each filter's predicate cache
    cache_size: usize,
}

impl Default for QueryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryGraph {
    /// Creates an empty graph with the default cache size.
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_CACHE_SIZE)
    }

    /// Creates an empty graph whose filters cache `cache_size` outcomes each.
    pub fn with_cache_size(cache_size: usize) -> Self {
        Self {
            nodes: Vec::new(),
            filters_by_identity: HashMap::new(),
            composites_by_leaves: HashMap::new(),
            filters_by_key: HashMap::new(),
            all_filters: Vec::new(),
            influence: InfluenceTable::new(),
            cache_size,
        }
    }

    fn next_id(&self) -> Result<NodeId> {
        NodeId::try_from(self.nodes.len())
            .map_err(|_| Error::invalid_operation("query graph node limit reached"))
    }

    /// Registers a filter node, or returns the node already registered under
    /// `identity`.
    ///
    /// A new node scans the store once: every entity carrying one of the
    /// dependency keys (every entity for `All`) is connected in the influence
    /// table and evaluated. If any evaluation fails nothing is registered.
    pub fn register_filter(
        &mut self,
        store: &EntityStore,
        identity: impl Into<String>,
        dependencies: DependencySpec,
        predicate: PredicateFn,
    ) -> Result<NodeId> {
        let identity = identity.into();
        if let Some(&existing) = self.filters_by_identity.get(&identity) {
            debug!(node = existing, identity = %identity, "reusing filter node");
            return Ok(existing);
        }

        let id = self.next_id()?;
        let mut node = Node::filter(id, identity.clone(), dependencies, predicate, self.cache_size);
        let mut interested = Vec::new();
        if let NodeKind::Filter(filter) = &mut node.kind {
            for entity in store.iter() {
                if !filter.dependencies.intersects(entity.keys()) && !filter.dependencies.is_all() {
                    continue;
                }
                let matches = evaluate(filter, id, entity)?;
                filter.cache.insert(entity.id(), matches);
                if matches {
                    node.snapshot.insert(entity.id());
                }
                interested.push(entity.id());
            }

            match &filter.dependencies {
                DependencySpec::All => self.all_filters.push(id),
                DependencySpec::Keys(keys) => {
                    for key in keys {
                        self.filters_by_key.entry(key.clone()).or_default().push(id);
                    }
                }
            }
        }

        for entity in interested {
            self.influence.connect(entity, id);
        }

        debug!(
            node = id,
            identity = %identity,
            matches = node.snapshot.len(),
            "registered filter node"
        );
        self.filters_by_identity.insert(identity, id);
        self.nodes.push(node);
        Ok(id)
    }

    /// Creates (or reuses) the AND of `inputs`.
    ///
    /// Inputs are flattened to their leaf filters; an existing composite with
    /// the same leaf set is returned regardless of input order or nesting.
    pub fn compose_and(&mut self, inputs: &[NodeId]) -> Result<NodeId> {
        for &input in inputs {
            if self.node(input).is_none() {
                return Err(Error::unattached_query(input));
            }
        }

        let leaves = self.flatten(inputs);
        if leaves.len() < 2 {
            return Err(Error::invalid_operation(format!(
                "and-composition needs at least two distinct filters, got {}",
                leaves.len()
            )));
        }

        if let Some(&existing) = self.composites_by_leaves.get(&leaves) {
            debug!(node = existing, "reusing composite node");
            return Ok(existing);
        }

        let mut direct: Vec<NodeId> = Vec::with_capacity(inputs.len());
        for &input in inputs {
            if !direct.contains(&input) {
                direct.push(input);
            }
        }

        let id = self.next_id()?;
        let snapshot = self.intersect(&direct);
        for &input in &direct {
            self.nodes[input as usize].successors.insert(id);
        }

        let identity = composite_identity(&leaves);
        debug!(
            node = id,
            identity = %identity,
            matches = snapshot.len(),
            "registered composite node"
        );
        self.nodes
            .push(Node::composite(id, identity, direct, leaves.clone(), snapshot));
        self.composites_by_leaves.insert(leaves, id);
        Ok(id)
    }

    fn flatten(&self, inputs: &[NodeId]) -> Vec<NodeId> {
        let mut leaves = BTreeSet::new();
        for &input in inputs {
            match &self.nodes[input as usize].kind {
                NodeKind::Filter(_) => {
                    leaves.insert(input);
                }
                NodeKind::Composite(composite) => leaves.extend(composite.leaves.iter().copied()),
            }
        }
        leaves.into_iter().collect()
    }

    fn intersect(&self, inputs: &[NodeId]) -> HashSet<EntityId> {
        let mut counts: HashMap<EntityId, usize> = HashMap::new();
        for &input in inputs {
            for &entity in &self.nodes[input as usize].snapshot {
                *counts.entry(entity).or_insert(0) += 1;
            }
        }
        counts
            .into_iter()
            .filter(|&(_, count)| count == inputs.len())
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Handles a newly created entity.
    ///
    /// The entity gets an influence row; filters over `All` and filters over
    /// any key it already carries are evaluated.
    pub fn on_insert(
        &mut self,
        store: &EntityStore,
        id: EntityId,
        out: &mut Vec<NodeChange>,
    ) -> Result<()> {
        self.influence.add_row(id);
        let keys: Vec<String> = store
            .get(id)
            .map(|entity| entity.keys().map(String::from).collect())
            .unwrap_or_default();
        self.apply(store, id, &keys, true, out)
    }

    /// Handles an attribute change of an existing entity.
    ///
    /// Only filters whose dependencies intersect `changed` are re-evaluated.
    /// A predicate failure leaves that node's state for the entity untouched;
    /// the rest of the update is still applied and the first failure returned.
    pub fn on_update(
        &mut self,
        store: &EntityStore,
        id: EntityId,
        changed: &[String],
        out: &mut Vec<NodeChange>,
    ) -> Result<()> {
        if changed.is_empty() {
            return Ok(());
        }
        self.apply(store, id, changed, false, out)
    }

    fn apply(
        &mut self,
        store: &EntityStore,
        id: EntityId,
        changed: &[String],
        created: bool,
        out: &mut Vec<NodeChange>,
    ) -> Result<()> {
        let entity = store.get(id).ok_or(Error::unknown_entity(id))?;
        self.refresh_influence(id, changed, created);

        let mut failure = None;
        let mut changed_nodes = Vec::new();
        for node_id in self.influence.get_vec(id) {
            let Node { kind, snapshot, .. } = &mut self.nodes[node_id as usize];
            let NodeKind::Filter(filter) = kind else {
                continue;
            };

            let touched = (created && filter.dependencies.is_all())
                || filter
                    .dependencies
                    .intersects(changed.iter().map(|key| key.as_str()));
            if !touched {
                continue;
            }

            let matches = match evaluate(filter, node_id, entity) {
                Ok(matches) => matches,
                Err(err) => {
                    warn!(node = node_id, entity = id, error = %err, "predicate failed");
                    failure.get_or_insert(err);
                    continue;
                }
            };

            let previous = filter
                .cache
                .get(id)
                .unwrap_or_else(|| snapshot.contains(&id));
            filter.cache.insert(id, matches);
            if matches == previous {
                continue;
            }

            if matches {
                snapshot.insert(id);
                out.push(NodeChange::added(node_id, id));
            } else {
                snapshot.remove(&id);
                out.push(NodeChange::removed(node_id, id));
            }
            trace!(node = node_id, entity = id, matches, "filter transition");
            changed_nodes.push(node_id);
        }

        self.propagate(id, &changed_nodes, out);

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn refresh_influence(&mut self, id: EntityId, changed: &[String], created: bool) {
        if created || !changed.is_empty() {
            for &node in &self.all_filters {
                if self.influence.connect(id, node) {
                    trace!(node, entity = id, "influence grown");
                }
            }
        }
        for key in changed {
            if let Some(nodes) = self.filters_by_key.get(key) {
                for &node in nodes {
                    if self.influence.connect(id, node) {
                        trace!(node, entity = id, key = %key, "influence grown");
                    }
                }
            }
        }
    }

    /// Rechecks the successors of the directly changed nodes for one entity.
    fn propagate(&mut self, id: EntityId, changed_nodes: &[NodeId], out: &mut Vec<NodeChange>) {
        let mut pending: BTreeSet<NodeId> = BTreeSet::new();
        for &node in changed_nodes {
            pending.extend(self.nodes[node as usize].successors.iter().copied());
        }

        while let Some(node_id) = pending.pop_first() {
            let member = match &self.nodes[node_id as usize].kind {
                NodeKind::Composite(composite) => composite
                    .inputs
                    .iter()
                    .all(|&input| self.nodes[input as usize].snapshot.contains(&id)),
                NodeKind::Filter(_) => continue,
            };

            let node = &mut self.nodes[node_id as usize];
            if member == node.snapshot.contains(&id) {
                continue;
            }
            if member {
                node.snapshot.insert(id);
                out.push(NodeChange::added(node_id, id));
            } else {
                node.snapshot.remove(&id);
                out.push(NodeChange::removed(node_id, id));
            }
            trace!(node = node_id, entity = id, member, "composite transition");
            pending.extend(node.successors.iter().copied());
        }
    }

    /// Evicts a removed entity from every node reachable from its influence
    /// row and drops the row.
    ///
    /// Every node of the closure reports a removal, member or not. Returns
    /// false if the entity had no row.
    pub fn on_remove(&mut self, id: EntityId, out: &mut Vec<NodeChange>) -> bool {
        let Some(row) = self.influence.remove(id) else {
            return false;
        };

        for node_id in self.descendants(row.iter().copied()) {
            let node = &mut self.nodes[node_id as usize];
            let was_member = node.snapshot.remove(&id);
            if let NodeKind::Filter(filter) = &mut node.kind {
                filter.cache.remove(id);
            }
            out.push(NodeChange::evicted(node_id, id, was_member));
        }
        true
    }

    /// Returns the given nodes plus everything reachable through successor
    /// edges.
    pub fn descendants<I>(&self, roots: I) -> BTreeSet<NodeId>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut closure = BTreeSet::new();
        let mut stack: Vec<NodeId> = roots.into_iter().collect();
        while let Some(node) = stack.pop() {
            if closure.insert(node) {
                stack.extend(self.nodes[node as usize].successors.iter().copied());
            }
        }
        closure
    }

    /// Gets a node by id.
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    /// Returns a node's snapshot in ascending id order.
    pub fn snapshot(&self, id: NodeId) -> Result<Vec<EntityId>> {
        self.node(id)
            .map(Node::snapshot)
            .ok_or(Error::unattached_query(id))
    }

    /// Returns true if `entity` is in the snapshot of `node`.
    pub fn contains(&self, node: NodeId, entity: EntityId) -> Result<bool> {
        self.node(node)
            .map(|n| n.contains(entity))
            .ok_or(Error::unattached_query(node))
    }

    /// Returns the leaf filters of a node (itself for a filter).
    pub fn leaves(&self, id: NodeId) -> Result<Vec<NodeId>> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Filter(_)) => Ok(alloc::vec![id]),
            Some(NodeKind::Composite(composite)) => Ok(composite.leaves.clone()),
            None => Err(Error::unattached_query(id)),
        }
    }

    /// Returns the influence table.
    #[inline]
    pub fn influence(&self) -> &InfluenceTable {
        &self.influence
    }

    /// Returns the per-filter cache capacity.
    #[inline]
    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    /// Returns the number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns an iterator over all node IDs.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|node| node.id)
    }
}

fn evaluate(filter: &FilterNode, node: NodeId, entity: &Entity) -> Result<bool> {
    (filter.predicate)(entity).map_err(|err| match err {
        Error::PredicateFailure { .. } => err,
        other => Error::predicate_failure(node, entity.id(), other.to_string()),
    })
}

fn composite_identity(leaves: &[NodeId]) -> String {
    let parts: Vec<String> = leaves.iter().map(|leaf| leaf.to_string()).collect();
    format!("and({})", parts.join(","))
}
