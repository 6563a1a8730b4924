//! Query graph node definitions.

use crate::cache::PredicateCache;
use alloc::boxed::Box;
use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashSet;
use vigil_core::{DependencySpec, Entity, EntityId, NodeId, Result};

/// Predicate deciding whether an entity belongs to a filter node.
pub type PredicateFn = Box<dyn Fn(&Entity) -> Result<bool>>;

/// A leaf node: a predicate over a single entity.
pub struct FilterNode {
    /// Attribute keys whose change can alter the outcome.
    pub(crate) dependencies: DependencySpec,
    /// The predicate itself.
    pub(crate) predicate: PredicateFn,
    /// Last outcome per entity, bounded.
    pub(crate) cache: PredicateCache,
}

impl FilterNode {
    /// Returns the dependency spec.
    #[inline]
    pub fn dependencies(&self) -> &DependencySpec {
        &self.dependencies
    }

    /// Returns the predicate cache.
    #[inline]
    pub fn cache(&self) -> &PredicateCache {
        &self.cache
    }
}

/// A derived AND node over two or more inputs.
#[derive(Clone, Debug)]
pub struct CompositeNode {
    /// Direct inputs, in declaration order.
    pub(crate) inputs: Vec<NodeId>,
    /// Transitive leaf filters, sorted. The structural identity.
    pub(crate) leaves: Vec<NodeId>,
}

impl CompositeNode {
    /// Returns the direct inputs.
    #[inline]
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// Returns the flattened leaf filters.
    #[inline]
    pub fn leaves(&self) -> &[NodeId] {
        &self.leaves
    }
}

/// The two kinds of query nodes.
pub enum NodeKind {
    /// Leaf predicate node
    Filter(FilterNode),
    /// Intersection of inputs
    Composite(CompositeNode),
}

/// A node of the query graph with its materialized snapshot.
pub struct Node {
    pub(crate) id: NodeId,
    /// Structural identity key.
    pub(crate) identity: String,
    pub(crate) kind: NodeKind,
    /// Entities currently matching this node.
    pub(crate) snapshot: HashSet<EntityId>,
    /// Composite nodes reading this node. Always larger ids.
    pub(crate) successors: BTreeSet<NodeId>,
}

impl Node {
    pub(crate) fn filter(
        id: NodeId,
        identity: String,
        dependencies: DependencySpec,
        predicate: PredicateFn,
        cache_size: usize,
    ) -> Self {
        Self {
            id,
            identity,
            kind: NodeKind::Filter(FilterNode {
                dependencies,
                predicate,
                cache: PredicateCache::new(cache_size),
            }),
            snapshot: HashSet::new(),
            successors: BTreeSet::new(),
        }
    }

    pub(crate) fn composite(
        id: NodeId,
        identity: String,
        inputs: Vec<NodeId>,
        leaves: Vec<NodeId>,
        snapshot: HashSet<EntityId>,
    ) -> Self {
        Self {
            id,
            identity,
            kind: NodeKind::Composite(CompositeNode { inputs, leaves }),
            snapshot,
            successors: BTreeSet::new(),
        }
    }

    /// Returns the node id.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the structural identity key.
    #[inline]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Returns the node kind.
    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns true for leaf filter nodes.
    #[inline]
    pub fn is_filter(&self) -> bool {
        matches!(self.kind, NodeKind::Filter(_))
    }

    /// Returns the filter payload, if this is a filter node.
    pub fn as_filter(&self) -> Option<&FilterNode> {
        match &self.kind {
            NodeKind::Filter(filter) => Some(filter),
            NodeKind::Composite(_) => None,
        }
    }

    /// Returns the composite payload, if this is a composite node.
    pub fn as_composite(&self) -> Option<&CompositeNode> {
        match &self.kind {
            NodeKind::Filter(_) => None,
            NodeKind::Composite(composite) => Some(composite),
        }
    }

    /// Returns true if the entity is in the snapshot.
    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.snapshot.contains(&id)
    }

    /// Returns the snapshot size.
    #[inline]
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    /// Returns true if the snapshot is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Returns the snapshot in ascending id order.
    pub fn snapshot(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.snapshot.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the successor ids.
    #[inline]
    pub fn successors(&self) -> &BTreeSet<NodeId> {
        &self.successors
    }
}
