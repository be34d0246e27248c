//! Product tree data structures.
//!
//! The tree is an arena: nodes live in one vector and refer to each other by
//! [`NodeId`]. Children are owned through the arena in discovery order; the
//! `parent` link is navigation only.

use glam::DMat4;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use strata_graph::EntityRef;

use crate::range::GeometryRange;

/// Label given to products whose source name is empty.
pub const UNNAMED_PRODUCT: &str = "(unnamed product)";

/// Label given to nodes whose identity does not resolve to a product.
pub const INVALID_INDEX: &str = "(invalid index)";

/// Index of a node in its [`ProductTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// One placed instance of a product.
#[derive(Debug, Clone)]
pub struct ProductNode {
    /// Arena index of this node
    pub id: NodeId,
    /// Identity of the underlying product entity
    pub entity_index: EntityRef,
    /// Per-build sequence number; distinct for every instance of a product
    pub instance_index: u64,
    /// Product name, or one of the sentinel labels
    pub name: String,
    /// Assembly occurrence that placed this instance (None for roots)
    pub occurrence: Option<EntityRef>,
    /// Parent node (None for roots)
    pub parent: Option<NodeId>,
    /// Child nodes in discovery order
    pub children: Vec<NodeId>,
    /// Transform relative to the parent
    pub local_transform: DMat4,
    /// Absolute transform (root-composed)
    pub transformation: DMat4,
    /// Solid-model entities belonging to this node
    pub geometry_entity_ids: IndexSet<EntityRef>,
    /// Distance from the root
    pub depth: usize,
    /// Whether `entity_index` resolved to a product
    pub resolved: bool,
}

impl ProductNode {
    /// Whether the associator found any geometry for this node.
    pub fn has_geometry(&self) -> bool {
        !self.geometry_entity_ids.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Hands out instance indices for one build.
#[derive(Debug, Clone, Default)]
pub struct InstanceCounter {
    next: u64,
}

impl InstanceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering at `first`, e.g. to continue a previous build.
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// Take the next index.
    pub fn next_index(&mut self) -> u64 {
        let index = self.next;
        self.next += 1;
        index
    }

    /// The index the next call will return.
    pub fn peek(&self) -> u64 {
        self.next
    }
}

/// Summary counts over a product forest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub roots: usize,
    pub nodes: usize,
    pub nodes_with_geometry: usize,
    /// Sum of geometry set sizes; a solid shared by N instances counts N times.
    pub geometry_instances: usize,
    pub max_depth: usize,
}

/// A forest of placed product instances.
#[derive(Debug, Clone, Default)]
pub struct ProductTree {
    nodes: Vec<ProductNode>,
    roots: Vec<NodeId>,
}

impl ProductTree {
    /// Create an empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Root nodes in root order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&ProductNode> {
        self.nodes.get(id.0)
    }

    /// Every node, in creation (pre-order) order.
    pub fn nodes(&self) -> &[ProductNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children of a node, in discovery order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &ProductNode> {
        self.node(id)
            .into_iter()
            .flat_map(|n| n.children.iter())
            .filter_map(|child| self.node(*child))
    }

    /// Parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<&ProductNode> {
        self.node(id)?.parent.and_then(|p| self.node(p))
    }

    /// Node IDs from `id` up to its root, inclusive.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = self.node(id);
        while let Some(node) = current {
            path.push(node.id);
            current = node.parent.and_then(|p| self.node(p));
        }
        path
    }

    /// Every instance of a product.
    pub fn find_by_entity(&self, entity: EntityRef) -> impl Iterator<Item = &ProductNode> {
        self.nodes.iter().filter(move |n| n.entity_index == entity)
    }

    /// Pre-order walk over the nodes that carry geometry.
    pub fn geometry_range(&self) -> GeometryRange<'_> {
        GeometryRange::new(self)
    }

    /// Compute summary counts.
    pub fn stats(&self) -> TreeStats {
        TreeStats {
            roots: self.roots.len(),
            nodes: self.nodes.len(),
            nodes_with_geometry: self.nodes.iter().filter(|n| n.has_geometry()).count(),
            geometry_instances: self.nodes.iter().map(|n| n.geometry_entity_ids.len()).sum(),
            max_depth: self.nodes.iter().map(|n| n.depth).max().unwrap_or(0),
        }
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut ProductNode> {
        self.nodes.get_mut(id.0)
    }

    /// Append a node, linking it under `parent` or registering it as a root.
    pub(crate) fn push(
        &mut self,
        entity_index: EntityRef,
        instance_index: u64,
        name: String,
        occurrence: Option<EntityRef>,
        parent: Option<NodeId>,
        local_transform: DMat4,
        resolved: bool,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let (transformation, depth) = match parent.and_then(|p| self.node(p)) {
            Some(p) => (p.transformation * local_transform, p.depth + 1),
            None => (local_transform, 0),
        };

        self.nodes.push(ProductNode {
            id,
            entity_index,
            instance_index,
            name,
            occurrence,
            parent,
            children: Vec::new(),
            local_transform,
            transformation,
            geometry_entity_ids: IndexSet::new(),
            depth,
            resolved,
        });

        match parent.and_then(|p| self.nodes.get_mut(p.0)) {
            Some(p) => p.children.push(id),
            None => self.roots.push(id),
        }
        id
    }
}
