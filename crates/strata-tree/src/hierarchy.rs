//! Forest construction from assembly adjacency.
//!
//! Roots are products that never appear as a child. From each root the
//! adjacency is unfolded into a tree: a product used by N parents becomes N
//! nodes. A product already on the current root path is emitted as a leaf,
//! which cuts cycles without losing the edge that closed them.

use glam::DMat4;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use strata_graph::{EntityGraph, EntityRef, PlacementResolver, StepEntity};
use tracing::{debug, warn};

use crate::assembly::AssemblyLinks;
use crate::node::{InstanceCounter, NodeId, ProductTree, INVALID_INDEX, UNNAMED_PRODUCT};
use crate::product_index::ProductIndex;
use crate::transform::local_transform;

/// Everything hierarchy extraction needs from the data source.
pub trait AssemblySource: EntityGraph + PlacementResolver {}

impl<T: EntityGraph + PlacementResolver + ?Sized> AssemblySource for T {}

/// How the builder walks the adjacency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalMode {
    /// Depth-first on the call stack.
    #[default]
    Recursive,
    /// Depth-first on an explicit stack; for very deep assemblies.
    Iterative,
}

/// Builds product forests from a graph.
pub struct HierarchyBuilder<'a, G: ?Sized> {
    graph: &'a G,
    index: ProductIndex,
    links: AssemblyLinks,
    counter: InstanceCounter,
    mode: TraversalMode,
}

/// One open node of the iterative walk.
struct Frame {
    node: NodeId,
    entity: EntityRef,
    next_edge: usize,
}

impl<'a, G: AssemblySource + ?Sized> HierarchyBuilder<'a, G> {
    /// Index products and occurrences of `graph`.
    pub fn new(graph: &'a G) -> Self {
        let index = ProductIndex::build(graph);
        let links = AssemblyLinks::build(graph, &index);
        Self::from_parts(graph, index, links)
    }

    /// Use prebuilt tables.
    pub fn from_parts(graph: &'a G, index: ProductIndex, links: AssemblyLinks) -> Self {
        Self {
            graph,
            index,
            links,
            counter: InstanceCounter::new(),
            mode: TraversalMode::default(),
        }
    }

    pub fn with_traversal(mut self, mode: TraversalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_counter(mut self, counter: InstanceCounter) -> Self {
        self.counter = counter;
        self
    }

    pub fn index(&self) -> &ProductIndex {
        &self.index
    }

    pub fn links(&self) -> &AssemblyLinks {
        &self.links
    }

    /// Give back the counter, e.g. to continue numbering in another build.
    pub fn into_counter(self) -> InstanceCounter {
        self.counter
    }

    /// Products that are never a child, in product order.
    pub fn root_products(&self) -> Vec<EntityRef> {
        let children = self.links.child_set();
        self.index
            .product_refs()
            .filter(|p| !children.contains(p))
            .collect()
    }

    /// Build the forest.
    ///
    /// Products reachable only through a cycle have no natural root; they
    /// are added as extra roots, in product order, after the natural ones.
    pub fn extract_roots(&mut self) -> ProductTree {
        let mut tree = ProductTree::new();
        for root in self.root_products() {
            self.build_tree(&mut tree, root);
        }

        let mut placed: FxHashSet<EntityRef> = tree.nodes().iter().map(|n| n.entity_index).collect();
        let unplaced: Vec<EntityRef> = self
            .index
            .product_refs()
            .filter(|p| !placed.contains(p))
            .collect();

        for product in unplaced {
            if placed.contains(&product) {
                continue;
            }
            warn!(product = %product, "product only reachable through a cycle, adding as root");
            let first = tree.len();
            self.build_tree(&mut tree, product);
            placed.extend(tree.nodes()[first..].iter().map(|n| n.entity_index));
        }

        debug!(roots = tree.roots().len(), nodes = tree.len(), "extracted product forest");
        tree
    }

    /// Build one tree under `root` and return its root node.
    pub fn build_tree(&mut self, tree: &mut ProductTree, root: EntityRef) -> NodeId {
        match self.mode {
            TraversalMode::Recursive => {
                let mut path = FxHashSet::default();
                self.build_recursive(tree, root, None, None, &mut path)
            }
            TraversalMode::Iterative => self.build_iterative(tree, root),
        }
    }

    fn build_recursive(
        &mut self,
        tree: &mut ProductTree,
        entity: EntityRef,
        occurrence: Option<EntityRef>,
        parent: Option<NodeId>,
        path: &mut FxHashSet<EntityRef>,
    ) -> NodeId {
        let (node, resolved) = self.make_node(tree, entity, occurrence, parent);
        if !resolved {
            return node;
        }
        if !path.insert(entity) {
            warn!(product = %entity, "assembly cycle, stopping descent");
            return node;
        }

        let edges = self.links.children_of(entity).to_vec();
        for edge in edges {
            self.build_recursive(tree, edge.child, Some(edge.occurrence), Some(node), path);
        }

        path.remove(&entity);
        node
    }

    fn build_iterative(&mut self, tree: &mut ProductTree, root: EntityRef) -> NodeId {
        let mut path = FxHashSet::default();
        let mut stack: Vec<Frame> = Vec::new();

        let (root_node, resolved) = self.make_node(tree, root, None, None);
        if resolved && path.insert(root) {
            stack.push(Frame {
                node: root_node,
                entity: root,
                next_edge: 0,
            });
        }

        while let Some(frame) = stack.last_mut() {
            let (parent, entity, index) = (frame.node, frame.entity, frame.next_edge);
            frame.next_edge += 1;

            let Some(edge) = self.links.children_of(entity).get(index).copied() else {
                path.remove(&entity);
                stack.pop();
                continue;
            };

            let (child, resolved) = self.make_node(tree, edge.child, Some(edge.occurrence), Some(parent));
            if !resolved {
                continue;
            }
            if path.insert(edge.child) {
                stack.push(Frame {
                    node: child,
                    entity: edge.child,
                    next_edge: 0,
                });
            } else {
                warn!(product = %edge.child, "assembly cycle, stopping descent");
            }
        }

        root_node
    }

    /// Create the node for `entity` and report whether it may have children.
    fn make_node(
        &mut self,
        tree: &mut ProductTree,
        entity: EntityRef,
        occurrence: Option<EntityRef>,
        parent: Option<NodeId>,
    ) -> (NodeId, bool) {
        let instance = self.counter.next_index();

        let Some(StepEntity::Product(product)) = self.graph.entity(entity) else {
            warn!(entity = %entity, "identity does not resolve to a product");
            let node = tree.push(
                entity,
                instance,
                INVALID_INDEX.to_string(),
                occurrence,
                parent,
                DMat4::IDENTITY,
                false,
            );
            return (node, false);
        };

        let name = if product.name.is_empty() {
            UNNAMED_PRODUCT.to_string()
        } else {
            product.name.clone()
        };
        let local = local_transform(self.graph, occurrence);
        let node = tree.push(entity, instance, name, occurrence, parent, local, true);
        (node, true)
    }
}
