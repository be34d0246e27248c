//! Parent -> child adjacency from assembly usage occurrences.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use strata_graph::{EntityGraph, EntityRef, StepEntity};
use tracing::debug;

use crate::product_index::ProductIndex;

/// One use of a child product inside a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssemblyEdge {
    pub child: EntityRef,
    /// The occurrence entity; the source of the edge's placement.
    pub occurrence: EntityRef,
}

/// Adjacency keyed by parent product, edges in file order.
#[derive(Debug, Clone, Default)]
pub struct AssemblyLinks {
    children: IndexMap<EntityRef, Vec<AssemblyEdge>>,
    dropped: usize,
}

impl AssemblyLinks {
    /// Scan every `NEXT_ASSEMBLY_USAGE_OCCURRENCE` and map both of its
    /// definitions back to products. Occurrences where either side is not an
    /// indexed product are dropped.
    pub fn build<G: EntityGraph + ?Sized>(graph: &G, index: &ProductIndex) -> Self {
        let mut links = Self::default();

        for &id in graph.entity_refs() {
            let Some(StepEntity::NextAssemblyUsageOccurrence(occurrence)) = graph.entity(id) else {
                continue;
            };

            let parent = occurrence
                .relating_product_definition
                .and_then(|d| index.product_for_definition(d));
            let child = occurrence
                .related_product_definition
                .and_then(|d| index.product_for_definition(d));

            match (parent, child) {
                (Some(parent), Some(child)) => {
                    debug!(occurrence = %id, parent = %parent, child = %child, "assembly edge");
                    links.push(parent, child, id);
                }
                _ => {
                    debug!(occurrence = %id, "occurrence does not map to indexed products");
                    links.dropped += 1;
                }
            }
        }

        links
    }

    /// Build adjacency from explicit `(parent, child, occurrence)` triples.
    pub fn from_edges(edges: impl IntoIterator<Item = (EntityRef, EntityRef, EntityRef)>) -> Self {
        let mut links = Self::default();
        for (parent, child, occurrence) in edges {
            links.push(parent, child, occurrence);
        }
        links
    }

    fn push(&mut self, parent: EntityRef, child: EntityRef, occurrence: EntityRef) {
        self.children
            .entry(parent)
            .or_default()
            .push(AssemblyEdge { child, occurrence });
    }

    /// Edges out of `parent`, in discovery order.
    pub fn children_of(&self, parent: EntityRef) -> &[AssemblyEdge] {
        self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Products with at least one child.
    pub fn parents(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.children.keys().copied()
    }

    /// Every product that appears as a child of some edge.
    pub fn child_set(&self) -> FxHashSet<EntityRef> {
        self.children
            .values()
            .flat_map(|edges| edges.iter().map(|e| e.child))
            .collect()
    }

    /// First occurrence (in discovery order) placing `child` anywhere.
    pub fn occurrence_of(&self, child: EntityRef) -> Option<EntityRef> {
        self.children
            .values()
            .flat_map(|edges| edges.iter())
            .find(|e| e.child == child)
            .map(|e| e.occurrence)
    }

    pub fn edge_count(&self) -> usize {
        self.children.values().map(Vec::len).sum()
    }

    /// Occurrences skipped because a side was not an indexed product.
    pub fn dropped_count(&self) -> usize {
        self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}
