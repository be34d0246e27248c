//! Geometry association: which solid models belong to a product.
//!
//! Solids are not referenced from the product. They hang below its shape
//! representation, which is only reachable by walking *up* the reference
//! graph from the product (formation, definition, definition shape, shape
//! definition representation) and back down through representations:
//!
//! ```text
//! PRODUCT <- FORMATION <- DEFINITION <- PDS <- SDR -> SHAPE_REPRESENTATION
//!                                                        |  ^
//!                                                        v  | SRR
//!                                                   MANIFOLD_SOLID_BREP
//! ```
//!
//! The search is a breadth-first walk over sharings plus a few typed
//! forward links.

use std::collections::VecDeque;

use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};
use strata_graph::{EntityGraph, EntityRef, StepEntity};
use tracing::trace;

use crate::node::{NodeId, ProductTree};

/// Collect every solid model associated with `seed`.
pub fn associated_solids<G: EntityGraph + ?Sized>(graph: &G, seed: EntityRef) -> IndexSet<EntityRef> {
    let mut matches = IndexSet::new();
    let mut visited = FxHashSet::default();
    let mut queue = VecDeque::new();

    visited.insert(seed);
    queue.push_back(seed);

    while let Some(current) = queue.pop_front() {
        let Some(entity) = graph.entity(current) else {
            continue;
        };

        if entity.is_solid_model() {
            matches.insert(current);
            continue;
        }

        trace!(entity = %current, kind = entity.type_label(), "expanding");

        let mut enqueue = |id: EntityRef| {
            if visited.insert(id) {
                queue.push_back(id);
            }
        };

        for &sharing in graph.sharings(current) {
            enqueue(sharing);
        }

        match entity {
            StepEntity::RepresentationRelationship(rel) => {
                if !rel.has_transformation() {
                    rel.rep_1.into_iter().for_each(&mut enqueue);
                }
                rel.rep_2.into_iter().for_each(&mut enqueue);
            }
            StepEntity::ShapeDefinitionRepresentation(sdr) => {
                sdr.used_representation.into_iter().for_each(&mut enqueue);
            }
            StepEntity::ShapeRepresentation(rep) => {
                for &item in &rep.items {
                    if graph.entity(item).is_some_and(StepEntity::is_solid_model) {
                        visited.insert(item);
                        matches.insert(item);
                    }
                }
            }
            _ => {}
        }
    }

    matches
}

/// Runs [`associated_solids`] over tree nodes, caching per product.
pub struct GeometryAssociator<'a, G: ?Sized> {
    graph: &'a G,
    cache: FxHashMap<EntityRef, IndexSet<EntityRef>>,
}

impl<'a, G: EntityGraph + ?Sized> GeometryAssociator<'a, G> {
    pub fn new(graph: &'a G) -> Self {
        Self {
            graph,
            cache: FxHashMap::default(),
        }
    }

    /// Solids for one product, computed at most once.
    pub fn solids_for(&mut self, product: EntityRef) -> &IndexSet<EntityRef> {
        let graph = self.graph;
        self.cache
            .entry(product)
            .or_insert_with(|| associated_solids(graph, product))
    }

    /// Associate `node` and every node below it.
    pub fn associate(&mut self, tree: &mut ProductTree, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(current) = tree.node(id) else {
                continue;
            };
            stack.extend(current.children.iter().rev().copied());
            if !current.resolved {
                continue;
            }

            let solids = self.solids_for(current.entity_index).clone();
            if let Some(current) = tree.node_mut(id) {
                current.geometry_entity_ids.extend(solids);
            }
        }
    }

    /// Associate every tree in the forest.
    pub fn associate_all(&mut self, tree: &mut ProductTree) {
        let roots = tree.roots().to_vec();
        for root in roots {
            self.associate(tree, root);
        }
    }

    /// Number of distinct products searched so far.
    pub fn cached_products(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(feature = "rayon")]
impl<'a, G: EntityGraph + Sync + ?Sized> GeometryAssociator<'a, G> {
    /// Associate every node, searching distinct products in parallel.
    ///
    /// Each search owns its visited set; only the read-only graph is shared.
    pub fn associate_all_parallel(&mut self, tree: &mut ProductTree) {
        use rayon::prelude::*;

        let pending: Vec<EntityRef> = tree
            .nodes()
            .iter()
            .filter(|n| n.resolved)
            .map(|n| n.entity_index)
            .filter(|e| !self.cache.contains_key(e))
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();

        let graph = self.graph;
        let found: Vec<(EntityRef, IndexSet<EntityRef>)> = pending
            .into_par_iter()
            .map(|product| (product, associated_solids(graph, product)))
            .collect();
        self.cache.extend(found);

        let roots = tree.roots().to_vec();
        for root in roots {
            self.associate(tree, root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyBuilder;
    use crate::testing::StepFixture;
    use glam::DVec3;
    use proptest::prelude::*;

    #[test]
    fn test_solids_in_shape_representation() {
        let mut fixture = StepFixture::new();
        let part = fixture.product("Block");
        let first = fixture.attach_solid(&part, "first");
        let second = fixture.attach_solid(&part, "second");
        let graph = fixture.graph();

        let solids = associated_solids(&graph, part.product);
        assert_eq!(solids.len(), 2);
        assert!(solids.contains(&first) && solids.contains(&second));
    }

    #[test]
    fn test_indirect_path_does_not_duplicate() {
        let mut fixture = StepFixture::new();
        let part = fixture.product("Block");
        let first = fixture.attach_solid(&part, "first");
        let second = fixture.attach_solid(&part, "second");
        // A second representation reaching `first` again.
        fixture.brep_representation(&part, &[first]);
        let graph = fixture.graph();

        let solids = associated_solids(&graph, part.product);
        let mut ids: Vec<_> = solids.into_iter().collect();
        ids.sort();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn test_solid_behind_brep_representation() {
        let mut fixture = StepFixture::new();
        let part = fixture.product("Shaft");
        let solid = fixture.solid("body");
        fixture.brep_representation(&part, &[solid]);
        let graph = fixture.graph();

        let solids = associated_solids(&graph, part.product);
        assert_eq!(solids.into_iter().collect::<Vec<_>>(), vec![solid]);
    }

    #[test]
    fn test_sibling_geometry_does_not_leak() {
        let mut fixture = StepFixture::new();
        let assembly = fixture.product("Assembly");
        let left = fixture.product("Left");
        let right = fixture.product("Right");
        let left_solid = fixture.attach_solid(&left, "left");
        let right_solid = fixture.attach_solid(&right, "right");
        fixture.placed_occurrence(&assembly, &left, DVec3::new(-1.0, 0.0, 0.0));
        fixture.placed_occurrence(&assembly, &right, DVec3::new(1.0, 0.0, 0.0));
        let graph = fixture.graph();

        let left_solids = associated_solids(&graph, left.product);
        assert!(left_solids.contains(&left_solid));
        assert!(!left_solids.contains(&right_solid));
        assert!(associated_solids(&graph, assembly.product).is_empty());
    }

    #[test]
    fn test_product_without_geometry() {
        let mut fixture = StepFixture::new();
        let part = fixture.product("Empty");
        let lone = fixture.lone_product("Lone");
        let graph = fixture.graph();

        assert!(associated_solids(&graph, part.product).is_empty());
        assert!(associated_solids(&graph, lone).is_empty());
        assert!(associated_solids(&graph, EntityRef(9999)).is_empty());
    }

    #[test]
    fn test_associate_tree_is_idempotent() {
        let mut fixture = StepFixture::new();
        let assembly = fixture.product("Assembly");
        let bolt = fixture.product("Bolt");
        let bolt_solid = fixture.attach_solid(&bolt, "bolt");
        fixture.placed_occurrence(&assembly, &bolt, DVec3::new(0.0, 0.0, 1.0));
        fixture.placed_occurrence(&assembly, &bolt, DVec3::new(0.0, 0.0, 2.0));
        let graph = fixture.graph();

        let mut tree = HierarchyBuilder::new(&graph).extract_roots();
        let mut associator = GeometryAssociator::new(&graph);
        associator.associate_all(&mut tree);
        let first: Vec<_> = tree.nodes().iter().map(|n| n.geometry_entity_ids.clone()).collect();
        associator.associate_all(&mut tree);
        let second: Vec<_> = tree.nodes().iter().map(|n| n.geometry_entity_ids.clone()).collect();

        assert_eq!(first, second);
        let bolts: Vec<_> = tree.find_by_entity(bolt.product).collect();
        assert_eq!(bolts.len(), 2);
        for node in bolts {
            assert_eq!(node.geometry_entity_ids.iter().copied().collect::<Vec<_>>(), vec![bolt_solid]);
        }
        // Two bolt instances, one search.
        assert_eq!(associator.cached_products(), 2);
    }

    #[test]
    fn test_associate_subtree_only() {
        let mut fixture = StepFixture::new();
        let a = fixture.product("A");
        let b = fixture.product("B");
        fixture.attach_solid(&b, "b");
        let lone = fixture.product("Lone");
        fixture.attach_solid(&lone, "lone");
        fixture.occurrence(&a, &b);
        let graph = fixture.graph();

        let mut tree = HierarchyBuilder::new(&graph).extract_roots();
        let first_root = tree.roots()[0];
        GeometryAssociator::new(&graph).associate(&mut tree, first_root);

        assert!(tree.find_by_entity(b.product).next().unwrap().has_geometry());
        assert!(!tree.find_by_entity(lone.product).next().unwrap().has_geometry());
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_parallel_matches_sequential() {
        let mut fixture = StepFixture::new();
        let assembly = fixture.product("Assembly");
        for i in 0..8 {
            let part = fixture.product(&format!("Part{}", i));
            fixture.attach_solid(&part, "solid");
            fixture.placed_occurrence(&assembly, &part, DVec3::new(i as f64, 0.0, 0.0));
        }
        let graph = fixture.graph();

        let mut sequential = HierarchyBuilder::new(&graph).extract_roots();
        GeometryAssociator::new(&graph).associate_all(&mut sequential);
        let mut parallel = HierarchyBuilder::new(&graph).extract_roots();
        GeometryAssociator::new(&graph).associate_all_parallel(&mut parallel);

        for (s, p) in sequential.nodes().iter().zip(parallel.nodes()) {
            assert_eq!(s.geometry_entity_ids, p.geometry_entity_ids);
        }
    }

    proptest! {
        #[test]
        fn prop_association_has_no_duplicates(direct in 0usize..4, indirect in 0usize..4, shared in any::<bool>()) {
            let mut fixture = StepFixture::new();
            let part = fixture.product("P");
            let direct: Vec<_> = (0..direct).map(|i| fixture.attach_solid(&part, &format!("d{}", i))).collect();
            let mut behind: Vec<_> = (0..indirect).map(|i| fixture.solid(&format!("i{}", i))).collect();
            if shared {
                behind.extend(direct.iter().copied());
            }
            fixture.brep_representation(&part, &behind);
            let graph = fixture.graph();

            let solids = associated_solids(&graph, part.product);
            let unique: FxHashSet<_> = solids.iter().copied().collect();
            prop_assert_eq!(unique.len(), solids.len());
            prop_assert_eq!(solids.len(), direct.len() + indirect);
        }
    }
}
