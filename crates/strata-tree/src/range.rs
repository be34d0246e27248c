//! Pre-order iteration over nodes that carry geometry.

use std::iter::FusedIterator;

use crate::node::{NodeId, ProductNode, ProductTree};

/// The geometry-bearing nodes of a forest, roots concatenated in order.
///
/// Cheap to copy; every [`iter`](Self::iter) call starts a fresh walk.
#[derive(Debug, Clone, Copy)]
pub struct GeometryRange<'a> {
    tree: &'a ProductTree,
}

impl<'a> GeometryRange<'a> {
    pub fn new(tree: &'a ProductTree) -> Self {
        Self { tree }
    }

    /// Iterator positioned on the first geometry-bearing node.
    pub fn iter(&self) -> GeometryIter<'a> {
        GeometryIter::new(self.tree)
    }

    /// The exhausted iterator.
    pub fn end(&self) -> GeometryIter<'a> {
        GeometryIter::default()
    }

    pub fn is_empty(&self) -> bool {
        self.iter() == self.end()
    }
}

impl<'a> IntoIterator for GeometryRange<'a> {
    type Item = &'a ProductNode;
    type IntoIter = GeometryIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &GeometryRange<'a> {
    type Item = &'a ProductNode;
    type IntoIter = GeometryIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Explicit-stack pre-order walk.
///
/// Each stack entry is `(node, cursor)`: cursor 0 means the node itself has
/// not been reported yet, cursor `k + 1` means `k` children have been
/// entered. Between calls the iterator is always settled: the top of the
/// stack is an unreported node with geometry, or the stack is empty.
#[derive(Debug, Clone, Default)]
pub struct GeometryIter<'a> {
    tree: Option<&'a ProductTree>,
    next_root: usize,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> GeometryIter<'a> {
    fn new(tree: &'a ProductTree) -> Self {
        let mut iter = Self {
            tree: Some(tree),
            next_root: 0,
            stack: Vec::new(),
        };
        iter.settle();
        iter
    }

    /// The node the next call to `next` will return.
    pub fn current(&self) -> Option<&'a ProductNode> {
        let tree = self.tree?;
        let &(id, _) = self.stack.last()?;
        tree.node(id)
    }

    /// Depth of the current position below its root.
    pub fn depth(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }

    fn settle(&mut self) {
        let Some(tree) = self.tree else {
            return;
        };

        loop {
            let Some(top) = self.stack.last_mut() else {
                match tree.roots().get(self.next_root) {
                    Some(&root) => {
                        self.next_root += 1;
                        self.stack.push((root, 0));
                        continue;
                    }
                    None => return,
                }
            };

            let (id, cursor) = *top;
            let Some(node) = tree.node(id) else {
                self.stack.pop();
                continue;
            };

            if cursor == 0 {
                if node.has_geometry() {
                    return;
                }
                top.1 = 1;
                continue;
            }

            match node.children.get(cursor - 1) {
                Some(&child) => {
                    top.1 += 1;
                    self.stack.push((child, 0));
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

impl<'a> Iterator for GeometryIter<'a> {
    type Item = &'a ProductNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current()?;
        if let Some(top) = self.stack.last_mut() {
            top.1 = 1;
        }
        self.settle();
        Some(node)
    }
}

impl FusedIterator for GeometryIter<'_> {}

/// Iterators are equal when their stacks are; the default iterator equals
/// every exhausted one.
impl PartialEq for GeometryIter<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.stack == other.stack
    }
}

impl Eq for GeometryIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DMat4;
    use strata_graph::EntityRef;

    /// Build a forest from (parent, has_geometry) pairs in pre-order.
    fn forest(layout: &[(Option<usize>, bool)]) -> ProductTree {
        let mut tree = ProductTree::new();
        for (i, &(parent, geometry)) in layout.iter().enumerate() {
            let id = tree.push(
                EntityRef(i as u64 + 1),
                i as u64,
                format!("N{}", i),
                None,
                parent.map(NodeId),
                DMat4::IDENTITY,
                true,
            );
            if geometry {
                tree.node_mut(id)
                    .unwrap()
                    .geometry_entity_ids
                    .insert(EntityRef(1000 + i as u64));
            }
        }
        tree
    }

    fn names(range: GeometryRange<'_>) -> Vec<String> {
        range.into_iter().map(|n| n.name.clone()).collect()
    }

    #[test]
    fn test_preorder_skips_nodes_without_geometry() {
        //   0*        5
        //  / \        |
        // 1   4*      6*
        // |\
        // 2* 3*
        let tree = forest(&[
            (None, true),
            (Some(0), false),
            (Some(1), true),
            (Some(1), true),
            (Some(0), true),
            (None, false),
            (Some(5), true),
        ]);
        assert_eq!(names(tree.geometry_range()), vec!["N0", "N2", "N3", "N4", "N6"]);
    }

    #[test]
    fn test_geometry_node_children_are_visited() {
        let tree = forest(&[(None, true), (Some(0), true), (Some(0), true)]);
        assert_eq!(names(tree.geometry_range()), vec!["N0", "N1", "N2"]);
    }

    #[test]
    fn test_range_is_restartable() {
        let tree = forest(&[(None, true), (Some(0), true)]);
        let range = tree.geometry_range();
        assert_eq!(range.iter().count(), 2);
        assert_eq!(range.iter().count(), 2);
        assert_eq!((&range).into_iter().count(), 2);
    }

    #[test]
    fn test_empty_forest() {
        let tree = ProductTree::new();
        let range = tree.geometry_range();
        assert!(range.is_empty());
        assert_eq!(range.iter(), GeometryIter::default());

        let bare = forest(&[(None, false), (Some(0), false)]);
        assert!(bare.geometry_range().is_empty());
    }

    #[test]
    fn test_equality_law() {
        let tree = forest(&[(None, true), (Some(0), true), (None, true)]);
        let range = tree.geometry_range();
        let mut a = range.iter();
        let mut b = range.iter();
        assert_eq!(a, b);

        a.next();
        assert_ne!(a, b);
        b.next();
        assert_eq!(a, b);

        assert_eq!(a.current().unwrap().name, "N1");
        assert_eq!(a.depth(), 1);

        a.by_ref().for_each(drop);
        assert_eq!(a, range.end());
        assert_eq!(a, GeometryIter::default());
        assert_eq!(a.next().map(|n| n.id), None);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let depth: usize = 50_000;
        let layout: Vec<(Option<usize>, bool)> = (0..depth)
            .map(|i| (i.checked_sub(1), i == depth - 1))
            .collect();
        let tree = forest(&layout);
        let found: Vec<_> = tree.geometry_range().into_iter().collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].depth, depth - 1);
    }
}
