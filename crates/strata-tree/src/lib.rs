//! strata-tree: assembly hierarchies from STEP entity graphs.
//!
//! A STEP file stores an assembly as a flat, cross-referenced set of
//! entities. This crate rebuilds the placed product tree from it:
//!
//! ```text
//! EntityGraph ──> ProductIndex ──> AssemblyLinks ──> HierarchyBuilder ──> ProductTree
//!                                                                             │
//!                               GeometryAssociator (fills geometry ids) <─────┤
//!                               GeometryRange / plan_selection <──────────────┤
//!                               HierarchyExporter (JSON) <────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use strata_tree::{extract_hierarchy, read_graph, ExtractOptions, HierarchyExporter};
//!
//! let graph = read_graph("assembly.step")?;
//! let tree = extract_hierarchy(&graph, &ExtractOptions::default());
//! for node in tree.geometry_range() {
//!     println!("{} has {} solids", node.name, node.geometry_entity_ids.len());
//! }
//! println!("{}", HierarchyExporter::new(&tree).to_json()?);
//! ```

pub mod assembly;
pub mod associate;
pub mod error;
pub mod export;
pub mod hierarchy;
pub mod node;
pub mod options;
pub mod product_index;
pub mod range;
pub mod selection;
pub mod transform;

#[cfg(test)]
pub(crate) mod testing;

use std::fs;
use std::path::Path;

use strata_graph::StepGraph;
use tracing::{info, warn};

pub use assembly::{AssemblyEdge, AssemblyLinks};
pub use associate::{associated_solids, GeometryAssociator};
pub use error::{Result, TreeError};
pub use export::HierarchyExporter;
pub use hierarchy::{AssemblySource, HierarchyBuilder, TraversalMode};
pub use node::{
    InstanceCounter, NodeId, ProductNode, ProductTree, TreeStats, INVALID_INDEX, UNNAMED_PRODUCT,
};
pub use options::ExtractOptions;
pub use product_index::{ProductIndex, ProductInfo};
pub use range::{GeometryIter, GeometryRange};
pub use selection::{
    plan_selection, NameFilter, SelectedGeometry, SelectionOptions, SelectionPlan, SkipReason,
    SkippedGeometry,
};
pub use transform::{local_transform, occurrence_operator};

pub use strata_graph;

/// Read a Part 21 file into an entity graph.
pub fn read_graph(path: impl AsRef<Path>) -> Result<StepGraph> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|source| TreeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(StepGraph::from_bytes(&data)?)
}

/// Graph bound of [`extract_hierarchy`].
///
/// With the `rayon` feature the graph is shared across worker threads and
/// must be `Sync`; without it any [`AssemblySource`] qualifies.
#[cfg(feature = "rayon")]
pub trait ExtractSource: AssemblySource + Sync {}

#[cfg(feature = "rayon")]
impl<T: AssemblySource + Sync + ?Sized> ExtractSource for T {}

/// Graph bound of [`extract_hierarchy`].
///
/// With the `rayon` feature the graph is shared across worker threads and
/// must be `Sync`; without it any [`AssemblySource`] qualifies.
#[cfg(not(feature = "rayon"))]
pub trait ExtractSource: AssemblySource {}

#[cfg(not(feature = "rayon"))]
impl<T: AssemblySource + ?Sized> ExtractSource for T {}

/// Build the product forest of `graph` and, unless disabled, associate
/// geometry with every node.
///
/// `options.parallel` only takes effect with the `rayon` feature, which also
/// requires the graph to be `Sync` (see [`ExtractSource`]).
pub fn extract_hierarchy<G>(graph: &G, options: &ExtractOptions) -> ProductTree
where
    G: ExtractSource + ?Sized,
{
    let mut builder = HierarchyBuilder::new(graph).with_traversal(options.traversal);
    let products = builder.index().len();
    let edges = builder.links().edge_count();
    let mut tree = builder.extract_roots();

    if products == 0 {
        warn!("no products found in entity graph");
    }

    if options.associate_geometry {
        let mut associator = GeometryAssociator::new(graph);
        if options.parallel {
            associate_parallel(&mut associator, &mut tree);
        } else {
            associator.associate_all(&mut tree);
        }
    }

    let stats = tree.stats();
    info!(
        products,
        edges,
        roots = stats.roots,
        nodes = stats.nodes,
        geometry = stats.geometry_instances,
        "extracted assembly hierarchy"
    );
    tree
}

#[cfg(feature = "rayon")]
fn associate_parallel<G: AssemblySource + Sync + ?Sized>(
    associator: &mut GeometryAssociator<'_, G>,
    tree: &mut ProductTree,
) {
    associator.associate_all_parallel(tree);
}

#[cfg(not(feature = "rayon"))]
fn associate_parallel<G: AssemblySource + ?Sized>(
    associator: &mut GeometryAssociator<'_, G>,
    tree: &mut ProductTree,
) {
    tracing::debug!("rayon feature disabled, associating sequentially");
    associator.associate_all(tree);
}
