//! strata-graph: typed entity graphs for STEP (ISO 10303-21) data.
//!
//! This crate turns the DATA section of a Part 21 file into a read-only
//! graph the assembly extraction in `strata-tree` walks:
//!
//! ```text
//! Part 21 text ──> EntityInstance ──> StepEntity ──> StepGraph
//!                  (p21)              (entity)       (graph, placement)
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use strata_graph::{EntityGraph, StepGraph};
//!
//! let graph = StepGraph::from_bytes(&file_bytes)?;
//! for id in graph.entity_refs() {
//!     println!("{} is referenced by {} entities", id, graph.sharings(*id).len());
//! }
//! ```

pub mod entity;
pub mod error;
pub mod graph;
pub mod p21;
pub mod placement;

pub use entity::{EntityRef, ShapeRepresentationKind, SolidModelKind, StepEntity};
pub use error::{GraphError, Result};
pub use graph::{EntityGraph, StepGraph};
pub use p21::{parse_data_section, EntityInstance, StepValue};
pub use placement::{frame_from_axes, PlacementResolver};
