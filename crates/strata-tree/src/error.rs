//! Error types for strata-tree.
//!
//! Extraction itself never fails: unresolvable references, cycles and
//! missing placements are recovered where they occur. Errors only arise at
//! the edges, when reading input or configuration and when writing
//! exports.

use std::path::PathBuf;

use strata_graph::GraphError;
use thiserror::Error;

/// Result type for strata-tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors at the ingestion, configuration and export boundaries.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The entity graph could not be built.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// A file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration text is not valid TOML for the options schema.
    #[error("invalid configuration{}: {source}", path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    Config {
        path: Option<PathBuf>,
        #[source]
        source: toml::de::Error,
    },

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An export could not be written to its sink.
    #[error("failed to write export: {0}")]
    Export(#[source] std::io::Error),
}
