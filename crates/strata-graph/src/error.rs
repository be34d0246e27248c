//! Error types for strata-graph.

use thiserror::Error;

/// Result type for strata-graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while ingesting a Part 21 file into an entity graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The text has no `DATA;` section.
    #[error("no DATA section found")]
    MissingDataSection,

    /// An entity instance could not be parsed.
    #[error("parse error: {message}")]
    Parse {
        /// Error message.
        message: String,
        /// Byte offset of the failing instance.
        offset: Option<usize>,
    },
}

impl GraphError {
    /// Create a parse error without position information.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            offset: None,
        }
    }

    /// Create a parse error at a byte offset.
    pub fn parse_at(message: impl Into<String>, offset: usize) -> Self {
        Self::Parse {
            message: message.into(),
            offset: Some(offset),
        }
    }
}
