//! Extraction options, loadable from TOML.
//!
//! ```toml
//! traversal = "iterative"
//! associate_geometry = true
//! parallel = false
//!
//! [selection]
//! include_names = ["Bolt", "Nut"]
//! exclude_names = []
//! max_geometry = 0
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreeError};
use crate::hierarchy::TraversalMode;
use crate::selection::SelectionOptions;

/// Options for [`extract_hierarchy`](crate::extract_hierarchy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractOptions {
    pub traversal: TraversalMode,
    /// Run geometry association after building the forest.
    pub associate_geometry: bool,
    /// Associate geometry on the rayon pool (needs the `rayon` feature).
    pub parallel: bool,
    pub selection: SelectionOptions,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            traversal: TraversalMode::Recursive,
            associate_geometry: true,
            parallel: false,
            selection: SelectionOptions::default(),
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|source| TreeError::Config { path: None, source })
    }

    /// Load options from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TreeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| TreeError::Config {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    pub fn with_traversal(mut self, traversal: TraversalMode) -> Self {
        self.traversal = traversal;
        self
    }

    pub fn with_selection(mut self, selection: SelectionOptions) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_geometry(mut self, associate: bool) -> Self {
        self.associate_geometry = associate;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
