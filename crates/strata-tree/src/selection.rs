//! Geometry selection: name filters and a geometry cap applied while walking
//! a [`GeometryRange`](crate::range::GeometryRange).

use std::fs;
use std::path::Path;

use glam::DMat4;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use strata_graph::EntityRef;
use tracing::debug;

use crate::error::{Result, TreeError};
use crate::node::{NodeId, ProductTree};

/// Exact product-name matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameFilter {
    names: IndexSet<String>,
}

impl NameFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `A, "B C", 'D'`: comma separated, quotes and whitespace trimmed.
    pub fn parse_list(text: &str) -> Self {
        text.split(',').collect()
    }

    /// Read one name per non-empty line.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TreeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(text.lines().collect())
    }

    pub fn insert(&mut self, name: &str) -> bool {
        let name = clean_name(name);
        !name.is_empty() && self.names.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<'s> FromIterator<&'s str> for NameFilter {
    fn from_iter<I: IntoIterator<Item = &'s str>>(iter: I) -> Self {
        let mut filter = Self::new();
        for name in iter {
            filter.insert(name);
        }
        filter
    }
}

fn clean_name(name: &str) -> &str {
    name.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

/// Which geometry to hand on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionOptions {
    /// When non-empty, only products with these names are accepted.
    pub include_names: NameFilter,
    /// Products with these names are skipped.
    pub exclude_names: NameFilter,
    /// Maximum number of accepted geometries; 0 means unlimited.
    pub max_geometry: usize,
}

impl SelectionOptions {
    pub fn with_include(mut self, names: NameFilter) -> Self {
        self.include_names = names;
        self
    }

    pub fn with_exclude(mut self, names: NameFilter) -> Self {
        self.exclude_names = names;
        self
    }

    pub fn with_max_geometry(mut self, max: usize) -> Self {
        self.max_geometry = max;
        self
    }

    fn reject_reason(&self, name: &str) -> Option<SkipReason> {
        if !self.include_names.is_empty() && !self.include_names.contains(name) {
            Some(SkipReason::NotIncluded)
        } else if self.exclude_names.contains(name) {
            Some(SkipReason::Excluded)
        } else {
            None
        }
    }
}

/// Why a geometry was not selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotIncluded,
    Excluded,
    LimitReached,
}

/// One geometry instance to materialize.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedGeometry {
    pub node: NodeId,
    pub name: String,
    pub entity_index: EntityRef,
    pub instance_index: u64,
    pub geometry: EntityRef,
    pub transformation: DMat4,
}

/// One geometry instance left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedGeometry {
    #[serde(skip)]
    pub node: NodeId,
    pub name: String,
    pub entity_index: EntityRef,
    pub instance_index: u64,
    pub geometry: EntityRef,
    pub skip_reason: SkipReason,
}

/// Result of [`plan_selection`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionPlan {
    pub accepted: Vec<SelectedGeometry>,
    pub skipped: Vec<SkippedGeometry>,
}

impl SelectionPlan {
    /// The skip log as a JSON array.
    pub fn skip_log_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.skipped)?)
    }

    pub fn skipped_because(&self, reason: SkipReason) -> impl Iterator<Item = &SkippedGeometry> {
        self.skipped.iter().filter(move |s| s.skip_reason == reason)
    }
}

/// Walk the geometry of `tree` in pre-order and decide for each instance.
pub fn plan_selection(tree: &ProductTree, options: &SelectionOptions) -> SelectionPlan {
    let mut plan = SelectionPlan::default();

    for node in tree.geometry_range() {
        for &geometry in &node.geometry_entity_ids {
            let limit_reached = options.max_geometry != 0 && plan.accepted.len() >= options.max_geometry;
            let reason = if limit_reached {
                Some(SkipReason::LimitReached)
            } else {
                options.reject_reason(&node.name)
            };

            match reason {
                Some(skip_reason) => plan.skipped.push(SkippedGeometry {
                    node: node.id,
                    name: node.name.clone(),
                    entity_index: node.entity_index,
                    instance_index: node.instance_index,
                    geometry,
                    skip_reason,
                }),
                None => plan.accepted.push(SelectedGeometry {
                    node: node.id,
                    name: node.name.clone(),
                    entity_index: node.entity_index,
                    instance_index: node.instance_index,
                    geometry,
                    transformation: node.transformation,
                }),
            }
        }
    }

    debug!(
        accepted = plan.accepted.len(),
        skipped = plan.skipped.len(),
        "planned geometry selection"
    );
    plan
}
