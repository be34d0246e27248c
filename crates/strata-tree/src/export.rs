//! JSON export of a product forest.
//!
//! The output is an array of root objects:
//!
//! ```json
//! [
//!   {
//!     "entityIndex": 12,
//!     "instanceIndex": 0,
//!     "name": "Assembly",
//!     "occurrence": null,
//!     "transformation": [1.0,0.0,0.0,0.0,...],
//!     "geometryEntityIds": [40,41],
//!     "children": [ ... ]
//!   }
//! ]
//! ```
//!
//! `transformation` is the absolute transform as 16 numbers in column-major
//! order (translation in elements 12..15).
//!
//! The forest is streamed with an explicit stack, so nesting depth is only
//! limited by memory. Pretty output puts each field on its own line; field
//! values themselves are always compact.

use std::io::{self, Write};

use serde::Serialize;

use crate::error::{Result, TreeError};
use crate::node::{NodeId, ProductNode, ProductTree};

/// Serializes a forest for diagnostics and downstream tools.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyExporter<'a> {
    tree: &'a ProductTree,
    pretty: bool,
}

impl<'a> HierarchyExporter<'a> {
    pub fn new(tree: &'a ProductTree) -> Self {
        Self { tree, pretty: true }
    }

    /// Emit compact instead of indented JSON.
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    /// Render the forest as a JSON string.
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|err| TreeError::Export(io::Error::new(io::ErrorKind::InvalidData, err)))
    }

    /// Render the forest as a JSON value.
    ///
    /// Goes through the JSON text, so forests nested deeper than the
    /// `serde_json` recursion limit (128) return an error here; use
    /// [`to_json`](Self::to_json) or [`write_to`](Self::write_to) for those.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.to_json()?)?)
    }

    /// Write the forest to `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = JsonStream {
            writer,
            pretty: self.pretty,
        };
        out.forest(self.tree)?;
        out.writer.flush().map_err(TreeError::Export)
    }
}

/// One open `[...]` of sibling nodes.
struct Level<'t> {
    siblings: &'t [NodeId],
    next: usize,
    written: bool,
}

struct JsonStream<W> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonStream<W> {
    fn forest(&mut self, tree: &ProductTree) -> Result<()> {
        self.raw("[")?;
        let mut stack = vec![Level {
            siblings: tree.roots(),
            next: 0,
            written: false,
        }];

        while let Some(depth) = stack.len().checked_sub(1) {
            // Arrays at stack index d hold objects at indent 2d + 1.
            let level = &mut stack[depth];
            let (siblings, start) = (level.siblings, level.next);
            let found = siblings[start..]
                .iter()
                .enumerate()
                .find_map(|(k, id)| tree.node(*id).map(|node| (start + k, node)));

            match found {
                Some((position, node)) => {
                    level.next = position + 1;
                    let first = !level.written;
                    level.written = true;
                    if !first {
                        self.raw(",")?;
                    }
                    self.newline(2 * depth + 1)?;
                    self.raw("{")?;
                    self.fields(node, 2 * depth + 2)?;
                    self.key(2 * depth + 2, "children")?;
                    self.raw("[")?;
                    stack.push(Level {
                        siblings: &node.children,
                        next: 0,
                        written: false,
                    });
                }
                None => {
                    let written = level.written;
                    stack.pop();
                    if written {
                        self.newline(2 * depth)?;
                    }
                    self.raw("]")?;
                    if depth > 0 {
                        self.newline(2 * depth - 1)?;
                        self.raw("}")?;
                    }
                }
            }
        }
        Ok(())
    }

    fn fields(&mut self, node: &ProductNode, indent: usize) -> Result<()> {
        self.field(indent, "entityIndex", &node.entity_index)?;
        self.field(indent, "instanceIndex", &node.instance_index)?;
        self.field(indent, "name", &node.name)?;
        self.field(indent, "occurrence", &node.occurrence)?;
        self.field(indent, "transformation", &node.transformation.to_cols_array())?;
        self.field(indent, "geometryEntityIds", &node.geometry_entity_ids)
    }

    fn field<T: Serialize + ?Sized>(&mut self, indent: usize, key: &str, value: &T) -> Result<()> {
        self.key(indent, key)?;
        serde_json::to_writer(&mut self.writer, value)?;
        self.raw(",")
    }

    fn key(&mut self, indent: usize, key: &str) -> Result<()> {
        self.newline(indent)?;
        serde_json::to_writer(&mut self.writer, key)?;
        self.raw(if self.pretty { ": " } else { ":" })
    }

    fn newline(&mut self, indent: usize) -> Result<()> {
        if !self.pretty {
            return Ok(());
        }
        self.raw("\n")?;
        for _ in 0..indent {
            self.raw("  ")?;
        }
        Ok(())
    }

    fn raw(&mut self, text: &str) -> Result<()> {
        self.writer.write_all(text.as_bytes()).map_err(TreeError::Export)
    }
}
