//! Source units and the format-preserving printer

use std::path::{Path, PathBuf};

use cage_lexer::Span;

use crate::{Node, NodeKind, NodeRef, SyntaxTree};

/// Index of a unit in [`Units`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u32);

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a unit takes part in collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitRole {
    /// Declarations and references are collected
    Source,
    /// Only references are collected; its declarations stay unknown
    Include,
}

/// A single parsed file: original text plus its (mutable) tree
#[derive(Debug, Clone)]
pub struct Unit {
    pub id: UnitId,
    pub path: PathBuf,
    pub source: String,
    pub tree: SyntaxTree,
    pub role: UnitRole,
}

impl Unit {
    /// Render the current tree as source, touching only edited names
    pub fn print(&self) -> String {
        let mut edits: Vec<(Span, String)> = self
            .tree
            .nodes()
            .filter_map(|node| match &node.kind {
                NodeKind::Name(name) if name.is_edited() => Some((node.span, name.to_string())),
                NodeKind::Identifier(ident) if ident.is_edited() => {
                    Some((node.span, ident.to_string()))
                }
                _ => None,
            })
            .collect();
        edits.sort_by_key(|(span, _)| span.start);

        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for (span, text) in edits {
            // Overlapping edits cannot come from one tree; keep the first
            if span.start < cursor || span.end > self.source.len() {
                continue;
            }
            out.push_str(&self.source[cursor..span.start]);
            out.push_str(&text);
            cursor = span.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }

    pub fn is_edited(&self) -> bool {
        self.tree.nodes().any(|node| match &node.kind {
            NodeKind::Name(name) => name.is_edited(),
            NodeKind::Identifier(ident) => ident.is_edited(),
            _ => false,
        })
    }
}

/// All units of one run
#[derive(Debug, Default)]
pub struct Units {
    units: Vec<Unit>,
}

impl Units {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        path: impl AsRef<Path>,
        source: String,
        tree: SyntaxTree,
        role: UnitRole,
    ) -> UnitId {
        let id = UnitId(self.units.len() as u32);
        self.units.push(Unit {
            id,
            path: path.as_ref().to_path_buf(),
            source,
            tree,
            role,
        });
        id
    }

    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn node(&self, node_ref: NodeRef) -> Option<&Node> {
        self.get(node_ref.unit)?.tree.get(node_ref.node)
    }

    pub fn node_mut(&mut self, node_ref: NodeRef) -> Option<&mut Node> {
        self.get_mut(node_ref.unit)?.tree.get_mut(node_ref.node)
    }
}
