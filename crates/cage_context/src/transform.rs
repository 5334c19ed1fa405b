//! Rewriting the nodes recorded in a [`Context`]

use cage_ast::{Identifier, Name, NameContext, Node, NodeKind, NodeRef, Units};
use thiserror::Error;
use tracing::debug;

use crate::{Context, QName};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("cannot rewrite {kind} node {} in unit {}", node.node, node.unit)]
    InvalidNode { node: NodeRef, kind: &'static str },
    #[error("no node {} in unit {}", .0.node, .0.unit)]
    DanglingRef(NodeRef),
}

/// A rewrite of the recorded nodes
pub trait Transform {
    fn apply(&self, ctx: &Context, units: &mut Units) -> Result<(), TransformError>;
}

/// Transforms applied one after another
#[derive(Default)]
pub struct TransformList {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transform: impl Transform + 'static) {
        self.transforms.push(Box::new(transform));
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Transform for TransformList {
    fn apply(&self, ctx: &Context, units: &mut Units) -> Result<(), TransformError> {
        for transform in &self.transforms {
            transform.apply(ctx, units)?;
        }
        Ok(())
    }
}

/// What a recorded node allows to be rewritten
enum Target<'a> {
    Path(&'a mut Name),
    Ident(&'a mut Identifier),
}

impl<'a> Target<'a> {
    /// Fails with the node's kind label when it cannot be rewritten
    fn of(node: &'a mut Node) -> Result<Self, &'static str> {
        match &mut node.kind {
            NodeKind::Name(name) => Ok(Target::Path(name)),
            NodeKind::Identifier(ident) => Ok(Target::Ident(ident)),
            other => Err(other.label()),
        }
    }
}

fn target(units: &mut Units, node: NodeRef) -> Result<Target<'_>, TransformError> {
    let found = units
        .node_mut(node)
        .ok_or(TransformError::DanglingRef(node))?;
    Target::of(found).map_err(|kind| TransformError::InvalidNode { node, kind })
}

/// Moves every namespace starting with `search` under `replace`
#[derive(Debug, Clone)]
pub struct NamespaceTransform {
    search: QName,
    replace: QName,
}

impl NamespaceTransform {
    pub fn new(search: QName, replace: QName) -> Self {
        Self { search, replace }
    }

    fn splice(&self, name: &QName) -> QName {
        name.replace(self.search.parts(), self.replace.parts(), Some(0))
    }
}

impl Transform for NamespaceTransform {
    fn apply(&self, ctx: &Context, units: &mut Units) -> Result<(), TransformError> {
        for (path, ns) in ctx.namespaces() {
            let old = QName::parse(path);
            let new = self.splice(&old);
            if new == old {
                continue;
            }
            debug!(from = %old, to = %new, "renaming namespace");

            for &node in ns.refs() {
                match target(units, node)? {
                    Target::Path(name) => name.set_parts(new.parts().to_vec()),
                    Target::Ident(ident) => ident.set_name(new.to_string()),
                }
            }

            for symbol in ns.symbols().values() {
                for &node in symbol.refs() {
                    match target(units, node)? {
                        Target::Path(name) => {
                            // Relative spellings follow their namespace statement or import
                            if is_absolute(name) {
                                let spliced = self.splice(&QName::from(name.parts()));
                                name.set_parts(spliced.into_parts());
                            }
                        }
                        Target::Ident(_) => {}
                    }
                }
            }
        }
        Ok(())
    }
}

/// Whether a name is written as the full path it resolves to: fully
/// qualified, an import item, or a global-namespace name that no alias touched
fn is_absolute(name: &Name) -> bool {
    if name.is_fully_qualified() || matches!(name.context, NameContext::Import(_)) {
        return true;
    }
    !name.via_alias && name.resolved.as_deref() == Some(name.parts())
}
