//! Name resolution: attach the fully qualified target to every name node.
//!
//! Two passes, like the HIR resolver: walk the tree collecting resolutions
//! against the import tables in scope, then write them back.

use std::collections::HashMap;

use cage_ast::*;

/// Collects `use` imports per namespace and resolves names against them
#[derive(Debug, Default)]
pub struct NameResolver {
    namespace: Vec<String>,
    /// Class aliases, keyed by lowercased alias
    classes: HashMap<String, Vec<String>>,
    /// Function aliases, keyed by lowercased alias
    functions: HashMap<String, Vec<String>>,
    /// Constant aliases; case-sensitive
    constants: HashMap<String, Vec<String>>,
    resolved: Vec<(NodeId, Resolved)>,
}

/// A resolved target and whether an import alias produced it
type Resolved = (Vec<String>, bool);

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every name in `tree` in place
    pub fn resolve(tree: &mut SyntaxTree) {
        let mut resolver = NameResolver::new();
        tree.walk(&mut resolver);
        tracing::trace!(names = resolver.resolved.len(), "resolved names");
        for (id, (parts, via_alias)) in resolver.resolved {
            tree.set_resolved(id, parts, via_alias);
        }
    }

    fn enter_namespace(&mut self, parts: Vec<String>) {
        self.namespace = parts;
        self.classes.clear();
        self.functions.clear();
        self.constants.clear();
    }

    fn add_import(&mut self, kind: UseKind, target: &[String], alias: Option<&str>) {
        let Some(last) = target.last() else {
            return;
        };
        let alias = alias.unwrap_or(last).to_string();
        let target = target.to_vec();
        match kind {
            UseKind::Class => {
                self.classes.insert(alias.to_lowercase(), target);
            }
            UseKind::Function => {
                self.functions.insert(alias.to_lowercase(), target);
            }
            UseKind::Const => {
                self.constants.insert(alias, target);
            }
        }
    }

    fn prefixed(&self, parts: &[String]) -> Vec<String> {
        let mut out = self.namespace.clone();
        out.extend(parts.iter().cloned());
        out
    }

    /// Resolve through a class alias on the first segment, else relative to the namespace
    fn resolve_class(&self, name: &Name) -> Option<Resolved> {
        let parts = name.parts();
        let first = parts.first()?;
        if name.is_fully_qualified() {
            return Some((parts.to_vec(), false));
        }
        if ["self", "parent", "static"].contains(&first.to_lowercase().as_str()) {
            return None;
        }
        match self.classes.get(&first.to_lowercase()) {
            Some(target) => {
                let mut out = target.clone();
                out.extend(parts[1..].iter().cloned());
                Some((out, true))
            }
            None => Some((self.prefixed(parts), false)),
        }
    }

    /// Unqualified calls inside a namespace fall back to the global function at
    /// runtime, so they only resolve when imported or written in the global namespace
    fn resolve_function(&self, name: &Name) -> Option<Resolved> {
        match name.kind {
            NameKind::FullyQualified => Some((name.parts().to_vec(), false)),
            NameKind::Qualified => self.resolve_class(name),
            NameKind::Unqualified => {
                let first = name.parts().first()?;
                if let Some(target) = self.functions.get(&first.to_lowercase()) {
                    return Some((target.clone(), true));
                }
                if self.namespace.is_empty() {
                    return Some((name.parts().to_vec(), false));
                }
                None
            }
        }
    }
}

impl Visitor for NameResolver {
    fn enter_node(&mut self, tree: &SyntaxTree, id: NodeId) {
        match &tree.node(id).kind {
            NodeKind::Namespace(ns) => {
                let parts = ns
                    .name
                    .and_then(|name| tree.name(name))
                    .map(|name| name.parts().to_vec())
                    .unwrap_or_default();
                self.enter_namespace(parts);
            }
            NodeKind::Use(stmt) => {
                for item in &stmt.items {
                    if let Some(name) = tree.name(item.name) {
                        self.add_import(stmt.kind, name.parts(), item.alias.as_deref());
                    }
                }
            }
            NodeKind::Name(name) => {
                let resolved = match name.context {
                    NameContext::Class => self.resolve_class(name),
                    NameContext::Function => self.resolve_function(name),
                    NameContext::Import(_) => Some((name.parts().to_vec(), false)),
                    NameContext::Namespace => None,
                };
                if let Some(resolved) = resolved {
                    self.resolved.push((id, resolved));
                }
            }
            _ => {}
        }
    }

    fn leave_node(&mut self, tree: &SyntaxTree, id: NodeId) {
        if matches!(tree.node(id).kind, NodeKind::Namespace(_)) {
            self.enter_namespace(Vec::new());
        }
    }
}
