//! The cross-unit symbol table

use std::collections::BTreeMap;
use std::fmt::Write as _;

use cage_ast::{NodeRef, SEPARATOR};
use serde::Serialize;

use crate::QName;

/// One declared class-like or function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    decl: NodeRef,
    refs: Vec<NodeRef>,
}

impl Symbol {
    pub fn new(decl: NodeRef) -> Self {
        Self {
            decl,
            refs: Vec::new(),
        }
    }

    pub fn decl(&self) -> NodeRef {
        self.decl
    }

    /// Use-sites, in the order they were found
    pub fn refs(&self) -> &[NodeRef] {
        &self.refs
    }

    pub fn add_ref(&mut self, node: NodeRef) {
        self.refs.push(node);
    }
}

/// Symbols declared directly in one namespace, plus the nodes naming the namespace itself
#[derive(Debug, Clone, Default)]
pub struct SymbolNamespace {
    refs: Vec<NodeRef>,
    symbols: BTreeMap<String, Symbol>,
}

impl SymbolNamespace {
    pub fn refs(&self) -> &[NodeRef] {
        &self.refs
    }

    pub fn add_ref(&mut self, node: NodeRef) {
        self.refs.push(node);
    }

    pub fn symbols(&self) -> &BTreeMap<String, Symbol> {
        &self.symbols
    }

    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn symbol_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.symbols.get_mut(name)
    }

    /// Later declarations replace earlier ones
    pub fn insert(&mut self, name: impl Into<String>, symbol: Symbol) -> Option<Symbol> {
        self.symbols.insert(name.into(), symbol)
    }
}

/// Namespace path (separators trimmed) to its symbols
#[derive(Debug, Clone, Default)]
pub struct Context {
    namespaces: BTreeMap<String, SymbolNamespace>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &str) -> &str {
        path.trim_matches(SEPARATOR)
    }

    /// Declare `fqn`; a previous symbol with the same name is dropped
    pub fn add_symbol(&mut self, fqn: &QName, symbol: Symbol) {
        let Some(name) = fqn.name() else {
            return;
        };
        let ns = fqn.parent().to_string();
        if self
            .namespace_or_create(&ns)
            .insert(name, symbol)
            .is_some()
        {
            tracing::debug!(symbol = %fqn, "redeclared symbol replaces earlier one");
        }
    }

    pub fn symbol(&self, fqn: &QName) -> Option<&Symbol> {
        let name = fqn.name()?;
        self.namespace(&fqn.parent().to_string())?.symbol(name)
    }

    pub fn symbol_mut(&mut self, fqn: &QName) -> Option<&mut Symbol> {
        let name = fqn.name()?;
        self.namespace_mut(&fqn.parent().to_string())?
            .symbol_mut(name)
    }

    /// Read lookup; never creates a namespace
    pub fn namespace(&self, path: &str) -> Option<&SymbolNamespace> {
        self.namespaces.get(Self::key(path))
    }

    pub fn namespace_mut(&mut self, path: &str) -> Option<&mut SymbolNamespace> {
        self.namespaces.get_mut(Self::key(path))
    }

    pub fn namespace_or_create(&mut self, path: &str) -> &mut SymbolNamespace {
        self.namespaces
            .entry(Self::key(path).to_string())
            .or_default()
    }

    /// Install a prebuilt namespace, replacing any under the same canonical path
    pub fn add_namespace(&mut self, path: &str, ns: SymbolNamespace) -> Option<SymbolNamespace> {
        self.namespaces.insert(Self::key(path).to_string(), ns)
    }

    /// Every namespace with its canonical path, in path order
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &SymbolNamespace)> {
        self.namespaces.iter().map(|(path, ns)| (path.as_str(), ns))
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Nest the namespace paths by segment
    pub fn tree(&self) -> NamespaceTree {
        let mut root = NamespaceTree::default();
        for (path, ns) in &self.namespaces {
            let mut node = &mut root;
            for part in QName::parse(path).into_parts() {
                node = node.children.entry(part).or_default();
            }
            node.symbols.extend(ns.symbols.keys().cloned());
        }
        root
    }
}

/// Namespaces nested by segment; the root holds the global namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceTree {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    symbols: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<String, NamespaceTree>,
}

impl NamespaceTree {
    /// Top-level namespace segments
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn child(&self, name: &str) -> Option<&NamespaceTree> {
        self.children.get(name)
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Indented outline: namespaces end with `\`, symbols are listed under them
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(0, &mut out);
        out
    }

    fn render_into(&self, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        for symbol in &self.symbols {
            let _ = writeln!(out, "{}{}", indent, symbol);
        }
        for (name, child) in &self.children {
            let _ = writeln!(out, "{}{}{}", indent, name, SEPARATOR);
            child.render_into(depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cage_ast::UnitId;

    fn node(n: u32) -> NodeRef {
        NodeRef::new(UnitId(0), n)
    }

    fn q(text: &str) -> QName {
        QName::parse(text)
    }

    #[test]
    fn test_add_and_get_symbol() {
        let mut ctx = Context::new();
        ctx.add_symbol(&q("Module\\ThingA"), Symbol::new(node(1)));

        assert_eq!(ctx.symbol(&q("Module\\ThingA")).unwrap().decl(), node(1));
        assert!(ctx.symbol(&q("Module\\ThingB")).is_none());
        assert!(ctx.symbol(&q("Other\\ThingA")).is_none());
    }

    #[test]
    fn test_redeclaration_overwrites() {
        let mut ctx = Context::new();
        let mut first = Symbol::new(node(1));
        first.add_ref(node(9));
        ctx.add_symbol(&q("Module\\ThingA"), first);
        ctx.add_symbol(&q("Module\\ThingA"), Symbol::new(node(2)));

        let symbol = ctx.symbol(&q("Module\\ThingA")).unwrap();
        assert_eq!(symbol.decl(), node(2));
        assert!(symbol.refs().is_empty());
    }

    #[test]
    fn test_lookup_does_not_create_namespaces() {
        let ctx = Context::new();

        assert!(ctx.symbol(&q("Nowhere\\X")).is_none());
        assert!(ctx.namespace("Nowhere").is_none());
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_namespace_paths_are_canonical() {
        let mut ctx = Context::new();
        ctx.namespace_or_create("\\Me\\Module\\").add_ref(node(3));

        assert_eq!(ctx.namespace("Me\\Module").unwrap().refs(), &[node(3)]);
        assert_eq!(ctx.namespaces().count(), 1);
    }

    #[test]
    fn test_add_namespace_uses_canonical_path() {
        let mut ctx = Context::new();
        let mut first = SymbolNamespace::default();
        first.add_ref(node(1));
        let mut second = SymbolNamespace::default();
        second.insert("ThingA", Symbol::new(node(2)));

        assert!(ctx.add_namespace("\\A\\B\\", first).is_none());
        let replaced = ctx.add_namespace("A\\B", second).unwrap();

        assert_eq!(replaced.refs(), &[node(1)]);
        assert_eq!(ctx.namespaces().count(), 1);
        assert_eq!(ctx.symbol(&q("A\\B\\ThingA")).unwrap().decl(), node(2));
    }

    #[test]
    fn test_global_symbols() {
        let mut ctx = Context::new();
        ctx.add_symbol(&q("helper"), Symbol::new(node(1)));

        assert!(ctx.namespace("").is_some());
        assert!(ctx.symbol(&q("\\helper")).is_some());
    }

    #[test]
    fn test_tree_nests_segments() {
        let mut ctx = Context::new();
        ctx.add_symbol(&q("Me\\Module\\ThingA"), Symbol::new(node(1)));
        ctx.add_symbol(&q("Me\\OtherModule\\ThingB"), Symbol::new(node(2)));
        ctx.add_symbol(&q("Lib\\Util"), Symbol::new(node(3)));
        ctx.add_symbol(&q("helper"), Symbol::new(node(4)));

        let tree = ctx.tree();
        assert_eq!(tree.roots().collect::<Vec<_>>(), vec!["Lib", "Me"]);
        assert_eq!(tree.symbols(), ["helper"]);
        let me = tree.child("Me").unwrap();
        assert!(me.symbols().is_empty());
        assert_eq!(me.child("Module").unwrap().symbols(), ["ThingA"]);
    }

    #[test]
    fn test_tree_render() {
        let mut ctx = Context::new();
        ctx.add_symbol(&q("Me\\Module\\ThingA"), Symbol::new(node(1)));

        assert_eq!(ctx.tree().render(), "Me\\\n  Module\\\n    ThingA\n");
    }

    #[test]
    fn test_tree_serializes_to_json() {
        let mut ctx = Context::new();
        ctx.add_symbol(&q("Me\\Module\\ThingA"), Symbol::new(node(1)));

        let json = serde_json::to_value(ctx.tree()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "children": {
                    "Me": { "children": { "Module": { "symbols": ["ThingA"] } } }
                }
            })
        );
    }
}
