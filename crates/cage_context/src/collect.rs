//! Populating a [`Context`] from syntax trees.
//!
//! Collection runs in two passes. The declaration pass records every named
//! class-like and function; the reference pass then attaches every name
//! that resolves to a known declaration. References are only found for
//! symbols that already exist, so all declaration passes must finish before
//! any reference pass starts.

use cage_ast::*;
use tracing::{debug, info};

use crate::{Context, QName, Symbol};

/// Namespaces entered during a walk
#[derive(Debug, Default)]
pub struct NamespaceStack {
    stack: Vec<QName>,
}

impl NamespaceStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ns: QName) {
        self.stack.push(ns);
    }

    pub fn pop(&mut self) -> Option<QName> {
        self.stack.pop()
    }

    /// Innermost namespace; the global namespace outside any block
    pub fn current(&self) -> QName {
        self.stack.last().cloned().unwrap_or_default()
    }

    /// Push for a namespace statement node
    fn enter(&mut self, tree: &SyntaxTree, stmt: &NamespaceStmt) {
        let ns = stmt
            .name
            .and_then(|name| tree.name(name))
            .map(|name| QName::from(name.parts()))
            .unwrap_or_default();
        self.push(ns);
    }
}

/// Declaration pass over one unit
pub struct DeclarationFinder<'a> {
    ctx: &'a mut Context,
    unit: UnitId,
    stack: NamespaceStack,
}

impl<'a> DeclarationFinder<'a> {
    pub fn new(ctx: &'a mut Context, unit: UnitId) -> Self {
        Self {
            ctx,
            unit,
            stack: NamespaceStack::new(),
        }
    }

    fn declare(&mut self, tree: &SyntaxTree, id: NodeId, name: Option<NodeId>) {
        let Some(ident) = name.and_then(|name| tree.identifier(name)) else {
            return;
        };
        if ident.name().is_empty() {
            return;
        }
        let fqn = QName::from_ns_and_name(&self.stack.current(), ident.name());
        debug!(symbol = %fqn, unit = %self.unit, "declared");
        self.ctx
            .add_symbol(&fqn, Symbol::new(NodeRef::new(self.unit, id)));
    }
}

impl Visitor for DeclarationFinder<'_> {
    fn enter_node(&mut self, tree: &SyntaxTree, id: NodeId) {
        if let NodeKind::Namespace(stmt) = &tree.node(id).kind {
            self.stack.enter(tree, stmt);
        }
    }

    fn leave_node(&mut self, tree: &SyntaxTree, id: NodeId) {
        match &tree.node(id).kind {
            NodeKind::ClassLike(class) => self.declare(tree, id, class.name),
            NodeKind::Function(function) => self.declare(tree, id, Some(function.name)),
            NodeKind::Namespace(_) => {
                self.stack.pop();
            }
            _ => {}
        }
    }
}

/// Reference pass over one unit
pub struct ReferenceFinder<'a> {
    ctx: &'a mut Context,
    unit: UnitId,
    stack: NamespaceStack,
}

impl<'a> ReferenceFinder<'a> {
    pub fn new(ctx: &'a mut Context, unit: UnitId) -> Self {
        Self {
            ctx,
            unit,
            stack: NamespaceStack::new(),
        }
    }

    fn add_namespace_ref(&mut self, path: &QName, node: NodeId) {
        if let Some(ns) = self.ctx.namespace_mut(&path.to_string()) {
            debug!(namespace = %path, unit = %self.unit, node, "namespace reference");
            ns.add_ref(NodeRef::new(self.unit, node));
        }
    }

    /// An import of a known namespace, or of a path enclosing one. The
    /// enclosing path gets its own empty bucket so the rename reaches it.
    fn add_import_ref(&mut self, path: &QName, node: NodeId) {
        let key = path.to_string();
        let encloses = self.ctx.namespaces().any(|(ns, _)| {
            ns.strip_prefix(key.as_str())
                .is_some_and(|rest| rest.starts_with(SEPARATOR))
        });
        if encloses {
            self.ctx.namespace_or_create(&key);
        }
        self.add_namespace_ref(path, node);
    }

    fn add_symbol_ref(&mut self, fqn: &QName, node: NodeId) {
        if let Some(symbol) = self.ctx.symbol_mut(fqn) {
            debug!(symbol = %fqn, unit = %self.unit, node, "symbol reference");
            symbol.add_ref(NodeRef::new(self.unit, node));
        }
    }
}

impl Visitor for ReferenceFinder<'_> {
    fn enter_node(&mut self, tree: &SyntaxTree, id: NodeId) {
        match &tree.node(id).kind {
            NodeKind::Namespace(stmt) => {
                self.stack.enter(tree, stmt);
                if let Some(name) = stmt.name {
                    self.add_namespace_ref(&self.stack.current(), name);
                }
            }
            NodeKind::Use(stmt) if stmt.kind == UseKind::Class => {
                // `use Me\Module;` imports a namespace, renamed along with it
                for item in &stmt.items {
                    if let Some(name) = tree.name(item.name) {
                        self.add_import_ref(&QName::from(name.parts()), item.name);
                    }
                }
            }
            NodeKind::Name(name) if name.context != NameContext::Namespace => {
                let fqn = match &name.resolved {
                    Some(resolved) => QName::from(resolved.as_slice()),
                    None => QName::from(name.parts()),
                };
                self.add_symbol_ref(&fqn, id);
            }
            NodeKind::Identifier(ident) => {
                let fqn = QName::from_ns_and_name(&self.stack.current(), ident.name());
                self.add_symbol_ref(&fqn, id);
            }
            _ => {}
        }
    }

    fn leave_node(&mut self, tree: &SyntaxTree, id: NodeId) {
        if matches!(tree.node(id).kind, NodeKind::Namespace(_)) {
            self.stack.pop();
        }
    }
}

/// Runs the collection passes over units into one [`Context`]
#[derive(Debug, Default)]
pub struct ContextBuilder {
    ctx: Context,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build_decls(&mut self, unit: &Unit) {
        let mut finder = DeclarationFinder::new(&mut self.ctx, unit.id);
        unit.tree.walk(&mut finder);
    }

    pub fn build_refs(&mut self, unit: &Unit) {
        let mut finder = ReferenceFinder::new(&mut self.ctx, unit.id);
        unit.tree.walk(&mut finder);
    }

    /// Both passes over a single unit; references into other units are
    /// only found if those were declared beforehand
    pub fn build(&mut self, unit: &Unit) {
        self.build_decls(unit);
        self.build_refs(unit);
    }

    /// Declarations of every source unit, then references of every unit
    pub fn build_units(&mut self, units: &Units) {
        let sources = units.iter().filter(|unit| unit.role == UnitRole::Source);
        for unit in sources {
            self.build_decls(unit);
        }
        info!(namespaces = self.ctx.namespaces().count(), "declarations collected");

        for unit in units.iter() {
            self.build_refs(unit);
        }
        let refs: usize = self
            .ctx
            .namespaces()
            .flat_map(|(_, ns)| ns.symbols().values())
            .map(|symbol| symbol.refs().len())
            .sum();
        info!(refs, "references collected");
    }

    pub fn finish(self) -> Context {
        self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cage_parser::Parser;

    const THING_A: &str = r#"<?php

namespace Module;

class ThingA
{
}
"#;

    const THING_B: &str = r#"<?php

namespace Module;

class ThingB
{
    private $thingA;

    public function __construct(\Module\ThingA $thingA)
    {
        $this->thingA = $thingA;
    }
}
"#;

    fn load(sources: &[(&str, UnitRole)]) -> Units {
        let mut units = Units::new();
        for (i, (source, role)) in sources.iter().enumerate() {
            let tree = Parser::parse(source).unwrap();
            units.add(format!("unit{}.php", i), source.to_string(), tree, *role);
        }
        units
    }

    fn q(text: &str) -> QName {
        QName::parse(text)
    }

    fn node_text<'a>(units: &'a Units, node: NodeRef) -> &'a str {
        let unit = units.get(node.unit).unwrap();
        let span = unit.tree.node(node.node).span;
        &unit.source[span.start..span.end]
    }

    #[test]
    fn test_namespace_stack() {
        let mut stack = NamespaceStack::new();
        assert!(stack.current().is_empty());

        stack.push(q("A"));
        stack.push(q("A\\B"));
        assert_eq!(stack.current(), q("A\\B"));
        stack.pop();
        assert_eq!(stack.current(), q("A"));
    }

    #[test]
    fn test_declarations_are_namespace_qualified() {
        let units = load(&[(
            "<?php namespace A { class X {} interface Y {} function f() {} } namespace { trait Z {} }",
            UnitRole::Source,
        )]);
        let mut builder = ContextBuilder::new();
        builder.build_decls(units.get(UnitId(0)).unwrap());
        let ctx = builder.finish();

        for fqn in ["A\\X", "A\\Y", "A\\f", "Z"] {
            assert!(ctx.symbol(&q(fqn)).is_some(), "missing {}", fqn);
        }
    }

    #[test]
    fn test_methods_and_namespaces_are_not_declarations() {
        let units = load(&[("<?php namespace A; class X { function m() {} }", UnitRole::Source)]);
        let mut builder = ContextBuilder::new();
        builder.build_decls(units.get(UnitId(0)).unwrap());
        let ctx = builder.finish();

        assert!(ctx.symbol(&q("A\\X")).is_some());
        assert!(ctx.symbol(&q("A\\m")).is_none());
        assert!(ctx.symbol(&q("A")).is_none());
        assert_eq!(ctx.namespaces().count(), 1);
    }

    #[test]
    fn test_cross_unit_reference() {
        let units = load(&[(THING_A, UnitRole::Source), (THING_B, UnitRole::Source)]);
        let mut builder = ContextBuilder::new();
        builder.build_units(&units);
        let ctx = builder.finish();

        let thing_a = ctx.symbol(&q("Module\\ThingA")).unwrap();
        let from_b: Vec<&str> = thing_a
            .refs()
            .iter()
            .filter(|node| node.unit == UnitId(1))
            .map(|&node| node_text(&units, node))
            .collect();
        assert_eq!(from_b, vec!["\\Module\\ThingA"]);
    }

    #[test]
    fn test_namespace_statements_are_namespace_refs() {
        let units = load(&[(THING_A, UnitRole::Source), (THING_B, UnitRole::Source)]);
        let mut builder = ContextBuilder::new();
        builder.build_units(&units);
        let ctx = builder.finish();

        let refs = ctx.namespace("Module").unwrap().refs();
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().all(|&node| node_text(&units, node) == "Module"));
    }

    #[test]
    fn test_unknown_references_are_dropped() {
        let units = load(&[(
            "<?php namespace Module; class ThingA { function f(\\DateTime $d): \\Other\\Thing {} }",
            UnitRole::Source,
        )]);
        let mut builder = ContextBuilder::new();
        builder.build_units(&units);
        let ctx = builder.finish();

        assert!(ctx.namespace("DateTime").is_none());
        assert!(ctx.namespace("Other").is_none());
        let total: usize = ctx
            .namespaces()
            .flat_map(|(_, ns)| ns.symbols().values())
            .map(|symbol| symbol.refs().len())
            .sum();
        // Only the declared identifier refers back to ThingA
        assert_eq!(total, 1);
    }

    #[test]
    fn test_per_unit_build_misses_later_declarations() {
        let units = load(&[(THING_B, UnitRole::Source), (THING_A, UnitRole::Source)]);
        let mut builder = ContextBuilder::new();
        for unit in units.iter() {
            builder.build(unit);
        }
        let ctx = builder.finish();

        let thing_a = ctx.symbol(&q("Module\\ThingA")).unwrap();
        assert!(thing_a.refs().iter().all(|node| node.unit == UnitId(1)));
    }

    #[test]
    fn test_include_units_contribute_references_only() {
        let units = load(&[
            (THING_B, UnitRole::Source),
            (THING_A, UnitRole::Include),
        ]);
        let mut builder = ContextBuilder::new();
        builder.build_units(&units);
        let ctx = builder.finish();

        assert!(ctx.symbol(&q("Module\\ThingA")).is_none());
        let thing_b = ctx.symbol(&q("Module\\ThingB")).unwrap();
        assert_eq!(thing_b.decl().unit, UnitId(0));
        // The include's namespace statement still names a known namespace
        let refs = ctx.namespace("Module").unwrap().refs();
        assert!(refs.iter().any(|node| node.unit == UnitId(1)));
    }

    #[test]
    fn test_imports_resolve_to_symbols() {
        let units = load(&[
            (THING_A, UnitRole::Source),
            (
                "<?php namespace Other; use Module\\ThingA; function f(ThingA $a) {}",
                UnitRole::Source,
            ),
        ]);
        let mut builder = ContextBuilder::new();
        builder.build_units(&units);
        let ctx = builder.finish();

        let texts: Vec<&str> = ctx
            .symbol(&q("Module\\ThingA"))
            .unwrap()
            .refs()
            .iter()
            .filter(|node| node.unit == UnitId(1))
            .map(|&node| node_text(&units, node))
            .collect();
        assert_eq!(texts, vec!["Module\\ThingA", "ThingA"]);
    }

    #[test]
    fn test_namespace_import_is_namespace_ref() {
        let units = load(&[
            (THING_A, UnitRole::Source),
            ("<?php use Module; new Module\\ThingA;", UnitRole::Source),
        ]);
        let mut builder = ContextBuilder::new();
        builder.build_units(&units);
        let ctx = builder.finish();

        let refs = ctx.namespace("Module").unwrap().refs();
        assert!(refs.contains(&NodeRef::new(UnitId(1), 0)));
    }

    #[test]
    fn test_import_of_enclosing_namespace_is_namespace_ref() {
        let units = load(&[
            ("<?php namespace Me\\Module; class ThingA {}", UnitRole::Source),
            ("<?php use Me; new Me\\Module\\ThingA;", UnitRole::Source),
        ]);
        let mut builder = ContextBuilder::new();
        builder.build_units(&units);
        let ctx = builder.finish();

        let me = ctx.namespace("Me").unwrap();
        assert!(me.symbols().is_empty());
        assert_eq!(me.refs(), &[NodeRef::new(UnitId(1), 0)]);
    }

    #[test]
    fn test_unrelated_import_creates_no_namespace() {
        let units = load(&[
            (THING_A, UnitRole::Source),
            ("<?php use Mod; use Module\\ThingA;", UnitRole::Source),
        ]);
        let mut builder = ContextBuilder::new();
        builder.build_units(&units);
        let ctx = builder.finish();

        assert!(ctx.namespace("Mod").is_none());
        assert_eq!(ctx.namespaces().count(), 1);
    }
}
