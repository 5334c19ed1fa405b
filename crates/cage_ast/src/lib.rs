//! Syntax tree for the PHP subset understood by the cage front end.
//!
//! Nodes live in a per-unit arena and are addressed by [`NodeId`]. Other
//! units and the symbol table refer to them through [`NodeRef`] handles, so
//! a tree can be mutated in place while the table only holds indices.

mod unit;

pub use unit::{Unit, UnitId, UnitRole, Units};

use cage_lexer::Span;

/// Unique identifier for AST nodes within one unit
pub type NodeId = u32;

/// Handle to a node in some unit's tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    pub unit: UnitId,
    pub node: NodeId,
}

impl NodeRef {
    pub fn new(unit: UnitId, node: NodeId) -> Self {
        Self { unit, node }
    }
}

/// Namespace separator used by names
pub const SEPARATOR: char = '\\';

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Namespace(NamespaceStmt),
    Use(UseStmt),
    ClassLike(ClassLikeDecl),
    /// Free function declared at statement level
    Function(FunctionDecl),
    /// Function declared inside a class-like body
    Method(FunctionDecl),
    Param(Param),
    Property(Property),
    /// `use TraitA, TraitB;` inside a class body
    TraitUse(Vec<NodeId>),
    /// Union/intersection/nullable type; children are names and identifiers
    Type(Vec<NodeId>),
    /// Opaque region of code, holding only the names it mentions
    Code(Vec<NodeId>),
    Name(Name),
    Identifier(Identifier),
}

impl NodeKind {
    /// Short, stable label used in diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Namespace(_) => "namespace",
            NodeKind::Use(_) => "use",
            NodeKind::ClassLike(_) => "class-like",
            NodeKind::Function(_) => "function",
            NodeKind::Method(_) => "method",
            NodeKind::Param(_) => "param",
            NodeKind::Property(_) => "property",
            NodeKind::TraitUse(_) => "trait-use",
            NodeKind::Type(_) => "type",
            NodeKind::Code(_) => "code",
            NodeKind::Name(_) => "name",
            NodeKind::Identifier(_) => "identifier",
        }
    }
}

/// `namespace Foo\Bar;` or `namespace Foo\Bar { ... }`
#[derive(Debug, Clone)]
pub struct NamespaceStmt {
    /// None for the braced global namespace `namespace { ... }`
    pub name: Option<NodeId>,
    pub stmts: Vec<NodeId>,
    pub braced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseKind {
    Class,
    Function,
    Const,
}

/// `use Foo\Bar as Baz, Foo\Qux;`
#[derive(Debug, Clone)]
pub struct UseStmt {
    pub kind: UseKind,
    pub items: Vec<UseItem>,
}

#[derive(Debug, Clone)]
pub struct UseItem {
    pub name: NodeId,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
    Enum,
}

#[derive(Debug, Clone)]
pub struct ClassLikeDecl {
    pub kind: ClassKind,
    pub attributes: Vec<NodeId>,
    /// None for anonymous classes
    pub name: Option<NodeId>,
    /// Backing type of an enum
    pub backing: Option<NodeId>,
    pub extends: Vec<NodeId>,
    pub implements: Vec<NodeId>,
    pub members: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub attributes: Vec<NodeId>,
    pub name: NodeId,
    pub params: Vec<NodeId>,
    pub return_type: Option<NodeId>,
    /// None for abstract and interface methods
    pub body: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub attributes: Vec<NodeId>,
    pub ty: Option<NodeId>,
    pub var: String,
    pub default: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Property {
    pub attributes: Vec<NodeId>,
    pub ty: Option<NodeId>,
    pub vars: Vec<String>,
    pub defaults: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// `Foo`
    Unqualified,
    /// `Foo\Bar`
    Qualified,
    /// `\Foo\Bar`
    FullyQualified,
}

/// Where a name appears, which decides how it resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameContext {
    Class,
    Function,
    /// Name of a namespace statement
    Namespace,
    /// Imported path of a `use` item
    Import(UseKind),
}

/// A segmented name at a use-site or in a namespace/import statement
#[derive(Debug, Clone)]
pub struct Name {
    parts: Vec<String>,
    pub kind: NameKind,
    pub context: NameContext,
    /// Fully qualified target attached by name resolution
    pub resolved: Option<Vec<String>>,
    /// The first segment went through a `use` alias
    pub via_alias: bool,
    edited: bool,
}

impl Name {
    /// Parse the written form of a name (`Foo`, `Foo\Bar`, `\Foo\Bar`)
    pub fn parse(text: &str, context: NameContext) -> Self {
        let fully_qualified = text.starts_with(SEPARATOR);
        let parts: Vec<String> = text
            .split(SEPARATOR)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
        let kind = if fully_qualified {
            NameKind::FullyQualified
        } else if parts.len() > 1 {
            NameKind::Qualified
        } else {
            NameKind::Unqualified
        };
        Self {
            parts,
            kind,
            context,
            resolved: None,
            via_alias: false,
            edited: false,
        }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Replace the segments, keeping a leading separator if there was one
    pub fn set_parts(&mut self, parts: Vec<String>) {
        if parts == self.parts {
            return;
        }
        if self.kind != NameKind::FullyQualified {
            self.kind = if parts.len() > 1 {
                NameKind::Qualified
            } else {
                NameKind::Unqualified
            };
        }
        self.parts = parts;
        self.edited = true;
    }

    pub fn is_edited(&self) -> bool {
        self.edited
    }

    pub fn is_fully_qualified(&self) -> bool {
        self.kind == NameKind::FullyQualified
    }

    /// The written segments, without a leading separator
    pub fn joined(&self) -> String {
        self.parts.join("\\")
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.kind == NameKind::FullyQualified {
            write!(f, "{}", SEPARATOR)?;
        }
        write!(f, "{}", self.joined())
    }
}

/// A bare identifier: declared names, builtin types
#[derive(Debug, Clone)]
pub struct Identifier {
    name: String,
    edited: bool,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            edited: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if name != self.name {
            self.name = name;
            self.edited = true;
        }
    }

    pub fn is_edited(&self) -> bool {
        self.edited
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Enter/leave callbacks driven by [`SyntaxTree::walk`]
pub trait Visitor {
    fn enter_node(&mut self, _tree: &SyntaxTree, _id: NodeId) {}
    fn leave_node(&mut self, _tree: &SyntaxTree, _id: NodeId) {}
}

/// Node arena plus the top-level statement list of one unit
#[derive(Debug, Clone, Default)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    stmts: Vec<NodeId>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node { kind, span });
        id
    }

    pub fn push_stmt(&mut self, id: NodeId) {
        self.stmts.push(id);
    }

    pub fn stmts(&self) -> &[NodeId] {
        &self.stmts
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id as usize)
    }

    /// Panics on ids not produced by this tree's `alloc`
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn name(&self, id: NodeId) -> Option<&Name> {
        match &self.get(id)?.kind {
            NodeKind::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn identifier(&self, id: NodeId) -> Option<&Identifier> {
        match &self.get(id)?.kind {
            NodeKind::Identifier(ident) => Some(ident),
            _ => None,
        }
    }

    /// Attach a resolved target to a name node; other node kinds are ignored
    pub fn set_resolved(&mut self, id: NodeId, parts: Vec<String>, via_alias: bool) {
        if let Some(Node { kind: NodeKind::Name(name), .. }) = self.get_mut(id) {
            name.resolved = Some(parts);
            name.via_alias = via_alias;
        }
    }

    /// Direct children in source order
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        match &self.node(id).kind {
            NodeKind::Namespace(ns) => {
                out.extend(ns.name);
                out.extend(&ns.stmts);
            }
            NodeKind::Use(u) => out.extend(u.items.iter().map(|item| item.name)),
            NodeKind::ClassLike(c) => {
                out.extend(&c.attributes);
                out.extend(c.name);
                out.extend(c.backing);
                out.extend(&c.extends);
                out.extend(&c.implements);
                out.extend(&c.members);
            }
            NodeKind::Function(f) | NodeKind::Method(f) => {
                out.extend(&f.attributes);
                out.push(f.name);
                out.extend(&f.params);
                out.extend(f.return_type);
                out.extend(f.body);
            }
            NodeKind::Param(p) => {
                out.extend(&p.attributes);
                out.extend(p.ty);
                out.extend(p.default);
            }
            NodeKind::Property(p) => {
                out.extend(&p.attributes);
                out.extend(p.ty);
                out.extend(&p.defaults);
            }
            NodeKind::TraitUse(ids) | NodeKind::Type(ids) | NodeKind::Code(ids) => out.extend(ids),
            NodeKind::Name(_) | NodeKind::Identifier(_) => {}
        }
        out
    }

    /// Depth-first traversal calling `enter_node` before and `leave_node` after children
    pub fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        for &id in &self.stmts {
            self.walk_node(id, visitor);
        }
    }

    fn walk_node<V: Visitor + ?Sized>(&self, id: NodeId, visitor: &mut V) {
        visitor.enter_node(self, id);
        for child in self.children(id) {
            self.walk_node(child, visitor);
        }
        visitor.leave_node(self, id);
    }

    /// Indented outline of the tree, one node per line
    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        for &id in &self.stmts {
            self.print_node(id, 0, &mut out);
        }
        out
    }

    fn print_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.node(id);
        let indent = "  ".repeat(depth);
        let detail = match &node.kind {
            NodeKind::Name(name) => match &name.resolved {
                Some(resolved) => format!(" {} -> \\{}", name, resolved.join("\\")),
                None => format!(" {}", name),
            },
            NodeKind::Identifier(ident) => format!(" {}", ident),
            NodeKind::ClassLike(c) => format!(" ({:?})", c.kind).to_lowercase(),
            NodeKind::Param(p) => format!(" ${}", p.var),
            NodeKind::Property(p) => {
                let vars: Vec<String> = p.vars.iter().map(|v| format!("${}", v)).collect();
                format!(" {}", vars.join(", "))
            }
            NodeKind::Use(u) => format!(" ({:?})", u.kind).to_lowercase(),
            _ => String::new(),
        };
        out.push_str(&format!(
            "{}{}{} @{}..{}\n",
            indent,
            node.kind.label(),
            detail,
            node.span.start,
            node.span.end
        ));
        for child in self.children(id) {
            self.print_node(child, depth + 1, out);
        }
    }
}
