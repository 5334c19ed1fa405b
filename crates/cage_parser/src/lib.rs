//! Tolerant parser for the PHP subset that matters to namespace rewriting.
//!
//! Declarations, imports, members, parameters and types are parsed
//! structurally. Statement and expression bodies are scanned as balanced
//! token regions; only the names they mention at class or function
//! positions are kept, as [`NodeKind::Code`] nodes.

mod resolve;

pub use resolve::NameResolver;

use cage_ast::*;
use cage_lexer::{Lexer, Span, SpannedToken, Token};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{message} at {}..{}", span.start, span.end)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Type keywords that never name a class
const BUILTIN_TYPES: &[&str] = &[
    "int", "float", "string", "bool", "array", "callable", "iterable", "object", "mixed", "void",
    "null", "never", "false", "true", "self", "parent", "static",
];

/// Language constructs lexed as names; never a class or function reference
const RESERVED_WORDS: &[&str] = &[
    "if", "elseif", "else", "while", "do", "for", "foreach", "switch", "match", "return", "echo",
    "print", "isset", "unset", "empty", "list", "array", "exit", "die", "include",
    "include_once", "require", "require_once", "eval", "throw", "yield", "clone", "and", "or",
    "xor", "global", "try", "finally", "default", "break", "continue", "goto", "declare",
    "insteadof",
];

/// Names that refer to the enclosing class rather than to a declaration
const SPECIAL_CLASS_NAMES: &[&str] = &["self", "parent", "static"];

pub struct Parser<'src> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    source: &'src str,
    tree: SyntaxTree,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> ParseResult<Self> {
        let tokens = Lexer::tokenize(source).map_err(|e| ParseError {
            message: e.message,
            span: e.span,
        })?;
        Ok(Self {
            tokens,
            pos: 0,
            source,
            tree: SyntaxTree::new(),
        })
    }

    /// Parse a unit and attach resolved names to every name node
    pub fn parse(source: &str) -> ParseResult<SyntaxTree> {
        let mut tree = Parser::parse_unresolved(source)?;
        NameResolver::resolve(&mut tree);
        Ok(tree)
    }

    /// Parse a unit without running name resolution
    pub fn parse_unresolved(source: &str) -> ParseResult<SyntaxTree> {
        let mut parser = Parser::new(source)?;
        parser.parse_source_file()?;
        tracing::trace!(
            nodes = parser.tree.len(),
            bytes = parser.source.len(),
            "parsed unit"
        );
        Ok(parser.tree)
    }

    // === Token Access ===

    fn current(&self) -> &SpannedToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn peek_nth(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)].token
    }

    fn peek_span(&self) -> Span {
        self.current().span
    }

    /// Span of the most recently consumed token
    fn last_span(&self) -> Span {
        if self.pos == 0 {
            return Span::new(0, 0);
        }
        self.tokens[(self.pos - 1).min(self.tokens.len() - 1)].span
    }

    fn previous(&self, n: usize) -> Option<&Token> {
        self.pos.checked_sub(n).map(|i| &self.tokens[i].token)
    }

    fn advance(&mut self) -> &SpannedToken {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<SpannedToken> {
        if self.check(&expected) {
            Ok(self.advance().clone())
        } else {
            Err(self.error(format!("expected '{}', found '{}'", expected, self.peek())))
        }
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            message,
            span: self.peek_span(),
        }
    }

    /// A declared name: a single-segment name or a keyword used as one
    fn expect_ident(&mut self) -> ParseResult<NodeId> {
        let span = self.peek_span();
        let text = self.expect_ident_text()?;
        Ok(self.tree.alloc(NodeKind::Identifier(Identifier::new(text)), span))
    }

    fn expect_ident_text(&mut self) -> ParseResult<String> {
        let span = self.peek_span();
        let text = match self.peek() {
            Token::Name(name) if !name.contains('\\') => name.clone(),
            // Keywords keep the case they were written in
            other if other.keyword_text().is_some() => {
                self.source[span.start..span.end].to_string()
            }
            other => {
                return Err(self.error(format!("expected identifier, found '{}'", other)));
            }
        };
        self.advance();
        Ok(text)
    }

    fn expect_name(&mut self, context: NameContext) -> ParseResult<NodeId> {
        match self.peek().clone() {
            Token::Name(text) => {
                let span = self.peek_span();
                self.advance();
                Ok(self.alloc_name(&text, context, span))
            }
            other => Err(self.error(format!("expected name, found '{}'", other))),
        }
    }

    fn alloc_name(&mut self, text: &str, context: NameContext, span: Span) -> NodeId {
        self.tree
            .alloc(NodeKind::Name(Name::parse(text, context)), span)
    }

    // === Statements ===

    fn parse_source_file(&mut self) -> ParseResult<()> {
        while !self.is_at_end() {
            if self.is_namespace_decl() {
                let id = self.parse_namespace()?;
                self.tree.push_stmt(id);
            } else if let Some(id) = self.parse_stmt()? {
                self.tree.push_stmt(id);
            }
        }
        Ok(())
    }

    /// `namespace Foo;` / `namespace Foo {` / `namespace {`, as opposed to `namespace\foo()`
    fn is_namespace_decl(&self) -> bool {
        if !self.check(&Token::Namespace) {
            return false;
        }
        match self.peek_nth(1) {
            Token::Name(name) => !name.starts_with('\\'),
            Token::LBrace => true,
            _ => false,
        }
    }

    fn parse_namespace(&mut self) -> ParseResult<NodeId> {
        let start = self.peek_span();
        self.expect(Token::Namespace)?;

        let name = if matches!(self.peek(), Token::Name(_)) {
            Some(self.expect_name(NameContext::Namespace)?)
        } else {
            None
        };

        let mut stmts = Vec::new();
        let braced = self.eat(&Token::LBrace);
        if braced {
            while !self.check(&Token::RBrace) && !self.is_at_end() {
                if let Some(id) = self.parse_stmt()? {
                    stmts.push(id);
                }
            }
            self.expect(Token::RBrace)?;
        } else {
            self.expect(Token::Semi)?;
            // An unbraced namespace runs until the next namespace statement
            while !self.is_at_end() && !self.is_namespace_decl() {
                if let Some(id) = self.parse_stmt()? {
                    stmts.push(id);
                }
            }
        }

        let span = start.to(self.last_span());
        Ok(self.tree.alloc(
            NodeKind::Namespace(NamespaceStmt {
                name,
                stmts,
                braced,
            }),
            span,
        ))
    }

    fn parse_stmt(&mut self) -> ParseResult<Option<NodeId>> {
        match self.peek() {
            Token::OpenTag | Token::CloseTag | Token::Semi => {
                self.advance();
                Ok(None)
            }
            Token::Namespace if self.is_namespace_decl() => {
                Err(self.error("nested namespace declarations are not allowed".to_string()))
            }
            Token::Use => self.parse_use().map(Some),
            Token::AttrOpen => {
                let attributes = self.parse_attributes()?;
                if self.is_class_like_start() {
                    self.parse_class_like(attributes).map(Some)
                } else if self.check(&Token::Function) {
                    self.parse_function(attributes, false).map(Some)
                } else {
                    // Attributes on a closure or arrow function expression
                    let code = self.parse_code_stmt()?;
                    Ok(Some(self.merge_code(attributes, code)))
                }
            }
            Token::Function if self.is_named_function() => {
                self.parse_function(Vec::new(), false).map(Some)
            }
            _ if self.is_class_like_start() => self.parse_class_like(Vec::new()).map(Some),
            _ => self.parse_code_stmt().map(Some),
        }
    }

    fn is_named_function(&self) -> bool {
        match self.peek_nth(1) {
            Token::Amp => !matches!(self.peek_nth(2), Token::LParen),
            Token::LParen => false,
            _ => true,
        }
    }

    fn is_class_like_start(&self) -> bool {
        let mut n = 0;
        while matches!(self.peek_nth(n), Token::Abstract | Token::Final | Token::Readonly) {
            n += 1;
        }
        match self.peek_nth(n) {
            Token::Class | Token::Interface | Token::Trait | Token::Enum => {
                matches!(self.peek_nth(n + 1), Token::Name(_))
            }
            _ => false,
        }
    }

    /// `use [function|const] A\B [as C], D;`
    fn parse_use(&mut self) -> ParseResult<NodeId> {
        let start = self.peek_span();
        self.expect(Token::Use)?;

        let kind = if self.eat(&Token::Function) {
            UseKind::Function
        } else if self.eat(&Token::Const) {
            UseKind::Const
        } else {
            UseKind::Class
        };

        let mut items = Vec::new();
        loop {
            let name = self.expect_name(NameContext::Import(kind))?;
            if self.check(&Token::LBrace) {
                return Err(self.error("group use declarations are not supported".to_string()));
            }
            let alias = if self.eat(&Token::As) {
                Some(self.expect_ident_text()?)
            } else {
                None
            };
            items.push(UseItem { name, alias });

            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::Semi)?;

        let span = start.to(self.last_span());
        Ok(self.tree.alloc(NodeKind::Use(UseStmt { kind, items }), span))
    }

    /// `#[A, B(args)] #[C]`, one code node per attribute group
    fn parse_attributes(&mut self) -> ParseResult<Vec<NodeId>> {
        let mut groups = Vec::new();
        while self.check(&Token::AttrOpen) {
            let start = self.peek_span();
            self.advance();
            let mut names = Vec::new();
            loop {
                names.push(self.expect_name(NameContext::Class)?);
                if self.eat(&Token::LParen) {
                    names.extend(self.scan_code(|t| matches!(t, Token::RParen), false)?);
                    self.expect(Token::RParen)?;
                }
                if !self.eat(&Token::Comma) || self.check(&Token::RBracket) {
                    break;
                }
            }
            self.expect(Token::RBracket)?;
            let span = start.to(self.last_span());
            groups.push(self.tree.alloc(NodeKind::Code(names), span));
        }
        Ok(groups)
    }

    fn skip_modifiers(&mut self) {
        while self.peek().is_modifier() {
            self.advance();
        }
    }

    fn parse_class_like(&mut self, attributes: Vec<NodeId>) -> ParseResult<NodeId> {
        let start = self.peek_span();
        self.skip_modifiers();

        let kind = match self.peek() {
            Token::Class => ClassKind::Class,
            Token::Interface => ClassKind::Interface,
            Token::Trait => ClassKind::Trait,
            Token::Enum => ClassKind::Enum,
            other => {
                let message = format!("expected class-like declaration, found '{}'", other);
                return Err(self.error(message));
            }
        };
        self.advance();

        let name = Some(self.expect_ident()?);

        let backing = if kind == ClassKind::Enum && self.eat(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let extends = if self.eat(&Token::Extends) {
            self.parse_name_list()?
        } else {
            Vec::new()
        };
        let implements = if self.eat(&Token::Implements) {
            self.parse_name_list()?
        } else {
            Vec::new()
        };

        self.expect(Token::LBrace)?;
        let mut members = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            if let Some(member) = self.parse_member()? {
                members.push(member);
            }
        }
        self.expect(Token::RBrace)?;

        let span = start.to(self.last_span());
        Ok(self.tree.alloc(
            NodeKind::ClassLike(ClassLikeDecl {
                kind,
                attributes,
                name,
                backing,
                extends,
                implements,
                members,
            }),
            span,
        ))
    }

    fn parse_name_list(&mut self) -> ParseResult<Vec<NodeId>> {
        let mut names = vec![self.expect_name(NameContext::Class)?];
        while self.eat(&Token::Comma) {
            names.push(self.expect_name(NameContext::Class)?);
        }
        Ok(names)
    }

    fn parse_member(&mut self) -> ParseResult<Option<NodeId>> {
        let attributes = self.parse_attributes()?;
        let start = self.peek_span();

        match self.peek() {
            Token::Semi => {
                self.advance();
                return Ok(None);
            }
            Token::Use => {
                self.advance();
                let mut names = self.parse_name_list()?;
                if self.eat(&Token::LBrace) {
                    names.extend(self.scan_code(|_| false, false)?);
                    self.expect(Token::RBrace)?;
                } else {
                    self.expect(Token::Semi)?;
                }
                let span = start.to(self.last_span());
                return Ok(Some(self.tree.alloc(NodeKind::TraitUse(names), span)));
            }
            Token::Case => {
                self.advance();
                self.expect_ident_text()?;
                let mut names = attributes;
                if self.eat(&Token::Eq) {
                    names.extend(self.scan_code(|t| matches!(t, Token::Semi), false)?);
                }
                self.expect(Token::Semi)?;
                let span = start.to(self.last_span());
                return Ok(Some(self.tree.alloc(NodeKind::Code(names), span)));
            }
            _ => {}
        }

        self.skip_modifiers();
        match self.peek() {
            Token::Function => self.parse_function(attributes, true).map(Some),
            Token::Const => {
                self.advance();
                let mut names = attributes;
                names.extend(self.scan_code(|t| matches!(t, Token::Semi), false)?);
                self.expect(Token::Semi)?;
                let span = start.to(self.last_span());
                Ok(Some(self.tree.alloc(NodeKind::Code(names), span)))
            }
            _ => self.parse_property(attributes, start).map(Some),
        }
    }

    fn parse_property(&mut self, attributes: Vec<NodeId>, start: Span) -> ParseResult<NodeId> {
        let ty = if matches!(self.peek(), Token::Variable(_)) {
            None
        } else {
            Some(self.parse_type()?)
        };

        let mut vars = Vec::new();
        let mut defaults = Vec::new();
        loop {
            match self.peek().clone() {
                Token::Variable(var) => {
                    self.advance();
                    vars.push(var);
                }
                other => {
                    let message = format!("expected property variable, found '{}'", other);
                    return Err(self.error(message));
                }
            }
            if self.check(&Token::Eq) {
                let value_start = self.advance().span;
                let names = self.scan_code(|t| matches!(t, Token::Comma | Token::Semi), false)?;
                let span = value_start.to(self.last_span());
                defaults.push(self.tree.alloc(NodeKind::Code(names), span));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::Semi)?;

        let span = start.to(self.last_span());
        Ok(self.tree.alloc(
            NodeKind::Property(Property {
                attributes,
                ty,
                vars,
                defaults,
            }),
            span,
        ))
    }

    fn parse_function(&mut self, attributes: Vec<NodeId>, is_method: bool) -> ParseResult<NodeId> {
        let start = self.peek_span();
        self.expect(Token::Function)?;
        self.eat(&Token::Amp);

        let name = self.expect_ident()?;
        let params = self.parse_params()?;

        let return_type = if self.eat(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = if self.check(&Token::LBrace) {
            Some(self.parse_body()?)
        } else {
            self.expect(Token::Semi)?;
            None
        };

        let decl = FunctionDecl {
            attributes,
            name,
            params,
            return_type,
            body,
        };
        let kind = if is_method {
            NodeKind::Method(decl)
        } else {
            NodeKind::Function(decl)
        };
        let span = start.to(self.last_span());
        Ok(self.tree.alloc(kind, span))
    }

    fn parse_params(&mut self) -> ParseResult<Vec<NodeId>> {
        self.expect(Token::LParen)?;

        let mut params = Vec::new();
        while !self.check(&Token::RParen) && !self.is_at_end() {
            params.push(self.parse_param()?);
            if !self.check(&Token::RParen) {
                self.expect(Token::Comma)?;
            }
        }

        self.expect(Token::RParen)?;
        Ok(params)
    }

    fn parse_param(&mut self) -> ParseResult<NodeId> {
        let attributes = self.parse_attributes()?;
        let start = self.peek_span();
        // Promoted constructor parameters carry visibility modifiers
        self.skip_modifiers();

        let ty = if matches!(self.peek(), Token::Variable(_) | Token::Amp | Token::Ellipsis) {
            None
        } else {
            Some(self.parse_type()?)
        };
        self.eat(&Token::Amp);
        self.eat(&Token::Ellipsis);

        let var = match self.peek().clone() {
            Token::Variable(var) => {
                self.advance();
                var
            }
            other => {
                let message = format!("expected parameter variable, found '{}'", other);
                return Err(self.error(message));
            }
        };

        let default = if self.check(&Token::Eq) {
            let value_start = self.advance().span;
            let names = self.scan_code(|t| matches!(t, Token::Comma | Token::RParen), false)?;
            let span = value_start.to(self.last_span());
            Some(self.tree.alloc(NodeKind::Code(names), span))
        } else {
            None
        };

        let span = start.to(self.last_span());
        Ok(self.tree.alloc(
            NodeKind::Param(Param {
                attributes,
                ty,
                var,
                default,
            }),
            span,
        ))
    }

    /// `?A`, `A|B|null`, `(A&B)|C`, `static`
    fn parse_type(&mut self) -> ParseResult<NodeId> {
        let start = self.peek_span();
        let mut parts = Vec::new();
        let mut groups = 0usize;

        loop {
            self.eat(&Token::Question);
            while self.eat(&Token::LParen) {
                groups += 1;
            }

            let span = self.peek_span();
            match self.peek().clone() {
                Token::Name(text) if is_builtin_type(&text) => {
                    self.advance();
                    let ident = Identifier::new(text);
                    parts.push(self.tree.alloc(NodeKind::Identifier(ident), span));
                }
                Token::Name(text) => {
                    self.advance();
                    parts.push(self.alloc_name(&text, NameContext::Class, span));
                }
                Token::Static => {
                    self.advance();
                    let ident = Identifier::new("static");
                    parts.push(self.tree.alloc(NodeKind::Identifier(ident), span));
                }
                other => return Err(self.error(format!("expected type, found '{}'", other))),
            }

            while groups > 0 && self.eat(&Token::RParen) {
                groups -= 1;
            }

            let is_union = self.check(&Token::Pipe);
            let is_intersection = self.check(&Token::Amp) && !self.amp_is_by_ref();
            if is_union || is_intersection {
                self.advance();
            } else {
                break;
            }
        }

        if groups > 0 {
            return Err(self.error("unclosed type group".to_string()));
        }

        let span = start.to(self.last_span());
        Ok(self.tree.alloc(NodeKind::Type(parts), span))
    }

    /// `A &$x` and `A &...$x` take the parameter by reference
    fn amp_is_by_ref(&self) -> bool {
        self.check(&Token::Amp)
            && matches!(self.peek_nth(1), Token::Variable(_) | Token::Ellipsis)
    }

    fn parse_body(&mut self) -> ParseResult<NodeId> {
        let start = self.peek_span();
        self.expect(Token::LBrace)?;
        let names = self.scan_code(|_| false, false)?;
        self.expect(Token::RBrace)?;
        let span = start.to(self.last_span());
        Ok(self.tree.alloc(NodeKind::Code(names), span))
    }

    /// Any statement that does not declare anything
    fn parse_code_stmt(&mut self) -> ParseResult<NodeId> {
        let start = self.peek_span();
        let before = self.pos;
        let names = self.scan_code(|t| matches!(t, Token::Semi), true)?;
        if self.pos == before {
            return Err(self.error(format!("unexpected '{}'", self.peek())));
        }
        self.eat(&Token::Semi);
        let span = start.to(self.last_span());
        Ok(self.tree.alloc(NodeKind::Code(names), span))
    }

    fn merge_code(&mut self, mut attributes: Vec<NodeId>, code: NodeId) -> NodeId {
        let span = self.tree.node(code).span;
        if let NodeKind::Code(names) = &self.tree.node(code).kind {
            attributes.extend(names.iter().copied());
        }
        self.tree.alloc(NodeKind::Code(attributes), span)
    }

    // === Code scanning ===

    /// Consume a balanced token region and collect the names it mentions.
    ///
    /// Stops before a token matching `stop` at depth zero, before an
    /// unmatched closing bracket, or (with `end_at_block`) right after a
    /// brace block that returns to depth zero.
    fn scan_code(
        &mut self,
        stop: impl Fn(&Token) -> bool,
        end_at_block: bool,
    ) -> ParseResult<Vec<NodeId>> {
        let mut names = Vec::new();
        let mut depth: usize = 0;

        while !self.is_at_end() {
            let token = self.peek().clone();
            if depth == 0 && stop(&token) {
                break;
            }
            match token {
                Token::LParen | Token::LBracket | Token::LBrace | Token::AttrOpen => {
                    depth += 1;
                    self.advance();
                }
                Token::RParen | Token::RBracket | Token::RBrace => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    self.advance();
                    if end_at_block && depth == 0 && token == Token::RBrace {
                        break;
                    }
                }
                Token::Catch if !self.after_member_access() => {
                    self.advance();
                    names.extend(self.scan_catch()?);
                }
                Token::Name(text) => {
                    let span = self.peek_span();
                    if let Some(context) = self.name_position(&text) {
                        names.push(self.alloc_name(&text, context, span));
                    }
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }

        Ok(names)
    }

    /// `catch (A | B $e)`; consumes the whole parenthesised clause
    fn scan_catch(&mut self) -> ParseResult<Vec<NodeId>> {
        let mut names = Vec::new();
        self.expect(Token::LParen)?;
        while !self.check(&Token::RParen) && !self.is_at_end() {
            match self.peek().clone() {
                Token::Name(text) => {
                    let span = self.peek_span();
                    names.push(self.alloc_name(&text, NameContext::Class, span));
                    self.advance();
                }
                Token::Pipe | Token::Variable(_) => {
                    self.advance();
                }
                other => {
                    return Err(self.error(format!("unexpected '{}' in catch clause", other)));
                }
            }
        }
        self.expect(Token::RParen)?;
        Ok(names)
    }

    fn after_member_access(&self) -> bool {
        matches!(
            self.previous(1),
            Some(Token::Arrow | Token::NullsafeArrow | Token::ColonColon)
        )
    }

    /// Classify the name under the cursor by the tokens around it
    fn name_position(&self, text: &str) -> Option<NameContext> {
        let lower = text.to_ascii_lowercase();
        let prev = self.previous(1);
        let next = self.peek_nth(1);

        if self.after_member_access() || matches!(prev, Some(Token::Function | Token::Const)) {
            return None;
        }
        if SPECIAL_CLASS_NAMES.contains(&lower.as_str())
            || RESERVED_WORDS.contains(&lower.as_str())
        {
            return None;
        }

        let after_class_keyword = matches!(
            prev,
            Some(Token::New | Token::Instanceof | Token::Extends | Token::Implements)
        );
        let before_class_use = matches!(next, Token::ColonColon | Token::Variable(_));
        let return_type = matches!(prev, Some(Token::Colon))
            && matches!(self.previous(2), Some(Token::RParen))
            && matches!(next, Token::LBrace | Token::FatArrow);

        if after_class_keyword || before_class_use || return_type {
            if is_builtin_type(text) {
                return None;
            }
            return Some(NameContext::Class);
        }

        if matches!(next, Token::LParen) {
            return Some(NameContext::Function);
        }

        None
    }
}

fn is_builtin_type(text: &str) -> bool {
    BUILTIN_TYPES.contains(&text.to_ascii_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tree: &SyntaxTree) -> Vec<(String, NameContext)> {
        tree.nodes()
            .filter_map(|node| match &node.kind {
                NodeKind::Name(name) => Some((name.to_string(), name.context)),
                _ => None,
            })
            .collect()
    }

    fn first<'a>(tree: &'a SyntaxTree, label: &str) -> &'a Node {
        tree.nodes()
            .find(|node| node.kind.label() == label)
            .unwrap_or_else(|| panic!("no {} node", label))
    }

    const THING_B: &str = r#"<?php


namespace Me\OtherModule;


use Me\Module\ThingA;

class ThingB
{
    /**
     * @var ThingA
     */
    private ThingA $thingA;

    public function __construct(ThingA $thingA)
    {
        $this->thingA = $thingA;
    }
}"#;

    #[test]
    fn test_parse_unbraced_namespace_owns_following_statements() {
        let tree = Parser::parse(THING_B).unwrap();

        assert_eq!(tree.stmts().len(), 1);
        let NodeKind::Namespace(ns) = &tree.node(tree.stmts()[0]).kind else {
            panic!("expected namespace");
        };
        assert!(!ns.braced);
        assert_eq!(ns.stmts.len(), 2);
        let ns_name = tree.name(ns.name.unwrap()).unwrap();
        assert_eq!(ns_name.to_string(), "Me\\OtherModule");
    }

    #[test]
    fn test_parse_collects_type_positions() {
        let tree = Parser::parse(THING_B).unwrap();

        assert_eq!(
            names(&tree),
            vec![
                ("Me\\OtherModule".to_string(), NameContext::Namespace),
                ("Me\\Module\\ThingA".to_string(), NameContext::Import(UseKind::Class)),
                ("ThingA".to_string(), NameContext::Class),
                ("ThingA".to_string(), NameContext::Class),
            ]
        );
    }

    #[test]
    fn test_name_spans_cover_written_text() {
        let tree = Parser::parse(THING_B).unwrap();

        for node in tree.nodes() {
            if let NodeKind::Name(name) = &node.kind {
                assert_eq!(&THING_B[node.span.start..node.span.end], name.to_string());
            }
        }
    }

    #[test]
    fn test_parse_braced_namespaces() {
        let source = "<?php namespace A { function f() {} } namespace { class G {} }";
        let tree = Parser::parse(source).unwrap();

        assert_eq!(tree.stmts().len(), 2);
        let NodeKind::Namespace(global) = &tree.node(tree.stmts()[1]).kind else {
            panic!("expected namespace");
        };
        assert!(global.braced);
        assert!(global.name.is_none());
        assert_eq!(global.stmts.len(), 1);
    }

    #[test]
    fn test_parse_class_header() {
        let source = "<?php final class A extends B implements C, \\D\\E {}";
        let tree = Parser::parse(source).unwrap();

        let NodeKind::ClassLike(class) = &first(&tree, "class-like").kind else {
            unreachable!();
        };
        assert_eq!(class.kind, ClassKind::Class);
        assert_eq!(tree.identifier(class.name.unwrap()).unwrap().name(), "A");
        assert_eq!(class.extends.len(), 1);
        assert_eq!(class.implements.len(), 2);
        assert!(tree.name(class.implements[1]).unwrap().is_fully_qualified());
    }

    #[test]
    fn test_parse_enum_with_backing_type() {
        let source = "<?php enum Suit: string implements HasLabel { case Hearts = 'H'; case Spades = 'S'; }";
        let tree = Parser::parse(source).unwrap();

        let NodeKind::ClassLike(class) = &first(&tree, "class-like").kind else {
            unreachable!();
        };
        assert_eq!(class.kind, ClassKind::Enum);
        assert!(class.backing.is_some());
        assert_eq!(class.members.len(), 2);
    }

    #[test]
    fn test_builtin_types_are_identifiers() {
        let source = "<?php function f(?int $a, string|Foo $b, self $c): void {}";
        let tree = Parser::parse(source).unwrap();

        assert_eq!(names(&tree), vec![("Foo".to_string(), NameContext::Class)]);
    }

    #[test]
    fn test_by_ref_and_variadic_params() {
        let source = "<?php function f(Foo &$a, Bar ...$rest, $plain = null) {}";
        let tree = Parser::parse(source).unwrap();

        let params: Vec<&Param> = tree
            .nodes()
            .filter_map(|node| match &node.kind {
                NodeKind::Param(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].var, "a");
        assert_eq!(params[1].var, "rest");
        assert!(params[2].ty.is_none());
        assert!(params[2].default.is_some());
    }

    #[test]
    fn test_dnf_type() {
        let source = "<?php function f((A&B)|null $x) {}";
        let tree = Parser::parse(source).unwrap();

        assert_eq!(
            names(&tree),
            vec![
                ("A".to_string(), NameContext::Class),
                ("B".to_string(), NameContext::Class),
            ]
        );
    }

    #[test]
    fn test_body_scanning_finds_class_and_function_positions() {
        let source = r#"<?php
function run() {
    $a = new Foo\Bar();
    $b = Baz::create();
    if ($a instanceof \Qux) { helper($a); }
    try { $a->method(); } catch (One | Two $e) {}
    $f = function (Typed $t): Ret { return isset($t); };
    echo CONSTANT;
}"#;
        let tree = Parser::parse(source).unwrap();
        let found: Vec<String> = names(&tree).into_iter().map(|(n, _)| n).collect();

        assert_eq!(
            found,
            vec!["Foo\\Bar", "Baz", "\\Qux", "helper", "One", "Two", "Typed", "Ret"]
        );
    }

    #[test]
    fn test_attributes_are_class_names() {
        let source = "<?php #[Route('/x', methods: [Method::GET])] function f() {}";
        let tree = Parser::parse(source).unwrap();
        let found: Vec<String> = names(&tree).into_iter().map(|(n, _)| n).collect();

        assert_eq!(found, vec!["Route", "Method"]);
    }

    #[test]
    fn test_members() {
        let source = r#"<?php class A {
    use T1, T2;
    const X = Other::Y;
    public static ?B $b = null, $c;
    abstract protected function m(C $c): D;
    public function __construct(private readonly E $e) {}
}"#;
        let tree = Parser::parse(source).unwrap();
        let NodeKind::ClassLike(class) = &first(&tree, "class-like").kind else {
            unreachable!();
        };
        let labels: Vec<&str> = class
            .members
            .iter()
            .map(|&id| tree.node(id).kind.label())
            .collect();

        assert_eq!(labels, vec!["trait-use", "code", "property", "method", "method"]);
        let found: Vec<String> = names(&tree).into_iter().map(|(n, _)| n).collect();
        assert_eq!(found, vec!["T1", "T2", "Other", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_statements_between_declarations() {
        let source = "<?php declare(strict_types=1); if (x()) { y(); } class A {} $z = new A;";
        let tree = Parser::parse(source).unwrap();

        assert_eq!(tree.stmts().len(), 4);
        assert_eq!(first(&tree, "class-like").kind.label(), "class-like");
    }

    #[test]
    fn test_use_function_and_alias() {
        let source = "<?php use function Foo\\bar as baz; use const Foo\\BAZ;";
        let tree = Parser::parse(source).unwrap();

        let NodeKind::Use(stmt) = &first(&tree, "use").kind else {
            unreachable!();
        };
        assert_eq!(stmt.kind, UseKind::Function);
        assert_eq!(stmt.items[0].alias.as_deref(), Some("baz"));
    }

    #[test]
    fn test_group_use_is_rejected() {
        assert!(Parser::parse("<?php use Foo\\{A, B};").is_err());
    }

    #[test]
    fn test_unbalanced_brace_is_an_error() {
        let err = Parser::parse("<?php }").unwrap_err();

        assert!(err.message.contains("unexpected"));
        assert_eq!(err.span, Span::new(6, 7));
    }

    #[test]
    fn test_method_named_like_keyword() {
        let source = "<?php class A { public function list() {} public function new() {} }";
        let tree = Parser::parse(source).unwrap();

        let methods = tree
            .nodes()
            .filter(|node| matches!(node.kind, NodeKind::Method(_)))
            .count();
        assert_eq!(methods, 2);
    }

    #[test]
    fn test_uppercase_keywords() {
        let source = "<?php NAMESPACE Me; Class A Extends Enum { Public Function New() {} }";
        let tree = Parser::parse(source).unwrap();

        let NodeKind::ClassLike(class) = &first(&tree, "class-like").kind else {
            unreachable!();
        };
        assert_eq!(tree.identifier(class.name.unwrap()).unwrap().name(), "A");
        let parent = tree.name(class.extends[0]).unwrap();
        assert_eq!(parent.resolved.as_ref().unwrap().join("\\"), "Me\\Enum");
        let NodeKind::Method(method) = &first(&tree, "method").kind else {
            unreachable!();
        };
        assert_eq!(tree.identifier(method.name).unwrap().name(), "New");
    }
}
