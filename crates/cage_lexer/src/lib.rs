use logos::Logos;
use thiserror::Error;

/// Span in source code (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A token with its span
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"#([^\[\n][^\n]*)?")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token {
    #[token("<?php", ignore(ascii_case))]
    OpenTag,
    #[token("?>")]
    CloseTag,

    // === Keywords ===
    // Case-insensitive, like PHP's own
    #[token("namespace", ignore(ascii_case))]
    Namespace,
    #[token("use", ignore(ascii_case))]
    Use,
    #[token("class", ignore(ascii_case))]
    Class,
    #[token("interface", ignore(ascii_case))]
    Interface,
    #[token("trait", ignore(ascii_case))]
    Trait,
    /// Contextual in PHP: `Enum` and `Readonly` stay usable as class names
    #[token("enum")]
    Enum,
    #[token("function", ignore(ascii_case))]
    Function,
    #[token("fn", ignore(ascii_case))]
    Fn,
    #[token("extends", ignore(ascii_case))]
    Extends,
    #[token("implements", ignore(ascii_case))]
    Implements,
    #[token("new", ignore(ascii_case))]
    New,
    #[token("instanceof", ignore(ascii_case))]
    Instanceof,
    #[token("catch", ignore(ascii_case))]
    Catch,
    #[token("const", ignore(ascii_case))]
    Const,
    #[token("case", ignore(ascii_case))]
    Case,
    #[token("as", ignore(ascii_case))]
    As,
    #[token("abstract", ignore(ascii_case))]
    Abstract,
    #[token("final", ignore(ascii_case))]
    Final,
    #[token("readonly")]
    Readonly,
    #[token("public", ignore(ascii_case))]
    Public,
    #[token("protected", ignore(ascii_case))]
    Protected,
    #[token("private", ignore(ascii_case))]
    Private,
    #[token("static", ignore(ascii_case))]
    Static,
    #[token("var", ignore(ascii_case))]
    Var,

    // === Names and literals ===
    /// A possibly qualified name; a leading `\` makes it fully qualified
    #[regex(r"\\?[a-zA-Z_][a-zA-Z0-9_]*(\\[a-zA-Z_][a-zA-Z0-9_]*)*", |lex| lex.slice().to_string())]
    Name(String),

    #[regex(r"\$[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_string())]
    Variable(String),

    #[regex(r#""([^"\\]|\\.)*""#)]
    #[regex(r"'([^'\\]|\\.)*'")]
    StringLiteral,

    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?")]
    NumberLiteral,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("#[")]
    AttrOpen,

    // === Punctuation ===
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token("::")]
    ColonColon,
    #[token(":")]
    Colon,
    #[token("?")]
    Question,
    #[token("->")]
    Arrow,
    #[token("?->")]
    NullsafeArrow,
    #[token("=>")]
    FatArrow,
    #[token("=")]
    Eq,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("...")]
    Ellipsis,
    #[token("$")]
    Dollar,

    /// Operators that never take part in name positions
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("%")]
    #[token(".")]
    #[token("!")]
    #[token("<")]
    #[token(">")]
    #[token("^")]
    #[token("~")]
    #[token("@")]
    Op,

    // === Special ===
    Eof,
}

impl Token {
    /// Keyword text for tokens that may double as identifiers (method names, constants)
    pub fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            Token::Namespace => "namespace",
            Token::Use => "use",
            Token::Class => "class",
            Token::Interface => "interface",
            Token::Trait => "trait",
            Token::Enum => "enum",
            Token::Function => "function",
            Token::Fn => "fn",
            Token::Extends => "extends",
            Token::Implements => "implements",
            Token::New => "new",
            Token::Instanceof => "instanceof",
            Token::Catch => "catch",
            Token::Const => "const",
            Token::Case => "case",
            Token::As => "as",
            Token::Abstract => "abstract",
            Token::Final => "final",
            Token::Readonly => "readonly",
            Token::Public => "public",
            Token::Protected => "protected",
            Token::Private => "private",
            Token::Static => "static",
            Token::Var => "var",
            _ => return None,
        };
        Some(text)
    }

    /// Declaration modifiers that may precede a class-like or a member
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            Token::Abstract
                | Token::Final
                | Token::Readonly
                | Token::Public
                | Token::Protected
                | Token::Private
                | Token::Static
                | Token::Var
        )
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(text) = self.keyword_text() {
            return write!(f, "{}", text);
        }
        match self {
            Token::OpenTag => write!(f, "<?php"),
            Token::CloseTag => write!(f, "?>"),
            Token::Name(s) => write!(f, "{}", s),
            Token::Variable(s) => write!(f, "${}", s),
            Token::StringLiteral => write!(f, "string literal"),
            Token::NumberLiteral => write!(f, "number literal"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::AttrOpen => write!(f, "#["),
            Token::Semi => write!(f, ";"),
            Token::Comma => write!(f, ","),
            Token::ColonColon => write!(f, "::"),
            Token::Colon => write!(f, ":"),
            Token::Question => write!(f, "?"),
            Token::Arrow => write!(f, "->"),
            Token::NullsafeArrow => write!(f, "?->"),
            Token::FatArrow => write!(f, "=>"),
            Token::Eq => write!(f, "="),
            Token::Amp => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::Ellipsis => write!(f, "..."),
            Token::Dollar => write!(f, "$"),
            Token::Op => write!(f, "operator"),
            Token::Eof => write!(f, "EOF"),
            _ => unreachable!("keywords are handled above"),
        }
    }
}

/// Lexer wrapper that produces SpannedTokens
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, Token>,
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            inner: Token::lexer(source),
            finished: false,
        }
    }

    /// Tokenize the entire source into a Vec
    pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, LexError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();

        loop {
            let spanned = lexer.next_token()?;
            let is_eof = spanned.token == Token::Eof;
            tokens.push(spanned);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<SpannedToken, LexError> {
        if self.finished {
            let len = self.inner.source().len();
            return Ok(SpannedToken {
                token: Token::Eof,
                span: Span::new(len, len),
            });
        }

        match self.inner.next() {
            Some(Ok(token)) => {
                let span = self.inner.span();
                Ok(SpannedToken {
                    token,
                    span: Span::new(span.start, span.end),
                })
            }
            Some(Err(())) => {
                let span = self.inner.span();
                Err(LexError {
                    message: format!("unexpected character: '{}'", self.inner.slice()),
                    span: Span::new(span.start, span.end),
                })
            }
            None => {
                self.finished = true;
                let len = self.inner.source().len();
                Ok(SpannedToken {
                    token: Token::Eof,
                    span: Span::new(len, len),
                })
            }
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message} at {}..{}", span.start, span.end)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        Lexer::tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_namespace_statement() {
        let tokens = kinds("<?php namespace Me\\Module;");

        assert_eq!(
            tokens,
            vec![
                Token::OpenTag,
                Token::Namespace,
                Token::Name("Me\\Module".to_string()),
                Token::Semi,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_fully_qualified_name_keeps_leading_separator() {
        let tokens = kinds("new \\Me\\Module\\ThingA($x);");

        assert_eq!(tokens[0], Token::New);
        assert_eq!(tokens[1], Token::Name("\\Me\\Module\\ThingA".to_string()));
        assert_eq!(tokens[3], Token::Variable("x".to_string()));
    }

    #[test]
    fn test_comments_are_skipped() {
        let source = "<?php\n// line\n# hash\n/** @var ThingA */\nclass A {}";
        let tokens = kinds(source);

        assert_eq!(
            tokens,
            vec![
                Token::OpenTag,
                Token::Class,
                Token::Name("A".to_string()),
                Token::LBrace,
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_attribute_open_is_not_a_comment() {
        let tokens = kinds("#[Route('/')] function a() {}");

        assert_eq!(tokens[0], Token::AttrOpen);
        assert_eq!(tokens[1], Token::Name("Route".to_string()));
    }

    #[test]
    fn test_spans_point_into_source() {
        let source = "<?php use Foo\\Bar;";
        let tokens = Lexer::tokenize(source).unwrap();
        let name = &tokens[2];

        assert_eq!(&source[name.span.start..name.span.end], "Foo\\Bar");
    }

    #[test]
    fn test_keywords_win_over_names() {
        let tokens = kinds("classes class");

        assert_eq!(tokens[0], Token::Name("classes".to_string()));
        assert_eq!(tokens[1], Token::Class);
    }

    #[test]
    fn test_keywords_ignore_case() {
        let tokens = kinds("<?PHP NAMESPACE A; Use B; Class C EXTENDS D {}");

        assert_eq!(tokens[0], Token::OpenTag);
        assert_eq!(tokens[1], Token::Namespace);
        assert_eq!(tokens[4], Token::Use);
        assert_eq!(tokens[7], Token::Class);
        assert_eq!(tokens[9], Token::Extends);
    }

    #[test]
    fn test_capitalized_enum_is_a_name() {
        let tokens = kinds("enum Enum");

        assert_eq!(tokens[0], Token::Enum);
        assert_eq!(tokens[1], Token::Name("Enum".to_string()));
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::tokenize("<?php `ls`;").unwrap_err();

        assert_eq!(err.span, Span::new(6, 7));
    }
}
