use serde::Serialize;

use crate::span::Span;

/// A token produced by the Rill lexer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    /// Create a new token from a kind and byte offsets.
    pub fn new(kind: TokenKind, start: u32, end: u32) -> Self {
        Self {
            kind,
            span: Span::new(start, end),
        }
    }
}

/// Every kind of token in the Rill language.
///
/// The lexer is lossless: whitespace and comments are tokens too, so the
/// concatenated token text always reproduces the source exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    // ── Keywords (11) ──────────────────────────────────────────────────
    Else,
    False,
    Fn,
    If,
    Let,
    Nil,
    Pub,
    Return,
    Struct,
    True,
    While,

    // ── Operators (17) ─────────────────────────────────────────────────
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `&&`
    AmpAmp,
    /// `||`
    PipePipe,
    /// `!`
    Bang,
    /// `=`
    Eq,
    /// `->`
    Arrow,
    /// `::`
    ColonColon,

    // ── Delimiters (6) ─────────────────────────────────────────────────
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,

    // ── Punctuation (4) ────────────────────────────────────────────────
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `:`
    Colon,
    /// `;`
    Semicolon,

    // ── Literals (3) ───────────────────────────────────────────────────
    /// Integer literal, e.g. `42`, `0xFF`, `1_000`.
    IntLiteral,
    /// Floating-point literal, e.g. `3.14`, `1.0e10`.
    FloatLiteral,
    /// Complete string literal including both quotes.
    StringLiteral,

    // ── Identifiers and trivia (3) ─────────────────────────────────────
    /// Regular identifier, e.g. `foo`, `my_var`.
    Ident,
    /// Line comment (`// ...`), without the trailing newline.
    Comment,
    /// A run of spaces, tabs, and line breaks.
    Whitespace,

    // ── Special (2) ────────────────────────────────────────────────────
    /// End of file.
    Eof,
    /// Invalid/unexpected input. Used for error recovery.
    Error,
}

impl TokenKind {
    /// Whether the parser's lookahead skips this kind.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// Whether this kind is a keyword.
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Else
                | TokenKind::False
                | TokenKind::Fn
                | TokenKind::If
                | TokenKind::Let
                | TokenKind::Nil
                | TokenKind::Pub
                | TokenKind::Return
                | TokenKind::Struct
                | TokenKind::True
                | TokenKind::While
        )
    }
}

/// Every keyword, in source spelling.
pub const KEYWORDS: &[&str] = &[
    "else", "false", "fn", "if", "let", "nil", "pub", "return", "struct", "true", "while",
];

/// Look up a keyword from its string representation.
///
/// Returns `Some(TokenKind)` if the string is a Rill keyword, `None` otherwise.
/// The lexer calls this to distinguish keywords from identifiers after scanning
/// an identifier-shaped token.
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    match s {
        "else" => Some(TokenKind::Else),
        "false" => Some(TokenKind::False),
        "fn" => Some(TokenKind::Fn),
        "if" => Some(TokenKind::If),
        "let" => Some(TokenKind::Let),
        "nil" => Some(TokenKind::Nil),
        "pub" => Some(TokenKind::Pub),
        "return" => Some(TokenKind::Return),
        "struct" => Some(TokenKind::Struct),
        "true" => Some(TokenKind::True),
        "while" => Some(TokenKind::While),
        _ => None,
    }
}
