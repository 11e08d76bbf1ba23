//! SyntaxKind enum for the Rill CST.
//!
//! This is a superset of `TokenKind` (mapped to SCREAMING_SNAKE_CASE) plus
//! composite node kinds for CST nodes produced by the parser.

use rill_common::token::TokenKind;

/// Every kind of syntax element in the Rill CST.
///
/// Token kinds (leaves) are mapped 1:1 from [`TokenKind`]. Composite node kinds
/// represent parser-produced tree nodes. The first two values are sentinels used
/// by the event-based parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum SyntaxKind {
    // ── Sentinels ──────────────────────────────────────────────────────
    /// Placeholder kind for incomplete/unfinished parser events.
    TOMBSTONE = 0,
    /// Wrapper for tokens/nodes that couldn't be parsed.
    ERROR_NODE = 1,

    // ── Keywords (11) ──────────────────────────────────────────────────
    ELSE_KW,
    FALSE_KW,
    FN_KW,
    IF_KW,
    LET_KW,
    NIL_KW,
    PUB_KW,
    RETURN_KW,
    STRUCT_KW,
    TRUE_KW,
    WHILE_KW,

    // ── Operators (17) ─────────────────────────────────────────────────
    PLUS,
    MINUS,
    STAR,
    SLASH,
    PERCENT,
    EQ_EQ,
    NOT_EQ,
    LT,
    GT,
    LT_EQ,
    GT_EQ,
    AMP_AMP,
    PIPE_PIPE,
    BANG,
    EQ,
    ARROW,
    COLON_COLON,

    // ── Delimiters (6) ─────────────────────────────────────────────────
    L_PAREN,
    R_PAREN,
    L_BRACKET,
    R_BRACKET,
    L_BRACE,
    R_BRACE,

    // ── Punctuation (4) ────────────────────────────────────────────────
    COMMA,
    DOT,
    COLON,
    SEMICOLON,

    // ── Literals (3) ───────────────────────────────────────────────────
    INT_LITERAL,
    FLOAT_LITERAL,
    STRING_LITERAL,

    // ── Identifiers and trivia (3) ─────────────────────────────────────
    IDENT,
    COMMENT,
    WHITESPACE,

    // ── Special (2) ────────────────────────────────────────────────────
    EOF,
    ERROR,

    // ── Composite nodes ────────────────────────────────────────────────
    /// Root node of a file.
    SOURCE_FILE,
    /// `fn name(params) -> T { ... }`
    FN_DEF,
    /// `struct Name { field: T, ... }`
    STRUCT_DEF,
    /// `let name: T = expr;`
    LET_STMT,
    /// `return expr;`
    RETURN_STMT,
    /// `while cond { ... }`
    WHILE_STMT,
    /// An expression used as a statement.
    EXPR_STMT,
    /// `pub` modifier on an item.
    VISIBILITY,
    /// `(a: Int, b)`
    PARAM_LIST,
    PARAM,
    /// `{ x: Int, y: Int }` in a struct definition.
    FIELD_LIST,
    FIELD,
    /// `: T` after a binding or field name.
    TYPE_ANNOTATION,
    /// `-> T` after a parameter list.
    RET_TYPE,
    /// Reference to a type by name.
    TYPE_REF,
    /// Declaring occurrence of an identifier.
    NAME,
    /// Using occurrence of an identifier.
    NAME_REF,
    /// `{ stmt* expr? }`
    BLOCK,
    IF_EXPR,
    /// `else` followed by a block or another `if`.
    ELSE_BRANCH,
    BINARY_EXPR,
    UNARY_EXPR,
    /// `target = value`
    ASSIGN_EXPR,
    CALL_EXPR,
    ARG_LIST,
    /// `expr.field`
    FIELD_ACCESS,
    PAREN_EXPR,
    LITERAL,
}

impl SyntaxKind {
    /// Whether this kind represents trivia (tokens that don't affect parsing).
    pub fn is_trivia(self) -> bool {
        matches!(self, SyntaxKind::WHITESPACE | SyntaxKind::COMMENT)
    }

    /// Token kinds whose text can change without changing the token kind's
    /// role in the tree. Edits confined to one of these may be relexed alone.
    pub fn is_relexable(self) -> bool {
        matches!(
            self,
            SyntaxKind::IDENT
                | SyntaxKind::INT_LITERAL
                | SyntaxKind::FLOAT_LITERAL
                | SyntaxKind::STRING_LITERAL
                | SyntaxKind::WHITESPACE
                | SyntaxKind::COMMENT
        )
    }

    /// Node kinds that the parser can reparse in isolation.
    pub fn is_reparsable_node(self) -> bool {
        matches!(self, SyntaxKind::BLOCK | SyntaxKind::FIELD_LIST)
    }
}

impl From<TokenKind> for SyntaxKind {
    fn from(kind: TokenKind) -> Self {
        match kind {
            // Keywords
            TokenKind::Else => SyntaxKind::ELSE_KW,
            TokenKind::False => SyntaxKind::FALSE_KW,
            TokenKind::Fn => SyntaxKind::FN_KW,
            TokenKind::If => SyntaxKind::IF_KW,
            TokenKind::Let => SyntaxKind::LET_KW,
            TokenKind::Nil => SyntaxKind::NIL_KW,
            TokenKind::Pub => SyntaxKind::PUB_KW,
            TokenKind::Return => SyntaxKind::RETURN_KW,
            TokenKind::Struct => SyntaxKind::STRUCT_KW,
            TokenKind::True => SyntaxKind::TRUE_KW,
            TokenKind::While => SyntaxKind::WHILE_KW,
            // Operators
            TokenKind::Plus => SyntaxKind::PLUS,
            TokenKind::Minus => SyntaxKind::MINUS,
            TokenKind::Star => SyntaxKind::STAR,
            TokenKind::Slash => SyntaxKind::SLASH,
            TokenKind::Percent => SyntaxKind::PERCENT,
            TokenKind::EqEq => SyntaxKind::EQ_EQ,
            TokenKind::NotEq => SyntaxKind::NOT_EQ,
            TokenKind::Lt => SyntaxKind::LT,
            TokenKind::Gt => SyntaxKind::GT,
            TokenKind::LtEq => SyntaxKind::LT_EQ,
            TokenKind::GtEq => SyntaxKind::GT_EQ,
            TokenKind::AmpAmp => SyntaxKind::AMP_AMP,
            TokenKind::PipePipe => SyntaxKind::PIPE_PIPE,
            TokenKind::Bang => SyntaxKind::BANG,
            TokenKind::Eq => SyntaxKind::EQ,
            TokenKind::Arrow => SyntaxKind::ARROW,
            TokenKind::ColonColon => SyntaxKind::COLON_COLON,
            // Delimiters
            TokenKind::LParen => SyntaxKind::L_PAREN,
            TokenKind::RParen => SyntaxKind::R_PAREN,
            TokenKind::LBracket => SyntaxKind::L_BRACKET,
            TokenKind::RBracket => SyntaxKind::R_BRACKET,
            TokenKind::LBrace => SyntaxKind::L_BRACE,
            TokenKind::RBrace => SyntaxKind::R_BRACE,
            // Punctuation
            TokenKind::Comma => SyntaxKind::COMMA,
            TokenKind::Dot => SyntaxKind::DOT,
            TokenKind::Colon => SyntaxKind::COLON,
            TokenKind::Semicolon => SyntaxKind::SEMICOLON,
            // Literals
            TokenKind::IntLiteral => SyntaxKind::INT_LITERAL,
            TokenKind::FloatLiteral => SyntaxKind::FLOAT_LITERAL,
            TokenKind::StringLiteral => SyntaxKind::STRING_LITERAL,
            // Identifiers and trivia
            TokenKind::Ident => SyntaxKind::IDENT,
            TokenKind::Comment => SyntaxKind::COMMENT,
            TokenKind::Whitespace => SyntaxKind::WHITESPACE,
            // Special
            TokenKind::Eof => SyntaxKind::EOF,
            TokenKind::Error => SyntaxKind::ERROR,
        }
    }
}
