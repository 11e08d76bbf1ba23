//! Event-based parser for Rill.
//!
//! The parser consumes a token stream and produces events (Open/Close/Advance)
//! that are later converted into a rowan green tree. This decouples parsing
//! logic from tree construction.
//!
//! # Architecture
//!
//! 1. Parse functions call `open()` to start a node, `advance()` to consume
//!    tokens, and `close()` to finish a node with its actual kind.
//! 2. Events are collected into a flat `Vec<Event>`.
//! 3. `build_tree()` converts events into a rowan `GreenNode`.
//!
//! The `open_before()` method enables wrapping a previously completed node
//! (e.g., turning `ident` into `call_expr(ident, arg_list)`) using the
//! "forward parent" technique.
//!
//! # Trivia
//!
//! Whitespace and comments are skipped by lookahead. `advance()` emits them
//! ahead of the significant token, and `open()` flushes pending trivia first
//! so that every node starts at a significant token. Trivia between two
//! siblings therefore lives in their parent.
//!
//! # Recovery
//!
//! Parsing never stops at the first error. Every loop that consumes a list
//! of statements, parameters, or fields checks that it made progress and
//! otherwise wraps the offending token in an `ERROR_NODE`.

pub(crate) mod expressions;
pub(crate) mod items;

use rill_common::span::Span;
use rill_common::token::{Token, TokenKind};

use crate::error::ParseError;
use crate::syntax_kind::SyntaxKind;

/// Nesting limit for blocks and expressions. Deeper input is reported as an
/// error instead of recursing further.
const MAX_DEPTH: u32 = 128;

/// A parser event. Events are collected during parsing and later converted
/// into a rowan green tree by [`Parser::build_tree`].
#[derive(Debug)]
enum Event {
    /// Start a new CST node. The `kind` is initially TOMBSTONE and gets
    /// patched by `close()` with the real node kind.
    ///
    /// `forward_parent` is used by `open_before()` to indicate that this
    /// node should be opened before the node at the specified event index.
    Open {
        kind: SyntaxKind,
        forward_parent: Option<usize>,
    },
    /// Finish the current CST node.
    Close,
    /// Consume the next token, trivia included.
    Advance,
}

/// An opaque marker for a started but not-yet-closed CST node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MarkOpened {
    index: usize,
}

/// An opaque marker for a completed (opened and closed) CST node.
/// Used by `open_before()` to wrap a previously completed node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MarkClosed {
    index: usize,
}

/// Event-based parser for Rill source code.
pub(crate) struct Parser<'src> {
    /// All tokens from the lexer, trivia included, ending with `Eof`.
    tokens: Vec<Token>,
    /// Index of the next unconsumed token (may point at trivia).
    pos: usize,
    events: Vec<Event>,
    source: &'src str,
    errors: Vec<ParseError>,
    /// Current block/expression nesting.
    depth: u32,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(tokens: Vec<Token>, source: &'src str) -> Self {
        Self {
            tokens,
            pos: 0,
            events: Vec::new(),
            source,
            errors: Vec::new(),
            depth: 0,
        }
    }

    // ── Lookahead ──────────────────────────────────────────────────────

    /// Kind of the current significant token, `EOF` past the end.
    pub(crate) fn current(&self) -> SyntaxKind {
        self.nth(0)
    }

    /// Kind of the Nth significant token ahead. Trivia is skipped.
    pub(crate) fn nth(&self, n: usize) -> SyntaxKind {
        self.tokens
            .iter()
            .skip(self.pos)
            .filter(|t| !t.kind.is_trivia())
            .nth(n)
            .map_or(SyntaxKind::EOF, |t| SyntaxKind::from(t.kind))
    }

    /// Text of the current significant token.
    pub(crate) fn current_text(&self) -> &'src str {
        let pos = self.skip_trivia(self.pos);
        match self.tokens.get(pos) {
            Some(token) => &self.source[token.span.start as usize..token.span.end as usize],
            None => "",
        }
    }

    /// Span of the current significant token.
    pub(crate) fn current_span(&self) -> Span {
        let pos = self.skip_trivia(self.pos);
        match self.tokens.get(pos) {
            Some(token) => token.span,
            None => {
                let end = self.source.len() as u32;
                Span::new(end, end)
            }
        }
    }

    pub(crate) fn at(&self, kind: SyntaxKind) -> bool {
        self.current() == kind
    }

    pub(crate) fn at_any(&self, kinds: &[SyntaxKind]) -> bool {
        kinds.contains(&self.current())
    }

    /// Raw token position, used by loops to detect lack of progress.
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    // ── Mutation: node management ──────────────────────────────────────

    /// Start a new CST node after flushing pending trivia into the parent.
    pub(crate) fn open(&mut self) -> MarkOpened {
        self.eat_trivia();
        self.open_here()
    }

    /// Start a node without flushing trivia. Only the root node may do this,
    /// since it has no parent to hold leading trivia.
    pub(crate) fn open_root(&mut self) -> MarkOpened {
        self.open_here()
    }

    fn open_here(&mut self) -> MarkOpened {
        let mark = MarkOpened {
            index: self.events.len(),
        };
        self.events.push(Event::Open {
            kind: SyntaxKind::TOMBSTONE,
            forward_parent: None,
        });
        mark
    }

    /// Start a new CST node BEFORE a previously completed node.
    ///
    /// Instead of physically inserting into the events vec (which would
    /// invalidate indices), the completed node's Open event gets a
    /// `forward_parent` link to the new event.
    pub(crate) fn open_before(&mut self, completed: MarkClosed) -> MarkOpened {
        let mark = self.open_here();
        if let Event::Open { forward_parent, .. } = &mut self.events[completed.index] {
            *forward_parent = Some(mark.index);
        }
        mark
    }

    /// Close a CST node, patching its Open event with the actual kind.
    pub(crate) fn close(&mut self, m: MarkOpened, kind: SyntaxKind) -> MarkClosed {
        if let Event::Open { kind: slot_kind, .. } = &mut self.events[m.index] {
            *slot_kind = kind;
        }
        self.events.push(Event::Close);
        MarkClosed { index: m.index }
    }

    // ── Mutation: token consumption ────────────────────────────────────

    /// Consume pending trivia and then the current significant token.
    /// Does nothing at end of input.
    pub(crate) fn advance(&mut self) {
        self.eat_trivia();
        if self.pos < self.tokens.len() && self.tokens[self.pos].kind != TokenKind::Eof {
            self.events.push(Event::Advance);
            self.pos += 1;
        }
    }

    /// Consume pending trivia tokens only.
    pub(crate) fn eat_trivia(&mut self) {
        while self.pos < self.tokens.len() && self.tokens[self.pos].kind.is_trivia() {
            self.events.push(Event::Advance);
            self.pos += 1;
        }
    }

    /// Consume the current token wrapped in an ERROR_NODE.
    pub(crate) fn advance_with_error(&mut self, message: &str) {
        let m = self.open();
        self.error(message);
        self.advance();
        self.close(m, SyntaxKind::ERROR_NODE);
    }

    /// Consume `kind` or record "expected ..." without consuming.
    pub(crate) fn expect(&mut self, kind: SyntaxKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.error(&format!("expected {}, found {}", describe(kind), self.found()));
            false
        }
    }

    /// Consume `kind` if present.
    pub(crate) fn eat(&mut self, kind: SyntaxKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Human-readable description of the current token for messages.
    pub(crate) fn found(&self) -> String {
        match self.current() {
            SyntaxKind::EOF => "end of file".to_string(),
            SyntaxKind::IDENT => format!("identifier `{}`", self.current_text()),
            _ => format!("`{}`", self.current_text()),
        }
    }

    // ── Nesting ────────────────────────────────────────────────────────

    /// Enter a nested construct. Returns `false` (and reports) once the
    /// nesting limit is hit; the caller must then not recurse.
    pub(crate) fn enter(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            self.advance_with_error("nesting too deep");
            return false;
        }
        self.depth += 1;
        true
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Count one more node wrapped around an already parsed expression
    /// (`a + b` around `a`, `f()` around `f`). Unlike [`Parser::enter`] this
    /// reports nothing and consumes nothing at the limit.
    pub(crate) fn nest_left(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            return false;
        }
        self.depth += 1;
        true
    }

    /// Release `levels` counted by [`Parser::nest_left`].
    pub(crate) fn unnest(&mut self, levels: u32) {
        self.depth = self.depth.saturating_sub(levels);
    }

    // ── Error reporting ────────────────────────────────────────────────

    /// Record a parse error at the current token. A second error at the
    /// same position as the previous one is dropped.
    pub(crate) fn error(&mut self, message: &str) {
        let span = self.current_span();
        if self.errors.last().is_some_and(|e| e.span == span) {
            return;
        }
        self.errors.push(ParseError::new(message, span));
    }

    /// Record a parse error with a related span for additional context.
    pub(crate) fn error_with_related(&mut self, message: &str, related_span: Span, related_msg: &str) {
        let span = self.current_span();
        if self.errors.last().is_some_and(|e| e.span == span) {
            return;
        }
        self.errors
            .push(ParseError::with_related(message, span, related_msg, related_span));
    }

    fn skip_trivia(&self, mut pos: usize) -> usize {
        while pos < self.tokens.len() && self.tokens[pos].kind.is_trivia() {
            pos += 1;
        }
        pos
    }

    /// Whether the very first raw token (trivia included) has `kind`.
    pub(crate) fn starts_with(&self, kind: TokenKind) -> bool {
        self.tokens.first().is_some_and(|t| t.kind == kind)
    }

    /// Whether every token except `Eof` has been consumed.
    pub(crate) fn is_exhausted(&self) -> bool {
        self.tokens[self.pos..]
            .iter()
            .all(|t| t.kind == TokenKind::Eof)
    }

    // ── Tree building ──────────────────────────────────────────────────

    /// Convert collected events into a rowan `GreenNode` and errors.
    ///
    /// Forward parents: when `open_before(completed)` is called, the completed
    /// node's Open event gets a `forward_parent` link pointing to the wrapping
    /// Open event. During tree building, when we encounter such an Open, we
    /// follow the chain and open nodes outermost first. The wrapper Open
    /// events are then marked as TOMBSTONE so they are skipped later.
    pub(crate) fn build_tree(mut self) -> (rowan::GreenNode, Vec<ParseError>) {
        let mut builder = rowan::GreenNodeBuilder::new();
        let mut token_pos: usize = 0;
        let mut chain: Vec<SyntaxKind> = Vec::new();

        for i in 0..self.events.len() {
            match self.events[i] {
                Event::Open {
                    kind,
                    forward_parent: Some(_),
                } => {
                    chain.clear();
                    chain.push(kind);
                    let mut next = self.events[i].forward_parent();
                    while let Some(idx) = next {
                        chain.push(self.events[idx].kind());
                        next = self.events[idx].forward_parent();
                        self.events[idx] = Event::Open {
                            kind: SyntaxKind::TOMBSTONE,
                            forward_parent: None,
                        };
                    }
                    for &kind in chain.iter().rev() {
                        if kind != SyntaxKind::TOMBSTONE {
                            builder.start_node(rowan::SyntaxKind(kind as u16));
                        }
                    }
                }
                Event::Open { kind, .. } => {
                    if kind != SyntaxKind::TOMBSTONE {
                        builder.start_node(rowan::SyntaxKind(kind as u16));
                    }
                }
                Event::Close => builder.finish_node(),
                Event::Advance => {
                    if let Some(token) = self.tokens.get(token_pos) {
                        let kind = SyntaxKind::from(token.kind);
                        let text = &self.source[token.span.start as usize..token.span.end as usize];
                        builder.token(rowan::SyntaxKind(kind as u16), text);
                        token_pos += 1;
                    }
                }
            }
        }

        (builder.finish(), self.errors)
    }
}

impl Event {
    fn forward_parent(&self) -> Option<usize> {
        match self {
            Event::Open { forward_parent, .. } => *forward_parent,
            _ => None,
        }
    }

    fn kind(&self) -> SyntaxKind {
        match self {
            Event::Open { kind, .. } => *kind,
            _ => SyntaxKind::TOMBSTONE,
        }
    }
}

/// Spelling of a token kind for "expected ..." messages.
pub(crate) fn describe(kind: SyntaxKind) -> &'static str {
    match kind {
        SyntaxKind::L_PAREN => "`(`",
        SyntaxKind::R_PAREN => "`)`",
        SyntaxKind::L_BRACE => "`{`",
        SyntaxKind::R_BRACE => "`}`",
        SyntaxKind::L_BRACKET => "`[`",
        SyntaxKind::R_BRACKET => "`]`",
        SyntaxKind::SEMICOLON => "`;`",
        SyntaxKind::COLON => "`:`",
        SyntaxKind::COMMA => "`,`",
        SyntaxKind::EQ => "`=`",
        SyntaxKind::ARROW => "`->`",
        SyntaxKind::IDENT => "identifier",
        _ => "token",
    }
}

// ── Entry points ───────────────────────────────────────────────────────

/// Parse a complete source file into a `SOURCE_FILE` root.
pub(crate) fn parse_source_file(p: &mut Parser) {
    let root = p.open_root();

    while !p.at(SyntaxKind::EOF) {
        let before = p.pos();
        items::item(p);
        if p.pos() == before {
            let msg = format!("expected an item or statement, found {}", p.found());
            p.advance_with_error(&msg);
        }
    }

    // Trailing trivia belongs to the root.
    p.eat_trivia();
    p.close(root, SyntaxKind::SOURCE_FILE);
}

/// Parse text that must be exactly one `BLOCK`.
pub(crate) fn parse_block_fragment(p: &mut Parser) -> bool {
    if !p.starts_with(TokenKind::LBrace) {
        return false;
    }
    expressions::block(p);
    p.is_exhausted()
}

/// Parse text that must be exactly one struct `FIELD_LIST`.
pub(crate) fn parse_field_list_fragment(p: &mut Parser) -> bool {
    if !p.starts_with(TokenKind::LBrace) {
        return false;
    }
    items::field_list(p);
    p.is_exhausted()
}
