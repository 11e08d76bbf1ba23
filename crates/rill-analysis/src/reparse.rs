//! Incremental Parser Adapter.
//!
//! Produces a new syntax tree from the previous tree and a single text edit.
//! Three strategies are tried, cheapest first:
//!
//! 1. **Token relex.** The edit lies inside one identifier, literal,
//!    whitespace or comment token, and relexing a small window around it
//!    gives the same token kinds. Only that token's green leaf is replaced.
//! 2. **Block reparse.** The edit lies strictly inside the braces of a
//!    `BLOCK` or `FIELD_LIST`, and that node's new text still parses as
//!    exactly one node of the same kind. Only that subtree is replaced.
//! 3. **Full reparse.** Everything else, and any edit covering more than
//!    [`ReparsePolicy::full_reparse_threshold`] of the document.
//!
//! Every strategy yields a tree structurally identical to `parse(new_text)`;
//! the incremental ones just reuse the untouched green subtrees.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use rill_common::span::Span;
use rill_common::token::TokenKind;
use rill_lexer::Lexer;
use rill_parser::{
    GreenNode, ParseError, SyntaxKind, SyntaxNode, SyntaxToken, TextRange, TextSize,
};
use rowan::{GreenNodeBuilder, GreenToken, NodeOrToken, TokenAtOffset, WalkEvent};

use crate::diagnostics::{SyntaxDiagnostic, SyntaxDiagnosticKind};
use crate::document::TextEdit;
use crate::error::AnalysisError;

/// Nesting allowed for a spliced block, counted from the root. Kept below
/// the parser's own nesting limit so a spliced fragment can never differ
/// from what a full parse would report.
const MAX_SPLICE_DEPTH: usize = 120;

/// Lossless syntax tree plus the errors found while building it.
///
/// Cheap to clone: the green tree and the errors are shared.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    green: GreenNode,
    errors: Arc<[ParseError]>,
}

impl SyntaxTree {
    pub fn new(green: GreenNode, errors: Vec<ParseError>) -> Self {
        Self {
            green,
            errors: errors.into(),
        }
    }

    /// Full parse of `text`.
    pub fn parse(text: &str) -> Self {
        let (green, errors) = rill_parser::parse(text).into_parts();
        Self::new(green, errors)
    }

    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    pub fn green(&self) -> &GreenNode {
        &self.green
    }

    /// Lexer and parser errors in source order.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn text_len(&self) -> TextSize {
        self.green.text_len()
    }

    pub fn diagnostics(&self) -> Vec<SyntaxDiagnostic> {
        self.errors
            .iter()
            .map(SyntaxDiagnostic::from_parse_error)
            .collect()
    }
}

/// When the adapter gives up on incremental strategies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReparsePolicy {
    /// Fraction of the document an edit may replace before a full reparse
    /// is forced.
    pub full_reparse_threshold: f64,
}

impl Default for ReparsePolicy {
    fn default() -> Self {
        Self {
            full_reparse_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReparseStrategy {
    /// The edit was empty; the previous tree was reused as is.
    Unchanged,
    TokenRelex,
    BlockReparse,
    FullReparse,
    /// The parser failed and a placeholder tree was produced.
    Recovered,
}

/// How much work a reparse did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReparseStats {
    pub strategy: ReparseStrategy,
    /// Tokens fed through the lexer to validate a relex.
    pub relexed_tokens: usize,
    /// Bytes handed to the parser (fragment or whole document).
    pub reparsed_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct Reparsed {
    pub tree: SyntaxTree,
    pub diagnostics: Vec<SyntaxDiagnostic>,
    pub stats: ReparseStats,
}

/// Build the tree for `new_text`.
///
/// `previous` is the tree of the text `edit` was computed against. Without
/// both, the document is parsed from scratch. A panic inside the grammar
/// never escapes: it becomes an [`SyntaxDiagnosticKind::AnalysisFailure`]
/// diagnostic over a placeholder tree.
pub fn reparse(
    previous: Option<&SyntaxTree>,
    edit: Option<&TextEdit>,
    new_text: &str,
    policy: &ReparsePolicy,
) -> Reparsed {
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        reparse_inner(previous, edit, new_text, policy)
    }));

    let (tree, stats) = match result {
        Ok(done) => done,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let error = AnalysisError { message };
            tracing::error!(%error, len = new_text.len(), "parser failed, using placeholder tree");
            return recovered(new_text, &error);
        }
    };

    tracing::debug!(
        strategy = ?stats.strategy,
        relexed_tokens = stats.relexed_tokens,
        reparsed_bytes = stats.reparsed_bytes,
        errors = tree.errors().len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "reparsed"
    );

    Reparsed {
        diagnostics: tree.diagnostics(),
        tree,
        stats,
    }
}

fn reparse_inner(
    previous: Option<&SyntaxTree>,
    edit: Option<&TextEdit>,
    new_text: &str,
    policy: &ReparsePolicy,
) -> (SyntaxTree, ReparseStats) {
    #[cfg(test)]
    if tests::FAIL_NEXT_PARSE.with(|fail| fail.replace(false)) {
        panic!("grammar invariant broken");
    }

    if let (Some(previous), Some(edit)) = (previous, edit) {
        let old_len = u32::from(previous.text_len()) as usize;
        let consistent = u32::from(edit.delete.end()) as usize <= old_len
            && old_len - usize::from(edit.delete.len()) + edit.insert.len() == new_text.len();

        if consistent {
            if edit.is_empty() {
                let stats = ReparseStats {
                    strategy: ReparseStrategy::Unchanged,
                    relexed_tokens: 0,
                    reparsed_bytes: 0,
                };
                return (previous.clone(), stats);
            }

            let changed = usize::from(edit.delete.len()).max(edit.insert.len());
            let fraction = changed as f64 / old_len.max(new_text.len()).max(1) as f64;
            if fraction <= policy.full_reparse_threshold {
                if let Some(done) = relex_token(previous, edit, new_text) {
                    return done;
                }
                if let Some(done) = reparse_block(previous, edit) {
                    return done;
                }
            }
        } else {
            tracing::warn!(
                old_len,
                new_len = new_text.len(),
                "edit does not match the previous tree, parsing from scratch"
            );
        }
    }

    let stats = ReparseStats {
        strategy: ReparseStrategy::FullReparse,
        relexed_tokens: 0,
        reparsed_bytes: new_text.len(),
    };
    (SyntaxTree::parse(new_text), stats)
}

fn recovered(new_text: &str, error: &AnalysisError) -> Reparsed {
    let mut builder = GreenNodeBuilder::new();
    builder.start_node(raw(SyntaxKind::SOURCE_FILE));
    if !new_text.is_empty() {
        builder.token(raw(SyntaxKind::ERROR), new_text);
    }
    builder.finish_node();

    let range = TextRange::up_to(TextSize::of(new_text));
    Reparsed {
        tree: SyntaxTree::new(builder.finish(), Vec::new()),
        diagnostics: vec![SyntaxDiagnostic {
            kind: SyntaxDiagnosticKind::AnalysisFailure,
            message: error.to_string(),
            range,
            related: None,
        }],
        stats: ReparseStats {
            strategy: ReparseStrategy::Recovered,
            relexed_tokens: 0,
            reparsed_bytes: new_text.len(),
        },
    }
}

fn raw(kind: SyntaxKind) -> rowan::SyntaxKind {
    rowan::SyntaxKind(kind as u16)
}

// ── Token relex ────────────────────────────────────────────────────────

fn relex_token(
    previous: &SyntaxTree,
    edit: &TextEdit,
    new_text: &str,
) -> Option<(SyntaxTree, ReparseStats)> {
    let root = previous.syntax();
    let candidates: Vec<SyntaxToken> = match root.token_at_offset(edit.delete.start()) {
        TokenAtOffset::None => Vec::new(),
        TokenAtOffset::Single(token) => vec![token],
        TokenAtOffset::Between(left, right) => vec![left, right],
    };

    candidates
        .into_iter()
        .find_map(|token| relex_one(previous, &token, edit, new_text))
}

fn relex_one(
    previous: &SyntaxTree,
    token: &SyntaxToken,
    edit: &TextEdit,
    new_text: &str,
) -> Option<(SyntaxTree, ReparseStats)> {
    if !token.kind().is_relexable() {
        return None;
    }
    let range = token.text_range();
    if !range.contains_range(edit.delete) {
        return None;
    }
    // Messages quote token text, so a token an error points at is never
    // patched in place.
    let touched = Span::new(range.start().into(), range.end().into());
    if previous
        .errors()
        .iter()
        .any(|e| e.span.start <= touched.end && touched.start <= e.span.end)
    {
        return None;
    }

    let old = token.text();
    let rel_start = usize::from(edit.delete.start() - range.start());
    let rel_end = usize::from(edit.delete.end() - range.start());
    let mut text = String::with_capacity(old.len() + edit.insert.len());
    text.push_str(&old[..rel_start]);
    text.push_str(&edit.insert);
    text.push_str(&old[rel_end..]);
    if text.is_empty() {
        return None;
    }

    // Lexing is context-sensitive for a couple of characters, so the
    // neighbours must come out unchanged too.
    let mut before = Vec::with_capacity(2);
    let mut cursor = token.prev_token();
    while let Some(prev) = cursor {
        if before.len() == 2 {
            break;
        }
        cursor = prev.prev_token();
        before.push(prev);
    }
    before.reverse();
    let after = token.next_token();

    let mut expected: Vec<(SyntaxKind, usize)> = before
        .iter()
        .map(|t| (t.kind(), t.text().len()))
        .collect();
    expected.push((token.kind(), text.len()));
    if let Some(next) = &after {
        expected.push((next.kind(), next.text().len()));
    }

    let window_start = before
        .first()
        .map_or(range.start(), |t| t.text_range().start());
    let mut lexer = Lexer::new(new_text.get(usize::from(window_start)..)?);
    let same = expected.iter().all(|&(kind, len)| {
        lexer
            .next()
            .is_some_and(|t| SyntaxKind::from(t.kind) == kind && t.span.len() as usize == len)
    });
    if !same {
        return None;
    }
    if after.is_none() && !lexer.next().is_some_and(|t| t.kind == TokenKind::Eof) {
        return None;
    }
    if !lexer.errors().is_empty() {
        return None;
    }

    let green = token.replace_with(GreenToken::new(raw(token.kind()), &text));
    let delta = edit.delta();
    let errors = previous
        .errors()
        .iter()
        .map(|e| shift_after(e.clone(), range.end().into(), delta))
        .collect();

    let stats = ReparseStats {
        strategy: ReparseStrategy::TokenRelex,
        relexed_tokens: expected.len(),
        reparsed_bytes: 0,
    };
    Some((SyntaxTree::new(green, errors), stats))
}

// ── Block reparse ──────────────────────────────────────────────────────

fn reparse_block(previous: &SyntaxTree, edit: &TextEdit) -> Option<(SyntaxTree, ReparseStats)> {
    let root = previous.syntax();
    let start = match root.covering_element(edit.delete) {
        NodeOrToken::Node(node) => node,
        NodeOrToken::Token(token) => token.parent()?,
    };

    let ancestors: Vec<SyntaxNode> = start.ancestors().collect();
    let levels = ancestors.len();
    ancestors
        .iter()
        .enumerate()
        .find_map(|(i, node)| try_reparse_node(previous, node, levels - 1 - i, edit))
}

fn try_reparse_node(
    previous: &SyntaxTree,
    node: &SyntaxNode,
    depth_above: usize,
    edit: &TextEdit,
) -> Option<(SyntaxTree, ReparseStats)> {
    if !node.kind().is_reparsable_node() {
        return None;
    }
    let range = node.text_range();
    // Strictly between the braces.
    if !(range.start() < edit.delete.start() && edit.delete.end() < range.end()) {
        return None;
    }
    if !closed_by_brace(node) {
        return None;
    }

    let old = node.text().to_string();
    let rel_start = usize::from(edit.delete.start() - range.start());
    let rel_end = usize::from(edit.delete.end() - range.start());
    let mut text = String::with_capacity(old.len() + edit.insert.len());
    text.push_str(&old[..rel_start]);
    text.push_str(&edit.insert);
    text.push_str(&old[rel_end..]);

    let parsed = match node.kind() {
        SyntaxKind::BLOCK => rill_parser::parse_block(&text)?,
        SyntaxKind::FIELD_LIST => rill_parser::parse_field_list(&text)?,
        _ => return None,
    };
    let fragment = parsed.syntax();
    // The original closing brace must still close the node. A string or
    // comment that swallowed it, or an inner block that took it, leaves the
    // fragment open.
    if !closed_by_brace(&fragment) {
        return None;
    }
    if depth_above + tree_depth(&fragment) >= MAX_SPLICE_DEPTH {
        return None;
    }

    let node_start: u32 = range.start().into();
    let node_end: u32 = range.end().into();
    let delta = edit.delta();

    let mut errors: Vec<ParseError> = previous
        .errors()
        .iter()
        .filter(|e| !(e.span.start >= node_start && e.span.end <= node_end))
        .map(|e| shift_after(e.clone(), node_end, delta))
        .collect();
    errors.extend(
        parsed
            .errors()
            .iter()
            .map(|e| e.clone().shifted(i64::from(node_start))),
    );
    errors.sort_by_key(|e| (e.span.start, e.span.end));

    let green = node.replace_with(parsed.green().clone());
    let stats = ReparseStats {
        strategy: ReparseStrategy::BlockReparse,
        relexed_tokens: 0,
        reparsed_bytes: text.len(),
    };
    Some((SyntaxTree::new(green, errors), stats))
}

fn closed_by_brace(node: &SyntaxNode) -> bool {
    matches!(
        node.last_child_or_token(),
        Some(NodeOrToken::Token(token)) if token.kind() == SyntaxKind::R_BRACE
    )
}

/// Number of node levels in `node`'s subtree, `node` included.
fn tree_depth(node: &SyntaxNode) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    for event in node.preorder() {
        match event {
            WalkEvent::Enter(_) => {
                depth += 1;
                max = max.max(depth);
            }
            WalkEvent::Leave(_) => depth -= 1,
        }
    }
    max
}

/// Shift each span of `error` that starts at or after `boundary`.
fn shift_after(mut error: ParseError, boundary: u32, delta: i64) -> ParseError {
    if error.span.start >= boundary {
        error.span = error.span.shift(delta);
    }
    if let Some((_, span)) = &mut error.related {
        if span.start >= boundary {
            *span = span.shift(delta);
        }
    }
    error
}
