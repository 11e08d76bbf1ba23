//! CST-to-FormatIR walker for Rill source code.
//!
//! Statement lists (the file, blocks, struct field lists) are laid out one
//! entry per line. Comments are kept: a comment on its own line stays on
//! its own line, and a comment that shared a line with the code before it
//! stays at the end of that line. Any other node that directly holds a
//! comment is emitted verbatim, since moving tokens around it could
//! reattach the comment somewhere else.

use rowan::NodeOrToken;
use rill_parser::{SyntaxElement, SyntaxKind, SyntaxNode};

use crate::ir::{
    concat, group, hardline, if_break, indent, join, softline, space, text, FormatIR,
};

/// Walk a CST node and produce a FormatIR document tree.
pub fn walk_node(node: &SyntaxNode) -> FormatIR {
    match node.kind() {
        SyntaxKind::SOURCE_FILE => walk_list(node, ListKind::File),
        SyntaxKind::BLOCK => walk_list(node, ListKind::Block),
        SyntaxKind::FIELD_LIST => walk_list(node, ListKind::Fields),
        _ if has_comment_child(node) => verbatim(node),
        SyntaxKind::BINARY_EXPR => walk_binary(node),
        SyntaxKind::PARAM_LIST | SyntaxKind::ARG_LIST => walk_delimited(node),
        SyntaxKind::NAME
        | SyntaxKind::NAME_REF
        | SyntaxKind::TYPE_REF
        | SyntaxKind::LITERAL
        | SyntaxKind::VISIBILITY => verbatim(node),
        SyntaxKind::ERROR_NODE => verbatim(node),
        _ => walk_spaced(node),
    }
}

fn has_comment_child(node: &SyntaxNode) -> bool {
    node.children_with_tokens()
        .any(|child| child.kind() == SyntaxKind::COMMENT)
}

fn verbatim(node: &SyntaxNode) -> FormatIR {
    text(node.text().to_string())
}

fn significant(node: &SyntaxNode) -> impl Iterator<Item = SyntaxElement> {
    node.children_with_tokens().filter(|e| !e.kind().is_trivia())
}

// ── Token sequences ────────────────────────────────────────────────────

/// Emit the significant children separated by single spaces, except
/// around punctuation that hugs its neighbour.
fn walk_spaced(node: &SyntaxNode) -> FormatIR {
    let parent = node.kind();
    let mut parts = Vec::new();
    let mut prev: Option<SyntaxKind> = None;
    for element in significant(node) {
        let kind = element.kind();
        if let Some(prev) = prev {
            if needs_space(parent, prev, kind) {
                parts.push(text(" "));
            }
        }
        parts.push(match element {
            NodeOrToken::Node(child) => walk_node(&child),
            NodeOrToken::Token(token) => text(token.text()),
        });
        prev = Some(kind);
    }
    concat(parts)
}

fn needs_space(parent: SyntaxKind, prev: SyntaxKind, next: SyntaxKind) -> bool {
    use SyntaxKind::*;

    if matches!(parent, UNARY_EXPR | FIELD_ACCESS | PAREN_EXPR | CALL_EXPR) {
        return false;
    }
    let tight_before = matches!(
        next,
        SEMICOLON | COMMA | COLON | R_PAREN | DOT | PARAM_LIST | ARG_LIST | TYPE_ANNOTATION
    );
    let tight_after = matches!(prev, L_PAREN | DOT);
    !tight_before && !tight_after
}

/// `lhs op rhs`, breaking after the operator when too wide.
fn walk_binary(node: &SyntaxNode) -> FormatIR {
    let operands: Vec<SyntaxNode> = node.children().collect();
    let op = node
        .children_with_tokens()
        .filter_map(|e| e.into_token())
        .find(|t| !t.kind().is_trivia());
    match (operands.as_slice(), op) {
        ([lhs, rhs], Some(op)) => group(concat(vec![
            walk_node(lhs),
            text(" "),
            text(op.text()),
            indent(concat(vec![space(), walk_node(rhs)])),
        ])),
        _ => verbatim(node),
    }
}

/// Parenthesized, comma-separated parameters or arguments. Broken lists
/// put one entry per line with a trailing comma.
fn walk_delimited(node: &SyntaxNode) -> FormatIR {
    let entries: Vec<FormatIR> = node.children().map(|n| walk_node(&n)).collect();
    if entries.is_empty() {
        return text("()");
    }
    group(concat(vec![
        text("("),
        indent(concat(vec![
            softline(),
            join(entries, || concat(vec![text(","), space()])),
            if_break(FormatIR::Empty, text(",")),
        ])),
        softline(),
        text(")"),
    ]))
}

// ── Statement lists ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    File,
    Block,
    Fields,
}

enum Entry {
    Node(SyntaxNode),
    Comment(String),
}

impl Entry {
    fn kind(&self) -> SyntaxKind {
        match self {
            Entry::Node(node) => node.kind(),
            Entry::Comment(_) => SyntaxKind::COMMENT,
        }
    }
}

struct Line {
    entry: Entry,
    /// The source had an empty line before this entry.
    blank_before: bool,
    /// A comment that followed other code on the same source line.
    trailing: bool,
}

fn collect_lines(node: &SyntaxNode, kind: ListKind) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    let mut newlines = 0;
    for child in node.children_with_tokens() {
        match child {
            NodeOrToken::Token(token) => match token.kind() {
                SyntaxKind::WHITESPACE => newlines += token.text().matches('\n').count(),
                SyntaxKind::COMMENT => {
                    let has_prev = kind != ListKind::File || !lines.is_empty();
                    lines.push(Line {
                        entry: Entry::Comment(token.text().trim_end().to_string()),
                        blank_before: newlines >= 2,
                        trailing: newlines == 0 && has_prev,
                    });
                    newlines = 0;
                }
                // Braces, field commas and empty statements.
                _ => {}
            },
            NodeOrToken::Node(child) => {
                lines.push(Line {
                    entry: Entry::Node(child),
                    blank_before: newlines >= 2,
                    trailing: false,
                });
                newlines = 0;
            }
        }
    }
    lines
}

fn is_definition(kind: SyntaxKind) -> bool {
    matches!(kind, SyntaxKind::FN_DEF | SyntaxKind::STRUCT_DEF)
}

fn walk_list(node: &SyntaxNode, kind: ListKind) -> FormatIR {
    let mut head = Vec::new();
    let mut body = Vec::new();
    let mut prev: Option<SyntaxKind> = None;

    for line in collect_lines(node, kind) {
        if line.trailing {
            let target = if prev.is_some() { &mut body } else { &mut head };
            if let Entry::Comment(comment) = line.entry {
                target.push(text(" "));
                target.push(text(comment));
            }
            continue;
        }

        let current = line.entry.kind();
        if let Some(prev) = prev {
            body.push(hardline());
            // Top-level definitions are always separated by an empty line.
            let forced = kind == ListKind::File
                && (is_definition(prev)
                    || (is_definition(current) && prev != SyntaxKind::COMMENT));
            if line.blank_before || forced {
                body.push(hardline());
            }
        }

        body.push(match &line.entry {
            Entry::Comment(comment) => text(comment.clone()),
            Entry::Node(child) if kind == ListKind::Fields => {
                concat(vec![walk_node(child), text(",")])
            }
            Entry::Node(child) => walk_node(child),
        });
        prev = Some(current);
    }

    match kind {
        ListKind::File => concat(body),
        _ if body.is_empty() && head.is_empty() => text("{}"),
        _ if body.is_empty() => {
            let mut parts = vec![text("{")];
            parts.extend(head);
            parts.push(hardline());
            parts.push(text("}"));
            concat(parts)
        }
        _ => {
            let mut parts = vec![text("{")];
            parts.extend(head);
            let mut inner = vec![hardline()];
            inner.extend(body);
            parts.push(indent(concat(inner)));
            parts.push(hardline());
            parts.push(text("}"));
            concat(parts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::{print, FormatConfig};

    fn fmt(source: &str) -> String {
        let parse = rill_parser::parse(source);
        assert!(parse.ok(), "{:?}", parse.errors());
        print(&walk_node(&parse.syntax()), &FormatConfig::default())
    }

    #[test]
    fn spacing_rules() {
        assert!(!needs_space(SyntaxKind::LET_STMT, SyntaxKind::NAME, SyntaxKind::TYPE_ANNOTATION));
        assert!(needs_space(SyntaxKind::TYPE_ANNOTATION, SyntaxKind::COLON, SyntaxKind::TYPE_REF));
        assert!(!needs_space(SyntaxKind::CALL_EXPR, SyntaxKind::NAME_REF, SyntaxKind::ARG_LIST));
        assert!(needs_space(SyntaxKind::RETURN_STMT, SyntaxKind::RETURN_KW, SyntaxKind::LITERAL));
    }

    #[test]
    fn unary_and_paren_are_tight() {
        assert_eq!(fmt("let a = - ( x + 1 ) ;"), "let a = -(x + 1);\n");
        assert_eq!(fmt("! done ;"), "!done;\n");
    }

    #[test]
    fn empty_statements_are_dropped() {
        assert_eq!(fmt("fn f() { ;; g(); ; }"), "fn f() {\n  g();\n}\n");
    }

    #[test]
    fn comment_inside_expression_is_verbatim() {
        assert_eq!(
            fmt("let x = 1 // one\n    + 2;"),
            "let x = 1 // one\n    + 2;\n"
        );
    }

    #[test]
    fn comment_only_block() {
        assert_eq!(fmt("fn f() { // nothing yet\n}"), "fn f() { // nothing yet\n}\n");
    }
}
