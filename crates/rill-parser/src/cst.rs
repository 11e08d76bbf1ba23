//! Rowan-based concrete syntax tree types for Rill.
//!
//! Defines the `RillLanguage` marker type that connects [`SyntaxKind`] to
//! rowan's generic tree infrastructure, plus type aliases for convenience.

use crate::syntax_kind::SyntaxKind;

/// Marker type for Rill's language in rowan's generic tree system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RillLanguage {}

impl rowan::Language for RillLanguage {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        assert!(raw.0 <= SyntaxKind::LITERAL as u16, "unknown syntax kind {}", raw.0);
        // Safety: SyntaxKind is #[repr(u16)] with contiguous discriminants
        // ending at LITERAL, checked above.
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        rowan::SyntaxKind(kind as u16)
    }
}

/// A CST node (interior node with children).
pub type SyntaxNode = rowan::SyntaxNode<RillLanguage>;

/// A CST token (leaf node with text).
pub type SyntaxToken = rowan::SyntaxToken<RillLanguage>;

/// Either a node or a token in the CST.
pub type SyntaxElement = rowan::SyntaxElement<RillLanguage>;

/// Render a tree as an indented `KIND@start..end` listing, tokens with
/// their text. Used by tests and `rill check --tree`.
pub fn debug_tree(node: &SyntaxNode) -> String {
    let mut out = String::new();
    render(&mut out, &rowan::NodeOrToken::Node(node.clone()), 0);
    out
}

fn render(out: &mut String, element: &SyntaxElement, depth: usize) {
    use std::fmt::Write;

    let indent = "  ".repeat(depth);
    match element {
        rowan::NodeOrToken::Node(node) => {
            let _ = writeln!(out, "{indent}{:?}@{:?}", node.kind(), node.text_range());
            for child in node.children_with_tokens() {
                render(out, &child, depth + 1);
            }
        }
        rowan::NodeOrToken::Token(token) => {
            let _ = writeln!(
                out,
                "{indent}{:?}@{:?} {:?}",
                token.kind(),
                token.text_range(),
                token.text()
            );
        }
    }
}
