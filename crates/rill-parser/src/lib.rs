//! Rill parser: error-tolerant recursive descent producing a rowan CST.
//!
//! The CST is lossless. Every byte of the input, including whitespace,
//! comments, and malformed tokens, is a token somewhere in the tree, so
//! `parse(text).syntax().text() == text` always holds. Parsing never fails;
//! problems are reported as [`ParseError`]s next to a best-effort tree.
//!
//! Besides whole files, the parser accepts two fragment kinds (`BLOCK` and
//! `FIELD_LIST`) so that an editor edit confined to one block can be
//! reparsed without touching the rest of the file.

pub mod cst;
pub mod error;
mod parser;
pub mod syntax_kind;

use rill_lexer::Lexer;

pub use cst::{debug_tree, RillLanguage, SyntaxElement, SyntaxNode, SyntaxToken};
pub use error::ParseError;
pub use rowan::{GreenNode, TextRange, TextSize};
pub use syntax_kind::SyntaxKind;

use parser::Parser;

/// Result of parsing a Rill source file or fragment.
///
/// Contains the green tree (the immutable, cheap-to-clone CST) and every
/// lexer and parser error, in source order.
#[derive(Debug, Clone)]
pub struct Parse {
    green: GreenNode,
    errors: Vec<ParseError>,
}

impl Parse {
    /// Build the syntax tree root from the green node.
    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    pub fn green(&self) -> &GreenNode {
        &self.green
    }

    /// Lexer and parse errors, sorted by position.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Whether parsing completed without errors.
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_parts(self) -> (GreenNode, Vec<ParseError>) {
        (self.green, self.errors)
    }
}

/// Parse a Rill source file into a CST rooted at `SOURCE_FILE`.
pub fn parse(source: &str) -> Parse {
    let (tokens, lex_errors) = Lexer::tokenize_with_errors(source);
    let mut p = Parser::new(tokens, source);
    parser::parse_source_file(&mut p);
    let (green, parse_errors) = p.build_tree();
    Parse {
        green,
        errors: merge_errors(lex_errors.into_iter().map(ParseError::from).collect(), parse_errors),
    }
}

/// Parse `text` as a single `BLOCK`.
///
/// Returns `None` unless the text starts with `{` and the block's closing
/// brace is the last byte, i.e. the fragment can stand in for an existing
/// block node without changing the surrounding tree. Error spans are
/// relative to the start of `text`.
pub fn parse_block(text: &str) -> Option<Parse> {
    parse_fragment(text, parser::parse_block_fragment)
}

/// Parse `text` as a single struct `FIELD_LIST`. Same contract as
/// [`parse_block`].
pub fn parse_field_list(text: &str) -> Option<Parse> {
    parse_fragment(text, parser::parse_field_list_fragment)
}

fn parse_fragment(text: &str, entry: fn(&mut Parser) -> bool) -> Option<Parse> {
    let (tokens, lex_errors) = Lexer::tokenize_with_errors(text);
    let mut p = Parser::new(tokens, text);
    if !entry(&mut p) {
        return None;
    }
    let (green, parse_errors) = p.build_tree();
    Some(Parse {
        green,
        errors: merge_errors(lex_errors.into_iter().map(ParseError::from).collect(), parse_errors),
    })
}

fn merge_errors(mut lex: Vec<ParseError>, parse: Vec<ParseError>) -> Vec<ParseError> {
    lex.extend(parse);
    lex.sort_by_key(|e| (e.span.start, e.span.end));
    lex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_lossless() {
        let source = "fn main() {\n  // hi\n  let x = 1 +;\n}\n}}} @ \"open";
        let parse = parse(source);
        assert_eq!(parse.syntax().text().to_string(), source);
        assert!(!parse.ok());
    }

    #[test]
    fn empty_file_has_root() {
        let parse = parse("");
        assert_eq!(parse.syntax().kind(), SyntaxKind::SOURCE_FILE);
        assert!(parse.ok());
    }

    #[test]
    fn block_fragment_requires_exact_extent() {
        assert!(parse_block("{ let x = 1; }").is_some());
        assert!(parse_block(" { }").is_none());
        assert!(parse_block("{ } ").is_none());
        assert!(parse_block("{ } }").is_none());
        assert!(parse_block("x").is_none());
    }

    #[test]
    fn unclosed_block_fragment_reports_missing_brace() {
        // Every token is consumed, so the fragment is accepted with an error.
        let parse = parse_block("{ let x = 1;").unwrap();
        assert_eq!(parse.errors().len(), 1);
        assert_eq!(parse.errors()[0].message, "expected `}`");
    }

    #[test]
    fn field_list_fragment() {
        let parse = parse_field_list("{ x: Int, y: Float }").unwrap();
        assert_eq!(parse.syntax().kind(), SyntaxKind::FIELD_LIST);
        assert!(parse.ok());
    }
}
