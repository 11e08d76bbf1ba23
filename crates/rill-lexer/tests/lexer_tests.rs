//! Lexer integration tests.
//!
//! Token streams are rendered one token per line as `Kind "text" start..end`
//! and compared with inline snapshots.

use insta::assert_snapshot;
use rill_common::error::LexErrorKind;
use rill_common::token::TokenKind;
use rill_lexer::Lexer;

fn render(source: &str) -> String {
    Lexer::tokenize(source)
        .into_iter()
        .map(|tok| {
            let text = &source[tok.span.start as usize..tok.span.end as usize];
            format!("{:?} {:?} {}..{}", tok.kind, text, tok.span.start, tok.span.end)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn function_header() {
    assert_snapshot!(render("pub fn add(a: Int) -> Int {"), @r#"
    Pub "pub" 0..3
    Whitespace " " 3..4
    Fn "fn" 4..6
    Whitespace " " 6..7
    Ident "add" 7..10
    LParen "(" 10..11
    Ident "a" 11..12
    Colon ":" 12..13
    Whitespace " " 13..14
    Ident "Int" 14..17
    RParen ")" 17..18
    Whitespace " " 18..19
    Arrow "->" 19..21
    Whitespace " " 21..22
    Ident "Int" 22..25
    Whitespace " " 25..26
    LBrace "{" 26..27
    Eof "" 27..27
    "#);
}

#[test]
fn comment_then_newline() {
    assert_snapshot!(render("// note\nx"), @r#"
    Comment "// note" 0..7
    Whitespace "\n" 7..8
    Ident "x" 8..9
    Eof "" 9..9
    "#);
}

#[test]
fn all_operators() {
    let source = "+ - * / % == != < > <= >= && || ! = -> ::";
    let ops: Vec<TokenKind> = Lexer::tokenize(source)
        .into_iter()
        .map(|t| t.kind)
        .filter(|k| !k.is_trivia() && *k != TokenKind::Eof)
        .collect();
    assert_eq!(
        ops,
        vec![
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Percent,
            TokenKind::EqEq,
            TokenKind::NotEq,
            TokenKind::Lt,
            TokenKind::Gt,
            TokenKind::LtEq,
            TokenKind::GtEq,
            TokenKind::AmpAmp,
            TokenKind::PipePipe,
            TokenKind::Bang,
            TokenKind::Eq,
            TokenKind::Arrow,
            TokenKind::ColonColon,
        ]
    );
}

#[test]
fn number_forms() {
    let source = "42 1_000 0xFF 3.14 1e10 2.5E-3 7.";
    let kinds: Vec<(TokenKind, &str)> = Lexer::tokenize(source)
        .into_iter()
        .filter(|t| !t.kind.is_trivia() && t.kind != TokenKind::Eof)
        .map(|t| (t.kind, &source[t.span.start as usize..t.span.end as usize]))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (TokenKind::IntLiteral, "42"),
            (TokenKind::IntLiteral, "1_000"),
            (TokenKind::IntLiteral, "0xFF"),
            (TokenKind::FloatLiteral, "3.14"),
            (TokenKind::FloatLiteral, "1e10"),
            (TokenKind::FloatLiteral, "2.5E-3"),
            (TokenKind::IntLiteral, "7"),
            (TokenKind::Dot, "."),
        ]
    );
}

#[test]
fn malformed_numbers_are_reported() {
    let (_, errors) = Lexer::tokenize_with_errors("0x 1e");
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].kind, LexErrorKind::InvalidNumberLiteral("0x".into()));
    assert_eq!(errors[1].kind, LexErrorKind::InvalidNumberLiteral("1e".into()));
}

#[test]
fn string_escapes() {
    let (tokens, errors) = Lexer::tokenize_with_errors(r#""a\"b" "c\qd""#);
    assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
    assert_eq!(tokens[2].kind, TokenKind::StringLiteral);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, LexErrorKind::InvalidEscapeSequence('q'));
}

#[test]
fn keywords_versus_identifiers() {
    let kinds: Vec<TokenKind> = Lexer::tokenize("while whiles nil _x")
        .into_iter()
        .map(|t| t.kind)
        .filter(|k| !k.is_trivia())
        .collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::While,
            TokenKind::Ident,
            TokenKind::Nil,
            TokenKind::Ident,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn lossless_on_garbage() {
    let source = "let @ = \"oops\n}}} é ¤ &";
    let tokens = Lexer::tokenize(source);
    let rebuilt: String = tokens
        .iter()
        .map(|t| &source[t.span.start as usize..t.span.end as usize])
        .collect();
    assert_eq!(rebuilt, source);
}
