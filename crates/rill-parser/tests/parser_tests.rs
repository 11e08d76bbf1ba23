//! Parser integration tests.
//!
//! Small inputs are snapshotted through `debug_tree`; larger behaviors
//! (recovery, losslessness, fragment parsing) are checked structurally.

use insta::assert_snapshot;
use rill_parser::{debug_tree, parse, parse_block, SyntaxKind, SyntaxNode};

fn parse_and_debug(source: &str) -> String {
    let parse = parse(source);
    let tree = debug_tree(&parse.syntax());
    if parse.errors().is_empty() {
        tree
    } else {
        format!(
            "{}errors:\n{}",
            tree,
            parse
                .errors()
                .iter()
                .map(|e| format!("  - {} @{}..{}", e.message, e.span.start, e.span.end))
                .collect::<Vec<_>>()
                .join("\n")
        )
    }
}

fn find(node: &SyntaxNode, kind: SyntaxKind) -> Option<SyntaxNode> {
    node.descendants().find(|n| n.kind() == kind)
}

// ── Snapshots ──────────────────────────────────────────────────────────

#[test]
fn let_with_precedence() {
    assert_snapshot!(parse_and_debug("let x = 1 + 2 * 3;"), @r#"
    SOURCE_FILE@0..18
      LET_STMT@0..18
        LET_KW@0..3 "let"
        WHITESPACE@3..4 " "
        NAME@4..5
          IDENT@4..5 "x"
        WHITESPACE@5..6 " "
        EQ@6..7 "="
        WHITESPACE@7..8 " "
        BINARY_EXPR@8..17
          LITERAL@8..9
            INT_LITERAL@8..9 "1"
          WHITESPACE@9..10 " "
          PLUS@10..11 "+"
          WHITESPACE@11..12 " "
          BINARY_EXPR@12..17
            LITERAL@12..13
              INT_LITERAL@12..13 "2"
            WHITESPACE@13..14 " "
            STAR@14..15 "*"
            WHITESPACE@15..16 " "
            LITERAL@16..17
              INT_LITERAL@16..17 "3"
        SEMICOLON@17..18 ";"
    "#);
}

#[test]
fn let_missing_name() {
    assert_snapshot!(parse_and_debug("let = 1;"), @r#"
    SOURCE_FILE@0..8
      LET_STMT@0..8
        LET_KW@0..3 "let"
        WHITESPACE@3..4 " "
        EQ@4..5 "="
        WHITESPACE@5..6 " "
        LITERAL@6..7
          INT_LITERAL@6..7 "1"
        SEMICOLON@7..8 ";"
    errors:
      - expected binding name, found `=` @4..5
    "#);
}

#[test]
fn call_with_field_access() {
    assert_snapshot!(parse_and_debug("f(a.b);"), @r#"
    SOURCE_FILE@0..7
      EXPR_STMT@0..7
        CALL_EXPR@0..6
          NAME_REF@0..1
            IDENT@0..1 "f"
          ARG_LIST@1..6
            L_PAREN@1..2 "("
            FIELD_ACCESS@2..5
              NAME_REF@2..3
                IDENT@2..3 "a"
              DOT@3..4 "."
              IDENT@4..5 "b"
            R_PAREN@5..6 ")"
        SEMICOLON@6..7 ";"
    "#);
}

// ── Structure ──────────────────────────────────────────────────────────

#[test]
fn assignment_is_right_associative() {
    let root = parse("a = b = c;").syntax();
    let outer = find(&root, SyntaxKind::ASSIGN_EXPR).unwrap();
    let children: Vec<_> = outer.children().map(|n| n.kind()).collect();
    assert_eq!(children, vec![SyntaxKind::NAME_REF, SyntaxKind::ASSIGN_EXPR]);
}

#[test]
fn comparison_binds_looser_than_addition() {
    let root = parse("x < y + 1;").syntax();
    let outer = find(&root, SyntaxKind::BINARY_EXPR).unwrap();
    let children: Vec<_> = outer.children().map(|n| n.kind()).collect();
    assert_eq!(children, vec![SyntaxKind::NAME_REF, SyntaxKind::BINARY_EXPR]);
}

#[test]
fn unary_binds_tighter_than_binary() {
    let root = parse("-x + y;").syntax();
    let outer = find(&root, SyntaxKind::BINARY_EXPR).unwrap();
    let children: Vec<_> = outer.children().map(|n| n.kind()).collect();
    assert_eq!(children, vec![SyntaxKind::UNARY_EXPR, SyntaxKind::NAME_REF]);
}

#[test]
fn function_with_params_and_return_type() {
    let parse = parse("pub fn add(a: Int, b: Int) -> Int { a + b }");
    assert!(parse.ok(), "{:?}", parse.errors());
    let root = parse.syntax();
    let func = find(&root, SyntaxKind::FN_DEF).unwrap();
    assert!(find(&func, SyntaxKind::VISIBILITY).is_some());
    assert_eq!(func.descendants().filter(|n| n.kind() == SyntaxKind::PARAM).count(), 2);
    assert!(find(&func, SyntaxKind::RET_TYPE).is_some());
    let body = find(&func, SyntaxKind::BLOCK).unwrap();
    assert_eq!(body.text().to_string(), "{ a + b }");
}

#[test]
fn struct_definition() {
    let parse = parse("struct Point { x: Int, y: Int, }");
    assert!(parse.ok(), "{:?}", parse.errors());
    let root = parse.syntax();
    let fields = find(&root, SyntaxKind::FIELD_LIST).unwrap();
    assert_eq!(fields.children().filter(|n| n.kind() == SyntaxKind::FIELD).count(), 2);
}

#[test]
fn if_else_chain_and_while() {
    let source = "fn f(n) {\n  while n > 0 { n = n - 1; }\n  if n == 0 { 1 } else if n < 0 { 2 } else { 3 }\n}";
    let parse = parse(source);
    assert!(parse.ok(), "{:?}", parse.errors());
    let root = parse.syntax();
    assert!(find(&root, SyntaxKind::WHILE_STMT).is_some());
    let branches = root
        .descendants()
        .filter(|n| n.kind() == SyntaxKind::ELSE_BRANCH)
        .count();
    assert_eq!(branches, 2);
}

#[test]
fn comments_are_trivia() {
    let parse = parse("// leading\nlet x = 1; // trailing\n");
    assert!(parse.ok());
    let root = parse.syntax();
    let comments = root
        .descendants_with_tokens()
        .filter(|e| e.kind() == SyntaxKind::COMMENT)
        .count();
    assert_eq!(comments, 2);
    // Nodes start at significant tokens.
    let stmt = find(&root, SyntaxKind::LET_STMT).unwrap();
    assert_eq!(u32::from(stmt.text_range().start()), 11);
}

// ── Recovery ───────────────────────────────────────────────────────────

#[test]
fn recovery_continues_after_bad_statement() {
    let source = "fn a() { let = ; }\nfn b() { 1 + ; }\nfn c() {}";
    let parse = parse(source);
    assert_eq!(parse.syntax().text().to_string(), source);
    let fns = parse
        .syntax()
        .children()
        .filter(|n| n.kind() == SyntaxKind::FN_DEF)
        .count();
    assert_eq!(fns, 3);
    assert!(parse.errors().len() >= 2);
}

#[test]
fn stray_tokens_become_error_nodes() {
    let parse = parse("} ) let x = 1;");
    let root = parse.syntax();
    let errors = root
        .children()
        .filter(|n| n.kind() == SyntaxKind::ERROR_NODE)
        .count();
    assert_eq!(errors, 2);
    assert!(find(&root, SyntaxKind::LET_STMT).is_some());
    assert_eq!(parse.errors().len(), 2);
}

#[test]
fn unclosed_block_reports_opening_brace() {
    let parse = parse("fn f() {\n  let x = 1;\n");
    let err = parse
        .errors()
        .iter()
        .find(|e| e.message == "expected `}`")
        .unwrap();
    let (msg, span) = err.related.clone().unwrap();
    assert_eq!(msg, "block opened here");
    assert_eq!(span.start, 7);
}

#[test]
fn lexer_errors_are_reported() {
    let parse = parse("let s = \"open;\nlet t = 1;");
    assert!(parse
        .errors()
        .iter()
        .any(|e| e.message == "unterminated string literal"));
    assert_eq!(
        parse.syntax().text().to_string(),
        "let s = \"open;\nlet t = 1;"
    );
}

#[test]
fn deep_nesting_does_not_overflow() {
    let source = format!("let x = {}1{};", "(".repeat(2000), ")".repeat(2000));
    let parse = parse(&source);
    assert_eq!(parse.syntax().text().to_string(), source);
    assert!(parse.errors().iter().any(|e| e.message == "nesting too deep"));
}

/// Depth of the deepest node, walked without recursion.
fn max_depth(root: &SyntaxNode) -> usize {
    let (mut depth, mut max) = (0usize, 0usize);
    for event in root.preorder() {
        match event {
            rowan::WalkEvent::Enter(_) => {
                depth += 1;
                max = max.max(depth);
            }
            rowan::WalkEvent::Leave(_) => depth -= 1,
        }
    }
    max
}

/// Parse and drop `source` on a thread with the stack size of tokio's
/// blocking pool.
fn parse_on_small_stack(source: String) -> (usize, bool) {
    std::thread::Builder::new()
        .stack_size(2 << 20)
        .spawn(move || {
            let parse = parse(&source);
            let root = parse.syntax();
            assert_eq!(root.text().to_string(), source);
            let too_deep = parse.errors().iter().any(|e| e.message == "nesting too deep");
            (max_depth(&root), too_deep)
        })
        .unwrap()
        .join()
        .unwrap()
}

#[test]
fn long_else_if_chain_is_bounded() {
    let source = format!("fn f(a) {{ if a {{}}{} }}", " else if a {}".repeat(10_000));
    let (depth, too_deep) = parse_on_small_stack(source);
    assert!(too_deep);
    assert!(depth < 1_000, "tree depth {depth}");
}

#[test]
fn long_binary_chain_is_bounded() {
    let source = format!("let s = a{};", " + a".repeat(50_000));
    let (depth, too_deep) = parse_on_small_stack(source);
    assert!(too_deep);
    assert!(depth < 1_000, "tree depth {depth}");
}

#[test]
fn long_call_and_field_chains_are_bounded() {
    let source = format!("let s = f{}.x{};", "()".repeat(20_000), ".x".repeat(20_000));
    let (depth, too_deep) = parse_on_small_stack(source);
    assert!(too_deep);
    assert!(depth < 1_000, "tree depth {depth}");
}

#[test]
fn ordinary_chains_nest_normally() {
    let source = format!("let s = a{};", " + a".repeat(100));
    let parse = parse(&source);
    assert!(parse.errors().is_empty());
    let binaries = parse
        .syntax()
        .descendants()
        .filter(|n| n.kind() == SyntaxKind::BINARY_EXPR)
        .count();
    assert_eq!(binaries, 100);
}

#[test]
fn lossless_for_every_prefix() {
    let source = "pub struct P { x: Int }\nfn main() { let p = 1; if p > 0 { print(\"hi\"); } }";
    for end in 0..=source.len() {
        let prefix = &source[..end];
        assert_eq!(parse(prefix).syntax().text().to_string(), prefix);
    }
}

// ── Fragments ──────────────────────────────────────────────────────────

#[test]
fn block_fragment_matches_full_parse() {
    let body = "{ let y = x * 2; y }";
    let full = parse(&format!("fn f(x) {body}"));
    let from_file = find(&full.syntax(), SyntaxKind::BLOCK).unwrap();
    let fragment = parse_block(body).unwrap();
    assert_eq!(from_file.green().into_owned(), fragment.green().clone());
}
