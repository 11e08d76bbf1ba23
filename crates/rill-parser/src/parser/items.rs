//! Item parsers for Rill: function definitions, struct definitions, and
//! `let` bindings, each optionally preceded by `pub`.

use crate::syntax_kind::SyntaxKind;

use super::expressions::{self, block, expect_semicolon};
use super::Parser;

/// Parse one top-level item or statement. Consumes nothing if the current
/// token cannot start either.
pub(crate) fn item(p: &mut Parser) {
    let kind = if p.at(SyntaxKind::PUB_KW) {
        p.nth(1)
    } else {
        p.current()
    };

    match kind {
        SyntaxKind::FN_KW => fn_def(p),
        SyntaxKind::STRUCT_KW => struct_def(p),
        SyntaxKind::LET_KW => let_stmt(p),
        _ if p.at(SyntaxKind::PUB_KW) => {
            p.advance_with_error("expected `fn`, `struct` or `let` after `pub`");
        }
        _ => expressions::stmt(p),
    }
}

/// Parse an optional `pub` modifier into a VISIBILITY node.
fn optional_visibility(p: &mut Parser) {
    if p.at(SyntaxKind::PUB_KW) {
        let m = p.open();
        p.advance();
        p.close(m, SyntaxKind::VISIBILITY);
    }
}

/// Parse the identifier after a declaring keyword into a NAME node.
fn name(p: &mut Parser, what: &str) -> bool {
    if p.at(SyntaxKind::IDENT) {
        let m = p.open();
        p.advance();
        p.close(m, SyntaxKind::NAME);
        true
    } else {
        let msg = format!("expected {what} name, found {}", p.found());
        p.error(&msg);
        false
    }
}

// ── Function Definitions ───────────────────────────────────────────────

/// `[pub] fn name(params) [-> Type] { ... }`
pub(crate) fn fn_def(p: &mut Parser) {
    let m = p.open();
    optional_visibility(p);
    p.advance(); // fn

    name(p, "function");

    if p.at(SyntaxKind::L_PAREN) {
        param_list(p);
    } else {
        p.error("expected `(` to start parameter list");
    }

    if p.at(SyntaxKind::ARROW) {
        let ret = p.open();
        p.advance(); // ->
        type_ref(p);
        p.close(ret, SyntaxKind::RET_TYPE);
    }

    if p.at(SyntaxKind::L_BRACE) {
        block(p);
    } else {
        let msg = format!("expected function body, found {}", p.found());
        p.error(&msg);
    }

    p.close(m, SyntaxKind::FN_DEF);
}

/// `(name [: Type], ...)`
fn param_list(p: &mut Parser) {
    let m = p.open();
    p.advance(); // (

    while !p.at_any(&[SyntaxKind::R_PAREN, SyntaxKind::L_BRACE, SyntaxKind::EOF]) {
        if p.at(SyntaxKind::IDENT) {
            param(p);
        } else {
            let msg = format!("expected parameter, found {}", p.found());
            p.advance_with_error(&msg);
            continue;
        }
        if !p.eat(SyntaxKind::COMMA) {
            break;
        }
    }

    p.expect(SyntaxKind::R_PAREN);
    p.close(m, SyntaxKind::PARAM_LIST);
}

fn param(p: &mut Parser) {
    let m = p.open();
    name(p, "parameter");
    optional_type_annotation(p);
    p.close(m, SyntaxKind::PARAM);
}

// ── Struct Definitions ─────────────────────────────────────────────────

/// `[pub] struct Name { field: Type, ... }`
pub(crate) fn struct_def(p: &mut Parser) {
    let m = p.open();
    optional_visibility(p);
    p.advance(); // struct

    name(p, "struct");

    if p.at(SyntaxKind::L_BRACE) {
        field_list(p);
    } else {
        p.error("expected `{` to start struct fields");
    }

    p.close(m, SyntaxKind::STRUCT_DEF);
}

/// `{ name: Type, ... }`
pub(crate) fn field_list(p: &mut Parser) {
    let m = p.open();
    let open_span = p.current_span();
    p.advance(); // {

    while !p.at_any(&[SyntaxKind::R_BRACE, SyntaxKind::EOF]) {
        if p.at(SyntaxKind::IDENT) {
            field(p);
        } else if p.at_any(&[
            SyntaxKind::FN_KW,
            SyntaxKind::STRUCT_KW,
            SyntaxKind::LET_KW,
            SyntaxKind::PUB_KW,
        ]) {
            // Probably a missing `}`; leave the item to the caller.
            break;
        } else {
            let msg = format!("expected field, found {}", p.found());
            p.advance_with_error(&msg);
            continue;
        }
        if !p.eat(SyntaxKind::COMMA) && !p.at(SyntaxKind::R_BRACE) {
            p.error("expected `,` between fields");
        }
    }

    if !p.eat(SyntaxKind::R_BRACE) {
        p.error_with_related("expected `}`", open_span, "fields start here");
    }
    p.close(m, SyntaxKind::FIELD_LIST);
}

/// `name: Type`
fn field(p: &mut Parser) {
    let m = p.open();
    name(p, "field");
    if p.at(SyntaxKind::COLON) {
        optional_type_annotation(p);
    } else {
        p.error("expected `:` and field type");
    }
    p.close(m, SyntaxKind::FIELD);
}

// ── Let Bindings ───────────────────────────────────────────────────────

/// `[pub] let name [: Type] [= expr];`
pub(crate) fn let_stmt(p: &mut Parser) {
    let m = p.open();
    optional_visibility(p);
    p.advance(); // let

    name(p, "binding");
    optional_type_annotation(p);

    if p.eat(SyntaxKind::EQ) {
        expressions::expr(p);
    }

    expect_semicolon(p);
    p.close(m, SyntaxKind::LET_STMT);
}

// ── Types ──────────────────────────────────────────────────────────────

/// `: Type`
fn optional_type_annotation(p: &mut Parser) {
    if p.at(SyntaxKind::COLON) {
        let m = p.open();
        p.advance(); // :
        type_ref(p);
        p.close(m, SyntaxKind::TYPE_ANNOTATION);
    }
}

/// A type is a single identifier.
fn type_ref(p: &mut Parser) {
    if p.at(SyntaxKind::IDENT) {
        let m = p.open();
        p.advance();
        p.close(m, SyntaxKind::TYPE_REF);
    } else {
        let msg = format!("expected type, found {}", p.found());
        p.error(&msg);
    }
}
