//! Pratt expression parser for Rill.
//!
//! Implements operator precedence parsing using binding power tables, plus
//! the block-like expressions (`{ ... }` and `if`/`else`) and the
//! statements that may appear inside a block.

use crate::syntax_kind::SyntaxKind;

use super::{items, MarkClosed, Parser};

// ── Binding Power Tables ───────────────────────────────────────────────

/// Returns (left_bp, right_bp) for infix operators.
///
/// Left < right means left-associative (the usual case).
/// Left > right means right-associative (assignment).
fn infix_binding_power(op: SyntaxKind) -> Option<(u8, u8)> {
    match op {
        SyntaxKind::EQ => Some((2, 1)),
        SyntaxKind::PIPE_PIPE => Some((3, 4)),
        SyntaxKind::AMP_AMP => Some((5, 6)),
        SyntaxKind::EQ_EQ | SyntaxKind::NOT_EQ => Some((7, 8)),
        SyntaxKind::LT | SyntaxKind::GT | SyntaxKind::LT_EQ | SyntaxKind::GT_EQ => Some((9, 10)),
        SyntaxKind::PLUS | SyntaxKind::MINUS => Some((11, 12)),
        SyntaxKind::STAR | SyntaxKind::SLASH | SyntaxKind::PERCENT => Some((13, 14)),
        _ => None,
    }
}

fn prefix_binding_power(op: SyntaxKind) -> Option<((), u8)> {
    match op {
        SyntaxKind::MINUS | SyntaxKind::BANG => Some(((), 15)),
        _ => None,
    }
}

/// Call and field access bind tighter than every prefix and infix operator.
const POSTFIX_BP: u8 = 17;

/// Tokens that can begin an expression.
pub(crate) const EXPR_FIRST: &[SyntaxKind] = &[
    SyntaxKind::INT_LITERAL,
    SyntaxKind::FLOAT_LITERAL,
    SyntaxKind::STRING_LITERAL,
    SyntaxKind::TRUE_KW,
    SyntaxKind::FALSE_KW,
    SyntaxKind::NIL_KW,
    SyntaxKind::IDENT,
    SyntaxKind::L_PAREN,
    SyntaxKind::L_BRACE,
    SyntaxKind::IF_KW,
    SyntaxKind::MINUS,
    SyntaxKind::BANG,
];

// ── Expression Entry Point ─────────────────────────────────────────────

/// Parse an expression at the lowest binding power.
pub(crate) fn expr(p: &mut Parser) -> Option<MarkClosed> {
    expr_bp(p, 0)
}

/// The core Pratt loop: parse a prefix/atom, then fold postfix and infix
/// operators while their binding power exceeds `min_bp`.
fn expr_bp(p: &mut Parser, min_bp: u8) -> Option<MarkClosed> {
    if !p.enter() {
        return None;
    }
    let result = expr_bp_inner(p, min_bp);
    p.leave();
    result
}

/// One link of an expression chain, wrapping everything before it.
enum Link {
    Call,
    Field,
    Infix(u8),
}

fn expr_bp_inner(p: &mut Parser, min_bp: u8) -> Option<MarkClosed> {
    let mut lhs = lhs(p)?;
    // Each link nests `lhs` one level deeper, so long chains count against
    // the nesting limit. Past it the rest of the chain is parsed flat, as
    // siblings of `lhs`.
    let mut wrapped = 0;
    let mut flat = false;

    loop {
        let current = p.current();
        let link = match current {
            SyntaxKind::L_PAREN if POSTFIX_BP >= min_bp => Link::Call,
            SyntaxKind::DOT if POSTFIX_BP >= min_bp => Link::Field,
            _ => match infix_binding_power(current) {
                Some((l_bp, r_bp)) if l_bp >= min_bp => Link::Infix(r_bp),
                _ => break,
            },
        };

        if !flat && !p.nest_left() {
            p.error("nesting too deep");
            p.unnest(wrapped);
            wrapped = 0;
            flat = true;
        }
        let m = if flat {
            None
        } else {
            wrapped += 1;
            Some(p.open_before(lhs))
        };

        let kind = match link {
            // ── Postfix: call ──
            Link::Call => {
                arg_list(p);
                SyntaxKind::CALL_EXPR
            }
            // ── Postfix: field access ──
            Link::Field => {
                p.advance(); // .
                p.expect(SyntaxKind::IDENT);
                SyntaxKind::FIELD_ACCESS
            }
            // ── Infix ──
            Link::Infix(r_bp) => {
                p.advance(); // operator
                expr_bp(p, r_bp);
                if current == SyntaxKind::EQ {
                    SyntaxKind::ASSIGN_EXPR
                } else {
                    SyntaxKind::BINARY_EXPR
                }
            }
        };
        if let Some(m) = m {
            lhs = p.close(m, kind);
        }
    }

    p.unnest(wrapped);
    Some(lhs)
}

// ── Atom / Prefix Parsing (LHS) ───────────────────────────────────────

fn lhs(p: &mut Parser) -> Option<MarkClosed> {
    let current = p.current();

    if let Some(((), r_bp)) = prefix_binding_power(current) {
        let m = p.open();
        p.advance(); // operator
        expr_bp(p, r_bp);
        return Some(p.close(m, SyntaxKind::UNARY_EXPR));
    }

    match current {
        SyntaxKind::INT_LITERAL
        | SyntaxKind::FLOAT_LITERAL
        | SyntaxKind::STRING_LITERAL
        | SyntaxKind::TRUE_KW
        | SyntaxKind::FALSE_KW
        | SyntaxKind::NIL_KW => {
            let m = p.open();
            p.advance();
            Some(p.close(m, SyntaxKind::LITERAL))
        }

        SyntaxKind::IDENT => {
            let m = p.open();
            p.advance();
            Some(p.close(m, SyntaxKind::NAME_REF))
        }

        SyntaxKind::L_PAREN => {
            let m = p.open();
            p.advance(); // (
            if expr(p).is_some() {
                p.expect(SyntaxKind::R_PAREN);
            } else {
                p.eat(SyntaxKind::R_PAREN);
            }
            Some(p.close(m, SyntaxKind::PAREN_EXPR))
        }

        SyntaxKind::L_BRACE => Some(block(p)),
        SyntaxKind::IF_KW => Some(if_expr(p)),

        _ => {
            let msg = format!("expected expression, found {}", p.found());
            p.error(&msg);
            None
        }
    }
}

/// `(expr, expr, ...)`
fn arg_list(p: &mut Parser) {
    let m = p.open();
    p.advance(); // (

    while !p.at(SyntaxKind::R_PAREN) && p.at_any(EXPR_FIRST) {
        expr(p);
        if !p.eat(SyntaxKind::COMMA) {
            break;
        }
    }

    p.expect(SyntaxKind::R_PAREN);
    p.close(m, SyntaxKind::ARG_LIST);
}

// ── Blocks ─────────────────────────────────────────────────────────────

/// `{ stmt* expr? }`
///
/// A missing `}` is reported against the opening brace; the block then
/// extends to wherever statement parsing stopped.
pub(crate) fn block(p: &mut Parser) -> MarkClosed {
    let m = p.open();
    let open_span = p.current_span();
    p.expect(SyntaxKind::L_BRACE);

    if p.enter() {
        while !p.at(SyntaxKind::R_BRACE) && !p.at(SyntaxKind::EOF) {
            let before = p.pos();
            stmt(p);
            if p.pos() == before {
                let msg = format!("expected a statement, found {}", p.found());
                p.advance_with_error(&msg);
            }
        }
        p.leave();
    }

    if !p.eat(SyntaxKind::R_BRACE) {
        p.error_with_related("expected `}`", open_span, "block opened here");
    }
    p.close(m, SyntaxKind::BLOCK)
}

/// `if cond { ... } [else (if ... | { ... })]`
fn if_expr(p: &mut Parser) -> MarkClosed {
    let m = p.open();
    p.advance(); // if

    expr(p);
    if p.at(SyntaxKind::L_BRACE) {
        block(p);
    } else {
        p.error("expected `{` after `if` condition");
    }

    if p.at(SyntaxKind::ELSE_KW) {
        let branch = p.open();
        p.advance(); // else
        match p.current() {
            SyntaxKind::IF_KW => {
                if p.enter() {
                    if_expr(p);
                    p.leave();
                }
            }
            SyntaxKind::L_BRACE => {
                block(p);
            }
            _ => p.error("expected `if` or `{` after `else`"),
        }
        p.close(branch, SyntaxKind::ELSE_BRANCH);
    }

    p.close(m, SyntaxKind::IF_EXPR)
}

// ── Statements ─────────────────────────────────────────────────────────

/// Parse one statement inside a block. May consume nothing if the current
/// token cannot start a statement; the caller handles recovery.
pub(crate) fn stmt(p: &mut Parser) {
    match p.current() {
        SyntaxKind::LET_KW => items::let_stmt(p),
        SyntaxKind::FN_KW => items::fn_def(p),
        SyntaxKind::RETURN_KW => return_stmt(p),
        SyntaxKind::WHILE_KW => while_stmt(p),
        // Empty statement.
        SyntaxKind::SEMICOLON => p.advance(),
        _ if p.at_any(EXPR_FIRST) => expr_stmt(p),
        _ => {}
    }
}

/// `return [expr];`
fn return_stmt(p: &mut Parser) {
    let m = p.open();
    p.advance(); // return
    if p.at_any(EXPR_FIRST) {
        expr(p);
    }
    expect_semicolon(p);
    p.close(m, SyntaxKind::RETURN_STMT);
}

/// `while cond { ... }`
fn while_stmt(p: &mut Parser) {
    let m = p.open();
    p.advance(); // while
    expr(p);
    if p.at(SyntaxKind::L_BRACE) {
        block(p);
    } else {
        p.error("expected `{` after `while` condition");
    }
    p.close(m, SyntaxKind::WHILE_STMT);
}

/// An expression followed by `;`. Block-like expressions and the final
/// expression of a block need no semicolon.
pub(crate) fn expr_stmt(p: &mut Parser) {
    let m = p.open();
    let block_like = p.at_any(&[SyntaxKind::IF_KW, SyntaxKind::L_BRACE]);
    if block_like {
        if p.at(SyntaxKind::IF_KW) {
            if_expr(p);
        } else {
            block(p);
        }
        p.eat(SyntaxKind::SEMICOLON);
    } else {
        expr(p);
        if !p.at(SyntaxKind::R_BRACE) {
            expect_semicolon(p);
        }
    }
    p.close(m, SyntaxKind::EXPR_STMT);
}

pub(crate) fn expect_semicolon(p: &mut Parser) {
    if !p.eat(SyntaxKind::SEMICOLON) {
        let msg = format!("expected `;`, found {}", p.found());
        p.error(&msg);
    }
}
