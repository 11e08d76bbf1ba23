//! Wadler-Lindig format IR for Rill code formatting.
//!
//! The walker describes formatting intent (groups, indentation, line
//! breaks) and the printer picks the concrete layout.

/// A document IR node in the Wadler-Lindig style.
///
/// The printer decides at each `Group` boundary whether to render flat (all on
/// one line) or broken (with line breaks and indentation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatIR {
    /// Literal text to emit verbatim.
    Text(String),
    /// A space in flat mode; a newline + indent in broken mode.
    Space,
    /// Always emits a newline + current indentation, regardless of mode.
    Hardline,
    /// Increase indentation for the child IR by the configured indent size.
    Indent(Box<FormatIR>),
    /// Render the child flat if it fits in the remaining width, broken
    /// otherwise.
    Group(Box<FormatIR>),
    /// Emit different content depending on whether the enclosing group is
    /// in flat or broken mode.
    IfBreak {
        flat: Box<FormatIR>,
        broken: Box<FormatIR>,
    },
    /// A sequence of IR nodes rendered in order.
    Concat(Vec<FormatIR>),
    /// Produces no output.
    Empty,
}

// ── Helper constructors ─────────────────────────────────────────────────

pub fn text(s: impl Into<String>) -> FormatIR {
    FormatIR::Text(s.into())
}

pub fn space() -> FormatIR {
    FormatIR::Space
}

pub fn hardline() -> FormatIR {
    FormatIR::Hardline
}

/// Nothing in flat mode, a line break in broken mode.
pub fn softline() -> FormatIR {
    if_break(FormatIR::Empty, FormatIR::Hardline)
}

pub fn indent(ir: FormatIR) -> FormatIR {
    FormatIR::Indent(Box::new(ir))
}

pub fn group(ir: FormatIR) -> FormatIR {
    FormatIR::Group(Box::new(ir))
}

pub fn concat(parts: Vec<FormatIR>) -> FormatIR {
    FormatIR::Concat(parts)
}

pub fn if_break(flat: FormatIR, broken: FormatIR) -> FormatIR {
    FormatIR::IfBreak {
        flat: Box::new(flat),
        broken: Box::new(broken),
    }
}

/// Interleave `parts` with `sep`.
pub fn join(parts: Vec<FormatIR>, sep: impl Fn() -> FormatIR) -> FormatIR {
    let mut out = Vec::with_capacity(parts.len() * 2);
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            out.push(sep());
        }
        out.push(part);
    }
    concat(out)
}
