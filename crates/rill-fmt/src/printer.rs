//! Wadler-Lindig printer for the Rill format IR.
//!
//! The printer converts a `FormatIR` tree into a string by deciding at each
//! `Group` boundary whether to render flat (all on one line) or broken
//! (with line breaks and indentation).

use serde::Deserialize;

use crate::ir::FormatIR;

/// Configuration for the formatter output. Read from the `[format]` table
/// of `rill.toml` by [`FormatConfig::load`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Number of spaces per indentation level. Default: 2.
    pub indent_size: usize,
    /// Maximum line width before groups break. Default: 100.
    pub max_width: usize,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            indent_size: 2,
            max_width: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Flat,
    Break,
}

/// A command on the printer's work stack.
#[derive(Debug)]
struct PrintCmd<'a> {
    indent: usize,
    mode: Mode,
    ir: &'a FormatIR,
}

/// Output buffer that writes indentation lazily, so blank lines never
/// carry trailing spaces.
struct Output {
    buf: String,
    col: usize,
    pending_indent: Option<usize>,
}

impl Output {
    fn text(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if let Some(indent) = self.pending_indent.take() {
            self.buf.extend(std::iter::repeat(' ').take(indent));
            self.col = indent;
        }
        self.buf.push_str(s);
        match s.rfind('\n') {
            Some(nl) => self.col = s.len() - nl - 1,
            None => self.col += s.len(),
        }
    }

    fn newline(&mut self, indent: usize) {
        self.buf.push('\n');
        self.col = indent;
        self.pending_indent = Some(indent);
    }
}

/// Render a `FormatIR` tree as a formatted string respecting the given config.
///
/// Output that is not empty always ends with exactly one newline.
pub fn print(ir: &FormatIR, config: &FormatConfig) -> String {
    let mut out = Output {
        buf: String::new(),
        col: 0,
        pending_indent: None,
    };
    let mut stack: Vec<PrintCmd> = vec![PrintCmd {
        indent: 0,
        mode: Mode::Break,
        ir,
    }];

    while let Some(cmd) = stack.pop() {
        match cmd.ir {
            FormatIR::Empty => {}

            FormatIR::Text(s) => out.text(s),

            FormatIR::Space => match cmd.mode {
                Mode::Flat => out.text(" "),
                Mode::Break => out.newline(cmd.indent),
            },

            FormatIR::Hardline => out.newline(cmd.indent),

            FormatIR::Indent(child) => stack.push(PrintCmd {
                indent: cmd.indent + config.indent_size,
                mode: cmd.mode,
                ir: child,
            }),

            FormatIR::Group(child) => {
                let fits = out.col.saturating_add(measure_flat(child)) <= config.max_width;
                stack.push(PrintCmd {
                    indent: cmd.indent,
                    mode: if fits { Mode::Flat } else { Mode::Break },
                    ir: child,
                });
            }

            FormatIR::IfBreak { flat, broken } => stack.push(PrintCmd {
                indent: cmd.indent,
                mode: cmd.mode,
                ir: if cmd.mode == Mode::Flat { flat } else { broken },
            }),

            FormatIR::Concat(parts) => {
                for part in parts.iter().rev() {
                    stack.push(PrintCmd {
                        indent: cmd.indent,
                        mode: cmd.mode,
                        ir: part,
                    });
                }
            }
        }
    }

    let mut buf = out.buf;
    let trimmed = buf.trim_end_matches('\n').len();
    buf.truncate(trimmed);
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf
}

/// Width of an IR node rendered flat. `usize::MAX` if it contains a
/// `Hardline` or multi-line text, which can never be flat.
fn measure_flat(ir: &FormatIR) -> usize {
    match ir {
        FormatIR::Empty => 0,
        FormatIR::Text(s) if s.contains('\n') => usize::MAX,
        FormatIR::Text(s) => s.len(),
        FormatIR::Space => 1,
        FormatIR::Hardline => usize::MAX,
        FormatIR::Indent(child) | FormatIR::Group(child) => measure_flat(child),
        FormatIR::IfBreak { flat, .. } => measure_flat(flat),
        FormatIR::Concat(parts) => parts
            .iter()
            .map(measure_flat)
            .try_fold(0usize, |acc, w| acc.checked_add(w))
            .unwrap_or(usize::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;

    fn narrow(width: usize) -> FormatConfig {
        FormatConfig {
            indent_size: 2,
            max_width: width,
        }
    }

    #[test]
    fn group_fits_renders_flat() {
        let ir = group(concat(vec![text("a"), space(), text("b")]));
        assert_eq!(print(&ir, &FormatConfig::default()), "a b\n");
    }

    #[test]
    fn group_exceeds_width_breaks() {
        let ir = group(concat(vec![
            text("hello"),
            space(),
            text("beautiful"),
            space(),
            text("world"),
        ]));
        assert_eq!(print(&ir, &narrow(10)), "hello\nbeautiful\nworld\n");
    }

    #[test]
    fn blank_lines_have_no_trailing_spaces() {
        let ir = concat(vec![
            text("{"),
            indent(concat(vec![hardline(), text("a"), hardline(), hardline(), text("b")])),
            hardline(),
            text("}"),
        ]);
        assert_eq!(print(&ir, &FormatConfig::default()), "{\n  a\n\n  b\n}\n");
    }

    #[test]
    fn softline_breaks_inside_indent() {
        let ir = group(concat(vec![
            text("f("),
            indent(concat(vec![softline(), text("argument_one,"), space(), text("argument_two")])),
            softline(),
            text(")"),
        ]));
        assert_eq!(print(&ir, &FormatConfig::default()), "f(argument_one, argument_two)\n");
        assert_eq!(
            print(&ir, &narrow(12)),
            "f(\n  argument_one,\n  argument_two\n)\n"
        );
    }

    #[test]
    fn multiline_text_never_fits_flat() {
        let ir = concat(vec![text("a\nb"), FormatIR::Empty]);
        assert_eq!(measure_flat(&ir), usize::MAX);
    }

    #[test]
    fn trailing_newlines_collapse() {
        let ir = concat(vec![text("x"), hardline(), hardline()]);
        assert_eq!(print(&ir, &FormatConfig::default()), "x\n");
        assert_eq!(print(&FormatIR::Empty, &FormatConfig::default()), "");
    }
}
