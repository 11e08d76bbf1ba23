//! Rill code formatter.
//!
//! This crate implements a canonical code formatter for Rill source code using
//! the Wadler-Lindig document IR approach. It works by:
//!
//! 1. Parsing source code to a CST (via `rill-parser`)
//! 2. Walking the CST to produce a `FormatIR` document tree
//! 3. Printing the IR to a string, respecting line width constraints
//!
//! The CST-based approach preserves comments while allowing the formatter
//! to rewrite whitespace and indentation canonically. Files with syntax
//! errors are never reformatted.

pub mod config;
pub mod ir;
pub mod printer;
pub mod walker;

pub use config::FormatConfigError;
pub use printer::FormatConfig;

/// Format Rill source code, or `None` if it does not parse cleanly.
pub fn try_format(source: &str, config: &FormatConfig) -> Option<String> {
    let parse = rill_parser::parse(source);
    if !parse.ok() {
        return None;
    }
    let doc = walker::walk_node(&parse.syntax());
    Some(printer::print(&doc, config))
}

/// Format Rill source code according to the given configuration.
///
/// Source with syntax errors is returned unchanged.
///
/// # Example
///
/// ```
/// use rill_fmt::{format_source, FormatConfig};
///
/// let source = "fn add(a,b){a+b}";
/// let formatted = format_source(source, &FormatConfig::default());
/// assert_eq!(formatted, "fn add(a, b) {\n  a + b\n}\n");
/// ```
pub fn format_source(source: &str, config: &FormatConfig) -> String {
    try_format(source, config).unwrap_or_else(|| source.to_string())
}
