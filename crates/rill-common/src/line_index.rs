//! Conversions between byte offsets and editor positions.
//!
//! The whole toolchain works in UTF-8 byte offsets. Editors speak in
//! `(line, character)` pairs whose `character` unit is negotiated per
//! session (UTF-8 bytes, UTF-16 code units, or Unicode scalar values).
//! [`LineIndex`] is the single place where that translation happens.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Unit used for the `character` half of an editor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionEncoding {
    /// Byte offsets into the UTF-8 encoded line.
    #[serde(alias = "utf-8")]
    Utf8,
    /// UTF-16 code units. The LSP default.
    #[default]
    #[serde(alias = "utf-16")]
    Utf16,
    /// Unicode scalar values.
    #[serde(alias = "utf-32")]
    Utf32,
}

impl PositionEncoding {
    /// Width of `c` in this encoding's units.
    fn width(self, c: char) -> u32 {
        match self {
            PositionEncoding::Utf8 => c.len_utf8() as u32,
            PositionEncoding::Utf16 => c.len_utf16() as u32,
            PositionEncoding::Utf32 => 1,
        }
    }
}

/// A zero-based line/column pair. `col` is measured in the units of
/// whichever [`PositionEncoding`] produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

impl LineCol {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// A non-ASCII character on a line, stored as a UTF-8 column range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WideChar {
    start: u32,
    end: u32,
    ch: char,
}

/// Pre-computed index of line start positions for on-demand line/column lookup.
///
/// Constructed once per document version, then used to convert byte offsets
/// to positions via binary search. Lines containing non-ASCII characters keep
/// a small side table so UTF-16/UTF-32 columns can be converted without
/// access to the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<u32>,
    /// Byte offset where each line's content ends (before `\r\n` or `\n`).
    line_ends: Vec<u32>,
    /// Total length of the indexed text in bytes.
    len: u32,
    /// Non-ASCII characters per line, in column order.
    wide_chars: FxHashMap<u32, Vec<WideChar>>,
}

impl LineIndex {
    /// Build a line index by scanning the source text once.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        let mut line_ends = Vec::new();
        let mut wide_chars: FxHashMap<u32, Vec<WideChar>> = FxHashMap::default();
        let mut line = 0u32;
        let mut line_start = 0u32;
        let mut prev = '\0';

        for (i, c) in source.char_indices() {
            let i = i as u32;
            if c == '\n' {
                let end = if prev == '\r' { i - 1 } else { i };
                line_ends.push(end);
                line_starts.push(i + 1);
                line_start = i + 1;
                line += 1;
            } else if !c.is_ascii() {
                let start = i - line_start;
                wide_chars.entry(line).or_default().push(WideChar {
                    start,
                    end: start + c.len_utf8() as u32,
                    ch: c,
                });
            }
            prev = c;
        }
        line_ends.push(source.len() as u32);

        Self {
            line_starts,
            line_ends,
            len: source.len() as u32,
            wide_chars,
        }
    }

    /// Convert a byte offset to a 1-based (line, column) pair.
    ///
    /// Column is measured in bytes from the start of the line (1-based).
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let pos = self.position(offset, PositionEncoding::Utf8);
        (pos.line + 1, pos.col + 1)
    }

    /// Return the number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Length of the indexed text in bytes.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Convert a byte offset to a zero-based position in `encoding` units.
    ///
    /// Offsets past the end of the text are clamped to the end.
    pub fn position(&self, offset: u32, encoding: PositionEncoding) -> LineCol {
        let offset = offset.min(self.len);
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let utf8_col = offset - self.line_starts[line];
        let line = line as u32;
        LineCol::new(line, self.utf8_to_wide_col(line, utf8_col, encoding))
    }

    /// Convert a zero-based position in `encoding` units to a byte offset.
    ///
    /// Returns `None` if the line does not exist. A column past the end of
    /// the line is clamped to the end of the line's content.
    pub fn offset(&self, pos: LineCol, encoding: PositionEncoding) -> Option<u32> {
        let line = pos.line as usize;
        let start = *self.line_starts.get(line)?;
        let end = self.line_ends[line];
        let utf8_col = self.wide_to_utf8_col(pos.line, pos.col, encoding);
        Some((start + utf8_col).min(end))
    }

    /// Byte range of line `line` without its terminator.
    pub fn line_range(&self, line: u32) -> Option<(u32, u32)> {
        let idx = line as usize;
        Some((*self.line_starts.get(idx)?, self.line_ends[idx]))
    }

    fn utf8_to_wide_col(&self, line: u32, col: u32, encoding: PositionEncoding) -> u32 {
        if encoding == PositionEncoding::Utf8 {
            return col;
        }
        let mut res = col;
        if let Some(chars) = self.wide_chars.get(&line) {
            for c in chars {
                if c.end <= col {
                    res -= (c.end - c.start) - encoding.width(c.ch);
                } else {
                    break;
                }
            }
        }
        res
    }

    fn wide_to_utf8_col(&self, line: u32, col: u32, encoding: PositionEncoding) -> u32 {
        if encoding == PositionEncoding::Utf8 {
            return col;
        }
        let Some(chars) = self.wide_chars.get(&line) else {
            return col;
        };
        // Walk the wide chars in order, adding the extra UTF-8 bytes of
        // every character that starts before the requested column.
        let mut extra = 0u32;
        let mut wide_pos = 0u32;
        let mut utf8_pos = 0u32;
        for c in chars {
            let width = encoding.width(c.ch);
            let wide_start = wide_pos + (c.start - utf8_pos);
            if col <= wide_start {
                break;
            }
            extra += (c.end - c.start) - width;
            wide_pos = wide_start + width;
            utf8_pos = c.end;
        }
        col + extra
    }
}
