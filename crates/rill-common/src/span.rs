use serde::Serialize;

/// Byte-offset span into source text. Start is inclusive, end is exclusive.
///
/// All positions in the Rill toolchain are tracked as byte offsets into the
/// original source string. Line/column information is computed on demand
/// via [`LineIndex`](crate::LineIndex) when needed at the editor boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Create a new span from byte offsets.
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start ({start}) must be <= end ({end})");
        Self { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the span is empty (zero-length).
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Move both ends of the span by `delta` bytes.
    pub fn shift(self, delta: i64) -> Span {
        let start = (self.start as i64 + delta).max(0) as u32;
        let end = (self.end as i64 + delta).max(0) as u32;
        Span { start, end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_new_and_len() {
        let span = Span::new(5, 10);
        assert_eq!(span.start, 5);
        assert_eq!(span.end, 10);
        assert_eq!(span.len(), 5);
        assert!(!span.is_empty());
    }

    #[test]
    fn span_empty() {
        let span = Span::new(3, 3);
        assert_eq!(span.len(), 0);
        assert!(span.is_empty());
    }

    #[test]
    fn span_shift_both_directions() {
        assert_eq!(Span::new(5, 10).shift(3), Span::new(8, 13));
        assert_eq!(Span::new(5, 10).shift(-5), Span::new(0, 5));
    }
}
