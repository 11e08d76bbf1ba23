use std::str::Chars;

/// Character cursor over Rill source text.
///
/// Positions are UTF-8 byte offsets into the original text. The cursor can
/// start at any char boundary, which lets the incremental reparser relex a
/// single token in place without rescanning the file.
pub struct Cursor<'src> {
    source: &'src str,
    pos: u32,
    chars: Chars<'src>,
}

impl<'src> Cursor<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            chars: source.chars(),
        }
    }

    /// Current character, not consumed.
    pub fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    /// Character after the current one, not consumed.
    pub fn peek_second(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next()
    }

    /// Consume the current character.
    pub fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8() as u32;
        Some(c)
    }

    /// Consume the current character if it equals `expected`.
    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    /// Consume characters while `predicate` holds.
    pub fn eat_while(&mut self, predicate: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            self.bump();
        }
    }

    /// Consume up to, but not including, the next line break.
    pub fn eat_line(&mut self) {
        self.eat_while(|c| c != '\n' && c != '\r');
    }

    /// Source text between two offsets previously returned by [`Cursor::pos`].
    pub fn slice(&self, start: u32, end: u32) -> &'src str {
        &self.source[start as usize..end as usize]
    }
}
