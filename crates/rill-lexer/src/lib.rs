// Rill lexer -- lossless tokenizer for the Rill programming language.
//
// Every byte of the input ends up in exactly one token. Whitespace and
// comments are emitted as trivia tokens so the parser can build a syntax
// tree whose text is identical to the source.

mod cursor;

use cursor::Cursor;
use rill_common::error::{LexError, LexErrorKind};
use rill_common::span::Span;
use rill_common::token::{keyword_from_str, Token, TokenKind};

/// The Rill lexer. Converts source text into a stream of tokens.
///
/// Implements `Iterator<Item = Token>`; the final item is always a
/// zero-length `Eof` token. Problems are never fatal: bad input becomes an
/// `Error` token and a [`LexError`] is recorded on the side.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    emitted_eof: bool,
    errors: Vec<LexError>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            emitted_eof: false,
            errors: Vec::new(),
        }
    }

    /// Tokenize the entire source into a `Vec<Token>`, including `Eof`.
    pub fn tokenize(source: &str) -> Vec<Token> {
        Lexer::new(source).collect()
    }

    /// Tokenize the entire source, also returning the lexer errors.
    pub fn tokenize_with_errors(source: &str) -> (Vec<Token>, Vec<LexError>) {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.by_ref().collect();
        (tokens, lexer.errors)
    }

    /// Errors recorded so far.
    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    fn next_token(&mut self) -> Token {
        let start = self.cursor.pos();

        let Some(c) = self.cursor.peek() else {
            return Token::new(TokenKind::Eof, start, start);
        };

        match c {
            ' ' | '\t' | '\r' | '\n' => {
                self.cursor.eat_while(is_whitespace);
                self.token(TokenKind::Whitespace, start)
            }

            '(' => self.single_char_token(TokenKind::LParen, start),
            ')' => self.single_char_token(TokenKind::RParen, start),
            '[' => self.single_char_token(TokenKind::LBracket, start),
            ']' => self.single_char_token(TokenKind::RBracket, start),
            '{' => self.single_char_token(TokenKind::LBrace, start),
            '}' => self.single_char_token(TokenKind::RBrace, start),
            ',' => self.single_char_token(TokenKind::Comma, start),
            ';' => self.single_char_token(TokenKind::Semicolon, start),
            '.' => self.single_char_token(TokenKind::Dot, start),
            '+' => self.single_char_token(TokenKind::Plus, start),
            '*' => self.single_char_token(TokenKind::Star, start),
            '%' => self.single_char_token(TokenKind::Percent, start),

            '=' => self.one_or_two(start, '=', TokenKind::Eq, TokenKind::EqEq),
            '!' => self.one_or_two(start, '=', TokenKind::Bang, TokenKind::NotEq),
            '<' => self.one_or_two(start, '=', TokenKind::Lt, TokenKind::LtEq),
            '>' => self.one_or_two(start, '=', TokenKind::Gt, TokenKind::GtEq),
            '-' => self.one_or_two(start, '>', TokenKind::Minus, TokenKind::Arrow),
            ':' => self.one_or_two(start, ':', TokenKind::Colon, TokenKind::ColonColon),
            '&' => self.doubled(start, '&', TokenKind::AmpAmp),
            '|' => self.doubled(start, '|', TokenKind::PipePipe),

            '/' => self.lex_slash(start),
            '0'..='9' => self.lex_number(start),
            '"' => self.lex_string(start),
            c if is_ident_start(c) => self.lex_ident(start),

            _ => {
                self.cursor.bump();
                self.error(LexErrorKind::UnexpectedCharacter(c), start);
                self.token(TokenKind::Error, start)
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn token(&self, kind: TokenKind, start: u32) -> Token {
        Token::new(kind, start, self.cursor.pos())
    }

    fn error(&mut self, kind: LexErrorKind, start: u32) {
        self.errors
            .push(LexError::new(kind, Span::new(start, self.cursor.pos())));
    }

    fn single_char_token(&mut self, kind: TokenKind, start: u32) -> Token {
        self.cursor.bump();
        self.token(kind, start)
    }

    /// `c` -> `one`, `c second` -> `two`
    fn one_or_two(&mut self, start: u32, second: char, one: TokenKind, two: TokenKind) -> Token {
        self.cursor.bump();
        let kind = if self.cursor.eat(second) { two } else { one };
        self.token(kind, start)
    }

    /// `cc` -> `kind`; a lone `c` is an error.
    fn doubled(&mut self, start: u32, c: char, kind: TokenKind) -> Token {
        self.cursor.bump();
        if self.cursor.eat(c) {
            self.token(kind, start)
        } else {
            self.error(LexErrorKind::UnexpectedCharacter(c), start);
            self.token(TokenKind::Error, start)
        }
    }

    /// `//` starts a line comment, anything else is division.
    fn lex_slash(&mut self, start: u32) -> Token {
        self.cursor.bump();
        if self.cursor.peek() == Some('/') {
            self.cursor.eat_line();
            self.token(TokenKind::Comment, start)
        } else {
            self.token(TokenKind::Slash, start)
        }
    }

    // ── Number literals ──────────────────────────────────────────────────

    /// Decimal and hex integers, floats with optional exponent.
    /// Underscore separators are allowed anywhere after the first digit.
    fn lex_number(&mut self, start: u32) -> Token {
        let first = self.cursor.bump();

        if first == Some('0') && matches!(self.cursor.peek(), Some('x' | 'X')) {
            self.cursor.bump();
            let digits_start = self.cursor.pos();
            self.cursor.eat_while(|c| c.is_ascii_hexdigit() || c == '_');
            if self.cursor.pos() == digits_start {
                let text = self.cursor.slice(start, self.cursor.pos()).to_string();
                self.error(LexErrorKind::InvalidNumberLiteral(text), start);
            }
            return self.token(TokenKind::IntLiteral, start);
        }

        self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');

        let mut kind = TokenKind::IntLiteral;
        if self.cursor.peek() == Some('.')
            && self
                .cursor
                .peek_second()
                .is_some_and(|c| c.is_ascii_digit())
        {
            self.cursor.bump();
            self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
            kind = TokenKind::FloatLiteral;
        }

        if matches!(self.cursor.peek(), Some('e' | 'E')) {
            self.cursor.bump();
            if matches!(self.cursor.peek(), Some('+' | '-')) {
                self.cursor.bump();
            }
            let digits_start = self.cursor.pos();
            self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
            if self.cursor.pos() == digits_start {
                let text = self.cursor.slice(start, self.cursor.pos()).to_string();
                self.error(LexErrorKind::InvalidNumberLiteral(text), start);
            }
            kind = TokenKind::FloatLiteral;
        }

        self.token(kind, start)
    }

    // ── String literals ──────────────────────────────────────────────────

    /// Lex a complete `"..."` literal as one token.
    ///
    /// Strings do not span lines. A string still open at a line break or at
    /// the end of input becomes an `Error` token covering what was scanned.
    fn lex_string(&mut self, start: u32) -> Token {
        self.cursor.bump(); // opening '"'

        loop {
            match self.cursor.peek() {
                None | Some('\n') | Some('\r') => {
                    self.error(LexErrorKind::UnterminatedString, start);
                    return self.token(TokenKind::Error, start);
                }
                Some('"') => {
                    self.cursor.bump();
                    return self.token(TokenKind::StringLiteral, start);
                }
                Some('\\') => {
                    let escape_start = self.cursor.pos();
                    self.cursor.bump();
                    match self.cursor.peek() {
                        Some('n' | 't' | 'r' | '0' | '\\' | '"') => {
                            self.cursor.bump();
                        }
                        // Leave the line break for the unterminated check.
                        None | Some('\n') | Some('\r') => {}
                        Some(other) => {
                            self.cursor.bump();
                            self.error(LexErrorKind::InvalidEscapeSequence(other), escape_start);
                        }
                    }
                }
                Some(_) => {
                    self.cursor.bump();
                }
            }
        }
    }

    // ── Identifiers and keywords ─────────────────────────────────────────

    fn lex_ident(&mut self, start: u32) -> Token {
        self.cursor.bump();
        self.cursor.eat_while(is_ident_continue);
        let text = self.cursor.slice(start, self.cursor.pos());
        let kind = keyword_from_str(text).unwrap_or(TokenKind::Ident);
        self.token(kind, start)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.emitted_eof = true;
        }
        Some(token)
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Whether a character can start an identifier.
pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Whether a character can continue an identifier.
pub fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
