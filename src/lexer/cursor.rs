// Heavily inspired by the cursor in `rustc_lexer` and adapted to suit line-based assembly.
// See https://doc.rust-lang.org/beta/nightly-rustc/src/rustc_lexer/cursor.rs.html

use std::str::Chars;

/// Peekable iterator over a char sequence, tracking the byte offset of the current token.
#[derive(Clone)]
pub struct Cursor<'a> {
    len_remaining: usize,
    /// Byte offset of the start of the current token
    token_start: usize,
    chars: Chars<'a>,
    src_len: usize,
}

pub(crate) const EOF_CHAR: char = '\0';

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Cursor<'a> {
        Cursor {
            len_remaining: input.len(),
            token_start: 0,
            chars: input.chars(),
            src_len: input.len(),
        }
    }

    /// Peek at the next char without consuming it. Returns [`EOF_CHAR`] at end of input.
    pub fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    pub fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    /// Move to the next char.
    pub fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    /// Eat chars while predicate returns true or until end of input.
    pub fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while !self.is_eof() && predicate(self.first()) {
            self.bump();
        }
    }

    /// Byte offset of the current token start in the source.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    /// Length in bytes of the token consumed since the last [`Cursor::reset_pos`].
    pub fn pos_in_token(&self) -> usize {
        self.len_remaining - self.chars.as_str().len()
    }

    /// Mark the start of a new token at the current position.
    pub fn reset_pos(&mut self) {
        self.len_remaining = self.chars.as_str().len();
        self.token_start = self.src_len - self.len_remaining;
    }
}
