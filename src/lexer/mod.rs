use std::ops::Range;

use miette::SourceSpan;

use crate::lexer::cursor::Cursor;

pub mod cursor;

/// Location within source, in bytes.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, Debug)]
pub struct Span {
    offs: usize,
    len: usize,
}

impl Span {
    pub fn new(offs: usize, len: usize) -> Self {
        Span { offs, len }
    }

    pub fn offs(&self) -> usize {
        self.offs
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn end(&self) -> usize {
        self.offs + self.len
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        let start = self.offs.min(other.offs);
        let end = self.end().max(other.end());
        Span::new(start, end - start)
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

impl From<Span> for Range<usize> {
    fn from(value: Span) -> Self {
        value.offs()..value.end()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// Any run of non-whitespace characters: mnemonic, label or literal
    Word,
    /// Spaces and tabs, never a line break
    Whitespace,
    Newline,
    Eof,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }

    /// Lower-cased text of the token. Source is case-insensitive.
    pub fn text(&self, src: &str) -> String {
        src[Range::from(self.span)].to_lowercase()
    }
}

/// Test if a character ends a line. A `\r\n` pair is two breaks around an empty line.
pub(crate) fn is_newline(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{0B}' | '\u{0C}' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Test if a character separates words on a line.
pub(crate) fn is_whitespace(c: char) -> bool {
    !is_newline(c) && c.is_whitespace()
}

impl Cursor<'_> {
    pub fn advance_token(&mut self) -> Token {
        let first_char = match self.bump() {
            Some(c) => c,
            None => return Token::new(TokenKind::Eof, Span::new(self.token_start(), 0)),
        };
        let kind = match first_char {
            c if is_newline(c) => TokenKind::Newline,
            c if is_whitespace(c) => {
                self.take_while(is_whitespace);
                TokenKind::Whitespace
            }
            _ => {
                self.take_while(|c| !c.is_whitespace());
                TokenKind::Word
            }
        };
        let res = Token::new(kind, Span::new(self.token_start(), self.pos_in_token()));
        self.reset_pos();
        res
    }
}

/// One non-empty source line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Line {
    /// Word tokens, in order
    pub words: Vec<Token>,
    /// Covers the first to the last word
    pub span: Span,
}

/// Split source into lines of words, dropping lines that hold no words.
pub fn lines(src: &str) -> Vec<Line> {
    let mut res = Vec::new();
    let mut cur = Cursor::new(src);
    let mut words: Vec<Token> = Vec::new();

    loop {
        let tok = cur.advance_token();
        match tok.kind {
            TokenKind::Word => words.push(tok),
            TokenKind::Whitespace => continue,
            TokenKind::Newline | TokenKind::Eof => {
                if let (Some(first), Some(last)) = (words.first(), words.last()) {
                    let span = first.span.join(last.span);
                    res.push(Line {
                        words: std::mem::take(&mut words),
                        span,
                    });
                }
                if tok.kind == TokenKind::Eof {
                    break;
                }
            }
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(src: &str) -> Vec<Vec<String>> {
        lines(src)
            .iter()
            .map(|line| line.words.iter().map(|tok| tok.text(src)).collect())
            .collect()
    }

    #[test]
    fn splits_words_and_lowercases() {
        assert_eq!(
            words("LDA One\n  loop  BRZ\tEnd  \n"),
            vec![vec!["lda", "one"], vec!["loop", "brz", "end"]]
        );
    }

    #[test]
    fn skips_blank_lines() {
        let src = "\n\n   inp\r\n\r\n\t\nout\n\n";
        assert_eq!(words(src), vec![vec!["inp"], vec!["out"]]);
    }

    #[test]
    fn any_line_break_splits() {
        assert_eq!(
            words("inp\rout\u{2028}hlt"),
            vec![vec!["inp"], vec!["out"], vec!["hlt"]]
        );
    }

    #[test]
    fn lowercases_beyond_ascii() {
        assert_eq!(words("ÉTÉ dat 1"), vec![vec!["été", "dat", "1"]]);
    }

    #[test]
    fn spans_point_into_source() {
        let src = "  sta  COUNT\n";
        let line = &lines(src)[0];
        assert_eq!(line.words[0].span, Span::new(2, 3));
        assert_eq!(line.words[1].span, Span::new(7, 5));
        assert_eq!(&src[Range::from(line.span)], "sta  COUNT");
    }

    #[test]
    fn empty_source() {
        assert!(lines("").is_empty());
        assert!(lines(" \n\t\n ").is_empty());
    }
}
