use std::{fmt, ops::Index};

use crate::symbol::{Mailbox, Word, MAILBOX_COUNT};

/// What the assembler placed in a mailbox.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum CellKind {
    /// Encoded instruction
    Instr,
    /// `dat` cell, never meant to be executed
    Data,
    /// Past the end of the program, or loaded from raw words
    #[default]
    Unused,
}

/// Compiled memory snapshot: exactly 100 words, indexed by mailbox.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Image {
    words: [Word; MAILBOX_COUNT],
    kinds: [CellKind; MAILBOX_COUNT],
}

impl Image {
    pub fn new() -> Self {
        Image {
            words: [0; MAILBOX_COUNT],
            kinds: [CellKind::Unused; MAILBOX_COUNT],
        }
    }

    /// Image holding `raw` from mailbox 0 onwards, zero-padded. Cells are untagged.
    /// Returns `None` if more than 100 words are given.
    pub fn from_words(raw: &[Word]) -> Option<Self> {
        if raw.len() > MAILBOX_COUNT {
            return None;
        }
        let mut image = Image::new();
        image.words[..raw.len()].copy_from_slice(raw);
        Some(image)
    }

    pub(crate) fn set(&mut self, addr: Mailbox, word: Word, kind: CellKind) {
        self.words[addr.index()] = word;
        self.kinds[addr.index()] = kind;
    }

    pub fn words(&self) -> &[Word; MAILBOX_COUNT] {
        &self.words
    }

    pub fn kind(&self, addr: Mailbox) -> CellKind {
        self.kinds[addr.index()]
    }
}

impl Default for Image {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<Mailbox> for Image {
    type Output = Word;

    fn index(&self, addr: Mailbox) -> &Self::Output {
        &self.words[addr.index()]
    }
}

/// Ten words per line, zero-padded to three digits.
impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.words.chunks(10) {
            let line = row
                .iter()
                .map(|word| format!("{word:03}"))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_words_pads_with_zero() {
        let image = Image::from_words(&[901, 902, 0]).unwrap();
        assert_eq!(&image.words()[..4], &[901, 902, 0, 0]);
        assert!(image.words()[3..].iter().all(|w| *w == 0));
        assert_eq!(image.kind(Mailbox::new(0).unwrap()), CellKind::Unused);
    }

    #[test]
    fn from_words_rejects_overflow() {
        assert!(Image::from_words(&[0; MAILBOX_COUNT]).is_some());
        assert!(Image::from_words(&[0; MAILBOX_COUNT + 1]).is_none());
    }

    #[test]
    fn display_rows() {
        let image = Image::from_words(&[506, 7, -3]).unwrap();
        let text = image.to_string();
        assert_eq!(text.lines().count(), 10);
        assert!(text.starts_with("506 007 -03 000"));
    }
}
