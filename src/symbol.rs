use std::{fmt, str::FromStr};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::lexer::Span;

// Symbol table of label -> mailbox address (line number)
type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Number of addressable mailboxes.
pub const MAILBOX_COUNT: usize = 100;

/// Contents of a single mailbox, and the accumulator.
pub type Word = i64;

/// Newtype representing an address inside the 100 mailboxes. Always in `0..=99`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Mailbox(u8);

impl Mailbox {
    pub fn new(addr: usize) -> Option<Mailbox> {
        (addr < MAILBOX_COUNT).then_some(Mailbox(addr as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<Word> for Mailbox {
    type Error = Word;

    fn try_from(value: Word) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(Mailbox::new)
            .ok_or(value)
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// How an opcode takes its operand in source.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OperandKind {
    /// Referenced label, resolved to a mailbox
    Label,
    /// Integer literal, only for `dat`
    Literal,
    None,
}

/// The eleven assembly mnemonics.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Opcode {
    Add,
    Sub,
    Sta,
    Lda,
    Bra,
    Brz,
    Brp,
    Inp,
    Out,
    Hlt,
    Dat,
}

impl Opcode {
    pub const ALL: [Opcode; 11] = [
        Opcode::Add,
        Opcode::Sub,
        Opcode::Sta,
        Opcode::Lda,
        Opcode::Bra,
        Opcode::Brz,
        Opcode::Brp,
        Opcode::Inp,
        Opcode::Out,
        Opcode::Hlt,
        Opcode::Dat,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Sta => "sta",
            Opcode::Lda => "lda",
            Opcode::Bra => "bra",
            Opcode::Brz => "brz",
            Opcode::Brp => "brp",
            Opcode::Inp => "inp",
            Opcode::Out => "out",
            Opcode::Hlt => "hlt",
            Opcode::Dat => "dat",
        }
    }

    /// Hundreds-value the resolved mailbox is added to. Zero-operand opcodes encode as exactly
    /// this value. `dat` has no base.
    pub fn base(self) -> Option<Word> {
        match self {
            Opcode::Add => Some(100),
            Opcode::Sub => Some(200),
            Opcode::Sta => Some(300),
            Opcode::Lda => Some(500),
            Opcode::Bra => Some(600),
            Opcode::Brz => Some(700),
            Opcode::Brp => Some(800),
            Opcode::Inp => Some(901),
            Opcode::Out => Some(902),
            Opcode::Hlt => Some(0),
            Opcode::Dat => None,
        }
    }

    pub fn operand(self) -> OperandKind {
        match self {
            Opcode::Inp | Opcode::Out | Opcode::Hlt => OperandKind::None,
            Opcode::Dat => OperandKind::Literal,
            _ => OperandKind::Label,
        }
    }
}

impl FromStr for Opcode {
    type Err = ();

    /// Expects lower-case input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Opcode::ALL
            .into_iter()
            .find(|op| op.mnemonic() == s)
            .ok_or(())
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Label used to refer to specific mailboxes. Stored lower-cased.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Label {
    pub name: String,
    pub span: Span,
}

impl Label {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Label {
            name: name.into(),
            span,
        }
    }
}

/// Immutable mapping of label name to mailbox, built once before encoding.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    table: FxMap<String, (Mailbox, Span)>,
}

impl SymbolTable {
    /// Record a label definition. Returns the span of the earlier definition if the name is
    /// already taken, leaving the table unchanged.
    pub(crate) fn insert(&mut self, label: &Label, addr: Mailbox) -> Result<(), Span> {
        if let Some((_, first)) = self.table.get(&label.name) {
            return Err(*first);
        }
        self.table.insert(label.name.clone(), (addr, label.span));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Mailbox> {
        self.table.get(name).map(|(addr, _)| *addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonics_round_trip() {
        for op in Opcode::ALL {
            assert_eq!(op.mnemonic().parse::<Opcode>(), Ok(op));
        }
        assert!("jmp".parse::<Opcode>().is_err());
        assert!("".parse::<Opcode>().is_err());
    }

    #[test]
    fn mailbox_bounds() {
        assert_eq!(Mailbox::new(0).map(Mailbox::index), Some(0));
        assert_eq!(Mailbox::new(99).map(Mailbox::index), Some(99));
        assert_eq!(Mailbox::new(100), None);
        assert_eq!(Mailbox::try_from(-1i64), Err(-1));
        assert_eq!(Mailbox::try_from(150i64), Err(150));
        assert_eq!(Mailbox::try_from(42i64).map(Mailbox::index), Ok(42));
    }

    #[test]
    fn symbol_table_rejects_redefinition() {
        let mut table = SymbolTable::default();
        let first = Label::new("loop", Span::new(0, 4));
        let second = Label::new("loop", Span::new(20, 4));
        table.insert(&first, Mailbox::new(3).unwrap()).unwrap();
        assert_eq!(table.insert(&second, Mailbox::new(7).unwrap()), Err(first.span));
        assert_eq!(table.get("loop"), Mailbox::new(3));
    }
}
