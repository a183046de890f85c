use std::fmt;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::symbol::{Opcode, Word};

// Assembler errors

/// Fatal error for a whole compilation. No partial image is produced.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("Invalid assembly code: {reason}")]
    #[diagnostic(
        code(asm::invalid),
        help("lines take the form `[label] mnemonic [operand]`")
    )]
    InvalidAssemblyCode {
        reason: InvalidReason,
        #[label("invalid line")]
        span: SourceSpan,
    },

    #[error("Expected an integer literal, found `{found}`")]
    #[diagnostic(
        code(asm::int_expected),
        help("`dat` takes an optional decimal literal like `dat 10` or `dat -3`")
    )]
    IntExpected {
        found: String,
        #[label("not an integer")]
        span: SourceSpan,
    },

    #[error("Unknown mnemonic `{found}`")]
    #[diagnostic(
        code(asm::bad_opcode),
        help("valid mnemonics are add, sub, sta, lda, bra, brz, brp, inp, out, hlt and dat")
    )]
    BadOpcode {
        found: String,
        #[label("unknown mnemonic")]
        span: SourceSpan,
    },

    #[error("Duplicate label `{label}`")]
    #[diagnostic(
        code(asm::duplicate_label),
        help("labels may only be defined once per program")
    )]
    DuplicateLabel {
        label: String,
        #[label("redefined here")]
        span: SourceSpan,
        #[label("first defined here")]
        first: SourceSpan,
    },

    #[error("Program is {lines} lines long but only 100 mailboxes exist")]
    #[diagnostic(
        code(asm::too_long),
        help("every line occupies one mailbox; shorten the program")
    )]
    ProgramTooLong {
        lines: usize,
        #[label("this line does not fit")]
        span: SourceSpan,
    },
}

/// Reason a line is [`AsmError::InvalidAssemblyCode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvalidReason {
    /// Lines hold one to three words.
    TokenCount(usize),
    MissingOperand(Opcode),
    /// `dat` with neither a label nor a value
    BareData,
    UnknownLabel(String),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenCount(count) => write!(f, "expected 1 to 3 words, found {count}"),
            Self::MissingOperand(op) => write!(f, "`{op}` requires a label operand"),
            Self::BareData => write!(f, "`dat` requires a label or a value"),
            Self::UnknownLabel(name) => write!(f, "label `{name}` is never defined"),
        }
    }
}

// Runtime errors

/// Error for a single step. The machine state is left exactly as it was before the step.
#[derive(Error, Diagnostic, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunError {
    #[error("Input needed: the inbox is empty")]
    #[diagnostic(
        code(run::input_needed),
        help("supply an inbox value and step again")
    )]
    InputNeeded,

    #[error("Mailbox {addr} is out of bounds")]
    #[diagnostic(
        code(run::mailbox_bounds),
        help("mailboxes are numbered 0 to 99; the program may have run off its end")
    )]
    MailboxOutOfBounds { addr: Word },

    #[error("Executed data cell at mailbox {addr}")]
    #[diagnostic(
        code(run::generic),
        help("execution reached a `dat` cell; check for a missing `hlt` or a bad branch")
    )]
    Generic { addr: usize },

    #[error("Accumulator overflow computing {acc} with {operand}")]
    #[diagnostic(code(run::overflow))]
    Overflow { acc: Word, operand: Word },
}

impl RunError {
    /// Whether the caller can fix the state and retry the same step.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RunError::InputNeeded)
    }
}
