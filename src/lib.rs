// Assembling
mod lexer;
pub use lexer::Span;
mod parser;
pub use parser::AsmParser;
mod air;
pub use air::{Air, AirStmt, Operand};
mod symbol;
pub use symbol::{Label, Mailbox, Opcode, OperandKind, SymbolTable, Word, MAILBOX_COUNT};
mod image;
pub use image::{CellKind, Image};

// Running
mod runtime;
pub use runtime::{Exit, Instr, RunOptions, RunState, Step};

mod error;
pub use error::{AsmError, InvalidReason, RunError};

pub mod env;
pub mod output;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;

/// Assemble source text into a 100-mailbox image. Fails on the first invalid line.
pub fn compile(src: &str) -> Result<Image, AsmError> {
    AsmParser::new(src).parse()?.assemble()
}
