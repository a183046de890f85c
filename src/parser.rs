use std::vec::IntoIter;

use crate::{
    air::{Air, AirStmt, Operand},
    error::{AsmError, InvalidReason},
    lexer::{self, Line, Token},
    symbol::{Label, Opcode, OperandKind, Word},
};

/// Transforms source lines into AIR
pub struct AsmParser<'a> {
    /// Reference to the source file
    src: &'a str,
    /// Non-empty lines of word tokens
    lines: IntoIter<Line>,
    /// Assembly intermediate representation
    air: Air,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Self {
        AsmParser {
            src,
            lines: lexer::lines(src).into_iter(),
            air: Air::new(),
        }
    }

    /// Create AIR out of source lines. Stops at the first invalid line.
    pub fn parse(mut self) -> Result<Air, AsmError> {
        while let Some(line) = self.lines.next() {
            let stmt = self.parse_line(&line)?;
            self.air.add_stmt(stmt);
        }
        // Consume self to return AIR
        Ok(self.air)
    }

    /// Classify a line by its word count.
    fn parse_line(&self, line: &Line) -> Result<AirStmt, AsmError> {
        let (label, opcode, operand) = match line.words.as_slice() {
            [op] => (None, self.expect_opcode(op)?, None),
            [first, second] => self.parse_pair(first, second)?,
            [label, op, operand] => (Some(*label), self.expect_opcode(op)?, Some(*operand)),
            words => {
                return Err(AsmError::InvalidAssemblyCode {
                    reason: InvalidReason::TokenCount(words.len()),
                    span: line.span.into(),
                })
            }
        };

        let label = label.map(|tok| Label::new(tok.text(self.src), tok.span));
        let operand = self.parse_operand(opcode, operand, line)?;

        // `dat` needs a label or a value, or nothing can refer to it
        if opcode == Opcode::Dat && label.is_none() && operand == Operand::None {
            return Err(AsmError::InvalidAssemblyCode {
                reason: InvalidReason::BareData,
                span: line.span.into(),
            });
        }

        Ok(AirStmt {
            label,
            opcode,
            operand,
            span: line.span,
        })
    }

    /// Two words are either `dat <value>`, `<label> <zero-operand opcode or dat>` or
    /// `<opcode> <label>`.
    fn parse_pair(
        &self,
        first: &Token,
        second: &Token,
    ) -> Result<(Option<Token>, Opcode, Option<Token>), AsmError> {
        let first_op = first.text(self.src).parse::<Opcode>().ok();
        let second_op = second.text(self.src).parse::<Opcode>().ok();

        match (first_op, second_op) {
            (Some(Opcode::Dat), _) => Ok((None, Opcode::Dat, Some(*second))),
            (_, Some(op @ (Opcode::Dat | Opcode::Hlt))) => Ok((Some(*first), op, None)),
            (Some(op), _) => Ok((None, op, Some(*second))),
            (None, _) => Err(self.bad_opcode(first)),
        }
    }

    fn parse_operand(
        &self,
        opcode: Opcode,
        operand: Option<Token>,
        line: &Line,
    ) -> Result<Operand, AsmError> {
        match (opcode.operand(), operand) {
            (OperandKind::Label, Some(tok)) => {
                Ok(Operand::Label(Label::new(tok.text(self.src), tok.span)))
            }
            (OperandKind::Literal, Some(tok)) => Ok(Operand::Value(self.expect_int(&tok)?)),
            (OperandKind::Label, None) => Err(AsmError::InvalidAssemblyCode {
                reason: InvalidReason::MissingOperand(opcode),
                span: line.span.into(),
            }),
            // Zero-operand opcodes encode to a fixed word, so a trailing word is never resolved
            (OperandKind::None, _) | (OperandKind::Literal, None) => Ok(Operand::None),
        }
    }

    fn expect_opcode(&self, tok: &Token) -> Result<Opcode, AsmError> {
        tok.text(self.src)
            .parse::<Opcode>()
            .map_err(|_| self.bad_opcode(tok))
    }

    fn expect_int(&self, tok: &Token) -> Result<Word, AsmError> {
        let text = tok.text(self.src);
        text.parse::<Word>().map_err(|_| AsmError::IntExpected {
            found: text,
            span: tok.span.into(),
        })
    }

    fn bad_opcode(&self, tok: &Token) -> AsmError {
        AsmError::BadOpcode {
            found: tok.text(self.src),
            span: tok.span.into(),
        }
    }
}
