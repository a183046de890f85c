use std::ops::Range;

use crate::{
    error::{AsmError, InvalidReason},
    image::{CellKind, Image},
    lexer::Span,
    symbol::{Label, Mailbox, Opcode, SymbolTable, Word},
};

/// Assembly intermediate representation, one statement per mailbox starting at 0.
#[derive(Debug, Default)]
pub struct Air {
    ast: Vec<AirStmt>,
}

/// Single statement. Has an optional label naming its own mailbox.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AirStmt {
    pub label: Option<Label>,
    pub opcode: Opcode,
    pub operand: Operand,
    /// Whole source line
    pub span: Span,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Operand {
    /// Label reference for memory and branch opcodes
    Label(Label),
    /// `dat` literal
    Value(Word),
    None,
}

impl Air {
    pub fn new() -> Self {
        Air { ast: Vec::new() }
    }

    pub fn add_stmt(&mut self, stmt: AirStmt) {
        self.ast.push(stmt)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AirStmt> {
        self.ast.iter()
    }

    /// Label pass: map every defined label to the mailbox of its line.
    pub fn symbols(&self) -> Result<SymbolTable, AsmError> {
        let mut table = SymbolTable::default();
        for (addr, stmt) in self.addressed() {
            let addr = addr?;
            if let Some(label) = &stmt.label {
                table
                    .insert(label, addr)
                    .map_err(|first| AsmError::DuplicateLabel {
                        label: label.name.clone(),
                        span: label.span.into(),
                        first: first.into(),
                    })?;
            }
        }
        Ok(table)
    }

    /// Encode pass: turn every statement into its mailbox word.
    pub fn emit(&self, symbols: &SymbolTable) -> Result<Image, AsmError> {
        let mut image = Image::new();
        for (addr, stmt) in self.addressed() {
            let (word, kind) = stmt.emit(symbols)?;
            image.set(addr?, word, kind);
        }
        Ok(image)
    }

    /// Both passes.
    pub fn assemble(&self) -> Result<Image, AsmError> {
        let symbols = self.symbols()?;
        self.emit(&symbols)
    }

    /// Address, encoded word and source text of every line, for display.
    pub fn listing<'a>(
        &'a self,
        src: &'a str,
    ) -> Result<Vec<(Mailbox, Word, &'a str)>, AsmError> {
        let symbols = self.symbols()?;
        self.addressed()
            .map(|(addr, stmt)| {
                let (word, _) = stmt.emit(&symbols)?;
                Ok((addr?, word, &src[Range::from(stmt.span)]))
            })
            .collect()
    }

    fn addressed(&self) -> impl Iterator<Item = (Result<Mailbox, AsmError>, &AirStmt)> {
        let lines = self.ast.len();
        self.ast.iter().enumerate().map(move |(idx, stmt)| {
            let addr = Mailbox::new(idx).ok_or_else(|| AsmError::ProgramTooLong {
                lines,
                span: stmt.span.into(),
            });
            (addr, stmt)
        })
    }
}

impl<'a> IntoIterator for &'a Air {
    type Item = &'a AirStmt;
    type IntoIter = std::slice::Iter<'a, AirStmt>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl AirStmt {
    pub fn emit(&self, symbols: &SymbolTable) -> Result<(Word, CellKind), AsmError> {
        let base = match self.opcode.base() {
            Some(base) => base,
            None => {
                let value = match self.operand {
                    Operand::Value(val) => val,
                    _ => 0,
                };
                return Ok((value, CellKind::Data));
            }
        };
        let word = match &self.operand {
            Operand::Label(label) => {
                let addr = symbols
                    .get(&label.name)
                    .ok_or_else(|| AsmError::InvalidAssemblyCode {
                        reason: InvalidReason::UnknownLabel(label.name.clone()),
                        span: label.span.into(),
                    })?;
                base + addr.index() as Word
            }
            Operand::Value(_) | Operand::None => base,
        };
        Ok((word, CellKind::Instr))
    }
}

#[cfg(test)]
mod tests {
    use crate::{error::AsmError, parser::AsmParser, symbol::Mailbox};

    fn air(src: &str) -> super::Air {
        AsmParser::new(src).parse().unwrap()
    }

    #[test]
    fn labels_map_to_line_index() {
        let symbols = air("start lda val\n out\n bra start\nend hlt\nval dat 4")
            .symbols()
            .unwrap();
        assert_eq!(symbols.get("start"), Mailbox::new(0));
        assert_eq!(symbols.get("end"), Mailbox::new(3));
        assert_eq!(symbols.get("val"), Mailbox::new(4));
        assert_eq!(symbols.get("missing"), None);
    }

    #[test]
    fn duplicate_label() {
        let err = air("x dat 1\nx dat 2").symbols().unwrap_err();
        assert!(matches!(err, AsmError::DuplicateLabel { ref label, .. } if label == "x"));
    }

    #[test]
    fn label_lookup_is_case_insensitive() {
        let image = air("BRA Done\nDONE HLT").assemble().unwrap();
        assert_eq!(&image.words()[..2], &[601, 0]);
        let image = air("BRA Été\nÉTÉ HLT").assemble().unwrap();
        assert_eq!(&image.words()[..2], &[601, 0]);
    }

    #[test]
    fn too_many_lines() {
        let src = "out\n".repeat(101);
        let err = air(&src).assemble().unwrap_err();
        assert!(matches!(err, AsmError::ProgramTooLong { lines: 101, .. }));
        // Exactly full memory is fine
        let src = "out\n".repeat(100);
        assert!(air(&src).assemble().is_ok());
    }

    #[test]
    fn listing_pairs_source_lines() {
        let src = "  lda ONE\n  out\nONE dat 1\n";
        let air = air(src);
        let listing = air.listing(src).unwrap();
        assert_eq!(listing.len(), 3);
        assert_eq!(listing[0], (Mailbox::new(0).unwrap(), 502, "lda ONE"));
        assert_eq!(listing[2], (Mailbox::new(2).unwrap(), 1, "ONE dat 1"));
    }
}
