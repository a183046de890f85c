use std::{fmt, ops::ControlFlow, thread::sleep, time::Duration};

use crate::{
    error::RunError,
    image::{CellKind, Image},
    symbol::{Mailbox, Word, MAILBOX_COUNT},
};

/// Decoded instruction. Memory and branch operands are kept raw and only checked against the
/// mailbox range when executed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instr {
    Add(Word),
    Sub(Word),
    Store(Word),
    Load(Word),
    Branch(Word),
    BranchZero(Word),
    BranchPositive(Word),
    Input,
    Output,
    Halt,
}

impl Instr {
    /// Decode by hundreds digit. Anything unmapped, including negative words and words of four
    /// or more digits, is a halt.
    pub fn decode(word: Word) -> Instr {
        let addr = word % 100;
        match word / 100 {
            1 => Instr::Add(addr),
            2 => Instr::Sub(addr),
            3 => Instr::Store(addr),
            5 => Instr::Load(addr),
            6 => Instr::Branch(addr),
            7 => Instr::BranchZero(addr),
            8 => Instr::BranchPositive(addr),
            9 if word == 901 => Instr::Input,
            9 => Instr::Output,
            _ => Instr::Halt,
        }
    }

    fn operand(self) -> Option<Word> {
        match self {
            Instr::Add(addr)
            | Instr::Sub(addr)
            | Instr::Store(addr)
            | Instr::Load(addr)
            | Instr::Branch(addr)
            | Instr::BranchZero(addr)
            | Instr::BranchPositive(addr) => Some(addr),
            Instr::Input | Instr::Output | Instr::Halt => None,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Instr::Add(_) => "ADD",
            Instr::Sub(_) => "SUB",
            Instr::Store(_) => "STA",
            Instr::Load(_) => "LDA",
            Instr::Branch(_) => "BRA",
            Instr::BranchZero(_) => "BRZ",
            Instr::BranchPositive(_) => "BRP",
            Instr::Input => "INP",
            Instr::Output => "OUT",
            Instr::Halt => "HLT",
        };
        match self.operand() {
            Some(addr) => write!(f, "{name} {addr:02}"),
            None => f.write_str(name),
        }
    }
}

/// Result of a successful step.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Step {
    /// One instruction executed, machine still running
    Advanced,
    /// Halt executed, or the machine was already halted
    Halted,
}

/// Why [`RunState::run`] returned.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Exit {
    Halted,
    /// Input instruction reached with an empty inbox. State is unchanged; supply input and run
    /// again.
    NeedsInput,
    /// Step budget exhausted before halting
    StepLimit,
    /// Observer asked to stop
    Cancelled,
}

/// Controls for [`RunState::run_with`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    /// Stop after this many steps. `None` runs until halt.
    pub max_steps: Option<u64>,
    /// Pause between steps, for animated display. Has no effect on results.
    pub delay: Duration,
}

/// Represents complete machine state during runtime.
#[derive(Clone, Debug)]
pub struct RunState {
    /// The 100 mailboxes
    mem: Image,
    /// Program counter
    pc: usize,
    /// Accumulator, not clamped to three digits
    acc: Word,
    inbox: Option<Word>,
    outbox: Vec<Word>,
    halted: bool,
    /// Trace of the most recent instruction
    last_op: String,
    /// Mailboxes evaluated by the most recent instruction
    touched: Vec<Mailbox>,
    /// Instructions executed so far
    cycles: u64,
}

impl From<Image> for RunState {
    fn from(mem: Image) -> Self {
        RunState {
            mem,
            pc: 0,
            acc: 0,
            inbox: None,
            outbox: Vec::new(),
            halted: false,
            last_op: String::new(),
            touched: Vec::new(),
            cycles: 0,
        }
    }
}

impl RunState {
    pub fn new(image: Image) -> Self {
        Self::from(image)
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn acc(&self) -> Word {
        self.acc
    }

    pub fn registers(&self) -> &[Word; MAILBOX_COUNT] {
        self.mem.words()
    }

    pub fn mem(&self, addr: Mailbox) -> Word {
        self.mem[addr]
    }

    pub fn inbox(&self) -> Option<Word> {
        self.inbox
    }

    /// Place a value in the inbox, returning any value it replaces.
    pub fn set_inbox(&mut self, value: Word) -> Option<Word> {
        self.inbox.replace(value)
    }

    pub fn outbox(&self) -> &[Word] {
        &self.outbox
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn last_op(&self) -> &str {
        &self.last_op
    }

    pub fn touched(&self) -> &[Mailbox] {
        &self.touched
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Instruction at the program counter, if the counter is in range.
    pub fn current(&self) -> Option<Instr> {
        Mailbox::new(self.pc).map(|addr| Instr::decode(self.mem[addr]))
    }

    /// Fetch, decode and execute one instruction. Stepping a halted machine does nothing.
    ///
    /// On error the state is exactly as it was before the call.
    pub fn step(&mut self) -> Result<Step, RunError> {
        if self.halted {
            return Ok(Step::Halted);
        }
        let pc = mailbox(self.pc as Word)?;
        if self.mem.kind(pc) == CellKind::Data {
            return Err(RunError::Generic { addr: self.pc });
        }
        self.execute(Instr::decode(self.mem[pc]))
    }

    /// Execute `instr` as if it were stored at the program counter.
    ///
    /// All checks happen before any mutation, so an error leaves the state untouched.
    pub fn execute(&mut self, instr: Instr) -> Result<Step, RunError> {
        let here = mailbox(self.pc as Word)?;
        let mut touched = vec![here];

        match instr {
            Instr::Add(raw) => {
                let m = mailbox(raw)?;
                let val = self.mem[m];
                let res = self.acc.checked_add(val).ok_or(RunError::Overflow {
                    acc: self.acc,
                    operand: val,
                })?;
                self.last_op = format!(
                    "Add the value in mailbox {m} ({val}) to the accumulator ({}), giving {res}",
                    self.acc
                );
                self.acc = res;
                self.pc += 1;
                touched.push(m);
            }
            Instr::Sub(raw) => {
                let m = mailbox(raw)?;
                let val = self.mem[m];
                let res = self.acc.checked_sub(val).ok_or(RunError::Overflow {
                    acc: self.acc,
                    operand: val,
                })?;
                self.last_op = format!(
                    "Subtract the value in mailbox {m} ({val}) from the accumulator ({}), giving {res}",
                    self.acc
                );
                self.acc = res;
                self.pc += 1;
                touched.push(m);
            }
            Instr::Store(raw) => {
                let m = mailbox(raw)?;
                // A stored word is no longer assembler data, so it may be executed
                self.mem.set(m, self.acc, CellKind::Instr);
                self.last_op = format!("Store the accumulator ({}) in mailbox {m}", self.acc);
                self.pc += 1;
                touched.push(m);
            }
            Instr::Load(raw) => {
                let m = mailbox(raw)?;
                self.acc = self.mem[m];
                self.last_op = format!(
                    "Load the value in mailbox {m} ({}) into the accumulator",
                    self.acc
                );
                self.pc += 1;
                touched.push(m);
            }
            Instr::Branch(raw) => {
                let m = mailbox(raw)?;
                self.pc = m.index();
                self.last_op = format!("Branch to mailbox {m}");
            }
            Instr::BranchZero(raw) => {
                let m = mailbox(raw)?;
                if self.acc == 0 {
                    self.pc = m.index();
                    self.last_op = format!("Branch if zero: accumulator is 0, branch to mailbox {m}");
                } else {
                    self.pc += 1;
                    self.last_op = format!(
                        "Branch if zero: accumulator is {}, do not branch",
                        self.acc
                    );
                }
            }
            Instr::BranchPositive(raw) => {
                let m = mailbox(raw)?;
                if self.acc >= 0 {
                    self.pc = m.index();
                    self.last_op = format!(
                        "Branch if positive: accumulator is {}, branch to mailbox {m}",
                        self.acc
                    );
                } else {
                    self.pc += 1;
                    self.last_op = format!(
                        "Branch if positive: accumulator is {}, do not branch",
                        self.acc
                    );
                }
            }
            Instr::Input => {
                let val = self.inbox.take().ok_or(RunError::InputNeeded)?;
                self.acc = val;
                self.pc += 1;
                self.last_op = format!("Input {val} from the inbox into the accumulator");
            }
            Instr::Output => {
                self.outbox.push(self.acc);
                self.pc += 1;
                self.last_op = format!("Output the accumulator ({}) to the outbox", self.acc);
            }
            Instr::Halt => {
                self.halted = true;
                self.last_op = String::from("Program complete");
            }
        }

        self.touched = touched;
        self.cycles += 1;
        Ok(if self.halted {
            Step::Halted
        } else {
            Step::Advanced
        })
    }

    /// Step until halted, blocked on input, or `max_steps` steps have executed.
    pub fn run(&mut self, max_steps: Option<u64>) -> Result<Exit, RunError> {
        let opts = RunOptions {
            max_steps,
            ..Default::default()
        };
        self.run_with(&opts, |_| ControlFlow::Continue(()))
    }

    /// Like [`RunState::run`], pausing `opts.delay` between steps and calling `observe` after
    /// every executed step. Returning `ControlFlow::Break` from `observe` stops the run.
    /// Cancellation is only checked between steps.
    pub fn run_with<F>(&mut self, opts: &RunOptions, mut observe: F) -> Result<Exit, RunError>
    where
        F: FnMut(&RunState) -> ControlFlow<()>,
    {
        let mut steps = 0;
        loop {
            if self.halted {
                return Ok(Exit::Halted);
            }
            if opts.max_steps.is_some_and(|max| steps >= max) {
                return Ok(Exit::StepLimit);
            }
            if steps > 0 && !opts.delay.is_zero() {
                sleep(opts.delay);
            }

            match self.step() {
                Ok(_) => steps += 1,
                Err(RunError::InputNeeded) => return Ok(Exit::NeedsInput),
                Err(e) => return Err(e),
            }

            if observe(self).is_break() {
                return Ok(if self.halted {
                    Exit::Halted
                } else {
                    Exit::Cancelled
                });
            }
        }
    }
}

fn mailbox(raw: Word) -> Result<Mailbox, RunError> {
    Mailbox::try_from(raw).map_err(|addr| RunError::MailboxOutOfBounds { addr })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compile;

    /// Sum program: 1 + 10, output, + 3, output.
    fn sum_state() -> RunState {
        #[rustfmt::skip]
        let words = [506, 107, 902, 108, 902, 0, 1, 10, 3];
        RunState::new(Image::from_words(&words).unwrap())
    }

    fn state_with(words: &[Word], acc: Word) -> RunState {
        let mut state = RunState::new(Image::from_words(words).unwrap());
        state.acc = acc;
        state
    }

    #[test]
    fn decode() {
        #[rustfmt::skip]
        let cases = [
            (105, Instr::Add(5)),
            (299, Instr::Sub(99)),
            (300, Instr::Store(0)),
            (542, Instr::Load(42)),
            (610, Instr::Branch(10)),
            (711, Instr::BranchZero(11)),
            (812, Instr::BranchPositive(12)),
            (901, Instr::Input),
            (902, Instr::Output),
            (950, Instr::Output),
            (0, Instr::Halt),
            (42, Instr::Halt),
            (450, Instr::Halt),
            (-150, Instr::Halt),
            (1234, Instr::Halt),
        ];
        for (word, expected) in cases {
            assert_eq!(Instr::decode(word), expected, "decode({word})");
        }
    }

    #[test]
    fn display_disassembles() {
        assert_eq!(Instr::decode(506).to_string(), "LDA 06");
        assert_eq!(Instr::decode(901).to_string(), "INP");
        assert_eq!(Instr::decode(0).to_string(), "HLT");
    }

    #[test]
    fn current_instruction() {
        let mut state = sum_state();
        assert_eq!(state.current(), Some(Instr::Load(6)));
        state.step().unwrap();
        assert_eq!(state.current(), Some(Instr::Add(7)));
        state.pc = MAILBOX_COUNT;
        assert_eq!(state.current(), None);
    }

    #[test]
    fn single_step() {
        let mut state = sum_state();
        assert_eq!(state.step(), Ok(Step::Advanced));
        assert_eq!(state.pc(), 1);
        assert_eq!(state.acc(), 1);
        assert_eq!(state.touched(), &[Mailbox::new(0).unwrap(), Mailbox::new(6).unwrap()]);
        assert!(state.last_op().contains("mailbox 06"));
        assert_eq!(state.cycles(), 1);
    }

    #[test]
    fn runs_to_halt() {
        let mut state = sum_state();
        assert_eq!(state.run(None), Ok(Exit::Halted));
        assert_eq!(state.outbox(), &[11, 14]);
        assert_eq!(state.acc(), 14);
        assert_eq!(state.pc(), 5);
        assert!(state.is_halted());
        assert_eq!(state.inbox(), None);
        assert_eq!(state.last_op(), "Program complete");
    }

    #[test]
    fn halt_keeps_pc() {
        let mut state = state_with(&[0], 0);
        assert_eq!(state.step(), Ok(Step::Halted));
        assert!(state.is_halted());
        assert_eq!(state.pc(), 0);
        // Halted is terminal
        assert_eq!(state.step(), Ok(Step::Halted));
        assert_eq!(state.cycles(), 1);
    }

    #[test]
    fn branch_if_zero() {
        for (acc, pc) in [(0, 50), (1, 1), (-1, 1), (999, 1)] {
            let mut state = state_with(&[750], acc);
            state.step().unwrap();
            assert_eq!(state.pc(), pc, "brz with acc {acc}");
        }
    }

    #[test]
    fn branch_if_positive() {
        for (acc, pc) in [(0, 50), (7, 50), (-1, 1), (-500, 1)] {
            let mut state = state_with(&[850], acc);
            state.step().unwrap();
            assert_eq!(state.pc(), pc, "brp with acc {acc}");
        }
    }

    #[test]
    fn branch_always() {
        let mut state = state_with(&[699], -3);
        state.step().unwrap();
        assert_eq!(state.pc(), 99);
    }

    #[test]
    fn store_and_subtract() {
        let mut state = state_with(&[320, 220, 0], 5);
        state.step().unwrap();
        assert_eq!(state.registers()[20], 5);
        state.step().unwrap();
        assert_eq!(state.acc(), 0);
    }

    #[test]
    fn input_needed_leaves_state() {
        let mut state = state_with(&[901, 0], 17);
        let before = (state.acc(), state.pc(), state.inbox(), state.cycles());
        let err = state.step().unwrap_err();
        assert_eq!(err, RunError::InputNeeded);
        assert!(err.is_recoverable());
        assert_eq!((state.acc(), state.pc(), state.inbox(), state.cycles()), before);

        // Supplying input unblocks
        assert_eq!(state.set_inbox(8), None);
        assert_eq!(state.step(), Ok(Step::Advanced));
        assert_eq!(state.acc(), 8);
        assert_eq!(state.inbox(), None);
        assert_eq!(state.pc(), 1);
    }

    #[test]
    fn out_of_bounds_operand() {
        let mut state = state_with(&[0], 3);
        let err = state.execute(Instr::Store(150)).unwrap_err();
        assert_eq!(err, RunError::MailboxOutOfBounds { addr: 150 });
        assert!(!err.is_recoverable());
        assert_eq!(state.acc(), 3);
        assert_eq!(state.pc(), 0);
        assert!(state.registers().iter().all(|w| *w == 0));

        let err = state.execute(Instr::Load(-1)).unwrap_err();
        assert_eq!(err, RunError::MailboxOutOfBounds { addr: -1 });
    }

    #[test]
    fn running_off_the_end() {
        let mut state = state_with(&[], 0);
        state.pc = 99;
        state.mem.set(Mailbox::new(99).unwrap(), 902, CellKind::Instr);
        assert_eq!(state.step(), Ok(Step::Advanced));
        assert_eq!(state.pc(), 100);
        assert_eq!(state.step(), Err(RunError::MailboxOutOfBounds { addr: 100 }));
        assert_eq!(state.outbox(), &[0]);
    }

    #[test]
    fn executing_data_is_a_fault() {
        let mut state = RunState::new(compile("lda one\none dat 5").unwrap());
        state.step().unwrap();
        assert_eq!(state.step(), Err(RunError::Generic { addr: 1 }));
        assert_eq!(state.pc(), 1);
        assert_eq!(state.acc(), 5);
    }

    #[test]
    fn stored_cell_is_executable() {
        // Writes `OUT` over a data cell, then falls into it
        let src = "lda code\nsta slot\nslot dat\nhlt\ncode dat 902";
        let mut state = RunState::new(compile(src).unwrap());
        assert_eq!(state.run(Some(10)), Ok(Exit::Halted));
        assert_eq!(state.outbox(), &[902]);
    }

    #[test]
    fn overflow_is_a_fault() {
        let mut state = state_with(&[101, 0], Word::MAX);
        state.mem.set(Mailbox::new(1).unwrap(), 1, CellKind::Data);
        let err = state.step().unwrap_err();
        assert_eq!(
            err,
            RunError::Overflow {
                acc: Word::MAX,
                operand: 1
            }
        );
        assert_eq!(state.acc(), Word::MAX);
        assert_eq!(state.pc(), 0);
    }

    #[test]
    fn run_stops_for_input() {
        let mut state = state_with(&[901, 902, 0], 0);
        assert_eq!(state.run(None), Ok(Exit::NeedsInput));
        state.set_inbox(12);
        assert_eq!(state.run(None), Ok(Exit::Halted));
        assert_eq!(state.outbox(), &[12]);
    }

    #[test]
    fn step_limit() {
        // Infinite loop
        let mut state = state_with(&[600], 0);
        assert_eq!(state.run(Some(25)), Ok(Exit::StepLimit));
        assert_eq!(state.cycles(), 25);
    }

    #[test]
    fn observer_cancels() {
        let mut state = state_with(&[600], 0);
        let mut seen = 0;
        let exit = state.run_with(&RunOptions::default(), |_| {
            seen += 1;
            if seen == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(exit, Ok(Exit::Cancelled));
        assert_eq!(state.cycles(), 3);
    }
}
