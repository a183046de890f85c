use std::cell::RefCell;

use colored::Colorize;

use crate::runtime::RunState;
use crate::symbol::{Mailbox, Word, MAILBOX_COUNT};

#[derive(Clone, Copy, Debug)]
pub enum MsgColor {
    Green,
    Cyan,
    Red,
}

thread_local! {
    static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
}

/// Strip colour and decoration from everything printed afterwards. Returns the previous value.
pub fn set_minimal(new_value: bool) -> bool {
    IS_MINIMAL.with(|value| value.replace(new_value))
}

pub fn is_minimal() -> bool {
    IS_MINIMAL.with(|value| *value.borrow())
}

/// Right-aligned status verb followed by a message, on stderr so stdout only holds outbox values.
pub fn message(color: MsgColor, left: &str, right: &str) {
    if is_minimal() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    eprintln!("{:>12} {right}", left.bold());
}

/// Print a value taken from the outbox.
pub fn print_output(value: Word) {
    println!("{value}");
}

/// One line describing the step just executed.
pub fn print_trace(state: &RunState) {
    let line = format!("[{:>4}] {}", state.cycles(), state.last_op());
    if is_minimal() {
        eprintln!("{line}");
    } else {
        eprintln!("{}", line.dimmed());
    }
}

/// Registers and the 10x10 mailbox grid. Mailboxes touched by the last step are highlighted.
pub fn print_state(state: &RunState) {
    eprint!("{}", render_state(state));
}

pub fn render_state(state: &RunState) -> String {
    let minimal = is_minimal();
    let mut out = String::new();
    let inbox = state
        .inbox()
        .map_or_else(|| String::from("-"), |value| value.to_string());
    let next = state
        .current()
        .map_or_else(|| String::from("-"), |instr| instr.to_string());
    out.push_str(&format!(
        "PC {:02}  ACC {}  INBOX {}  CYCLES {}  NEXT {}\n",
        state.pc(),
        state.acc(),
        inbox,
        state.cycles(),
        next
    ));

    for row in 0..MAILBOX_COUNT / 10 {
        let cells = (0..10)
            .filter_map(|col| Mailbox::new(row * 10 + col))
            .map(|addr| {
                let cell = format!("{:>4}", state.mem(addr));
                if minimal {
                    cell
                } else if state.touched().contains(&addr) {
                    cell.yellow().bold().to_string()
                } else if addr.index() == state.pc() {
                    cell.cyan().to_string()
                } else {
                    cell
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        if minimal {
            out.push_str(&format!("{:02} {cells}\n", row * 10));
        } else {
            out.push_str(&format!("{} {cells}\n", format!("{:02}", row * 10).dimmed()));
        }
    }
    out
}

/// Remove ANSI colour sequences.
pub fn decolor(string: &str) -> String {
    let mut res = String::with_capacity(string.len());
    let mut chars = string.chars();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            // Sequence ends at the first 'm', or runs to the end of the string
            let _ = chars.by_ref().find(|&c| c == 'm');
        } else {
            res.push(ch);
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;

    #[test]
    fn strips_escape_sequences() {
        assert_eq!(decolor("abcdef"), "abcdef");
        assert_eq!(decolor("abc\x1b[0;2mdef\x1b[0m"), "abcdef");
        assert_eq!(decolor("abc\x1b[0xyz"), "abc");
        assert_eq!(decolor("abc\x1bw[0bxyzmdef"), "abcdef");
    }

    #[test]
    fn renders_grid() {
        let mut state = RunState::new(compile("lda one\nhlt\none dat 7").unwrap());
        state.step().unwrap();
        let text = decolor(&render_state(&state));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "PC 01  ACC 7  INBOX -  CYCLES 1  NEXT HLT");
        assert!(lines[1].starts_with("00  502    0    7    0"));
    }
}
