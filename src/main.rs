use std::fs;
use std::io::{stdin, BufRead, IsTerminal};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use console::Term;
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, miette, IntoDiagnostic, NamedSource, Report, Result};

use lmc::output::{self, MsgColor};
use lmc::{AsmParser, Exit, Image, RunOptions, RunState, Word};

/// lmc is an assembler and virtual machine for the Little Man Computer.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a source file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble and run a source file, printing the outbox to stdout
    Run {
        /// Source file to run
        name: PathBuf,
        /// Inbox values to use before prompting, comma separated
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        input: Vec<Word>,
        /// Print a description of every executed step
        #[arg(short, long)]
        trace: bool,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
        /// Milliseconds to pause between steps
        #[arg(short, long, default_value_t = 0)]
        delay: u64,
        /// Give up after this many steps (0 for no limit)
        #[arg(long)]
        max_steps: Option<u64>,
    },
    /// Assemble a source file and print or save the 100-mailbox image
    Compile {
        /// Source file to compile
        name: PathBuf,
        /// Destination to write the image to
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Show address, word and source line for every line
        #[arg(short, long)]
        listing: bool,
    },
    /// Check source files without running them
    Check {
        /// File or glob pattern of files to check
        pattern: String,
    },
    /// Place a watch on a source file to receive constant assembler updates
    Watch {
        /// Source file to watch
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    lmc::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(lmc::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    if let Some(command) = args.command {
        match command {
            Command::Run {
                name,
                input,
                trace,
                minimal,
                delay,
                max_steps,
            } => {
                let opts = RunOptions {
                    max_steps: match max_steps {
                        Some(0) => None,
                        Some(max) => Some(max),
                        None => lmc::env::max_steps(),
                    },
                    delay: Duration::from_millis(delay),
                };
                output::set_minimal(minimal);
                run(&name, input, trace || lmc::env::is_trace_enabled(), &opts)
            }
            Command::Compile {
                name,
                output: dest,
                listing,
            } => {
                file_message(Green, "Assembling", &name);
                let src = read_source(&name)?;
                let image = assemble(&name, &src)?;

                let text = if listing {
                    let air = AsmParser::new(&src)
                        .parse()
                        .map_err(|e| report(&name, &src, e))?;
                    let lines = air.listing(&src).map_err(|e| report(&name, &src, e))?;
                    lines
                        .iter()
                        .map(|(addr, word, line)| format!("{addr}  {word:03}  {line}\n"))
                        .collect::<String>()
                } else {
                    image.to_string()
                };

                match dest {
                    Some(dest) => {
                        fs::write(&dest, text).into_diagnostic()?;
                        message(Green, "Finished", "emit image");
                        file_message(Green, "Saved", &dest);
                    }
                    None => print!("{text}"),
                }
                Ok(())
            }
            Command::Check { pattern } => {
                let paths = glob::glob(&pattern).into_diagnostic()?;
                let mut checked = 0;
                for path in paths {
                    let path = path.into_diagnostic()?;
                    file_message(Green, "Checking", &path);
                    let src = read_source(&path)?;
                    assemble(&path, &src)?;
                    checked += 1;
                }
                if checked == 0 {
                    bail!("No files match `{pattern}`");
                }
                message(Green, "Success", "no errors found!");
                Ok(())
            }
            Command::Watch { name } => {
                if !name.exists() {
                    bail!("File does not exist. Exiting...")
                }
                // Vim breaks if watching a single file
                let folder_path = match name.parent() {
                    Some(pth) if pth.is_dir() => pth.to_path_buf(),
                    _ => Path::new(".").to_path_buf(),
                };

                // Clear screen and move cursor to top left
                print!("\x1B[2J\x1B[2;1H");
                file_message(Green, "Watching", &name);
                message(Cyan, "Help", "press CTRL+C to exit");

                let mut watcher = Hotwatch::new_with_custom_delay(Duration::from_millis(500))
                    .into_diagnostic()?;

                watcher
                    .watch(folder_path, move |event: Event| match event.kind {
                        // Watch remove for vim changes
                        EventKind::Modify(_) | EventKind::Remove(_) => {
                            print!("\x1B[2J\x1B[2;1H");
                            file_message(Green, "Watching", &name);
                            message(Green, "Re-checking", "file change detected");
                            message(Cyan, "Help", "press CTRL+C to exit");

                            // Makes reruns more obvious
                            sleep(Duration::from_millis(50));

                            match read_source(&name).and_then(|src| assemble(&name, &src)) {
                                Ok(_) => message(Green, "Success", "no errors found!"),
                                Err(e) => eprintln!("\n{:?}", e),
                            }
                            Flow::Continue
                        }
                        _ => Flow::Continue,
                    })
                    .into_diagnostic()?;
                watcher.run();
                Ok(())
            }
        }
    } else if let Some(path) = args.path {
        let opts = RunOptions {
            max_steps: lmc::env::max_steps(),
            ..Default::default()
        };
        run(&path, Vec::new(), lmc::env::is_trace_enabled(), &opts)
    } else {
        println!("\n~ lmc v{VERSION} ~");
        println!("{}", LOGO.truecolor(255, 183, 197).bold());
        println!("{SHORT_INFO}");
        Ok(())
    }
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    output::message(color, left, right)
}

fn read_source(name: &Path) -> Result<String> {
    fs::read_to_string(name)
        .into_diagnostic()
        .map_err(|e| e.wrap_err(format!("Failed to read {}", name.display())))
}

/// Assemble source, attaching it to any error so the report can show context
fn assemble(name: &Path, src: &str) -> Result<Image> {
    lmc::compile(src).map_err(|e| report(name, src, e))
}

fn report(name: &Path, src: &str, err: lmc::AsmError) -> Report {
    Report::new(err).with_source_code(NamedSource::new(name.display().to_string(), src.to_owned()))
}

fn run(name: &Path, mut queued: Vec<Word>, trace: bool, opts: &RunOptions) -> Result<()> {
    file_message(MsgColor::Green, "Assembling", name);
    let src = read_source(name)?;
    let image = assemble(name, &src)?;
    let mut state = RunState::new(image);
    // Feed queued input front to back
    queued.reverse();

    message(MsgColor::Green, "Running", "assembled image");
    let mut printed = 0;
    let mut budget = opts.max_steps;
    loop {
        let before = state.cycles();
        let step_opts = RunOptions {
            max_steps: budget,
            delay: opts.delay,
        };
        let exit = state.run_with(&step_opts, |state| {
            if trace {
                output::print_trace(state);
            }
            for value in &state.outbox()[printed..] {
                output::print_output(*value);
            }
            printed = state.outbox().len();
            ControlFlow::Continue(())
        });
        let exit = match exit {
            Ok(exit) => exit,
            Err(e) => {
                if trace {
                    output::print_state(&state);
                }
                return Err(Report::new(e).wrap_err(format!("Fault at mailbox {:02}", state.pc())));
            }
        };
        budget = budget.map(|max| max.saturating_sub(state.cycles() - before));

        match exit {
            Exit::Halted => break,
            Exit::NeedsInput => {
                let value = match queued.pop() {
                    Some(value) => value,
                    None => read_input()?,
                };
                state.set_inbox(value);
            }
            Exit::StepLimit => {
                bail!(
                    "Step limit reached after {} steps without halting",
                    state.cycles()
                )
            }
            Exit::Cancelled => break,
        }
    }

    if trace {
        output::print_state(&state);
    }
    message(MsgColor::Cyan, "Halted", &format!("after {} steps", state.cycles()));
    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

/// Read one integer for the inbox from the terminal or piped stdin.
fn read_input() -> Result<Word> {
    let line = if stdin().is_terminal() {
        let term = Term::stderr();
        term.write_str("inbox> ").into_diagnostic()?;
        term.read_line().into_diagnostic()?
    } else {
        let mut line = String::new();
        if stdin().lock().read_line(&mut line).into_diagnostic()? == 0 {
            bail!("Input needed but stdin is closed");
        }
        line
    };
    line.trim()
        .parse::<Word>()
        .map_err(|e| miette!("Expected an integer for the inbox, found `{}`: {e}", line.trim()))
}

const LOGO: &str = r#"
  _
 | |_ __ ___   ___
 | | '_ ` _ \ / __|
 | | | | | | | (__
 |_|_| |_| |_|\___|"#;

const SHORT_INFO: &str = r"
Welcome to lmc, an assembler and virtual machine for the Little Man Computer:
one hundred mailboxes, one accumulator, an inbox and an outbox.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
