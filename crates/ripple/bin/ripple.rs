//! ripple command-line calculator.
//!
//! All inputs run in one session, so the operand stack and variables
//! carry across `-e` chunks and files, the way a calculator keeps its
//! stack between keystrokes. With no input and a terminal on stdin, an
//! interactive loop shows the top stack levels after every line and
//! points a caret at parse errors.

use std::env;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::process::ExitCode;

use ripple::{EvalError, Session};

const USAGE: &str = "\
Usage: ripple [-e CODE | FILE | -]...

Evaluates every CODE chunk and FILE in order in a single session;
the stack persists from one input to the next. `-` reads stdin.
With no inputs, reads stdin, or starts interactively on a terminal.

Options:
  -e CODE    Evaluate CODE
  -h, --help Print this help message";

/// How many stack levels the interactive loop displays.
const SHOWN_LEVELS: usize = 4;

fn main() -> ExitCode {
    let mut inputs: Vec<(String, String)> = Vec::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("{USAGE}");
                return ExitCode::SUCCESS;
            }
            "-e" => match args.next() {
                Some(code) => inputs.push(("-e".into(), code)),
                None => {
                    eprintln!("ripple: -e expects code to evaluate\n{USAGE}");
                    return ExitCode::FAILURE;
                }
            },
            "-" => match read_stdin() {
                Ok(code) => inputs.push(("<stdin>".into(), code)),
                Err(e) => {
                    eprintln!("ripple: error reading stdin: {e}");
                    return ExitCode::FAILURE;
                }
            },
            flag if flag.starts_with('-') => {
                eprintln!("ripple: unknown option '{flag}'\n{USAGE}");
                return ExitCode::FAILURE;
            }
            file => match fs::read_to_string(file) {
                Ok(code) => inputs.push((file.to_string(), code)),
                Err(e) => {
                    eprintln!("ripple: error reading {file}: {e}");
                    return ExitCode::FAILURE;
                }
            },
        }
    }

    let mut session = Session::new();

    if inputs.is_empty() {
        if io::stdin().is_terminal() {
            return interact(&mut session);
        }
        match read_stdin() {
            Ok(code) => inputs.push(("<stdin>".into(), code)),
            Err(e) => {
                eprintln!("ripple: error reading stdin: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    for (label, code) in &inputs {
        if let Err(error) = session.eval(code) {
            report(label, code, &error);
            return ExitCode::FAILURE;
        }
    }
    for value in session.stack().unwrap_or_default() {
        println!("{value}");
    }
    ExitCode::SUCCESS
}

fn read_stdin() -> Result<String, io::Error> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

/// Line-by-line loop on a terminal: evaluate, then show the top stack
/// levels numbered calculator-style, level 1 on the bottom.
fn interact(session: &mut Session) -> ExitCode {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("» ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return ExitCode::SUCCESS, // end of input
            Ok(_) => {}
        }
        let source = line.trim();
        if source.is_empty() {
            continue;
        }
        match session.eval(source) {
            Ok(stack) => {
                let shown = stack.len().min(SHOWN_LEVELS);
                if stack.len() > shown {
                    println!("   ⋮");
                }
                for level in (1..=shown).rev() {
                    println!("{}: {}", level, stack[stack.len() - level]);
                }
            }
            Err(error) => report("<input>", source, &error),
        }
    }
}

/// One-line error report; parse errors add the offending source line
/// with a caret under the recorded position.
fn report(label: &str, code: &str, error: &EvalError) {
    eprintln!("{label}: {error}");
    let EvalError::Parse(state) = error else {
        return;
    };
    let Some(pos) = state.pos else {
        return;
    };
    let offset = (pos.offset() as usize).min(code.len());
    let line_start = code[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = code[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(code.len());
    let column = code[line_start..offset].chars().count();
    eprintln!("  {}", &code[line_start..line_end]);
    eprintln!("  {}^", " ".repeat(column));
}
