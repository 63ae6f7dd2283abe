//! minnow — entry point and interpreter loop.
//!
//! Three modes, picked from the command line:
//!
//! - `minnow -c 'cmd'` — run one command string and exit
//! - `minnow script.sh` — run a script file and exit
//! - `minnow` — interactive REPL
//!
//! The REPL reads with a raw, interruptible `read(2)` (`SIGINT` is installed
//! without `SA_RESTART`), so Ctrl-C abandons the current line and redraws
//! the prompt. Background jobs are reaped and reported just before each
//! prompt. Unterminated quotes and a trailing `\` pull continuation lines
//! with a `> ` prompt, like the parser's other consumers never see.

use std::io::Write;

use minnow::state::ShellState;
use minnow::{exec, parser, signals};

fn main() {
    let mut args = std::env::args().skip(1);
    let mut command: Option<String> = None;
    let mut script: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" => match args.next() {
                Some(cmd) => command = Some(cmd),
                None => {
                    eprintln!("minnow: -c requires an argument");
                    std::process::exit(2);
                }
            },
            "-h" | "--help" => {
                println!("Usage: minnow [-c command] [script]");
                return;
            }
            "--version" => {
                println!("minnow {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            _ => {
                script = Some(arg);
                break;
            }
        }
    }

    let interactive =
        command.is_none() && script.is_none() && unsafe { libc::isatty(libc::STDIN_FILENO) } == 1;

    let mut state = ShellState::new(interactive);
    init_logging(&state);
    signals::install();

    if interactive {
        // own process group, owning the terminal
        unsafe {
            let pid = libc::getpid();
            libc::setpgid(pid, pid);
            libc::tcsetpgrp(libc::STDIN_FILENO, pid);
        }
        state.shell_pgid = unsafe { libc::getpgrp() };
    }

    let status = match (command, script) {
        (Some(cmd), _) => run_source(&cmd, "-c", &mut state),
        (None, Some(path)) => match std::fs::read_to_string(&path) {
            Ok(content) => run_source(&content, &path, &mut state),
            Err(e) => {
                eprintln!("minnow: {}: {}", path, e);
                127
            }
        },
        (None, None) => {
            if interactive {
                repl(&mut state)
            } else {
                // stdin is not a terminal: treat it as a script
                let mut content = String::new();
                match std::io::Read::read_to_string(&mut std::io::stdin(), &mut content) {
                    Ok(_) => run_source(&content, "stdin", &mut state),
                    Err(e) => {
                        eprintln!("minnow: stdin: {}", e);
                        127
                    }
                }
            }
        }
    };

    std::process::exit(status);
}

/// Run a whole command string (`-c` body or script file). The grammar
/// treats newlines as separators, so one parse covers the whole source.
fn run_source(source: &str, origin: &str, state: &mut ShellState) -> i32 {
    match parser::parse(source) {
        Ok(Some(seq)) => {
            exec::run_sequence(&seq, state);
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("minnow: {}: {}", origin, e);
            state.last_status = 2;
        }
    }

    state.exit_requested.unwrap_or(state.last_status)
}

// ── Interactive loop ────────────────────────────────────────────────

fn repl(state: &mut ShellState) -> i32 {
    loop {
        if signals::termination_requested() {
            break;
        }

        // report finished background jobs before prompting
        if signals::take_child_pending() {
            state.jobs.reap();
        }
        state.jobs.notify_finished();

        let prompt = if state.last_status == 0 {
            "minnow$ ".to_string()
        } else {
            format!("[{}] minnow$ ", state.last_status)
        };

        let line = match read_line(&prompt) {
            ReadOutcome::Line(line) => line,
            ReadOutcome::Interrupted => {
                println!();
                state.last_status = 128 + libc::SIGINT;
                continue;
            }
            ReadOutcome::Eof => {
                println!();
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let mut accumulated = line;
        loop {
            // trailing backslash joins the next line
            let trimmed = accumulated.trim_end();
            if trimmed.ends_with('\\') && !trimmed.ends_with("\\\\") {
                accumulated = trimmed[..trimmed.len() - 1].to_string();
                match read_line("> ") {
                    ReadOutcome::Line(next) => {
                        accumulated.push_str(&next);
                        continue;
                    }
                    _ => break,
                }
            }

            match parser::parse(&accumulated) {
                Ok(Some(seq)) => {
                    state.history.add(&accumulated);
                    signals::clear_interrupt();
                    state.last_status = exec::run_sequence(&seq, state);
                    break;
                }
                Ok(None) => break,
                Err(parser::ParseError::UnterminatedQuote(_)) => match read_line("> ") {
                    ReadOutcome::Line(next) => {
                        accumulated.push('\n');
                        accumulated.push_str(&next);
                    }
                    _ => {
                        println!();
                        break;
                    }
                },
                Err(e) => {
                    eprintln!("minnow: {}", e);
                    state.last_status = 2;
                    break;
                }
            }
        }

        if state.exit_requested.is_some() {
            break;
        }
    }

    state.exit_requested.unwrap_or(state.last_status)
}

enum ReadOutcome {
    Line(String),
    Interrupted,
    Eof,
}

/// Read one line from the terminal with raw `read(2)`. `SIGINT` interrupts
/// the call (`EINTR`), which surfaces as [`ReadOutcome::Interrupted`].
fn read_line(prompt: &str) -> ReadOutcome {
    print!("{}", prompt);
    let _ = std::io::stdout().flush();

    let mut line = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = unsafe {
            libc::read(
                libc::STDIN_FILENO,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                if signals::take_interrupt() {
                    return ReadOutcome::Interrupted;
                }
                if signals::termination_requested() {
                    return ReadOutcome::Eof;
                }
                continue;
            }
            return ReadOutcome::Eof;
        }
        if n == 0 {
            return if line.is_empty() {
                ReadOutcome::Eof
            } else {
                ReadOutcome::Line(String::from_utf8_lossy(&line).into_owned())
            };
        }
        line.extend_from_slice(&buf[..n as usize]);
        if line.ends_with(b"\n") {
            line.pop();
            return ReadOutcome::Line(String::from_utf8_lossy(&line).into_owned());
        }
    }
}

// ── Logging ─────────────────────────────────────────────────────────

/// File logging under `~/.minnow/minnow.log`, enabled by `MINNOW_LOG`
/// (`error` | `warn` | `info` | `debug` | `trace`). Silent when unset.
fn init_logging(state: &ShellState) {
    let Some(spec) = state.env.get("MINNOW_LOG") else {
        return;
    };
    let level = match spec.to_ascii_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    let Some(home) = state.home() else { return };
    let dir = std::path::Path::new(home).join(".minnow");
    let _ = std::fs::create_dir_all(&dir);
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("minnow.log"))
    else {
        return;
    };

    let _ = simplelog::WriteLogger::init(level, simplelog::Config::default(), file);
    log::info!("minnow {} starting", env!("CARGO_PKG_VERSION"));
}
