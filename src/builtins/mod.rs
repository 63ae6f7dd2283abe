//! Builtin registry and dispatch plumbing.
//!
//! Builtins are registered statically in [`REGISTRY`]; each entry carries a
//! run mode that decides where the handler executes:
//!
//! - [`Handler::Main`] — runs on the interpreter thread with mutable access
//!   to [`ShellState`]. Anything that changes shell state (`cd`, `export`,
//!   `exit`) or must touch the job table and terminal (`fg`, `wait`) lives
//!   here.
//! - [`Handler::Worker`] — pure output commands (`pwd`, `env`, `jobs`).
//!   They run on the worker pool against a [`WorkerCtx`] snapshot, so a
//!   builtin stage in a pipeline never blocks the interpreter.
//!
//! Every builtin understands `-h`/`--help` and `--json`; both are parsed
//! here before the handler runs, so handlers only see their own arguments.
//! JSON output always carries a `"status"` field (`"ok"` or `"error"`).

use std::io::Write;

use crate::state::{ShellState, WorkerCtx};

mod dirs;
mod environ;
mod info;
mod jobctl;

// ── Registry ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunMode {
    /// Interpreter thread, `&mut ShellState`.
    Main,
    /// Worker pool, state snapshot.
    Worker,
}

#[derive(Clone, Copy)]
pub enum Handler {
    Main(fn(&mut Invocation, &mut ShellState) -> i32),
    Worker(fn(&mut Invocation, &WorkerCtx) -> i32),
}

pub struct BuiltinSpec {
    pub name: &'static str,
    pub synopsis: &'static str,
    pub summary: &'static str,
    pub run: Handler,
}

impl BuiltinSpec {
    pub fn mode(&self) -> RunMode {
        match self.run {
            Handler::Main(_) => RunMode::Main,
            Handler::Worker(_) => RunMode::Worker,
        }
    }
}

pub static REGISTRY: &[BuiltinSpec] = &[
    BuiltinSpec {
        name: "bg",
        synopsis: "bg [%job]",
        summary: "resume a stopped job in the background",
        run: Handler::Main(jobctl::run_bg),
    },
    BuiltinSpec {
        name: "cd",
        synopsis: "cd [dir | -]",
        summary: "change the working directory",
        run: Handler::Main(dirs::run_cd),
    },
    BuiltinSpec {
        name: "env",
        synopsis: "env",
        summary: "print the exported environment",
        run: Handler::Worker(environ::run_env),
    },
    BuiltinSpec {
        name: "exit",
        synopsis: "exit [status]",
        summary: "leave the shell",
        run: Handler::Main(info::run_exit),
    },
    BuiltinSpec {
        name: "export",
        synopsis: "export NAME=value ...",
        summary: "set exported variables",
        run: Handler::Main(environ::run_export),
    },
    BuiltinSpec {
        name: "fg",
        synopsis: "fg [%job]",
        summary: "bring a job to the foreground",
        run: Handler::Main(jobctl::run_fg),
    },
    BuiltinSpec {
        name: "help",
        synopsis: "help",
        summary: "list the builtin commands",
        run: Handler::Main(info::run_help),
    },
    BuiltinSpec {
        name: "history",
        synopsis: "history",
        summary: "print the command history",
        run: Handler::Main(info::run_history),
    },
    BuiltinSpec {
        name: "jobs",
        synopsis: "jobs",
        summary: "list background jobs",
        run: Handler::Worker(jobctl::run_jobs),
    },
    BuiltinSpec {
        name: "kill",
        synopsis: "kill [-SIGNAL] pid|%job ...",
        summary: "send a signal to processes or jobs",
        run: Handler::Main(jobctl::run_kill),
    },
    BuiltinSpec {
        name: "pwd",
        synopsis: "pwd",
        summary: "print the working directory",
        run: Handler::Worker(dirs::run_pwd),
    },
    BuiltinSpec {
        name: "type",
        synopsis: "type name ...",
        summary: "show how a name would be resolved",
        run: Handler::Main(info::run_type),
    },
    BuiltinSpec {
        name: "unset",
        synopsis: "unset NAME ...",
        summary: "remove exported variables",
        run: Handler::Main(environ::run_unset),
    },
    BuiltinSpec {
        name: "wait",
        synopsis: "wait [%job ...]",
        summary: "wait for background jobs to finish",
        run: Handler::Main(jobctl::run_wait),
    },
];

pub fn find(name: &str) -> Option<&'static BuiltinSpec> {
    REGISTRY.iter().find(|spec| spec.name == name)
}

// ── Invocation ──────────────────────────────────────────────────────

pub type Out = Box<dyn Write + Send>;

/// One builtin call, after common-flag parsing: remaining arguments plus
/// the streams the stage is wired to.
pub struct Invocation {
    pub args: Vec<String>,
    pub json: bool,
    pub out: Out,
    pub err: Out,
}

/// Parse `-h`/`--help`/`--json` out of `argv[1..]`. `Err(status)` means
/// the call was fully handled here (help printed, or usage error).
pub fn prepare(
    spec: &'static BuiltinSpec,
    argv: &[String],
    mut out: Out,
    mut err: Out,
) -> Result<Invocation, i32> {
    let mut json = false;
    let mut args = Vec::new();
    let mut no_more_flags = false;

    for arg in &argv[1..] {
        if no_more_flags {
            args.push(arg.clone());
            continue;
        }
        match arg.as_str() {
            "-h" | "--help" => {
                print_help(spec, &mut out);
                return Err(0);
            }
            "--json" => json = true,
            "--" => no_more_flags = true,
            _ => args.push(arg.clone()),
        }
    }

    let _ = err.flush();
    Ok(Invocation {
        args,
        json,
        out,
        err,
    })
}

fn print_help(spec: &BuiltinSpec, out: &mut Out) {
    let _ = writeln!(out, "Usage: {}", spec.synopsis);
    let _ = writeln!(out, "  {}", spec.summary);
    let _ = writeln!(out);
    let _ = writeln!(out, "  -h, --help   show this help");
    let _ = writeln!(out, "  --json       machine-readable output");
}

/// `{"status":"error","message":...}` to stdout, plain message to stderr.
pub fn report_error(inv: &mut Invocation, message: &str) {
    if inv.json {
        let payload = serde_json::json!({ "status": "error", "message": message });
        let _ = writeln!(inv.out, "{}", payload);
    } else {
        let _ = writeln!(inv.err, "minnow: {}", message);
    }
}
