//! The executor: walks the syntax tree and runs it.
//!
//! Pipelines are the unit of execution. For each pipeline the executor
//! expands every stage, resolves the command names, opens redirect targets,
//! then wires the stages together with close-on-exec pipes:
//!
//! - external commands are spawned via [`crate::spawn`] into one shared
//!   process group (the first child's pid), so signals and `waitpid`
//!   address the whole pipeline;
//! - worker builtins are dispatched to the pool with a state snapshot and
//!   their stage's descriptors;
//! - main-thread builtins run inline, in stage order; when a stage's
//!   stdout is a pipe the builtin writes into a buffer that is drained
//!   only after every stage is launched, so its output can never block on
//!   a reader that has not been spawned yet. In a background pipeline a
//!   main-thread builtin is not run at all: its whole point is mutating
//!   the shell, and a `&` launch must leave the shell untouched.
//!
//! Foreground pipelines get the terminal (when interactive) and are waited
//! for as a group; a stop (Ctrl-Z) keeps the job in the table and reports
//! 148. Background pipelines are registered and left alone. The pipeline's
//! status is its last stage's status.
//!
//! Expansion, resolution, and redirect failures are reported before
//! anything is spawned, and fail the whole pipeline.

use std::io::Write;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::builtins::{self, BuiltinSpec, Handler};
use crate::expand::Expander;
use crate::job;
use crate::parser::{Pipeline, Sequence, SimpleCommand};
use crate::path::Resolved;
use crate::redirect::Redirections;
use crate::spawn;
use crate::state::ShellState;

/// Run a parsed statement, pipeline by pipeline. Returns the last
/// pipeline's status; stops early when `exit` has been requested.
pub fn run_sequence(seq: &Sequence, state: &mut ShellState) -> i32 {
    for pipeline in &seq.pipelines {
        let status = run_pipeline(pipeline, state);
        state.last_status = status;
        if state.exit_requested.is_some() {
            break;
        }
    }
    state.last_status
}

// ── Stage planning ──────────────────────────────────────────────────

/// One stage after expansion and resolution, ready to wire up.
enum StagePlan {
    Builtin {
        spec: &'static BuiltinSpec,
        argv: Vec<String>,
        redirs: Redirections,
    },
    External {
        path: PathBuf,
        argv: Vec<String>,
        envp: Vec<String>,
        redirs: Redirections,
    },
    /// Assignments and/or redirects with no command word.
    Bare {
        assignments: Vec<(String, String)>,
        redirs: Redirections,
    },
}

/// Expand and resolve one command. `Err(status)` means the failure has
/// already been reported.
fn plan_stage(cmd: &SimpleCommand, state: &mut ShellState) -> Result<StagePlan, i32> {
    let expander = Expander::new(&state.env, state.last_status);

    let mut argv = Vec::new();
    for word in &cmd.words {
        argv.extend(expander.expand_word(word));
    }

    let assignments: Vec<(String, String)> = cmd
        .assignments
        .iter()
        .map(|a| (a.name.clone(), expander.expand_assignment(&a.value)))
        .collect();

    let mut clauses = Vec::new();
    for redirect in &cmd.redirects {
        match expander.expand_redirect_target(&redirect.target) {
            Ok(target) => clauses.push((redirect.kind, target)),
            Err(e) => {
                eprintln!("minnow: {}", e);
                return Err(1);
            }
        }
    }
    let redirs = Redirections::open(&clauses).map_err(|e| {
        eprintln!("minnow: {}", e);
        1
    })?;

    let Some(name) = argv.first().cloned() else {
        return Ok(StagePlan::Bare {
            assignments,
            redirs,
        });
    };

    let path_var = state.env.get("PATH").map(str::to_string);
    match state.resolver.resolve(&name, path_var.as_deref()) {
        Resolved::Builtin(spec) => Ok(StagePlan::Builtin { spec, argv, redirs }),
        Resolved::Executable(path) => {
            // prefix assignments reach only this command's environment
            let envp = if assignments.is_empty() {
                state.env.as_kv_strings()
            } else {
                let mut env = state.env.clone();
                for (name, value) in &assignments {
                    env.set(name, value);
                }
                env.as_kv_strings()
            };
            Ok(StagePlan::External {
                path,
                argv,
                envp,
                redirs,
            })
        }
        Resolved::NotFound => {
            eprintln!("minnow: {}: command not found", name);
            Err(127)
        }
    }
}

// ── Descriptor plumbing ─────────────────────────────────────────────

/// Close-on-exec pipe; `dup2` in the child clears the flag on the wired
/// copy, so only intended ends survive into children.
fn cloexec_pipe() -> std::io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0i32; 2];
    if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    unsafe { Ok((OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1]))) }
}

fn dup_cloexec(fd: i32) -> std::io::Result<OwnedFd> {
    let duped = unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 3) };
    if duped < 0 {
        return Err(std::io::Error::last_os_error());
    }
    unsafe { Ok(OwnedFd::from_raw_fd(duped)) }
}

/// Writer for a builtin stage: the stage's descriptor if it has one,
/// otherwise a duplicate of the shell's own.
fn writer_for(fd: Option<OwnedFd>, inherit: i32) -> builtins::Out {
    match fd.map(std::fs::File::from) {
        Some(file) => Box::new(file),
        None => match dup_cloexec(inherit) {
            Ok(owned) => Box::new(std::fs::File::from(owned)),
            Err(_) => Box::new(std::io::sink()),
        },
    }
}

/// Stdout buffer for a main-thread builtin. The builtin writes here while
/// the pipeline is still being wired; [`run_pipeline`] drains the buffer to
/// the stage's real descriptor once every stage is launched. A clone shares
/// the same storage.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn take(&self) -> Vec<u8> {
        self.0
            .lock()
            .map(|mut inner| std::mem::take(&mut *inner))
            .unwrap_or_default()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut inner) = self.0.lock() {
            inner.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ── Pipeline execution ──────────────────────────────────────────────

/// Outcome of one stage, collected after wiring.
enum StageResult {
    Spawned(libc::pid_t),
    Finished(i32),
    Pending(crate::worker::WorkerToken),
    Detached,
}

pub fn run_pipeline(pipeline: &Pipeline, state: &mut ShellState) -> i32 {
    let nstages = pipeline.stages.len();

    let mut plans = Vec::with_capacity(nstages);
    for cmd in &pipeline.stages {
        match plan_stage(cmd, state) {
            Ok(plan) => plans.push(plan),
            Err(status) => return status,
        }
    }

    // assignment-only command: mutate the shell itself
    if nstages == 1 && matches!(plans[0], StagePlan::Bare { .. }) {
        if let Some(StagePlan::Bare {
            assignments,
            redirs,
        }) = plans.pop()
        {
            if !pipeline.background {
                for (name, value) in &assignments {
                    state.env.set(name, value);
                }
            }
            drop(redirs);
        }
        return 0;
    }

    let mut pipes: Vec<(OwnedFd, OwnedFd)> = Vec::new();
    for _ in 1..nstages {
        match cloexec_pipe() {
            Ok(ends) => pipes.push(ends),
            Err(e) => {
                eprintln!("minnow: pipe: {}", e);
                return 1;
            }
        }
    }
    let mut pipe_iter = pipes.into_iter();

    let mut results: Vec<StageResult> = Vec::with_capacity(nstages);
    let mut deferred: Vec<(SharedBuf, Option<OwnedFd>)> = Vec::new();
    let mut pids: Vec<libc::pid_t> = Vec::new();
    let mut pgid: libc::pid_t = 0;
    let mut prev_read: Option<OwnedFd> = None;

    for (i, plan) in plans.into_iter().enumerate() {
        // pipe ends for this stage; explicit redirects win
        let (next_read, stage_out) = if i + 1 < nstages {
            match pipe_iter.next() {
                Some((r, w)) => (Some(r), Some(w)),
                None => (None, None),
            }
        } else {
            (None, None)
        };

        match plan {
            StagePlan::External {
                path,
                argv,
                envp,
                redirs,
            } => {
                let stdin_fd = redirs.stdin.or(prev_read.take());
                let stdout_fd = redirs.stdout.or(stage_out);
                let spawned = spawn::spawn(
                    &path,
                    &argv,
                    &envp,
                    pgid,
                    stdin_fd.as_ref().map(|fd| fd.as_raw_fd()),
                    stdout_fd.as_ref().map(|fd| fd.as_raw_fd()),
                );
                // parent's pipe ends close here; children hold the copies
                drop(stdin_fd);
                drop(stdout_fd);
                match spawned {
                    Ok(pid) => {
                        if pgid == 0 {
                            pgid = pid;
                        }
                        pids.push(pid);
                        results.push(StageResult::Spawned(pid));
                    }
                    Err(e) => {
                        eprintln!("{}", e);
                        results.push(StageResult::Finished(e.exit_status()));
                    }
                }
            }
            StagePlan::Builtin { spec, argv, redirs } => {
                let stdin_fd = redirs.stdin.or(prev_read.take());
                // builtins take no stdin; dropping the read end unblocks
                // the upstream writer
                drop(stdin_fd);
                let pipe_out = redirs.stdout.is_none() && stage_out.is_some();
                let stdout_fd = redirs.stdout.or(stage_out);

                match spec.run {
                    Handler::Main(run) => {
                        if pipeline.background {
                            // not run: a backgrounded `cd`, `export`, or
                            // `exit` must not reach into the shell
                            drop(stdout_fd);
                            results.push(StageResult::Detached);
                        } else if pipe_out {
                            // the reader of this pipe may not be spawned
                            // yet; buffer the output and drain it once the
                            // whole pipeline is launched
                            let buf = SharedBuf::default();
                            let err = writer_for(None, libc::STDERR_FILENO);
                            let status =
                                match builtins::prepare(spec, &argv, Box::new(buf.clone()), err) {
                                    Err(status) => status,
                                    Ok(mut inv) => run(&mut inv, state),
                                };
                            deferred.push((buf, stdout_fd));
                            results.push(StageResult::Finished(status));
                        } else {
                            let out = writer_for(stdout_fd, libc::STDOUT_FILENO);
                            let err = writer_for(None, libc::STDERR_FILENO);
                            let status = match builtins::prepare(spec, &argv, out, err) {
                                Err(status) => status,
                                Ok(mut inv) => run(&mut inv, state),
                            };
                            results.push(StageResult::Finished(status));
                        }
                    }
                    Handler::Worker(run) => {
                        let out = writer_for(stdout_fd, libc::STDOUT_FILENO);
                        let err = writer_for(None, libc::STDERR_FILENO);
                        match builtins::prepare(spec, &argv, out, err) {
                            Err(status) => results.push(StageResult::Finished(status)),
                            Ok(mut inv) => {
                                let ctx = state.worker_ctx();
                                if pipeline.background {
                                    state.workers.submit_detached(move || run(&mut inv, &ctx));
                                    results.push(StageResult::Detached);
                                } else {
                                    let token = state.workers.submit(move || run(&mut inv, &ctx));
                                    results.push(StageResult::Pending(token));
                                }
                            }
                        }
                    }
                }
            }
            StagePlan::Bare { redirs, .. } => {
                // mid-pipeline bare stage: open/close the redirects, pass
                // nothing through
                drop(prev_read.take());
                drop(redirs);
                results.push(StageResult::Finished(0));
            }
        }

        prev_read = next_read;
    }
    drop(prev_read);

    // every stage is running; buffered builtin output can drain into the
    // pipes now without deadlocking against an unspawned reader. A reader
    // that quit early makes the write fail with EPIPE, which is fine.
    for (buf, fd) in deferred.drain(..) {
        let bytes = buf.take();
        if let Some(fd) = fd {
            let mut file = std::fs::File::from(fd);
            let _ = file.write_all(&bytes);
        }
    }

    let command = describe(pipeline);

    if pipeline.background {
        if !pids.is_empty() {
            let id = state.jobs.insert(pgid, command, &pids);
            if state.interactive {
                eprintln!("[{}] {}", id, pids.last().copied().unwrap_or(pgid));
            }
        }
        return 0;
    }

    // foreground: wait for the process group, then for worker builtins
    let mut stopped = false;
    let mut group_status = 0;
    if !pids.is_empty() {
        let id = state.jobs.insert(pgid, command.clone(), &pids);
        if state.interactive {
            job::give_terminal(state.terminal_fd, pgid);
        }
        let (status, was_stopped) = job::wait_foreground(&mut state.jobs, pgid);
        if state.interactive {
            job::reclaim_terminal(state.terminal_fd, state.shell_pgid);
        }
        group_status = status;
        stopped = was_stopped;
        if stopped {
            if let Some(job) = state.jobs.get(id) {
                eprintln!("[{}]  Stopped                 {}", id, job.command);
            }
        } else {
            state.jobs.remove(id);
        }
    }

    let mut last_status = group_status;
    for result in results {
        let status = match result {
            StageResult::Spawned(_) => group_status,
            StageResult::Finished(status) => status,
            StageResult::Pending(token) => token.wait(),
            StageResult::Detached => 0,
        };
        last_status = status;
    }

    if stopped {
        128 + libc::SIGTSTP
    } else {
        last_status
    }
}

/// Command text for the job table, rebuilt from the stage argvs.
fn describe(pipeline: &Pipeline) -> String {
    let stages: Vec<String> = pipeline
        .stages
        .iter()
        .map(|cmd| {
            cmd.words
                .iter()
                .map(|w| w.flatten())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    let mut text = stages.join(" | ");
    if pipeline.background {
        text.push_str(" &");
    }
    text
}
