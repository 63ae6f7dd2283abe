//! Shell-wide mutable state.
//!
//! `ShellState` is owned by the main thread and never shared: worker-mode
//! builtins receive a [`WorkerCtx`] snapshot taken at dispatch time, so the
//! job table and environment have exactly one writer. The environment is an
//! ordered list rather than a map — children see variables in the order they
//! were exported, and lookup volume is far too small to matter.

use std::path::{Path, PathBuf};

use crate::history::History;
use crate::job::{JobTable, JobView};
use crate::path::PathResolver;
use crate::worker::WorkerPool;

pub const WORKER_POOL_SIZE: usize = 4;

// ── environment ──────────────────────────────────────────────────────────

/// The shell's exported variables. All of them are passed to children; the
/// shell keeps no separate "unexported" tier.
#[derive(Clone, Default)]
pub struct Environ {
    vars: Vec<(String, String)>,
}

impl Environ {
    /// Capture the variables this process was started with.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, name: &str, value: &str) {
        match self.vars.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.vars.push((name.to_string(), value.to_string())),
        }
    }

    pub fn unset(&mut self, name: &str) {
        self.vars.retain(|(k, _)| k != name);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `NAME=value` strings in export order, ready for an `envp` array.
    pub fn as_kv_strings(&self) -> Vec<String> {
        self.vars.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }
}

// ── shell state ──────────────────────────────────────────────────────────

pub struct ShellState {
    pub env: Environ,
    pub cwd: PathBuf,
    pub last_status: i32,
    pub jobs: JobTable,
    pub history: History,
    pub resolver: PathResolver,
    pub workers: WorkerPool,
    pub shell_pgid: libc::pid_t,
    pub terminal_fd: libc::c_int,
    pub interactive: bool,
    pub exit_requested: Option<i32>,
}

impl ShellState {
    pub fn new(interactive: bool) -> Self {
        let env = Environ::from_process();
        let home = env.get("HOME").map(str::to_string);
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self {
            resolver: PathResolver::init(home.as_deref()),
            history: History::open(home.as_deref()),
            env,
            cwd,
            last_status: 0,
            jobs: JobTable::default(),
            workers: WorkerPool::new(WORKER_POOL_SIZE),
            shell_pgid: unsafe { libc::getpgrp() },
            terminal_fd: libc::STDIN_FILENO,
            interactive,
            exit_requested: None,
        }
    }

    pub fn home(&self) -> Option<&str> {
        self.env.get("HOME")
    }

    /// Change the logical working directory, keeping the process cwd and
    /// `PWD` in sync.
    pub fn set_cwd(&mut self, dir: &Path) -> std::io::Result<()> {
        std::env::set_current_dir(dir)?;
        self.cwd = std::env::current_dir()?;
        let pwd = self.cwd.display().to_string();
        self.env.set("PWD", &pwd);
        Ok(())
    }

    /// Snapshot for a worker-mode builtin. Taken on the main thread at
    /// dispatch time; the worker never sees later mutations.
    pub fn worker_ctx(&self) -> WorkerCtx {
        WorkerCtx {
            cwd: self.cwd.clone(),
            env: self.env.clone(),
            jobs: self.jobs.snapshot(),
            last_status: self.last_status,
        }
    }
}

/// Read-only state snapshot handed to worker threads.
#[derive(Clone)]
pub struct WorkerCtx {
    pub cwd: PathBuf,
    pub env: Environ,
    pub jobs: Vec<JobView>,
    pub last_status: i32,
}
