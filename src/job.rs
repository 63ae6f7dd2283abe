//! Job table and job-control helpers.
//!
//! Every pipeline the shell launches is tracked as a [`Job`]: one process
//! group plus the per-process bookkeeping needed to derive the job's state.
//! Foreground jobs are waited on synchronously ([`wait_foreground`]);
//! background jobs are reaped opportunistically ([`JobTable::reap`]) when
//! `SIGCHLD` has fired, and their completion is reported just before the
//! next prompt ([`JobTable::notify_finished`]).
//!
//! The job table has a single writer: the interpreter thread. Worker-mode
//! builtins see jobs only through a by-value [`JobView`] snapshot taken at
//! dispatch time.
//!
//! Exit codes follow the `128+N` convention for signal deaths; a stop
//! reports `128+SIGTSTP` (148).

use libc::pid_t;
use serde::Serialize;

// ── Data ────────────────────────────────────────────────────────────

/// One process of a pipeline.
pub struct Process {
    pub pid: pid_t,
    pub done: bool,
    pub stopped: bool,
    /// Raw `waitpid` status; meaningful once `done` or `stopped`.
    pub raw_status: i32,
}

/// Aggregate job state, derived from the member processes.
#[derive(Debug, PartialEq)]
pub enum JobState {
    Running,
    Stopped,
    /// All processes finished; carries the last stage's exit code.
    Done(i32),
}

impl JobState {
    pub fn label(&self) -> &'static str {
        match self {
            JobState::Running => "Running",
            JobState::Stopped => "Stopped",
            JobState::Done(_) => "Done",
        }
    }
}

pub struct Job {
    /// Number shown as `[N]`; lowest unused id is assigned on insert.
    pub id: usize,
    /// Process group: `kill(-pgid)` and `waitpid(-pgid)` address the whole
    /// pipeline at once.
    pub pgid: pid_t,
    /// Command text for `jobs` output.
    pub command: String,
    pub procs: Vec<Process>,
    /// `Done` has been reported to the user; eligible for removal.
    pub notified: bool,
}

impl Job {
    /// Stopped wins over Done wins over Running.
    pub fn state(&self) -> JobState {
        if self.procs.iter().any(|p| p.stopped) {
            return JobState::Stopped;
        }
        if self.procs.iter().all(|p| p.done) {
            let last = self.procs.last();
            let code = last.map(|p| exit_code(p.raw_status)).unwrap_or(0);
            return JobState::Done(code);
        }
        JobState::Running
    }
}

/// Immutable snapshot of one job, handed to worker-mode builtins and
/// serialized by `jobs --json`.
#[derive(Clone, Serialize)]
pub struct JobView {
    pub id: usize,
    pub pgid: i32,
    pub state: String,
    pub command: String,
    pub pids: Vec<i32>,
    pub exit_status: Option<i32>,
}

// ── JobTable ────────────────────────────────────────────────────────

/// Insertion-ordered job table, owned by [`crate::state::ShellState`].
#[derive(Default)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    /// Register a job, assigning the lowest unused id.
    pub fn insert(&mut self, pgid: pid_t, command: String, pids: &[pid_t]) -> usize {
        let mut id = 1;
        while self.jobs.iter().any(|j| j.id == id) {
            id += 1;
        }

        let procs = pids
            .iter()
            .map(|&pid| Process {
                pid,
                done: false,
                stopped: false,
                raw_status: 0,
            })
            .collect();

        log::debug!("job [{}] pgid {} registered: {}", id, pgid, command);
        self.jobs.push(Job {
            id,
            pgid,
            command,
            procs,
            notified: false,
        });
        id
    }

    pub fn get(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    pub fn remove(&mut self, id: usize) {
        self.jobs.retain(|j| j.id != id);
    }

    /// Most recently registered job that is not yet done — the default
    /// target of `fg`/`bg`/`wait`.
    pub fn current_id(&self) -> Option<usize> {
        self.jobs
            .iter()
            .rev()
            .find(|j| !matches!(j.state(), JobState::Done(_)))
            .map(|j| j.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn ids(&self) -> Vec<usize> {
        self.jobs.iter().map(|j| j.id).collect()
    }

    /// Fold one `waitpid` result into the table. Unknown pids are ignored
    /// (e.g. a foreground pipeline already removed from the table).
    pub fn record_status(&mut self, pid: pid_t, raw_status: i32) {
        for job in &mut self.jobs {
            for proc in &mut job.procs {
                if proc.pid == pid {
                    proc.raw_status = raw_status;
                    if libc::WIFSTOPPED(raw_status) {
                        proc.stopped = true;
                        proc.done = false;
                    } else if libc::WIFCONTINUED(raw_status) {
                        proc.stopped = false;
                    } else {
                        proc.done = true;
                        proc.stopped = false;
                    }
                    return;
                }
            }
        }
    }

    /// Non-blocking reap of every terminated or stopped child. Called when
    /// the `SIGCHLD` flag has been drained, and before each prompt.
    pub fn reap(&mut self) {
        loop {
            let mut raw: i32 = 0;
            let pid = unsafe {
                libc::waitpid(-1, &mut raw, libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED)
            };
            if pid <= 0 {
                break;
            }
            log::debug!("reaped pid {} (raw status {:#x})", pid, raw);
            self.record_status(pid, raw);
        }
    }

    /// Report newly finished jobs (`[N]  Done  cmd`) and drop them.
    pub fn notify_finished(&mut self) {
        for job in &mut self.jobs {
            if let JobState::Done(_) = job.state() {
                if !job.notified {
                    eprintln!("[{}]  Done                    {}", job.id, job.command);
                    job.notified = true;
                }
            }
        }
        self.jobs
            .retain(|j| !(j.notified && matches!(j.state(), JobState::Done(_))));
    }

    /// By-value view for worker-mode builtins and `jobs --json`.
    pub fn snapshot(&self) -> Vec<JobView> {
        self.jobs
            .iter()
            .map(|j| {
                let state = j.state();
                JobView {
                    id: j.id,
                    pgid: j.pgid,
                    state: state.label().to_string(),
                    command: j.command.clone(),
                    pids: j.procs.iter().map(|p| p.pid).collect(),
                    exit_status: match state {
                        JobState::Done(code) => Some(code),
                        _ => None,
                    },
                }
            })
            .collect()
    }
}

// ── Waiting ─────────────────────────────────────────────────────────

/// Shell-facing exit code from a raw `waitpid` status.
pub fn exit_code(raw_status: i32) -> i32 {
    if libc::WIFEXITED(raw_status) {
        libc::WEXITSTATUS(raw_status)
    } else if libc::WIFSIGNALED(raw_status) {
        128 + libc::WTERMSIG(raw_status)
    } else if libc::WIFSTOPPED(raw_status) {
        128 + libc::WSTOPSIG(raw_status)
    } else {
        1
    }
}

/// Block until every process of the registered job `pgid` has finished or
/// stopped. Returns `(exit_status, stopped)`; a stop reports 148.
pub fn wait_foreground(jobs: &mut JobTable, pgid: pid_t) -> (i32, bool) {
    loop {
        let mut raw: i32 = 0;
        let pid = unsafe { libc::waitpid(-pgid, &mut raw, libc::WUNTRACED) };

        if pid <= 0 {
            let errno = std::io::Error::last_os_error().raw_os_error();
            if errno == Some(libc::EINTR) {
                // a Ctrl-C that reached the shell instead of the job is
                // forwarded to the foreground group; the wait itself
                // continues until the group reports back
                if crate::signals::take_interrupt() {
                    unsafe {
                        libc::kill(-pgid, libc::SIGINT);
                    }
                }
                continue;
            }
            // ECHILD: everything already reaped; fall back to table state
            break;
        }
        jobs.record_status(pid, raw);

        if let Some(job) = jobs.iter().find(|j| j.pgid == pgid) {
            match job.state() {
                JobState::Done(code) => return (code, false),
                JobState::Stopped => return (128 + libc::SIGTSTP, true),
                JobState::Running => continue,
            }
        } else {
            break;
        }
    }

    match jobs.iter().find(|j| j.pgid == pgid).map(|j| j.state()) {
        Some(JobState::Done(code)) => (code, false),
        Some(JobState::Stopped) => (128 + libc::SIGTSTP, true),
        _ => (0, false),
    }
}

/// Blocking wait for one background job by id, used by the `wait` builtin.
/// Removes the job and returns its final status.
pub fn wait_job(jobs: &mut JobTable, id: usize) -> Option<i32> {
    let pids: Vec<pid_t> = jobs.get(id)?.procs.iter().map(|p| p.pid).collect();
    for pid in pids {
        let already_done = jobs
            .get(id)
            .and_then(|j| j.procs.iter().find(|p| p.pid == pid))
            .is_some_and(|p| p.done);
        if already_done {
            continue;
        }
        let mut raw: i32 = 0;
        if unsafe { libc::waitpid(pid, &mut raw, 0) } > 0 {
            jobs.record_status(pid, raw);
        }
    }

    let status = match jobs.get(id).map(|j| j.state()) {
        Some(JobState::Done(code)) => code,
        _ => 0,
    };
    jobs.remove(id);
    Some(status)
}

// ── Terminal handoff ────────────────────────────────────────────────

/// Make `pgid` the terminal's foreground process group. The shell ignores
/// `SIGTTOU`, so this never blocks.
pub fn give_terminal(terminal_fd: i32, pgid: pid_t) {
    unsafe {
        libc::tcsetpgrp(terminal_fd, pgid);
    }
}

/// Return the terminal to the shell after a foreground job ends or stops.
pub fn reclaim_terminal(terminal_fd: i32, shell_pgid: pid_t) {
    unsafe {
        libc::tcsetpgrp(terminal_fd, shell_pgid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exited(code: i32) -> i32 {
        // construct a raw wait status equivalent to WIFEXITED with `code`
        (code & 0xff) << 8
    }

    #[test]
    fn insert_assigns_lowest_unused_id() {
        let mut t = JobTable::new();
        let a = t.insert(100, "a".into(), &[100]);
        let b = t.insert(200, "b".into(), &[200]);
        assert_eq!((a, b), (1, 2));

        t.remove(1);
        let c = t.insert(300, "c".into(), &[300]);
        assert_eq!(c, 1);
    }

    #[test]
    fn state_derivation() {
        let mut t = JobTable::new();
        let id = t.insert(10, "p1 | p2".into(), &[10, 11]);
        assert_eq!(t.get(id).unwrap().state(), JobState::Running);

        t.record_status(10, exited(3));
        assert_eq!(t.get(id).unwrap().state(), JobState::Running);

        // pipeline status comes from the last stage, not the first failure
        t.record_status(11, exited(0));
        assert_eq!(t.get(id).unwrap().state(), JobState::Done(0));
    }

    #[test]
    fn stopped_wins_over_running() {
        let mut t = JobTable::new();
        let id = t.insert(10, "x".into(), &[10, 11]);
        t.record_status(10, 0x137f); // WIFSTOPPED(SIGTSTP)
        assert_eq!(t.get(id).unwrap().state(), JobState::Stopped);
    }

    #[test]
    fn exit_code_conventions() {
        assert_eq!(exit_code(exited(0)), 0);
        assert_eq!(exit_code(exited(42)), 42);
        // terminated by SIGKILL (9): raw status is the signal number
        assert_eq!(exit_code(9), 128 + 9);
        assert_eq!(exit_code(15), 128 + 15);
    }

    #[test]
    fn current_id_skips_done_jobs() {
        let mut t = JobTable::new();
        let a = t.insert(10, "a".into(), &[10]);
        let b = t.insert(20, "b".into(), &[20]);
        assert_eq!(t.current_id(), Some(b));

        t.record_status(20, exited(0));
        assert_eq!(t.current_id(), Some(a));
    }

    #[test]
    fn snapshot_carries_exit_status() {
        let mut t = JobTable::new();
        t.insert(10, "a".into(), &[10]);
        t.record_status(10, exited(7));
        let views = t.snapshot();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].state, "Done");
        assert_eq!(views[0].exit_status, Some(7));
        assert_eq!(views[0].pids, vec![10]);
    }

    #[test]
    fn record_status_ignores_unknown_pid() {
        let mut t = JobTable::new();
        t.insert(10, "a".into(), &[10]);
        t.record_status(999, exited(0));
        assert_eq!(t.get(1).unwrap().state(), JobState::Running);
    }

    #[test]
    fn interrupt_during_foreground_wait_is_forwarded() {
        use std::time::{Duration, Instant};

        crate::signals::install();

        let resolver = crate::path::PathResolver::with_bin_dir(None);
        let path_var = std::env::var("PATH").ok();
        let sleep_path = match resolver.resolve("sleep", path_var.as_deref()) {
            crate::path::Resolved::Executable(p) => p,
            _ => return,
        };
        let argv = vec!["sleep".to_string(), "5".to_string()];
        let pid = crate::spawn::spawn(&sleep_path, &argv, &[], 0, None, None).unwrap();

        let mut t = JobTable::new();
        t.insert(pid, "sleep 5".into(), &[pid]);

        // interrupt the waiting thread mid-wait; the wait must forward
        // SIGINT to the job's group instead of abandoning it
        let waiter = unsafe { libc::pthread_self() };
        let shooter = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            unsafe { libc::pthread_kill(waiter, libc::SIGINT) };
        });

        let start = Instant::now();
        let (status, stopped) = wait_foreground(&mut t, pid);
        shooter.join().unwrap();

        assert!(!stopped);
        assert_eq!(status, 128 + libc::SIGINT);
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
