//! Job-control builtins.
//!
//! `jobs` is a worker builtin reading a snapshot; `wait`, `kill`, `fg`,
//! and `bg` mutate the job table or the terminal and therefore run on the
//! main thread.

use std::io::Write;

use serde_json::json;

use super::{report_error, Invocation};
use crate::job::{self, JobState};
use crate::state::{ShellState, WorkerCtx};

pub fn run_jobs(inv: &mut Invocation, ctx: &WorkerCtx) -> i32 {
    if inv.json {
        let payload = json!({ "status": "ok", "jobs": ctx.jobs });
        let _ = writeln!(inv.out, "{}", payload);
        return 0;
    }
    for view in &ctx.jobs {
        let _ = writeln!(inv.out, "[{}]  {:<24}{}", view.id, view.state, view.command);
    }
    0
}

pub fn run_wait(inv: &mut Invocation, state: &mut ShellState) -> i32 {
    let ids = if inv.args.is_empty() {
        state.jobs.ids()
    } else {
        let mut ids = Vec::new();
        for arg in &inv.args.clone() {
            match parse_job_ref(arg, state) {
                Some(id) => ids.push(id),
                None => {
                    report_error(inv, &format!("wait: {}: no such job", arg));
                    return 127;
                }
            }
        }
        ids
    };

    let mut status = 0;
    for id in ids {
        if let Some(code) = job::wait_job(&mut state.jobs, id) {
            status = code;
        }
    }
    status
}

pub fn run_kill(inv: &mut Invocation, state: &mut ShellState) -> i32 {
    let mut args = inv.args.clone().into_iter().peekable();

    let mut signal = libc::SIGTERM;
    if let Some(first) = args.peek() {
        if let Some(spec) = first.strip_prefix('-') {
            if spec == "s" {
                args.next();
                match args.next() {
                    Some(name) => match parse_signal(&name) {
                        Some(sig) => signal = sig,
                        None => {
                            report_error(inv, &format!("kill: {}: invalid signal", name));
                            return 1;
                        }
                    },
                    None => {
                        report_error(inv, "kill: -s requires a signal name");
                        return 1;
                    }
                }
            } else {
                match parse_signal(spec) {
                    Some(sig) => {
                        signal = sig;
                        args.next();
                    }
                    None => {
                        report_error(inv, &format!("kill: {}: invalid signal", spec));
                        return 1;
                    }
                }
            }
        }
    }

    let targets: Vec<String> = args.collect();
    if targets.is_empty() {
        report_error(inv, "kill: missing target");
        return 2;
    }

    let mut status = 0;
    for target in targets {
        // %N addresses the whole process group of job N
        let (pid, label) = if target.starts_with('%') {
            match parse_job_ref(&target, state) {
                Some(id) => {
                    let pgid = state.jobs.get(id).map(|j| j.pgid).unwrap_or(0);
                    (-pgid, target.clone())
                }
                None => {
                    report_error(inv, &format!("kill: {}: no such job", target));
                    status = 1;
                    continue;
                }
            }
        } else {
            match target.parse::<libc::pid_t>() {
                Ok(pid) => (pid, target.clone()),
                Err(_) => {
                    report_error(inv, &format!("kill: {}: invalid target", target));
                    status = 1;
                    continue;
                }
            }
        };

        if unsafe { libc::kill(pid, signal) } != 0 {
            let e = std::io::Error::last_os_error();
            report_error(inv, &format!("kill: {}: {}", label, e));
            status = 1;
        }
    }
    status
}

pub fn run_fg(inv: &mut Invocation, state: &mut ShellState) -> i32 {
    let Some(id) = target_job(inv, state) else {
        return 1;
    };
    let Some(job) = state.jobs.get_mut(id) else {
        return 1;
    };
    let pgid = job.pgid;
    let command = job.command.clone();
    for proc in &mut job.procs {
        proc.stopped = false;
    }
    let _ = writeln!(inv.out, "{}", command);

    if state.interactive {
        job::give_terminal(state.terminal_fd, pgid);
    }
    unsafe {
        libc::kill(-pgid, libc::SIGCONT);
    }

    let (status, stopped) = job::wait_foreground(&mut state.jobs, pgid);
    if state.interactive {
        job::reclaim_terminal(state.terminal_fd, state.shell_pgid);
    }

    if stopped {
        let _ = writeln!(inv.err, "[{}]  Stopped                 {}", id, command);
    } else {
        state.jobs.remove(id);
    }
    status
}

pub fn run_bg(inv: &mut Invocation, state: &mut ShellState) -> i32 {
    let Some(id) = target_job(inv, state) else {
        return 1;
    };
    let Some(job) = state.jobs.get_mut(id) else {
        return 1;
    };
    if job.state() != JobState::Stopped {
        report_error(inv, &format!("bg: job {} already in background", id));
        return 1;
    }
    let pgid = job.pgid;
    for proc in &mut job.procs {
        proc.stopped = false;
    }
    let _ = writeln!(inv.out, "[{}] {} &", id, job.command);
    unsafe {
        libc::kill(-pgid, libc::SIGCONT);
    }
    0
}

/// Job for `fg`/`bg`: explicit `%N`, or the current job when no argument
/// is given. Reports its own errors.
fn target_job(inv: &mut Invocation, state: &ShellState) -> Option<usize> {
    match inv.args.first().cloned() {
        None => {
            let id = state.jobs.current_id();
            if id.is_none() {
                report_error(inv, "no current job");
            }
            id
        }
        Some(arg) => {
            let id = parse_job_ref(&arg, state);
            if id.is_none() {
                report_error(inv, &format!("{}: no such job", arg));
            }
            id
        }
    }
}

/// `%N`, `%%`, `%+` (current job), or a bare job number.
fn parse_job_ref(arg: &str, state: &ShellState) -> Option<usize> {
    let id = match arg.strip_prefix('%') {
        Some("%") | Some("+") => state.jobs.current_id()?,
        Some(num) => num.parse().ok()?,
        None => arg.parse().ok()?,
    };
    state.jobs.get(id).map(|j| j.id)
}

/// Numeric (`9`) or symbolic (`KILL`, `SIGKILL`) signal specs.
fn parse_signal(spec: &str) -> Option<libc::c_int> {
    if let Ok(n) = spec.parse::<libc::c_int>() {
        return (n > 0 && n < 32).then_some(n);
    }
    let name = spec.strip_prefix("SIG").unwrap_or(spec);
    let sig = match name {
        "HUP" => libc::SIGHUP,
        "INT" => libc::SIGINT,
        "QUIT" => libc::SIGQUIT,
        "KILL" => libc::SIGKILL,
        "USR1" => libc::SIGUSR1,
        "USR2" => libc::SIGUSR2,
        "TERM" => libc::SIGTERM,
        "CONT" => libc::SIGCONT,
        "STOP" => libc::SIGSTOP,
        "TSTP" => libc::SIGTSTP,
        _ => return None,
    };
    Some(sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testutil::invocation;
    use crate::job::JobView;
    use crate::state::Environ;
    use std::path::PathBuf;

    fn ctx_with_jobs(jobs: Vec<JobView>) -> WorkerCtx {
        WorkerCtx {
            cwd: PathBuf::from("/"),
            env: Environ::default(),
            jobs,
            last_status: 0,
        }
    }

    fn view(id: usize, state: &str, command: &str) -> JobView {
        JobView {
            id,
            pgid: 100 + id as i32,
            state: state.to_string(),
            command: command.to_string(),
            pids: vec![100 + id as i32],
            exit_status: None,
        }
    }

    #[test]
    fn jobs_lists_snapshot() {
        let ctx = ctx_with_jobs(vec![view(1, "Running", "sleep 30 &"), view(2, "Stopped", "vi")]);
        let (mut inv, out, _) = invocation(&[], false);
        assert_eq!(run_jobs(&mut inv, &ctx), 0);
        let text = out.text();
        assert!(text.contains("[1]  Running"));
        assert!(text.contains("sleep 30 &"));
        assert!(text.contains("[2]  Stopped"));
    }

    #[test]
    fn jobs_json_roundtrips() {
        let ctx = ctx_with_jobs(vec![view(1, "Running", "sleep 30 &")]);
        let (mut inv, out, _) = invocation(&[], true);
        run_jobs(&mut inv, &ctx);
        let v: serde_json::Value = serde_json::from_str(&out.text()).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["jobs"][0]["id"], 1);
        assert_eq!(v["jobs"][0]["state"], "Running");
    }

    #[test]
    fn signal_specs() {
        assert_eq!(parse_signal("9"), Some(libc::SIGKILL));
        assert_eq!(parse_signal("KILL"), Some(libc::SIGKILL));
        assert_eq!(parse_signal("SIGTERM"), Some(libc::SIGTERM));
        assert_eq!(parse_signal("0"), None);
        assert_eq!(parse_signal("NOPE"), None);
    }

    #[test]
    fn job_refs() {
        let mut state = ShellState::new(false);
        let id = state.jobs.insert(500, "sleep 9 &".into(), &[500]);
        assert_eq!(parse_job_ref(&format!("%{}", id), &state), Some(id));
        assert_eq!(parse_job_ref(&id.to_string(), &state), Some(id));
        assert_eq!(parse_job_ref("%%", &state), Some(id));
        assert_eq!(parse_job_ref("%99", &state), None);
        assert_eq!(parse_job_ref("nope", &state), None);
    }

    #[test]
    fn wait_rejects_unknown_job() {
        let mut state = ShellState::new(false);
        let (mut inv, _, err) = invocation(&["%7"], false);
        assert_eq!(run_wait(&mut inv, &mut state), 127);
        assert!(err.text().contains("no such job"));
    }

    #[test]
    fn kill_requires_target() {
        let mut state = ShellState::new(false);
        let (mut inv, _, err) = invocation(&["-9"], false);
        assert_eq!(run_kill(&mut inv, &mut state), 2);
        assert!(err.text().contains("missing target"));
    }

    #[test]
    fn fg_without_jobs_fails() {
        let mut state = ShellState::new(false);
        let (mut inv, _, err) = invocation(&[], false);
        assert_eq!(run_fg(&mut inv, &mut state), 1);
        assert!(err.text().contains("no current job"));
    }
}
