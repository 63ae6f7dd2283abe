//! Directory builtins: `cd` (main-thread) and `pwd` (worker).

use std::io::Write;
use std::path::PathBuf;

use serde_json::json;

use super::{report_error, Invocation};
use crate::state::{ShellState, WorkerCtx};

pub fn run_cd(inv: &mut Invocation, state: &mut ShellState) -> i32 {
    if inv.args.len() > 1 {
        report_error(inv, "cd: too many arguments");
        return 1;
    }

    let (target, echo) = match inv.args.first().map(String::as_str) {
        None | Some("~") => match state.home() {
            Some(home) => (PathBuf::from(home), false),
            None => {
                report_error(inv, "cd: HOME not set");
                return 1;
            }
        },
        // `cd -` goes back and prints where it landed
        Some("-") => match state.env.get("OLDPWD") {
            Some(prev) => (PathBuf::from(prev), true),
            None => {
                report_error(inv, "cd: OLDPWD not set");
                return 1;
            }
        },
        Some(dir) => (PathBuf::from(dir), false),
    };

    let oldpwd = state.cwd.display().to_string();
    if let Err(e) = state.set_cwd(&target) {
        report_error(inv, &format!("cd: {}: {}", target.display(), e));
        return 1;
    }
    state.env.set("OLDPWD", &oldpwd);

    if inv.json {
        let payload = json!({ "status": "ok", "cwd": state.cwd.display().to_string() });
        let _ = writeln!(inv.out, "{}", payload);
    } else if echo {
        let _ = writeln!(inv.out, "{}", state.cwd.display());
    }
    0
}

pub fn run_pwd(inv: &mut Invocation, ctx: &WorkerCtx) -> i32 {
    if inv.json {
        let payload = json!({ "status": "ok", "cwd": ctx.cwd.display().to_string() });
        let _ = writeln!(inv.out, "{}", payload);
    } else {
        let _ = writeln!(inv.out, "{}", ctx.cwd.display());
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testutil::invocation;
    use crate::state::Environ;

    fn worker_ctx(cwd: &str) -> WorkerCtx {
        WorkerCtx {
            cwd: PathBuf::from(cwd),
            env: Environ::default(),
            jobs: Vec::new(),
            last_status: 0,
        }
    }

    #[test]
    fn pwd_prints_cwd() {
        let (mut inv, out, _) = invocation(&[], false);
        assert_eq!(run_pwd(&mut inv, &worker_ctx("/some/dir")), 0);
        assert_eq!(out.text(), "/some/dir\n");
    }

    #[test]
    fn pwd_json() {
        let (mut inv, out, _) = invocation(&[], true);
        run_pwd(&mut inv, &worker_ctx("/some/dir"));
        let v: serde_json::Value = serde_json::from_str(&out.text()).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["cwd"], "/some/dir");
    }

    #[test]
    fn cd_rejects_extra_args() {
        let mut state = ShellState::new(false);
        let (mut inv, _, err) = invocation(&["a", "b"], false);
        assert_eq!(run_cd(&mut inv, &mut state), 1);
        assert!(err.text().contains("too many arguments"));
    }

    #[test]
    fn cd_missing_dir_reports_error() {
        let mut state = ShellState::new(false);
        let (mut inv, _, err) = invocation(&["/nonexistent-minnow-dir"], false);
        assert_eq!(run_cd(&mut inv, &mut state), 1);
        assert!(err.text().contains("/nonexistent-minnow-dir"));
    }
}
