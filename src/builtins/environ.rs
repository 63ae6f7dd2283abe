//! Environment builtins: `env` (worker), `export` and `unset` (main).

use std::io::Write;

use serde_json::json;

use super::{report_error, Invocation};
use crate::state::{ShellState, WorkerCtx};

pub fn run_env(inv: &mut Invocation, ctx: &WorkerCtx) -> i32 {
    if inv.json {
        let map: serde_json::Map<String, serde_json::Value> = ctx
            .env
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        let payload = json!({ "status": "ok", "env": map });
        let _ = writeln!(inv.out, "{}", payload);
    } else {
        for (k, v) in ctx.env.iter() {
            let _ = writeln!(inv.out, "{}={}", k, v);
        }
    }
    0
}

pub fn run_export(inv: &mut Invocation, state: &mut ShellState) -> i32 {
    if inv.args.is_empty() {
        // plain `export` lists the environment, like `env`
        for (k, v) in state.env.iter() {
            let _ = writeln!(inv.out, "{}={}", k, v);
        }
        return 0;
    }

    let mut status = 0;
    for arg in inv.args.clone() {
        let (name, value) = match arg.split_once('=') {
            Some((n, v)) => (n, Some(v)),
            None => (arg.as_str(), None),
        };
        if !is_valid_name(name) {
            report_error(inv, &format!("export: `{}': not a valid identifier", name));
            status = 1;
            continue;
        }
        match value {
            Some(v) => state.env.set(name, v),
            // bare NAME: ensure it exists, keep any current value
            None => {
                if state.env.get(name).is_none() {
                    state.env.set(name, "");
                }
            }
        }
    }
    status
}

pub fn run_unset(inv: &mut Invocation, state: &mut ShellState) -> i32 {
    for name in &inv.args {
        state.env.unset(name);
    }
    0
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testutil::invocation;
    use crate::state::Environ;
    use std::path::PathBuf;

    fn ctx_with(pairs: &[(&str, &str)]) -> WorkerCtx {
        let mut env = Environ::default();
        for (k, v) in pairs {
            env.set(k, v);
        }
        WorkerCtx {
            cwd: PathBuf::from("/"),
            env,
            jobs: Vec::new(),
            last_status: 0,
        }
    }

    #[test]
    fn env_lists_in_order() {
        let (mut inv, out, _) = invocation(&[], false);
        run_env(&mut inv, &ctx_with(&[("A", "1"), ("B", "two")]));
        assert_eq!(out.text(), "A=1\nB=two\n");
    }

    #[test]
    fn env_json_is_an_object() {
        let (mut inv, out, _) = invocation(&[], true);
        run_env(&mut inv, &ctx_with(&[("A", "1")]));
        let v: serde_json::Value = serde_json::from_str(&out.text()).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["env"]["A"], "1");
    }

    #[test]
    fn export_sets_and_validates() {
        let mut state = ShellState::new(false);
        let (mut inv, _, err) = invocation(&["GOOD=yes", "1BAD=no"], false);
        assert_eq!(run_export(&mut inv, &mut state), 1);
        assert_eq!(state.env.get("GOOD"), Some("yes"));
        assert_eq!(state.env.get("1BAD"), None);
        assert!(err.text().contains("not a valid identifier"));
    }

    #[test]
    fn unset_removes() {
        let mut state = ShellState::new(false);
        state.env.set("GONE", "x");
        let (mut inv, _, _) = invocation(&["GONE", "NEVER_WAS"], false);
        assert_eq!(run_unset(&mut inv, &mut state), 0);
        assert_eq!(state.env.get("GONE"), None);
    }
}
