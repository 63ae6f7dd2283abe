//! Introspection builtins: `exit`, `help`, `history`, `type`. All run on
//! the main thread; `type` needs the resolver and `exit` flips shell state.

use std::io::Write;

use serde_json::json;

use super::{report_error, Invocation, REGISTRY};
use crate::path::Resolved;
use crate::state::ShellState;

pub fn run_exit(inv: &mut Invocation, state: &mut ShellState) -> i32 {
    let code = match inv.args.first() {
        None => state.last_status,
        Some(arg) => match arg.parse::<i32>() {
            // exit status is a byte; wrap like sh does
            Ok(n) => n & 0xff,
            Err(_) => {
                report_error(inv, &format!("exit: {}: numeric argument required", arg));
                2
            }
        },
    };
    state.exit_requested = Some(code);
    code
}

pub fn run_help(inv: &mut Invocation, _state: &mut ShellState) -> i32 {
    // `help name` narrows to matching builtins
    let selected: Vec<_> = if inv.args.is_empty() {
        REGISTRY.iter().collect()
    } else {
        let picked: Vec<_> = REGISTRY
            .iter()
            .filter(|spec| inv.args.iter().any(|a| a == spec.name))
            .collect();
        if picked.is_empty() {
            let wanted = inv.args.join(" ");
            report_error(inv, &format!("help: no builtin named {}", wanted));
            return 1;
        }
        picked
    };

    if inv.json {
        let entries: Vec<_> = selected
            .iter()
            .map(|spec| {
                json!({
                    "name": spec.name,
                    "synopsis": spec.synopsis,
                    "summary": spec.summary,
                })
            })
            .collect();
        let payload = json!({ "status": "ok", "builtins": entries });
        let _ = writeln!(inv.out, "{}", payload);
        return 0;
    }

    let _ = writeln!(inv.out, "builtin commands:");
    for spec in selected {
        let _ = writeln!(inv.out, "  {:<28} {}", spec.synopsis, spec.summary);
    }
    0
}

pub fn run_history(inv: &mut Invocation, state: &mut ShellState) -> i32 {
    if inv.json {
        let payload = json!({ "status": "ok", "history": state.history.entries() });
        let _ = writeln!(inv.out, "{}", payload);
    } else {
        for (i, entry) in state.history.entries().iter().enumerate() {
            let _ = writeln!(inv.out, "{:5}  {}", i + 1, entry);
        }
    }
    0
}

pub fn run_type(inv: &mut Invocation, state: &mut ShellState) -> i32 {
    if inv.args.is_empty() {
        report_error(inv, "type: missing operand");
        return 2;
    }

    let mut status = 0;
    let mut results = Vec::new();
    let path_var = state.env.get("PATH").map(str::to_string);

    for name in &inv.args {
        match state.resolver.resolve(name, path_var.as_deref()) {
            Resolved::Builtin(spec) => {
                if inv.json {
                    results.push(json!({ "name": spec.name, "kind": "builtin" }));
                } else {
                    let _ = writeln!(inv.out, "{} is a shell builtin", name);
                }
            }
            Resolved::Executable(path) => {
                if inv.json {
                    results.push(json!({
                        "name": name,
                        "kind": "file",
                        "path": path.display().to_string(),
                    }));
                } else {
                    let _ = writeln!(inv.out, "{} is {}", name, path.display());
                }
            }
            Resolved::NotFound => {
                status = 1;
                if inv.json {
                    results.push(json!({ "name": name, "kind": "not found" }));
                } else {
                    let _ = writeln!(inv.err, "minnow: type: {}: not found", name);
                }
            }
        }
    }

    if inv.json {
        let payload = json!({
            "status": if status == 0 { "ok" } else { "error" },
            "results": results,
        });
        let _ = writeln!(inv.out, "{}", payload);
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testutil::invocation;

    #[test]
    fn exit_uses_last_status_by_default() {
        let mut state = ShellState::new(false);
        state.last_status = 3;
        let (mut inv, _, _) = invocation(&[], false);
        assert_eq!(run_exit(&mut inv, &mut state), 3);
        assert_eq!(state.exit_requested, Some(3));
    }

    #[test]
    fn exit_parses_and_wraps() {
        let mut state = ShellState::new(false);
        let (mut inv, _, _) = invocation(&["300"], false);
        assert_eq!(run_exit(&mut inv, &mut state), 300 & 0xff);

        let (mut inv, _, err) = invocation(&["abc"], false);
        assert_eq!(run_exit(&mut inv, &mut state), 2);
        assert!(err.text().contains("numeric argument required"));
        assert_eq!(state.exit_requested, Some(2));
    }

    #[test]
    fn help_lists_every_builtin() {
        let mut state = ShellState::new(false);
        let (mut inv, out, _) = invocation(&[], false);
        assert_eq!(run_help(&mut inv, &mut state), 0);
        for spec in REGISTRY {
            assert!(out.text().contains(spec.name));
        }
    }

    #[test]
    fn type_reports_builtin_and_missing() {
        let mut state = ShellState::new(false);
        let (mut inv, out, err) = invocation(&["cd", "no_such_cmd_xyz"], false);
        assert_eq!(run_type(&mut inv, &mut state), 1);
        assert!(out.text().contains("cd is a shell builtin"));
        assert!(err.text().contains("no_such_cmd_xyz: not found"));
    }

    #[test]
    fn type_json_shape() {
        let mut state = ShellState::new(false);
        let (mut inv, out, _) = invocation(&["pwd"], true);
        assert_eq!(run_type(&mut inv, &mut state), 0);
        let v: serde_json::Value = serde_json::from_str(&out.text()).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["results"][0]["kind"], "builtin");
    }
}
