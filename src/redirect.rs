//! Redirection: turning `<`, `>`, `>>` clauses into open file descriptors.
//!
//! Targets are opened in the shell before anything runs, so a bad path
//! fails the command (status 1) without spawning it. The opened descriptors
//! travel as [`OwnedFd`] and close when the stage that borrowed them is
//! done; nothing here calls `dup2` — wiring descriptors into place is the
//! spawner's job (file actions for children, handle swaps for builtins).
//!
//! Several redirects of the same direction follow last-one-wins: every
//! target is still opened (and truncated, for `>`), matching sh behavior,
//! but only the final descriptor is kept.

use std::fmt;
use std::fs::OpenOptions;
use std::os::fd::OwnedFd;

use crate::parser::RedirectKind;

#[derive(Debug)]
pub struct RedirectError {
    pub target: String,
    pub source: std::io::Error,
}

impl fmt::Display for RedirectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.source)
    }
}

/// The descriptors a command's redirect clauses resolved to. `None` means
/// "no redirect in that direction" — the stage keeps whatever the pipeline
/// gives it.
#[derive(Debug, Default)]
pub struct Redirections {
    pub stdin: Option<OwnedFd>,
    pub stdout: Option<OwnedFd>,
}

impl Redirections {
    /// Open every target in clause order.
    pub fn open(clauses: &[(RedirectKind, String)]) -> Result<Self, RedirectError> {
        let mut out = Self::default();
        for (kind, target) in clauses {
            let fd = open_target(*kind, target).map_err(|source| RedirectError {
                target: target.clone(),
                source,
            })?;
            match kind {
                RedirectKind::In => out.stdin = Some(fd),
                RedirectKind::Out | RedirectKind::Append => out.stdout = Some(fd),
            }
        }
        Ok(out)
    }
}

fn open_target(kind: RedirectKind, target: &str) -> std::io::Result<OwnedFd> {
    let file = match kind {
        RedirectKind::In => OpenOptions::new().read(true).open(target)?,
        RedirectKind::Out => OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(target)?,
        RedirectKind::Append => OpenOptions::new().append(true).create(true).open(target)?,
    };
    Ok(file.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::path::PathBuf;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("minnow-redir-{}-{}", tag, std::process::id()))
    }

    #[test]
    fn out_truncates_append_appends() {
        let path = temp_path("out");
        let clauses = [(RedirectKind::Out, path.display().to_string())];
        {
            let r = Redirections::open(&clauses).unwrap();
            let mut f = std::fs::File::from(r.stdout.unwrap());
            writeln!(f, "first").unwrap();
        }
        {
            let clauses = [(RedirectKind::Append, path.display().to_string())];
            let r = Redirections::open(&clauses).unwrap();
            let mut f = std::fs::File::from(r.stdout.unwrap());
            writeln!(f, "second").unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");

        let clauses = [(RedirectKind::Out, path.display().to_string())];
        drop(Redirections::open(&clauses).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn input_reads_existing_file() {
        let path = temp_path("in");
        std::fs::write(&path, "data\n").unwrap();
        let clauses = [(RedirectKind::In, path.display().to_string())];
        let r = Redirections::open(&clauses).unwrap();
        let mut buf = String::new();
        std::fs::File::from(r.stdin.unwrap())
            .read_to_string(&mut buf)
            .unwrap();
        assert_eq!(buf, "data\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_input_file_is_an_error() {
        let clauses = [(RedirectKind::In, "/nonexistent/minnow/in".to_string())];
        let err = Redirections::open(&clauses).unwrap_err();
        assert_eq!(err.target, "/nonexistent/minnow/in");
    }

    #[test]
    fn last_redirect_wins() {
        let a = temp_path("last-a");
        let b = temp_path("last-b");
        let clauses = [
            (RedirectKind::Out, a.display().to_string()),
            (RedirectKind::Out, b.display().to_string()),
        ];
        let r = Redirections::open(&clauses).unwrap();
        let kept = r.stdout.unwrap();
        // both files were created; the kept descriptor is the second one
        assert!(a.exists() && b.exists());
        let mut f = std::fs::File::from(kept);
        writeln!(f, "x").unwrap();
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "x\n");
        assert_eq!(std::fs::read_to_string(&a).unwrap(), "");
        let _ = (std::fs::remove_file(&a), std::fs::remove_file(&b));
    }
}
