//! Safe wrapper around `posix_spawn()`.
//!
//! External commands go through `posix_spawn` rather than
//! `std::process::Command`: it lets the child's process group, signal
//! dispositions, and descriptor wiring be set atomically in one call, with
//! no window where the child runs with the shell's signal setup.
//!
//! ## Pieces
//!
//! | Type | Role |
//! |------|------|
//! | [`SpawnAttr`] | RAII wrapper for `posix_spawnattr_t` (process group, signal reset) |
//! | [`FileActions`] | RAII wrapper for `posix_spawn_file_actions_t` (fd wiring) |
//! | [`CStringVec`] | NUL-terminated pointer array for argv/envp |
//! | [`spawn`] | combines the above and calls `posix_spawn` |
//!
//! The resolver has already mapped the command name to a path, so no `PATH`
//! search happens here. Pipe descriptors are created close-on-exec by the
//! executor; the `dup2` file action clears that flag on the wired copy, so
//! children never inherit stray pipe ends.

use std::ffi::CString;
use std::fmt;
use std::path::Path;

// ── Errors ──────────────────────────────────────────────────────────

/// A failed `posix_spawn`. Carries the errno and the command name for the
/// diagnostic.
#[derive(Debug)]
pub struct SpawnError {
    pub errno: i32,
    pub command: String,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self.errno {
            libc::ENOENT => "command not found",
            libc::EACCES => "permission denied",
            _ => "spawn failed",
        };
        write!(f, "minnow: {}: {}", self.command, msg)
    }
}

impl SpawnError {
    /// Exit status for the failure: 127 = not found, 126 = not executable,
    /// 1 = anything else.
    pub fn exit_status(&self) -> i32 {
        match self.errno {
            libc::ENOENT => 127,
            libc::EACCES => 126,
            _ => 1,
        }
    }
}

// ── SpawnAttr ───────────────────────────────────────────────────────

/// RAII wrapper for `posix_spawnattr_t`; destroyed on drop.
struct SpawnAttr {
    inner: libc::posix_spawnattr_t,
}

impl SpawnAttr {
    fn new() -> Self {
        unsafe {
            let mut attr: libc::posix_spawnattr_t = std::mem::zeroed();
            libc::posix_spawnattr_init(&mut attr);
            Self { inner: attr }
        }
    }

    /// Put the child in process group `pgid` (0 makes the child's own pid
    /// the group leader).
    fn set_pgroup(&mut self, pgid: libc::pid_t) {
        unsafe {
            let mut flags: libc::c_short = 0;
            libc::posix_spawnattr_getflags(&self.inner, &mut flags);
            flags |= libc::POSIX_SPAWN_SETPGROUP as libc::c_short;
            libc::posix_spawnattr_setflags(&mut self.inner, flags);
            libc::posix_spawnattr_setpgroup(&mut self.inner, pgid);
        }
    }

    /// Reset to `SIG_DFL` the signals the shell ignores or catches, so
    /// children get stock behavior for Ctrl-C, Ctrl-Z, and terminal I/O
    /// stops.
    fn set_sigdefault(&mut self) {
        unsafe {
            let mut flags: libc::c_short = 0;
            libc::posix_spawnattr_getflags(&self.inner, &mut flags);
            flags |= libc::POSIX_SPAWN_SETSIGDEF as libc::c_short;
            libc::posix_spawnattr_setflags(&mut self.inner, flags);

            let mut sigset: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut sigset);
            for sig in [
                libc::SIGINT,
                libc::SIGQUIT,
                libc::SIGTERM,
                libc::SIGCHLD,
                libc::SIGTSTP,
                libc::SIGTTOU,
                libc::SIGTTIN,
                libc::SIGPIPE,
            ] {
                libc::sigaddset(&mut sigset, sig);
            }
            libc::posix_spawnattr_setsigdefault(&mut self.inner, &sigset);
        }
    }

    fn as_ptr(&self) -> *const libc::posix_spawnattr_t {
        &self.inner
    }
}

impl Drop for SpawnAttr {
    fn drop(&mut self) {
        unsafe {
            libc::posix_spawnattr_destroy(&mut self.inner);
        }
    }
}

// ── FileActions ─────────────────────────────────────────────────────

/// RAII wrapper for `posix_spawn_file_actions_t`; destroyed on drop.
struct FileActions {
    inner: libc::posix_spawn_file_actions_t,
}

impl FileActions {
    fn new() -> Self {
        unsafe {
            let mut actions: libc::posix_spawn_file_actions_t = std::mem::zeroed();
            libc::posix_spawn_file_actions_init(&mut actions);
            Self { inner: actions }
        }
    }

    /// Queue `dup2(fd, newfd)` in the child.
    fn add_dup2(&mut self, fd: i32, newfd: i32) {
        unsafe {
            libc::posix_spawn_file_actions_adddup2(&mut self.inner, fd, newfd);
        }
    }

    /// Queue `close(fd)` in the child.
    fn add_close(&mut self, fd: i32) {
        unsafe {
            libc::posix_spawn_file_actions_addclose(&mut self.inner, fd);
        }
    }

    fn as_ptr(&self) -> *const libc::posix_spawn_file_actions_t {
        &self.inner
    }
}

impl Drop for FileActions {
    fn drop(&mut self) {
        unsafe {
            libc::posix_spawn_file_actions_destroy(&mut self.inner);
        }
    }
}

// ── CStringVec ──────────────────────────────────────────────────────

/// Owned CStrings plus the NUL-terminated pointer array pointing into them.
struct CStringVec {
    _strings: Vec<CString>,
    ptrs: Vec<*mut libc::c_char>,
}

impl CStringVec {
    fn from_strs<S: AsRef<str>>(items: &[S]) -> Self {
        let strings: Vec<CString> = items
            .iter()
            .map(|s| {
                // interior NUL cannot survive the C boundary; drop the tail
                let bytes = s.as_ref().as_bytes();
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                CString::new(&bytes[..end]).unwrap_or_default()
            })
            .collect();
        let mut ptrs: Vec<*mut libc::c_char> = strings
            .iter()
            .map(|s| s.as_ptr() as *mut libc::c_char)
            .collect();
        ptrs.push(std::ptr::null_mut());
        Self {
            _strings: strings,
            ptrs,
        }
    }

    fn as_ptr(&self) -> *const *mut libc::c_char {
        self.ptrs.as_ptr()
    }
}

// ── spawn ───────────────────────────────────────────────────────────

/// Start `path` as a child process. Returns the child's pid.
///
/// - `argv`: argv for the child (`argv[0]` is the name the user typed)
/// - `envp`: `NAME=value` strings for the child's environment
/// - `pgid`: process group for the child (0 makes the child the leader)
/// - `stdin_fd` / `stdout_fd`: descriptors to wire onto fd 0/1 (`None`
///   inherits the shell's)
pub fn spawn(
    path: &Path,
    argv: &[String],
    envp: &[String],
    pgid: libc::pid_t,
    stdin_fd: Option<i32>,
    stdout_fd: Option<i32>,
) -> Result<libc::pid_t, SpawnError> {
    let command = argv.first().cloned().unwrap_or_default();
    let cpath = CString::new(path.as_os_str().as_encoded_bytes()).map_err(|_| SpawnError {
        errno: libc::ENOENT,
        command: command.clone(),
    })?;
    let argv = CStringVec::from_strs(argv);
    let envp = CStringVec::from_strs(envp);

    let mut attr = SpawnAttr::new();
    attr.set_pgroup(pgid);
    attr.set_sigdefault();

    let mut actions = FileActions::new();
    if let Some(fd) = stdin_fd {
        actions.add_dup2(fd, libc::STDIN_FILENO);
        if fd != libc::STDIN_FILENO {
            actions.add_close(fd);
        }
    }
    if let Some(fd) = stdout_fd {
        actions.add_dup2(fd, libc::STDOUT_FILENO);
        if fd != libc::STDOUT_FILENO {
            actions.add_close(fd);
        }
    }

    let mut pid: libc::pid_t = 0;
    let ret = unsafe {
        libc::posix_spawn(
            &mut pid,
            cpath.as_ptr(),
            actions.as_ptr(),
            attr.as_ptr(),
            argv.as_ptr(),
            envp.as_ptr(),
        )
    };

    if ret != 0 {
        return Err(SpawnError {
            errno: ret,
            command,
        });
    }

    log::trace!("spawned {} as pid {} (pgid {})", command, pid, pgid);
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_error_statuses() {
        let not_found = SpawnError {
            errno: libc::ENOENT,
            command: "nope".into(),
        };
        assert_eq!(not_found.exit_status(), 127);
        assert_eq!(not_found.to_string(), "minnow: nope: command not found");

        let denied = SpawnError {
            errno: libc::EACCES,
            command: "locked".into(),
        };
        assert_eq!(denied.exit_status(), 126);

        let other = SpawnError {
            errno: libc::ENOMEM,
            command: "x".into(),
        };
        assert_eq!(other.exit_status(), 1);
    }

    #[test]
    fn cstringvec_is_nul_terminated() {
        let v = CStringVec::from_strs(&["a", "b"]);
        unsafe {
            assert!(!v.as_ptr().read().is_null());
            assert!(!v.as_ptr().add(1).read().is_null());
            assert!(v.as_ptr().add(2).read().is_null());
        }
    }
}
