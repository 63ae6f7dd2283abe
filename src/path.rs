//! Command-name resolution.
//!
//! Priority order: builtin registry, then the shell's private binary
//! directory (`~/.minnow/bin`), then a scan of `PATH` components, and
//! finally — for names containing a `/` — the literal path itself. The
//! private directory always shadows system commands of the same name, and is
//! consulted inside the resolver rather than spliced into the `PATH`
//! variable, so children inherit `PATH` untouched.
//!
//! Resolution is recomputed per invocation; `PATH` and the private directory
//! can change between commands, so nothing is cached.

use std::path::{Path, PathBuf};

use crate::builtins::{self, BuiltinSpec};

const STATE_SUBDIR: &str = ".minnow";
const BIN_SUBDIR: &str = "bin";

/// Outcome of resolving one command name. Ephemeral — never cached.
pub enum Resolved {
    Builtin(&'static BuiltinSpec),
    Executable(PathBuf),
    NotFound,
}

pub struct PathResolver {
    bin_dir: Option<PathBuf>,
}

impl PathResolver {
    /// Set up the resolver, creating `~/.minnow/bin` if it does not exist.
    /// A missing home directory degrades to `PATH`-only resolution.
    pub fn init(home: Option<&str>) -> Self {
        let bin_dir = home.map(|h| Path::new(h).join(STATE_SUBDIR).join(BIN_SUBDIR));
        if let Some(dir) = &bin_dir {
            if let Err(e) = std::fs::create_dir_all(dir) {
                eprintln!("minnow: warning: could not create {}: {}", dir.display(), e);
            } else {
                log::debug!("private bin dir: {}", dir.display());
            }
        }
        Self { bin_dir }
    }

    /// Resolver with an explicit private directory; used by tests.
    pub fn with_bin_dir(bin_dir: Option<PathBuf>) -> Self {
        Self { bin_dir }
    }

    pub fn bin_dir(&self) -> Option<&Path> {
        self.bin_dir.as_deref()
    }

    /// Resolve `name` against the builtin registry, the private directory,
    /// and `path_var` (the value of `PATH`, if set).
    pub fn resolve(&self, name: &str, path_var: Option<&str>) -> Resolved {
        if name.is_empty() {
            return Resolved::NotFound;
        }

        if let Some(spec) = builtins::find(name) {
            return Resolved::Builtin(spec);
        }

        if !name.contains('/') {
            if let Some(dir) = &self.bin_dir {
                let candidate = dir.join(name);
                if is_executable(&candidate) {
                    log::debug!("resolved {} via private bin", name);
                    return Resolved::Executable(candidate);
                }
            }

            if let Some(path_var) = path_var {
                for dir in path_var.split(':').filter(|d| !d.is_empty()) {
                    let candidate = Path::new(dir).join(name);
                    if is_executable(&candidate) {
                        return Resolved::Executable(candidate);
                    }
                }
            }
            return Resolved::NotFound;
        }

        // literal relative/absolute path: existence is enough — a file that
        // exists but is not executable surfaces as EACCES (status 126) at
        // spawn time
        let candidate = PathBuf::from(name);
        if candidate.is_file() {
            Resolved::Executable(candidate)
        } else {
            Resolved::NotFound
        }
    }
}

fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let Ok(cpath) = std::ffi::CString::new(path.as_os_str().as_encoded_bytes()) else {
        return false;
    };
    unsafe { libc::access(cpath.as_ptr(), libc::X_OK) == 0 }
}
