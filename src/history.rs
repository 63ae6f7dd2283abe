//! Command history.
//!
//! Persisted as plain text, one command per line, in `~/.minnow_history`
//! (falls back to `/tmp` when `HOME` is unset). Loaded at startup, appended
//! on every accepted command. Consecutive duplicates and blank lines are
//! skipped; at most 1000 entries are kept.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

const MAX_ENTRIES: usize = 1000;

pub struct History {
    entries: Vec<String>,
    path: PathBuf,
}

impl History {
    /// Load existing history from disk (missing file is fine).
    pub fn open(home: Option<&str>) -> Self {
        let path = PathBuf::from(home.unwrap_or("/tmp")).join(".minnow_history");
        let mut h = Self {
            entries: Vec::new(),
            path,
        };
        h.load();
        h
    }

    #[cfg(test)]
    fn in_memory(entries: &[&str]) -> Self {
        Self {
            entries: entries.iter().map(|s| s.to_string()).collect(),
            path: PathBuf::from("/dev/null"),
        }
    }

    fn load(&mut self) {
        if let Ok(file) = fs::File::open(&self.path) {
            for line in BufReader::new(file).lines().map_while(Result::ok) {
                if !line.is_empty() {
                    self.entries.push(line);
                }
            }
            if self.entries.len() > MAX_ENTRIES {
                self.entries.drain(..self.entries.len() - MAX_ENTRIES);
            }
        }
    }

    /// Record a command and append it to the history file. Blank lines and
    /// repeats of the previous entry are dropped.
    pub fn add(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || self.entries.last().is_some_and(|last| last == line) {
            return;
        }
        self.entries.push(line.to_string());
        if self.entries.len() > MAX_ENTRIES {
            self.entries.remove(0);
        }
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(file, "{}", line);
        }
    }

    /// Oldest-first view of the recorded commands.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_skips_empty_and_consecutive_duplicates() {
        let mut h = History::in_memory(&[]);
        h.add("");
        h.add("   ");
        assert!(h.entries().is_empty());

        h.add("echo hello");
        h.add("echo hello");
        assert_eq!(h.entries().len(), 1);

        h.add("echo world");
        h.add("echo hello");
        assert_eq!(h.entries().len(), 3);
    }

    #[test]
    fn entries_keep_insertion_order() {
        let mut h = History::in_memory(&["first"]);
        h.add("second");
        assert_eq!(h.entries(), ["first", "second"]);
    }
}
