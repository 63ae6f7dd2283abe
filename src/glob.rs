//! Pathname expansion: `*` and `?` matched against the filesystem.
//!
//! - `*` matches zero or more characters within one path component
//! - `?` matches exactly one character
//!
//! Names starting with `.` only match patterns that start with `.` (bash
//! behavior). Matches are returned sorted; a pattern that matches nothing
//! expands to the literal pattern, so globbing never hard-fails.

/// Does the string contain glob metacharacters?
pub fn has_pattern(s: &str) -> bool {
    s.bytes().any(|b| b == b'*' || b == b'?')
}

/// Expand a pattern against the filesystem. Directory components may
/// themselves contain patterns. No match → the literal pattern.
pub fn expand(pattern: &str) -> Vec<String> {
    let results = match pattern.rfind('/') {
        Some(slash) => {
            let dir_part = &pattern[..slash];
            let name_part = &pattern[slash + 1..];
            if has_pattern(dir_part) {
                let mut out = Vec::new();
                for dir in expand(dir_part) {
                    if std::fs::metadata(&dir).map(|m| m.is_dir()).unwrap_or(false) {
                        out.extend(matches_in_dir(&dir, name_part));
                    }
                }
                out
            } else {
                let dir = if dir_part.is_empty() { "/" } else { dir_part };
                matches_in_dir(dir, name_part)
            }
        }
        None => matches_in_dir(".", pattern),
    };

    if results.is_empty() {
        vec![pattern.to_string()]
    } else {
        results
    }
}

/// Entries of `dir` whose names match `pattern`, sorted, with the directory
/// prefix re-attached (omitted for `.`).
fn matches_in_dir(dir: &str, pattern: &str) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };

    let mut out = Vec::new();
    for entry in entries.flatten() {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') && !pattern.starts_with('.') {
            continue;
        }
        if matches(pattern, &name) {
            if dir == "." {
                out.push(name);
            } else if dir == "/" {
                out.push(format!("/{}", name));
            } else {
                out.push(format!("{}/{}", dir, name));
            }
        }
    }
    out.sort();
    out
}

/// Match one name against one pattern. Iterative with single-star
/// backtracking: on mismatch after a `*`, rewind to the star and let it
/// swallow one more character.
pub fn matches(pattern: &str, name: &str) -> bool {
    let pat = pattern.as_bytes();
    let txt = name.as_bytes();

    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut star_t = 0usize;

    while t < txt.len() {
        if p < pat.len() && (pat[p] == b'?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == b'*' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(sp) = star {
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pat.len() && pat[p] == b'*' {
        p += 1;
    }
    p == pat.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_suffix() {
        assert!(matches("*.txt", "hello.txt"));
        assert!(!matches("*.txt", "hello.rs"));
    }

    #[test]
    fn question_mark() {
        assert!(matches("h?llo", "hello"));
        assert!(!matches("h?llo", "hllo"));
    }

    #[test]
    fn lone_star() {
        assert!(matches("*", "anything"));
        assert!(matches("*", ""));
    }

    #[test]
    fn star_in_middle() {
        assert!(matches("foo*bar", "foobazbar"));
        assert!(matches("foo*bar", "foobar"));
        assert!(!matches("foo*bar", "foobaz"));
    }

    #[test]
    fn exact() {
        assert!(matches("hello", "hello"));
        assert!(!matches("hello", "world"));
    }

    #[test]
    fn empty() {
        assert!(matches("", ""));
        assert!(!matches("", "a"));
    }

    #[test]
    fn multiple_stars() {
        assert!(matches("*.*", "foo.bar"));
        assert!(!matches("*.*", "foobar"));
        assert!(matches("a*b*c", "a-x-b-y-c"));
    }

    #[test]
    fn backtracking_picks_later_match() {
        assert!(matches("*b", "abab"));
        assert!(matches("a*bc", "axxbxbc"));
    }

    #[test]
    fn has_pattern_detection() {
        assert!(has_pattern("*.txt"));
        assert!(has_pattern("h?llo"));
        assert!(!has_pattern("plain"));
        assert!(!has_pattern("path/to/file.txt"));
    }

    #[test]
    fn no_match_returns_literal() {
        let result = expand("no_such_file_zz_*.qqqq");
        assert_eq!(result, vec!["no_such_file_zz_*.qqqq"]);
    }

    #[test]
    fn dotfiles_need_explicit_dot() {
        let dir = std::env::temp_dir().join(format!("minnow-glob-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".hidden"), b"").unwrap();
        std::fs::write(dir.join("shown"), b"").unwrap();

        let pat = format!("{}/*", dir.display());
        assert_eq!(expand(&pat), vec![format!("{}/shown", dir.display())]);

        let pat = format!("{}/.h*", dir.display());
        assert_eq!(expand(&pat), vec![format!("{}/.hidden", dir.display())]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
