//! Word expansion: tilde, variables, and glob dispatch.
//!
//! Runs on the main thread between parsing and resolution. Expansion order
//! per word:
//!
//! 1. tilde — a leading unquoted `~` (alone or before `/`) becomes `HOME`
//! 2. variables — `$NAME`, `${NAME}`, `$?`, `$$` in unquoted and
//!    double-quoted parts; single-quoted parts pass through untouched
//! 3. globbing — only for fully unquoted words whose expanded text still
//!    holds `*` or `?`; no matches leaves the pattern literal
//!
//! Unset variables expand to the empty string. A fully unquoted word that
//! expands to nothing disappears from argv entirely; a quoted empty word
//! survives as an empty argument. No field splitting is performed: one word
//! in, one word out (globbing aside).

use std::fmt;

use crate::glob;
use crate::parser::{Quote, Word};
use crate::state::Environ;

#[derive(Debug, PartialEq)]
pub enum ExpandError {
    /// Redirect target expanded to zero or several words.
    AmbiguousRedirect(String),
}

impl fmt::Display for ExpandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousRedirect(text) => write!(f, "{}: ambiguous redirect", text),
        }
    }
}

pub struct Expander<'a> {
    env: &'a Environ,
    last_status: i32,
}

impl<'a> Expander<'a> {
    pub fn new(env: &'a Environ, last_status: i32) -> Self {
        Self { env, last_status }
    }

    /// Expand one argv word. May produce zero results (empty bare
    /// expansion) or several (glob matches).
    pub fn expand_word(&self, word: &Word) -> Vec<String> {
        let text = self.expand_text(word);

        if word.is_fully_bare() {
            if text.is_empty() {
                return Vec::new();
            }
            if glob::has_pattern(&text) {
                return glob::expand(&text);
            }
        }
        vec![text]
    }

    /// Expand without globbing and without dropping empties. Used for
    /// assignment values.
    pub fn expand_assignment(&self, word: &Word) -> String {
        self.expand_text(word)
    }

    /// A redirect target must expand to exactly one word.
    pub fn expand_redirect_target(&self, word: &Word) -> Result<String, ExpandError> {
        let mut fields = self.expand_word(word);
        if fields.len() == 1 {
            Ok(fields.remove(0))
        } else {
            Err(ExpandError::AmbiguousRedirect(word.flatten()))
        }
    }

    fn expand_text(&self, word: &Word) -> String {
        let mut out = String::new();
        for (i, part) in word.parts.iter().enumerate() {
            match part.quote {
                Quote::Single => out.push_str(&part.text),
                Quote::Bare | Quote::Double => {
                    let text = if i == 0 && part.quote == Quote::Bare {
                        self.expand_tilde(&part.text)
                    } else {
                        part.text.clone()
                    };
                    self.expand_vars(&text, &mut out);
                }
            }
        }
        out
    }

    fn expand_tilde(&self, text: &str) -> String {
        if text == "~" || text.starts_with("~/") {
            if let Some(home) = self.env.get("HOME") {
                return format!("{}{}", home, &text[1..]);
            }
        }
        text.to_string()
    }

    fn expand_vars(&self, text: &str, out: &mut String) {
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            match chars.peek() {
                Some('?') => {
                    chars.next();
                    out.push_str(&self.last_status.to_string());
                }
                Some('$') => {
                    chars.next();
                    out.push_str(&std::process::id().to_string());
                }
                Some('{') => {
                    chars.next();
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if closed {
                        out.push_str(self.env.get(&name).unwrap_or(""));
                    } else {
                        // unterminated `${`: keep the raw text
                        out.push_str("${");
                        out.push_str(&name);
                    }
                }
                Some(&c) if c.is_ascii_alphabetic() || c == '_' => {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            name.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    out.push_str(self.env.get(&name).unwrap_or(""));
                }
                // lone `$` (or `$` before punctuation) is literal
                _ => out.push('$'),
            }
        }
    }
}
