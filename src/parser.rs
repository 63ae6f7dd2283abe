//! Tokenizer + parser: builds the syntax tree consumed by [`crate::exec`].
//!
//! The executor treats this module as an opaque AST producer; everything
//! downstream (expansion, resolution, spawning) works off the types below.
//!
//! Supported syntax:
//!
//! - sequences: `cmd1 ; cmd2`, newline-separated commands
//! - pipelines: `cmd1 | cmd2 | cmd3`
//! - background: `cmd &` (also acts as a separator: `a & b`)
//! - redirections: `<`, `>`, `>>`
//! - quoting: single (`'...'`, fully literal), double (`"..."`, variables
//!   still expand), backslash escapes
//! - assignments: leading `NAME=value` words (`FOO=1 cmd`, or alone)
//! - comments: `#` at the start of a word runs to end of line
//!
//! Quoting is preserved structurally: a [`Word`] is a list of parts, each
//! tagged with how it was quoted, so the expander (§[`crate::expand`]) can
//! apply the right rules per part. The parser itself never touches `$`.

use std::fmt;

// ── Syntax tree ─────────────────────────────────────────────────────

/// Top-level statement: pipelines executed strictly left to right.
#[derive(Debug, PartialEq)]
pub struct Sequence {
    pub pipelines: Vec<Pipeline>,
}

/// One or more commands joined by `|`. A single command is a one-stage
/// pipeline; the executor treats both uniformly.
#[derive(Debug, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<SimpleCommand>,
    /// Trailing `&`: run without waiting, tracked as a background job.
    pub background: bool,
}

/// One command: optional leading assignments, argv words, redirections.
#[derive(Debug, PartialEq, Default)]
pub struct SimpleCommand {
    pub assignments: Vec<Assignment>,
    pub words: Vec<Word>,
    pub redirects: Vec<Redirect>,
}

/// `NAME=value` preceding (or standing in for) a command.
#[derive(Debug, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Word,
}

#[derive(Debug, PartialEq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub target: Word,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum RedirectKind {
    /// `<` — stdin from file
    In,
    /// `>` — stdout to file, create/truncate
    Out,
    /// `>>` — stdout to file, create/append
    Append,
}

/// A shell word: contiguous runs of characters, each tagged with the quote
/// context it came from.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Word {
    pub parts: Vec<WordPart>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct WordPart {
    pub text: String,
    pub quote: Quote,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Quote {
    /// Unquoted: variables expand, glob characters are live.
    Bare,
    /// Single-quoted (or backslash-escaped): fully literal.
    Single,
    /// Double-quoted: variables expand, no globbing or word splitting.
    Double,
}

impl Word {
    pub fn literal(text: &str) -> Self {
        Word {
            parts: vec![WordPart {
                text: text.to_string(),
                quote: Quote::Bare,
            }],
        }
    }

    /// The raw text with quote structure flattened away. Used for display
    /// and for assignment-name detection, never for expansion.
    pub fn flatten(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// `true` when every part is unquoted (globbing is allowed only then).
    pub fn is_fully_bare(&self) -> bool {
        self.parts.iter().all(|p| p.quote == Quote::Bare)
    }
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
pub enum ParseError {
    /// Input ended inside a quoted string. Interactive mode reads a
    /// continuation line when it sees this.
    UnterminatedQuote(char),
    /// Redirect operator with no following filename.
    MissingRedirectTarget,
    /// Pipe with nothing on one side (`| cmd`, `cmd |`, `cmd | | cmd`).
    EmptyPipelineStage,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedQuote(c) => {
                write!(f, "unexpected EOF while looking for matching `{c}`")
            }
            Self::MissingRedirectTarget => write!(f, "syntax error: missing redirect target"),
            Self::EmptyPipelineStage => write!(f, "syntax error near unexpected token `|`"),
        }
    }
}

// ── Tokenizer ───────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum Token {
    Word(Word),
    Pipe,
    Separator,
    Background,
    Redirect(RedirectKind),
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        while matches!(self.chars.peek(), Some(' ' | '\t')) {
            self.chars.next();
        }

        let Some(&c) = self.chars.peek() else {
            return Ok(None);
        };

        match c {
            '\n' | ';' => {
                self.chars.next();
                Ok(Some(Token::Separator))
            }
            '&' => {
                self.chars.next();
                Ok(Some(Token::Background))
            }
            '|' => {
                self.chars.next();
                Ok(Some(Token::Pipe))
            }
            '<' => {
                self.chars.next();
                Ok(Some(Token::Redirect(RedirectKind::In)))
            }
            '>' => {
                self.chars.next();
                if self.chars.peek() == Some(&'>') {
                    self.chars.next();
                    Ok(Some(Token::Redirect(RedirectKind::Append)))
                } else {
                    Ok(Some(Token::Redirect(RedirectKind::Out)))
                }
            }
            '#' => {
                // comment runs to end of line
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.chars.next();
                }
                self.next_token()
            }
            _ => self.read_word().map(|w| Some(Token::Word(w))),
        }
    }

    fn read_word(&mut self) -> Result<Word, ParseError> {
        let mut word = Word::default();
        let mut bare = String::new();

        macro_rules! flush_bare {
            () => {
                if !bare.is_empty() {
                    word.parts.push(WordPart {
                        text: std::mem::take(&mut bare),
                        quote: Quote::Bare,
                    });
                }
            };
        }

        while let Some(&c) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\n' | ';' | '&' | '|' | '<' | '>' => break,
                '\'' => {
                    self.chars.next();
                    flush_bare!();
                    let mut text = String::new();
                    loop {
                        match self.chars.next() {
                            Some('\'') => break,
                            Some(c) => text.push(c),
                            None => return Err(ParseError::UnterminatedQuote('\'')),
                        }
                    }
                    word.parts.push(WordPart {
                        text,
                        quote: Quote::Single,
                    });
                }
                '"' => {
                    self.chars.next();
                    flush_bare!();
                    let mut text = String::new();
                    loop {
                        match self.chars.next() {
                            Some('"') => break,
                            Some('\\') => match self.chars.next() {
                                // escaped `$` must stay out of the
                                // expander's reach: park it in a literal part
                                Some(esc @ ('"' | '\\' | '$')) => {
                                    if !text.is_empty() {
                                        word.parts.push(WordPart {
                                            text: std::mem::take(&mut text),
                                            quote: Quote::Double,
                                        });
                                    }
                                    word.parts.push(WordPart {
                                        text: esc.to_string(),
                                        quote: Quote::Single,
                                    });
                                }
                                Some(other) => {
                                    text.push('\\');
                                    text.push(other);
                                }
                                None => return Err(ParseError::UnterminatedQuote('"')),
                            },
                            Some(c) => text.push(c),
                            None => return Err(ParseError::UnterminatedQuote('"')),
                        }
                    }
                    word.parts.push(WordPart {
                        text,
                        quote: Quote::Double,
                    });
                }
                '\\' => {
                    self.chars.next();
                    match self.chars.next() {
                        Some(esc) => {
                            flush_bare!();
                            word.parts.push(WordPart {
                                text: esc.to_string(),
                                quote: Quote::Single,
                            });
                        }
                        // trailing backslash: keep it literal
                        None => bare.push('\\'),
                    }
                }
                _ => {
                    self.chars.next();
                    bare.push(c);
                }
            }
        }

        if !bare.is_empty() {
            word.parts.push(WordPart {
                text: bare,
                quote: Quote::Bare,
            });
        }
        Ok(word)
    }
}

// ── Parser ──────────────────────────────────────────────────────────

/// Parse one top-level statement. `Ok(None)` means the input held nothing
/// executable (blank line or comment).
pub fn parse(input: &str) -> Result<Option<Sequence>, ParseError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token()? {
        tokens.push(tok);
    }

    let mut pipelines = Vec::new();
    let mut stages: Vec<SimpleCommand> = Vec::new();
    let mut current = SimpleCommand::default();
    let mut tokens = tokens.into_iter().peekable();

    // one pipeline stage is "open" at a time; separators flush it
    let flush_stage = |stages: &mut Vec<SimpleCommand>,
                       current: &mut SimpleCommand,
                       after_pipe: bool|
     -> Result<(), ParseError> {
        let cmd = std::mem::take(current);
        if cmd.words.is_empty() && cmd.assignments.is_empty() && cmd.redirects.is_empty() {
            if after_pipe || !stages.is_empty() {
                return Err(ParseError::EmptyPipelineStage);
            }
            return Ok(());
        }
        stages.push(cmd);
        Ok(())
    };

    while let Some(tok) = tokens.next() {
        match tok {
            Token::Word(word) => {
                if current.words.is_empty() {
                    if let Some(assign) = to_assignment(&word) {
                        current.assignments.push(assign);
                        continue;
                    }
                }
                current.words.push(word);
            }
            Token::Redirect(kind) => match tokens.next() {
                Some(Token::Word(target)) => current.redirects.push(Redirect { kind, target }),
                _ => return Err(ParseError::MissingRedirectTarget),
            },
            Token::Pipe => flush_stage(&mut stages, &mut current, true)?,
            Token::Separator | Token::Background => {
                let background = tok == Token::Background;
                flush_stage(&mut stages, &mut current, false)?;
                if !stages.is_empty() {
                    pipelines.push(Pipeline {
                        stages: std::mem::take(&mut stages),
                        background,
                    });
                }
            }
        }
    }

    flush_stage(&mut stages, &mut current, false)?;
    if !stages.is_empty() {
        pipelines.push(Pipeline {
            stages,
            background: false,
        });
    }

    if pipelines.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Sequence { pipelines }))
    }
}

/// `NAME=value` with a valid identifier before the `=`, where the `=` sits
/// in an unquoted part. The value keeps the word's remaining quote structure.
fn to_assignment(word: &Word) -> Option<Assignment> {
    let first = word.parts.first()?;
    if first.quote != Quote::Bare {
        return None;
    }
    let eq = first.text.find('=')?;
    let name = &first.text[..eq];
    if !is_valid_name(name) {
        return None;
    }

    let mut value = Word::default();
    let rest = &first.text[eq + 1..];
    if !rest.is_empty() {
        value.parts.push(WordPart {
            text: rest.to_string(),
            quote: Quote::Bare,
        });
    }
    value.parts.extend(word.parts[1..].iter().cloned());

    Some(Assignment {
        name: name.to_string(),
        value,
    })
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

    fn parse_one(input: &str) -> Sequence {
        parse(input).unwrap().unwrap()
    }

    fn argv_text(cmd: &SimpleCommand) -> Vec<String> {
        cmd.words.iter().map(|w| w.flatten()).collect()
    }

    #[test]
    fn simple_command() {
        let seq = parse_one("echo hello world");
        assert_eq!(seq.pipelines.len(), 1);
        let cmd = &seq.pipelines[0].stages[0];
        assert_eq!(argv_text(cmd), ["echo", "hello", "world"]);
        assert!(!seq.pipelines[0].background);
    }

    #[test]
    fn empty_input_and_comments() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   \t ").unwrap(), None);
        assert_eq!(parse("# just a comment").unwrap(), None);
        let seq = parse_one("echo hi # trailing");
        assert_eq!(argv_text(&seq.pipelines[0].stages[0]), ["echo", "hi"]);
    }

    #[test]
    fn pipeline_stages() {
        let seq = parse_one("cat /etc/passwd | grep root | wc -l");
        assert_eq!(seq.pipelines[0].stages.len(), 3);
        assert_eq!(argv_text(&seq.pipelines[0].stages[1]), ["grep", "root"]);
    }

    #[test]
    fn sequence_and_background() {
        let seq = parse_one("sleep 5 & echo done; pwd");
        assert_eq!(seq.pipelines.len(), 3);
        assert!(seq.pipelines[0].background);
        assert!(!seq.pipelines[1].background);
        assert_eq!(argv_text(&seq.pipelines[2].stages[0]), ["pwd"]);
    }

    #[test]
    fn newline_separates() {
        let seq = parse_one("echo a\necho b");
        assert_eq!(seq.pipelines.len(), 2);
    }

    #[test]
    fn redirects() {
        let seq = parse_one("sort < in.txt > out.txt");
        let cmd = &seq.pipelines[0].stages[0];
        assert_eq!(cmd.redirects.len(), 2);
        assert_eq!(cmd.redirects[0].kind, RedirectKind::In);
        assert_eq!(cmd.redirects[0].target.flatten(), "in.txt");
        assert_eq!(cmd.redirects[1].kind, RedirectKind::Out);

        let seq = parse_one("echo x >> log.txt");
        assert_eq!(
            seq.pipelines[0].stages[0].redirects[0].kind,
            RedirectKind::Append
        );
    }

    #[test]
    fn missing_redirect_target() {
        assert_eq!(parse("echo hi >"), Err(ParseError::MissingRedirectTarget));
        assert_eq!(parse("echo a > | b"), Err(ParseError::MissingRedirectTarget));
    }

    #[test]
    fn empty_pipeline_stage() {
        assert_eq!(parse("| echo"), Err(ParseError::EmptyPipelineStage));
        assert_eq!(parse("echo |"), Err(ParseError::EmptyPipelineStage));
        assert_eq!(parse("a | | b"), Err(ParseError::EmptyPipelineStage));
    }

    #[test]
    fn single_quotes_are_literal() {
        let seq = parse_one("echo '$HOME *'");
        let word = &seq.pipelines[0].stages[0].words[1];
        assert_eq!(word.parts.len(), 1);
        assert_eq!(word.parts[0].quote, Quote::Single);
        assert_eq!(word.parts[0].text, "$HOME *");
    }

    #[test]
    fn double_quotes_keep_expansion_context() {
        let seq = parse_one(r#"echo "hi $USER""#);
        let word = &seq.pipelines[0].stages[0].words[1];
        assert_eq!(word.parts[0].quote, Quote::Double);
        assert_eq!(word.parts[0].text, "hi $USER");
    }

    #[test]
    fn escaped_dollar_in_double_quotes_is_literal() {
        let seq = parse_one(r#"echo "a\$b""#);
        let word = &seq.pipelines[0].stages[0].words[1];
        // the `$` lands in a Single part so the expander skips it
        assert!(word
            .parts
            .iter()
            .any(|p| p.quote == Quote::Single && p.text == "$"));
    }

    #[test]
    fn backslash_escapes_outside_quotes() {
        let seq = parse_one(r"echo a\ b");
        let cmd = &seq.pipelines[0].stages[0];
        assert_eq!(cmd.words.len(), 2);
        assert_eq!(cmd.words[1].flatten(), "a b");
        assert!(!cmd.words[1].is_fully_bare());
    }

    #[test]
    fn unterminated_quotes() {
        assert_eq!(parse("echo 'oops"), Err(ParseError::UnterminatedQuote('\'')));
        assert_eq!(parse("echo \"oops"), Err(ParseError::UnterminatedQuote('"')));
    }

    #[test]
    fn leading_assignments() {
        let seq = parse_one("FOO=bar BAZ=qux env");
        let cmd = &seq.pipelines[0].stages[0];
        assert_eq!(cmd.assignments.len(), 2);
        assert_eq!(cmd.assignments[0].name, "FOO");
        assert_eq!(cmd.assignments[0].value.flatten(), "bar");
        assert_eq!(argv_text(cmd), ["env"]);
    }

    #[test]
    fn assignment_only_command() {
        let seq = parse_one("FOO=bar");
        let cmd = &seq.pipelines[0].stages[0];
        assert!(cmd.words.is_empty());
        assert_eq!(cmd.assignments.len(), 1);
    }

    #[test]
    fn assignment_after_command_word_is_argv() {
        let seq = parse_one("env FOO=bar");
        let cmd = &seq.pipelines[0].stages[0];
        assert!(cmd.assignments.is_empty());
        assert_eq!(argv_text(cmd), ["env", "FOO=bar"]);
    }

    #[test]
    fn quoted_value_is_not_assignment() {
        let seq = parse_one("'FOO=bar'");
        let cmd = &seq.pipelines[0].stages[0];
        assert!(cmd.assignments.is_empty());
        assert_eq!(cmd.words.len(), 1);
    }
}
