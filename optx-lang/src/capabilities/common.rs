//! Text helpers shared by the built-in capabilities
//!
//! Each helper is idempotent on its own, and they compose into idempotent pipelines as long as
//! line endings are normalized first.

use crate::error::CapabilityError;

/// Turn `\r\n` and lone `\r` into `\n`
pub fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Strip spaces and tabs at the end of every line
pub fn strip_trailing_whitespace(content: &str) -> String {
    map_lines(content, |line| line.trim_end_matches([' ', '\t']).to_string())
}

/// Drop trailing blank lines and end non-empty content with exactly one `\n`
pub fn ensure_final_newline(content: &str) -> String {
    let trimmed = content.trim_end_matches('\n');
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{}\n", trimmed)
}

/// Apply `f` to every line, keeping the line structure (including a missing final newline)
pub fn map_lines(content: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(content.len());
    for (index, line) in content.split('\n').enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&f(line));
    }
    out
}

/// The leading run of spaces and tabs of a line
pub fn indentation(line: &str) -> &str {
    let end = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..end]
}

/// How comments and strings look in a C-like language
#[derive(Debug, Clone, Copy)]
pub struct Syntax {
    pub line_comments: &'static [&'static str],
    pub block_comment: Option<(&'static str, &'static str)>,
    pub quotes: &'static [char],
    /// Whether `/` in operand position starts a regex literal
    pub regex_literals: bool,
}

/// Keywords after which a `/` starts a regex literal rather than a division
const OPERAND_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// Punctuation after which an operand, and therefore a regex literal, may follow
const OPERAND_PUNCTUATION: &str = "(,=:[!&|?{};+-*%<>~^";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    LineComment,
    BlockComment,
    Quoted(char),
    Regex { class: bool },
}

/// The last code token seen, enough to tell a regex literal from a division
#[derive(Debug, Default)]
struct Preceding {
    word: String,
    word_done: bool,
    punctuation: Option<char>,
}

impl Preceding {
    fn push(&mut self, ch: char) {
        if ch.is_whitespace() {
            self.word_done = true;
        } else if ch.is_alphanumeric() || ch == '_' || ch == '$' {
            if self.word_done {
                self.word.clear();
                self.word_done = false;
            }
            self.word.push(ch);
        } else {
            self.word.clear();
            self.word_done = false;
            self.punctuation = Some(ch);
        }
    }

    /// A string or regex literal just ended
    fn operand(&mut self) {
        self.word.clear();
        self.word_done = false;
        self.punctuation = Some(')');
    }

    fn expects_operand(&self) -> bool {
        if !self.word.is_empty() {
            return OPERAND_KEYWORDS.contains(&self.word.as_str());
        }
        self.punctuation
            .map_or(true, |ch| OPERAND_PUNCTUATION.contains(ch))
    }
}

/// Check that `()[]{}` balance outside of strings, comments and regex literals.
///
/// Unterminated strings and comments are tolerated; they simply hide the rest of the input.
/// A regex literal ends at the end of its line at the latest.
pub fn check_brackets(content: &str, syntax: &Syntax) -> Result<(), CapabilityError> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut state = Scan::Code;
    let mut preceding = Preceding::default();
    let mut line = 0;
    let mut i = 0;

    while let Some(ch) = content[i..].chars().next() {
        let rest = &content[i..];
        let mut step = ch.len_utf8();

        match state {
            Scan::Code => {
                if let Some(marker) = syntax.line_comments.iter().find(|m| rest.starts_with(**m)) {
                    state = Scan::LineComment;
                    step = marker.len();
                } else if let Some((open, _)) = syntax
                    .block_comment
                    .filter(|(open, _)| rest.starts_with(open))
                {
                    state = Scan::BlockComment;
                    step = open.len();
                } else if syntax.quotes.contains(&ch) {
                    state = Scan::Quoted(ch);
                } else if ch == '/' && syntax.regex_literals && preceding.expects_operand() {
                    state = Scan::Regex { class: false };
                } else {
                    preceding.push(ch);
                    match ch {
                        '(' | '[' | '{' => stack.push((ch, line)),
                        ')' | ']' | '}' => match stack.pop() {
                            Some((open, _)) if open == opening(ch) => {}
                            _ => return Err(CapabilityError::Unbalanced { bracket: ch, line }),
                        },
                        _ => {}
                    }
                }
            }
            Scan::LineComment => {
                if ch == '\n' {
                    state = Scan::Code;
                }
            }
            Scan::BlockComment => {
                if let Some((_, close)) = syntax.block_comment {
                    if rest.starts_with(close) {
                        state = Scan::Code;
                        step = close.len();
                    }
                }
            }
            Scan::Quoted(quote) => {
                if ch == '\\' {
                    step += rest[1..].chars().next().map_or(0, char::len_utf8);
                } else if ch == quote {
                    state = Scan::Code;
                    preceding.operand();
                }
            }
            Scan::Regex { class } => match ch {
                '\\' => step += rest[1..].chars().next().map_or(0, char::len_utf8),
                '\n' => state = Scan::Code,
                '[' => state = Scan::Regex { class: true },
                ']' if class => state = Scan::Regex { class: false },
                '/' if !class => {
                    state = Scan::Code;
                    preceding.operand();
                }
                _ => {}
            },
        }

        line += content[i..i + step].matches('\n').count();
        i += step;
    }

    match stack.pop() {
        Some((bracket, line)) => Err(CapabilityError::Unbalanced { bracket, line }),
        None => Ok(()),
    }
}

fn opening(close: char) -> char {
    match close {
        ')' => '(',
        ']' => '[',
        _ => '{',
    }
}
