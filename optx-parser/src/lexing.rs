//! Line splitting and classification
//!
//! Determines the type of every source line from its token pattern. A line is one of:
//!
//! - blank: only spaces and tabs
//! - delimiter: only the `~` marker
//! - open/close block: `[block]`, `[block <language>]` or `[/block]` alone on the line
//! - metadata: `key: value` starting at column 0
//! - text: anything else
//!
//! Classification is context free; whether a line is content or structure is decided by the
//! record assembler in [`crate::tokenizer`].

use crate::token::{tokenize_line, Token};
use std::ops::Range as ByteRange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineType {
    Blank,
    Delimiter,
    OpenBlock { language: Option<String> },
    CloseBlock,
    Metadata { key: String, value: String },
    Text,
}

/// A single line of source with its location
#[derive(Debug, Clone)]
pub struct SourceLine<'a> {
    /// Zero-based line number
    pub number: usize,
    /// Byte span of the line content, excluding the line terminator
    pub span: ByteRange<usize>,
    /// Byte offset just past the line terminator (or end of input)
    pub next_start: usize,
    pub text: &'a str,
    pub line_type: LineType,
}

impl SourceLine<'_> {
    /// Whether the line starts with a space or tab
    pub fn is_indented(&self) -> bool {
        self.text.starts_with([' ', '\t'])
    }
}

/// Split source into classified lines.
///
/// A trailing `\r` is not part of [`SourceLine::text`], but stays inside the byte range
/// between lines so block content keeps the original line endings.
pub fn split_lines(source: &str) -> Vec<SourceLine<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut number = 0;

    while start < source.len() {
        let (content_end, next_start) = match source[start..].find('\n') {
            Some(offset) => (start + offset, start + offset + 1),
            None => (source.len(), source.len()),
        };
        let text = source[start..content_end]
            .strip_suffix('\r')
            .unwrap_or(&source[start..content_end]);

        lines.push(SourceLine {
            number,
            span: start..start + text.len(),
            next_start,
            text,
            line_type: classify_line(text),
        });

        start = next_start;
        number += 1;
    }

    lines
}

/// Determine the type of a line based on its tokens.
pub fn classify_line(text: &str) -> LineType {
    let tokens = tokenize_line(text);
    let content: Vec<&(Token, logos::Span)> =
        tokens.iter().filter(|(t, _)| !t.is_whitespace()).collect();

    match content.as_slice() {
        [] => LineType::Blank,
        [(Token::Delimiter, _)] => LineType::Delimiter,
        [(Token::OpenBlock(language), _)] => LineType::OpenBlock {
            language: (!language.is_empty()).then(|| language.clone()),
        },
        [(Token::CloseBlock, _)] => LineType::CloseBlock,
        _ => match tokens.first() {
            Some((Token::MetadataKey(key), span)) => LineType::Metadata {
                key: key.clone(),
                value: text[span.end..].trim().to_string(),
            },
            _ => LineType::Text,
        },
    }
}
