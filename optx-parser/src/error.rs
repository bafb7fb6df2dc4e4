//! Error types for tokenizing and validating operation documents

use crate::range::Position;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Structural failure kinds; any of them is fatal for the whole document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseErrorKind {
    /// A `[block]` without a matching `[/block]`
    UnterminatedBlock,
    /// A block marker where none is allowed (nested open, stray close)
    UnexpectedMarker,
    /// No transaction records at all
    EmptyDocument,
    /// Non-blank text outside of metadata and blocks
    StrayContent,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::UnterminatedBlock => write!(f, "unterminated block"),
            ParseErrorKind::UnexpectedMarker => write!(f, "unexpected marker"),
            ParseErrorKind::EmptyDocument => write!(f, "empty document"),
            ParseErrorKind::StrayContent => write!(f, "stray content"),
        }
    }
}

/// A structural error in an operation document
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind} at line {}, column {}: {detail}", .position.line + 1, .position.column + 1)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: Position,
    pub detail: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, position: Position, detail: impl Into<String>) -> Self {
        Self {
            kind,
            position,
            detail: detail.into(),
        }
    }

    pub(crate) fn shifted(mut self, lines: usize) -> Self {
        self.position = self.position.shifted(lines);
        self
    }

    /// Render the error with the surrounding source lines.
    pub fn with_context(&self, source: &str) -> String {
        format!("{}\n{}", self, format_source_context(source, self.position.line))
    }
}

/// The transaction field a validation error refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Field {
    Action,
    Target,
    Reasoning,
    DeveloperNotes,
    Author,
    Destination,
    Blocks,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Action => "action",
            Field::Target => "target",
            Field::Reasoning => "reasoning",
            Field::DeveloperNotes => "developer-notes",
            Field::Author => "author",
            Field::Destination => "destination",
            Field::Blocks => "blocks",
        };
        f.write_str(name)
    }
}

/// A semantic defect in one transaction
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("transaction {}: {field}: {reason}", .transaction_index + 1)]
pub struct ValidationError {
    /// Zero-based index of the transaction within its document
    pub transaction_index: usize,
    pub field: Field,
    pub reason: String,
}

impl ValidationError {
    pub fn new(transaction_index: usize, field: Field, reason: impl Into<String>) -> Self {
        Self {
            transaction_index,
            field,
            reason: reason.into(),
        }
    }
}

/// Every validation error of a document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} validation error(s), first: {}", .0.len(), .0.first().map(|e| e.to_string()).unwrap_or_default())]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Format source context around a zero-based line
///
/// Shows 2 lines before the error, the error line with >> marker, and 2 lines after.
/// Lines are numbered one-based.
pub fn format_source_context(source: &str, error_line: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();

    let start_line = error_line.saturating_sub(2);
    let end_line = (error_line + 3).min(lines.len());

    let mut context = String::new();

    for (line_num, line) in lines.iter().enumerate().take(end_line).skip(start_line) {
        let marker = if line_num == error_line { ">>" } else { "  " };
        context.push_str(&format!("{} {:3} | {}\n", marker, line_num + 1, line));
    }

    context
}
