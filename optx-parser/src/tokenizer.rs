//! Record assembly
//!
//! Walks classified lines and groups them into [`RawTransaction`] records. A record starts at a
//! delimiter line and runs until the next delimiter outside a block, or the end of input.
//! Inside a record the metadata section comes first, then zero or more blocks:
//!
//! ```text
//! ~
//! action: create
//! target: hello.txt
//! reasoning: greet
//!   across two lines
//! [block]
//! hi
//! [/block]
//! ~
//! ```
//!
//! Everything between an open and a close marker is raw content, delimiter lines included.
//! Records made only of blank lines are dropped, so a trailing delimiter is optional.

use crate::ast::{MetadataEntry, RawBlock, RawTransaction};
use crate::error::{ParseError, ParseErrorKind};
use crate::lexing::{split_lines, LineType, SourceLine};
use crate::range::{Position, Range, SourceLocation};

/// Tokenize a document into raw transaction records.
///
/// Fails with [`ParseErrorKind::EmptyDocument`] when the source holds no record.
pub fn tokenize(source: &str) -> Result<Vec<RawTransaction>, ParseError> {
    let records = tokenize_records(source)?;
    if records.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::EmptyDocument,
            Position::default(),
            "document contains no transactions",
        ));
    }
    Ok(records)
}

/// Like [`tokenize`], but an input without records yields an empty list.
pub(crate) fn tokenize_records(source: &str) -> Result<Vec<RawTransaction>, ParseError> {
    let location = SourceLocation::new(source);
    let mut assembler = Assembler::new(source, &location);

    for line in split_lines(source) {
        assembler.feed(&line)?;
    }

    assembler.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Before the first delimiter
    Preamble,
    /// Metadata lines of the current record
    Metadata,
    /// After at least one block of the current record
    Content,
}

struct OpenBlock {
    language: Option<String>,
    marker: Position,
    content_start: usize,
}

struct Assembler<'s> {
    source: &'s str,
    location: &'s SourceLocation,
    phase: Phase,
    record: Option<PendingRecord>,
    block: Option<OpenBlock>,
    records: Vec<RawTransaction>,
}

struct PendingRecord {
    start: usize,
    start_position: Position,
    end: usize,
    metadata: Vec<MetadataEntry>,
    blocks: Vec<RawBlock>,
    /// Whether an indented line may continue the last metadata value
    continuation: bool,
}

impl<'s> Assembler<'s> {
    fn new(source: &'s str, location: &'s SourceLocation) -> Self {
        Self {
            source,
            location,
            phase: Phase::Preamble,
            record: None,
            block: None,
            records: Vec::new(),
        }
    }

    fn feed(&mut self, line: &SourceLine<'_>) -> Result<(), ParseError> {
        if self.block.is_some() {
            return self.feed_block_line(line);
        }

        match &line.line_type {
            LineType::Blank => {
                if let Some(record) = self.record.as_mut() {
                    record.continuation = false;
                }
                Ok(())
            }
            LineType::Delimiter => {
                self.close_record();
                self.record = Some(PendingRecord {
                    start: line.span.start,
                    start_position: Position::new(line.number, 0),
                    end: line.span.end,
                    metadata: Vec::new(),
                    blocks: Vec::new(),
                    continuation: false,
                });
                self.phase = Phase::Metadata;
                Ok(())
            }
            LineType::OpenBlock { language } => {
                if self.phase == Phase::Preamble {
                    return Err(unexpected(line, "[block] outside of a transaction record"));
                }
                self.block = Some(OpenBlock {
                    language: language.clone(),
                    marker: Position::new(line.number, line.text.len() - line.text.trim_start().len()),
                    content_start: line.next_start,
                });
                self.touch(line);
                Ok(())
            }
            LineType::CloseBlock => Err(unexpected(line, "[/block] without a matching [block]")),
            LineType::Metadata { key, value } if self.phase == Phase::Metadata => {
                let record = self.current(line)?;
                record.metadata.push(MetadataEntry {
                    key: key.clone(),
                    value: value.clone(),
                    position: Position::new(line.number, 0),
                });
                record.continuation = true;
                record.end = line.span.end;
                Ok(())
            }
            LineType::Text
                if self.phase == Phase::Metadata
                    && line.is_indented()
                    && self.record.as_ref().is_some_and(|r| r.continuation) =>
            {
                let record = self.current(line)?;
                if let Some(entry) = record.metadata.last_mut() {
                    if !entry.value.is_empty() {
                        entry.value.push('\n');
                    }
                    entry.value.push_str(line.text.trim());
                }
                record.end = line.span.end;
                Ok(())
            }
            LineType::Metadata { .. } | LineType::Text => Err(stray(line, self.phase)),
        }
    }

    fn feed_block_line(&mut self, line: &SourceLine<'_>) -> Result<(), ParseError> {
        match &line.line_type {
            LineType::CloseBlock => {
                let Some(open) = self.block.take() else {
                    return Ok(());
                };
                let content_end = line.span.start.max(open.content_start);
                let range = self
                    .location
                    .byte_range_to_range(&(open.content_start..content_end));
                let block = RawBlock {
                    language: open.language,
                    content: self.source[open.content_start..content_end].to_string(),
                    range,
                    marker: open.marker,
                };
                let record = self.current(line)?;
                record.blocks.push(block);
                record.continuation = false;
                self.touch(line);
                self.phase = Phase::Content;
                Ok(())
            }
            LineType::OpenBlock { .. } => Err(unexpected(line, "blocks cannot be nested")),
            _ => Ok(()),
        }
    }

    fn current(&mut self, line: &SourceLine<'_>) -> Result<&mut PendingRecord, ParseError> {
        self.record
            .as_mut()
            .ok_or_else(|| stray(line, Phase::Preamble))
    }

    fn touch(&mut self, line: &SourceLine<'_>) {
        if let Some(record) = self.record.as_mut() {
            record.end = line.span.end;
        }
    }

    fn close_record(&mut self) {
        let Some(record) = self.record.take() else {
            return;
        };
        if record.metadata.is_empty() && record.blocks.is_empty() {
            return;
        }

        let end_position = self.location.byte_to_position(record.end);
        self.records.push(RawTransaction {
            index: self.records.len(),
            range: Range::new(record.start..record.end, record.start_position, end_position),
            metadata: record.metadata,
            blocks: record.blocks,
        });
    }

    fn finish(mut self) -> Result<Vec<RawTransaction>, ParseError> {
        if let Some(open) = self.block.take() {
            return Err(ParseError::new(
                ParseErrorKind::UnterminatedBlock,
                open.marker,
                "[block] is never closed by [/block]",
            ));
        }
        self.close_record();
        Ok(self.records)
    }
}

fn unexpected(line: &SourceLine<'_>, detail: &str) -> ParseError {
    ParseError::new(
        ParseErrorKind::UnexpectedMarker,
        Position::new(line.number, 0),
        detail,
    )
}

fn stray(line: &SourceLine<'_>, phase: Phase) -> ParseError {
    let detail = match phase {
        Phase::Preamble => "text before the first transaction delimiter",
        Phase::Metadata => "expected `key: value` metadata or a [block]",
        Phase::Content => "only blocks may follow the first [block] of a transaction",
    };
    ParseError::new(
        ParseErrorKind::StrayContent,
        Position::new(line.number, 0),
        detail,
    )
}
