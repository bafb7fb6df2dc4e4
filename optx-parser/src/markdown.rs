//! Operation documents embedded in markdown
//!
//! Every fenced code block tagged `op` or `optx` holds operation-document text. The blocks are
//! tokenized one by one and their records are concatenated in document order, with positions
//! shifted back onto the markdown file so errors point at the right lines.

use crate::ast::RawTransaction;
use crate::error::{ParseError, ParseErrorKind};
use crate::range::{Position, SourceLocation};
use crate::tokenizer::tokenize_records;
use comrak::nodes::NodeValue;
use comrak::{parse_document, Arena, Options};

/// Info-string tags that mark a fenced block as an operation document
pub const FENCE_TAGS: &[&str] = &["op", "optx"];

/// A fenced block's text and where its first content line sits in the markdown source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedSource {
    /// Zero-based markdown line of the first content line
    pub line_offset: usize,
    /// Byte offset of that line
    pub byte_offset: usize,
    pub text: String,
}

/// Collect the tagged fenced blocks of a markdown document, in order.
pub fn extract_embedded(markdown: &str) -> Vec<EmbeddedSource> {
    let arena = Arena::new();
    let options = Options::default();
    let root = parse_document(&arena, markdown, &options);
    let location = SourceLocation::new(markdown);

    let mut sources = Vec::new();
    for node in root.descendants() {
        let data = node.data.borrow();
        let NodeValue::CodeBlock(ref block) = data.value else {
            continue;
        };
        if !block.fenced {
            continue;
        }
        let tag = block.info.split_whitespace().next().unwrap_or_default();
        if !FENCE_TAGS.contains(&tag) {
            continue;
        }

        // sourcepos lines are one-based and point at the opening fence
        let line_offset = data.sourcepos.start.line;
        sources.push(EmbeddedSource {
            line_offset,
            byte_offset: location.line_start(line_offset).unwrap_or(markdown.len()),
            text: block.literal.clone(),
        });
    }

    sources
}

/// Tokenize all operation documents embedded in a markdown file.
pub fn tokenize_markdown(markdown: &str) -> Result<Vec<RawTransaction>, ParseError> {
    let embedded = extract_embedded(markdown);
    tracing::debug!(fences = embedded.len(), "extracted embedded operation blocks");

    let mut records = Vec::new();
    for source in &embedded {
        let fragment = tokenize_records(&source.text)
            .map_err(|err| err.shifted(source.line_offset))?;
        for record in fragment {
            let mut record = record.shifted(source.line_offset, source.byte_offset);
            record.index = records.len();
            records.push(record);
        }
    }

    if records.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::EmptyDocument,
            Position::default(),
            "markdown contains no ```op fenced blocks with transactions",
        ));
    }
    Ok(records)
}
