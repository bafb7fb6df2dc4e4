//! Records and transactions
//!
//! Two layers live here:
//!
//! - Raw records ([`RawTransaction`], [`RawBlock`], [`MetadataEntry`]) straight out of the
//!   tokenizer. They hold exactly what the source says, keys and values as written.
//! - Validated values ([`Transaction`], [`ContentBlock`], [`OperationDocument`]) produced by
//!   [`crate::building`]. Once built they are never mutated; content processing produces new
//!   values instead.

use crate::range::{Position, Range};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A `key: value` line of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
    pub position: Position,
}

/// A content block as found in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawBlock {
    /// Language given on the open marker, e.g. `[block python]`
    pub language: Option<String>,
    pub content: String,
    /// Range of the content between the markers
    pub range: Range,
    /// Position of the open marker
    pub marker: Position,
}

/// One record between delimiters, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawTransaction {
    /// Zero-based index within the document
    pub index: usize,
    /// From the opening delimiter to the last line of the record
    pub range: Range,
    pub metadata: Vec<MetadataEntry>,
    pub blocks: Vec<RawBlock>,
}

impl RawTransaction {
    /// First value recorded for a key (case-insensitive)
    pub fn value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|entry| entry.key.eq_ignore_ascii_case(key))
            .map(|entry| entry.value.as_str())
    }

    pub(crate) fn shifted(mut self, lines: usize, bytes: usize) -> Self {
        self.range = self.range.shifted(lines, bytes);
        for entry in &mut self.metadata {
            entry.position = entry.position.shifted(lines);
        }
        for block in &mut self.blocks {
            block.range = block.range.shifted(lines, bytes);
            block.marker = block.marker.shifted(lines);
        }
        self
    }
}

/// The built-in transaction verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Modify,
    Delete,
    Append,
    /// Metadata-only: moves `target` to the `destination` metadata value
    Rename,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Create,
        ActionKind::Modify,
        ActionKind::Delete,
        ActionKind::Append,
        ActionKind::Rename,
    ];

    /// Parse a verb, ignoring ASCII case and surrounding whitespace
    pub fn from_verb(verb: &str) -> Option<Self> {
        let verb = verb.trim();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(verb))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Modify => "modify",
            ActionKind::Delete => "delete",
            ActionKind::Append => "append",
            ActionKind::Rename => "rename",
        }
    }

    /// Actions that must not carry content blocks
    pub fn forbids_content(&self) -> bool {
        matches!(self, ActionKind::Delete | ActionKind::Rename)
    }

    /// Actions that are complete without content blocks
    pub fn is_metadata_only(&self) -> bool {
        matches!(self, ActionKind::Rename)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated content block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentBlock {
    pub range: Range,
    pub marker: Position,
    /// Registry key used to pick a capability (extension or language id, lowercase)
    pub language: String,
    /// Whether `language` came from the open marker rather than the target extension
    pub language_overridden: bool,
    pub raw: String,
}

/// A validated unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub index: usize,
    pub action: ActionKind,
    /// Relative path inside the project root
    pub target: PathBuf,
    /// Only set for `rename`
    pub destination: Option<PathBuf>,
    pub reasoning: String,
    pub developer_notes: Option<String>,
    pub author: Option<String>,
    /// Unrecognized keys in source order
    pub extra: Vec<(String, String)>,
    pub blocks: Vec<ContentBlock>,
    pub range: Range,
}

impl Transaction {
    /// Every path this transaction touches
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.target.as_path()).chain(self.destination.as_deref())
    }
}

/// An ordered, validated sequence of transactions from one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationDocument {
    /// Where the document came from (file path or caller supplied name)
    pub origin: String,
    pub transactions: Vec<Transaction>,
}

impl OperationDocument {
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Registry key inferred from a target path: the lowercase extension, or an empty string
pub fn infer_language(target: &Path) -> String {
    target
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}
