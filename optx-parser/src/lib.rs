//! # optx-parser
//!
//! Tokenizer and transaction builder for operation documents.
//!
//! An operation document is a sequence of records separated by `~` lines. Each record holds
//! `key: value` metadata followed by `[block] ... [/block]` content sections:
//!
//! ```text
//! ~
//! action: create
//! target: hello.txt
//! reasoning: say hello
//! [block]
//! hi
//! [/block]
//! ~
//! ```
//!
//! Processing happens in two stages:
//!
//!     1. [tokenizer]: classified lines (see [lexing]) are grouped into [RawTransaction]
//!        records. Structural problems are [ParseError]s and are fatal for the document.
//!     2. [building]: records become validated [Transaction]s. Semantic problems are
//!        [ValidationError]s, collected across the whole document.
//!
//! Markdown files embed the same syntax in ```op fenced blocks, see [markdown]. The
//! [loader] picks the right front end from the file extension.
//!
//! Nothing in this crate touches the filesystem besides reading the document itself.

pub mod ast;
pub mod building;
pub mod error;
pub mod lexing;
pub mod loader;
pub mod markdown;
pub mod range;
pub mod token;
pub mod tokenizer;

pub use ast::{
    ActionKind, ContentBlock, MetadataEntry, OperationDocument, RawBlock, RawTransaction,
    Transaction,
};
pub use building::{build, build_all, build_document, check_relative_path, BuildOutcome, STAGING_SUFFIX};
pub use error::{Field, ParseError, ParseErrorKind, ValidationError, ValidationErrors};
pub use loader::{DocumentLoader, LoaderError, SourceFormat};
pub use range::{Position, Range};
pub use tokenizer::tokenize;

/// Tokenize and validate native-syntax source in one step.
pub fn parse_document(
    origin: impl Into<String>,
    source: &str,
) -> Result<OperationDocument, LoaderError> {
    let records = tokenize(source)?;
    Ok(build_document(origin, &records)?)
}
