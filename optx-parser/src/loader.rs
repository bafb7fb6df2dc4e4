//! Document loading utilities
//!
//! [`DocumentLoader`] reads source text from a file or a string, picks the source format from
//! the file extension, and runs the tokenizer and builder over it.
//!
//! ```rust,ignore
//! use optx_parser::loader::DocumentLoader;
//!
//! let doc = DocumentLoader::from_path("changes.op")?.load()?;
//! let records = DocumentLoader::from_string("inline", "~\naction: delete\n...").tokenize()?;
//! ```

use crate::ast::{OperationDocument, RawTransaction};
use crate::building::{build_all, BuildOutcome};
use crate::error::{ParseError, ValidationErrors};
use crate::markdown::tokenize_markdown;
use crate::tokenizer::tokenize;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// How a source's text is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Native `.op` syntax
    Op,
    /// Markdown with ```op fenced blocks
    Markdown,
}

impl SourceFormat {
    /// Pick the format from a path's extension; anything not markdown is native
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("md") | Some("markdown") => SourceFormat::Markdown,
            _ => SourceFormat::Op,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Op => write!(f, "op"),
            SourceFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Errors that can occur when loading documents
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

/// Document loader with tokenize/build shortcuts
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    origin: String,
    source: String,
    format: SourceFormat,
}

impl DocumentLoader {
    /// Load from a file path; the format follows the extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LoaderError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(DocumentLoader {
            origin: path.display().to_string(),
            source,
            format: SourceFormat::from_path(path),
        })
    }

    /// Load native syntax from a string
    pub fn from_string(origin: impl Into<String>, source: impl Into<String>) -> Self {
        DocumentLoader {
            origin: origin.into(),
            source: source.into(),
            format: SourceFormat::Op,
        }
    }

    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.format = format;
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Split the source into raw records
    pub fn tokenize(&self) -> Result<Vec<RawTransaction>, ParseError> {
        match self.format {
            SourceFormat::Op => tokenize(&self.source),
            SourceFormat::Markdown => tokenize_markdown(&self.source),
        }
    }

    /// Tokenize and build, keeping valid transactions alongside the errors
    pub fn build(&self) -> Result<BuildOutcome, ParseError> {
        Ok(build_all(&self.tokenize()?))
    }

    /// Tokenize and build a fully valid document
    pub fn load(&self) -> Result<OperationDocument, LoaderError> {
        let outcome = self.build()?;
        if !outcome.is_valid() {
            return Err(ValidationErrors(outcome.errors).into());
        }
        Ok(OperationDocument {
            origin: self.origin.clone(),
            transactions: outcome.transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;

    #[test]
    fn test_format_from_path() {
        assert_eq!(SourceFormat::from_path(Path::new("a.op")), SourceFormat::Op);
        assert_eq!(
            SourceFormat::from_path(Path::new("PLAN.MD")),
            SourceFormat::Markdown
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("notes.markdown")),
            SourceFormat::Markdown
        );
        assert_eq!(SourceFormat::from_path(Path::new("noext")), SourceFormat::Op);
    }

    #[test]
    fn test_load_from_string() {
        let doc = DocumentLoader::from_string(
            "inline",
            "~\naction: delete\ntarget: old.txt\nreasoning: cleanup\n",
        )
        .load()
        .unwrap();

        assert_eq!(doc.origin, "inline");
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let err = DocumentLoader::from_string("inline", "stray\n")
            .load()
            .unwrap_err();
        match err {
            LoaderError::Parse(parse) => assert_eq!(parse.kind, ParseErrorKind::StrayContent),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = DocumentLoader::from_path("/definitely/not/here.op").unwrap_err();
        assert!(matches!(err, LoaderError::Io { .. }));
    }
}
