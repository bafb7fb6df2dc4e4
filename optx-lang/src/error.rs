//! Error types for capabilities, the registry and the processor

use serde::Serialize;
use thiserror::Error;

/// A capability rejected its input
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CapabilityError {
    #[error("unbalanced `{bracket}` at line {}", .line + 1)]
    Unbalanced { bracket: char, line: usize },
    #[error("ambiguous indentation at line {}: space before tab", .line + 1)]
    AmbiguousIndentation { line: usize },
    #[error("invalid JSON at line {}, column {}: {message}", .line + 1, .column + 1)]
    InvalidJson {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("forbidden `{pattern}` at line {}", .line + 1)]
    Forbidden { pattern: String, line: usize },
}

impl CapabilityError {
    /// Zero-based content line the error refers to
    pub fn line(&self) -> usize {
        match self {
            CapabilityError::Unbalanced { line, .. }
            | CapabilityError::AmbiguousIndentation { line }
            | CapabilityError::InvalidJson { line, .. }
            | CapabilityError::Forbidden { line, .. } => *line,
        }
    }
}

/// Processing of one transaction failed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error(
    "transaction {}, block {}: {capability} rejected {language} content: {error}",
    .transaction_index + 1,
    .block_index + 1
)]
pub struct ProcessingError {
    pub transaction_index: usize,
    pub block_index: usize,
    /// Name of the capability that failed
    pub capability: String,
    pub language: String,
    pub error: CapabilityError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("cannot alias `{alias}`: nothing is registered for `{target}`")]
    UnknownTarget { alias: String, target: String },
    #[error("`{0}` is not a usable registry key")]
    InvalidKey(String),
}
