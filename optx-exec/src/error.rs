//! Error types for planning, applying and collecting documents

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A transaction could not be planned; nothing has been written yet
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("transactions {} and {} both touch {}", .first + 1, .second + 1, .path.display())]
    Conflict {
        path: PathBuf,
        first: usize,
        second: usize,
    },
    #[error("transaction {}: {} already exists", .transaction + 1, .path.display())]
    TargetExists { path: PathBuf, transaction: usize },
    #[error("transaction {}: {} does not exist", .transaction + 1, .path.display())]
    TargetMissing { path: PathBuf, transaction: usize },
    #[error("transaction {}: {} is a directory", .transaction + 1, .path.display())]
    NotAFile { path: PathBuf, transaction: usize },
    #[error("transaction {}: {} resolves outside the project root", .transaction + 1, .path.display())]
    OutsideRoot { path: PathBuf, transaction: usize },
    #[error("transaction {}: cannot inspect {}: {source}", .transaction + 1, .path.display())]
    Io {
        path: PathBuf,
        transaction: usize,
        #[source]
        source: io::Error,
    },
}

impl PlanError {
    /// Index of the transaction the error is reported against
    pub fn transaction(&self) -> usize {
        match self {
            PlanError::Conflict { second, .. } => *second,
            PlanError::TargetExists { transaction, .. }
            | PlanError::TargetMissing { transaction, .. }
            | PlanError::NotAFile { transaction, .. }
            | PlanError::OutsideRoot { transaction, .. }
            | PlanError::Io { transaction, .. } => *transaction,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            PlanError::Conflict { path, .. }
            | PlanError::TargetExists { path, .. }
            | PlanError::TargetMissing { path, .. }
            | PlanError::NotAFile { path, .. }
            | PlanError::OutsideRoot { path, .. }
            | PlanError::Io { path, .. } => path,
        }
    }
}

/// Why applying a plan stopped
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("staging {} failed: {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} changed since planning: {reason}", .path.display())]
    PreconditionChanged { path: PathBuf, reason: String },
    #[error("cancelled before staging {}", .path.display())]
    Cancelled { path: PathBuf },
    #[error("deadline exceeded before staging {}", .path.display())]
    DeadlineExceeded { path: PathBuf },
    #[error("committing {} failed: {source}", .path.display())]
    Commit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ApplyError {
    pub fn path(&self) -> &Path {
        match self {
            ApplyError::Staging { path, .. }
            | ApplyError::PreconditionChanged { path, .. }
            | ApplyError::Cancelled { path }
            | ApplyError::DeadlineExceeded { path }
            | ApplyError::Commit { path, .. } => path,
        }
    }
}

/// Enumerating document sources failed
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },
}
