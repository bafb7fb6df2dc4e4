//! Execution reports
//!
//! One [ExecutionReport] is produced per document whatever happens to it. Reports serialize
//! with serde for machine consumers, and [render_summary] gives the human-readable form.

use crate::error::{ApplyError, PlanError};
use optx_lang::{Diagnostic, ProcessingError};
use optx_parser::{ActionKind, Field, ParseError, Position, SourceFormat, ValidationError};
use serde::Serialize;
use std::fmt;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Final state of one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Committed,
    WouldCommit,
    /// Valid, but every transaction was skipped
    Empty,
    ParseFailed,
    Invalid,
    ProcessingFailed,
    PlanFailed,
    RolledBack,
    PartialCommit,
    Unreadable,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Outcome::Committed | Outcome::WouldCommit | Outcome::Empty
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Committed => "committed",
            Outcome::WouldCommit => "would commit",
            Outcome::Empty => "nothing to apply",
            Outcome::ParseFailed => "parse failed",
            Outcome::Invalid => "invalid",
            Outcome::ProcessingFailed => "processing failed",
            Outcome::PlanFailed => "plan failed",
            Outcome::RolledBack => "rolled back",
            Outcome::PartialCommit => "PARTIAL COMMIT",
            Outcome::Unreadable => "unreadable",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Applied,
    Skipped,
    Failed,
    /// Valid, but never executed because the document did not go through
    Pending,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Applied => "applied",
            TransactionStatus::Skipped => "skipped",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Pending => "pending",
        };
        f.write_str(name)
    }
}

/// Pipeline stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Read,
    Parse,
    Validation,
    Processing,
    Planning,
    Staging,
    Commit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read => "read",
            Stage::Parse => "parse",
            Stage::Validation => "validation",
            Stage::Processing => "processing",
            Stage::Planning => "planning",
            Stage::Staging => "staging",
            Stage::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// One entry of a report's diagnostic trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportError {
    pub stage: Stage,
    pub transaction: Option<usize>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Source excerpt around `position`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ReportError {
    fn new(stage: Stage, message: impl Into<String>) -> Self {
        ReportError {
            stage,
            transaction: None,
            message: message.into(),
            position: None,
            field: None,
            capability: None,
            path: None,
            context: None,
        }
    }

    pub fn unreadable(message: impl Into<String>) -> Self {
        Self::new(Stage::Read, message)
    }

    pub fn parse(error: &ParseError, source: &str) -> Self {
        let context = error.with_context(source);
        ReportError {
            position: Some(error.position),
            context: context
                .split_once('\n')
                .map(|(_, excerpt)| excerpt.to_string()),
            ..Self::new(Stage::Parse, error.to_string())
        }
    }

    pub fn validation(error: &ValidationError) -> Self {
        ReportError {
            transaction: Some(error.transaction_index),
            field: Some(error.field.clone()),
            ..Self::new(Stage::Validation, error.to_string())
        }
    }

    pub fn processing(error: &ProcessingError) -> Self {
        ReportError {
            transaction: Some(error.transaction_index),
            capability: Some(error.capability.clone()),
            position: Some(Position::new(error.error.line(), 0)),
            ..Self::new(Stage::Processing, error.to_string())
        }
    }

    pub fn plan(error: &PlanError) -> Self {
        ReportError {
            transaction: Some(error.transaction()),
            path: Some(error.path().to_path_buf()),
            ..Self::new(Stage::Planning, error.to_string())
        }
    }

    pub fn apply(error: &ApplyError, transaction: Option<usize>) -> Self {
        let stage = match error {
            ApplyError::Commit { .. } => Stage::Commit,
            _ => Stage::Staging,
        };
        ReportError {
            transaction,
            path: Some(error.path().to_path_buf()),
            ..Self::new(stage, error.to_string())
        }
    }

    /// Bracketed details for the verbose trail
    fn details(&self) -> String {
        let mut details = Vec::new();
        if let Some(position) = self.position {
            details.push(format!("line {}", position.line + 1));
        }
        if let Some(field) = &self.field {
            details.push(format!("field {field}"));
        }
        if let Some(capability) = &self.capability {
            details.push(format!("capability {capability}"));
        }
        if details.is_empty() {
            String::new()
        } else {
            format!(" [{}]", details.join(", "))
        }
    }
}

/// What happened to one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionReport {
    pub index: usize,
    /// Unknown when the record failed validation before its action was read
    pub action: Option<ActionKind>,
    pub target: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    pub status: TransactionStatus,
    /// Capabilities that handled the transaction's blocks
    pub capabilities: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub source: String,
    pub format: SourceFormat,
    pub outcome: Outcome,
    pub dry_run: bool,
    /// Whether real storage was changed as planned
    pub committed: bool,
    /// Transaction records found in the document
    pub attempted: usize,
    pub applied: usize,
    pub skipped: usize,
    pub transactions: Vec<TransactionReport>,
    pub errors: Vec<ReportError>,
    /// Paths changed on storage; for a dry run, the paths that would change
    pub touched: Vec<PathBuf>,
    pub untouched: Vec<PathBuf>,
}

impl ExecutionReport {
    pub fn new(source: impl Into<String>, format: SourceFormat, dry_run: bool) -> Self {
        ExecutionReport {
            source: source.into(),
            format,
            outcome: Outcome::Empty,
            dry_run,
            committed: false,
            attempted: 0,
            applied: 0,
            skipped: 0,
            transactions: Vec::new(),
            errors: Vec::new(),
            touched: Vec::new(),
            untouched: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Paths changed by a committed document, for the version-control hand-off
    pub fn changed_paths(&self) -> &[PathBuf] {
        if self.committed {
            &self.touched
        } else {
            &[]
        }
    }

    pub fn status_of(&self, index: usize) -> Option<TransactionStatus> {
        self.transactions
            .iter()
            .find(|tx| tx.index == index)
            .map(|tx| tx.status)
    }

    /// Recount `applied`/`skipped` from the per-transaction statuses
    pub(crate) fn tally(&mut self) {
        self.attempted = self.transactions.len();
        self.applied = self.count(TransactionStatus::Applied);
        self.skipped = self.count(TransactionStatus::Skipped);
    }

    fn count(&self, status: TransactionStatus) -> usize {
        self.transactions
            .iter()
            .filter(|tx| tx.status == status)
            .count()
    }
}

/// Render a report for terminal output.
///
/// The verbose form adds per-transaction lines and, for documents that were not committed,
/// the full diagnostic trail with parse positions, fields and capability names.
pub fn render_summary(report: &ExecutionReport, verbose: bool) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{}: {} ({} applied, {} skipped of {})",
        report.source, report.outcome, report.applied, report.skipped, report.attempted
    );
    if report.dry_run {
        out.push_str(" [dry run]");
    }

    if verbose {
        for tx in &report.transactions {
            let action = tx.action.map(|a| a.as_str()).unwrap_or("?");
            let target = tx
                .target
                .as_ref()
                .map(|t| t.display().to_string())
                .unwrap_or_else(|| "?".to_string());
            let _ = write!(out, "\n  #{} {} {}", tx.index + 1, action, target);
            if let Some(destination) = &tx.destination {
                let _ = write!(out, " -> {}", destination.display());
            }
            let _ = write!(out, ": {}", tx.status);
            for diagnostic in &tx.diagnostics {
                let _ = write!(out, "\n      {diagnostic}");
            }
        }
    }

    let show_trail = verbose && !report.committed;
    for error in &report.errors {
        if show_trail {
            let _ = write!(out, "\n  {} error{}: {}", error.stage, error.details(), error.message);
            if let Some(context) = &error.context {
                for line in context.lines() {
                    let _ = write!(out, "\n    {line}");
                }
            }
        } else {
            let _ = write!(out, "\n  error: {}", error.message);
        }
    }

    if report.outcome == Outcome::PartialCommit {
        for path in &report.touched {
            let _ = write!(out, "\n  updated: {}", path.display());
        }
        for path in &report.untouched {
            let _ = write!(out, "\n  not updated: {}", path.display());
        }
    }
    out
}
