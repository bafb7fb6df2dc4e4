//! Execution planning
//!
//! Turns processed transactions into [PlannedOperation]s, one per transaction, in document
//! order. Planning only reads the workspace: preconditions are checked against what is on disk
//! now, and `append` reads the current content so the planned write carries the final bytes.
//!
//! Two transactions touching the same path are a conflict, except for a `create` followed by
//! `modify`/`append` transactions on that path, which merge into the create's write.

use crate::error::PlanError;
use crate::workspace::{PathKind, Workspace};
use optx_lang::ProcessedTransaction;
use optx_parser::ActionKind;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// What a planned operation does to its path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OperationKind {
    Write,
    Delete,
    Rename {
        destination: PathBuf,
        /// What must be true about the destination when the rename is staged
        destination_precondition: Precondition,
    },
}

/// What must be true about the path when the operation is staged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Precondition {
    MustExist,
    MustNotExist,
    Unconstrained,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedOperation {
    pub path: PathBuf,
    pub kind: OperationKind,
    /// Final content for writes
    pub content: Option<String>,
    pub precondition: Precondition,
    /// Transactions folded into this operation, first one first
    pub transactions: Vec<usize>,
}

impl PlannedOperation {
    /// Every path the operation changes
    pub fn paths(&self) -> Vec<PathBuf> {
        match &self.kind {
            OperationKind::Rename { destination, .. } => vec![self.path.clone(), destination.clone()],
            _ => vec![self.path.clone()],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Let `create` replace an existing file, and `rename` replace an existing destination
    pub allow_overwrite: bool,
}

/// Planned operations plus every error found on the way
#[derive(Debug, Default)]
pub struct PlanOutcome {
    pub operations: Vec<PlannedOperation>,
    pub errors: Vec<PlanError>,
}

impl PlanOutcome {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Who claimed a path earlier in the document
#[derive(Clone, Copy)]
struct Claim {
    operation: Option<usize>,
    transaction: usize,
}

/// Plan every processed transaction against the workspace.
pub fn plan<W: Workspace>(
    processed: &[ProcessedTransaction],
    workspace: &W,
    options: &PlanOptions,
) -> PlanOutcome {
    let mut planner = Planner {
        workspace,
        options,
        outcome: PlanOutcome::default(),
        claims: HashMap::new(),
    };
    for item in processed {
        if let Err(err) = planner.plan_one(item) {
            tracing::debug!(%err, "planning failed");
            planner.outcome.errors.push(err);
        }
    }
    tracing::debug!(
        operations = planner.outcome.operations.len(),
        errors = planner.outcome.errors.len(),
        "planned document"
    );
    planner.outcome
}

struct Planner<'a, W> {
    workspace: &'a W,
    options: &'a PlanOptions,
    outcome: PlanOutcome,
    claims: HashMap<PathBuf, Claim>,
}

impl<W: Workspace> Planner<'_, W> {
    fn plan_one(&mut self, item: &ProcessedTransaction) -> Result<(), PlanError> {
        let tx = &item.transaction;
        let index = tx.index;

        for path in tx.paths() {
            let escapes = self
                .workspace
                .escapes_root(path)
                .map_err(|source| io_error(path, index, source))?;
            if escapes {
                return Err(PlanError::OutsideRoot {
                    path: path.to_path_buf(),
                    transaction: index,
                });
            }
        }

        if let Some(&Claim {
            operation,
            transaction: first,
        }) = self.claims.get(&tx.target)
        {
            return match (operation, tx.action) {
                (Some(op), ActionKind::Modify | ActionKind::Append) => {
                    self.merge(op, item);
                    Ok(())
                }
                _ => Err(PlanError::Conflict {
                    path: tx.target.clone(),
                    first,
                    second: index,
                }),
            };
        }
        if let Some(destination) = &tx.destination {
            if let Some(claim) = self.claims.get(destination) {
                return Err(PlanError::Conflict {
                    path: destination.clone(),
                    first: claim.transaction,
                    second: index,
                });
            }
        }

        let operation = self.build(item)?;
        let position = self.outcome.operations.len();
        let mergeable = tx.action == ActionKind::Create;
        self.claims.insert(
            tx.target.clone(),
            Claim {
                operation: mergeable.then_some(position),
                transaction: index,
            },
        );
        if let Some(destination) = &tx.destination {
            self.claims.insert(
                destination.clone(),
                Claim {
                    operation: None,
                    transaction: index,
                },
            );
        }
        self.outcome.operations.push(operation);
        Ok(())
    }

    /// Fold a modify/append into the create chain that claimed the path
    fn merge(&mut self, op: usize, item: &ProcessedTransaction) {
        let operation = &mut self.outcome.operations[op];
        let new_content = item.content().unwrap_or_default();
        operation.content = Some(match item.transaction.action {
            ActionKind::Append => {
                let mut merged = operation.content.take().unwrap_or_default();
                merged.push_str(&new_content);
                merged
            }
            _ => new_content,
        });
        operation.transactions.push(item.transaction.index);
        tracing::debug!(
            path = %operation.path.display(),
            transactions = ?operation.transactions,
            "merged into create"
        );
    }

    fn build(&self, item: &ProcessedTransaction) -> Result<PlannedOperation, PlanError> {
        let tx = &item.transaction;
        let index = tx.index;
        let target = tx.target.as_path();
        let kind = self.probe(target, index)?;

        let (kind, content, precondition) = match tx.action {
            ActionKind::Create => {
                let precondition = match kind {
                    PathKind::Missing => Precondition::MustNotExist,
                    PathKind::File if self.options.allow_overwrite => Precondition::Unconstrained,
                    PathKind::File => return Err(exists(target, index)),
                    PathKind::Directory => return Err(not_a_file(target, index)),
                };
                (OperationKind::Write, item.content(), precondition)
            }
            ActionKind::Modify => {
                require_file(kind, target, index)?;
                (OperationKind::Write, item.content(), Precondition::MustExist)
            }
            ActionKind::Append => {
                require_file(kind, target, index)?;
                let mut content = self
                    .workspace
                    .read_to_string(target)
                    .map_err(|source| io_error(target, index, source))?;
                content.push_str(&item.content().unwrap_or_default());
                (OperationKind::Write, Some(content), Precondition::MustExist)
            }
            ActionKind::Delete => {
                require_file(kind, target, index)?;
                (OperationKind::Delete, None, Precondition::MustExist)
            }
            ActionKind::Rename => {
                require_file(kind, target, index)?;
                let destination = tx.destination.clone().unwrap_or_default();
                let destination_precondition = match self.probe(&destination, index)? {
                    PathKind::Missing => Precondition::MustNotExist,
                    PathKind::File if self.options.allow_overwrite => Precondition::Unconstrained,
                    PathKind::File => return Err(exists(&destination, index)),
                    PathKind::Directory => return Err(not_a_file(&destination, index)),
                };
                (
                    OperationKind::Rename {
                        destination,
                        destination_precondition,
                    },
                    None,
                    Precondition::MustExist,
                )
            }
        };

        Ok(PlannedOperation {
            path: tx.target.clone(),
            kind,
            content,
            precondition,
            transactions: vec![index],
        })
    }

    fn probe(&self, path: &Path, index: usize) -> Result<PathKind, PlanError> {
        self.workspace
            .probe(path)
            .map_err(|source| io_error(path, index, source))
    }
}

fn require_file(kind: PathKind, path: &Path, transaction: usize) -> Result<(), PlanError> {
    match kind {
        PathKind::File => Ok(()),
        PathKind::Missing => Err(PlanError::TargetMissing {
            path: path.to_path_buf(),
            transaction,
        }),
        PathKind::Directory => Err(not_a_file(path, transaction)),
    }
}

fn exists(path: &Path, transaction: usize) -> PlanError {
    PlanError::TargetExists {
        path: path.to_path_buf(),
        transaction,
    }
}

fn not_a_file(path: &Path, transaction: usize) -> PlanError {
    PlanError::NotAFile {
        path: path.to_path_buf(),
        transaction,
    }
}

fn io_error(path: &Path, transaction: usize, source: std::io::Error) -> PlanError {
    PlanError::Io {
        path: path.to_path_buf(),
        transaction,
        source,
    }
}
