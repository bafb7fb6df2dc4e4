//! Staged, all-or-nothing application of a plan
//!
//! The applier is a small state machine:
//!
//! ```text
//! Planned -> Staging -> Committed
//!                    -> RolledBack   (staging failed, cancelled, deadline, or first commit failed)
//!                    -> Failed       (commit failed after some targets were replaced)
//! ```
//!
//! During staging every write lands next to its target and every precondition is checked
//! again. Real targets are only touched in the commit phase, which replaces them one by one in
//! document order. Cancellation is never checked during commit.

use crate::cancel::{Interrupt, StopSignal};
use crate::error::ApplyError;
use crate::plan::{OperationKind, PlannedOperation, Precondition};
use crate::workspace::{PathKind, Workspace};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApplyState {
    Planned,
    Staging,
    Committed,
    RolledBack,
    Failed,
}

impl fmt::Display for ApplyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplyState::Planned => "planned",
            ApplyState::Staging => "staging",
            ApplyState::Committed => "committed",
            ApplyState::RolledBack => "rolled back",
            ApplyState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Where applying a plan ended up
#[derive(Debug)]
pub struct ApplyResult {
    pub state: ApplyState,
    /// Indices of operations whose commit completed
    pub completed: Vec<usize>,
    /// Index of the operation that stopped the run
    pub failed: Option<usize>,
    /// Paths changed on storage
    pub touched: Vec<PathBuf>,
    /// Planned paths left as they were
    pub untouched: Vec<PathBuf>,
    pub error: Option<ApplyError>,
}

enum Prepared<S> {
    Write(S),
    Delete,
    Rename,
}

pub struct Applier<'a, W: Workspace> {
    workspace: &'a W,
    stop: &'a StopSignal,
}

impl<'a, W: Workspace> Applier<'a, W> {
    pub fn new(workspace: &'a W, stop: &'a StopSignal) -> Self {
        Applier { workspace, stop }
    }

    /// Stage every operation, then commit them all in order.
    pub fn apply(&self, operations: &[PlannedOperation]) -> ApplyResult {
        let mut state = ApplyState::Planned;
        advance(&mut state, ApplyState::Staging);

        let mut prepared = Vec::with_capacity(operations.len());
        let mut created = Vec::new();
        for (index, op) in operations.iter().enumerate() {
            if let Some(interrupt) = self.stop.check() {
                let error = match interrupt {
                    Interrupt::Cancelled => ApplyError::Cancelled {
                        path: op.path.clone(),
                    },
                    Interrupt::DeadlineExceeded => ApplyError::DeadlineExceeded {
                        path: op.path.clone(),
                    },
                };
                return self.roll_back(state, operations, prepared, &created, index, error);
            }
            match self.stage(op, &mut created) {
                Ok(item) => prepared.push(item),
                Err(error) => {
                    return self.roll_back(state, operations, prepared, &created, index, error)
                }
            }
        }

        self.commit(state, operations, prepared, &created)
    }

    fn stage(
        &self,
        op: &PlannedOperation,
        created: &mut Vec<PathBuf>,
    ) -> Result<Prepared<W::Staged>, ApplyError> {
        self.recheck(op)?;

        match &op.kind {
            OperationKind::Write => {
                created.extend(
                    self.workspace
                        .prepare_parent(&op.path)
                        .map_err(|source| staging(&op.path, source))?,
                );
                let content = op.content.as_deref().unwrap_or_default();
                let staged = self
                    .workspace
                    .stage_write(&op.path, content)
                    .map_err(|source| staging(&op.path, source))?;
                tracing::debug!(path = %op.path.display(), bytes = content.len(), "staged write");
                Ok(Prepared::Write(staged))
            }
            OperationKind::Delete => Ok(Prepared::Delete),
            OperationKind::Rename { destination, .. } => {
                created.extend(
                    self.workspace
                        .prepare_parent(destination)
                        .map_err(|source| staging(destination, source))?,
                );
                Ok(Prepared::Rename)
            }
        }
    }

    /// Make sure the paths still look the way they did when they were planned
    fn recheck(&self, op: &PlannedOperation) -> Result<(), ApplyError> {
        self.check_path(&op.path, op.precondition)?;
        if let OperationKind::Rename {
            destination,
            destination_precondition,
        } = &op.kind
        {
            self.check_path(destination, *destination_precondition)?;
        }
        Ok(())
    }

    fn check_path(&self, path: &Path, precondition: Precondition) -> Result<(), ApplyError> {
        let kind = self
            .workspace
            .probe(path)
            .map_err(|source| staging(path, source))?;
        let reason = match (precondition, kind) {
            (Precondition::MustExist, PathKind::File) => None,
            (Precondition::MustExist, _) => Some("file no longer exists"),
            (Precondition::MustNotExist, PathKind::Missing) => None,
            (Precondition::MustNotExist, _) => Some("path appeared after planning"),
            (Precondition::Unconstrained, PathKind::Directory) => Some("path became a directory"),
            (Precondition::Unconstrained, _) => None,
        };
        match reason {
            Some(reason) => Err(ApplyError::PreconditionChanged {
                path: path.to_path_buf(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn roll_back(
        &self,
        mut state: ApplyState,
        operations: &[PlannedOperation],
        prepared: Vec<Prepared<W::Staged>>,
        created: &[PathBuf],
        failed: usize,
        error: ApplyError,
    ) -> ApplyResult {
        tracing::warn!(%error, "rolling back staged operations");
        self.discard_all(prepared);
        self.workspace.remove_dirs(created);
        advance(&mut state, ApplyState::RolledBack);

        ApplyResult {
            state,
            completed: Vec::new(),
            failed: Some(failed),
            touched: Vec::new(),
            untouched: operations.iter().flat_map(PlannedOperation::paths).collect(),
            error: Some(error),
        }
    }

    fn commit(
        &self,
        mut state: ApplyState,
        operations: &[PlannedOperation],
        prepared: Vec<Prepared<W::Staged>>,
        created: &[PathBuf],
    ) -> ApplyResult {
        let mut completed = Vec::new();
        let mut touched = Vec::new();
        let mut failure = None;

        let mut pending = operations.iter().enumerate().zip(prepared);
        for ((index, op), item) in pending.by_ref() {
            let result = match (item, &op.kind) {
                (Prepared::Write(staged), _) => self.workspace.commit_write(staged),
                (Prepared::Delete, _) => self.workspace.remove_file(&op.path),
                (Prepared::Rename, OperationKind::Rename { destination, .. }) => {
                    self.workspace.rename(&op.path, destination)
                }
                (Prepared::Rename, _) => Ok(()),
            };
            match result {
                Ok(()) => {
                    completed.push(index);
                    touched.extend(op.paths());
                }
                Err(source) => {
                    failure = Some((
                        index,
                        ApplyError::Commit {
                            path: op.path.clone(),
                            source,
                        },
                    ));
                    break;
                }
            }
        }
        self.discard_all(pending.map(|(_, item)| item).collect());

        let Some((failed, error)) = failure else {
            advance(&mut state, ApplyState::Committed);
            return ApplyResult {
                state,
                completed,
                failed: None,
                touched,
                untouched: Vec::new(),
                error: None,
            };
        };

        self.workspace.remove_dirs(created);
        let untouched = operations[failed..]
            .iter()
            .flat_map(PlannedOperation::paths)
            .collect();
        if completed.is_empty() {
            tracing::warn!(%error, "commit failed before any target changed");
            advance(&mut state, ApplyState::RolledBack);
        } else {
            tracing::warn!(
                %error,
                touched = touched.len(),
                "commit failed partway, targets changed incompletely"
            );
            advance(&mut state, ApplyState::Failed);
        }

        ApplyResult {
            state,
            completed,
            failed: Some(failed),
            touched,
            untouched,
            error: Some(error),
        }
    }

    fn discard_all(&self, prepared: Vec<Prepared<W::Staged>>) {
        for item in prepared {
            if let Prepared::Write(staged) = item {
                self.workspace.discard(staged);
            }
        }
    }
}

fn advance(state: &mut ApplyState, next: ApplyState) {
    tracing::debug!(from = %state, to = %next, "apply state");
    *state = next;
}

fn staging(path: &Path, source: std::io::Error) -> ApplyError {
    ApplyError::Staging {
        path: path.to_path_buf(),
        source,
    }
}
