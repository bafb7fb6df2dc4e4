//! Running one document end to end
//!
//! read -> tokenize -> build -> process -> lock -> plan -> apply (or dry run)
//!
//! Every stage either hands its result to the next one or finishes the report. A report is
//! produced for every document, whatever stage it stopped at.

use crate::apply::{Applier, ApplyState};
use crate::batch::BatchOptions;
use crate::cancel::{CancelToken, StopSignal};
use crate::error::ApplyError;
use crate::locks::PathLocks;
use crate::plan::{plan, PlanOptions};
use crate::report::{ExecutionReport, Outcome, ReportError, TransactionReport, TransactionStatus};
use crate::sources::DocumentSource;
use crate::workspace::Workspace;
use optx_lang::{process_transactions, CapabilityRegistry, ProcessedTransaction};
use optx_parser::{build_all, ActionKind, RawTransaction};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Runs documents against one workspace
pub struct Pipeline<'a, W: Workspace> {
    workspace: &'a W,
    registry: &'a CapabilityRegistry,
    locks: &'a PathLocks,
    options: &'a BatchOptions,
    cancel: CancelToken,
}

impl<'a, W: Workspace> Pipeline<'a, W> {
    pub fn new(
        workspace: &'a W,
        registry: &'a CapabilityRegistry,
        locks: &'a PathLocks,
        options: &'a BatchOptions,
        cancel: CancelToken,
    ) -> Self {
        Pipeline {
            workspace,
            registry,
            locks,
            options,
            cancel,
        }
    }

    /// Run one document and report what happened to it.
    pub fn run(&self, source: &DocumentSource) -> ExecutionReport {
        let report = self.run_inner(source);
        tracing::info!(
            source = %report.source,
            outcome = %report.outcome,
            applied = report.applied,
            skipped = report.skipped,
            dry_run = report.dry_run,
            "document finished"
        );
        report
    }

    fn run_inner(&self, source: &DocumentSource) -> ExecutionReport {
        let stop = StopSignal::new(self.cancel.clone(), self.options.timeout);
        let mut report = ExecutionReport::new(source.name(), source.format(), self.options.dry_run);
        let partial = self.options.partial_apply;

        let loader = match source.loader() {
            Ok(loader) => loader,
            Err(err) => {
                report.outcome = Outcome::Unreadable;
                report.errors.push(ReportError::unreadable(err.to_string()));
                return report;
            }
        };

        let records = match loader.tokenize() {
            Ok(records) => records,
            Err(err) => {
                report.outcome = Outcome::ParseFailed;
                report.errors.push(ReportError::parse(&err, loader.source()));
                return report;
            }
        };
        tracing::debug!(source = %report.source, records = records.len(), "tokenized");
        report.transactions = records.iter().map(initial_report).collect();

        // validation
        let built = build_all(&records);
        report
            .errors
            .extend(built.errors.iter().map(ReportError::validation));
        let invalid = built.failed_indices();
        if !invalid.is_empty() && !partial {
            mark(&mut report, &invalid, TransactionStatus::Failed);
            return finish(report, Outcome::Invalid);
        }
        mark(&mut report, &invalid, TransactionStatus::Skipped);

        // processing
        let processing = process_transactions(&built.transactions, self.registry);
        for processed in &processing.processed {
            record_processing(&mut report, processed);
        }
        report
            .errors
            .extend(processing.errors.iter().map(ReportError::processing));
        let unprocessable = processing.failed_indices();
        if !unprocessable.is_empty() && !partial {
            mark(&mut report, &unprocessable, TransactionStatus::Failed);
            return finish(report, Outcome::ProcessingFailed);
        }
        mark(&mut report, &unprocessable, TransactionStatus::Skipped);

        let processed = processing.processed;
        if processed.is_empty() {
            return finish(report, Outcome::Empty);
        }

        // planning and applying hold every path the document may touch
        let paths: BTreeSet<PathBuf> = processed
            .iter()
            .flat_map(|p| p.transaction.paths().map(|path| path.to_path_buf()))
            .collect();
        let _guard = self.locks.acquire(paths);

        let planned = plan(
            &processed,
            self.workspace,
            &PlanOptions {
                allow_overwrite: self.options.allow_overwrite,
            },
        );
        report
            .errors
            .extend(planned.errors.iter().map(ReportError::plan));
        let unplannable: Vec<usize> = planned.errors.iter().map(|e| e.transaction()).collect();
        if !unplannable.is_empty() && !partial {
            mark(&mut report, &unplannable, TransactionStatus::Failed);
            return finish(report, Outcome::PlanFailed);
        }
        mark(&mut report, &unplannable, TransactionStatus::Skipped);

        let operations = planned.operations;
        if operations.is_empty() {
            return finish(report, Outcome::Empty);
        }

        if self.options.dry_run {
            for op in &operations {
                mark(&mut report, &op.transactions, TransactionStatus::Applied);
                report.touched.extend(op.paths());
            }
            return finish(report, Outcome::WouldCommit);
        }

        let result = Applier::new(self.workspace, &stop).apply(&operations);
        let failed_tx = result
            .failed
            .and_then(|index| operations[index].transactions.first().copied());
        if let Some(error) = &result.error {
            report.errors.push(ReportError::apply(error, failed_tx));
        }
        for &index in &result.completed {
            mark(&mut report, &operations[index].transactions, TransactionStatus::Applied);
        }
        if let (Some(index), Some(error)) = (result.failed, &result.error) {
            let interrupted = matches!(
                error,
                ApplyError::Cancelled { .. } | ApplyError::DeadlineExceeded { .. }
            );
            if !interrupted {
                mark(&mut report, &operations[index].transactions, TransactionStatus::Failed);
            }
        }
        report.touched = result.touched;
        report.untouched = result.untouched;

        let outcome = match result.state {
            ApplyState::Committed => {
                report.committed = true;
                Outcome::Committed
            }
            ApplyState::Failed => Outcome::PartialCommit,
            _ => Outcome::RolledBack,
        };
        finish(report, outcome)
    }
}

/// Report entry for a record, filled from its raw metadata
fn initial_report(record: &RawTransaction) -> TransactionReport {
    TransactionReport {
        index: record.index,
        action: record.value("action").and_then(ActionKind::from_verb),
        target: record.value("target").map(PathBuf::from),
        destination: record.value("destination").map(PathBuf::from),
        status: TransactionStatus::Pending,
        capabilities: Vec::new(),
        diagnostics: Vec::new(),
    }
}

fn record_processing(report: &mut ExecutionReport, processed: &ProcessedTransaction) {
    let tx = &processed.transaction;
    if let Some(entry) = report.transactions.iter_mut().find(|t| t.index == tx.index) {
        entry.target = Some(tx.target.clone());
        entry.destination = tx.destination.clone();
        entry.capabilities = processed
            .blocks
            .iter()
            .map(|block| block.capability.clone())
            .collect();
        entry.diagnostics = processed.diagnostics().cloned().collect();
    }
}

fn mark(report: &mut ExecutionReport, indices: &[usize], status: TransactionStatus) {
    for entry in &mut report.transactions {
        if indices.contains(&entry.index) {
            entry.status = status;
        }
    }
}

fn finish(mut report: ExecutionReport, outcome: Outcome) -> ExecutionReport {
    report.outcome = outcome;
    report.tally();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::MemoryWorkspace;

    fn run(ws: &MemoryWorkspace, text: &str, options: &BatchOptions) -> ExecutionReport {
        let registry = CapabilityRegistry::with_defaults();
        let locks = PathLocks::new();
        Pipeline::new(ws, &registry, &locks, options, CancelToken::new())
            .run(&DocumentSource::inline("doc.op", text))
    }

    const TWO_CREATES: &str = "~\naction: create\ntarget: a.txt\nreasoning: r\n[block]\na\n[/block]\n~\naction: create\ntarget: b.txt\nreasoning: r\n[block]\nb\n[/block]\n";

    #[test]
    fn test_invalid_document_is_not_planned() {
        let ws = MemoryWorkspace::new();
        let text = format!("{TWO_CREATES}~\naction: explode\ntarget: c.txt\nreasoning: r\n");
        let report = run(&ws, &text, &BatchOptions::default());

        assert_eq!(report.outcome, Outcome::Invalid);
        assert_eq!(report.status_of(0), Some(TransactionStatus::Pending));
        assert_eq!(report.status_of(2), Some(TransactionStatus::Failed));
        assert!(ws.files().is_empty());
    }

    #[test]
    fn test_partial_apply_skips_invalid() {
        let ws = MemoryWorkspace::new();
        let text = format!("{TWO_CREATES}~\naction: explode\ntarget: c.txt\nreasoning: r\n");
        let options = BatchOptions {
            partial_apply: true,
            ..BatchOptions::default()
        };
        let report = run(&ws, &text, &options);

        assert_eq!(report.outcome, Outcome::Committed);
        assert_eq!((report.applied, report.skipped), (2, 1));
        assert_eq!(ws.file("b.txt").as_deref(), Some("b\n"));
    }

    #[test]
    fn test_partial_apply_with_nothing_left_is_empty() {
        let ws = MemoryWorkspace::new();
        let options = BatchOptions {
            partial_apply: true,
            ..BatchOptions::default()
        };
        let report = run(
            &ws,
            "~\naction: delete\ntarget: gone.txt\nreasoning: r\n",
            &options,
        );

        assert_eq!(report.outcome, Outcome::Empty);
        assert!(report.is_success());
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_processing_failure_blocks_document() {
        let ws = MemoryWorkspace::new();
        let text = "~\naction: create\ntarget: ok.txt\nreasoning: r\n[block]\nfine\n[/block]\n~\naction: create\ntarget: bad.json\nreasoning: r\n[block]\n{\"a\" 1}\n[/block]\n";
        let report = run(&ws, text, &BatchOptions::default());

        assert_eq!(report.outcome, Outcome::ProcessingFailed);
        assert_eq!(report.status_of(1), Some(TransactionStatus::Failed));
        assert_eq!(report.errors[0].capability.as_deref(), Some("json"));
        assert!(ws.files().is_empty());
    }

    #[test]
    fn test_staging_failure_marks_operation() {
        let ws = MemoryWorkspace::new();
        ws.fail_staging("b.txt");
        let report = run(&ws, TWO_CREATES, &BatchOptions::default());

        assert_eq!(report.outcome, Outcome::RolledBack);
        assert_eq!(report.status_of(0), Some(TransactionStatus::Pending));
        assert_eq!(report.status_of(1), Some(TransactionStatus::Failed));
        assert!(ws.files().is_empty());
    }

    #[test]
    fn test_cancelled_document_rolls_back() {
        let ws = MemoryWorkspace::new();
        let registry = CapabilityRegistry::with_defaults();
        let locks = PathLocks::new();
        let options = BatchOptions::default();
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = Pipeline::new(&ws, &registry, &locks, &options, cancel)
            .run(&DocumentSource::inline("doc.op", TWO_CREATES));

        assert_eq!(report.outcome, Outcome::RolledBack);
        assert!(report
            .transactions
            .iter()
            .all(|tx| tx.status == TransactionStatus::Pending));
        assert!(ws.files().is_empty());
    }
}
