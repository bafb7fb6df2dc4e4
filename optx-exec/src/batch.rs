//! Batch driver
//!
//! Runs many documents against one workspace. Documents are independent: each one gets its own
//! report, and documents touching the same paths serialize on the shared [PathLocks] table.
//! With `max_parallelism > 1` documents run on a dedicated rayon pool; reports always come back
//! in input order.

use crate::cancel::CancelToken;
use crate::locks::PathLocks;
use crate::pipeline::Pipeline;
use crate::report::ExecutionReport;
use crate::sources::DocumentSource;
use crate::workspace::Workspace;
use optx_lang::CapabilityRegistry;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Plan everything, write nothing
    pub dry_run: bool,
    pub verbose: bool,
    /// Keep launching documents after one fails
    pub continue_on_error: bool,
    /// Documents run at the same time; 1 runs them in order on the calling thread
    pub max_parallelism: usize,
    /// Per-document deadline
    pub timeout: Option<Duration>,
    pub allow_overwrite: bool,
    /// Apply the valid transactions of a document and skip the rest
    pub partial_apply: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            dry_run: false,
            verbose: false,
            continue_on_error: false,
            max_parallelism: 1,
            timeout: None,
            allow_overwrite: false,
            partial_apply: false,
        }
    }
}

pub struct BatchDriver<W: Workspace> {
    workspace: W,
    registry: CapabilityRegistry,
    options: BatchOptions,
    cancel: CancelToken,
    locks: PathLocks,
}

impl<W: Workspace> BatchDriver<W> {
    pub fn new(workspace: W, registry: CapabilityRegistry, options: BatchOptions) -> Self {
        BatchDriver {
            workspace,
            registry,
            options,
            cancel: CancelToken::new(),
            locks: PathLocks::new(),
        }
    }

    /// Use a cancellation token owned by the caller
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn workspace(&self) -> &W {
        &self.workspace
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Run every source and return the reports of the documents that were started.
    ///
    /// Without `continue_on_error`, the first failing document stops new launches; documents
    /// already running finish normally. Cancellation stops new launches the same way.
    pub fn run_all(&self, sources: &[DocumentSource]) -> Vec<ExecutionReport> {
        let halted = AtomicBool::new(false);
        let launch = |source: &DocumentSource| self.launch(source, &halted);

        let parallelism = self.options.max_parallelism.max(1);
        let reports: Vec<Option<ExecutionReport>> = if parallelism == 1 {
            sources.iter().map(launch).collect()
        } else {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(parallelism)
                .build()
            {
                Ok(pool) => pool.install(|| sources.par_iter().map(launch).collect()),
                Err(err) => {
                    tracing::warn!(%err, "could not start worker pool, running sequentially");
                    sources.iter().map(launch).collect()
                }
            }
        };

        let reports: Vec<ExecutionReport> = reports.into_iter().flatten().collect();
        tracing::debug!(
            documents = sources.len(),
            reports = reports.len(),
            "batch finished"
        );
        reports
    }

    fn launch(&self, source: &DocumentSource, halted: &AtomicBool) -> Option<ExecutionReport> {
        if self.cancel.is_cancelled() {
            tracing::debug!(source = %source.name(), "cancelled, not starting");
            return None;
        }
        if halted.load(Ordering::SeqCst) {
            tracing::debug!(source = %source.name(), "earlier document failed, not starting");
            return None;
        }

        let report = Pipeline::new(
            &self.workspace,
            &self.registry,
            &self.locks,
            &self.options,
            self.cancel.clone(),
        )
        .run(source);

        if !report.is_success() && !self.options.continue_on_error {
            halted.store(true, Ordering::SeqCst);
        }
        Some(report)
    }
}
