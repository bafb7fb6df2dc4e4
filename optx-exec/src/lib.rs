//! Planning and applying operation documents
//!
//!     Takes processed transactions from optx-lang and turns them into changes on storage
//!     under an all-or-nothing discipline:
//!
//!         1. [plan]: every transaction becomes one [PlannedOperation] with a precondition.
//!            Planning only reads the workspace.
//!         2. [apply]: every operation is staged next to its target, then all staged
//!            operations are committed in document order. A failure while staging leaves real
//!            targets untouched. A failure while committing is reported as a partial commit
//!            naming exactly what changed.
//!
//!     The [pipeline] chains parsing, processing, planning and applying for one document, and
//!     the [batch] driver runs many documents, optionally in parallel, with path-level locks
//!     between them. Every document produces an [ExecutionReport].
//!
//!     Storage is reached only through the [Workspace] trait: [DiskWorkspace] for real
//!     project roots, [MemoryWorkspace] for tests.
//!
//!     The file structure:
//!     .
//!     ├── workspace               # Storage access and staging primitives
//!     ├── plan.rs
//!     ├── apply.rs                # Staging/commit state machine
//!     ├── pipeline.rs             # One document, start to finish
//!     ├── batch.rs                # Many documents, worker pool
//!     ├── locks.rs                # Path lock table shared by documents
//!     ├── cancel.rs
//!     ├── report.rs
//!     ├── sources.rs              # Document enumeration and stale artifact cleanup
//!     └── error.rs

pub mod apply;
pub mod batch;
pub mod cancel;
pub mod error;
pub mod locks;
pub mod pipeline;
pub mod plan;
pub mod report;
pub mod sources;
pub mod workspace;

pub use apply::{Applier, ApplyResult, ApplyState};
pub use batch::{BatchDriver, BatchOptions};
pub use cancel::{CancelToken, Interrupt, StopSignal};
pub use error::{ApplyError, PlanError, SourceError};
pub use locks::{PathLockGuard, PathLocks};
pub use pipeline::Pipeline;
pub use plan::{plan, OperationKind, PlanOptions, PlanOutcome, PlannedOperation, Precondition};
pub use report::{
    render_summary, ExecutionReport, Outcome, ReportError, Stage, TransactionReport,
    TransactionStatus,
};
pub use sources::{cleanup_stale_artifacts, collect_documents, DocumentSource};
pub use workspace::{DiskWorkspace, MemoryWorkspace, PathKind, Workspace};
