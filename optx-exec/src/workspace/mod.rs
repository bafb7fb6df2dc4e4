//! Filesystem access for planning and applying
//!
//! Everything the executor does to storage goes through the [Workspace] trait. Paths handed to a
//! workspace are always relative to its root and already validated by the parser.
//!
//! Writes are two-phase: [Workspace::stage_write] puts the final content next to the target
//! without touching it, [Workspace::commit_write] atomically replaces the target, and
//! [Workspace::discard] throws a staged write away.

mod disk;
mod memory;

pub use disk::{DiskStaged, DiskWorkspace};
pub use memory::{MemoryStaged, MemoryWorkspace};

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

/// What currently sits at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    Missing,
    File,
    Directory,
}

pub trait Workspace: Send + Sync {
    /// Handle for a staged write that has not been committed or discarded yet
    type Staged: Send;

    /// Root every relative path is resolved against
    fn root(&self) -> &Path;

    fn probe(&self, path: &Path) -> io::Result<PathKind>;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Whether a path resolves outside the root, e.g. through a symlinked directory
    fn escapes_root(&self, _path: &Path) -> io::Result<bool> {
        Ok(false)
    }

    /// Create the missing parent directories of `path`, returning the ones created
    /// (outermost first)
    fn prepare_parent(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Remove directories created by [Workspace::prepare_parent], if they are still empty
    fn remove_dirs(&self, created: &[PathBuf]);

    /// Write content to a staging location for `path`; the target is not touched
    fn stage_write(&self, path: &Path, content: &str) -> io::Result<Self::Staged>;

    /// Atomically move a staged write over its target
    fn commit_write(&self, staged: Self::Staged) -> io::Result<()>;

    /// Drop a staged write, removing any staging artifact
    fn discard(&self, staged: Self::Staged);

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}
