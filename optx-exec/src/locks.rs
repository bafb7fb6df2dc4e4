//! Path-level locking between documents
//!
//! A document locks its whole target set in one step, waiting until none of the paths is held
//! by another document. Taking every path at once means two documents can never each hold half
//! of what the other needs.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct PathLocks {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

/// Paths held by one document; released on drop
#[derive(Debug)]
pub struct PathLockGuard<'a> {
    locks: &'a PathLocks,
    paths: BTreeSet<PathBuf>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until every path is free, then take them all
    pub fn acquire(&self, paths: impl IntoIterator<Item = PathBuf>) -> PathLockGuard<'_> {
        let paths: BTreeSet<PathBuf> = paths.into_iter().collect();
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while paths.iter().any(|path| held.contains(path)) {
            tracing::debug!(paths = paths.len(), "waiting for path locks");
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.extend(paths.iter().cloned());
        PathLockGuard { locks: self, paths }
    }

    /// Whether a path is currently held
    pub fn is_held(&self, path: &Path) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }
}

impl PathLockGuard<'_> {
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }
}

impl Drop for PathLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for path in &self.paths {
            held.remove(path);
        }
        self.locks.released.notify_all();
    }
}
