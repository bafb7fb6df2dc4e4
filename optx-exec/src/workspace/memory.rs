use super::{PathKind, Workspace};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-memory workspace with failure injection
///
/// Directories exist implicitly as ancestors of files. Staged writes are kept in a side table
/// until committed or discarded, so tests can check that nothing is left behind.
#[derive(Debug, Default)]
pub struct MemoryWorkspace {
    root: PathBuf,
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, String>,
    staged: BTreeMap<u64, (PathBuf, String)>,
    next_stage: u64,
    fail_stage: BTreeSet<PathBuf>,
    fail_commit: BTreeSet<PathBuf>,
}

/// Ticket for a staged in-memory write
#[derive(Debug)]
pub struct MemoryStaged {
    id: u64,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [MemoryWorkspace::insert]
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.state().files.insert(path.into(), content.into());
    }

    /// Make staging a write for `path` fail
    pub fn fail_staging(&self, path: impl Into<PathBuf>) {
        self.state().fail_stage.insert(path.into());
    }

    /// Make committing any operation on `path` fail
    pub fn fail_commit(&self, path: impl Into<PathBuf>) {
        self.state().fail_commit.insert(path.into());
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.state().files.get(path.as_ref()).cloned()
    }

    /// Snapshot of every file
    pub fn files(&self) -> BTreeMap<PathBuf, String> {
        self.state().files.clone()
    }

    /// Number of staged writes not yet committed or discarded
    pub fn staged_count(&self) -> usize {
        self.state().staged.len()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn injected(action: &str, path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::Other,
        format!("injected {} failure for {}", action, path.display()),
    )
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

impl Workspace for MemoryWorkspace {
    type Staged = MemoryStaged;

    fn root(&self) -> &Path {
        &self.root
    }

    fn probe(&self, path: &Path) -> io::Result<PathKind> {
        let state = self.state();
        if state.files.contains_key(path) {
            return Ok(PathKind::File);
        }
        if state.files.keys().any(|file| file.starts_with(path)) {
            return Ok(PathKind::Directory);
        }
        Ok(PathKind::Missing)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.state()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn prepare_parent(&self, _path: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }

    fn remove_dirs(&self, _created: &[PathBuf]) {}

    fn stage_write(&self, path: &Path, content: &str) -> io::Result<MemoryStaged> {
        let mut state = self.state();
        if state.fail_stage.contains(path) {
            return Err(injected("staging", path));
        }
        let id = state.next_stage;
        state.next_stage += 1;
        state
            .staged
            .insert(id, (path.to_path_buf(), content.to_string()));
        Ok(MemoryStaged { id })
    }

    fn commit_write(&self, staged: MemoryStaged) -> io::Result<()> {
        let mut state = self.state();
        let Some((path, content)) = state.staged.remove(&staged.id) else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "staged write was already consumed",
            ));
        };
        if state.fail_commit.contains(&path) {
            return Err(injected("commit", &path));
        }
        state.files.insert(path, content);
        Ok(())
    }

    fn discard(&self, staged: MemoryStaged) {
        self.state().staged.remove(&staged.id);
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_commit.contains(path) {
            return Err(injected("commit", path));
        }
        state.files.remove(path).map(|_| ()).ok_or_else(|| not_found(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_commit.contains(from) {
            return Err(injected("commit", from));
        }
        let content = state.files.remove(from).ok_or_else(|| not_found(from))?;
        state.files.insert(to.to_path_buf(), content);
        Ok(())
    }
}
