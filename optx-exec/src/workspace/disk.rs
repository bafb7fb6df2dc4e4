use super::{PathKind, Workspace};
use optx_parser::STAGING_SUFFIX;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Workspace over a real directory tree
///
/// Staged writes are temp files created next to their target, named
/// `.<file name>.<random>.optx-staged`, and committed with an atomic rename. A crash leaves at
/// worst a stray staging file behind, which [crate::sources::cleanup_stale_artifacts] removes.
#[derive(Debug, Clone)]
pub struct DiskWorkspace {
    root: PathBuf,
}

/// A staged write on disk
#[derive(Debug)]
pub struct DiskStaged {
    file: NamedTempFile,
    target: PathBuf,
}

impl DiskStaged {
    /// Where the staged content currently lives
    pub fn staging_path(&self) -> &Path {
        self.file.path()
    }
}

impl DiskWorkspace {
    /// Open a workspace rooted at an existing directory
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = fs::canonicalize(root.as_ref())?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(DiskWorkspace { root })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl Workspace for DiskWorkspace {
    type Staged = DiskStaged;

    fn root(&self) -> &Path {
        &self.root
    }

    fn probe(&self, path: &Path) -> io::Result<PathKind> {
        match fs::metadata(self.resolve(path)) {
            Ok(meta) if meta.is_dir() => Ok(PathKind::Directory),
            Ok(_) => Ok(PathKind::File),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(PathKind::Missing),
            Err(err) => Err(err),
        }
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(self.resolve(path))
    }

    fn escapes_root(&self, path: &Path) -> io::Result<bool> {
        let full = self.resolve(path);
        let mut existing = full.as_path();
        // nearest ancestor that exists decides where the path really lands
        while fs::symlink_metadata(existing).is_err() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => return Ok(false),
            }
        }
        let canonical = fs::canonicalize(existing)?;
        Ok(!canonical.starts_with(&self.root))
    }

    fn prepare_parent(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let full = self.resolve(path);
        let Some(parent) = full.parent() else {
            return Ok(Vec::new());
        };

        let mut missing = Vec::new();
        let mut dir = parent;
        while !dir.exists() {
            missing.push(dir.to_path_buf());
            match dir.parent() {
                Some(next) => dir = next,
                None => break,
            }
        }
        if missing.is_empty() {
            return Ok(missing);
        }

        fs::create_dir_all(parent)?;
        missing.reverse();
        tracing::debug!(dirs = missing.len(), parent = %parent.display(), "created parent directories");
        Ok(missing)
    }

    fn remove_dirs(&self, created: &[PathBuf]) {
        for dir in created.iter().rev() {
            if let Err(err) = fs::remove_dir(dir) {
                tracing::debug!(dir = %dir.display(), %err, "left created directory in place");
            }
        }
    }

    fn stage_write(&self, path: &Path, content: &str) -> io::Result<DiskStaged> {
        let target = self.resolve(path);
        let parent = target.parent().unwrap_or(&self.root);
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let prefix = format!(".{}.", name);
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(parent)?;
        file.write_all(content.as_bytes())?;
        file.as_file().sync_all()?;

        // Mirror existing permissions on Unix if the target exists, otherwise 0644
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&target)
                .map(|meta| meta.permissions().mode())
                .unwrap_or(0o644);
            file.as_file()
                .set_permissions(fs::Permissions::from_mode(mode))?;
        }

        Ok(DiskStaged { file, target })
    }

    fn commit_write(&self, staged: DiskStaged) -> io::Result<()> {
        let DiskStaged { file, target } = staged;
        file.persist(&target).map_err(|err| err.error)?;

        // Fsync parent directory entry to reduce risk of metadata loss on crash
        if let Some(parent) = target.parent() {
            if let Ok(dir) = fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }

    fn discard(&self, staged: DiskStaged) {
        let staging = staged.file.path().to_path_buf();
        if let Err(err) = staged.file.close() {
            tracing::warn!(path = %staging.display(), %err, "failed to remove staging file");
        }
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(self.resolve(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(self.resolve(from), self.resolve(to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, DiskWorkspace) {
        let dir = TempDir::new().unwrap();
        let ws = DiskWorkspace::new(dir.path()).unwrap();
        (dir, ws)
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_stage_does_not_touch_target() {
        let (dir, ws) = workspace();
        fs::write(dir.path().join("a.txt"), "old").unwrap();

        let staged = ws.stage_write(Path::new("a.txt"), "new").unwrap();
        assert!(staged
            .staging_path()
            .to_string_lossy()
            .ends_with(STAGING_SUFFIX));
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "old");

        ws.commit_write(staged).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "new");
        assert_eq!(entries(dir.path()), vec!["a.txt"]);
    }

    #[test]
    fn test_discard_removes_staging_file() {
        let (dir, ws) = workspace();
        let staged = ws.stage_write(Path::new("b.txt"), "x").unwrap();
        assert_eq!(entries(dir.path()).len(), 1);

        ws.discard(staged);
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn test_prepare_parent_and_remove_dirs() {
        let (_dir, ws) = workspace();
        let created = ws.prepare_parent(Path::new("x/y/z.txt")).unwrap();
        assert_eq!(created, vec![ws.root().join("x"), ws.root().join("x/y")]);
        assert_eq!(ws.probe(Path::new("x/y")).unwrap(), PathKind::Directory);

        ws.remove_dirs(&created);
        assert_eq!(ws.probe(Path::new("x")).unwrap(), PathKind::Missing);
    }

    #[test]
    fn test_probe() {
        let (dir, ws) = workspace();
        fs::write(dir.path().join("f"), "").unwrap();
        assert_eq!(ws.probe(Path::new("f")).unwrap(), PathKind::File);
        assert_eq!(ws.probe(Path::new("nope")).unwrap(), PathKind::Missing);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_detected() {
        let (dir, ws) = workspace();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert!(ws.escapes_root(Path::new("link/new.txt")).unwrap());
        assert!(!ws.escapes_root(Path::new("inside/new.txt")).unwrap());
    }
}
