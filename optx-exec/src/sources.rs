//! Document sources and staging-artifact cleanup

use crate::error::SourceError;
use ignore::WalkBuilder;
use optx_parser::{DocumentLoader, LoaderError, SourceFormat, STAGING_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Extensions picked up when enumerating a directory
pub const DOCUMENT_EXTENSIONS: &[&str] = &["op", "md", "markdown"];

/// Where a document's text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    File(PathBuf),
    Inline {
        name: String,
        text: String,
        format: SourceFormat,
    },
}

impl DocumentSource {
    pub fn inline(name: impl Into<String>, text: impl Into<String>) -> Self {
        DocumentSource::Inline {
            name: name.into(),
            text: text.into(),
            format: SourceFormat::Op,
        }
    }

    /// Name used in reports
    pub fn name(&self) -> String {
        match self {
            DocumentSource::File(path) => path.display().to_string(),
            DocumentSource::Inline { name, .. } => name.clone(),
        }
    }

    pub fn format(&self) -> SourceFormat {
        match self {
            DocumentSource::File(path) => SourceFormat::from_path(path),
            DocumentSource::Inline { format, .. } => *format,
        }
    }

    pub fn loader(&self) -> Result<DocumentLoader, LoaderError> {
        match self {
            DocumentSource::File(path) => DocumentLoader::from_path(path),
            DocumentSource::Inline { name, text, format } => {
                Ok(DocumentLoader::from_string(name.clone(), text.clone()).with_format(*format))
            }
        }
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(path: PathBuf) -> Self {
        DocumentSource::File(path)
    }
}

/// Collect the operation documents in a directory, sorted by path.
///
/// Hidden files and gitignored files are skipped the way `ignore` skips them by default.
pub fn collect_documents(dir: &Path, recursive: bool) -> Result<Vec<DocumentSource>, SourceError> {
    if !dir.is_dir() {
        return Err(SourceError::NotADirectory(dir.to_path_buf()));
    }

    let mut builder = WalkBuilder::new(dir);
    builder.require_git(false);
    if !recursive {
        builder.max_depth(Some(1));
    }

    let mut paths = Vec::new();
    for entry in builder.build() {
        let entry = entry.map_err(|source| SourceError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.into_path();
        if has_document_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    tracing::debug!(dir = %dir.display(), documents = paths.len(), "collected documents");

    Ok(paths.into_iter().map(DocumentSource::File).collect())
}

fn has_document_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Delete staging artifacts an interrupted run left under `root`.
///
/// Only artifacts last modified at least `older_than` ago are removed; younger ones may belong
/// to a run that is still going. Returns the removed paths. Failures to remove a single file are
/// logged and skipped.
pub fn cleanup_stale_artifacts(
    root: &Path,
    older_than: Duration,
) -> Result<Vec<PathBuf>, SourceError> {
    let cutoff = SystemTime::now().checked_sub(older_than);
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .build();

    let mut removed = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| SourceError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let is_artifact = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(STAGING_SUFFIX));
        if !is_artifact {
            continue;
        }
        if !modified_before(entry.path(), cutoff) {
            tracing::debug!(path = %entry.path().display(), "staging artifact too recent, left in place");
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                tracing::warn!(path = %entry.path().display(), "removed stale staging artifact");
                removed.push(entry.into_path());
            }
            Err(err) => {
                tracing::warn!(path = %entry.path().display(), %err, "could not remove staging artifact")
            }
        }
    }
    Ok(removed)
}

fn modified_before(path: &Path, cutoff: Option<SystemTime>) -> bool {
    let Some(cutoff) = cutoff else {
        return false;
    };
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .is_ok_and(|modified| modified <= cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_collect_documents_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.op");
        touch(dir.path(), "a.md");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "nested/c.op");

        let names = |sources: Vec<DocumentSource>| -> Vec<String> {
            sources
                .iter()
                .map(|s| match s {
                    DocumentSource::File(p) => p
                        .strip_prefix(dir.path())
                        .unwrap()
                        .display()
                        .to_string(),
                    DocumentSource::Inline { name, .. } => name.clone(),
                })
                .collect()
        };

        let flat = collect_documents(dir.path(), false).unwrap();
        assert_eq!(names(flat), vec!["a.md", "b.op"]);

        let deep = collect_documents(dir.path(), true).unwrap();
        assert_eq!(
            names(deep),
            vec![
                "a.md".to_string(),
                "b.op".to_string(),
                Path::new("nested").join("c.op").display().to_string()
            ]
        );
    }

    #[test]
    fn test_collect_documents_requires_directory() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.op");
        let err = collect_documents(&dir.path().join("a.op"), false).unwrap_err();
        assert!(matches!(err, SourceError::NotADirectory(_)));
    }

    #[test]
    fn test_cleanup_removes_only_artifacts() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), ".hello.txt.x1y2.optx-staged");
        touch(dir.path(), "deep/.lib.rs.abc.optx-staged");
        touch(dir.path(), "hello.txt");

        let removed = cleanup_stale_artifacts(dir.path(), Duration::ZERO).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(dir.path().join("hello.txt").exists());
        assert!(!dir.path().join(".hello.txt.x1y2.optx-staged").exists());
    }

    #[test]
    fn test_cleanup_leaves_recent_artifacts() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), ".fresh.txt.a1b2.optx-staged");
        touch(dir.path(), ".old.txt.c3d4.optx-staged");
        fs::File::options()
            .write(true)
            .open(dir.path().join(".old.txt.c3d4.optx-staged"))
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(7200))
            .unwrap();

        let removed = cleanup_stale_artifacts(dir.path(), Duration::from_secs(3600)).unwrap();

        assert_eq!(removed, vec![dir.path().join(".old.txt.c3d4.optx-staged")]);
        assert!(dir.path().join(".fresh.txt.a1b2.optx-staged").exists());
    }

    #[test]
    fn test_inline_source() {
        let source = DocumentSource::inline("stdin", "~\n");
        assert_eq!(source.name(), "stdin");
        assert_eq!(source.format(), SourceFormat::Op);
        assert_eq!(source.loader().unwrap().source(), "~\n");
    }
}
