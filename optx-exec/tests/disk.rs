//! Runs against a real directory tree

use optx_exec::{
    cleanup_stale_artifacts, collect_documents, BatchDriver, BatchOptions, DiskWorkspace, Outcome,
};
use optx_lang::CapabilityRegistry;
use optx_parser::STAGING_SUFFIX;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn artifacts(root: &Path) -> Vec<String> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else if path.to_string_lossy().ends_with(STAGING_SUFFIX) {
                found.push(path.display().to_string());
            }
        }
    }
    found
}

fn setup() -> (TempDir, TempDir) {
    let project = TempDir::new().unwrap();
    let docs = TempDir::new().unwrap();
    fs::write(project.path().join("README.md"), "# readme\n").unwrap();
    fs::write(project.path().join("obsolete.txt"), "bye\n").unwrap();
    (project, docs)
}

#[test]
fn test_document_directory_applies_in_order() {
    let (project, docs) = setup();
    fs::write(
        docs.path().join("01-create.op"),
        "~\naction: create\ntarget: src/app/main.py\nreasoning: entry point\n[block]\nif True:\n\tprint('hi')   \n[/block]\n",
    )
    .unwrap();
    fs::write(
        docs.path().join("02-notes.md"),
        "# Plan\n\n```op\n~\naction: append\ntarget: README.md\nreasoning: usage\n[block]\nRun it.\n[/block]\n~\naction: delete\ntarget: obsolete.txt\nreasoning: unused\n```\n",
    )
    .unwrap();

    let sources = collect_documents(docs.path(), false).unwrap();
    let driver = BatchDriver::new(
        DiskWorkspace::new(project.path()).unwrap(),
        CapabilityRegistry::with_defaults(),
        BatchOptions::default(),
    );
    let reports = driver.run_all(&sources);

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.outcome == Outcome::Committed));
    assert_eq!(
        fs::read_to_string(project.path().join("src/app/main.py")).unwrap(),
        "if True:\n    print('hi')\n"
    );
    assert_eq!(
        fs::read_to_string(project.path().join("README.md")).unwrap(),
        "# readme\nRun it.\n"
    );
    assert!(!project.path().join("obsolete.txt").exists());
    assert!(artifacts(project.path()).is_empty());
}

#[test]
fn test_dry_run_touches_nothing() {
    let (project, docs) = setup();
    let doc = docs.path().join("plan.op");
    fs::write(
        &doc,
        "~\naction: create\ntarget: fresh/new.txt\nreasoning: r\n[block]\nnew\n[/block]\n~\naction: delete\ntarget: obsolete.txt\nreasoning: r\n",
    )
    .unwrap();

    let ws = DiskWorkspace::new(project.path()).unwrap();
    let driver = BatchDriver::new(
        ws,
        CapabilityRegistry::with_defaults(),
        BatchOptions {
            dry_run: true,
            ..BatchOptions::default()
        },
    );
    let reports = driver.run_all(&[doc.into()]);

    assert_eq!(reports[0].outcome, Outcome::WouldCommit);
    assert!(!project.path().join("fresh").exists());
    assert!(project.path().join("obsolete.txt").exists());
    assert!(artifacts(project.path()).is_empty());
}

#[test]
fn test_symlink_escape_is_a_plan_error() {
    #[cfg(unix)]
    {
        let (project, docs) = setup();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), project.path().join("link")).unwrap();
        let doc = docs.path().join("escape.op");
        fs::write(
            &doc,
            "~\naction: create\ntarget: link/evil.txt\nreasoning: r\n[block]\nx\n[/block]\n",
        )
        .unwrap();

        let driver = BatchDriver::new(
            DiskWorkspace::new(project.path()).unwrap(),
            CapabilityRegistry::with_defaults(),
            BatchOptions::default(),
        );
        let reports = driver.run_all(&[doc.into()]);

        assert_eq!(reports[0].outcome, Outcome::PlanFailed);
        assert!(!outside.path().join("evil.txt").exists());
    }
}

#[test]
fn test_cleanup_removes_interrupted_staging() {
    let (project, _docs) = setup();
    fs::create_dir(project.path().join("src")).unwrap();
    let stale = project
        .path()
        .join("src")
        .join(format!(".lib.rs.k3j2{STAGING_SUFFIX}"));
    fs::write(&stale, "half written").unwrap();

    let removed = cleanup_stale_artifacts(project.path(), Duration::ZERO).unwrap();

    assert_eq!(removed.len(), 1);
    assert!(!stale.exists());
    assert!(project.path().join("README.md").exists());
}
