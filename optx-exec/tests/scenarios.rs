//! End-to-end document runs against an in-memory workspace

use optx_exec::{
    BatchDriver, BatchOptions, CancelToken, DocumentSource, ExecutionReport, MemoryWorkspace,
    Outcome, PathLocks, Pipeline, Stage, TransactionStatus,
};
use optx_lang::CapabilityRegistry;
use rstest::rstest;
use std::path::PathBuf;
use std::time::Duration;

fn run_with(ws: &MemoryWorkspace, text: &str, options: &BatchOptions) -> ExecutionReport {
    let registry = CapabilityRegistry::with_defaults();
    let locks = PathLocks::new();
    Pipeline::new(ws, &registry, &locks, options, CancelToken::new())
        .run(&DocumentSource::inline("doc.op", text))
}

fn run(ws: &MemoryWorkspace, text: &str) -> ExecutionReport {
    run_with(ws, text, &BatchOptions::default())
}

fn record(action: &str, target: &str, body: Option<&str>) -> String {
    let mut record = format!("~\naction: {action}\ntarget: {target}\nreasoning: because\n");
    if let Some(body) = body {
        record.push_str(&format!("[block]\n{body}[/block]\n"));
    }
    record
}

#[test]
fn test_create_single_file() {
    let ws = MemoryWorkspace::new();
    let report = run(&ws, &record("create", "hello.txt", Some("hi\n")));

    assert_eq!(report.outcome, Outcome::Committed);
    assert_eq!((report.applied, report.skipped), (1, 0));
    assert_eq!(ws.file("hello.txt").as_deref(), Some("hi\n"));
    assert_eq!(report.changed_paths(), &[PathBuf::from("hello.txt")]);
}

#[test]
fn test_conflicting_targets_change_nothing() {
    let ws = MemoryWorkspace::new().with_file("shared.txt", "original\n");
    let text = [
        record("modify", "shared.txt", Some("one\n")),
        record("modify", "shared.txt", Some("two\n")),
    ]
    .concat();
    let report = run(&ws, &text);

    assert_eq!(report.outcome, Outcome::PlanFailed);
    assert_eq!(report.errors[0].stage, Stage::Planning);
    assert_eq!(ws.file("shared.txt").as_deref(), Some("original\n"));
    assert_eq!(ws.files().len(), 1);
}

#[test]
fn test_unterminated_block_extracts_nothing() {
    let ws = MemoryWorkspace::new();
    let report = run(
        &ws,
        "~\naction: create\ntarget: a.txt\nreasoning: r\n[block]\nhi\n",
    );

    assert_eq!(report.outcome, Outcome::ParseFailed);
    assert_eq!(report.attempted, 0);
    assert!(report.transactions.is_empty());
    assert!(report.errors[0].message.starts_with("unterminated block"));
    assert!(ws.files().is_empty());
}

#[test]
fn test_delete_missing_target() {
    let ws = MemoryWorkspace::new().with_file("keep.txt", "x");
    let report = run(&ws, &record("delete", "gone.txt", None));

    assert_eq!(report.outcome, Outcome::PlanFailed);
    assert_eq!(report.status_of(0), Some(TransactionStatus::Failed));
    assert_eq!(ws.file("keep.txt").as_deref(), Some("x"));
}

#[test]
fn test_commit_failure_reports_partial_commit() {
    let ws = MemoryWorkspace::new();
    ws.fail_commit("c.txt");
    let text = [
        record("create", "a.txt", Some("a\n")),
        record("create", "b.txt", Some("b\n")),
        record("create", "c.txt", Some("c\n")),
    ]
    .concat();
    let report = run(&ws, &text);

    assert_eq!(report.outcome, Outcome::PartialCommit);
    assert_eq!(
        report.touched,
        vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]
    );
    assert_eq!(report.untouched, vec![PathBuf::from("c.txt")]);
    assert_eq!(report.status_of(2), Some(TransactionStatus::Failed));
    assert!(report.changed_paths().is_empty());
    assert_eq!(ws.staged_count(), 0);
}

#[test]
fn test_rename_moves_file() {
    let ws = MemoryWorkspace::new().with_file("old/name.txt", "content");
    let report = run(
        &ws,
        "~\naction: rename\ntarget: old/name.txt\ndestination: new/name.txt\nreasoning: tidy\n",
    );

    assert_eq!(report.outcome, Outcome::Committed);
    assert_eq!(ws.file("old/name.txt"), None);
    assert_eq!(ws.file("new/name.txt").as_deref(), Some("content"));
    assert_eq!(
        report.touched,
        vec![PathBuf::from("old/name.txt"), PathBuf::from("new/name.txt")]
    );
}

#[test]
fn test_create_then_modify_chain() {
    let ws = MemoryWorkspace::new();
    let text = [
        record("create", "main.py", Some("print('a')\n")),
        record("append", "main.py", Some("print('b')\n")),
    ]
    .concat();
    let report = run(&ws, &text);

    assert_eq!(report.outcome, Outcome::Committed);
    assert_eq!(report.applied, 2);
    assert_eq!(
        ws.file("main.py").as_deref(),
        Some("print('a')\nprint('b')\n")
    );
}

#[test]
fn test_diagnostics_do_not_block() {
    let ws = MemoryWorkspace::new();
    let report = run(&ws, &record("create", "app.js", Some("var x = 1 == 2;\n")));

    assert_eq!(report.outcome, Outcome::Committed);
    let tx = &report.transactions[0];
    assert_eq!(tx.capabilities, vec!["javascript".to_string()]);
    assert_eq!(tx.diagnostics.len(), 2);
}

#[test]
fn test_deadline_rolls_back() {
    let ws = MemoryWorkspace::new();
    let options = BatchOptions {
        timeout: Some(Duration::ZERO),
        ..BatchOptions::default()
    };
    let report = run_with(&ws, &record("create", "a.txt", Some("a\n")), &options);

    assert_eq!(report.outcome, Outcome::RolledBack);
    assert_eq!(report.errors[0].stage, Stage::Staging);
    assert!(report.errors[0].message.contains("deadline"));
    assert!(ws.files().is_empty());
}

#[rstest]
#[case::committed(record("create", "new.txt", Some("x\n")), Outcome::Committed)]
#[case::invalid(record("create", "../escape.txt", Some("x\n")), Outcome::Invalid)]
#[case::processing(record("create", "data.json", Some("{\n")), Outcome::ProcessingFailed)]
#[case::plan(record("create", "existing.txt", Some("x\n")), Outcome::PlanFailed)]
#[case::rename_onto_existing(
    "~\naction: rename\ntarget: existing.txt\ndestination: other.txt\nreasoning: r\n".to_string(),
    Outcome::PlanFailed
)]
fn test_dry_run_statuses_match_real_run(#[case] text: String, #[case] expected: Outcome) {
    let seed = || {
        MemoryWorkspace::new()
            .with_file("existing.txt", "e")
            .with_file("other.txt", "o")
    };
    let dry_ws = seed();
    let real_ws = seed();
    let dry = run_with(
        &dry_ws,
        &text,
        &BatchOptions {
            dry_run: true,
            ..BatchOptions::default()
        },
    );
    let real = run(&real_ws, &text);

    let statuses = |report: &ExecutionReport| -> Vec<TransactionStatus> {
        report.transactions.iter().map(|tx| tx.status).collect()
    };
    assert_eq!(real.outcome, expected);
    assert_eq!(statuses(&dry), statuses(&real));
    assert!(!dry.committed);
    assert_eq!(dry_ws.files(), seed().files());
    if expected == Outcome::Committed {
        assert_eq!(dry.outcome, Outcome::WouldCommit);
        assert!(real.committed);
    } else {
        assert_eq!(dry.outcome, expected);
    }
}

#[test]
fn test_parallel_appends_do_not_lose_updates() {
    let options = BatchOptions {
        max_parallelism: 4,
        continue_on_error: true,
        ..BatchOptions::default()
    };
    let driver = BatchDriver::new(
        MemoryWorkspace::new().with_file("log.txt", ""),
        CapabilityRegistry::with_defaults(),
        options,
    );
    let sources: Vec<DocumentSource> = (0..12)
        .map(|i| {
            DocumentSource::inline(
                format!("doc-{i}"),
                record("append", "log.txt", Some(&format!("line {i}\n"))),
            )
        })
        .collect();

    let reports = driver.run_all(&sources);

    assert_eq!(reports.len(), 12);
    let names: Vec<&str> = reports.iter().map(|r| r.source.as_str()).collect();
    let expected: Vec<String> = (0..12).map(|i| format!("doc-{i}")).collect();
    assert_eq!(names, expected);
    assert!(reports.iter().all(|r| r.outcome == Outcome::Committed));

    let log = driver.workspace().file("log.txt").unwrap();
    assert_eq!(log.lines().count(), 12);
    for i in 0..12 {
        assert!(log.contains(&format!("line {i}\n")));
    }
}
