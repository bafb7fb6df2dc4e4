//! Property-based tests for planning order and all-or-nothing application

use optx_exec::{
    plan, BatchOptions, CancelToken, DocumentSource, MemoryWorkspace, Outcome, PathLocks,
    Pipeline, PlanOptions,
};
use optx_lang::{process_document, CapabilityRegistry};
use optx_parser::parse_document;
use proptest::prelude::*;
use std::path::PathBuf;

fn create(target: &str, body: &str) -> String {
    format!("~\naction: create\ntarget: {target}\nreasoning: generated\n[block]\n{body}\n[/block]\n")
}

fn distinct_targets() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{1,6}(/[a-z]{1,6})?\\.txt", 1..10)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

proptest! {
    #[test]
    fn planned_operations_keep_document_order(targets in distinct_targets()) {
        let text: String = targets.iter().map(|t| create(t, "x")).collect();
        let document = parse_document("order.op", &text).unwrap();
        let processed = process_document(&document, &CapabilityRegistry::with_defaults());
        prop_assert!(processed.is_ok());

        let outcome = plan(&processed.processed, &MemoryWorkspace::new(), &PlanOptions::default());
        prop_assert!(outcome.is_ok());
        let planned: Vec<PathBuf> = outcome.operations.iter().map(|op| op.path.clone()).collect();
        let expected: Vec<PathBuf> = targets.iter().map(PathBuf::from).collect();
        prop_assert_eq!(planned, expected);
    }

    #[test]
    fn one_bad_transaction_changes_nothing(
        count in 1usize..6,
        bad_at in 0usize..6,
        bad in prop::sample::select(vec![
            "~\naction: create\ntarget: ../outside.txt\nreasoning: r\n[block]\nx\n[/block]\n",
            "~\naction: create\ntarget: broken.json\nreasoning: r\n[block]\n[1,\n[/block]\n",
            "~\naction: modify\ntarget: nowhere.txt\nreasoning: r\n[block]\nx\n[/block]\n",
            "~\naction: create\ntarget: ok.txt\n[block]\nx\n[/block]\n",
        ]),
    ) {
        let mut records: Vec<String> = (0..count).map(|i| create(&format!("file{i}.txt"), "x")).collect();
        records.insert(bad_at.min(count), bad.to_string());
        let text = records.concat();

        let ws = MemoryWorkspace::new().with_file("seed.txt", "seed");
        let registry = CapabilityRegistry::with_defaults();
        let locks = PathLocks::new();
        let options = BatchOptions::default();
        let report = Pipeline::new(&ws, &registry, &locks, &options, CancelToken::new())
            .run(&DocumentSource::inline("mixed.op", text));

        prop_assert!(!report.is_success());
        prop_assert!(report.outcome != Outcome::PartialCommit);
        prop_assert_eq!(ws.files().len(), 1);
        prop_assert_eq!(ws.staged_count(), 0);
    }
}
