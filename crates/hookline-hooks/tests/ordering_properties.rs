//! Property tests for hook ordering, path scoping and memory

use std::{
    fmt::Write as _,
    fs,
    sync::{Arc, Mutex},
};

use hookline_hooks::{
    config::{CONFIG_DIR, CONFIG_FILE},
    context::scope_path,
    *,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Hooks run highest priority first, ties in declaration order
    #[test]
    fn prop_dispatch_order_follows_priority(priorities in prop::collection::vec(-3i32..3, 1..6)) {
        let dir = TempDir::new().unwrap();
        let mut yaml = String::from("hooks:\n");
        for (i, priority) in priorities.iter().enumerate() {
            writeln!(yaml, "  h{i}:\n    script: builtin:h{i}\n    events: [post-commit]\n    priority: {priority}").unwrap();
        }
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(dir.path().join(CONFIG_DIR).join(CONFIG_FILE), yaml).unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut builder = HookManager::builder(dir.path())
            .with_global_path(None)
            .with_env(Arc::new(|_| None))
            .with_memory(Arc::new(MemoryStore::ephemeral()));
        for i in 0..priorities.len() {
            let calls = Arc::clone(&calls);
            builder = builder.with_native(
                format!("h{i}"),
                Arc::new(SyncHook(move |_ctx: &mut ExecutionContext| -> Result<Value> {
                    calls.lock().unwrap().push(format!("h{i}"));
                    Ok(json!({ "success": true }))
                })),
            );
        }
        let manager = builder.build();

        let result = tokio_test::block_on(manager.dispatch(Event::new(EventType::PostCommit))).unwrap();

        let mut expected: Vec<(usize, i32)> = priorities.iter().copied().enumerate().collect();
        expected.sort_by(|a, b| b.1.cmp(&a.1));
        let expected: Vec<String> = expected.iter().map(|(i, _)| format!("h{i}")).collect();

        let recorded: Vec<String> = result.records.iter().map(|r| r.hook_name.clone()).collect();
        prop_assert_eq!(&recorded, &expected);
        prop_assert_eq!(&*calls.lock().unwrap(), &expected);
    }

    /// Paths that climb above the root are always rejected
    #[test]
    fn prop_escaping_paths_rejected(segments in prop::collection::vec("[a-z]{1,6}", 0..4), ups in 1usize..4) {
        let dir = TempDir::new().unwrap();
        let mut path = String::new();
        for _ in 0..(segments.len() + ups) {
            path.push_str("../");
        }
        path.push_str(&segments.join("/"));
        let err = scope_path(dir.path(), &path).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Permission);
    }

    /// Paths built from plain segments stay inside the root
    #[test]
    fn prop_plain_paths_stay_inside(segments in prop::collection::vec("[a-z]{1,6}", 1..5)) {
        let dir = TempDir::new().unwrap();
        let scoped = scope_path(dir.path(), &segments.join("/")).unwrap();
        prop_assert!(scoped.absolute.starts_with(dir.path()));
        prop_assert_eq!(scoped.relative, segments.join("/"));
    }

    /// A saved document loads back unchanged
    #[test]
    fn prop_memory_round_trip(entries in prop::collection::btree_map("[a-z_]{1,8}", any::<i64>(), 0..8)) {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::for_project(dir.path());
        let document = json!(entries);

        let loaded = tokio_test::block_on(async {
            store.save(&document).await?;
            store.load().await
        }).unwrap();
        prop_assert_eq!(loaded, document);
    }
}
