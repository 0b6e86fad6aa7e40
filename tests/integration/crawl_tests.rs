//! Integration tests for the crawl engine
//!
//! These tests run complete crawls against in-memory document graphs and
//! check what was fetched, stored and reported.

use crate::common::{fast_config, id, open_archive, Behavior, GraphPlugin};
use bushel::crawler::{CrawlOutcome, FailureKind, Orchestrator};
use bushel::document::{DigestAlgorithm, DigestValue};
use bushel::plugin::PluginRegistry;
use bushel::state::EntryStatus;
use bushel::storage::{SqliteStorage, Storage};
use bushel::{BushelError, ConfigError};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn registry_with(plugins: Vec<Arc<GraphPlugin>>) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    for plugin in plugins {
        registry.register_plugin(plugin);
    }
    registry
}

fn count_index_entries(dir: &TempDir) -> u64 {
    SqliteStorage::new(&dir.path().join("index.db"))
        .expect("Failed to open index")
        .count_total_entries()
        .expect("Failed to count entries")
}

fn count_stored_files(dir: &TempDir) -> usize {
    fn walk(path: &std::path::Path) -> usize {
        std::fs::read_dir(path)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| {
                        let path = e.path();
                        if path.is_dir() {
                            walk(&path)
                        } else {
                            1
                        }
                    })
                    .sum()
            })
            .unwrap_or(0)
    }
    walk(&dir.path().join("store").join("by-sha256"))
}

#[tokio::test]
async fn test_shared_reference_fetched_once() {
    let dir = TempDir::new().unwrap();

    let children: Vec<_> = (0..50).map(|i| format!("child-{}", i)).collect();
    let mut plugin = GraphPlugin::new("graph").seed("root").node(
        "root",
        children.iter().map(|c| id("graph", c)).collect(),
    );
    for child in &children {
        plugin = plugin.node(child, vec![id("graph", "shared")]);
    }
    let plugin = Arc::new(plugin.node("shared", vec![]));

    let summary = Orchestrator::new(
        registry_with(vec![plugin.clone()]),
        open_archive(&dir),
        fast_config(8),
    )
    .run()
    .await
    .expect("Crawl failed");

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.discovered, 52);
    assert_eq!(summary.stored, 52);
    assert_eq!(plugin.calls("shared"), 1);
    assert_eq!(plugin.total_calls(), 52);
    assert!(summary.failures.is_empty());
}

#[tokio::test]
async fn test_reference_cycle_terminates() {
    let dir = TempDir::new().unwrap();
    let plugin = Arc::new(
        GraphPlugin::new("graph")
            .seed("a")
            .node("a", vec![id("graph", "b")])
            .node("b", vec![id("graph", "c")])
            .node("c", vec![id("graph", "a")]),
    );

    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        Orchestrator::new(registry_with(vec![plugin.clone()]), open_archive(&dir), fast_config(4)).run(),
    )
    .await
    .expect("Crawl did not terminate")
    .expect("Crawl failed");

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.stored, 3);
    for subject in ["a", "b", "c"] {
        assert_eq!(plugin.calls(subject), 1, "{} fetched more than once", subject);
    }
}

#[tokio::test]
async fn test_second_run_reuses_archive() {
    let dir = TempDir::new().unwrap();
    let plugin = Arc::new(
        GraphPlugin::new("graph")
            .seed("root")
            .node("root", vec![id("graph", "leaf-1"), id("graph", "leaf-2")])
            .node("leaf-1", vec![])
            .node("leaf-2", vec![]),
    );
    let archive = open_archive(&dir);

    let first = Orchestrator::new(registry_with(vec![plugin.clone()]), archive.clone(), fast_config(2))
        .run()
        .await
        .expect("First crawl failed");
    assert_eq!(first.stored, 3);
    let entries_after_first = count_index_entries(&dir);
    let files_after_first = count_stored_files(&dir);

    let second = Orchestrator::new(registry_with(vec![plugin.clone()]), archive, fast_config(2))
        .run()
        .await
        .expect("Second crawl failed");

    assert_eq!(second.stored, 0);
    assert_eq!(second.reused, 3);
    assert_eq!(second.discovered, 3);
    assert_eq!(plugin.total_calls(), 3);
    assert_eq!(count_index_entries(&dir), entries_after_first);
    assert_eq!(count_stored_files(&dir), files_after_first);
    assert_eq!(files_after_first, 3);
}

#[tokio::test]
async fn test_digest_mismatch_is_not_expanded() {
    let dir = TempDir::new().unwrap();
    let bad_child = id("graph", "child")
        .with_digest(DigestAlgorithm::Sha256, DigestValue::hex("00".repeat(32)));

    let plugin = Arc::new(
        GraphPlugin::new("graph")
            .seed("root")
            .node("root", vec![])
            .seed_id(bad_child.clone())
            .node("child", vec![id("graph", "grandchild")])
            .node("grandchild", vec![]),
    );
    let archive = open_archive(&dir);

    let summary = Orchestrator::new(registry_with(vec![plugin.clone()]), archive.clone(), fast_config(2))
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(summary.mismatched, 1);
    assert_eq!(summary.stored, 1);
    assert_eq!(plugin.calls("grandchild"), 0);

    let entry = archive.entry(&bad_child).unwrap().expect("Mismatch not recorded");
    assert_eq!(entry.status, EntryStatus::DigestMismatch);
    assert!(entry.storage_path.is_none());
}

#[tokio::test]
async fn test_matching_digest_is_stored() {
    let dir = TempDir::new().unwrap();
    let plugin = GraphPlugin::new("graph").node("child", vec![]);
    let expected = DigestAlgorithm::Sha256.compute_hex(plugin.content("child").as_bytes());
    let plugin = Arc::new(plugin.seed_id(
        id("graph", "child").with_digest(DigestAlgorithm::Sha256, DigestValue::hex(expected)),
    ));

    let summary = Orchestrator::new(registry_with(vec![plugin]), open_archive(&dir), fast_config(1))
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(summary.stored, 1);
    assert_eq!(summary.mismatched, 0);
}

#[tokio::test]
async fn test_transient_failures_within_retry_budget() {
    let dir = TempDir::new().unwrap();
    let plugin = Arc::new(
        GraphPlugin::new("graph")
            .seed("flaky")
            .node_with("flaky", vec![], Behavior::FailTransient(3)),
    );
    let archive = open_archive(&dir);

    let summary = Orchestrator::new(registry_with(vec![plugin.clone()]), archive.clone(), fast_config(1))
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(plugin.calls("flaky"), 4);
    assert_eq!(summary.stored, 1);
    assert!(summary.failures.is_empty());
    let entry = archive.entry(&id("graph", "flaky")).unwrap().unwrap();
    assert_eq!(entry.status, EntryStatus::Stored);
}

#[tokio::test]
async fn test_always_transient_becomes_failure() {
    let dir = TempDir::new().unwrap();
    let plugin = Arc::new(
        GraphPlugin::new("graph")
            .seed("root")
            .node("root", vec![id("graph", "down")])
            .node_with("down", vec![], Behavior::AlwaysTransient),
    );

    let summary = Orchestrator::new(registry_with(vec![plugin.clone()]), open_archive(&dir), fast_config(2))
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(plugin.calls("down"), 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].identifier, id("graph", "down"));
    assert_eq!(summary.failures[0].kind, FailureKind::RetriesExhausted);
    assert_eq!(summary.failures[0].attempts, 4);
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let plugin = Arc::new(
        GraphPlugin::new("graph")
            .seed("root")
            .node("root", vec![id("graph", "gone")])
            .node_with("gone", vec![], Behavior::Permanent),
    );

    let summary = Orchestrator::new(registry_with(vec![plugin.clone()]), open_archive(&dir), fast_config(2))
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(plugin.calls("gone"), 1);
    assert_eq!(summary.failures[0].kind, FailureKind::Permanent);
    assert_eq!(summary.stored, 1);
}

#[tokio::test]
async fn test_unknown_doctype_is_recorded() {
    let dir = TempDir::new().unwrap();
    let plugin = Arc::new(
        GraphPlugin::new("graph")
            .seed("root")
            .node("root", vec![id("orphan", "x"), id("graph", "leaf")])
            .node("leaf", vec![]),
    );

    let summary = Orchestrator::new(registry_with(vec![plugin]), open_archive(&dir), fast_config(2))
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.stored, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].kind, FailureKind::UnknownDoctype);
    assert_eq!(summary.failures[0].identifier, id("orphan", "x"));
}

#[tokio::test]
async fn test_parse_failure_keeps_document() {
    let dir = TempDir::new().unwrap();
    let plugin = Arc::new(
        GraphPlugin::new("graph")
            .seed("broken")
            .node_with("broken", vec![], Behavior::Garbage),
    );
    let archive = open_archive(&dir);

    let summary = Orchestrator::new(registry_with(vec![plugin]), archive.clone(), fast_config(1))
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(summary.parse_failed, 1);
    assert_eq!(summary.stored, 0);
    let entry = archive.entry(&id("graph", "broken")).unwrap().unwrap();
    assert_eq!(entry.status, EntryStatus::ParseFailed);
    assert!(entry.storage_path.unwrap().exists());
}

#[tokio::test]
async fn test_plugins_share_the_frontier() {
    let dir = TempDir::new().unwrap();
    let consensus = Arc::new(
        GraphPlugin::new("alpha")
            .seed("root")
            .node("root", vec![id("beta", "one"), id("beta", "two")]),
    );
    let descriptors = Arc::new(
        GraphPlugin::new("beta")
            .node("one", vec![id("alpha", "root")])
            .node("two", vec![]),
    );

    let summary = Orchestrator::new(
        registry_with(vec![consensus.clone(), descriptors.clone()]),
        open_archive(&dir),
        fast_config(4),
    )
    .run()
    .await
    .expect("Crawl failed");

    assert_eq!(summary.stored, 3);
    assert_eq!(consensus.total_calls(), 1);
    assert_eq!(descriptors.total_calls(), 2);
}

#[tokio::test]
async fn test_deadline_abandons_hanging_fetch() {
    let dir = TempDir::new().unwrap();
    let plugin = Arc::new(
        GraphPlugin::new("graph")
            .seed("root")
            .node("root", vec![id("graph", "stuck"), id("graph", "fine")])
            .node_with("stuck", vec![], Behavior::Hang)
            .node("fine", vec![]),
    );

    let summary = Orchestrator::new(registry_with(vec![plugin]), open_archive(&dir), fast_config(4))
        .with_deadline(Some(Duration::from_millis(300)))
        .with_drain_cutoff(Duration::from_millis(100))
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(summary.outcome, CrawlOutcome::Interrupted);
    assert_eq!(summary.stored, 2);
    assert_eq!(summary.abandoned, vec![id("graph", "stuck")]);
    assert!(summary.unprocessed.is_empty());
}

#[tokio::test]
async fn test_deadline_without_progress_fails() {
    let dir = TempDir::new().unwrap();
    let plugin = Arc::new(
        GraphPlugin::new("graph")
            .seed("stuck")
            .node_with("stuck", vec![], Behavior::Hang),
    );

    let result = Orchestrator::new(registry_with(vec![plugin]), open_archive(&dir), fast_config(1))
        .with_deadline(Some(Duration::from_millis(100)))
        .with_drain_cutoff(Duration::from_millis(50))
        .run()
        .await;

    assert!(matches!(result, Err(BushelError::NoProgress { .. })));
}

#[tokio::test]
async fn test_cancellation_reports_unprocessed() {
    let dir = TempDir::new().unwrap();
    let plugin = Arc::new(
        GraphPlugin::new("graph")
            .seed("root")
            .node("root", vec![id("graph", "stuck"), id("graph", "waiting")])
            .node_with("stuck", vec![], Behavior::Hang)
            .node("waiting", vec![]),
    );

    // A single worker is stuck on "stuck" while "waiting" stays queued
    let orchestrator = Orchestrator::new(registry_with(vec![plugin]), open_archive(&dir), fast_config(1))
        .with_drain_cutoff(Duration::from_millis(50));
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });

    let summary = orchestrator.run().await.expect("Crawl failed");

    assert_eq!(summary.outcome, CrawlOutcome::Interrupted);
    assert_eq!(summary.stored, 1);
    assert_eq!(summary.abandoned, vec![id("graph", "stuck")]);
    assert_eq!(summary.unprocessed, vec![id("graph", "waiting")]);
}

#[tokio::test]
async fn test_zero_plugins_is_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    let result = Orchestrator::new(PluginRegistry::new(), open_archive(&dir), fast_config(1))
        .run()
        .await;

    assert!(matches!(result, Err(BushelError::Config(ConfigError::NoPlugins))));
    assert_eq!(count_index_entries(&dir), 0);
}
