//! Integration tests for the SQLite run history
//!
//! Most tests use an in-memory SQLite database; one reopens a file-backed
//! database to check persistence.

mod common;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use memory_bench::comparison::ComparativeAnalyzer;
use memory_bench::config::DatabaseConfig;
use memory_bench::error::StorageError;
use memory_bench::report::BenchmarkReport;
use memory_bench::storage::{RunStore, SqliteRunStore};

use common::aggregate;

/// Create an in-memory storage instance for testing
async fn create_test_store() -> SqliteRunStore {
    SqliteRunStore::new_in_memory()
        .await
        .expect("Failed to create in-memory store")
}

fn report(alpha_core: f64, minutes_ago: i64) -> BenchmarkReport {
    let alpha = aggregate(
        "alpha",
        "context",
        &[
            ("偏好变化", vec![("context", alpha_core), ("profile", 8.0)]),
            ("人际关系", vec![("context", alpha_core), ("profile", 6.0)]),
        ],
    );
    let beta = aggregate(
        "beta",
        "memory_items",
        &[("偏好变化", vec![("memory_items", 5.0)])],
    );
    let comparison = ComparativeAnalyzer::default()
        .compare(&alpha, &beta, None)
        .unwrap();

    let mut report = BenchmarkReport::new("mini", vec![alpha, beta]).with_comparison(comparison);
    report.generated_at = Utc::now() - Duration::minutes(minutes_ago);
    report
}

#[tokio::test]
async fn test_save_and_get_run() {
    let store = create_test_store().await;
    let original = report(7.0, 0);

    store.save_report(&original).await.unwrap();
    let loaded = store.get_run(&original.run_id).await.unwrap();

    assert_eq!(loaded.run_id, original.run_id);
    assert_eq!(loaded.corpus_name, "mini");
    assert_eq!(loaded.frameworks, original.frameworks);
    assert_eq!(loaded.generated_at, original.generated_at);
    let comparison = loaded.comparison.unwrap();
    assert_eq!(comparison.core_method_winner(), "alpha");
    assert_eq!(comparison.core.gap, 2.0);
}

#[tokio::test]
async fn test_get_missing_run() {
    let store = create_test_store().await;

    let err = store.get_run("no-such-run").await.unwrap_err();
    assert!(matches!(err, StorageError::RunNotFound { run_id } if run_id == "no-such-run"));
}

#[tokio::test]
async fn test_saving_same_run_twice_fails() {
    let store = create_test_store().await;
    let original = report(7.0, 0);

    store.save_report(&original).await.unwrap();
    assert!(store.save_report(&original).await.is_err());

    // The failed insert rolled back; exactly one run remains.
    assert_eq!(store.list_runs(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_runs_newest_first() {
    let store = create_test_store().await;
    let older = report(6.0, 30);
    let newer = report(9.0, 5);

    store.save_report(&older).await.unwrap();
    store.save_report(&newer).await.unwrap();

    let runs = store.list_runs(10).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, newer.run_id);
    assert_eq!(runs[1].run_id, older.run_id);
    assert_eq!(runs[0].frameworks, vec!["alpha".to_string(), "beta".to_string()]);
    assert_eq!(runs[0].overall_winner.as_deref(), Some("alpha"));
    assert!(runs[0].overall_confidence.is_some());

    let limited = store.list_runs(1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].run_id, newer.run_id);
}

#[tokio::test]
async fn test_framework_history() {
    let store = create_test_store().await;
    let older = report(6.0, 30);
    let newer = report(9.0, 5);
    store.save_report(&older).await.unwrap();
    store.save_report(&newer).await.unwrap();

    let history = store.framework_history("alpha", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].run_id, newer.run_id);
    assert_eq!(history[0].core_method, "context");
    assert_eq!(history[0].core_method_average, 9.0);
    assert_eq!(history[0].total_cases, 2);
    assert_eq!(history[0].failures, 0);
    assert_eq!(history[1].core_method_average, 6.0);

    assert!(store.framework_history("unknown", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_latest_framework_aggregate() {
    let store = create_test_store().await;
    assert!(store
        .latest_framework_aggregate("alpha")
        .await
        .unwrap()
        .is_none());

    let older = report(6.0, 30);
    let newer = report(9.0, 5);
    store.save_report(&older).await.unwrap();
    store.save_report(&newer).await.unwrap();

    let latest = store
        .latest_framework_aggregate("alpha")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest, newer.frameworks[0]);
    assert!(latest.validate().is_ok());
}

#[tokio::test]
async fn test_file_database_persists_across_connections() {
    let dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("nested").join("history.db"),
        max_connections: 2,
    };
    let original = report(7.0, 0);

    {
        let store = SqliteRunStore::new(&config).await.unwrap();
        store.save_report(&original).await.unwrap();
        store.pool().close().await;
    }

    let store = SqliteRunStore::new(&config).await.unwrap();
    let runs = store.list_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, original.run_id);
    assert!(config.path.exists());
}
