//! History persistence through the pipeline
//!
//! Flush and restore round trips through a JSON file, and a failing sink
//! that must leave in-memory history untouched.

use async_trait::async_trait;
use echo_common::{Cost, EvalConfig, HistoryEntry, RetentionMode, StatKind};
use echo_eval::{
    restore_store, EchoPipeline, EchoSubmission, HistoryIoError, HistoryQuery, HistorySink,
    JsonFileSink, RawReading,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const CONFIG: &str = r#"
    [[profiles]]
    character_id = "jinhsi"
    scaling_stat = "atk"
    recommended_main_stats = ["crit_rate", "crit_damage"]

    [profiles.weights]
    crit_rate = 1.0
    crit_damage = 1.0
    attack_percent = 0.7
    skill_dmg = 0.6
"#;

fn pipeline() -> EchoPipeline {
    let config = EvalConfig::from_toml_str(CONFIG).unwrap();
    EchoPipeline::from_config(&config).with_retention(RetentionMode::All)
}

fn submission(crit_rate: &str) -> EchoSubmission {
    EchoSubmission {
        character_id: "jinhsi".to_string(),
        cost: Some(Cost::Four),
        main_stat: Some(StatKind::CritRate),
        readings: vec![
            RawReading::new("Crit. Rate", crit_rate),
            RawReading::new("Crit. DMG", "13.8%"),
            RawReading::new("Resonance Skill DMG Bonus", "8.6%"),
        ],
        ..EchoSubmission::default()
    }
}

/// Sink whose writes always fail
#[derive(Default)]
struct FailingSink {
    attempts: AtomicUsize,
}

#[async_trait]
impl HistorySink for FailingSink {
    async fn persist(&self, _entries: &[HistoryEntry]) -> Result<(), HistoryIoError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(HistoryIoError::Io {
            path: "/unavailable/history.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    async fn load(&self) -> Result<Vec<HistoryEntry>, HistoryIoError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_flush_and_restore_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let history_path = temp_dir.path().join("history.json");
    let sink = Arc::new(JsonFileSink::new(&history_path));

    // Step 1: Evaluate and flush
    let pipeline = pipeline().with_sink(sink.clone());
    let reports = pipeline.submit_batch(&[submission("6.9%"), submission("8.7%")]);
    assert!(reports.iter().all(|r| r.is_ok()));
    assert_eq!(pipeline.flush().await.unwrap(), 2);
    assert!(history_path.exists());

    // Step 2: Restore into a fresh store
    let restored = restore_store(sink.as_ref(), 1000).await.unwrap();
    assert_eq!(restored.len(), 2);

    let original = pipeline.store().snapshot();
    let reloaded = restored.snapshot();
    for (before, after) in original.iter().zip(reloaded.iter()) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.fingerprint, after.fingerprint);
        assert_eq!(before.inserted_at, after.inserted_at);
        assert_eq!(before.echo.character_id(), after.echo.character_id());
        assert_eq!(before.result.rank, after.result.rank);
    }
}

#[tokio::test]
async fn test_restored_store_keeps_deduplicating() {
    let temp_dir = TempDir::new().unwrap();
    let sink = Arc::new(JsonFileSink::new(temp_dir.path().join("history.json")));

    let first = pipeline().with_sink(sink.clone());
    first.submit(&submission("6.9%")).unwrap();
    first.flush().await.unwrap();

    // A later session picks up where the first left off
    let store = Arc::new(restore_store(sink.as_ref(), 1000).await.unwrap());
    let second = pipeline()
        .with_store(store)
        .with_retention(RetentionMode::Oldest)
        .with_sink(sink.clone());

    let report = second.submit(&submission("6.9%")).unwrap();
    assert_eq!(report.outcome, echo_common::InsertOutcome::Skipped);
    assert_eq!(second.store().len(), 1);
}

#[tokio::test]
async fn test_failed_flush_leaves_memory_intact() {
    let sink = Arc::new(FailingSink::default());
    let pipeline = pipeline().with_sink(sink.clone());

    pipeline.submit(&submission("6.9%")).unwrap();
    let err = pipeline.flush().await.unwrap_err();
    assert!(matches!(err, HistoryIoError::Io { .. }));

    // History still holds the entry and keeps accepting new ones
    assert_eq!(pipeline.store().len(), 1);
    pipeline.submit(&submission("8.7%")).unwrap();
    assert_eq!(pipeline.store().len(), 2);
    assert_eq!(
        pipeline
            .store()
            .query(HistoryQuery::new().character("jinhsi"))
            .count(),
        2
    );

    assert!(pipeline.flush().await.is_err());
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_flush_without_sink_writes_nothing() {
    let pipeline = pipeline();
    pipeline.submit(&submission("6.9%")).unwrap();
    assert_eq!(pipeline.flush().await.unwrap(), 0);
}

#[tokio::test]
async fn test_restore_applies_retention_cap() {
    let temp_dir = TempDir::new().unwrap();
    let sink = Arc::new(JsonFileSink::new(temp_dir.path().join("history.json")));

    let pipeline = pipeline().with_sink(sink.clone());
    for crit_rate in ["6.3%", "6.9%", "7.5%", "8.1%"] {
        pipeline.submit(&submission(crit_rate)).unwrap();
    }
    pipeline.flush().await.unwrap();

    let restored = restore_store(sink.as_ref(), 2).await.unwrap();
    assert_eq!(restored.len(), 2);

    // The two most recent inserts survive
    let kept: Vec<_> = restored
        .snapshot()
        .into_iter()
        .map(|entry| entry.echo.value_of(StatKind::CritRate).unwrap())
        .collect();
    assert_eq!(kept, vec![7.5, 8.1]);
}
