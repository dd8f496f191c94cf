//! History persistence collaborator
//!
//! The store itself never touches disk. A [`HistorySink`] writes snapshots
//! out and reads them back; failures surface as [`HistoryIoError`] and
//! leave in-memory history unchanged.

use crate::error::HistoryIoError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use echo_common::HistoryEntry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current on-disk format version
pub const HISTORY_FORMAT_VERSION: u32 = 1;

/// Durable storage for history snapshots
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Replace the stored snapshot with `entries`
    async fn persist(&self, entries: &[HistoryEntry]) -> Result<(), HistoryIoError>;

    /// Read the stored snapshot (empty when nothing was stored yet)
    async fn load(&self) -> Result<Vec<HistoryEntry>, HistoryIoError>;
}

#[derive(Serialize)]
struct HistoryFileOut<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    entries: &'a [HistoryEntry],
}

#[derive(Deserialize)]
struct HistoryFileIn {
    #[serde(default)]
    version: u32,
    entries: Vec<HistoryEntry>,
}

/// JSON file sink with atomic replace (temp file + rename)
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "history.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl HistorySink for JsonFileSink {
    async fn persist(&self, entries: &[HistoryEntry]) -> Result<(), HistoryIoError> {
        let file = HistoryFileOut {
            version: HISTORY_FORMAT_VERSION,
            saved_at: Utc::now(),
            entries,
        };
        let json = serde_json::to_vec_pretty(&file)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HistoryIoError::io(parent, e))?;
        }

        // Write to temp file first, then rename over the target
        let temp = self.temp_path();
        tokio::fs::write(&temp, &json)
            .await
            .map_err(|e| HistoryIoError::io(&temp, e))?;

        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(HistoryIoError::io(&self.path, e));
        }

        tracing::debug!(
            path = %self.path.display(),
            entries = entries.len(),
            bytes = json.len(),
            "Persisted history"
        );
        Ok(())
    }

    async fn load(&self) -> Result<Vec<HistoryEntry>, HistoryIoError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No history file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(HistoryIoError::io(&self.path, e)),
        };

        let file: HistoryFileIn = serde_json::from_slice(&bytes)?;
        if file.version > HISTORY_FORMAT_VERSION {
            tracing::warn!(
                path = %self.path.display(),
                version = file.version,
                supported = HISTORY_FORMAT_VERSION,
                "History file written by a newer version"
            );
        }
        tracing::debug!(
            path = %self.path.display(),
            entries = file.entries.len(),
            "Loaded history"
        );
        Ok(file.entries)
    }
}
