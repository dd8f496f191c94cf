//! History record types shared by the store and its persistence collaborator

use crate::evaluation::EvaluationResult;
use crate::model::EchoRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Content-derived identity of an echo (lowercase hex SHA-256)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an insert with an already-stored fingerprint is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetentionMode {
    /// Always append; no deduplication
    All,
    /// Overwrite the stored entry in place
    #[default]
    Latest,
    /// Keep the stored entry untouched and discard the new one
    Oldest,
}

impl FromStr for RetentionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(RetentionMode::All),
            "latest" => Ok(RetentionMode::Latest),
            "oldest" => Ok(RetentionMode::Oldest),
            other => Err(format!("unknown retention mode '{}'", other)),
        }
    }
}

impl fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetentionMode::All => "all",
            RetentionMode::Latest => "latest",
            RetentionMode::Oldest => "oldest",
        };
        f.write_str(name)
    }
}

/// Result of one history insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertOutcome {
    Appended,
    Replaced,
    Skipped,
}

/// One evaluated echo in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub fingerprint: Fingerprint,
    pub echo: EchoRecord,
    pub result: EvaluationResult,
    pub inserted_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// New entry stamped at `at` (both timestamps equal)
    pub fn new(
        fingerprint: Fingerprint,
        echo: EchoRecord,
        result: EvaluationResult,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            fingerprint,
            echo,
            result,
            inserted_at: at,
            last_updated_at: at,
        }
    }
}
