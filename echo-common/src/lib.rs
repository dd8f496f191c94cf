//! # Echo Common Library
//!
//! Shared code for the echo evaluation crates including:
//! - Stat kinds and the stat reference table
//! - Label alias resolution
//! - Echo records, weight profiles and evaluation results
//! - History entry types and retention modes
//! - Error taxonomy
//! - Configuration loading

pub mod aliases;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod history;
pub mod model;
pub mod stats;
pub mod time;

pub use aliases::AliasResolver;
pub use config::{AchievementRanks, EvalConfig, LoggingConfig, RankConfig};
pub use error::{ConfigError, Error, Result, ValidationError};
pub use evaluation::{
    EvaluationResult, MainStatFit, PrimaryMethod, RankTag, RankThreshold, RankThresholds,
    Recommendation, CONTINUE_FARMING_BELOW,
};
pub use history::{Fingerprint, HistoryEntry, InsertOutcome, RetentionMode};
pub use model::{Cost, EchoRecord, ProfileRegistry, SubStat, WeightProfile, MAX_SUBSTATS};
pub use stats::{ScalingStat, StatKind, StatReference, StatUnit};
