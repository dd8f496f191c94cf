//! Configuration loading and config file resolution
//!
//! Config file location follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `ECHO_EVAL_CONFIG` environment variable
//! 3. `<user config dir>/echo-eval/config.toml`
//! 4. Compiled defaults (no file)
//!
//! A missing file is never fatal: a warning is logged and defaults are used.
//! A file that exists but does not parse or validate is an error.
//!
//! The loaded [`EvalConfig`] is handed to each component as an immutable
//! value; nothing reads configuration from global state.

use crate::error::{Error, Result};
use crate::evaluation::{PrimaryMethod, RankThresholds};
use crate::history::RetentionMode;
use crate::model::{Cost, ProfileRegistry, WeightProfile};
use crate::stats::{StatKind, StatReference};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "ECHO_EVAL_CONFIG";

/// Evaluation settings loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Duplicate-fingerprint policy for history inserts
    pub retention_mode: RetentionMode,

    /// Retention cap; oldest entries are evicted beyond it (0 = unbounded)
    pub history_max_entries: usize,

    /// Method whose score is ranked
    pub primary_method: PrimaryMethod,

    /// Bonus added to the normalized score for a recommended main stat
    pub main_stat_bonus: f64,

    /// Minimum weight for a substat to count as effective
    pub effective_weight_threshold: f64,

    /// Multiplier on the reference maximum accepted during validation
    pub tolerance_factor: f64,

    pub rank: RankConfig,

    /// Overrides of the built-in stat maximum table
    pub stat_max: HashMap<StatKind, f64>,

    pub logging: LoggingConfig,

    /// History JSON file (falls back to the platform data directory)
    pub history_file: Option<PathBuf>,

    /// Character weight profiles
    pub profiles: Vec<WeightProfile>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            retention_mode: RetentionMode::Latest,
            history_max_entries: 1000,
            primary_method: PrimaryMethod::Normalized,
            main_stat_bonus: 15.0,
            effective_weight_threshold: 0.5,
            tolerance_factor: 1.1,
            rank: RankConfig::default(),
            stat_max: HashMap::new(),
            logging: LoggingConfig::default(),
            history_file: None,
            profiles: Vec::new(),
        }
    }
}

impl EvalConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EvalConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance_factor >= 1.0 && self.tolerance_factor.is_finite()) {
            return Err(Error::Config(format!(
                "tolerance_factor must be a finite value >= 1.0, got {}",
                self.tolerance_factor
            )));
        }
        if !(self.main_stat_bonus >= 0.0 && self.main_stat_bonus.is_finite()) {
            return Err(Error::Config(format!(
                "main_stat_bonus must be a finite non-negative value, got {}",
                self.main_stat_bonus
            )));
        }
        if !(0.0..=1.0).contains(&self.effective_weight_threshold) {
            return Err(Error::Config(format!(
                "effective_weight_threshold must be within [0, 1], got {}",
                self.effective_weight_threshold
            )));
        }
        for (kind, max) in &self.stat_max {
            if !(*max > 0.0 && max.is_finite()) {
                return Err(Error::Config(format!(
                    "stat_max.{} must be positive, got {}",
                    kind.key(),
                    max
                )));
            }
        }
        Ok(())
    }

    /// Stat reference with configured overrides applied
    pub fn stat_reference(&self) -> StatReference {
        StatReference::with_overrides(&self.stat_max)
    }

    pub fn profile_registry(&self) -> ProfileRegistry {
        ProfileRegistry::new(self.profiles.iter().cloned())
    }
}

/// Rank threshold tables, with optional per-cost overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
    pub thresholds: RankThresholds,
    pub cost1: Option<RankThresholds>,
    pub cost3: Option<RankThresholds>,
    pub cost4: Option<RankThresholds>,
    pub achievement: AchievementRanks,
}

impl RankConfig {
    /// Table used for an echo of `cost`
    pub fn thresholds_for(&self, cost: Cost) -> &RankThresholds {
        let specific = match cost {
            Cost::One => self.cost1.as_ref(),
            Cost::Three => self.cost3.as_ref(),
            Cost::Four => self.cost4.as_ref(),
        };
        specific.unwrap_or(&self.thresholds)
    }

    /// Achievement table used for an echo of `cost`
    pub fn achievement_thresholds_for(&self, cost: Cost) -> &RankThresholds {
        match cost {
            Cost::One => &self.achievement.cost1,
            Cost::Three => &self.achievement.cost3,
            Cost::Four => &self.achievement.cost4,
        }
    }
}

/// Per-cost cutoffs on the achievement percentage
///
/// Cost 3 slots have the widest main stat pool and the lowest bar; cost 1
/// slots the highest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AchievementRanks {
    pub cost1: RankThresholds,
    pub cost3: RankThresholds,
    pub cost4: RankThresholds,
}

impl Default for AchievementRanks {
    fn default() -> Self {
        Self {
            cost1: RankThresholds::tiered(90.0, 75.0, 55.0, 35.0),
            cost3: RankThresholds::tiered(80.0, 65.0, 45.0, 25.0),
            cost4: RankThresholds::tiered(85.0, 70.0, 50.0, 30.0),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve which config file to read, if any
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config file, only when present
    default_config_path().filter(|path| path.exists())
}

/// Platform config location (`~/.config/echo-eval/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("echo-eval").join("config.toml"))
}

/// Platform history location (`~/.local/share/echo-eval/history.json` on Linux)
pub fn default_history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("echo-eval").join("history.json"))
}

/// Load configuration from `path`, falling back to defaults when absent
pub fn load_config(path: Option<&Path>) -> Result<EvalConfig> {
    let Some(path) = path else {
        info!("No config file found, using compiled defaults");
        return Ok(EvalConfig::default());
    };

    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using compiled defaults");
        return Ok(EvalConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = EvalConfig::from_toml_str(&content).map_err(|e| match e {
        Error::TomlParse(err) => Error::Config(format!("{}: {}", path.display(), err)),
        other => other,
    })?;

    info!(
        path = %path.display(),
        profiles = config.profiles.len(),
        retention = %config.retention_mode,
        "Loaded configuration"
    );
    Ok(config)
}
