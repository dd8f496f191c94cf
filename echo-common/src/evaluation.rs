//! Evaluation output types and rank threshold tables

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Achievement below which an echo is worth replacing
pub const CONTINUE_FARMING_BELOW: f64 = 30.0;

/// Scoring method whose value drives rank classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryMethod {
    #[default]
    Normalized,
    Ratio,
    RollQuality,
    EffectiveCount,
    Cv,
}

/// Discrete quality rank, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RankTag {
    SSS,
    SS,
    S,
    A,
    B,
    C,
}

impl RankTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankTag::SSS => "SSS",
            RankTag::SS => "SS",
            RankTag::S => "S",
            RankTag::A => "A",
            RankTag::B => "B",
            RankTag::C => "C",
        }
    }
}

impl FromStr for RankTag {
    type Err = String;

    /// Case-insensitive ("sss", "SS", ...)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SSS" => Ok(RankTag::SSS),
            "SS" => Ok(RankTag::SS),
            "S" => Ok(RankTag::S),
            "A" => Ok(RankTag::A),
            "B" => Ok(RankTag::B),
            "C" => Ok(RankTag::C),
            other => Err(format!("unknown rank tag '{}'", other)),
        }
    }
}

impl fmt::Display for RankTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum score required for a rank
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankThreshold {
    pub min_score: f64,
    pub tag: RankTag,
}

/// Non-empty threshold table sorted by strictly descending `min_score`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RankThreshold>", into = "Vec<RankThreshold>")]
pub struct RankThresholds {
    thresholds: Vec<RankThreshold>,
}

impl RankThresholds {
    /// Validate a caller-supplied table
    pub fn new(thresholds: Vec<RankThreshold>) -> Result<Self, ConfigError> {
        if thresholds.is_empty() {
            return Err(ConfigError::InvalidThresholds(
                "threshold table is empty".to_string(),
            ));
        }
        if let Some(bad) = thresholds.iter().find(|t| !t.min_score.is_finite()) {
            return Err(ConfigError::InvalidThresholds(format!(
                "non-finite minimum for {}",
                bad.tag
            )));
        }
        for pair in thresholds.windows(2) {
            if pair[0].min_score <= pair[1].min_score {
                return Err(ConfigError::InvalidThresholds(format!(
                    "{} ({}) must be above {} ({})",
                    pair[0].tag, pair[0].min_score, pair[1].tag, pair[1].min_score
                )));
            }
        }
        Ok(Self { thresholds })
    }

    /// Thresholds from highest to lowest
    pub fn iter(&self) -> impl Iterator<Item = &RankThreshold> {
        self.thresholds.iter()
    }

    /// Tag returned for scores below every threshold
    pub fn lowest_tag(&self) -> RankTag {
        // Non-empty by construction
        self.thresholds
            .last()
            .map(|t| t.tag)
            .unwrap_or(RankTag::C)
    }
}

impl TryFrom<Vec<RankThreshold>> for RankThresholds {
    type Error = ConfigError;

    fn try_from(value: Vec<RankThreshold>) -> Result<Self, Self::Error> {
        RankThresholds::new(value)
    }
}

impl From<RankThresholds> for Vec<RankThreshold> {
    fn from(value: RankThresholds) -> Self {
        value.thresholds
    }
}

impl RankThresholds {
    /// SSS/SS/S/A cutoffs over the shared B (15) and C (0) floor
    pub(crate) fn tiered(sss: f64, ss: f64, s: f64, a: f64) -> Self {
        Self {
            thresholds: vec![
                RankThreshold { min_score: sss, tag: RankTag::SSS },
                RankThreshold { min_score: ss, tag: RankTag::SS },
                RankThreshold { min_score: s, tag: RankTag::S },
                RankThreshold { min_score: a, tag: RankTag::A },
                RankThreshold { min_score: 15.0, tag: RankTag::B },
                RankThreshold { min_score: 0.0, tag: RankTag::C },
            ],
        }
    }
}

impl Default for RankThresholds {
    /// Default cutoffs on the normalized score scale
    fn default() -> Self {
        Self::tiered(85.0, 70.0, 50.0, 30.0)
    }
}

/// How well the main stat matches what the profile wants on this cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MainStatFit {
    /// Recommended, or nothing to compare against
    #[default]
    Match,
    /// ATK% on a cost 3 slot that wants elemental DMG
    Acceptable,
    Mismatch,
}

impl MainStatFit {
    /// Multiplier applied to achievement
    pub fn penalty(&self) -> f64 {
        match self {
            MainStatFit::Match => 1.0,
            MainStatFit::Acceptable => 0.97,
            MainStatFit::Mismatch => 0.8,
        }
    }
}

/// Keep the echo or keep farming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Use,
    Continue,
}

impl Recommendation {
    pub fn from_achievement(achievement: f64) -> Self {
        if achievement < CONTINUE_FARMING_BELOW {
            Recommendation::Continue
        } else {
            Recommendation::Use
        }
    }
}

/// Scores of one echo under all five methods plus its rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Main stat bonus plus per-substat contributions (ceiling 115)
    pub normalized: f64,
    /// Weighted sum of roll fractions, unclamped
    pub ratio: f64,
    /// Sum of per-substat roll fractions, capped at 5
    pub roll_quality: f64,
    /// Substats whose weight reaches the effective threshold
    pub effective_count: u32,
    /// Crit value: CritRate * 2 + CritDamage
    pub cv: f64,
    /// Normalized score as a percentage of the profile's best attainable
    /// score, after the main stat penalty
    pub achievement: f64,
    pub primary_method: PrimaryMethod,
    pub primary_score: f64,
    pub rank: RankTag,
    #[serde(default)]
    pub main_stat_fit: MainStatFit,
    /// Why the main stat was penalized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency_advice: Option<String>,
    pub recommendation: Recommendation,
    /// Achievement classified against the cost's achievement table
    pub achievement_rank: RankTag,
}

impl EvaluationResult {
    /// Score under a specific method
    pub fn score(&self, method: PrimaryMethod) -> f64 {
        match method {
            PrimaryMethod::Normalized => self.normalized,
            PrimaryMethod::Ratio => self.ratio,
            PrimaryMethod::RollQuality => self.roll_quality,
            PrimaryMethod::EffectiveCount => f64::from(self.effective_count),
            PrimaryMethod::Cv => self.cv,
        }
    }
}
