//! Echo records and character weight profiles

use crate::error::ValidationError;
use crate::stats::{ScalingStat, StatKind, StatUnit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Maximum number of substats on one echo
pub const MAX_SUBSTATS: usize = 5;

/// Echo cost tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Cost {
    One,
    Three,
    Four,
}

impl Cost {
    pub fn as_u8(&self) -> u8 {
        match self {
            Cost::One => 1,
            Cost::Three => 3,
            Cost::Four => 4,
        }
    }

    /// Main stats an echo of this cost can carry
    pub fn main_stat_candidates(&self) -> &'static [StatKind] {
        match self {
            Cost::One => &[StatKind::AttackPercent, StatKind::HpPercent, StatKind::DefensePercent],
            Cost::Three => &[
                StatKind::AttackPercent,
                StatKind::HpPercent,
                StatKind::DefensePercent,
                StatKind::EnergyRegen,
                StatKind::FusionDmg,
                StatKind::GlacioDmg,
                StatKind::ElectroDmg,
                StatKind::AeroDmg,
                StatKind::SpectroDmg,
                StatKind::HavocDmg,
            ],
            Cost::Four => &[
                StatKind::AttackPercent,
                StatKind::HpPercent,
                StatKind::DefensePercent,
                StatKind::CritRate,
                StatKind::CritDamage,
                StatKind::HealingBonus,
            ],
        }
    }

    pub fn all_variants() -> &'static [Cost] {
        &[Cost::One, Cost::Three, Cost::Four]
    }
}

impl TryFrom<u8> for Cost {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Cost::One),
            3 => Ok(Cost::Three),
            4 => Ok(Cost::Four),
            other => Err(ValidationError::InvalidCost(other.to_string())),
        }
    }
}

impl From<Cost> for u8 {
    fn from(cost: Cost) -> u8 {
        cost.as_u8()
    }
}

impl FromStr for Cost {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .parse::<u8>()
            .map_err(|_| ValidationError::InvalidCost(trimmed.to_string()))
            .and_then(Cost::try_from)
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// One canonical substat roll
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubStat {
    pub kind: StatKind,
    /// Non-negative value in the kind's unit
    pub value: f64,
}

impl SubStat {
    pub fn new(kind: StatKind, value: f64) -> Self {
        Self { kind, value }
    }

    /// Re-serialize to raw (label, number) text
    ///
    /// Percentage kinds always carry an explicit `%` glyph so that
    /// normalizing the output yields this substat again.
    pub fn to_raw(&self) -> (String, String) {
        let number = match self.kind.unit() {
            StatUnit::Percent => format!("{}%", self.value),
            StatUnit::Flat => format!("{}", self.value),
        };
        (self.kind.display_name().to_string(), number)
    }
}

/// A fully specified echo, immutable once constructed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoRecord {
    character_id: String,
    cost: Cost,
    main_stat: Option<StatKind>,
    sub_stats: Vec<SubStat>,
    source_timestamp: DateTime<Utc>,
}

impl EchoRecord {
    /// Build a record, rejecting duplicate substat kinds and more than five substats
    pub fn new(
        character_id: impl Into<String>,
        cost: Cost,
        main_stat: Option<StatKind>,
        sub_stats: Vec<SubStat>,
        source_timestamp: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if sub_stats.len() > MAX_SUBSTATS {
            return Err(ValidationError::TooManySubstats(sub_stats.len()));
        }

        let mut seen = HashSet::new();
        for sub in &sub_stats {
            if !seen.insert(sub.kind) {
                return Err(ValidationError::DuplicateStat(sub.kind));
            }
        }

        Ok(Self {
            character_id: character_id.into(),
            cost,
            main_stat,
            sub_stats,
            source_timestamp,
        })
    }

    pub fn character_id(&self) -> &str {
        &self.character_id
    }

    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn main_stat(&self) -> Option<StatKind> {
        self.main_stat
    }

    pub fn sub_stats(&self) -> &[SubStat] {
        &self.sub_stats
    }

    pub fn source_timestamp(&self) -> DateTime<Utc> {
        self.source_timestamp
    }

    /// Value of the substat of `kind`, if present
    pub fn value_of(&self, kind: StatKind) -> Option<f64> {
        self.sub_stats
            .iter()
            .find(|sub| sub.kind == kind)
            .map(|sub| sub.value)
    }
}

/// Per-character stat weighting, owned by the character preset collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightProfile {
    pub character_id: String,

    /// Stat importance in [0, 1]; absent kinds weigh 0
    #[serde(default)]
    pub weights: HashMap<StatKind, f64>,

    #[serde(default)]
    pub scaling_stat: ScalingStat,

    #[serde(default)]
    pub recommended_main_stats: HashSet<StatKind>,

    /// Explicit damage weights for the ratio method, overriding the derived ones
    #[serde(default)]
    pub damage_weights: HashMap<StatKind, f64>,
}

impl WeightProfile {
    pub fn new(character_id: impl Into<String>, scaling_stat: ScalingStat) -> Self {
        Self {
            character_id: character_id.into(),
            weights: HashMap::new(),
            scaling_stat,
            recommended_main_stats: HashSet::new(),
            damage_weights: HashMap::new(),
        }
    }

    /// Builder-style weight assignment
    pub fn with_weight(mut self, kind: StatKind, weight: f64) -> Self {
        self.weights.insert(kind, weight);
        self
    }

    /// Builder-style recommended main stat
    pub fn with_main_stat(mut self, kind: StatKind) -> Self {
        self.recommended_main_stats.insert(kind);
        self
    }

    /// Importance of `kind`, clamped to [0, 1]
    pub fn weight(&self, kind: StatKind) -> f64 {
        self.weights
            .get(&kind)
            .copied()
            .unwrap_or(0.0)
            .clamp(0.0, 1.0)
    }

    /// Damage contribution weight of `kind` for a character scaling off `scaling`
    ///
    /// An explicit `damage_weights` entry wins. Otherwise ATK/HP/DEF stats of
    /// a family other than `scaling` contribute nothing and every other kind
    /// uses its ordinary weight.
    pub fn damage_weight(&self, kind: StatKind, scaling: ScalingStat) -> f64 {
        if let Some(explicit) = self.damage_weights.get(&kind) {
            return *explicit;
        }
        match kind.scaling_family() {
            Some(family) if family != scaling => 0.0,
            _ => self.weight(kind),
        }
    }

    pub fn recommends(&self, main_stat: Option<StatKind>) -> bool {
        main_stat.is_some_and(|kind| self.recommended_main_stats.contains(&kind))
    }
}

/// Loaded weight profiles keyed by character id
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, WeightProfile>,
}

impl ProfileRegistry {
    pub fn new(profiles: impl IntoIterator<Item = WeightProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|profile| (profile.character_id.clone(), profile))
                .collect(),
        }
    }

    pub fn get(&self, character_id: &str) -> Option<&WeightProfile> {
        self.profiles.get(character_id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
