//! Stat kinds and the stat reference table
//!
//! Every stat an echo can carry is a [`StatKind`]. Each kind has a fixed
//! unit (percentage or flat). The [`StatReference`] maps substat kinds to
//! their maximum single-roll value; scoring and validation both read it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Unit a stat value is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatUnit {
    /// Value is a percentage (3.2 means 3.2%)
    Percent,
    /// Value is an absolute amount
    Flat,
}

/// Base stat a character's damage scales from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalingStat {
    #[default]
    Atk,
    Hp,
    Def,
}

/// Stat identifiers
///
/// The first thirteen variants can roll as substats. The remaining kinds
/// only ever appear in the main stat slot and have no substat maximum.
/// Serialized as the snake_case [`key`](StatKind::key), which also works as
/// a TOML/JSON map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    CritRate,
    CritDamage,
    AttackPercent,
    AttackFlat,
    HpPercent,
    HpFlat,
    DefensePercent,
    DefenseFlat,
    EnergyRegen,
    BasicAttackDmg,
    HeavyAttackDmg,
    SkillDmg,
    LiberationDmg,
    FusionDmg,
    GlacioDmg,
    ElectroDmg,
    AeroDmg,
    SpectroDmg,
    HavocDmg,
    HealingBonus,
}

impl StatKind {
    /// Unit this kind is always expressed in
    pub fn unit(&self) -> StatUnit {
        match self {
            StatKind::AttackFlat | StatKind::HpFlat | StatKind::DefenseFlat => StatUnit::Flat,
            _ => StatUnit::Percent,
        }
    }

    /// The other member of a percentage/flat pair, if this kind has one
    ///
    /// Only ATK, HP and DEF exist in both variants.
    pub fn counterpart(&self) -> Option<StatKind> {
        match self {
            StatKind::AttackPercent => Some(StatKind::AttackFlat),
            StatKind::AttackFlat => Some(StatKind::AttackPercent),
            StatKind::HpPercent => Some(StatKind::HpFlat),
            StatKind::HpFlat => Some(StatKind::HpPercent),
            StatKind::DefensePercent => Some(StatKind::DefenseFlat),
            StatKind::DefenseFlat => Some(StatKind::DefensePercent),
            _ => None,
        }
    }

    /// Same family in the requested unit (identity for kinds without a pair)
    pub fn with_unit(self, unit: StatUnit) -> StatKind {
        match self.counterpart() {
            Some(other) if self.unit() != unit => other,
            _ => self,
        }
    }

    /// Base stat family (ATK/HP/DEF) this kind belongs to, if any
    pub fn scaling_family(&self) -> Option<ScalingStat> {
        match self {
            StatKind::AttackPercent | StatKind::AttackFlat => Some(ScalingStat::Atk),
            StatKind::HpPercent | StatKind::HpFlat => Some(ScalingStat::Hp),
            StatKind::DefensePercent | StatKind::DefenseFlat => Some(ScalingStat::Def),
            _ => None,
        }
    }

    pub fn is_elemental_dmg(&self) -> bool {
        matches!(
            self,
            StatKind::FusionDmg
                | StatKind::GlacioDmg
                | StatKind::ElectroDmg
                | StatKind::AeroDmg
                | StatKind::SpectroDmg
                | StatKind::HavocDmg
        )
    }

    /// Canonical snake_case key used in configuration and history files
    pub fn key(&self) -> &'static str {
        match self {
            StatKind::CritRate => "crit_rate",
            StatKind::CritDamage => "crit_damage",
            StatKind::AttackPercent => "attack_percent",
            StatKind::AttackFlat => "attack_flat",
            StatKind::HpPercent => "hp_percent",
            StatKind::HpFlat => "hp_flat",
            StatKind::DefensePercent => "defense_percent",
            StatKind::DefenseFlat => "defense_flat",
            StatKind::EnergyRegen => "energy_regen",
            StatKind::BasicAttackDmg => "basic_attack_dmg",
            StatKind::HeavyAttackDmg => "heavy_attack_dmg",
            StatKind::SkillDmg => "skill_dmg",
            StatKind::LiberationDmg => "liberation_dmg",
            StatKind::FusionDmg => "fusion_dmg",
            StatKind::GlacioDmg => "glacio_dmg",
            StatKind::ElectroDmg => "electro_dmg",
            StatKind::AeroDmg => "aero_dmg",
            StatKind::SpectroDmg => "spectro_dmg",
            StatKind::HavocDmg => "havoc_dmg",
            StatKind::HealingBonus => "healing_bonus",
        }
    }

    /// Human-readable (in-game English) name
    pub fn display_name(&self) -> &'static str {
        match self {
            StatKind::CritRate => "Crit. Rate",
            StatKind::CritDamage => "Crit. DMG",
            StatKind::AttackPercent => "ATK%",
            StatKind::AttackFlat => "ATK",
            StatKind::HpPercent => "HP%",
            StatKind::HpFlat => "HP",
            StatKind::DefensePercent => "DEF%",
            StatKind::DefenseFlat => "DEF",
            StatKind::EnergyRegen => "Energy Regen",
            StatKind::BasicAttackDmg => "Basic Attack DMG Bonus",
            StatKind::HeavyAttackDmg => "Heavy Attack DMG Bonus",
            StatKind::SkillDmg => "Resonance Skill DMG Bonus",
            StatKind::LiberationDmg => "Resonance Liberation DMG Bonus",
            StatKind::FusionDmg => "Fusion DMG Bonus",
            StatKind::GlacioDmg => "Glacio DMG Bonus",
            StatKind::ElectroDmg => "Electro DMG Bonus",
            StatKind::AeroDmg => "Aero DMG Bonus",
            StatKind::SpectroDmg => "Spectro DMG Bonus",
            StatKind::HavocDmg => "Havoc DMG Bonus",
            StatKind::HealingBonus => "Healing Bonus",
        }
    }

    /// Kinds that can roll as substats
    pub fn substat_variants() -> &'static [StatKind] {
        &[
            StatKind::CritRate,
            StatKind::CritDamage,
            StatKind::AttackPercent,
            StatKind::AttackFlat,
            StatKind::HpPercent,
            StatKind::HpFlat,
            StatKind::DefensePercent,
            StatKind::DefenseFlat,
            StatKind::EnergyRegen,
            StatKind::BasicAttackDmg,
            StatKind::HeavyAttackDmg,
            StatKind::SkillDmg,
            StatKind::LiberationDmg,
        ]
    }

    /// Every stat kind
    pub fn all_variants() -> &'static [StatKind] {
        &[
            StatKind::CritRate,
            StatKind::CritDamage,
            StatKind::AttackPercent,
            StatKind::AttackFlat,
            StatKind::HpPercent,
            StatKind::HpFlat,
            StatKind::DefensePercent,
            StatKind::DefenseFlat,
            StatKind::EnergyRegen,
            StatKind::BasicAttackDmg,
            StatKind::HeavyAttackDmg,
            StatKind::SkillDmg,
            StatKind::LiberationDmg,
            StatKind::FusionDmg,
            StatKind::GlacioDmg,
            StatKind::ElectroDmg,
            StatKind::AeroDmg,
            StatKind::SpectroDmg,
            StatKind::HavocDmg,
            StatKind::HealingBonus,
        ]
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Maximum single-roll value per substat kind
///
/// Read-only once built. Kinds without an entry cannot be validated or scored.
#[derive(Debug, Clone, PartialEq)]
pub struct StatReference {
    maxima: HashMap<StatKind, f64>,
}

impl StatReference {
    /// Empty reference (every lookup misses)
    pub fn empty() -> Self {
        Self {
            maxima: HashMap::new(),
        }
    }

    /// Builder-style override of one maximum
    pub fn with_max(mut self, kind: StatKind, max: f64) -> Self {
        self.maxima.insert(kind, max);
        self
    }

    /// Default table with configured overrides applied on top
    pub fn with_overrides(overrides: &HashMap<StatKind, f64>) -> Self {
        let mut reference = Self::default();
        for (kind, max) in overrides {
            reference.maxima.insert(*kind, *max);
        }
        reference
    }

    /// Maximum single-roll value for `kind`
    pub fn max(&self, kind: StatKind) -> Option<f64> {
        self.maxima.get(&kind).copied()
    }

    /// Unit `kind` is expressed in
    pub fn unit(&self, kind: StatKind) -> StatUnit {
        kind.unit()
    }

    pub fn contains(&self, kind: StatKind) -> bool {
        self.maxima.contains_key(&kind)
    }
}

impl Default for StatReference {
    fn default() -> Self {
        let maxima = [
            (StatKind::CritRate, 10.5),
            (StatKind::CritDamage, 21.0),
            (StatKind::AttackPercent, 11.6),
            (StatKind::AttackFlat, 60.0),
            (StatKind::HpPercent, 11.6),
            (StatKind::HpFlat, 580.0),
            (StatKind::DefensePercent, 11.6),
            (StatKind::DefenseFlat, 60.0),
            (StatKind::EnergyRegen, 12.4),
            (StatKind::BasicAttackDmg, 11.6),
            (StatKind::HeavyAttackDmg, 11.6),
            (StatKind::SkillDmg, 11.6),
            (StatKind::LiberationDmg, 11.6),
        ]
        .into_iter()
        .collect();

        Self { maxima }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_name_matches_key() {
        for kind in StatKind::all_variants() {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.key()));
            let back: StatKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, *kind);
        }
        assert!(serde_json::from_str::<StatKind>("\"crit\"").is_err());
    }

    #[test]
    fn test_counterparts_are_symmetric() {
        for kind in StatKind::all_variants() {
            if let Some(other) = kind.counterpart() {
                assert_eq!(other.counterpart(), Some(*kind));
                assert_ne!(other.unit(), kind.unit());
            }
        }
    }

    #[test]
    fn test_with_unit() {
        assert_eq!(StatKind::AttackFlat.with_unit(StatUnit::Percent), StatKind::AttackPercent);
        assert_eq!(StatKind::HpPercent.with_unit(StatUnit::Flat), StatKind::HpFlat);
        assert_eq!(StatKind::CritRate.with_unit(StatUnit::Flat), StatKind::CritRate);
    }

    #[test]
    fn test_default_reference_covers_substats_only() {
        let reference = StatReference::default();
        for kind in StatKind::substat_variants() {
            assert!(reference.contains(*kind), "{:?} missing", kind);
        }
        assert_eq!(reference.max(StatKind::FusionDmg), None);
        assert_eq!(reference.max(StatKind::CritRate), Some(10.5));
        assert_eq!(reference.max(StatKind::CritDamage), Some(21.0));
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let mut overrides = HashMap::new();
        overrides.insert(StatKind::DefenseFlat, 70.0);
        let reference = StatReference::with_overrides(&overrides);
        assert_eq!(reference.max(StatKind::DefenseFlat), Some(70.0));
        assert_eq!(reference.max(StatKind::HpFlat), Some(580.0));
    }

    #[test]
    fn test_serde_uses_key() {
        let json = serde_json::to_string(&StatKind::EnergyRegen).unwrap();
        assert_eq!(json, "\"energy_regen\"");
        let map: HashMap<StatKind, f64> = serde_json::from_str(r#"{"crit_rate": 1.0}"#).unwrap();
        assert_eq!(map.get(&StatKind::CritRate), Some(&1.0));
    }
}
