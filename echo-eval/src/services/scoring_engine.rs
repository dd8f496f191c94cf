//! Multi-method echo scoring
//!
//! Five independent scores are computed from the same inputs:
//!
//! | Method          | Formula                                                      |
//! |-----------------|--------------------------------------------------------------|
//! | Normalized      | main bonus + Σ min(20, value / max × weight × 20)            |
//! | Ratio           | Σ value / max × damage weight                                |
//! | Roll quality    | min(5, Σ min(1, value / max))                                |
//! | Effective count | #substats with weight ≥ threshold (inclusive, ε = 1e-9)      |
//! | Crit value      | CritRate × 2 + CritDamage                                    |
//!
//! The primary method's score is then ranked against the cost's threshold
//! table. Achievement is the normalized score as a percentage of the best
//! score the profile could reach, scaled down when the main stat is not
//! one the profile recommends for the echo's cost.

use super::rank_classifier::classify;
use echo_common::{
    ConfigError, Cost, EchoRecord, EvalConfig, EvaluationResult, MainStatFit, PrimaryMethod,
    RankConfig, Recommendation, StatKind, StatReference, WeightProfile, MAX_SUBSTATS,
};

/// Tolerance applied to weight threshold comparisons
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// Ceiling of one substat's normalized contribution
pub const MAX_CONTRIBUTION: f64 = 20.0;

/// Ceiling of the summed roll quality
pub const MAX_ROLL_QUALITY: f64 = 5.0;

/// Tunable scoring parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringSettings {
    pub main_stat_bonus: f64,
    pub effective_weight_threshold: f64,
    pub primary_method: PrimaryMethod,
    pub rank: RankConfig,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            main_stat_bonus: 15.0,
            effective_weight_threshold: 0.5,
            primary_method: PrimaryMethod::Normalized,
            rank: RankConfig::default(),
        }
    }
}

impl From<&EvalConfig> for ScoringSettings {
    fn from(config: &EvalConfig) -> Self {
        Self {
            main_stat_bonus: config.main_stat_bonus,
            effective_weight_threshold: config.effective_weight_threshold,
            primary_method: config.primary_method,
            rank: config.rank.clone(),
        }
    }
}

/// Scoring engine
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    settings: ScoringSettings,
}

impl ScoringEngine {
    pub fn new(settings: ScoringSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ScoringSettings {
        &self.settings
    }

    /// Score one echo
    ///
    /// Fails when a present substat has no reference maximum or when no
    /// profile was found for the echo's character.
    pub fn evaluate(
        &self,
        echo: &EchoRecord,
        profile: Option<&WeightProfile>,
        reference: &StatReference,
    ) -> Result<EvaluationResult, ConfigError> {
        // Roll fraction of every substat, resolved once
        let rolls = echo
            .sub_stats()
            .iter()
            .map(|sub| {
                reference
                    .max(sub.kind)
                    .filter(|max| *max > 0.0)
                    .map(|max| (sub.kind, sub.value / max))
                    .ok_or(ConfigError::MissingStatMax(sub.kind))
            })
            .collect::<Result<Vec<(StatKind, f64)>, ConfigError>>()?;

        let profile =
            profile.ok_or_else(|| ConfigError::MissingProfile(echo.character_id().to_string()))?;

        let main_bonus = if profile.recommends(echo.main_stat()) {
            self.settings.main_stat_bonus
        } else {
            0.0
        };

        let normalized = main_bonus
            + rolls
                .iter()
                .map(|(kind, fraction)| {
                    (fraction * profile.weight(*kind) * MAX_CONTRIBUTION).min(MAX_CONTRIBUTION)
                })
                .sum::<f64>();

        let ratio = rolls
            .iter()
            .map(|(kind, fraction)| fraction * profile.damage_weight(*kind, profile.scaling_stat))
            .sum::<f64>();

        let roll_quality = rolls
            .iter()
            .map(|(_, fraction)| fraction.min(1.0))
            .sum::<f64>()
            .min(MAX_ROLL_QUALITY);

        let threshold = self.settings.effective_weight_threshold - WEIGHT_EPSILON;
        let effective_count = rolls
            .iter()
            .filter(|(kind, _)| profile.weight(*kind) >= threshold)
            .count() as u32;

        let cv = crit_value(echo);

        let (fit, consistency_advice) = main_stat_fit(echo, profile);

        let best = self.theoretical_max(profile);
        let achievement = if best > 0.0 {
            normalized / best * 100.0 * fit.penalty()
        } else {
            0.0
        };

        let lowest = self.settings.rank.thresholds_for(echo.cost()).lowest_tag();
        let mut result = EvaluationResult {
            normalized,
            ratio,
            roll_quality,
            effective_count,
            cv,
            achievement,
            primary_method: self.settings.primary_method,
            primary_score: 0.0,
            rank: lowest,
            main_stat_fit: fit,
            consistency_advice,
            recommendation: Recommendation::from_achievement(achievement),
            achievement_rank: classify(
                achievement,
                self.settings.rank.achievement_thresholds_for(echo.cost()),
            ),
        };
        result.primary_score = result.score(self.settings.primary_method);
        result.rank = classify(
            result.primary_score,
            self.settings.rank.thresholds_for(echo.cost()),
        );

        tracing::debug!(
            character = %echo.character_id(),
            cost = %echo.cost(),
            normalized,
            ratio,
            roll_quality,
            effective_count,
            cv,
            achievement,
            fit = ?result.main_stat_fit,
            rank = %result.rank,
            "Evaluated echo"
        );

        Ok(result)
    }

    /// Best normalized score a profile can reach
    ///
    /// Main bonus (when the profile recommends any main stat) plus a full
    /// 20-point roll on each of its five highest-weighted substat kinds.
    pub fn theoretical_max(&self, profile: &WeightProfile) -> f64 {
        let mut weights: Vec<f64> = StatKind::substat_variants()
            .iter()
            .map(|kind| profile.weight(*kind))
            .filter(|weight| *weight > 0.0)
            .collect();
        weights.sort_by(|a, b| b.total_cmp(a));

        let substats: f64 = weights
            .iter()
            .take(MAX_SUBSTATS)
            .map(|weight| weight * MAX_CONTRIBUTION)
            .sum();

        let bonus = if profile.recommended_main_stats.is_empty() {
            0.0
        } else {
            self.settings.main_stat_bonus
        };

        bonus + substats
    }
}

/// Compare the main stat with the profile's picks for this cost
///
/// Only recommended stats the cost can actually roll are considered. With
/// none of those, or no main stat recorded, there is nothing to judge.
pub fn main_stat_fit(echo: &EchoRecord, profile: &WeightProfile) -> (MainStatFit, Option<String>) {
    let candidates = echo.cost().main_stat_candidates();
    let mut targets: Vec<StatKind> = profile
        .recommended_main_stats
        .iter()
        .copied()
        .filter(|kind| candidates.contains(kind))
        .collect();
    targets.sort();

    let Some(main) = echo.main_stat() else {
        return (MainStatFit::Match, None);
    };
    if targets.is_empty() || targets.contains(&main) {
        return (MainStatFit::Match, None);
    }

    if echo.cost() == Cost::Three
        && main == StatKind::AttackPercent
        && targets.iter().any(StatKind::is_elemental_dmg)
    {
        return (
            MainStatFit::Acceptable,
            Some("ATK% is the runner-up to elemental DMG on a cost 3 slot".to_string()),
        );
    }

    let ideal = targets
        .iter()
        .map(|kind| kind.display_name())
        .collect::<Vec<_>>()
        .join(" / ");
    (
        MainStatFit::Mismatch,
        Some(format!("Main stat does not match (ideal: {})", ideal)),
    )
}

/// CritRate × 2 + CritDamage, absent kinds counting as 0
pub fn crit_value(echo: &EchoRecord) -> f64 {
    let rate = echo.value_of(StatKind::CritRate).unwrap_or(0.0);
    let damage = echo.value_of(StatKind::CritDamage).unwrap_or(0.0);
    rate * 2.0 + damage
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_common::{RankTag, ScalingStat, SubStat};

    fn worked_example() -> (EchoRecord, WeightProfile) {
        let echo = EchoRecord::new(
            "camellya",
            Cost::Four,
            Some(StatKind::CritDamage),
            vec![
                SubStat::new(StatKind::AttackPercent, 5.0),
                SubStat::new(StatKind::CritRate, 3.2),
                SubStat::new(StatKind::CritDamage, 6.6),
                SubStat::new(StatKind::HpPercent, 4.0),
                SubStat::new(StatKind::EnergyRegen, 2.7),
            ],
            chrono::Utc::now(),
        )
        .unwrap();

        let profile = WeightProfile::new("camellya", ScalingStat::Atk)
            .with_weight(StatKind::CritRate, 1.0)
            .with_weight(StatKind::CritDamage, 1.0)
            .with_weight(StatKind::AttackPercent, 0.5)
            .with_weight(StatKind::HpPercent, 0.0)
            .with_weight(StatKind::EnergyRegen, 0.0)
            .with_main_stat(StatKind::CritDamage);

        (echo, profile)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_worked_example() {
        let (echo, profile) = worked_example();
        let engine = ScoringEngine::default();
        let result = engine
            .evaluate(&echo, Some(&profile), &StatReference::default())
            .unwrap();

        assert!(approx(result.cv, 13.0));
        assert_eq!(result.effective_count, 3);

        // 15 + (5/11.6 * 0.5 * 20) + (3.2/10.5 * 20) + (6.6/21 * 20)
        let expected = 15.0 + 5.0 / 11.6 * 10.0 + 3.2 / 10.5 * 20.0 + 6.6 / 21.0 * 20.0;
        assert!(approx(result.normalized, expected));
        assert!(approx(result.primary_score, result.normalized));
        assert_eq!(result.primary_method, PrimaryMethod::Normalized);
    }

    #[test]
    fn test_main_bonus_only_for_recommended_main_stat() {
        let (echo, mut profile) = worked_example();
        let engine = ScoringEngine::default();
        let with_bonus = engine
            .evaluate(&echo, Some(&profile), &StatReference::default())
            .unwrap();

        profile.recommended_main_stats.clear();
        let without_bonus = engine
            .evaluate(&echo, Some(&profile), &StatReference::default())
            .unwrap();

        assert!(approx(with_bonus.normalized - without_bonus.normalized, 15.0));
    }

    #[test]
    fn test_effective_count_boundary_is_inclusive() {
        let echo = EchoRecord::new(
            "x",
            Cost::One,
            None,
            vec![
                SubStat::new(StatKind::AttackPercent, 5.0),
                SubStat::new(StatKind::HpPercent, 5.0),
            ],
            chrono::Utc::now(),
        )
        .unwrap();
        let profile = WeightProfile::new("x", ScalingStat::Atk)
            .with_weight(StatKind::AttackPercent, 0.5)
            .with_weight(StatKind::HpPercent, 0.5 - 1e-6);

        let result = ScoringEngine::default()
            .evaluate(&echo, Some(&profile), &StatReference::default())
            .unwrap();
        assert_eq!(result.effective_count, 1);
    }

    #[test]
    fn test_weight_just_below_half_by_float_error_counts() {
        let echo = EchoRecord::new(
            "x",
            Cost::One,
            None,
            vec![SubStat::new(StatKind::AttackPercent, 5.0)],
            chrono::Utc::now(),
        )
        .unwrap();
        // 0.7 - 0.2 lands a hair below 0.5
        let weight = 0.7 - 0.2;
        assert!(weight < 0.5);
        let profile =
            WeightProfile::new("x", ScalingStat::Atk).with_weight(StatKind::AttackPercent, weight);

        let result = ScoringEngine::default()
            .evaluate(&echo, Some(&profile), &StatReference::default())
            .unwrap();
        assert_eq!(result.effective_count, 1);
    }

    #[test]
    fn test_contribution_capped_at_twenty() {
        // Within tolerance but above the reference maximum
        let echo = EchoRecord::new(
            "x",
            Cost::Four,
            None,
            vec![SubStat::new(StatKind::CritRate, 11.5)],
            chrono::Utc::now(),
        )
        .unwrap();
        let profile = WeightProfile::new("x", ScalingStat::Atk).with_weight(StatKind::CritRate, 1.0);

        let result = ScoringEngine::default()
            .evaluate(&echo, Some(&profile), &StatReference::default())
            .unwrap();
        assert!(approx(result.normalized, 20.0));
        assert!(approx(result.roll_quality, 1.0));
        assert!(result.ratio > 1.0);
    }

    #[test]
    fn test_roll_quality_sums_fractions() {
        let (echo, profile) = worked_example();
        let result = ScoringEngine::default()
            .evaluate(&echo, Some(&profile), &StatReference::default())
            .unwrap();

        let expected = 5.0 / 11.6 + 3.2 / 10.5 + 6.6 / 21.0 + 4.0 / 11.6 + 2.7 / 12.4;
        assert!(approx(result.roll_quality, expected));
    }

    #[test]
    fn test_ratio_uses_scaling_family() {
        let echo = EchoRecord::new(
            "x",
            Cost::Three,
            None,
            vec![
                SubStat::new(StatKind::HpPercent, 11.6),
                SubStat::new(StatKind::AttackPercent, 11.6),
            ],
            chrono::Utc::now(),
        )
        .unwrap();
        let profile = WeightProfile::new("x", ScalingStat::Hp)
            .with_weight(StatKind::HpPercent, 1.0)
            .with_weight(StatKind::AttackPercent, 1.0);

        let result = ScoringEngine::default()
            .evaluate(&echo, Some(&profile), &StatReference::default())
            .unwrap();
        assert!(approx(result.ratio, 1.0));
    }

    #[test]
    fn test_crit_value_with_missing_kinds() {
        let echo = EchoRecord::new(
            "x",
            Cost::Four,
            None,
            vec![SubStat::new(StatKind::CritDamage, 12.6)],
            chrono::Utc::now(),
        )
        .unwrap();
        assert!(approx(crit_value(&echo), 12.6));
    }

    #[test]
    fn test_empty_substats_score_main_bonus_only() {
        let echo = EchoRecord::new("x", Cost::Four, Some(StatKind::CritRate), vec![], chrono::Utc::now())
            .unwrap();
        let profile = WeightProfile::new("x", ScalingStat::Atk).with_main_stat(StatKind::CritRate);

        let result = ScoringEngine::default()
            .evaluate(&echo, Some(&profile), &StatReference::default())
            .unwrap();
        assert!(approx(result.normalized, 15.0));
        assert_eq!(result.effective_count, 0);
        assert!(approx(result.cv, 0.0));
        assert_eq!(result.rank, RankTag::B);
    }

    #[test]
    fn test_missing_stat_max() {
        let (echo, profile) = worked_example();
        let reference = StatReference::empty().with_max(StatKind::CritRate, 10.5);

        let err = ScoringEngine::default()
            .evaluate(&echo, Some(&profile), &reference)
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingStatMax(StatKind::AttackPercent));
    }

    #[test]
    fn test_missing_profile() {
        let (echo, _) = worked_example();
        let err = ScoringEngine::default()
            .evaluate(&echo, None, &StatReference::default())
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingProfile("camellya".to_string()));
    }

    #[test]
    fn test_primary_method_drives_rank() {
        let (echo, profile) = worked_example();
        let settings = ScoringSettings {
            primary_method: PrimaryMethod::Cv,
            ..ScoringSettings::default()
        };
        let result = ScoringEngine::new(settings)
            .evaluate(&echo, Some(&profile), &StatReference::default())
            .unwrap();

        assert!(approx(result.primary_score, 13.0));
        // 13.0 is below 15 on the default table
        assert_eq!(result.rank, RankTag::C);
    }

    #[test]
    fn test_theoretical_max_and_achievement() {
        let (echo, profile) = worked_example();
        let engine = ScoringEngine::default();

        // 15 + 20 * (1.0 + 1.0 + 0.5)
        assert!(approx(engine.theoretical_max(&profile), 65.0));

        let result = engine
            .evaluate(&echo, Some(&profile), &StatReference::default())
            .unwrap();
        assert!(approx(result.achievement, result.normalized / 65.0 * 100.0));
    }

    #[test]
    fn test_achievement_zero_without_weights() {
        let (echo, _) = worked_example();
        let profile = WeightProfile::new("camellya", ScalingStat::Atk);
        let result = ScoringEngine::default()
            .evaluate(&echo, Some(&profile), &StatReference::default())
            .unwrap();
        assert_eq!(result.achievement, 0.0);
        assert_eq!(result.normalized, 0.0);
    }

    fn cost3_echo(main: StatKind) -> EchoRecord {
        EchoRecord::new(
            "lingyang",
            Cost::Three,
            Some(main),
            vec![
                SubStat::new(StatKind::CritRate, 8.1),
                SubStat::new(StatKind::CritDamage, 16.2),
            ],
            chrono::Utc::now(),
        )
        .unwrap()
    }

    fn glacio_profile() -> WeightProfile {
        WeightProfile::new("lingyang", ScalingStat::Atk)
            .with_weight(StatKind::CritRate, 1.0)
            .with_weight(StatKind::CritDamage, 1.0)
            .with_weight(StatKind::AttackPercent, 0.5)
            .with_main_stat(StatKind::GlacioDmg)
    }

    fn unpenalized_achievement(engine: &ScoringEngine, result: &EvaluationResult) -> f64 {
        result.normalized / engine.theoretical_max(&glacio_profile()) * 100.0
    }

    #[test]
    fn test_recommended_main_stat_is_not_penalized() {
        let engine = ScoringEngine::default();
        let result = engine
            .evaluate(&cost3_echo(StatKind::GlacioDmg), Some(&glacio_profile()), &StatReference::default())
            .unwrap();

        assert_eq!(result.main_stat_fit, MainStatFit::Match);
        assert!(result.consistency_advice.is_none());
        assert!(approx(result.achievement, unpenalized_achievement(&engine, &result)));
    }

    #[test]
    fn test_mismatched_main_stat_penalty() {
        let engine = ScoringEngine::default();
        let result = engine
            .evaluate(&cost3_echo(StatKind::HealingBonus), Some(&glacio_profile()), &StatReference::default())
            .unwrap();

        assert_eq!(result.main_stat_fit, MainStatFit::Mismatch);
        assert!(approx(result.achievement, unpenalized_achievement(&engine, &result) * 0.8));
        let advice = result.consistency_advice.unwrap();
        assert!(advice.contains(StatKind::GlacioDmg.display_name()));
    }

    #[test]
    fn test_attack_percent_on_cost3_is_acceptable() {
        let engine = ScoringEngine::default();
        let result = engine
            .evaluate(&cost3_echo(StatKind::AttackPercent), Some(&glacio_profile()), &StatReference::default())
            .unwrap();

        assert_eq!(result.main_stat_fit, MainStatFit::Acceptable);
        assert!(approx(result.achievement, unpenalized_achievement(&engine, &result) * 0.97));
        assert!(result.consistency_advice.is_some());
    }

    #[test]
    fn test_attack_percent_on_cost1_is_a_mismatch() {
        let echo = EchoRecord::new("x", Cost::One, Some(StatKind::AttackPercent), vec![], chrono::Utc::now())
            .unwrap();
        let profile = WeightProfile::new("x", ScalingStat::Hp).with_main_stat(StatKind::HpPercent);
        assert_eq!(main_stat_fit(&echo, &profile).0, MainStatFit::Mismatch);
    }

    #[test]
    fn test_recommendations_for_other_costs_are_ignored() {
        // Crit DMG cannot roll on cost 3, so there is nothing to compare
        let (_, profile) = worked_example();
        let (fit, advice) = main_stat_fit(&cost3_echo(StatKind::HavocDmg), &profile);
        assert_eq!(fit, MainStatFit::Match);
        assert!(advice.is_none());
    }

    #[test]
    fn test_recommendation_and_achievement_rank() {
        let (echo, profile) = worked_example();
        let result = ScoringEngine::default()
            .evaluate(&echo, Some(&profile), &StatReference::default())
            .unwrap();

        // normalized ≈ 31.7 against a best of 65: about 48.8% achievement
        assert!(result.achievement > 45.0 && result.achievement < 50.0);
        assert_eq!(result.recommendation, Recommendation::Use);
        // Cost 4 needs 50 for S
        assert_eq!(result.achievement_rank, RankTag::A);

        let weak = EchoRecord::new(
            "camellya",
            Cost::Four,
            Some(StatKind::CritDamage),
            vec![],
            chrono::Utc::now(),
        )
        .unwrap();
        let empty = WeightProfile::new("camellya", ScalingStat::Atk)
            .with_weight(StatKind::CritRate, 1.0)
            .with_weight(StatKind::CritDamage, 1.0)
            .with_weight(StatKind::AttackPercent, 1.0)
            .with_weight(StatKind::EnergyRegen, 1.0)
            .with_weight(StatKind::SkillDmg, 1.0)
            .with_main_stat(StatKind::CritDamage);
        let result = ScoringEngine::default()
            .evaluate(&weak, Some(&empty), &StatReference::default())
            .unwrap();
        // 15 of 115
        assert!(result.achievement < 30.0);
        assert_eq!(result.recommendation, Recommendation::Continue);
        assert_eq!(result.achievement_rank, RankTag::C);
    }

    #[test]
    fn test_achievement_rank_depends_on_cost() {
        let engine = ScoringEngine::default();
        let result = engine
            .evaluate(&cost3_echo(StatKind::GlacioDmg), Some(&glacio_profile()), &StatReference::default())
            .unwrap();

        // (15 + 8.1/10.5*20 + 16.2/21*20) / 65 ≈ 70.5%
        assert!(result.achievement > 70.0 && result.achievement < 71.0);
        assert_eq!(result.achievement_rank, RankTag::SS);

        // Cost 1 asks for 75 before SS
        let ranks = &engine.settings().rank;
        assert_eq!(classify(result.achievement, ranks.achievement_thresholds_for(Cost::One)), RankTag::S);
    }
}
