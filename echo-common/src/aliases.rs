//! Free-text label to stat kind resolution
//!
//! Labels come from OCR output or manual entry in Japanese or English.
//! Matching is exact first (case-insensitive), then falls back to the
//! longest alias contained in the label so that "クリティカルダメージ"
//! never resolves to the shorter "クリティカル".

use crate::stats::StatKind;
use std::collections::HashSet;

/// Read-only alias table
#[derive(Debug, Clone)]
pub struct AliasResolver {
    /// (lowercased alias, kind), longest aliases first
    entries: Vec<(String, StatKind)>,
}

impl AliasResolver {
    /// Build from explicit (alias, kind) pairs
    ///
    /// Every kind's display name and key are added automatically so that
    /// canonical labels always resolve.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, StatKind)>,
        S: AsRef<str>,
    {
        let mut entries: Vec<(String, StatKind)> = pairs
            .into_iter()
            .map(|(alias, kind)| (normalize_label(alias.as_ref()), kind))
            .collect();

        for kind in StatKind::all_variants() {
            entries.push((normalize_label(kind.display_name()), *kind));
            entries.push((normalize_label(kind.key()), *kind));
        }

        entries.retain(|(alias, _)| !alias.is_empty());
        // Stable sort keeps insertion order among equal lengths
        entries.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
        let mut seen = HashSet::new();
        entries.retain(|(alias, _)| seen.insert(alias.clone()));

        Self { entries }
    }

    /// Add one alias (builder style)
    pub fn with_alias(self, alias: &str, kind: StatKind) -> Self {
        let mut pairs: Vec<(String, StatKind)> = self.entries;
        pairs.insert(0, (alias.to_string(), kind));
        Self::from_pairs(pairs)
    }

    /// Resolve a label to a stat kind
    pub fn resolve(&self, label: &str) -> Option<StatKind> {
        let wanted = normalize_label(label);
        if wanted.is_empty() {
            return None;
        }

        if let Some((_, kind)) = self.entries.iter().find(|(alias, _)| *alias == wanted) {
            return Some(*kind);
        }

        // Entries are longest-first, so the first contained alias is the longest
        self.entries
            .iter()
            .find(|(alias, _)| wanted.contains(alias.as_str()))
            .map(|(_, kind)| *kind)
    }

    /// All aliases registered for `kind`
    pub fn aliases_for(&self, kind: StatKind) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, k)| *k == kind)
            .map(|(alias, _)| alias.as_str())
            .collect()
    }
}

impl Default for AliasResolver {
    fn default() -> Self {
        use StatKind::*;

        Self::from_pairs([
            ("クリティカル率", CritRate),
            ("クリ率", CritRate),
            ("クリティカル", CritRate),
            ("会心率", CritRate),
            ("暴击", CritRate),
            ("Crit Rate", CritRate),
            ("クリティカルダメージ", CritDamage),
            ("クリダメ", CritDamage),
            ("クリダメージ", CritDamage),
            ("会心ダメージ", CritDamage),
            ("暴击伤害", CritDamage),
            ("Crit DMG", CritDamage),
            ("攻撃力%", AttackPercent),
            ("攻撃力(%)", AttackPercent),
            ("攻撃%", AttackPercent),
            ("ATK (%)", AttackPercent),
            ("攻撃力", AttackFlat),
            ("こうげき", AttackFlat),
            ("HP(%)", HpPercent),
            ("HP (%)", HpPercent),
            ("体力%", HpPercent),
            ("体力", HpFlat),
            ("防御力%", DefensePercent),
            ("防御%", DefensePercent),
            ("DEF (%)", DefensePercent),
            ("防御力", DefenseFlat),
            ("共鳴効率", EnergyRegen),
            ("効率", EnergyRegen),
            ("エネルギー効率", EnergyRegen),
            ("Resonance Efficiency", EnergyRegen),
            ("通常攻撃ダメージアップ", BasicAttackDmg),
            ("通常攻撃up", BasicAttackDmg),
            ("通常攻撃ダメージ", BasicAttackDmg),
            ("通常ダメージ", BasicAttackDmg),
            ("重撃ダメージアップ", HeavyAttackDmg),
            ("重撃up", HeavyAttackDmg),
            ("重撃ダメージ", HeavyAttackDmg),
            ("共鳴スキルダメージアップ", SkillDmg),
            ("共鳴スキルup", SkillDmg),
            ("スキルダメージ", SkillDmg),
            ("共鳴解放ダメージアップ", LiberationDmg),
            ("共鳴解放up", LiberationDmg),
            ("解放ダメージ", LiberationDmg),
            ("焦熱ダメージアップ", FusionDmg),
            ("凝縮ダメージアップ", GlacioDmg),
            ("電導ダメージアップ", ElectroDmg),
            ("気動ダメージアップ", AeroDmg),
            ("回折ダメージアップ", SpectroDmg),
            ("消滅ダメージアップ", HavocDmg),
            ("HP回復効果アップ", HealingBonus),
        ])
    }
}

/// Lowercase, trim, and fold full-width percent/parentheses to ASCII
fn normalize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| match c {
            '％' => '%',
            '（' => '(',
            '）' => ')',
            '．' => '.',
            '\u{3000}' => ' ',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}
