//! Raw reading normalization
//!
//! Turns a raw `(label, number)` pair from OCR or manual entry into a
//! validated [`SubStat`]:
//! 1. Strip OCR noise from both texts (bullets, stray punctuation, full-width digits)
//! 2. Resolve the label to a [`StatKind`] through the alias table
//! 3. Parse the number
//! 4. Pick the percentage or flat variant for ATK/HP/DEF
//! 5. Range-check against the stat reference with a small tolerance
//!
//! Out-of-range values are rejected, never corrected. When dividing by ten
//! would bring the value back into range (a dropped decimal point), the
//! rejection carries that as a suggestion for the caller.

use echo_common::{
    AliasResolver, Cost, StatKind, StatReference, StatUnit, SubStat, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default multiplier on the reference maximum accepted during validation
pub const DEFAULT_TOLERANCE_FACTOR: f64 = 1.1;

/// Unmarked values below this that carry a fractional part read as percentages
pub const PERCENT_HEURISTIC_CEILING: f64 = 20.0;

/// One unprocessed `(label, number)` pair as read from the screen or typed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReading {
    pub label: String,
    pub number: String,
}

impl RawReading {
    pub fn new(label: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            number: number.into(),
        }
    }
}

/// Item-level context for one reading
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NormalizationContext {
    pub cost: Option<Cost>,
    pub main_stat_hint: Option<StatKind>,
}

/// Parsed number text
#[derive(Debug, Clone, Copy, PartialEq)]
struct NumberText {
    value: f64,
    has_percent: bool,
    has_fraction: bool,
}

/// Reading normalizer
///
/// Holds only read-only collaborators, so one instance can be shared
/// across threads.
#[derive(Debug, Clone)]
pub struct Normalizer {
    reference: Arc<StatReference>,
    aliases: Arc<AliasResolver>,
    tolerance_factor: f64,
}

impl Normalizer {
    pub fn new(reference: Arc<StatReference>, aliases: Arc<AliasResolver>) -> Self {
        Self {
            reference,
            aliases,
            tolerance_factor: DEFAULT_TOLERANCE_FACTOR,
        }
    }

    /// Override the range tolerance (values below 1.0 are raised to 1.0)
    pub fn with_tolerance(mut self, tolerance_factor: f64) -> Self {
        self.tolerance_factor = tolerance_factor.max(1.0);
        self
    }

    pub fn tolerance_factor(&self) -> f64 {
        self.tolerance_factor
    }

    /// Normalize a [`RawReading`]
    pub fn normalize_reading(
        &self,
        reading: &RawReading,
        context: &NormalizationContext,
    ) -> Result<SubStat, ValidationError> {
        self.normalize(&reading.label, &reading.number, context)
    }

    /// Normalize one raw reading
    pub fn normalize(
        &self,
        raw_label: &str,
        raw_number: &str,
        context: &NormalizationContext,
    ) -> Result<SubStat, ValidationError> {
        let label = clean_label(raw_label);
        let resolved = self
            .aliases
            .resolve(&label)
            .ok_or_else(|| ValidationError::UnknownLabel {
                label: label.clone(),
            })?;

        let number = parse_number(raw_number)?;

        let kind = if resolved.counterpart().is_some() {
            let label_has_percent = label.contains('%') || label.contains('％');
            resolved.with_unit(decide_unit(label_has_percent, &number))
        } else {
            resolved
        };

        let max = self
            .reference
            .max(kind)
            .ok_or(ValidationError::NoReferenceMax { kind })?;
        let limit = max * self.tolerance_factor;

        if number.value < 0.0 || number.value > limit {
            let divided = number.value / 10.0;
            let suggested = (number.value > 0.0 && divided <= limit).then_some(divided);

            tracing::debug!(
                kind = ?kind,
                value = number.value,
                max,
                suggested = ?suggested,
                "Reading out of range"
            );

            return Err(ValidationError::OutOfRange {
                kind,
                value: number.value,
                max,
                suggested,
            });
        }

        tracing::debug!(
            label = %label,
            kind = ?kind,
            value = number.value,
            cost = ?context.cost,
            main_stat = ?context.main_stat_hint,
            "Normalized reading"
        );

        Ok(SubStat::new(kind, number.value))
    }
}

/// Unit rule for kinds that exist as both percentage and flat
///
/// Explicit `%` wins. Otherwise a value below 20 written with a decimal
/// point is read as a percentage, since flat ATK/HP/DEF rolls are never
/// that small. Everything else is flat.
fn decide_unit(label_has_percent: bool, number: &NumberText) -> StatUnit {
    if label_has_percent || number.has_percent {
        StatUnit::Percent
    } else if number.value < PERCENT_HEURISTIC_CEILING && number.has_fraction {
        StatUnit::Percent
    } else {
        StatUnit::Flat
    }
}

/// Strip bullet glyphs and trailing separators, collapse whitespace
fn clean_label(raw: &str) -> String {
    const LEADING_NOISE: &[char] = &['・', '•', '·', '*', '.', ':', '：', '-', '>', '|'];
    const TRAILING_NOISE: &[char] = &[':', '：', '+', '＋', '=', '|'];

    let collapsed = raw
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .split(|c: char| c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    collapsed
        .trim_start_matches(|c: char| LEADING_NOISE.contains(&c) || c.is_whitespace())
        .trim_end_matches(|c: char| TRAILING_NOISE.contains(&c) || c.is_whitespace())
        .to_string()
}

/// Parse number text, folding full-width glyphs and dropping stray characters
fn parse_number(raw: &str) -> Result<NumberText, ValidationError> {
    let malformed = || ValidationError::MalformedNumber {
        text: raw.trim().to_string(),
    };

    let folded: String = raw
        .chars()
        .filter_map(|c| {
            let c = match c {
                '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32)?,
                '．' | ',' | '，' => '.',
                '％' => '%',
                '－' | '−' => '-',
                '＋' => '+',
                other => other,
            };
            (c.is_ascii_digit() || matches!(c, '.' | '%' | '-' | '+')).then_some(c)
        })
        .collect();

    let without_percent = folded.trim_end_matches('%');
    let has_percent = without_percent.len() != folded.len();
    if without_percent.contains('%') {
        return Err(malformed());
    }

    let numeric = without_percent.strip_prefix('+').unwrap_or(without_percent);
    if numeric.is_empty() {
        return Err(malformed());
    }

    let value: f64 = numeric.parse().map_err(|_| malformed())?;
    if !value.is_finite() {
        return Err(malformed());
    }

    Ok(NumberText {
        value,
        has_percent,
        has_fraction: numeric.contains('.'),
    })
}
