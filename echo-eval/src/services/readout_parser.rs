//! OCR readout parsing
//!
//! Consumes the text block an external OCR engine produced for one echo
//! card. Recognition itself happens elsewhere; this module only locates
//! the cost, the main stat and the substat `(label, number)` pairs.
//!
//! Card layout assumptions:
//! - cost appears within the first three non-empty lines
//! - the main stat appears within the first ten lines
//! - substats are the last five lines

use super::normalizer::RawReading;
use echo_common::{AliasResolver, Cost, StatKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

const COST_SEARCH_LINES: usize = 3;
const MAIN_STAT_SEARCH_LINES: usize = 10;
const SUBSTAT_LINES: usize = 5;

static COST_RE: OnceLock<Regex> = OnceLock::new();
static READING_RE: OnceLock<Regex> = OnceLock::new();
static PERCENT_GAP_RE: OnceLock<Regex> = OnceLock::new();

/// Structured content of one OCR text block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrReadout {
    pub cost: Option<Cost>,
    pub main_stat: Option<StatKind>,
    pub readings: Vec<RawReading>,
}

/// Parser for OCR text blocks
#[derive(Debug, Clone)]
pub struct ReadoutParser {
    aliases: Arc<AliasResolver>,
}

impl ReadoutParser {
    pub fn new(aliases: Arc<AliasResolver>) -> Self {
        Self { aliases }
    }

    /// Parse a whole text block
    pub fn parse(&self, raw_text: &str) -> OcrReadout {
        let lines = clean_lines(raw_text);
        if lines.is_empty() {
            return OcrReadout::default();
        }

        let cost_line = detect_cost(&lines);
        let cost = cost_line.map(|(_, cost)| cost);
        let main_line = self.detect_main_stat(&lines, cost, cost_line.map(|(i, _)| i));

        let skip: Vec<usize> = cost_line
            .map(|(i, _)| i)
            .into_iter()
            .chain(main_line.map(|(i, _)| i))
            .collect();

        let start = lines.len().saturating_sub(SUBSTAT_LINES);
        let readings: Vec<RawReading> = lines
            .iter()
            .enumerate()
            .skip(start)
            .filter(|(i, _)| !skip.contains(i))
            .filter_map(|(_, line)| split_reading(line))
            .collect();

        tracing::debug!(
            lines = lines.len(),
            cost = ?cost,
            main_stat = ?main_line.map(|(_, kind)| kind),
            readings = readings.len(),
            "Parsed OCR readout"
        );

        OcrReadout {
            cost,
            main_stat: main_line.map(|(_, kind)| kind),
            readings,
        }
    }

    /// First line within the search window naming a main stat valid for `cost`
    fn detect_main_stat(
        &self,
        lines: &[String],
        cost: Option<Cost>,
        cost_line: Option<usize>,
    ) -> Option<(usize, StatKind)> {
        let candidates: Vec<StatKind> = match cost {
            Some(cost) => cost.main_stat_candidates().to_vec(),
            None => {
                let mut all: Vec<StatKind> = Cost::all_variants()
                    .iter()
                    .flat_map(|c| c.main_stat_candidates().iter().copied())
                    .collect();
                all.sort();
                all.dedup();
                all
            }
        };

        lines
            .iter()
            .enumerate()
            .take(MAIN_STAT_SEARCH_LINES)
            .filter(|(i, _)| Some(*i) != cost_line)
            .find_map(|(i, line)| {
                let label = split_reading(line)
                    .map(|reading| reading.label)
                    .unwrap_or_else(|| line.clone());
                let kind = self.aliases.resolve(&label)?;

                if candidates.contains(&kind) {
                    Some((i, kind))
                } else {
                    kind.counterpart()
                        .filter(|other| candidates.contains(other))
                        .map(|other| (i, other))
                }
            })
    }
}

/// Non-empty lines with bullets removed and whitespace collapsed
fn clean_lines(raw_text: &str) -> Vec<String> {
    let percent_gap = PERCENT_GAP_RE.get_or_init(|| {
        Regex::new(r"(\d)\s*([%％])").expect("percent gap pattern is valid")
    });

    raw_text
        .lines()
        .map(|line| {
            let stripped = line
                .trim()
                .trim_start_matches(|c: char| matches!(c, '・' | '.' | ':' | '*') || c.is_whitespace());
            let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
            percent_gap.replace_all(&collapsed, "$1$2").into_owned()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Cost from the first lines, with the index of the line it was found on
fn detect_cost(lines: &[String]) -> Option<(usize, Cost)> {
    let cost_re = COST_RE.get_or_init(|| {
        Regex::new(r"(?:COST|Cost|cost|コスト)[\s:.：]*([134])").expect("cost pattern is valid")
    });

    lines
        .iter()
        .take(COST_SEARCH_LINES)
        .enumerate()
        .find_map(|(i, line)| {
            let digit = cost_re.captures(line)?.get(1)?;
            Cost::from_str(digit.as_str()).ok().map(|cost| (i, cost))
        })
}

/// Split "label number" text; `None` when the line carries no number
fn split_reading(line: &str) -> Option<RawReading> {
    let reading_re = READING_RE.get_or_init(|| {
        Regex::new(r"^(?P<label>.*?\D)\s*(?P<number>[+＋]?\d+(?:[.．,]\d+)?\s*[%％]?)[^\d%％]*$")
            .expect("reading pattern is valid")
    });

    let caps = reading_re.captures(line)?;
    let label = caps.name("label")?.as_str().trim();
    let number = caps.name("number")?.as_str().trim();
    if label.is_empty() {
        return None;
    }
    Some(RawReading::new(label, number))
}
