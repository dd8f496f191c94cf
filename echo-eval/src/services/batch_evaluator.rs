//! Parallel batch evaluation
//!
//! Scoring is pure, so items are evaluated across rayon's worker pool with
//! no ordering constraint between them. Output order matches input order.
//! A failing item never aborts the batch.

use super::scoring_engine::ScoringEngine;
use echo_common::{
    ConfigError, EchoRecord, EvaluationResult, PrimaryMethod, ProfileRegistry, RankTag,
    StatReference,
};
use rayon::prelude::*;
use serde::Serialize;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Display;

/// Evaluate every echo in parallel, one result per input in input order
pub fn evaluate_batch<E>(
    engine: &ScoringEngine,
    echoes: &[E],
    profiles: &ProfileRegistry,
    reference: &StatReference,
) -> Vec<Result<EvaluationResult, ConfigError>>
where
    E: Borrow<EchoRecord> + Sync,
{
    let results: Vec<Result<EvaluationResult, ConfigError>> = echoes
        .par_iter()
        .map(|echo| {
            let echo: &EchoRecord = echo.borrow();
            engine.evaluate(echo, profiles.get(echo.character_id()), reference)
        })
        .collect();

    let summary = BatchSummary::from_results(&results);
    tracing::debug!(
        items = summary.total(),
        failed = summary.failed,
        mean_normalized = ?summary.mean(PrimaryMethod::Normalized),
        "Batch evaluation complete"
    );

    results
}

/// Per-method score sums across a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MethodTotals {
    pub normalized: f64,
    pub ratio: f64,
    pub roll_quality: f64,
    pub effective_count: u64,
    pub cv: f64,
    pub achievement: f64,
}

/// Batch statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    /// Items scored successfully
    pub evaluated: usize,
    /// Items that failed
    pub failed: usize,
    pub totals: MethodTotals,
    pub by_rank: HashMap<RankTag, usize>,
    /// Failure messages in input order
    pub errors: Vec<String>,
}

impl BatchSummary {
    /// Summary of a batch of engine results
    pub fn from_results<'a, E, I>(results: I) -> Self
    where
        E: Display + 'a,
        I: IntoIterator<Item = &'a Result<EvaluationResult, E>>,
    {
        let mut summary = Self::default();
        for result in results {
            match result {
                Ok(evaluation) => summary.record(evaluation),
                Err(e) => summary.record_failure(e),
            }
        }
        summary
    }

    pub fn record(&mut self, result: &EvaluationResult) {
        self.evaluated += 1;
        self.totals.normalized += result.normalized;
        self.totals.ratio += result.ratio;
        self.totals.roll_quality += result.roll_quality;
        self.totals.effective_count += u64::from(result.effective_count);
        self.totals.cv += result.cv;
        self.totals.achievement += result.achievement;
        *self.by_rank.entry(result.rank).or_insert(0) += 1;
    }

    pub fn record_failure(&mut self, error: impl Display) {
        self.failed += 1;
        self.errors.push(error.to_string());
    }

    /// Mean score of `method` over the evaluated items
    pub fn mean(&self, method: PrimaryMethod) -> Option<f64> {
        if self.evaluated == 0 {
            return None;
        }
        let total = match method {
            PrimaryMethod::Normalized => self.totals.normalized,
            PrimaryMethod::Ratio => self.totals.ratio,
            PrimaryMethod::RollQuality => self.totals.roll_quality,
            PrimaryMethod::EffectiveCount => self.totals.effective_count as f64,
            PrimaryMethod::Cv => self.totals.cv,
        };
        Some(total / self.evaluated as f64)
    }

    pub fn total(&self) -> usize {
        self.evaluated + self.failed
    }
}
