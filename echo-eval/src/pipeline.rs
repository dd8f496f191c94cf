//! End-to-end evaluation pipeline
//!
//! `submit` runs one echo through every stage:
//!
//! ```text
//! raw readings / OCR text
//!   -> normalize (per reading; rejections are collected, not fatal)
//!   -> EchoRecord
//!   -> score + rank
//!   -> fingerprint
//!   -> history insert under the configured retention mode
//! ```
//!
//! `submit_batch` normalizes all items in parallel, scores the survivors
//! with [`evaluate_batch`], and then inserts the results one at a time in
//! input order.

use crate::error::{EvalResult, HistoryIoError};
use crate::history::{HistorySink, HistoryStore};
use crate::services::{
    evaluate_batch, fingerprint, BatchSummary, NormalizationContext, Normalizer, RawReading, ReadoutParser,
    ScoringEngine, ScoringSettings,
};
use chrono::{DateTime, Utc};
use echo_common::{
    time, AliasResolver, Cost, EchoRecord, EvalConfig, EvaluationResult, Fingerprint,
    HistoryEntry, InsertOutcome, ProfileRegistry, RetentionMode, StatKind, StatReference,
    SubStat, ValidationError, MAX_SUBSTATS,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;

/// One echo as handed in by the capture or manual-entry side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EchoSubmission {
    pub character_id: String,

    /// Required unless it can be read from `ocr_text`
    #[serde(default)]
    pub cost: Option<Cost>,

    #[serde(default)]
    pub main_stat: Option<StatKind>,

    /// Manually entered readings, taken before any OCR readings
    #[serde(default)]
    pub readings: Vec<RawReading>,

    /// Raw OCR text block for the echo card
    #[serde(default)]
    pub ocr_text: Option<String>,

    #[serde(default)]
    pub source_timestamp: Option<DateTime<Utc>>,
}

/// A reading that did not make it into the record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedReading {
    pub reading: RawReading,
    #[serde(serialize_with = "serialize_display")]
    pub error: ValidationError,
}

/// Outcome of one submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReport {
    pub character_id: String,
    pub cost: Cost,
    pub main_stat: Option<StatKind>,
    pub sub_stats: Vec<SubStat>,
    pub fingerprint: Fingerprint,
    pub result: EvaluationResult,
    pub outcome: InsertOutcome,
    pub rejected: Vec<RejectedReading>,
}

/// Record built from a submission, before scoring
#[derive(Debug)]
struct PreparedEcho {
    echo: EchoRecord,
    rejected: Vec<RejectedReading>,
}

/// Scored record, ready for history
#[derive(Debug)]
struct ScoredEcho {
    echo: EchoRecord,
    rejected: Vec<RejectedReading>,
    result: EvaluationResult,
    fingerprint: Fingerprint,
}

impl ScoredEcho {
    fn new(prepared: PreparedEcho, result: EvaluationResult) -> Self {
        let PreparedEcho { echo, rejected } = prepared;
        let fingerprint = fingerprint(&echo);
        Self {
            echo,
            rejected,
            result,
            fingerprint,
        }
    }
}

/// Evaluation pipeline facade
pub struct EchoPipeline {
    reference: Arc<StatReference>,
    normalizer: Normalizer,
    parser: ReadoutParser,
    engine: ScoringEngine,
    profiles: ProfileRegistry,
    store: Arc<HistoryStore>,
    retention: RetentionMode,
    sink: Option<Arc<dyn HistorySink>>,
}

impl EchoPipeline {
    /// Build every stage from explicit collaborators
    pub fn new(
        reference: StatReference,
        aliases: AliasResolver,
        engine: ScoringEngine,
        profiles: ProfileRegistry,
        store: Arc<HistoryStore>,
        retention: RetentionMode,
    ) -> Self {
        let reference = Arc::new(reference);
        let aliases = Arc::new(aliases);
        Self {
            normalizer: Normalizer::new(Arc::clone(&reference), Arc::clone(&aliases)),
            parser: ReadoutParser::new(aliases),
            reference,
            engine,
            profiles,
            store,
            retention,
            sink: None,
        }
    }

    /// Build from loaded configuration with an empty store
    pub fn from_config(config: &EvalConfig) -> Self {
        let store = Arc::new(HistoryStore::new(config.history_max_entries));
        let mut pipeline = Self::new(
            config.stat_reference(),
            AliasResolver::default(),
            ScoringEngine::new(ScoringSettings::from(config)),
            config.profile_registry(),
            store,
            config.retention_mode,
        );
        pipeline.normalizer = pipeline.normalizer.with_tolerance(config.tolerance_factor);
        pipeline
    }

    /// Use an existing (for example restored) store
    pub fn with_store(mut self, store: Arc<HistoryStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn HistorySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_retention(mut self, retention: RetentionMode) -> Self {
        self.retention = retention;
        self
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub fn retention(&self) -> RetentionMode {
        self.retention
    }

    /// Evaluate one echo and record it in history
    pub fn submit(&self, submission: &EchoSubmission) -> EvalResult<SubmissionReport> {
        let scored = self.prepare(submission).and_then(|p| self.score(p))?;
        Ok(self.record(scored))
    }

    /// Evaluate many echoes
    ///
    /// Items fail independently; the output has one result per input in
    /// input order. History inserts happen sequentially in that same order.
    pub fn submit_batch(&self, submissions: &[EchoSubmission]) -> Vec<EvalResult<SubmissionReport>> {
        // Step 1: Normalize in parallel
        let prepared: Vec<EvalResult<PreparedEcho>> = submissions
            .par_iter()
            .map(|submission| self.prepare(submission))
            .collect();

        // Step 2: Failed items keep their slot; the rest go to the scorer
        let mut slots: Vec<Option<EvalResult<ScoredEcho>>> = Vec::with_capacity(prepared.len());
        let mut ready: Vec<(usize, PreparedEcho)> = Vec::new();
        for (position, item) in prepared.into_iter().enumerate() {
            match item {
                Ok(prepared) => {
                    ready.push((position, prepared));
                    slots.push(None);
                }
                Err(e) => slots.push(Some(Err(e))),
            }
        }

        // Step 3: Score in parallel
        let echoes: Vec<&EchoRecord> = ready.iter().map(|(_, prepared)| &prepared.echo).collect();
        let results = evaluate_batch(&self.engine, &echoes, &self.profiles, &self.reference);
        for ((position, prepared), result) in ready.into_iter().zip(results) {
            slots[position] = Some(
                result
                    .map(|result| ScoredEcho::new(prepared, result))
                    .map_err(Into::into),
            );
        }

        // Step 4: Insert sequentially in input order
        let reports: Vec<EvalResult<SubmissionReport>> = slots
            .into_iter()
            .flatten()
            .map(|item| item.map(|scored| self.record(scored)))
            .collect();

        let summary = summarize(&reports);
        tracing::info!(
            items = summary.total(),
            evaluated = summary.evaluated,
            failed = summary.failed,
            "Batch submitted"
        );

        reports
    }

    /// Write the current history to the sink, if one is attached
    ///
    /// Returns the number of entries written.
    pub async fn flush(&self) -> Result<usize, HistoryIoError> {
        let Some(sink) = &self.sink else {
            return Ok(0);
        };
        let entries = self.store.snapshot();
        sink.persist(&entries).await?;
        tracing::info!(entries = entries.len(), "History flushed");
        Ok(entries.len())
    }

    fn prepare(&self, submission: &EchoSubmission) -> EvalResult<PreparedEcho> {
        let readout = submission
            .ocr_text
            .as_deref()
            .map(|text| self.parser.parse(text))
            .unwrap_or_default();

        let cost = submission
            .cost
            .or(readout.cost)
            .ok_or_else(|| ValidationError::InvalidCost("missing".to_string()))?;
        let main_stat = submission.main_stat.or(readout.main_stat);

        let context = NormalizationContext {
            cost: Some(cost),
            main_stat_hint: main_stat,
        };

        let mut sub_stats: Vec<SubStat> = Vec::new();
        let mut seen = HashSet::new();
        let mut rejected = Vec::new();

        for reading in submission.readings.iter().chain(readout.readings.iter()) {
            let outcome = self
                .normalizer
                .normalize_reading(reading, &context)
                .and_then(|sub| {
                    if seen.contains(&sub.kind) {
                        Err(ValidationError::DuplicateStat(sub.kind))
                    } else if sub_stats.len() >= MAX_SUBSTATS {
                        Err(ValidationError::TooManySubstats(sub_stats.len() + 1))
                    } else {
                        Ok(sub)
                    }
                });

            match outcome {
                Ok(sub) => {
                    seen.insert(sub.kind);
                    sub_stats.push(sub);
                }
                Err(error) => {
                    tracing::debug!(
                        character = %submission.character_id,
                        label = %reading.label,
                        number = %reading.number,
                        error = %error,
                        "Rejected reading"
                    );
                    rejected.push(RejectedReading {
                        reading: reading.clone(),
                        error,
                    });
                }
            }
        }

        let echo = EchoRecord::new(
            submission.character_id.clone(),
            cost,
            main_stat,
            sub_stats,
            submission.source_timestamp.unwrap_or_else(time::now),
        )?;

        Ok(PreparedEcho { echo, rejected })
    }

    fn score(&self, prepared: PreparedEcho) -> EvalResult<ScoredEcho> {
        let result = self.engine.evaluate(
            &prepared.echo,
            self.profiles.get(prepared.echo.character_id()),
            &self.reference,
        )?;
        Ok(ScoredEcho::new(prepared, result))
    }

    fn record(&self, scored: ScoredEcho) -> SubmissionReport {
        let ScoredEcho {
            echo,
            rejected,
            result,
            fingerprint,
        } = scored;

        let entry = HistoryEntry::new(fingerprint.clone(), echo.clone(), result.clone(), time::now());
        let outcome = self.store.insert(entry, self.retention);

        SubmissionReport {
            character_id: echo.character_id().to_string(),
            cost: echo.cost(),
            main_stat: echo.main_stat(),
            sub_stats: echo.sub_stats().to_vec(),
            fingerprint,
            result,
            outcome,
            rejected,
        }
    }
}

/// Batch statistics over pipeline results
pub fn summarize(reports: &[EvalResult<SubmissionReport>]) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for report in reports {
        match report {
            Ok(report) => summary.record(&report.result),
            Err(e) => summary.record_failure(e),
        }
    }
    summary
}

/// Restore a store from a sink
pub async fn restore_store(
    sink: &dyn HistorySink,
    max_entries: usize,
) -> Result<HistoryStore, HistoryIoError> {
    let entries = sink.load().await?;
    tracing::info!(entries = entries.len(), "Restored history");
    Ok(HistoryStore::from_entries(entries, max_entries))
}

fn serialize_display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
