//! Echo Evaluation Library
//!
//! Turns raw (label, number) readings of a game echo into a validated
//! record, scores it against a character weight profile, assigns a rank
//! and keeps a deduplicated history of the results.
//!
//! Stages live in [`services`], history in [`history`], and
//! [`pipeline::EchoPipeline`] wires them together.

pub mod error;
pub mod history;
pub mod pipeline;
pub mod services;

pub use error::{EvalError, EvalResult, HistoryIoError};
pub use history::{HistoryQuery, HistorySink, HistoryStore, JsonFileSink, SortOrder};
pub use pipeline::{
    restore_store, summarize, EchoPipeline, EchoSubmission, RejectedReading, SubmissionReport,
};
pub use services::{BatchSummary, Normalizer, RawReading, ReadoutParser, ScoringEngine};
