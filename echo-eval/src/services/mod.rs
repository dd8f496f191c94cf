//! Evaluation pipeline stages
//!
//! Every stage here is a pure function of its inputs plus read-only
//! reference data, so all of them are safe to call from worker threads.

pub mod batch_evaluator;
pub mod fingerprinter;
pub mod normalizer;
pub mod rank_classifier;
pub mod readout_parser;
pub mod scoring_engine;

pub use batch_evaluator::{evaluate_batch, BatchSummary, MethodTotals};
pub use fingerprinter::fingerprint;
pub use normalizer::{NormalizationContext, Normalizer, RawReading};
pub use rank_classifier::classify;
pub use readout_parser::{OcrReadout, ReadoutParser};
pub use scoring_engine::{ScoringEngine, ScoringSettings};
