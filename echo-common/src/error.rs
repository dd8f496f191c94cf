//! Common error types for echo evaluation
//!
//! Three families live here because every crate in the workspace reports them:
//! - [`Error`]: infrastructure failures (I/O, configuration files)
//! - [`ValidationError`]: a single reading or record was rejected (recoverable)
//! - [`ConfigError`]: an item cannot be scored with the supplied reference data

use crate::stats::StatKind;
use thiserror::Error;

/// Common result type for echo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the echo crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML configuration file could not be parsed
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Rejection of a single raw reading or of an echo record under construction.
///
/// These are reported to the caller, who may prompt for manual correction.
/// They never abort the evaluation of the other readings of the same item.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// No alias matched the cleaned label text
    #[error("Unknown stat label: '{label}'")]
    UnknownLabel { label: String },

    /// The number text did not parse as a finite decimal
    #[error("Malformed number: '{text}'")]
    MalformedNumber { text: String },

    /// Value is negative or exceeds the reference maximum times the tolerance.
    ///
    /// `suggested` is set when dividing by ten (a dropped decimal point)
    /// would bring the value back into range. It is a hint only.
    #[error("{kind} value {value} is outside [0, {max}]")]
    OutOfRange {
        kind: StatKind,
        value: f64,
        max: f64,
        suggested: Option<f64>,
    },

    /// The resolved kind has no substat maximum (e.g. a main-stat-only kind)
    #[error("{kind} has no substat maximum in the stat reference")]
    NoReferenceMax { kind: StatKind },

    /// Two substats of the same kind on one echo
    #[error("Duplicate substat kind: {0}")]
    DuplicateStat(StatKind),

    /// More than five substats on one echo
    #[error("Too many substats: {0} (maximum 5)")]
    TooManySubstats(usize),

    /// Cost outside {1, 3, 4}
    #[error("Invalid echo cost: {0}")]
    InvalidCost(String),
}

/// Missing or inconsistent reference data. Fatal to one item's evaluation only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A present substat kind has no entry in the stat reference
    #[error("No maximum roll value configured for {0}")]
    MissingStatMax(StatKind),

    /// No weight profile for the echo's character
    #[error("No weight profile for character '{0}'")]
    MissingProfile(String),

    /// Rank threshold table is empty or not strictly descending
    #[error("Invalid rank thresholds: {0}")]
    InvalidThresholds(String),
}
