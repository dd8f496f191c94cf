//! Evaluated echo history
//!
//! [`HistoryStore`] is the only mutable shared state in the crate.
//! [`HistorySink`] implementations make it durable.

pub mod sink;
pub mod store;

pub use sink::{HistorySink, JsonFileSink, HISTORY_FORMAT_VERSION};
pub use store::{HistoryQuery, HistoryStore, SortOrder, DEFAULT_MAX_ENTRIES};
