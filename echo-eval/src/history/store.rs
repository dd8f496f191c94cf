//! In-memory history store with retention modes
//!
//! Entries are held as `Arc<HistoryEntry>` behind a `std::sync::RwLock`.
//! Every mutation takes the write lock, so at most one insert is in flight
//! and two inserts of the same fingerprint can never interleave. Queries
//! clone the `Arc` list under the read lock and filter after releasing it,
//! so a reader sees either the state before or after an insert, never a
//! partially written entry.

use chrono::{DateTime, Utc};
use echo_common::{Cost, Fingerprint, HistoryEntry, InsertOutcome, RankTag, RetentionMode};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Default retention cap
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Query result ordering, by `last_updated_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Combinable history filter
///
/// Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    character_id: Option<String>,
    cost: Option<Cost>,
    rank: Option<RankTag>,
    text: Option<String>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    order: SortOrder,
    limit: Option<usize>,
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn character(mut self, character_id: impl Into<String>) -> Self {
        self.character_id = Some(character_id.into());
        self
    }

    pub fn cost(mut self, cost: Cost) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn rank(mut self, rank: RankTag) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Case-insensitive substring over main stat and substat names
    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into().trim().to_lowercase();
        self.text = (!text.is_empty()).then_some(text);
        self
    }

    /// Entries inserted at or after `since`
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Entries inserted before `until`
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.order = SortOrder::OldestFirst;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `entry` passes every set predicate
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        if let Some(character_id) = &self.character_id {
            if entry.echo.character_id() != character_id {
                return false;
            }
        }
        if let Some(cost) = self.cost {
            if entry.echo.cost() != cost {
                return false;
            }
        }
        if let Some(rank) = self.rank {
            if entry.result.rank != rank {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.inserted_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.inserted_at >= until {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let kinds = entry
                .echo
                .main_stat()
                .into_iter()
                .chain(entry.echo.sub_stats().iter().map(|sub| sub.kind));
            let mut found = false;
            for kind in kinds {
                if kind.display_name().to_lowercase().contains(text.as_str())
                    || kind.key().contains(text.as_str())
                {
                    found = true;
                    break;
                }
            }
            if !found {
                return false;
            }
        }
        true
    }
}

/// History of evaluated echoes
#[derive(Debug)]
pub struct HistoryStore {
    /// Insertion order
    entries: RwLock<Vec<Arc<HistoryEntry>>>,
    /// Retention cap (0 = unbounded)
    max_entries: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl HistoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            max_entries,
        }
    }

    /// Restore a store from previously persisted entries (insertion order)
    pub fn from_entries(entries: Vec<HistoryEntry>, max_entries: usize) -> Self {
        let mut entries: Vec<Arc<HistoryEntry>> = entries.into_iter().map(Arc::new).collect();
        let evicted = evict_overflow(&mut entries, max_entries);
        if !evicted.is_empty() {
            tracing::info!(
                evicted = evicted.len(),
                max_entries,
                "Trimmed restored history to retention cap"
            );
        }
        Self {
            entries: RwLock::new(entries),
            max_entries,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Insert under the given retention mode
    ///
    /// - `All` appends unconditionally.
    /// - `Latest` overwrites the most recently updated entry with the same
    ///   fingerprint in place, keeping its id and `inserted_at`.
    /// - `Oldest` leaves an existing entry untouched and skips the new one.
    ///
    /// Appends beyond the retention cap evict the oldest entries by
    /// `inserted_at`.
    pub fn insert(&self, entry: HistoryEntry, mode: RetentionMode) -> InsertOutcome {
        let mut entries = self.write();

        let existing = match mode {
            RetentionMode::All => None,
            RetentionMode::Latest | RetentionMode::Oldest => entries
                .iter()
                .enumerate()
                .filter(|(_, stored)| stored.fingerprint == entry.fingerprint)
                .max_by_key(|(_, stored)| stored.last_updated_at)
                .map(|(i, _)| i),
        };

        match (mode, existing) {
            (RetentionMode::Latest, Some(i)) => {
                let current = &entries[i];
                let replaced = HistoryEntry {
                    id: current.id,
                    inserted_at: current.inserted_at,
                    fingerprint: entry.fingerprint,
                    echo: entry.echo,
                    result: entry.result,
                    last_updated_at: entry.last_updated_at,
                };
                tracing::info!(
                    id = %replaced.id,
                    fingerprint = %replaced.fingerprint.short(),
                    "Replaced history entry"
                );
                entries[i] = Arc::new(replaced);
                InsertOutcome::Replaced
            }
            (RetentionMode::Oldest, Some(i)) => {
                tracing::debug!(
                    id = %entries[i].id,
                    fingerprint = %entry.fingerprint.short(),
                    "Kept existing history entry"
                );
                InsertOutcome::Skipped
            }
            _ => {
                tracing::info!(
                    id = %entry.id,
                    fingerprint = %entry.fingerprint.short(),
                    mode = %mode,
                    "Appended history entry"
                );
                entries.push(Arc::new(entry));

                let evicted = evict_overflow(&mut entries, self.max_entries);
                if !evicted.is_empty() {
                    tracing::info!(
                        evicted = ?evicted,
                        max_entries = self.max_entries,
                        "Evicted oldest history entries"
                    );
                }
                InsertOutcome::Appended
            }
        }
    }

    /// Entries matching `query`, newest first unless asked otherwise
    ///
    /// The returned iterator owns its snapshot; it holds no lock and does
    /// not observe later mutations.
    pub fn query(&self, query: HistoryQuery) -> impl Iterator<Item = Arc<HistoryEntry>> {
        let mut snapshot: Vec<Arc<HistoryEntry>> = self.read().clone();

        match query.order {
            SortOrder::NewestFirst => snapshot.sort_by(|a, b| {
                b.last_updated_at
                    .cmp(&a.last_updated_at)
                    .then_with(|| b.inserted_at.cmp(&a.inserted_at))
            }),
            SortOrder::OldestFirst => snapshot.sort_by(|a, b| {
                a.last_updated_at
                    .cmp(&b.last_updated_at)
                    .then_with(|| a.inserted_at.cmp(&b.inserted_at))
            }),
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        snapshot
            .into_iter()
            .filter(move |entry| query.matches(entry))
            .take(limit)
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<HistoryEntry>> {
        self.read().iter().find(|entry| entry.id == id).cloned()
    }

    /// Ids of all entries sharing `fingerprint`, in insertion order
    pub fn find_duplicates(&self, fingerprint: &Fingerprint) -> Vec<Uuid> {
        self.read()
            .iter()
            .filter(|entry| &entry.fingerprint == fingerprint)
            .map(|entry| entry.id)
            .collect()
    }

    /// Delete one entry by id
    pub fn remove(&self, id: Uuid) -> Option<Arc<HistoryEntry>> {
        let mut entries = self.write();
        let index = entries.iter().position(|entry| entry.id == id)?;
        let removed = entries.remove(index);
        tracing::info!(id = %id, "Removed history entry");
        Some(removed)
    }

    /// Delete every entry, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut entries = self.write();
        let count = entries.len();
        entries.clear();
        tracing::info!(count, "Cleared history");
        count
    }

    /// Owned copy of all entries in insertion order, for persistence
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.read().iter().map(|entry| entry.as_ref().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panicking writer never leaves a half-built entry behind (entries are
    // swapped in whole), so a poisoned lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<HistoryEntry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<HistoryEntry>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drop the oldest entries (by `inserted_at`) until at most `max_entries` remain
fn evict_overflow(entries: &mut Vec<Arc<HistoryEntry>>, max_entries: usize) -> Vec<Uuid> {
    let mut evicted = Vec::new();
    if max_entries == 0 {
        return evicted;
    }
    while entries.len() > max_entries {
        let oldest = entries
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(i, _)| i);
        match oldest {
            Some(i) => evicted.push(entries.remove(i).id),
            None => break,
        }
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use echo_common::{
        EchoRecord, EvaluationResult, MainStatFit, PrimaryMethod, Recommendation, StatKind, SubStat,
    };

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn result(score: f64, rank: RankTag) -> EvaluationResult {
        EvaluationResult {
            normalized: score,
            ratio: 0.0,
            roll_quality: 0.0,
            effective_count: 0,
            cv: 0.0,
            achievement: 0.0,
            primary_method: PrimaryMethod::Normalized,
            primary_score: score,
            rank,
            main_stat_fit: MainStatFit::Match,
            consistency_advice: None,
            recommendation: Recommendation::Continue,
            achievement_rank: RankTag::C,
        }
    }

    fn entry(fp: &str, character: &str, cost: Cost, score: f64, minutes: i64) -> HistoryEntry {
        let echo = EchoRecord::new(
            character,
            cost,
            Some(StatKind::CritRate),
            vec![SubStat::new(StatKind::EnergyRegen, 9.2)],
            at(minutes),
        )
        .unwrap();
        HistoryEntry::new(
            Fingerprint::from_hex(fp),
            echo,
            result(score, RankTag::A),
            at(minutes),
        )
    }

    #[test]
    fn test_all_mode_never_dedups() {
        let store = HistoryStore::new(0);
        assert_eq!(store.insert(entry("aa", "x", Cost::Four, 1.0, 0), RetentionMode::All), InsertOutcome::Appended);
        assert_eq!(store.insert(entry("aa", "x", Cost::Four, 2.0, 1), RetentionMode::All), InsertOutcome::Appended);
        assert_eq!(store.len(), 2);
        assert_eq!(store.find_duplicates(&Fingerprint::from_hex("aa")).len(), 2);
    }

    #[test]
    fn test_latest_mode_overwrites_in_place() {
        let store = HistoryStore::new(0);
        let first = entry("aa", "x", Cost::Four, 40.0, 0);
        let first_id = first.id;
        store.insert(first, RetentionMode::Latest);

        let second = entry("aa", "x", Cost::Four, 60.0, 5);
        let second_result = second.result.clone();
        assert_eq!(store.insert(second, RetentionMode::Latest), InsertOutcome::Replaced);

        assert_eq!(store.len(), 1);
        let stored = store.get(first_id).unwrap();
        assert_eq!(stored.last_updated_at, at(5));
        assert_eq!(stored.inserted_at, at(0));
        assert_eq!(stored.result, second_result);
    }

    #[test]
    fn test_oldest_mode_keeps_original() {
        let store = HistoryStore::new(0);
        let first = entry("aa", "x", Cost::Four, 40.0, 0);
        let first_copy = first.clone();
        store.insert(first, RetentionMode::Oldest);

        let outcome = store.insert(entry("aa", "x", Cost::Four, 60.0, 5), RetentionMode::Oldest);
        assert_eq!(outcome, InsertOutcome::Skipped);
        assert_eq!(store.snapshot(), vec![first_copy]);
    }

    #[test]
    fn test_distinct_fingerprints_append() {
        let store = HistoryStore::new(0);
        store.insert(entry("aa", "x", Cost::Four, 1.0, 0), RetentionMode::Latest);
        let outcome = store.insert(entry("bb", "x", Cost::Four, 1.0, 1), RetentionMode::Oldest);
        assert_eq!(outcome, InsertOutcome::Appended);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_latest_targets_most_recently_updated_duplicate() {
        let store = HistoryStore::new(0);
        store.insert(entry("aa", "x", Cost::Four, 1.0, 0), RetentionMode::All);
        let newer = entry("aa", "x", Cost::Four, 2.0, 10);
        let newer_id = newer.id;
        store.insert(newer, RetentionMode::All);

        store.insert(entry("aa", "x", Cost::Four, 3.0, 20), RetentionMode::Latest);
        assert_eq!(store.get(newer_id).unwrap().result.normalized, 3.0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_eviction_removes_oldest_inserted() {
        let store = HistoryStore::new(2);
        let oldest = entry("aa", "x", Cost::Four, 1.0, 0);
        let oldest_id = oldest.id;
        store.insert(oldest, RetentionMode::All);
        store.insert(entry("bb", "x", Cost::Four, 1.0, 1), RetentionMode::All);
        store.insert(entry("cc", "x", Cost::Four, 1.0, 2), RetentionMode::All);

        assert_eq!(store.len(), 2);
        assert!(store.get(oldest_id).is_none());
    }

    #[test]
    fn test_query_default_order_newest_first() {
        let store = HistoryStore::new(0);
        store.insert(entry("aa", "x", Cost::Four, 1.0, 0), RetentionMode::Latest);
        store.insert(entry("bb", "x", Cost::Four, 2.0, 1), RetentionMode::Latest);
        store.insert(entry("cc", "x", Cost::Four, 3.0, 2), RetentionMode::Latest);
        // Refreshing "aa" moves it to the front
        store.insert(entry("aa", "x", Cost::Four, 4.0, 3), RetentionMode::Latest);

        let scores: Vec<f64> = store
            .query(HistoryQuery::new())
            .map(|e| e.result.normalized)
            .collect();
        assert_eq!(scores, vec![4.0, 3.0, 2.0]);

        let oldest: Vec<f64> = store
            .query(HistoryQuery::new().oldest_first().limit(1))
            .map(|e| e.result.normalized)
            .collect();
        assert_eq!(oldest, vec![2.0]);
    }

    #[test]
    fn test_query_filters_combine() {
        let store = HistoryStore::new(0);
        store.insert(entry("aa", "jinhsi", Cost::Four, 1.0, 0), RetentionMode::All);
        store.insert(entry("bb", "jinhsi", Cost::Three, 1.0, 60), RetentionMode::All);
        store.insert(entry("cc", "changli", Cost::Four, 1.0, 120), RetentionMode::All);

        assert_eq!(store.query(HistoryQuery::new().character("jinhsi")).count(), 2);
        assert_eq!(
            store
                .query(HistoryQuery::new().character("jinhsi").cost(Cost::Four))
                .count(),
            1
        );
        assert_eq!(store.query(HistoryQuery::new().since(at(60))).count(), 2);
        assert_eq!(
            store
                .query(HistoryQuery::new().since(at(30)).until(at(120)))
                .count(),
            1
        );
        assert_eq!(store.query(HistoryQuery::new().rank(RankTag::A)).count(), 3);
        assert_eq!(store.query(HistoryQuery::new().rank(RankTag::S)).count(), 0);
    }

    #[test]
    fn test_query_text_matches_stat_names() {
        let store = HistoryStore::new(0);
        store.insert(entry("aa", "x", Cost::Four, 1.0, 0), RetentionMode::All);

        assert_eq!(store.query(HistoryQuery::new().text("energy")).count(), 1);
        assert_eq!(store.query(HistoryQuery::new().text("CRIT. RATE")).count(), 1);
        assert_eq!(store.query(HistoryQuery::new().text("havoc")).count(), 0);
        assert_eq!(store.query(HistoryQuery::new().text("  ")).count(), 1);
    }

    #[test]
    fn test_query_does_not_mutate() {
        let store = HistoryStore::new(0);
        store.insert(entry("aa", "x", Cost::Four, 1.0, 0), RetentionMode::All);
        let before = store.snapshot();
        let _ = store.query(HistoryQuery::new().character("nobody")).count();
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_remove_and_clear() {
        let store = HistoryStore::new(0);
        let e = entry("aa", "x", Cost::Four, 1.0, 0);
        let id = e.id;
        store.insert(e, RetentionMode::All);
        store.insert(entry("bb", "x", Cost::Four, 1.0, 1), RetentionMode::All);

        assert!(store.remove(id).is_some());
        assert!(store.remove(id).is_none());
        assert_eq!(store.clear(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_from_entries_applies_cap() {
        let entries = vec![
            entry("aa", "x", Cost::Four, 1.0, 0),
            entry("bb", "x", Cost::Four, 1.0, 1),
            entry("cc", "x", Cost::Four, 1.0, 2),
        ];
        let store = HistoryStore::from_entries(entries, 2);
        assert_eq!(store.len(), 2);
        assert!(store.find_duplicates(&Fingerprint::from_hex("aa")).is_empty());
    }
}
