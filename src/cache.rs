//! Per-query result cache.
//!
//! Entries are keyed by query kind and value and only ever grow by
//! appending or get replaced wholesale (explicit reset or staleness).
//! Records fetched beyond what a caller asked for are parked in a pending
//! buffer, so that the surfaced list always equals what callers have been
//! given and later "more" requests can be served without a network call.
//!
//! Entries are never evicted except by reset; the cache lives as long as
//! the owning [`Session`](crate::Session).

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::normalize::CanonicalRecord;
use crate::provider::{Continuation, Page, ProviderFamily};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Category,
    Search,
}

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub kind: QueryKind,
    pub value: String,
}

impl QueryKey {
    pub fn category(name: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::Category,
            value: name.into(),
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::Search,
            value: query.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct QueryCacheEntry {
    /// Records already handed to callers, in provider order.
    records: Vec<CanonicalRecord>,
    /// Fetched but not yet surfaced.
    pending: VecDeque<CanonicalRecord>,
    /// Identifiers in `records` and `pending`.
    ids: HashSet<String>,
    refreshed_at: Option<Instant>,
    cursor: Option<String>,
    cursor_family: Option<ProviderFamily>,
    /// Highest page number fetched from a page-numbered family.
    last_page: u32,
    exhausted: bool,
}

impl QueryCacheEntry {
    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Surfaced plus pending records.
    pub fn buffered(&self) -> usize {
        self.records.len() + self.pending.len()
    }

    pub fn refreshed_at(&self) -> Option<Instant> {
        self.refreshed_at
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// The provider has signalled there is nothing after what we hold.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.pending.is_empty()
    }

    /// Older than `ttl`. An entry that was never fetched is not stale.
    pub fn is_stale(&self, ttl: Duration, now: Instant) -> bool {
        self.refreshed_at
            .is_some_and(|at| now.saturating_duration_since(at) > ttl)
    }

    /// Drop everything, including the cursor.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Snapshot of what is needed to ask a provider for the next page.
    pub fn continuation_state(&self) -> ContinuationState {
        ContinuationState {
            fetched: self.refreshed_at.is_some(),
            cursor: self.cursor.clone(),
            cursor_family: self.cursor_family,
            buffered: self.buffered(),
            last_page: self.last_page,
        }
    }

    /// Merge a fetched page into the pending buffer, dropping identifiers
    /// already held. Returns how many records were new.
    pub fn absorb(
        &mut self,
        page: Page,
        family: ProviderFamily,
        continuation: &Continuation,
        now: Instant,
    ) -> usize {
        let was_empty = page.records.is_empty();
        let mut added = 0;
        for record in page.records {
            if self.ids.insert(record.id.clone()) {
                self.pending.push_back(record);
                added += 1;
            }
        }

        self.refreshed_at = Some(now);

        if family.schema().supports_cursor() {
            self.exhausted = was_empty || page.cursor.is_none();
            self.cursor = page.cursor;
            self.cursor_family = Some(family);
        } else {
            self.exhausted = was_empty;
            self.last_page = match continuation {
                Continuation::Page(n) => (*n).max(self.last_page),
                _ => self.last_page.max(1),
            };
        }

        added
    }

    /// Move pending records into the surfaced list until it holds `target`.
    pub fn promote(&mut self, target: usize) {
        while self.records.len() < target {
            match self.pending.pop_front() {
                Some(record) => self.records.push(record),
                None => break,
            }
        }
    }

    pub fn prefix(&self, count: usize) -> Vec<CanonicalRecord> {
        self.records[..count.min(self.records.len())].to_vec()
    }

    pub fn suffix(&self, start: usize) -> Vec<CanonicalRecord> {
        self.records.get(start..).map(<[_]>::to_vec).unwrap_or_default()
    }
}

/// Pagination position of an entry, detached from the lock.
#[derive(Debug, Clone, Default)]
pub struct ContinuationState {
    fetched: bool,
    cursor: Option<String>,
    cursor_family: Option<ProviderFamily>,
    buffered: usize,
    last_page: u32,
}

impl ContinuationState {
    /// Family that owns a live cursor, if any.
    pub fn cursor_family(&self) -> Option<ProviderFamily> {
        self.cursor.as_ref().and(self.cursor_family)
    }

    /// Continuation to send to `family`.
    ///
    /// Cursor families continue from their own stored cursor. Families
    /// without cursors get a page number derived from how many records are
    /// held, never going backwards; this can repeat items when providers
    /// return short pages, which identifier dedup absorbs.
    pub fn for_family(&self, family: ProviderFamily, page_size: usize) -> Continuation {
        if !self.fetched {
            return Continuation::First;
        }

        if family.schema().supports_cursor() {
            return match (&self.cursor, self.cursor_family) {
                (Some(token), Some(owner)) if owner == family => {
                    Continuation::Cursor(token.clone())
                }
                _ => Continuation::First,
            };
        }

        let derived = u32::try_from(self.buffered / page_size.max(1))
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        Continuation::Page(derived.max(self.last_page.saturating_add(1)))
    }
}

/// Session-scoped store of query entries.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<QueryKey, QueryCacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the entry for `key`, creating it if needed.
    pub async fn with_entry<R>(
        &self,
        key: &QueryKey,
        f: impl FnOnce(&mut QueryCacheEntry) -> R,
    ) -> R {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.clone()).or_default();
        f(entry)
    }

    /// Surfaced records for `key`, if the key has an entry.
    pub async fn records(&self, key: &QueryKey) -> Option<Vec<CanonicalRecord>> {
        let entries = self.entries.read().await;
        entries.get(key).map(|e| e.records().to_vec())
    }

    pub async fn refreshed_at(&self, key: &QueryKey) -> Option<Instant> {
        let entries = self.entries.read().await;
        entries.get(key).and_then(QueryCacheEntry::refreshed_at)
    }

    pub async fn contains(&self, key: &QueryKey) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Replace the entry for `key` with an empty one.
    pub async fn reset(&self, key: &QueryKey) {
        self.entries.write().await.remove(key);
    }
}
