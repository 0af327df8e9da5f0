//! Cached pagination over the fetch engine.
//!
//! `get_page` answers from the cache whenever it already holds enough
//! records; otherwise it makes exactly one fetch (trying the secondary
//! family if the primary one is exhausted and fallback is enabled),
//! merges the result with identifier dedup and returns a prefix.
//! `get_more_page` returns only the newly surfaced suffix. Running out of
//! pages is an empty result, never an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::cache::{ContinuationState, QueryKey, QueryKind, ResultCache};
use crate::error::{FetchError, Result};
use crate::fetch::FetchEngine;
use crate::normalize::CanonicalRecord;
use crate::provider::{Continuation, LogicalEndpoint, MetadataRequest, Page, ProviderFamily};

/// Category used when none is given.
pub const DEFAULT_CATEGORY: &str = "Trending";

/// Category names understood by the lookup table (case-insensitive).
pub const KNOWN_CATEGORIES: &[&str] = &["Trending", "Popular", "Music", "Gaming", "Movies", "News"];

/// Map a category name onto a logical endpoint.
///
/// Unknown names fall back to the unfiltered trending feed.
pub fn category_endpoint(name: &str) -> LogicalEndpoint {
    let category = match name.trim().to_ascii_lowercase().as_str() {
        "popular" => return LogicalEndpoint::Popular,
        "music" => Some("music"),
        "gaming" => Some("gaming"),
        "movies" => Some("movies"),
        "news" => Some("news"),
        _ => None,
    };
    LogicalEndpoint::Trending {
        category: category.map(ToString::to_string),
    }
}

/// Outcome of consulting the cache before a fetch.
enum Lookup<T> {
    /// Answerable without a network call.
    Hit(Vec<CanonicalRecord>),
    /// A fetch is needed, starting from this position.
    Miss(T),
}

/// Tunables the paginator needs from the engine config.
#[derive(Debug, Clone)]
pub struct PaginatorOptions {
    pub ttl: Duration,
    pub max_attempts: u32,
    pub page_size: usize,
    pub region: String,
    /// Families to try, in order.
    pub families: Vec<ProviderFamily>,
}

pub struct Paginator {
    engine: FetchEngine,
    cache: Arc<ResultCache>,
    options: PaginatorOptions,
}

impl Paginator {
    pub fn new(engine: FetchEngine, cache: Arc<ResultCache>, options: PaginatorOptions) -> Self {
        Self {
            engine,
            cache,
            options,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Up to `desired` records for `key`, degrading to whatever is cached
    /// (possibly nothing) when every provider fails.
    pub async fn get_page(
        &self,
        key: &QueryKey,
        desired: usize,
        force_refresh: bool,
    ) -> Vec<CanonicalRecord> {
        match self.try_get_page(key, desired, force_refresh).await {
            Ok(records) => records,
            Err(e) => {
                warn!(query = %key.value, error = %e, "Metadata unavailable, serving cache");
                self.cache
                    .records(key)
                    .await
                    .map(|mut records| {
                        records.truncate(desired);
                        records
                    })
                    .unwrap_or_default()
            }
        }
    }

    /// Like [`get_page`](Self::get_page) but surfaces the terminal fetch error.
    #[instrument(skip(self), fields(query = %key.value))]
    pub async fn try_get_page(
        &self,
        key: &QueryKey,
        desired: usize,
        force_refresh: bool,
    ) -> Result<Vec<CanonicalRecord>> {
        let ttl = self.options.ttl;
        let state = self
            .cache
            .with_entry(key, |entry| {
                if force_refresh || entry.is_stale(ttl, Instant::now()) {
                    debug!(force_refresh, "Resetting cache entry");
                    entry.clear();
                }
                entry.promote(desired);
                if entry.len() >= desired || entry.is_exhausted() {
                    Lookup::Hit(entry.prefix(desired))
                } else {
                    Lookup::Miss(entry.continuation_state())
                }
            })
            .await;

        let state = match state {
            Lookup::Miss(state) => state,
            Lookup::Hit(cached) => {
                debug!(records = cached.len(), "Served from cache");
                return Ok(cached);
            }
        };

        let (family, page, continuation) = self.fetch_next(key, &state).await?;

        Ok(self
            .cache
            .with_entry(key, |entry| {
                entry.absorb(page, family, &continuation, Instant::now());
                entry.promote(desired);
                entry.prefix(desired)
            })
            .await)
    }

    /// Up to `increment` records following what has already been returned
    /// for `key`. Empty means there are no more pages (or no provider
    /// answered).
    pub async fn get_more_page(&self, key: &QueryKey, increment: usize) -> Vec<CanonicalRecord> {
        match self.try_get_more_page(key, increment).await {
            Ok(records) => records,
            Err(e) => {
                warn!(query = %key.value, error = %e, "Next page unavailable");
                Vec::new()
            }
        }
    }

    #[instrument(skip(self), fields(query = %key.value))]
    pub async fn try_get_more_page(
        &self,
        key: &QueryKey,
        increment: usize,
    ) -> Result<Vec<CanonicalRecord>> {
        let step = self
            .cache
            .with_entry(key, |entry| {
                let start = entry.len();
                entry.promote(start + increment);
                if entry.len() > start || increment == 0 || entry.is_exhausted() {
                    Lookup::Hit(entry.suffix(start))
                } else {
                    Lookup::Miss((start, entry.continuation_state()))
                }
            })
            .await;

        let (start, state) = match step {
            Lookup::Miss(step) => step,
            Lookup::Hit(buffered) => return Ok(buffered),
        };

        let (family, page, continuation) = self.fetch_next(key, &state).await?;

        Ok(self
            .cache
            .with_entry(key, |entry| {
                entry.absorb(page, family, &continuation, Instant::now());
                entry.promote(start + increment);
                entry.suffix(start)
            })
            .await)
    }

    /// One fetch for the next page of `key`, trying each family in turn.
    async fn fetch_next(
        &self,
        key: &QueryKey,
        state: &ContinuationState,
    ) -> Result<(ProviderFamily, Page, Continuation)> {
        let mut last_error = FetchError::NoProviders(ProviderFamily::Primary.name());

        // A live cursor continues through its own family first
        let preferred = state
            .cursor_family()
            .filter(|family| self.options.families.contains(family));
        let order = preferred.into_iter().chain(
            self.options
                .families
                .iter()
                .copied()
                .filter(|&family| Some(family) != preferred),
        );

        for family in order {
            if self.engine.providers().tracker(family).is_empty() {
                continue;
            }

            let continuation = state.for_family(family, self.options.page_size);
            let request = self.request_for(key, continuation.clone());

            match self
                .engine
                .fetch_metadata(family, &request, self.options.max_attempts)
                .await
            {
                Ok(page) => return Ok((family, page, continuation)),
                Err(e) => {
                    warn!(family = family.name(), error = %e, "Provider family exhausted");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    fn request_for(&self, key: &QueryKey, continuation: Continuation) -> MetadataRequest {
        let endpoint = match key.kind {
            QueryKind::Category => category_endpoint(&key.value),
            QueryKind::Search => LogicalEndpoint::Search {
                query: key.value.clone(),
            },
        };
        MetadataRequest::new(endpoint)
            .region(self.options.region.clone())
            .continuation(continuation)
    }
}
