//! Session-scoped engine context.
//!
//! A [`Session`] owns everything that carries state between calls: the
//! provider cursors, the result cache and the search debounce gate. Two
//! sessions never share any of it, so tests and independent callers can
//! run side by side.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{QueryKey, ResultCache};
use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::error::{FetchError, ResolveError, SessionError};
use crate::fetch::{FetchEngine, Providers};
use crate::normalize::CanonicalRecord;
use crate::paginate::{Paginator, PaginatorOptions, DEFAULT_CATEGORY};
use crate::provider::{ProviderFamily, ProviderTracker};
use crate::stream::{StreamManifest, StreamResolver};
use crate::transport::{HttpTransport, ReqwestTransport};

pub struct Session {
    config: EngineConfig,
    paginator: Paginator,
    resolver: StreamResolver,
    search_gate: Debouncer,
}

impl Session {
    /// Build a session that talks to providers over HTTPS.
    pub fn new(config: EngineConfig) -> Result<Self, SessionError> {
        let transport = ReqwestTransport::new()?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a session on top of an arbitrary transport.
    pub fn with_transport(
        config: EngineConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let providers = Arc::new(Providers {
            primary: tracker(&config, ProviderFamily::Primary, &config.primary_providers)?,
            secondary: tracker(&config, ProviderFamily::Secondary, &config.secondary_providers)?,
        });

        let engine = FetchEngine::new(
            Arc::clone(&transport),
            Arc::clone(&providers),
            config.request_timeout(),
            config.retry_delay(),
        );

        let mut families = vec![ProviderFamily::Primary];
        if config.fallback_enabled {
            families.push(ProviderFamily::Secondary);
        }

        let paginator = Paginator::new(
            engine,
            Arc::new(ResultCache::new()),
            PaginatorOptions {
                ttl: config.cache_ttl(),
                max_attempts: config.max_attempts,
                page_size: config.page_size,
                region: config.region.clone(),
                families,
            },
        );

        let resolver = StreamResolver::new(
            transport,
            providers,
            config.request_timeout(),
            config.fallback_enabled,
        );

        info!(
            primary = config.primary_providers.len(),
            secondary = config.secondary_providers.len(),
            fallback = config.fallback_enabled,
            "Session ready"
        );

        Ok(Self {
            search_gate: Debouncer::new(config.search_debounce()),
            config,
            paginator,
            resolver,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache {
        self.paginator.cache()
    }

    /// Up to `desired` records for `key`; see [`Paginator::get_page`].
    pub async fn get_page(
        &self,
        key: &QueryKey,
        desired: usize,
        force_refresh: bool,
    ) -> Vec<CanonicalRecord> {
        self.paginator.get_page(key, desired, force_refresh).await
    }

    /// Like [`get_page`](Self::get_page) but reports why nothing could be
    /// fetched.
    pub async fn try_get_page(
        &self,
        key: &QueryKey,
        desired: usize,
        force_refresh: bool,
    ) -> Result<Vec<CanonicalRecord>, FetchError> {
        self.paginator.try_get_page(key, desired, force_refresh).await
    }

    /// The next `increment` records for `key`. Empty means no more pages.
    pub async fn get_more_page(&self, key: &QueryKey, increment: usize) -> Vec<CanonicalRecord> {
        self.paginator.get_more_page(key, increment).await
    }

    pub async fn trending(&self, count: usize) -> Vec<CanonicalRecord> {
        self.get_page(&QueryKey::category(DEFAULT_CATEGORY), count, false)
            .await
    }

    /// Debounced search for interactive input.
    ///
    /// Returns `None` when a newer search arrived before this one settled.
    /// Blank queries are dropped without a request.
    pub async fn search(&self, query: &str, count: usize) -> Option<Vec<CanonicalRecord>> {
        let query = query.trim();
        if query.is_empty() {
            self.search_gate.cancel();
            return Some(Vec::new());
        }

        let key = QueryKey::search(query);
        self.search_gate
            .run(|| self.paginator.get_page(&key, count, false))
            .await
    }

    /// Resolve playable URLs for one item.
    pub async fn resolve_stream(&self, id: &str) -> Result<StreamManifest, ResolveError> {
        self.resolver.resolve_stream(id).await
    }

    /// Drop everything cached for `key`.
    pub async fn reset(&self, key: &QueryKey) {
        debug!(query = %key.value, "Resetting query");
        self.cache().reset(key).await;
    }
}

fn tracker(
    config: &EngineConfig,
    family: ProviderFamily,
    bases: &[String],
) -> Result<ProviderTracker, FetchError> {
    ProviderTracker::from_bases(family, bases, config.probe_strategy, config.probe_timeout())
}
