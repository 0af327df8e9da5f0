//! Provider health and selection.
//!
//! A [`ProviderTracker`] owns the ordered mirror list for one family and a
//! rotating cursor into it. The cursor only moves forward (wrapping), on
//! failed probes and on caller-reported request failures; it is never
//! persisted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use super::{endpoint_url, ProviderEndpoint, ProviderFamily};
use crate::error::{FetchError, Result};
use crate::transport::{with_timeout, HttpTransport};

/// What to do when the current provider fails its liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStrategy {
    /// Advance once and use the next provider without probing it.
    Optimistic,
    /// Keep probing, at most once per provider, and settle for the last
    /// one tried if none answers.
    #[default]
    ProbeAll,
}

pub struct ProviderTracker {
    family: ProviderFamily,
    endpoints: Vec<ProviderEndpoint>,
    cursor: AtomicUsize,
    strategy: ProbeStrategy,
    probe_timeout: Duration,
}

impl ProviderTracker {
    pub fn new(
        family: ProviderFamily,
        endpoints: Vec<ProviderEndpoint>,
        strategy: ProbeStrategy,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            family,
            endpoints,
            cursor: AtomicUsize::new(0),
            strategy,
            probe_timeout,
        }
    }

    /// Build a tracker from base URL strings.
    pub fn from_bases(
        family: ProviderFamily,
        bases: &[String],
        strategy: ProbeStrategy,
        probe_timeout: Duration,
    ) -> Result<Self> {
        let endpoints = bases
            .iter()
            .map(|base| ProviderEndpoint::parse(base, family))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(family, endpoints, strategy, probe_timeout))
    }

    pub fn family(&self) -> ProviderFamily {
        self.family
    }

    /// Every endpoint in configured order, independent of the cursor.
    pub fn endpoints(&self) -> &[ProviderEndpoint] {
        &self.endpoints
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Index the cursor currently points at.
    pub fn current_index(&self) -> usize {
        match self.endpoints.len() {
            0 => 0,
            len => self.cursor.load(Ordering::Relaxed) % len,
        }
    }

    pub fn current(&self) -> Result<ProviderEndpoint> {
        self.endpoints
            .get(self.current_index())
            .cloned()
            .ok_or(FetchError::NoProviders(self.family.name()))
    }

    /// Unconditionally advance the cursor (wrapping). Returns the new index.
    pub fn rotate(&self) -> usize {
        let len = self.endpoints.len();
        if len == 0 {
            return 0;
        }
        let previous = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| Some((i + 1) % len))
            .unwrap_or_default();
        let next = (previous + 1) % len;
        debug!(family = self.family.name(), index = next, "Rotated provider");
        next
    }

    /// Pick a provider to send the next request to.
    ///
    /// Probes the provider under the cursor. A live provider is returned
    /// as is. Otherwise the cursor advances and, depending on the
    /// [`ProbeStrategy`], the next provider is returned unprobed or the
    /// remaining providers are probed in turn. When every probe fails the
    /// last provider tried is returned anyway; the request itself decides.
    pub async fn select_provider(&self, transport: &dyn HttpTransport) -> Result<ProviderEndpoint> {
        let len = self.endpoints.len();
        if len == 0 {
            return Err(FetchError::NoProviders(self.family.name()));
        }

        let mut candidate = self.current()?;
        for probed in 1..=len {
            if self.probe(transport, &candidate).await {
                return Ok(candidate);
            }

            if probed == len {
                break;
            }

            self.rotate();
            candidate = self.current()?;

            if self.strategy == ProbeStrategy::Optimistic {
                debug!(provider = %candidate.base, "Using next provider without probing");
                return Ok(candidate);
            }
        }

        warn!(
            family = self.family.name(),
            provider = %candidate.base,
            "No provider answered its liveness probe, using last tried"
        );
        Ok(candidate)
    }

    async fn probe(&self, transport: &dyn HttpTransport, endpoint: &ProviderEndpoint) -> bool {
        let url = match endpoint_url(&endpoint.base, self.family.schema().probe_path()) {
            Ok(url) => url,
            Err(e) => {
                warn!(provider = %endpoint.base, error = %e, "Cannot build probe URL");
                return false;
            }
        };

        let probe = transport.probe(&url, self.probe_timeout);
        match with_timeout(&url, self.probe_timeout, probe).await {
            Ok(()) => true,
            Err(e) => {
                debug!(provider = %endpoint.base, error = %e, "Liveness probe failed");
                false
            }
        }
    }
}
