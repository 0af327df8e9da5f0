//! Stream resolution fallback chain.
//!
//! For one item, walk every primary provider in configured order, then
//! (if fallback is enabled) every secondary provider. The first provider
//! whose detail response translates into a usable manifest wins; nothing
//! after it is contacted. Requests are strictly sequential and resolution
//! never touches the metadata cache or the selection cursors.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::manifest::StreamManifest;
use crate::error::{AttemptCause, ResolveAttempt, ResolveError};
use crate::fetch::Providers;
use crate::provider::{ProviderEndpoint, ProviderFamily};
use crate::transport::{with_timeout, HttpTransport};

pub struct StreamResolver {
    transport: Arc<dyn HttpTransport>,
    providers: Arc<Providers>,
    timeout: Duration,
    fallback_enabled: bool,
}

impl StreamResolver {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        providers: Arc<Providers>,
        timeout: Duration,
        fallback_enabled: bool,
    ) -> Self {
        Self {
            transport,
            providers,
            timeout,
            fallback_enabled,
        }
    }

    fn families(&self) -> &'static [ProviderFamily] {
        if self.fallback_enabled {
            &[ProviderFamily::Primary, ProviderFamily::Secondary]
        } else {
            &[ProviderFamily::Primary]
        }
    }

    /// Resolve playable URLs for `id`.
    ///
    /// Returns [`ResolveError::NoPlayableSource`] only once every provider
    /// of every enabled family has failed; it lists each attempt.
    #[instrument(skip(self))]
    pub async fn resolve_stream(&self, id: &str) -> Result<StreamManifest, ResolveError> {
        let mut attempts = Vec::new();

        for &family in self.families() {
            for endpoint in self.providers.tracker(family).endpoints() {
                match self.try_provider(endpoint, id).await {
                    Ok(manifest) => {
                        info!(
                            provider = %endpoint.base,
                            family = family.name(),
                            qualities = manifest.urls.len(),
                            "Resolved stream"
                        );
                        return Ok(manifest);
                    }
                    Err(cause) => {
                        warn!(
                            provider = %endpoint.base,
                            family = family.name(),
                            %cause,
                            "Provider could not resolve stream"
                        );
                        attempts.push(ResolveAttempt {
                            provider: endpoint.base.to_string(),
                            cause,
                        });
                    }
                }
            }
            debug!(family = family.name(), "Provider family exhausted");
        }

        Err(ResolveError::NoPlayableSource {
            id: id.to_string(),
            attempts,
        })
    }

    async fn try_provider(
        &self,
        endpoint: &ProviderEndpoint,
        id: &str,
    ) -> Result<StreamManifest, AttemptCause> {
        let schema = endpoint.family.schema();
        let url = schema.detail_url(&endpoint.base, id)?;

        let request = self.transport.get_json(&url, self.timeout);
        let body = with_timeout(&url, self.timeout, request).await?;

        let mut manifest = schema.translate_manifest(&endpoint.base, id, &body)?;
        if !manifest.is_usable() {
            return Err(AttemptCause::Unusable("no format mapped to a quality".into()));
        }

        manifest.absolutize(&endpoint.base);
        Ok(manifest)
    }
}
