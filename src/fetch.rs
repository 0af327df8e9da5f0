//! Resilient metadata fetching.
//!
//! [`FetchEngine::fetch_metadata`] runs an explicit bounded loop: select a
//! provider, build the family's request URL, issue it under the per-attempt
//! timeout, and on a retryable failure rotate the provider and wait a fixed
//! delay before the next attempt. Attempts are strictly sequential.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::error::{FetchError, Result};
use crate::provider::{MetadataRequest, Page, ProviderFamily, ProviderTracker};
use crate::transport::{with_timeout, HttpTransport};

/// Trackers for both provider families.
pub struct Providers {
    pub primary: ProviderTracker,
    pub secondary: ProviderTracker,
}

impl Providers {
    pub fn tracker(&self, family: ProviderFamily) -> &ProviderTracker {
        match family {
            ProviderFamily::Primary => &self.primary,
            ProviderFamily::Secondary => &self.secondary,
        }
    }
}

#[derive(Clone)]
pub struct FetchEngine {
    transport: Arc<dyn HttpTransport>,
    providers: Arc<Providers>,
    request_timeout: Duration,
    retry_delay: Duration,
}

impl FetchEngine {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        providers: Arc<Providers>,
        request_timeout: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            transport,
            providers,
            request_timeout,
            retry_delay,
        }
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    /// Fetch one page of normalized records.
    ///
    /// An empty page is a successful "no results" and is never retried.
    /// After `max_attempts` retryable failures the last error is returned.
    #[instrument(skip(self, request), fields(family = family.name(), endpoint = ?request.endpoint))]
    pub async fn fetch_metadata(
        &self,
        family: ProviderFamily,
        request: &MetadataRequest,
        max_attempts: u32,
    ) -> Result<Page> {
        let tracker = self.providers.tracker(family);
        let schema = family.schema();

        let mut remaining = max_attempts.max(1);
        let mut last_error = FetchError::NoProviders(family.name());

        while remaining > 0 {
            remaining -= 1;

            let endpoint = tracker.select_provider(self.transport.as_ref()).await?;
            let url = schema.metadata_url(&endpoint.base, request)?;
            debug!(url = %url, remaining, "Fetching metadata");

            let request = self.transport.get_json(&url, self.request_timeout);
            let result = match with_timeout(&url, self.request_timeout, request).await {
                Ok(body) => schema.translate_page(&url, &body, Utc::now()),
                Err(e) => Err(e),
            };

            match result {
                Ok(page) => {
                    info!(
                        provider = %endpoint.base,
                        records = page.records.len(),
                        has_cursor = page.cursor.is_some(),
                        "Metadata fetched"
                    );
                    return Ok(page);
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        provider = %endpoint.base,
                        error = %e,
                        remaining,
                        "Metadata fetch failed"
                    );
                    tracker.rotate();
                    last_error = e;
                    if remaining > 0 {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{LogicalEndpoint, ProbeStrategy};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use url::Url;

    /// Probes always succeed; metadata calls pop scripted answers.
    struct Scripted {
        answers: Mutex<Vec<Result<Value>>>,
        metadata_calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(mut answers: Vec<Result<Value>>) -> Self {
            answers.reverse();
            Self {
                answers: Mutex::new(answers),
                metadata_calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.metadata_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for Scripted {
        async fn get_json(&self, url: &Url, _timeout: Duration) -> Result<Value> {
            if url.path().ends_with("/stats") {
                return Ok(json!({}));
            }
            self.metadata_calls.lock().unwrap().push(url.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(json!([])))
        }
    }

    fn engine(transport: Arc<Scripted>) -> FetchEngine {
        let bases: Vec<String> = vec!["https://a.example".into(), "https://b.example".into()];
        let providers = Providers {
            primary: ProviderTracker::from_bases(
                ProviderFamily::Primary,
                &bases,
                ProbeStrategy::ProbeAll,
                Duration::from_millis(100),
            )
            .unwrap(),
            secondary: ProviderTracker::new(
                ProviderFamily::Secondary,
                Vec::new(),
                ProbeStrategy::ProbeAll,
                Duration::from_millis(100),
            ),
        };
        FetchEngine::new(
            transport,
            Arc::new(providers),
            Duration::from_secs(1),
            Duration::from_millis(500),
        )
    }

    fn failure(status: u16) -> Result<Value> {
        Err(FetchError::UpstreamStatus {
            url: "https://x.example".into(),
            status,
        })
    }

    fn popular() -> MetadataRequest {
        MetadataRequest::new(LogicalEndpoint::Popular)
    }

    #[tokio::test(start_paused = true)]
    async fn retries_rotate_provider() {
        let transport = Arc::new(Scripted::new(vec![
            failure(502),
            Ok(json!([{ "videoId": "v1", "title": "One" }])),
        ]));
        let engine = engine(Arc::clone(&transport));

        let page = engine
            .fetch_metadata(ProviderFamily::Primary, &popular(), 3)
            .await
            .unwrap();

        assert_eq!(page.records.len(), 1);
        assert_eq!(
            transport.calls(),
            [
                "https://a.example/api/v1/popular",
                "https://b.example/api/v1/popular"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let transport = Arc::new(Scripted::new(vec![failure(500), failure(502), failure(503)]));
        let engine = engine(Arc::clone(&transport));

        let err = engine
            .fetch_metadata(ProviderFamily::Primary, &popular(), 3)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::UpstreamStatus { status: 503, .. }));
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts_only() {
        let transport = Arc::new(Scripted::new(vec![failure(500), failure(500)]));
        let engine = engine(Arc::clone(&transport));

        let started = tokio::time::Instant::now();
        let _ = engine
            .fetch_metadata(ProviderFamily::Primary, &popular(), 2)
            .await;

        // One delay between two attempts, none after the last
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_array_is_not_retried() {
        let transport = Arc::new(Scripted::new(vec![Ok(json!([]))]));
        let engine = engine(Arc::clone(&transport));

        let page = engine
            .fetch_metadata(ProviderFamily::Primary, &popular(), 3)
            .await
            .unwrap();

        assert!(page.is_empty());
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let transport = Arc::new(Scripted::new(vec![Ok(json!([{ "videoId": "v" }]))]));
        let engine = engine(Arc::clone(&transport));

        let page = engine
            .fetch_metadata(ProviderFamily::Primary, &popular(), 0)
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
    }

    #[tokio::test]
    async fn empty_family_fails_fast() {
        let transport = Arc::new(Scripted::new(Vec::new()));
        let engine = engine(Arc::clone(&transport));

        let err = engine
            .fetch_metadata(ProviderFamily::Secondary, &popular(), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NoProviders(_)));
        assert!(transport.calls().is_empty());
    }

    /// Probes succeed; metadata requests never answer.
    struct Stalled;

    #[async_trait]
    impl HttpTransport for Stalled {
        async fn get_json(&self, _url: &Url, _timeout: Duration) -> Result<Value> {
            std::future::pending().await
        }

        async fn probe(&self, _url: &Url, _timeout: Duration) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_provider_times_out_and_is_retried() {
        let engine = engine(Arc::new(Scripted::new(Vec::new())));
        let engine = FetchEngine::new(
            Arc::new(Stalled),
            Arc::clone(&engine.providers),
            Duration::from_secs(1),
            Duration::from_millis(500),
        );

        let started = tokio::time::Instant::now();
        let err = engine
            .fetch_metadata(ProviderFamily::Primary, &popular(), 3)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout { timeout_ms: 1000, .. }));
        // Three timeouts and two delays
        assert_eq!(started.elapsed(), Duration::from_secs(4));
        // Each timeout rotated the provider: a, b, a
        assert_eq!(engine.providers().primary.current_index(), 1);
    }
}
