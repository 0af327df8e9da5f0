//! HTTP transport used to talk to providers.
//!
//! Every request goes through [`HttpTransport`], so the engine can be
//! driven by an in-memory transport in tests and by [`ReqwestTransport`]
//! in production. Each call carries its own timeout; a timeout is reported
//! as [`FetchError::Timeout`] and is retried like any transport failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{FetchError, Result};

const USER_AGENT: &str = concat!("tubemux/", env!("CARGO_PKG_VERSION"));

/// Issues a GET and decodes the JSON body.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Fetch `url` as JSON, giving up after `timeout`.
    async fn get_json(&self, url: &Url, timeout: Duration) -> Result<Value>;

    /// Liveness check: succeeds on any 2xx, whatever the body.
    ///
    /// The default decodes the body as JSON; transports that can look at
    /// the status alone should override it.
    async fn probe(&self, url: &Url, timeout: Duration) -> Result<()> {
        self.get_json(url, timeout).await.map(|_| ())
    }
}

/// Run `request` under `timeout`, reporting expiry as [`FetchError::Timeout`].
///
/// The engine wraps every transport call in this, so a transport that
/// never answers still fails (and is retried) like any other.
pub async fn with_timeout<T, F>(url: &Url, timeout: Duration, request: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, request).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
            url: url.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// [`HttpTransport`] backed by a pooled `reqwest` client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            // Keep connections to mirrors alive between attempts
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Get the underlying reqwest client
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self), fields(url = %url))]
    async fn get_json(&self, url: &Url, timeout: Duration) -> Result<Value> {
        let request = async {
            let response = self
                .client
                .get(url.as_str())
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| transport_error(url, &e))?;

            let status = response.status();
            debug!(status = %status, version = ?response.version(), "Response received");

            if !status.is_success() {
                return Err(FetchError::UpstreamStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = response.text().await.map_err(|e| transport_error(url, &e))?;
            serde_json::from_str(&body).map_err(|e| FetchError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
        };

        with_timeout(url, timeout, request).await
    }

    #[instrument(skip(self), fields(url = %url))]
    async fn probe(&self, url: &Url, timeout: Duration) -> Result<()> {
        let request = async {
            let response = self
                .client
                .get(url.as_str())
                .send()
                .await
                .map_err(|e| transport_error(url, &e))?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(FetchError::UpstreamStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                })
            }
        };

        with_timeout(url, timeout, request).await
    }
}

fn transport_error(url: &Url, err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout {
            url: url.to_string(),
            timeout_ms: 0,
        };
    }
    FetchError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}
