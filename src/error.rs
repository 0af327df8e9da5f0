//! Error types for metadata fetching and stream resolution.
//!
//! Transport-level failures never escape as panics or raw `reqwest`
//! errors: they are translated into [`FetchError`] at the fetch engine
//! boundary and into [`ResolveError`] at the resolution chain boundary.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to a single provider.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    /// Network failure reaching the provider (DNS, connect, reset, body read).
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The per-attempt timeout elapsed before the provider answered.
    #[error("request to {url} timed out after {timeout_ms} ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// The provider answered with a non-2xx status.
    #[error("upstream {url} returned HTTP {status}")]
    UpstreamStatus { url: String, status: u16 },

    /// The body was not JSON, or not the JSON shape the family expects.
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// A provider base address could not be turned into a request URL.
    #[error("invalid provider URL: {0}")]
    InvalidUrl(String),

    /// The provider list for a family is empty.
    #[error("no providers configured for the {0} family")]
    NoProviders(&'static str),
}

impl FetchError {
    /// Whether another attempt (against a rotated provider) may succeed.
    ///
    /// Timeouts and non-2xx statuses are treated exactly like transport
    /// failures. Decode errors are retried too: a broken mirror usually
    /// serves an HTML error page with a 200.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidUrl(_) | Self::NoProviders(_))
    }
}

impl From<url::ParseError> for FetchError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// One failed provider attempt during stream resolution.
#[derive(Debug, Clone)]
pub struct ResolveAttempt {
    /// Base address of the provider that was tried.
    pub provider: String,
    pub cause: AttemptCause,
}

impl fmt::Display for ResolveAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.cause)
    }
}

/// Why one provider could not resolve a stream.
#[derive(Error, Debug, Clone)]
pub enum AttemptCause {
    /// The detail request failed (network, timeout, status, decode).
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The provider answered but nothing in the answer is playable.
    #[error("no playable formats: {0}")]
    Unusable(String),
}

impl From<ResolveError> for AttemptCause {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Unusable { reason, .. } => Self::Unusable(reason),
            other => Self::Unusable(other.to_string()),
        }
    }
}

/// Failure resolving playable URLs for one item.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A detail response arrived but had no usable format. Causes fallback
    /// to the next provider; only observed by callers through
    /// [`ResolveError::NoPlayableSource`].
    #[error("provider {provider} returned no playable formats: {reason}")]
    Unusable { provider: String, reason: String },

    /// Every provider in every enabled family was exhausted.
    #[error("no playable source for {id} after {} attempts", attempts.len())]
    NoPlayableSource {
        id: String,
        attempts: Vec<ResolveAttempt>,
    },
}

/// Failure loading or validating the engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure building a [`Session`](crate::Session).
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client or a provider endpoint could not be set up.
    #[error("failed to initialise transport: {0}")]
    Transport(#[from] FetchError),
}
