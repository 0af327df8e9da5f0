//! Engine configuration loaded from `~/.config/tubemux/config.toml`.
//!
//! Read once at startup. There is no hot-reload: a [`Session`](crate::Session)
//! keeps the values it was built with for its whole lifetime.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;
use crate::provider::tracker::ProbeStrategy;

/// Public primary-family mirrors used when the config names none.
pub const DEFAULT_PRIMARY_PROVIDERS: &[&str] = &[
    "https://invidious.nerdvpn.de",
    "https://inv.nadeko.net",
    "https://yewtu.be",
    "https://invidious.privacyredirect.com",
];

/// Public secondary-family mirrors used when the config names none.
pub const DEFAULT_SECONDARY_PROVIDERS: &[&str] = &[
    "https://pipedapi.kavin.rocks",
    "https://pipedapi.adminforge.de",
];

/// Tunables for fetching, caching and stream resolution.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Attempts per metadata fetch, including the first.
    pub max_attempts: u32,
    /// Per-attempt timeout for metadata and detail requests.
    pub request_timeout_ms: u64,
    /// Timeout for the liveness probe.
    pub probe_timeout_ms: u64,
    /// Fixed delay between fetch attempts.
    pub retry_delay_ms: u64,
    /// Freshness threshold for cache entries.
    pub cache_ttl_secs: u64,
    /// Whether the secondary family is consulted after the primary fails.
    pub fallback_enabled: bool,
    pub probe_strategy: ProbeStrategy,
    /// Region code passed to category endpoints.
    pub region: String,
    /// Records requested per page from a provider.
    pub page_size: usize,
    /// Quiet interval before a debounced search fires.
    pub search_debounce_ms: u64,
    pub primary_providers: Vec<String>,
    pub secondary_providers: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            request_timeout_ms: 8_000,
            probe_timeout_ms: 2_500,
            retry_delay_ms: 1_000,
            cache_ttl_secs: 600,
            fallback_enabled: true,
            probe_strategy: ProbeStrategy::ProbeAll,
            region: "US".to_string(),
            page_size: 20,
            search_debounce_ms: 300,
            primary_providers: DEFAULT_PRIMARY_PROVIDERS
                .iter()
                .map(ToString::to_string)
                .collect(),
            secondary_providers: DEFAULT_SECONDARY_PROVIDERS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Load from the default location, falling back to defaults if the file
    /// doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_path(&path)
    }

    /// Load and validate a specific TOML file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.request_timeout_ms == 0 || self.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if self.primary_providers.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one primary provider is required".into(),
            ));
        }

        for base in self.primary_providers.iter().chain(&self.secondary_providers) {
            let parsed = Url::parse(base)
                .map_err(|e| ConfigError::Invalid(format!("provider {base}: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!(
                    "provider {base}: scheme must be http or https"
                )));
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

/// Return the path to the engine config file.
fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tubemux")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.region, "US");
        assert!(config.fallback_enabled);
        assert_eq!(config.probe_strategy, ProbeStrategy::ProbeAll);
        assert_eq!(config.primary_providers.len(), DEFAULT_PRIMARY_PROVIDERS.len());
        config.validate().unwrap();
    }

    #[test]
    fn parse_overrides() {
        let toml_str = r#"
max_attempts = 5
cache_ttl_secs = 60
fallback_enabled = false
probe_strategy = "optimistic"
region = "DE"
primary_providers = ["https://a.example", "https://b.example"]
secondary_providers = []
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert!(!config.fallback_enabled);
        assert_eq!(config.probe_strategy, ProbeStrategy::Optimistic);
        assert_eq!(config.region, "DE");
        assert_eq!(config.primary_providers.len(), 2);
        assert!(config.secondary_providers.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn rejects_zero_attempts() {
        let config = EngineConfig {
            max_attempts: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_non_http_provider() {
        let config = EngineConfig {
            primary_providers: vec!["ftp://mirror.example".into()],
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_primary_list() {
        let config = EngineConfig {
            primary_providers: Vec::new(),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retry_delay_ms = 50\npage_size = 10").unwrap();

        let config = EngineConfig::from_path(file.path()).unwrap();
        assert_eq!(config.retry_delay(), Duration::from_millis(50));
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn from_path_reports_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_attempts = \"lots\"").unwrap();

        let err = EngineConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
