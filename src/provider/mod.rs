//! Provider families and their wire schemas.
//!
//! Two families of interchangeable mirrors are supported. Each family is a
//! [`FamilySchema`]: it knows how to build metadata and detail request URLs
//! for one of its mirrors and how to translate that family's JSON into
//! [`Page`]s and [`StreamManifest`]s. Call sites dispatch through
//! [`ProviderFamily::schema`] and never branch on the family themselves.

pub mod primary;
pub mod secondary;
pub mod tracker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{FetchError, ResolveError, Result};
use crate::normalize::{normalize_item, CanonicalRecord};
use crate::stream::StreamManifest;

pub use primary::PrimarySchema;
pub use secondary::SecondarySchema;
pub use tracker::{ProbeStrategy, ProviderTracker};

/// A group of providers sharing one request/response schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    /// Versioned `/api/v1` schema with page-number pagination.
    Primary,
    /// Unversioned schema with cursor pagination and flat stream lists.
    Secondary,
}

impl ProviderFamily {
    /// Short lowercase family name for logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    pub fn schema(self) -> &'static dyn FamilySchema {
        match self {
            Self::Primary => &PrimarySchema,
            Self::Secondary => &SecondarySchema,
        }
    }
}

/// One upstream mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub base: Url,
    pub family: ProviderFamily,
}

impl ProviderEndpoint {
    pub fn parse(base: &str, family: ProviderFamily) -> Result<Self> {
        Ok(Self {
            base: Url::parse(base)?,
            family,
        })
    }
}

/// The family-independent metadata operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalEndpoint {
    /// Trending list, optionally narrowed to a provider category.
    Trending { category: Option<String> },
    Popular,
    Search { query: String },
}

/// Where in a result list a request should start.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Continuation {
    #[default]
    First,
    /// 1-based page number, for families without cursors.
    Page(u32),
    /// Opaque provider token from a previous [`Page`].
    Cursor(String),
}

/// A metadata request before it is bound to a concrete provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    pub endpoint: LogicalEndpoint,
    pub region: Option<String>,
    pub continuation: Continuation,
    /// Extra query parameters appended verbatim.
    pub params: Vec<(String, String)>,
}

impl MetadataRequest {
    pub fn new(endpoint: LogicalEndpoint) -> Self {
        Self {
            endpoint,
            region: None,
            continuation: Continuation::First,
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    #[must_use]
    pub fn continuation(mut self, continuation: Continuation) -> Self {
        self.continuation = continuation;
        self
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

/// One page of normalized results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<CanonicalRecord>,
    /// Token for the next page; `None` means none, or that the family
    /// paginates by page number.
    pub cursor: Option<String>,
}

impl Page {
    /// An empty page is "no results", not a failure.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Request builder and response translator for one provider family.
pub trait FamilySchema: Send + Sync {
    fn family(&self) -> ProviderFamily;

    /// Path segments of the lightweight liveness endpoint.
    fn probe_path(&self) -> &'static [&'static str];

    /// Whether [`Page::cursor`] is meaningful for this family.
    fn supports_cursor(&self) -> bool;

    fn metadata_url(&self, base: &Url, request: &MetadataRequest) -> Result<Url>;

    fn detail_url(&self, base: &Url, id: &str) -> Result<Url>;

    /// Translate a metadata response. `url` is only used for error context.
    fn translate_page(&self, url: &Url, body: &Value, now: DateTime<Utc>) -> Result<Page>;

    /// Translate a detail response into a manifest, or explain why it is
    /// unusable. URLs are returned as the provider sent them.
    fn translate_manifest(
        &self,
        base: &Url,
        id: &str,
        body: &Value,
    ) -> std::result::Result<StreamManifest, ResolveError>;
}

/// Append path segments to a provider base, keeping any base path prefix.
pub(crate) fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|()| FetchError::InvalidUrl(format!("{base} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Normalize every item of a JSON array, dropping items without an id and
/// items whose `type` marks them as something other than a video.
pub(crate) fn normalize_items(
    items: &[Value],
    video_types: &[&str],
    now: DateTime<Utc>,
) -> Vec<CanonicalRecord> {
    items
        .iter()
        .filter(|item| {
            item.get("type")
                .and_then(Value::as_str)
                .is_none_or(|t| video_types.contains(&t))
        })
        .filter_map(|item| normalize_item(item, now))
        .collect()
}

pub(crate) fn unusable(base: &Url, reason: impl Into<String>) -> ResolveError {
    ResolveError::Unusable {
        provider: base.to_string(),
        reason: reason.into(),
    }
}
