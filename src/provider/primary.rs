//! Primary family: versioned `/api/v1` mirrors.
//!
//! Metadata endpoints return bare JSON arrays and paginate by page number.
//! Detail responses carry two format collections, `formatStreams` (muxed
//! progressive) and `adaptiveFormats` (separate audio/video), plus an
//! optional `hlsUrl` for live content.

use chrono::{DateTime, Utc};
use serde_json::Value;
use url::Url;

use super::{
    endpoint_url, normalize_items, unusable, Continuation, FamilySchema, LogicalEndpoint,
    MetadataRequest, Page, ProviderFamily,
};
use crate::error::{FetchError, ResolveError, Result};
use crate::stream::manifest::{quality_map, Format, StreamManifest};

const API_PREFIX: [&str; 2] = ["api", "v1"];

pub struct PrimarySchema;

impl FamilySchema for PrimarySchema {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Primary
    }

    fn probe_path(&self) -> &'static [&'static str] {
        &["api", "v1", "stats"]
    }

    fn supports_cursor(&self) -> bool {
        false
    }

    fn metadata_url(&self, base: &Url, request: &MetadataRequest) -> Result<Url> {
        let leaf = match &request.endpoint {
            LogicalEndpoint::Trending { .. } => "trending",
            LogicalEndpoint::Popular => "popular",
            LogicalEndpoint::Search { .. } => "search",
        };
        let mut url = endpoint_url(base, &[API_PREFIX[0], API_PREFIX[1], leaf])?;

        {
            let mut query = url.query_pairs_mut();
            match &request.endpoint {
                LogicalEndpoint::Trending {
                    category: Some(category),
                } => {
                    query.append_pair("type", category);
                }
                LogicalEndpoint::Search { query: q } => {
                    query.append_pair("q", q);
                    query.append_pair("type", "video");
                }
                _ => {}
            }

            if let Some(region) = &request.region {
                query.append_pair("region", region);
            }

            match &request.continuation {
                Continuation::Page(page) if *page > 1 => {
                    query.append_pair("page", &page.to_string());
                }
                // No cursor support; a stray cursor means "first page"
                _ => {}
            }

            for (key, value) in &request.params {
                query.append_pair(key, value);
            }
        }

        // An empty query_pairs_mut leaves a dangling '?'
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    fn detail_url(&self, base: &Url, id: &str) -> Result<Url> {
        endpoint_url(base, &[API_PREFIX[0], API_PREFIX[1], "videos", id])
    }

    fn translate_page(&self, url: &Url, body: &Value, now: DateTime<Utc>) -> Result<Page> {
        let items = body.as_array().ok_or_else(|| FetchError::Decode {
            url: url.to_string(),
            message: error_message(body)
                .unwrap_or("expected a JSON array")
                .to_string(),
        })?;

        Ok(Page {
            records: normalize_items(items, &["video", "shortVideo"], now),
            cursor: None,
        })
    }

    fn translate_manifest(
        &self,
        base: &Url,
        id: &str,
        body: &Value,
    ) -> std::result::Result<StreamManifest, ResolveError> {
        if let Some(message) = error_message(body) {
            return Err(unusable(base, message));
        }

        let muxed = format_list(body, "formatStreams", |_| true, true);
        let adaptive_video = format_list(
            body,
            "adaptiveFormats",
            |f| {
                f.get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|t| t.starts_with("video/"))
            },
            false,
        );
        let has_adaptive = body
            .get("adaptiveFormats")
            .and_then(Value::as_array)
            .is_some_and(|a| !a.is_empty());

        if muxed.is_empty() && !has_adaptive {
            return Err(unusable(base, "no formatStreams or adaptiveFormats"));
        }

        let ladder = if muxed.is_empty() { &adaptive_video } else { &muxed };
        let hls = body.get("hlsUrl").and_then(Value::as_str);
        let urls = quality_map(&muxed, ladder, hls);

        Ok(StreamManifest {
            id: id.to_string(),
            provider: base.to_string(),
            family: ProviderFamily::Primary,
            urls,
            title: str_field(body, "title"),
            duration_seconds: body.get("lengthSeconds").and_then(Value::as_u64),
            author: str_field(body, "author"),
            description: str_field(body, "description"),
        })
    }
}

fn format_list(
    body: &Value,
    field: &str,
    keep: impl Fn(&Value) -> bool,
    muxed: bool,
) -> Vec<Format> {
    body.get(field)
        .and_then(Value::as_array)
        .map(|formats| {
            formats
                .iter()
                .filter(|f| keep(*f))
                .filter_map(|f| {
                    let url = f.get("url").and_then(Value::as_str)?;
                    let label = f
                        .get("qualityLabel")
                        .or_else(|| f.get("resolution"))
                        .and_then(Value::as_str);
                    Some(Format::new(url, label, muxed))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn error_message(body: &Value) -> Option<&str> {
    body.get("error").and_then(Value::as_str)
}

fn str_field(body: &Value, field: &str) -> Option<String> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
