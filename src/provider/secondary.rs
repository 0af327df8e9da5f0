//! Secondary family: unversioned mirrors with cursor pagination.
//!
//! Search responses are `{ items, nextpage }` objects and continue through
//! `nextpage/search`. Trending responses are bare arrays. Detail responses
//! use `videoStreams`/`audioStreams` with one flat `quality` per stream
//! and an `hls` manifest URL.

use chrono::{DateTime, Utc};
use serde_json::Value;
use url::Url;

use super::{
    endpoint_url, normalize_items, unusable, Continuation, FamilySchema, LogicalEndpoint,
    MetadataRequest, Page, ProviderFamily,
};
use crate::error::{FetchError, ResolveError, Result};
use crate::stream::manifest::{quality_map, Format, Quality, StreamManifest};

pub struct SecondarySchema;

impl FamilySchema for SecondarySchema {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Secondary
    }

    fn probe_path(&self) -> &'static [&'static str] {
        &["healthcheck"]
    }

    fn supports_cursor(&self) -> bool {
        true
    }

    fn metadata_url(&self, base: &Url, request: &MetadataRequest) -> Result<Url> {
        let cursor = match &request.continuation {
            Continuation::Cursor(token) => Some(token.as_str()),
            _ => None,
        };

        let mut url = match (&request.endpoint, cursor) {
            // No category or "popular" feed in this family; both fall back to trending
            (LogicalEndpoint::Trending { .. } | LogicalEndpoint::Popular, _) => {
                endpoint_url(base, &["trending"])?
            }
            (LogicalEndpoint::Search { .. }, None) => endpoint_url(base, &["search"])?,
            (LogicalEndpoint::Search { .. }, Some(_)) => {
                endpoint_url(base, &["nextpage", "search"])?
            }
        };

        {
            let mut query = url.query_pairs_mut();
            match &request.endpoint {
                LogicalEndpoint::Search { query: q } => {
                    if let Some(token) = cursor {
                        query.append_pair("nextpage", token);
                    }
                    query.append_pair("q", q);
                    query.append_pair("filter", "videos");
                }
                LogicalEndpoint::Trending { .. } | LogicalEndpoint::Popular => {
                    query.append_pair("region", request.region.as_deref().unwrap_or("US"));
                }
            }
            for (key, value) in &request.params {
                query.append_pair(key, value);
            }
        }

        Ok(url)
    }

    fn detail_url(&self, base: &Url, id: &str) -> Result<Url> {
        endpoint_url(base, &["streams", id])
    }

    fn translate_page(&self, url: &Url, body: &Value, now: DateTime<Utc>) -> Result<Page> {
        if let Some(items) = body.as_array() {
            return Ok(Page {
                records: normalize_items(items, &["stream"], now),
                cursor: None,
            });
        }

        let items = body
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Decode {
                url: url.to_string(),
                message: error_message(body)
                    .unwrap_or("expected an array or an object with items")
                    .to_string(),
            })?;

        let cursor = body
            .get("nextpage")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty() && *token != "null")
            .map(ToString::to_string);

        Ok(Page {
            records: normalize_items(items, &["stream"], now),
            cursor,
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

        let video = streams(body, "videoStreams");
        let audio = streams(body, "audioStreams");
        if video.is_empty() && audio.is_empty() {
            return Err(unusable(base, "no videoStreams or audioStreams"));
        }

        let muxed: Vec<Format> = video.iter().filter(|f| f.muxed).cloned().collect();
        let ladder = if muxed.is_empty() { &video } else { &muxed };
        let hls = body.get("hls").and_then(Value::as_str);
        let mut urls = quality_map(&video, ladder, hls);

        // Audio-only items still play
        if urls.is_empty() {
            if let Some(first) = audio.first() {
                urls.insert(Quality::Direct, first.url.clone());
            }
        }

        Ok(StreamManifest {
            id: id.to_string(),
            provider: base.to_string(),
            family: ProviderFamily::Secondary,
            urls,
            title: str_field(body, "title"),
            duration_seconds: body
                .get("duration")
                .and_then(Value::as_i64)
                .and_then(|d| u64::try_from(d).ok())
                .filter(|d| *d > 0),
            author: str_field(body, "uploader"),
            description: str_field(body, "description"),
        })
    }
}

fn streams(body: &Value, field: &str) -> Vec<Format> {
    body.get(field)
        .and_then(Value::as_array)
        .map(|streams| {
            streams
                .iter()
                .filter_map(|s| {
                    let url = s.get("url").and_then(Value::as_str)?;
                    let video_only = s.get("videoOnly").and_then(Value::as_bool).unwrap_or(false);
                    let label = s.get("quality").and_then(Value::as_str);
                    Some(Format::new(url, label, !video_only))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn error_message(body: &Value) -> Option<&str> {
    body.get("error")
        .and_then(Value::as_str)
        .or_else(|| body.get("message").and_then(Value::as_str))
}

fn str_field(body: &Value, field: &str) -> Option<String> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Url {
        Url::parse("https://piped.example").unwrap()
    }

    #[test]
    fn first_search_page() {
        let request = MetadataRequest::new(LogicalEndpoint::Search {
            query: "foo".into(),
        });
        let url = SecondarySchema.metadata_url(&base(), &request).unwrap();
        assert_eq!(url.as_str(), "https://piped.example/search?q=foo&filter=videos");
    }

    #[test]
    fn cursor_continuation() {
        let request = MetadataRequest::new(LogicalEndpoint::Search {
            query: "foo".into(),
        })
        .continuation(Continuation::Cursor("tok{1}".into()));
        let url = SecondarySchema.metadata_url(&base(), &request).unwrap();
        assert_eq!(
            url.as_str(),
            "https://piped.example/nextpage/search?nextpage=tok%7B1%7D&q=foo&filter=videos"
        );
    }

    #[test]
    fn category_maps_to_regional_trending() {
        let request = MetadataRequest::new(LogicalEndpoint::Trending {
            category: Some("music".into()),
        })
        .region("GB");
        let url = SecondarySchema.metadata_url(&base(), &request).unwrap();
        assert_eq!(url.as_str(), "https://piped.example/trending?region=GB");
    }

    #[test]
    fn search_page_with_cursor() {
        let body = json!({
            "items": [
                { "type": "stream", "url": "/watch?v=s1", "title": "S1", "uploaderName": "U" },
                { "type": "channel", "url": "/channel/UC1", "name": "Chan" }
            ],
            "nextpage": "{\"page\":2}"
        });
        let page = SecondarySchema
            .translate_page(&base(), &body, Utc::now())
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].id, "s1");
        assert_eq!(page.cursor.as_deref(), Some("{\"page\":2}"));
    }

    #[test]
    fn null_cursor_means_last_page() {
        let body = json!({ "items": [], "nextpage": null });
        let page = SecondarySchema
            .translate_page(&base(), &body, Utc::now())
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(page.cursor, None);
    }

    #[test]
    fn trending_array() {
        let body = json!([{ "url": "/watch?v=t1", "title": "T1" }]);
        let page = SecondarySchema
            .translate_page(&base(), &body, Utc::now())
            .unwrap();
        assert_eq!(page.records[0].id, "t1");
    }

    #[test]
    fn manifest_translation() {
        let body = json!({
            "title": "Clip",
            "uploader": "Someone",
            "duration": 95,
            "hls": "https://piped.example/hls/abc.m3u8",
            "videoStreams": [
                { "url": "https://proxy.example/1080", "quality": "1080p", "videoOnly": true },
                { "url": "https://proxy.example/360", "quality": "360p", "videoOnly": false },
                { "url": "//proxy.example/720", "quality": "720p", "videoOnly": false }
            ],
            "audioStreams": [{ "url": "https://proxy.example/audio", "quality": "128 kbps" }]
        });
        let manifest = SecondarySchema
            .translate_manifest(&base(), "abc", &body)
            .unwrap();
        assert_eq!(manifest.family, ProviderFamily::Secondary);
        assert_eq!(manifest.url(Quality::Highest), Some("//proxy.example/720"));
        assert_eq!(manifest.url(Quality::Lowest), Some("https://proxy.example/360"));
        assert_eq!(manifest.url(Quality::Direct), Some("https://proxy.example/360"));
        assert_eq!(
            manifest.url(Quality::Auto),
            Some("https://piped.example/hls/abc.m3u8")
        );
        assert_eq!(manifest.duration_seconds, Some(95));
        assert_eq!(manifest.author.as_deref(), Some("Someone"));
    }

    #[test]
    fn audio_only_manifest() {
        let body = json!({
            "videoStreams": [],
            "audioStreams": [{ "url": "https://proxy.example/audio", "quality": "128 kbps" }]
        });
        let manifest = SecondarySchema
            .translate_manifest(&base(), "abc", &body)
            .unwrap();
        assert!(manifest.is_usable());
        assert_eq!(manifest.url(Quality::Direct), Some("https://proxy.example/audio"));
    }

    #[test]
    fn empty_streams_unusable() {
        let body = json!({ "videoStreams": [], "audioStreams": [] });
        assert!(SecondarySchema
            .translate_manifest(&base(), "abc", &body)
            .is_err());
    }

    #[test]
    fn error_body_unusable() {
        let body = json!({ "error": "Video unavailable", "message": "Sign in to confirm" });
        let err = SecondarySchema
            .translate_manifest(&base(), "abc", &body)
            .unwrap_err();
        assert!(err.to_string().contains("Video unavailable"));
    }
}
