//! Canonical record normalization.
//!
//! Providers disagree on field names (`videoId` vs `url`, `viewCount` vs
//! `views`, `published` seconds vs `uploaded` milliseconds). Everything
//! downstream of the fetch engine sees only [`CanonicalRecord`], whose
//! fields are always populated: missing source data becomes a fixed
//! placeholder, never an empty option.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use url::Url;

pub const UNTITLED: &str = "Untitled";
pub const UNKNOWN_AUTHOR: &str = "Unknown";
pub const UNKNOWN_AGE: &str = "Unknown date";

/// Normalized video metadata shared by the cache and the UI boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalRecord {
    /// Provider-assigned identifier, treated as an opaque key.
    pub id: String,
    pub title: String,
    pub author: String,
    /// Rendered view count, e.g. `"1.2K views"`.
    pub views: String,
    /// Rendered age, e.g. `"3 days ago"`.
    pub published: String,
}

/// Normalize one raw provider item.
///
/// Returns `None` only when no identifier can be recovered; such an item
/// cannot be cached or played and is dropped by the caller.
pub fn normalize_item(raw: &Value, now: DateTime<Utc>) -> Option<CanonicalRecord> {
    let id = extract_id(raw)?;

    let title = first_str(raw, &["/title", "/name"]).unwrap_or(UNTITLED);
    let author = first_str(
        raw,
        &["/author", "/uploaderName", "/uploader", "/channelTitle"],
    )
    .unwrap_or(UNKNOWN_AUTHOR);

    let views = ["/viewCount", "/views", "/view_count"]
        .iter()
        .find_map(|p| raw.pointer(p))
        .map_or_else(|| format_views(None), |v| format_views(parse_count(v)));

    Some(CanonicalRecord {
        id,
        title: title.to_string(),
        author: author.to_string(),
        views,
        published: extract_age(raw, now),
    })
}

/// Recover the item identifier.
///
/// Tries a flat `videoId`/`id` string, then an `id` object with a `videoId`
/// sub-field, then derives one from a `url` (`/watch?v=ID`, `youtu.be/ID`,
/// `/shorts/ID`).
pub fn extract_id(raw: &Value) -> Option<String> {
    if let Some(id) = first_str(raw, &["/videoId", "/id", "/id/videoId"]) {
        return Some(id.to_string());
    }

    let url = first_str(raw, &["/url", "/link"])?;
    id_from_url(url)
}

fn id_from_url(raw_url: &str) -> Option<String> {
    // Provider URLs are often relative ("/watch?v=ID")
    let url = Url::parse(raw_url)
        .or_else(|_| Url::parse("https://placeholder.invalid").and_then(|base| base.join(raw_url)))
        .ok()?;

    if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
        if !v.is_empty() {
            return Some(v.into_owned());
        }
    }

    url.path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()
        .filter(|s| *s != "watch")
        .map(ToString::to_string)
}

/// Parse a raw count that may arrive as a number or a numeric string.
fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            cleaned
                .parse::<u64>()
                .ok()
                .or_else(|| {
                    cleaned
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && *f >= 0.0)
                        .map(|f| f as u64)
                })
        }
        _ => None,
    }
}

/// Render a view count.
///
/// `None` (unparseable) renders as `"0 views"`. From one thousand the count
/// is scaled to `K`, from one million to `M`, one decimal place each.
pub fn format_views(count: Option<u64>) -> String {
    let Some(n) = count else {
        return "0 views".to_string();
    };

    #[allow(clippy::cast_precision_loss)]
    let f = n as f64;
    if n >= 1_000_000 {
        format!("{:.1}M views", f / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K views", f / 1_000.0)
    } else {
        format!("{n} views")
    }
}

fn extract_age(raw: &Value, now: DateTime<Utc>) -> String {
    // Machine-readable timestamps win over pre-rendered text
    let published = raw
        .pointer("/published")
        .and_then(Value::as_i64)
        .filter(|secs| *secs > 0)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .or_else(|| {
            raw.pointer("/uploaded")
                .and_then(Value::as_i64)
                .filter(|ms| *ms > 0)
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        })
        .or_else(|| {
            first_str(raw, &["/publishedAt", "/publishDate"])
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
        });

    if let Some(at) = published {
        return format_age(at, now);
    }

    first_str(raw, &["/publishedText", "/uploadedDate"])
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_AGE)
        .to_string()
}

/// Render the elapsed time between `published` and `now` in its largest
/// whole unit: seconds, minutes, hours, days, months (30 days) or years
/// (12 months). Future dates render as `"0 seconds ago"`.
pub fn format_age(published: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = u64::try_from((now - published).num_seconds()).unwrap_or(0);

    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;
    let months = days / 30;
    let years = months / 12;

    let (value, unit) = if seconds < 60 {
        (seconds, "second")
    } else if minutes < 60 {
        (minutes, "minute")
    } else if hours < 24 {
        (hours, "hour")
    } else if days < 30 {
        (days, "day")
    } else if months < 12 {
        (months, "month")
    } else {
        (years, "year")
    };

    let plural = if value == 1 { "" } else { "s" };
    format!("{value} {unit}{plural} ago")
}

/// First non-empty string found at any of `pointers`, in order.
fn first_str<'a>(raw: &'a Value, pointers: &[&str]) -> Option<&'a str> {
    pointers.iter().find_map(|p| {
        raw.pointer(p)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    })
}
