//! Playable-URL manifest types.
//!
//! A [`StreamManifest`] maps quality labels to absolute media URLs for one
//! item. Labels are not exclusive: a provider with a single progressive
//! stream yields the same URL under `highest`, `medium`, `low`, `lowest`
//! and `direct`.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use url::Url;

use crate::provider::ProviderFamily;

/// Quality label a URL is published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Highest resolution available.
    Highest,
    Medium,
    Low,
    /// Lowest resolution available.
    Lowest,
    /// Adaptive (HLS) manifest; the player picks the rendition.
    Auto,
    /// First muxed progressive stream in provider order.
    Direct,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Highest => "highest",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Lowest => "lowest",
            Self::Auto => "auto",
            Self::Direct => "direct",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved playable URLs for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamManifest {
    /// Item identifier the manifest was resolved for.
    pub id: String,
    /// Base address of the provider that answered.
    pub provider: String,
    pub family: ProviderFamily,
    pub urls: BTreeMap<Quality, String>,
    pub title: Option<String>,
    /// Duration in seconds (`None` for live or unknown).
    pub duration_seconds: Option<u64>,
    pub author: Option<String>,
    pub description: Option<String>,
}

impl StreamManifest {
    /// A manifest is usable once it maps at least one quality.
    pub fn is_usable(&self) -> bool {
        !self.urls.is_empty()
    }

    pub fn url(&self, quality: Quality) -> Option<&str> {
        self.urls.get(&quality).map(String::as_str)
    }

    /// Best URL for a player that wants "something that plays": the
    /// adaptive manifest, then the direct stream, then the ladder top-down.
    pub fn preferred_url(&self) -> Option<&str> {
        [
            Quality::Auto,
            Quality::Direct,
            Quality::Highest,
            Quality::Medium,
            Quality::Low,
            Quality::Lowest,
        ]
        .into_iter()
        .find_map(|q| self.url(q))
    }

    /// Rewrite every URL to absolute form.
    ///
    /// Protocol-relative URLs (`//host/path`) get an `https:` prefix and
    /// root-relative ones (`/path`) are resolved against the provider base.
    /// Already-absolute URLs are left untouched.
    pub fn absolutize(&mut self, base: &Url) {
        for url in self.urls.values_mut() {
            if let Some(absolute) = absolute_url(url, base) {
                *url = absolute;
            }
        }
    }
}

/// Absolute form of `raw`, or `None` if it is already absolute.
pub fn absolute_url(raw: &str, base: &Url) -> Option<String> {
    if raw.starts_with("//") {
        return Some(format!("https:{raw}"));
    }
    if Url::parse(raw).is_ok() {
        return None;
    }
    base.join(raw).ok().map(String::from)
}

/// One candidate media stream pulled out of a provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    pub url: String,
    /// Vertical resolution in pixels, 0 when unknown.
    pub height: u32,
    /// Carries both audio and video.
    pub muxed: bool,
}

impl Format {
    pub fn new(url: impl Into<String>, label: Option<&str>, muxed: bool) -> Self {
        Self {
            url: url.into(),
            height: label.map_or(0, parse_height),
            muxed,
        }
    }
}

/// Parse `"720p"`, `"1080p60"` or `"480p HDR"` into a pixel height.
pub fn parse_height(label: &str) -> u32 {
    let digits: String = label
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Map candidate formats onto quality labels.
///
/// `ladder` is ranked by height (highest first, provider order breaking
/// ties). `direct` is the first muxed stream of `all` in provider order.
pub fn quality_map(
    all: &[Format],
    ladder: &[Format],
    hls: Option<&str>,
) -> BTreeMap<Quality, String> {
    let mut urls = BTreeMap::new();

    let mut ranked: Vec<&Format> = ladder.iter().filter(|f| !f.url.is_empty()).collect();
    ranked.sort_by(|a, b| b.height.cmp(&a.height));

    if let (Some(first), Some(last)) = (ranked.first(), ranked.last()) {
        let n = ranked.len();
        urls.insert(Quality::Highest, first.url.clone());
        urls.insert(Quality::Medium, ranked[n / 2].url.clone());
        urls.insert(Quality::Low, ranked[(n * 3 / 4).min(n - 1)].url.clone());
        urls.insert(Quality::Lowest, last.url.clone());
    }

    if let Some(direct) = all.iter().find(|f| f.muxed && !f.url.is_empty()) {
        urls.insert(Quality::Direct, direct.url.clone());
    }

    if let Some(hls) = hls.filter(|h| !h.is_empty()) {
        urls.insert(Quality::Auto, hls.to_string());
    }

    urls
}
