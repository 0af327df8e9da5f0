//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tubemux::{EngineConfig, FetchError, HttpTransport, Session};
use url::Url;

/// One canned reply.
#[derive(Debug, Clone)]
pub enum Answer {
    Json(Value),
    Status(u16),
}

/// Answers requests by URL prefix and records every URL it was asked for.
///
/// Each route replays its answers in order and then keeps repeating the
/// last one. Liveness probes without a route succeed; any other unrouted
/// request gets a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, VecDeque<Answer>)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, prefix: &str, answers: Vec<Answer>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .push((prefix.to_string(), answers.into()));
        self
    }

    pub fn json(self, prefix: &str, body: Value) -> Self {
        self.route(prefix, vec![Answer::Json(body)])
    }

    pub fn status(self, prefix: &str, status: u16) -> Self {
        self.route(prefix, vec![Answer::Status(status)])
    }

    /// Every URL requested, probes included.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Requested URLs minus liveness probes.
    pub fn data_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|url| !is_probe(url))
            .collect()
    }
}

fn is_probe(url: &str) -> bool {
    url.ends_with("/api/v1/stats") || url.ends_with("/healthcheck")
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get_json(&self, url: &Url, _timeout: Duration) -> tubemux::Result<Value> {
        let url = url.to_string();
        self.calls.lock().unwrap().push(url.clone());

        let answer = {
            let mut routes = self.routes.lock().unwrap();
            routes
                .iter_mut()
                .find(|(prefix, _)| url.starts_with(prefix.as_str()))
                .and_then(|(_, answers)| {
                    if answers.len() > 1 {
                        answers.pop_front()
                    } else {
                        answers.front().cloned()
                    }
                })
        };

        match answer {
            Some(Answer::Json(body)) => Ok(body),
            Some(Answer::Status(status)) => Err(FetchError::UpstreamStatus { url, status }),
            None if is_probe(&url) => Ok(json!({})),
            None => Err(FetchError::UpstreamStatus { url, status: 404 }),
        }
    }
}

/// Config pointing at `.example` hosts, with zero retry delay.
pub fn config(primary: &[&str], secondary: &[&str]) -> EngineConfig {
    EngineConfig {
        retry_delay_ms: 0,
        primary_providers: primary.iter().map(|h| format!("https://{h}")).collect(),
        secondary_providers: secondary.iter().map(|h| format!("https://{h}")).collect(),
        ..EngineConfig::default()
    }
}

pub fn session(config: EngineConfig, transport: &Arc<ScriptedTransport>) -> Session {
    Session::with_transport(config, Arc::clone(transport) as Arc<dyn HttpTransport>)
        .expect("test config should be valid")
}

/// Primary-family items `v{from}..=v{to}`.
pub fn primary_items(from: u32, to: u32) -> Value {
    Value::Array(
        (from..=to)
            .map(|n| {
                json!({
                    "type": "video",
                    "videoId": format!("v{n}"),
                    "title": format!("Video {n}"),
                    "author": "Channel",
                    "viewCount": 1_500 * n,
                    "publishedText": "2 days ago"
                })
            })
            .collect(),
    )
}

/// Secondary-family items `s{from}..=s{to}`.
pub fn secondary_items(from: u32, to: u32) -> Vec<Value> {
    (from..=to)
        .map(|n| {
            json!({
                "type": "stream",
                "url": format!("/watch?v=s{n}"),
                "title": format!("Stream {n}"),
                "uploaderName": "Uploader",
                "views": 42,
                "uploadedDate": "1 week ago"
            })
        })
        .collect()
}

pub fn ids(records: &[tubemux::CanonicalRecord]) -> Vec<String> {
    records.iter().map(|r| r.id.clone()).collect()
}
