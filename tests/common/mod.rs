//! Shared test harness for integration tests.
//!
//! [`MediaServer`] runs a wiremock server that serves a JSON manifest and a
//! synthetic media asset honouring `Range` requests.

#![allow(dead_code)]

use std::time::Duration;

use segpump::{Config, Event, PumpEvent};
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const WAIT: Duration = Duration::from_secs(5);

/// Deterministic asset bytes.
pub fn asset(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Manifest for three one-second segments at bytes 100-399.
pub fn manifest() -> serde_json::Value {
    serde_json::json!({
        "Duration": 3000,
        "Bitrate": 800,
        "Segments": [
            { "Index": 0, "Start": 100, "End": 199, "StartTime": 0, "EndTime": 999 },
            { "Index": 1, "Start": 200, "End": 299, "StartTime": 1000, "EndTime": 1999 },
            { "Index": 2, "Start": 300, "End": 399, "StartTime": 2000, "EndTime": 2999 }
        ]
    })
}

/// Answers `Range: bytes=s-e` with 206 and the matching slice.
struct RangeResponder {
    data: Vec<u8>,
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(range) = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
        else {
            return ResponseTemplate::new(400);
        };

        let parsed = range
            .split_once('-')
            .and_then(|(s, e)| Some((s.parse::<usize>().ok()?, e.parse::<usize>().ok()?)));
        match parsed {
            Some((start, end)) if start <= end && start < self.data.len() => {
                let end = end.min(self.data.len() - 1);
                ResponseTemplate::new(206).set_body_bytes(self.data[start..=end].to_vec())
            }
            _ => ResponseTemplate::new(416),
        }
    }
}

/// Mock HTTP origin for a manifest and its media asset.
pub struct MediaServer {
    pub server: MockServer,
    pub data: Vec<u8>,
}

impl MediaServer {
    pub async fn start() -> Self {
        Self::with_asset(asset(400)).await
    }

    pub async fn with_asset(data: Vec<u8>) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(manifest()))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/media.mp4"))
            .respond_with(RangeResponder { data: data.clone() })
            .mount(&server)
            .await;

        Self { server, data }
    }

    pub fn manifest_url(&self) -> String {
        format!("{}/manifest.json", self.server.uri())
    }

    pub fn media_url(&self) -> String {
        format!("{}/media.mp4", self.server.uri())
    }

    /// Config pointing at this server with the default window.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.source.manifest_url = Some(self.manifest_url());
        config.source.media_url = Some(self.media_url());
        config.source.request_timeout_secs = 5;
        config
    }

    /// Bytes of the inclusive range `[start, end]`.
    pub fn slice(&self, start: usize, end: usize) -> &[u8] {
        &self.data[start..=end]
    }
}

/// Wait for the first event matching `pred`.
pub async fn wait_for(
    rx: &mut broadcast::Receiver<Event>,
    pred: impl Fn(&PumpEvent) -> bool,
) -> PumpEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event.payload) {
                return event.payload;
            }
        }
    })
    .await
    .expect("timed out waiting for pump event")
}

/// Poll until the pump reports it is halted.
pub async fn wait_until_halted(pump: &segpump::SegmentPump) {
    tokio::time::timeout(WAIT, async {
        while !pump.is_halted() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("pump never halted");
}
