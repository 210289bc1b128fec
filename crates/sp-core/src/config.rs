//! Pump configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! source endpoints and the pump tuning knobs. Every section defaults
//! sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::index::SegmentIndex;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub pump: PumpConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if matches!(self.source.manifest_url.as_deref(), Some(url) if url.trim().is_empty()) {
            warnings.push("source.manifest_url is empty".into());
        }

        if matches!(self.source.media_url.as_deref(), Some(url) if url.trim().is_empty()) {
            warnings.push("source.media_url is empty".into());
        }

        if self.source.request_timeout_secs == 0 {
            warnings.push("source.request_timeout_secs is 0; requests will fail immediately".into());
        }

        if self.pump.end_index < self.pump.start_index {
            warnings.push(format!(
                "pump.end_index ({}) is before pump.start_index ({}); no look-ahead will be queued",
                self.pump.end_index, self.pump.start_index
            ));
        }

        if self.pump.start_index < 0 {
            warnings.push(format!(
                "pump.start_index ({}) is negative; the first fetch will fail",
                self.pump.start_index
            ));
        }

        if self.pump.fetch_timeout_ms == Some(0) {
            warnings.push("pump.fetch_timeout_ms is 0; every fetch will time out".into());
        }

        if self.pump.event_capacity == 0 {
            warnings.push("pump.event_capacity is 0; using 1".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Where the manifest and media bytes come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// URL of the JSON segment manifest.
    pub manifest_url: Option<String>,
    /// URL of the media asset that byte ranges are requested from.
    pub media_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            manifest_url: None,
            media_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Segment pump tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// First cataloged segment queued after the init segment.
    pub start_index: i64,
    /// Exclusive end of the look-ahead window queued on init.
    #[serde(default = "default_end_index")]
    pub end_index: i64,
    /// Upper bound on a single range fetch. `None` waits indefinitely.
    pub fetch_timeout_ms: Option<u64>,
    /// Queue the init segment again ahead of every seek target.
    pub refetch_init_on_seek: bool,
    /// Broadcast channel capacity for pump events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_end_index() -> i64 {
    3
}

fn default_event_capacity() -> usize {
    256
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            start_index: 0,
            end_index: default_end_index(),
            fetch_timeout_ms: None,
            refetch_init_on_seek: false,
            event_capacity: default_event_capacity(),
        }
    }
}

impl PumpConfig {
    pub fn start(&self) -> SegmentIndex {
        SegmentIndex::new(self.start_index)
    }

    pub fn end(&self) -> SegmentIndex {
        SegmentIndex::new(self.end_index)
    }
}
