//! HTTP transport for the segment pump.
//!
//! - [`HttpRangeSource`]: a [`RangeSource`](sp_pump::RangeSource) that
//!   issues `Range: bytes=start-end` GET requests.
//! - [`fetch_manifest`]: download and parse a JSON segment manifest.

pub mod manifest;
pub mod range;

pub use manifest::fetch_manifest;
pub use range::HttpRangeSource;

use std::time::Duration;

use reqwest::Client;

/// Build a client with a request timeout, falling back to the default
/// client if the builder fails.
pub fn build_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::warn!("Failed to build HTTP client with timeout: {}", e);
        Client::new()
    })
}
