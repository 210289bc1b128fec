//! Byte-range fetches over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};

use sp_core::{ByteRange, Error};
use sp_pump::RangeSource;

/// Fetches byte ranges of a single media URL.
#[derive(Debug, Clone)]
pub struct HttpRangeSource {
    client: Client,
    url: String,
}

impl HttpRangeSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(crate::build_client(timeout), url)
    }

    /// Use an existing client, e.g. one shared with manifest loading.
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RangeSource for HttpRangeSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, range: ByteRange) -> sp_core::Result<Bytes> {
        let response = self
            .client
            .get(&self.url)
            .header(RANGE, range.header_value())
            .send()
            .await
            .map_err(|e| Error::transport(format!("GET {} ({range}): {e}", self.url)))?;

        let status = response.status();
        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::transport(format!("read body of {} ({range}): {e}", self.url)))?;

        match status {
            StatusCode::PARTIAL_CONTENT => check_partial_body(body, range, content_range.as_deref()),
            StatusCode::OK => resolve_ok_body(body, range, &self.url),
            other => Err(Error::transport(format!(
                "GET {} ({range}) returned {other}",
                self.url
            ))),
        }
    }
}

/// Validate a 206 body against the requested range.
///
/// With a `Content-Range` header the served range must start at
/// `range.start`, end within it, and match the body length. Without one the
/// body must be non-empty and no longer than the request.
fn check_partial_body(
    body: Bytes,
    range: ByteRange,
    content_range: Option<&str>,
) -> sp_core::Result<Bytes> {
    let len = body.len() as u64;

    if let Some(header) = content_range {
        let (start, end) = parse_content_range(header).ok_or_else(|| {
            Error::transport(format!("malformed Content-Range {header:?} for {range}"))
        })?;
        if start != range.start || end > range.end || end < start || end - start + 1 != len {
            return Err(Error::transport(format!(
                "requested {range} but server sent {start}-{end} with {len} bytes"
            )));
        }
        return Ok(body);
    }

    if len == 0 || len > range.len() {
        return Err(Error::transport(format!(
            "requested {range} ({} bytes) but partial response has {len} bytes",
            range.len()
        )));
    }
    Ok(body)
}

/// Interpret a 200 body for a range request.
///
/// A body exactly the size of the range is the range itself. A body that
/// reaches past `range.end` is the whole asset and gets sliced. Anything else
/// cannot be located in the asset.
fn resolve_ok_body(body: Bytes, range: ByteRange, url: &str) -> sp_core::Result<Bytes> {
    let len = body.len() as u64;

    if len == range.len() {
        return Ok(body);
    }

    if len > range.end {
        tracing::warn!(
            url,
            range = %range,
            body_len = len,
            "Server ignored range request; slicing full response"
        );
        return Ok(body.slice(range.start as usize..=range.end as usize));
    }

    Err(Error::transport(format!(
        "requested {range} ({} bytes) but 200 response has {len} bytes",
        range.len()
    )))
}

/// Parse `bytes start-end/total` (total may be `*`).
fn parse_content_range(header: &str) -> Option<(u64, u64)> {
    let spec = header.trim().strip_prefix("bytes ")?;
    let (span, _total) = spec.split_once('/')?;
    let (start, end) = span.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}
