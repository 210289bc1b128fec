//! segpump - ordered byte-range segment delivery into append-only buffers.
//!
//! The facade wires the workspace crates together: it loads a [`Catalog`]
//! (inline or from a manifest URL), builds an [`HttpRangeSource`] for the
//! media asset, spawns a [`SegmentPump`] over the caller's sink and starts
//! delivery from the configured window.

pub use sp_core::config::{Config, PumpConfig, SourceConfig};
pub use sp_core::events::{Event, EventBus, PumpEvent};
pub use sp_core::{ByteRange, Catalog, Error, Result, SegmentDescriptor, SegmentIndex};
pub use sp_http::{fetch_manifest, HttpRangeSource};
pub use sp_pump::{
    AppendSink, ChannelSink, FetchTask, FileSink, MemorySink, MemorySource, PumpState,
    PumpStatus, RangeSource, SegmentBuffer, SegmentPump, SinkRequest, TaskFailure,
};

use std::sync::Arc;
use std::time::Duration;

/// Where the segment catalog comes from.
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// A catalog the caller already has.
    Inline(Catalog),
    /// URL of a JSON manifest to download.
    Manifest(String),
}

impl CatalogSource {
    /// The manifest URL from `config`, if one is set.
    pub fn from_config(config: &SourceConfig) -> Option<Self> {
        config
            .manifest_url
            .as_ref()
            .filter(|url| !url.is_empty())
            .map(|url| Self::Manifest(url.clone()))
    }
}

/// Resolve a [`CatalogSource`] into a catalog.
pub async fn load_catalog(source: CatalogSource, client: &reqwest::Client) -> Result<Catalog> {
    match source {
        CatalogSource::Inline(catalog) => Ok(catalog),
        CatalogSource::Manifest(url) => fetch_manifest(client, &url).await,
    }
}

/// Load the catalog, spawn a pump that fetches from `config.source.media_url`
/// into `sink`, and initialize it with the configured window.
pub async fn start<K: AppendSink>(
    config: &Config,
    catalog: CatalogSource,
    sink: K,
) -> Result<SegmentPump> {
    for warning in config.validate() {
        tracing::warn!("Config: {}", warning);
    }

    let media_url = config
        .source
        .media_url
        .clone()
        .filter(|url| !url.is_empty())
        .ok_or_else(|| Error::Validation("source.media_url is required".into()))?;

    let client = sp_http::build_client(Duration::from_secs(config.source.request_timeout_secs));

    tracing::info!("Loading segment catalog");
    let catalog = load_catalog(catalog, &client).await?;
    tracing::info!(
        segments = catalog.len(),
        media_url = %media_url,
        "Segment catalog loaded"
    );

    let source = HttpRangeSource::with_client(client, media_url);
    let pump = SegmentPump::spawn(Arc::new(catalog), source, sink, config.pump.clone());
    pump.init_from_config()?;

    tracing::info!("Segment pump running");
    Ok(pump)
}
