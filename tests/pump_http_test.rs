//! End-to-end delivery over HTTP through the facade.

mod common;

use std::time::Duration;

use common::{wait_for, wait_until_halted, MediaServer, WAIT};
use segpump::{
    start, Catalog, CatalogSource, ChannelSink, Error, FileSink, MemorySink, PumpEvent, PumpState,
    SegmentIndex, SinkRequest,
};
use tokio::sync::mpsc;

async fn next_request(rx: &mut mpsc::Receiver<SinkRequest>) -> SinkRequest {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for append")
        .expect("sink channel closed")
}

fn manifest_source(media: &MediaServer) -> CatalogSource {
    CatalogSource::Manifest(media.manifest_url())
}

#[tokio::test]
async fn delivers_init_and_window_from_manifest() {
    let media = MediaServer::start().await;
    let sink = MemorySink::new();

    let pump = start(&media.config(), manifest_source(&media), sink.clone())
        .await
        .unwrap();
    wait_until_halted(&pump).await;

    assert_eq!(
        sink.indices(),
        [-1, 0, 1, 2].map(SegmentIndex::new).to_vec()
    );
    let buffers = sink.buffers();
    assert_eq!(buffers[0].data.as_ref(), media.slice(0, 99));
    assert_eq!(buffers[1].data.as_ref(), media.slice(100, 199));
    assert_eq!(buffers[2].data.as_ref(), media.slice(200, 299));
    assert_eq!(buffers[3].data.as_ref(), media.slice(300, 399));

    // The catalog ends at index 2, so the pump stops at 3.
    let status = pump.status();
    assert_eq!(status.current_index, SegmentIndex::new(3));
    assert_eq!(status.last_failure.unwrap().code, "out_of_range");
}

#[tokio::test]
async fn seek_by_time_over_http() {
    let media = MediaServer::start().await;
    let (sink, mut appends) = ChannelSink::new(1);

    let pump = start(&media.config(), manifest_source(&media), sink)
        .await
        .unwrap();

    let init = next_request(&mut appends).await;
    assert_eq!(init.buffer.index, SegmentIndex::INIT);

    assert_eq!(pump.seek_to_time(2.5), Some(SegmentIndex::new(2)));
    init.complete();

    let next = next_request(&mut appends).await;
    assert_eq!(next.buffer.index, SegmentIndex::new(2));
    assert_eq!(next.buffer.data.as_ref(), media.slice(300, 399));
    next.complete();

    pump.shutdown().await;
}

#[tokio::test]
async fn rejected_append_resumes_at_failed_segment() {
    let media = MediaServer::start().await;
    let (sink, mut appends) = ChannelSink::new(1);

    let pump = start(&media.config(), manifest_source(&media), sink)
        .await
        .unwrap();
    let mut events = pump.subscribe();

    next_request(&mut appends).await.complete();
    next_request(&mut appends).await.complete();
    next_request(&mut appends).await.complete();
    let rejected = next_request(&mut appends).await;
    assert_eq!(rejected.buffer.index, SegmentIndex::new(2));
    rejected.reject("QuotaExceededError");

    wait_for(&mut events, |e| matches!(e, PumpEvent::Halted { .. })).await;
    let status = pump.status();
    assert_eq!(status.state, PumpState::Halted);
    assert_eq!(status.current_index, SegmentIndex::new(2));

    pump.unhalt();
    let retry = next_request(&mut appends).await;
    assert_eq!(retry.buffer.index, SegmentIndex::new(2));
    assert_eq!(retry.buffer.data.as_ref(), media.slice(300, 399));
    retry.complete();
}

#[tokio::test]
async fn file_sink_receives_contiguous_bytes() {
    let media = MediaServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("buffer.mp4");
    let sink = FileSink::open(&out).await.unwrap();

    let pump = start(&media.config(), manifest_source(&media), sink)
        .await
        .unwrap();
    wait_until_halted(&pump).await;
    pump.shutdown().await;

    assert_eq!(std::fs::read(&out).unwrap(), media.data);
}

#[tokio::test]
async fn inline_catalog_skips_manifest() {
    let media = MediaServer::start().await;
    let catalog = Catalog::from_ranges([(100, 199, 0, 999), (200, 299, 1000, 1999)]);
    let sink = MemorySink::new();

    let mut config = media.config();
    config.source.manifest_url = None;
    config.pump.end_index = 2;

    let pump = start(&config, CatalogSource::Inline(catalog), sink.clone())
        .await
        .unwrap();
    wait_until_halted(&pump).await;

    assert_eq!(sink.indices(), [-1, 0, 1].map(SegmentIndex::new).to_vec());
    assert_eq!(pump.catalog().len(), 2);
}

#[tokio::test]
async fn missing_manifest_fails_to_start() {
    let media = MediaServer::start().await;
    let source = CatalogSource::Manifest(format!("{}/missing.json", media.server.uri()));

    let err = start(&media.config(), source, MemorySink::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
}

#[tokio::test]
async fn unreachable_media_halts_with_transport_failure() {
    let media = MediaServer::start().await;
    let mut config = media.config();
    config.source.media_url = Some(format!("{}/gone.mp4", media.server.uri()));
    config.pump.fetch_timeout_ms = Some(Duration::from_secs(2).as_millis() as u64);
    let sink = MemorySink::new();

    let pump = start(&config, manifest_source(&media), sink.clone())
        .await
        .unwrap();
    wait_until_halted(&pump).await;

    assert!(sink.indices().is_empty());
    let failure = pump.status().last_failure.unwrap();
    assert_eq!(failure.code, "transport");
    assert_eq!(failure.index, SegmentIndex::INIT);
}
