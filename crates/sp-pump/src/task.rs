//! Fetch-and-append: one unit of pump work.

use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use sp_core::events::{EventBus, PumpEvent};
use sp_core::{ByteRange, Catalog, Error, SegmentIndex};

use crate::queue::FetchTask;
use crate::sink::{AppendSink, SegmentBuffer};
use crate::source::RangeSource;

/// How a task that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskOutcome {
    /// The sink confirmed the append.
    Appended,
    /// A seek invalidated the task before its bytes reached the sink.
    Discarded,
}

/// Everything a task borrows from the worker.
pub(crate) struct TaskContext<'a> {
    pub catalog: &'a Catalog,
    pub source: &'a dyn RangeSource,
    pub events: &'a EventBus,
    pub fetch_timeout: Option<Duration>,
}

/// Resolve, fetch and append one segment.
///
/// The cancellation token is checked while the fetch is outstanding and
/// again before the append; once the sink has the buffer the append always
/// runs to completion.
pub(crate) async fn fetch_and_append(
    ctx: &TaskContext<'_>,
    sink: &mut dyn AppendSink,
    task: FetchTask,
    cancel: &CancellationToken,
) -> sp_core::Result<TaskOutcome> {
    let index = task.index;
    let range = ctx.catalog.byte_range(index)?;

    tracing::debug!(
        index = %index,
        range = %range,
        source = ctx.source.name(),
        "Fetching segment"
    );

    let data = tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            tracing::debug!(index = %index, "Fetch abandoned after seek");
            return Ok(TaskOutcome::Discarded);
        }
        result = fetch_range(ctx, index, range) => result?,
    };

    ctx.events.broadcast(PumpEvent::SegmentFetched {
        index,
        bytes: data.len() as u64,
    });

    if cancel.is_cancelled() {
        tracing::debug!(index = %index, "Dropping fetched segment after seek");
        return Ok(TaskOutcome::Discarded);
    }

    let bytes = data.len();
    sink.append(SegmentBuffer { index, range, data }).await?;

    tracing::debug!(index = %index, bytes, "Segment appended");
    Ok(TaskOutcome::Appended)
}

async fn fetch_range(
    ctx: &TaskContext<'_>,
    index: SegmentIndex,
    range: ByteRange,
) -> sp_core::Result<Bytes> {
    match ctx.fetch_timeout {
        Some(limit) => tokio::time::timeout(limit, ctx.source.fetch(range))
            .await
            .map_err(|_| Error::Timeout {
                index,
                after_ms: limit.as_millis() as u64,
            })?,
        None => ctx.source.fetch(range).await,
    }
}
