//! The [`AppendSink`] trait and its built-in implementations.
//!
//! A sink is a single-writer, append-only buffer. The pump owns its sink by
//! value and hands it one [`SegmentBuffer`] at a time, waiting for the
//! completion signal before the next append.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

use sp_core::{ByteRange, Error, SegmentIndex};

/// Fetched bytes tagged with the segment they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentBuffer {
    /// The segment this buffer was fetched for.
    pub index: SegmentIndex,
    /// The range that was requested.
    pub range: ByteRange,
    /// The bytes returned by the source.
    pub data: Bytes,
}

impl SegmentBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Accepts one buffer at a time and signals completion or rejection.
#[async_trait]
pub trait AppendSink: Send + 'static {
    /// Append `buffer`, resolving once the sink has finished with it.
    ///
    /// A rejection (sink busy, invalid state, malformed data) is reported as
    /// [`Error::Append`].
    async fn append(&mut self, buffer: SegmentBuffer) -> sp_core::Result<()>;
}

// ---------------------------------------------------------------------------
// ChannelSink
// ---------------------------------------------------------------------------

/// One append handed to the consumer of a [`ChannelSink`].
///
/// The consumer must answer with [`complete`](Self::complete) or
/// [`reject`](Self::reject); dropping the request counts as a rejection.
#[derive(Debug)]
pub struct SinkRequest {
    pub buffer: SegmentBuffer,
    done: oneshot::Sender<Result<(), String>>,
}

impl SinkRequest {
    /// Signal that the buffer was appended.
    pub fn complete(self) {
        let _ = self.done.send(Ok(()));
    }

    /// Signal that the buffer could not be appended.
    pub fn reject(self, reason: impl Into<String>) {
        let _ = self.done.send(Err(reason.into()));
    }
}

/// Forwards appends over a channel to an external buffer owner, such as a
/// decoder running on another task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<SinkRequest>,
}

impl ChannelSink {
    /// Create a sink and the receiver its consumer reads requests from.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SinkRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AppendSink for ChannelSink {
    async fn append(&mut self, buffer: SegmentBuffer) -> sp_core::Result<()> {
        let index = buffer.index;
        let (done, completion) = oneshot::channel();

        self.tx
            .send(SinkRequest { buffer, done })
            .await
            .map_err(|_| Error::append(index, "sink consumer is closed"))?;

        match completion.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(Error::append(index, reason)),
            Err(_) => Err(Error::append(index, "sink dropped the request")),
        }
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Records every appended buffer. Clones share the same storage, so a clone
/// kept outside the pump can inspect what was delivered.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffers: Arc<Mutex<Vec<SegmentBuffer>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indices of the appended buffers, in delivery order.
    pub fn indices(&self) -> Vec<SegmentIndex> {
        self.buffers.lock().iter().map(|b| b.index).collect()
    }

    pub fn buffers(&self) -> Vec<SegmentBuffer> {
        self.buffers.lock().clone()
    }

    /// Concatenation of all appended bytes.
    pub fn contents(&self) -> Vec<u8> {
        self.buffers
            .lock()
            .iter()
            .flat_map(|b| b.data.iter().copied())
            .collect()
    }
}

#[async_trait]
impl AppendSink for MemorySink {
    async fn append(&mut self, buffer: SegmentBuffer) -> sp_core::Result<()> {
        self.buffers.lock().push(buffer);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileSink
// ---------------------------------------------------------------------------

/// Appends segment bytes to a file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: tokio::fs::File,
    written: u64,
}

impl FileSink {
    /// Open `path` for appending, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> sp_core::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::debug!(path = %path.display(), "Opened file sink");

        Ok(Self {
            path,
            file,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes appended through this sink.
    pub fn written(&self) -> u64 {
        self.written
    }
}

#[async_trait]
impl AppendSink for FileSink {
    async fn append(&mut self, buffer: SegmentBuffer) -> sp_core::Result<()> {
        let index = buffer.index;
        self.file
            .write_all(&buffer.data)
            .await
            .map_err(|e| Error::append(index, format!("write to {}: {e}", self.path.display())))?;
        self.file
            .flush()
            .await
            .map_err(|e| Error::append(index, format!("flush {}: {e}", self.path.display())))?;

        self.written += buffer.data.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(index: i64, data: &'static [u8]) -> SegmentBuffer {
        SegmentBuffer {
            index: SegmentIndex::new(index),
            range: ByteRange::new(0, data.len() as u64 - 1),
            data: Bytes::from_static(data),
        }
    }

    #[tokio::test]
    async fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();

        writer.append(buffer(-1, b"ab")).await.unwrap();
        writer.append(buffer(0, b"cd")).await.unwrap();

        assert_eq!(
            sink.indices(),
            vec![SegmentIndex::INIT, SegmentIndex::new(0)]
        );
        assert_eq!(sink.contents(), b"abcd");
    }

    #[tokio::test]
    async fn channel_sink_complete() {
        let (mut sink, mut rx) = ChannelSink::new(1);

        let consumer = tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            assert_eq!(request.buffer.index, SegmentIndex::new(2));
            request.complete();
        });

        sink.append(buffer(2, b"xyz")).await.unwrap();
        consumer.await.unwrap();
    }

    #[tokio::test]
    async fn channel_sink_reject() {
        let (mut sink, mut rx) = ChannelSink::new(1);

        tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            request.reject("QuotaExceeded");
        });

        let err = sink.append(buffer(5, b"xyz")).await.unwrap_err();
        match err {
            Error::Append { index, message } => {
                assert_eq!(index, SegmentIndex::new(5));
                assert_eq!(message, "QuotaExceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn channel_sink_dropped_request_is_rejection() {
        let (mut sink, mut rx) = ChannelSink::new(1);

        tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            drop(request);
        });

        let err = sink.append(buffer(0, b"a")).await.unwrap_err();
        assert_eq!(err.code(), "append");
    }

    #[tokio::test]
    async fn channel_sink_closed_consumer() {
        let (mut sink, rx) = ChannelSink::new(1);
        drop(rx);

        let err = sink.append(buffer(0, b"a")).await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[tokio::test]
    async fn file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        let mut sink = FileSink::open(&path).await.unwrap();
        sink.append(buffer(-1, b"init")).await.unwrap();
        sink.append(buffer(0, b"-seg0")).await.unwrap();

        assert_eq!(sink.written(), 9);
        assert_eq!(std::fs::read(&path).unwrap(), b"init-seg0");
    }
}
