//! # sp-pump
//!
//! The segment pump: ordered, one-at-a-time delivery of byte-range segments
//! from a [`RangeSource`] into an [`AppendSink`].
//!
//! This crate provides:
//!
//! - **[`RangeSource`]** / **[`AppendSink`]** traits -- the two external
//!   capabilities the pump drives, with in-memory, file and channel-backed
//!   implementations ([`source`], [`sink`]).
//! - **[`TaskQueue`]** -- the explicit FIFO of [`FetchTask`] records.
//! - **[`SegmentPump`]** -- the control handle (init, halt/unhalt, seek) over
//!   a single background worker that owns the sink.
//! - **[`PumpStatus`]** -- a snapshot of the cursor, queue and
//!   [`PumpState`].

pub mod pump;
pub mod queue;
pub mod sink;
pub mod source;
pub mod state;
mod task;

// Re-export key types at the crate root.
pub use pump::SegmentPump;
pub use queue::{FetchTask, TaskQueue};
pub use sink::{AppendSink, ChannelSink, FileSink, MemorySink, SegmentBuffer, SinkRequest};
pub use source::{MemorySource, RangeSource};
pub use state::{PumpState, PumpStatus, TaskFailure};
