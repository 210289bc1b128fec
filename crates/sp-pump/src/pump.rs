//! The segment pump: control handle plus its single background worker.
//!
//! [`SegmentPump`] owns the cursor, the [`TaskQueue`] and the halted flag
//! behind one short-lived lock. A spawned worker task owns the
//! [`AppendSink`] and the [`RangeSource`] and executes queued tasks strictly
//! one at a time. Control operations never await; they edit the shared state
//! and wake the worker.
//!
//! # Example
//!
//! ```rust,ignore
//! let pump = SegmentPump::spawn(catalog, source, sink, PumpConfig::default());
//! pump.init(SegmentIndex::FIRST, SegmentIndex::new(3))?;
//! pump.seek_to_time(42.0);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sp_core::config::PumpConfig;
use sp_core::events::{Event, EventBus, PumpEvent};
use sp_core::{Catalog, Error, SegmentIndex};

use crate::queue::{FetchTask, TaskQueue};
use crate::sink::AppendSink;
use crate::source::RangeSource;
use crate::state::{PumpState, PumpStatus, TaskFailure};
use crate::task::{self, TaskContext, TaskOutcome};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Mutable pump state, guarded by [`Shared::inner`].
struct Inner {
    halted: bool,
    cursor: SegmentIndex,
    queue: TaskQueue,
    in_flight: Option<FetchTask>,
    /// Set by `run`/`unhalt`/re-arm; consumed by the worker per dispatch.
    run_requested: bool,
    epoch: u64,
    /// Cancelled by every seek; tasks dispatch with a child of it.
    epoch_token: CancellationToken,
    last_failure: Option<TaskFailure>,
    initialized: bool,
}

impl Inner {
    fn new() -> Self {
        Self {
            halted: false,
            cursor: SegmentIndex::INIT,
            queue: TaskQueue::new(),
            in_flight: None,
            run_requested: false,
            epoch: 0,
            epoch_token: CancellationToken::new(),
            last_failure: None,
            initialized: false,
        }
    }

    fn state(&self) -> PumpState {
        if self.halted {
            PumpState::Halted
        } else if self.in_flight.is_some() || self.run_requested {
            PumpState::Running
        } else {
            PumpState::Idle
        }
    }

    fn enqueue_next(&mut self, events: &EventBus) -> SegmentIndex {
        let index = self.cursor;
        self.queue.push(FetchTask::new(index, self.epoch));
        self.cursor = index.next();
        events.broadcast(PumpEvent::SegmentQueued { index });
        index
    }

    /// Cancel every task of the current epoch and start a new one.
    fn next_epoch(&mut self) {
        self.epoch_token.cancel();
        self.epoch_token = CancellationToken::new();
        self.epoch += 1;
    }

    fn halt(&mut self, events: &EventBus) {
        self.halted = true;
        events.broadcast(PumpEvent::Halted {
            current_index: self.cursor,
        });
    }

    fn unhalt(&mut self, events: &EventBus) {
        self.halted = false;
        self.last_failure = None;
        self.enqueue_next(events);
        self.run_requested = true;
        events.broadcast(PumpEvent::Resumed {
            current_index: self.cursor,
        });
    }
}

/// What the worker should do next.
enum Dispatch {
    /// No run was requested; sleep until woken.
    Wait,
    /// A run was requested but the queue is empty.
    Empty,
    /// Execute this task under this token.
    Task(FetchTask, CancellationToken),
}

struct Shared {
    inner: Mutex<Inner>,
    wake: Notify,
    events: EventBus,
    catalog: Arc<Catalog>,
    config: PumpConfig,
}

impl Shared {
    fn next_dispatch(&self) -> Dispatch {
        let mut inner = self.inner.lock();
        if !inner.run_requested {
            return Dispatch::Wait;
        }
        inner.run_requested = false;

        match inner.queue.pop() {
            Some(task) => {
                inner.in_flight = Some(task);
                Dispatch::Task(task, inner.epoch_token.child_token())
            }
            None => Dispatch::Empty,
        }
    }

    /// Apply the result of a finished task.
    fn complete(
        &self,
        task: FetchTask,
        token: &CancellationToken,
        outcome: sp_core::Result<TaskOutcome>,
    ) {
        let mut inner = self.inner.lock();
        inner.in_flight = None;
        let index = task.index;
        let stale = token.is_cancelled();

        match outcome {
            Ok(TaskOutcome::Appended) => {
                self.events.broadcast(PumpEvent::SegmentAppended { index });

                if stale {
                    tracing::debug!(index = %index, "Segment appended after seek; not advancing");
                } else if inner.halted {
                    tracing::info!(index = %index, "Pump halted; stopping after in-flight segment");
                } else {
                    inner.enqueue_next(&self.events);
                    inner.run_requested = true;
                }
            }
            Ok(TaskOutcome::Discarded) => {
                self.events.broadcast(PumpEvent::SegmentDiscarded {
                    index,
                    epoch: task.epoch,
                });
            }
            Err(e) if stale => {
                tracing::debug!(
                    index = %index,
                    error = %e,
                    "Ignoring failure of segment fetched before seek"
                );
                self.events.broadcast(PumpEvent::SegmentDiscarded {
                    index,
                    epoch: task.epoch,
                });
            }
            Err(e) => {
                tracing::error!(index = %index, error = %e, "Segment task failed; halting pump");

                inner.cursor = index;
                inner.run_requested = false;
                let dropped = inner.queue.clear();
                if dropped > 0 {
                    tracing::debug!(dropped, "Discarded look-ahead beyond failed segment");
                }

                let failure = TaskFailure::new(index, &e);
                self.events.broadcast(PumpEvent::TaskFailed {
                    index,
                    code: failure.code.clone(),
                    error: failure.error.clone(),
                });
                inner.last_failure = Some(failure);
                inner.halt(&self.events);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SegmentPump
// ---------------------------------------------------------------------------

/// Handle to a running segment pump.
///
/// Dropping the handle stops the worker; [`shutdown`](Self::shutdown) does
/// the same and waits for it to exit.
pub struct SegmentPump {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl SegmentPump {
    /// Create a pump over `catalog` and spawn its worker.
    ///
    /// The pump starts idle with nothing queued; call [`init`](Self::init)
    /// to begin delivery. Must be called from within a Tokio runtime.
    pub fn spawn<S, K>(catalog: Arc<Catalog>, source: S, sink: K, config: PumpConfig) -> Self
    where
        S: RangeSource + 'static,
        K: AppendSink,
    {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner::new()),
            wake: Notify::new(),
            events: EventBus::new(config.event_capacity),
            catalog,
            config,
        });
        let shutdown = CancellationToken::new();

        let worker = tokio::spawn(run_worker(
            shared.clone(),
            Arc::new(source),
            Box::new(sink),
            shutdown.clone(),
        ));

        Self {
            shared,
            shutdown,
            worker: Some(worker),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.shared.catalog
    }

    pub fn config(&self) -> &PumpConfig {
        &self.shared.config
    }

    /// Queue the init segment, then `[start, end)`, and start the loop.
    ///
    /// Indices are not validated here; an index outside the catalog fails
    /// when its task runs.
    pub fn init(&self, start: SegmentIndex, end: SegmentIndex) -> sp_core::Result<()> {
        {
            let mut inner = self.shared.inner.lock();
            if inner.initialized {
                return Err(Error::InvalidState("pump already initialized".into()));
            }
            inner.initialized = true;

            inner.enqueue_next(&self.shared.events);
            inner.cursor = start;
            for _ in start.get()..end.get() {
                inner.enqueue_next(&self.shared.events);
            }
            inner.run_requested = true;
        }

        tracing::info!(
            start = %start,
            end = %end,
            segments = self.shared.catalog.len(),
            "Segment pump initialized"
        );
        self.shared
            .events
            .broadcast(PumpEvent::Initialized { start, end });
        self.shared.wake.notify_one();
        Ok(())
    }

    /// [`init`](Self::init) with the window from [`PumpConfig`].
    pub fn init_from_config(&self) -> sp_core::Result<()> {
        let config = &self.shared.config;
        self.init(config.start(), config.end())
    }

    /// Queue a task for the cursor and advance it. Does not start the loop.
    pub fn enqueue_next(&self) -> SegmentIndex {
        self.shared.inner.lock().enqueue_next(&self.shared.events)
    }

    /// Ask the worker to take the next queued task.
    pub fn run(&self) {
        self.shared.inner.lock().run_requested = true;
        self.shared.wake.notify_one();
    }

    /// Stop advancing after the in-flight task completes.
    pub fn halt(&self) {
        let mut inner = self.shared.inner.lock();
        inner.halt(&self.shared.events);
        tracing::info!(current_index = %inner.cursor, "Segment pump halted");
    }

    /// Clear the halt, queue the cursor, and restart the loop.
    pub fn unhalt(&self) {
        {
            let mut inner = self.shared.inner.lock();
            inner.unhalt(&self.shared.events);
            tracing::info!(current_index = %inner.cursor, "Segment pump resumed");
        }
        self.shared.wake.notify_one();
    }

    pub fn is_halted(&self) -> bool {
        self.shared.inner.lock().halted
    }

    /// Restart delivery at `index`, discarding queued and in-flight work.
    pub fn seek_to_index(&self, index: impl Into<SegmentIndex>) {
        let index = index.into();
        {
            let mut inner = self.shared.inner.lock();
            let events = &self.shared.events;

            inner.halt(events);
            let discarded = inner.queue.clear();
            inner.cursor = index;

            inner.next_epoch();

            if self.shared.config.refetch_init_on_seek && !index.is_init() {
                let epoch = inner.epoch;
                inner.queue.push(FetchTask::new(SegmentIndex::INIT, epoch));
                events.broadcast(PumpEvent::SegmentQueued {
                    index: SegmentIndex::INIT,
                });
            }

            tracing::info!(
                index = %index,
                epoch = inner.epoch,
                discarded,
                "Seeking segment pump"
            );
            events.broadcast(PumpEvent::Seeked {
                index,
                epoch: inner.epoch,
                discarded,
            });

            inner.unhalt(events);
        }
        self.shared.wake.notify_one();
    }

    /// Return the pump to its freshly spawned state so it can be initialized
    /// again.
    ///
    /// Queued tasks are dropped and an in-flight fetch is cancelled; an
    /// append already handed to the sink finishes without advancing.
    pub fn reset(&self) {
        let mut inner = self.shared.inner.lock();
        let discarded = inner.queue.clear();
        inner.next_epoch();
        inner.cursor = SegmentIndex::INIT;
        inner.halted = false;
        inner.run_requested = false;
        inner.last_failure = None;
        inner.initialized = false;

        tracing::info!(epoch = inner.epoch, discarded, "Segment pump reset");
        self.shared
            .events
            .broadcast(PumpEvent::Reset { epoch: inner.epoch });
    }

    /// Seek to the first segment whose time span contains `seconds`.
    ///
    /// Returns the chosen index, or `None` (and changes nothing) when no
    /// segment matches.
    pub fn seek_to_time(&self, seconds: f64) -> Option<SegmentIndex> {
        match self.shared.catalog.find_by_time(seconds) {
            Some(index) => {
                self.seek_to_index(index);
                Some(index)
            }
            None => {
                tracing::debug!(seconds, "No segment contains seek time; ignoring");
                None
            }
        }
    }

    /// Index the next `enqueue_next` will queue.
    pub fn current_index(&self) -> SegmentIndex {
        self.shared.inner.lock().cursor
    }

    pub fn status(&self) -> PumpStatus {
        let inner = self.shared.inner.lock();
        PumpStatus {
            state: inner.state(),
            current_index: inner.cursor,
            queued: inner.queue.indices(),
            in_flight: inner.in_flight,
            epoch: inner.epoch,
            last_failure: inner.last_failure.clone(),
        }
    }

    /// Subscribe to pump events, including task failures.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    /// The `n` most recent events, newest first.
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        self.shared.events.recent_events(n)
    }

    /// Stop the worker and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::warn!("Segment pump worker panicked: {e}");
            }
        }
    }
}

impl fmt::Debug for SegmentPump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentPump")
            .field("segments", &self.shared.catalog.len())
            .field("status", &self.status())
            .finish()
    }
}

impl Drop for SegmentPump {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Single consumer of the task queue. Runs until `shutdown` is cancelled.
async fn run_worker(
    shared: Arc<Shared>,
    source: Arc<dyn RangeSource>,
    mut sink: Box<dyn AppendSink>,
    shutdown: CancellationToken,
) {
    tracing::info!(source = source.name(), "Segment pump worker started");

    let ctx = TaskContext {
        catalog: &shared.catalog,
        source: source.as_ref(),
        events: &shared.events,
        fetch_timeout: shared.config.fetch_timeout_ms.map(Duration::from_millis),
    };

    loop {
        let (task, token) = match shared.next_dispatch() {
            Dispatch::Task(task, token) => (task, token),
            Dispatch::Empty => {
                tracing::warn!("Fetch queue empty");
                shared.events.broadcast(PumpEvent::QueueEmpty);
                continue;
            }
            Dispatch::Wait => {
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = shutdown.cancelled() => break,
                }
                continue;
            }
        };

        let outcome = tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,
            outcome = task::fetch_and_append(&ctx, sink.as_mut(), task, &token) => outcome,
        };

        shared.complete(task, &token, outcome);
    }

    shared.inner.lock().in_flight = None;
    shared.events.broadcast(PumpEvent::WorkerStopped);
    tracing::info!("Segment pump worker stopped");
}
