//! # Event Bus System
//!
//! Typed event broadcasting between the export engine and its observers,
//! built on `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Schedule workers and the pipeline never touch presentation state.
//! Instead, every worker state transition and every pipeline outcome is
//! emitted as a [`CoreEvent`] on the [`EventBus`]; the embedding
//! application subscribes and renders events however it likes (log pane,
//! file, structured log shipper).
//!
//! ```text
//! ┌────────────────┐    emit     ┌───────────┐
//! │ ScheduleWorker ├────────────>│           │
//! └────────────────┘             │ EventBus  │   subscribe   ┌──────────┐
//! ┌────────────────┐    emit     │ (broadcast├──────────────>│ Observer │
//! │ ExportPipeline ├────────────>│  channel) │               └──────────┘
//! └────────────────┘             └───────────┘
//! ```
//!
//! ## Error Handling
//!
//! `tokio::sync::broadcast` surfaces two receive errors:
//! - `RecvError::Lagged(n)`: the subscriber missed `n` events; non-fatal.
//! - `RecvError::Closed`: all senders dropped; treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall behind by more than this receive
/// `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Schedule worker lifecycle events
    Worker(WorkerEvent),
    /// Pipeline outcome events
    Export(ExportEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Worker(e) => e.description(),
            CoreEvent::Export(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Export(ExportEvent::Failed { .. })
            | CoreEvent::Export(ExportEvent::DeleteFailed { .. }) => EventSeverity::Error,
            CoreEvent::Worker(WorkerEvent::RetryScheduled { .. })
            | CoreEvent::Worker(WorkerEvent::AlreadyRunning)
            | CoreEvent::Export(ExportEvent::SkippedEmpty { .. }) => EventSeverity::Warning,
            CoreEvent::Worker(WorkerEvent::Waiting { .. })
            | CoreEvent::Export(ExportEvent::CycleStarted { .. }) => EventSeverity::Debug,
            _ => EventSeverity::Info,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Worker Events
// ============================================================================

/// Events describing schedule worker state transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum WorkerEvent {
    /// Worker task spawned and entering its loop.
    Started {
        /// Description of the schedule driving this worker.
        schedule: String,
    },
    /// Worker is sleeping until its next trigger.
    Waiting {
        /// Description of the schedule driving this worker.
        schedule: String,
        /// Seconds until the next trigger.
        wait_secs: u64,
    },
    /// A triggered cycle ran to completion.
    CycleCompleted {
        /// Description of the schedule driving this worker.
        schedule: String,
        /// Targets uploaded this cycle.
        uploaded: u64,
        /// Targets skipped because their fetch was empty.
        skipped: u64,
        /// Targets that failed this cycle.
        failed: u64,
    },
    /// A failed cycle will be retried after a back-off.
    RetryScheduled {
        /// Description of the schedule driving this worker.
        schedule: String,
        /// Seconds until the retry attempt.
        backoff_secs: u64,
        /// Number of targets that failed in the attempt.
        failed: u64,
    },
    /// An interval worker was requested while one is already active.
    AlreadyRunning,
    /// Worker observed cancellation and terminated.
    Stopped {
        /// Description of the schedule driving this worker.
        schedule: String,
    },
}

impl WorkerEvent {
    fn description(&self) -> &str {
        match self {
            WorkerEvent::Started { .. } => "Schedule worker started",
            WorkerEvent::Waiting { .. } => "Waiting for next trigger",
            WorkerEvent::CycleCompleted { .. } => "Sync cycle completed",
            WorkerEvent::RetryScheduled { .. } => "Sync cycle failed, retry scheduled",
            WorkerEvent::AlreadyRunning => "Interval sync is already running",
            WorkerEvent::Stopped { .. } => "Schedule worker stopped",
        }
    }
}

// ============================================================================
// Export Events
// ============================================================================

/// Events describing individual pipeline outcomes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ExportEvent {
    /// A cycle began; all of its uploads share one destination.
    CycleStarted {
        /// Destination folder path, `/`-joined.
        destination: String,
    },
    /// A target's rows were serialized and uploaded.
    Uploaded {
        /// Identifier of this pipeline run.
        run_id: String,
        /// Target name.
        target: String,
        /// Uploaded file name.
        file_name: String,
        /// Number of data rows uploaded.
        rows: u64,
        /// Destination folder identifier.
        folder_id: String,
    },
    /// A target's fetch returned no data rows; nothing was uploaded.
    SkippedEmpty {
        /// Identifier of this pipeline run.
        run_id: String,
        /// Target name.
        target: String,
    },
    /// A target's pipeline run failed.
    Failed {
        /// Identifier of this pipeline run.
        run_id: String,
        /// Target name.
        target: String,
        /// Human-readable error message.
        message: String,
    },
    /// Source rows were deleted after a successful upload.
    RowsDeleted {
        /// Target name.
        target: String,
        /// Number of rows deleted.
        rows: u64,
    },
    /// Post-upload delete failed; the upload itself stands.
    DeleteFailed {
        /// Target name.
        target: String,
        /// Human-readable error message.
        message: String,
    },
}

impl ExportEvent {
    fn description(&self) -> &str {
        match self {
            ExportEvent::CycleStarted { .. } => "Sync cycle started",
            ExportEvent::Uploaded { .. } => "Target uploaded",
            ExportEvent::SkippedEmpty { .. } => "No data for target, upload skipped",
            ExportEvent::Failed { .. } => "Target export failed",
            ExportEvent::RowsDeleted { .. } => "Source rows deleted after upload",
            ExportEvent::DeleteFailed { .. } => "Post-upload delete failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally: multiple producers (clone the
/// bus), multiple independent consumers (each `subscribe()`), non-blocking
/// sends, and lagging detection for slow subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are none. Emitters that don't care whether anyone
    /// is listening call `.ok()` on the result.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that sees all future
    /// events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let event_bus = EventBus::default();
/// let mut worker_stream = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Worker(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n`
    /// events, `RecvError::Closed` when all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
