//! # Schedule Workers
//!
//! One cancellable background task per schedule, driving the pipeline
//! across a target set and reporting outcomes as events.
//!
//! ## State machine
//!
//! ```text
//! Idle -(start)-> Sleeping -(timer fires)-> Running -(success)-> Sleeping
//!                                              │
//!                      (failure, clock only)   ▼
//!                            Sleeping <- Retrying -(backoff)-> Running
//!
//! any state -(cancel observed)-> Stopped   (terminal)
//! ```
//!
//! The interval strategy has no `Retrying` state: a failed cycle is logged
//! and the loop proceeds to the next scheduled cycle. The clock strategy
//! retries a failed cycle after a back-off until it succeeds or the worker
//! is cancelled; a triggered cycle is never silently skipped.
//!
//! ## Cancellation
//!
//! Cancellation is cooperative. Every sleep decomposes into ticks of the
//! configured poll interval, and the token is checked at each tick and at
//! the top of each cycle, so cancellation latency is bounded by one tick
//! regardless of how long the remaining wait is. An in-flight pipeline
//! step runs to completion before cancellation is observed.

use bridge_traits::time::Clock;
use core_runtime::events::{CoreEvent, EventBus, WorkerEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::pipeline::{CycleReport, ExportPipeline};
use crate::schedule::{next_occurrence, ScheduleSpec};
use crate::target::ExportTarget;

/// Observable state of one schedule worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Created but not yet entered the loop.
    Idle,
    /// Waiting for the next trigger.
    Sleeping,
    /// A cycle is executing.
    Running,
    /// A failed clock cycle is waiting out its back-off.
    Retrying,
    /// Terminal; cancellation was observed.
    Stopped,
}

/// Sleep in cancellable ticks.
///
/// Returns `true` when cancellation was observed before the full duration
/// elapsed.
pub(crate) async fn sleep_cancellable(
    total: Duration,
    tick: Duration,
    cancel: &CancellationToken,
) -> bool {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if cancel.is_cancelled() {
            return true;
        }
        let step = remaining.min(tick);
        tokio::select! {
            _ = cancel.cancelled() => return true,
            _ = tokio::time::sleep(step) => {}
        }
        remaining = remaining.saturating_sub(step);
    }
    cancel.is_cancelled()
}

/// Handle to a spawned schedule worker.
///
/// Dropping the handle does not stop the worker; call
/// [`cancel`](WorkerHandle::cancel) (or the controller's `stop_all`).
pub struct WorkerHandle {
    spec: ScheduleSpec,
    cancel: CancellationToken,
    state: watch::Receiver<RunState>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// The schedule driving this worker.
    pub fn spec(&self) -> &ScheduleSpec {
        &self.spec
    }

    /// Signal cancellation. Monotonic: once signalled, never un-signalled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current worker state.
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Whether the worker task has terminated.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the worker task to finish, bounded by `timeout`.
    ///
    /// A worker that has not observed cancellation within the timeout is
    /// left running detached; with cooperative polling this only happens
    /// when a pipeline step is still in flight.
    pub async fn join(self, timeout: Duration) {
        if tokio::time::timeout(timeout, self.join).await.is_err() {
            warn!(spec = %self.spec, "Worker did not stop within the join timeout");
        }
    }
}

/// Spawn a worker for one schedule over a target set.
pub(crate) fn spawn_worker(
    spec: ScheduleSpec,
    targets: Vec<ExportTarget>,
    pipeline: Arc<ExportPipeline>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    retry_backoff: Duration,
) -> WorkerHandle {
    let cancel = CancellationToken::new();
    let (state_tx, state_rx) = watch::channel(RunState::Idle);

    let worker = ScheduleWorker {
        spec,
        targets,
        pipeline,
        events,
        clock,
        cancel: cancel.clone(),
        state_tx,
        poll_interval,
        retry_backoff,
    };

    let join = tokio::spawn(worker.run());

    WorkerHandle {
        spec,
        cancel,
        state: state_rx,
        join,
    }
}

struct ScheduleWorker {
    spec: ScheduleSpec,
    targets: Vec<ExportTarget>,
    pipeline: Arc<ExportPipeline>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    state_tx: watch::Sender<RunState>,
    poll_interval: Duration,
    retry_backoff: Duration,
}

impl ScheduleWorker {
    fn set_state(&self, state: RunState) {
        self.state_tx.send_replace(state);
    }

    fn schedule_label(&self) -> String {
        self.spec.to_string()
    }

    fn emit_cycle_completed(&self, report: &CycleReport) {
        self.events
            .emit(CoreEvent::Worker(WorkerEvent::CycleCompleted {
                schedule: self.schedule_label(),
                uploaded: report.uploaded_count(),
                skipped: report.skipped_count(),
                failed: report.failed_count(),
            }))
            .ok();
    }

    #[instrument(skip(self), fields(schedule = %self.spec))]
    async fn run(self) {
        info!("Schedule worker started");
        self.events
            .emit(CoreEvent::Worker(WorkerEvent::Started {
                schedule: self.schedule_label(),
            }))
            .ok();

        match self.spec {
            ScheduleSpec::Interval { period } => self.run_interval(period).await,
            ScheduleSpec::DailyClock { time_of_day } => self.run_clock(time_of_day).await,
        }

        self.set_state(RunState::Stopped);
        info!("Schedule worker stopped");
        self.events
            .emit(CoreEvent::Worker(WorkerEvent::Stopped {
                schedule: self.schedule_label(),
            }))
            .ok();
    }

    /// Interval strategy: run a cycle, sleep out the period, repeat.
    /// Failures never terminate the loop; the next cycle proceeds.
    async fn run_interval(&self, period: Duration) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            self.set_state(RunState::Running);
            let report = self.pipeline.run_cycle(&self.targets).await;
            if report.has_failures() {
                warn!(
                    failed = report.failed_count(),
                    "Interval cycle had failures, continuing to next cycle"
                );
            }
            self.emit_cycle_completed(&report);

            self.set_state(RunState::Sleeping);
            self.events
                .emit(CoreEvent::Worker(WorkerEvent::Waiting {
                    schedule: self.schedule_label(),
                    wait_secs: period.as_secs(),
                }))
                .ok();

            if sleep_cancellable(period, self.poll_interval, &self.cancel).await {
                return;
            }
        }
    }

    /// Clock strategy: sleep until the next occurrence, then run the cycle
    /// with retry-on-failure until it succeeds or cancellation lands.
    async fn run_clock(&self, time_of_day: chrono::NaiveTime) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            let now = self.clock.now_local().naive_local();
            let next = next_occurrence(now, time_of_day);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            info!(next = %next, wait_secs = wait.as_secs(), "Waiting for scheduled time");
            self.set_state(RunState::Sleeping);
            self.events
                .emit(CoreEvent::Worker(WorkerEvent::Waiting {
                    schedule: self.schedule_label(),
                    wait_secs: wait.as_secs(),
                }))
                .ok();

            if sleep_cancellable(wait, self.poll_interval, &self.cancel).await {
                return;
            }

            // A triggered cycle is never skipped: retry until success or
            // cancellation.
            loop {
                self.set_state(RunState::Running);
                let report = self.pipeline.run_cycle(&self.targets).await;

                if !report.has_failures() {
                    self.emit_cycle_completed(&report);
                    break;
                }

                warn!(
                    failed = report.failed_count(),
                    backoff_secs = self.retry_backoff.as_secs(),
                    "Scheduled cycle failed, retrying after back-off"
                );
                self.events
                    .emit(CoreEvent::Worker(WorkerEvent::RetryScheduled {
                        schedule: self.schedule_label(),
                        backoff_secs: self.retry_backoff.as_secs(),
                        failed: report.failed_count(),
                    }))
                    .ok();

                self.set_state(RunState::Retrying);
                if sleep_cancellable(self.retry_backoff, self.poll_interval, &self.cancel).await {
                    return;
                }
            }
        }
    }
}
