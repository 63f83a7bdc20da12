//! # Sync Controller
//!
//! Owns the set of active schedule workers and starts/stops them as a
//! group or individually.
//!
//! ## Invariants
//!
//! - At most one interval worker is active: a second `start_interval`
//!   while one is live is a no-op that reports "already running".
//! - `start_clock` replaces the previous clock worker set: the old set is
//!   cancelled and joined (bounded) before the new one spawns.
//! - `stop_all` is idempotent and safe with no workers active.
//! - Configuration errors surface synchronously from `start_*` and
//!   prevent worker creation entirely.

use bridge_traits::source::RowSource;
use bridge_traits::store::RemoteStore;
use bridge_traits::time::Clock;
use chrono::NaiveTime;
use core_runtime::events::{CoreEvent, EventBus, WorkerEvent};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::{ExportError, Result};
use crate::pipeline::ExportPipeline;
use crate::schedule::ScheduleSpec;
use crate::target::ExportTarget;
use crate::worker::{spawn_worker, RunState, WorkerHandle};

/// What a `start_interval` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new worker was spawned.
    Started,
    /// An interval worker was already active; nothing changed.
    AlreadyRunning,
}

/// Controller owning all schedule workers of one sync session.
pub struct SyncController {
    pipeline: Arc<ExportPipeline>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    interval_worker: Mutex<Option<WorkerHandle>>,
    clock_workers: Mutex<Vec<WorkerHandle>>,
}

impl SyncController {
    /// Create a controller over the given boundary implementations.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Configuration` when the configuration fails
    /// validation.
    pub fn new(
        source: Arc<dyn RowSource>,
        store: Arc<dyn RemoteStore>,
        events: EventBus,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let pipeline = Arc::new(ExportPipeline::new(
            source,
            store,
            events.clone(),
            Arc::clone(&clock),
            config.clone(),
        ));

        Ok(Self {
            pipeline,
            events,
            clock,
            config,
            interval_worker: Mutex::new(None),
            clock_workers: Mutex::new(Vec::new()),
        })
    }

    /// The pipeline, for one-shot manual exports outside any schedule.
    pub fn pipeline(&self) -> &Arc<ExportPipeline> {
        &self.pipeline
    }

    /// Start the interval strategy: one worker cycling every `period`.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Configuration` when no targets are given or
    /// the period is zero.
    #[instrument(skip(self, targets), fields(targets = targets.len(), period_secs = period.as_secs()))]
    pub async fn start_interval(
        &self,
        targets: Vec<ExportTarget>,
        period: std::time::Duration,
    ) -> Result<StartOutcome> {
        if targets.is_empty() {
            return Err(ExportError::Configuration(
                "No targets selected for interval sync".to_string(),
            ));
        }
        if period.is_zero() {
            return Err(ExportError::Configuration(
                "Sync interval must be greater than zero".to_string(),
            ));
        }

        let mut slot = self.interval_worker.lock().await;
        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                warn!("Interval sync is already running");
                self.events
                    .emit(CoreEvent::Worker(WorkerEvent::AlreadyRunning))
                    .ok();
                return Ok(StartOutcome::AlreadyRunning);
            }
        }

        info!("Starting interval sync");
        *slot = Some(self.spawn(ScheduleSpec::Interval { period }, targets));
        Ok(StartOutcome::Started)
    }

    /// Start the clock strategy: one worker per distinct daily time.
    ///
    /// Any previously running clock worker set is stopped first.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Configuration` when no targets or no times
    /// are given.
    #[instrument(skip(self, targets, times), fields(targets = targets.len(), times = times.len()))]
    pub async fn start_clock(
        &self,
        targets: Vec<ExportTarget>,
        times: Vec<NaiveTime>,
    ) -> Result<usize> {
        if targets.is_empty() {
            return Err(ExportError::Configuration(
                "No targets selected for scheduled sync".to_string(),
            ));
        }
        if times.is_empty() {
            return Err(ExportError::Configuration(
                "No schedule times selected".to_string(),
            ));
        }

        let distinct: BTreeSet<NaiveTime> = times.into_iter().collect();

        // Replace, never accumulate: stop the previous set first.
        let old = {
            let mut workers = self.clock_workers.lock().await;
            std::mem::take(&mut *workers)
        };
        Self::stop_workers(old, self.config.stop_join_timeout).await;

        let handles: Vec<WorkerHandle> = distinct
            .iter()
            .map(|time_of_day| {
                self.spawn(
                    ScheduleSpec::DailyClock {
                        time_of_day: *time_of_day,
                    },
                    targets.clone(),
                )
            })
            .collect();

        let count = handles.len();
        *self.clock_workers.lock().await = handles;

        info!(workers = count, "Started scheduled sync");
        Ok(count)
    }

    /// Stop every active worker: signal cancellation, then join each with
    /// a bounded wait. Idempotent.
    #[instrument(skip(self))]
    pub async fn stop_all(&self) {
        let interval = self.interval_worker.lock().await.take();
        let clocks = {
            let mut workers = self.clock_workers.lock().await;
            std::mem::take(&mut *workers)
        };

        let all: Vec<WorkerHandle> = interval.into_iter().chain(clocks).collect();
        if all.is_empty() {
            return;
        }

        info!(workers = all.len(), "Stopping all schedule workers");
        Self::stop_workers(all, self.config.stop_join_timeout).await;
    }

    /// State of the interval worker, if one exists.
    pub async fn interval_state(&self) -> Option<RunState> {
        self.interval_worker
            .lock()
            .await
            .as_ref()
            .map(|handle| handle.state())
    }

    /// States of the clock workers, in schedule-time order.
    pub async fn clock_states(&self) -> Vec<RunState> {
        self.clock_workers
            .lock()
            .await
            .iter()
            .map(|handle| handle.state())
            .collect()
    }

    fn spawn(&self, spec: ScheduleSpec, targets: Vec<ExportTarget>) -> WorkerHandle {
        spawn_worker(
            spec,
            targets,
            Arc::clone(&self.pipeline),
            self.events.clone(),
            Arc::clone(&self.clock),
            self.config.cancel_poll_interval,
            self.config.retry_backoff,
        )
    }

    async fn stop_workers(handles: Vec<WorkerHandle>, timeout: std::time::Duration) {
        for handle in &handles {
            handle.cancel();
        }
        for handle in handles {
            handle.join(timeout).await;
        }
    }
}
