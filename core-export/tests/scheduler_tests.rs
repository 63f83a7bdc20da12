//! Scheduler integration tests
//!
//! Exercise the controller/worker/pipeline stack end to end against stub
//! boundary implementations: cancellation latency, the interval
//! single-instance invariant, and the clock strategy's retry loop.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::source::{CellValue, ConnectionParams, RowSet, RowSource};
use bridge_traits::store::RemoteStore;
use bridge_traits::time::Clock;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use core_export::{EngineConfig, ExportTarget, RunState, StartOutcome, SyncController};
use core_runtime::events::{CoreEvent, EventBus, WorkerEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Clock frozen at construction time, so schedule arithmetic is
/// deterministic while tokio timers still run on real time.
struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Row source returning two fixed rows and counting queries.
struct StubSource {
    queries: AtomicUsize,
}

impl StubSource {
    fn new() -> Self {
        Self {
            queries: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RowSource for StubSource {
    async fn execute(&self, _: &ConnectionParams, _: &str) -> BridgeResult<RowSet> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(RowSet::new(
            vec!["id".to_string(), "total".to_string()],
            vec![
                vec![CellValue::Integer(1), CellValue::Text("9.99".into())],
                vec![CellValue::Integer(2), CellValue::Text("5,00".into())],
            ],
        ))
    }

    async fn execute_mutation(&self, _: &ConnectionParams, _: &str) -> BridgeResult<u64> {
        Ok(0)
    }
}

/// Remote store whose uploads fail a configured number of times before
/// succeeding.
struct FlakyStore {
    failures_left: AtomicUsize,
    uploads: AtomicUsize,
}

impl FlakyStore {
    fn reliable() -> Self {
        Self::failing(0)
    }

    fn failing(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            uploads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RemoteStore for FlakyStore {
    async fn list_folder(&self, _: &str, _: &str) -> BridgeResult<Option<String>> {
        Ok(None)
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> BridgeResult<String> {
        Ok(format!("{}/{}", parent_id, name))
    }

    async fn upload_file(&self, _: &str, _: Bytes, _: &str) -> BridgeResult<String> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BridgeError::RemoteStore("upload refused".to_string()));
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok("file".to_string())
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig::new(ConnectionParams::new("db", "user", "pass", "test"))
        .with_cancel_poll_interval(Duration::from_millis(10))
        .with_retry_backoff(Duration::from_millis(50))
}

fn controller_with(
    source: Arc<StubSource>,
    store: Arc<FlakyStore>,
    clock: Arc<dyn Clock>,
) -> (Arc<SyncController>, EventBus) {
    let events = EventBus::new(1024);
    let controller = SyncController::new(source, store, events.clone(), clock, fast_config())
        .expect("valid configuration");
    (Arc::new(controller), events)
}

fn frozen_clock() -> Arc<FixedClock> {
    // A fixed instant for which now+3h stays on the same local calendar
    // day in every real UTC offset, so the schedule times below never
    // wrap to "tomorrow".
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 3, 0, 0).unwrap();
    Arc::new(FixedClock(now))
}

fn targets() -> Vec<ExportTarget> {
    vec![ExportTarget::table("orders")]
}

/// Poll a condition until it holds or the deadline passes.
async fn wait_for(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[tokio::test]
async fn test_interval_worker_runs_and_cancels_within_a_tick() {
    let source = Arc::new(StubSource::new());
    let store = Arc::new(FlakyStore::reliable());
    let (controller, _events) = controller_with(source, store.clone(), frozen_clock());

    // Long period: after the first cycle the worker sits in its sleep.
    let outcome = controller
        .start_interval(targets(), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started);

    assert!(
        wait_for(Duration::from_secs(5), || {
            store.uploads.load(Ordering::SeqCst) >= 1
        })
        .await,
        "first cycle never completed"
    );

    // Cancellation must land within the 10ms poll tick, not after the
    // remaining 60s period.
    let start = Instant::now();
    controller.stop_all().await;
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(controller.interval_state().await, None);
}

#[tokio::test]
async fn test_interval_worker_repeats_cycles() {
    let source = Arc::new(StubSource::new());
    let store = Arc::new(FlakyStore::reliable());
    let (controller, _events) = controller_with(source.clone(), store.clone(), frozen_clock());

    controller
        .start_interval(targets(), Duration::from_millis(30))
        .await
        .unwrap();

    assert!(
        wait_for(Duration::from_secs(5), || {
            store.uploads.load(Ordering::SeqCst) >= 3
        })
        .await,
        "interval worker did not keep cycling"
    );

    controller.stop_all().await;
}

#[tokio::test]
async fn test_second_start_interval_reports_already_running() {
    let source = Arc::new(StubSource::new());
    let store = Arc::new(FlakyStore::reliable());
    let (controller, events) = controller_with(source, store, frozen_clock());
    let mut subscriber = events.subscribe();

    let first = controller
        .start_interval(targets(), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(first, StartOutcome::Started);

    let second = controller
        .start_interval(targets(), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(second, StartOutcome::AlreadyRunning);

    // Exactly one interval worker is live, and the refusal was reported.
    assert!(controller.interval_state().await.is_some());

    let mut saw_already_running = false;
    while let Ok(event) = subscriber.try_recv() {
        if matches!(event, CoreEvent::Worker(WorkerEvent::AlreadyRunning)) {
            saw_already_running = true;
        }
    }
    assert!(saw_already_running);

    controller.stop_all().await;

    // With the previous worker stopped, a new start spawns again.
    let third = controller
        .start_interval(targets(), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(third, StartOutcome::Started);
    controller.stop_all().await;
}

#[tokio::test]
async fn test_start_validation_errors() {
    let source = Arc::new(StubSource::new());
    let store = Arc::new(FlakyStore::reliable());
    let (controller, _events) = controller_with(source, store, frozen_clock());

    assert!(controller
        .start_interval(vec![], Duration::from_secs(60))
        .await
        .is_err());
    assert!(controller
        .start_interval(targets(), Duration::ZERO)
        .await
        .is_err());
    assert!(controller.start_clock(vec![], vec![]).await.is_err());
    assert!(controller.start_clock(targets(), vec![]).await.is_err());

    // No worker was created by any of the rejected calls.
    assert_eq!(controller.interval_state().await, None);
    assert!(controller.clock_states().await.is_empty());
}

#[tokio::test]
async fn test_clock_worker_retries_until_success() {
    let source = Arc::new(StubSource::new());
    // First two upload attempts fail, the third succeeds.
    let store = Arc::new(FlakyStore::failing(2));
    let clock = frozen_clock();
    let (controller, events) = controller_with(source, store.clone(), clock.clone());
    let mut subscriber = events.subscribe();

    // Trigger one second after the frozen "now".
    let time_of_day = (clock.now_local() + chrono::Duration::seconds(1)).time();
    let count = controller
        .start_clock(targets(), vec![time_of_day])
        .await
        .unwrap();
    assert_eq!(count, 1);

    // Follow the event stream until the cycle completes; exactly two
    // retries must have been scheduled on the way, with the back-off
    // elapsing between attempts.
    let mut retries = 0;
    let completed = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match subscriber.recv().await {
                Ok(CoreEvent::Worker(WorkerEvent::RetryScheduled { .. })) => retries += 1,
                Ok(CoreEvent::Worker(WorkerEvent::CycleCompleted { .. })) => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
    })
    .await;
    assert!(matches!(completed, Ok(true)), "cycle never completed");
    assert_eq!(retries, 2);
    assert!(store.uploads.load(Ordering::SeqCst) >= 1);

    // After the successful cycle the worker is sleeping again.
    let mut sleeping = false;
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if controller.clock_states().await == vec![RunState::Sleeping] {
            sleeping = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(sleeping, "worker did not return to Sleeping after success");

    controller.stop_all().await;
}

#[tokio::test]
async fn test_clock_worker_cancelled_before_firing_never_runs() {
    let source = Arc::new(StubSource::new());
    let store = Arc::new(FlakyStore::reliable());
    let clock = frozen_clock();
    let (controller, _events) = controller_with(source.clone(), store.clone(), clock.clone());

    // Trigger an hour away; the worker parks in its cancellable sleep.
    let time_of_day = (clock.now_local() + chrono::Duration::hours(1)).time();
    controller
        .start_clock(targets(), vec![time_of_day])
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let start = Instant::now();
    controller.stop_all().await;
    assert!(start.elapsed() < Duration::from_secs(1));

    // Cancelled before firing: the pipeline never ran.
    assert_eq!(source.queries.load(Ordering::SeqCst), 0);
    assert_eq!(store.uploads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_start_clock_replaces_previous_set_and_dedupes_times() {
    let source = Arc::new(StubSource::new());
    let store = Arc::new(FlakyStore::reliable());
    let clock = frozen_clock();
    let (controller, events) = controller_with(source, store, clock.clone());
    let mut subscriber = events.subscribe();

    let far_away = (clock.now_local() + chrono::Duration::hours(2)).time();
    let other = (clock.now_local() + chrono::Duration::hours(3)).time();

    // Duplicate times collapse to one worker.
    let count = controller
        .start_clock(targets(), vec![far_away, far_away])
        .await
        .unwrap();
    assert_eq!(count, 1);

    // A second start replaces the first set rather than accumulating.
    let count = controller
        .start_clock(targets(), vec![other])
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(controller.clock_states().await.len(), 1);

    // The replaced worker reported its stop.
    let mut saw_stopped = false;
    while let Ok(event) = subscriber.try_recv() {
        if matches!(event, CoreEvent::Worker(WorkerEvent::Stopped { .. })) {
            saw_stopped = true;
        }
    }
    assert!(saw_stopped);

    controller.stop_all().await;
}

#[tokio::test]
async fn test_stop_all_is_idempotent() {
    let source = Arc::new(StubSource::new());
    let store = Arc::new(FlakyStore::reliable());
    let (controller, _events) = controller_with(source, store, frozen_clock());

    // Safe with no workers active, repeatedly.
    controller.stop_all().await;
    controller.stop_all().await;

    controller
        .start_interval(targets(), Duration::from_secs(60))
        .await
        .unwrap();
    controller.stop_all().await;
    controller.stop_all().await;

    assert_eq!(controller.interval_state().await, None);
}
