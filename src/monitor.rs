//! Polling lifecycle for one in-flight generation task
//!
//! A [`TaskMonitor`] owns two independently-timed polling loops bound to a
//! single task: a status/progress loop and a log loop. Their observations
//! are merged into one [`TaskSnapshot`] published through a
//! [`tokio::sync::watch`] channel, so readers always see a fully-formed
//! snapshot and never a partially-updated one.
//!
//! # Lifecycle
//!
//! - `start(handle)` binds the handle and schedules both loops; the first
//!   fetch of each loop fires immediately rather than waiting a full
//!   interval. Calling `start` while already active is equivalent to
//!   `stop()` followed by `start`; one monitor never polls two handles
//!   concurrently.
//! - `stop()` is synchronous, idempotent, and callable from any state. It
//!   cancels both timers; an in-flight fetch is not aborted at the
//!   transport level, but its result is discarded on arrival.
//!
//! # Staleness discipline
//!
//! Every in-flight fetch carries the epoch and task id captured at dispatch
//! time. A completion is applied only if the monitor is still active with
//! that same epoch and bound id; anything else is silently dropped. This is
//! what guarantees that a response for handle A is never applied after the
//! monitor has moved on to handle B or has stopped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::poller::TaskPoller;
use crate::types::{TaskHandle, TaskId, TaskSnapshot};

struct MonitorState {
    /// Id of the task currently being polled, if any
    bound: Option<TaskId>,
    /// Incremented on every start/stop; in-flight fetches from an older
    /// epoch are discarded at completion time
    epoch: u64,
    /// Cancellation token for the currently scheduled loops
    cancel: Option<CancellationToken>,
}

/// Monitors one backend generation task through periodic status and log polls
pub struct TaskMonitor {
    poller: Arc<dyn TaskPoller>,
    status_interval: Duration,
    log_interval: Duration,
    degraded_threshold: u32,
    auto_stop_on_terminal: bool,
    state: Arc<Mutex<MonitorState>>,
    snapshot_tx: watch::Sender<TaskSnapshot>,
}

impl TaskMonitor {
    /// Create an idle monitor polling through `poller`
    pub fn new(poller: Arc<dyn TaskPoller>, config: &Config) -> Self {
        let (snapshot_tx, _) = watch::channel(TaskSnapshot::default());
        Self {
            poller,
            status_interval: config.status_poll_interval,
            log_interval: config.log_poll_interval,
            degraded_threshold: config.degraded_threshold,
            auto_stop_on_terminal: config.auto_stop_on_terminal,
            state: Arc::new(Mutex::new(MonitorState {
                bound: None,
                epoch: 0,
                cancel: None,
            })),
            snapshot_tx,
        }
    }

    /// Bind `handle` and begin polling it
    ///
    /// Resets the snapshot wholesale, so no data from a previously bound
    /// handle leaks into the new one. If the monitor is already active this
    /// is equivalent to `stop()` followed by `start(handle)`.
    pub fn start(&self, handle: TaskHandle) {
        let token = CancellationToken::new();
        let epoch = {
            let mut st = lock_state(&self.state);
            if let Some(previous) = st.cancel.take() {
                previous.cancel();
            }
            st.epoch += 1;
            st.bound = Some(handle.id.clone());
            st.cancel = Some(token.clone());
            st.epoch
        };

        self.snapshot_tx.send_replace(TaskSnapshot::default());
        tracing::debug!(task_id = %handle.id, "task monitor started");

        self.spawn_status_loop(handle.id.clone(), epoch, token.clone());
        self.spawn_log_loop(handle.id, epoch, token);
    }

    /// Stop polling
    ///
    /// Synchronous: no further timer firings occur after this returns, and
    /// any in-flight fetch result is discarded on arrival. The snapshot is
    /// left untouched. Safe to call repeatedly and from any state.
    pub fn stop(&self) {
        let mut st = lock_state(&self.state);
        st.epoch += 1;
        st.bound = None;
        if let Some(token) = st.cancel.take() {
            token.cancel();
            tracing::debug!("task monitor stopped");
        }
    }

    /// Whether a task is currently bound and being polled
    pub fn is_active(&self) -> bool {
        lock_state(&self.state).cancel.is_some()
    }

    /// Id of the currently bound task, if any
    pub fn bound_task(&self) -> Option<TaskId> {
        lock_state(&self.state).bound.clone()
    }

    /// The current snapshot
    pub fn snapshot(&self) -> TaskSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Subscribe to snapshot updates
    ///
    /// Each received value is a complete snapshot replacing the previous
    /// one.
    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn spawn_status_loop(&self, id: TaskId, epoch: u64, cancel: CancellationToken) {
        let poller = Arc::clone(&self.poller);
        let state = Arc::clone(&self.state);
        let snapshot_tx = self.snapshot_tx.clone();
        let interval = self.status_interval;
        let threshold = self.degraded_threshold;
        let auto_stop = self.auto_stop_on_terminal;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut consecutive_failures: u32 = 0;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match poller.fetch_status(&id).await {
                            Ok(update) => {
                                consecutive_failures = 0;
                                if !may_apply(&state, epoch, &id) {
                                    tracing::debug!(task_id = %id, "discarding stale status response");
                                    break;
                                }
                                snapshot_tx.send_modify(|snapshot| {
                                    snapshot.status = update.status;
                                    snapshot.progress = update.progress;
                                });
                                tracing::debug!(
                                    task_id = %id,
                                    status = ?update.status,
                                    progress = update.progress,
                                    "status updated"
                                );
                                if auto_stop && update.status.is_terminal() {
                                    stop_epoch(&state, epoch);
                                    tracing::debug!(task_id = %id, "auto-stopped on terminal status");
                                    break;
                                }
                            }
                            Err(e) => {
                                consecutive_failures += 1;
                                if consecutive_failures == threshold {
                                    tracing::warn!(
                                        task_id = %id,
                                        failures = consecutive_failures,
                                        error = %e,
                                        "status polling degraded"
                                    );
                                } else {
                                    tracing::debug!(task_id = %id, error = %e, "status poll failed");
                                }
                            }
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        });
    }

    fn spawn_log_loop(&self, id: TaskId, epoch: u64, cancel: CancellationToken) {
        let poller = Arc::clone(&self.poller);
        let state = Arc::clone(&self.state);
        let snapshot_tx = self.snapshot_tx.clone();
        let interval = self.log_interval;
        let threshold = self.degraded_threshold;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut consecutive_failures: u32 = 0;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match poller.fetch_logs(&id).await {
                            Ok(update) => {
                                consecutive_failures = 0;
                                if !may_apply(&state, epoch, &id) {
                                    tracing::debug!(task_id = %id, "discarding stale log response");
                                    break;
                                }
                                // The backend returns the full accumulated
                                // log, so this replaces rather than appends.
                                snapshot_tx.send_modify(|snapshot| {
                                    snapshot.logs = update.logs;
                                });
                            }
                            Err(e) => {
                                consecutive_failures += 1;
                                if consecutive_failures == threshold {
                                    tracing::warn!(
                                        task_id = %id,
                                        failures = consecutive_failures,
                                        error = %e,
                                        "log polling degraded"
                                    );
                                } else {
                                    tracing::debug!(task_id = %id, error = %e, "log poll failed");
                                }
                            }
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        });
    }
}

fn lock_state(state: &Arc<Mutex<MonitorState>>) -> MutexGuard<'_, MonitorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Whether a fetch dispatched at (`epoch`, `id`) may still be applied
fn may_apply(state: &Arc<Mutex<MonitorState>>, epoch: u64, id: &TaskId) -> bool {
    let st = lock_state(state);
    st.cancel.is_some() && st.epoch == epoch && st.bound.as_ref() == Some(id)
}

/// Stop the loops belonging to `epoch`, if they are still the active ones
fn stop_epoch(state: &Arc<Mutex<MonitorState>>, epoch: u64) {
    let mut st = lock_state(state);
    if st.epoch != epoch {
        return;
    }
    st.epoch += 1;
    st.bound = None;
    if let Some(token) = st.cancel.take() {
        token.cancel();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::poller::{LogsUpdate, StatusUpdate};
    use crate::types::TaskStatus;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Notify;

    fn poll_error() -> Error {
        Error::Submission {
            status: 500,
            body: "poll failed".into(),
        }
    }

    fn test_config() -> Config {
        Config {
            status_poll_interval: Duration::from_millis(10),
            log_poll_interval: Duration::from_millis(15),
            degraded_threshold: 3,
            ..Config::default()
        }
    }

    fn handle(id: &str) -> TaskHandle {
        TaskHandle::new(TaskId::new(id))
    }

    /// Poller that drains scripted replies, then repeats a steady reply.
    struct FakePoller {
        status_queue: Mutex<VecDeque<Result<StatusUpdate>>>,
        steady_status: StatusUpdate,
        steady_logs: LogsUpdate,
        status_calls: AtomicU32,
    }

    impl FakePoller {
        fn steady(status: TaskStatus, progress: u32, logs: &str) -> Self {
            Self {
                status_queue: Mutex::new(VecDeque::new()),
                steady_status: StatusUpdate { status, progress },
                steady_logs: LogsUpdate { logs: logs.into() },
                status_calls: AtomicU32::new(0),
            }
        }

        fn with_status_failures(mut self, count: usize) -> Self {
            let mut queue = VecDeque::new();
            for _ in 0..count {
                queue.push_back(Err(poll_error()));
            }
            self.status_queue = Mutex::new(queue);
            self
        }

        fn status_calls(&self) -> u32 {
            self.status_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskPoller for FakePoller {
        async fn fetch_status(&self, _id: &TaskId) -> Result<StatusUpdate> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            match self.status_queue.lock().unwrap().pop_front() {
                Some(reply) => reply,
                None => Ok(self.steady_status),
            }
        }

        async fn fetch_logs(&self, _id: &TaskId) -> Result<LogsUpdate> {
            Ok(self.steady_logs.clone())
        }
    }

    /// Poller whose fetches block until released, to hold responses
    /// in flight across stop/rebind.
    struct GatedPoller {
        release: Notify,
        update: StatusUpdate,
        logs: LogsUpdate,
    }

    impl GatedPoller {
        fn new(progress: u32, logs: &str) -> Self {
            Self {
                release: Notify::new(),
                update: StatusUpdate {
                    status: TaskStatus::Running,
                    progress,
                },
                logs: LogsUpdate { logs: logs.into() },
            }
        }
    }

    #[async_trait]
    impl TaskPoller for GatedPoller {
        async fn fetch_status(&self, _id: &TaskId) -> Result<StatusUpdate> {
            self.release.notified().await;
            Ok(self.update)
        }

        async fn fetch_logs(&self, _id: &TaskId) -> Result<LogsUpdate> {
            self.release.notified().await;
            Ok(self.logs.clone())
        }
    }

    /// Poller that blocks fetches for task "a" until released and answers
    /// for task "b" immediately, with distinguishable data per task.
    struct SplitPoller {
        release_a: Notify,
    }

    #[async_trait]
    impl TaskPoller for SplitPoller {
        async fn fetch_status(&self, id: &TaskId) -> Result<StatusUpdate> {
            if id.as_str() == "a" {
                self.release_a.notified().await;
                Ok(StatusUpdate {
                    status: TaskStatus::Running,
                    progress: 11,
                })
            } else {
                Ok(StatusUpdate {
                    status: TaskStatus::Running,
                    progress: 22,
                })
            }
        }

        async fn fetch_logs(&self, id: &TaskId) -> Result<LogsUpdate> {
            if id.as_str() == "a" {
                self.release_a.notified().await;
                Ok(LogsUpdate {
                    logs: "from a\n".into(),
                })
            } else {
                Ok(LogsUpdate {
                    logs: "from b\n".into(),
                })
            }
        }
    }

    #[tokio::test]
    async fn first_fetch_fires_immediately() {
        let poller = Arc::new(FakePoller::steady(TaskStatus::Running, 10, "init\n"));
        // intervals far longer than the test: only the immediate first
        // tick of each loop can produce these values
        let config = Config {
            status_poll_interval: Duration::from_secs(30),
            log_poll_interval: Duration::from_secs(30),
            ..Config::default()
        };
        let monitor = TaskMonitor::new(poller, &config);

        monitor.start(handle("t-1"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.status, TaskStatus::Running);
        assert_eq!(snapshot.progress, 10);
        assert_eq!(snapshot.logs, "init\n");

        monitor.stop();
    }

    #[tokio::test]
    async fn progress_is_passed_through_unclamped() {
        let poller = Arc::new(FakePoller::steady(TaskStatus::Running, 150, ""));
        let monitor = TaskMonitor::new(poller, &test_config());

        monitor.start(handle("t-1"));
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(monitor.snapshot().progress, 150);
        monitor.stop();
    }

    #[tokio::test]
    async fn poll_failures_leave_snapshot_untouched_and_loop_continues() {
        let poller = Arc::new(
            FakePoller::steady(TaskStatus::Running, 30, "").with_status_failures(4),
        );
        let monitor = TaskMonitor::new(Arc::clone(&poller) as Arc<dyn TaskPoller>, &test_config());

        monitor.start(handle("t-1"));
        tokio::time::sleep(Duration::from_millis(150)).await;

        // failures (including a full degraded-threshold streak) were
        // swallowed and the loop recovered on the next successful tick
        assert_eq!(monitor.snapshot().progress, 30);
        assert!(poller.status_calls() > 4);
        monitor.stop();
    }

    #[tokio::test]
    async fn stop_discards_in_flight_responses() {
        let poller = Arc::new(GatedPoller::new(99, "late\n"));
        let monitor = TaskMonitor::new(Arc::clone(&poller) as Arc<dyn TaskPoller>, &test_config());

        monitor.start(handle("t-1"));
        // let both loops dispatch their first fetch and block on the gate
        tokio::time::sleep(Duration::from_millis(50)).await;

        monitor.stop();
        let before = monitor.snapshot();

        // release the in-flight fetches after the stop
        poller.release.notify_waiters();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(monitor.snapshot(), before);
    }

    #[tokio::test]
    async fn rebinding_discards_responses_from_the_previous_handle() {
        let poller = Arc::new(SplitPoller {
            release_a: Notify::new(),
        });
        let monitor = TaskMonitor::new(Arc::clone(&poller) as Arc<dyn TaskPoller>, &test_config());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut rx = monitor.subscribe();
        let seen_writer = Arc::clone(&seen);
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow().clone();
                seen_writer.lock().unwrap().push(snapshot);
            }
        });

        monitor.start(handle("a"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        // rebinding while task "a" fetches are still in flight
        monitor.start(handle("b"));
        tokio::time::sleep(Duration::from_millis(60)).await;

        // now let the stale task "a" responses land
        poller.release_a.notify_waiters();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.progress, 22);
        assert_eq!(snapshot.logs, "from b\n");
        assert_eq!(monitor.bound_task(), Some(TaskId::new("b")));

        // no published snapshot ever carried task "a" data
        let seen = seen.lock().unwrap();
        assert!(seen.iter().all(|s| s.progress != 11 && s.logs != "from a\n"));

        monitor.stop();
    }

    #[tokio::test]
    async fn starting_resets_the_snapshot_wholesale() {
        let poller = Arc::new(GatedPoller::new(50, "first\n"));
        let monitor = TaskMonitor::new(Arc::clone(&poller) as Arc<dyn TaskPoller>, &test_config());

        monitor.start(handle("t-1"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        poller.release.notify_waiters();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(monitor.snapshot().progress, 50);

        monitor.stop();
        // stop leaves the last snapshot in place for the view
        assert_eq!(monitor.snapshot().progress, 50);

        monitor.start(handle("t-2"));
        // before any fetch for t-2 completes, the snapshot is back to default
        assert_eq!(monitor.snapshot(), TaskSnapshot::default());
        monitor.stop();
    }

    #[tokio::test]
    async fn logs_are_replaced_not_appended() {
        let poller = Arc::new(FakePoller::steady(TaskStatus::Running, 10, "init\nstep2\n"));
        let monitor = TaskMonitor::new(poller, &test_config());

        monitor.start(handle("t-1"));
        // several log ticks elapse; each replaces the whole text
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(monitor.snapshot().logs, "init\nstep2\n");
        monitor.stop();
    }

    #[tokio::test]
    async fn monitor_keeps_polling_after_terminal_status_by_default() {
        let poller = Arc::new(FakePoller::steady(TaskStatus::Completed, 100, "done\n"));
        let monitor = TaskMonitor::new(Arc::clone(&poller) as Arc<dyn TaskPoller>, &test_config());

        monitor.start(handle("t-1"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(monitor.is_active());
        assert!(poller.status_calls() > 2);
        monitor.stop();
    }

    #[tokio::test]
    async fn opt_in_auto_stop_ends_polling_on_terminal_status() {
        let poller = Arc::new(FakePoller::steady(TaskStatus::Completed, 100, "done\n"));
        let config = Config {
            auto_stop_on_terminal: true,
            ..test_config()
        };
        let monitor = TaskMonitor::new(Arc::clone(&poller) as Arc<dyn TaskPoller>, &config);

        monitor.start(handle("t-1"));
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(!monitor.is_active());
        assert_eq!(monitor.snapshot().status, TaskStatus::Completed);
        // the terminal status was applied exactly once, then polling ceased
        assert_eq!(poller.status_calls(), 1);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_safe_from_any_state() {
        let poller = Arc::new(FakePoller::steady(TaskStatus::Running, 10, ""));
        let monitor = TaskMonitor::new(poller, &test_config());

        // stop before any start
        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_active());

        monitor.start(handle("t-1"));
        assert!(monitor.is_active());

        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_active());
        assert_eq!(monitor.bound_task(), None);
    }
}
