//! Periodic task driver
//!
//! A [`Scheduler`] runs one async task repeatedly according to a
//! [`SchedulePolicy`]. Ticks never overlap: the loop awaits each tick
//! before arming the next one, and interval ticks that would have fired
//! while a slow tick was still running are skipped rather than queued.

mod policy;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::clock::Clock;
use crate::config::ConfigError;

pub use policy::{
    deadline_after, far_future, next_daily_delay, next_interval_deadline, SchedulePolicy,
    ScheduleSpec,
};

/// Work run on every tick
pub type Task = Arc<dyn Fn(ScheduleHandle) -> BoxFuture<'static, ()> + Send + Sync>;

struct Shared {
    name: String,
    stopped: AtomicBool,
    /// One-shot override for the next arming, set by `schedule_next`
    rearm: Mutex<Option<Duration>>,
    wake: watch::Sender<()>,
}

impl Shared {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn schedule_next(&self, after: Duration) {
        *self.rearm.lock() = Some(after);
        self.wake.send_replace(());
    }

    fn take_rearm(&self) -> Option<Duration> {
        self.rearm.lock().take()
    }

    fn stop(&self) -> bool {
        let was_stopped = self.stopped.swap(true, Ordering::SeqCst);
        self.wake.send_replace(());
        !was_stopped
    }
}

/// Control handle passed to the task on every tick
#[derive(Clone)]
pub struct ScheduleHandle {
    shared: Arc<Shared>,
}

impl ScheduleHandle {
    /// Fire the next tick `after` from now instead of at the policy's time.
    ///
    /// When called from inside a tick, this replaces the policy arming for
    /// that tick; the task won't fire twice.
    pub fn schedule_next(&self, after: Duration) {
        self.shared.schedule_next(after);
    }

    /// Stop the scheduler that owns this handle
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }
}

/// Drives a [`Task`] according to a [`SchedulePolicy`]
pub struct Scheduler {
    policy: SchedulePolicy,
    task: Task,
    clock: Arc<dyn Clock>,
    shared: Arc<Shared>,
    started: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        name: impl Into<String>,
        policy: SchedulePolicy,
        task: Task,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (wake, _) = watch::channel(());
        Self {
            policy,
            task,
            clock,
            shared: Arc::new(Shared {
                name: name.into(),
                stopped: AtomicBool::new(false),
                rearm: Mutex::new(None),
                wake,
            }),
            started: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Build a scheduler from its declarative spec
    pub fn from_config(
        name: impl Into<String>,
        spec: &ScheduleSpec,
        task: Task,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let policy = SchedulePolicy::from_spec(spec)?;
        Ok(Self::new(name, policy, task, clock))
    }

    pub fn policy(&self) -> &SchedulePolicy {
        &self.policy
    }

    pub fn handle(&self) -> ScheduleHandle {
        ScheduleHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run the first tick now, then keep ticking in the background.
    ///
    /// Returns once the first tick has completed. Starting twice is a no-op.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!(scheduler = %self.shared.name, "Scheduler already started");
            return;
        }
        if self.shared.is_stopped() {
            return;
        }

        tracing::info!(
            scheduler = %self.shared.name,
            policy = ?self.policy,
            "Scheduler started"
        );

        // Subscribe before the first tick so a schedule_next() issued
        // during it is seen by the loop
        let mut wake_rx = self.shared.wake.subscribe();
        wake_rx.borrow_and_update();

        let first_start = Instant::now();
        (self.task)(self.handle()).await;

        if self.shared.is_stopped() {
            return;
        }

        let worker = tokio::spawn(run_loop(
            Arc::clone(&self.shared),
            self.policy.clone(),
            Arc::clone(&self.task),
            Arc::clone(&self.clock),
            wake_rx,
            first_start,
        ));
        *self.worker.lock() = Some(worker);
    }

    /// Cancel all pending ticks. No tick starts after this returns.
    pub fn stop(&self) {
        if self.shared.stop() {
            tracing::info!(scheduler = %self.shared.name, "Scheduler stopping");
        }
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }

    /// See [`ScheduleHandle::schedule_next`]
    pub fn schedule_next(&self, after: Duration) {
        self.shared.schedule_next(after);
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.shared.is_stopped()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    policy: SchedulePolicy,
    task: Task,
    clock: Arc<dyn Clock>,
    mut wake_rx: watch::Receiver<()>,
    mut last_start: Instant,
) {
    loop {
        if shared.is_stopped() {
            break;
        }
        wake_rx.borrow_and_update();

        let deadline = match shared.take_rearm() {
            Some(after) => Some(deadline_after(Instant::now(), after)),
            None => policy_deadline(&shared.name, &policy, last_start, clock.as_ref()),
        };

        match deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = time::sleep_until(deadline) => {}
                    changed = wake_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        // stop() or schedule_next(): re-evaluate
                        continue;
                    }
                }
            }
            None => {
                // Manual policy: wait for schedule_next() or stop()
                if wake_rx.changed().await.is_err() {
                    break;
                }
                continue;
            }
        }

        if shared.is_stopped() {
            break;
        }

        last_start = Instant::now();
        task(ScheduleHandle {
            shared: Arc::clone(&shared),
        })
        .await;
    }

    tracing::info!(scheduler = %shared.name, "Scheduler stopped");
}

fn policy_deadline(
    name: &str,
    policy: &SchedulePolicy,
    last_start: Instant,
    clock: &dyn Clock,
) -> Option<Instant> {
    let now = Instant::now();
    match policy {
        SchedulePolicy::Interval(every) => {
            let (deadline, skipped) = next_interval_deadline(last_start, now, *every);
            if skipped > 0 {
                tracing::debug!(
                    scheduler = %name,
                    skipped,
                    "Tick overran its interval, skipping missed ticks"
                );
            }
            Some(deadline)
        }
        SchedulePolicy::Daily(times) => {
            let delay = next_daily_delay(clock.now(), times)
                .to_std()
                .unwrap_or(Duration::ZERO);
            Some(deadline_after(now, delay))
        }
        SchedulePolicy::Manual => None,
    }
}
