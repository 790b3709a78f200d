//! Worker pool backed by a Tokio runtime.
//!
//! # Responsibilities
//! - Run units of work on the runtime's pooled blocking threads
//! - Drive delayed and periodic tasks with `tokio::time`
//! - Reject new work after shutdown
//!
//! # Design Decisions
//! - Delayed one-shot tasks already scheduled still fire after shutdown;
//!   periodic tasks stop at their next firing
//! - A panicking periodic task suppresses its subsequent firings
//! - Fixed rate catches up on missed ticks (burst), fixed delay never overlaps

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::time::{self, MissedTickBehavior};

use crate::executor::handle::{panic_message, task_channel};
use crate::executor::{
    AsyncExecutor, Executor, ExecutorError, RecurringTask, ScheduledExecutor, ScheduledHandle, Task,
    TaskHandle,
};
use crate::observability::metrics;

#[derive(Debug, Clone, Copy)]
enum Cadence {
    FixedRate(Duration),
    FixedDelay(Duration),
}

/// Executor running tasks on a Tokio runtime's blocking thread pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: Arc<str>,
    runtime: Handle,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Create a pool that dispatches onto `runtime`.
    pub fn new(name: impl Into<String>, runtime: Handle) -> Self {
        Self {
            name: Arc::from(name.into()),
            runtime,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a pool on the runtime the caller is running in.
    pub fn from_current(name: impl Into<String>) -> Result<Self, ExecutorError> {
        let runtime = Handle::try_current().map_err(|e| ExecutorError::NoRuntime(e.to_string()))?;
        Ok(Self::new(name, runtime))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop accepting work. Clones of this pool share the shutdown state.
    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            tracing::info!(pool = %self.name, "Worker pool shutting down");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn admit(&self, kind: &'static str) -> Result<(), ExecutorError> {
        if self.is_shutdown() {
            tracing::warn!(pool = %self.name, kind, "Task rejected: pool is shut down");
            metrics::record_task_rejected(kind);
            return Err(ExecutorError::Shutdown);
        }
        metrics::record_task_submitted(kind);
        Ok(())
    }

    fn spawn_unit<T, F>(&self, f: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (completion, handle) = task_channel();
        self.runtime.spawn_blocking(move || completion.complete(f));
        handle
    }

    fn spawn_periodic(
        &self,
        kind: &'static str,
        task: RecurringTask,
        initial_delay: Duration,
        cadence: Cadence,
    ) -> Result<ScheduledHandle, ExecutorError> {
        let period = match cadence {
            Cadence::FixedRate(period) | Cadence::FixedDelay(period) => period,
        };
        if period.is_zero() {
            return Err(ExecutorError::InvalidPeriod(period));
        }
        self.admit(kind)?;

        let cancelled = Arc::new(AtomicBool::new(false));
        let firings = Arc::new(AtomicU64::new(0));
        let driver = self.runtime.spawn(drive(
            task,
            initial_delay,
            cadence,
            Schedule {
                pool: self.name.clone(),
                cancelled: cancelled.clone(),
                shutdown: self.shutdown.clone(),
                firings: firings.clone(),
            },
        ));

        tracing::debug!(pool = %self.name, kind, ?initial_delay, ?period, "Periodic task scheduled");
        Ok(ScheduledHandle::new(cancelled, firings, driver.abort_handle()))
    }
}

impl Executor for WorkerPool {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        self.admit("execute")?;
        let pool = self.name.clone();
        self.runtime.spawn_blocking(move || run_detached(&pool, task));
        Ok(())
    }
}

impl AsyncExecutor for WorkerPool {
    fn execute_with_timeout(&self, task: Task, start_timeout: Duration) -> Result<(), ExecutorError> {
        self.admit("execute_with_timeout")?;
        let pool = self.name.clone();
        let submitted = Instant::now();
        self.runtime.spawn_blocking(move || {
            let waited = submitted.elapsed();
            if waited > start_timeout {
                tracing::warn!(
                    pool = %pool,
                    waited_ms = waited.as_millis() as u64,
                    timeout_ms = start_timeout.as_millis() as u64,
                    "Task dropped: not started within start timeout"
                );
                return;
            }
            run_detached(&pool, task);
        });
        Ok(())
    }

    fn submit(&self, task: Task) -> Result<TaskHandle<()>, ExecutorError> {
        self.admit("submit")?;
        Ok(self.spawn_unit(task))
    }

    fn submit_callable<T, F>(&self, callable: F) -> Result<TaskHandle<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.admit("submit")?;
        Ok(self.spawn_unit(callable))
    }
}

impl ScheduledExecutor for WorkerPool {
    fn schedule(&self, task: Task, delay: Duration) -> Result<TaskHandle<()>, ExecutorError> {
        self.schedule_callable(task, delay)
    }

    fn schedule_callable<T, F>(&self, callable: F, delay: Duration) -> Result<TaskHandle<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.admit("schedule")?;
        let (completion, handle) = task_channel();
        let timer = self.runtime.spawn(async move {
            time::sleep(delay).await;
            tokio::task::spawn_blocking(move || completion.complete(callable));
        });
        Ok(handle.with_timer(timer.abort_handle()))
    }

    fn schedule_at_fixed_rate(
        &self,
        task: RecurringTask,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<ScheduledHandle, ExecutorError> {
        self.spawn_periodic("fixed_rate", task, initial_delay, Cadence::FixedRate(period))
    }

    fn schedule_with_fixed_delay(
        &self,
        task: RecurringTask,
        initial_delay: Duration,
        delay: Duration,
    ) -> Result<ScheduledHandle, ExecutorError> {
        self.spawn_periodic("fixed_delay", task, initial_delay, Cadence::FixedDelay(delay))
    }
}

/// Shared state of one periodic schedule.
struct Schedule {
    pool: Arc<str>,
    cancelled: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    firings: Arc<AtomicU64>,
}

impl Schedule {
    fn should_stop(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.shutdown.load(Ordering::Acquire)
    }
}

async fn drive(mut task: RecurringTask, initial_delay: Duration, cadence: Cadence, schedule: Schedule) {
    let start = time::Instant::now() + initial_delay;
    let mut ticker = match cadence {
        Cadence::FixedRate(period) => {
            let mut ticker = time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            Some(ticker)
        }
        Cadence::FixedDelay(_) => {
            time::sleep_until(start).await;
            None
        }
    };

    loop {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }
        if schedule.should_stop() {
            break;
        }

        task = match fire(task).await {
            Ok(task) => task,
            Err(message) => {
                tracing::error!(pool = %schedule.pool, panic = %message, "Periodic task panicked, suppressing further runs");
                break;
            }
        };
        schedule.firings.fetch_add(1, Ordering::Relaxed);

        if let Cadence::FixedDelay(delay) = cadence {
            time::sleep(delay).await;
        }
    }
}

/// Run one firing on a blocking thread and hand the task back.
async fn fire(task: RecurringTask) -> Result<RecurringTask, String> {
    let outcome = tokio::task::spawn_blocking(move || {
        let mut task = task;
        panic::catch_unwind(AssertUnwindSafe(|| task()))
            .map(|()| task)
            .map_err(|payload| panic_message(payload.as_ref()))
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(join_error) => Err(join_error.to_string()),
    }
}

fn run_detached(pool: &str, task: Task) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        tracing::error!(pool = %pool, panic = %panic_message(payload.as_ref()), "Task panicked");
    }
}
