//! Task execution subsystem.
//!
//! # Data Flow
//! ```text
//! Caller (request context installed)
//!     → propagator.rs (capture snapshot, wrap unit of work)
//!     → delegate executor, e.g. pool.rs:
//!         - execute / execute_with_timeout (fire and forget)
//!         - submit / submit_callable (TaskHandle)
//!         - schedule / schedule_at_fixed_rate / schedule_with_fixed_delay
//!     → worker thread runs the wrapped unit under the captured context
//!     → handle.rs delivers the result, panic or cancellation
//! ```
//!
//! # Design Decisions
//! - One decorator type implements every contract its delegate implements
//! - The propagation layer adds no retries, timeouts or cancellation of its own
//! - Delegate failures (rejection, shutdown) pass through untouched

pub mod handle;
pub mod pool;
pub mod propagator;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub use handle::{ScheduledHandle, TaskHandle};
pub use pool::WorkerPool;
pub use propagator::Propagator;

/// A fire-and-forget unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work run repeatedly by a scheduler.
pub type RecurringTask = Box<dyn FnMut() + Send + 'static>;

/// Errors raised when handing work to an executor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The executor refused the task.
    #[error("Task rejected: {0}")]
    Rejected(String),

    /// The executor no longer accepts work.
    #[error("Executor has been shut down")]
    Shutdown,

    /// Periodic scheduling needs a non-zero period.
    #[error("Invalid period: {0:?}")]
    InvalidPeriod(Duration),

    /// No async runtime is available to drive the executor.
    #[error("No runtime available: {0}")]
    NoRuntime(String),
}

/// Errors delivered through a [`TaskHandle`] instead of the task's own result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The unit of work panicked.
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The task was cancelled before it produced a result.
    #[error("Task cancelled")]
    Cancelled,
}

/// Immediate dispatch.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Task) -> Result<(), ExecutorError>;
}

/// Dispatch with result handles.
pub trait AsyncExecutor: Executor {
    /// Dispatch `task`, dropping it if no worker picks it up within
    /// `start_timeout`.
    fn execute_with_timeout(&self, task: Task, start_timeout: Duration) -> Result<(), ExecutorError>;

    fn submit(&self, task: Task) -> Result<TaskHandle<()>, ExecutorError>;

    /// Dispatch a value-returning unit of work.
    ///
    /// A fallible callable returns its `Result` as `T`; the error arrives
    /// through the handle untouched.
    fn submit_callable<T, F>(&self, callable: F) -> Result<TaskHandle<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static;
}

/// Delayed and periodic dispatch.
pub trait ScheduledExecutor: AsyncExecutor {
    fn schedule(&self, task: Task, delay: Duration) -> Result<TaskHandle<()>, ExecutorError>;

    fn schedule_callable<T, F>(&self, callable: F, delay: Duration) -> Result<TaskHandle<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static;

    /// Fire every `period`, measured from the scheduled start of each run.
    fn schedule_at_fixed_rate(
        &self,
        task: RecurringTask,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<ScheduledHandle, ExecutorError>;

    /// Fire `delay` after the previous run completed.
    fn schedule_with_fixed_delay(
        &self,
        task: RecurringTask,
        initial_delay: Duration,
        delay: Duration,
    ) -> Result<ScheduledHandle, ExecutorError>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        (**self).execute(task)
    }
}

impl<E: AsyncExecutor> AsyncExecutor for Arc<E> {
    fn execute_with_timeout(&self, task: Task, start_timeout: Duration) -> Result<(), ExecutorError> {
        (**self).execute_with_timeout(task, start_timeout)
    }

    fn submit(&self, task: Task) -> Result<TaskHandle<()>, ExecutorError> {
        (**self).submit(task)
    }

    fn submit_callable<T, F>(&self, callable: F) -> Result<TaskHandle<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        (**self).submit_callable(callable)
    }
}

impl<E: ScheduledExecutor> ScheduledExecutor for Arc<E> {
    fn schedule(&self, task: Task, delay: Duration) -> Result<TaskHandle<()>, ExecutorError> {
        (**self).schedule(task, delay)
    }

    fn schedule_callable<T, F>(&self, callable: F, delay: Duration) -> Result<TaskHandle<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        (**self).schedule_callable(callable, delay)
    }

    fn schedule_at_fixed_rate(
        &self,
        task: RecurringTask,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<ScheduledHandle, ExecutorError> {
        (**self).schedule_at_fixed_rate(task, initial_delay, period)
    }

    fn schedule_with_fixed_delay(
        &self,
        task: RecurringTask,
        initial_delay: Duration,
        delay: Duration,
    ) -> Result<ScheduledHandle, ExecutorError> {
        (**self).schedule_with_fixed_delay(task, initial_delay, delay)
    }
}
