//! Handles for submitted and scheduled tasks.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::executor::TaskError;

/// Create the producer/consumer pair for one unit of work.
pub(crate) fn task_channel<T>() -> (Completion<T>, TaskHandle<T>) {
    let (tx, rx) = oneshot::channel();
    let cancelled = Arc::new(AtomicBool::new(false));
    (
        Completion {
            tx,
            cancelled: cancelled.clone(),
        },
        TaskHandle {
            result: rx,
            cancelled,
            timer: None,
        },
    )
}

/// Worker side of a [`TaskHandle`].
pub(crate) struct Completion<T> {
    tx: oneshot::Sender<Result<T, TaskError>>,
    cancelled: Arc<AtomicBool>,
}

impl<T> Completion<T> {
    /// Run `f` unless the handle was cancelled, reporting the outcome.
    pub(crate) fn complete(self, f: impl FnOnce() -> T) {
        if self.cancelled.load(Ordering::Acquire) {
            let _ = self.tx.send(Err(TaskError::Cancelled));
            return;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(f))
            .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));
        // The receiver may already be gone; the task still ran.
        let _ = self.tx.send(outcome);
    }
}

/// Result handle of a submitted or delayed task.
///
/// Awaiting the handle yields the task's value, or a [`TaskError`] if it
/// panicked or was cancelled. Dropping the handle does not cancel the task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    result: oneshot::Receiver<Result<T, TaskError>>,
    cancelled: Arc<AtomicBool>,
    timer: Option<AbortHandle>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn with_timer(mut self, timer: AbortHandle) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Prevent the task from starting if it has not started yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Block the calling thread until the task finishes.
    ///
    /// Must not be called from within an async runtime; await the handle
    /// there instead.
    pub fn join(self) -> Result<T, TaskError> {
        self.result.blocking_recv().unwrap_or(Err(TaskError::Cancelled))
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.result)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TaskError::Cancelled)))
    }
}

/// Control handle of a periodic task.
#[derive(Debug)]
pub struct ScheduledHandle {
    cancelled: Arc<AtomicBool>,
    firings: Arc<AtomicU64>,
    driver: AbortHandle,
}

impl ScheduledHandle {
    pub(crate) fn new(cancelled: Arc<AtomicBool>, firings: Arc<AtomicU64>, driver: AbortHandle) -> Self {
        Self {
            cancelled,
            firings,
            driver,
        }
    }

    /// Stop future firings. A firing already in progress completes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.driver.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether the schedule has ended (cancelled, shut down or a firing panicked).
    pub fn is_finished(&self) -> bool {
        self.driver.is_finished()
    }

    /// Number of completed firings.
    pub fn firings(&self) -> u64 {
        self.firings.load(Ordering::Relaxed)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
