//! Context-propagating executor decorator.
//!
//! [`Propagator`] wraps any executor and implements every submission
//! contract the delegate implements. Each unit of work is bound to the
//! submitting thread's context before it is handed over.

use std::time::Duration;

use crate::context::wrap;
use crate::executor::{
    AsyncExecutor, Executor, ExecutorError, RecurringTask, ScheduledExecutor, ScheduledHandle, Task,
    TaskHandle,
};

/// Decorator applying context propagation to a delegate executor.
#[derive(Debug, Clone, Default)]
pub struct Propagator<E> {
    delegate: E,
}

impl<E> Propagator<E> {
    pub fn new(delegate: E) -> Self {
        Self { delegate }
    }

    pub fn delegate(&self) -> &E {
        &self.delegate
    }

    pub fn into_inner(self) -> E {
        self.delegate
    }
}

fn propagate(task: Task) -> Task {
    let wrapped = wrap(task);
    Box::new(move || wrapped.run())
}

/// Periodic work captures once; every firing sees the schedule-time context.
fn propagate_recurring(task: RecurringTask) -> RecurringTask {
    let mut wrapped = wrap(task);
    Box::new(move || wrapped.run_mut())
}

impl<E: Executor> Executor for Propagator<E> {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        self.delegate.execute(propagate(task))
    }
}

impl<E: AsyncExecutor> AsyncExecutor for Propagator<E> {
    fn execute_with_timeout(&self, task: Task, start_timeout: Duration) -> Result<(), ExecutorError> {
        self.delegate.execute_with_timeout(propagate(task), start_timeout)
    }

    fn submit(&self, task: Task) -> Result<TaskHandle<()>, ExecutorError> {
        self.delegate.submit(propagate(task))
    }

    fn submit_callable<T, F>(&self, callable: F) -> Result<TaskHandle<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let wrapped = wrap(callable);
        self.delegate.submit_callable(move || wrapped.run())
    }
}

impl<E: ScheduledExecutor> ScheduledExecutor for Propagator<E> {
    fn schedule(&self, task: Task, delay: Duration) -> Result<TaskHandle<()>, ExecutorError> {
        self.delegate.schedule(propagate(task), delay)
    }

    fn schedule_callable<T, F>(&self, callable: F, delay: Duration) -> Result<TaskHandle<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let wrapped = wrap(callable);
        self.delegate.schedule_callable(move || wrapped.run(), delay)
    }

    fn schedule_at_fixed_rate(
        &self,
        task: RecurringTask,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<ScheduledHandle, ExecutorError> {
        self.delegate
            .schedule_at_fixed_rate(propagate_recurring(task), initial_delay, period)
    }

    fn schedule_with_fixed_delay(
        &self,
        task: RecurringTask,
        initial_delay: Duration,
        delay: Duration,
    ) -> Result<ScheduledHandle, ExecutorError> {
        self.delegate
            .schedule_with_fixed_delay(propagate_recurring(task), initial_delay, delay)
    }
}
