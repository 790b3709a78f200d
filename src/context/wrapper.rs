//! Propagation wrapper for units of work.
//!
//! A [`Propagated`] task carries the snapshot captured on the submitting
//! thread and installs it on whichever thread eventually runs it.

use std::marker::PhantomData;

use super::{store, Context, Snapshot};

/// Capture the calling thread's context and bind it to `task`.
pub fn wrap<F>(task: F) -> Propagated<F> {
    wrap_with(store::snapshot(), task)
}

/// Bind an already captured snapshot to `task`.
pub fn wrap_with<F>(snapshot: Snapshot, task: F) -> Propagated<F> {
    Propagated { snapshot, task }
}

/// A unit of work paired with the context it must observe while running.
#[derive(Debug, Clone)]
pub struct Propagated<F> {
    snapshot: Snapshot,
    task: F,
}

impl<F> Propagated<F> {
    /// The context captured at wrap time.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Run the task once under the captured context.
    ///
    /// The result (including an `Err`) is returned unchanged after the
    /// executing thread's previous context has been put back.
    pub fn run<T>(self) -> T
    where
        F: FnOnce() -> T,
    {
        let _guard = ContextGuard::install(&self.snapshot);
        (self.task)()
    }

    /// Run a repeatable task under the captured context.
    ///
    /// Every call installs the same snapshot, so recurring work keeps seeing
    /// the context of the request that set it up.
    pub fn run_mut<T>(&mut self) -> T
    where
        F: FnMut() -> T,
    {
        let _guard = ContextGuard::install(&self.snapshot);
        (self.task)()
    }

    pub fn into_inner(self) -> F {
        self.task
    }
}

/// Installs a snapshot on the current thread and restores the previous state
/// when dropped.
///
/// The guard is tied to the thread it was created on.
#[derive(Debug)]
pub struct ContextGuard {
    previous: Option<Context>,
    _thread_bound: PhantomData<*const ()>,
}

impl ContextGuard {
    pub fn install(snapshot: &Snapshot) -> Self {
        let previous = store::take();
        store::set(snapshot.to_context());
        Self {
            previous,
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(context) => store::set(context),
            None => store::remove(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;
    use std::thread;

    fn context_of(pairs: &[(&str, &str)]) -> Context {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_task_observes_snapshot_on_other_thread() {
        store::set(context_of(&[("key", "value")]));
        let wrapped = wrap(|| store::get("key"));
        store::remove();

        let seen = thread::spawn(move || {
            let seen = wrapped.run();
            (seen, store::is_present())
        })
        .join()
        .unwrap();

        assert_eq!(seen, (Some("value".to_string()), false));
    }

    #[test]
    fn test_restores_previous_context() {
        store::set(context_of(&[("request", "a")]));
        let wrapped = wrap(|| store::put("request", "mutated-by-task"));

        store::set(context_of(&[("request", "b")]));
        wrapped.run();

        assert_eq!(store::get("request").as_deref(), Some("b"));
        store::remove();
    }

    #[test]
    fn test_error_is_returned_unchanged() {
        store::remove();
        let wrapped = wrap(|| -> Result<u32, String> { Err("boom".into()) });

        store::set(context_of(&[("prior", "1")]));
        assert_eq!(wrapped.run(), Err("boom".to_string()));
        assert_eq!(store::current(), context_of(&[("prior", "1")]));
        store::remove();
    }

    #[test]
    fn test_transparent_result() {
        let direct = (|| 6 * 7)();
        let wrapped = wrap(|| 6 * 7).run();
        assert_eq!(direct, wrapped);
    }

    #[test]
    fn test_panic_still_restores() {
        store::set(context_of(&[("key", "captured")]));
        let wrapped = wrap(|| -> () { panic!("task failed") });
        store::remove();

        let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| wrapped.run()));

        assert!(outcome.is_err());
        assert!(!store::is_present());
    }

    #[test]
    fn test_run_mut_reuses_snapshot() {
        store::set(context_of(&[("tick", "origin")]));
        let mut seen = Vec::new();
        let mut wrapped = wrap(|| {
            let value = store::get("tick");
            store::put("tick", "overwritten");
            value
        });
        store::remove();

        seen.push(wrapped.run_mut());
        seen.push(wrapped.run_mut());

        assert_eq!(seen, vec![Some("origin".to_string()), Some("origin".to_string())]);
        assert!(!store::is_present());
    }
}
