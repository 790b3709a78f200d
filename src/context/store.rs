//! Thread-local context store.
//!
//! # Responsibilities
//! - Hold the [`Context`] of the logical request running on this thread
//! - Create an empty context lazily on first access
//! - Drop the association explicitly at the end of a request
//!
//! The closures passed to [`with`] and [`update`] run while the slot is
//! borrowed; they must not call back into this module.

use std::cell::RefCell;

use super::{Context, Snapshot};

thread_local! {
    static CURRENT: RefCell<Option<Context>> = const { RefCell::new(None) };
}

/// Return a copy of this thread's context, creating an empty one if needed.
pub fn current() -> Context {
    with(Context::clone)
}

/// Replace this thread's context wholesale.
pub fn set(context: Context) {
    CURRENT.with(|slot| *slot.borrow_mut() = Some(context));
}

/// Clear this thread's association entirely.
///
/// Unlike `set(Context::new())` this frees the slot; [`is_present`] reports
/// `false` afterwards.
pub fn remove() {
    drop(take());
}

/// Remove this thread's context and hand it to the caller.
pub fn take() -> Option<Context> {
    CURRENT.with(|slot| slot.borrow_mut().take())
}

/// Whether this thread currently holds a context.
pub fn is_present() -> bool {
    CURRENT.with(|slot| slot.borrow().is_some())
}

/// Borrow this thread's context without copying it.
pub fn with<R>(f: impl FnOnce(&Context) -> R) -> R {
    CURRENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        f(slot.get_or_insert_with(Context::default))
    })
}

/// Mutate this thread's context in place.
pub fn update<R>(f: impl FnOnce(&mut Context) -> R) -> R {
    CURRENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        f(slot.get_or_insert_with(Context::default))
    })
}

/// Read a single value from this thread's context.
pub fn get(key: &str) -> Option<String> {
    with(|ctx| ctx.get(key).map(str::to_owned))
}

/// Write a single value into this thread's context.
pub fn put(key: impl Into<String>, value: impl Into<String>) -> Option<String> {
    update(|ctx| ctx.insert(key, value))
}

/// Capture this thread's context as an immutable snapshot.
pub fn snapshot() -> Snapshot {
    Snapshot::new(current())
}
