//! Request context propagation subsystem.
//!
//! # Data Flow
//! ```text
//! Submitting thread:
//!     store.rs (current thread's Context)
//!     → wrapper.rs captures an immutable Snapshot at wrap time
//!     → wrapped unit of work handed to an executor
//!
//! Worker thread (any time later):
//!     → ContextGuard installs the Snapshot
//!     → wrapped unit of work runs
//!     → guard drop restores the worker's previous Context (or clears it)
//!
//! Async tasks (future.rs):
//!     → every poll swaps the future's own Context in, then back out
//! ```
//!
//! # Design Decisions
//! - One slot per OS thread, no locks and no cross-thread visibility
//! - Snapshots are `Arc`-shared and never mutated after capture
//! - Restoration is a `Drop` impl so it also runs while a panic unwinds
//! - Pooled worker threads never keep a context after the task returns

pub mod future;
pub mod store;
pub mod wrapper;

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

pub use future::{ContextFuture, Propagate};
pub use store::{current, get, is_present, put, remove, set, snapshot, take, update, with};
pub use wrapper::{wrap, wrap_with, ContextGuard, Propagated};

/// Key/value state of one logical request.
///
/// Iteration follows insertion order. Re-inserting an existing key replaces
/// the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    entries: Vec<(String, String)>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert a value, returning the one it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K, V> FromIterator<(K, V)> for Context
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Context::new();
        for (key, value) in iter {
            context.insert(key, value);
        }
        context
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        write!(f, "}}")
    }
}

/// Immutable copy of a [`Context`] taken when a unit of work is wrapped.
///
/// Cloning a snapshot shares the underlying context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot(Arc<Context>);

impl Snapshot {
    pub fn new(context: Context) -> Self {
        Self(Arc::new(context))
    }

    /// An owned copy that may be installed into (and then mutated by) a thread.
    pub fn to_context(&self) -> Context {
        Context::clone(&self.0)
    }
}

impl Deref for Snapshot {
    type Target = Context;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Context> for Snapshot {
    fn from(context: Context) -> Self {
        Self::new(context)
    }
}
