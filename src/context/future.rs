//! Context propagation for async tasks.
//!
//! A future spawned on a multi-threaded runtime may be polled by a
//! different worker thread on every wake-up. [`ContextFuture`] carries its
//! own context from poll to poll: it starts as the captured snapshot, is
//! installed for the duration of each poll, and is taken back afterwards
//! together with whatever the future wrote into it. The polling thread gets
//! its previous context back after every poll.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use super::{store, Context, Snapshot};

/// A future that runs every poll under its own request context.
#[derive(Debug)]
pub struct ContextFuture<F> {
    inner: Pin<Box<F>>,
    snapshot: Snapshot,
    context: Option<Context>,
}

impl<F> ContextFuture<F> {
    pub fn new(inner: F, snapshot: Snapshot) -> Self {
        let context = Some(snapshot.to_context());
        Self {
            inner: Box::pin(inner),
            snapshot,
            context,
        }
    }

    /// The context captured when the future was bound.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl<F: Future> Future for ContextFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _scope = PollScope::enter(&mut this.context);
        this.inner.as_mut().poll(cx)
    }
}

/// Swaps the future's context in for one poll and back out on drop,
/// unwinding included.
struct PollScope<'a> {
    slot: &'a mut Option<Context>,
    previous: Option<Context>,
}

impl<'a> PollScope<'a> {
    fn enter(slot: &'a mut Option<Context>) -> Self {
        let previous = store::take();
        match slot.take() {
            Some(context) => store::set(context),
            None => store::remove(),
        }
        Self { slot, previous }
    }
}

impl Drop for PollScope<'_> {
    fn drop(&mut self) {
        *self.slot = store::take();
        match self.previous.take() {
            Some(context) => store::set(context),
            None => store::remove(),
        }
    }
}

/// Extension trait binding a future to a request context.
pub trait Propagate: Future + Sized {
    /// Capture the calling thread's context for this future.
    fn propagate(self) -> ContextFuture<Self> {
        ContextFuture::new(self, store::snapshot())
    }

    /// Bind this future to an explicit snapshot.
    fn propagate_with(self, snapshot: Snapshot) -> ContextFuture<Self> {
        ContextFuture::new(self, snapshot)
    }
}

impl<F: Future> Propagate for F {}
