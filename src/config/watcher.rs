//! Configuration file watcher for hot reload.
//!
//! Every modify or create event re-reads the file. A file that fails to
//! load or validate is reported and the previous configuration stays in
//! effect. Once the receiving side is gone, events are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::RibbonConfig;
use crate::observability::metrics;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// What a single reload attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A valid configuration was handed to the receiver.
    Delivered,
    /// The file did not load; nothing was sent.
    Rejected,
    /// Nobody is listening any more.
    Closed,
}

/// Watches one configuration file and streams every valid version of it.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<RibbonConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiver that gets each reloaded config.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RibbonConfig>) {
        let (updates, receiver) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, receiver)
    }

    /// Start watching on notify's background thread.
    ///
    /// Watching stops when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, updates } = self;
        let watched = path.clone();

        let mut handle = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    reload(&watched, &updates);
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;
        handle.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(handle)
    }
}

/// Re-read `path` and forward the result to `updates`.
pub fn reload(path: &Path, updates: &mpsc::UnboundedSender<RibbonConfig>) -> ReloadOutcome {
    if updates.is_closed() {
        tracing::debug!(path = %path.display(), "Config receiver dropped, ignoring change");
        return ReloadOutcome::Closed;
    }

    tracing::info!(path = %path.display(), "Config file change detected, reloading");
    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            metrics::record_config_reload(false);
            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            return ReloadOutcome::Rejected;
        }
    };

    metrics::record_config_reload(true);
    match updates.send(config) {
        Ok(()) => ReloadOutcome::Delivered,
        Err(_) => {
            tracing::debug!(path = %path.display(), "Config receiver dropped during reload");
            ReloadOutcome::Closed
        }
    }
}
