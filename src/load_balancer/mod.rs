//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! RibbonConfig
//!     → stats.rs (servers grouped by zone, circuit breaker settings)
//!     → zone_affinity.rs / rule.rs (predicate chain + strategy)
//!     → Selection request (optional key):
//!         - predicate chain narrows the candidates
//!         - round_robin.rs / random.rs picks one survivor
//!     → Return server or None
//! ```
//!
//! # Design Decisions
//! - Stats and rule live in one `BalancerState`, swapped atomically on reload
//! - Servers surviving a reload keep their counters
//! - Picking strategies never re-check health; the chain already did

pub mod circuit;
pub mod random;
pub mod round_robin;
pub mod rule;
pub mod server;
pub mod stats;
pub mod zone_affinity;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::RibbonConfig;

pub use rule::{build_rule, PredicateRule};
pub use server::Server;
pub use stats::{LoadBalancerStats, ZoneSnapshot};
pub use zone_affinity::{rule_for, zone_affinity_rule};

/// Picks one server out of an already filtered list.
pub trait LoadBalancer: Send + Sync + Debug {
    fn next_server(&self, servers: &[Arc<Server>]) -> Option<Arc<Server>>;
}

/// Server statistics and the rule built for them, always read together.
#[derive(Debug)]
pub struct BalancerState {
    pub stats: Arc<LoadBalancerStats>,
    pub rule: Arc<PredicateRule>,
}

/// A client's live server list and rule, reloadable as a unit.
#[derive(Debug)]
pub struct Balancer {
    state: ArcSwap<BalancerState>,
}

impl Balancer {
    pub fn from_config(config: &RibbonConfig) -> Self {
        Self {
            state: ArcSwap::from_pointee(BalancerState {
                stats: Arc::new(build_stats(config, None)),
                rule: Arc::new(rule_for(config)),
            }),
        }
    }

    /// The current stats and rule, from the same reload.
    pub fn state(&self) -> Arc<BalancerState> {
        self.state.load_full()
    }

    pub fn stats(&self) -> Arc<LoadBalancerStats> {
        self.state.load().stats.clone()
    }

    pub fn rule(&self) -> Arc<PredicateRule> {
        self.state.load().rule.clone()
    }

    pub fn choose(&self, key: Option<&str>) -> Option<Arc<Server>> {
        let state = self.state.load();
        state.rule.choose(&state.stats, key)
    }

    /// Replace stats and rule in one swap. Servers with an unchanged id,
    /// address and zone are carried over.
    pub fn apply_config(&self, config: &RibbonConfig) {
        let previous = self.state.load_full();
        let stats = build_stats(config, Some(&previous.stats));
        let rule = rule_for(config);
        tracing::info!(
            client = %config.client.name,
            servers = stats.servers().len(),
            rule = %rule.description(),
            "Balancer reconfigured"
        );
        self.state.store(Arc::new(BalancerState {
            stats: Arc::new(stats),
            rule: Arc::new(rule),
        }));
    }

    /// Apply every configuration received on `updates` until the sender
    /// side is dropped.
    pub fn watch(self: Arc<Self>, mut updates: mpsc::UnboundedReceiver<RibbonConfig>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(config) = updates.recv().await {
                self.apply_config(&config);
            }
            tracing::debug!("Config update channel closed");
        })
    }
}

fn build_stats(config: &RibbonConfig, previous: Option<&LoadBalancerStats>) -> LoadBalancerStats {
    let fresh = LoadBalancerStats::from_config(
        config.client.name.clone(),
        &config.servers,
        config.circuit_breaker.clone(),
    );
    let Some(previous) = previous else {
        return fresh;
    };

    let known: HashMap<&str, &Arc<Server>> = previous.servers().iter().map(|s| (s.id.as_str(), s)).collect();
    let servers = fresh
        .servers()
        .iter()
        .map(|server| match known.get(server.id.as_str()) {
            Some(old) if old.addr == server.addr && old.zone() == server.zone() => Arc::clone(old),
            _ => server.clone(),
        })
        .collect();
    LoadBalancerStats::new(config.client.name.clone(), servers, config.circuit_breaker.clone())
}
