//! Server selection predicates.
//!
//! # Data Flow
//! ```text
//! Candidate servers + SelectionState (stats, key)
//!     → composite.rs walks the tiers in registration order:
//!         - primary tier (e.g. zone_affinity.rs)
//!         - fallback tiers (e.g. zone_avoidance.rs && availability.rs)
//!         - terminal AlwaysTrue
//!     → first sufficient tier result is returned
//!     → description.rs renders the chain for diagnostics
//! ```
//!
//! # Design Decisions
//! - Predicates are a closed enum plus a `Custom` escape hatch
//! - Chains are immutable once built and shared across threads
//! - Every tier filters the full candidate list, never a previous result
//! - Candidate order is preserved by every filter

pub mod availability;
pub mod composite;
pub mod description;
pub mod zone_affinity;
pub mod zone_avoidance;

use std::fmt;
use std::sync::Arc;

use crate::load_balancer::server::Server;
use crate::load_balancer::stats::LoadBalancerStats;

pub use availability::AvailabilityPredicate;
pub use composite::{ChainSelection, CompositePredicate, CompositePredicateBuilder};
pub use description::RuleDescription;
pub use zone_affinity::ZoneAffinityPredicate;
pub use zone_avoidance::ZoneAvoidancePredicate;

/// What a predicate may consult besides the server itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionState<'a> {
    /// Statistics of the balancer the candidates come from.
    pub stats: Option<&'a LoadBalancerStats>,
    /// Caller supplied load balancer key.
    pub key: Option<&'a str>,
}

impl<'a> SelectionState<'a> {
    pub fn new(stats: &'a LoadBalancerStats) -> Self {
        Self {
            stats: Some(stats),
            key: None,
        }
    }

    pub fn with_key(mut self, key: Option<&'a str>) -> Self {
        self.key = key;
        self
    }
}

type CustomTest = dyn Fn(&Server, &SelectionState<'_>) -> bool + Send + Sync;

/// A named, caller supplied acceptability test.
#[derive(Clone)]
pub struct CustomPredicate {
    name: String,
    test: Arc<CustomTest>,
}

impl CustomPredicate {
    pub fn new<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Server, &SelectionState<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            test: Arc::new(test),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPredicate").field("name", &self.name).finish()
    }
}

/// A server acceptability test.
#[derive(Debug, Clone)]
pub enum ServerPredicate {
    Availability(AvailabilityPredicate),
    ZoneAvoidance(ZoneAvoidancePredicate),
    ZoneAffinity(ZoneAffinityPredicate),
    /// Accepts every server.
    AlwaysTrue,
    /// Accepts a server only if every member does.
    All(Vec<ServerPredicate>),
    Custom(CustomPredicate),
}

impl ServerPredicate {
    /// AND-combine predicates. A single predicate is returned as is.
    pub fn all(predicates: impl IntoIterator<Item = ServerPredicate>) -> Self {
        let mut predicates: Vec<_> = predicates.into_iter().collect();
        match predicates.len() {
            0 => ServerPredicate::AlwaysTrue,
            1 => predicates.remove(0),
            _ => ServerPredicate::All(predicates),
        }
    }

    pub fn custom<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Server, &SelectionState<'_>) -> bool + Send + Sync + 'static,
    {
        ServerPredicate::Custom(CustomPredicate::new(name, test))
    }

    /// Decide whether a single server is acceptable.
    pub fn apply(&self, server: &Server, state: &SelectionState<'_>) -> bool {
        match self {
            ServerPredicate::Availability(p) => p.apply(server, state),
            ServerPredicate::ZoneAvoidance(p) => p.apply(server, state),
            ServerPredicate::ZoneAffinity(p) => p.apply(server),
            ServerPredicate::AlwaysTrue => true,
            ServerPredicate::All(members) => members.iter().all(|p| p.apply(server, state)),
            ServerPredicate::Custom(p) => (p.test)(server, state),
        }
    }

    /// Keep the acceptable candidates, preserving their order.
    pub fn filter(&self, candidates: &[Arc<Server>], state: &SelectionState<'_>) -> Vec<Arc<Server>> {
        match self {
            ServerPredicate::AlwaysTrue => candidates.to_vec(),
            ServerPredicate::ZoneAvoidance(p) => p.filter(candidates, state),
            ServerPredicate::All(members) => {
                let mut remaining = candidates.to_vec();
                for member in members {
                    if remaining.is_empty() {
                        break;
                    }
                    remaining = member.filter(&remaining, state);
                }
                remaining
            }
            _ => candidates
                .iter()
                .filter(|server| self.apply(server, state))
                .cloned()
                .collect(),
        }
    }

    /// Whether this predicate accepts every server unconditionally.
    pub fn is_always_true(&self) -> bool {
        match self {
            ServerPredicate::AlwaysTrue => true,
            ServerPredicate::All(members) => members.iter().all(ServerPredicate::is_always_true),
            _ => false,
        }
    }

    /// Diagnostic description of this predicate.
    pub fn description(&self) -> RuleDescription {
        match self {
            ServerPredicate::Availability(_) => RuleDescription::from(description::AVAILABILITY),
            ServerPredicate::ZoneAvoidance(_) => RuleDescription::from(description::ZONE_AVOIDANCE),
            ServerPredicate::ZoneAffinity(p) => RuleDescription::from(p.to_string()),
            ServerPredicate::AlwaysTrue => RuleDescription::from(description::ANY),
            ServerPredicate::All(members) => members
                .iter()
                .map(ServerPredicate::description)
                .reduce(RuleDescription::and)
                .unwrap_or_else(|| RuleDescription::from(description::ANY)),
            ServerPredicate::Custom(p) => RuleDescription::from(p.name()),
        }
    }
}

impl From<AvailabilityPredicate> for ServerPredicate {
    fn from(p: AvailabilityPredicate) -> Self {
        ServerPredicate::Availability(p)
    }
}

impl From<ZoneAvoidancePredicate> for ServerPredicate {
    fn from(p: ZoneAvoidancePredicate) -> Self {
        ServerPredicate::ZoneAvoidance(p)
    }
}

impl From<ZoneAffinityPredicate> for ServerPredicate {
    fn from(p: ZoneAffinityPredicate) -> Self {
        ServerPredicate::ZoneAffinity(p)
    }
}

impl From<CustomPredicate> for ServerPredicate {
    fn from(p: CustomPredicate) -> Self {
        ServerPredicate::Custom(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servers() -> Vec<Arc<Server>> {
        (1..=4)
            .map(|i| Arc::new(Server::new(format!("s{}", i), format!("127.0.0.1:{}", 8000 + i).parse().unwrap(), None)))
            .collect()
    }

    fn ids(servers: &[Arc<Server>]) -> Vec<&str> {
        servers.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_all_requires_every_member() {
        let odd = ServerPredicate::custom("odd port", |s, _| s.addr.port() % 2 == 1);
        let small = ServerPredicate::custom("small port", |s, _| s.addr.port() < 8003);
        let both = ServerPredicate::all([odd, small]);
        let candidates = servers();

        let kept = both.filter(&candidates, &SelectionState::default());
        assert_eq!(ids(&kept), vec!["s1"]);
        assert!(both.apply(&candidates[0], &SelectionState::default()));
        assert!(!both.apply(&candidates[2], &SelectionState::default()));
    }

    #[test]
    fn test_all_of_nothing_accepts() {
        let p = ServerPredicate::all(Vec::new());
        assert!(p.is_always_true());
        assert_eq!(p.filter(&servers(), &SelectionState::default()).len(), 4);
    }

    #[test]
    fn test_filter_preserves_order() {
        let p = ServerPredicate::custom("not s2", |s, _| s.id != "s2");
        let kept = p.filter(&servers(), &SelectionState::default());
        assert_eq!(ids(&kept), vec!["s1", "s3", "s4"]);
    }

    #[test]
    fn test_custom_sees_key() {
        let p = ServerPredicate::custom("key match", |s, state| state.key == Some(s.id.as_str()));
        let state = SelectionState::default().with_key(Some("s3"));
        assert_eq!(ids(&p.filter(&servers(), &state)), vec!["s3"]);
    }
}
