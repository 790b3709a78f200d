//! Predicate based selection rules.
//!
//! # Responsibilities
//! - Pair a predicate chain with a picking strategy
//! - Build the default zone avoidance rule from configuration
//!
//! A rule first narrows the candidates with its chain, then lets the
//! strategy pick one of the survivors.

use std::fmt;
use std::sync::Arc;

use crate::config::{RibbonConfig, SelectionStrategy};
use crate::load_balancer::random::RandomChoice;
use crate::load_balancer::round_robin::RoundRobin;
use crate::load_balancer::server::Server;
use crate::load_balancer::stats::LoadBalancerStats;
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::predicate::{
    AvailabilityPredicate, CompositePredicate, RuleDescription, SelectionState, ServerPredicate,
    ZoneAvoidancePredicate,
};

/// A predicate chain plus a picking strategy.
pub struct PredicateRule {
    name: String,
    predicate: CompositePredicate,
    balancer: Box<dyn LoadBalancer>,
}

impl PredicateRule {
    pub fn new(name: impl Into<String>, predicate: CompositePredicate, balancer: Box<dyn LoadBalancer>) -> Self {
        Self {
            name: name.into(),
            predicate,
            balancer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn predicate(&self) -> &CompositePredicate {
        &self.predicate
    }

    pub fn description(&self) -> RuleDescription {
        self.predicate.description()
    }

    /// Pick a server among every server known to `stats`.
    pub fn choose(&self, stats: &LoadBalancerStats, key: Option<&str>) -> Option<Arc<Server>> {
        self.choose_from(stats.servers(), Some(stats), key)
    }

    /// Pick a server among `candidates`.
    ///
    /// `None` means nothing was selectable; that is not an error.
    pub fn choose_from(
        &self,
        candidates: &[Arc<Server>],
        stats: Option<&LoadBalancerStats>,
        key: Option<&str>,
    ) -> Option<Arc<Server>> {
        let state = SelectionState { stats, key };
        let selection = self.predicate.evaluate(candidates, &state);
        metrics::record_rule_selection(&self.name, selection.tier);

        let chosen = self.balancer.next_server(&selection.servers);
        tracing::debug!(
            rule = %self.name,
            tier = selection.tier,
            eligible = selection.servers.len(),
            candidates = candidates.len(),
            server = chosen.as_ref().map(|s| s.id.as_str()),
            "Rule selection"
        );
        chosen
    }
}

impl fmt::Debug for PredicateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateRule")
            .field("name", &self.name)
            .field("description", &self.description().to_string())
            .field("balancer", &self.balancer)
            .finish()
    }
}

/// Picking strategy configured for the client.
pub fn balancer_for(strategy: SelectionStrategy) -> Box<dyn LoadBalancer> {
    match strategy {
        SelectionStrategy::RoundRobin => Box::new(RoundRobin::new()),
        SelectionStrategy::Random => Box::new(RandomChoice::new()),
    }
}

/// Zone avoidance AND availability, as one tier.
pub fn zone_avoidance_and_availability(config: &RibbonConfig) -> ServerPredicate {
    ServerPredicate::all([
        ZoneAvoidancePredicate::new(&config.zone_avoidance).into(),
        AvailabilityPredicate::new(&config.availability).into(),
    ])
}

/// `(zone avoidance && availability) -> availability -> any`
pub fn build_rule(config: &RibbonConfig) -> PredicateRule {
    let predicate = CompositePredicate::builder(zone_avoidance_and_availability(config))
        .add_fallback(AvailabilityPredicate::new(&config.availability))
        .minimal_filtered_servers(config.rule.minimal_filtered_servers)
        .minimal_filtered_percentage(config.rule.minimal_filtered_percentage)
        .build();

    PredicateRule::new("zone avoidance", predicate, balancer_for(config.rule.selection))
}
