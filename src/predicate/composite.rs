//! Fallback chain of predicates.
//!
//! # Responsibilities
//! - Evaluate tiers strictly in registration order
//! - Stop at the first tier whose result is sufficient
//! - Guarantee an always-accepting terminal tier
//!
//! A tier result is sufficient when it holds at least
//! `minimal_filtered_servers` servers and more than
//! `minimal_filtered_percentage` of the candidates. With the defaults
//! (1 and 0.0) that means "non-empty".

use std::sync::Arc;

use crate::load_balancer::server::Server;
use crate::predicate::{RuleDescription, SelectionState, ServerPredicate};

/// Outcome of a chain evaluation.
#[derive(Debug, Clone)]
pub struct ChainSelection {
    /// Accepted servers, in candidate order.
    pub servers: Vec<Arc<Server>>,
    /// Index of the tier that produced `servers`.
    pub tier: usize,
}

/// Immutable ordered list of predicate tiers.
#[derive(Debug, Clone)]
pub struct CompositePredicate {
    tiers: Vec<ServerPredicate>,
    minimal_filtered_servers: usize,
    minimal_filtered_percentage: f32,
}

impl CompositePredicate {
    /// Start a chain whose primary tier is the AND of `predicates`.
    pub fn with_predicates(predicates: impl IntoIterator<Item = ServerPredicate>) -> CompositePredicateBuilder {
        Self::builder(ServerPredicate::all(predicates))
    }

    pub fn builder(primary: impl Into<ServerPredicate>) -> CompositePredicateBuilder {
        CompositePredicateBuilder {
            tiers: vec![primary.into()],
            minimal_filtered_servers: 1,
            minimal_filtered_percentage: 0.0,
        }
    }

    pub fn tiers(&self) -> &[ServerPredicate] {
        &self.tiers
    }

    /// Walk the tiers and return the first sufficient result.
    ///
    /// Every tier filters the full candidate list. The last tier's result
    /// is returned as is, which is empty only when `candidates` is.
    pub fn evaluate(&self, candidates: &[Arc<Server>], state: &SelectionState<'_>) -> ChainSelection {
        let last = self.tiers.len() - 1;
        for (tier, predicate) in self.tiers[..last].iter().enumerate() {
            let servers = predicate.filter(candidates, state);
            if self.is_sufficient(servers.len(), candidates.len()) {
                return ChainSelection { servers, tier };
            }
        }
        ChainSelection {
            servers: self.tiers[last].filter(candidates, state),
            tier: last,
        }
    }

    /// Servers selected by the chain.
    pub fn eligible(&self, candidates: &[Arc<Server>], state: &SelectionState<'_>) -> Vec<Arc<Server>> {
        self.evaluate(candidates, state).servers
    }

    /// Single-server check against the primary tier only.
    pub fn apply(&self, server: &Server, state: &SelectionState<'_>) -> bool {
        self.tiers[0].apply(server, state)
    }

    pub fn description(&self) -> RuleDescription {
        let mut tiers = self.tiers.iter().map(ServerPredicate::description);
        let first = tiers
            .next()
            .unwrap_or_else(|| RuleDescription::from(crate::predicate::description::ANY));
        tiers.fold(first, RuleDescription::fallback)
    }

    fn is_sufficient(&self, filtered: usize, total: usize) -> bool {
        filtered >= self.minimal_filtered_servers
            && filtered as f32 > self.minimal_filtered_percentage * total as f32
    }
}

/// Builder for [`CompositePredicate`].
#[derive(Debug)]
pub struct CompositePredicateBuilder {
    tiers: Vec<ServerPredicate>,
    minimal_filtered_servers: usize,
    minimal_filtered_percentage: f32,
}

impl CompositePredicateBuilder {
    pub fn add_fallback(mut self, predicate: impl Into<ServerPredicate>) -> Self {
        self.tiers.push(predicate.into());
        self
    }

    pub fn minimal_filtered_servers(mut self, count: usize) -> Self {
        self.minimal_filtered_servers = count;
        self
    }

    pub fn minimal_filtered_percentage(mut self, percentage: f32) -> Self {
        self.minimal_filtered_percentage = percentage;
        self
    }

    pub fn build(mut self) -> CompositePredicate {
        let terminated = self.tiers.last().is_some_and(ServerPredicate::is_always_true);
        if !terminated {
            tracing::debug!(tiers = self.tiers.len(), "Appending always-true terminal tier");
            self.tiers.push(ServerPredicate::AlwaysTrue);
        }
        CompositePredicate {
            tiers: self.tiers,
            minimal_filtered_servers: self.minimal_filtered_servers,
            minimal_filtered_percentage: self.minimal_filtered_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn servers() -> Vec<Arc<Server>> {
        (1..=4)
            .map(|i| Arc::new(Server::new(format!("s{}", i), format!("127.0.0.1:{}", 9000 + i).parse().unwrap(), None)))
            .collect()
    }

    fn ids(servers: &[Arc<Server>]) -> Vec<&str> {
        servers.iter().map(|s| s.id.as_str()).collect()
    }

    fn counting(name: &str, calls: &Arc<AtomicUsize>, accept: fn(&Server) -> bool) -> ServerPredicate {
        let calls = calls.clone();
        ServerPredicate::custom(name, move |server, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            accept(server)
        })
    }

    #[test]
    fn test_primary_short_circuits() {
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let primary_calls = Arc::new(AtomicUsize::new(0));
        let chain = CompositePredicate::builder(counting("even", &primary_calls, |s| s.addr.port() % 2 == 0))
            .add_fallback(counting("never", &fallback_calls, |_| false))
            .build();

        let selection = chain.evaluate(&servers(), &SelectionState::default());
        assert_eq!(ids(&selection.servers), vec!["s2", "s4"]);
        assert_eq!(selection.tier, 0);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 4);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_terminal_accepts_everything() {
        let chain = CompositePredicate::builder(ServerPredicate::custom("none", |_, _| false))
            .add_fallback(ServerPredicate::custom("still none", |_, _| false))
            .build();

        let candidates = servers();
        let selection = chain.evaluate(&candidates, &SelectionState::default());
        assert_eq!(selection.tier, 2);
        assert_eq!(ids(&selection.servers), ids(&candidates));
    }

    #[test]
    fn test_fallback_sees_full_candidate_list() {
        let chain = CompositePredicate::builder(ServerPredicate::custom("s9 only", |s, _| s.id == "s9"))
            .add_fallback(ServerPredicate::custom("not s1", |s, _| s.id != "s1"))
            .build();

        let selection = chain.evaluate(&servers(), &SelectionState::default());
        assert_eq!(selection.tier, 1);
        assert_eq!(ids(&selection.servers), vec!["s2", "s3", "s4"]);
    }

    #[test]
    fn test_empty_candidates() {
        let chain = CompositePredicate::builder(ServerPredicate::AlwaysTrue).build();
        assert_eq!(chain.tiers().len(), 1);
        assert!(chain.eligible(&[], &SelectionState::default()).is_empty());
    }

    #[test]
    fn test_minimal_thresholds() {
        let one = ServerPredicate::custom("s1", |s, _| s.id == "s1");
        let chain = CompositePredicate::builder(one.clone())
            .add_fallback(ServerPredicate::custom("not s4", |s, _| s.id != "s4"))
            .minimal_filtered_servers(2)
            .build();
        assert_eq!(chain.evaluate(&servers(), &SelectionState::default()).tier, 1);

        let chain = CompositePredicate::builder(one)
            .minimal_filtered_percentage(0.25)
            .build();
        // 1 of 4 is not more than 25%
        assert_eq!(chain.evaluate(&servers(), &SelectionState::default()).tier, 1);
    }

    #[test]
    fn test_description_follows_tiers() {
        let chain = CompositePredicate::with_predicates([
            ServerPredicate::ZoneAvoidance(Default::default()),
            ServerPredicate::Availability(Default::default()),
        ])
        .add_fallback(ServerPredicate::Availability(Default::default()))
        .build();

        assert_eq!(
            chain.description().to_string(),
            "(zone avoidance && availability) -> availability -> any"
        );
    }
}
