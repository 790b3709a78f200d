//! Predicate chains and the rules built on them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ribbon_propagator::config::CircuitBreakerConfig;
use ribbon_propagator::load_balancer::{build_rule, zone_affinity_rule, Balancer, LoadBalancerStats};
use ribbon_propagator::predicate::{CompositePredicate, SelectionState, ServerPredicate};

mod common;

fn counted(calls: &Arc<AtomicUsize>, accept: bool) -> ServerPredicate {
    let calls = calls.clone();
    ServerPredicate::custom("counted", move |_, _| {
        calls.fetch_add(1, Ordering::SeqCst);
        accept
    })
}

#[test]
fn test_primary_result_wins_without_consulting_fallbacks() {
    let candidates = vec![
        common::server("a", 1, Some("z1")),
        common::server("b", 2, Some("z2")),
        common::server("c", 3, Some("z1")),
    ];
    let fallback_calls = Arc::new(AtomicUsize::new(0));
    let chain = CompositePredicate::builder(ServerPredicate::custom("z1", |s, _| s.zone() == Some("z1")))
        .add_fallback(counted(&fallback_calls, true))
        .add_fallback(counted(&fallback_calls, true))
        .build();

    let selection = chain.evaluate(&candidates, &SelectionState::default());
    assert_eq!(common::ids(&selection.servers), vec!["a", "c"]);
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_terminal_returns_every_candidate() {
    let candidates = vec![common::server("a", 1, None), common::server("b", 2, None)];
    let calls = Arc::new(AtomicUsize::new(0));
    let chain = CompositePredicate::builder(counted(&calls, false))
        .add_fallback(counted(&calls, false))
        .build();

    let selection = chain.evaluate(&candidates, &SelectionState::default());
    assert_eq!(common::ids(&selection.servers), vec!["a", "b"]);
    assert_eq!(selection.tier, 2);
    // both non-terminal tiers saw the full candidate list
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    assert!(chain.evaluate(&[], &SelectionState::default()).servers.is_empty());
}

#[test]
fn test_and_tier_requires_every_member() {
    let candidates = vec![
        common::server("a", 1, Some("z1")),
        common::server("b", 2, Some("z1")),
        common::server("c", 3, Some("z2")),
    ];
    common::trip(&candidates[0]);
    let stats = LoadBalancerStats::new("orders", candidates.clone(), CircuitBreakerConfig::default());

    let tier = ServerPredicate::all([
        ServerPredicate::custom("z1", |s, _| s.zone() == Some("z1")),
        ServerPredicate::Availability(Default::default()),
    ]);
    let chain = CompositePredicate::builder(tier).build();

    let selection = chain.evaluate(&candidates, &SelectionState::new(&stats));
    assert_eq!(common::ids(&selection.servers), vec!["b"]);
}

#[test]
fn test_zone_affinity_prefers_local_zone() {
    let config = common::client_config(
        Some("Z1"),
        &[("remote", 8001, "z2"), ("local-1", 8002, "z1"), ("local-2", 8003, "z1")],
    );
    let balancer = Balancer::from_config(&config);

    let mut picked: Vec<_> = (0..4).map(|_| balancer.choose(None).unwrap().id.clone()).collect();
    picked.sort();
    picked.dedup();
    assert_eq!(picked, vec!["local-1", "local-2"]);
}

#[test]
fn test_zone_affinity_falls_back_to_healthy_zone() {
    let config = common::client_config(
        Some("z1"),
        &[("broken", 8001, "z2"), ("healthy", 8002, "z3"), ("busy", 8003, "z4")],
    );
    let rule = zone_affinity_rule(&config).unwrap();
    let balancer = Balancer::from_config(&config);
    let stats = balancer.stats();
    common::trip(stats.server("broken").unwrap());
    let _guard = stats.server("busy").unwrap().start_request();

    let selection = rule.predicate().evaluate(stats.servers(), &SelectionState::new(&stats));
    assert_eq!(selection.tier, 1);
    assert_eq!(common::ids(&selection.servers), vec!["healthy"]);
    assert_eq!(balancer.choose(None).unwrap().id, "healthy");
}

#[test]
fn test_default_rule_avoids_loaded_zone() {
    let config = common::client_config(None, &[("busy", 8001, "z1"), ("idle", 8002, "z2")]);
    let balancer = Balancer::from_config(&config);
    let stats = balancer.stats();
    let busy = stats.server("busy").unwrap();
    let _guards: Vec<_> = (0..5).map(|_| busy.start_request()).collect();

    for _ in 0..4 {
        assert_eq!(balancer.choose(None).unwrap().id, "idle");
    }
    assert_eq!(
        build_rule(&config).description().to_string(),
        "(zone avoidance && availability) -> availability -> any"
    );
}
