//! Zone avoidance filtering.
//!
//! # Responsibilities
//! - Drop zones without up servers
//! - Drop zones whose servers are (almost) all circuit-tripped
//! - Drop one of the most loaded zones once load crosses the trigger
//!
//! # Design Decisions
//! - Available zones are computed once per filter call, not per server
//! - Ties on worst load are broken randomly, weighted by instance count
//! - Avoiding the worst zone never empties the available set
//! - Servers without a zone, or in a zone without a snapshot, are accepted

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::Rng;

use crate::config::ZoneAvoidanceConfig;
use crate::load_balancer::server::Server;
use crate::load_balancer::stats::ZoneSnapshot;
use crate::predicate::SelectionState;

const LOAD_EPSILON: f64 = 0.000001;

/// Accepts servers located in a zone that is currently worth using.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneAvoidancePredicate {
    enabled: bool,
    triggering_load_per_server: f64,
    blackout_percentage: f64,
}

impl ZoneAvoidancePredicate {
    pub fn new(config: &ZoneAvoidanceConfig) -> Self {
        Self {
            enabled: config.enabled,
            triggering_load_per_server: config.triggering_load_per_server,
            blackout_percentage: config.blackout_percentage,
        }
    }

    pub fn apply(&self, server: &Server, state: &SelectionState<'_>) -> bool {
        self.verdict(state).map_or(true, |verdict| verdict.accepts(server))
    }

    pub fn filter(&self, candidates: &[Arc<Server>], state: &SelectionState<'_>) -> Vec<Arc<Server>> {
        match self.verdict(state) {
            None => candidates.to_vec(),
            Some(verdict) => candidates
                .iter()
                .filter(|server| verdict.accepts(server))
                .cloned()
                .collect(),
        }
    }

    /// `None` means every server is acceptable.
    fn verdict(&self, state: &SelectionState<'_>) -> Option<ZoneVerdict> {
        if !self.enabled {
            return None;
        }
        let stats = state.stats?;
        if stats.zone_count() <= 1 {
            return None;
        }

        let snapshots = stats.zone_snapshots();
        let available = available_zones(
            &snapshots,
            self.triggering_load_per_server,
            self.blackout_percentage,
            &mut rand::thread_rng(),
        )
        .unwrap_or_default();

        tracing::trace!(
            balancer = stats.name(),
            available = ?available,
            "Zone avoidance computed available zones"
        );

        Some(ZoneVerdict {
            known: snapshots.into_keys().collect(),
            available,
        })
    }
}

impl Default for ZoneAvoidancePredicate {
    fn default() -> Self {
        Self::new(&ZoneAvoidanceConfig::default())
    }
}

struct ZoneVerdict {
    known: BTreeSet<String>,
    available: BTreeSet<String>,
}

impl ZoneVerdict {
    fn accepts(&self, server: &Server) -> bool {
        match server.zone() {
            None => true,
            Some(zone) if !self.known.contains(zone) => true,
            Some(zone) => self.available.contains(zone),
        }
    }
}

/// Compute the zones worth sending traffic to.
///
/// Returns `None` when there are no snapshots at all.
pub fn available_zones<R: Rng + ?Sized>(
    snapshots: &BTreeMap<String, ZoneSnapshot>,
    triggering_load_per_server: f64,
    blackout_percentage: f64,
    rng: &mut R,
) -> Option<BTreeSet<String>> {
    if snapshots.is_empty() {
        return None;
    }
    let mut available: BTreeSet<String> = snapshots.keys().cloned().collect();
    if available.len() == 1 {
        return Some(available);
    }

    let mut worst: Vec<&str> = Vec::new();
    let mut max_load_per_server = 0.0_f64;
    let mut limited_zone_availability = false;

    for (zone, snapshot) in snapshots {
        if snapshot.instance_count == 0 {
            available.remove(zone);
            limited_zone_availability = true;
            continue;
        }

        let load = snapshot.load_per_server;
        let tripped_ratio = snapshot.circuit_tripped_count as f64 / snapshot.instance_count as f64;
        if tripped_ratio >= blackout_percentage || load < 0.0 {
            available.remove(zone);
            limited_zone_availability = true;
        } else if (load - max_load_per_server).abs() < LOAD_EPSILON {
            worst.push(zone);
        } else if load > max_load_per_server {
            max_load_per_server = load;
            worst.clear();
            worst.push(zone);
        }
    }

    if max_load_per_server < triggering_load_per_server && !limited_zone_availability {
        return Some(available);
    }

    // The last available zone is never avoided.
    if available.len() > 1 {
        if let Some(zone) = choose_weighted(snapshots, &worst, rng) {
            available.remove(zone);
        }
    }
    Some(available)
}

/// Pick one zone, weighted by its instance count.
fn choose_weighted<'a, R: Rng + ?Sized>(
    snapshots: &BTreeMap<String, ZoneSnapshot>,
    choose_from: &[&'a str],
    rng: &mut R,
) -> Option<&'a str> {
    match choose_from {
        [] => None,
        [only] => Some(*only),
        _ => {
            let weight = |zone: &str| snapshots.get(zone).map_or(0, |s| s.instance_count);
            let total: usize = choose_from.iter().map(|zone| weight(*zone)).sum();
            if total == 0 {
                return choose_from.first().copied();
            }

            let index = rng.gen_range(0..total);
            let mut sum = 0;
            for zone in choose_from {
                sum += weight(*zone);
                if index < sum {
                    return Some(*zone);
                }
            }
            choose_from.last().copied()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::load_balancer::stats::LoadBalancerStats;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn snapshot(instances: usize, tripped: usize, active: usize) -> ZoneSnapshot {
        let usable = instances - tripped;
        let load_per_server = if instances == 0 {
            0.0
        } else if usable == 0 {
            -1.0
        } else {
            active as f64 / usable as f64
        };
        ZoneSnapshot {
            instance_count: instances,
            circuit_tripped_count: tripped,
            active_requests_count: active,
            load_per_server,
        }
    }

    fn zones(entries: &[(&str, ZoneSnapshot)]) -> BTreeMap<String, ZoneSnapshot> {
        entries.iter().map(|(z, s)| (z.to_string(), *s)).collect()
    }

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_low_load_keeps_all_zones() {
        let snapshots = zones(&[("z1", snapshot(2, 0, 0)), ("z2", snapshot(2, 0, 0))]);
        let available = available_zones(&snapshots, 0.2, 0.99999, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(names(&available), vec!["z1", "z2"]);
    }

    #[test]
    fn test_worst_zone_dropped_above_trigger() {
        let snapshots = zones(&[("z1", snapshot(2, 0, 1)), ("z2", snapshot(2, 0, 6))]);
        let available = available_zones(&snapshots, 0.2, 0.99999, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(names(&available), vec!["z1"]);
    }

    #[test]
    fn test_blacked_out_and_empty_zones_dropped() {
        let snapshots = zones(&[
            ("empty", snapshot(0, 0, 0)),
            ("tripped", snapshot(2, 2, 0)),
            ("busy", snapshot(2, 0, 4)),
            ("calm", snapshot(4, 0, 1)),
        ]);
        let available = available_zones(&snapshots, 0.2, 0.99999, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(names(&available), vec!["calm"]);
    }

    #[test]
    fn test_single_and_no_zone() {
        let single = zones(&[("z1", snapshot(0, 0, 0))]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(names(&available_zones(&single, 0.2, 0.99999, &mut rng).unwrap()), vec!["z1"]);
        assert!(available_zones(&BTreeMap::new(), 0.2, 0.99999, &mut rng).is_none());
    }

    #[test]
    fn test_weighted_choice_covers_all_tied_zones() {
        let snapshots = zones(&[("z1", snapshot(1, 0, 5)), ("z2", snapshot(3, 0, 15))]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut dropped = BTreeSet::new();
        for _ in 0..200 {
            let available = available_zones(&snapshots, 0.2, 0.99999, &mut rng).unwrap();
            assert_eq!(available.len(), 1);
            dropped.extend(snapshots.keys().filter(|z| !available.contains(*z)).cloned());
        }
        assert_eq!(names(&dropped), vec!["z1", "z2"]);
    }

    #[test]
    fn test_filter_avoids_tripped_zone() {
        let healthy = Arc::new(Server::new("a", "127.0.0.1:1".parse().unwrap(), Some("z1")));
        let broken = Arc::new(Server::new("b", "127.0.0.1:2".parse().unwrap(), Some("z2")));
        let zoneless = Arc::new(Server::new("c", "127.0.0.1:3".parse().unwrap(), None));
        for _ in 0..3 {
            broken.record_failure();
        }
        let candidates = vec![healthy, broken, zoneless];
        let stats = LoadBalancerStats::new("test", candidates.clone(), CircuitBreakerConfig::default());

        let kept = ZoneAvoidancePredicate::default().filter(&candidates, &SelectionState::new(&stats));
        let ids: Vec<_> = kept.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_disabled_accepts_everything() {
        let broken = Arc::new(Server::new("b", "127.0.0.1:2".parse().unwrap(), Some("z2")));
        let other = Arc::new(Server::new("a", "127.0.0.1:1".parse().unwrap(), Some("z1")));
        for _ in 0..3 {
            broken.record_failure();
        }
        let stats = LoadBalancerStats::new("test", vec![broken.clone(), other], CircuitBreakerConfig::default());
        let p = ZoneAvoidancePredicate::new(&ZoneAvoidanceConfig {
            enabled: false,
            ..ZoneAvoidanceConfig::default()
        });

        assert!(p.apply(&broken, &SelectionState::new(&stats)));
    }
}
