//! Zone affinity rule.
//!
//! Prefers servers in the client's own zone, then falls back through the
//! default zone avoidance tiers:
//!
//! ```text
//! zone affinity(<zone>) -> (zone avoidance && availability) -> availability -> any
//! ```

use crate::config::RibbonConfig;
use crate::load_balancer::rule::{balancer_for, build_rule, zone_avoidance_and_availability, PredicateRule};
use crate::predicate::{AvailabilityPredicate, CompositePredicate, ZoneAffinityPredicate};

/// Build the zone affinity rule, or `None` when it cannot apply.
pub fn zone_affinity_rule(config: &RibbonConfig) -> Option<PredicateRule> {
    if !config.rule.zone_affinity_enabled {
        return None;
    }
    let Some(zone) = config.client.zone.as_deref().filter(|z| !z.trim().is_empty()) else {
        tracing::warn!(
            client = %config.client.name,
            "Zone affinity requested but no client zone is configured"
        );
        return None;
    };

    tracing::info!(client = %config.client.name, zone = %zone, "Zone affinity enabled for client");

    let predicate = CompositePredicate::builder(ZoneAffinityPredicate::new(zone))
        .add_fallback(zone_avoidance_and_availability(config))
        .add_fallback(AvailabilityPredicate::new(&config.availability))
        .minimal_filtered_servers(config.rule.minimal_filtered_servers)
        .minimal_filtered_percentage(config.rule.minimal_filtered_percentage)
        .build();

    Some(PredicateRule::new("zone affinity", predicate, balancer_for(config.rule.selection)))
}

/// The rule a client should use: zone affinity when possible, zone
/// avoidance otherwise.
pub fn rule_for(config: &RibbonConfig) -> PredicateRule {
    zone_affinity_rule(config).unwrap_or_else(|| build_rule(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(zone: Option<&str>) -> RibbonConfig {
        let mut config = RibbonConfig::default();
        config.client.name = "orders".to_string();
        config.client.zone = zone.map(str::to_string);
        config
    }

    #[test]
    fn test_description() {
        let rule = zone_affinity_rule(&config(Some("EU-West-1a"))).unwrap();
        assert_eq!(
            rule.description().to_string(),
            "zone affinity(eu-west-1a) -> (zone avoidance && availability) -> availability -> any"
        );
    }

    #[test]
    fn test_requires_zone_and_flag() {
        assert!(zone_affinity_rule(&config(None)).is_none());
        assert!(zone_affinity_rule(&config(Some("  "))).is_none());

        let mut disabled = config(Some("z1"));
        disabled.rule.zone_affinity_enabled = false;
        assert!(zone_affinity_rule(&disabled).is_none());
        assert_eq!(rule_for(&disabled).name(), "zone avoidance");
    }
}
