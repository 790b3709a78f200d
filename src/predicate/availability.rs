//! Availability filtering.
//!
//! # Responsibilities
//! - Skip servers whose circuit breaker is tripped
//! - Skip servers at or above the active connections limit
//!
//! # Design Decisions
//! - Without statistics every server is considered available
//! - Liveness is not checked here; the server list is assumed to be curated

use crate::config::AvailabilityConfig;
use crate::load_balancer::server::Server;
use crate::predicate::SelectionState;

/// Accepts servers that are neither tripped nor saturated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityPredicate {
    circuit_breaker_filtering: bool,
    active_connections_limit: usize,
}

impl AvailabilityPredicate {
    pub fn new(config: &AvailabilityConfig) -> Self {
        Self {
            circuit_breaker_filtering: config.circuit_breaker_filtering,
            active_connections_limit: config.active_connections_limit,
        }
    }

    pub fn apply(&self, server: &Server, state: &SelectionState<'_>) -> bool {
        let Some(stats) = state.stats else {
            return true;
        };
        !self.should_skip(server, stats.is_circuit_tripped(server))
    }

    fn should_skip(&self, server: &Server, circuit_tripped: bool) -> bool {
        (self.circuit_breaker_filtering && circuit_tripped)
            || server.active_requests() >= self.active_connections_limit
    }
}

impl Default for AvailabilityPredicate {
    fn default() -> Self {
        Self::new(&AvailabilityConfig::default())
    }
}
