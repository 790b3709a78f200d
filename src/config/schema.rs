//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure of a load
//! balancer client. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};

/// Root configuration for one load-balanced client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RibbonConfig {
    /// Client identity (name, local zone).
    pub client: ClientConfig,

    /// Rule selection settings.
    pub rule: RuleConfig,

    /// Availability filtering.
    pub availability: AvailabilityConfig,

    /// Zone avoidance filtering.
    pub zone_avoidance: ZoneAvoidanceConfig,

    /// Per-server circuit breaker.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Static server list.
    pub servers: Vec<ServerConfig>,
}

/// Client identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Client name for logging/metrics.
    pub name: String,

    /// Zone the client itself runs in (e.g., "eu-west-1a").
    pub zone: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            zone: None,
        }
    }
}

/// How a server is picked among the eligible ones.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    #[default]
    RoundRobin,
    Random,
}

/// Rule configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Prefer servers in the client's own zone.
    pub zone_affinity_enabled: bool,

    /// Picking strategy applied after filtering.
    pub selection: SelectionStrategy,

    /// A tier result smaller than this falls through to the next tier.
    pub minimal_filtered_servers: usize,

    /// A tier result not exceeding this share of the candidates falls through.
    pub minimal_filtered_percentage: f32,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            zone_affinity_enabled: true,
            selection: SelectionStrategy::RoundRobin,
            minimal_filtered_servers: 1,
            minimal_filtered_percentage: 0.0,
        }
    }
}

/// Availability predicate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AvailabilityConfig {
    /// Skip servers whose circuit breaker is tripped.
    pub circuit_breaker_filtering: bool,

    /// Skip servers with at least this many active requests.
    pub active_connections_limit: usize,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            circuit_breaker_filtering: true,
            active_connections_limit: usize::MAX,
        }
    }
}

/// Zone avoidance predicate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ZoneAvoidanceConfig {
    /// Enable zone avoidance.
    pub enabled: bool,

    /// Load per server above which the worst zone is dropped.
    pub triggering_load_per_server: f64,

    /// Share of tripped servers at which a zone is blacked out.
    pub blackout_percentage: f64,
}

impl Default for ZoneAvoidanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            triggering_load_per_server: 0.2,
            blackout_percentage: 0.99999,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive connection failures before the circuit trips.
    pub failure_count_threshold: usize,

    /// Base blackout in seconds, doubled for every failure past the threshold.
    pub tripped_timeout_factor_secs: u64,

    /// Maximum blackout in seconds.
    pub max_tripped_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_count_threshold: 3,
            tripped_timeout_factor_secs: 10,
            max_tripped_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Server definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Unique server identifier.
    pub id: String,

    /// Server address (e.g., "10.0.0.1:8080").
    pub address: String,

    /// Zone the server runs in.
    #[serde(default)]
    pub zone: Option<String>,
}
