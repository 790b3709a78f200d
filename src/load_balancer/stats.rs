//! Load balancer statistics.
//!
//! # Responsibilities
//! - Hold the full server list known to one balancer, grouped by zone
//! - Derive per-zone snapshots (instances, tripped circuits, load)
//! - Answer circuit breaker queries with the balancer's settings

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{CircuitBreakerConfig, ServerConfig};
use crate::load_balancer::server::Server;

/// Point-in-time aggregate of one zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneSnapshot {
    /// Servers in the zone that are up.
    pub instance_count: usize,
    /// Up servers whose circuit breaker is tripped.
    pub circuit_tripped_count: usize,
    /// Active requests across up servers with a closed circuit.
    pub active_requests_count: usize,
    /// Active requests per usable server; `-1.0` when every server is tripped.
    pub load_per_server: f64,
}

impl ZoneSnapshot {
    fn collect(servers: &[Arc<Server>], config: &CircuitBreakerConfig) -> Self {
        let mut instance_count = 0;
        let mut circuit_tripped_count = 0;
        let mut active_requests_count = 0;

        for server in servers.iter().filter(|s| s.is_alive()) {
            instance_count += 1;
            if server.is_circuit_tripped(config) {
                circuit_tripped_count += 1;
            } else {
                active_requests_count += server.active_requests();
            }
        }

        let usable = instance_count - circuit_tripped_count;
        let load_per_server = if instance_count == 0 {
            0.0
        } else if usable == 0 {
            -1.0
        } else {
            active_requests_count as f64 / usable as f64
        };

        Self {
            instance_count,
            circuit_tripped_count,
            active_requests_count,
            load_per_server,
        }
    }
}

/// Statistics of all servers known to one balancer.
#[derive(Debug)]
pub struct LoadBalancerStats {
    name: String,
    servers: Vec<Arc<Server>>,
    zones: BTreeMap<String, Vec<Arc<Server>>>,
    circuit_breaker: CircuitBreakerConfig,
}

impl LoadBalancerStats {
    /// Group `servers` by zone. Servers without a zone are tracked but belong
    /// to no zone.
    pub fn new(
        name: impl Into<String>,
        servers: Vec<Arc<Server>>,
        circuit_breaker: CircuitBreakerConfig,
    ) -> Self {
        let mut zones: BTreeMap<String, Vec<Arc<Server>>> = BTreeMap::new();
        for server in &servers {
            if let Some(zone) = server.zone() {
                zones.entry(zone.to_string()).or_default().push(server.clone());
            }
        }

        Self {
            name: name.into(),
            servers,
            zones,
            circuit_breaker,
        }
    }

    /// Build servers from configuration, skipping unparsable addresses.
    pub fn from_config(
        name: impl Into<String>,
        configs: &[ServerConfig],
        circuit_breaker: CircuitBreakerConfig,
    ) -> Self {
        let mut servers = Vec::with_capacity(configs.len());
        for config in configs {
            match config.address.parse() {
                Ok(addr) => servers.push(Arc::new(Server::new(
                    config.id.clone(),
                    addr,
                    config.zone.as_deref(),
                ))),
                Err(_) => tracing::warn!(id = %config.id, address = %config.address, "Invalid server address"),
            }
        }
        Self::new(name, servers, circuit_breaker)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every known server, in registration order.
    pub fn servers(&self) -> &[Arc<Server>] {
        &self.servers
    }

    pub fn server(&self, id: &str) -> Option<&Arc<Server>> {
        self.servers.iter().find(|s| s.id == id)
    }

    /// Zones that have at least one registered server.
    pub fn zones(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn zone_snapshot(&self, zone: &str) -> Option<ZoneSnapshot> {
        let servers = self.zones.get(&zone.to_ascii_lowercase())?;
        Some(ZoneSnapshot::collect(servers, &self.circuit_breaker))
    }

    /// Snapshots of every zone, keyed by zone name.
    pub fn zone_snapshots(&self) -> BTreeMap<String, ZoneSnapshot> {
        self.zones
            .iter()
            .map(|(zone, servers)| (zone.clone(), ZoneSnapshot::collect(servers, &self.circuit_breaker)))
            .collect()
    }

    pub fn circuit_breaker(&self) -> &CircuitBreakerConfig {
        &self.circuit_breaker
    }

    pub fn is_circuit_tripped(&self, server: &Server) -> bool {
        server.is_circuit_tripped(&self.circuit_breaker)
    }
}
