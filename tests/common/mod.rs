//! Shared utilities for integration tests.

use std::sync::Arc;
use std::time::Duration;

use ribbon_propagator::config::{RibbonConfig, ServerConfig};
use ribbon_propagator::context::Context;
use ribbon_propagator::load_balancer::Server;
use tokio::time;

/// Build a server on localhost.
#[allow(dead_code)]
pub fn server(id: &str, port: u16, zone: Option<&str>) -> Arc<Server> {
    Arc::new(Server::new(id, format!("127.0.0.1:{}", port).parse().unwrap(), zone))
}

/// Trip the circuit breaker of `server` under default settings.
#[allow(dead_code)]
pub fn trip(server: &Server) {
    for _ in 0..3 {
        server.record_failure();
    }
}

#[allow(dead_code)]
pub fn ids(servers: &[Arc<Server>]) -> Vec<&str> {
    servers.iter().map(|s| s.id.as_str()).collect()
}

/// A client config in `zone` with `(id, port, zone)` servers.
#[allow(dead_code)]
pub fn client_config(zone: Option<&str>, servers: &[(&str, u16, &str)]) -> RibbonConfig {
    let mut config = RibbonConfig::default();
    config.client.name = "orders".to_string();
    config.client.zone = zone.map(str::to_string);
    config.servers = servers
        .iter()
        .map(|(id, port, zone)| ServerConfig {
            id: id.to_string(),
            address: format!("127.0.0.1:{}", port),
            zone: Some(zone.to_string()),
        })
        .collect();
    config
}

#[allow(dead_code)]
pub fn context(entries: &[(&str, &str)]) -> Context {
    entries.iter().copied().collect()
}

/// Poll `condition` until it holds, failing after five seconds.
#[allow(dead_code)]
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(time::Instant::now() < deadline, "condition not reached in time");
        time::sleep(Duration::from_millis(5)).await;
    }
}
