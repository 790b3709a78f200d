//! Server abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server and its zone
//! - Track active requests (for availability filtering and zone load)
//! - Track consecutive connection failures (for the circuit breaker)
//! - Track liveness reported by the surrounding health checker

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;
use crate::load_balancer::circuit::blackout_duration;

/// A single upstream server.
#[derive(Debug)]
pub struct Server {
    /// Unique identifier.
    pub id: String,
    /// The address of the server.
    pub addr: SocketAddr,
    /// Zone, lower-cased.
    zone: Option<String>,
    /// Whether the health checker considers the server up.
    alive: AtomicBool,
    /// Number of requests currently in flight.
    active_requests: AtomicUsize,
    /// Consecutive connection failure count.
    consecutive_failures: AtomicUsize,
    /// Last connection failure as millis since `created` (+1), 0 when none.
    last_failure: AtomicU64,
    created: Instant,
}

impl Server {
    /// Create a new server.
    pub fn new(id: impl Into<String>, addr: SocketAddr, zone: Option<&str>) -> Self {
        Self {
            id: id.into(),
            addr,
            zone: zone.map(str::to_ascii_lowercase),
            alive: AtomicBool::new(true),
            active_requests: AtomicUsize::new(0),
            consecutive_failures: AtomicUsize::new(0),
            last_failure: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Record the health checker's verdict.
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Relaxed);
    }

    /// Get the current number of active requests.
    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::Relaxed)
    }

    /// Increment active request count.
    pub fn inc_active_requests(&self) {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement active request count.
    pub fn dec_active_requests(&self) {
        let _ = self
            .active_requests
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Count a request as active until the returned guard is dropped.
    pub fn start_request(self: &Arc<Self>) -> ActiveRequestGuard {
        self.inc_active_requests();
        ActiveRequestGuard {
            server: self.clone(),
        }
    }

    // --- Circuit breaker ---

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Report a successful connection. Resets the failure streak.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// Report a failed connection.
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub fn record_failure_at(&self, at: Instant) {
        let offset = at.saturating_duration_since(self.created).as_millis() as u64;
        self.last_failure.store(offset + 1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Instant of the last recorded connection failure.
    pub fn last_failure(&self) -> Option<Instant> {
        match self.last_failure.load(Ordering::Relaxed) {
            0 => None,
            offset => Some(self.created + Duration::from_millis(offset - 1)),
        }
    }

    /// Instant until which the circuit stays tripped, if it is tripped at all.
    pub fn circuit_open_until(&self, config: &CircuitBreakerConfig) -> Option<Instant> {
        let blackout = blackout_duration(self.consecutive_failures(), config)?;
        self.last_failure().map(|at| at + blackout)
    }

    pub fn is_circuit_tripped(&self, config: &CircuitBreakerConfig) -> bool {
        self.is_circuit_tripped_at(config, Instant::now())
    }

    pub fn is_circuit_tripped_at(&self, config: &CircuitBreakerConfig, now: Instant) -> bool {
        self.circuit_open_until(config)
            .is_some_and(|until| until > now)
    }
}

/// A RAII guard that manages the active request count.
#[derive(Debug)]
pub struct ActiveRequestGuard {
    pub server: Arc<Server>,
}

impl Deref for ActiveRequestGuard {
    type Target = Server;
    fn deref(&self) -> &Self::Target {
        &self.server
    }
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        self.server.dec_active_requests();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> Arc<Server> {
        Arc::new(Server::new("s1", "127.0.0.1:8080".parse().unwrap(), Some("EU-West-1a")))
    }

    #[test]
    fn test_zone_is_lowercased() {
        assert_eq!(server().zone(), Some("eu-west-1a"));
    }

    #[test]
    fn test_request_guard() {
        let s = server();
        {
            let _g1 = s.start_request();
            let _g2 = s.start_request();
            assert_eq!(s.active_requests(), 2);
        }
        assert_eq!(s.active_requests(), 0);

        s.dec_active_requests();
        assert_eq!(s.active_requests(), 0);
    }

    #[test]
    fn test_circuit_trips_after_threshold() {
        let s = server();
        let config = CircuitBreakerConfig::default();
        let now = Instant::now();

        s.record_failure_at(now);
        s.record_failure_at(now);
        assert!(!s.is_circuit_tripped_at(&config, now));

        s.record_failure_at(now);
        assert!(s.is_circuit_tripped_at(&config, now + Duration::from_secs(5)));
        assert!(!s.is_circuit_tripped_at(&config, now + Duration::from_secs(11)));
    }

    #[test]
    fn test_success_resets_circuit() {
        let s = server();
        let config = CircuitBreakerConfig::default();
        for _ in 0..5 {
            s.record_failure();
        }
        assert!(s.is_circuit_tripped(&config));

        s.record_success();
        assert_eq!(s.consecutive_failures(), 0);
        assert!(!s.is_circuit_tripped(&config));
    }
}
