//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{server::Server, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through the eligible servers.
///
/// Servers reaching this point have already been filtered by the predicate
/// chain, so no health check is repeated here.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, servers: &[Arc<Server>]) -> Option<Arc<Server>> {
        if servers.is_empty() {
            return None;
        }

        let index = self.counter.fetch_add(1, Ordering::Relaxed) % servers.len();
        Some(servers[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let s1 = Arc::new(Server::new("a", "127.0.0.1:8080".parse().unwrap(), None));
        let s2 = Arc::new(Server::new("b", "127.0.0.1:8081".parse().unwrap(), None));
        let servers = vec![s1.clone(), s2.clone()];

        assert_eq!(lb.next_server(&servers).unwrap().addr, s1.addr);
        assert_eq!(lb.next_server(&servers).unwrap().addr, s2.addr);
        assert_eq!(lb.next_server(&servers).unwrap().addr, s1.addr);
    }

    #[test]
    fn test_shrinking_list_stays_in_bounds() {
        let lb = RoundRobin::new();
        let servers: Vec<_> = (0..3)
            .map(|i| Arc::new(Server::new(format!("s{}", i), format!("127.0.0.1:{}", 8000 + i).parse().unwrap(), None)))
            .collect();

        for _ in 0..5 {
            lb.next_server(&servers).unwrap();
        }
        assert!(lb.next_server(&servers[..1]).is_some());
        assert!(lb.next_server(&[]).is_none());
    }
}
