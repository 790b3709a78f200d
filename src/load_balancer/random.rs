//! Random load balancing strategy.

use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::load_balancer::{server::Server, LoadBalancer};

/// Uniformly random selector.
#[derive(Debug, Default)]
pub struct RandomChoice;

impl RandomChoice {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RandomChoice {
    fn next_server(&self, servers: &[Arc<Server>]) -> Option<Arc<Server>> {
        servers.choose(&mut rand::thread_rng()).cloned()
    }
}
