//! Zone affinity matching.

use std::fmt;

use crate::load_balancer::server::Server;

/// Accepts servers located in a given zone.
///
/// Zones compare ASCII case-insensitively; a server without a zone never
/// matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneAffinityPredicate {
    zone: String,
}

impl ZoneAffinityPredicate {
    pub fn new(zone: &str) -> Self {
        Self {
            zone: zone.to_ascii_lowercase(),
        }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn apply(&self, server: &Server) -> bool {
        server.zone() == Some(self.zone.as_str())
    }
}

impl fmt::Display for ZoneAffinityPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone affinity({})", self.zone)
    }
}
