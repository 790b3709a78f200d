//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (percentages, thresholds, loads)
//! - Check server addresses parse and identifiers are unique
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RibbonConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RibbonConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("client name must not be empty")]
    EmptyClientName,

    #[error("{field} must be within [0, 1], got {value}")]
    PercentageOutOfRange { field: &'static str, value: f64 },

    #[error("zone_avoidance.triggering_load_per_server must not be negative, got {0}")]
    NegativeTriggeringLoad(f64),

    #[error("circuit_breaker.failure_count_threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("server '{id}' has an invalid address '{address}'")]
    InvalidServerAddress { id: String, address: String },

    #[error("server id '{0}' is defined more than once")]
    DuplicateServerId(String),

    #[error("server address '{0}' is defined more than once")]
    DuplicateServerAddress(String),

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &RibbonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.client.name.trim().is_empty() {
        errors.push(ValidationError::EmptyClientName);
    }

    check_percentage(
        &mut errors,
        "rule.minimal_filtered_percentage",
        config.rule.minimal_filtered_percentage as f64,
    );
    check_percentage(
        &mut errors,
        "zone_avoidance.blackout_percentage",
        config.zone_avoidance.blackout_percentage,
    );

    let load = config.zone_avoidance.triggering_load_per_server;
    if load.is_nan() || load < 0.0 {
        errors.push(ValidationError::NegativeTriggeringLoad(load));
    }

    if config.circuit_breaker.failure_count_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }

    let mut ids = HashSet::new();
    let mut addresses = HashSet::new();
    for server in &config.servers {
        if !ids.insert(server.id.as_str()) {
            errors.push(ValidationError::DuplicateServerId(server.id.clone()));
        }
        match server.address.parse::<SocketAddr>() {
            Ok(addr) => {
                if !addresses.insert(addr) {
                    errors.push(ValidationError::DuplicateServerAddress(server.address.clone()));
                }
            }
            Err(_) => errors.push(ValidationError::InvalidServerAddress {
                id: server.id.clone(),
                address: server.address.clone(),
            }),
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_percentage(errors: &mut Vec<ValidationError>, field: &'static str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ValidationError::PercentageOutOfRange { field, value });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn server(id: &str, address: &str) -> ServerConfig {
        ServerConfig {
            id: id.to_string(),
            address: address.to_string(),
            zone: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RibbonConfig::default()).is_ok());
    }

    #[test]
    fn test_ranges() {
        let mut config = RibbonConfig::default();
        config.rule.minimal_filtered_percentage = 1.5;
        config.zone_avoidance.triggering_load_per_server = -0.1;
        config.circuit_breaker.failure_count_threshold = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::PercentageOutOfRange {
                    field: "rule.minimal_filtered_percentage",
                    value: 1.5,
                },
                ValidationError::NegativeTriggeringLoad(-0.1),
                ValidationError::ZeroFailureThreshold,
            ]
        );
    }

    #[test]
    fn test_duplicate_servers() {
        let mut config = RibbonConfig::default();
        config.servers = vec![
            server("a", "127.0.0.1:80"),
            server("a", "127.0.0.1:81"),
            server("b", "127.0.0.1:80"),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::DuplicateServerId("a".to_string()),
                ValidationError::DuplicateServerAddress("127.0.0.1:80".to_string()),
            ]
        );
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = RibbonConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::InvalidMetricsAddress("nowhere".to_string())]
        );
    }
}
