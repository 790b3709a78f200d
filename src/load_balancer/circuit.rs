//! Circuit breaker blackout with exponential growth.

use std::time::Duration;

use crate::config::CircuitBreakerConfig;

/// Blackout period for a server with `failures` consecutive connection
/// failures, or `None` while the circuit is closed.
pub fn blackout_duration(failures: usize, config: &CircuitBreakerConfig) -> Option<Duration> {
    if failures < config.failure_count_threshold {
        return None;
    }

    let exponent = (failures - config.failure_count_threshold).min(16) as u32;
    let blackout_secs = config
        .tripped_timeout_factor_secs
        .saturating_mul(1u64 << exponent)
        .min(config.max_tripped_timeout_secs);

    if blackout_secs == 0 {
        return None;
    }
    Some(Duration::from_secs(blackout_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blackout_calculation() {
        let config = CircuitBreakerConfig::default();

        assert_eq!(blackout_duration(2, &config), None);
        assert_eq!(blackout_duration(3, &config), Some(Duration::from_secs(10)));
        assert_eq!(blackout_duration(4, &config), Some(Duration::from_secs(20)));

        let max = blackout_duration(40, &config);
        assert_eq!(max, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_factor_disables_breaker() {
        let config = CircuitBreakerConfig {
            tripped_timeout_factor_secs: 0,
            ..CircuitBreakerConfig::default()
        };
        assert_eq!(blackout_duration(10, &config), None);
    }
}
