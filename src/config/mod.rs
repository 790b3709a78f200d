//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RibbonConfig (validated, immutable)
//!     → load_balancer builds stats and the predicate rule from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new RibbonConfig sent over a channel
//!     → Balancer::watch / Balancer::apply_config swaps stats and rule together
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_config_str, ConfigError};
pub use schema::AvailabilityConfig;
pub use schema::CircuitBreakerConfig;
pub use schema::ClientConfig;
pub use schema::ObservabilityConfig;
pub use schema::RibbonConfig;
pub use schema::RuleConfig;
pub use schema::SelectionStrategy;
pub use schema::ServerConfig;
pub use schema::ZoneAvoidanceConfig;
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
