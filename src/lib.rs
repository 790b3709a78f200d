//! Context propagation across executors and predicate based server selection.

pub mod config;
pub mod context;
pub mod executor;
pub mod load_balancer;
pub mod observability;
pub mod predicate;

pub use config::schema::RibbonConfig;
pub use context::{Context, Snapshot};
pub use executor::{Propagator, WorkerPool};
pub use load_balancer::{Balancer, PredicateRule};
pub use predicate::{CompositePredicate, ServerPredicate};
