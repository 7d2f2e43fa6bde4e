//! Multi-cluster configuration
//!
//! Resolves an opaque cluster ID into the connection and policy profile of
//! one backend cluster.

pub mod record;
pub mod resolver;
pub mod store;

pub use record::{BackendKind, ClusterRecord};
pub use resolver::{ClusterContext, ConfigResolver};
pub use store::{ConfigStore, DEFAULT_CONFIG_PATH};
