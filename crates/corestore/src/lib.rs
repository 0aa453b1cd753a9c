//! The facade crate: wires `corestore-table`, `corestore-storage`,
//! `corestore-engine`, `corestore-replication`, `corestore-cluster`,
//! `corestore-telemetry`, `corestore-orders`, and `corestore-config`
//! together into a single [`Node`], and backs the `corestore-dump`
//! reference binary that drives the record codec and alert file format.

mod config;
mod error;
mod node;

pub use config::{load_node_config, NodeConfig, TableSpec};
pub use error::NodeError;
pub use node::Node;
