use thiserror::Error;

/// The facade's own error type: every component error is folded in here
/// rather than leaking `corestore_*::*Error` at this boundary, matching
/// the "one error type per crate surface" convention the rest of the
/// workspace follows.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)]
    Pipeline(#[from] corestore_engine::PipelineError),

    #[error(transparent)]
    Cluster(#[from] corestore_cluster::ClusterError),

    #[error(transparent)]
    Storage(#[from] corestore_storage::StorageError),

    #[error(transparent)]
    Telemetry(#[from] corestore_telemetry::TelemetryError),

    #[error(transparent)]
    Config(#[from] corestore_config::ConfigError),

    #[error("unknown table {0:?}")]
    UnknownTable(corestore_table::TableId),

    #[error("unknown table name {0:?}")]
    UnknownTableName(String),
}
