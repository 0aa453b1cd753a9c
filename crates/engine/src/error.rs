use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] corestore_storage::StorageError),

    #[error(transparent)]
    Table(#[from] corestore_table::TableError),

    #[error("row not found")]
    RowNotFound,

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("table engine task is gone")]
    EngineGone,
}

impl From<tokio::sync::oneshot::error::RecvError> for PipelineError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        PipelineError::EngineGone
    }
}
