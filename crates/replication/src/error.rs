use corestore_table::TableId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplicationError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("gap detected on table {table_id:?}: expected {expected:?}, got {got:?}")]
    GapDetected {
        table_id: TableId,
        expected: corestore_table::Un,
        got: corestore_table::Un,
    },

    #[error("peer disconnected")]
    PeerDisconnected,

    #[error(transparent)]
    Record(#[from] corestore_record::RecordError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
