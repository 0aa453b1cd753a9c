use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error(transparent)]
    Record(#[from] corestore_record::RecordError),

    #[error("alert log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt alert index entry at seq_no {seq_no}")]
    Corrupt { seq_no: u64 },
}
