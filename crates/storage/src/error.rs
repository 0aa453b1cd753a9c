use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O error")]
    Io(#[from] std::io::Error),

    #[error("row not found")]
    NotFound,

    #[error("corrupt storage: {0}")]
    Corrupt(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("unknown key id {0:?}")]
    UnknownKey(corestore_table::KeyId),
}
