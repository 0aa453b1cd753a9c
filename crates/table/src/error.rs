use crate::ids::KeyId;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TableError {
    #[error("primary key already exists in table")]
    DuplicatePrimaryKey,

    #[error("row not found")]
    RowNotFound,

    #[error("primary key may not change after insert")]
    PrimaryKeyImmutable,

    #[error("unknown key id {0:?}")]
    UnknownKey(KeyId),
}
