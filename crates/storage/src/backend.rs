use crate::error::StorageError;
use async_trait::async_trait;
use corestore_table::{Direction, KeyId, Un};
use futures::stream::BoxStream;

/// What a committed `write` did to the row, so the backend's own indexes
/// can be kept consistent without re-deriving it from the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Insert,
    Update,
    Tombstone,
}

/// One result from a [`StorageTable::select`] scan: either the full row
/// buffer, or just the key it was found under when `row_mode = false`
/// (used to scan keys without materializing rows).
#[derive(Debug, Clone)]
pub enum SelectItem {
    Row { key: Box<[u8]>, row_buf: Box<[u8]> },
    Key(Box<[u8]>),
}

/// The abstract table contract a storage adapter must implement.
///
/// Implementations choose whether each operation executes inline or is
/// deferred, but per-table ordering is always FIFO: `count`/`select`/
/// `find`/`recover` observe every `write` whose completion has already
/// fired.
#[async_trait]
pub trait StorageTable: Send + Sync {
    async fn count(&self, key_id: KeyId, key_prefix: &[u8]) -> Result<u64, StorageError>;

    async fn find(&self, key_id: KeyId, key: &[u8]) -> Result<Option<Box<[u8]>>, StorageError>;

    /// `inclusive = false` skips `seed`; `direction = Next` ascends,
    /// `Prev` descends. `row_mode = false` yields only the indexed key.
    async fn select(
        &self,
        row_mode: bool,
        direction: Direction,
        inclusive: bool,
        key_id: KeyId,
        key_prefix: &[u8],
        seed: Option<&[u8]>,
        limit: usize,
    ) -> Result<BoxStream<'static, SelectItem>, StorageError>;

    /// The row associated with exactly `un`, or `None` if that `un` has
    /// since been compacted away.
    async fn recover(&self, un: Un) -> Result<Option<Box<[u8]>>, StorageError>;

    /// Durably commit `row_buf` as `op` stamped with `un`. Returns once
    /// the write is durable (when durability is enabled by the caller).
    async fn write(&self, row_buf: Box<[u8]>, un: Un, op: WriteOp) -> Result<(), StorageError>;
}
