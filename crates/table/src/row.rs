use crate::ids::Un;

/// A single row's storage: its current payload, update number, and the
/// bookkeeping needed by the write-back cache policy.
///
/// Rows are allocated from a [`slab::Slab`] (see [`crate::pool::HandlePool`])
/// and referenced by the stable [`crate::ids::RowId`] the slab assigns;
/// nothing outside the owning table ever holds a `Row` directly.
#[derive(Debug, Clone)]
pub struct Row {
    pub un: Un,
    pub payload: Box<[u8]>,
    /// Set once the row has been deleted. The row remains in the slab,
    /// unindexed, until [`crate::pool::HandlePool::purge`] is called once
    /// all replicas have acknowledged the tombstoning `Un`.
    pub tombstone: bool,
    /// True if `payload` has not yet been acknowledged by storage
    /// (write-back cache policy only).
    pub dirty: bool,
    /// Number of outstanding references (pins). A dirty row is not evicted
    /// while pinned; an unpinned, non-dirty row is eligible for eviction.
    pub pins: u32,
}

impl Row {
    pub fn new(payload: Box<[u8]>, un: Un) -> Self {
        Self {
            un,
            payload,
            tombstone: false,
            dirty: false,
            pins: 0,
        }
    }

    pub fn evictable(&self) -> bool {
        !self.dirty && self.pins == 0
    }
}
