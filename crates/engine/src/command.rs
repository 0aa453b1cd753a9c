use corestore_storage::WriteOp;
use corestore_table::{RowId, Un};
use std::sync::Arc;

/// Outcome of a committed write, handed back to the caller and to the
/// commit hook (see [`crate::CommitHook`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub row_id: RowId,
    pub un: Un,
    pub op: WriteOp,
}

/// A find-and-modify callback: given the row's current payload (`None` if
/// it doesn't exist), return the mutation to apply, or `None` to abort
/// without writing. Runs to completion before the pipeline dequeues its
/// next command, which is what gives find-and-modify its "locked for the
/// duration of the callback" semantics.
pub type ModifyFn = Box<dyn FnOnce(Option<&[u8]>) -> Option<Mutation> + Send>;

#[derive(Debug, Clone)]
pub enum Mutation {
    Insert(Box<[u8]>),
    Update(Box<[u8]>),
    Tombstone,
}

/// Published once a write is committed: immediately after the in-memory
/// mutation in write-back mode, or after the storage acknowledgement in
/// write-through mode. `corestore-replication` subscribes to this to
/// stream appends to standbys.
#[derive(Debug, Clone)]
pub struct CommitNotice {
    pub un: Un,
    pub op: WriteOp,
    pub row_buf: Box<[u8]>,
}

pub type CommitHook = Arc<dyn Fn(CommitNotice) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCacheMode {
    WriteThrough,
    WriteBack,
}
