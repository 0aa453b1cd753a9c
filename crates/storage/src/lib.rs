//! The abstract storage-table contract, an in-memory reference
//! implementation, and a deterministic test double.
//!
//! `corestore-engine`'s command pipeline drives a `dyn StorageTable` per
//! table alongside its `corestore-table::HandlePool`; the two are kept in
//! sync by the pipeline, not by this crate.

mod backend;
mod error;
mod memory;
mod mock;

pub use backend::{SelectItem, StorageTable, WriteOp};
pub use error::StorageError;
pub use memory::MemStorage;
pub use mock::MockStorage;
