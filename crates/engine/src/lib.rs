//! The per-table command pipeline.
//!
//! A [`pipeline::TableEngine`] owns one table's [`corestore_table::HandlePool`]
//! and its [`corestore_storage::StorageTable`] adapter behind a single actor
//! task, serializing every read and write through one `mpsc` queue so that
//! find-and-modify, UN allocation, and write-through/write-back commit all
//! see a consistent view with no locking.

mod command;
mod error;
mod metrics;
mod pipeline;

pub use command::{CommitHook, CommitNotice, ModifyFn, Mutation, WriteCacheMode, WriteOutcome};
pub use error::PipelineError;
pub use metrics::PipelineMetrics;
pub use pipeline::TableEngine;
