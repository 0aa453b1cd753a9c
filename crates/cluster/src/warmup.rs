use std::sync::Arc;

use corestore_storage::{SelectItem, StorageTable};
use corestore_table::{Direction, KeyId};
use futures::StreamExt;

/// Streams up to `warmup_batch` rows off the primary index of `table` so a
/// standby can pre-populate its `HandlePool` before it is ever asked to
/// serve a read.
///
/// The caller is responsible for feeding the returned buffers into its own
/// `HandlePool`; this crate has no dependency on `corestore-engine` and so
/// cannot perform that insertion itself.
pub async fn warm_up_rows(
    table: &Arc<dyn StorageTable>,
    warmup_batch: usize,
) -> Result<Vec<Box<[u8]>>, corestore_storage::StorageError> {
    if warmup_batch == 0 {
        return Ok(Vec::new());
    }
    let mut stream = table
        .select(
            true,
            Direction::Next,
            true,
            KeyId::PRIMARY,
            &[],
            None,
            warmup_batch,
        )
        .await?;
    let mut rows = Vec::with_capacity(warmup_batch);
    while let Some(item) = stream.next().await {
        if let SelectItem::Row { row_buf, .. } = item {
            rows.push(row_buf);
        }
    }
    Ok(rows)
}
