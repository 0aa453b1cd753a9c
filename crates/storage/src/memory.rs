use crate::backend::{SelectItem, StorageTable, WriteOp};
use crate::error::StorageError;
use async_trait::async_trait;
use corestore_table::{Direction, Extractor, KeyId, KeyIndex, Un};
use futures::stream::{self, BoxStream};
use parking_lot::Mutex;
use slab::Slab;
use std::collections::BTreeMap;

struct LiveRow {
    un: Un,
    row_buf: Box<[u8]>,
}

struct Inner {
    rows: Slab<LiveRow>,
    indexes: Vec<KeyIndex>,
    /// Immutable snapshot of every committed write, keyed by its `Un`.
    /// `recover` reads from here so it can answer for any `un` that has
    /// not been explicitly compacted, including superseded ones.
    history: BTreeMap<Un, Box<[u8]>>,
    /// primary key -> slab index, so updates/tombstones of a known
    /// primary key can find their live row.
    primary_hash: std::collections::HashMap<Box<[u8]>, usize>,
}

/// The in-memory reference storage adapter, authoritative for tests
/// and used directly in standalone mode.
pub struct MemStorage {
    inner: Mutex<Inner>,
}

impl MemStorage {
    pub fn new(primary_extract: Extractor) -> Self {
        Self {
            inner: Mutex::new(Inner {
                rows: Slab::new(),
                indexes: vec![KeyIndex::new(true, primary_extract)],
                history: BTreeMap::new(),
                primary_hash: std::collections::HashMap::new(),
            }),
        }
    }

    pub fn add_secondary_index(&self, unique: bool, extract: Extractor) -> KeyId {
        let mut inner = self.inner.lock();
        inner.indexes.push(KeyIndex::new(unique, extract));
        KeyId((inner.indexes.len() - 1) as u16)
    }
}

#[async_trait]
impl StorageTable for MemStorage {
    async fn count(&self, key_id: KeyId, key_prefix: &[u8]) -> Result<u64, StorageError> {
        let inner = self.inner.lock();
        let idx = inner
            .indexes
            .get(key_id.0 as usize)
            .ok_or(StorageError::UnknownKey(key_id))?;
        Ok(idx.count_prefix(key_prefix))
    }

    async fn find(&self, key_id: KeyId, key: &[u8]) -> Result<Option<Box<[u8]>>, StorageError> {
        let inner = self.inner.lock();
        let idx = inner
            .indexes
            .get(key_id.0 as usize)
            .ok_or(StorageError::UnknownKey(key_id))?;
        Ok(idx
            .find_first(key)
            .and_then(|row_id| inner.rows.get(row_id.as_u32() as usize))
            .map(|row| row.row_buf.clone()))
    }

    async fn select(
        &self,
        row_mode: bool,
        direction: Direction,
        inclusive: bool,
        key_id: KeyId,
        key_prefix: &[u8],
        seed: Option<&[u8]>,
        limit: usize,
    ) -> Result<BoxStream<'static, SelectItem>, StorageError> {
        let inner = self.inner.lock();
        let idx = inner
            .indexes
            .get(key_id.0 as usize)
            .ok_or(StorageError::UnknownKey(key_id))?;
        let items: Vec<SelectItem> = idx
            .scan(key_prefix, direction, seed, inclusive)
            .take(limit)
            .map(|(key, row_id)| {
                if row_mode {
                    let row_buf = inner
                        .rows
                        .get(row_id.as_u32() as usize)
                        .map(|row| row.row_buf.clone())
                        .unwrap_or_default();
                    SelectItem::Row { key, row_buf }
                } else {
                    SelectItem::Key(key)
                }
            })
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }

    async fn recover(&self, un: Un) -> Result<Option<Box<[u8]>>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner.history.get(&un).cloned())
    }

    async fn write(&self, row_buf: Box<[u8]>, un: Un, op: WriteOp) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.history.insert(un, row_buf.clone());

        let primary_key = (inner.indexes[0].extract)(&row_buf);
        match op {
            WriteOp::Insert => {
                let secondary_keys: Vec<Box<[u8]>> = inner.indexes[1..]
                    .iter()
                    .map(|idx| (idx.extract)(&row_buf))
                    .collect();
                let slab_idx = inner.rows.insert(LiveRow { un, row_buf });
                inner.primary_hash.insert(primary_key.clone(), slab_idx);
                let row_id = corestore_table::RowId::new(slab_idx as u32);
                inner.indexes[0].insert(primary_key, row_id);
                for (idx, key) in inner.indexes[1..].iter_mut().zip(secondary_keys) {
                    idx.insert(key, row_id);
                }
            }
            WriteOp::Update => {
                let slab_idx = *inner.primary_hash.get(primary_key.as_ref()).ok_or_else(|| {
                    tracing::warn!("update for unknown primary key");
                    StorageError::NotFound
                })?;
                let row_id = corestore_table::RowId::new(slab_idx as u32);
                let old_row_buf = inner.rows[slab_idx].row_buf.clone();
                let old_secondary: Vec<Box<[u8]>> = inner.indexes[1..]
                    .iter()
                    .map(|idx| (idx.extract)(&old_row_buf))
                    .collect();
                let new_secondary: Vec<Box<[u8]>> = inner.indexes[1..]
                    .iter()
                    .map(|idx| (idx.extract)(&row_buf))
                    .collect();
                for ((idx, old_key), new_key) in inner.indexes[1..]
                    .iter_mut()
                    .zip(&old_secondary)
                    .zip(&new_secondary)
                {
                    if old_key != new_key {
                        idx.remove(old_key, row_id);
                        idx.insert(new_key.clone(), row_id);
                    }
                }
                inner.rows[slab_idx] = LiveRow { un, row_buf };
            }
            WriteOp::Tombstone => {
                let slab_idx = inner.primary_hash.remove(primary_key.as_ref()).ok_or_else(|| {
                    tracing::warn!("tombstone for unknown primary key");
                    StorageError::NotFound
                })?;
                let row_id = corestore_table::RowId::new(slab_idx as u32);
                let old_row_buf = inner.rows[slab_idx].row_buf.clone();
                inner.indexes[0].remove(&primary_key, row_id);
                for idx in inner.indexes[1..].iter_mut() {
                    let key = (idx.extract)(&old_row_buf);
                    idx.remove(&key, row_id);
                }
                inner.rows.remove(slab_idx);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn storage() -> MemStorage {
        let storage = MemStorage::new(Box::new(|p: &[u8]| Box::from(&p[0..1])));
        storage.add_secondary_index(false, Box::new(|p: &[u8]| Box::from(&p[1..2])));
        storage
    }

    #[tokio::test]
    async fn write_find_count() {
        let storage = storage();
        storage.write(Box::from(&[0u8, 9][..]), Un(1), WriteOp::Insert).await.unwrap();
        storage.write(Box::from(&[1u8, 9][..]), Un(2), WriteOp::Insert).await.unwrap();

        assert_eq!(storage.find(KeyId::PRIMARY, &[0]).await.unwrap().unwrap().as_ref(), &[0u8, 9]);
        assert_eq!(storage.count(KeyId(1), &[9]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn recover_answers_for_superseded_un() {
        let storage = storage();
        storage.write(Box::from(&[0u8, 9][..]), Un(1), WriteOp::Insert).await.unwrap();
        storage.write(Box::from(&[0u8, 8][..]), Un(2), WriteOp::Update).await.unwrap();

        assert_eq!(storage.recover(Un(1)).await.unwrap().unwrap().as_ref(), &[0u8, 9]);
        assert_eq!(storage.recover(Un(2)).await.unwrap().unwrap().as_ref(), &[0u8, 8]);
        assert_eq!(storage.find(KeyId::PRIMARY, &[0]).await.unwrap().unwrap().as_ref(), &[0u8, 8]);
    }

    #[tokio::test]
    async fn tombstone_removes_from_indexes() {
        let storage = storage();
        storage.write(Box::from(&[0u8, 9][..]), Un(1), WriteOp::Insert).await.unwrap();
        storage.write(Box::from(&[0u8, 9][..]), Un(2), WriteOp::Tombstone).await.unwrap();

        assert_eq!(storage.find(KeyId::PRIMARY, &[0]).await.unwrap(), None);
        assert_eq!(storage.count(KeyId(1), &[9]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn select_key_mode_yields_keys_only() {
        let storage = storage();
        storage.write(Box::from(&[0u8, 9][..]), Un(1), WriteOp::Insert).await.unwrap();

        let mut stream = storage
            .select(false, Direction::Next, true, KeyId::PRIMARY, &[], None, 10)
            .await
            .unwrap();
        match stream.next().await.unwrap() {
            SelectItem::Key(k) => assert_eq!(k.as_ref(), &[0u8]),
            SelectItem::Row { .. } => panic!("expected key-only mode"),
        }
    }
}
