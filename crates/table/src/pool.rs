use crate::error::TableError;
use crate::ids::{KeyId, RowId, Un};
use crate::index::{Direction, Extractor, KeyIndex};
use crate::metrics::TableMetrics;
use crate::row::Row;
use hashbrown::HashMap;
use slab::Slab;

/// Owns every row in one table, plus the primary and secondary indexes over
/// them.
///
/// Concurrency: a `HandlePool` is only ever touched from the one command
/// task that owns the table, so nothing in here is internally synchronized.
pub struct HandlePool {
    rows: Slab<Row>,
    /// O(1) primary-key lookup, mirroring `indexes[0]`'s ordered tree.
    primary_hash: HashMap<Box<[u8]>, RowId>,
    /// `indexes[0]` is always the primary key; `indexes[1..]` are secondary
    /// keys in declaration order, addressed by `KeyId(1..)`.
    indexes: Vec<KeyIndex>,
    pub metrics: TableMetrics,
}

impl HandlePool {
    pub fn new(primary_extract: Extractor) -> Self {
        Self {
            rows: Slab::new(),
            primary_hash: HashMap::new(),
            indexes: vec![KeyIndex::new(true, primary_extract)],
            metrics: TableMetrics::unregistered(),
        }
    }

    /// Declare a secondary index, returning the [`KeyId`] it is addressed
    /// by in future `find`/`count`/`select` calls.
    pub fn add_secondary_index(&mut self, unique: bool, extract: Extractor) -> KeyId {
        self.indexes.push(KeyIndex::new(unique, extract));
        KeyId((self.indexes.len() - 1) as u16)
    }

    fn index(&self, key_id: KeyId) -> Result<&KeyIndex, TableError> {
        self.indexes
            .get(key_id.0 as usize)
            .ok_or(TableError::UnknownKey(key_id))
    }

    fn primary_key_of(&self, payload: &[u8]) -> Box<[u8]> {
        (self.indexes[0].extract)(payload)
    }

    /// Extract the primary key `payload` would be stored under, without
    /// touching the pool. Used by callers (e.g. the command pipeline)
    /// that need to key their own bookkeeping by primary key.
    pub fn primary_key(&self, payload: &[u8]) -> Box<[u8]> {
        self.primary_key_of(payload)
    }

    /// Insert `payload` as a new row stamped with `un`.
    pub fn insert(&mut self, payload: Box<[u8]>, un: Un) -> Result<RowId, TableError> {
        let primary_key = self.primary_key_of(&payload);
        if self.primary_hash.contains_key(&primary_key) {
            return Err(TableError::DuplicatePrimaryKey);
        }
        let secondary_keys: Vec<Box<[u8]>> = self.indexes[1..]
            .iter()
            .map(|idx| (idx.extract)(&payload))
            .collect();

        let row_id = RowId(self.rows.insert(Row::new(payload, un)) as u32);
        self.primary_hash.insert(primary_key.clone(), row_id);
        self.indexes[0].insert(primary_key, row_id);
        for (idx, key) in self.indexes[1..].iter_mut().zip(secondary_keys) {
            idx.insert(key, row_id);
        }
        self.metrics.row_count.inc();
        Ok(row_id)
    }

    pub fn get(&self, row_id: RowId) -> Option<&Row> {
        self.rows.get(row_id.0 as usize)
    }

    pub fn find(&self, key_id: KeyId, key: &[u8]) -> Result<Option<RowId>, TableError> {
        Ok(self.index(key_id)?.find_first(key))
    }

    pub fn count(&self, key_id: KeyId, key_prefix: &[u8]) -> Result<u64, TableError> {
        Ok(self.index(key_id)?.count_prefix(key_prefix))
    }

    /// Ordered scan over `key_id`, see [`crate::index::KeyIndex::scan`].
    pub fn select<'a>(
        &'a self,
        key_id: KeyId,
        direction: Direction,
        seed: Option<&[u8]>,
        inclusive: bool,
        key_prefix: &[u8],
        limit: usize,
    ) -> Result<Vec<(Box<[u8]>, RowId)>, TableError> {
        Ok(self
            .index(key_id)?
            .scan(key_prefix, direction, seed, inclusive)
            .take(limit)
            .collect())
    }

    /// Replace `row_id`'s payload with `new_payload`, stamped with `un`.
    /// The primary key extracted from `new_payload` must be unchanged.
    pub fn update(&mut self, row_id: RowId, new_payload: Box<[u8]>, un: Un) -> Result<(), TableError> {
        let new_primary = self.primary_key_of(&new_payload);
        let old_payload = self.rows.get(row_id.0 as usize).ok_or(TableError::RowNotFound)?.payload.clone();
        let old_primary = self.primary_key_of(&old_payload);
        if new_primary != old_primary {
            return Err(TableError::PrimaryKeyImmutable);
        }

        let new_secondary: Vec<Box<[u8]>> = self.indexes[1..]
            .iter()
            .map(|idx| (idx.extract)(&new_payload))
            .collect();
        let old_secondary: Vec<Box<[u8]>> = self.indexes[1..]
            .iter()
            .map(|idx| (idx.extract)(&old_payload))
            .collect();

        for ((idx, old_key), new_key) in self.indexes[1..].iter_mut().zip(&old_secondary).zip(&new_secondary) {
            if old_key != new_key {
                idx.remove(old_key, row_id);
                idx.insert(new_key.clone(), row_id);
            }
        }

        let row = self.rows.get_mut(row_id.0 as usize).ok_or(TableError::RowNotFound)?;
        row.payload = new_payload;
        row.un = un;
        Ok(())
    }

    /// Mark `row_id` as deleted, unlinking it from every index. The row
    /// slot itself is retained until [`Self::purge`] is called.
    pub fn tombstone(&mut self, row_id: RowId, un: Un) -> Result<(), TableError> {
        let payload = self.rows.get(row_id.0 as usize).ok_or(TableError::RowNotFound)?.payload.clone();
        let primary = self.primary_key_of(&payload);
        self.primary_hash.remove(&primary);
        self.indexes[0].remove(&primary, row_id);
        for idx in self.indexes[1..].iter_mut() {
            let key = (idx.extract)(&payload);
            idx.remove(&key, row_id);
        }
        let row = self.rows.get_mut(row_id.0 as usize).ok_or(TableError::RowNotFound)?;
        row.tombstone = true;
        row.un = un;
        self.metrics.row_count.dec();
        self.metrics.tombstone_count.inc();
        Ok(())
    }

    /// Undo a [`Self::tombstone`] that has not yet been followed by
    /// [`Self::purge`], relinking the row into every index under its
    /// existing payload. Used by the command pipeline to roll back a
    /// write-through tombstone that storage rejected.
    pub fn resurrect(&mut self, row_id: RowId, un: Un) -> Result<(), TableError> {
        let payload = self.rows.get(row_id.0 as usize).ok_or(TableError::RowNotFound)?.payload.clone();
        let primary = self.primary_key_of(&payload);
        self.primary_hash.insert(primary.clone(), row_id);
        self.indexes[0].insert(primary, row_id);
        for idx in self.indexes[1..].iter_mut() {
            let key = (idx.extract)(&payload);
            idx.insert(key, row_id);
        }
        let row = self.rows.get_mut(row_id.0 as usize).ok_or(TableError::RowNotFound)?;
        row.tombstone = false;
        row.un = un;
        self.metrics.row_count.inc();
        self.metrics.tombstone_count.dec();
        Ok(())
    }

    /// Free a tombstoned row's slot once every replica has acknowledged the
    /// `Un` that tombstoned it.
    pub fn purge(&mut self, row_id: RowId) -> Result<(), TableError> {
        let row = self.rows.try_remove(row_id.0 as usize).ok_or(TableError::RowNotFound)?;
        debug_assert!(row.tombstone, "purged a row that was never tombstoned");
        self.metrics.tombstone_count.dec();
        Ok(())
    }

    pub fn pin(&mut self, row_id: RowId) {
        if let Some(row) = self.rows.get_mut(row_id.0 as usize) {
            row.pins += 1;
        }
    }

    pub fn unpin(&mut self, row_id: RowId) {
        if let Some(row) = self.rows.get_mut(row_id.0 as usize) {
            row.pins = row.pins.saturating_sub(1);
        }
    }

    pub fn len(&self) -> usize {
        self.primary_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> HandlePool {
        // payload layout for tests: [orderID:u8][link:4 bytes ascii][seqNo:u8]
        let mut pool = HandlePool::new(Box::new(|p: &[u8]| Box::from(&p[0..1])));
        pool.add_secondary_index(false, Box::new(|p: &[u8]| Box::from(&p[1..5])));
        pool.add_secondary_index(false, Box::new(|p: &[u8]| Box::from(&p[1..6])));
        pool
    }

    fn row(order_id: u8, link: &[u8; 4], seq_no: u8) -> Box<[u8]> {
        let mut v = vec![order_id];
        v.extend_from_slice(link);
        v.push(seq_no);
        v.into_boxed_slice()
    }

    #[test]
    fn insert_find_select() {
        let mut pool = pool();
        pool.insert(row(0, b"FIX0", 0), Un(1)).unwrap();
        pool.insert(row(1, b"FIX0", 2), Un(2)).unwrap();
        pool.insert(row(2, b"FIX0", 4), Un(3)).unwrap();

        let found = pool.find(KeyId::PRIMARY, &[1]).unwrap().unwrap();
        assert_eq!(pool.get(found).unwrap().payload[0], 1);

        let results = pool
            .select(KeyId(2), Direction::Prev, None, true, b"FIX0", 1)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.as_ref(), row(2, b"FIX0", 4)[1..6].to_vec().as_slice());
    }

    #[test]
    fn duplicate_primary_key_rejected() {
        let mut pool = pool();
        pool.insert(row(0, b"FIX0", 0), Un(1)).unwrap();
        assert_eq!(pool.insert(row(0, b"FIX1", 9), Un(2)), Err(TableError::DuplicatePrimaryKey));
    }

    #[test]
    fn tombstone_then_purge() {
        let mut pool = pool();
        let id = pool.insert(row(0, b"FIX0", 0), Un(1)).unwrap();
        pool.tombstone(id, Un(2)).unwrap();
        assert_eq!(pool.find(KeyId::PRIMARY, &[0]).unwrap(), None);
        assert!(pool.get(id).unwrap().tombstone);
        pool.purge(id).unwrap();
        assert!(pool.get(id).is_none());
    }

    #[test]
    fn update_rejects_primary_key_change() {
        let mut pool = pool();
        let id = pool.insert(row(0, b"FIX0", 0), Un(1)).unwrap();
        let err = pool.update(id, row(1, b"FIX0", 0), Un(2)).unwrap_err();
        assert_eq!(err, TableError::PrimaryKeyImmutable);
    }

    #[test]
    fn count_prefix() {
        let mut pool = pool();
        pool.insert(row(0, b"FIX0", 0), Un(1)).unwrap();
        pool.insert(row(1, b"FIX0", 2), Un(2)).unwrap();
        pool.insert(row(2, b"FIX1", 0), Un(3)).unwrap();
        assert_eq!(pool.count(KeyId(1), b"FIX0").unwrap(), 2);
    }

    #[test]
    fn resurrect_undoes_tombstone() {
        let mut pool = pool();
        let id = pool.insert(row(0, b"FIX0", 0), Un(1)).unwrap();
        pool.tombstone(id, Un(2)).unwrap();
        pool.resurrect(id, Un(1)).unwrap();
        assert_eq!(pool.find(KeyId::PRIMARY, &[0]).unwrap(), Some(id));
        assert!(!pool.get(id).unwrap().tombstone);
        assert_eq!(pool.count(KeyId(1), b"FIX0").unwrap(), 1);
    }
}
