use crate::command::{CommitHook, CommitNotice, ModifyFn, Mutation, WriteCacheMode, WriteOutcome};
use crate::error::PipelineError;
use crate::metrics::PipelineMetrics;
use corestore_storage::{StorageTable, WriteOp};
use corestore_table::{Direction, HandlePool, KeyId, RowId, Un};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const RETRY_BASE: Duration = Duration::from_millis(50);
const RETRY_CAP: Duration = Duration::from_secs(10);

enum Command {
    Insert {
        payload: Box<[u8]>,
        respond: oneshot::Sender<Result<WriteOutcome, PipelineError>>,
    },
    Update {
        key: Box<[u8]>,
        payload: Box<[u8]>,
        respond: oneshot::Sender<Result<WriteOutcome, PipelineError>>,
    },
    Tombstone {
        key: Box<[u8]>,
        respond: oneshot::Sender<Result<WriteOutcome, PipelineError>>,
    },
    FindAndModify {
        key_id: KeyId,
        key: Box<[u8]>,
        modify: ModifyFn,
        respond: oneshot::Sender<Result<Option<WriteOutcome>, PipelineError>>,
    },
    Find {
        key_id: KeyId,
        key: Box<[u8]>,
        respond: oneshot::Sender<Result<Option<Box<[u8]>>, PipelineError>>,
    },
    Count {
        key_id: KeyId,
        prefix: Box<[u8]>,
        respond: oneshot::Sender<Result<u64, PipelineError>>,
    },
    Select {
        key_id: KeyId,
        direction: Direction,
        seed: Option<Box<[u8]>>,
        inclusive: bool,
        prefix: Box<[u8]>,
        limit: usize,
        respond: oneshot::Sender<Result<Vec<(Box<[u8]>, Box<[u8]>)>, PipelineError>>,
    },
    Recover {
        un: Un,
        respond: oneshot::Sender<Result<Option<Box<[u8]>>, PipelineError>>,
    },
    /// Fed back into the actor's own queue by a spawned write-back storage
    /// task once it resolves. Carries the `op` that was actually attempted
    /// so a retry reuses it instead of re-deriving it from the row's
    /// current state, which cannot tell an unpersisted `Insert` apart from
    /// an `Update`.
    StorageAck {
        row_id: RowId,
        un: Un,
        op: WriteOp,
        result: Result<(), corestore_storage::StorageError>,
    },
}

/// A handle to a running table's command pipeline. Cloning shares the
/// same underlying actor task; every clone's commands are interleaved
/// FIFO onto the same single-threaded queue.
#[derive(Clone)]
pub struct TableEngine {
    tx: mpsc::UnboundedSender<Command>,
}

impl TableEngine {
    pub fn spawn(
        pool: HandlePool,
        storage: Arc<dyn StorageTable>,
        mode: WriteCacheMode,
        commit_hook: Option<CommitHook>,
    ) -> Self {
        Self::spawn_with_metrics(pool, storage, mode, commit_hook, None)
    }

    pub fn spawn_with_metrics(
        pool: HandlePool,
        storage: Arc<dyn StorageTable>,
        mode: WriteCacheMode,
        commit_hook: Option<CommitHook>,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = Actor {
            pool,
            storage,
            mode,
            commit_hook,
            metrics,
            next_un: Un::ZERO,
            persisted_un: Un::ZERO,
            retries: HashMap::new(),
            self_tx: tx.clone(),
            rx,
        };
        tokio::spawn(actor.run());
        Self { tx }
    }

    pub async fn insert(&self, payload: Box<[u8]>) -> Result<WriteOutcome, PipelineError> {
        let (respond, rx) = oneshot::channel();
        self.send(Command::Insert { payload, respond })?;
        rx.await?
    }

    pub async fn update(&self, key: Box<[u8]>, payload: Box<[u8]>) -> Result<WriteOutcome, PipelineError> {
        let (respond, rx) = oneshot::channel();
        self.send(Command::Update { key, payload, respond })?;
        rx.await?
    }

    pub async fn tombstone(&self, key: Box<[u8]>) -> Result<WriteOutcome, PipelineError> {
        let (respond, rx) = oneshot::channel();
        self.send(Command::Tombstone { key, respond })?;
        rx.await?
    }

    pub async fn find_and_modify(
        &self,
        key_id: KeyId,
        key: Box<[u8]>,
        modify: ModifyFn,
    ) -> Result<Option<WriteOutcome>, PipelineError> {
        let (respond, rx) = oneshot::channel();
        self.send(Command::FindAndModify { key_id, key, modify, respond })?;
        rx.await?
    }

    pub async fn find(&self, key_id: KeyId, key: Box<[u8]>) -> Result<Option<Box<[u8]>>, PipelineError> {
        let (respond, rx) = oneshot::channel();
        self.send(Command::Find { key_id, key, respond })?;
        rx.await?
    }

    pub async fn count(&self, key_id: KeyId, prefix: Box<[u8]>) -> Result<u64, PipelineError> {
        let (respond, rx) = oneshot::channel();
        self.send(Command::Count { key_id, prefix, respond })?;
        rx.await?
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn select(
        &self,
        key_id: KeyId,
        direction: Direction,
        seed: Option<Box<[u8]>>,
        inclusive: bool,
        prefix: Box<[u8]>,
        limit: usize,
    ) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>, PipelineError> {
        let (respond, rx) = oneshot::channel();
        self.send(Command::Select {
            key_id,
            direction,
            seed,
            inclusive,
            prefix,
            limit,
            respond,
        })?;
        rx.await?
    }

    pub async fn recover(&self, un: Un) -> Result<Option<Box<[u8]>>, PipelineError> {
        let (respond, rx) = oneshot::channel();
        self.send(Command::Recover { un, respond })?;
        rx.await?
    }

    fn send(&self, cmd: Command) -> Result<(), PipelineError> {
        self.tx.send(cmd).map_err(|_| PipelineError::EngineGone)
    }
}

struct PendingRetry {
    attempts: u32,
}

struct Actor {
    pool: HandlePool,
    storage: Arc<dyn StorageTable>,
    mode: WriteCacheMode,
    commit_hook: Option<CommitHook>,
    metrics: Option<Arc<PipelineMetrics>>,
    next_un: Un,
    /// Highest `Un` storage has acknowledged (write-back mode only); used
    /// by callers to decide what history can be pruned.
    persisted_un: Un,
    retries: HashMap<RowId, PendingRetry>,
    self_tx: mpsc::UnboundedSender<Command>,
    rx: mpsc::UnboundedReceiver<Command>,
}

/// What's needed to undo a pool mutation that storage subsequently
/// rejected (write-through mode only).
enum Rollback {
    Insert,
    Update { old_payload: Box<[u8]>, old_un: Un },
    Tombstone { old_un: Un },
}

impl Actor {
    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            self.handle(cmd).await;
        }
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Insert { payload, respond } => {
                let result = self.apply_write(Mutation::Insert(payload)).await;
                let _ = respond.send(result);
            }
            Command::Update { key, payload, respond } => {
                let result = self.apply_write_for_key(key, Mutation::Update(payload)).await;
                let _ = respond.send(result);
            }
            Command::Tombstone { key, respond } => {
                let result = self.apply_write_for_key(key, Mutation::Tombstone).await;
                let _ = respond.send(result);
            }
            Command::FindAndModify { key_id, key, modify, respond } => {
                let result = self.find_and_modify(key_id, key, modify).await;
                let _ = respond.send(result);
            }
            Command::Find { key_id, key, respond } => {
                let result = self.find(key_id, &key);
                let _ = respond.send(result);
            }
            Command::Count { key_id, prefix, respond } => {
                let result = self
                    .pool
                    .count(key_id, &prefix)
                    .map_err(PipelineError::from);
                let _ = respond.send(result);
            }
            Command::Select {
                key_id,
                direction,
                seed,
                inclusive,
                prefix,
                limit,
                respond,
            } => {
                let result = self.select(key_id, direction, seed.as_deref(), inclusive, &prefix, limit);
                let _ = respond.send(result);
            }
            Command::Recover { un, respond } => {
                let result = self.storage.recover(un).await.map_err(PipelineError::from);
                let _ = respond.send(result);
            }
            Command::StorageAck { row_id, un, op, result } => {
                self.handle_storage_ack(row_id, un, op, result).await;
            }
        }
    }

    fn find(&self, key_id: KeyId, key: &[u8]) -> Result<Option<Box<[u8]>>, PipelineError> {
        let row_id = self.pool.find(key_id, key)?;
        Ok(row_id.and_then(|id| self.pool.get(id)).map(|row| row.payload.clone()))
    }

    fn select(
        &self,
        key_id: KeyId,
        direction: Direction,
        seed: Option<&[u8]>,
        inclusive: bool,
        prefix: &[u8],
        limit: usize,
    ) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>, PipelineError> {
        let rows = self.pool.select(key_id, direction, seed, inclusive, prefix, limit)?;
        Ok(rows
            .into_iter()
            .filter_map(|(key, row_id)| self.pool.get(row_id).map(|row| (key, row.payload.clone())))
            .collect())
    }

    async fn find_and_modify(
        &mut self,
        key_id: KeyId,
        key: Box<[u8]>,
        modify: ModifyFn,
    ) -> Result<Option<WriteOutcome>, PipelineError> {
        let current = self.find(key_id, &key)?;
        let mutation = match modify(current.as_deref()) {
            Some(m) => m,
            None => return Ok(None),
        };
        if !key_id.is_primary() {
            return Err(PipelineError::InvariantViolation(
                "find_and_modify by secondary key is not supported".into(),
            ));
        }
        let outcome = match &mutation {
            Mutation::Insert(_) => self.apply_write(mutation).await?,
            _ => self.apply_write_for_key(key, mutation).await?,
        };
        Ok(Some(outcome))
    }

    /// Applies an `Update`/`Tombstone` mutation to the row found under
    /// `key` on the primary index. Never called with `Mutation::Insert`
    /// (inserts go through [`Self::apply_write`], which has no existing
    /// row to find).
    async fn apply_write_for_key(&mut self, key: Box<[u8]>, mutation: Mutation) -> Result<WriteOutcome, PipelineError> {
        debug_assert!(!matches!(mutation, Mutation::Insert(_)));
        let row_id = self.pool.find(KeyId::PRIMARY, &key)?.ok_or(PipelineError::RowNotFound)?;
        self.apply_write_to_row(row_id, mutation).await
    }

    async fn apply_write(&mut self, mutation: Mutation) -> Result<WriteOutcome, PipelineError> {
        match mutation {
            Mutation::Insert(payload) => {
                let un = self.next_un;
                let row_id = self.pool.insert(payload.clone(), un)?;
                self.next_un = un.next();
                self.commit(row_id, un, WriteOp::Insert, payload, Rollback::Insert).await
            }
            _ => unreachable!("non-insert mutations must go through apply_write_for_key"),
        }
    }

    async fn apply_write_to_row(&mut self, row_id: RowId, mutation: Mutation) -> Result<WriteOutcome, PipelineError> {
        let old = self.pool.get(row_id).ok_or(PipelineError::RowNotFound)?;
        let old_payload = old.payload.clone();
        let old_un = old.un;
        let un = self.next_un;

        let (op, payload, rollback) = match mutation {
            Mutation::Update(payload) => {
                self.pool.update(row_id, payload.clone(), un)?;
                (WriteOp::Update, payload, Rollback::Update { old_payload, old_un })
            }
            Mutation::Tombstone => {
                self.pool.tombstone(row_id, un)?;
                (WriteOp::Tombstone, old_payload, Rollback::Tombstone { old_un })
            }
            Mutation::Insert(_) => unreachable!("insert targets no existing row"),
        };
        self.next_un = un.next();
        self.commit(row_id, un, op, payload, rollback).await
    }

    async fn commit(
        &mut self,
        row_id: RowId,
        un: Un,
        op: WriteOp,
        payload: Box<[u8]>,
        rollback: Rollback,
    ) -> Result<WriteOutcome, PipelineError> {
        match self.mode {
            WriteCacheMode::WriteThrough => {
                match self.storage.write(payload.clone(), un, op).await {
                    Ok(()) => {
                        if let Some(m) = &self.metrics {
                            m.commits.inc();
                        }
                        self.publish(un, op, payload);
                        Ok(WriteOutcome { row_id, un, op })
                    }
                    Err(e) => {
                        self.undo(row_id, rollback);
                        Err(e.into())
                    }
                }
            }
            WriteCacheMode::WriteBack => {
                self.spawn_storage_write(row_id, payload.clone(), un, op);
                if let Some(m) = &self.metrics {
                    m.commits.inc();
                }
                self.publish(un, op, payload);
                Ok(WriteOutcome { row_id, un, op })
            }
        }
    }

    fn undo(&mut self, row_id: RowId, rollback: Rollback) {
        if let Some(m) = &self.metrics {
            m.write_through_rollbacks.inc();
        }
        let result = match rollback {
            Rollback::Insert => {
                let un = self.pool.get(row_id).map(|r| r.un).unwrap_or(Un::ZERO);
                self.pool.tombstone(row_id, un).and_then(|_| self.pool.purge(row_id))
            }
            Rollback::Update { old_payload, old_un } => self.pool.update(row_id, old_payload, old_un),
            Rollback::Tombstone { old_un } => self.pool.resurrect(row_id, old_un),
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to roll back write-through mutation");
        }
    }

    fn publish(&self, un: Un, op: WriteOp, row_buf: Box<[u8]>) {
        if let Some(hook) = &self.commit_hook {
            hook(CommitNotice { un, op, row_buf });
        }
    }

    fn spawn_storage_write(&self, row_id: RowId, payload: Box<[u8]>, un: Un, op: WriteOp) {
        let storage = self.storage.clone();
        let self_tx = self.self_tx.clone();
        tokio::spawn(async move {
            let result = storage.write(payload, un, op).await;
            let _ = self_tx.send(Command::StorageAck { row_id, un, op, result });
        });
    }

    /// Handle the completion of a write-back storage write. On success,
    /// advances the persisted-`Un` watermark used to decide what can be
    /// pruned. On failure, retries with jittered exponential backoff,
    /// re-reading the row's *current* payload each attempt so a fresh
    /// mutation naturally supersedes a still-pending retry instead of
    /// racing it. The retry reuses the `op` that was actually attempted
    /// rather than re-deriving one from `row.tombstone`, which can't
    /// distinguish a row whose `Insert` never reached storage from one
    /// that has already landed and is merely being updated.
    async fn handle_storage_ack(
        &mut self,
        row_id: RowId,
        un: Un,
        op: WriteOp,
        result: Result<(), corestore_storage::StorageError>,
    ) {
        match result {
            Ok(()) => {
                self.retries.remove(&row_id);
                if un > self.persisted_un {
                    self.persisted_un = un;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, un = un.0, "write-back storage write failed, scheduling retry");
                if let Some(m) = &self.metrics {
                    m.write_back_retries.inc();
                }
                let attempts = self.retries.entry(row_id).or_insert(PendingRetry { attempts: 0 });
                attempts.attempts += 1;
                let backoff = backoff_for(attempts.attempts);

                let Some(row) = self.pool.get(row_id) else {
                    // row was since purged (tombstone fully acknowledged elsewhere); nothing left to retry
                    self.retries.remove(&row_id);
                    return;
                };
                let payload = row.payload.clone();
                let retry_un = row.un;
                let self_tx = self.self_tx.clone();
                let storage = self.storage.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(backoff).await;
                    let result = storage.write(payload, retry_un, op).await;
                    let _ = self_tx.send(Command::StorageAck { row_id, un: retry_un, op, result });
                });
            }
        }
    }
}

fn backoff_for(attempts: u32) -> Duration {
    let capped_shift = attempts.min(8);
    let base = RETRY_BASE.saturating_mul(1u32 << capped_shift);
    let capped = base.min(RETRY_CAP);
    let jitter_ms = rand::thread_rng().gen_range(0..=capped.as_millis() as u64 / 4 + 1);
    capped + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use corestore_storage::{MemStorage, SelectItem, StorageError};
    use futures::stream::BoxStream;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn payload(id: u8, val: u8) -> Box<[u8]> {
        Box::from(&[id, val][..])
    }

    fn engine(storage: Arc<dyn StorageTable>, mode: WriteCacheMode) -> TableEngine {
        let pool = HandlePool::new(Box::new(|p: &[u8]| Box::from(&p[0..1])));
        TableEngine::spawn(pool, storage, mode, None)
    }

    fn mem_storage() -> Arc<MemStorage> {
        Arc::new(MemStorage::new(Box::new(|p: &[u8]| Box::from(&p[0..1]))))
    }

    /// A `StorageTable` that forwards to an inner `MemStorage` but fails its
    /// next `write` once, letting tests exercise rollback and retry without
    /// a real I/O backend.
    struct FlakyStorage {
        inner: Arc<MemStorage>,
        fail_next_write: AtomicBool,
    }

    #[async_trait]
    impl StorageTable for FlakyStorage {
        async fn count(&self, key_id: KeyId, key_prefix: &[u8]) -> Result<u64, StorageError> {
            self.inner.count(key_id, key_prefix).await
        }

        async fn find(&self, key_id: KeyId, key: &[u8]) -> Result<Option<Box<[u8]>>, StorageError> {
            self.inner.find(key_id, key).await
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
            self.inner
                .select(row_mode, direction, inclusive, key_id, key_prefix, seed, limit)
                .await
        }

        async fn recover(&self, un: Un) -> Result<Option<Box<[u8]>>, StorageError> {
            self.inner.recover(un).await
        }

        async fn write(&self, row_buf: Box<[u8]>, un: Un, op: WriteOp) -> Result<(), StorageError> {
            if self.fail_next_write.swap(false, Ordering::SeqCst) {
                return Err(StorageError::Backend("injected failure".into()));
            }
            self.inner.write(row_buf, un, op).await
        }
    }

    #[tokio::test]
    async fn insert_update_tombstone_write_through() {
        let storage = mem_storage();
        let e = engine(storage.clone(), WriteCacheMode::WriteThrough);

        let outcome = e.insert(payload(1, 10)).await.unwrap();
        assert_eq!(outcome.un, Un(0));
        assert_eq!(storage.find(KeyId::PRIMARY, &[1]).await.unwrap().unwrap().as_ref(), &[1, 10]);

        e.update(Box::from(&[1u8][..]), payload(1, 20)).await.unwrap();
        assert_eq!(e.find(KeyId::PRIMARY, Box::from(&[1u8][..])).await.unwrap().unwrap().as_ref(), &[1, 20]);

        e.tombstone(Box::from(&[1u8][..])).await.unwrap();
        assert_eq!(e.find(KeyId::PRIMARY, Box::from(&[1u8][..])).await.unwrap(), None);
        assert_eq!(storage.find(KeyId::PRIMARY, &[1]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn find_and_modify_increments_value() {
        let storage = mem_storage();
        let e = engine(storage, WriteCacheMode::WriteThrough);
        e.insert(payload(1, 10)).await.unwrap();

        let outcome = e
            .find_and_modify(
                KeyId::PRIMARY,
                Box::from(&[1u8][..]),
                Box::new(|current| {
                    let val = current.unwrap()[1];
                    Some(Mutation::Update(payload(1, val + 1)))
                }),
            )
            .await
            .unwrap();
        assert!(outcome.is_some());
        assert_eq!(
            e.find(KeyId::PRIMARY, Box::from(&[1u8][..])).await.unwrap().unwrap().as_ref(),
            &[1, 11]
        );
    }

    #[tokio::test]
    async fn find_and_modify_can_abort_without_writing() {
        let storage = mem_storage();
        let e = engine(storage, WriteCacheMode::WriteThrough);
        e.insert(payload(1, 10)).await.unwrap();

        let outcome = e
            .find_and_modify(KeyId::PRIMARY, Box::from(&[1u8][..]), Box::new(|_| None))
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(
            e.find(KeyId::PRIMARY, Box::from(&[1u8][..])).await.unwrap().unwrap().as_ref(),
            &[1, 10]
        );
    }

    #[tokio::test]
    async fn write_through_rolls_back_on_storage_failure() {
        let mem = mem_storage();
        let flaky: Arc<dyn StorageTable> = Arc::new(FlakyStorage {
            inner: mem.clone(),
            fail_next_write: AtomicBool::new(true),
        });
        let e = engine(flaky, WriteCacheMode::WriteThrough);

        let err = e.insert(payload(1, 10)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
        assert_eq!(e.find(KeyId::PRIMARY, Box::from(&[1u8][..])).await.unwrap(), None);
        assert_eq!(mem.find(KeyId::PRIMARY, &[1]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_through_update_rollback_restores_old_payload() {
        let mem = mem_storage();
        let flaky = Arc::new(FlakyStorage {
            inner: mem.clone(),
            fail_next_write: AtomicBool::new(false),
        });
        let e = engine(flaky.clone(), WriteCacheMode::WriteThrough);
        e.insert(payload(1, 10)).await.unwrap();

        flaky.fail_next_write.store(true, Ordering::SeqCst);
        let err = e.update(Box::from(&[1u8][..]), payload(1, 99)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
        assert_eq!(
            e.find(KeyId::PRIMARY, Box::from(&[1u8][..])).await.unwrap().unwrap().as_ref(),
            &[1, 10]
        );
        assert_eq!(mem.find(KeyId::PRIMARY, &[1]).await.unwrap().unwrap().as_ref(), &[1, 10]);
    }

    #[tokio::test]
    async fn write_back_retries_until_storage_accepts() {
        let mem = mem_storage();
        let flaky: Arc<dyn StorageTable> = Arc::new(FlakyStorage {
            inner: mem.clone(),
            fail_next_write: AtomicBool::new(true),
        });
        let e = engine(flaky, WriteCacheMode::WriteBack);

        let outcome = e.insert(payload(1, 10)).await.unwrap();
        assert_eq!(outcome.un, Un(0));
        // the in-memory pool is updated immediately regardless of storage outcome
        assert_eq!(
            e.find(KeyId::PRIMARY, Box::from(&[1u8][..])).await.unwrap().unwrap().as_ref(),
            &[1, 10]
        );

        // first storage write failed; give the background retry time to land
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(mem.find(KeyId::PRIMARY, &[1]).await.unwrap().unwrap().as_ref(), &[1, 10]);
    }
}
