//! [`Node`]: wires one [`TableEngine`] per configured table, the cluster
//! controller, and the alert pipeline into the single facade a standalone
//! process or `corestore-dump` links against. No module below this one
//! knows about any of the others — `Node` is where their wiring lives.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use corestore_cluster::{warm_up_rows, ClusterController};
use corestore_engine::{PipelineMetrics, TableEngine, WriteCacheMode, WriteOutcome};
use corestore_storage::{MemStorage, StorageTable};
use corestore_table::{Direction, HandlePool, KeyId, TableId, TableMetrics, Un};
use corestore_telemetry::{Alert, AlertPipeline};
use parking_lot::Mutex;
use prometheus::Registry;

use crate::config::NodeConfig;
use crate::error::NodeError;

struct Table {
    engine: TableEngine,
    storage: Arc<dyn StorageTable>,
}

/// A single host's view of the store: its tables, its membership in the
/// cluster, and its alert pipeline. Replication is deliberately not owned
/// here — [`corestore_replication::ReplicationSender`]/`Receiver` are
/// generic over `tokio::io::AsyncWrite`/`AsyncRead` and are already fully
/// exercised against an in-memory duplex in their own crate; a real
/// process wires them to a `TcpStream` and forwards decoded
/// [`corestore_replication::Envelope::Append`]s into this node's tables via
/// [`Node::apply_replicated`].
pub struct Node {
    tables: HashMap<TableId, Table>,
    table_ids: HashMap<String, TableId>,
    cluster: ClusterController,
    alerts: Mutex<AlertPipeline>,
    metrics: Registry,
}

impl Node {
    /// Spawns one [`TableEngine`] per table named in `cfg`, backed by the
    /// in-memory reference [`MemStorage`] adapter — the store's own
    /// pluggable-persistence point; a deployment wanting a different
    /// backend swaps what's behind `Arc<dyn StorageTable>` without
    /// touching this facade.
    pub fn bootstrap(cfg: &NodeConfig) -> Self {
        let metrics = Registry::new();
        let mut tables = HashMap::new();
        let mut table_ids = HashMap::new();
        for spec in &cfg.tables {
            let key_len = spec.key_len;
            let extractor = move |payload: &[u8]| -> Box<[u8]> {
                Box::from(&payload[..key_len.min(payload.len())])
            };
            let storage: Arc<dyn StorageTable> = Arc::new(MemStorage::new(Box::new(extractor.clone())));
            let mut pool = HandlePool::new(Box::new(extractor));
            match TableMetrics::new(&metrics, &spec.name) {
                Ok(table_metrics) => pool.metrics = table_metrics,
                Err(e) => tracing::warn!(table = %spec.name, error = %e, "failed to register table metrics"),
            }
            let pipeline_metrics = match PipelineMetrics::new(&metrics, &spec.name) {
                Ok(m) => Some(Arc::new(m)),
                Err(e) => {
                    tracing::warn!(table = %spec.name, error = %e, "failed to register pipeline metrics");
                    None
                }
            };
            let engine =
                TableEngine::spawn_with_metrics(pool, storage.clone(), cfg.write_cache_mode, None, pipeline_metrics);
            tables.insert(spec.id, Table { engine, storage });
            table_ids.insert(spec.name.clone(), spec.id);
        }

        let cluster = ClusterController::new(cfg.self_id, &cfg.hosts, cfg.warmup_grace);
        let alerts = AlertPipeline::new(cfg.alert_prefix.clone(), cfg.alert_ring_capacity, cfg.alert_max_replay_days);

        Self {
            tables,
            table_ids,
            cluster,
            alerts: Mutex::new(alerts),
            metrics,
        }
    }

    /// The Prometheus registry every table's gauges and pipeline counters
    /// are registered against; a process exposes this via its own metrics
    /// endpoint (e.g. `prometheus::TextEncoder`).
    pub fn metrics(&self) -> &Registry {
        &self.metrics
    }

    /// Rebuilds `table`'s working set from its storage backend's current
    /// rows before any caller-visible read/write runs, the way a standby
    /// warms its cache via a bounded `select` at startup. `warm_up_rows`
    /// has no dependency on `corestore-engine` and so returns only payload
    /// bytes, not `Un`s; this replays each one through the table's own
    /// `insert` so the
    /// engine allocates its own `Un`s and the write is visible to its
    /// commit hook exactly as any other insert would be. Call this before
    /// the table is exposed to readers, since it is indistinguishable
    /// from ordinary traffic once issued.
    pub async fn warm_up(&self, table: TableId, warmup_batch: usize) -> Result<usize, NodeError> {
        let entry = self.tables.get(&table).ok_or(NodeError::UnknownTable(table))?;
        let rows = warm_up_rows(&entry.storage, warmup_batch).await?;
        let count = rows.len();
        for row in rows {
            entry.engine.insert(row).await?;
        }
        if count > 0 {
            tracing::info!(table = table.0, rows = count, "rehydrated table from storage on warm-up");
        }
        Ok(count)
    }

    pub fn table(&self, name: &str) -> Option<TableId> {
        self.table_ids.get(name).copied()
    }

    pub fn cluster(&self) -> &ClusterController {
        &self.cluster
    }

    fn engine(&self, table: TableId) -> Result<&TableEngine, NodeError> {
        Ok(&self.tables.get(&table).ok_or(NodeError::UnknownTable(table))?.engine)
    }

    /// Every write is gated by [`ClusterController::guard_write`] first:
    /// writes are rejected on standbys rather than silently accepted and
    /// forwarded.
    pub async fn insert(&self, table: TableId, payload: Box<[u8]>) -> Result<WriteOutcome, NodeError> {
        self.cluster.guard_write()?;
        Ok(self.engine(table)?.insert(payload).await?)
    }

    pub async fn update(&self, table: TableId, key: Box<[u8]>, payload: Box<[u8]>) -> Result<WriteOutcome, NodeError> {
        self.cluster.guard_write()?;
        Ok(self.engine(table)?.update(key, payload).await?)
    }

    pub async fn tombstone(&self, table: TableId, key: Box<[u8]>) -> Result<WriteOutcome, NodeError> {
        self.cluster.guard_write()?;
        Ok(self.engine(table)?.tombstone(key).await?)
    }

    pub async fn find(&self, table: TableId, key: Box<[u8]>) -> Result<Option<Box<[u8]>>, NodeError> {
        Ok(self.engine(table)?.find(KeyId::PRIMARY, key).await?)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn select(
        &self,
        table: TableId,
        direction: Direction,
        seed: Option<Box<[u8]>>,
        inclusive: bool,
        prefix: Box<[u8]>,
        limit: usize,
    ) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>, NodeError> {
        Ok(self
            .engine(table)?
            .select(KeyId::PRIMARY, direction, seed, inclusive, prefix, limit)
            .await?)
    }

    /// Applies one decoded `Append` off the replication stream directly
    /// to `table`'s engine, bypassing `guard_write` — a standby accepting
    /// replicated writes from the primary is exactly the case that guard
    /// exists to distinguish from a client write.
    pub async fn apply_replicated(
        &self,
        table: TableId,
        _un: Un,
        op: corestore_storage::WriteOp,
        row_buf: Box<[u8]>,
    ) -> Result<(), NodeError> {
        // `Un` allocation stays local to the engine; replication only needs
        // ordering, which the caller's `GapTracker` already enforces.
        let engine = self.engine(table)?;
        match op {
            corestore_storage::WriteOp::Insert => {
                engine.insert(row_buf).await?;
            }
            corestore_storage::WriteOp::Update => {
                let key = row_buf.clone();
                engine.update(key, row_buf).await?;
            }
            corestore_storage::WriteOp::Tombstone => {
                engine.tombstone(row_buf).await?;
            }
        }
        Ok(())
    }

    pub fn record_alert(&self, when: chrono::DateTime<chrono::Utc>, severity: u8, message: String) -> Alert {
        self.alerts.lock().record(when, severity, message)
    }

    pub fn drain_live_alerts(&self) -> Vec<corestore_record::Frame> {
        self.alerts.lock().drain_live()
    }

    pub fn alert_backfill(&self, filter: &str, today: NaiveDate) -> Result<Vec<corestore_record::Frame>, NodeError> {
        Ok(self.alerts.lock().backfill(filter, today)?)
    }
}
