//! Reads the hosts, priorities, table names, write-cache mode, alert
//! prefix, and max-replay-days configuration surface out of a
//! [`corestore_config::Cf`] tree and turns it into the typed values
//! [`crate::Node::bootstrap`] needs. The `hosts` scope-array carries only
//! id and priority; networking details belong to whatever transport wires
//! up `corestore-replication`, not to this facade.

use std::path::PathBuf;
use std::time::Duration;

use corestore_cluster::{HostConfig, HostId};
use corestore_config::{Cf, ConfigError};
use corestore_engine::WriteCacheMode;
use corestore_table::TableId;

/// One configured table: its id, its name (for `Node::table` lookups), and
/// the byte-length of the primary-key prefix extracted from every row's
/// payload. This store is schema-agnostic, so "first `key_len` bytes are
/// the key" is the same convention `corestore-engine`'s and
/// `corestore-storage`'s own tests already use.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub id: TableId,
    pub name: String,
    pub key_len: usize,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub self_id: HostId,
    pub hosts: Vec<HostConfig>,
    pub warmup_grace: Duration,
    pub tables: Vec<TableSpec>,
    pub write_cache_mode: WriteCacheMode,
    pub alert_prefix: PathBuf,
    pub alert_ring_capacity: usize,
    pub alert_max_replay_days: i64,
    pub warmup_batch: usize,
}

const WRITE_CACHE_MODES: [(&str, WriteCacheMode); 2] =
    [("write-through", WriteCacheMode::WriteThrough), ("write-back", WriteCacheMode::WriteBack)];

pub fn load_node_config(cf: &Cf) -> Result<NodeConfig, ConfigError> {
    let self_id = HostId(cf.get_u32("self_id", 0, u32::MAX, 0)?);

    let mut hosts = Vec::new();
    if let Some(scopes) = cf.get_scope_array("hosts") {
        for host in scopes {
            let id = HostId(host.get_u32("id", 0, u32::MAX, 0)?);
            let priority = host.get_u32("priority", 0, u32::MAX, 0)?;
            hosts.push(HostConfig { id, priority });
        }
    }

    let mut tables = Vec::new();
    if let Some(scopes) = cf.get_scope_array("tables") {
        for table in scopes {
            let id = TableId(table.get_u32("id", 0, u32::MAX, 0)?);
            let name = table.get_required("name")?.to_owned();
            let key_len = table.get_u32("key_len", 1, 4096, 1)? as usize;
            tables.push(TableSpec { id, name, key_len });
        }
    }

    let write_cache_mode = cf.get_enum("write_cache_mode", &WRITE_CACHE_MODES, WriteCacheMode::WriteThrough)?;

    let (alert_prefix, alert_ring_capacity, alert_max_replay_days) = match cf.get_scope("alert") {
        Some(alert) => (
            PathBuf::from(alert.get_or("prefix", "alerts")),
            alert.get_u32("ring_capacity", 1, 1 << 20, 1024)? as usize,
            alert.get_i64("max_replay_days", 0, 3650, 1)?,
        ),
        None => (PathBuf::from("alerts"), 1024, 1),
    };

    let warmup_grace = Duration::from_millis(cf.get_u32("warmup_grace_ms", 0, u32::MAX, 0)? as u64);
    let warmup_batch = cf.get_u32("warmup_batch", 0, 1 << 20, 0)? as usize;

    Ok(NodeConfig {
        self_id,
        hosts,
        warmup_grace,
        tables,
        write_cache_mode,
        alert_prefix,
        alert_ring_capacity,
        alert_max_replay_days,
        warmup_batch,
    })
}
