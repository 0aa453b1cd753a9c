use prometheus::{IntGauge, Registry};

/// Per-table gauges, following the one-gauge-per-table-per-metric
/// convention used throughout `spacetimedb-metrics`.
pub struct TableMetrics {
    pub row_count: IntGauge,
    pub tombstone_count: IntGauge,
}

impl TableMetrics {
    pub fn new(registry: &Registry, table_name: &str) -> prometheus::Result<Self> {
        let row_count = IntGauge::new(
            format!("corestore_table_rows_{table_name}"),
            "Live row count for this table",
        )?;
        let tombstone_count = IntGauge::new(
            format!("corestore_table_tombstones_{table_name}"),
            "Tombstoned-but-unpurged row count for this table",
        )?;
        registry.register(Box::new(row_count.clone()))?;
        registry.register(Box::new(tombstone_count.clone()))?;
        Ok(Self {
            row_count,
            tombstone_count,
        })
    }

    /// A detached instance for tests and standalone use, not wired to any
    /// [`Registry`].
    pub fn unregistered() -> Self {
        Self {
            row_count: IntGauge::new("row_count", "row_count").unwrap(),
            tombstone_count: IntGauge::new("tombstone_count", "tombstone_count").unwrap(),
        }
    }
}
