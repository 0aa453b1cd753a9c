use prometheus::{IntCounter, Registry};

/// Per-pipeline counters, registered once per table alongside its
/// [`corestore_table::TableMetrics`] gauges.
pub struct PipelineMetrics {
    pub commits: IntCounter,
    pub write_back_retries: IntCounter,
    pub write_through_rollbacks: IntCounter,
}

impl PipelineMetrics {
    pub fn new(registry: &Registry, table_name: &str) -> prometheus::Result<Self> {
        let commits = IntCounter::new(
            format!("corestore_pipeline_commits_total_{table_name}"),
            "Writes committed by this table's pipeline",
        )?;
        let write_back_retries = IntCounter::new(
            format!("corestore_pipeline_write_back_retries_total_{table_name}"),
            "Write-back storage acknowledgements that failed and were retried",
        )?;
        let write_through_rollbacks = IntCounter::new(
            format!("corestore_pipeline_write_through_rollbacks_total_{table_name}"),
            "Write-through mutations rolled back after a storage rejection",
        )?;
        registry.register(Box::new(commits.clone()))?;
        registry.register(Box::new(write_back_retries.clone()))?;
        registry.register(Box::new(write_through_rollbacks.clone()))?;
        Ok(Self {
            commits,
            write_back_retries,
            write_through_rollbacks,
        })
    }

    /// A detached instance for tests and standalone use, not wired to any
    /// [`Registry`].
    pub fn unregistered() -> Self {
        Self {
            commits: IntCounter::new("commits", "commits").unwrap(),
            write_back_retries: IntCounter::new("write_back_retries", "write_back_retries").unwrap(),
            write_through_rollbacks: IntCounter::new("write_through_rollbacks", "write_through_rollbacks").unwrap(),
        }
    }
}
