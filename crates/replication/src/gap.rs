use corestore_table::{TableId, Un};
use std::collections::HashMap;

/// What a receiver should do with an incoming [`crate::Envelope::Append`],
/// per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// In order; apply it and advance the expected `Un`.
    Apply,
    /// Already applied (a duplicate retransmission); drop it silently.
    Stale,
    /// `un` is ahead of what was expected: switch the table into recovery
    /// and send `Recover { table_id, from_un: expected }` to the peer.
    GapDetected { expected: Un },
}

#[derive(Debug, Clone, Copy)]
struct TableProgress {
    expected: Un,
    recovering: bool,
}

/// Tracks, per table, the next `Un` a replication receiver expects and
/// whether that table is currently being caught up via a `Recover`/
/// `RecoverChunk`/`End` exchange. One instance is owned by the task reading
/// a peer's replication stream: a gap between the expected and received
/// `Un` switches that table into recovery mode.
#[derive(Debug, Default)]
pub struct GapTracker {
    tables: HashMap<TableId, TableProgress>,
}

impl GapTracker {
    pub fn new() -> Self {
        Self { tables: HashMap::new() }
    }

    pub fn is_recovering(&self, table_id: TableId) -> bool {
        self.tables.get(&table_id).map(|p| p.recovering).unwrap_or(false)
    }

    /// Record an `Append` arriving for `table_id` at `un`. A table with no
    /// prior state accepts whatever `un` arrives first as its baseline,
    /// matching a freshly-joined standby that hasn't yet called `Recover`.
    pub fn observe_append(&mut self, table_id: TableId, un: Un) -> AppendOutcome {
        let progress = self.tables.entry(table_id).or_insert(TableProgress {
            expected: un,
            recovering: false,
        });
        if progress.recovering {
            return AppendOutcome::Stale;
        }
        if un == progress.expected {
            progress.expected = un.next();
            AppendOutcome::Apply
        } else if un < progress.expected {
            AppendOutcome::Stale
        } else {
            progress.recovering = true;
            AppendOutcome::GapDetected { expected: progress.expected }
        }
    }

    /// Record a `RecoverChunk` for `table_id` at `un`, applied unconditionally.
    pub fn observe_recover_chunk(&mut self, table_id: TableId, un: Un) {
        let progress = self.tables.entry(table_id).or_insert(TableProgress {
            expected: un,
            recovering: true,
        });
        if un.next() > progress.expected {
            progress.expected = un.next();
        }
    }

    /// Record an `End { to_un }`, completing recovery for `table_id`.
    pub fn observe_end(&mut self, table_id: TableId, to_un: Un) {
        let progress = self.tables.entry(table_id).or_insert(TableProgress {
            expected: to_un.next(),
            recovering: false,
        });
        if to_un.next() > progress.expected {
            progress.expected = to_un.next();
        }
        progress.recovering = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_appends_apply() {
        let mut t = GapTracker::new();
        let table = TableId(0);
        assert_eq!(t.observe_append(table, Un(0)), AppendOutcome::Apply);
        assert_eq!(t.observe_append(table, Un(1)), AppendOutcome::Apply);
        assert_eq!(t.observe_append(table, Un(2)), AppendOutcome::Apply);
    }

    #[test]
    fn gap_switches_table_into_recovery() {
        let mut t = GapTracker::new();
        let table = TableId(0);
        t.observe_append(table, Un(0));
        let outcome = t.observe_append(table, Un(5));
        assert_eq!(outcome, AppendOutcome::GapDetected { expected: Un(1) });
        assert!(t.is_recovering(table));

        // further appends are ignored while recovering
        assert_eq!(t.observe_append(table, Un(6)), AppendOutcome::Stale);
    }

    #[test]
    fn end_closes_recovery_and_resumes_appends() {
        let mut t = GapTracker::new();
        let table = TableId(0);
        t.observe_append(table, Un(0));
        t.observe_append(table, Un(5));
        assert!(t.is_recovering(table));

        t.observe_recover_chunk(table, Un(1));
        t.observe_recover_chunk(table, Un(2));
        t.observe_recover_chunk(table, Un(3));
        t.observe_recover_chunk(table, Un(4));
        t.observe_end(table, Un(4));
        assert!(!t.is_recovering(table));

        assert_eq!(t.observe_append(table, Un(2)), AppendOutcome::Stale);
        assert_eq!(t.observe_append(table, Un(5)), AppendOutcome::Apply);
    }

    #[test]
    fn duplicate_append_is_stale() {
        let mut t = GapTracker::new();
        let table = TableId(0);
        t.observe_append(table, Un(0));
        t.observe_append(table, Un(1));
        assert_eq!(t.observe_append(table, Un(0)), AppendOutcome::Stale);
    }
}
