use crate::host::HostId;

/// Why a host lost the primary role, passed to [`DownFn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownReason {
    /// Admin or network unreachability took the current primary offline.
    Unreachable,
    /// A higher-priority host became eligible and preempted us.
    Preempted,
    /// This process is shutting down.
    Stopping,
}

/// Invoked when this host transitions to primary. `previous_primary_id` is
/// `None` if no host held the role before (first election after startup).
pub type UpFn = Box<dyn Fn(HostId, Option<HostId>) + Send + Sync>;

/// Invoked when this host loses the primary role.
pub type DownFn = Box<dyn Fn(HostId, DownReason) + Send + Sync>;
