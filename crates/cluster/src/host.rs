/// Identifies one host in the cluster's configured host set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostId(pub u32);

/// Static, configured facts about a host: its election weight and where to
/// reach it. `priority == 0` means the host never participates in election
/// (an observer-only replica).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig {
    pub id: HostId,
    pub priority: u32,
}

/// Runtime view of one host as tracked by this process's [`crate::ClusterController`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct HostRuntime {
    pub config: HostConfig,
    pub reachable: bool,
    /// Administrative up/down flag, independent of network reachability.
    pub admin_up: bool,
    /// When this host last transitioned from unreachable to reachable (or
    /// process start, for the initial state). Drives the warm-up grace
    /// window that blocks a rejoining host from immediately preempting a
    /// healthy lower-priority primary.
    pub joined_at: std::time::Instant,
}

impl HostRuntime {
    pub fn new(config: HostConfig, now: std::time::Instant) -> Self {
        Self {
            config,
            reachable: false,
            admin_up: true,
            joined_at: now,
        }
    }

    pub fn eligible(&self) -> bool {
        self.reachable && self.admin_up && self.config.priority > 0
    }
}
