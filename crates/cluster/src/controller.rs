use std::cmp::Reverse;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::callback::{DownFn, DownReason, UpFn};
use crate::error::ClusterError;
use crate::host::{HostConfig, HostId, HostRuntime};

struct Inner {
    hosts: HashMap<HostId, HostRuntime>,
    primary: Option<HostId>,
}

/// Tracks the reachability and admin state of every configured host, runs
/// the priority election rule on every state change, and fires `upFn`/
/// `downFn` on this process's own role transitions.
///
/// One instance is owned per local host (`self_id`); replication and write
/// routing consult [`ClusterController::guard_write`] before touching a
/// table.
pub struct ClusterController {
    self_id: HostId,
    warmup_grace: Duration,
    up_fn: Option<UpFn>,
    down_fn: Option<DownFn>,
    inner: Mutex<Inner>,
}

impl ClusterController {
    pub fn new(self_id: HostId, hosts: &[HostConfig], warmup_grace: Duration) -> Self {
        let now = Instant::now();
        let hosts: HashMap<HostId, HostRuntime> = hosts
            .iter()
            .map(|cfg| (cfg.id, HostRuntime::new(*cfg, now)))
            .collect();
        // No peers configured means there is no election to run and nobody
        // else to ever become primary, so standalone mode makes `self_id`
        // primary from the start rather than waiting on a `set_reachable`
        // that would never come.
        let primary = hosts.is_empty().then_some(self_id);
        Self {
            self_id,
            warmup_grace,
            up_fn: None,
            down_fn: None,
            inner: Mutex::new(Inner { hosts, primary }),
        }
    }

    pub fn set_up_fn(&mut self, f: UpFn) {
        self.up_fn = Some(f);
    }

    pub fn set_down_fn(&mut self, f: DownFn) {
        self.down_fn = Some(f);
    }

    pub fn self_id(&self) -> HostId {
        self.self_id
    }

    pub fn current_primary(&self) -> Option<HostId> {
        self.inner.lock().primary
    }

    pub fn is_primary(&self) -> bool {
        self.current_primary() == Some(self.self_id)
    }

    /// Rejects a write unless this host is the current primary; writes are
    /// rejected on standbys and must be routed to the primary by the caller.
    pub fn guard_write(&self) -> Result<(), ClusterError> {
        match self.current_primary() {
            Some(id) if id == self.self_id => Ok(()),
            Some(primary_id) => Err(ClusterError::NotPrimary { primary_id }),
            None => Err(ClusterError::NoPrimary),
        }
    }

    /// Marks a host reachable/unreachable and re-runs the election rule.
    /// Transitioning from unreachable to reachable resets that host's
    /// warm-up window.
    pub fn set_reachable(&self, id: HostId, reachable: bool) -> Result<(), ClusterError> {
        let now = Instant::now();
        {
            let mut inner = self.inner.lock();
            let host = inner
                .hosts
                .get_mut(&id)
                .ok_or(ClusterError::UnknownHost(id))?;
            if reachable && !host.reachable {
                host.joined_at = now;
            }
            host.reachable = reachable;
        }
        self.recompute(now);
        Ok(())
    }

    /// Administratively marks a host up or down (independent of network
    /// reachability).
    pub fn set_admin_up(&self, id: HostId, admin_up: bool) -> Result<(), ClusterError> {
        {
            let mut inner = self.inner.lock();
            let host = inner
                .hosts
                .get_mut(&id)
                .ok_or(ClusterError::UnknownHost(id))?;
            host.admin_up = admin_up;
        }
        self.recompute(Instant::now());
        Ok(())
    }

    /// Re-runs the election rule and fires role callbacks if the winner
    /// changed. Public so replication/heartbeat plumbing can force a
    /// recheck on a tick even with no observed state change.
    pub fn recompute(&self, now: Instant) {
        let mut inner = self.inner.lock();
        let current = inner.primary;

        let winner = elect(inner.hosts.values(), current, self.warmup_grace, now);

        if winner == current {
            return;
        }

        let was_self_primary = current == Some(self.self_id);
        let will_be_self_primary = winner == Some(self.self_id);

        inner.primary = winner;
        drop(inner);

        if will_be_self_primary && !was_self_primary {
            tracing::info!(host = ?self.self_id, previous = ?current, "elected primary");
            if let Some(f) = &self.up_fn {
                f(self.self_id, current);
            }
        } else if was_self_primary && !will_be_self_primary {
            let reason = if winner.is_some() {
                DownReason::Preempted
            } else {
                DownReason::Unreachable
            };
            tracing::warn!(host = ?self.self_id, ?reason, "lost primary");
            if let Some(f) = &self.down_fn {
                f(self.self_id, reason);
            }
        } else {
            tracing::info!(old = ?current, new = ?winner, "primary changed");
        }
    }
}

/// The election rule itself, factored out so it can be unit tested without
/// a whole controller: highest priority among eligible (reachable,
/// admin-up, priority > 0) hosts wins; ties go to the lowest `HostId`. A
/// host still inside its warm-up window may not preempt an existing
/// healthy primary, but is eligible to win if no primary currently exists.
fn elect<'a>(
    hosts: impl Iterator<Item = &'a HostRuntime>,
    current: Option<HostId>,
    warmup_grace: Duration,
    now: Instant,
) -> Option<HostId> {
    let mut eligible: Vec<&HostRuntime> = hosts.filter(|h| h.eligible()).collect();
    eligible.sort_by_key(|h| (Reverse(h.config.priority), h.config.id));

    let current_is_healthy = current.is_some_and(|id| eligible.iter().any(|h| h.config.id == id));

    for host in eligible {
        if current_is_healthy && Some(host.config.id) != current {
            let warming_up = now.duration_since(host.joined_at) < warmup_grace;
            if warming_up {
                continue;
            }
        }
        return Some(host.config.id);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn cfg(id: u32, priority: u32) -> HostConfig {
        HostConfig {
            id: HostId(id),
            priority,
        }
    }

    #[test]
    fn highest_priority_reachable_host_wins() {
        let c = ClusterController::new(
            HostId(0),
            &[cfg(0, 100), cfg(1, 80)],
            Duration::from_secs(0),
        );
        c.set_reachable(HostId(0), true).unwrap();
        c.set_reachable(HostId(1), true).unwrap();
        assert_eq!(c.current_primary(), Some(HostId(0)));
    }

    #[test]
    fn tie_breaks_to_lowest_id() {
        let c = ClusterController::new(
            HostId(0),
            &[cfg(1, 100), cfg(0, 100)],
            Duration::from_secs(0),
        );
        c.set_reachable(HostId(0), true).unwrap();
        c.set_reachable(HostId(1), true).unwrap();
        assert_eq!(c.current_primary(), Some(HostId(0)));
    }

    #[test]
    fn priority_zero_never_elected() {
        let c = ClusterController::new(
            HostId(0),
            &[cfg(0, 0), cfg(1, 1)],
            Duration::from_secs(0),
        );
        c.set_reachable(HostId(0), true).unwrap();
        c.set_reachable(HostId(1), true).unwrap();
        assert_eq!(c.current_primary(), Some(HostId(1)));
    }

    #[test]
    fn failover_when_primary_becomes_unreachable() {
        let c = ClusterController::new(
            HostId(0),
            &[cfg(0, 100), cfg(1, 80)],
            Duration::from_secs(0),
        );
        c.set_reachable(HostId(0), true).unwrap();
        c.set_reachable(HostId(1), true).unwrap();
        assert_eq!(c.current_primary(), Some(HostId(0)));

        c.set_reachable(HostId(0), false).unwrap();
        assert_eq!(c.current_primary(), Some(HostId(1)));
    }

    #[test]
    fn rejoining_primary_does_not_preempt_during_warmup() {
        let c = ClusterController::new(
            HostId(1),
            &[cfg(0, 100), cfg(1, 80)],
            Duration::from_secs(60),
        );
        c.set_reachable(HostId(1), true).unwrap();
        assert_eq!(c.current_primary(), Some(HostId(1)));

        // host 0 rejoins at higher priority but is still within warm-up.
        c.set_reachable(HostId(0), true).unwrap();
        assert_eq!(
            c.current_primary(),
            Some(HostId(1)),
            "healthy lower-priority primary must not be preempted mid-warmup"
        );
    }

    #[test]
    fn preemption_allowed_after_warmup_window_elapses() {
        let hosts = [cfg(0, 100), cfg(1, 80)];
        let now = Instant::now();
        let mut runtimes: HashMap<HostId, HostRuntime> = hosts
            .iter()
            .map(|cfg| (cfg.id, HostRuntime::new(*cfg, now)))
            .collect();
        runtimes.get_mut(&HostId(1)).unwrap().reachable = true;
        runtimes.get_mut(&HostId(0)).unwrap().reachable = true;
        // host 0 joined long before `now`, so it is well past warm-up.
        runtimes.get_mut(&HostId(0)).unwrap().joined_at = now - Duration::from_secs(120);

        let winner = elect(
            runtimes.values(),
            Some(HostId(1)),
            Duration::from_secs(60),
            now,
        );
        assert_eq!(winner, Some(HostId(0)));
    }

    #[test]
    fn up_fn_and_down_fn_fire_on_self_transitions() {
        let up_calls = Arc::new(AtomicUsize::new(0));
        let down_calls = Arc::new(AtomicUsize::new(0));
        let up_calls2 = up_calls.clone();
        let down_calls2 = down_calls.clone();

        let mut c = ClusterController::new(
            HostId(0),
            &[cfg(0, 100), cfg(1, 80)],
            Duration::from_secs(0),
        );
        c.set_up_fn(Box::new(move |_id, _prev| {
            up_calls2.fetch_add(1, Ordering::SeqCst);
        }));
        c.set_down_fn(Box::new(move |_id, _reason| {
            down_calls2.fetch_add(1, Ordering::SeqCst);
        }));

        c.set_reachable(HostId(0), true).unwrap();
        c.set_reachable(HostId(1), true).unwrap();
        assert_eq!(up_calls.load(Ordering::SeqCst), 1);

        c.set_reachable(HostId(0), false).unwrap();
        assert_eq!(down_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn guard_write_rejects_on_standby_and_no_primary() {
        let c = ClusterController::new(
            HostId(1),
            &[cfg(0, 100), cfg(1, 80)],
            Duration::from_secs(0),
        );
        assert_eq!(c.guard_write().unwrap_err(), ClusterError::NoPrimary);

        c.set_reachable(HostId(0), true).unwrap();
        c.set_reachable(HostId(1), true).unwrap();
        assert_eq!(
            c.guard_write().unwrap_err(),
            ClusterError::NotPrimary {
                primary_id: HostId(0)
            }
        );
    }

    #[test]
    fn unknown_host_rejected() {
        let c = ClusterController::new(HostId(0), &[cfg(0, 100)], Duration::from_secs(0));
        assert_eq!(
            c.set_reachable(HostId(9), true).unwrap_err(),
            ClusterError::UnknownHost(HostId(9))
        );
    }
}
