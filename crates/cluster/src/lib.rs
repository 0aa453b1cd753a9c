//! The cluster controller.
//!
//! Each host runs one [`ClusterController`] tracking every peer's
//! reachability and admin state. Every state change re-runs the priority
//! election rule; a role transition on the local host fires the
//! user-supplied [`callback::UpFn`]/[`callback::DownFn`] and is logged.
//! [`ClusterController::guard_write`] is the single choke point that keeps
//! writes off standbys. [`warmup::warm_up_rows`] implements the optional
//! startup cache warm-up for newly (re)joined standbys.

mod callback;
mod controller;
mod error;
mod host;
mod warmup;

pub use callback::{DownFn, DownReason, UpFn};
pub use controller::ClusterController;
pub use error::ClusterError;
pub use host::{HostConfig, HostId};
pub use warmup::warm_up_rows;
