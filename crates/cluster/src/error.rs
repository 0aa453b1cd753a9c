use crate::host::HostId;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterError {
    #[error("no primary is currently elected")]
    NoPrimary,

    #[error("not primary; route to host {primary_id:?}")]
    NotPrimary { primary_id: HostId },

    #[error("unknown host {0:?}")]
    UnknownHost(HostId),
}
