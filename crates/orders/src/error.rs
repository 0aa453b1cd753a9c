use thiserror::Error;

use crate::enums::EventState;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderError {
    #[error("event {event} not valid from state {from:?}")]
    ProtocolViolation { from: EventState, event: &'static str },

    #[error("a modify or cancel is already pending for this order")]
    PendingLimitExceeded,

    #[error("NDP mismatch: quantity carries {expected:?} but operand carries {got:?}")]
    NdpMismatch { expected: crate::value::Ndp, got: crate::value::Ndp },
}
