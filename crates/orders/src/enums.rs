//! Small enumerations for the order event vocabulary: event type, event
//! state, and event flags, plus the handful of order-field enums (side,
//! order type, ...) referenced by leg state; only the values this state
//! machine actually inspects are reproduced here.

use bitflags::bitflags;

/// Discriminates a [`crate::txn::Txn`] variant; kept distinct from the
/// variant itself so error messages and logs can name an event kind
/// independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    NewOrder,
    Ordered,
    Reject,
    Modify,
    ModSimulated,
    Modified,
    ModReject,
    ModRejectCxl,
    Cancel,
    Canceled,
    CxlReject,
    Fill,
    Closed,
}

/// The order/txn lifecycle state. `Held`/`Aborted` are transient states used
/// while a modify-on-queue is being reconciled with the market; `Deferred`
/// is the steady "pending modify is queued behind an unacknowledged order"
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventState {
    Unset,
    Received,
    Held,
    Deferred,
    Queued,
    Aborted,
    Sent,
    PendingFill,
    Acknowledged,
    Rejected,
    Closed,
}

bitflags! {
    /// Per-transaction flags. `ModifyCxl`+`ModifyNew` set together marks a
    /// modify being carried out as a synthetic cancel/replace.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventFlags: u8 {
        const RX = 1 << 0;
        const TX = 1 << 1;
        const ACK = 1 << 2;
        const MODIFY_CXL = 1 << 3;
        const MODIFY_NEW = 1 << 4;
        const UNSOLICITED = 1 << 5;
        const SYNTHETIC = 1 << 6;
        const PENDING = 1 << 7;
    }
}

impl EventFlags {
    /// True when this transaction represents a synthetic cancel/replace in
    /// progress, i.e. both `MODIFY_CXL` and `MODIFY_NEW` are set.
    pub fn is_synthetic_cancel_replace(self) -> bool {
        self.contains(EventFlags::MODIFY_CXL) && self.contains(EventFlags::MODIFY_NEW)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInForce {
    Day,
    ImmediateOrCancel,
    FillOrKill,
    GoodTillCancel,
}

/// Market-reported rejection reason. Deliberately small: a full
/// venue-specific rejection taxonomy is out of scope here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejReason {
    Other,
    InvalidInstrument,
    InvalidQuantity,
    InvalidPrice,
    Throttled,
}
