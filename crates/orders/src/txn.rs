//! The transaction vocabulary: one `Txn` per event body (`NewOrder`,
//! `Modify`, `Cancel`, ...), discriminated by a plain enum tag rather than
//! a hand-rolled byte-buffer union.

use arrayvec::ArrayVec;

use crate::enums::{EventFlags, EventState, EventType, RejReason, TimeInForce};
use crate::leg::{CancelLegs, CanceledLegs, Legs};
use crate::value::{Ndp, Value};

/// Common to every event: its lifecycle state, flags, and which leg (for
/// multi-leg orders) it concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub state: EventState,
    pub flags: EventFlags,
    pub leg: u8,
}

impl EventHeader {
    pub fn new(state: EventState, flags: EventFlags, leg: u8) -> Self {
        Self { state, flags, leg }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderBody {
    pub legs: Legs,
    pub tif: TimeInForce,
}

/// Ack of a `NewOrder`; carries no per-leg data of its own, so only the
/// leg count is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderedBody {
    pub n_legs: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyBody {
    pub legs: Legs,
    pub tif: TimeInForce,
    pub ack_flags: EventFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedBody {
    pub legs: Legs,
    pub tif: TimeInForce,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelBody {
    pub legs: CancelLegs,
    pub ack_flags: EventFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanceledBody {
    pub legs: CanceledLegs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectBody {
    pub rej_code: i32,
    pub rej_reason: RejReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillBody {
    pub last_px: Value,
    pub last_qty: Value,
    pub px_ndp: Ndp,
    pub qty_ndp: Ndp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedBody;

/// One order-lifecycle event, discriminated by variant rather than by a
/// separately stored `eventType` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Txn {
    NewOrder(EventHeader, NewOrderBody),
    Ordered(EventHeader, OrderedBody),
    Reject(EventHeader, RejectBody),
    Modify(EventHeader, ModifyBody),
    ModSimulated(EventHeader, ModifyBody),
    Modified(EventHeader, ModifiedBody),
    ModReject(EventHeader, RejectBody),
    ModRejectCxl(EventHeader, RejectBody),
    Cancel(EventHeader, CancelBody),
    Canceled(EventHeader, CanceledBody),
    CxlReject(EventHeader, RejectBody),
    Fill(EventHeader, FillBody),
    Closed(EventHeader, ClosedBody),
}

impl Txn {
    pub fn event_type(&self) -> EventType {
        match self {
            Txn::NewOrder(..) => EventType::NewOrder,
            Txn::Ordered(..) => EventType::Ordered,
            Txn::Reject(..) => EventType::Reject,
            Txn::Modify(..) => EventType::Modify,
            Txn::ModSimulated(..) => EventType::ModSimulated,
            Txn::Modified(..) => EventType::Modified,
            Txn::ModReject(..) => EventType::ModReject,
            Txn::ModRejectCxl(..) => EventType::ModRejectCxl,
            Txn::Cancel(..) => EventType::Cancel,
            Txn::Canceled(..) => EventType::Canceled,
            Txn::CxlReject(..) => EventType::CxlReject,
            Txn::Fill(..) => EventType::Fill,
            Txn::Closed(..) => EventType::Closed,
        }
    }

    pub fn header(&self) -> &EventHeader {
        match self {
            Txn::NewOrder(h, _)
            | Txn::Ordered(h, _)
            | Txn::Reject(h, _)
            | Txn::Modify(h, _)
            | Txn::ModSimulated(h, _)
            | Txn::Modified(h, _)
            | Txn::ModReject(h, _)
            | Txn::ModRejectCxl(h, _)
            | Txn::Cancel(h, _)
            | Txn::Canceled(h, _)
            | Txn::CxlReject(h, _)
            | Txn::Fill(h, _)
            | Txn::Closed(h, _) => h,
        }
    }

    pub fn header_mut(&mut self) -> &mut EventHeader {
        match self {
            Txn::NewOrder(h, _)
            | Txn::Ordered(h, _)
            | Txn::Reject(h, _)
            | Txn::Modify(h, _)
            | Txn::ModSimulated(h, _)
            | Txn::Modified(h, _)
            | Txn::ModReject(h, _)
            | Txn::ModRejectCxl(h, _)
            | Txn::Cancel(h, _)
            | Txn::Canceled(h, _)
            | Txn::CxlReject(h, _)
            | Txn::Fill(h, _)
            | Txn::Closed(h, _) => h,
        }
    }
}

pub fn empty_legs() -> Legs {
    ArrayVec::new()
}
