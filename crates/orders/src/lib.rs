//! Open-order bookkeeping and the order lifecycle state machine.
//!
//! - [`value`]: fixed-point `Value`/`Ndp` arithmetic shared by every quantity
//!   and price in this crate.
//! - [`enums`]: the small enumerations (`EventType`, `EventState`,
//!   `EventFlags`, `Side`, `OrdType`, `TimeInForce`, `RejReason`).
//! - [`leg`]: per-leg fill/cancel/modify state.
//! - [`txn`]: the tagged-union transaction vocabulary (`Txn` and its bodies).
//! - [`order`]: the `Order` aggregate and its state machine.
//! - [`error`]: [`OrderError`], this crate's only error type.

mod enums;
mod error;
mod leg;
mod order;
mod txn;
mod value;

pub use enums::{EventFlags, EventState, EventType, OrdType, RejReason, Side, TimeInForce};
pub use error::OrderError;
pub use leg::{CancelLeg, CanceledLeg, CancelLegs, CanceledLegs, Leg, Legs, MAX_LEGS};
pub use order::Order;
pub use txn::{
    CancelBody, CanceledBody, ClosedBody, EventHeader, FillBody, ModifiedBody, ModifyBody, NewOrderBody, OrderedBody,
    RejectBody, Txn,
};
pub use value::{normalize, Ndp, Value, ValNdp};
