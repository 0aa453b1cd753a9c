//! The open-order aggregate and its state machine.
//!
//! `new_order`'s own header carries the order's authoritative lifecycle
//! state (`Received → Queued → Sent → Acknowledged/Rejected → Closed`,
//! with `PendingFill` spanning fills that race their own ack); the other
//! fields each hold the most recent event of their own kind, for
//! inspection after the fact.

use crate::enums::EventState;
use crate::error::OrderError;
use crate::leg::Legs;
use crate::txn::{
    CancelBody, CanceledBody, EventHeader, FillBody, ModifiedBody, ModifyBody, NewOrderBody, OrderedBody, RejectBody,
    Txn,
};

pub struct Order {
    new_order: Txn,
    pub pending_modify: Option<Txn>,
    pub pending_cancel: Option<Txn>,
    pub last_ack: Option<Txn>,
    pub last_exec: Option<Txn>,
}

impl Order {
    pub fn new(legs: Legs, tif: crate::enums::TimeInForce) -> Self {
        let header = EventHeader::new(EventState::Received, crate::enums::EventFlags::empty(), 0);
        Self {
            new_order: Txn::NewOrder(header, NewOrderBody { legs, tif }),
            pending_modify: None,
            pending_cancel: None,
            last_ack: None,
            last_exec: None,
        }
    }

    pub fn state(&self) -> EventState {
        self.new_order.header().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == EventState::Closed
    }

    pub fn legs(&self) -> &Legs {
        match &self.new_order {
            Txn::NewOrder(_, body) => &body.legs,
            _ => unreachable!("new_order is always the NewOrder variant"),
        }
    }

    fn legs_mut(&mut self) -> &mut Legs {
        match &mut self.new_order {
            Txn::NewOrder(_, body) => &mut body.legs,
            _ => unreachable!("new_order is always the NewOrder variant"),
        }
    }

    fn set_state(&mut self, state: EventState) {
        self.new_order.header_mut().state = state;
    }

    fn expect(&self, expected: EventState, event: &'static str) -> Result<(), OrderError> {
        if self.state() != expected {
            return Err(OrderError::ProtocolViolation { from: self.state(), event });
        }
        Ok(())
    }

    /// `Received → Queued`: sent to market.
    pub fn queue(&mut self) -> Result<(), OrderError> {
        self.expect(EventState::Received, "queue")?;
        self.set_state(EventState::Queued);
        Ok(())
    }

    /// `Queued → Sent`: wire transmit.
    pub fn transmit(&mut self) -> Result<(), OrderError> {
        self.expect(EventState::Queued, "transmit")?;
        self.set_state(EventState::Sent);
        Ok(())
    }

    /// `Sent → Acknowledged`, or `PendingFill → Acknowledged` if fills
    /// arrived before this ack did.
    pub fn apply_ordered(&mut self, header: EventHeader, body: OrderedBody) -> Result<(), OrderError> {
        match self.state() {
            EventState::Sent | EventState::PendingFill => {}
            other => return Err(OrderError::ProtocolViolation { from: other, event: "Ordered" }),
        }
        self.set_state(EventState::Acknowledged);
        self.last_ack = Some(Txn::Ordered(header, body));
        Ok(())
    }

    /// `Sent → Rejected`.
    pub fn apply_reject(&mut self, header: EventHeader, body: RejectBody) -> Result<(), OrderError> {
        self.expect(EventState::Sent, "Reject")?;
        self.set_state(EventState::Rejected);
        self.last_exec = Some(Txn::Reject(header, body));
        Ok(())
    }

    /// Applies a fill to one leg. `Sent → PendingFill` if this fill races
    /// the order's own ack; `Acknowledged`/`PendingFill` otherwise accept it
    /// without changing state, since fills after the ack don't affect the
    /// order's lifecycle state.
    pub fn apply_fill(&mut self, header: EventHeader, body: FillBody) -> Result<(), OrderError> {
        match self.state() {
            EventState::Sent => self.set_state(EventState::PendingFill),
            EventState::Acknowledged | EventState::PendingFill => {}
            other => return Err(OrderError::ProtocolViolation { from: other, event: "Fill" }),
        }
        let leg_idx = header.leg as usize;
        let state = self.state();
        let leg = self
            .legs_mut()
            .get_mut(leg_idx)
            .ok_or(OrderError::ProtocolViolation { from: state, event: "Fill" })?;
        leg.apply_fill(body.last_px, body.last_qty, body.px_ndp, body.qty_ndp)?;
        self.last_exec = Some(Txn::Fill(header, body));
        Ok(())
    }

    /// Any live state `→ Closed`.
    pub fn apply_closed(&mut self, header: EventHeader) -> Result<(), OrderError> {
        self.expect_not_closed("Closed")?;
        self.set_state(EventState::Closed);
        self.last_exec = Some(Txn::Closed(header, crate::txn::ClosedBody));
        Ok(())
    }

    fn expect_not_closed(&self, event: &'static str) -> Result<(), OrderError> {
        if self.state() == EventState::Closed {
            return Err(OrderError::ProtocolViolation { from: EventState::Closed, event });
        }
        Ok(())
    }

    /// Queues a modify request. At most one modify may be pending at a
    /// time. Modify-on-queue: a modify submitted before the
    /// order itself is acknowledged is held `Deferred` rather than `Queued`
    /// until [`Order::release_deferred_modify`] advances it.
    pub fn request_modify(&mut self, mut header: EventHeader, body: ModifyBody, simulated: bool) -> Result<(), OrderError> {
        if self.pending_modify.is_some() {
            return Err(OrderError::PendingLimitExceeded);
        }
        header.state = match self.state() {
            EventState::Acknowledged | EventState::PendingFill => EventState::Queued,
            _ => EventState::Deferred,
        };
        self.pending_modify = Some(if simulated {
            Txn::ModSimulated(header, body)
        } else {
            Txn::Modify(header, body)
        });
        Ok(())
    }

    /// Advances a `Deferred` pending modify to `Queued` once the order
    /// itself becomes acknowledged. A no-op if there is no pending modify,
    /// or it is already past `Deferred`.
    pub fn release_deferred_modify(&mut self) {
        if let Some(pending) = &mut self.pending_modify {
            if pending.header().state == EventState::Deferred {
                pending.header_mut().state = EventState::Queued;
            }
        }
    }

    /// Applies the market's ack of the pending modify onto the order's own
    /// legs, then clears the pending slot.
    pub fn apply_modified(&mut self, header: EventHeader, body: ModifiedBody) -> Result<(), OrderError> {
        if self.pending_modify.is_none() {
            return Err(OrderError::ProtocolViolation { from: self.state(), event: "Modified" });
        }
        for (leg, modified) in self.legs_mut().iter_mut().zip(body.legs.iter()) {
            leg.order_qty = modified.order_qty;
            leg.px = modified.px;
            leg.update_leaves_qty();
        }
        self.pending_modify = None;
        self.last_ack = Some(Txn::Modified(header, body));
        Ok(())
    }

    /// A rejected modify. `cancel_original` closes the order outright
    /// rather than simply leaving it open.
    pub fn apply_mod_reject(&mut self, header: EventHeader, body: RejectBody, cancel_original: bool) -> Result<(), OrderError> {
        if self.pending_modify.is_none() {
            return Err(OrderError::ProtocolViolation { from: self.state(), event: "ModReject" });
        }
        self.pending_modify = None;
        if cancel_original {
            self.set_state(EventState::Closed);
            self.last_exec = Some(Txn::ModRejectCxl(header, body));
        } else {
            self.last_exec = Some(Txn::ModReject(header, body));
        }
        Ok(())
    }

    /// Queues a cancel request; at most one may be pending at a time.
    pub fn request_cancel(&mut self, header: EventHeader, body: CancelBody) -> Result<(), OrderError> {
        if self.pending_cancel.is_some() {
            return Err(OrderError::PendingLimitExceeded);
        }
        self.pending_cancel = Some(Txn::Cancel(header, body));
        Ok(())
    }

    /// The cancel took effect: the order closes.
    pub fn apply_canceled(&mut self, header: EventHeader, body: CanceledBody) -> Result<(), OrderError> {
        if self.pending_cancel.is_none() {
            return Err(OrderError::ProtocolViolation { from: self.state(), event: "Canceled" });
        }
        self.pending_cancel = None;
        self.set_state(EventState::Closed);
        self.last_ack = Some(Txn::Canceled(header, body));
        Ok(())
    }

    /// The cancel was rejected; the order remains open in its prior state.
    pub fn apply_cxl_reject(&mut self, header: EventHeader, body: RejectBody) -> Result<(), OrderError> {
        if self.pending_cancel.is_none() {
            return Err(OrderError::ProtocolViolation { from: self.state(), event: "CxlReject" });
        }
        self.pending_cancel = None;
        self.last_exec = Some(Txn::CxlReject(header, body));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{EventFlags, OrdType, RejReason, Side, TimeInForce};
    use crate::leg::{CancelLeg, Leg};
    use crate::txn::empty_legs;
    use crate::value::{Ndp, Value};

    fn new_order() -> Order {
        let mut legs = empty_legs();
        legs.push(Leg::new(Side::Buy, OrdType::Limit, Value(10_000), Ndp(2), Value(100), Ndp(0)));
        Order::new(legs, TimeInForce::Day)
    }

    fn h(state: EventState) -> EventHeader {
        EventHeader::new(state, EventFlags::empty(), 0)
    }

    #[test]
    fn happy_path_to_acknowledged() {
        let mut o = new_order();
        assert_eq!(o.state(), EventState::Received);
        o.queue().unwrap();
        assert_eq!(o.state(), EventState::Queued);
        o.transmit().unwrap();
        assert_eq!(o.state(), EventState::Sent);
        o.apply_ordered(h(EventState::Acknowledged), OrderedBody { n_legs: 1 }).unwrap();
        assert_eq!(o.state(), EventState::Acknowledged);
    }

    #[test]
    fn reject_from_sent() {
        let mut o = new_order();
        o.queue().unwrap();
        o.transmit().unwrap();
        o.apply_reject(
            h(EventState::Rejected),
            RejectBody { rej_code: 1, rej_reason: RejReason::InvalidPrice },
        )
        .unwrap();
        assert_eq!(o.state(), EventState::Rejected);
    }

    #[test]
    fn transitions_out_of_order_are_protocol_errors() {
        let mut o = new_order();
        let err = o.transmit().unwrap_err();
        assert!(matches!(err, OrderError::ProtocolViolation { from: EventState::Received, event: "transmit" }));
    }

    #[test]
    fn fill_before_ack_parks_in_pending_fill_then_resumes_on_ack() {
        let mut o = new_order();
        o.queue().unwrap();
        o.transmit().unwrap();
        o.apply_fill(
            h(EventState::PendingFill),
            FillBody { last_px: Value(10_000), last_qty: Value(40), px_ndp: Ndp(2), qty_ndp: Ndp(0) },
        )
        .unwrap();
        assert_eq!(o.state(), EventState::PendingFill);
        assert_eq!(o.legs()[0].cum_qty, Value(40));
        o.apply_ordered(h(EventState::Acknowledged), OrderedBody { n_legs: 1 }).unwrap();
        assert_eq!(o.state(), EventState::Acknowledged);
    }

    #[test]
    fn fill_exceeding_leavesqty_is_rejected_and_order_stays_open() {
        let mut o = new_order();
        o.queue().unwrap();
        o.transmit().unwrap();
        o.apply_ordered(h(EventState::Acknowledged), OrderedBody { n_legs: 1 }).unwrap();
        let err = o
            .apply_fill(
                h(EventState::Acknowledged),
                FillBody { last_px: Value(10_000), last_qty: Value(500), px_ndp: Ndp(2), qty_ndp: Ndp(0) },
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::ProtocolViolation { event: "Fill", .. }));
        assert_eq!(o.state(), EventState::Acknowledged);
    }

    #[test]
    fn second_pending_modify_is_rejected() {
        let mut o = new_order();
        o.queue().unwrap();
        o.transmit().unwrap();
        o.apply_ordered(h(EventState::Acknowledged), OrderedBody { n_legs: 1 }).unwrap();
        let mut legs = empty_legs();
        legs.push(Leg::new(Side::Buy, OrdType::Limit, Value(10_100), Ndp(2), Value(150), Ndp(0)));
        let body = ModifyBody { legs, tif: TimeInForce::Day, ack_flags: EventFlags::empty() };
        o.request_modify(h(EventState::Queued), body.clone(), false).unwrap();
        let err = o.request_modify(h(EventState::Queued), body, false).unwrap_err();
        assert!(matches!(err, OrderError::PendingLimitExceeded));
    }

    #[test]
    fn modify_on_queue_is_deferred_until_order_acknowledged() {
        let mut o = new_order();
        o.queue().unwrap();
        o.transmit().unwrap();
        let mut legs = empty_legs();
        legs.push(Leg::new(Side::Buy, OrdType::Limit, Value(10_100), Ndp(2), Value(150), Ndp(0)));
        let body = ModifyBody { legs, tif: TimeInForce::Day, ack_flags: EventFlags::empty() };
        o.request_modify(h(EventState::Queued), body, false).unwrap();
        assert_eq!(o.pending_modify.as_ref().unwrap().header().state, EventState::Deferred);

        o.apply_ordered(h(EventState::Acknowledged), OrderedBody { n_legs: 1 }).unwrap();
        o.release_deferred_modify();
        assert_eq!(o.pending_modify.as_ref().unwrap().header().state, EventState::Queued);
    }

    #[test]
    fn modified_updates_leg_and_clears_pending() {
        let mut o = new_order();
        o.queue().unwrap();
        o.transmit().unwrap();
        o.apply_ordered(h(EventState::Acknowledged), OrderedBody { n_legs: 1 }).unwrap();
        let mut legs = empty_legs();
        legs.push(Leg::new(Side::Buy, OrdType::Limit, Value(10_100), Ndp(2), Value(150), Ndp(0)));
        o.request_modify(
            h(EventState::Queued),
            ModifyBody { legs: legs.clone(), tif: TimeInForce::Day, ack_flags: EventFlags::empty() },
            false,
        )
        .unwrap();
        o.apply_modified(h(EventState::Acknowledged), ModifiedBody { legs, tif: TimeInForce::Day })
            .unwrap();
        assert!(o.pending_modify.is_none());
        assert_eq!(o.legs()[0].order_qty, Value(150));
        assert_eq!(o.legs()[0].leaves_qty, Value(150));
    }

    #[test]
    fn cancel_closes_the_order() {
        let mut o = new_order();
        o.queue().unwrap();
        o.transmit().unwrap();
        o.apply_ordered(h(EventState::Acknowledged), OrderedBody { n_legs: 1 }).unwrap();
        let mut legs: crate::leg::CancelLegs = Default::default();
        legs.push(CancelLeg { cum_qty: Value(0), qty_ndp: Ndp(0), order_qty: Value(100) });
        o.request_cancel(h(EventState::Queued), CancelBody { legs: legs.clone(), ack_flags: EventFlags::empty() })
            .unwrap();
        o.apply_canceled(h(EventState::Closed), CanceledBody { legs: Default::default() }).unwrap();
        assert!(o.is_closed());
        assert!(o.pending_cancel.is_none());
    }

    #[test]
    fn canceled_without_a_pending_cancel_is_a_protocol_error() {
        let mut o = new_order();
        o.queue().unwrap();
        o.transmit().unwrap();
        o.apply_ordered(h(EventState::Acknowledged), OrderedBody { n_legs: 1 }).unwrap();
        let err = o.apply_canceled(h(EventState::Closed), CanceledBody { legs: Default::default() }).unwrap_err();
        assert!(matches!(err, OrderError::ProtocolViolation { event: "Canceled", .. }));
    }

    #[test]
    fn closed_is_terminal() {
        let mut o = new_order();
        o.queue().unwrap();
        o.transmit().unwrap();
        o.apply_ordered(h(EventState::Acknowledged), OrderedBody { n_legs: 1 }).unwrap();
        o.apply_closed(h(EventState::Closed)).unwrap();
        assert!(o.is_closed());
        let err = o.apply_closed(h(EventState::Closed)).unwrap_err();
        assert!(matches!(err, OrderError::ProtocolViolation { from: EventState::Closed, .. }));
    }
}
