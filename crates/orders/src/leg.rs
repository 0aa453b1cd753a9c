//! Per-leg order state: live legs, legs with an outstanding cancel, and
//! legs already canceled. Multi-leg strategies are in scope, so legs are
//! held in a small bounded array rather than a single slot.

use arrayvec::ArrayVec;

use crate::enums::{EventState, OrdType, Side};
use crate::error::OrderError;
use crate::value::{normalize, Ndp, Value};

pub const MAX_LEGS: usize = 4;

pub type Legs = ArrayVec<Leg, MAX_LEGS>;
pub type CancelLegs = ArrayVec<CancelLeg, MAX_LEGS>;
pub type CanceledLegs = ArrayVec<CanceledLeg, MAX_LEGS>;

/// One leg of a live order: its price/side/type plus cumulative fill state.
/// `leaves_qty` is a derived field, recomputed by [`Leg::update_leaves_qty`]
/// after every change to `order_qty`/`cum_qty` rather than stored
/// independently, so it can never drift out of sync with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leg {
    pub side: Side,
    pub ord_type: OrdType,
    pub px: Value,
    pub px_ndp: Ndp,
    pub order_qty: Value,
    pub qty_ndp: Ndp,
    pub cum_qty: Value,
    pub cum_value: Value,
    pub leaves_qty: Value,
}

impl Leg {
    pub fn new(side: Side, ord_type: OrdType, px: Value, px_ndp: Ndp, order_qty: Value, qty_ndp: Ndp) -> Self {
        Self {
            side,
            ord_type,
            px,
            px_ndp,
            order_qty,
            qty_ndp,
            cum_qty: Value(0),
            cum_value: Value(0),
            leaves_qty: order_qty,
        }
    }

    pub fn update_leaves_qty(&mut self) {
        self.leaves_qty = self.order_qty.saturating_sub_to_zero(self.cum_qty);
    }

    pub fn filled(&self) -> bool {
        self.cum_qty >= self.order_qty
    }

    /// Adjusts this leg's worst-case exposure for a pending modify: the
    /// order quantity only ever moves up (never down, since a downward
    /// modify can't increase risk), and price moves to whichever side is
    /// more adverse to the resting order.
    pub fn expose(&mut self, other_order_qty: Value, other_px: Value) {
        if self.order_qty < other_order_qty {
            self.order_qty = other_order_qty;
        }
        match self.side {
            Side::Buy => {
                if self.px < other_px {
                    self.px = other_px;
                }
            }
            Side::Sell => {
                if self.px > other_px {
                    self.px = other_px;
                }
            }
        }
    }

    /// Applies one fill to this leg. `qty_ndp` is reconciled against the
    /// leg's own scale via [`normalize`]; `px_ndp` must match exactly, since
    /// rescaling price after the fact would also require rescaling the
    /// accumulated notional, which this crate does not attempt.
    pub fn apply_fill(&mut self, last_px: Value, last_qty: Value, px_ndp: Ndp, qty_ndp: Ndp) -> Result<(), OrderError> {
        if px_ndp != self.px_ndp {
            return Err(OrderError::NdpMismatch {
                expected: self.px_ndp,
                got: px_ndp,
            });
        }
        let (cum_qty, fill_qty, ndp) = normalize(self.cum_qty, self.qty_ndp, last_qty, qty_ndp)?;
        let new_cum = cum_qty
            .checked_add(fill_qty)
            .ok_or(OrderError::NdpMismatch { expected: self.qty_ndp, got: qty_ndp })?;
        let (order_qty, new_cum, ndp) = normalize(self.order_qty, self.qty_ndp, new_cum, ndp)?;
        if new_cum.0 > order_qty.0 {
            return Err(OrderError::ProtocolViolation {
                from: EventState::Acknowledged,
                event: "Fill",
            });
        }
        self.qty_ndp = ndp;
        self.order_qty = order_qty;
        self.cum_qty = new_cum;
        self.update_leaves_qty();
        self.cum_value = Value(self.cum_value.0.saturating_add(last_px.0.saturating_mul(last_qty.0)));
        Ok(())
    }
}

/// Leg state carried by a pending `Cancel` request: enough to track the
/// worst-case exposure of the order being canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelLeg {
    pub cum_qty: Value,
    pub qty_ndp: Ndp,
    pub order_qty: Value,
}

/// Leg state carried by a `Canceled` ack: the final cumulative quantity at
/// the moment the cancel took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanceledLeg {
    pub cum_qty: Value,
    pub qty_ndp: Ndp,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg() -> Leg {
        Leg::new(Side::Buy, OrdType::Limit, Value(10_000), Ndp(2), Value(100), Ndp(0))
    }

    #[test]
    fn fill_reduces_leaves_qty() {
        let mut l = leg();
        l.apply_fill(Value(10_000), Value(40), Ndp(2), Ndp(0)).unwrap();
        assert_eq!(l.cum_qty, Value(40));
        assert_eq!(l.leaves_qty, Value(60));
        assert!(!l.filled());
    }

    #[test]
    fn fill_exceeding_order_qty_is_rejected() {
        let mut l = leg();
        l.apply_fill(Value(10_000), Value(40), Ndp(2), Ndp(0)).unwrap();
        let err = l.apply_fill(Value(10_000), Value(90), Ndp(2), Ndp(0)).unwrap_err();
        assert!(matches!(err, OrderError::ProtocolViolation { event: "Fill", .. }));
    }

    #[test]
    fn full_fill_marks_leg_filled() {
        let mut l = leg();
        l.apply_fill(Value(10_000), Value(100), Ndp(2), Ndp(0)).unwrap();
        assert!(l.filled());
        assert_eq!(l.leaves_qty, Value(0));
    }

    #[test]
    fn fill_with_finer_qty_ndp_is_normalized() {
        let mut l = leg();
        // order_qty=100 at ndp=0; a fill reporting qty=400 at ndp=1 is 40.0 units.
        l.apply_fill(Value(10_000), Value(400), Ndp(2), Ndp(1)).unwrap();
        assert_eq!(l.qty_ndp, Ndp(1));
        assert_eq!(l.cum_qty, Value(400));
        assert_eq!(l.order_qty, Value(1000));
    }

    #[test]
    fn mismatched_px_ndp_is_rejected() {
        let mut l = leg();
        let err = l.apply_fill(Value(10_000), Value(10), Ndp(3), Ndp(0)).unwrap_err();
        assert!(matches!(err, OrderError::NdpMismatch { .. }));
    }
}
