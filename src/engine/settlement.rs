//! Price arrival. Replays a contiguous prefix of the queue against the
//! position ledger. A bad range aborts the whole call before anything moves;
//! a bad order only cancels itself.

use super::core::Engine;
use super::results::{EngineError, OrderOutcome, SettlementReport};
use crate::events::{CancelReason, EventPayload, OrderCancelledEvent};
use crate::queue::{OrderIntent, PendingOrder, QueueError};
use crate::types::{AccountId, OrderId, Price};
use rust_decimal::Decimal;
use tracing::{info, warn};

impl Engine {
    /// Settle orders `[first_id, last_id)` with one price each. Only the price feed may call this.
    /// A zero price means the market was unavailable and cancels that order.
    pub fn settle(
        &mut self,
        sender: AccountId,
        prices: &[Decimal],
        first_id: OrderId,
        last_id: OrderId,
    ) -> Result<SettlementReport, EngineError> {
        if sender != self.config.price_feed {
            return Err(EngineError::Unauthorized(sender));
        }
        self.queue.validate_range(first_id, last_id, prices.len())?;

        let mut report = SettlementReport::default();
        for &raw_price in prices {
            // validate_range guarantees one queued order per price
            let order = self.queue.pop_front().ok_or_else(|| QueueError::OutOfOrder {
                first: first_id,
                last: last_id,
                head: self.queue.head_id(),
                next: self.queue.next_id(),
            })?;
            let id = order.id;
            let outcome = self.dispatch(order, raw_price);
            report.outcomes.push((id, outcome));
        }

        info!(
            first_id = first_id.0,
            last_id = last_id.0,
            executed = report.executed(),
            cancelled = report.cancelled(),
            "settlement batch processed"
        );
        Ok(report)
    }

    fn dispatch(&mut self, order: PendingOrder, raw_price: Decimal) -> OrderOutcome {
        let result = match Price::new(raw_price) {
            None => Err(EngineError::MarketUnavailable(order.id)),
            Some(price) => match order.intent {
                OrderIntent::Open => self.open_position(&order, price),
                OrderIntent::Modify(position_id) => self.modify_position(&order, position_id, price),
                OrderIntent::Liquidate(position_id) => self.liquidate_position(&order, position_id, price),
            },
        };

        match result {
            Ok(outcome) => outcome,
            Err(err) => self.cancel(&order, &err),
        }
    }

    fn cancel(&mut self, order: &PendingOrder, err: &EngineError) -> OrderOutcome {
        let reason: CancelReason = err.cancel_reason();
        warn!(order_id = order.id.0, reason = reason.code(), error = %err, "order cancelled");

        self.emit_event(EventPayload::OrderCancelled(OrderCancelledEvent {
            id: order.id,
            position_id: order.position_id(),
            reason,
        }));
        OrderOutcome::Cancelled { reason }
    }
}
