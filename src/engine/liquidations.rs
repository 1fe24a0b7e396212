//! Liquidation submission and execution.
//!
//! Whoever submits the liquidation decides that the position is underwater; the
//! ledger does not re-check eligibility and settles at whatever price arrives.

use super::core::Engine;
use super::results::{EngineError, OrderOutcome};
use crate::events::{EventPayload, LiquidationSubmittedEvent, PositionLiquidatedEvent};
use crate::position::execution_price;
use crate::queue::{OrderIntent, OrderRequest, PendingOrder, QueueError};
use crate::types::{AccountId, OrderId, PositionId, Price, Quote, SignedNotional};
use rust_decimal_macros::dec;
use tracing::info;

impl Engine {
    /// Queue forced closes for `ids`. All or nothing: one bad id rejects the whole call.
    /// Not affected by the pause switch.
    pub fn liquidate_positions(&mut self, sender: AccountId, ids: &[PositionId]) -> Result<Vec<OrderId>, EngineError> {
        let max = self.config.ledger.max_liquidations_per_call;
        if ids.len() > max {
            return Err(EngineError::TooManyOperations { requested: ids.len(), max });
        }

        let mut requests = Vec::with_capacity(ids.len());
        for &position_id in ids {
            let position = self
                .positions
                .get(&position_id)
                .ok_or(EngineError::PositionNotFound(position_id))?;
            if position.owner == sender {
                return Err(EngineError::Unauthorized(sender));
            }
            requests.push((position_id, OrderRequest {
                sender,
                symbol: position.symbol.clone(),
                side: position.side.opposite(),
                margin: position.margin,
                leverage: position.leverage,
                intent: OrderIntent::Liquidate(position_id),
            }));
        }
        if requests.len() > self.queue.remaining_capacity() {
            return Err(QueueError::Full {
                capacity: self.queue.capacity(),
            }
            .into());
        }

        let mut order_ids = Vec::with_capacity(requests.len());
        for (position_id, request) in requests {
            let id = self.queue.enqueue(request)?;
            info!(order_id = id.0, position_id = position_id.0, liquidator = sender.0, "liquidation submitted");
            self.emit_event(EventPayload::LiquidationSubmitted(LiquidationSubmittedEvent {
                id,
                position_id,
                sender,
            }));
            order_ids.push(id);
        }
        Ok(order_ids)
    }

    // full close at the supplied price. the whole margin leaves the owner; the
    // liquidator's cut of it lands in the liquidator's free margin, the rest stays
    // in custody as system funds.
    pub(super) fn liquidate_position(
        &mut self,
        order: &PendingOrder,
        position_id: PositionId,
        price: Price,
    ) -> Result<OrderOutcome, EngineError> {
        let position = self
            .positions
            .get(&position_id)
            .ok_or(EngineError::PositionNotFound(position_id))?;
        let liquidator = order.sender;
        if position.owner == liquidator {
            return Err(EngineError::Unauthorized(liquidator));
        }
        let info = self.products.get_info(position.symbol.as_str(), false)?;

        let exit_price = execution_price(price, position.side.opposite(), info.spread).ok_or(EngineError::Arithmetic)?;
        let quote = position.quote_close(position.margin, exit_price, info.funding_rate, self.current_block)?;

        let reward_fraction = self.config.ledger.liquidator_reward_pct / dec!(100);
        let reward = position.margin.checked_mul(reward_fraction).ok_or(EngineError::Arithmetic)?;
        let before = position.signed_notional().ok_or(EngineError::Arithmetic)?;

        let owner = position.owner;
        let symbol = position.symbol.clone();
        let margin = position.margin;

        self.treasury.settle_close(owner, margin, Quote::zero())?;
        self.treasury.credit_reward(liquidator, reward)?;
        self.risk.apply(&symbol, before, SignedNotional::zero())?;
        self.positions.remove(&position_id);

        info!(
            position_id = position_id.0,
            owner = owner.0,
            liquidator = liquidator.0,
            %margin,
            pnl = %quote.pnl,
            %reward,
            "position liquidated"
        );
        self.emit_event(EventPayload::PositionLiquidated(PositionLiquidatedEvent {
            position_id,
            sender: owner,
            liquidator,
            margin_liquidated: margin,
            reward,
        }));

        Ok(OrderOutcome::Liquidated {
            position_id,
            margin,
            reward,
        })
    }
}
