//! Order admission. Everything here either enqueues an intent or fails
//! without touching state; funds only move when the order settles.

use super::core::Engine;
use super::results::EngineError;
use crate::events::{EventPayload, OrderSubmittedEvent};
use crate::queue::{OrderIntent, OrderRequest};
use crate::types::{AccountId, Leverage, OrderId, PositionId, Quote, Side, Symbol};
use rust_decimal::Decimal;
use tracing::info;

impl Engine {
    /// Queue a new position. Returns the order id, which becomes the position id on open.
    pub fn submit_order(
        &mut self,
        sender: AccountId,
        side: Side,
        symbol: &str,
        margin: Quote,
        leverage: Decimal,
    ) -> Result<OrderId, EngineError> {
        if self.paused {
            return Err(EngineError::Paused);
        }

        let info = self.products.get_info(symbol, true)?;
        let leverage = Leverage::new(leverage).ok_or(EngineError::InvalidLeverage(leverage))?;
        if leverage > info.max_leverage {
            return Err(EngineError::ExceedsMaxLeverage {
                requested: leverage,
                max: info.max_leverage,
            });
        }

        let minimum = self.config.ledger.min_margin;
        if margin < minimum {
            return Err(EngineError::InvalidMargin { margin, minimum });
        }
        self.treasury.ensure_free_margin(sender, margin)?;

        let symbol = Symbol::from(symbol);
        let id = self.queue.enqueue(OrderRequest {
            sender,
            symbol: symbol.clone(),
            side,
            margin,
            leverage,
            intent: OrderIntent::Open,
        })?;

        info!(order_id = id.0, sender = sender.0, %symbol, %side, %margin, %leverage, "order submitted");
        self.emit_event(EventPayload::OrderSubmitted(OrderSubmittedEvent {
            id,
            position_id: None,
            sender,
            side,
            symbol,
            margin,
            leverage,
        }));

        Ok(id)
    }

    /// Queue a change to an open position. Same side as the position adds `margin`,
    /// opposite side closes `margin` worth of it.
    pub fn submit_order_update(
        &mut self,
        sender: AccountId,
        position_id: PositionId,
        side: Side,
        margin: Quote,
    ) -> Result<OrderId, EngineError> {
        if self.paused {
            return Err(EngineError::Paused);
        }

        let position = self
            .positions
            .get(&position_id)
            .ok_or(EngineError::PositionNotFound(position_id))?;
        if position.owner != sender {
            return Err(EngineError::Unauthorized(sender));
        }

        if side == position.side {
            if !margin.is_positive() {
                return Err(EngineError::InvalidMargin {
                    margin,
                    minimum: Quote::zero(),
                });
            }
            self.treasury.ensure_free_margin(sender, margin)?;
        } else if !margin.is_positive() || margin > position.margin {
            return Err(EngineError::InvalidMargin {
                margin,
                minimum: Quote::zero(),
            });
        }

        let symbol = position.symbol.clone();
        let leverage = position.leverage;
        let id = self.queue.enqueue(OrderRequest {
            sender,
            symbol: symbol.clone(),
            side,
            margin,
            leverage,
            intent: OrderIntent::Modify(position_id),
        })?;

        info!(order_id = id.0, position_id = position_id.0, %side, %margin, "position update submitted");
        self.emit_event(EventPayload::OrderSubmitted(OrderSubmittedEvent {
            id,
            position_id: Some(position_id),
            sender,
            side,
            symbol,
            margin,
            leverage,
        }));

        Ok(id)
    }
}
