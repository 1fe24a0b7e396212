//! Position transitions driven by settlement: open, add margin, close.
//!
//! Each transition runs every check first and only then commits, so an error
//! leaves positions, risk and treasury exactly as they were.

use super::core::Engine;
use super::results::{EngineError, OrderOutcome};
use crate::events::{EventPayload, PositionClosedEvent, PositionMarginAddedEvent, PositionOpenedEvent};
use crate::position::{execution_price, Position};
use crate::queue::PendingOrder;
use crate::types::{PositionId, Price, SignedNotional};
use tracing::info;

impl Engine {
    pub(super) fn open_position(&mut self, order: &PendingOrder, price: Price) -> Result<OrderOutcome, EngineError> {
        // product parameters may have changed while the order was queued
        let info = self.products.get_info(order.symbol.as_str(), true)?;
        if order.leverage > info.max_leverage {
            return Err(EngineError::ExceedsMaxLeverage {
                requested: order.leverage,
                max: info.max_leverage,
            });
        }
        let minimum = self.config.ledger.min_margin;
        if order.margin < minimum {
            return Err(EngineError::InvalidMargin {
                margin: order.margin,
                minimum,
            });
        }
        self.treasury.ensure_free_margin(order.sender, order.margin)?;

        let entry_price = execution_price(price, order.side, info.spread).ok_or(EngineError::Arithmetic)?;
        let position = Position {
            id: PositionId::from(order.id),
            owner: order.sender,
            symbol: order.symbol.clone(),
            side: order.side,
            margin: order.margin,
            leverage: order.leverage,
            entry_price,
            opened_at: self.current_block,
        };
        let delta = position.signed_notional().ok_or(EngineError::Arithmetic)?;
        self.risk.check_open(&position.symbol, delta, info.max_risk)?;

        self.treasury.lock_margin(order.sender, order.margin)?;
        let exposure = self.risk.apply(&position.symbol, SignedNotional::zero(), delta)?;

        info!(
            position_id = position.id.0,
            owner = position.owner.0,
            symbol = %position.symbol,
            side = %position.side,
            margin = %position.margin,
            leverage = %position.leverage,
            price = %entry_price,
            %exposure,
            "position opened"
        );
        self.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
            position_id: position.id,
            owner: position.owner,
            side: position.side,
            symbol: position.symbol.clone(),
            margin: position.margin,
            leverage: position.leverage,
            price: entry_price,
        }));

        let position_id = position.id;
        self.positions.insert(position_id, position);
        Ok(OrderOutcome::Opened { position_id })
    }

    pub(super) fn modify_position(
        &mut self,
        order: &PendingOrder,
        position_id: PositionId,
        price: Price,
    ) -> Result<OrderOutcome, EngineError> {
        let position = self
            .positions
            .get(&position_id)
            .ok_or(EngineError::PositionNotFound(position_id))?;
        if position.owner != order.sender {
            return Err(EngineError::Unauthorized(order.sender));
        }

        if order.side == position.side {
            self.add_margin(order, position_id)
        } else {
            self.close_position(order, position_id, price)
        }
    }

    fn add_margin(&mut self, order: &PendingOrder, position_id: PositionId) -> Result<OrderOutcome, EngineError> {
        let position = self
            .positions
            .get(&position_id)
            .ok_or(EngineError::PositionNotFound(position_id))?;
        self.products.get_info(position.symbol.as_str(), true)?;

        let update = position.quote_add_margin(order.margin)?;
        self.treasury.ensure_free_margin(order.sender, order.margin)?;

        let before = position.signed_notional().ok_or(EngineError::Arithmetic)?;
        let mut updated = position.clone();
        updated.margin = update.new_margin;
        updated.leverage = update.new_leverage;
        let after = updated.signed_notional().ok_or(EngineError::Arithmetic)?;

        self.treasury.lock_margin(order.sender, order.margin)?;
        self.risk.apply(&updated.symbol, before, after)?;
        self.positions.insert(position_id, updated);

        info!(
            position_id = position_id.0,
            old_margin = %update.old_margin,
            new_margin = %update.new_margin,
            new_leverage = %update.new_leverage,
            "position margin added"
        );
        self.emit_event(EventPayload::PositionMarginAdded(PositionMarginAddedEvent {
            position_id,
            new_margin: update.new_margin,
            old_margin: update.old_margin,
            new_leverage: update.new_leverage,
        }));

        Ok(OrderOutcome::MarginAdded {
            position_id,
            new_leverage: update.new_leverage,
        })
    }

    fn close_position(
        &mut self,
        order: &PendingOrder,
        position_id: PositionId,
        price: Price,
    ) -> Result<OrderOutcome, EngineError> {
        let position = self
            .positions
            .get(&position_id)
            .ok_or(EngineError::PositionNotFound(position_id))?;
        // closes stay possible on a disabled product
        let info = self.products.get_info(position.symbol.as_str(), false)?;

        let exit_price = execution_price(price, position.side.opposite(), info.spread).ok_or(EngineError::Arithmetic)?;
        let quote = position.quote_close(order.margin, exit_price, info.funding_rate, self.current_block)?;

        let before = position.signed_notional().ok_or(EngineError::Arithmetic)?;
        let mut remaining = position.clone();
        remaining.margin = quote.remaining_margin;
        let after = if quote.is_full_close() {
            SignedNotional::zero()
        } else {
            remaining.signed_notional().ok_or(EngineError::Arithmetic)?
        };

        let owner = remaining.owner;
        // free margin gets the returned collateral; the realized balance only the net result
        let net = self
            .treasury
            .settle_close(owner, quote.margin_closed, quote.amount_to_return)?;
        self.risk.apply(&remaining.symbol, before, after)?;

        info!(
            position_id = position_id.0,
            margin_closed = %quote.margin_closed,
            pnl = %quote.pnl,
            funding = %quote.funding_cost,
            amount_to_return = %quote.amount_to_return,
            %net,
            remaining = %quote.remaining_margin,
            "position closed"
        );
        self.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
            position_id,
            entry_price: remaining.entry_price,
            price: exit_price,
            leverage: remaining.leverage,
            margin_closed: quote.margin_closed,
            amount_to_return: quote.amount_to_return,
        }));

        if quote.is_full_close() {
            self.positions.remove(&position_id);
        } else {
            self.positions.insert(position_id, remaining);
        }

        Ok(OrderOutcome::Closed {
            position_id,
            amount_to_return: quote.amount_to_return,
            wiped_out: quote.is_wiped_out(),
        })
    }
}
