// 4.0 position.rs: open position record and the math that settles it.
// 4.1 execution price applies the product spread against the trader.
// 4.2 close math: leveraged amount, pnl before/after funding, amount returned.
// 4.3 add margin: de-levers proportionally, notional can never drop below 1x.
// everything here is pure. the engine decides what to do with the numbers.

use crate::types::{
    div8, mul8, AccountId, BlockNumber, Bps, Leverage, PositionId, Price, Quote, Side, SignedNotional, Symbol,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("close margin {requested} must be positive and at most the position margin {available}")]
    InvalidCloseMargin { requested: Quote, available: Quote },

    #[error("added margin {added} would take margin past notional {notional}")]
    TooMuchMargin { added: Quote, notional: Quote },

    #[error("fixed point overflow")]
    Overflow,
}

impl PositionError {
    pub fn code(&self) -> &'static str {
        match self {
            PositionError::InvalidCloseMargin { .. } => "!margin",
            PositionError::TooMuchMargin { .. } => "!too_much_margin",
            PositionError::Overflow => "!failed",
        }
    }
}

/// Price after spread. Buys pay `price * (1 + spread)`, sells get `price * (1 - spread)`.
pub fn execution_price(price: Price, side: Side, spread: Bps) -> Option<Price> {
    let factor = Decimal::ONE + side.sign() * spread.as_fraction();
    mul8(price.value(), factor).and_then(Price::new)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub owner: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    pub margin: Quote,
    pub leverage: Leverage,
    pub entry_price: Price,
    pub opened_at: BlockNumber,
}

// result of closing some or all of a position at a given execution price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseQuote {
    pub margin_closed: Quote,
    pub leveraged_amount: Quote,
    pub pre_funding_pnl: Quote,
    pub funding_cost: Quote,
    pub pnl: Quote,
    /// `max(0, margin_closed + pnl)`. A close never leaves the owner in debt.
    pub amount_to_return: Quote,
    pub remaining_margin: Quote,
}

impl CloseQuote {
    pub fn is_full_close(&self) -> bool {
        self.remaining_margin.is_zero()
    }

    // loss consumed everything that was closed
    pub fn is_wiped_out(&self) -> bool {
        self.amount_to_return.is_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginUpdate {
    pub old_margin: Quote,
    pub new_margin: Quote,
    pub new_leverage: Leverage,
}

impl Position {
    /// `trunc8(margin * leverage)`
    pub fn notional(&self) -> Option<Quote> {
        notional(self.margin, self.leverage)
    }

    /// Contribution to the product's risk accumulator.
    pub fn signed_notional(&self) -> Option<SignedNotional> {
        self.notional().map(|n| SignedNotional::from_side(self.side, n))
    }

    // 4.2: pnl = leveraged * trunc8(sign * (exit - entry) / entry) - funding
    pub fn quote_close(
        &self,
        close_margin: Quote,
        exit_price: Price,
        funding_rate: Decimal,
        now: BlockNumber,
    ) -> Result<CloseQuote, PositionError> {
        if !close_margin.is_positive() || close_margin > self.margin {
            return Err(PositionError::InvalidCloseMargin {
                requested: close_margin,
                available: self.margin,
            });
        }

        let leveraged = notional(close_margin, self.leverage).ok_or(PositionError::Overflow)?;

        let move_ratio = exit_price
            .value()
            .checked_sub(self.entry_price.value())
            .map(|diff| diff * self.side.sign())
            .and_then(|diff| div8(diff, self.entry_price.value()))
            .ok_or(PositionError::Overflow)?;
        let pre_funding_pnl = leveraged.checked_mul(move_ratio).ok_or(PositionError::Overflow)?;

        let blocks = Decimal::from(now.blocks_since(self.opened_at));
        let funding_cost = leveraged
            .checked_mul(funding_rate)
            .and_then(|per_block| per_block.checked_mul(blocks))
            .ok_or(PositionError::Overflow)?;

        let pnl = pre_funding_pnl.checked_sub(funding_cost).ok_or(PositionError::Overflow)?;
        let amount_to_return = close_margin
            .checked_add(pnl)
            .ok_or(PositionError::Overflow)?
            .max(Quote::zero());

        Ok(CloseQuote {
            margin_closed: close_margin,
            leveraged_amount: leveraged,
            pre_funding_pnl,
            funding_cost,
            pnl,
            amount_to_return,
            remaining_margin: self.margin.sub(close_margin),
        })
    }

    // 4.3: new_leverage = trunc8(leverage / trunc8(new_margin / margin))
    pub fn quote_add_margin(&self, added: Quote) -> Result<MarginUpdate, PositionError> {
        let notional = self.notional().ok_or(PositionError::Overflow)?;
        let new_margin = self.margin.checked_add(added).ok_or(PositionError::Overflow)?;
        if new_margin > notional {
            return Err(PositionError::TooMuchMargin { added, notional });
        }

        let ratio = div8(new_margin.value(), self.margin.value()).ok_or(PositionError::Overflow)?;
        let new_leverage = div8(self.leverage.value(), ratio)
            .and_then(Leverage::new)
            .ok_or(PositionError::Overflow)?;

        Ok(MarginUpdate {
            old_margin: self.margin,
            new_margin,
            new_leverage,
        })
    }
}

pub fn notional(margin: Quote, leverage: Leverage) -> Option<Quote> {
    margin.checked_mul(leverage.value())
}
