// 5.0 risk.rs: per-product signed exposure accumulator.
// long notional adds, short notional subtracts. the cap only binds on opens,
// which are the one transition that can grow exposure.

use crate::types::{Quote, SignedNotional, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RiskError {
    #[error("risk cap reached for {symbol}: {current} + {delta} exceeds {max_risk}")]
    RiskReached {
        symbol: Symbol,
        current: SignedNotional,
        delta: SignedNotional,
        max_risk: Quote,
    },

    #[error("risk accumulator overflow for {0}")]
    Overflow(Symbol),
}

impl RiskError {
    pub fn code(&self) -> &'static str {
        match self {
            RiskError::RiskReached { .. } => "!risk_reached",
            RiskError::Overflow(_) => "!failed",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskBook {
    accumulators: BTreeMap<Symbol, SignedNotional>,
}

impl RiskBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exposure(&self, symbol: &str) -> SignedNotional {
        self.accumulators.get(symbol).copied().unwrap_or_else(SignedNotional::zero)
    }

    // 5.1: |current + delta| must stay within max_risk. does not mutate.
    pub fn check_open(&self, symbol: &Symbol, delta: SignedNotional, max_risk: Quote) -> Result<(), RiskError> {
        let current = self.exposure(symbol.as_str());
        let projected = current
            .checked_add(delta)
            .ok_or_else(|| RiskError::Overflow(symbol.clone()))?;

        if projected.abs() > max_risk.value() {
            return Err(RiskError::RiskReached {
                symbol: symbol.clone(),
                current,
                delta,
                max_risk,
            });
        }
        Ok(())
    }

    /// Replace a position's contribution `before` with `after`. Open passes zero as
    /// `before`, full close and liquidation pass zero as `after`.
    pub fn apply(&mut self, symbol: &Symbol, before: SignedNotional, after: SignedNotional) -> Result<SignedNotional, RiskError> {
        let current = self.exposure(symbol.as_str());
        let updated = current
            .checked_sub(before)
            .and_then(|v| v.checked_add(after))
            .ok_or_else(|| RiskError::Overflow(symbol.clone()))?;

        if updated.value() == Decimal::ZERO {
            self.accumulators.remove(symbol.as_str());
        } else {
            self.accumulators.insert(symbol.clone(), updated);
        }
        Ok(updated)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &SignedNotional)> {
        self.accumulators.iter()
    }
}
