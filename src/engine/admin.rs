//! Owner-only controls: product registry and the pause switch.

use super::core::Engine;
use super::results::EngineError;
use crate::events::{EventPayload, ProductChange, ProductRegisteredEvent, ProductUpdatedEvent};
use crate::product::ProductParams;
use crate::types::{AccountId, Bps, Quote, Symbol};
use rust_decimal::Decimal;
use tracing::info;

impl Engine {
    /// Stops new submissions. Settlement and liquidation requests keep working.
    pub fn pause(&mut self, sender: AccountId) -> Result<(), EngineError> {
        self.ensure_owner(sender)?;
        self.paused = true;
        info!(by = sender.0, "submissions paused");
        self.emit_event(EventPayload::Paused(sender));
        Ok(())
    }

    pub fn unpause(&mut self, sender: AccountId) -> Result<(), EngineError> {
        self.ensure_owner(sender)?;
        self.paused = false;
        info!(by = sender.0, "submissions resumed");
        self.emit_event(EventPayload::Unpaused(sender));
        Ok(())
    }

    pub fn register_products(&mut self, sender: AccountId, batch: Vec<ProductParams>) -> Result<Vec<Symbol>, EngineError> {
        self.ensure_owner(sender)?;
        let symbols = self.products.register(batch)?;

        for symbol in &symbols {
            let product = self.products.get(symbol.as_str())?.clone();
            info!(%symbol, max_leverage = %product.max_leverage, spread = %product.spread, "product registered");
            self.emit_event(EventPayload::ProductRegistered(ProductRegisteredEvent {
                symbol: product.symbol,
                max_leverage: product.max_leverage,
                spread: product.spread,
                funding_rate: product.funding_rate,
                max_risk: product.max_risk,
            }));
        }
        Ok(symbols)
    }

    pub fn set_max_leverage(&mut self, sender: AccountId, symbol: &str, max_leverage: Decimal) -> Result<(), EngineError> {
        self.ensure_owner(sender)?;
        let leverage = self.products.set_max_leverage(symbol, max_leverage)?;
        self.product_updated(symbol, ProductChange::MaxLeverage(leverage));
        Ok(())
    }

    pub fn update_spread(&mut self, sender: AccountId, symbol: &str, spread: Bps) -> Result<(), EngineError> {
        self.ensure_owner(sender)?;
        self.products.update_spread(symbol, spread)?;
        self.product_updated(symbol, ProductChange::Spread(spread));
        Ok(())
    }

    pub fn update_funding_rate(&mut self, sender: AccountId, symbol: &str, funding_rate: Decimal) -> Result<(), EngineError> {
        self.ensure_owner(sender)?;
        self.products.update_funding_rate(symbol, funding_rate)?;
        self.product_updated(symbol, ProductChange::FundingRate(funding_rate));
        Ok(())
    }

    /// Lowering the cap below current exposure only blocks further opens.
    pub fn set_max_risk(&mut self, sender: AccountId, symbol: &str, max_risk: Quote) -> Result<(), EngineError> {
        self.ensure_owner(sender)?;
        self.products.set_max_risk(symbol, max_risk)?;
        self.product_updated(symbol, ProductChange::MaxRisk(max_risk));
        Ok(())
    }

    pub fn disable_product(&mut self, sender: AccountId, symbol: &str) -> Result<(), EngineError> {
        self.ensure_owner(sender)?;
        self.products.set_disabled(symbol, true)?;
        self.product_updated(symbol, ProductChange::Disabled);
        Ok(())
    }

    pub fn enable_product(&mut self, sender: AccountId, symbol: &str) -> Result<(), EngineError> {
        self.ensure_owner(sender)?;
        self.products.set_disabled(symbol, false)?;
        self.product_updated(symbol, ProductChange::Enabled);
        Ok(())
    }

    fn product_updated(&mut self, symbol: &str, change: ProductChange) {
        info!(%symbol, ?change, "product updated");
        self.emit_event(EventPayload::ProductUpdated(ProductUpdatedEvent {
            symbol: Symbol::from(symbol),
            change,
        }));
    }
}
