// 2.0 product.rs: per-symbol trading parameters. the leaf everything else reads from.
// products are registered in batches and never removed. `disabled` is a soft delete:
// it blocks new opens and margin additions but existing positions can always close.

use crate::types::{Bps, Leverage, Quote, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// spread is applied as price * (1 +/- spread), so it has to stay under 100%
const MAX_SPREAD_BPS: i32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("product {0} not found")]
    NotFound(Symbol),

    #[error("product {0} is disabled")]
    Disabled(Symbol),

    #[error("product {0} already registered")]
    Duplicate(Symbol),

    #[error("max leverage must be at least 1x")]
    InvalidLeverage,

    #[error("spread must be between 1 and 9999 bps, got {0}")]
    InvalidSpread(Bps),

    #[error("funding rate cannot be negative, got {0}")]
    InvalidFundingRate(Decimal),

    #[error("max risk cannot be negative, got {0}")]
    InvalidMaxRisk(Quote),
}

impl ProductError {
    pub fn code(&self) -> &'static str {
        match self {
            ProductError::NotFound(_) => "!found",
            ProductError::Disabled(_) => "!disabled",
            ProductError::Duplicate(_) => "!duplicate",
            ProductError::InvalidLeverage => "!leverage",
            ProductError::InvalidSpread(_) => "!spread",
            ProductError::InvalidFundingRate(_) => "!funding_rate",
            ProductError::InvalidMaxRisk(_) => "!max_risk",
        }
    }
}

/// Registration request. Leverage is raw so the registry can reject values below 1x.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductParams {
    pub symbol: Symbol,
    pub max_leverage: Decimal,
    pub spread: Bps,
    /// Fraction of leveraged notional charged per block.
    pub funding_rate: Decimal,
    /// Cap on |net signed notional| across open positions.
    pub max_risk: Quote,
}

impl ProductParams {
    pub fn new(symbol: &str, max_leverage: Decimal, spread: Bps, funding_rate: Decimal, max_risk: Quote) -> Self {
        Self {
            symbol: Symbol::from(symbol),
            max_leverage,
            spread,
            funding_rate,
            max_risk,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub symbol: Symbol,
    pub max_leverage: Leverage,
    pub spread: Bps,
    pub funding_rate: Decimal,
    pub max_risk: Quote,
    pub disabled: bool,
}

impl Product {
    pub fn info(&self) -> ProductInfo {
        ProductInfo {
            max_leverage: self.max_leverage,
            spread: self.spread,
            funding_rate: self.funding_rate,
            max_risk: self.max_risk,
        }
    }
}

// what the position ledger consumes. a copy, so callers never hold a borrow on the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub max_leverage: Leverage,
    pub spread: Bps,
    pub funding_rate: Decimal,
    pub max_risk: Quote,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductRegistry {
    products: BTreeMap<Symbol, Product>,
}

impl ProductRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // 2.1: batch registration. all or nothing, duplicates inside the batch count too.
    pub fn register(&mut self, batch: Vec<ProductParams>) -> Result<Vec<Symbol>, ProductError> {
        let mut staged: BTreeMap<Symbol, Product> = BTreeMap::new();

        for params in batch {
            if self.products.contains_key(&params.symbol) || staged.contains_key(&params.symbol) {
                return Err(ProductError::Duplicate(params.symbol));
            }
            let max_leverage = Leverage::new(params.max_leverage).ok_or(ProductError::InvalidLeverage)?;
            validate_spread(params.spread)?;
            validate_funding_rate(params.funding_rate)?;
            validate_max_risk(params.max_risk)?;

            staged.insert(
                params.symbol.clone(),
                Product {
                    symbol: params.symbol,
                    max_leverage,
                    spread: params.spread,
                    funding_rate: params.funding_rate,
                    max_risk: params.max_risk,
                    disabled: false,
                },
            );
        }

        let symbols: Vec<Symbol> = staged.keys().cloned().collect();
        self.products.extend(staged);
        Ok(symbols)
    }

    /// Parameters for `symbol`. With `check_disabled`, a disabled product is an error.
    pub fn get_info(&self, symbol: &str, check_disabled: bool) -> Result<ProductInfo, ProductError> {
        let product = self.get(symbol)?;
        if check_disabled && product.disabled {
            return Err(ProductError::Disabled(product.symbol.clone()));
        }
        Ok(product.info())
    }

    pub fn get(&self, symbol: &str) -> Result<&Product, ProductError> {
        self.products
            .get(symbol)
            .ok_or_else(|| ProductError::NotFound(Symbol::from(symbol)))
    }

    fn get_mut(&mut self, symbol: &str) -> Result<&mut Product, ProductError> {
        self.products
            .get_mut(symbol)
            .ok_or_else(|| ProductError::NotFound(Symbol::from(symbol)))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.products.contains_key(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    // 2.2: admin parameter updates

    pub fn set_max_leverage(&mut self, symbol: &str, max_leverage: Decimal) -> Result<Leverage, ProductError> {
        let leverage = Leverage::new(max_leverage).ok_or(ProductError::InvalidLeverage)?;
        self.get_mut(symbol)?.max_leverage = leverage;
        Ok(leverage)
    }

    pub fn update_spread(&mut self, symbol: &str, spread: Bps) -> Result<(), ProductError> {
        validate_spread(spread)?;
        self.get_mut(symbol)?.spread = spread;
        Ok(())
    }

    pub fn update_funding_rate(&mut self, symbol: &str, funding_rate: Decimal) -> Result<(), ProductError> {
        validate_funding_rate(funding_rate)?;
        self.get_mut(symbol)?.funding_rate = funding_rate;
        Ok(())
    }

    pub fn set_max_risk(&mut self, symbol: &str, max_risk: Quote) -> Result<(), ProductError> {
        validate_max_risk(max_risk)?;
        self.get_mut(symbol)?.max_risk = max_risk;
        Ok(())
    }

    pub fn set_disabled(&mut self, symbol: &str, disabled: bool) -> Result<(), ProductError> {
        self.get_mut(symbol)?.disabled = disabled;
        Ok(())
    }
}

fn validate_spread(spread: Bps) -> Result<(), ProductError> {
    if spread.value() <= 0 || spread.value() >= MAX_SPREAD_BPS {
        return Err(ProductError::InvalidSpread(spread));
    }
    Ok(())
}

fn validate_funding_rate(rate: Decimal) -> Result<(), ProductError> {
    if rate < Decimal::ZERO {
        return Err(ProductError::InvalidFundingRate(rate));
    }
    Ok(())
}

fn validate_max_risk(max_risk: Quote) -> Result<(), ProductError> {
    if max_risk.is_negative() {
        return Err(ProductError::InvalidMaxRisk(max_risk));
    }
    Ok(())
}
