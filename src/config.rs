// 7.0 config.rs: all ledger settings in one place. queue depth, margin floor,
// liquidation reward, withdrawal guardrails, logging.
// 7.1 presets per environment, validate() before handing a config to the engine.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::treasury::TreasuryLimits;
use crate::types::{Currency, Quote};

/** 7.2: ledger parameters. amounts are position-layer (8 decimal) values */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    // Smallest margin accepted for a new position
    pub min_margin: Quote,
    // Pending orders the queue holds before rejecting with !full
    pub max_queue_depth: usize,
    // Share of liquidated margin paid to the liquidator, in percent
    pub liquidator_reward_pct: Decimal,
    // Positions one liquidate_positions call may target
    pub max_liquidations_per_call: usize,
    // Length of the rolling withdrawal window in blocks (~1 day at 15s blocks)
    pub daily_block_count: u64,
    // System funds that may leave per window
    pub daily_withdrawal_limit: Quote,
    // Buffer the treasury must keep above what users are owed
    pub system_funds_threshold: Quote,
    // System funds the price feed may draw per window to pay for its updates
    pub daily_oracle_funding_limit: Quote,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            min_margin: Quote::new(dec!(10)),
            max_queue_depth: 10,
            liquidator_reward_pct: dec!(5),
            max_liquidations_per_call: 5,
            daily_block_count: 5760,
            daily_withdrawal_limit: Quote::new(dec!(10000)),
            system_funds_threshold: Quote::zero(),
            daily_oracle_funding_limit: Quote::zero(),
        }
    }
}

impl LedgerConfig {
    // Create a configuration preset for testnet
    pub fn testnet() -> Self {
        Self {
            min_margin: Quote::new(dec!(1)),
            daily_withdrawal_limit: Quote::new(dec!(1_000_000)),
            ..Self::default()
        }
    }

    // Create a configuration preset for mainnet with conservative settings
    pub fn mainnet_conservative() -> Self {
        Self {
            min_margin: Quote::new(dec!(50)),
            liquidator_reward_pct: dec!(2.5),
            daily_withdrawal_limit: Quote::new(dec!(5000)),
            system_funds_threshold: Quote::new(dec!(1000)),
            ..Self::default()
        }
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_margin.is_positive() {
            return Err(ConfigError::InvalidMargin {
                reason: "min margin must be positive".to_string(),
            });
        }

        if self.max_queue_depth == 0 {
            return Err(ConfigError::InvalidQueue {
                reason: "queue must hold at least one order".to_string(),
            });
        }

        // the reward is carved out of the liquidated margin
        if self.liquidator_reward_pct < Decimal::ZERO || self.liquidator_reward_pct > dec!(100) {
            return Err(ConfigError::InvalidLiquidation {
                reason: "liquidator reward must be between 0 and 100 percent".to_string(),
            });
        }

        if self.max_liquidations_per_call == 0 {
            return Err(ConfigError::InvalidLiquidation {
                reason: "need at least one liquidation per call".to_string(),
            });
        }

        if self.daily_block_count == 0 {
            return Err(ConfigError::InvalidTreasury {
                reason: "withdrawal window must span at least one block".to_string(),
            });
        }

        if self.daily_withdrawal_limit.is_negative()
            || self.system_funds_threshold.is_negative()
            || self.daily_oracle_funding_limit.is_negative()
        {
            return Err(ConfigError::InvalidTreasury {
                reason: "treasury limits and threshold cannot be negative".to_string(),
            });
        }

        Ok(())
    }

    pub fn treasury_limits(&self) -> TreasuryLimits {
        TreasuryLimits {
            daily_withdrawal_limit: self.daily_withdrawal_limit.to_currency(),
            system_funds_threshold: self.system_funds_threshold.to_currency(),
            daily_oracle_funding_limit: self.daily_oracle_funding_limit.to_currency(),
            daily_block_count: self.daily_block_count,
        }
    }
}

/// Logging setup for binaries embedding the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. "info" or "queued_settlement=debug".
    pub level: String,
    /// "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Installs the global subscriber. A second call is a no-op.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        // Err means a subscriber is already installed
        let _ = match self.format.as_str() {
            "json" => tracing_subscriber::fmt().json().with_env_filter(filter).try_init(),
            _ => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        };
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid margin config: {reason}")]
    InvalidMargin { reason: String },

    #[error("invalid queue config: {reason}")]
    InvalidQueue { reason: String },

    #[error("invalid liquidation config: {reason}")]
    InvalidLiquidation { reason: String },

    #[error("invalid treasury config: {reason}")]
    InvalidTreasury { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> LedgerConfig {
        match self {
            Environment::Development => LedgerConfig::default(),
            Environment::Testnet => LedgerConfig::testnet(),
            Environment::Mainnet => LedgerConfig::mainnet_conservative(),
        }
    }
}
