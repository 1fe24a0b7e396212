//! Engine configuration options.

use crate::config::LedgerConfig;
use crate::types::AccountId;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Admin account: products, pause switch, treasury limits.
    pub owner: AccountId,
    /// The only account allowed to call `settle`.
    pub price_feed: AccountId,
    pub ledger: LedgerConfig,
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
}

impl EngineConfig {
    pub fn new(owner: AccountId, price_feed: AccountId, ledger: LedgerConfig) -> Self {
        Self {
            owner,
            price_feed,
            ledger,
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            owner: AccountId(0),
            price_feed: AccountId(0),
            ledger: LedgerConfig::default(),
            max_events: 100_000,
        }
    }
}
