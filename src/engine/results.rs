// 8.0.2: result types and errors for engine operations.

use crate::config::ConfigError;
use crate::events::CancelReason;
use crate::position::PositionError;
use crate::product::ProductError;
use crate::queue::QueueError;
use crate::risk::RiskError;
use crate::treasury::TreasuryError;
use crate::types::{AccountId, Leverage, OrderId, PositionId, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What happened to one queued order during `settle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderOutcome {
    Opened {
        position_id: PositionId,
    },
    MarginAdded {
        position_id: PositionId,
        new_leverage: Leverage,
    },
    Closed {
        position_id: PositionId,
        amount_to_return: Quote,
        /// Loss consumed the whole closed margin.
        wiped_out: bool,
    },
    Liquidated {
        position_id: PositionId,
        margin: Quote,
        reward: Quote,
    },
    Cancelled {
        reason: CancelReason,
    },
}

impl OrderOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrderOutcome::Cancelled { .. })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettlementReport {
    pub outcomes: Vec<(OrderId, OrderOutcome)>,
}

impl SettlementReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcome(&self, id: OrderId) -> Option<&OrderOutcome> {
        self.outcomes.iter().find(|(order_id, _)| *order_id == id).map(|(_, o)| o)
    }

    pub fn executed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| !o.is_cancelled()).count()
    }

    pub fn cancelled(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_cancelled()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("{0} is not authorized for this operation")]
    Unauthorized(AccountId),

    #[error("order submission is paused")]
    Paused,

    #[error("leverage {0} is below 1x")]
    InvalidLeverage(Decimal),

    #[error("leverage {requested} exceeds product max {max}")]
    ExceedsMaxLeverage { requested: Leverage, max: Leverage },

    #[error("margin {margin} is invalid (minimum {minimum})")]
    InvalidMargin { margin: Quote, minimum: Quote },

    #[error("position {0} not found")]
    PositionNotFound(PositionId),

    #[error("{requested} liquidations exceeds the per-call maximum of {max}")]
    TooManyOperations { requested: usize, max: usize },

    #[error("no price available for order {0}")]
    MarketUnavailable(OrderId),

    #[error("fixed point overflow")]
    Arithmetic,

    #[error("Product error: {0}")]
    Product(#[from] ProductError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    #[error("Risk error: {0}")]
    Risk(#[from] RiskError),

    #[error("Treasury error: {0}")]
    Treasury(#[from] TreasuryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Short machine-readable reason surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Unauthorized(_) => "!authorized",
            EngineError::Paused => "!paused",
            EngineError::InvalidLeverage(_) => "!leverage",
            EngineError::ExceedsMaxLeverage { .. } => "!max_leverage",
            EngineError::InvalidMargin { .. } => "!margin",
            EngineError::PositionNotFound(_) => "!found",
            EngineError::TooManyOperations { .. } => "!max_operations",
            EngineError::MarketUnavailable(_) => "!unavailable",
            EngineError::Arithmetic => "!failed",
            EngineError::Product(e) => e.code(),
            EngineError::Queue(e) => e.code(),
            EngineError::Position(e) => e.code(),
            EngineError::Risk(e) => e.code(),
            EngineError::Treasury(e) => e.code(),
            EngineError::Config(_) => "!config",
        }
    }

    pub fn cancel_reason(&self) -> CancelReason {
        CancelReason::from_code(self.code())
    }
}
