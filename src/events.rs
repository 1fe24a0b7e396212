// 11.0: every state change produces an event. off-chain consumers (liquidation bots,
// indexers) follow the ledger through these. the EventPayload enum lists all event types.

use crate::types::{AccountId, BlockNumber, Bps, Currency, Leverage, OrderId, PositionId, Price, Quote, Side, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub block: BlockNumber,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, block: BlockNumber, payload: EventPayload) -> Self {
        Self { id, block, payload }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Queue events
    OrderSubmitted(OrderSubmittedEvent),
    LiquidationSubmitted(LiquidationSubmittedEvent),
    OrderCancelled(OrderCancelledEvent),

    // Position events
    PositionOpened(PositionOpenedEvent),
    PositionMarginAdded(PositionMarginAddedEvent),
    PositionClosed(PositionClosedEvent),
    PositionLiquidated(PositionLiquidatedEvent),

    // Treasury events
    Deposit(DepositEvent),
    Withdrawal(WithdrawalEvent),
    WithdrawalRejected(WithdrawalRejectedEvent),
    AdminWithdrawal(AdminWithdrawalEvent),
    TreasuryFunded(TreasuryFundedEvent),
    WithdrawalLimitUpdated(Currency),
    SystemFundsThresholdUpdated(Currency),
    OracleFundingLimitUpdated(Currency),
    PriceFeedFunded(PriceFeedFundedEvent),

    // Admin events
    ProductRegistered(ProductRegisteredEvent),
    ProductUpdated(ProductUpdatedEvent),
    Paused(AccountId),
    Unpaused(AccountId),
}

impl EventPayload {
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::OrderSubmitted(_) => "OrderSubmitted",
            EventPayload::LiquidationSubmitted(_) => "LiquidationSubmitted",
            EventPayload::OrderCancelled(_) => "OrderCancelled",
            EventPayload::PositionOpened(_) => "PositionOpened",
            EventPayload::PositionMarginAdded(_) => "PositionMarginAdded",
            EventPayload::PositionClosed(_) => "PositionClosed",
            EventPayload::PositionLiquidated(_) => "PositionLiquidated",
            EventPayload::Deposit(_) => "Deposit",
            EventPayload::Withdrawal(_) => "Withdrawal",
            EventPayload::WithdrawalRejected(_) => "WithdrawalRejected",
            EventPayload::AdminWithdrawal(_) => "AdminWithdrawal",
            EventPayload::TreasuryFunded(_) => "TreasuryFunded",
            EventPayload::WithdrawalLimitUpdated(_) => "WithdrawalLimitUpdated",
            EventPayload::SystemFundsThresholdUpdated(_) => "SystemFundsThresholdUpdated",
            EventPayload::OracleFundingLimitUpdated(_) => "OracleFundingLimitUpdated",
            EventPayload::PriceFeedFunded(_) => "PriceFeedFunded",
            EventPayload::ProductRegistered(_) => "ProductRegistered",
            EventPayload::ProductUpdated(_) => "ProductUpdated",
            EventPayload::Paused(_) => "Paused",
            EventPayload::Unpaused(_) => "Unpaused",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSubmittedEvent {
    pub id: OrderId,
    pub position_id: Option<PositionId>,
    pub sender: AccountId,
    pub side: Side,
    pub symbol: Symbol,
    pub margin: Quote,
    pub leverage: Leverage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationSubmittedEvent {
    pub id: OrderId,
    pub position_id: PositionId,
    pub sender: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub id: OrderId,
    pub position_id: Option<PositionId>,
    pub reason: CancelReason,
}

/// Why a queued order was cancelled at settlement. `code()` is the short reason string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    Unavailable,
    RiskReached,
    TooMuchMargin,
    NotFound,
    Unauthorized,
    InvalidMargin,
    InsufficientBalance,
    InvalidLeverage,
    MaxLeverage,
    Disabled,
    Failed,
}

impl CancelReason {
    pub fn code(&self) -> &'static str {
        match self {
            CancelReason::Unavailable => "!unavailable",
            CancelReason::RiskReached => "!risk_reached",
            CancelReason::TooMuchMargin => "!too_much_margin",
            CancelReason::NotFound => "!found",
            CancelReason::Unauthorized => "!authorized",
            CancelReason::InvalidMargin => "!margin",
            CancelReason::InsufficientBalance => "!balance",
            CancelReason::InvalidLeverage => "!leverage",
            CancelReason::MaxLeverage => "!max_leverage",
            CancelReason::Disabled => "!disabled",
            CancelReason::Failed => "!failed",
        }
    }

    // maps an error reason string back to a cancel reason. anything unrecognised is opaque.
    pub fn from_code(code: &str) -> Self {
        match code {
            "!unavailable" => CancelReason::Unavailable,
            "!risk_reached" => CancelReason::RiskReached,
            "!too_much_margin" => CancelReason::TooMuchMargin,
            "!found" => CancelReason::NotFound,
            "!authorized" => CancelReason::Unauthorized,
            "!margin" => CancelReason::InvalidMargin,
            "!balance" => CancelReason::InsufficientBalance,
            "!leverage" => CancelReason::InvalidLeverage,
            "!max_leverage" => CancelReason::MaxLeverage,
            "!disabled" => CancelReason::Disabled,
            _ => CancelReason::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub position_id: PositionId,
    pub owner: AccountId,
    pub side: Side,
    pub symbol: Symbol,
    pub margin: Quote,
    pub leverage: Leverage,
    pub price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionMarginAddedEvent {
    pub position_id: PositionId,
    pub new_margin: Quote,
    pub old_margin: Quote,
    pub new_leverage: Leverage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub position_id: PositionId,
    pub entry_price: Price,
    pub price: Price,
    pub leverage: Leverage,
    pub margin_closed: Quote,
    pub amount_to_return: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLiquidatedEvent {
    pub position_id: PositionId,
    /// Owner of the liquidated position.
    pub sender: AccountId,
    pub liquidator: AccountId,
    pub margin_liquidated: Quote,
    pub reward: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub account_id: AccountId,
    pub amount: Quote,
    pub free_margin: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub account_id: AccountId,
    pub amount: Quote,
    pub from_balance: Currency,
    pub from_system: Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRejectedEvent {
    pub account_id: AccountId,
    pub amount: Quote,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminWithdrawalEvent {
    pub to: AccountId,
    pub amount: Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryFundedEvent {
    pub amount: Quote,
    pub currency_balance: Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeedFundedEvent {
    pub to: AccountId,
    pub amount: Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRegisteredEvent {
    pub symbol: Symbol,
    pub max_leverage: Leverage,
    pub spread: Bps,
    pub funding_rate: Decimal,
    pub max_risk: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductUpdatedEvent {
    pub symbol: Symbol,
    pub change: ProductChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductChange {
    MaxLeverage(Leverage),
    Spread(Bps),
    FundingRate(Decimal),
    MaxRisk(Quote),
    Disabled,
    Enabled,
}

// bounded in-memory log. oldest events drop off once max_events is reached.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Vec<Event>,
    next_id: u64,
    max_events: usize,
}

impl EventLog {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            max_events,
        }
    }

    pub fn record(&mut self, block: BlockNumber, payload: EventPayload) -> &Event {
        let id = EventId(self.next_id);
        self.next_id += 1;

        if self.events.len() >= self.max_events {
            let drain_count = self.events.len() + 1 - self.max_events;
            self.events.drain(0..drain_count.min(self.events.len()));
        }
        self.events.push(Event::new(id, block, payload));
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
