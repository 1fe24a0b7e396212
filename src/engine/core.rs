// 8.0 engine/core.rs: main engine. owns the product registry, order queue,
// open positions, risk accumulators and treasury. queries live here too.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::events::{Event, EventLog, EventPayload};
use crate::position::Position;
use crate::product::{Product, ProductRegistry};
use crate::queue::{OrderQueue, PendingOrder, QueuedOrders};
use crate::risk::RiskBook;
use crate::treasury::{Treasury, TreasuryAccount};
use crate::types::{AccountId, BlockNumber, Currency, PositionId, Quote, SignedNotional};
use std::collections::BTreeMap;
use tracing::debug;

/** 8.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) products: ProductRegistry,
    pub(super) queue: OrderQueue,
    pub(super) positions: BTreeMap<PositionId, Position>,
    pub(super) risk: RiskBook,
    pub(super) treasury: Treasury,
    pub(super) events: EventLog,
    pub(super) current_block: BlockNumber,
    pub(super) paused: bool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.ledger.validate()?;
        Ok(Self {
            products: ProductRegistry::new(),
            queue: OrderQueue::new(config.ledger.max_queue_depth),
            positions: BTreeMap::new(),
            risk: RiskBook::new(),
            treasury: Treasury::new(config.ledger.treasury_limits()),
            events: EventLog::new(config.max_events),
            current_block: BlockNumber(0),
            paused: false,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_block(&mut self, block: BlockNumber) {
        self.current_block = block;
    }

    pub fn block(&self) -> BlockNumber {
        self.current_block
    }

    pub fn advance_blocks(&mut self, blocks: u64) {
        self.current_block = self.current_block.advance(blocks);
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // 8.1.1: position queries

    pub fn position(&self, position_id: PositionId) -> Option<&Position> {
        self.positions.get(&position_id)
    }

    /// Open positions owned by `user`, oldest first.
    pub fn user_positions(&self, user: AccountId) -> Vec<&Position> {
        self.positions.values().filter(|p| p.owner == user).collect()
    }

    pub fn positions_iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn risk(&self, symbol: &str) -> SignedNotional {
        self.risk.exposure(symbol)
    }

    // 8.1.2: treasury queries

    pub fn user_free_margin(&self, user: AccountId) -> Quote {
        self.treasury.free_margin(user)
    }

    pub fn user_balance(&self, user: AccountId) -> Currency {
        self.treasury.balance(user)
    }

    pub fn treasury_account(&self, user: AccountId) -> TreasuryAccount {
        self.treasury.account(user)
    }

    pub fn treasury_balance(&self) -> Currency {
        self.treasury.currency_balance()
    }

    pub fn total_user_balance(&self) -> Currency {
        self.treasury.total_user_balance()
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    // 8.1.3: queue and product queries

    pub fn queued_orders(&self) -> QueuedOrders {
        self.queue.queued_orders()
    }

    pub fn pending_orders(&self) -> impl Iterator<Item = &PendingOrder> {
        self.queue.iter()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn product(&self, symbol: &str) -> Option<&Product> {
        self.products.get(symbol).ok()
    }

    pub fn products(&self) -> &ProductRegistry {
        &self.products
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        self.events.recent(count)
    }

    pub(super) fn ensure_owner(&self, sender: AccountId) -> Result<(), EngineError> {
        if sender != self.config.owner {
            return Err(EngineError::Unauthorized(sender));
        }
        Ok(())
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = self.events.record(self.current_block, payload);
        debug!(
            event_id = event.id.0,
            block = event.block.0,
            kind = event.payload.name(),
            payload = ?event.payload,
            "ledger event"
        );
    }
}
