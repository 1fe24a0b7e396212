//! Bounded FIFO of intents waiting for a price.
//!
//! Ids are handed out sequentially from 1 and the queue always holds the
//! contiguous range `[head, next_id)`. Settlement can only consume from the head,
//! so an id range that does not start there is rejected before anything moves.

use crate::types::{AccountId, Leverage, OrderId, PositionId, Quote, Side, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue is full ({capacity} pending orders)")]
    Full { capacity: usize },

    #[error("settlement range [{first}, {last}) out of order, queue head is {head} and next id is {next}")]
    OutOfOrder {
        first: OrderId,
        last: OrderId,
        head: OrderId,
        next: OrderId,
    },

    #[error("expected {expected} prices for the range, got {provided}")]
    PriceCount { expected: usize, provided: usize },
}

impl QueueError {
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::Full { .. } => "!full",
            QueueError::OutOfOrder { .. } => "!order",
            QueueError::PriceCount { .. } => "!prices",
        }
    }
}

// what the order does once its price arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderIntent {
    Open,
    /// Same side as the position adds margin, opposite side closes.
    Modify(PositionId),
    /// Forced close on behalf of the order's sender.
    Liquidate(PositionId),
}

/// Everything an intent carries except its id, which the queue assigns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub sender: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    pub margin: Quote,
    pub leverage: Leverage,
    pub intent: OrderIntent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    pub id: OrderId,
    pub sender: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    pub margin: Quote,
    pub leverage: Leverage,
    pub intent: OrderIntent,
}

impl PendingOrder {
    fn from_request(id: OrderId, request: OrderRequest) -> Self {
        Self {
            id,
            sender: request.sender,
            symbol: request.symbol,
            side: request.side,
            margin: request.margin,
            leverage: request.leverage,
            intent: request.intent,
        }
    }

    // None for opens
    pub fn position_id(&self) -> Option<PositionId> {
        match self.intent {
            OrderIntent::Open => None,
            OrderIntent::Modify(id) | OrderIntent::Liquidate(id) => Some(id),
        }
    }

    pub fn liquidator(&self) -> Option<AccountId> {
        match self.intent {
            OrderIntent::Liquidate(_) => Some(self.sender),
            _ => None,
        }
    }
}

/// Snapshot a price feed uses to decide what to price next.
/// `last_id` is exclusive, so an empty queue reports `first_id == last_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedOrders {
    pub symbols: Vec<Symbol>,
    pub first_id: OrderId,
    pub last_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderQueue {
    orders: VecDeque<PendingOrder>,
    next_id: OrderId,
    capacity: usize,
}

impl OrderQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            orders: VecDeque::with_capacity(capacity),
            next_id: OrderId(1),
            capacity,
        }
    }

    pub fn enqueue(&mut self, request: OrderRequest) -> Result<OrderId, QueueError> {
        if self.is_full() {
            return Err(QueueError::Full { capacity: self.capacity });
        }
        let id = self.next_id;
        self.next_id = id.next();
        self.orders.push_back(PendingOrder::from_request(id, request));
        Ok(id)
    }

    /// Checks a settlement call against the queue without touching it.
    pub fn validate_range(&self, first: OrderId, last: OrderId, price_count: usize) -> Result<(), QueueError> {
        let head = self.head_id();
        if first != head || last < first || last > self.next_id {
            return Err(QueueError::OutOfOrder {
                first,
                last,
                head,
                next: self.next_id,
            });
        }

        let expected = (last.0 - first.0) as usize;
        if price_count != expected {
            return Err(QueueError::PriceCount {
                expected,
                provided: price_count,
            });
        }
        Ok(())
    }

    pub fn pop_front(&mut self) -> Option<PendingOrder> {
        self.orders.pop_front()
    }

    // id of the oldest pending order, or the next id to be assigned when empty
    pub fn head_id(&self) -> OrderId {
        self.orders.front().map(|o| o.id).unwrap_or(self.next_id)
    }

    pub fn next_id(&self) -> OrderId {
        self.next_id
    }

    pub fn queued_orders(&self) -> QueuedOrders {
        QueuedOrders {
            symbols: self.orders.iter().map(|o| o.symbol.clone()).collect(),
            first_id: self.head_id(),
            last_id: self.next_id,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingOrder> {
        self.orders.iter()
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.orders.len())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.orders.len() >= self.capacity
    }
}
