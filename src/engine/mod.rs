// 8.0: settlement engine. single sequential entry point over the product registry,
// order queue, position ledger and treasury. submit now, settle later at the price
// the feed supplies. deterministic with no external I/O; block numbers are the only clock.

mod admin;
mod config;
mod core;
mod liquidations;
mod orders;
mod positions;
mod results;
mod settlement;
mod treasury;

pub use config::EngineConfig;
pub use core::Engine;
pub use results::{EngineError, OrderOutcome, SettlementReport};
