// queued-settlement: leveraged positions settled against prices that arrive after submission.
// users queue intents, a price feed later settles a contiguous id range, the ledger opens,
// adjusts, closes or liquidates and moves collateral through the treasury.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: ids, Symbol, Side, Price, Quote, Currency, Leverage, fixed point
//   2.x  product.rs: product registry, per-symbol params, soft disable
//   3.x  queue.rs: bounded FIFO of pending intents, settlement range checks
//   4.x  position.rs: position record, spread, close pnl/funding, add-margin math
//   5.x  risk.rs: per-product signed exposure accumulator and cap
//   6.x  treasury.rs: custody, free margin vs realized balance, withdrawal guards
//   7.x  config.rs: ledger params, logging, env presets
//   8.x  engine/: submission, settlement, positions, liquidations, treasury flows, admin
//   11.x events.rs: state transition events for audit

// ledger components
pub mod position;
pub mod product;
pub mod queue;
pub mod risk;
pub mod treasury;
pub mod types;

// engine and integration
pub mod config;
pub mod engine;
pub mod events;

// re exports for convenience
pub use config::{ConfigError, Environment, LedgerConfig, LoggingConfig};
pub use engine::*;
pub use events::*;
pub use position::*;
pub use product::*;
pub use queue::*;
pub use risk::*;
pub use treasury::*;
pub use types::*;
