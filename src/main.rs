//! Queued settlement simulation.
//!
//! Walks the ledger through its lifecycle: queued opens settled by a lagging
//! price feed, partial closes, margin top-ups, risk caps, liquidations and
//! treasury withdrawals.

use queued_settlement::*;
use rust_decimal_macros::dec;

const OWNER: AccountId = AccountId(1000);
const FEED: AccountId = AccountId(1001);

fn main() {
    LoggingConfig::default().init();

    println!("Queued Settlement Engine Simulation");
    println!("Submit now, settle later at the feed's price\n");

    let scenarios: [(&str, fn() -> Result<(), EngineError>); 5] = [
        ("Scenario 1: Open and Close", scenario_1_open_and_close),
        ("Scenario 2: Partial Batches", scenario_2_partial_batches),
        ("Scenario 3: Risk Cap", scenario_3_risk_cap),
        ("Scenario 4: Liquidation", scenario_4_liquidation),
        ("Scenario 5: Treasury Guards", scenario_5_treasury_guards),
    ];

    for (name, scenario) in scenarios {
        println!("{name}\n");
        if let Err(e) = scenario() {
            println!("  failed: {e} ({})", e.code());
            std::process::exit(1);
        }
        println!();
    }

    println!("All simulations completed successfully.");
}

fn new_engine(max_risk: Quote) -> Result<Engine, EngineError> {
    let mut engine = Engine::new(EngineConfig::new(OWNER, FEED, LedgerConfig::default()))?;
    engine.register_products(
        OWNER,
        vec![ProductParams::new("ETH-USD", dec!(100), Bps::new(10), dec!(0.00000002), max_risk)],
    )?;
    Ok(engine)
}

fn describe(report: &SettlementReport) {
    for (id, outcome) in &report.outcomes {
        match outcome {
            OrderOutcome::Cancelled { reason } => println!("  {id}: cancelled {}", reason.code()),
            other => println!("  {id}: {other:?}"),
        }
    }
}

/// Open at 400, close at the same raw price: the round trip costs the spread.
fn scenario_1_open_and_close() -> Result<(), EngineError> {
    let mut engine = new_engine(Quote::new(dec!(3000000)))?;
    let alice = AccountId(1);
    engine.deposit(alice, Quote::new(dec!(1000)))?;

    let open = engine.submit_order(alice, Side::Long, "ETH-USD", Quote::new(dec!(40)), dec!(10))?;
    println!("  Alice queues LONG 40 @ 10x as {open}");
    describe(&engine.settle(FEED, &[dec!(400)], open, open.next())?);

    let position_id = PositionId::from(open);
    if let Some(p) = engine.position(position_id) {
        println!("  entry {} (spread applied), free margin {}", p.entry_price, engine.user_free_margin(alice));
    }

    engine.advance_blocks(2);
    let close = engine.submit_order_update(alice, position_id, Side::Short, Quote::new(dec!(40)))?;
    describe(&engine.settle(FEED, &[dec!(400)], close, close.next())?);
    println!(
        "  free margin {}, realized balance {}",
        engine.user_free_margin(alice),
        engine.user_balance(alice)
    );
    Ok(())
}

/// The feed lags: it prices a prefix, the rest stays queued. A zero price cancels.
fn scenario_2_partial_batches() -> Result<(), EngineError> {
    let mut engine = new_engine(Quote::new(dec!(3000000)))?;
    let traders = [AccountId(1), AccountId(2), AccountId(3)];
    for t in traders {
        engine.deposit(t, Quote::new(dec!(500)))?;
        engine.submit_order(t, Side::Long, "ETH-USD", Quote::new(dec!(50)), dec!(5))?;
    }

    let queued = engine.queued_orders();
    println!("  queued [{}, {}) for {:?}", queued.first_id.0, queued.last_id.0, queued.symbols);

    describe(&engine.settle(FEED, &[dec!(400), dec!(0)], queued.first_id, OrderId(queued.first_id.0 + 2))?);
    println!("  {} order left in queue", engine.queue_len());

    let rest = engine.queued_orders();
    describe(&engine.settle(FEED, &[dec!(401)], rest.first_id, rest.last_id)?);

    // a range that skips the head is refused outright
    if let Err(e) = engine.settle(FEED, &[dec!(400)], OrderId(9), OrderId(10)) {
        println!("  out of order settle rejected: {}", e.code());
    }
    Ok(())
}

/// Three opens fit under the cap, the fourth is cancelled.
fn scenario_3_risk_cap() -> Result<(), EngineError> {
    let mut engine = new_engine(Quote::new(dec!(1500)))?;
    for i in 1..=4 {
        let trader = AccountId(i);
        engine.deposit(trader, Quote::new(dec!(100)))?;
        let id = engine.submit_order(trader, Side::Long, "ETH-USD", Quote::new(dec!(40)), dec!(10))?;
        describe(&engine.settle(FEED, &[dec!(400)], id, id.next())?);
        println!("  exposure after trader {i}: {}", engine.risk("ETH-USD"));
    }
    Ok(())
}

/// A keeper liquidates an underwater long and collects the reward.
fn scenario_4_liquidation() -> Result<(), EngineError> {
    let mut engine = new_engine(Quote::new(dec!(3000000)))?;
    let (alice, keeper) = (AccountId(1), AccountId(2));
    engine.deposit(alice, Quote::new(dec!(100)))?;

    let open = engine.submit_order(alice, Side::Long, "ETH-USD", Quote::new(dec!(40)), dec!(10))?;
    engine.settle(FEED, &[dec!(400)], open, open.next())?;

    let ids = engine.liquidate_positions(keeper, &[PositionId::from(open)])?;
    let first = ids.first().copied().unwrap_or(open);
    describe(&engine.settle(FEED, &[dec!(365)], first, first.next())?);
    println!(
        "  alice free margin {}, keeper free margin {}",
        engine.user_free_margin(alice),
        engine.user_free_margin(keeper)
    );
    Ok(())
}

/// Withdrawals beyond realized balance hit the daily limit and the threshold; the price feed draws on its own cap.
fn scenario_5_treasury_guards() -> Result<(), EngineError> {
    let mut engine = new_engine(Quote::new(dec!(3000000)))?;
    let alice = AccountId(1);
    engine.deposit(alice, Quote::new(dec!(20000)))?;
    engine.set_withdrawal_limit(OWNER, Quote::new(dec!(1000)))?;

    engine.withdraw(alice, Quote::new(dec!(800)))?;
    println!("  withdrew 800 of system funds");
    if let Err(e) = engine.withdraw(alice, Quote::new(dec!(300))) {
        println!("  next 300 rejected: {}", e.code());
    }

    engine.advance_blocks(5761);
    engine.withdraw(alice, Quote::new(dec!(300)))?;
    println!("  after a day of blocks the window reset, treasury holds {}", engine.treasury_balance());

    // deposits are never surplus; only outside funding is
    engine.fund_treasury(Quote::new(dec!(500)))?;
    engine.set_oracle_funding_limit(OWNER, Quote::new(dec!(100)))?;
    let funded = engine.fund_price_feed(FEED, Quote::new(dec!(100)))?;
    println!("  price feed drew {funded}, surplus left {}", engine.treasury().system_surplus());
    if let Err(e) = engine.fund_price_feed(FEED, Quote::new(dec!(1))) {
        println!("  second draw rejected: {}", e.code());
    }
    Ok(())
}
