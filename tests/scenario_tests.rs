//! End-to-end settlement scenarios.
//!
//! Each test drives the engine through submit and settle the way a user and a
//! price feed would, then checks positions, risk and treasury state.

use queued_settlement::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const OWNER: AccountId = AccountId(100);
const FEED: AccountId = AccountId(101);
const ALICE: AccountId = AccountId(1);
const BOB: AccountId = AccountId(2);
const KEEPER: AccountId = AccountId(3);

fn engine_with_cap(max_risk: Decimal) -> Engine {
    let mut engine = Engine::new(EngineConfig::new(OWNER, FEED, LedgerConfig::default())).unwrap();
    engine
        .register_products(
            OWNER,
            vec![ProductParams::new(
                "ETH-USD",
                dec!(100),
                Bps::new(10),
                dec!(0.00000002),
                Quote::new(max_risk),
            )],
        )
        .unwrap();
    engine
}

fn engine() -> Engine {
    engine_with_cap(dec!(3000000))
}

fn q(v: Decimal) -> Quote {
    Quote::new(v)
}

fn settle_one(engine: &mut Engine, id: OrderId, price: Decimal) -> OrderOutcome {
    let report = engine.settle(FEED, &[price], id, id.next()).unwrap();
    report.outcome(id).cloned().unwrap()
}

// alice: deposit 1000, long 40 @ 10x settled at 400
fn open_alice(engine: &mut Engine) -> PositionId {
    engine.deposit(ALICE, q(dec!(1000))).unwrap();
    let id = engine.submit_order(ALICE, Side::Long, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();
    assert_eq!(settle_one(engine, id, dec!(400)), OrderOutcome::Opened { position_id: PositionId(id.0) });
    PositionId::from(id)
}

mod lifecycle {
    use super::*;

    #[test]
    fn open_debits_free_margin_at_settlement() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);

        let position = engine.position(position_id).unwrap();
        assert_eq!(position.entry_price.value(), dec!(400.4));
        assert_eq!(position.margin.value(), dec!(40));
        assert_eq!(engine.user_free_margin(ALICE).value(), dec!(960));
        assert_eq!(engine.risk("ETH-USD").value(), dec!(400));
        assert_eq!(engine.user_positions(ALICE).len(), 1);
    }

    #[test]
    fn close_at_same_price_returns_less_than_margin() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);
        engine.advance_blocks(2);

        let close = engine.submit_order_update(ALICE, position_id, Side::Short, q(dec!(40))).unwrap();
        let outcome = settle_one(&mut engine, close, dec!(400));

        assert_eq!(
            outcome,
            OrderOutcome::Closed {
                position_id,
                amount_to_return: q(dec!(39.200784)),
                wiped_out: false,
            }
        );
        assert!(engine.position(position_id).is_none());
        assert!(engine.risk("ETH-USD").is_zero());
        assert_eq!(engine.user_free_margin(ALICE).value(), dec!(999.200784));
        // a losing round trip realizes nothing
        assert!(engine.user_balance(ALICE).is_zero());
        assert!(engine.total_user_balance().is_zero());
    }

    #[test]
    fn close_at_crushing_price_returns_zero() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);
        engine.advance_blocks(2);

        let close = engine.submit_order_update(ALICE, position_id, Side::Short, q(dec!(40))).unwrap();
        match settle_one(&mut engine, close, dec!(300)) {
            OrderOutcome::Closed { amount_to_return, wiped_out, .. } => {
                assert!(amount_to_return.is_zero());
                assert!(wiped_out);
            }
            other => panic!("expected close, got {other:?}"),
        }
        assert!(engine.user_positions(ALICE).is_empty());
        assert_eq!(engine.user_free_margin(ALICE).value(), dec!(960));
        assert!(engine.user_balance(ALICE).is_zero());
    }

    #[test]
    fn funding_accrues_per_block() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);
        engine.advance_blocks(1000);

        let close = engine.submit_order_update(ALICE, position_id, Side::Short, q(dec!(40))).unwrap();
        // spread loss 0.7992, funding 400 * 0.00000002 * 1000 = 0.008
        match settle_one(&mut engine, close, dec!(400)) {
            OrderOutcome::Closed { amount_to_return, .. } => assert_eq!(amount_to_return.value(), dec!(39.1928)),
            other => panic!("expected close, got {other:?}"),
        }
    }

    #[test]
    fn profitable_close_credits_realized_balance() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);

        let close = engine.submit_order_update(ALICE, position_id, Side::Short, q(dec!(40))).unwrap();
        // exit 439.56, ratio trunc8(39.16 / 400.4) = 0.09780219
        match settle_one(&mut engine, close, dec!(440)) {
            OrderOutcome::Closed { amount_to_return, .. } => {
                assert_eq!(amount_to_return.value(), dec!(79.120876))
            }
            other => panic!("expected close, got {other:?}"),
        }
        // only the 39.120876 of profit is realized; the margin comes back as free margin
        assert_eq!(engine.user_free_margin(ALICE).value(), dec!(1039.120876));
        assert_eq!(engine.user_balance(ALICE).value(), dec!(39.120876));
        assert_eq!(engine.total_user_balance().value(), dec!(39.120876));
    }

    #[test]
    fn partial_close_shrinks_position_and_risk() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);

        let close = engine.submit_order_update(ALICE, position_id, Side::Short, q(dec!(10))).unwrap();
        match settle_one(&mut engine, close, dec!(400)) {
            OrderOutcome::Closed { amount_to_return, .. } => assert_eq!(amount_to_return.value(), dec!(9.8002)),
            other => panic!("expected close, got {other:?}"),
        }

        let position = engine.position(position_id).unwrap();
        assert_eq!(position.margin.value(), dec!(30));
        assert_eq!(position.leverage.value(), dec!(10));
        assert_eq!(engine.risk("ETH-USD").value(), dec!(300));
    }

    #[test]
    fn second_close_over_remaining_margin_is_cancelled() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);

        let first = engine.submit_order_update(ALICE, position_id, Side::Short, q(dec!(30))).unwrap();
        let second = engine.submit_order_update(ALICE, position_id, Side::Short, q(dec!(20))).unwrap();
        let report = engine.settle(FEED, &[dec!(400), dec!(400)], first, second.next()).unwrap();

        assert!(matches!(report.outcome(first), Some(OrderOutcome::Closed { .. })));
        assert_eq!(
            report.outcome(second),
            Some(&OrderOutcome::Cancelled { reason: CancelReason::InvalidMargin })
        );
        assert_eq!(engine.position(position_id).unwrap().margin.value(), dec!(10));
    }

    #[test]
    fn close_margin_checked_at_admission() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);

        let err = engine
            .submit_order_update(ALICE, position_id, Side::Short, q(dec!(41)))
            .unwrap_err();
        assert_eq!(err.code(), "!margin");

        let err = engine
            .submit_order_update(BOB, position_id, Side::Short, q(dec!(10)))
            .unwrap_err();
        assert_eq!(err.code(), "!authorized");
    }

    #[test]
    fn add_margin_delevers_without_moving_risk() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);

        let add = engine.submit_order_update(ALICE, position_id, Side::Long, q(dec!(40))).unwrap();
        assert_eq!(
            settle_one(&mut engine, add, dec!(400)),
            OrderOutcome::MarginAdded {
                position_id,
                new_leverage: Leverage::new(dec!(5)).unwrap(),
            }
        );

        let position = engine.position(position_id).unwrap();
        assert_eq!(position.margin.value(), dec!(80));
        assert_eq!(engine.user_free_margin(ALICE).value(), dec!(920));
        assert_eq!(engine.risk("ETH-USD").value(), dec!(400));
    }

    #[test]
    fn too_much_margin_is_cancelled() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);

        // 40 + 361 > 40 * 10
        let add = engine.submit_order_update(ALICE, position_id, Side::Long, q(dec!(361))).unwrap();
        assert_eq!(
            settle_one(&mut engine, add, dec!(400)),
            OrderOutcome::Cancelled { reason: CancelReason::TooMuchMargin }
        );
        assert_eq!(engine.position(position_id).unwrap().margin.value(), dec!(40));
        assert_eq!(engine.user_free_margin(ALICE).value(), dec!(960));
    }

    #[test]
    fn disabled_product_still_closes() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);
        let add = engine.submit_order_update(ALICE, position_id, Side::Long, q(dec!(10))).unwrap();
        let close = engine.submit_order_update(ALICE, position_id, Side::Short, q(dec!(40))).unwrap();

        engine.disable_product(OWNER, "ETH-USD").unwrap();
        let report = engine.settle(FEED, &[dec!(400), dec!(400)], add, close.next()).unwrap();

        assert_eq!(report.outcome(add), Some(&OrderOutcome::Cancelled { reason: CancelReason::Disabled }));
        assert!(matches!(report.outcome(close), Some(OrderOutcome::Closed { .. })));
        assert!(engine.position(position_id).is_none());
    }

    #[test]
    fn free_margin_rechecked_at_settlement() {
        let mut engine = engine();
        engine.deposit(ALICE, q(dec!(50))).unwrap();
        let first = engine.submit_order(ALICE, Side::Long, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();
        let second = engine.submit_order(ALICE, Side::Long, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();

        let report = engine.settle(FEED, &[dec!(400), dec!(400)], first, second.next()).unwrap();
        assert!(matches!(report.outcome(first), Some(OrderOutcome::Opened { .. })));
        assert_eq!(
            report.outcome(second),
            Some(&OrderOutcome::Cancelled { reason: CancelReason::InsufficientBalance })
        );
        assert_eq!(engine.user_free_margin(ALICE).value(), dec!(10));
    }
}

mod queue_ordering {
    use super::*;

    #[test]
    fn eleventh_enqueue_is_queue_full() {
        let mut engine = engine();
        engine.deposit(ALICE, q(dec!(10000))).unwrap();

        for expected in 1..=10 {
            let id = engine.submit_order(ALICE, Side::Long, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();
            assert_eq!(id, OrderId(expected));
        }
        let err = engine
            .submit_order(ALICE, Side::Long, "ETH-USD", q(dec!(40)), dec!(10))
            .unwrap_err();
        assert_eq!(err.code(), "!full");
        assert_eq!(engine.queue_len(), 10);
        assert_eq!(engine.open_position_count(), 0);
    }

    #[test]
    fn partial_batch_leaves_remainder_queued() {
        let mut engine = engine();
        engine.deposit(ALICE, q(dec!(1000))).unwrap();
        for _ in 0..3 {
            engine.submit_order(ALICE, Side::Long, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();
        }

        let report = engine.settle(FEED, &[dec!(400), dec!(401)], OrderId(1), OrderId(3)).unwrap();
        assert_eq!(report.executed(), 2);
        assert_eq!(engine.queue_len(), 1);

        let queued = engine.queued_orders();
        assert_eq!(queued.first_id, OrderId(3));
        assert_eq!(queued.last_id, OrderId(4));
        assert_eq!(queued.symbols, vec![Symbol::from("ETH-USD")]);

        engine.settle(FEED, &[dec!(402)], OrderId(3), OrderId(4)).unwrap();
        assert_eq!(engine.open_position_count(), 3);
        assert_eq!(engine.queued_orders().first_id, engine.queued_orders().last_id);
    }

    #[test]
    fn out_of_order_range_aborts_without_mutation() {
        let mut engine = engine();
        engine.deposit(ALICE, q(dec!(1000))).unwrap();
        engine.submit_order(ALICE, Side::Long, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();
        engine.submit_order(ALICE, Side::Short, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();
        let events_before = engine.events().len();

        let err = engine.settle(FEED, &[dec!(400)], OrderId(2), OrderId(3)).unwrap_err();
        assert_eq!(err.code(), "!order");

        assert_eq!(engine.queue_len(), 2);
        assert_eq!(engine.open_position_count(), 0);
        assert_eq!(engine.user_free_margin(ALICE).value(), dec!(1000));
        assert!(engine.risk("ETH-USD").is_zero());
        assert_eq!(engine.events().len(), events_before);
    }

    #[test]
    fn price_count_must_match_range() {
        let mut engine = engine();
        engine.deposit(ALICE, q(dec!(1000))).unwrap();
        engine.submit_order(ALICE, Side::Long, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();

        let err = engine.settle(FEED, &[dec!(400), dec!(400)], OrderId(1), OrderId(2)).unwrap_err();
        assert_eq!(err.code(), "!prices");
        assert_eq!(engine.queue_len(), 1);
    }

    #[test]
    fn only_price_feed_settles() {
        let mut engine = engine();
        engine.deposit(ALICE, q(dec!(1000))).unwrap();
        engine.submit_order(ALICE, Side::Long, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();

        let err = engine.settle(ALICE, &[dec!(400)], OrderId(1), OrderId(2)).unwrap_err();
        assert_eq!(err.code(), "!authorized");
        assert_eq!(engine.queue_len(), 1);
    }

    #[test]
    fn zero_price_cancels_and_restores_state() {
        let mut engine = engine();
        engine.deposit(ALICE, q(dec!(1000))).unwrap();
        let id = engine.submit_order(ALICE, Side::Long, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();

        assert_eq!(
            settle_one(&mut engine, id, dec!(0)),
            OrderOutcome::Cancelled { reason: CancelReason::Unavailable }
        );
        assert_eq!(engine.user_free_margin(ALICE).value(), dec!(1000));
        assert!(engine.user_positions(ALICE).is_empty());

        let cancelled = engine
            .events()
            .iter()
            .rev()
            .find_map(|e| match &e.payload {
                EventPayload::OrderCancelled(c) => Some(c.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(cancelled.id, id);
        assert_eq!(cancelled.reason.code(), "!unavailable");
    }

    #[test]
    fn zero_price_close_keeps_position() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);
        let close = engine.submit_order_update(ALICE, position_id, Side::Short, q(dec!(40))).unwrap();

        assert_eq!(
            settle_one(&mut engine, close, dec!(0)),
            OrderOutcome::Cancelled { reason: CancelReason::Unavailable }
        );
        assert_eq!(engine.position(position_id).unwrap().margin.value(), dec!(40));
        assert_eq!(engine.risk("ETH-USD").value(), dec!(400));
    }

    #[test]
    fn pause_blocks_submission_not_settlement() {
        let mut engine = engine();
        engine.deposit(ALICE, q(dec!(1000))).unwrap();
        let id = engine.submit_order(ALICE, Side::Long, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();
        engine.pause(OWNER).unwrap();

        assert!(matches!(settle_one(&mut engine, id, dec!(400)), OrderOutcome::Opened { .. }));
        // liquidation requests are not paused either
        assert!(engine.liquidate_positions(KEEPER, &[PositionId::from(id)]).is_ok());
    }
}

mod risk_cap {
    use super::*;

    #[test]
    fn fourth_open_past_cap_is_cancelled() {
        let mut engine = engine_with_cap(dec!(1500));
        let traders = [AccountId(1), AccountId(2), AccountId(3), AccountId(4)];

        for (i, trader) in traders.iter().take(3).enumerate() {
            engine.deposit(*trader, q(dec!(100))).unwrap();
            let id = engine.submit_order(*trader, Side::Long, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();
            assert!(matches!(settle_one(&mut engine, id, dec!(400)), OrderOutcome::Opened { .. }));
            assert_eq!(engine.risk("ETH-USD").value(), Decimal::from(400 * (i as i64 + 1)));
        }

        engine.deposit(traders[3], q(dec!(100))).unwrap();
        let id = engine.submit_order(traders[3], Side::Long, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();
        assert_eq!(
            settle_one(&mut engine, id, dec!(400)),
            OrderOutcome::Cancelled { reason: CancelReason::RiskReached }
        );
        assert_eq!(engine.risk("ETH-USD").value(), dec!(1200));
        assert_eq!(engine.user_free_margin(traders[3]).value(), dec!(100));
    }

    #[test]
    fn opposite_side_nets_down_exposure() {
        let mut engine = engine_with_cap(dec!(500));
        engine.deposit(ALICE, q(dec!(100))).unwrap();
        engine.deposit(BOB, q(dec!(100))).unwrap();

        let long = engine.submit_order(ALICE, Side::Long, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();
        let short = engine.submit_order(BOB, Side::Short, "ETH-USD", q(dec!(40)), dec!(10)).unwrap();
        engine.settle(FEED, &[dec!(400), dec!(400)], long, short.next()).unwrap();

        assert!(engine.risk("ETH-USD").is_zero());
        assert_eq!(engine.open_position_count(), 2);
    }
}

mod liquidation {
    use super::*;

    #[test]
    fn keeper_is_rewarded_from_collateral() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);

        let ids = engine.liquidate_positions(KEEPER, &[position_id]).unwrap();
        assert_eq!(ids.len(), 1);

        let outcome = settle_one(&mut engine, ids[0], dec!(365));
        assert_eq!(
            outcome,
            OrderOutcome::Liquidated {
                position_id,
                margin: q(dec!(40)),
                reward: q(dec!(2)),
            }
        );

        // the owner loses the whole margin; the keeper's cut is free margin, not realized balance
        assert_eq!(engine.user_free_margin(ALICE).value(), dec!(960));
        assert!(engine.user_balance(ALICE).is_zero());
        assert_eq!(engine.user_free_margin(KEEPER).value(), dec!(2));
        assert!(engine.user_balance(KEEPER).is_zero());
        // the other 38 stays behind as system funds
        assert_eq!(engine.treasury().system_surplus().value(), dec!(38));
        assert!(engine.position(position_id).is_none());
        assert!(engine.risk("ETH-USD").is_zero());
    }

    #[test]
    fn wiped_out_owner_gets_nothing() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);

        let ids = engine.liquidate_positions(KEEPER, &[position_id]).unwrap();
        settle_one(&mut engine, ids[0], dec!(300));

        assert_eq!(engine.user_free_margin(ALICE).value(), dec!(960));
        assert!(engine.user_balance(ALICE).is_zero());
        assert_eq!(engine.user_free_margin(KEEPER).value(), dec!(2));
    }

    #[test]
    fn submission_rules() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);

        assert_eq!(
            engine.liquidate_positions(ALICE, &[position_id]).unwrap_err().code(),
            "!authorized"
        );
        assert_eq!(
            engine.liquidate_positions(KEEPER, &[PositionId(99)]).unwrap_err().code(),
            "!found"
        );
        let six = [position_id; 6];
        assert_eq!(engine.liquidate_positions(KEEPER, &six).unwrap_err().code(), "!max_operations");
        // all or nothing
        assert_eq!(
            engine.liquidate_positions(KEEPER, &[position_id, PositionId(99)]).unwrap_err().code(),
            "!found"
        );
        assert_eq!(engine.queue_len(), 0);
    }

    #[test]
    fn liquidation_after_close_is_cancelled() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);

        let close = engine.submit_order_update(ALICE, position_id, Side::Short, q(dec!(40))).unwrap();
        let liq = engine.liquidate_positions(KEEPER, &[position_id]).unwrap()[0];
        let report = engine.settle(FEED, &[dec!(400), dec!(400)], close, liq.next()).unwrap();

        assert!(matches!(report.outcome(close), Some(OrderOutcome::Closed { .. })));
        assert_eq!(report.outcome(liq), Some(&OrderOutcome::Cancelled { reason: CancelReason::NotFound }));
        assert!(engine.user_free_margin(KEEPER).is_zero());
    }

    #[test]
    fn events_name_owner_and_liquidator() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);
        let id = engine.liquidate_positions(KEEPER, &[position_id]).unwrap()[0];

        match &engine.recent_events(1)[0].payload {
            EventPayload::LiquidationSubmitted(e) => {
                assert_eq!(e.id, id);
                assert_eq!(e.sender, KEEPER);
            }
            other => panic!("unexpected event {other:?}"),
        }

        settle_one(&mut engine, id, dec!(380));
        match &engine.recent_events(1)[0].payload {
            EventPayload::PositionLiquidated(e) => {
                assert_eq!(e.sender, ALICE);
                assert_eq!(e.liquidator, KEEPER);
                assert_eq!(e.margin_liquidated.value(), dec!(40));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}

mod treasury_flows {
    use super::*;

    #[test]
    fn realized_profit_withdraws_without_limits() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);
        let close = engine.submit_order_update(ALICE, position_id, Side::Short, q(dec!(40))).unwrap();
        settle_one(&mut engine, close, dec!(440));

        engine.set_withdrawal_limit(OWNER, Quote::zero()).unwrap();
        let receipt = engine.withdraw(ALICE, q(dec!(39))).unwrap();
        assert_eq!(receipt.from_balance.value(), dec!(39));
        assert!(receipt.from_system.is_zero());

        // everything past the realized balance is system funds, and the limit is zero
        let err = engine.withdraw(ALICE, q(dec!(1))).unwrap_err();
        assert_eq!(err.code(), "!daily_limit");
    }

    #[test]
    fn threshold_protects_other_users() {
        let mut engine = engine();
        let position_id = open_alice(&mut engine);
        let close = engine.submit_order_update(ALICE, position_id, Side::Short, q(dec!(40))).unwrap();
        settle_one(&mut engine, close, dec!(440));

        // custody 1100 against 1139.120876 of collateral
        engine.deposit(BOB, q(dec!(100))).unwrap();
        engine.set_system_funds_threshold(OWNER, q(dec!(1000))).unwrap();

        let err = engine.withdraw(BOB, q(dec!(100))).unwrap_err();
        assert_eq!(err.code(), "!system_threshold");
        assert_eq!(engine.user_free_margin(BOB).value(), dec!(100));

        // 2200 - 100 covers alice's 1039.120876 plus the 1000 threshold
        engine.fund_treasury(q(dec!(1100))).unwrap();
        assert!(engine.withdraw(BOB, q(dec!(100))).is_ok());
        assert!(engine.treasury_balance() >= engine.treasury().total_owed());
        assert!(engine.treasury_balance() >= engine.total_user_balance());
    }

    #[test]
    fn owner_cannot_drain_user_deposits() {
        let mut engine = engine();
        engine.deposit(ALICE, q(dec!(1000))).unwrap();
        engine.deposit(BOB, q(dec!(500))).unwrap();

        let err = engine.admin_withdraw(OWNER, OWNER, q(dec!(1)), false).unwrap_err();
        assert_eq!(err.code(), "!balance2");
        assert!(engine.admin_withdraw(OWNER, OWNER, Quote::zero(), true).unwrap().is_zero());
        assert_eq!(engine.treasury_balance().value(), dec!(1500));

        assert!(engine.withdraw(ALICE, q(dec!(1000))).is_ok());
        assert!(engine.withdraw(BOB, q(dec!(500))).is_ok());
        assert!(engine.treasury_balance().is_zero());
    }
}
