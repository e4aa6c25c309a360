//! Sessions against the simulated marketplace with seeded counterparty flow.
//! Deterministic replay: same seed ⇒ same outcome.

use chrono::NaiveDate;
use ds_trading_bot::sim::{session, Generator, GeneratorConfig, SessionConfig, SessionSummary, SimMarketplace};
use ds_trading_bot::{
    Bot, BotConfig, BotType, CashHoldings, FixedClock, Holdings, InMemoryAuditSink, Market, MarketId, Side,
    UnitHoldings,
};
use std::rc::Rc;

fn init_log() {
    let _ = env_logger::try_init();
}

fn market() -> Market {
    Market {
        id: MarketId(1),
        minimum: 0,
        maximum: 1000,
        tick: 10,
        name: "widgets".into(),
        item: "widget".into(),
        description: String::new(),
    }
}

fn holdings(cash: i64, units: i64) -> Holdings {
    let mut h = Holdings {
        cash: CashHoldings {
            cash,
            available_cash: cash,
        },
        ..Default::default()
    };
    h.markets.insert(
        MarketId(1),
        UnitHoldings {
            units,
            available_units: units,
        },
    );
    h
}

fn run(seed: u64, bot_type: BotType, cash: i64, units: i64, ticks: u32) -> SessionSummary {
    run_with_audit(seed, bot_type, cash, units, ticks, &InMemoryAuditSink::new())
}

fn run_with_audit(
    seed: u64,
    bot_type: BotType,
    cash: i64,
    units: i64,
    ticks: u32,
    sink: &InMemoryAuditSink,
) -> SessionSummary {
    init_log();
    let clock = Rc::new(FixedClock::new(
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap(),
    ));
    let exchange = SimMarketplace::new(vec![market()], holdings(cash, units)).with_clock(clock.clone());
    let config = BotConfig {
        bot_type,
        cancel_cycle_ticks: 2,
        ..Default::default()
    };
    let mut bot = Bot::new(exchange, config)
        .unwrap()
        .with_clock(Rc::clone(&clock))
        .with_audit(Rc::new(sink.clone()));
    bot.initialise().unwrap();
    let mut generator = Generator::new(GeneratorConfig {
        seed,
        ..Default::default()
    });
    session::run(
        &mut bot,
        &mut generator,
        &clock,
        &SessionConfig {
            ticks,
            ..Default::default()
        },
    )
}

#[test]
fn deterministic_replay_same_seed_same_outcome() {
    let a = run(999, BotType::MarketMaker, 3000, 0, 60);
    let b = run(999, BotType::MarketMaker, 3000, 0, 60);
    assert_eq!(a, b);
}

#[test]
fn reactive_buyer_only_buys_below_reward() {
    let summary = run(7, BotType::Reactive, 3000, 0, 80);
    assert!(summary.stopped.is_none());
    assert!(!summary.trades.is_empty(), "expected some trades: {:?}", summary);
    for trade in &summary.trades {
        assert_eq!(trade.side, Side::Buy);
        assert!(trade.price < 500, "bought at {}", trade.price);
    }
    let held: i64 = summary.trades.iter().map(|t| t.units).sum();
    assert!(held <= 6, "reward cap limits buying, held {}", held);
    assert_eq!(summary.holdings.units(MarketId(1)).unwrap().units, held);
}

#[test]
fn reactive_seller_only_sells_above_reward() {
    let summary = run(11, BotType::Reactive, 0, 4, 80);
    for trade in &summary.trades {
        assert_eq!(trade.side, Side::Sell);
        assert!(trade.price > 500, "sold at {}", trade.price);
    }
    let sold: i64 = summary.trades.iter().map(|t| t.units).sum();
    assert!(sold <= 4);
    assert_eq!(summary.holdings.units(MarketId(1)).unwrap().units, 4 - sold);
}

#[test]
fn market_maker_cycles_quotes_and_never_overpays() {
    let sink = InMemoryAuditSink::new();
    let summary = run_with_audit(3, BotType::MarketMaker, 3000, 0, 100, &sink);
    assert!(summary.orders.limits > 1, "quotes are re-issued: {:?}", summary.orders);
    assert!(summary.orders.cancels > 0, "stale quotes are cancelled: {:?}", summary.orders);
    assert_eq!(summary.orders.rejected, 0);
    for trade in &summary.trades {
        assert!(trade.price < 500, "bought at {}", trade.price);
    }
    assert_eq!(sink.actions("order_sent").len() as u64, summary.orders.limits);
    assert_eq!(sink.actions("cancel_sent").len() as u64, summary.orders.cancels);
    assert!(sink.actions("bot_stopped").is_empty());
}
