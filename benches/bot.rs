//! Per-tick processing benchmarks (Criterion).
//!
//! Run: `cargo bench` or `cargo bench --bench bot`.

use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use ds_trading_bot::sim::{session, Generator, GeneratorConfig, SessionConfig, SimMarketplace};
use ds_trading_bot::{
    reconcile, ActiveOrder, Bot, BotConfig, BotType, CashHoldings, FixedClock, Holdings, Market, MarketId, Order,
    OrderId, OrderType, Side, UnitHoldings,
};
use std::rc::Rc;

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

fn holdings() -> Holdings {
    let mut h = Holdings {
        cash: CashHoldings {
            cash: 3000,
            available_cash: 3000,
        },
        ..Default::default()
    };
    h.markets.insert(
        MarketId(1),
        UnitHoldings {
            units: 0,
            available_units: 0,
        },
    );
    h
}

fn bench_session_ticks(c: &mut Criterion) {
    const TICKS: u32 = 200;
    let mut group = c.benchmark_group("bot");
    group.throughput(Throughput::Elements(TICKS as u64));
    for bot_type in [BotType::Reactive, BotType::MarketMaker] {
        group.bench_function(format!("session_{:?}_{}_ticks", bot_type, TICKS), |b| {
            b.iter_batched(
                || {
                    let clock = Rc::new(FixedClock::new(
                        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap(),
                    ));
                    let exchange = SimMarketplace::new(vec![market()], holdings()).with_clock(clock.clone());
                    let config = BotConfig {
                        bot_type,
                        ..Default::default()
                    };
                    let mut bot = Bot::new(exchange, config).unwrap().with_clock(Rc::clone(&clock));
                    bot.initialise().unwrap();
                    let generator = Generator::new(GeneratorConfig {
                        seed: 42,
                        orders_per_tick: 4,
                        ..Default::default()
                    });
                    (bot, generator, clock)
                },
                |(mut bot, mut generator, clock)| {
                    session::run(
                        &mut bot,
                        &mut generator,
                        &clock,
                        &SessionConfig {
                            ticks: TICKS,
                            ..Default::default()
                        },
                    )
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_reconcile_cleanup(c: &mut Criterion) {
    const OWN: usize = 50;
    let own: Vec<Order> = (0..OWN)
        .map(|i| Order {
            price: 10 * i as i64,
            units: 1,
            side: Side::Buy,
            order_type: OrderType::Limit,
            market_id: MarketId(1),
            reference: format!("own-{}", i),
            server_id: Some(OrderId(i as u64)),
            mine: true,
            date: None,
        })
        .collect();
    let mut group = c.benchmark_group("bot");
    group.throughput(Throughput::Elements(OWN as u64));
    group.bench_function("reconcile_50_own_orders", |b| {
        b.iter(|| reconcile(&ActiveOrder::Inactive, &own, 0, |o| Some(500 - o.price)))
    });
    group.finish();
}

criterion_group!(benches, bench_session_ticks, bench_reconcile_cleanup);
criterion_main!(benches);
