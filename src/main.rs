//! Demo: runs the bot against the simulated marketplace and prints a JSON summary.
//!
//! Settings: `BOT_CONFIG` (JSON file, optional) plus the overrides read by
//! [`BotConfig::apply_env`]; `TICKS`, `SEED`, `CASH`, `UNITS` for the session.

use std::rc::Rc;

use chrono::Local;
use ds_trading_bot::sim::{session, Generator, GeneratorConfig, SessionConfig, SimMarketplace};
use ds_trading_bot::{
    Bot, BotConfig, BotError, CashHoldings, Clock, FixedClock, Holdings, Market, MarketId, StdoutAuditSink,
    UnitHoldings,
};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn run() -> Result<(), BotError> {
    let config = match std::env::var("BOT_CONFIG") {
        Ok(path) => BotConfig::from_json_file(path)?,
        Err(_) => BotConfig::default(),
    }
    .apply_env()?;
    let ticks: u32 = env_or("TICKS", 100);
    let seed: u64 = env_or("SEED", 42);
    let cash: i64 = env_or("CASH", 2000);
    let units: i64 = env_or("UNITS", 0);

    let market_id = config.market_id.unwrap_or(MarketId(1));
    let market = Market {
        id: market_id,
        minimum: 0,
        maximum: 1000,
        tick: 10,
        name: "widgets".into(),
        item: "widget".into(),
        description: "simulated induced demand-supply market".into(),
    };
    let mut holdings = Holdings {
        cash: CashHoldings {
            cash,
            available_cash: cash,
        },
        ..Default::default()
    };
    holdings.markets.insert(
        market_id,
        UnitHoldings {
            units,
            available_units: units,
        },
    );

    let clock = Rc::new(FixedClock::new(Local::now().naive_local()));
    let exchange = SimMarketplace::new(vec![market], holdings).with_clock(clock.clone() as Rc<dyn Clock>);
    let mut bot = Bot::new(exchange, config)?
        .with_clock(Rc::clone(&clock))
        .with_audit(Rc::new(StdoutAuditSink));
    bot.initialise()?;

    let mut generator = Generator::new(GeneratorConfig {
        seed,
        market_id,
        ..Default::default()
    });
    let summary = session::run(
        &mut bot,
        &mut generator,
        &clock,
        &SessionConfig {
            ticks,
            ..Default::default()
        },
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn main() {
    let _ = env_logger::try_init();
    if let Err(e) = run() {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
