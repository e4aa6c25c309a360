//! Drives a bot against the simulated marketplace tick by tick.

use log::info;
use serde::Serialize;

use super::exchange::{BotTrade, OrderCounts, SimMarketplace};
use super::generator::Generator;
use crate::bot::Bot;
use crate::marketplace::Marketplace;
use crate::reference::FixedClock;
use crate::types::{Holdings, OrderStatus};

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub ticks: u32,
    /// Counterparty orders older than this are withdrawn.
    pub counterparty_ttl_ticks: u64,
    /// Simulated seconds per tick.
    pub secs_per_tick: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ticks: 100,
            counterparty_ttl_ticks: 5,
            secs_per_tick: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub ticks: u32,
    pub orders: OrderCounts,
    pub trades: Vec<BotTrade>,
    pub archived: usize,
    pub final_status: OrderStatus,
    pub holdings: Holdings,
    pub stopped: Option<String>,
}

/// Runs `config.ticks` ticks. Each tick: advance the clock, submit counterparty
/// flow, expire stale counterparty orders, publish snapshots and deliver every
/// queued callback (including those caused by the bot's own orders) in order.
pub fn run(
    bot: &mut Bot<SimMarketplace>,
    generator: &mut Generator,
    clock: &FixedClock,
    config: &SessionConfig,
) -> SessionSummary {
    for tick in 0..config.ticks {
        if bot.is_stopped() {
            info!("session ended early tick={}", tick);
            break;
        }
        clock.advance_secs(config.secs_per_tick);
        let exchange = bot.marketplace_mut();
        for (order, trader_id) in generator.tick_orders() {
            exchange.submit_counterparty(order, trader_id);
        }
        exchange.expire_counterparty(config.counterparty_ttl_ticks);
        exchange.publish_tick();
        while let Some(event) = bot.marketplace_mut().poll_event() {
            bot.dispatch(event);
        }
    }
    let summary = summarise(bot, config.ticks);
    info!(
        "session done ticks={} limits={} cancels={} rejected={} trades={} archived={}",
        summary.ticks,
        summary.orders.limits,
        summary.orders.cancels,
        summary.orders.rejected,
        summary.trades.len(),
        summary.archived
    );
    summary
}

pub fn summarise(bot: &Bot<SimMarketplace>, ticks: u32) -> SessionSummary {
    let exchange = bot.marketplace();
    SessionSummary {
        ticks,
        orders: exchange.counts(),
        trades: exchange.trades().to_vec(),
        archived: bot.archive().len(),
        final_status: bot.status(),
        holdings: exchange.holdings().clone(),
        stopped: bot.stop_reason().map(str::to_string),
    }
}
