//! In-process marketplace: validates the bot's orders, matches them against
//! counterparty flow, keeps the bot's holdings and queues the callbacks a real
//! marketplace client would deliver.
//!
//! Only the bot's account is tracked. Counterparties have unlimited cash and units.

use log::{debug, info, warn};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use super::book::{Fill, SimBook, TraderId};
use crate::marketplace::{MarketEvent, Marketplace};
use crate::reference::{Clock, SystemClock};
use crate::types::{Holdings, Market, MarketId, Order, OrderId, OrderType, Side};

/// Trader id of the bot's account.
pub const BOT_TRADER: TraderId = TraderId(0);

/// A fill involving the bot, from the bot's point of view.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct BotTrade {
    pub market_id: MarketId,
    pub side: Side,
    pub price: i64,
    pub units: i64,
}

/// Counts of what the bot sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct OrderCounts {
    pub limits: u64,
    pub cancels: u64,
    pub rejected: u64,
}

pub struct SimMarketplace {
    markets: BTreeMap<MarketId, Market>,
    books: BTreeMap<MarketId, SimBook>,
    holdings: Holdings,
    events: VecDeque<MarketEvent>,
    clock: Rc<dyn Clock>,
    next_order_id: u64,
    tick: u64,
    counts: OrderCounts,
    trades: Vec<BotTrade>,
}

impl SimMarketplace {
    pub fn new(markets: Vec<Market>, holdings: Holdings) -> Self {
        let books = markets.iter().map(|m| (m.id, SimBook::new(m.id))).collect();
        Self {
            markets: markets.into_iter().map(|m| (m.id, m)).collect(),
            books,
            holdings,
            events: VecDeque::new(),
            clock: Rc::new(SystemClock),
            next_order_id: 1,
            tick: 0,
            counts: OrderCounts::default(),
            trades: Vec::new(),
        }
    }

    /// Clock used to date accepted orders.
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn book(&self, market_id: MarketId) -> Option<&SimBook> {
        self.books.get(&market_id)
    }

    pub fn counts(&self) -> OrderCounts {
        self.counts
    }

    pub fn trades(&self) -> &[BotTrade] {
        &self.trades
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Next queued callback, oldest first.
    pub fn poll_event(&mut self) -> Option<MarketEvent> {
        self.events.pop_front()
    }

    /// Starts a new tick: queues an order-book snapshot per market, then holdings.
    pub fn publish_tick(&mut self) {
        self.tick += 1;
        for (market_id, book) in &self.books {
            self.events.push_back(MarketEvent::OrderBook {
                market_id: *market_id,
                orders: book.snapshot(BOT_TRADER),
            });
        }
        self.events.push_back(MarketEvent::Holdings(self.holdings.clone()));
    }

    /// Withdraws counterparty orders that have rested for more than `max_age_ticks`.
    pub fn expire_counterparty(&mut self, max_age_ticks: u64) {
        let before = self.tick.saturating_sub(max_age_ticks);
        for book in self.books.values_mut() {
            let expired = book.expire(before, BOT_TRADER);
            if !expired.is_empty() {
                debug!("expired {} counterparty orders market={}", expired.len(), book.market_id());
            }
        }
    }

    /// Counterparty LIMIT order: matched against the book, remainder rests.
    /// Invalid prices are dropped. Returns the server id when accepted.
    pub fn submit_counterparty(&mut self, mut order: Order, trader_id: TraderId) -> Option<OrderId> {
        let valid = self
            .markets
            .get(&order.market_id)
            .map_or(false, |m| m.is_valid_price(order.price));
        if !valid || order.units < 1 || trader_id == BOT_TRADER {
            warn!("dropping invalid counterparty order {}", order);
            return None;
        }
        let order_id = self.assign_id(&mut order);
        self.execute(order, trader_id);
        Some(order_id)
    }

    fn assign_id(&mut self, order: &mut Order) -> OrderId {
        let order_id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        order.server_id = Some(order_id);
        order.date = Some(self.clock.now());
        order_id
    }

    /// Matches `order` and rests what is left.
    fn execute(&mut self, mut order: Order, trader_id: TraderId) {
        let Some(book) = self.books.get_mut(&order.market_id) else {
            return;
        };
        let fills = book.take(order.side, order.price, order.units, trader_id);
        let filled: i64 = fills.iter().map(|f| f.units).sum();
        order.units -= filled;
        let market_id = order.market_id;
        let limit_price = order.price;
        let remainder = (order.units > 0).then_some(order);
        if let Some(rest) = remainder {
            if let Err(e) = book.add(rest, trader_id, self.tick) {
                warn!("could not rest order: {}", e);
            }
        }
        for fill in fills {
            if trader_id == BOT_TRADER {
                self.settle(market_id, fill.resting_side.opposite(), limit_price, &fill);
            } else if fill.resting_trader_id == BOT_TRADER {
                self.settle(market_id, fill.resting_side, fill.price, &fill);
            }
        }
    }

    /// Applies one bot fill. `limit_price` is what was reserved per unit for a BUY.
    fn settle(&mut self, market_id: MarketId, side: Side, limit_price: i64, fill: &Fill) {
        let value = fill.price * fill.units;
        let units = self.holdings.markets.entry(market_id).or_default();
        match side {
            Side::Buy => {
                self.holdings.cash.cash -= value;
                self.holdings.cash.available_cash += (limit_price - fill.price) * fill.units;
                units.units += fill.units;
                units.available_units += fill.units;
            }
            Side::Sell => {
                units.units -= fill.units;
                self.holdings.cash.cash += value;
                self.holdings.cash.available_cash += value;
            }
        }
        info!(
            "bot trade market={} side={:?} price={} units={}",
            market_id, side, fill.price, fill.units
        );
        self.trades.push(BotTrade {
            market_id,
            side,
            price: fill.price,
            units: fill.units,
        });
    }

    fn reject(&mut self, reason: &str, order: &Order) {
        info!("rejecting {} reason={}", order, reason);
        self.counts.rejected += 1;
        self.events.push_back(MarketEvent::Rejected {
            reason: reason.to_string(),
            order: order.clone(),
        });
    }

    fn accept_limit(&mut self, order: &Order) {
        self.counts.limits += 1;
        let Some(market) = self.markets.get(&order.market_id) else {
            return self.reject("unknown market", order);
        };
        if !market.is_valid_price(order.price) {
            return self.reject("invalid price", order);
        }
        if order.units < 1 {
            return self.reject("invalid units", order);
        }
        match order.side {
            Side::Buy => {
                if order.value() > self.holdings.cash.available_cash {
                    return self.reject("insufficient cash", order);
                }
                self.holdings.cash.available_cash -= order.value();
            }
            Side::Sell => {
                let units = self.holdings.markets.entry(order.market_id).or_default();
                if order.units > units.available_units {
                    return self.reject("insufficient units", order);
                }
                units.available_units -= order.units;
            }
        }
        let mut accepted = order.clone();
        self.assign_id(&mut accepted);
        accepted.mine = true;
        self.events.push_back(MarketEvent::Accepted(accepted.clone()));
        self.execute(accepted, BOT_TRADER);
    }

    fn accept_cancel(&mut self, cancel: &Order) {
        self.counts.cancels += 1;
        let Some(book) = self.books.get_mut(&cancel.market_id) else {
            return self.reject("unknown market", cancel);
        };
        let by_id = cancel
            .server_id
            .filter(|id| book.get(*id).map_or(false, |r| r.trader_id == BOT_TRADER));
        let target = by_id.or_else(|| {
            book.orders_of(BOT_TRADER)
                .find(|r| r.order.weak_eq_ignoring_type(cancel))
                .and_then(|r| r.order.server_id)
        });
        let Some(removed) = target.and_then(|id| book.cancel(id)) else {
            return self.reject("order not found", cancel);
        };
        let remaining = removed.order.units;
        match removed.order.side {
            Side::Buy => self.holdings.cash.available_cash += removed.order.price * remaining,
            Side::Sell => {
                self.holdings
                    .markets
                    .entry(cancel.market_id)
                    .or_default()
                    .available_units += remaining
            }
        }
        let mut accepted = cancel.clone();
        accepted.server_id = removed.order.server_id;
        accepted.mine = true;
        accepted.date = Some(self.clock.now());
        self.events.push_back(MarketEvent::Accepted(accepted));
    }
}

impl Marketplace for SimMarketplace {
    fn markets(&self) -> &BTreeMap<MarketId, Market> {
        &self.markets
    }

    fn holdings(&self) -> &Holdings {
        &self.holdings
    }

    fn send_order(&mut self, order: &Order) {
        debug!("received {}", order);
        match order.order_type {
            OrderType::Limit => self.accept_limit(order),
            OrderType::Cancel => self.accept_cancel(order),
        }
    }
}
