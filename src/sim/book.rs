//! Price-time order book for one simulated market.
//!
//! Prices are integer minor units. Each price level is FIFO; best bid is the
//! highest price, best ask the lowest. Resting entries keep the full [`Order`]
//! (with `units` as the remaining quantity) so snapshots can be published as-is.

use std::collections::{BTreeMap, HashMap};

use crate::types::{MarketId, Order, OrderId, Side};

/// Owner of a resting order. Self-trades between orders of one trader are skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraderId(pub u64);

#[derive(Clone, Debug)]
pub struct Resting {
    pub order: Order,
    pub trader_id: TraderId,
    /// Tick the order was added on.
    pub since_tick: u64,
}

/// One resting order hit by an incoming order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fill {
    pub resting_order_id: OrderId,
    pub resting_trader_id: TraderId,
    pub resting_side: Side,
    pub price: i64,
    pub units: i64,
    pub resting_fully_filled: bool,
}

type PriceLevels = BTreeMap<i64, Vec<Resting>>;

#[derive(Debug)]
pub struct SimBook {
    market_id: MarketId,
    bids: PriceLevels,
    asks: PriceLevels,
    /// Side and price of every resting order, for cancels.
    index: HashMap<OrderId, (Side, i64)>,
}

impl SimBook {
    pub fn new(market_id: MarketId) -> Self {
        Self {
            market_id,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn market_id(&self) -> MarketId {
        self.market_id
    }

    /// Rests an order that already carries its server id. No matching.
    pub fn add(&mut self, order: Order, trader_id: TraderId, since_tick: u64) -> Result<(), String> {
        let order_id = order.server_id.ok_or("resting order must have a server id")?;
        let levels = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        self.index.insert(order_id, (order.side, order.price));
        levels.entry(order.price).or_default().push(Resting {
            order,
            trader_id,
            since_tick,
        });
        Ok(())
    }

    /// Removes a resting order by id.
    pub fn cancel(&mut self, order_id: OrderId) -> Option<Resting> {
        let (side, price) = self.index.remove(&order_id)?;
        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let queue = levels.get_mut(&price)?;
        let pos = queue.iter().position(|r| r.order.server_id == Some(order_id))?;
        let removed = queue.remove(pos);
        if queue.is_empty() {
            levels.remove(&price);
        }
        Some(removed)
    }

    pub fn get(&self, order_id: OrderId) -> Option<&Resting> {
        let (side, price) = self.index.get(&order_id)?;
        let levels = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        levels
            .get(price)?
            .iter()
            .find(|r| r.order.server_id == Some(order_id))
    }

    /// Resting orders of `trader_id`, bids then asks, in priority order.
    pub fn orders_of(&self, trader_id: TraderId) -> impl Iterator<Item = &Resting> {
        self.resting().filter(move |r| r.trader_id == trader_id)
    }

    /// Every resting order: bids best-first, then asks best-first.
    pub fn resting(&self) -> impl Iterator<Item = &Resting> {
        self.bids
            .values()
            .rev()
            .flatten()
            .chain(self.asks.values().flatten())
    }

    /// Takes liquidity for an incoming order on `side` up to `price_limit`,
    /// skipping orders of `exclude`. Returns fills in execution order.
    pub fn take(&mut self, side: Side, price_limit: i64, mut units: i64, exclude: TraderId) -> Vec<Fill> {
        let (levels, prices): (&mut PriceLevels, Vec<i64>) = match side {
            Side::Buy => {
                let prices = self.asks.range(..=price_limit).map(|(p, _)| *p).collect();
                (&mut self.asks, prices)
            }
            Side::Sell => {
                let prices = self.bids.range(price_limit..).rev().map(|(p, _)| *p).collect();
                (&mut self.bids, prices)
            }
        };
        let mut fills = Vec::new();
        for price in prices {
            if units <= 0 {
                break;
            }
            let Some(queue) = levels.get_mut(&price) else {
                continue;
            };
            let mut i = 0;
            while i < queue.len() && units > 0 {
                let entry = &mut queue[i];
                if entry.trader_id == exclude {
                    i += 1;
                    continue;
                }
                let fill_units = units.min(entry.order.units);
                units -= fill_units;
                entry.order.units -= fill_units;
                let fully = entry.order.units == 0;
                fills.push(Fill {
                    resting_order_id: entry.order.server_id.unwrap_or(OrderId(0)),
                    resting_trader_id: entry.trader_id,
                    resting_side: entry.order.side,
                    price,
                    units: fill_units,
                    resting_fully_filled: fully,
                });
                if fully {
                    if let Some(id) = queue[i].order.server_id {
                        self.index.remove(&id);
                    }
                    queue.remove(i);
                } else {
                    i += 1;
                }
            }
            if queue.is_empty() {
                levels.remove(&price);
            }
        }
        fills
    }

    /// Removes orders added before `before_tick`, except those of `keep`.
    pub fn expire(&mut self, before_tick: u64, keep: TraderId) -> Vec<Resting> {
        let expired: Vec<OrderId> = self
            .resting()
            .filter(|r| r.trader_id != keep && r.since_tick < before_tick)
            .filter_map(|r| r.order.server_id)
            .collect();
        expired.into_iter().filter_map(|id| self.cancel(id)).collect()
    }

    /// Snapshot as seen by `viewer`: every resting order, `mine` set on the viewer's.
    pub fn snapshot(&self, viewer: TraderId) -> Vec<Order> {
        self.resting()
            .map(|r| Order {
                mine: r.trader_id == viewer,
                ..r.order.clone()
            })
            .collect()
    }

    pub fn best_bid(&self) -> Option<i64> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<i64> {
        self.asks.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderType;

    fn order(id: u64, side: Side, units: i64, price: i64) -> Order {
        Order {
            price,
            units,
            side,
            order_type: OrderType::Limit,
            market_id: MarketId(1),
            reference: format!("o{}", id),
            server_id: Some(OrderId(id)),
            mine: false,
            date: None,
        }
    }

    #[test]
    fn add_and_cancel_order() {
        let mut book = SimBook::new(MarketId(1));
        book.add(order(1, Side::Buy, 1, 400), TraderId(1), 0).unwrap();
        book.add(order(2, Side::Sell, 1, 600), TraderId(1), 0).unwrap();
        assert_eq!(book.best_bid(), Some(400));
        assert_eq!(book.best_ask(), Some(600));
        assert!(book.cancel(OrderId(1)).is_some());
        assert!(book.cancel(OrderId(1)).is_none());
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn add_without_server_id_returns_err() {
        let mut book = SimBook::new(MarketId(1));
        let mut o = order(1, Side::Buy, 1, 400);
        o.server_id = None;
        assert!(book.add(o, TraderId(1), 0).is_err());
    }

    #[test]
    fn take_uses_price_time_priority() {
        let mut book = SimBook::new(MarketId(1));
        book.add(order(1, Side::Sell, 1, 510), TraderId(1), 0).unwrap();
        book.add(order(2, Side::Sell, 1, 500), TraderId(2), 0).unwrap();
        book.add(order(3, Side::Sell, 2, 500), TraderId(3), 0).unwrap();
        let fills = book.take(Side::Buy, 510, 3, TraderId(9));
        let ids: Vec<u64> = fills.iter().map(|f| f.resting_order_id.0).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(fills[0].resting_fully_filled);
        assert!(fills[1].resting_fully_filled);
        assert_eq!(book.best_ask(), Some(510));
    }

    #[test]
    fn take_skips_own_orders_and_respects_limit() {
        let mut book = SimBook::new(MarketId(1));
        book.add(order(1, Side::Buy, 1, 500), TraderId(1), 0).unwrap();
        book.add(order(2, Side::Buy, 2, 490), TraderId(2), 0).unwrap();
        let fills = book.take(Side::Sell, 490, 1, TraderId(1));
        assert_eq!(fills.len(), 1);
        assert_eq!((fills[0].resting_order_id, fills[0].price), (OrderId(2), 490));
        assert!(!fills[0].resting_fully_filled);
        assert_eq!(book.get(OrderId(2)).unwrap().order.units, 1);
        assert!(book.take(Side::Sell, 510, 1, TraderId(3)).is_empty());
    }

    #[test]
    fn snapshot_flags_viewer_orders() {
        let mut book = SimBook::new(MarketId(1));
        book.add(order(1, Side::Buy, 1, 400), TraderId(0), 0).unwrap();
        book.add(order(2, Side::Buy, 1, 450), TraderId(1), 0).unwrap();
        let snap = book.snapshot(TraderId(0));
        assert_eq!(snap.iter().map(|o| o.price).collect::<Vec<_>>(), vec![450, 400]);
        assert!(!snap[0].mine);
        assert!(snap[1].mine);
        assert_eq!(book.orders_of(TraderId(0)).count(), 1);
    }

    #[test]
    fn expire_keeps_protected_trader() {
        let mut book = SimBook::new(MarketId(1));
        book.add(order(1, Side::Buy, 1, 400), TraderId(0), 0).unwrap();
        book.add(order(2, Side::Buy, 1, 410), TraderId(1), 0).unwrap();
        book.add(order(3, Side::Buy, 1, 420), TraderId(1), 5).unwrap();
        let expired = book.expire(3, TraderId(0));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].order.server_id, Some(OrderId(2)));
        assert_eq!(book.len(), 2);
    }
}
