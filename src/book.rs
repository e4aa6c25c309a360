//! Read-only view over one order-book snapshot.
//!
//! Splits the snapshot into the bot's own orders and the two sides, sorted so
//! the best bid (highest price) and best ask (lowest price) come first.

use crate::types::{Order, Side};

#[derive(Clone, Debug, Default)]
pub struct BookView {
    /// Orders flagged `mine` by the feed, in snapshot order.
    pub mine: Vec<Order>,
    /// Descending by price.
    pub bids: Vec<Order>,
    /// Ascending by price.
    pub asks: Vec<Order>,
}

impl BookView {
    pub fn from_snapshot(orders: &[Order]) -> Self {
        let mine = orders.iter().filter(|o| o.mine).cloned().collect();
        let mut bids: Vec<Order> = orders.iter().filter(|o| o.side == Side::Buy).cloned().collect();
        let mut asks: Vec<Order> = orders.iter().filter(|o| o.side == Side::Sell).cloned().collect();
        // Stable sort keeps feed order (time priority) within a price level.
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Self { mine, bids, asks }
    }

    pub fn best_bid(&self) -> Option<&Order> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&Order> {
        self.asks.first()
    }

    /// Best order on `side`.
    pub fn best(&self, side: Side) -> Option<&Order> {
        match side {
            Side::Buy => self.best_bid(),
            Side::Sell => self.best_ask(),
        }
    }

    /// `best_ask − best_bid` when both sides are quoted.
    pub fn spread(&self) -> Option<i64> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }
}
