//! Contract with the external marketplace client.
//!
//! The client owns the connection and event loop. It exposes market metadata,
//! the latest holdings and a fire-and-forget `send_order`; everything else
//! arrives as [`MarketEvent`]s delivered serially to the bot.

use std::collections::BTreeMap;

use crate::types::{Holdings, Market, MarketId, Order};

pub trait Marketplace {
    /// Markets by id, read once at start-up.
    fn markets(&self) -> &BTreeMap<MarketId, Market>;

    /// Latest holdings snapshot.
    fn holdings(&self) -> &Holdings;

    /// Fire-and-forget. The outcome arrives later as an accept or reject event.
    fn send_order(&mut self, order: &Order);
}

/// Callbacks from the marketplace client, one per event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarketEvent {
    OrderBook { market_id: MarketId, orders: Vec<Order> },
    Holdings(Holdings),
    Accepted(Order),
    Rejected { reason: String, order: Order },
}
