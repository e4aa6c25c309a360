//! Core types for the bot: orders, markets, holdings, and the enums that
//! describe the bot's role and configuration.
//!
//! Identifiers are newtype wrappers. Prices are integers in currency minor
//! units (cents); [`Market::is_valid_price`] defines the price grid.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;

use crate::reference::ReferenceParts;

/// Marketplace market identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MarketId(pub u64);

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned order identifier (set once an order is accepted).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Single-letter code used in order references.
    pub fn code(self) -> char {
        match self {
            Side::Buy => 'B',
            Side::Sell => 'S',
        }
    }
}

/// Order type: a resting limit order, or a request to cancel one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum OrderType {
    Limit,
    Cancel,
}

impl OrderType {
    /// Single-letter code used in order references.
    pub fn code(self) -> char {
        match self {
            OrderType::Limit => 'L',
            OrderType::Cancel => 'M',
        }
    }
}

/// Lifecycle status of the bot's single active order.
///
/// ```text
/// INACTIVE -> MADE -> PENDING -> ACCEPTED -> CANCEL -> INACTIVE
///                        |           |
///                        +-----------+--> INACTIVE (rejected / completed)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum OrderStatus {
    Inactive,
    Made,
    Pending,
    Accepted,
    Cancel,
}

/// Whether the bot buys or sells. Derived once from the starting cash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Role {
    Buyer,
    Seller,
}

impl Role {
    /// Non-positive starting cash makes the bot a seller.
    pub fn from_cash(cash: i64) -> Role {
        if cash <= 0 {
            Role::Seller
        } else {
            Role::Buyer
        }
    }

    /// Side of the orders this role places.
    pub fn side(self) -> Side {
        match self {
            Role::Buyer => Side::Buy,
            Role::Seller => Side::Sell,
        }
    }
}

/// Quoting style of the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotType {
    /// Rest passive quotes near the target price.
    MarketMaker,
    /// Take any existing quote priced better than the target price.
    Reactive,
}

/// An order as constructed by the bot or reported by the marketplace.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Order {
    pub price: i64,
    pub units: i64,
    pub side: Side,
    pub order_type: OrderType,
    pub market_id: MarketId,
    pub reference: String,
    /// Assigned by the marketplace once accepted.
    #[serde(default)]
    pub server_id: Option<OrderId>,
    /// Set by the market feed on orders owned by this account.
    #[serde(default)]
    pub mine: bool,
    #[serde(default)]
    pub date: Option<NaiveDateTime>,
}

impl Order {
    pub fn is_limit(&self) -> bool {
        matches!(self.order_type, OrderType::Limit)
    }

    pub fn is_cancel(&self) -> bool {
        matches!(self.order_type, OrderType::Cancel)
    }

    /// Same price, units, side and type. Identity (server id, reference) is ignored.
    pub fn weak_eq(&self, other: &Order) -> bool {
        self.price == other.price
            && self.units == other.units
            && self.side == other.side
            && self.order_type == other.order_type
    }

    /// Same price, units and side, ignoring type. Used to pair a cancel with the order it cancels.
    pub fn weak_eq_ignoring_type(&self, other: &Order) -> bool {
        self.price == other.price && self.units == other.units && self.side == other.side
    }

    /// Notional value of the order.
    pub fn value(&self) -> i64 {
        self.price * self.units
    }

    /// Builds the CANCEL mirror of this order: same price, units, side, market and
    /// server id. The reference keeps every field except the type letter.
    pub fn to_cancel(&self) -> Order {
        if self.is_cancel() {
            log::warn!("making cancel order for cancel order reference={}", self.reference);
        }
        let reference = match ReferenceParts::parse(&self.reference) {
            Some(mut parts) => {
                parts.order_type = OrderType::Cancel;
                parts.to_string()
            }
            None => self.reference.clone(),
        };
        Order {
            order_type: OrderType::Cancel,
            reference,
            ..self.clone()
        }
    }

    /// The LIMIT order a cancel refers to (used when archiving an unmatched cancel).
    pub fn to_limit(&self) -> Order {
        let reference = match ReferenceParts::parse(&self.reference) {
            Some(mut parts) => {
                parts.order_type = OrderType::Limit;
                parts.to_string()
            }
            None => self.reference.clone(),
        };
        Order {
            order_type: OrderType::Limit,
            reference,
            ..self.clone()
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}x{}@{} market={} ref={}",
            self.order_type.code(),
            self.side.code(),
            self.units,
            self.price,
            self.market_id,
            self.reference
        )?;
        if let Some(id) = self.server_id {
            write!(f, " id={}", id.0)?;
        }
        Ok(())
    }
}

/// Static description of a market, provided once at start-up.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub minimum: i64,
    pub maximum: i64,
    pub tick: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub item: String,
    #[serde(default)]
    pub description: String,
}

impl Market {
    /// Price lies within `[minimum, maximum]` and on the tick grid anchored at `minimum`.
    pub fn is_valid_price(&self, price: i64) -> bool {
        self.tick > 0
            && price >= self.minimum
            && price <= self.maximum
            && (price - self.minimum) % self.tick == 0
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "market={} name={} item={} minimum={} maximum={} tick={}",
            self.id, self.name, self.item, self.minimum, self.maximum, self.tick
        )
    }
}

/// Cash part of a holdings snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CashHoldings {
    pub cash: i64,
    pub available_cash: i64,
}

/// Per-market unit holdings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UnitHoldings {
    pub units: i64,
    pub available_units: i64,
}

/// Account holdings as reported by the marketplace.
///
/// "Available" amounts exclude what is reserved by resting orders.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Holdings {
    pub cash: CashHoldings,
    #[serde(default)]
    pub markets: BTreeMap<MarketId, UnitHoldings>,
}

impl Holdings {
    pub fn units(&self, market_id: MarketId) -> Option<&UnitHoldings> {
        self.markets.get(&market_id)
    }
}
