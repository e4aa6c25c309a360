//! Order references: human- and machine-readable ids embedding side, market,
//! price, units, a second-granularity timestamp and the order type.
//!
//! Format: `:<side>-<market>-<price>-<units>-<yy>-<mm>-<dd>-<HH>-<MM>-<SS><type>`,
//! e.g. `:B-1-250-1-24-03-01-10-00-00L`. A cancel's reference differs from
//! the order it cancels only in the trailing type letter.

use chrono::{Local, NaiveDateTime};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::types::{MarketId, OrderType, Side};

const SEPARATOR: char = '-';
const TIMESTAMP_FORMAT: &str = "%y-%m-%d-%H-%M-%S";

/// Source of wall-clock time for references.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually advanced clock for tests and simulated sessions.
#[derive(Debug)]
pub struct FixedClock {
    now: Cell<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self { now: Cell::new(start) }
    }

    pub fn advance_secs(&self, secs: i64) {
        self.now.set(self.now.get() + chrono::Duration::seconds(secs));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// Builds the reference for an order placed now.
pub fn make_reference(
    clock: &dyn Clock,
    market_id: MarketId,
    price: i64,
    side: Side,
    units: i64,
    order_type: OrderType,
) -> String {
    ReferenceParts {
        side,
        market_id,
        price,
        units,
        timestamp: clock.now(),
        order_type,
    }
    .to_string()
}

/// Decoded fields of a reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceParts {
    pub side: Side,
    pub market_id: MarketId,
    pub price: i64,
    pub units: i64,
    pub timestamp: NaiveDateTime,
    pub order_type: OrderType,
}

impl ReferenceParts {
    /// Parses a reference produced by [`make_reference`]. Foreign references yield `None`.
    pub fn parse(reference: &str) -> Option<ReferenceParts> {
        let body = reference.strip_prefix(':')?;
        let type_code = body.chars().last()?;
        let order_type = match type_code {
            'L' => OrderType::Limit,
            'M' => OrderType::Cancel,
            _ => return None,
        };
        let body = &body[..body.len() - type_code.len_utf8()];
        let mut fields = body.splitn(5, SEPARATOR);
        let side = match fields.next()? {
            "B" => Side::Buy,
            "S" => Side::Sell,
            _ => return None,
        };
        let market_id = MarketId(fields.next()?.parse().ok()?);
        let price = fields.next()?.parse().ok()?;
        let units = fields.next()?.parse().ok()?;
        let timestamp = NaiveDateTime::parse_from_str(fields.next()?, TIMESTAMP_FORMAT).ok()?;
        Some(ReferenceParts {
            side,
            market_id,
            price,
            units,
            timestamp,
            order_type,
        })
    }

    /// True when both references describe the same order and differ only in type.
    pub fn pairs_with(&self, other: &ReferenceParts) -> bool {
        self.side == other.side
            && self.market_id == other.market_id
            && self.price == other.price
            && self.units == other.units
            && self.timestamp == other.timestamp
            && self.order_type != other.order_type
    }
}

impl fmt::Display for ReferenceParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            ":{side}{sep}{market}{sep}{price}{sep}{units}{sep}{ts}{kind}",
            side = self.side.code(),
            market = self.market_id.0,
            price = self.price,
            units = self.units,
            ts = self.timestamp.format(TIMESTAMP_FORMAT),
            kind = self.order_type.code(),
            sep = SEPARATOR,
        )
    }
}

/// True when `cancel_reference` names the cancel of `order_reference`.
pub fn is_cancel_of(order_reference: &str, cancel_reference: &str) -> bool {
    match (
        ReferenceParts::parse(order_reference),
        ReferenceParts::parse(cancel_reference),
    ) {
        (Some(order), Some(cancel)) => {
            order.order_type == OrderType::Limit && order.pairs_with(&cancel)
        }
        _ => false,
    }
}
