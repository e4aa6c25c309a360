//! Checks a candidate order against available cash or units before sending.

use serde::Serialize;

use crate::types::{Holdings, Order, Side};

/// Result of an availability check. Exactly one field is set, depending on side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Availability {
    /// BUY: `price × units ≤ available_cash`.
    pub cash_available: Option<bool>,
    /// SELL: `units ≤ available_units`.
    pub unit_available: Option<bool>,
}

impl Availability {
    /// The field relevant to the order's side is `true`.
    pub fn is_sendable(&self) -> bool {
        self.cash_available == Some(true) || self.unit_available == Some(true)
    }
}

/// Pure read of the holdings snapshot.
pub fn check(order: &Order, holdings: &Holdings) -> Availability {
    match order.side {
        Side::Buy => Availability {
            cash_available: Some(order.value() <= holdings.cash.available_cash),
            unit_available: None,
        },
        Side::Sell => {
            let available = holdings
                .units(order.market_id)
                .map(|u| u.available_units)
                .unwrap_or(0);
            Availability {
                cash_available: None,
                unit_available: Some(order.units <= available),
            }
        }
    }
}
