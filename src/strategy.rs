//! Decision strategies: propose at most one new order per tick while the
//! tracker has nothing outstanding.
//!
//! - [`ReactiveStrategy`] takes the best opposite-side quote when trading with it is profitable.
//! - [`MarketMakerStrategy`] rests a quote that improves on the best same-side
//!   competitor without crossing the target price.

use log::{debug, warn};

use crate::book::BookView;
use crate::evaluator::ProfitEvaluator;
use crate::reference::{make_reference, Clock};
use crate::types::{BotType, Holdings, Market, Order, OrderType, Role, Side};

/// Builds LIMIT orders for one market, stamping references from `clock`.
pub struct OrderFactory<'a> {
    pub market: &'a Market,
    pub clock: &'a dyn Clock,
}

impl<'a> OrderFactory<'a> {
    pub fn new(market: &'a Market, clock: &'a dyn Clock) -> Self {
        Self { market, clock }
    }

    pub fn limit(&self, price: i64, units: i64, side: Side) -> Order {
        Order {
            price,
            units,
            side,
            order_type: OrderType::Limit,
            market_id: self.market.id,
            reference: make_reference(self.clock, self.market.id, price, side, units, OrderType::Limit),
            server_id: None,
            mine: false,
            date: None,
        }
    }

    /// Same price and units as `other`, opposite side: trades with it immediately.
    pub fn opposite_of(&self, other: &Order) -> Order {
        self.limit(other.price, other.units, other.side.opposite())
    }
}

/// Everything a strategy reads for one decision.
pub struct DecisionContext<'a> {
    pub role: Role,
    pub market: &'a Market,
    pub view: &'a BookView,
    pub holdings: &'a Holdings,
    pub evaluator: &'a dyn ProfitEvaluator,
    pub clock: &'a dyn Clock,
}

impl<'a> DecisionContext<'a> {
    pub fn factory(&self) -> OrderFactory<'a> {
        OrderFactory::new(self.market, self.clock)
    }
}

pub trait DecisionStrategy {
    fn bot_type(&self) -> BotType;

    /// A profitable candidate order, or `None` to do nothing this tick.
    fn propose(&self, ctx: &DecisionContext<'_>) -> Option<Order>;

    /// The quote this strategy would rest against the current book, before the
    /// profitability check. Strategies that never rest quotes return `None`.
    fn requote(&self, _ctx: &DecisionContext<'_>) -> Option<Order> {
        None
    }
}

/// Builds the strategy for a configured bot type.
pub fn for_bot_type(bot_type: BotType, order_units: i64) -> Box<dyn DecisionStrategy> {
    match bot_type {
        BotType::Reactive => Box::new(ReactiveStrategy),
        BotType::MarketMaker => Box::new(MarketMakerStrategy { order_units }),
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ReactiveStrategy;

impl DecisionStrategy for ReactiveStrategy {
    fn bot_type(&self) -> BotType {
        BotType::Reactive
    }

    fn propose(&self, ctx: &DecisionContext<'_>) -> Option<Order> {
        let other = ctx.view.best(ctx.role.side().opposite())?;
        if other.mine {
            return None;
        }
        let order = ctx.factory().opposite_of(other);
        if ctx.evaluator.is_profitable(&order, ctx.holdings) {
            debug!("reactive candidate {} against {}", order, other);
            Some(order)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MarketMakerStrategy {
    pub order_units: i64,
}

impl Default for MarketMakerStrategy {
    fn default() -> Self {
        Self { order_units: 1 }
    }
}

impl MarketMakerStrategy {
    /// The quote the market maker would rest now, before the profitability check.
    /// Also used to decide whether a resting quote has gone stale.
    pub fn quote(&self, ctx: &DecisionContext<'_>) -> Option<Order> {
        let target = ctx.evaluator.target_price(ctx.market.id)?;
        let side = ctx.role.side();
        let competitor = ctx.view.best(side);
        let price = market_maker_price(ctx.role, ctx.market, target, competitor)?;
        Some(ctx.factory().limit(price, self.order_units, side))
    }
}

impl DecisionStrategy for MarketMakerStrategy {
    fn bot_type(&self) -> BotType {
        BotType::MarketMaker
    }

    fn propose(&self, ctx: &DecisionContext<'_>) -> Option<Order> {
        let order = self.quote(ctx)?;
        if ctx.evaluator.is_profitable(&order, ctx.holdings) {
            debug!("market maker candidate {}", order);
            Some(order)
        } else {
            None
        }
    }

    fn requote(&self, ctx: &DecisionContext<'_>) -> Option<Order> {
        self.quote(ctx)
    }
}

/// Market-maker pricing around `target`:
/// no competitor: halfway between the market bound and the target, on the grid;
/// otherwise improve on the competitor by one tick, match it, or fall back to the
/// best grid price strictly on the profitable side of the target.
/// Prices are snapped to the grid anchored at `minimum`, towards the profitable
/// side, and clamped to the market range.
/// `None` when the best quote is our own or no profitable valid price exists.
pub fn market_maker_price(role: Role, market: &Market, target: i64, competitor: Option<&Order>) -> Option<i64> {
    let tick = market.tick;
    if tick <= 0 || market.maximum < market.minimum {
        return None;
    }
    // Highest on-grid price.
    let top = grid_floor(market, market.maximum);
    let raw = match (role, competitor) {
        (_, Some(c)) if c.mine => return None,
        (Role::Buyer, None) => market.minimum + (target - market.minimum).max(0) / tick / 2 * tick,
        (Role::Buyer, Some(c)) if c.price + tick < target => c.price + tick,
        (Role::Buyer, Some(c)) if c.price < target => c.price,
        (Role::Buyer, Some(_)) => target - 1,
        (Role::Seller, None) => top - (top - target).max(0) / tick / 2 * tick,
        (Role::Seller, Some(c)) if c.price - tick > target => c.price - tick,
        (Role::Seller, Some(c)) if c.price > target => c.price,
        (Role::Seller, Some(_)) => target + 1,
    };
    let price = match role {
        Role::Buyer => grid_floor(market, raw).clamp(market.minimum, top),
        Role::Seller => grid_ceil(market, raw).clamp(market.minimum, top),
    };
    let profitable = match role {
        Role::Buyer => price < target,
        Role::Seller => price > target,
    };
    if !profitable {
        debug!("no profitable market maker price role={:?} target={} market={}", role, target, market);
        return None;
    }
    if market.is_valid_price(price) {
        Some(price)
    } else {
        warn!("market maker price {} is not valid for {}", price, market);
        None
    }
}

fn grid_floor(market: &Market, price: i64) -> i64 {
    market.minimum + (price - market.minimum).div_euclid(market.tick) * market.tick
}

fn grid_ceil(market: &Market, price: i64) -> i64 {
    let floor = grid_floor(market, price);
    if floor < price {
        floor + market.tick
    } else {
        floor
    }
}
