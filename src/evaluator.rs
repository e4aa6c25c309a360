//! Profitability evaluation of candidate orders.
//!
//! The induced demand-supply market pays a fixed reward per unit held at
//! settlement, up to a maximum number of units. A trade is worth its effect on
//! that terminal payoff: [`RewardEvaluator`] scores it accordingly. The
//! mean-variance alternative lives in [`crate::performance`].

use log::{debug, error};

use crate::types::{Holdings, MarketId, Order, Side};

/// Scores candidate orders against current holdings.
pub trait ProfitEvaluator {
    /// Signed gain of executing `order`. `None` for malformed input; callers skip quietly.
    fn score(&self, order: &Order, holdings: &Holdings) -> Option<i64>;

    /// Reference price the market-maker strategy quotes around.
    fn target_price(&self, market_id: MarketId) -> Option<i64>;

    /// Score strictly positive.
    fn is_profitable(&self, order: &Order, holdings: &Holdings) -> bool {
        matches!(self.score(order, holdings), Some(score) if score > 0)
    }
}

/// Fixed reward per unit, capped at `max_reward_units`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RewardEvaluator {
    pub reward_per_unit: i64,
    pub max_reward_units: i64,
}

impl Default for RewardEvaluator {
    fn default() -> Self {
        Self {
            reward_per_unit: 500,
            max_reward_units: 5,
        }
    }
}

impl RewardEvaluator {
    pub fn new(reward_per_unit: i64, max_reward_units: i64) -> Self {
        Self {
            reward_per_unit,
            max_reward_units,
        }
    }

    /// BUY: marginal capped reward minus cost, given `held` units.
    pub fn buy_score(&self, held: i64, price: i64, units: i64) -> i64 {
        let current = held * self.reward_per_unit;
        let after = self.max_reward_units.min(held + units) * self.reward_per_unit - price * units;
        after - current
    }

    /// SELL: premium over the reward per unit given up.
    pub fn sell_score(&self, price: i64, units: i64) -> i64 {
        (price - self.reward_per_unit) * units
    }
}

impl ProfitEvaluator for RewardEvaluator {
    fn score(&self, order: &Order, holdings: &Holdings) -> Option<i64> {
        if !order.is_limit() || order.units < 1 {
            error!("cannot evaluate order {}", order);
            return None;
        }
        let score = match order.side {
            Side::Buy => {
                let Some(units) = holdings.units(order.market_id) else {
                    error!("no holdings for market={} while evaluating {}", order.market_id, order);
                    return None;
                };
                self.buy_score(units.available_units, order.price, order.units)
            }
            Side::Sell => self.sell_score(order.price, order.units),
        };
        debug!(
            "evaluated side={:?} price={} units={} reward={} score={}",
            order.side, order.price, order.units, self.reward_per_unit, score
        );
        Some(score)
    }

    fn target_price(&self, _market_id: MarketId) -> Option<i64> {
        Some(self.reward_per_unit)
    }
}
