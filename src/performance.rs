//! Mean-variance portfolio performance across several markets.
//!
//! Each market pays one of `states` equally likely payoffs at settlement.
//! Performance of a portfolio is `cash + Σ E_i·u_i − b·Var(payoff)`, where
//! `b` is the risk penalty. [`PerformanceEvaluator`] scores an order by the
//! change in performance it would cause, so it can stand in for
//! [`crate::evaluator::RewardEvaluator`].

use log::{debug, error, info};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::error::BotError;
use crate::evaluator::ProfitEvaluator;
use crate::types::{Holdings, MarketId, Order, Side};

/// Largest payoff magnitude a table may hold, so moments fit in a `Decimal`.
pub const MAX_PAYOFF: i64 = 1_000_000_000;

/// Payoff per state for each market. Every row has exactly `states` entries.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PayoffTable {
    pub states: usize,
    pub payoffs: BTreeMap<MarketId, Vec<i64>>,
}

impl PayoffTable {
    pub fn validate(&self) -> Result<(), BotError> {
        if self.states == 0 {
            return Err(BotError::Config("payoff table needs at least one state".into()));
        }
        if self.payoffs.is_empty() {
            return Err(BotError::Config("payoff table lists no markets".into()));
        }
        for (market_id, row) in &self.payoffs {
            if row.len() != self.states {
                return Err(BotError::Config(format!(
                    "market {} has {} payoffs, expected {}",
                    market_id,
                    row.len(),
                    self.states
                )));
            }
            if row.iter().any(|p| p.abs() > MAX_PAYOFF) {
                return Err(BotError::Config(format!(
                    "market {} has a payoff beyond {}",
                    market_id, MAX_PAYOFF
                )));
            }
        }
        Ok(())
    }
}

/// Precomputed moments of a [`PayoffTable`] plus the risk penalty.
#[derive(Clone, Debug)]
pub struct PerformanceEvaluator {
    risk_penalty: Decimal,
    expected: BTreeMap<MarketId, Decimal>,
    variances: BTreeMap<MarketId, Decimal>,
    /// Keyed by (lower id, higher id).
    covariances: BTreeMap<(MarketId, MarketId), Decimal>,
}

impl PerformanceEvaluator {
    pub fn new(table: &PayoffTable, risk_penalty: Decimal) -> Result<Self, BotError> {
        table.validate()?;
        let n = Decimal::from(table.states as u64);
        let mut expected = BTreeMap::new();
        let mut variances = BTreeMap::new();
        for (&market_id, row) in &table.payoffs {
            let sum: Decimal = row.iter().map(|&p| Decimal::from(p)).sum();
            let sum_sq: Decimal = row.iter().map(|&p| Decimal::from(p) * Decimal::from(p)).sum();
            let mean = sum / n;
            let variance = sum_sq / n - (sum * sum) / (n * n);
            info!("payoff moments market={} expected={} variance={}", market_id, mean, variance);
            expected.insert(market_id, mean);
            variances.insert(market_id, variance);
        }
        let mut covariances = BTreeMap::new();
        for (&a, row_a) in &table.payoffs {
            for (&b, row_b) in table.payoffs.range((std::ops::Bound::Excluded(a), std::ops::Bound::Unbounded)) {
                let cross: Decimal = row_a
                    .iter()
                    .zip(row_b)
                    .map(|(&x, &y)| Decimal::from(x) * Decimal::from(y))
                    .sum();
                let cov = cross / n - expected[&a] * expected[&b];
                debug!("payoff covariance markets={}-{} covariance={}", a, b, cov);
                covariances.insert((a, b), cov);
            }
        }
        Ok(Self {
            risk_penalty,
            expected,
            variances,
            covariances,
        })
    }

    pub fn expected_return(&self, market_id: MarketId) -> Option<Decimal> {
        self.expected.get(&market_id).copied()
    }

    pub fn variance(&self, market_id: MarketId) -> Option<Decimal> {
        self.variances.get(&market_id).copied()
    }

    pub fn covariance(&self, a: MarketId, b: MarketId) -> Option<Decimal> {
        if a == b {
            return self.variance(a);
        }
        let key = if a < b { (a, b) } else { (b, a) };
        self.covariances.get(&key).copied()
    }

    /// Markets whose payoff never varies (the risk-free "note").
    pub fn risk_free_markets(&self) -> Vec<MarketId> {
        self.variances
            .iter()
            .filter(|(_, v)| v.is_zero())
            .map(|(&m, _)| m)
            .collect()
    }

    /// Variance of the settlement payoff of holding `units` per market.
    /// `None` when the result does not fit in a `Decimal`.
    pub fn portfolio_variance(&self, units: &BTreeMap<MarketId, i64>) -> Option<Decimal> {
        let mut total = Decimal::ZERO;
        for (market_id, &u) in units {
            if let Some(var) = self.variances.get(market_id) {
                let u = Decimal::from(u);
                total = total.checked_add(u.checked_mul(u)?.checked_mul(*var)?)?;
            }
        }
        for (&(a, b), cov) in &self.covariances {
            let ua = Decimal::from(units.get(&a).copied().unwrap_or(0));
            let ub = Decimal::from(units.get(&b).copied().unwrap_or(0));
            let term = Decimal::TWO.checked_mul(ua)?.checked_mul(ub)?.checked_mul(*cov)?;
            total = total.checked_add(term)?;
        }
        Some(total)
    }

    /// `cash + Σ E_i·u_i − b·variance`, or `None` on overflow.
    pub fn performance(&self, cash: i64, units: &BTreeMap<MarketId, i64>) -> Option<Decimal> {
        let mut expected_payoff = Decimal::from(cash);
        for (market_id, &u) in units {
            if let Some(e) = self.expected.get(market_id) {
                expected_payoff = expected_payoff.checked_add(e.checked_mul(Decimal::from(u))?)?;
            }
        }
        let penalty = self.risk_penalty.checked_mul(self.portfolio_variance(units)?)?;
        expected_payoff.checked_sub(penalty)
    }

    /// Performance after executing `orders` against available cash and units.
    /// `None` on overflow.
    pub fn potential_performance(&self, holdings: &Holdings, orders: &[Order]) -> Option<Decimal> {
        let mut cash = holdings.cash.available_cash;
        let mut units: BTreeMap<MarketId, i64> = self
            .expected
            .keys()
            .map(|&m| (m, holdings.units(m).map(|u| u.available_units).unwrap_or(0)))
            .collect();
        for order in orders {
            let held = units.entry(order.market_id).or_insert(0);
            let value = order.price.checked_mul(order.units)?;
            match order.side {
                Side::Buy => {
                    *held = held.checked_add(order.units)?;
                    cash = cash.checked_sub(value)?;
                }
                Side::Sell => {
                    *held = held.checked_sub(order.units)?;
                    cash = cash.checked_add(value)?;
                }
            }
        }
        self.performance(cash, &units)
    }
}

impl ProfitEvaluator for PerformanceEvaluator {
    fn score(&self, order: &Order, holdings: &Holdings) -> Option<i64> {
        if !order.is_limit() || order.units < 1 {
            error!("cannot evaluate order {}", order);
            return None;
        }
        if !self.expected.contains_key(&order.market_id) {
            error!("no payoffs for market={} while evaluating {}", order.market_id, order);
            return None;
        }
        let (Some(current), Some(after)) = (
            self.potential_performance(holdings, &[]),
            self.potential_performance(holdings, std::slice::from_ref(order)),
        ) else {
            error!("performance overflow while evaluating {}", order);
            return None;
        };
        let delta = after.checked_sub(current)?.round().to_i64()?;
        debug!(
            "performance side={:?} price={} units={} current={} after={} score={}",
            order.side, order.price, order.units, current, after, delta
        );
        Some(delta)
    }

    fn target_price(&self, market_id: MarketId) -> Option<i64> {
        self.expected_return(market_id)?.round().to_i64()
    }
}
