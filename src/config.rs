//! Bot configuration: defaults, JSON file, environment overrides.
//!
//! Every field has a default, so `{}` is a valid config. Environment variables
//! override file values: `BOT_TYPE` (`reactive` | `market_maker`), `MARKET_ID`,
//! `ORDER_UNITS`, `CANCEL_CYCLE_TICKS`, `DS_REWARD`, `MAX_REWARD_UNITS`.

use log::{info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::BotError;
use crate::evaluator::{ProfitEvaluator, RewardEvaluator};
use crate::performance::{PayoffTable, PerformanceEvaluator};
use crate::tracker::TrackerConfig;
use crate::types::{BotType, MarketId};

/// Which profitability model scores candidate orders, e.g.
/// `{"reward": {"reward_per_unit": 500}}` or `{"performance": {"risk_penalty": "0.01", "payoffs": ...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorConfig {
    /// Fixed reward per unit held at settlement, capped.
    Reward {
        #[serde(default = "default_reward")]
        reward_per_unit: i64,
        #[serde(default = "default_max_reward_units")]
        max_reward_units: i64,
    },
    /// Mean-variance performance over a payoff table.
    Performance {
        #[serde(default)]
        risk_penalty: Decimal,
        payoffs: PayoffTable,
    },
}

fn default_reward() -> i64 {
    500
}

fn default_max_reward_units() -> i64 {
    5
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig::Reward {
            reward_per_unit: default_reward(),
            max_reward_units: default_max_reward_units(),
        }
    }
}

impl EvaluatorConfig {
    pub fn build(&self) -> Result<Box<dyn ProfitEvaluator>, BotError> {
        match self {
            EvaluatorConfig::Reward {
                reward_per_unit,
                max_reward_units,
            } => Ok(Box::new(RewardEvaluator::new(*reward_per_unit, *max_reward_units))),
            EvaluatorConfig::Performance { risk_penalty, payoffs } => {
                Ok(Box::new(PerformanceEvaluator::new(payoffs, *risk_penalty)?))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Traded market. `None`: the lowest listed market id.
    pub market_id: Option<MarketId>,
    pub bot_type: BotType,
    /// Units per market-maker quote.
    pub order_units: i64,
    /// Snapshots a market-maker quote may rest before it is withdrawn.
    pub cancel_cycle_ticks: u32,
    /// Snapshots a sent order may stay invisible before it is given up.
    pub pending_grace_ticks: u32,
    pub evaluator: EvaluatorConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            market_id: None,
            bot_type: BotType::Reactive,
            order_units: 1,
            cancel_cycle_ticks: 10,
            pending_grace_ticks: 0,
            evaluator: EvaluatorConfig::default(),
        }
    }
}

impl BotConfig {
    pub fn from_json_str(s: &str) -> Result<Self, BotError> {
        let config: BotConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BotError> {
        let path = path.as_ref();
        info!("loading config path={}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Overrides from process environment variables.
    pub fn apply_env(self) -> Result<Self, BotError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overrides from any key lookup (e.g. a map in tests). Unset keys keep their value.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BotError> {
        if let Some(v) = lookup("BOT_TYPE") {
            self.bot_type = parse_bot_type(&v)?;
        }
        if let Some(v) = lookup("MARKET_ID") {
            self.market_id = Some(MarketId(parse_var("MARKET_ID", &v)?));
        }
        if let Some(v) = lookup("ORDER_UNITS") {
            self.order_units = parse_var("ORDER_UNITS", &v)?;
        }
        if let Some(v) = lookup("CANCEL_CYCLE_TICKS") {
            self.cancel_cycle_ticks = parse_var("CANCEL_CYCLE_TICKS", &v)?;
        }
        let reward = lookup("DS_REWARD");
        let max_units = lookup("MAX_REWARD_UNITS");
        if reward.is_some() || max_units.is_some() {
            match &mut self.evaluator {
                EvaluatorConfig::Reward {
                    reward_per_unit,
                    max_reward_units,
                } => {
                    if let Some(v) = reward {
                        *reward_per_unit = parse_var("DS_REWARD", &v)?;
                    }
                    if let Some(v) = max_units {
                        *max_reward_units = parse_var("MAX_REWARD_UNITS", &v)?;
                    }
                }
                EvaluatorConfig::Performance { .. } => {
                    warn!("DS_REWARD/MAX_REWARD_UNITS ignored: evaluator is performance");
                }
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), BotError> {
        if self.order_units < 1 {
            return Err(BotError::Config(format!("order_units must be positive, got {}", self.order_units)));
        }
        match &self.evaluator {
            EvaluatorConfig::Reward {
                reward_per_unit,
                max_reward_units,
            } => {
                if *reward_per_unit <= 0 || *max_reward_units <= 0 {
                    return Err(BotError::Config(format!(
                        "reward_per_unit and max_reward_units must be positive, got {} and {}",
                        reward_per_unit, max_reward_units
                    )));
                }
            }
            EvaluatorConfig::Performance { risk_penalty, payoffs } => {
                if risk_penalty.is_sign_negative() {
                    return Err(BotError::Config(format!("risk_penalty must not be negative, got {}", risk_penalty)));
                }
                payoffs.validate()?;
            }
        }
        Ok(())
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            bot_type: self.bot_type,
            cancel_cycle_ticks: self.cancel_cycle_ticks,
            pending_grace_ticks: self.pending_grace_ticks,
        }
    }
}

fn parse_bot_type(s: &str) -> Result<BotType, BotError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("reactive") {
        Ok(BotType::Reactive)
    } else if s.eq_ignore_ascii_case("market_maker") || s.eq_ignore_ascii_case("mm") {
        Ok(BotType::MarketMaker)
    } else {
        Err(BotError::Config(format!("unknown BOT_TYPE {:?}", s)))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, BotError> {
    value
        .trim()
        .parse()
        .map_err(|_| BotError::Config(format!("{} has invalid value {:?}", key, value)))
}
