//! # DS Trading Bot
//!
//! Single-order lifecycle tracking and decision logic for a bot trading in an
//! induced demand-supply market: the bot holds at most one active order,
//! reconciles it against order-book snapshots and accept/reject callbacks, and
//! proposes new orders when trading is profitable under a fixed reward (or a
//! mean-variance performance) model.
//!
//! ## Entry point
//!
//! Wrap a [`Marketplace`] implementation in a [`Bot`], call
//! [`Bot::initialise`], then feed it every callback through [`Bot::dispatch`].
//!
//! ## Example
//!
//! ```rust
//! use ds_trading_bot::sim::SimMarketplace;
//! use ds_trading_bot::{Bot, BotConfig, CashHoldings, Holdings, Market, MarketId, OrderStatus, UnitHoldings};
//!
//! let market = Market {
//!     id: MarketId(1),
//!     minimum: 0,
//!     maximum: 1000,
//!     tick: 10,
//!     name: "widgets".into(),
//!     item: "widget".into(),
//!     description: String::new(),
//! };
//! let mut holdings = Holdings {
//!     cash: CashHoldings { cash: 1000, available_cash: 1000 },
//!     ..Default::default()
//! };
//! holdings.markets.insert(MarketId(1), UnitHoldings { units: 0, available_units: 0 });
//!
//! let mut bot = Bot::new(SimMarketplace::new(vec![market], holdings), BotConfig::default()).unwrap();
//! bot.initialise().unwrap();
//! bot.marketplace_mut().publish_tick();
//! while let Some(event) = bot.marketplace_mut().poll_event() {
//!     bot.dispatch(event);
//! }
//! assert_eq!(bot.status(), OrderStatus::Inactive);
//! ```
//!
//! ## Lower-level API
//!
//! [`Tracker`] and [`reconcile`] can be driven directly; the evaluators,
//! strategies and [`availability::check`] are pure and usable on their own.

pub mod audit;
pub mod availability;
pub mod book;
pub mod bot;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod marketplace;
pub mod performance;
pub mod reference;
pub mod sim;
pub mod strategy;
pub mod tracker;
pub mod types;

pub use audit::{AuditEvent, AuditSink, InMemoryAuditSink, StdoutAuditSink};
pub use availability::Availability;
pub use book::BookView;
pub use bot::{Bot, HoldingsInconsistency, Session, TradeOpportunity};
pub use config::{BotConfig, EvaluatorConfig};
pub use error::BotError;
pub use evaluator::{ProfitEvaluator, RewardEvaluator};
pub use marketplace::{MarketEvent, Marketplace};
pub use performance::{PayoffTable, PerformanceEvaluator};
pub use reference::{make_reference, Clock, FixedClock, ReferenceParts, SystemClock};
pub use strategy::{DecisionContext, DecisionStrategy, MarketMakerStrategy, ReactiveStrategy};
pub use tracker::{reconcile, should_cancel, ActiveOrder, ArchivedOrder, Reconciliation, Tracker, TrackerConfig};
pub use types::{
    BotType, CashHoldings, Holdings, Market, MarketId, Order, OrderId, OrderStatus, OrderType, Role, Side,
    UnitHoldings,
};
