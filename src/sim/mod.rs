//! Simulated marketplace for demos and end-to-end tests.
//!
//! [`SimMarketplace`] implements [`crate::marketplace::Marketplace`] on top of a
//! per-market price-time [`SimBook`]; [`Generator`] supplies seeded counterparty
//! flow and [`session::run`] drives a bot through a number of ticks.

pub mod book;
pub mod exchange;
pub mod generator;
pub mod session;

pub use book::{Fill, Resting, SimBook, TraderId};
pub use exchange::{BotTrade, OrderCounts, SimMarketplace, BOT_TRADER};
pub use generator::{Generator, GeneratorConfig};
pub use session::{SessionConfig, SessionSummary};
