//! Fatal and configuration errors.
//!
//! Protocol desyncs are never errors: the tracker recovers from them locally
//! and logs. Only conditions that make the bot unable to trade at all surface
//! as [`BotError`].

use thiserror::Error;

use crate::types::MarketId;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("marketplace lists no markets")]
    NoMarkets,

    #[error("market {0} is not listed by the marketplace")]
    UnknownMarket(MarketId),

    #[error("no holdings reported for market {0}")]
    MissingHoldings(MarketId),

    #[error("bot is stopped: {0}")]
    Stopped(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("reading configuration failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing configuration failed: {0}")]
    Json(#[from] serde_json::Error),
}
