//! The trading bot: wires marketplace callbacks to the tracker, the decision
//! strategy, the profitability evaluator and the availability check.
//!
//! Per order-book snapshot of the traded market:
//! 1. count the tick and reconcile own orders with the tracker (sending any cancels),
//! 2. log the spread and the best trade opportunity,
//! 3. if no order is outstanding, ask the strategy for a candidate, check it
//!    against available holdings and send it.
//!
//! Callbacks are delivered serially; a stopped bot ignores all of them.

use log::{debug, error, info, warn};
use std::rc::Rc;

use crate::audit::{AuditEvent, AuditSink};
use crate::availability;
use crate::book::BookView;
use crate::config::BotConfig;
use crate::error::BotError;
use crate::evaluator::ProfitEvaluator;
use crate::marketplace::{MarketEvent, Marketplace};
use crate::reference::{Clock, SystemClock};
use crate::strategy::{self, DecisionContext, DecisionStrategy};
use crate::tracker::{ArchivedOrder, Tracker};
use crate::types::{Holdings, Market, MarketId, Order, OrderStatus, Role};

/// Market and role fixed at start-up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub market: Market,
    pub role: Role,
}

/// What trading with the best opposite-side quote would look like right now.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct TradeOpportunity {
    pub price: i64,
    pub units: i64,
    pub profitable: bool,
    pub own_order_in_book: bool,
    pub available: bool,
}

/// Reservation reported by the marketplace while the bot has no order outstanding.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HoldingsInconsistency {
    CashReserved { cash: i64, available_cash: i64 },
    UnitsReserved { market_id: MarketId, units: i64, available_units: i64 },
}

impl TradeOpportunity {
    pub fn is_actionable(&self) -> bool {
        self.profitable && self.available && !self.own_order_in_book
    }
}

pub struct Bot<M: Marketplace> {
    marketplace: M,
    config: BotConfig,
    strategy: Box<dyn DecisionStrategy>,
    evaluator: Box<dyn ProfitEvaluator>,
    clock: Box<dyn Clock>,
    tracker: Tracker,
    audit: Option<Rc<dyn AuditSink>>,
    session: Option<Session>,
    stopped: Option<String>,
}

impl<M: Marketplace> Bot<M> {
    /// Fails only if the configured evaluator cannot be built.
    pub fn new(marketplace: M, config: BotConfig) -> Result<Self, BotError> {
        config.validate()?;
        let evaluator = config.evaluator.build()?;
        Ok(Self {
            strategy: strategy::for_bot_type(config.bot_type, config.order_units),
            tracker: Tracker::new(config.tracker_config()),
            marketplace,
            config,
            evaluator,
            clock: Box::new(SystemClock),
            audit: None,
            session: None,
            stopped: None,
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn DecisionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn ProfitEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_audit(mut self, sink: Rc<dyn AuditSink>) -> Self {
        self.tracker = self.tracker.with_audit(Rc::clone(&sink));
        self.audit = Some(sink);
        self
    }

    /// Picks the traded market and derives the role from cash. Errors stop the bot.
    pub fn initialise(&mut self) -> Result<&Session, BotError> {
        if let Some(reason) = &self.stopped {
            return Err(BotError::Stopped(reason.clone()));
        }
        match self.select_session() {
            Ok(session) => {
                info!(
                    "bot initialised market={} role={:?} bot_type={:?}",
                    session.market, session.role, self.config.bot_type
                );
                Ok(self.session.insert(session))
            }
            Err(e) => {
                self.stop(e.to_string());
                Err(e)
            }
        }
    }

    fn select_session(&self) -> Result<Session, BotError> {
        let markets = self.marketplace.markets();
        let market = match self.config.market_id {
            Some(id) => markets.get(&id).ok_or(BotError::UnknownMarket(id))?,
            None => markets.values().next().ok_or(BotError::NoMarkets)?,
        };
        let holdings = self.marketplace.holdings();
        if holdings.units(market.id).is_none() {
            return Err(BotError::MissingHoldings(market.id));
        }
        Ok(Session {
            market: market.clone(),
            role: Role::from_cash(holdings.cash.cash),
        })
    }

    pub fn dispatch(&mut self, event: MarketEvent) {
        match event {
            MarketEvent::OrderBook { market_id, orders } => self.on_order_book(&orders, market_id),
            MarketEvent::Holdings(holdings) => {
                self.on_holdings(&holdings);
            }
            MarketEvent::Accepted(order) => self.on_order_accepted(&order),
            MarketEvent::Rejected { reason, order } => self.on_order_rejected(&reason, &order),
        }
    }

    /// One tick. Snapshots of other markets are ignored.
    pub fn on_order_book(&mut self, orders: &[Order], market_id: MarketId) {
        let Some(session) = self.active_session() else {
            return;
        };
        if market_id != session.market.id {
            debug!("ignoring order book market={}", market_id);
            return;
        }
        self.tracker.begin_tick();

        let view = BookView::from_snapshot(orders);
        log_spread(&view, &session.market);

        let holdings = self.marketplace.holdings().clone();
        let evaluator = &*self.evaluator;
        let ctx = DecisionContext {
            role: session.role,
            market: &session.market,
            view: &view,
            holdings: &holdings,
            evaluator,
            clock: &*self.clock,
        };
        let requote = self.strategy.requote(&ctx);
        let cancels = self
            .tracker
            .on_snapshot(&view.mine, requote.as_ref(), |o| evaluator.score(o, &holdings));
        for cancel in cancels {
            send(&mut self.marketplace, self.audit.as_deref(), "cancel_sent", &cancel);
        }

        if let Some(opportunity) = trade_opportunity(&ctx) {
            info!(
                "trade opportunity price={} units={} profitable={} own_order_in_book={} available={}",
                opportunity.price,
                opportunity.units,
                opportunity.profitable,
                opportunity.own_order_in_book,
                opportunity.available
            );
        }

        if self.tracker.status() != OrderStatus::Inactive {
            debug!("order outstanding status={:?}", self.tracker.status());
            return;
        }
        let Some(candidate) = self.strategy.propose(&ctx) else {
            debug!("no candidate order this tick");
            return;
        };
        if candidate.side != session.role.side() {
            self.stop(format!(
                "proposed {:?} order {} contradicts role {:?}",
                candidate.side, candidate, session.role
            ));
            return;
        }

        self.tracker.set_made(candidate.clone());
        let availability = availability::check(&candidate, &holdings);
        if !availability.is_sendable() {
            info!(
                "insufficient holdings for {} cash_available={:?} unit_available={:?}",
                candidate, availability.cash_available, availability.unit_available
            );
            self.tracker.discard_made();
            return;
        }
        if let Some(order) = self.tracker.mark_sent() {
            send(&mut self.marketplace, self.audit.as_deref(), "order_sent", &order);
        }
    }

    /// Reports reserved amounts that no outstanding order accounts for.
    ///
    /// PENDING, ACCEPTED and CANCEL orders all hold a reservation: the marketplace
    /// reserves on receipt, which may be reported before the accept arrives.
    pub fn on_holdings(&mut self, holdings: &Holdings) -> Vec<HoldingsInconsistency> {
        let Some(session) = self.active_session() else {
            return Vec::new();
        };
        let reserved = matches!(
            self.tracker.status(),
            OrderStatus::Pending | OrderStatus::Accepted | OrderStatus::Cancel
        );
        if reserved {
            return Vec::new();
        }
        let mut found = Vec::new();
        if holdings.cash.cash > holdings.cash.available_cash {
            warn!(
                "cash reserved with no outstanding order cash={} available_cash={}",
                holdings.cash.cash, holdings.cash.available_cash
            );
            found.push(HoldingsInconsistency::CashReserved {
                cash: holdings.cash.cash,
                available_cash: holdings.cash.available_cash,
            });
        }
        if let Some(units) = holdings.units(session.market.id) {
            if units.units > units.available_units {
                warn!(
                    "units reserved with no outstanding order market={} units={} available_units={}",
                    session.market.id, units.units, units.available_units
                );
                found.push(HoldingsInconsistency::UnitsReserved {
                    market_id: session.market.id,
                    units: units.units,
                    available_units: units.available_units,
                });
            }
        }
        if let Some(sink) = &self.audit {
            for inconsistency in &found {
                sink.emit(&AuditEvent::now(
                    "holdings_inconsistent",
                    None,
                    serde_json::to_value(inconsistency).ok(),
                    "warning",
                ));
            }
        }
        found
    }

    pub fn on_order_accepted(&mut self, order: &Order) {
        if self.active_session().is_none() {
            return;
        }
        self.tracker.on_accepted(order);
    }

    pub fn on_order_rejected(&mut self, reason: &str, order: &Order) {
        if self.active_session().is_none() {
            return;
        }
        self.tracker.on_rejected(reason, order);
    }

    /// Session of a running bot; `None` (with a log) when stopped or not initialised.
    fn active_session(&self) -> Option<Session> {
        if let Some(reason) = &self.stopped {
            debug!("bot stopped, ignoring callback reason={}", reason);
            return None;
        }
        if self.session.is_none() {
            warn!("callback before initialise, ignoring");
        }
        self.session.clone()
    }

    fn stop(&mut self, reason: String) {
        error!("bot stopped reason={}", reason);
        if let Some(sink) = &self.audit {
            sink.emit(&AuditEvent::now(
                "bot_stopped",
                None,
                Some(serde_json::json!({ "reason": reason })),
                "error",
            ));
        }
        self.stopped = Some(reason);
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(|s| s.role)
    }

    pub fn status(&self) -> OrderStatus {
        self.tracker.status()
    }

    pub fn active_order(&self) -> Option<&Order> {
        self.tracker.active_order()
    }

    pub fn archive(&self) -> &[ArchivedOrder] {
        self.tracker.archive()
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_some()
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stopped.as_deref()
    }

    pub fn marketplace(&self) -> &M {
        &self.marketplace
    }

    pub fn marketplace_mut(&mut self) -> &mut M {
        &mut self.marketplace
    }

    pub fn into_marketplace(self) -> M {
        self.marketplace
    }
}

fn send<M: Marketplace>(marketplace: &mut M, audit: Option<&dyn AuditSink>, action: &str, order: &Order) {
    info!(
        "{} reference={} price={} units={} side={:?}",
        action.replace('_', " "),
        order.reference,
        order.price,
        order.units,
        order.side
    );
    if let Some(sink) = audit {
        sink.emit(&AuditEvent::for_order(action, order, "success"));
    }
    marketplace.send_order(order);
}

fn log_spread(view: &BookView, market: &Market) {
    match (view.best_bid(), view.best_ask(), view.spread()) {
        (Some(bid), Some(ask), Some(spread)) => info!(
            "spread market={} bid={} ask={} spread={}",
            market.id, bid.price, ask.price, spread
        ),
        (Some(bid), _, _) => info!("spread market={} bid={} no asks", market.id, bid.price),
        (None, Some(ask), _) => info!("spread market={} ask={} no bids", market.id, ask.price),
        (None, None, _) => info!("spread market={} empty book", market.id),
    }
}

/// The best opposite-side quote, sized and priced as the order that would take it.
pub fn trade_opportunity(ctx: &DecisionContext<'_>) -> Option<TradeOpportunity> {
    let other = ctx.view.best(ctx.role.side().opposite())?;
    let order = ctx.factory().opposite_of(other);
    Some(TradeOpportunity {
        price: order.price,
        units: order.units,
        profitable: ctx.evaluator.is_profitable(&order, ctx.holdings),
        own_order_in_book: !ctx.view.mine.is_empty(),
        available: availability::check(&order, ctx.holdings).is_sendable(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditSink;
    use crate::reference::FixedClock;
    use crate::types::{BotType, CashHoldings, OrderId, OrderType, Side, UnitHoldings};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn init_log() {
        let _ = env_logger::try_init();
    }

    #[derive(Default)]
    struct Recording {
        markets: BTreeMap<MarketId, Market>,
        holdings: Holdings,
        sent: Vec<Order>,
    }

    impl Marketplace for Recording {
        fn markets(&self) -> &BTreeMap<MarketId, Market> {
            &self.markets
        }

        fn holdings(&self) -> &Holdings {
            &self.holdings
        }

        fn send_order(&mut self, order: &Order) {
            self.sent.push(order.clone());
        }
    }

    fn recording(cash: i64, units: i64) -> Recording {
        let mut r = Recording::default();
        r.markets.insert(
            MarketId(1),
            Market {
                id: MarketId(1),
                minimum: 0,
                maximum: 1000,
                tick: 10,
                name: "widgets".into(),
                item: "widget".into(),
                description: String::new(),
            },
        );
        r.holdings.cash = CashHoldings {
            cash,
            available_cash: cash,
        };
        r.holdings.markets.insert(
            MarketId(1),
            UnitHoldings {
                units,
                available_units: units,
            },
        );
        r
    }

    fn clock() -> FixedClock {
        FixedClock::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(10, 0, 0).unwrap())
    }

    fn quote(price: i64, side: Side, mine: bool) -> Order {
        Order {
            price,
            units: 1,
            side,
            order_type: OrderType::Limit,
            market_id: MarketId(1),
            reference: format!("feed-{}", price),
            server_id: Some(OrderId(price as u64)),
            mine,
            date: None,
        }
    }

    fn bot(market: Recording, bot_type: BotType) -> Bot<Recording> {
        let config = BotConfig {
            bot_type,
            ..Default::default()
        };
        let mut bot = Bot::new(market, config).unwrap().with_clock(clock());
        bot.initialise().unwrap();
        bot
    }

    #[test]
    fn role_follows_cash() {
        assert_eq!(bot(recording(1000, 0), BotType::Reactive).role(), Some(Role::Buyer));
        assert_eq!(bot(recording(0, 3), BotType::Reactive).role(), Some(Role::Seller));
    }

    #[test]
    fn unknown_market_stops_the_bot() {
        init_log();
        let sink = InMemoryAuditSink::new();
        let config = BotConfig {
            market_id: Some(MarketId(9)),
            ..Default::default()
        };
        let mut bot = Bot::new(recording(1000, 0), config).unwrap().with_audit(Rc::new(sink.clone()));
        assert!(matches!(bot.initialise(), Err(BotError::UnknownMarket(MarketId(9)))));
        assert!(bot.is_stopped());
        assert_eq!(sink.actions("bot_stopped").len(), 1);
        bot.on_order_book(&[quote(480, Side::Sell, false)], MarketId(1));
        assert!(bot.marketplace().sent.is_empty());
    }

    #[test]
    fn no_markets_and_missing_holdings_are_fatal() {
        let mut bot = Bot::new(Recording::default(), BotConfig::default()).unwrap();
        assert!(matches!(bot.initialise(), Err(BotError::NoMarkets)));
        let mut market = recording(1000, 0);
        market.holdings.markets.clear();
        let mut bot = Bot::new(market, BotConfig::default()).unwrap();
        assert!(matches!(bot.initialise(), Err(BotError::MissingHoldings(MarketId(1)))));
    }

    #[test]
    fn reactive_buyer_sends_and_audits() {
        init_log();
        let sink = InMemoryAuditSink::new();
        let mut bot = Bot::new(recording(1000, 0), BotConfig::default())
            .unwrap()
            .with_clock(clock())
            .with_audit(Rc::new(sink.clone()));
        bot.initialise().unwrap();
        bot.on_order_book(&[quote(480, Side::Sell, false), quote(300, Side::Buy, false)], MarketId(1));
        let sent = &bot.marketplace().sent;
        assert_eq!(sent.len(), 1);
        assert_eq!((sent[0].price, sent[0].side), (480, Side::Buy));
        assert_eq!(sent[0].reference, ":B-1-480-1-24-03-01-10-00-00L");
        assert_eq!(bot.status(), OrderStatus::Pending);
        assert_eq!(sink.actions("order_sent").len(), 1);
    }

    #[test]
    fn reservation_without_outstanding_order_is_reported() {
        init_log();
        let sink = InMemoryAuditSink::new();
        let mut bot = Bot::new(recording(1000, 2), BotConfig::default())
            .unwrap()
            .with_clock(clock())
            .with_audit(Rc::new(sink.clone()));
        bot.initialise().unwrap();
        let mut holdings = bot.marketplace().holdings.clone();
        assert!(bot.on_holdings(&holdings).is_empty());

        holdings.cash.available_cash = 520;
        holdings.markets.insert(
            MarketId(1),
            UnitHoldings {
                units: 2,
                available_units: 1,
            },
        );
        assert_eq!(
            bot.on_holdings(&holdings),
            vec![
                HoldingsInconsistency::CashReserved {
                    cash: 1000,
                    available_cash: 520
                },
                HoldingsInconsistency::UnitsReserved {
                    market_id: MarketId(1),
                    units: 2,
                    available_units: 1
                },
            ]
        );
        assert_eq!(sink.actions("holdings_inconsistent").len(), 2);
    }

    #[test]
    fn reservation_of_pending_order_is_expected() {
        let mut bot = bot(recording(1000, 0), BotType::Reactive);
        bot.on_order_book(&[quote(480, Side::Sell, false)], MarketId(1));
        assert_eq!(bot.status(), OrderStatus::Pending);
        let mut holdings = bot.marketplace().holdings.clone();
        holdings.cash.available_cash = 520;
        assert!(bot.on_holdings(&holdings).is_empty());

        let sent = bot.marketplace().sent[0].clone();
        bot.on_order_accepted(&Order {
            server_id: Some(OrderId(1)),
            mine: true,
            ..sent
        });
        assert_eq!(bot.status(), OrderStatus::Accepted);
        assert!(bot.on_holdings(&holdings).is_empty());
    }

    #[test]
    fn initialising_a_stopped_bot_fails() {
        let config = BotConfig {
            market_id: Some(MarketId(9)),
            ..Default::default()
        };
        let mut bot = Bot::new(recording(1000, 0), config).unwrap();
        assert!(bot.initialise().is_err());
        assert!(matches!(bot.initialise(), Err(BotError::Stopped(_))));
    }

    #[test]
    fn other_market_snapshot_is_ignored() {
        let mut bot = bot(recording(1000, 0), BotType::Reactive);
        bot.on_order_book(&[quote(480, Side::Sell, false)], MarketId(2));
        assert!(bot.marketplace().sent.is_empty());
    }

    #[test]
    fn unaffordable_candidate_is_discarded() {
        let mut bot = bot(recording(100, 0), BotType::Reactive);
        bot.on_order_book(&[quote(480, Side::Sell, false)], MarketId(1));
        assert!(bot.marketplace().sent.is_empty());
        assert_eq!(bot.status(), OrderStatus::Inactive);
        assert!(bot.archive().is_empty());
    }

    #[test]
    fn opportunity_reports_own_order_and_availability() {
        let m = recording(100, 0);
        let market = m.markets[&MarketId(1)].clone();
        let c = clock();
        let e = crate::evaluator::RewardEvaluator::default();
        let view = BookView::from_snapshot(&[quote(480, Side::Sell, false), quote(200, Side::Buy, true)]);
        let ctx = DecisionContext {
            role: Role::Buyer,
            market: &market,
            view: &view,
            holdings: &m.holdings,
            evaluator: &e,
            clock: &c,
        };
        let o = trade_opportunity(&ctx).unwrap();
        assert_eq!(o.price, 480);
        assert!(o.profitable);
        assert!(o.own_order_in_book);
        assert!(!o.available);
        assert!(!o.is_actionable());
    }

    struct WrongSide;

    impl DecisionStrategy for WrongSide {
        fn bot_type(&self) -> BotType {
            BotType::Reactive
        }

        fn propose(&self, ctx: &DecisionContext<'_>) -> Option<Order> {
            Some(ctx.factory().limit(500, 1, ctx.role.side().opposite()))
        }
    }

    #[test]
    fn side_contradicting_role_stops_the_bot() {
        init_log();
        let mut bot = bot(recording(1000, 0), BotType::Reactive).with_strategy(Box::new(WrongSide));
        bot.on_order_book(&[], MarketId(1));
        assert!(bot.is_stopped());
        assert!(bot.marketplace().sent.is_empty());
        assert!(bot.stop_reason().unwrap().contains("contradicts role"));
    }

    #[test]
    fn dispatch_routes_accept_and_reject() {
        let mut bot = bot(recording(1000, 0), BotType::Reactive);
        bot.dispatch(MarketEvent::OrderBook {
            market_id: MarketId(1),
            orders: vec![quote(480, Side::Sell, false)],
        });
        let sent = bot.marketplace().sent[0].clone();
        bot.dispatch(MarketEvent::Rejected {
            reason: "market closed".into(),
            order: sent,
        });
        assert_eq!(bot.status(), OrderStatus::Inactive);
        assert_eq!(bot.archive().len(), 1);
    }
}
