//! Lifecycle tracking of the bot's single active order.
//!
//! The active order lives inside [`ActiveOrder`], so an order can only exist
//! in a non-inactive state. Order-book snapshots are first classified by the
//! pure [`reconcile`] function and then applied by [`Tracker::on_snapshot`].
//! Accept and reject notifications are matched by weak equality (price, units,
//! side, type) rather than by id.
//!
//! The marketplace is the source of truth: whenever local belief and a report
//! disagree, the tracker adopts the report and logs. Nothing here returns an error.

use log::{debug, error, info, warn};
use std::rc::Rc;

use crate::audit::{AuditEvent, AuditSink};
use crate::reference::is_cancel_of;
use crate::types::{BotType, Order, OrderStatus, OrderType};

/// The active order, tagged by lifecycle state. `ticks` counts snapshots seen in that state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ActiveOrder {
    #[default]
    Inactive,
    /// Built locally, not yet sent.
    Made(Order),
    /// Sent, awaiting accept/reject.
    Pending { order: Order, ticks: u32 },
    /// Resting in the order book.
    Accepted { order: Order, ticks: u32 },
    /// Cancel sent for `order`, awaiting confirmation.
    Cancel { order: Order, cancel: Order, ticks: u32 },
}

impl ActiveOrder {
    pub fn status(&self) -> OrderStatus {
        match self {
            ActiveOrder::Inactive => OrderStatus::Inactive,
            ActiveOrder::Made(_) => OrderStatus::Made,
            ActiveOrder::Pending { .. } => OrderStatus::Pending,
            ActiveOrder::Accepted { .. } => OrderStatus::Accepted,
            ActiveOrder::Cancel { .. } => OrderStatus::Cancel,
        }
    }

    /// The LIMIT order being tracked, if any.
    pub fn order(&self) -> Option<&Order> {
        match self {
            ActiveOrder::Inactive => None,
            ActiveOrder::Made(order)
            | ActiveOrder::Pending { order, .. }
            | ActiveOrder::Accepted { order, .. }
            | ActiveOrder::Cancel { order, .. } => Some(order),
        }
    }

    pub fn ticks(&self) -> u32 {
        match self {
            ActiveOrder::Pending { ticks, .. }
            | ActiveOrder::Accepted { ticks, .. }
            | ActiveOrder::Cancel { ticks, .. } => *ticks,
            _ => 0,
        }
    }
}

/// An order that reached the end of its lifecycle, with the cancel that ended it (if any).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ArchivedOrder {
    pub order: Order,
    pub cancel: Option<Order>,
}

/// How a snapshot's own orders relate to the tracked state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// Nothing tracked and nothing in the book.
    Idle,
    /// The accepted order is still resting; apply the cancellation policy.
    Review { reported: Order },
    /// An own order rests in the book that the tracker did not know was accepted.
    Adopt { reported: Order },
    /// The order is still resting while its cancel is outstanding.
    AwaitCancel,
    /// The accepted order left the book: it traded.
    Completed,
    /// Sent but not yet visible; within the grace period.
    AwaitAccept,
    /// Sent, never seen, and past the grace period.
    Lost,
    /// The order left the book while its cancel was outstanding.
    Withdrawn,
    /// Several own orders rest at once. Keep the best, cancel the rest.
    Cleanup { keep: Order, cancel: Vec<Order> },
}

/// Classifies a snapshot against local state. Pure: `score` ranks own orders for cleanup.
pub fn reconcile(
    state: &ActiveOrder,
    own: &[Order],
    pending_grace_ticks: u32,
    score: impl Fn(&Order) -> Option<i64>,
) -> Reconciliation {
    match own {
        [] => match state {
            ActiveOrder::Inactive | ActiveOrder::Made(_) => Reconciliation::Idle,
            ActiveOrder::Pending { ticks, .. } if *ticks <= pending_grace_ticks => Reconciliation::AwaitAccept,
            ActiveOrder::Pending { .. } => Reconciliation::Lost,
            ActiveOrder::Accepted { .. } => Reconciliation::Completed,
            ActiveOrder::Cancel { .. } => Reconciliation::Withdrawn,
        },
        [reported] => match state {
            ActiveOrder::Accepted { .. } => Reconciliation::Review {
                reported: reported.clone(),
            },
            ActiveOrder::Cancel { .. } => Reconciliation::AwaitCancel,
            _ => Reconciliation::Adopt {
                reported: reported.clone(),
            },
        },
        many => {
            let mut ranked: Vec<(Option<i64>, &Order)> = many.iter().map(|o| (score(o), o)).collect();
            // Stable: ties keep snapshot order. Unscorable orders rank last.
            ranked.sort_by(|a, b| b.0.unwrap_or(i64::MIN).cmp(&a.0.unwrap_or(i64::MIN)));
            let keep = ranked[0].1.clone();
            let cancel = ranked[1..].iter().map(|(_, o)| (*o).clone()).collect();
            Reconciliation::Cleanup { keep, cancel }
        }
    }
}

/// Whether a resting, accepted order should be withdrawn.
///
/// Reactive orders are withdrawn as soon as they are seen resting. Market-maker
/// quotes are withdrawn after `cancel_cycle_ticks` snapshots, or when the quote
/// recomputed against the current book (`requote`) differs from the resting one.
pub fn should_cancel(
    bot_type: BotType,
    resting: &Order,
    ticks: u32,
    cancel_cycle_ticks: u32,
    requote: Option<&Order>,
) -> bool {
    match bot_type {
        BotType::Reactive => true,
        BotType::MarketMaker => {
            ticks >= cancel_cycle_ticks || requote.map_or(false, |q| !q.weak_eq(resting))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    pub bot_type: BotType,
    pub cancel_cycle_ticks: u32,
    pub pending_grace_ticks: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            bot_type: BotType::Reactive,
            cancel_cycle_ticks: 10,
            pending_grace_ticks: 0,
        }
    }
}

/// Owns the active order and the archive of finished ones.
pub struct Tracker {
    config: TrackerConfig,
    state: ActiveOrder,
    archive: Vec<ArchivedOrder>,
    audit: Option<Rc<dyn AuditSink>>,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            state: ActiveOrder::Inactive,
            archive: Vec::new(),
            audit: None,
        }
    }

    pub fn with_audit(mut self, sink: Rc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> &ActiveOrder {
        &self.state
    }

    pub fn status(&self) -> OrderStatus {
        self.state.status()
    }

    pub fn active_order(&self) -> Option<&Order> {
        self.state.order()
    }

    /// Finished orders, oldest first.
    pub fn archive(&self) -> &[ArchivedOrder] {
        &self.archive
    }

    /// Counts one snapshot against the current state.
    pub fn begin_tick(&mut self) {
        let status = self.state.status();
        match &mut self.state {
            ActiveOrder::Pending { ticks, .. }
            | ActiveOrder::Accepted { ticks, .. }
            | ActiveOrder::Cancel { ticks, .. } => {
                *ticks += 1;
                debug!("order tick status={:?} ticks={}", status, *ticks);
            }
            _ => {}
        }
    }

    /// INACTIVE -> MADE.
    pub fn set_made(&mut self, order: Order) {
        if !matches!(self.state, ActiveOrder::Inactive) {
            error!(
                "replacing active order in state {:?} with {}",
                self.state.status(),
                order
            );
        }
        info!("order made {}", order);
        self.state = ActiveOrder::Made(order);
    }

    /// MADE -> PENDING. Returns the order to send.
    pub fn mark_sent(&mut self) -> Option<Order> {
        match std::mem::take(&mut self.state) {
            ActiveOrder::Made(order) => {
                info!("order pending {}", order);
                self.state = ActiveOrder::Pending {
                    order: order.clone(),
                    ticks: 0,
                };
                Some(order)
            }
            other => {
                warn!("cannot send order in state {:?}", other.status());
                self.state = other;
                None
            }
        }
    }

    /// MADE -> INACTIVE for an order that could not be sent. Not archived.
    pub fn discard_made(&mut self) {
        if let ActiveOrder::Made(order) = &self.state {
            debug!("order discarded before sending {}", order);
            self.state = ActiveOrder::Inactive;
        }
    }

    /// Reconciles the bot's own orders in a snapshot. Returns cancel orders to send.
    ///
    /// `requote` is the market-maker quote recomputed against the same snapshot;
    /// `score` ranks own orders when more than one is found.
    pub fn on_snapshot(
        &mut self,
        own: &[Order],
        requote: Option<&Order>,
        score: impl Fn(&Order) -> Option<i64>,
    ) -> Vec<Order> {
        let mut outbound = Vec::new();
        let outcome = reconcile(&self.state, own, self.config.pending_grace_ticks, score);
        match outcome {
            Reconciliation::Idle | Reconciliation::AwaitAccept => {}
            Reconciliation::Review { reported } => {
                let (order, ticks) = match std::mem::take(&mut self.state) {
                    ActiveOrder::Accepted { order, ticks } => (order, ticks),
                    other => {
                        self.state = other;
                        return outbound;
                    }
                };
                let order = if order.weak_eq(&reported) {
                    order
                } else {
                    error!(
                        "resting order {} differs from active order {}, adopting the book's",
                        reported, order
                    );
                    self.emit(AuditEvent::for_order("desync_recovered", &reported, "recovered"));
                    reported
                };
                if should_cancel(self.config.bot_type, &order, ticks, self.config.cancel_cycle_ticks, requote) {
                    info!(
                        "cancelling resting order {} bot_type={:?} ticks={}",
                        order, self.config.bot_type, ticks
                    );
                    let cancel = order.to_cancel();
                    outbound.push(cancel.clone());
                    self.state = ActiveOrder::Cancel { order, cancel, ticks: 0 };
                } else {
                    self.state = ActiveOrder::Accepted { order, ticks };
                }
            }
            Reconciliation::Adopt { reported } => {
                warn!(
                    "own order {} found while status is {:?}, adopting as accepted",
                    reported,
                    self.state.status()
                );
                if let Some(local) = self.state.order().cloned() {
                    if !local.weak_eq(&reported) {
                        self.archive_order(local, None);
                    }
                }
                self.emit(AuditEvent::for_order("desync_recovered", &reported, "recovered"));
                self.state = ActiveOrder::Accepted {
                    order: reported,
                    ticks: 0,
                };
            }
            Reconciliation::AwaitCancel => {
                if let ActiveOrder::Cancel { order, cancel, ticks } = &mut self.state {
                    if *ticks >= self.config.cancel_cycle_ticks {
                        warn!("cancel for {} unconfirmed after {} ticks, resending", order, ticks);
                        outbound.push(cancel.clone());
                        *ticks = 0;
                    } else {
                        debug!("awaiting cancel confirmation for {}", order);
                    }
                }
            }
            Reconciliation::Completed => {
                if let Some(order) = self.state.order() {
                    info!("order completed {}", order);
                }
                self.deactivate(None);
            }
            Reconciliation::Lost => {
                warn!(
                    "pending order {} absent from the book with no accept or reject, resetting",
                    self.state.order().map(|o| o.to_string()).unwrap_or_default()
                );
                self.deactivate(None);
            }
            Reconciliation::Withdrawn => {
                match std::mem::take(&mut self.state) {
                    ActiveOrder::Cancel { order, cancel, .. } => {
                        warn!("order {} left the book before its cancel was confirmed", order);
                        self.archive_order(order, Some(cancel));
                    }
                    other => self.state = other,
                }
            }
            Reconciliation::Cleanup { keep, cancel } => {
                error!("{} own orders in the book, keeping {}", cancel.len() + 1, keep);
                for extra in &cancel {
                    info!("cancelling extra own order {}", extra);
                    outbound.push(extra.to_cancel());
                }
                if let Some(local) = self.state.order().cloned() {
                    if !local.weak_eq(&keep) && !cancel.iter().any(|o| o.weak_eq(&local)) {
                        self.archive_order(local, None);
                    }
                }
                self.emit(AuditEvent::for_order("desync_recovered", &keep, "recovered"));
                self.state = ActiveOrder::Accepted { order: keep, ticks: 0 };
            }
        }
        outbound
    }

    /// Accept notification from the marketplace.
    pub fn on_accepted(&mut self, accepted: &Order) {
        match accepted.order_type {
            OrderType::Limit => {
                let status = self.state.status();
                let matches = self.state.order().map_or(false, |o| o.weak_eq(accepted));
                if matches {
                    if status != OrderStatus::Pending {
                        warn!("order {} accepted while status is {:?}", accepted, status);
                    }
                    if let ActiveOrder::Cancel { order, .. } = &mut self.state {
                        // Late accept: keep waiting for the cancel, but learn the server id.
                        *order = accepted.clone();
                        return;
                    }
                } else {
                    error!(
                        "accepted order {} differs from active order {}, adopting it",
                        accepted,
                        self.state.order().map(|o| o.to_string()).unwrap_or_else(|| "none".into())
                    );
                    if let Some(local) = self.state.order().cloned() {
                        self.archive_order(local, None);
                    }
                    self.emit(AuditEvent::for_order("desync_recovered", accepted, "recovered"));
                }
                info!("order accepted {}", accepted);
                self.state = ActiveOrder::Accepted {
                    order: accepted.clone(),
                    ticks: 0,
                };
            }
            OrderType::Cancel => {
                let status = self.state.status();
                let matches = self.state.order().map_or(false, |o| o.weak_eq_ignoring_type(accepted));
                if matches {
                    if status != OrderStatus::Cancel {
                        warn!("cancel {} accepted while status is {:?}", accepted, status);
                    }
                    info!("order cancelled {}", accepted);
                    self.deactivate(Some(accepted.clone()));
                } else {
                    error!(
                        "cancelled order {} differs from active order {}",
                        accepted,
                        self.state.order().map(|o| o.to_string()).unwrap_or_else(|| "none".into())
                    );
                    // A late cancel for an order already archived completes that entry.
                    let archived = self
                        .archive
                        .iter_mut()
                        .rev()
                        .find(|a| a.cancel.is_none() && is_cancel_of(&a.order.reference, &accepted.reference));
                    match archived {
                        Some(entry) => {
                            info!("late cancel {} paired with archived order {}", accepted, entry.order);
                            entry.cancel = Some(accepted.clone());
                        }
                        None => self.archive_order(accepted.to_limit(), Some(accepted.clone())),
                    }
                }
            }
        }
    }

    /// Reject notification from the marketplace.
    pub fn on_rejected(&mut self, reason: &str, rejected: &Order) {
        self.emit(AuditEvent::now(
            "order_rejected",
            Some(rejected.reference.clone()),
            Some(serde_json::json!({ "reason": reason })),
            "rejected",
        ));
        let status = self.state.status();
        match rejected.order_type {
            OrderType::Limit => {
                if !self.state.order().map_or(false, |o| o.weak_eq(rejected)) {
                    error!("rejected order {} is not the active order, ignoring reason={}", rejected, reason);
                    return;
                }
                if status != OrderStatus::Pending {
                    warn!("order {} rejected while status is {:?} reason={}", rejected, status, reason);
                } else {
                    info!("order rejected {} reason={}", rejected, reason);
                }
                self.deactivate(None);
            }
            OrderType::Cancel => {
                if !self.state.order().map_or(false, |o| o.weak_eq_ignoring_type(rejected)) {
                    error!("rejected cancel {} is not for the active order, ignoring reason={}", rejected, reason);
                    return;
                }
                match std::mem::take(&mut self.state) {
                    ActiveOrder::Cancel { order, .. } => {
                        // The order presumably still rests; next snapshot confirms.
                        info!("cancel rejected for {} reason={}, resuming as accepted", order, reason);
                        self.state = ActiveOrder::Accepted { order, ticks: 0 };
                    }
                    other => {
                        warn!("cancel {} rejected while status is {:?} reason={}", rejected, other.status(), reason);
                        self.state = other;
                    }
                }
            }
        }
    }

    /// Moves the active order (if any) into the archive and resets to INACTIVE.
    fn deactivate(&mut self, cancel: Option<Order>) {
        let state = std::mem::take(&mut self.state);
        let status = state.status();
        if !matches!(status, OrderStatus::Accepted | OrderStatus::Cancel) {
            warn!("deactivating order in state {:?}", status);
        }
        let order = match state {
            ActiveOrder::Inactive => return,
            ActiveOrder::Made(order)
            | ActiveOrder::Pending { order, .. }
            | ActiveOrder::Accepted { order, .. }
            | ActiveOrder::Cancel { order, .. } => order,
        };
        self.archive_order(order, cancel);
    }

    fn archive_order(&mut self, order: Order, cancel: Option<Order>) {
        info!(
            "order archived {} cancel={}",
            order,
            cancel.as_ref().map(|c| c.reference.as_str()).unwrap_or("none")
        );
        self.emit(AuditEvent::for_order("order_archived", &order, "success"));
        self.archive.push(ArchivedOrder { order, cancel });
    }

    fn emit(&self, event: AuditEvent) {
        if let Some(sink) = &self.audit {
            sink.emit(&event);
        }
    }
}
