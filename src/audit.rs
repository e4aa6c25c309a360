//! Structured audit trail for material actions.
//!
//! Events: order sent, cancel sent, order archived, order rejected, desync
//! recovered, bot stopped. Format: one JSON object per event with timestamp,
//! action, order reference, detail and outcome. Sink: stdout or in-memory (tests).

use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::Order;

/// Single audit record: one line of JSON per event.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    /// Unix timestamp (seconds since epoch).
    pub timestamp_secs: u64,
    /// order_sent, cancel_sent, order_archived, order_rejected, desync_recovered, bot_stopped.
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    /// success, recovered, rejected, error.
    pub outcome: String,
}

impl AuditEvent {
    pub fn now(
        action: impl Into<String>,
        reference: Option<String>,
        detail: Option<serde_json::Value>,
        outcome: impl Into<String>,
    ) -> Self {
        let timestamp_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            timestamp_secs,
            action: action.into(),
            reference,
            detail,
            outcome: outcome.into(),
        }
    }

    /// Event about one order; the order itself goes into `detail`.
    pub fn for_order(action: impl Into<String>, order: &Order, outcome: impl Into<String>) -> Self {
        Self::now(
            action,
            Some(order.reference.clone()),
            serde_json::to_value(order).ok(),
            outcome,
        )
    }
}

/// Sink for audit events.
pub trait AuditSink {
    fn emit(&self, event: &AuditEvent);
}

/// Writes one JSON line per event to stdout.
pub struct StdoutAuditSink;

impl AuditSink for StdoutAuditSink {
    fn emit(&self, event: &AuditEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{}", line);
        }
    }
}

/// In-memory sink that stores events for tests. Clone shares the same buffer.
#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Rc<RefCell<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.borrow().clone()
    }

    /// Events with the given action.
    pub fn actions(&self, action: &str) -> Vec<AuditEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: &AuditEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
