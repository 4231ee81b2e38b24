//! The store boundary: orders, their statuses and the mutations the gateway
//! is allowed to make.
//!
//! The gateway never owns orders. It reads a status, decides, and hands the
//! store one [`OrderMutation`] to apply atomically against the status it
//! read. Stores that can compare-and-set across processes (a database row
//! version, a file lock) get cross-process safety for free; the in-process
//! [`OrderLocks`](crate::reconcile::OrderLocks) registry covers the rest.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Result;

/// Local order identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Prefix some stores put on status slugs.
const STATUS_PREFIX: &str = "wc-";

/// A store order status.
///
/// The set is open-ended; the gateway only names the handful it reasons
/// about. Comparison is on the normalized slug, so `wc-processing` and
/// `processing` are the same status.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct OrderStatus(String);

impl OrderStatus {
    pub const ON_HOLD: &'static str = "on-hold";
    pub const PENDING: &'static str = "pending";
    pub const PROCESSING: &'static str = "processing";
    pub const COMPLETED: &'static str = "completed";
    pub const FAILED: &'static str = "failed";

    /// Normalize a store status slug.
    pub fn new(status: impl AsRef<str>) -> Self {
        let status = status.as_ref().trim();
        let status = status.strip_prefix(STATUS_PREFIX).unwrap_or(status);
        Self(status.to_ascii_lowercase())
    }

    /// Awaiting payment, set at checkout.
    pub fn on_hold() -> Self {
        Self(Self::ON_HOLD.to_string())
    }

    pub fn pending() -> Self {
        Self(Self::PENDING.to_string())
    }

    pub fn processing() -> Self {
        Self(Self::PROCESSING.to_string())
    }

    pub fn completed() -> Self {
        Self(Self::COMPLETED.to_string())
    }

    /// The store's literal failure status.
    pub fn failed() -> Self {
        Self(Self::FAILED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is(&self, slug: &str) -> bool {
        self.0 == slug
    }

    /// True for the two statuses an order sits in before payment is seen.
    pub fn is_awaiting_payment(&self) -> bool {
        self.is(Self::ON_HOLD) || self.is(Self::PENDING)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for OrderStatus {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<OrderStatus> for String {
    fn from(s: OrderStatus) -> Self {
        s.0
    }
}

/// One entry in an order's append-only status history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNote {
    pub at: DateTime<Utc>,
    pub from: Option<OrderStatus>,
    pub to: Option<OrderStatus>,
    pub message: String,
}

/// Everything one gateway step does to an order, applied as a unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderMutation {
    pub status: Option<OrderStatus>,
    pub note: Option<String>,
    pub mark_payment_complete: bool,
    pub reduce_stock: bool,
    /// Bind the order to this processor invoice.
    pub invoice_id: Option<String>,
}

impl OrderMutation {
    /// Move to `status` with an audit note.
    pub fn transition(status: OrderStatus, note: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            note: Some(note.into()),
            ..Default::default()
        }
    }

    pub fn with_payment_complete(mut self) -> Self {
        self.mark_payment_complete = true;
        self
    }

    pub fn with_stock_reduction(mut self) -> Self {
        self.reduce_stock = true;
        self
    }

    pub fn with_invoice(mut self, invoice_id: impl Into<String>) -> Self {
        self.invoice_id = Some(invoice_id.into());
        self
    }
}

/// Result of a conditional [`StoreAdapter::apply`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The order was still in the expected status and the mutation landed.
    Applied,
    /// The order had moved on; nothing was written.
    Stale { current: OrderStatus },
}

/// The store operations the gateway consumes.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Current status, fresh from the store.
    async fn current_status(&self, order: &OrderId) -> Result<OrderStatus>;

    /// Unconditionally move an order and record `note`.
    async fn transition(&self, order: &OrderId, to: OrderStatus, note: &str) -> Result<()>;

    /// Fire the store's payment-completed hook.
    async fn mark_payment_complete(&self, order: &OrderId) -> Result<()>;

    /// Hold stock for the order's line items.
    async fn reduce_stock(&self, order: &OrderId) -> Result<()>;

    /// Clear the customer's cart after checkout.
    async fn empty_cart(&self, order: &OrderId) -> Result<()>;

    /// Apply `mutation` only if the order is still in `expected`.
    async fn apply(
        &self,
        order: &OrderId,
        expected: &OrderStatus,
        mutation: OrderMutation,
    ) -> Result<ApplyOutcome>;

    /// Status-change history, oldest first.
    async fn history(&self, order: &OrderId) -> Result<Vec<OrderNote>>;

    /// Order the invoice was issued for, as recorded at checkout.
    ///
    /// Stores that do not keep the binding return `None` and rely on the
    /// in-process [`InvoiceLedger`](crate::ledger::InvoiceLedger) alone.
    async fn order_for_invoice(&self, _invoice_id: &str) -> Result<Option<OrderId>> {
        Ok(None)
    }
}

/// A stored order, as kept by the bundled stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_completed: bool,
    #[serde(default)]
    pub stock_reduced: bool,
    #[serde(default)]
    pub notes: Vec<OrderNote>,
    /// Latest invoice issued for this order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
}

impl OrderRecord {
    pub fn new(id: impl Into<OrderId>, status: OrderStatus) -> Self {
        Self {
            id: id.into(),
            status,
            payment_completed: false,
            stock_reduced: false,
            notes: Vec::new(),
            invoice_id: None,
        }
    }

    /// Apply a mutation in place.
    ///
    /// Returns whether the payment-completed hook should fire. It fires at
    /// most once per order no matter how many mutations ask for it.
    pub fn apply_mutation(&mut self, mutation: OrderMutation) -> bool {
        let from = self.status.clone();
        if let Some(to) = mutation.status.clone() {
            self.status = to;
        }
        if let Some(message) = mutation.note {
            self.notes.push(OrderNote {
                at: Utc::now(),
                from: Some(from),
                to: mutation.status,
                message,
            });
        }
        if mutation.reduce_stock {
            self.stock_reduced = true;
        }
        if let Some(invoice_id) = mutation.invoice_id {
            self.invoice_id = Some(invoice_id);
        }
        if mutation.mark_payment_complete && !self.payment_completed {
            self.payment_completed = true;
            return true;
        }
        false
    }
}
