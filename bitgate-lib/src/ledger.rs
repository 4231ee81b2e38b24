//! Local projection of processor invoices.
//!
//! The processor owns invoices; the ledger keeps the latest copy seen per
//! order and pins every invoice id to the order it was first seen with.
//! It is a bounded in-process cache. The durable binding lives on the
//! order record (see [`StoreAdapter::order_for_invoice`]).
//!
//! [`StoreAdapter::order_for_invoice`]: crate::store::StoreAdapter::order_for_invoice

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use crate::invoice::Invoice;
use crate::store::OrderId;
use crate::{GatewayError, Result};

/// Invoices remembered before the oldest are forgotten.
pub const DEFAULT_LEDGER_CAPACITY: usize = 4096;

#[derive(Default)]
struct LedgerState {
    by_order: HashMap<OrderId, Invoice>,
    order_of: HashMap<String, OrderId>,
    /// Invoice ids, oldest first.
    seen: VecDeque<String>,
}

/// Read-only cache of invoices keyed by order.
pub struct InvoiceLedger {
    state: RwLock<LedgerState>,
    capacity: usize,
}

impl Default for InvoiceLedger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LEDGER_CAPACITY)
    }
}

fn lock_error(context: &str) -> GatewayError {
    GatewayError::Storage(format!("invoice ledger lock poisoned during {context}"))
}

impl InvoiceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger remembering at most `capacity` invoices (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            capacity: capacity.max(1),
        }
    }

    /// Record the latest state of an invoice.
    ///
    /// Fails with [`GatewayError::InvoiceOrderMismatch`] if the invoice was
    /// previously seen for a different order; the ledger is left unchanged.
    pub fn record(&self, invoice: &Invoice) -> Result<()> {
        let mut state = self.state.write().map_err(|_| lock_error("record"))?;

        if let Some(bound) = state.order_of.get(&invoice.id) {
            if bound != &invoice.order_id {
                return Err(GatewayError::InvoiceOrderMismatch {
                    invoice_id: invoice.id.clone(),
                    bound: bound.to_string(),
                    reported: invoice.order_id.to_string(),
                });
            }
        }

        if state
            .order_of
            .insert(invoice.id.clone(), invoice.order_id.clone())
            .is_none()
        {
            state.seen.push_back(invoice.id.clone());
        }
        state
            .by_order
            .insert(invoice.order_id.clone(), invoice.clone());

        while state.seen.len() > self.capacity {
            let Some(oldest) = state.seen.pop_front() else {
                break;
            };
            if let Some(order) = state.order_of.remove(&oldest) {
                if state.by_order.get(&order).is_some_and(|i| i.id == oldest) {
                    state.by_order.remove(&order);
                }
            }
        }
        Ok(())
    }

    /// Latest invoice seen for an order.
    pub fn get(&self, order: &OrderId) -> Option<Invoice> {
        self.state.read().ok()?.by_order.get(order).cloned()
    }

    /// Order an invoice is bound to.
    pub fn order_for(&self, invoice_id: &str) -> Option<OrderId> {
        self.state.read().ok()?.order_of.get(invoice_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.order_of.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::InvoiceStatus;
    use crate::test_utils::fixtures;

    #[test]
    fn test_latest_state_wins() {
        let ledger = InvoiceLedger::new();
        ledger
            .record(&fixtures::invoice("inv1", "100", InvoiceStatus::New))
            .unwrap();
        ledger
            .record(&fixtures::invoice("inv1", "100", InvoiceStatus::Paid))
            .unwrap();

        let invoice = ledger.get(&OrderId::new("100")).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(ledger.order_for("inv1"), Some(OrderId::new("100")));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_oldest_invoices_are_evicted() {
        let ledger = InvoiceLedger::with_capacity(2);
        for (invoice, order) in [("inv1", "100"), ("inv2", "200"), ("inv3", "200")] {
            ledger
                .record(&fixtures::invoice(invoice, order, InvoiceStatus::Paid))
                .unwrap();
        }

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.order_for("inv1"), None);
        assert!(ledger.get(&OrderId::new("100")).is_none());
        assert_eq!(ledger.get(&OrderId::new("200")).unwrap().id, "inv3");

        // Evicting inv2 must not drop the newer invoice for the same order.
        ledger
            .record(&fixtures::invoice("inv4", "400", InvoiceStatus::New))
            .unwrap();
        assert_eq!(ledger.order_for("inv2"), None);
        assert_eq!(ledger.get(&OrderId::new("200")).unwrap().id, "inv3");
    }

    #[test]
    fn test_rebinding_rejected() {
        let ledger = InvoiceLedger::new();
        ledger
            .record(&fixtures::invoice("inv1", "100", InvoiceStatus::Paid))
            .unwrap();

        let err = ledger
            .record(&fixtures::invoice("inv1", "200", InvoiceStatus::Complete))
            .unwrap_err();

        assert!(matches!(err, GatewayError::InvoiceOrderMismatch { .. }));
        assert!(ledger.get(&OrderId::new("200")).is_none());
        assert_eq!(
            ledger.get(&OrderId::new("100")).unwrap().status,
            InvoiceStatus::Paid
        );
    }
}
