//! Notification handling.
//!
//! One notification is one unit of work:
//!
//! 1. Validate the payload (no I/O)
//! 2. Fetch the authoritative invoice with the stored credentials
//! 3. Take the order's lock and read its current status
//! 4. Decide, then apply the whole outcome as one conditional store write
//!
//! Steps 2-4 run under the notification budget. Nothing touches the order
//! before step 4, and step 4 is a single `apply`, so an abandoned
//! notification leaves the order either untouched or fully transitioned.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::locks::OrderLocks;
use super::rules::{decide, Decision, SkipReason};
use crate::config::GatewayConfig;
use crate::invoice::{Invoice, InvoiceClient, InvoiceStatus};
use crate::ledger::InvoiceLedger;
use crate::mapping::StatusMapping;
use crate::notification::Notification;
use crate::settings::SharedSettings;
use crate::store::{ApplyOutcome, OrderId, OrderStatus, StoreAdapter};
use crate::{GatewayError, Result};

/// Conditional writes attempted before giving up on a churning order.
pub const MAX_APPLY_ATTEMPTS: usize = 3;

/// What one notification did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub invoice_id: String,
    pub order_id: OrderId,
    pub remote_status: InvoiceStatus,
    /// Order status the final decision was made from.
    pub previous_status: OrderStatus,
    pub result: ReconcileResult,
}

impl ReconcileOutcome {
    pub fn applied(&self) -> bool {
        matches!(self.result, ReconcileResult::Applied { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileResult {
    Applied {
        to: OrderStatus,
        completed_payment: bool,
    },
    Skipped(SkipReason),
}

/// Applies processor notifications to store orders.
pub struct ReconciliationEngine {
    settings: SharedSettings,
    invoices: InvoiceClient,
    store: Arc<dyn StoreAdapter>,
    ledger: Arc<InvoiceLedger>,
    locks: OrderLocks,
    test_marker: String,
    notification_timeout: Duration,
}

impl ReconciliationEngine {
    pub fn new(
        config: &GatewayConfig,
        settings: SharedSettings,
        invoices: InvoiceClient,
        store: Arc<dyn StoreAdapter>,
        ledger: Arc<InvoiceLedger>,
    ) -> Self {
        Self {
            settings,
            invoices,
            store,
            ledger,
            locks: OrderLocks::new(),
            test_marker: config.test_network_marker.clone(),
            notification_timeout: config.notification_timeout(),
        }
    }

    /// Handle one raw notification body.
    ///
    /// Payload rejections are permanent; errors for which
    /// [`GatewayError::is_retryable`] holds should be answered so the
    /// processor redelivers.
    pub async fn handle_notification(&self, payload: &[u8]) -> Result<ReconcileOutcome> {
        let notification = Notification::parse(payload).inspect_err(|e| {
            warn!(error = %e, "rejected notification payload");
        })?;

        tokio::time::timeout(self.notification_timeout, self.reconcile(&notification))
            .await
            .map_err(|_| {
                warn!(invoice_id = %notification.invoice_id, "notification abandoned after timeout");
                GatewayError::Timeout {
                    operation: "notification",
                    timeout_ms: self.notification_timeout.as_millis() as u64,
                }
            })?
    }

    /// Reconcile a validated notification.
    #[tracing::instrument(skip(self, notification), fields(invoice_id = %notification.invoice_id))]
    pub async fn reconcile(&self, notification: &Notification) -> Result<ReconcileOutcome> {
        let settings = self.settings.refresh().await?;
        let credentials = settings.require_credentials()?;
        let hint = notification.network_hint(&self.test_marker);

        let invoice = self
            .invoices
            .fetch_invoice(&notification.invoice_id, &credentials, hint)
            .await?;

        if invoice.id != notification.invoice_id {
            return Err(GatewayError::remote(
                "get_invoice",
                format!(
                    "asked for invoice {}, processor returned {}",
                    notification.invoice_id, invoice.id
                ),
            ));
        }

        self.check_binding(&invoice).await?;
        self.ledger.record(&invoice)?;
        self.apply_status(&invoice, &settings.status_mapping()).await
    }

    /// Reject an invoice that now names a different order than the one it
    /// was issued for.
    async fn check_binding(&self, invoice: &Invoice) -> Result<()> {
        let bound = match self.store.order_for_invoice(&invoice.id).await? {
            Some(order) => Some(order),
            None => self.ledger.order_for(&invoice.id),
        };
        match bound {
            Some(bound) if bound != invoice.order_id => {
                warn!(invoice_id = %invoice.id, %bound, reported = %invoice.order_id, "invoice reports a different order");
                Err(GatewayError::InvoiceOrderMismatch {
                    invoice_id: invoice.id.clone(),
                    bound: bound.to_string(),
                    reported: invoice.order_id.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    async fn apply_status(
        &self,
        invoice: &Invoice,
        mapping: &StatusMapping,
    ) -> Result<ReconcileOutcome> {
        let order = &invoice.order_id;
        let _guard = self.locks.acquire(order).await?;

        let mut current = self.store.current_status(order).await?;
        for attempt in 1..=MAX_APPLY_ATTEMPTS {
            let outcome = |result| ReconcileOutcome {
                invoice_id: invoice.id.clone(),
                order_id: order.clone(),
                remote_status: invoice.status,
                previous_status: current.clone(),
                result,
            };

            let transition = match decide(invoice.status, &current, mapping) {
                Decision::Skip(reason) => {
                    debug!(%order, status = %invoice.status, %current, %reason, "no transition");
                    return Ok(outcome(ReconcileResult::Skipped(reason)));
                }
                Decision::Apply(transition) => transition,
            };

            let mutation = transition.to_mutation(&invoice.id);
            match self.store.apply(order, &current, mutation).await? {
                ApplyOutcome::Applied => {
                    info!(
                        %order,
                        status = %invoice.status,
                        from = %current,
                        to = %transition.to,
                        completed_payment = transition.completes_payment,
                        "order transitioned"
                    );
                    return Ok(outcome(ReconcileResult::Applied {
                        to: transition.to,
                        completed_payment: transition.completes_payment,
                    }));
                }
                ApplyOutcome::Stale { current: now } => {
                    warn!(%order, attempt, expected = %current, found = %now, "order changed underneath, re-deciding");
                    current = now;
                }
            }
        }

        Err(GatewayError::ConcurrentModification(order.to_string()))
    }

    /// Invoices seen so far.
    pub fn ledger(&self) -> &InvoiceLedger {
        &self.ledger
    }
}
