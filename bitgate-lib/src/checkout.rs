//! Checkout: turn a store order into a processor invoice.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::invoice::{Invoice, InvoiceClient, InvoiceRequest};
use crate::ledger::InvoiceLedger;
use crate::settings::SharedSettings;
use crate::store::{ApplyOutcome, OrderId, OrderMutation, OrderStatus, StoreAdapter};
use crate::{GatewayError, Result};

/// Order history note written when the invoice is issued.
pub const AWAITING_PAYMENT_NOTE: &str = "Awaiting payment notification.";

/// The parts of a store order checkout needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutOrder {
    pub order_id: OrderId,
    /// Store-issued key proving the customer owns the order.
    pub order_key: String,
    pub total: Decimal,
    pub currency: String,
    /// Store "thank you" page the processor sends the customer back to.
    pub return_url: String,
}

/// Issued invoice and where to send the customer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutResult {
    pub invoice: Invoice,
    /// Processor payment page.
    pub payment_url: String,
}

/// Runs the checkout flow.
pub struct Checkout {
    settings: SharedSettings,
    invoices: InvoiceClient,
    store: Arc<dyn StoreAdapter>,
    ledger: Arc<InvoiceLedger>,
    notification_url: Option<String>,
}

impl Checkout {
    pub fn new(
        settings: SharedSettings,
        invoices: InvoiceClient,
        store: Arc<dyn StoreAdapter>,
        ledger: Arc<InvoiceLedger>,
        notification_url: Option<String>,
    ) -> Self {
        Self {
            settings,
            invoices,
            store,
            ledger,
            notification_url,
        }
    }

    /// Create the invoice, then put the order on hold and release the cart.
    ///
    /// The order is only touched once the invoice exists, so a processor
    /// failure leaves it exactly as it was.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn process_payment(&self, order: &CheckoutOrder) -> Result<CheckoutResult> {
        let settings = self.settings.refresh().await?;
        let credentials = settings.require_credentials()?;

        let mut request = InvoiceRequest::new(order.order_id.clone(), &order.currency, order.total)
            .with_redirect_url(return_url(&order.return_url, &order.order_id, &order.order_key)?)
            .with_transaction_speed(settings.transaction_speed)
            .with_full_notifications(settings.full_notifications);
        if let Some(url) = &self.notification_url {
            request = request.with_notification_url(url.clone());
        }

        let invoice = self.invoices.create_invoice(&request, &credentials).await?;
        self.ledger.record(&invoice)?;

        let current = self.store.current_status(&order.order_id).await?;
        let mutation = OrderMutation::transition(OrderStatus::on_hold(), AWAITING_PAYMENT_NOTE)
            .with_stock_reduction()
            .with_invoice(invoice.id.clone());
        match self.store.apply(&order.order_id, &current, mutation).await? {
            ApplyOutcome::Applied => {}
            ApplyOutcome::Stale { .. } => {
                return Err(GatewayError::ConcurrentModification(
                    order.order_id.to_string(),
                ))
            }
        }
        self.store.empty_cart(&order.order_id).await?;

        info!(invoice_id = %invoice.id, "invoice issued, order awaiting payment");
        Ok(CheckoutResult {
            payment_url: invoice.url.clone(),
            invoice,
        })
    }
}

/// `return_url` with `order` and `key` query parameters appended.
pub fn return_url(base: &str, order_id: &OrderId, order_key: &str) -> Result<String> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| GatewayError::invalid_input("return_url", e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("order", order_id.as_str())
        .append_pair("key", order_key);
    Ok(url.into())
}
