//! Invoices and the client that creates and fetches them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::credentials::CredentialSet;
use crate::processor::PaymentProcessor;
use crate::settings::TransactionSpeed;
use crate::store::OrderId;
use crate::{GatewayError, Network, Result};

/// Remote invoice lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    New,
    Paid,
    Confirmed,
    Complete,
    Expired,
    Invalid,
    /// Any status this gateway does not know, e.g. `refunded` or `declined`.
    /// Never mapped and never moves an order.
    #[serde(other)]
    Unrecognized,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 6] = [
        Self::New,
        Self::Paid,
        Self::Confirmed,
        Self::Complete,
        Self::Expired,
        Self::Invalid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Paid => "paid",
            Self::Confirmed => "confirmed",
            Self::Complete => "complete",
            Self::Expired => "expired",
            Self::Invalid => "invalid",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Position on the payment progression `new < paid < confirmed < complete`.
    ///
    /// `None` for the terminal failure statuses, which sit off the progression.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::New => Some(0),
            Self::Paid => Some(1),
            Self::Confirmed => Some(2),
            Self::Complete => Some(3),
            Self::Expired | Self::Invalid | Self::Unrecognized => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Expired | Self::Invalid)
    }

    /// Parse a status as reported by the processor, keeping unknown ones.
    pub fn from_remote(s: &str) -> Self {
        s.parse().unwrap_or(Self::Unrecognized)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| GatewayError::invalid_input("invoice_status", format!("unknown status `{s}`")))
    }
}

/// Normalized processor invoice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub order_id: OrderId,
    pub currency: String,
    pub price: Decimal,
    pub status: InvoiceStatus,
    /// Processor-hosted payment page the customer is redirected to.
    pub url: String,
    pub notification_url: Option<String>,
    pub redirect_url: Option<String>,
    pub invoice_time: Option<DateTime<Utc>>,
    pub expiration_time: Option<DateTime<Utc>>,
}

/// Parameters for a new invoice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoiceRequest {
    pub order_id: OrderId,
    pub currency: String,
    pub price: Decimal,
    pub redirect_url: Option<String>,
    pub notification_url: Option<String>,
    pub transaction_speed: TransactionSpeed,
    pub full_notifications: bool,
}

impl InvoiceRequest {
    pub fn new(order_id: impl Into<OrderId>, currency: impl Into<String>, price: Decimal) -> Self {
        Self {
            order_id: order_id.into(),
            currency: currency.into().trim().to_ascii_uppercase(),
            price,
            redirect_url: None,
            notification_url: None,
            transaction_speed: TransactionSpeed::default(),
            full_notifications: false,
        }
    }

    pub fn with_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    pub fn with_notification_url(mut self, url: impl Into<String>) -> Self {
        self.notification_url = Some(url.into());
        self
    }

    pub fn with_transaction_speed(mut self, speed: TransactionSpeed) -> Self {
        self.transaction_speed = speed;
        self
    }

    pub fn with_full_notifications(mut self, enabled: bool) -> Self {
        self.full_notifications = enabled;
        self
    }

    /// Local checks, run before anything is sent.
    pub fn validate(&self) -> Result<()> {
        if self.order_id.as_str().trim().is_empty() {
            return Err(GatewayError::invalid_input("order_id", "cannot be empty"));
        }
        if self.currency.len() != 3 || !self.currency.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(GatewayError::invalid_input(
                "currency",
                format!("`{}` is not a three-letter currency code", self.currency),
            ));
        }
        if self.price <= Decimal::ZERO {
            return Err(GatewayError::invalid_input(
                "price",
                format!("must be positive, got {}", self.price),
            ));
        }
        Ok(())
    }
}

/// Stateless facade over the processor with local validation and a time bound.
#[derive(Clone)]
pub struct InvoiceClient {
    processor: Arc<dyn PaymentProcessor>,
    timeout: Duration,
}

impl InvoiceClient {
    pub fn new(processor: Arc<dyn PaymentProcessor>, timeout: Duration) -> Self {
        Self { processor, timeout }
    }

    /// Create an invoice on the credentials' network.
    #[tracing::instrument(skip(self, request, credentials), fields(order_id = %request.order_id))]
    pub async fn create_invoice(
        &self,
        request: &InvoiceRequest,
        credentials: &CredentialSet,
    ) -> Result<Invoice> {
        request.validate()?;

        let invoice = self
            .bounded("create_invoice", self.processor.create_invoice(request, credentials))
            .await?;

        if invoice.order_id != request.order_id {
            return Err(GatewayError::remote(
                "create_invoice",
                format!(
                    "processor bound invoice {} to order {} instead of {}",
                    invoice.id, invoice.order_id, request.order_id
                ),
            ));
        }

        debug!(invoice_id = %invoice.id, "invoice created");
        Ok(invoice)
    }

    /// Fetch the authoritative state of an invoice.
    ///
    /// `network_hint` only picks the API host; a mismatch with the paired
    /// network is logged and the hint is followed.
    #[tracing::instrument(skip(self, credentials))]
    pub async fn fetch_invoice(
        &self,
        invoice_id: &str,
        credentials: &CredentialSet,
        network_hint: Network,
    ) -> Result<Invoice> {
        if invoice_id.trim().is_empty() {
            return Err(GatewayError::invalid_input("invoice_id", "cannot be empty"));
        }
        if network_hint != credentials.network {
            warn!(
                paired = %credentials.network,
                hinted = %network_hint,
                "notification points at a different network than the paired one"
            );
        }

        self.bounded(
            "get_invoice",
            self.processor.get_invoice(invoice_id, credentials, network_hint),
        )
        .await
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| GatewayError::Timeout {
                operation,
                timeout_ms: self.timeout.as_millis() as u64,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixtures, MockProcessor};
    use rust_decimal_macros::dec;

    fn client(processor: Arc<MockProcessor>) -> InvoiceClient {
        InvoiceClient::new(processor, Duration::from_millis(200))
    }

    #[test]
    fn test_status_ordering() {
        assert!(InvoiceStatus::Paid.rank() < InvoiceStatus::Complete.rank());
        assert!(InvoiceStatus::Invalid.is_failure());
        assert!(InvoiceStatus::Expired.is_failure());
        assert!(!InvoiceStatus::New.is_failure());
        assert_eq!("Confirmed".parse::<InvoiceStatus>().unwrap(), InvoiceStatus::Confirmed);
        assert!("refunded".parse::<InvoiceStatus>().is_err());
    }

    #[test]
    fn test_remote_status_keeps_unknown_values() {
        assert_eq!(InvoiceStatus::from_remote("paid"), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::from_remote("refunded"), InvoiceStatus::Unrecognized);
        assert!(!InvoiceStatus::Unrecognized.is_failure());
        assert!("unrecognized".parse::<InvoiceStatus>().is_err());

        let parsed: InvoiceStatus = serde_json::from_str("\"declined\"").unwrap();
        assert_eq!(parsed, InvoiceStatus::Unrecognized);
    }

    #[test]
    fn test_request_validation() {
        assert!(InvoiceRequest::new("1", "usd", dec!(10.50)).validate().is_ok());
        assert_eq!(InvoiceRequest::new("1", "usd", dec!(1)).currency, "USD");
        assert!(InvoiceRequest::new("1", "US", dec!(1)).validate().is_err());
        assert!(InvoiceRequest::new("1", "U$D", dec!(1)).validate().is_err());
        assert!(InvoiceRequest::new("1", "USD", dec!(0)).validate().is_err());
        assert!(InvoiceRequest::new("1", "USD", dec!(-3)).validate().is_err());
        assert!(InvoiceRequest::new(" ", "USD", dec!(3)).validate().is_err());
    }

    #[tokio::test]
    async fn test_invalid_request_makes_no_call() {
        let processor = Arc::new(MockProcessor::new());
        let creds = fixtures::credentials(Network::Testnet);

        let err = client(processor.clone())
            .create_invoice(&InvoiceRequest::new("1", "USD", dec!(0)), &creds)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::InvalidInput { field: "price", .. }));
        assert_eq!(processor.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_returns_processor_invoice() {
        let processor = Arc::new(MockProcessor::new());
        let creds = fixtures::credentials(Network::Testnet);

        let invoice = client(processor.clone())
            .create_invoice(&InvoiceRequest::new("77", "EUR", dec!(12.00)), &creds)
            .await
            .unwrap();

        assert_eq!(invoice.order_id, OrderId::new("77"));
        assert_eq!(invoice.status, InvoiceStatus::New);
        assert_eq!(processor.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_retryable() {
        let processor = Arc::new(MockProcessor::new());
        processor.put_invoice(fixtures::invoice("inv1", "77", InvoiceStatus::Paid));
        processor.delay_responses(Duration::from_secs(5));
        let creds = fixtures::credentials(Network::Testnet);

        let err = client(processor)
            .fetch_invoice("inv1", &creds, Network::Testnet)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Timeout { operation: "get_invoice", .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_follows_hint() {
        let processor = Arc::new(MockProcessor::new());
        processor.put_invoice(fixtures::invoice("inv1", "77", InvoiceStatus::Paid));
        let creds = fixtures::credentials(Network::Livenet);

        client(processor.clone())
            .fetch_invoice("inv1", &creds, Network::Testnet)
            .await
            .unwrap();

        assert_eq!(processor.fetches(), vec![("inv1".to_string(), Network::Testnet)]);
    }
}
