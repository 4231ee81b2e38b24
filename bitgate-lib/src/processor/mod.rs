//! Payment processor boundary.
//!
//! [`PaymentProcessor`] is the seam between the gateway and the remote
//! invoicing service. [`BitPayClient`] talks to a BitPay-compatible REST API;
//! tests use the scriptable mock in `test_utils`.

mod bitpay;

pub use bitpay::BitPayClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credentials::CredentialSet;
use crate::invoice::{Invoice, InvoiceRequest};
use crate::{Network, Result};

/// Token request sent with a pairing code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// SIN of the key being paired.
    pub id: String,
    pub pairing_code: String,
    pub label: String,
}

/// Token granted by the processor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiToken {
    pub token: String,
    #[serde(default)]
    pub facade: Option<String>,
}

/// Remote invoicing service.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create an invoice on the credentials' network.
    async fn create_invoice(
        &self,
        request: &InvoiceRequest,
        credentials: &CredentialSet,
    ) -> Result<Invoice>;

    /// Fetch an invoice from `network`.
    async fn get_invoice(
        &self,
        invoice_id: &str,
        credentials: &CredentialSet,
        network: Network,
    ) -> Result<Invoice>;

    /// Exchange a pairing code for an API token.
    async fn create_token(&self, request: &TokenRequest, network: Network) -> Result<ApiToken>;
}
