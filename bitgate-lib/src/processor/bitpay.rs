//! BitPay-compatible REST client.
//!
//! Requests carrying merchant authority are signed: the processor verifies
//! `X-Signature` (ECDSA over `sha256(url + body)`) against `X-Identity`
//! (the compressed public key) and checks the key's SIN owns the token in
//! the request. Token creation is unsigned; the pairing code is the
//! authority there.
//!
//! # Example
//!
//! ```rust,ignore
//! use bitgate_lib::{processor::BitPayClient, GatewayConfig, Network};
//!
//! let client = BitPayClient::new(&GatewayConfig::default())?;
//! let invoice = client.get_invoice("Hpqc63wvE1ZjzeeH4kEycF", &credentials, Network::Testnet).await?;
//! println!("{} is {}", invoice.id, invoice.status);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ApiToken, PaymentProcessor, TokenRequest};
use crate::config::GatewayConfig;
use crate::credentials::CredentialSet;
use crate::invoice::{Invoice, InvoiceRequest, InvoiceStatus};
use crate::{GatewayError, Network, Result};

/// API version pinned in every request.
const API_VERSION: &str = "2.0.0";

/// Longest processor error text carried into an error message.
const MAX_ERROR_TEXT: usize = 256;

/// HTTP client for a BitPay-compatible processor.
pub struct BitPayClient {
    livenet_url: String,
    testnet_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl BitPayClient {
    /// Create a client using the endpoints and timeout from `config`.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("bitgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                GatewayError::ConfigurationInvalid(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            livenet_url: config.api_url(Network::Livenet).to_string(),
            testnet_url: config.api_url(Network::Testnet).to_string(),
            timeout: config.request_timeout(),
            client,
        })
    }

    /// Build the full URL for an API path on `network`.
    fn url(&self, network: Network, path: &str) -> String {
        let base = match network {
            Network::Livenet => &self.livenet_url,
            Network::Testnet => &self.testnet_url,
        };
        format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Signed POST with a JSON body.
    async fn post_signed<B: Serialize, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
        body: &B,
        credentials: &CredentialSet,
    ) -> Result<T> {
        let body = serde_json::to_string(body)
            .map_err(|e| GatewayError::remote(operation, format!("failed to encode request: {e}")))?;
        let key = credentials.signing_key()?;

        let mut message = String::with_capacity(url.len() + body.len());
        message.push_str(url);
        message.push_str(&body);

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("X-Accept-Version", API_VERSION)
            .header("X-Identity", key.public_key_hex())
            .header("X-Signature", key.sign(message.as_bytes()))
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(operation, e))?;

        self.handle_response(operation, response).await
    }

    /// Signed GET. The signature covers the full URL including the query.
    async fn get_signed<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
        credentials: &CredentialSet,
    ) -> Result<T> {
        let key = credentials.signing_key()?;

        let response = self
            .client
            .get(url)
            .header("X-Accept-Version", API_VERSION)
            .header("X-Identity", key.public_key_hex())
            .header("X-Signature", key.sign(url.as_bytes()))
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(operation, e))?;

        self.handle_response(operation, response).await
    }

    /// Unsigned POST, used only for pairing.
    async fn post_public<B: Serialize, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(url)
            .header("X-Accept-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(operation, e))?;

        self.handle_response(operation, response).await
    }

    /// Unwrap the `{"data": ...}` envelope or map the failure.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_reqwest_error(operation, e))?;

        if !status.is_success() {
            return Err(map_status_error(operation, status.as_u16(), &text));
        }

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            GatewayError::remote(operation, format!("unexpected response body: {e}"))
        })?;

        match envelope {
            Envelope {
                data: Some(data), ..
            } => Ok(data),
            Envelope {
                error: Some(error), ..
            } => Err(GatewayError::RemoteRequestFailed {
                operation,
                status: Some(status.as_u16()),
                reason: truncate(&error),
            }),
            _ => Err(GatewayError::remote(operation, "response carried no data")),
        }
    }

    fn map_reqwest_error(&self, operation: &'static str, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout {
                operation,
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            GatewayError::RemoteRequestFailed {
                operation,
                status: e.status().map(|s| s.as_u16()),
                reason: e.to_string(),
            }
        }
    }
}

/// Map an HTTP error status, preferring the processor's `{"error": ...}` text.
fn map_status_error(operation: &'static str, status: u16, body: &str) -> GatewayError {
    let reason = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.to_string());
    let reason = if reason.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        truncate(reason.trim())
    };

    GatewayError::RemoteRequestFailed {
        operation,
        status: Some(status),
        reason,
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_ERROR_TEXT {
        return text.to_string();
    }
    let mut end = MAX_ERROR_TEXT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[async_trait]
impl PaymentProcessor for BitPayClient {
    async fn create_invoice(
        &self,
        request: &InvoiceRequest,
        credentials: &CredentialSet,
    ) -> Result<Invoice> {
        let url = self.url(credentials.network, "invoices");
        let body = WireInvoiceRequest {
            price: request.price,
            currency: &request.currency,
            order_id: request.order_id.as_str(),
            redirect_url: request.redirect_url.as_deref(),
            notification_url: request.notification_url.as_deref(),
            transaction_speed: request.transaction_speed.as_str(),
            full_notifications: request.full_notifications,
            token: &credentials.token,
        };

        debug!(%url, order_id = %request.order_id, "creating invoice");
        let wire: WireInvoice = self
            .post_signed("create_invoice", &url, &body, credentials)
            .await?;
        wire.into_invoice("create_invoice")
    }

    async fn get_invoice(
        &self,
        invoice_id: &str,
        credentials: &CredentialSet,
        network: Network,
    ) -> Result<Invoice> {
        let mut url = reqwest::Url::parse(&self.url(network, "invoices"))
            .map_err(|e| GatewayError::ConfigurationInvalid(format!("invalid API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::ConfigurationInvalid("API URL cannot be a base".into()))?
            .push(invoice_id);
        url.query_pairs_mut().append_pair("token", &credentials.token);

        debug!(%invoice_id, %network, "fetching invoice");
        let wire: WireInvoice = self
            .get_signed("get_invoice", url.as_str(), credentials)
            .await?;
        wire.into_invoice("get_invoice")
    }

    async fn create_token(&self, request: &TokenRequest, network: Network) -> Result<ApiToken> {
        let url = self.url(network, "tokens");

        debug!(%url, sin = %request.id, "requesting token");
        let tokens: Vec<ApiToken> = self.post_public("create_token", &url, request).await?;
        tokens
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::remote("create_token", "processor returned no token"))
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireInvoiceRequest<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    currency: &'a str,
    order_id: &'a str,
    #[serde(rename = "redirectURL", skip_serializing_if = "Option::is_none")]
    redirect_url: Option<&'a str>,
    #[serde(rename = "notificationURL", skip_serializing_if = "Option::is_none")]
    notification_url: Option<&'a str>,
    transaction_speed: &'a str,
    full_notifications: bool,
    token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInvoice {
    id: String,
    url: String,
    status: String,
    price: Decimal,
    currency: String,
    #[serde(default, alias = "orderID")]
    order_id: Option<String>,
    #[serde(default, rename = "notificationURL")]
    notification_url: Option<String>,
    #[serde(default, rename = "redirectURL")]
    redirect_url: Option<String>,
    /// Milliseconds since the epoch.
    #[serde(default)]
    invoice_time: Option<i64>,
    #[serde(default)]
    expiration_time: Option<i64>,
}

impl WireInvoice {
    fn into_invoice(self, operation: &'static str) -> Result<Invoice> {
        let status = InvoiceStatus::from_remote(&self.status);
        if status == InvoiceStatus::Unrecognized {
            warn!(invoice_id = %self.id, status = %self.status, "processor reported an unrecognized invoice status");
        }
        let order_id = self
            .order_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                GatewayError::remote(operation, format!("invoice {} carries no order id", self.id))
            })?;

        Ok(Invoice {
            id: self.id,
            order_id: order_id.into(),
            currency: self.currency,
            price: self.price,
            status,
            url: self.url,
            notification_url: self.notification_url,
            redirect_url: self.redirect_url,
            invoice_time: self.invoice_time.and_then(DateTime::<Utc>::from_timestamp_millis),
            expiration_time: self
                .expiration_time
                .and_then(DateTime::<Utc>::from_timestamp_millis),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BitPayClient {
        BitPayClient::new(
            &GatewayConfig::default()
                .with_api_url("http://127.0.0.1:1/")
                .with_request_timeout(1),
        )
        .unwrap()
    }

    #[test]
    fn test_url_building() {
        let hosted = BitPayClient::new(&GatewayConfig::default()).unwrap();
        assert_eq!(
            hosted.url(Network::Livenet, "invoices"),
            "https://bitpay.com/invoices"
        );
        assert_eq!(
            hosted.url(Network::Testnet, "/tokens"),
            "https://test.bitpay.com/tokens"
        );
        assert_eq!(client().url(Network::Testnet, "tokens"), "http://127.0.0.1:1/tokens");
    }

    #[test]
    fn test_status_error_prefers_processor_text() {
        let err = map_status_error("create_token", 400, r#"{"error":"Pairing code not found"}"#);
        assert_eq!(err.to_string(), "create_token failed (400): Pairing code not found");
        assert!(err.is_processor_rejection());

        let err = map_status_error("get_invoice", 502, "");
        assert_eq!(err.to_string(), "get_invoice failed (502): HTTP 502");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(MAX_ERROR_TEXT);
        let cut = truncate(&long);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_ERROR_TEXT + 3);
    }

    #[test]
    fn test_wire_invoice_conversion() {
        let wire: WireInvoice = serde_json::from_str(
            r#"{
                "id": "inv1",
                "url": "https://test.bitpay.com/invoice?id=inv1",
                "status": "confirmed",
                "price": 10.5,
                "currency": "USD",
                "orderID": "1001",
                "invoiceTime": 1700000000000,
                "expirationTime": 1700000900000
            }"#,
        )
        .unwrap();

        let invoice = wire.into_invoice("get_invoice").unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Confirmed);
        assert_eq!(invoice.order_id.as_str(), "1001");
        assert_eq!(invoice.price, Decimal::new(105, 1));
        assert_eq!(
            invoice.expiration_time.unwrap() - invoice.invoice_time.unwrap(),
            chrono::Duration::minutes(15)
        );
    }

    #[test]
    fn test_wire_invoice_unknown_status_is_kept() {
        let wire: WireInvoice = serde_json::from_str(
            r#"{"id":"inv1","url":"u","status":"refunded","price":1,"currency":"USD","orderId":"1001"}"#,
        )
        .unwrap();
        let invoice = wire.into_invoice("get_invoice").unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Unrecognized);
    }

    #[test]
    fn test_wire_invoice_without_order_is_rejected() {
        let wire: WireInvoice = serde_json::from_str(
            r#"{"id":"inv1","url":"u","status":"paid","price":1,"currency":"USD"}"#,
        )
        .unwrap();
        assert!(matches!(
            wire.into_invoice("get_invoice"),
            Err(GatewayError::RemoteRequestFailed { .. })
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let body = WireInvoiceRequest {
            price: Decimal::new(1999, 2),
            currency: "USD",
            order_id: "1001",
            redirect_url: Some("https://shop.example/thanks"),
            notification_url: None,
            transaction_speed: "high",
            full_notifications: false,
            token: "tok",
        };
        let json: serde_json::Value = serde_json::to_value(&body).unwrap();
        assert_eq!(json["price"], serde_json::json!(19.99));
        assert_eq!(json["orderId"], "1001");
        assert_eq!(json["redirectURL"], "https://shop.example/thanks");
        assert!(json.get("notificationURL").is_none());
        assert_eq!(json["transactionSpeed"], "high");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_retryable() {
        let err = client()
            .create_token(
                &TokenRequest {
                    id: "Tf".into(),
                    pairing_code: "ABC1234".into(),
                    label: "test".into(),
                },
                Network::Testnet,
            )
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(!err.is_processor_rejection());
    }
}
