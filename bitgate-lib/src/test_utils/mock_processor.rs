//! Scriptable in-process payment processor.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use crate::credentials::CredentialSet;
use crate::invoice::{Invoice, InvoiceRequest, InvoiceStatus};
use crate::processor::{ApiToken, PaymentProcessor, TokenRequest};
use crate::{GatewayError, Network, Result};

#[derive(Clone, Debug)]
enum Failure {
    Status(u16, String),
    Transport(String),
}

impl Failure {
    fn to_error(&self, operation: &'static str) -> GatewayError {
        match self {
            Self::Status(status, reason) => GatewayError::RemoteRequestFailed {
                operation,
                status: Some(*status),
                reason: reason.clone(),
            },
            Self::Transport(reason) => GatewayError::remote(operation, reason.clone()),
        }
    }
}

/// In-memory processor with call recording and failure injection.
///
/// Invoices are served from a map the test controls with
/// [`put_invoice`](Self::put_invoice); created invoices are added to it.
#[derive(Default)]
pub struct MockProcessor {
    invoices: RwLock<HashMap<String, Invoice>>,
    fetches: RwLock<Vec<(String, Network)>>,
    created: RwLock<Vec<InvoiceRequest>>,
    token_requests: RwLock<Vec<TokenRequest>>,
    fetch_failure: RwLock<Option<Failure>>,
    create_failure: RwLock<Option<Failure>>,
    token_failure: RwLock<Option<Failure>>,
    delay: RwLock<Option<Duration>>,
    next_id: AtomicUsize,
}

impl MockProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `invoice` for its id, replacing any previous state.
    pub fn put_invoice(&self, invoice: Invoice) {
        self.invoices
            .write()
            .unwrap()
            .insert(invoice.id.clone(), invoice);
    }

    /// Change the status of a served invoice.
    pub fn set_status(&self, invoice_id: &str, status: InvoiceStatus) {
        if let Some(invoice) = self.invoices.write().unwrap().get_mut(invoice_id) {
            invoice.status = status;
        }
    }

    pub fn invoice(&self, invoice_id: &str) -> Option<Invoice> {
        self.invoices.read().unwrap().get(invoice_id).cloned()
    }

    /// Delay every response.
    pub fn delay_responses(&self, delay: Duration) {
        *self.delay.write().unwrap() = Some(delay);
    }

    pub fn fail_fetches_with_transport(&self, reason: &str) {
        *self.fetch_failure.write().unwrap() = Some(Failure::Transport(reason.to_string()));
    }

    pub fn fail_creates_with(&self, status: u16, reason: &str) {
        *self.create_failure.write().unwrap() = Some(Failure::Status(status, reason.to_string()));
    }

    pub fn fail_tokens_with(&self, status: u16, reason: &str) {
        *self.token_failure.write().unwrap() = Some(Failure::Status(status, reason.to_string()));
    }

    pub fn fail_tokens_with_transport(&self, reason: &str) {
        *self.token_failure.write().unwrap() = Some(Failure::Transport(reason.to_string()));
    }

    /// Clear all injected failures and delays.
    pub fn heal(&self) {
        *self.fetch_failure.write().unwrap() = None;
        *self.create_failure.write().unwrap() = None;
        *self.token_failure.write().unwrap() = None;
        *self.delay.write().unwrap() = None;
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.read().unwrap().len()
    }

    /// Every fetch as `(invoice id, network)`.
    pub fn fetches(&self) -> Vec<(String, Network)> {
        self.fetches.read().unwrap().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.created.read().unwrap().len()
    }

    pub fn created_requests(&self) -> Vec<InvoiceRequest> {
        self.created.read().unwrap().clone()
    }

    pub fn token_requests(&self) -> Vec<TokenRequest> {
        self.token_requests.read().unwrap().clone()
    }

    async fn pause(&self) {
        let delay = *self.delay.read().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    async fn create_invoice(
        &self,
        request: &InvoiceRequest,
        credentials: &CredentialSet,
    ) -> Result<Invoice> {
        self.created.write().unwrap().push(request.clone());
        self.pause().await;
        let failure = self.create_failure.read().unwrap().clone();
        if let Some(failure) = failure {
            return Err(failure.to_error("create_invoice"));
        }

        let id = format!("inv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut invoice = super::fixtures::invoice(&id, request.order_id.as_str(), InvoiceStatus::New);
        invoice.currency = request.currency.clone();
        invoice.price = request.price;
        invoice.url = super::fixtures::invoice_url(&id, credentials.network);
        invoice.redirect_url = request.redirect_url.clone();
        invoice.notification_url = request.notification_url.clone();

        self.put_invoice(invoice.clone());
        Ok(invoice)
    }

    async fn get_invoice(
        &self,
        invoice_id: &str,
        _credentials: &CredentialSet,
        network: Network,
    ) -> Result<Invoice> {
        self.fetches
            .write()
            .unwrap()
            .push((invoice_id.to_string(), network));
        self.pause().await;
        let failure = self.fetch_failure.read().unwrap().clone();
        if let Some(failure) = failure {
            return Err(failure.to_error("get_invoice"));
        }

        self.invoice(invoice_id).ok_or_else(|| GatewayError::RemoteRequestFailed {
            operation: "get_invoice",
            status: Some(404),
            reason: format!("invoice {invoice_id} not found"),
        })
    }

    async fn create_token(&self, request: &TokenRequest, _network: Network) -> Result<ApiToken> {
        self.token_requests.write().unwrap().push(request.clone());
        self.pause().await;
        let failure = self.token_failure.read().unwrap().clone();
        if let Some(failure) = failure {
            return Err(failure.to_error("create_token"));
        }

        Ok(ApiToken {
            token: format!("token-for-{}", request.id),
            facade: Some("merchant".to_string()),
        })
    }
}
