//! Bitgate library.
//!
//! Accept bitcoin through a BitPay-compatible invoicing service. A checkout
//! creates a remote invoice for a store order; the processor later posts
//! notifications, and the reconciliation engine re-fetches the invoice and
//! moves the order along its lifecycle exactly once per effective change.
//!
//! # Components
//!
//! - **Credentials**: merchant key pair, SIN and token from pairing
//! - **Invoice client**: validated, time-bounded create/fetch calls
//! - **Status mapping**: remote invoice status to local order status
//! - **Reconciliation engine**: notification intake and the transition rules
//! - **Store adapter**: the boundary to whatever owns orders
//!
//! # Example
//!
//! ```rust,ignore
//! use bitgate_lib::prelude::*;
//!
//! let gateway = Gateway::with_bitpay(
//!     GatewayConfig::from_env()?,
//!     Arc::new(FileSettingsStore::new("settings.json")),
//!     Arc::new(InMemoryStore::new()),
//! )
//! .await?;
//!
//! gateway.pair("ABC1234", Network::Testnet).await?;
//! let outcome = gateway.handle_notification(body).await?;
//! ```

pub mod checkout;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod gateway;
pub mod invoice;
pub mod ledger;
pub mod mapping;
mod network;
pub mod notification;
pub mod prelude;
pub mod processor;
pub mod reconcile;
pub mod settings;
pub mod store;

/// Test utilities: a scriptable processor and fixtures.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::GatewayConfig;
pub use errors::{ErrorCode, GatewayError};
pub use gateway::Gateway;
pub use network::Network;

/// Common result alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Tests against the processor's public test network.
///
/// Gated behind the `integration-tests` feature and ignored by default. They
/// need network access and a fresh pairing code from a test merchant
/// dashboard:
///
/// ```bash
/// BITGATE_SANDBOX_PAIRING_CODE=AbC1234 \
///     cargo test -p bitgate-lib --features integration-tests -- --ignored
/// ```
#[cfg(all(test, feature = "integration-tests"))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::checkout::CheckoutOrder;
    use crate::invoice::InvoiceStatus;
    use crate::settings::MemorySettingsStore;
    use crate::store::{InMemoryStore, OrderId, OrderStatus};

    #[tokio::test]
    #[ignore] // Requires network access - run with: cargo test --features integration-tests -- --ignored
    async fn sandbox_pair_and_checkout() {
        let code = std::env::var("BITGATE_SANDBOX_PAIRING_CODE")
            .expect("BITGATE_SANDBOX_PAIRING_CODE must be set");
        let store = Arc::new(InMemoryStore::new());
        store.insert_order("sandbox-1", OrderStatus::pending()).unwrap();

        let gateway = Gateway::with_bitpay(
            GatewayConfig::default().with_token_label("bitgate sandbox"),
            Arc::new(MemorySettingsStore::new()),
            store.clone(),
        )
        .await
        .unwrap();

        let credentials = gateway.pair(&code, Network::Testnet).await.unwrap();
        assert!(!credentials.token.is_empty());

        let checkout = gateway
            .process_payment(&CheckoutOrder {
                order_id: OrderId::new("sandbox-1"),
                order_key: "sandbox".into(),
                total: rust_decimal::Decimal::new(100, 2),
                currency: "USD".into(),
                return_url: "https://example.com/thanks".into(),
            })
            .await
            .unwrap();
        assert_eq!(checkout.invoice.status, InvoiceStatus::New);

        let body = serde_json::json!({"id": checkout.invoice.id, "url": checkout.payment_url});
        let outcome = gateway
            .handle_notification(body.to_string().as_bytes())
            .await
            .unwrap();
        assert!(!outcome.applied());
        assert_eq!(
            store.record(&OrderId::new("sandbox-1")).unwrap().status,
            OrderStatus::on_hold()
        );
    }
}
