//! The assembled gateway.

use std::sync::Arc;

use crate::checkout::{Checkout, CheckoutOrder, CheckoutResult};
use crate::config::GatewayConfig;
use crate::credentials::{CredentialSet, CredentialStore};
use crate::invoice::{Invoice, InvoiceClient, InvoiceStatus};
use crate::ledger::InvoiceLedger;
use crate::mapping::{OrderStateOverrides, StatusMapping};
use crate::processor::{BitPayClient, PaymentProcessor};
use crate::reconcile::{ReconcileOutcome, ReconciliationEngine};
use crate::settings::{GatewaySettings, SettingsStore, SharedSettings, TransactionSpeed};
use crate::store::{OrderId, OrderStatus, StoreAdapter};
use crate::{Network, Result};

/// All gateway components wired to one settings record, processor and store.
pub struct Gateway {
    config: GatewayConfig,
    settings: SharedSettings,
    credentials: CredentialStore,
    checkout: Checkout,
    engine: ReconciliationEngine,
    ledger: Arc<InvoiceLedger>,
}

impl Gateway {
    /// Assemble a gateway around an arbitrary processor.
    pub async fn new(
        config: GatewayConfig,
        settings_store: Arc<dyn SettingsStore>,
        processor: Arc<dyn PaymentProcessor>,
        store: Arc<dyn StoreAdapter>,
    ) -> Result<Self> {
        config.validate()?;
        let settings = SharedSettings::load(settings_store).await?;
        let ledger = Arc::new(InvoiceLedger::new());
        let invoices = InvoiceClient::new(processor.clone(), config.request_timeout());

        let credentials = CredentialStore::new(
            settings.clone(),
            processor,
            config.token_label.clone(),
            config.request_timeout(),
        );
        let checkout = Checkout::new(
            settings.clone(),
            invoices.clone(),
            store.clone(),
            ledger.clone(),
            config.notification_url.clone(),
        );
        let engine = ReconciliationEngine::new(
            &config,
            settings.clone(),
            invoices,
            store,
            ledger.clone(),
        );

        Ok(Self {
            config,
            settings,
            credentials,
            checkout,
            engine,
            ledger,
        })
    }

    /// Assemble a gateway talking to the configured BitPay endpoints.
    pub async fn with_bitpay(
        config: GatewayConfig,
        settings_store: Arc<dyn SettingsStore>,
        store: Arc<dyn StoreAdapter>,
    ) -> Result<Self> {
        let processor = Arc::new(BitPayClient::new(&config)?);
        Self::new(config, settings_store, processor, store).await
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Current settings record.
    pub fn settings(&self) -> Result<GatewaySettings> {
        self.settings.snapshot()
    }

    /// Settings as stored now, including writes made by other processes.
    pub async fn refresh_settings(&self) -> Result<GatewaySettings> {
        self.settings.refresh().await
    }

    pub async fn pair(&self, pairing_code: &str, network: Network) -> Result<CredentialSet> {
        self.credentials.pair(pairing_code, network).await
    }

    pub async fn revoke(&self) -> Result<bool> {
        self.credentials.revoke().await
    }

    pub fn credentials(&self) -> Result<Option<CredentialSet>> {
        self.credentials.current()
    }

    pub async fn process_payment(&self, order: &CheckoutOrder) -> Result<CheckoutResult> {
        self.checkout.process_payment(order).await
    }

    pub async fn handle_notification(&self, payload: &[u8]) -> Result<ReconcileOutcome> {
        self.engine.handle_notification(payload).await
    }

    /// Effective remote-to-local mapping.
    pub fn order_states(&self) -> Result<StatusMapping> {
        Ok(self.settings.snapshot()?.status_mapping())
    }

    /// Set or clear (`None`) the local status for one remote status.
    pub async fn set_order_state(
        &self,
        remote: InvoiceStatus,
        local: Option<OrderStatus>,
    ) -> Result<StatusMapping> {
        let settings = self
            .settings
            .update(|s| match local {
                Some(local) => s.order_states.set(remote, local),
                None => {
                    s.order_states.clear(remote);
                    Ok(())
                }
            })
            .await?;
        Ok(settings.status_mapping())
    }

    /// Replace all order-state overrides at once.
    pub async fn update_order_states(&self, overrides: OrderStateOverrides) -> Result<StatusMapping> {
        overrides.validate()?;
        let settings = self
            .settings
            .update(|s| {
                s.order_states = overrides;
                Ok(())
            })
            .await?;
        Ok(settings.status_mapping())
    }

    /// Update invoice options sent with new invoices.
    pub async fn set_invoice_options(
        &self,
        transaction_speed: Option<TransactionSpeed>,
        full_notifications: Option<bool>,
    ) -> Result<GatewaySettings> {
        self.settings
            .update(|s| {
                if let Some(speed) = transaction_speed {
                    s.transaction_speed = speed;
                }
                if let Some(full) = full_notifications {
                    s.full_notifications = full;
                }
                Ok(())
            })
            .await
    }

    /// Latest invoice seen for an order in this process.
    pub fn invoice_for(&self, order: &OrderId) -> Option<Invoice> {
        self.ledger.get(order)
    }
}
