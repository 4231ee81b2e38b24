//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use bitgate_lib::prelude::*;
//! ```

// Assembly and configuration
pub use crate::{Gateway, GatewayConfig, Network};

// Error handling
pub use crate::errors::{ErrorCode, GatewayError};
pub use crate::Result;

// Checkout and invoices
pub use crate::checkout::{CheckoutOrder, CheckoutResult};
pub use crate::invoice::{Invoice, InvoiceRequest, InvoiceStatus};

// Reconciliation
pub use crate::mapping::{OrderStateOverrides, StatusMapping};
pub use crate::reconcile::{ReconcileOutcome, ReconcileResult, SkipReason};

// Settings and credentials
pub use crate::credentials::CredentialSet;
pub use crate::settings::{
    FileSettingsStore, GatewaySettings, MemorySettingsStore, SettingsStore, TransactionSpeed,
};

// Boundaries
pub use crate::processor::{BitPayClient, PaymentProcessor};
pub use crate::store::{InMemoryStore, OrderId, OrderStatus, StoreAdapter};
