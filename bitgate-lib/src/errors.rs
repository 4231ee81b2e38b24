//! Error types for gateway operations.
//!
//! Every failure carries a stable [`ErrorCode`] and a retry classification so
//! the notification endpoint can tell the processor whether to redeliver.

use thiserror::Error;

/// Stable error codes, grouped by concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    /// Missing or inconsistent credentials / settings
    ConfigurationInvalid = 1000,
    /// Notification body was empty
    EmptyPayload = 2000,
    /// Notification body was not a JSON object of the expected shape
    MalformedPayload = 2001,
    /// Notification lacked a required field
    MissingField = 2002,
    /// Processor call failed (transport or processor-side rejection)
    RemoteRequestFailed = 3000,
    /// Processor call or notification exceeded its time budget
    Timeout = 3001,
    /// Pairing code rejected locally or by the processor
    PairingRejected = 4000,
    /// Caller-supplied value failed validation
    InvalidInput = 5000,
    /// Processor reported a different order for a known invoice
    InvoiceOrderMismatch = 5001,
    /// Order unknown to the store
    OrderNotFound = 6000,
    /// Order changed underneath a conditional update
    ConcurrentModification = 6001,
    /// Settings or order persistence failed
    Storage = 7000,
}

/// Errors returned by the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Credentials or settings are missing, partial or inconsistent.
    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),

    /// Inbound notification had no body.
    #[error("notification payload is empty")]
    EmptyPayload,

    /// Inbound notification could not be parsed as a JSON object.
    #[error("malformed notification payload: {0}")]
    MalformedPayload(String),

    /// Inbound notification lacked a required top-level field.
    #[error("notification is missing required field `{0}`")]
    MissingField(&'static str),

    /// Processor request failed in transport or was rejected.
    #[error("{operation} failed{}: {reason}", status_suffix(.status))]
    RemoteRequestFailed {
        /// Processor operation (e.g. "get_invoice")
        operation: &'static str,
        /// HTTP status when the processor answered
        status: Option<u16>,
        /// Underlying error message
        reason: String,
    },

    /// Operation exceeded its time budget and was abandoned.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Operation that timed out
        operation: &'static str,
        /// Budget in milliseconds
        timeout_ms: u64,
    },

    /// Pairing code failed validation or the processor refused it.
    #[error("pairing rejected: {0}")]
    PairingRejected(String),

    /// Caller-supplied value is invalid.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        /// Field or parameter name
        field: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// A known invoice came back tied to another order.
    #[error("invoice {invoice_id} belongs to order {bound}, processor reported order {reported}")]
    InvoiceOrderMismatch {
        /// Invoice identifier
        invoice_id: String,
        /// Order recorded locally
        bound: String,
        /// Order reported by the processor
        reported: String,
    },

    /// The store has no such order.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// The order kept changing while a transition was being applied.
    #[error("order {0} was modified concurrently")]
    ConcurrentModification(String),

    /// Persistence failure.
    #[error("storage error: {0}")]
    Storage(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl GatewayError {
    /// Stable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ConfigurationInvalid(_) => ErrorCode::ConfigurationInvalid,
            Self::EmptyPayload => ErrorCode::EmptyPayload,
            Self::MalformedPayload(_) => ErrorCode::MalformedPayload,
            Self::MissingField(_) => ErrorCode::MissingField,
            Self::RemoteRequestFailed { .. } => ErrorCode::RemoteRequestFailed,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::PairingRejected(_) => ErrorCode::PairingRejected,
            Self::InvalidInput { .. } => ErrorCode::InvalidInput,
            Self::InvoiceOrderMismatch { .. } => ErrorCode::InvoiceOrderMismatch,
            Self::OrderNotFound(_) => ErrorCode::OrderNotFound,
            Self::ConcurrentModification(_) => ErrorCode::ConcurrentModification,
            Self::Storage(_) => ErrorCode::Storage,
        }
    }

    /// Returns true if the notification source should redeliver.
    ///
    /// The engine never retries internally; redelivery plus idempotent
    /// transitions is the recovery path.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteRequestFailed { .. }
                | Self::Timeout { .. }
                | Self::ConcurrentModification(_)
                | Self::Storage(_)
        )
    }

    /// Returns true for malformed inbound notifications, which are never retried.
    pub fn is_payload_rejection(&self) -> bool {
        matches!(
            self,
            Self::EmptyPayload | Self::MalformedPayload(_) | Self::MissingField(_)
        )
    }

    /// True when the processor answered with a 4xx status.
    pub fn is_processor_rejection(&self) -> bool {
        matches!(
            self,
            Self::RemoteRequestFailed {
                status: Some(400..=499),
                ..
            }
        )
    }

    /// Create a remote failure without an HTTP status.
    pub fn remote(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::RemoteRequestFailed {
            operation,
            status: None,
            reason: reason.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("serialization: {err}"))
    }
}
