//! Inbound invoice notifications.
//!
//! A notification is only a trigger. Status, price and order id embedded in
//! the body are ignored; the engine re-fetches the invoice with the merchant's
//! credentials and acts on that.

use serde_json::{Map, Value};

use crate::{GatewayError, Network, Result};

/// A validated notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub invoice_id: String,
    pub url: String,
}

impl Notification {
    /// Validate a raw notification body. Performs no I/O.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Err(GatewayError::EmptyPayload);
        }

        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(GatewayError::MalformedPayload(
                "expected a JSON object".to_string(),
            ));
        };

        Ok(Self {
            invoice_id: required_string(&fields, "id")?,
            url: required_string(&fields, "url")?,
        })
    }

    /// Network the invoice URL points at.
    pub fn network_hint(&self, test_marker: &str) -> Network {
        Network::hint_from_url(&self.url, test_marker)
    }
}

fn required_string(fields: &Map<String, Value>, name: &'static str) -> Result<String> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(GatewayError::MissingField(name)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(GatewayError::MissingField(name)),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(other) => Err(GatewayError::MalformedPayload(format!(
            "`{name}` must be a string, got {}",
            kind(other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
