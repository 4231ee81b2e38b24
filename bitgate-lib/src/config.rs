//! Static gateway configuration.
//!
//! Loaded once per process. Persisted, operator-editable values (credentials,
//! order states) live in [`crate::settings`] instead.
//!
//! # Environment Variables
//!
//! [`GatewayConfig::from_env`] reads:
//! - `BITGATE_LIVENET_URL` - processor API base URL for livenet
//! - `BITGATE_TESTNET_URL` - processor API base URL for testnet
//! - `BITGATE_REQUEST_TIMEOUT_SECS` - per-request timeout
//! - `BITGATE_NOTIFICATION_TIMEOUT_SECS` - budget for handling one notification
//! - `BITGATE_TOKEN_LABEL` - label attached to paired tokens
//! - `BITGATE_NOTIFICATION_URL` - public URL the processor posts notifications to
//! - `BITGATE_TEST_MARKER` - substring marking test-network invoice URLs

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{GatewayError, Network, Result};

/// Default livenet API host.
pub const LIVENET_API_URL: &str = "https://bitpay.com";

/// Default testnet API host.
pub const TESTNET_API_URL: &str = "https://test.bitpay.com";

/// Gateway configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Processor API base URL for livenet.
    #[serde(default = "default_livenet_url")]
    pub livenet_api_url: String,

    /// Processor API base URL for testnet.
    #[serde(default = "default_testnet_url")]
    pub testnet_api_url: String,

    /// Timeout for a single processor request in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Budget for handling one notification end to end, in seconds.
    #[serde(default = "default_notification_timeout")]
    pub notification_timeout_secs: u64,

    /// Label attached to tokens obtained by pairing.
    #[serde(default = "default_token_label")]
    pub token_label: String,

    /// Public URL the processor should post invoice notifications to.
    #[serde(default)]
    pub notification_url: Option<String>,

    /// Substring that marks an invoice URL as belonging to the test network.
    #[serde(default = "default_test_marker")]
    pub test_network_marker: String,
}

fn default_livenet_url() -> String {
    LIVENET_API_URL.to_string()
}

fn default_testnet_url() -> String {
    TESTNET_API_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_notification_timeout() -> u64 {
    60
}

fn default_token_label() -> String {
    "bitgate".to_string()
}

fn default_test_marker() -> String {
    "test".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            livenet_api_url: default_livenet_url(),
            testnet_api_url: default_testnet_url(),
            request_timeout_secs: default_request_timeout(),
            notification_timeout_secs: default_notification_timeout(),
            token_label: default_token_label(),
            notification_url: None,
            test_network_marker: default_test_marker(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from `BITGATE_*` environment variables over defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("BITGATE_LIVENET_URL") {
            config.livenet_api_url = url;
        }
        if let Some(url) = lookup("BITGATE_TESTNET_URL") {
            config.testnet_api_url = url;
        }
        if let Some(secs) = lookup("BITGATE_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_secs("BITGATE_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("BITGATE_NOTIFICATION_TIMEOUT_SECS") {
            config.notification_timeout_secs =
                parse_secs("BITGATE_NOTIFICATION_TIMEOUT_SECS", &secs)?;
        }
        if let Some(label) = lookup("BITGATE_TOKEN_LABEL") {
            config.token_label = label;
        }
        if let Some(url) = lookup("BITGATE_NOTIFICATION_URL") {
            config.notification_url = Some(url);
        }
        if let Some(marker) = lookup("BITGATE_TEST_MARKER") {
            config.test_network_marker = marker;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that would otherwise surface as confusing runtime errors.
    pub fn validate(&self) -> Result<()> {
        if self.livenet_api_url.trim().is_empty() || self.testnet_api_url.trim().is_empty() {
            return Err(GatewayError::ConfigurationInvalid(
                "processor API URLs cannot be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 || self.notification_timeout_secs == 0 {
            return Err(GatewayError::ConfigurationInvalid(
                "timeouts must be at least one second".to_string(),
            ));
        }
        if self.token_label.trim().is_empty() {
            return Err(GatewayError::ConfigurationInvalid(
                "token label cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// API base URL for a network, without trailing slash.
    pub fn api_url(&self, network: Network) -> &str {
        match network {
            Network::Livenet => self.livenet_api_url.trim_end_matches('/'),
            Network::Testnet => self.testnet_api_url.trim_end_matches('/'),
        }
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Per-notification budget.
    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout_secs)
    }

    /// Point both networks at one host (mock servers, sandboxes).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.livenet_api_url = url.clone();
        self.testnet_api_url = url;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set the per-notification budget.
    pub fn with_notification_timeout(mut self, secs: u64) -> Self {
        self.notification_timeout_secs = secs;
        self
    }

    /// Set the token label.
    pub fn with_token_label(mut self, label: impl Into<String>) -> Self {
        self.token_label = label.into();
        self
    }

    /// Set the notification URL sent with new invoices.
    pub fn with_notification_url(mut self, url: impl Into<String>) -> Self {
        self.notification_url = Some(url.into());
        self
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|e| {
        GatewayError::ConfigurationInvalid(format!("{key} must be a number of seconds: {e}"))
    })
}
