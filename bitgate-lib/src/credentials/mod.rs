//! Merchant credentials: key pair, SIN and processor token.
//!
//! Credentials are all-or-nothing. [`CredentialStore::pair`] generates a key,
//! exchanges a pairing code for a token and persists the complete set in one
//! settings write; [`CredentialStore::revoke`] clears it in one write. A set
//! loaded from storage is re-validated before use, so a hand-edited or
//! truncated record surfaces as [`GatewayError::ConfigurationInvalid`]
//! instead of a signing failure halfway through a request.

mod keys;

pub use keys::{derive_sin, MerchantKey};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::processor::{PaymentProcessor, TokenRequest};
use crate::settings::SharedSettings;
use crate::{GatewayError, Network, Result};

/// Length of a processor pairing code.
pub const PAIRING_CODE_LEN: usize = 7;

/// Hex-encoded private key, wiped on drop and redacted in debug output.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivateKeyHex(String);

impl PrivateKeyHex {
    /// Wrap a hex secret.
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Borrow the hex string.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True when no key is stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for PrivateKeyHex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKeyHex(<redacted>)")
    }
}

/// A complete set of processor credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    #[serde(default)]
    pub private_key: PrivateKeyHex,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub sin: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub network: Network,
}

impl CredentialSet {
    /// Reject partial or internally inconsistent sets.
    pub fn validate(&self) -> Result<()> {
        let missing = [
            ("private key", self.private_key.is_empty()),
            ("public key", self.public_key.is_empty()),
            ("SIN", self.sin.is_empty()),
            ("label", self.label.is_empty()),
            ("token", self.token.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(GatewayError::ConfigurationInvalid(format!(
                "credentials incomplete, missing {}",
                missing.join(", ")
            )));
        }

        let key = self.signing_key()?;
        if key.public_key_hex() != self.public_key {
            return Err(GatewayError::ConfigurationInvalid(
                "stored public key does not match the private key".to_string(),
            ));
        }
        if key.sin() != self.sin {
            return Err(GatewayError::ConfigurationInvalid(
                "stored SIN does not match the public key".to_string(),
            ));
        }
        Ok(())
    }

    /// Restore the signing key.
    pub fn signing_key(&self) -> Result<MerchantKey> {
        MerchantKey::from_hex(self.private_key.expose())
    }
}

/// Check a pairing code before anything touches the network.
pub fn validate_pairing_code(code: &str) -> Result<()> {
    let valid = code.len() == PAIRING_CODE_LEN && code.bytes().all(|b| b.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(GatewayError::PairingRejected(format!(
            "pairing code must be {PAIRING_CODE_LEN} letters or digits"
        )))
    }
}

/// Pairs, revokes and reads the merchant credential set.
#[derive(Clone)]
pub struct CredentialStore {
    settings: SharedSettings,
    processor: Arc<dyn PaymentProcessor>,
    label: String,
    timeout: Duration,
}

impl CredentialStore {
    /// Create a store writing through `settings`.
    pub fn new(
        settings: SharedSettings,
        processor: Arc<dyn PaymentProcessor>,
        label: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            settings,
            processor,
            label: label.into(),
            timeout,
        }
    }

    /// Exchange a pairing code for a token and persist the new credential set.
    ///
    /// On any failure nothing is persisted and existing credentials are left
    /// untouched.
    #[tracing::instrument(skip(self, pairing_code))]
    pub async fn pair(&self, pairing_code: &str, network: Network) -> Result<CredentialSet> {
        validate_pairing_code(pairing_code)?;

        let key = MerchantKey::generate()?;
        let request = TokenRequest {
            id: key.sin(),
            pairing_code: pairing_code.to_string(),
            label: self.label.clone(),
        };

        let token = tokio::time::timeout(
            self.timeout,
            self.processor.create_token(&request, network),
        )
        .await
        .map_err(|_| GatewayError::Timeout {
            operation: "create_token",
            timeout_ms: self.timeout.as_millis() as u64,
        })?
        .map_err(|e| match e {
            e if e.is_processor_rejection() => GatewayError::PairingRejected(e.to_string()),
            e => e,
        })?;

        if token.token.is_empty() {
            return Err(GatewayError::PairingRejected(
                "processor returned an empty token".to_string(),
            ));
        }

        let credentials = CredentialSet {
            private_key: PrivateKeyHex::new(key.secret_hex().as_str()),
            public_key: key.public_key_hex(),
            sin: request.id,
            label: request.label,
            token: token.token,
            network,
        };

        let stored = credentials.clone();
        self.settings
            .update(move |settings| {
                settings.credentials = Some(stored);
                Ok(())
            })
            .await?;

        info!(sin = %credentials.sin, "paired with processor");
        Ok(credentials)
    }

    /// Clear all credentials. Returns whether a set was present.
    pub async fn revoke(&self) -> Result<bool> {
        let mut was_paired = false;
        self.settings
            .update(|settings| {
                was_paired = settings.credentials.take().is_some();
                Ok(())
            })
            .await?;
        if was_paired {
            info!("credentials revoked");
        } else {
            warn!("revoke requested with no stored credentials");
        }
        Ok(was_paired)
    }

    /// Currently stored credentials, unvalidated.
    pub fn current(&self) -> Result<Option<CredentialSet>> {
        Ok(self.settings.snapshot()?.credentials)
    }
}
