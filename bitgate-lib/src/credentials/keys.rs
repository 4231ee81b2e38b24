//! Merchant signing key and SIN derivation.

use rand::rngs::OsRng;
use rand::RngCore;
use ripemd::Ripemd160;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use zeroize::{Zeroize, Zeroizing};

use crate::{GatewayError, Result};

/// SIN version byte and type byte ("ephemeral" identity).
const SIN_PREFIX: [u8; 2] = [0x0F, 0x02];

fn context() -> &'static Secp256k1<All> {
    static CONTEXT: OnceLock<Secp256k1<All>> = OnceLock::new();
    CONTEXT.get_or_init(Secp256k1::new)
}

/// A merchant secp256k1 key pair.
///
/// The secret is erased when the key is dropped.
pub struct MerchantKey {
    secret: SecretKey,
    public: PublicKey,
}

impl MerchantKey {
    /// Generate a fresh key from the OS random source.
    pub fn generate() -> Result<Self> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        // A random 32-byte string is out of range with negligible probability.
        for _ in 0..8 {
            OsRng
                .try_fill_bytes(&mut bytes[..])
                .map_err(|e| GatewayError::Storage(format!("random source unavailable: {e}")))?;
            if let Ok(secret) = SecretKey::from_slice(&bytes[..]) {
                return Ok(Self::from_secret(secret));
            }
        }
        Err(GatewayError::Storage(
            "could not generate a valid secp256k1 key".to_string(),
        ))
    }

    /// Restore a key from its hex-encoded secret.
    pub fn from_hex(secret_hex: &str) -> Result<Self> {
        let mut bytes = hex::decode(secret_hex.trim()).map_err(|e| {
            GatewayError::ConfigurationInvalid(format!("private key is not hex: {e}"))
        })?;
        let secret = SecretKey::from_slice(&bytes);
        bytes.zeroize();
        let secret = secret.map_err(|e| {
            GatewayError::ConfigurationInvalid(format!("private key is not a valid secp256k1 key: {e}"))
        })?;
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = PublicKey::from_secret_key(context(), &secret);
        Self { secret, public }
    }

    /// Hex-encoded secret, wiped when the returned buffer drops.
    pub fn secret_hex(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.secret.secret_bytes());
        Zeroizing::new(hex::encode(&bytes[..]))
    }

    /// Compressed public key, hex encoded.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.serialize())
    }

    /// SIN identity for this key.
    pub fn sin(&self) -> String {
        derive_sin(&self.public.serialize())
    }

    /// Sign `message` the way the processor verifies request signatures:
    /// ECDSA over `sha256(message)`, DER encoded, hex.
    pub fn sign(&self, message: &[u8]) -> String {
        let digest: [u8; 32] = Sha256::digest(message).into();
        let msg = Message::from_digest(digest);
        let signature = context().sign_ecdsa(&msg, &self.secret);
        hex::encode(signature.serialize_der().to_vec())
    }
}

impl Drop for MerchantKey {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

impl std::fmt::Debug for MerchantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerchantKey")
            .field("public", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Derive the SIN for a compressed public key.
pub fn derive_sin(public_key: &[u8]) -> String {
    let hash160 = Ripemd160::digest(Sha256::digest(public_key));

    let mut payload = Vec::with_capacity(SIN_PREFIX.len() + hash160.len() + 4);
    payload.extend_from_slice(&SIN_PREFIX);
    payload.extend_from_slice(&hash160);

    let checksum = Sha256::digest(Sha256::digest(&payload));
    payload.extend_from_slice(&checksum[..4]);

    bs58::encode(payload).into_string()
}
