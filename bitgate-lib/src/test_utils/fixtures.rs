//! Test fixtures.

use rust_decimal::Decimal;

use crate::credentials::{CredentialSet, MerchantKey, PrivateKeyHex};
use crate::invoice::{Invoice, InvoiceStatus};
use crate::settings::GatewaySettings;
use crate::Network;

/// Fixed merchant secret so fixtures are deterministic.
pub const MERCHANT_SECRET: &str =
    "c4f2e1d0b9a8978665544332211000ffeeddccbbaa99887766554433221100aa";

/// A complete, valid credential set on `network`.
pub fn credentials(network: Network) -> CredentialSet {
    let key = MerchantKey::from_hex(MERCHANT_SECRET).expect("fixture key is valid");
    CredentialSet {
        private_key: PrivateKeyHex::new(MERCHANT_SECRET),
        public_key: key.public_key_hex(),
        sin: key.sin(),
        label: "bitgate - test".to_string(),
        token: "fixture-token".to_string(),
        network,
    }
}

/// Settings paired on `network`, everything else default.
pub fn paired_settings(network: Network) -> GatewaySettings {
    GatewaySettings {
        credentials: Some(credentials(network)),
        ..Default::default()
    }
}

/// Payment page URL the processor would issue.
pub fn invoice_url(invoice_id: &str, network: Network) -> String {
    match network {
        Network::Livenet => format!("https://bitpay.com/invoice?id={invoice_id}"),
        Network::Testnet => format!("https://test.bitpay.com/invoice?id={invoice_id}"),
    }
}

/// A testnet invoice for `order_id` in `status`.
pub fn invoice(invoice_id: &str, order_id: &str, status: InvoiceStatus) -> Invoice {
    Invoice {
        id: invoice_id.to_string(),
        order_id: order_id.into(),
        currency: "USD".to_string(),
        price: Decimal::new(2500, 2),
        status,
        url: invoice_url(invoice_id, Network::Testnet),
        notification_url: None,
        redirect_url: None,
        invoice_time: None,
        expiration_time: None,
    }
}

/// Notification body for `invoice_id`, with a decoy status that must be ignored.
pub fn notification(invoice_id: &str, network: Network) -> Vec<u8> {
    serde_json::json!({
        "id": invoice_id,
        "url": invoice_url(invoice_id, network),
        "status": "complete",
        "orderId": "spoofed",
    })
    .to_string()
    .into_bytes()
}
