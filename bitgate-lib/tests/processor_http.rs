//! Integration tests for the BitPay REST client against a mock HTTP server.
//!
//! ```bash
//! cargo test -p bitgate-lib --test processor_http
//! ```

use bitgate_lib::credentials::{CredentialSet, MerchantKey, PrivateKeyHex};
use bitgate_lib::invoice::{InvoiceRequest, InvoiceStatus};
use bitgate_lib::processor::{BitPayClient, PaymentProcessor, TokenRequest};
use bitgate_lib::settings::TransactionSpeed;
use bitgate_lib::{GatewayConfig, GatewayError, Network};
use rust_decimal_macros::dec;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1};
use sha2::{Digest, Sha256};
use wiremock::{
    matchers::{body_partial_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn credentials(network: Network) -> CredentialSet {
    let key = MerchantKey::generate().unwrap();
    CredentialSet {
        private_key: PrivateKeyHex::new(key.secret_hex().as_str()),
        public_key: key.public_key_hex(),
        sin: key.sin(),
        label: "bitgate - test".to_string(),
        token: "merchant-token".to_string(),
        network,
    }
}

fn client(server: &MockServer) -> BitPayClient {
    BitPayClient::new(
        &GatewayConfig::default()
            .with_api_url(server.uri())
            .with_request_timeout(5),
    )
    .unwrap()
}

fn invoice_body(id: &str, order_id: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "data": {
            "id": id,
            "url": format!("https://test.bitpay.com/invoice?id={id}"),
            "status": status,
            "price": 25.0,
            "currency": "USD",
            "orderId": order_id,
            "invoiceTime": 1_700_000_000_000i64,
            "expirationTime": 1_700_000_900_000i64,
            "token": "invoice-token",
        }
    })
}

fn verify(public_key_hex: &str, signature_hex: &str, message: &[u8]) -> bool {
    let secp = Secp256k1::verification_only();
    let public = PublicKey::from_slice(&hex::decode(public_key_hex).unwrap()).unwrap();
    let signature = Signature::from_der(&hex::decode(signature_hex).unwrap()).unwrap();
    let digest: [u8; 32] = Sha256::digest(message).into();
    secp.verify_ecdsa(&Message::from_digest(digest), &signature, &public)
        .is_ok()
}

// ============================================================================
// Pairing
// ============================================================================

#[tokio::test]
async fn test_create_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tokens"))
        .and(header("X-Accept-Version", "2.0.0"))
        .and(body_partial_json(serde_json::json!({
            "id": "TfExampleSin",
            "pairingCode": "ABC1234",
            "label": "bitgate - shop",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{
                "policies": [{"policy": "id", "method": "active", "params": ["TfExampleSin"]}],
                "token": "5kVaDvxz1hk1rJ8F6Fu3Fo",
                "facade": "merchant",
                "dateCreated": 1_700_000_000_000i64,
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = client(&server)
        .create_token(
            &TokenRequest {
                id: "TfExampleSin".into(),
                pairing_code: "ABC1234".into(),
                label: "bitgate - shop".into(),
            },
            Network::Testnet,
        )
        .await
        .unwrap();

    assert_eq!(token.token, "5kVaDvxz1hk1rJ8F6Fu3Fo");
    assert_eq!(token.facade.as_deref(), Some("merchant"));
}

#[tokio::test]
async fn test_create_token_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tokens"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"error": "Pairing code not found"})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .create_token(
            &TokenRequest {
                id: "TfExampleSin".into(),
                pairing_code: "ZZZ9999".into(),
                label: "bitgate".into(),
            },
            Network::Testnet,
        )
        .await
        .unwrap_err();

    assert!(err.is_processor_rejection());
    assert!(err.to_string().contains("Pairing code not found"));
}

// ============================================================================
// Invoices
// ============================================================================

#[tokio::test]
async fn test_create_invoice_is_signed() {
    let server = MockServer::start().await;
    let creds = credentials(Network::Testnet);

    Mock::given(method("POST"))
        .and(path("/invoices"))
        .and(header("X-Accept-Version", "2.0.0"))
        .and(header("X-Identity", creds.public_key.as_str()))
        .and(body_partial_json(serde_json::json!({
            "price": 25.0,
            "currency": "USD",
            "orderId": "1001",
            "redirectURL": "https://shop.example/thanks?order=1001&key=k",
            "notificationURL": "https://shop.example/notify",
            "transactionSpeed": "medium",
            "fullNotifications": true,
            "token": "merchant-token",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(invoice_body("inv1", "1001", "new")))
        .expect(1)
        .mount(&server)
        .await;

    let request = InvoiceRequest::new("1001", "USD", dec!(25.00))
        .with_redirect_url("https://shop.example/thanks?order=1001&key=k")
        .with_notification_url("https://shop.example/notify")
        .with_transaction_speed(TransactionSpeed::Medium)
        .with_full_notifications(true);

    let invoice = client(&server)
        .create_invoice(&request, &creds)
        .await
        .unwrap();

    assert_eq!(invoice.id, "inv1");
    assert_eq!(invoice.status, InvoiceStatus::New);
    assert_eq!(invoice.order_id.as_str(), "1001");

    let received = server.received_requests().await.unwrap();
    let sent = &received[0];
    let url = format!("{}/invoices", server.uri());
    let mut message = url.into_bytes();
    message.extend_from_slice(&sent.body);
    let signature = sent.headers.get("X-Signature").unwrap().to_str().unwrap();
    assert!(verify(&creds.public_key, signature, &message));
}

#[tokio::test]
async fn test_get_invoice_signs_full_url() {
    let server = MockServer::start().await;
    let creds = credentials(Network::Livenet);

    Mock::given(method("GET"))
        .and(path("/invoices/inv1"))
        .and(query_param("token", "merchant-token"))
        .and(header("X-Identity", creds.public_key.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(invoice_body("inv1", "1001", "confirmed")),
        )
        .mount(&server)
        .await;

    let invoice = client(&server)
        .get_invoice("inv1", &creds, Network::Livenet)
        .await
        .unwrap();

    assert_eq!(invoice.status, InvoiceStatus::Confirmed);
    assert!(invoice.expiration_time > invoice.invoice_time);

    let received = server.received_requests().await.unwrap();
    let signature = received[0]
        .headers
        .get("X-Signature")
        .unwrap()
        .to_str()
        .unwrap();
    let url = format!("{}/invoices/inv1?token=merchant-token", server.uri());
    assert!(verify(&creds.public_key, signature, url.as_bytes()));
}

#[tokio::test]
async fn test_get_invoice_server_error_is_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoices/inv1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client(&server)
        .get_invoice("inv1", &credentials(Network::Testnet), Network::Testnet)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GatewayError::RemoteRequestFailed {
            status: Some(503),
            ..
        }
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_get_invoice_unknown_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoices/inv1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(invoice_body("inv1", "1001", "refunded")),
        )
        .mount(&server)
        .await;

    let invoice = client(&server)
        .get_invoice("inv1", &credentials(Network::Testnet), Network::Testnet)
        .await
        .unwrap();

    assert_eq!(invoice.status, InvoiceStatus::Unrecognized);
    assert_eq!(invoice.order_id.as_str(), "1001");
}

#[tokio::test]
async fn test_slow_processor_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoices/inv1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(invoice_body("inv1", "1001", "paid"))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = BitPayClient::new(
        &GatewayConfig::default()
            .with_api_url(server.uri())
            .with_request_timeout(1),
    )
    .unwrap();

    let err = client
        .get_invoice("inv1", &credentials(Network::Testnet), Network::Testnet)
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Timeout { .. }));
}
