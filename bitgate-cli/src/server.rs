//! Inbound notification endpoint.
//!
//! `POST /notify` hands the raw body to the gateway. The response status tells
//! the processor whether to redeliver: 2xx for applied or no-op, 4xx for a
//! payload that will never succeed, 503 for a transient failure.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bitgate_lib::{Gateway, GatewayError};
use serde_json::json;
use std::sync::Arc;

pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/notify", post(handle_notification))
        .route("/health", get(health))
        .with_state(gateway)
}

/// HTTP status reported for a failed notification.
pub fn status_for(error: &GatewayError) -> StatusCode {
    if error.is_payload_rejection() {
        StatusCode::BAD_REQUEST
    } else if error.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn handle_notification(State(gateway): State<Arc<Gateway>>, body: Bytes) -> Response {
    match gateway.handle_notification(&body).await {
        Ok(outcome) => {
            tracing::info!(
                invoice_id = %outcome.invoice_id,
                order_id = %outcome.order_id,
                status = %outcome.remote_status,
                applied = outcome.applied(),
                "notification handled"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "invoice": outcome.invoice_id,
                    "order": outcome.order_id,
                    "status": outcome.remote_status,
                    "applied": outcome.applied(),
                })),
            )
                .into_response()
        }
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!("Notification failed: {}", e);
            } else {
                tracing::warn!("Notification rejected: {}", e);
            }
            (
                status,
                Json(json!({
                    "error": e.to_string(),
                    "code": e.code() as i32,
                    "retryable": e.is_retryable(),
                })),
            )
                .into_response()
        }
    }
}

async fn health(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    let paired = gateway
        .refresh_settings()
        .await
        .map(|settings| settings.is_paired())
        .unwrap_or(false);
    Json(json!({ "status": "ok", "paired": paired }))
}
