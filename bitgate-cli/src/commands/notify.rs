//! Notify command - run an invoice notification through the reconciliation engine
//!
//! Useful when the processor cannot reach the endpoint: the invoice is
//! fetched from the processor exactly as it would be for a pushed
//! notification.

use anyhow::{Context, Result};
use bitgate_lib::reconcile::ReconcileResult;
use bitgate_lib::Network;
use std::path::Path;

use crate::ui;

pub async fn run(
    storage_dir: &Path,
    invoice_id: &str,
    network: Option<Network>,
    verbose: bool,
) -> Result<()> {
    ui::header("Process Notification");

    let (gateway, _) = super::open_gateway(storage_dir).await?;
    let network = network
        .or_else(|| {
            gateway
                .credentials()
                .ok()
                .flatten()
                .map(|credentials| credentials.network)
        })
        .unwrap_or_default();

    let body = serde_json::json!({
        "id": invoice_id,
        "url": format!("{}/invoice?id={}", gateway.config().api_url(network), invoice_id),
    });
    if verbose {
        ui::key_value("Payload", &body.to_string());
    }

    let spinner = ui::spinner(&format!("Fetching invoice {invoice_id}..."));
    let result = gateway.handle_notification(body.to_string().as_bytes()).await;
    spinner.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            if e.is_retryable() {
                ui::warning("Transient failure; the processor would redeliver");
            }
            return Err(e).context("Notification failed");
        }
    };

    ui::key_value("Invoice", &outcome.invoice_id);
    ui::key_value("Order", outcome.order_id.as_str());
    ui::key_value("Remote status", outcome.remote_status.as_str());
    match &outcome.result {
        ReconcileResult::Applied {
            to,
            completed_payment,
        } => {
            ui::success(&format!(
                "Order moved {} -> {}",
                ui::status(outcome.previous_status.as_str()),
                ui::status(to.as_str())
            ));
            if *completed_payment {
                ui::success("Payment marked complete");
            }
        }
        ReconcileResult::Skipped(reason) => {
            ui::info(&format!("No change: {reason}"));
        }
    }

    Ok(())
}
