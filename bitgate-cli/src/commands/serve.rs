//! Serve command - run the notification endpoint

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::ui;

#[tracing::instrument(skip(storage_dir))]
pub async fn run(storage_dir: &Path, bind: &str) -> Result<()> {
    ui::header("Notification Endpoint");

    let (gateway, _) = super::open_gateway(storage_dir).await?;
    if !gateway.settings()?.is_paired() {
        ui::warning("Not paired; notifications are rejected until 'bitgate pair' is run");
    }
    match &gateway.config().notification_url {
        Some(url) => ui::key_value("Notification URL", url),
        None => ui::warning("BITGATE_NOTIFICATION_URL is not set; invoices will not point here"),
    }

    let app = bitgate_cli::server::router(Arc::new(gateway));
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to {bind}"))?;

    ui::success(&format!("Listening on http://{bind}/notify"));
    ui::info("Press Ctrl+C to stop");
    ui::separator();
    tracing::info!("Notification endpoint listening on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;

    ui::info("Stopped");
    Ok(())
}
