//! Status command - show pairing and invoice options

use anyhow::Result;
use std::path::Path;

use crate::ui;

pub async fn run(storage_dir: &Path, verbose: bool) -> Result<()> {
    let (gateway, _) = super::open_gateway(storage_dir).await?;
    let settings = gateway.settings()?;

    ui::header("Gateway Status");
    match &settings.credentials {
        Some(credentials) => match credentials.validate() {
            Ok(()) => {
                ui::success(&format!("Paired on {}", credentials.network));
                ui::key_value("SIN", &credentials.sin);
                ui::key_value("Label", &credentials.label);
                ui::key_value(
                    "API URL",
                    gateway.config().api_url(credentials.network),
                );
            }
            Err(e) => {
                ui::error(&format!("Stored credentials are unusable: {e}"));
                ui::info("Run 'bitgate revoke' and pair again");
            }
        },
        None => {
            ui::warning("Not paired");
            ui::info("Run 'bitgate pair <CODE>' with a code from the processor dashboard");
        }
    }

    ui::header("Invoice Options");
    ui::key_value("Transaction speed", settings.transaction_speed.as_str());
    ui::key_value(
        "Full notifications",
        if settings.full_notifications { "on" } else { "off" },
    );
    ui::key_value(
        "Notification URL",
        gateway
            .config()
            .notification_url
            .as_deref()
            .unwrap_or("(not set)"),
    );

    if verbose {
        ui::header("Storage");
        ui::key_value(
            "Settings",
            &super::settings_path(storage_dir).display().to_string(),
        );
        ui::key_value(
            "Orders",
            &super::orders_path(storage_dir).display().to_string(),
        );
    }

    Ok(())
}
