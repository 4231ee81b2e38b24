//! Settings command - invoice options sent with new invoices

use anyhow::Result;
use bitgate_lib::settings::TransactionSpeed;
use std::path::Path;

use crate::ui;

pub async fn run(
    storage_dir: &Path,
    speed: Option<TransactionSpeed>,
    full_notifications: Option<bool>,
) -> Result<()> {
    let (gateway, _) = super::open_gateway(storage_dir).await?;

    let settings = if speed.is_none() && full_notifications.is_none() {
        gateway.settings()?
    } else {
        let updated = gateway
            .set_invoice_options(speed, full_notifications)
            .await?;
        ui::success("Invoice options updated");
        updated
    };

    ui::header("Invoice Options");
    ui::key_value("Transaction speed", settings.transaction_speed.as_str());
    ui::key_value(
        "Full notifications",
        if settings.full_notifications { "on" } else { "off" },
    );
    Ok(())
}
