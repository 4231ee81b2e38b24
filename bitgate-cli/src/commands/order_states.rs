//! Order state commands - map remote invoice statuses to local order statuses

use anyhow::{Context, Result};
use bitgate_lib::invoice::InvoiceStatus;
use bitgate_lib::mapping::StatusMapping;
use bitgate_lib::store::OrderStatus;
use std::path::Path;

use crate::ui;

pub async fn show(storage_dir: &Path) -> Result<()> {
    let (gateway, _) = super::open_gateway(storage_dir).await?;
    let overrides = gateway.settings()?.order_states;

    print_mapping(&gateway.order_states()?);
    if overrides.is_empty() {
        ui::info("Using the default mapping");
    }
    Ok(())
}

pub async fn set(storage_dir: &Path, remote: InvoiceStatus, local: Option<&str>) -> Result<()> {
    let (gateway, _) = super::open_gateway(storage_dir).await?;

    let mapping = gateway
        .set_order_state(remote, local.map(OrderStatus::new))
        .await
        .with_context(|| format!("Failed to update mapping for `{remote}`"))?;

    match local {
        Some(_) => ui::success(&format!("Updated mapping for `{remote}`")),
        None => ui::success(&format!("Restored default mapping for `{remote}`")),
    }
    print_mapping(&mapping);
    Ok(())
}

fn print_mapping(mapping: &StatusMapping) {
    ui::header("Order States");
    for remote in InvoiceStatus::ALL {
        let local = match mapping.target(remote) {
            Some(status) => ui::status(status.as_str()),
            None => "(ignored)".to_string(),
        };
        ui::key_value(remote.as_str(), &local);
    }
}
