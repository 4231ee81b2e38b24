//! CLI command implementations

pub mod checkout;
pub mod notify;
pub mod order_states;
pub mod orders;
pub mod pair;
pub mod serve;
pub mod settings;
pub mod status;

use anyhow::{Context, Result};
use bitgate_cli::FileOrderStore;
use bitgate_lib::settings::FileSettingsStore;
use bitgate_lib::{Gateway, GatewayConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Get the path to the persisted gateway settings
pub fn settings_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join("settings.json")
}

/// Get the path to the local order file
pub fn orders_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join("orders.json")
}

/// Open the local order file
pub fn order_store(storage_dir: &Path) -> Arc<FileOrderStore> {
    Arc::new(FileOrderStore::new(orders_path(storage_dir)))
}

/// Assemble a gateway over the storage directory, configured from `BITGATE_*`
pub async fn open_gateway(storage_dir: &Path) -> Result<(Gateway, Arc<FileOrderStore>)> {
    let config = GatewayConfig::from_env().context("Invalid BITGATE_* configuration")?;
    let orders = order_store(storage_dir);
    let settings = Arc::new(FileSettingsStore::new(settings_path(storage_dir)));

    let gateway = Gateway::with_bitpay(config, settings, orders.clone())
        .await
        .context("Failed to load gateway settings")?;
    Ok((gateway, orders))
}
