//! Pair and revoke commands - manage processor credentials

use anyhow::{Context, Result};
use bitgate_lib::Network;
use std::path::Path;

use crate::ui;

#[tracing::instrument(skip(storage_dir, code))]
pub async fn pair(storage_dir: &Path, code: &str, network: Network, verbose: bool) -> Result<()> {
    ui::header("Pair with Processor");

    let (gateway, _) = super::open_gateway(storage_dir).await?;

    if let Some(existing) = gateway.credentials()? {
        ui::warning(&format!(
            "Already paired on {} as {}",
            existing.network, existing.sin
        ));
        if !ui::confirm("Replace the stored key with a new one?", false)? {
            ui::info("Pairing cancelled");
            return Ok(());
        }
    }

    let spinner = ui::spinner(&format!("Requesting API token on {network}..."));
    let result = gateway.pair(code, network).await;
    spinner.finish_and_clear();
    let credentials = result.context("Pairing failed")?;

    ui::success("Paired with the processor");
    ui::key_value("Network", credentials.network.as_str());
    ui::key_value("SIN", &credentials.sin);
    ui::key_value("Label", &credentials.label);
    if verbose {
        ui::key_value("Public Key", &credentials.public_key);
    }
    ui::key_value(
        "Settings",
        &super::settings_path(storage_dir).display().to_string(),
    );

    Ok(())
}

pub async fn revoke(storage_dir: &Path, yes: bool) -> Result<()> {
    ui::header("Revoke Credentials");

    let (gateway, _) = super::open_gateway(storage_dir).await?;

    if !yes && !ui::confirm("Revoke stored credentials? New checkouts will fail.", false)? {
        ui::info("Revoke cancelled");
        return Ok(());
    }

    if gateway.revoke().await? {
        ui::success("Credentials revoked");
        ui::info("Also revoke the token in the processor dashboard");
    } else {
        ui::info("Not paired; nothing to revoke");
    }

    Ok(())
}
