//! Orders commands - inspect and seed the local order file

use anyhow::{Context, Result};
use bitgate_lib::store::{OrderId, OrderStatus, StoreAdapter};
use std::path::Path;

use crate::ui;

pub async fn list(storage_dir: &Path) -> Result<()> {
    let store = super::order_store(storage_dir);
    let orders = store.list().await?;

    ui::header("Orders");
    if orders.is_empty() {
        ui::info("No orders yet");
        ui::info("Run 'bitgate orders create <ID>' to add one");
        return Ok(());
    }

    for record in &orders {
        let mut flags = Vec::new();
        if record.payment_completed {
            flags.push("paid");
        }
        if record.stock_reduced {
            flags.push("stock held");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" ({})", flags.join(", "))
        };
        ui::key_value(
            record.id.as_str(),
            &format!("{}{}", ui::status(record.status.as_str()), flags),
        );
    }
    println!();
    ui::info(&format!("Total: {} order(s)", orders.len()));
    Ok(())
}

pub async fn show(storage_dir: &Path, order_id: &str) -> Result<()> {
    let store = super::order_store(storage_dir);
    let id = OrderId::new(order_id);
    let record = store
        .get(&id)
        .await?
        .with_context(|| format!("Order {order_id} not found"))?;

    ui::header(&format!("Order {}", record.id));
    ui::key_value("Status", &ui::status(record.status.as_str()));
    ui::key_value(
        "Payment complete",
        if record.payment_completed { "yes" } else { "no" },
    );
    ui::key_value("Stock held", if record.stock_reduced { "yes" } else { "no" });
    if let Some(invoice_id) = &record.invoice_id {
        ui::key_value("Invoice", invoice_id);
    }
    ui::key_value(
        "Cart",
        if store.has_open_cart(&id).await? {
            "open"
        } else {
            "released"
        },
    );

    let history = store.history(&id).await?;
    if !history.is_empty() {
        ui::header("History");
        for note in history {
            let change = match (&note.from, &note.to) {
                (Some(from), Some(to)) if from != to => format!(" [{from} -> {to}]"),
                _ => String::new(),
            };
            println!(
                "  {}{} {}",
                note.at.format("%Y-%m-%d %H:%M:%S"),
                change,
                note.message
            );
        }
    }
    Ok(())
}

pub async fn create(storage_dir: &Path, order_id: &str, status: &str) -> Result<()> {
    let store = super::order_store(storage_dir);
    let record = store
        .create_order(OrderId::new(order_id), OrderStatus::new(status))
        .await
        .context("Failed to create order")?;

    ui::success(&format!(
        "Created order {} ({})",
        record.id,
        ui::status(record.status.as_str())
    ));
    Ok(())
}
