//! Checkout command - issue an invoice for a local order

use anyhow::{Context, Result};
use bitgate_lib::checkout::CheckoutOrder;
use bitgate_lib::store::OrderId;
use rust_decimal::Decimal;
use std::path::Path;

use crate::ui;

pub struct CheckoutArgs {
    pub order_id: String,
    pub total: Decimal,
    pub currency: String,
    pub return_url: String,
    pub key: Option<String>,
}

#[tracing::instrument(skip(storage_dir, args), fields(order_id = %args.order_id))]
pub async fn run(storage_dir: &Path, args: CheckoutArgs, verbose: bool) -> Result<()> {
    ui::header("Checkout");

    let (gateway, orders) = super::open_gateway(storage_dir).await?;
    let order_id = OrderId::new(args.order_id);

    if orders.get(&order_id).await?.is_none() {
        anyhow::bail!(
            "Order {} not found. Create it first with 'bitgate orders create {}'",
            order_id,
            order_id
        );
    }

    let order = CheckoutOrder {
        order_key: args
            .key
            .unwrap_or_else(|| format!("order_{}", chrono::Utc::now().timestamp())),
        order_id,
        total: args.total,
        currency: args.currency,
        return_url: args.return_url,
    };

    let spinner = ui::spinner("Creating invoice...");
    let result = gateway.process_payment(&order).await;
    spinner.finish_and_clear();
    let checkout = result.context("Checkout failed")?;

    ui::success(&format!("Invoice {} issued", checkout.invoice.id));
    ui::key_value("Order", order.order_id.as_str());
    ui::key_value(
        "Amount",
        &format!("{} {}", checkout.invoice.price, checkout.invoice.currency),
    );
    ui::key_value("Order status", &ui::status("on-hold"));
    if let Some(expires) = checkout.invoice.expiration_time {
        ui::key_value("Expires", &expires.to_rfc3339());
    }
    if verbose {
        if let Some(redirect) = &checkout.invoice.redirect_url {
            ui::key_value("Redirect", redirect);
        }
    }
    ui::separator();
    ui::key_value("Pay at", &checkout.payment_url);
    ui::qr_code(&checkout.payment_url)?;

    Ok(())
}
