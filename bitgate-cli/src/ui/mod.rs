//! Terminal output for the operator CLI.
//!
//! Status lines go to stdout, failures to stderr.

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const RULE_WIDTH: usize = 60;
const KEY_WIDTH: usize = 16;

fn line(marker: ColoredString, message: &str) {
    println!("{marker} {message}");
}

pub fn success(message: &str) {
    line("✓".green().bold(), message);
}

/// Report a failure on stderr.
pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message);
}

pub fn info(message: &str) {
    line("•".blue(), message);
}

pub fn warning(message: &str) {
    line("!".yellow().bold(), message);
}

pub fn header(text: &str) {
    println!("\n{}", text.bold().underline());
}

/// Aligned `key  value` row.
pub fn key_value(key: &str, value: &str) {
    println!("  {:<KEY_WIDTH$} {}", format!("{key}:").cyan(), value);
}

/// Color an order status slug by where it sits in the payment flow
pub fn status(slug: &str) -> String {
    match slug {
        "completed" => slug.green().bold().to_string(),
        "processing" => slug.green().to_string(),
        "on-hold" | "pending" => slug.yellow().to_string(),
        "failed" | "cancelled" => slug.red().to_string(),
        _ => slug.normal().to_string(),
    }
}

/// Spinner shown while waiting on the processor.
pub fn spinner(message: &str) -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let pb = ProgressBar::new_spinner().with_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub fn confirm(prompt: &str, default: bool) -> anyhow::Result<bool> {
    Ok(dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()?)
}

/// Render the payment URL as a terminal QR code for scanning with a wallet.
pub fn qr_code(url: &str) -> anyhow::Result<()> {
    let rendered = qrcode::QrCode::new(url.as_bytes())?
        .render::<char>()
        .quiet_zone(false)
        .module_dimensions(2, 1)
        .build();
    println!("\n{rendered}\n");
    Ok(())
}

pub fn separator() {
    println!("{}", "─".repeat(RULE_WIDTH).dimmed());
}
