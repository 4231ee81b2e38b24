//! bitgate CLI
//!
//! Operator tool for the bitgate invoice gateway: pair with the processor,
//! tune order-state mapping, run checkouts against a local order file and
//! serve the notification endpoint.

use anyhow::Result;
use bitgate_lib::invoice::InvoiceStatus;
use bitgate_lib::settings::TransactionSpeed;
use bitgate_lib::Network;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "bitgate")]
#[command(about = "bitgate - accept bitcoin payments through a BitPay-compatible processor", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom storage directory for settings and orders
    #[arg(long, global = true, env = "BITGATE_DIR")]
    storage_dir: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Pair with the processor using a merchant pairing code
    Pair {
        /// 7-character pairing code from the processor dashboard
        code: String,

        /// Network to pair on (livenet, testnet)
        #[arg(short, long, default_value = "testnet")]
        network: Network,
    },

    /// Drop the stored credentials
    Revoke {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show pairing status and invoice options
    Status,

    /// Show or change the remote-to-local order status mapping
    OrderStates {
        #[command(subcommand)]
        action: OrderStateAction,
    },

    /// Change invoice options sent with new invoices
    Settings {
        /// Transaction speed (high, medium, low)
        #[arg(long)]
        speed: Option<TransactionSpeed>,

        /// Ask the processor for a notification on every status change
        #[arg(long)]
        full_notifications: Option<bool>,
    },

    /// Issue an invoice for an order in the local order file
    Checkout {
        /// Order ID
        order_id: String,

        /// Order total
        #[arg(short, long)]
        total: Decimal,

        /// ISO currency code
        #[arg(short, long, default_value = "USD")]
        currency: String,

        /// Page the customer returns to after paying
        #[arg(long, default_value = "https://shop.example/checkout/order-received/")]
        return_url: String,

        /// Order key appended to the return URL
        #[arg(long)]
        key: Option<String>,
    },

    /// Process a notification for an invoice, as if the processor sent it
    Notify {
        /// Invoice ID
        invoice_id: String,

        /// Network the invoice lives on (defaults to the paired network)
        #[arg(short, long)]
        network: Option<Network>,
    },

    /// Manage orders in the local order file
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },

    /// Serve the notification endpoint
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum OrderStateAction {
    /// Show the effective mapping
    Show,

    /// Map a remote invoice status to a local order status
    Set {
        /// Remote status (paid, confirmed, complete, expired, invalid)
        remote: InvoiceStatus,

        /// Local order status slug (e.g. processing, completed)
        local: String,
    },

    /// Restore the default for a remote status
    Clear {
        /// Remote status
        remote: InvoiceStatus,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// List all orders
    List,

    /// Show one order with its history
    Show {
        /// Order ID
        order_id: String,
    },

    /// Create an order awaiting payment
    Create {
        /// Order ID
        order_id: String,

        /// Initial status
        #[arg(short, long, default_value = "pending")]
        status: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("bitgate=debug,bitgate_cli=debug,bitgate_lib=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("bitgate=info,bitgate_cli=info,bitgate_lib=warn")
            .init();
    }

    // Setup storage directory
    let storage_dir = if let Some(dir) = cli.storage_dir {
        std::path::PathBuf::from(dir)
    } else {
        dirs::data_local_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("bitgate")
    };

    // Dispatch commands
    match cli.command {
        Commands::Pair { code, network } => {
            commands::pair::pair(&storage_dir, &code, network, cli.verbose).await?;
        }
        Commands::Revoke { yes } => {
            commands::pair::revoke(&storage_dir, yes).await?;
        }
        Commands::Status => {
            commands::status::run(&storage_dir, cli.verbose).await?;
        }
        Commands::OrderStates { action } => match action {
            OrderStateAction::Show => {
                commands::order_states::show(&storage_dir).await?;
            }
            OrderStateAction::Set { remote, local } => {
                commands::order_states::set(&storage_dir, remote, Some(&local)).await?;
            }
            OrderStateAction::Clear { remote } => {
                commands::order_states::set(&storage_dir, remote, None).await?;
            }
        },
        Commands::Settings {
            speed,
            full_notifications,
        } => {
            commands::settings::run(&storage_dir, speed, full_notifications).await?;
        }
        Commands::Checkout {
            order_id,
            total,
            currency,
            return_url,
            key,
        } => {
            commands::checkout::run(
                &storage_dir,
                commands::checkout::CheckoutArgs {
                    order_id,
                    total,
                    currency,
                    return_url,
                    key,
                },
                cli.verbose,
            )
            .await?;
        }
        Commands::Notify {
            invoice_id,
            network,
        } => {
            commands::notify::run(&storage_dir, &invoice_id, network, cli.verbose).await?;
        }
        Commands::Orders { action } => match action {
            OrderAction::List => {
                commands::orders::list(&storage_dir).await?;
            }
            OrderAction::Show { order_id } => {
                commands::orders::show(&storage_dir, &order_id).await?;
            }
            OrderAction::Create { order_id, status } => {
                commands::orders::create(&storage_dir, &order_id, &status).await?;
            }
        },
        Commands::Serve { bind } => {
            commands::serve::run(&storage_dir, &bind).await?;
        }
    }

    Ok(())
}
