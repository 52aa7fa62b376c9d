//! # Lustre Orders CLI
//!
//! Operator front end for the order engine.
//!
//! ## Commands
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lustre place-order <request.json | ->     create an order              │
//! │  lustre orders [--customer <id>]           list orders, newest first    │
//! │  lustre order <id>                         show one order               │
//! │  lustre set-status <id> [--status ..] [--payment-status ..]             │
//! │  lustre check-code <code> [--subtotal-cents ..] [--customer ..]         │
//! │                                                                         │
//! │  stdout: pretty JSON result                                             │
//! │  stderr: ApiError JSON { code, status, message }, exit code 1           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load `LUSTRE_*` configuration
//! 3. Determine database path (flag, env, then app data directory)
//! 4. Connect to database & run migrations
//! 5. Run the subcommand

mod commands;
mod error;

use anyhow::Context;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use lustre_db::{Database, EngineConfig, OrderService};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use commands::{PaymentArg, StatusArg};
use error::ApiError;

#[derive(Debug, Parser)]
#[command(name = "lustre", version, about = "Lustre Orders operator CLI")]
struct Cli {
    /// SQLite database file (overrides LUSTRE_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an order from a JSON request file (`-` reads stdin)
    PlaceOrder { request: PathBuf },

    /// List orders, newest first
    Orders {
        /// Only this customer's orders
        #[arg(long)]
        customer: Option<String>,
    },

    /// Show one order
    Order { id: String },

    /// Update fulfillment and/or payment status
    SetStatus {
        id: String,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long, value_enum)]
        payment_status: Option<PaymentArg>,
    },

    /// Check a discount code without redeeming it
    CheckCode {
        code: String,
        /// Order subtotal the discount is computed against
        #[arg(long, default_value_t = 0)]
        subtotal_cents: i64,
        /// Also check this customer's per-customer limit
        #[arg(long)]
        customer: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("Invalid LUSTRE_* configuration")?;

    let path = match config.resolve_database_path(cli.db.clone()) {
        Some(path) => path,
        None => default_db_path()?,
    };
    let db_config = config.db_config(path);

    info!(path = %db_config.database_path.display(), "Opening database");
    let db = Database::new(db_config)
        .await
        .context("Failed to open database")?;

    let pricing = config.load_pricing()?;
    let service = OrderService::from_config(db.clone(), &config, pricing);

    let outcome = run(&service, cli.command).await;
    db.close().await;

    match outcome {
        Ok(json) => {
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{}", to_pretty_json(&err)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Runs one subcommand and renders its result.
async fn run(service: &OrderService, command: Command) -> Result<String, ApiError> {
    let json = match command {
        Command::PlaceOrder { request } => {
            let request = commands::read_request(&request)?;
            to_pretty_json(&commands::place_order(service, &request).await?)
        }
        Command::Orders { customer } => {
            to_pretty_json(&commands::list_orders(service, customer.as_deref()).await?)
        }
        Command::Order { id } => to_pretty_json(&commands::show_order(service, &id).await?),
        Command::SetStatus {
            id,
            status,
            payment_status,
        } => to_pretty_json(&commands::set_status(service, &id, status, payment_status).await?),
        Command::CheckCode {
            code,
            subtotal_cents,
            customer,
        } => to_pretty_json(
            &commands::check_code(service, &code, subtotal_cents, customer.as_deref()).await?,
        ),
    };

    json.map_err(|e| ApiError::invalid_request(format!("Cannot render result: {}", e)))
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Initializes tracing with an env filter.
///
/// Default: `info,lustre=debug,sqlx=warn`, override with `RUST_LOG`.
/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lustre=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Database path in the platform data directory.
///
/// - macOS: ~/Library/Application Support/com.lustre.orders/lustre.db
/// - Windows: %APPDATA%/lustre/orders/data/lustre.db
/// - Linux: ~/.local/share/orders/lustre.db
fn default_db_path() -> anyhow::Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "lustre", "orders")
        .context("Cannot determine the application data directory")?;

    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Cannot create {}", data_dir.display()))?;

    Ok(data_dir.join("lustre.db"))
}
