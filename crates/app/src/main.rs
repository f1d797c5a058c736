/// Calendarium Culinarium order backend
///
/// Entry point of the web shop backend: takes orders for the seasonal
/// calendar, stores them in SQLite and forwards them to Billbee.
///
/// # Commands
///
/// - `serve` (default): run the HTTP API until Ctrl+C / SIGTERM
/// - `reconcile`: re-forward stored orders that hit a Billbee server error
/// - `vouchers <csv>`: send one free membership voucher order per row of a
///   member list export
///
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app_config::AppConfig;
use forwarder::BillbeeForwarder;
use notifier::SmtpNotifier;
use repository::SqliteStore;
use server::{OperatorCredentials, Server};
use service::{OrderService, OrderServiceImpl};

#[derive(Parser)]
#[command(name = "calendarium", version, about = "Order backend of the Calendarium Culinarium shop")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Serve the HTTP API
    Serve,
    /// Re-forward orders whose last forwarding attempt got a server error
    Reconcile,
    /// Forward membership voucher orders listed in a CSV export
    Vouchers {
        /// Member list export, header row first
        file: PathBuf,
    },
}

/// Initialize the tracing subscriber for logging
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Builds the forwarding client, with alert emails if they are enabled.
fn build_forwarder(config: &AppConfig) -> Result<Arc<BillbeeForwarder>> {
    let mut forwarder =
        BillbeeForwarder::from_config(config).context("Failed to build forwarding client")?;

    if config.smtp_enabled {
        let notifier = SmtpNotifier::from_config(config).context("Failed to configure alert emails")?;
        forwarder = forwarder.with_notifier(Arc::new(notifier));
        info!(recipients = config.notify_to.len(), "Forwarding alerts enabled");
    }

    info!(
        url = %config.billbee_url,
        interval = ?config.forward_interval,
        "Order forwarding enabled"
    );
    Ok(Arc::new(forwarder))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();

    info!("Calendarium backend starting...");

    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let conn = db::init_db(&config).await?;
    let store = Arc::new(SqliteStore::new(conn));
    store
        .create_schema()
        .await
        .context("Failed to create database schema")?;

    let mut service = OrderServiceImpl::new(store);
    let forwarder = if config.forwarding_enabled {
        let forwarder = build_forwarder(&config)?;
        service = service.with_forwarder(forwarder.clone());
        Some(forwarder)
    } else {
        info!("Order forwarding disabled");
        None
    };

    let created = service
        .seed_catalog()
        .await
        .context("Failed to seed product catalog")?;
    let orders = service
        .count_orders()
        .await
        .context("Failed to count orders")?;
    info!(created_products = created, orders, "Database ready");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let credentials = OperatorCredentials::new(
                config.orders_api_username.clone(),
                config.orders_api_password.clone(),
            );
            let http_server = Server::new(config.http_port, Arc::new(service), credentials);
            http_server.start().await?;
        }
        Command::Reconcile => {
            let report = service
                .reconcile_forwarding()
                .await
                .context("Reconciliation failed")?;
            info!(
                attempted = report.attempted,
                forwarded = report.forwarded,
                failed = report.failed,
                "Reconciliation done"
            );
        }
        Command::Vouchers { file } => {
            let forwarder = forwarder
                .as_deref()
                .context("Vouchers need order forwarding to be enabled")?;
            send_vouchers(forwarder, &service, &file).await?;
        }
    }

    if let Some(forwarder) = forwarder {
        forwarder.flush_alerts().await;
    }

    info!("Application stopped");
    Ok(())
}

/// Forwards one voucher order per row of `file`; the row number is the order ID.
async fn send_vouchers<S>(forwarder: &BillbeeForwarder, service: &S, file: &Path) -> Result<()>
where
    S: OrderService,
{
    let export = File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let recipients = forwarder::read_recipients(export).context("Failed to read voucher list")?;
    let product = service
        .list_products()
        .await
        .context("Failed to load product catalog")?
        .into_iter()
        .next()
        .context("Product catalog is empty")?;

    let mut failed = 0;
    for (row, recipient) in (1..).zip(&recipients) {
        let order = recipient.to_order(row, product.id);
        match forwarder
            .forward_voucher(&order, &product, &recipient.convivium)
            .await
        {
            Ok(_) => info!(row, convivium = %recipient.convivium, "voucher forwarded"),
            Err(e) => {
                failed += 1;
                warn!(row, convivium = %recipient.convivium, error = %e, "voucher forwarding failed");
            }
        }
    }

    info!(total = recipients.len(), failed, "Vouchers done");
    Ok(())
}
