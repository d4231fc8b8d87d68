mod error;
mod adapters;
mod execution;
mod funding;
mod ledger;
mod settlement;
mod bootstrap;
mod config;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing::info;

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,payouts=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("🚀 Starting deposit payout agent");

    // Load configuration
    dotenv::dotenv().ok();
    let config = config::Config::load()?;

    let service = bootstrap::initialize(config)?;
    let handles = service.start();

    // Wait for signal to exit. Payouts in flight are dropped with their debits.
    tokio::signal::ctrl_c().await?;
    handles.abort();

    for deposit in service.ledger.snapshot() {
        info!("💼 {}", deposit);
    }
    info!("👋 Shutting down");

    Ok(())
}
