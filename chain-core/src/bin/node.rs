//! Chain node binary

use anyhow::Context;
use chain_core::{spawn_ledger_actor, Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        batch_limit = config.batching.batch_limit,
        "Starting chain node"
    );

    let ledger = Ledger::from_config(&config).context("Failed to build ledger")?;
    if !ledger.is_valid() {
        tracing::warn!("No genesis balances configured; all submissions will be rejected");
    }

    let handle = spawn_ledger_actor(ledger, config.actor.mailbox_capacity);
    let genesis = handle.last_block().await?;
    tracing::info!(genesis_hash = %genesis.hash(), "Ledger ready");

    tokio::signal::ctrl_c().await?;

    let ledger = handle.shutdown().await?;
    let findings = ledger.audit();
    for finding in &findings {
        tracing::error!(%finding, "Chain audit finding");
    }

    tracing::info!(
        height = ledger.height(),
        pending = ledger.pending().len(),
        accepted = ledger.metrics().transactions_accepted.get(),
        rejected = ledger.metrics().transactions_rejected.get(),
        "Shutting down chain node"
    );
    Ok(())
}
