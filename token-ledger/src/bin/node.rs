//! Token ledger node binary
//!
//! Deploys a ledger for `TOKEN_LEDGER_DEPLOYER` and logs every notification
//! until Ctrl-C.

use anyhow::Context;
use token_ledger::{Address, Config, Ledger};
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone()));

    if config.log.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match std::env::var("TOKEN_LEDGER_CONFIG") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => Config::from_env().context("reading TOKEN_LEDGER_* variables")?,
    };

    init_tracing(&config);

    let deployer: Address = std::env::var("TOKEN_LEDGER_DEPLOYER")
        .context("TOKEN_LEDGER_DEPLOYER must name the deploying address")?
        .parse()
        .context("TOKEN_LEDGER_DEPLOYER is not a valid address")?;

    tracing::info!("Starting {} {}", config.service_name, config.service_version);

    let ledger = Ledger::deploy(deployer, config).await?;
    let mut notifications = ledger.notification_stream();

    loop {
        tokio::select! {
            Some(item) = notifications.next() => match item {
                Ok(event) => {
                    let line = serde_json::to_string(&event)?;
                    tracing::info!(target: "token_ledger::notifications", "{}", line);
                }
                Err(e) => tracing::warn!("Notification subscriber lagged: {}", e),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("{}", ledger.metrics().gather_text());
    ledger.shutdown().await?;
    Ok(())
}
