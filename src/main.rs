use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use hivera_bot::client::HttpClientFactory;
use hivera_bot::config::BotConfig;
use hivera_bot::error::InputError;
use hivera_bot::input::{load_lines, load_proxies};
use hivera_bot::worker::CycleDriver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    run().await.context("Hivera bot stopped with an error")
}

async fn run() -> hivera_bot::error::Result<()> {
    let config = Arc::new(BotConfig::from_env()?);
    let Some(mut driver) = prepare(config).await? else {
        return Ok(());
    };

    // First Ctrl-C lets the current cycle finish; the second exits at once.
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, finishing current cycle (Ctrl-C again to force)");
            signal.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Forced shutdown");
            std::process::exit(130);
        }
    });

    driver.run_forever(shutdown).await;
    Ok(())
}

/// Load inputs and build the driver. `None` means there is nothing to run,
/// which is logged and is not an error.
async fn prepare(config: Arc<BotConfig>) -> hivera_bot::error::Result<Option<CycleDriver>> {
    let accounts = load_lines(&config.data_file).await;
    let proxies = load_proxies(&config.proxy_file).await;

    let factory = Arc::new(HttpClientFactory::new(Arc::clone(&config)));
    let account_count = accounts.len();
    let proxy_count = proxies.len();
    let driver = match CycleDriver::new(Arc::clone(&config), factory, accounts, proxies) {
        Ok(driver) => driver,
        Err(InputError::NoAccounts { path }) => {
            tracing::error!(path = %path, "No user data found in the file.");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    if proxy_count == 0 {
        tracing::warn!("No proxies found in the file. Proceeding without proxies.");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.base_url,
        accounts = account_count,
        proxies = proxy_count,
        auto_task = config.auto_task,
        max_concurrent = config.max_concurrent,
        isolation = ?config.isolation,
        cycle_minutes = config.cycle_interval.as_secs() / 60,
        "Hivera bot starting"
    );

    Ok(Some(driver))
}
