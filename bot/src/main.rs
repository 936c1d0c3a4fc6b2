use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use shared::{Config, MarketFeed, OkxClient};
use swap_engine::exchange::MarketApi;
use swap_engine::observer::TracingObserver;
use swap_engine::runner::{StrategyHandle, StrategyLoop};

mod commands;

use commands::Command;

async fn read_commands(handle: StrategyHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let cancel = handle.cancellation_token();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match line.parse::<Command>() {
                Ok(command) => {
                    if !commands::execute(command, &handle) {
                        return;
                    }
                }
                Err(e) => tracing::warn!("{}", e),
            },
            // stdin closed; keep running until ctrl-c
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Failed to read stdin: {}", e);
                return;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting swap strategy bot, {}", commands::version());

    let config = Config::from_env().context("loading configuration")?;
    tracing::info!(
        inst_id = %config.strategy.inst_id,
        simulated = config.simulated,
        rest_url = %config.rest_url,
        "Configuration loaded"
    );

    let client = Arc::new(OkxClient::new(&config).context("building OKX client")?);
    let instrument = client
        .get_symbol_info(&config.strategy.inst_id)
        .await
        .with_context(|| format!("fetching instrument {}", config.strategy.inst_id))?;
    tracing::info!(?instrument, "Instrument loaded");

    let (tx, rx) = mpsc::channel(config.event_queue_capacity);
    let (strategy, handle) = StrategyLoop::new(
        config.strategy.clone(),
        config.risk.clone(),
        client.clone(),
        client,
        Arc::new(TracingObserver),
        rx,
    )?;
    let strategy = strategy.with_instrument(instrument);

    let cancel = handle.cancellation_token();
    let feed = tokio::spawn(MarketFeed::new(&config, tx).run(cancel.clone()));
    let strategy = tokio::spawn(strategy.run());
    tokio::spawn(read_commands(handle.clone()));

    tracing::info!("{}", commands::HELP);
    tokio::select! {
        _ = cancel.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!("Failed to listen for ctrl-c: {}", e);
            }
            tracing::info!("Ctrl-C received, stopping");
            handle.stop();
        }
    }

    let state = strategy.await.context("strategy task panicked")?;
    feed.await.context("feed task panicked")?;

    tracing::info!(
        trades = state.trades_total,
        open_positions = state.positions.len(),
        pending_orders = state.pending.len(),
        "Shutdown complete"
    );
    Ok(())
}
