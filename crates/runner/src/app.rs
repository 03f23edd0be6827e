//! Run modes shared by the binaries

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use hermes_gateway::GatewayFactory;
use hermes_registry::ExchangeFilter;
use hermes_session::{SessionError, ShutdownSignal};
use hermes_storage::{BackendKind, StorageError, open_reader};
use log::{error, info, warn};
use tokio::task::JoinHandle;

use crate::bootstrap::Bootstrap;

/// Records printed by the query tool unless told otherwise
pub const DEFAULT_QUERY_LIMIT: usize = 10;

/// Turn SIGINT/SIGTERM (ctrl-c elsewhere) into a shutdown request
pub fn install_signal_handlers(shutdown: ShutdownSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            received = wait_for_signal() => match received {
                Ok(name) => {
                    info!("Received {name}");
                    shutdown.trigger(format!("{name} received"));
                }
                Err(e) => error!("Failed to install signal handlers: {e}"),
            },
            _ = shutdown.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

/// Idle until shutdown is requested, or `run_for` elapses
pub async fn wait_for_shutdown(shutdown: &ShutdownSignal, run_for: Option<Duration>) {
    match run_for {
        Some(limit) => {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(limit) => {
                    shutdown.trigger(format!("run time of {limit:?} elapsed"));
                }
            }
        }
        None => shutdown.cancelled().await,
    }
}

/// Capture market data until shutdown
pub async fn run_market_data(
    bootstrap: &Bootstrap,
    factory: &dyn GatewayFactory,
    filter: ExchangeFilter,
    shutdown: ShutdownSignal,
    run_for: Option<Duration>,
) -> Result<(), SessionError> {
    let session = bootstrap.market_data_session(factory, filter, shutdown.clone())?;
    if let Err(e) = session.start().await {
        session.stop().await;
        return Err(e);
    }
    info!(
        "Collecting {} instruments into {}",
        session.subscribed_instruments().len(),
        bootstrap.settings().storage().backend_dir().display()
    );

    wait_for_shutdown(&shutdown, run_for).await;
    session.stop().await;

    let md = session.variant();
    info!("Received {} ticks, dropped {}", md.ticks(), md.dropped());
    for (exchange, stats) in md.collector_stats() {
        info!(
            "{exchange}: {} written in {} flushes, {} rejected, {} failed flushes",
            stats.written, stats.flushes, stats.rejected, stats.failed_flushes
        );
    }
    Ok(())
}

/// Log in, query positions, then idle until shutdown
pub async fn run_trade(
    bootstrap: &Bootstrap,
    factory: &dyn GatewayFactory,
    shutdown: ShutdownSignal,
    run_for: Option<Duration>,
) -> Result<(), SessionError> {
    let session = bootstrap.trade_session(factory, shutdown.clone())?;
    if let Err(e) = session.start().await {
        session.stop().await;
        return Err(e);
    }

    match session.query_position("").await {
        Ok(positions) => {
            info!("Trade session ready, {} open positions", positions.len());
            for p in &positions {
                info!(
                    "  {} {} direction {} position {} (yd {}, today {})",
                    p.exchange_id, p.instrument_id, p.posi_direction, p.position, p.yd_position, p.today_position
                );
            }
        }
        Err(e) if e.is_fatal() => {
            session.stop().await;
            return Err(e);
        }
        Err(e) => warn!("Position query failed: {e}"),
    }

    wait_for_shutdown(&shutdown, run_for).await;
    session.stop().await;
    Ok(())
}

/// List tables of a container, or print the last `limit` records of one
/// table as JSON lines
pub fn run_query(
    kind: BackendKind,
    dir: &Path,
    container: &str,
    table: Option<&str>,
    limit: usize,
    out: &mut dyn Write,
) -> Result<usize, StorageError> {
    let mut reader = open_reader(kind, dir, container)?;
    let printed = match table {
        None => {
            let tables = reader.list_tables()?;
            for name in &tables {
                writeln!(out, "{name}")?;
            }
            tables.len()
        }
        Some(table) => {
            let records = reader.load(table, Some(limit))?;
            for record in &records {
                let line = serde_json::to_string(record).map_err(std::io::Error::other)?;
                writeln!(out, "{line}")?;
            }
            records.len()
        }
    };
    reader.close()?;
    Ok(printed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_run_for_triggers_shutdown() {
        let shutdown = ShutdownSignal::new();
        wait_for_shutdown(&shutdown, Some(Duration::from_secs(30))).await;
        assert!(shutdown.is_triggered());
        assert!(shutdown.reason().unwrap().contains("30s"));
    }

    #[tokio::test]
    async fn test_wait_returns_on_external_shutdown() {
        let shutdown = ShutdownSignal::new();
        shutdown.trigger("operator");
        wait_for_shutdown(&shutdown, None).await;
        assert_eq!(shutdown.reason(), Some("operator"));
    }
}
