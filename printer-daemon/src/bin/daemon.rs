//! Printer daemon binary.
//!
//! Connects to the printer named in `printer.csv`, runs the background loops
//! and handles signals:
//!
//! - `SIGHUP`: reconnect (re-reads `printer.csv`)
//! - `SIGUSR1`: print a test page
//! - `Ctrl+C` / `SIGTERM`: graceful shutdown

use tracing_subscriber::EnvFilter;

use printer_daemon::app::SharedState;
use printer_daemon::background;
use printer_daemon::services::test_page;
use printer_daemon::shutdown::graceful_shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting printer daemon");

    let state = printer_daemon::init_foundation().await?;
    tracing::info!(data_dir = %state.data_dir().display(), "Data directory ready");

    let manager = state.manager();
    manager.initialize_printer_services().await;
    manager.auto_connect_printer().await;

    let s = state.clone();
    tokio::spawn(async move { background::status_monitor_loop(s).await });

    let s = state.clone();
    tokio::spawn(async move { background::auto_status_back_loop(s).await });

    tracing::info!("Printer daemon running. Press Ctrl+C to stop.");
    wait_for_shutdown(&state).await?;

    graceful_shutdown(&state).await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown(state: &SharedState) -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut user1 = signal(SignalKind::user_defined1())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Shutting down...");
                return Ok(());
            }
            _ = terminate.recv() => {
                tracing::info!("SIGTERM received, shutting down...");
                return Ok(());
            }
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received, reconnecting printer");
                state.manager().reconnect_printer();
            }
            _ = user1.recv() => {
                let s = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = test_page::print_test_page(&s).await {
                        tracing::error!("Test page failed: {e}");
                    }
                });
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_state: &SharedState) -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    Ok(())
}
