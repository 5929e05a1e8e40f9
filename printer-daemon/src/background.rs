//! Background task loops: printer status monitor, automatic status back.

use std::time::Duration;

use printer_link::protocol::encode_auto_status_back;
use printer_link::{ConnectionState, PrinterStatus};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::app::SharedState;

async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => true,
        _ = sleep(duration) => false,
    }
}

/// Poll the printer status while connected and log every change.
pub async fn status_monitor_loop(state: SharedState) {
    let Some(interval) = state.config().status_poll_interval else {
        tracing::info!("Status monitor disabled");
        return;
    };
    let shutdown_token = state.shutdown_token().clone();
    let manager = state.manager().clone();
    let mut last: Option<PrinterStatus> = None;

    loop {
        if sleep_or_cancel(&shutdown_token, interval).await {
            tracing::info!("Status monitor stopped (shutdown)");
            return;
        }
        if !manager.is_connected() {
            last = None;
            continue;
        }

        match manager.request_status().await {
            Ok(status) if last != Some(status) => {
                tracing::info!(raw = status.raw, "Printer status: {}", status.description());
                if let Err(e) = status.readiness() {
                    tracing::warn!("{e}");
                }
                last = Some(status);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Status poll skipped/failed: {e}"),
        }
    }
}

/// Turn on automatic status back each time a connection comes up.
pub async fn auto_status_back_loop(state: SharedState) {
    if !state.config().auto_status_back {
        return;
    }
    let shutdown_token = state.shutdown_token().clone();
    let manager = state.manager().clone();
    let mut connection = manager.subscribe_state();

    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                tracing::info!("Auto status back loop stopped (shutdown)");
                return;
            }
            changed = connection.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }

        if *connection.borrow_and_update() != ConnectionState::Connected {
            continue;
        }
        match manager.send(&encode_auto_status_back(true)) {
            Ok(()) => tracing::debug!("Automatic status back enabled"),
            Err(e) => tracing::warn!("Failed to enable automatic status back: {e}"),
        }
    }
}
