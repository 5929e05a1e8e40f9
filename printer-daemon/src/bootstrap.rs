use std::path::PathBuf;
use std::sync::Arc;

use printer_link::{PrinterManager, Radio};

use crate::app::SharedState;
use crate::config::{AppConfig, PrinterCsv};

/// Foundation init: `.env`, data directory, configuration, radio, manager.
pub async fn init_foundation() -> Result<SharedState, anyhow::Error> {
    load_dotenv();
    let dir = data_dir();
    std::fs::create_dir_all(&dir)?;

    let config = AppConfig::load(&dir)?;
    let targets = Arc::new(PrinterCsv::new(config.printer_csv.clone()));
    tracing::info!(
        printer_csv = %targets.path().display(),
        channel = config.rfcomm_channel,
        secure = config.secure_rfcomm,
        "Configuration loaded"
    );

    let radio = build_radio(&config).await?;
    let manager = PrinterManager::new(radio, targets.clone(), config.manager_settings());

    Ok(SharedState::new(manager, targets, config, dir))
}

#[cfg(feature = "bluez")]
async fn build_radio(config: &AppConfig) -> Result<Arc<dyn Radio>, anyhow::Error> {
    use printer_link::radio::bluez::BluezRadio;

    tracing::info!("Using BlueZ radio backend");
    Ok(Arc::new(BluezRadio::new(config.rfcomm_channel).await?))
}

#[cfg(all(unix, not(feature = "bluez")))]
async fn build_radio(config: &AppConfig) -> Result<Arc<dyn Radio>, anyhow::Error> {
    use printer_link::radio::tty::RfcommTtyRadio;

    tracing::info!(
        channel = config.rfcomm_channel,
        "Using rfcomm tty radio backend (channel is set by `rfcomm bind`)"
    );
    Ok(Arc::new(RfcommTtyRadio::new()))
}

#[cfg(not(any(unix, feature = "bluez")))]
async fn build_radio(_config: &AppConfig) -> Result<Arc<dyn Radio>, anyhow::Error> {
    anyhow::bail!("no Bluetooth backend available on this platform")
}

fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("METER_PRINTER_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("meter-printer")
}

/// Load .env from multiple candidate paths.
fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}
