//! Runtime configuration loaded from the environment (and `.env`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::bail;
use printer_link::ManagerSettings;

use super::defaults::get_default;
use super::validation::validate_setting;

const PRINTER_CSV_FILE: &str = "printer.csv";

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub printer_csv: PathBuf,
    pub reconnect_delay: Duration,
    pub handshake_timeout: Duration,
    pub status_timeout: Duration,
    /// `None` disables the status monitor.
    pub status_poll_interval: Option<Duration>,
    pub secure_rfcomm: bool,
    pub rfcomm_channel: u8,
    pub auto_status_back: bool,
}

impl AppConfig {
    /// Defaults with `printer.csv` inside `data_dir`.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            printer_csv: data_dir.join(PRINTER_CSV_FILE),
            reconnect_delay: Duration::from_millis(1000),
            handshake_timeout: Duration::from_secs(20),
            status_timeout: Duration::from_millis(500),
            status_poll_interval: Some(Duration::from_secs(5)),
            secure_rfcomm: false,
            rfcomm_channel: 1,
            auto_status_back: false,
        }
    }

    /// Load from process environment variables.
    pub fn load(data_dir: &Path) -> Result<Self, anyhow::Error> {
        Self::from_lookup(data_dir, |key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup. Invalid values are logged and
    /// replaced by their defaults.
    pub fn from_lookup(
        data_dir: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, anyhow::Error> {
        let g = |key: &str| -> String {
            let fallback = get_default(key).unwrap_or_default().to_string();
            let Some(value) = lookup(key).map(|v| v.trim().to_string()) else {
                return fallback;
            };
            if value.is_empty() {
                return fallback;
            }
            match validate_setting(key, &value) {
                Ok(()) => value,
                Err(reason) => {
                    tracing::warn!(key, value = %value, "Invalid setting ({reason}), using default");
                    fallback
                }
            }
        };

        let defaults = Self::with_data_dir(data_dir);

        let printer_csv = match g("PRINTER_CSV") {
            path if path.is_empty() => defaults.printer_csv,
            path => PathBuf::from(path),
        };
        if printer_csv.is_dir() {
            bail!("PRINTER_CSV points to a directory: {}", printer_csv.display());
        }

        let poll_secs = parse_u64(&g("STATUS_POLL_INTERVAL_SECS"), 5);

        Ok(Self {
            printer_csv,
            reconnect_delay: Duration::from_millis(parse_u64(&g("RECONNECT_DELAY_MS"), 1000)),
            handshake_timeout: Duration::from_secs(parse_u64(&g("HANDSHAKE_TIMEOUT_SECS"), 20)),
            status_timeout: Duration::from_millis(parse_u64(&g("STATUS_TIMEOUT_MS"), 500)),
            status_poll_interval: (poll_secs > 0).then(|| Duration::from_secs(poll_secs)),
            secure_rfcomm: g("SECURE_RFCOMM") == "true",
            rfcomm_channel: g("RFCOMM_CHANNEL").parse().unwrap_or(defaults.rfcomm_channel),
            auto_status_back: g("AUTO_STATUS_BACK") == "true",
        })
    }

    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            settle_delay: self.reconnect_delay,
            handshake_timeout: self.handshake_timeout,
            status_timeout: self.status_timeout,
            secure: self.secure_rfcomm,
        }
    }
}

fn parse_u64(value: &str, default: u64) -> u64 {
    value.parse().unwrap_or(default)
}
