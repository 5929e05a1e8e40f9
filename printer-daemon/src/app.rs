use std::path::PathBuf;
use std::sync::Arc;

use printer_link::{PrinterManager, PrinterTargetSource};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;

/// Daemon state shared by the signal handlers and background loops.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

struct SharedStateInner {
    manager: PrinterManager,
    /// Where the active printer is looked up (`printer.csv`).
    targets: Arc<dyn PrinterTargetSource>,
    config: AppConfig,
    data_dir: PathBuf,
    shutdown: CancellationToken,
}

impl SharedState {
    pub fn new(
        manager: PrinterManager,
        targets: Arc<dyn PrinterTargetSource>,
        config: AppConfig,
        data_dir: PathBuf,
    ) -> Self {
        Self {
            inner: Arc::new(SharedStateInner {
                manager,
                targets,
                config,
                data_dir,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn manager(&self) -> &PrinterManager {
        &self.inner.manager
    }

    pub fn targets(&self) -> &Arc<dyn PrinterTargetSource> {
        &self.inner.targets
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.inner.data_dir
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use async_trait::async_trait;
    use printer_link::{
        BtAddress, DeviceHandle, Link, ManagerSettings, PrinterLinkError, PrinterTarget, Radio,
    };

    use super::*;

    /// Radio with Bluetooth switched off.
    pub struct OffRadio;

    #[async_trait]
    impl Radio for OffRadio {
        async fn is_enabled(&self) -> bool {
            false
        }

        async fn resolve(&self, address: BtAddress) -> printer_link::Result<DeviceHandle> {
            Err(PrinterLinkError::Resolution(address.to_string()))
        }

        async fn open(&self, _device: &DeviceHandle, _secure: bool) -> printer_link::Result<Link> {
            Err(PrinterLinkError::BluetoothDisabled)
        }
    }

    pub struct FixedTarget(pub Option<PrinterTarget>);

    #[async_trait]
    impl PrinterTargetSource for FixedTarget {
        async fn active_printer(&self) -> Option<PrinterTarget> {
            self.0.clone()
        }
    }

    pub fn state_with(config: AppConfig, target: Option<PrinterTarget>) -> SharedState {
        let manager = PrinterManager::new(
            Arc::new(OffRadio),
            Arc::new(FixedTarget(target.clone())),
            ManagerSettings::default(),
        );
        SharedState::new(
            manager,
            Arc::new(FixedTarget(target)),
            config,
            PathBuf::from("/tmp"),
        )
    }

    pub fn default_state() -> SharedState {
        state_with(AppConfig::with_data_dir(Path::new("/tmp")), None)
    }
}
