//! Printer connection supervisor.
//!
//! [`PrinterManager`] owns the process-wide [`BluetoothTransport`], turns its
//! lifecycle events into an observable [`ConnectionState`] plus user-facing
//! notices, and exposes connect / disconnect / reconnect. Failures never
//! propagate out of the connection operations; they surface as notices.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};

use crate::protocol::{Command, PrinterStatus, encode_request_status};
use crate::radio::Radio;
use crate::reconnect::{DEFAULT_SETTLE_DELAY, ReconnectTimer};
use crate::state::{ConnectionState, LifecycleEvent, TransportState};
use crate::transport::{BluetoothTransport, DEFAULT_HANDSHAKE_TIMEOUT};
use crate::{BtAddress, PrinterLinkError, Result};

const NOTICE_CAPACITY: usize = 32;

pub const NOTICE_CONNECTED: &str = "Printer connected";
pub const NOTICE_NO_ADDRESS: &str = "No printer address found";
pub const NOTICE_BLUETOOTH_DISABLED: &str = "Bluetooth is not enabled";

/// The printer selected for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterTarget {
    pub mac_address: String,
    pub display_model: Option<String>,
}

/// Where the active printer comes from. Consulted on every connect so
/// configuration changes take effect without restarting.
#[async_trait]
pub trait PrinterTargetSource: Send + Sync + 'static {
    async fn active_printer(&self) -> Option<PrinterTarget>;
}

/// Timing and security knobs.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Pause between disconnect and reconnect.
    pub settle_delay: Duration,
    pub handshake_timeout: Duration,
    /// How long to wait for a status reply.
    pub status_timeout: Duration,
    /// Request an authenticated RFCOMM link.
    pub secure: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            status_timeout: Duration::from_millis(500),
            secure: false,
        }
    }
}

/// Cheaply clonable handle; all clones share one transport.
#[derive(Clone)]
pub struct PrinterManager {
    inner: Arc<Inner>,
}

struct Inner {
    radio: Arc<dyn Radio>,
    targets: Arc<dyn PrinterTargetSource>,
    settings: ManagerSettings,
    transport: Mutex<Option<Arc<BluetoothTransport>>>,
    /// Bumped whenever the transport is created or released; events from an
    /// older transport are dropped.
    epoch: AtomicU64,
    reconnect: ReconnectTimer,
    state: watch::Sender<ConnectionState>,
    status: watch::Sender<Option<PrinterStatus>>,
    notices: broadcast::Sender<String>,
    latest_notice: Mutex<Option<String>>,
}

impl PrinterManager {
    pub fn new(
        radio: Arc<dyn Radio>,
        targets: Arc<dyn PrinterTargetSource>,
        settings: ManagerSettings,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (status, _) = watch::channel(None);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                radio,
                targets,
                settings,
                transport: Mutex::new(None),
                epoch: AtomicU64::new(0),
                reconnect: ReconnectTimer::default(),
                state,
                status,
                notices,
                latest_notice: Mutex::new(None),
            }),
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.inner.settings
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create the transport if needed, or restart listening on an idle one.
    pub async fn initialize_printer_services(&self) {
        if !self.inner.radio.is_enabled().await {
            self.inner.notify(NOTICE_BLUETOOTH_DISABLED);
            return;
        }

        let mut slot = self.inner.transport.lock();
        match slot.as_ref() {
            Some(transport) => {
                if transport.state() == TransportState::None {
                    tracing::debug!("Restarting idle transport");
                    transport.start();
                }
            }
            None => *slot = Some(self.inner.create_transport()),
        }
    }

    /// Connect to whichever printer the target source names.
    pub async fn auto_connect_printer(&self) {
        self.inner.reconnect.cancel();
        self.auto_connect().await;
    }

    async fn auto_connect(&self) {
        match self.inner.targets.active_printer().await {
            Some(target) => {
                tracing::info!(
                    address = %target.mac_address,
                    model = target.display_model.as_deref().unwrap_or("unknown"),
                    "Auto-connecting to active printer"
                );
                self.connect(&target.mac_address).await;
            }
            None => {
                tracing::warn!("{}", PrinterLinkError::ConfigurationAbsent);
                self.inner.notify(NOTICE_NO_ADDRESS);
            }
        }
    }

    /// Connect to `address` (`XX:XX:XX:XX:XX:XX`), superseding any session.
    pub async fn connect_to_printer(&self, address: &str) {
        self.inner.reconnect.cancel();
        self.connect(address).await;
    }

    async fn connect(&self, address: &str) {
        if !self.inner.radio.is_enabled().await {
            self.inner.notify(NOTICE_BLUETOOTH_DISABLED);
            return;
        }
        if let Err(e) = self.try_connect(address).await {
            tracing::error!(address, "Connect failed: {e}");
            self.inner.notify(format!("Failed to connect to printer: {e}"));
        }
    }

    async fn try_connect(&self, address: &str) -> Result<()> {
        let address: BtAddress = address.parse()?;
        let device = self.inner.radio.resolve(address).await?;
        let transport = self.inner.transport_or_create();
        transport.connect(device, self.inner.settings.secure);
        Ok(())
    }

    /// Stop the transport and cancel any pending reconnect.
    pub fn disconnect_printer(&self) {
        self.inner.reconnect.cancel();
        if let Some(transport) = self.inner.current_transport() {
            transport.stop();
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Disconnect, wait for the settle delay, then auto-connect. A newer
    /// connect or disconnect cancels the pending attempt.
    pub fn reconnect_printer(&self) {
        tracing::info!("Reconnecting printer");
        self.disconnect_printer();

        let manager = self.clone();
        let delay = self.inner.settings.settle_delay;
        self.inner.reconnect.schedule(move |ticket| {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if !manager.inner.reconnect.disarm(ticket) {
                    return;
                }
                manager.auto_connect().await;
            })
        });
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .current_transport()
            .is_some_and(|t| t.state() == TransportState::Connected)
    }

    /// Stop and release the transport. Safe to call repeatedly.
    pub fn cleanup(&self) {
        self.inner.reconnect.cancel();
        let released = self.inner.transport.lock().take();
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(transport) = released {
            tracing::info!("Releasing printer transport");
            transport.stop();
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }

    // =========================================================================
    // Printing
    // =========================================================================

    /// Write an encoded command to the connected printer.
    pub fn send(&self, command: &Command) -> Result<()> {
        let transport = self
            .inner
            .current_transport()
            .ok_or(PrinterLinkError::NotConnected)?;
        transport.write(command.as_bytes().to_vec())
    }

    /// Poll the printer and wait for its status byte.
    pub async fn request_status(&self) -> Result<PrinterStatus> {
        let mut replies = self.inner.status.subscribe();
        self.send(&encode_request_status())?;

        let timeout = self.inner.settings.status_timeout;
        match tokio::time::timeout(timeout, replies.changed()).await {
            Ok(Ok(())) => {
                let status = *replies.borrow_and_update();
                status.ok_or(PrinterLinkError::NotConnected)
            }
            Ok(Err(_)) => Err(PrinterLinkError::NotConnected),
            Err(_) => Err(PrinterLinkError::StatusTimeout(timeout.as_millis() as u64)),
        }
    }

    /// Poll the status and fail unless paper is loaded and the cover closed.
    pub async fn ensure_ready(&self) -> Result<PrinterStatus> {
        let status = self.request_status().await?;
        status.readiness()?;
        Ok(status)
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Most recent notice, if any was ever raised.
    pub fn latest_notice(&self) -> Option<String> {
        self.inner.latest_notice.lock().clone()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<String> {
        self.inner.notices.subscribe()
    }

    /// Last status byte the printer reported, decoded.
    pub fn latest_status(&self) -> Option<PrinterStatus> {
        *self.inner.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Option<PrinterStatus>> {
        self.inner.status.subscribe()
    }
}

impl Inner {
    fn current_transport(&self) -> Option<Arc<BluetoothTransport>> {
        self.transport.lock().clone()
    }

    fn transport_or_create(self: &Arc<Self>) -> Arc<BluetoothTransport> {
        let mut slot = self.transport.lock();
        slot.get_or_insert_with(|| self.create_transport()).clone()
    }

    /// Build a transport and start pumping its events. Callers store the
    /// result in `self.transport` while holding that lock.
    fn create_transport(self: &Arc<Self>) -> Arc<BluetoothTransport> {
        let (transport, events) =
            BluetoothTransport::new(Arc::clone(&self.radio), self.settings.handshake_timeout);
        let transport = Arc::new(transport);
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(epoch, "Created printer transport");
        tokio::spawn(pump_events(
            Arc::downgrade(self),
            epoch,
            Arc::downgrade(&transport),
            events,
        ));
        transport
    }

    fn handle_event(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::StateChanged(TransportState::Connected) => {
                self.set_state(ConnectionState::Connected);
                self.notify(NOTICE_CONNECTED);
            }
            LifecycleEvent::StateChanged(state) => self.set_state(state.into()),
            LifecycleEvent::DeviceIdentified(name) => {
                self.notify(format!("Connected to {name}"));
            }
            LifecycleEvent::TransportError(message) => {
                self.notify(message);
                self.set_state(ConnectionState::Disconnected);
            }
            LifecycleEvent::DataReceived(bytes) => {
                for byte in bytes {
                    let status = PrinterStatus::from_byte(byte);
                    tracing::debug!(raw = byte, "Printer status: {}", status.description());
                    self.status.send_replace(Some(status));
                }
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            tracing::info!(from = %current, to = %state, "Printer connection state");
            *current = state;
            true
        });
    }

    fn notify(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(notice = %message);
        *self.latest_notice.lock() = Some(message.clone());
        // No subscribers is fine; latest_notice keeps the value.
        let _ = self.notices.send(message);
    }
}

async fn pump_events(
    inner: Weak<Inner>,
    epoch: u64,
    transport: Weak<BluetoothTransport>,
    mut events: mpsc::UnboundedReceiver<LifecycleEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!(epoch, ?event, "Dropping event from released transport");
            continue;
        }
        let current = transport
            .upgrade()
            .map_or(TransportState::None, |t| t.state());
        if is_outdated(&event, current) {
            tracing::debug!(?event, ?current, "Dropping event from a finished session");
            continue;
        }
        inner.handle_event(event);
    }
}

/// Events queued before a stop or a newer connect announce a session the
/// transport has already left. Errors and idle transitions always apply.
fn is_outdated(event: &LifecycleEvent, current: TransportState) -> bool {
    match event {
        LifecycleEvent::StateChanged(TransportState::Connecting) => {
            matches!(current, TransportState::None | TransportState::Listen)
        }
        LifecycleEvent::StateChanged(TransportState::Connected)
        | LifecycleEvent::DeviceIdentified(_)
        | LifecycleEvent::DataReceived(_) => current != TransportState::Connected,
        _ => false,
    }
}
