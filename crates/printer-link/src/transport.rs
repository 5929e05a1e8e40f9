//! Bluetooth RFCOMM transport.
//!
//! One [`BluetoothTransport`] owns at most one session at a time. Every
//! `connect` or `stop` bumps a generation counter and tears down the
//! previous worker; a worker only publishes state or events while its
//! generation is still current, so a superseded attempt can never
//! overwrite the outcome of a newer one.
//!
//! Events reach the single listener (the receiver returned by
//! [`BluetoothTransport::new`]) in the order they were produced, because
//! every emission happens under the session lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::radio::{DeviceHandle, Radio};
use crate::state::{LifecycleEvent, TransportState};
use crate::{PrinterLinkError, Result};

/// Default time allowed for the RFCOMM handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

const READ_BUFFER: usize = 1024;

pub struct BluetoothTransport {
    radio: Arc<dyn Radio>,
    shared: Arc<Shared>,
    handshake_timeout: Duration,
}

struct Shared {
    state: AtomicU8,
    session: Mutex<Session>,
}

/// Everything guarded by the session lock.
struct Session {
    generation: u64,
    cancel: Option<CancellationToken>,
    worker: Option<JoinHandle<()>>,
    outgoing: Option<mpsc::UnboundedSender<Vec<u8>>>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
}

impl Session {
    fn emit(&self, event: LifecycleEvent) {
        // Listener gone means nobody is observing; nothing to do.
        let _ = self.events.send(event);
    }

    /// Cancel and abort the current worker, closing its socket.
    fn tear_down(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        self.outgoing = None;
    }
}

impl Shared {
    fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Store and announce a new state. Requires the session lock.
    fn set_state(&self, session: &Session, state: TransportState) {
        self.state.store(state as u8, Ordering::Release);
        session.emit(LifecycleEvent::StateChanged(state));
    }

    /// Publish a successful handshake. Returns false for a stale generation.
    fn promote(&self, generation: u64, device_name: String) -> bool {
        let session = self.session.lock();
        if session.generation != generation {
            return false;
        }
        self.set_state(&session, TransportState::Connected);
        session.emit(LifecycleEvent::DeviceIdentified(device_name));
        true
    }

    fn deliver(&self, generation: u64, bytes: Vec<u8>) -> bool {
        let session = self.session.lock();
        if session.generation != generation {
            return false;
        }
        session.emit(LifecycleEvent::DataReceived(bytes));
        true
    }

    /// Report a failed or lost session and return to idle.
    fn fail(&self, generation: u64, message: String) {
        let mut session = self.session.lock();
        if session.generation != generation {
            tracing::debug!(generation, "Ignoring failure of superseded session: {message}");
            return;
        }
        tracing::warn!("{message}");
        session.cancel = None;
        session.worker = None;
        session.outgoing = None;
        session.emit(LifecycleEvent::TransportError(message));
        self.set_state(&session, TransportState::None);
    }
}

impl BluetoothTransport {
    /// Create an idle transport and the receiver its lifecycle events go to.
    pub fn new(
        radio: Arc<dyn Radio>,
        handshake_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state: AtomicU8::new(TransportState::None as u8),
            session: Mutex::new(Session {
                generation: 0,
                cancel: None,
                worker: None,
                outgoing: None,
                events,
            }),
        });
        (
            Self {
                radio,
                shared,
                handshake_timeout,
            },
            rx,
        )
    }

    /// Current state. Lock-free.
    pub fn state(&self) -> TransportState {
        self.shared.state()
    }

    /// Enter passive listening from idle. Any other state is left alone.
    pub fn start(&self) {
        let session = self.shared.session.lock();
        if self.shared.state() == TransportState::None {
            self.shared.set_state(&session, TransportState::Listen);
        }
    }

    /// Open a session to `device`, superseding any session or attempt in
    /// progress. Returns immediately; the outcome arrives as events.
    pub fn connect(&self, device: DeviceHandle, secure: bool) {
        let mut session = self.shared.session.lock();
        session.generation += 1;
        session.tear_down();

        let generation = session.generation;
        let cancel = CancellationToken::new();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        tracing::info!(address = %device.address, generation, secure, "Connecting");
        self.shared.set_state(&session, TransportState::Connecting);

        let worker = tokio::spawn(run_session(SessionTask {
            radio: Arc::clone(&self.radio),
            shared: Arc::clone(&self.shared),
            generation,
            device,
            secure,
            handshake_timeout: self.handshake_timeout,
            cancel: cancel.clone(),
            outgoing: outgoing_rx,
        }));

        session.cancel = Some(cancel);
        session.worker = Some(worker);
        session.outgoing = Some(outgoing_tx);
    }

    /// Tear down everything and go idle. Idempotent: an idle transport
    /// emits nothing.
    pub fn stop(&self) {
        let mut session = self.shared.session.lock();
        session.generation += 1;
        session.tear_down();
        if self.shared.state() != TransportState::None {
            tracing::info!("Stopping transport");
            self.shared.set_state(&session, TransportState::None);
        }
    }

    /// Queue bytes for the connected printer.
    pub fn write(&self, bytes: Vec<u8>) -> Result<()> {
        let session = self.shared.session.lock();
        if self.shared.state() != TransportState::Connected {
            return Err(PrinterLinkError::NotConnected);
        }
        let outgoing = session.outgoing.as_ref().ok_or(PrinterLinkError::NotConnected)?;
        outgoing
            .send(bytes)
            .map_err(|_| PrinterLinkError::NotConnected)
    }
}

impl Drop for BluetoothTransport {
    fn drop(&mut self) {
        self.shared.session.lock().tear_down();
    }
}

struct SessionTask {
    radio: Arc<dyn Radio>,
    shared: Arc<Shared>,
    generation: u64,
    device: DeviceHandle,
    secure: bool,
    handshake_timeout: Duration,
    cancel: CancellationToken,
    outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
}

async fn run_session(task: SessionTask) {
    let SessionTask {
        radio,
        shared,
        generation,
        device,
        secure,
        handshake_timeout,
        cancel,
        mut outgoing,
    } = task;

    let handshake = tokio::time::timeout(handshake_timeout, radio.open(&device, secure));
    let link = tokio::select! {
        _ = cancel.cancelled() => {
            tracing::debug!(generation, "Connection attempt cancelled");
            return;
        }
        result = handshake => match result {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => {
                shared.fail(generation, format!("Unable to connect device: {e}"));
                return;
            }
            Err(_) => {
                let err = PrinterLinkError::HandshakeTimeout(handshake_timeout.as_secs());
                shared.fail(generation, err.to_string());
                return;
            }
        }
    };

    let name = link
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| device.display_name());
    if !shared.promote(generation, name) {
        tracing::debug!(generation, "Closing link of superseded attempt");
        return;
    }
    tracing::info!(address = %device.address, "Connected");

    let (mut reader, mut writer) = tokio::io::split(link.into_stream());
    let mut buf = [0u8; READ_BUFFER];

    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break "Device connection was lost".to_string(),
                Ok(n) => {
                    tracing::trace!(bytes = n, "Received from printer");
                    if !shared.deliver(generation, buf[..n].to_vec()) {
                        return;
                    }
                }
                Err(e) => break format!("Device connection was lost: {e}"),
            },
            Some(bytes) = outgoing.recv() => {
                let written = async {
                    writer.write_all(&bytes).await?;
                    writer.flush().await
                };
                if let Err(e) = written.await {
                    break format!("Device connection was lost: {e}");
                }
                tracing::trace!(bytes = bytes.len(), "Sent to printer");
            }
        }
    };

    shared.fail(generation, reason);
}
