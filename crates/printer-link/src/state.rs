//! Connection states and transport lifecycle events.

use std::fmt;

/// Simplified connection state exposed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Fine-grained transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TransportState {
    /// Idle, no socket.
    #[default]
    None = 0,
    /// Passive listening. Not used for outbound printing.
    Listen = 1,
    /// Handshake in progress.
    Connecting = 2,
    /// Bidirectional stream open.
    Connected = 3,
}

impl TransportState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Listen,
            2 => Self::Connecting,
            3 => Self::Connected,
            _ => Self::None,
        }
    }
}

impl From<TransportState> for ConnectionState {
    fn from(state: TransportState) -> Self {
        match state {
            TransportState::None | TransportState::Listen => Self::Disconnected,
            TransportState::Connecting => Self::Connecting,
            TransportState::Connected => Self::Connected,
        }
    }
}

/// Events emitted by a [`BluetoothTransport`](crate::BluetoothTransport),
/// delivered in order to its single listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    StateChanged(TransportState),
    /// Advertised name of the device a session was opened with.
    DeviceIdentified(String),
    TransportError(String),
    /// Bytes read from the printer.
    DataReceived(Vec<u8>),
}
