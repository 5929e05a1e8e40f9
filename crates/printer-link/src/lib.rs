//! Woosim receipt printer link over Bluetooth RFCOMM.
//!
//! Provides the ESC/POS command/status codec, a supervised Bluetooth
//! transport with stale-attempt suppression, and the [`PrinterManager`]
//! that turns transport lifecycle events into an observable connection state.

pub mod address;
pub mod manager;
pub mod protocol;
pub mod radio;
mod reconnect;
pub mod state;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use address::BtAddress;
pub use manager::{ManagerSettings, PrinterManager, PrinterTarget, PrinterTargetSource};
pub use protocol::{Command, CommandBuffer, PrinterStatus, StatusFlags, TextStyle};
pub use radio::{DeviceHandle, Link, Radio};
pub use state::{ConnectionState, LifecycleEvent, TransportState};
pub use transport::BluetoothTransport;

/// Errors that can occur during printer link operations.
#[derive(Debug, thiserror::Error)]
pub enum PrinterLinkError {
    #[error("No active printer configured")]
    ConfigurationAbsent,

    #[error("Bluetooth is not enabled")]
    BluetoothDisabled,

    #[error("Could not resolve printer {0}")]
    Resolution(String),

    #[error("Invalid Bluetooth address: {0}")]
    InvalidAddress(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Handshake timeout after {0} seconds")]
    HandshakeTimeout(u64),

    #[error("Not connected to any printer")]
    NotConnected,

    #[error("Magnification out of range 1..=16: width {width}, height {height}")]
    InvalidMagnification { width: u8, height: u8 },

    #[error("Invalid alignment value {0} (expected 0, 1 or 2)")]
    InvalidAlignment(u8),

    #[error("No status reply within {0} ms")]
    StatusTimeout(u64),

    #[error("Printer not ready: {0}")]
    NotReady(String),

    #[error("Bluetooth adapter error: {0}")]
    Radio(String),
}

/// Result type alias for printer link operations.
pub type Result<T> = std::result::Result<T, PrinterLinkError>;
