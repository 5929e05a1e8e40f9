//! Host Bluetooth stack seam.
//!
//! A [`Radio`] answers three questions for the link layer: is Bluetooth
//! usable, which device does an address name, and how is an RFCOMM byte
//! stream opened to it. Backends:
//!
//! - [`tty::RfcommTtyRadio`]: kernel-bound `/dev/rfcommN` nodes (Unix)
//! - [`bluez::BluezRadio`]: BlueZ over D-Bus (feature `bluez`)

#[cfg(feature = "bluez")]
pub mod bluez;
#[cfg(unix)]
pub mod tty;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{BtAddress, Result};

/// Standard RFCOMM channel for the Serial Port Profile.
pub const SPP_CHANNEL: u8 = 1;

/// A device an address resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub address: BtAddress,
    /// Advertised name, when the stack knows it.
    pub name: Option<String>,
    /// Device node for tty-bound links.
    pub node: Option<PathBuf>,
}

impl DeviceHandle {
    pub fn new(address: BtAddress) -> Self {
        Self {
            address,
            name: None,
            node: None,
        }
    }

    /// Name to report for this device: advertised name or the address.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.address.to_string())
    }
}

/// Any bidirectional byte stream a link can run over.
pub trait LinkStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> LinkStream for T {}

/// An open RFCOMM session.
pub struct Link {
    stream: Box<dyn LinkStream>,
    name: Option<String>,
}

impl Link {
    pub fn new(stream: impl LinkStream + 'static, name: Option<String>) -> Self {
        Self {
            stream: Box::new(stream),
            name,
        }
    }

    /// Name the remote device reported during the handshake, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn into_stream(self) -> Box<dyn LinkStream> {
        self.stream
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").field("name", &self.name).finish()
    }
}

/// Host Bluetooth stack operations used by the transport and the manager.
#[async_trait]
pub trait Radio: Send + Sync + 'static {
    /// Whether an adapter is present and powered.
    async fn is_enabled(&self) -> bool;

    /// Resolve an address to a connectable device.
    async fn resolve(&self, address: BtAddress) -> Result<DeviceHandle>;

    /// Open an RFCOMM stream. This is the blocking handshake; dropping the
    /// returned future or the [`Link`] closes the socket.
    async fn open(&self, device: &DeviceHandle, secure: bool) -> Result<Link>;
}
