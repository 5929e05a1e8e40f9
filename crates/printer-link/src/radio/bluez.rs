//! BlueZ backend: RFCOMM client sockets through `bluer`.

use async_trait::async_trait;
use bluer::rfcomm::{Security, SecurityLevel, Socket, SocketAddr};
use bluer::{Adapter, Address, Session};

use super::{DeviceHandle, Link, Radio};
use crate::{BtAddress, PrinterLinkError, Result};

/// Radio backed by the system BlueZ daemon.
pub struct BluezRadio {
    session: Session,
    channel: u8,
}

impl BluezRadio {
    pub async fn new(channel: u8) -> Result<Self> {
        let session = Session::new()
            .await
            .map_err(|e| PrinterLinkError::Radio(format!("BlueZ session: {e}")))?;
        Ok(Self { session, channel })
    }

    async fn adapter(&self) -> Result<Adapter> {
        self.session
            .default_adapter()
            .await
            .map_err(|e| PrinterLinkError::Radio(format!("No Bluetooth adapter: {e}")))
    }
}

#[async_trait]
impl Radio for BluezRadio {
    async fn is_enabled(&self) -> bool {
        match self.adapter().await {
            Ok(adapter) => adapter.is_powered().await.unwrap_or(false),
            Err(e) => {
                tracing::warn!("{e}");
                false
            }
        }
    }

    async fn resolve(&self, address: BtAddress) -> Result<DeviceHandle> {
        let adapter = self.adapter().await?;
        let device = adapter
            .device(Address::new(address.octets()))
            .map_err(|e| PrinterLinkError::Resolution(format!("{address}: {e}")))?;

        // Unknown devices are still connectable; the name is best-effort.
        let name = device.name().await.ok().flatten();
        tracing::debug!(%address, ?name, "Resolved device");

        Ok(DeviceHandle {
            address,
            name,
            node: None,
        })
    }

    async fn open(&self, device: &DeviceHandle, secure: bool) -> Result<Link> {
        let socket = Socket::new().map_err(|e| PrinterLinkError::Transport(e.to_string()))?;
        if secure {
            socket
                .set_security(Security {
                    level: SecurityLevel::Medium,
                    key_size: 0,
                })
                .map_err(|e| PrinterLinkError::Transport(e.to_string()))?;
        }

        let peer = SocketAddr::new(Address::new(device.address.octets()), self.channel);
        tracing::debug!(address = %device.address, channel = self.channel, secure, "RFCOMM connect");
        let stream = socket
            .connect(peer)
            .await
            .map_err(|e| PrinterLinkError::Transport(e.to_string()))?;

        Ok(Link::new(stream, device.name.clone()))
    }
}
