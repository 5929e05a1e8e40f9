//! In-memory radio for transport and manager tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::{Notify, mpsc};

use crate::radio::{DeviceHandle, Link, Radio};
use crate::{BtAddress, PrinterLinkError, Result};

/// How the fake printer at an address answers a connection attempt.
#[derive(Clone)]
pub enum Script {
    Accept { name: Option<String> },
    Refuse(String),
    /// Accept once the gate is notified. A gate never notified hangs forever.
    Gated { name: Option<String>, gate: Arc<Notify> },
}

/// Printer-side end of an accepted link.
pub struct Peer {
    pub address: BtAddress,
    pub stream: DuplexStream,
}

impl Peer {
    /// Read exactly `len` bytes the host wrote.
    pub async fn expect_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        tokio::time::timeout(Duration::from_secs(5), self.stream.read_exact(&mut buf))
            .await
            .expect("timed out waiting for host bytes")
            .expect("peer read failed");
        buf
    }

    /// Wait for the host to close its end of the link.
    pub async fn expect_closed(&mut self) {
        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(5), self.stream.read(&mut buf))
            .await
            .expect("host end still open")
            .expect("peer read failed");
        assert_eq!(n, 0, "expected end of stream");
    }
}

pub struct MockRadio {
    enabled: AtomicBool,
    scripts: Mutex<HashMap<BtAddress, Script>>,
    opens: AtomicUsize,
    peers_tx: mpsc::UnboundedSender<Peer>,
    peers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Peer>>,
}

impl MockRadio {
    pub fn new() -> Arc<Self> {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            enabled: AtomicBool::new(true),
            scripts: Mutex::new(HashMap::new()),
            opens: AtomicUsize::new(0),
            peers_tx,
            peers_rx: tokio::sync::Mutex::new(peers_rx),
        })
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn script(&self, address: &str, script: Script) -> BtAddress {
        let address: BtAddress = address.parse().expect("test address");
        self.scripts.lock().insert(address, script);
        address
    }

    pub fn accept(&self, address: &str, name: &str) -> BtAddress {
        self.script(
            address,
            Script::Accept {
                name: Some(name.to_string()),
            },
        )
    }

    /// Number of `open` calls made so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Wait for the next accepted link.
    pub async fn next_peer(&self) -> Peer {
        let mut rx = self.peers_rx.lock().await;
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a link")
            .expect("radio dropped")
    }

    fn accept_link(&self, address: BtAddress, name: Option<String>) -> Link {
        let (host, printer) = tokio::io::duplex(1024);
        let _ = self.peers_tx.send(Peer {
            address,
            stream: printer,
        });
        Link::new(host, name)
    }
}

#[async_trait]
impl Radio for MockRadio {
    async fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn resolve(&self, address: BtAddress) -> Result<DeviceHandle> {
        if !self.scripts.lock().contains_key(&address) {
            return Err(PrinterLinkError::Resolution(format!("{address}: unknown device")));
        }
        Ok(DeviceHandle::new(address))
    }

    async fn open(&self, device: &DeviceHandle, _secure: bool) -> Result<Link> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().get(&device.address).cloned();
        match script {
            Some(Script::Accept { name }) => Ok(self.accept_link(device.address, name)),
            Some(Script::Refuse(reason)) => Err(PrinterLinkError::Transport(reason)),
            Some(Script::Gated { name, gate }) => {
                gate.notified().await;
                Ok(self.accept_link(device.address, name))
            }
            None => Err(PrinterLinkError::Transport("no such device".to_string())),
        }
    }
}
