//! RFCOMM over kernel tty nodes.
//!
//! Works with printers bound through `rfcomm bind <n> <MAC>`, which creates
//! `/dev/rfcommN`. Opening the node starts the RFCOMM handshake; the node is
//! opened non-blocking and the link counts as up once the tty reports carrier.
//! The fd is owned by the open future from the first poll, so dropping it at
//! any point closes the node and abandons the handshake. The node is put in
//! raw mode so binary commands pass through untouched.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::Command;

use super::{DeviceHandle, Link, Radio};
use crate::{BtAddress, PrinterLinkError, Result};

const PROC_RFCOMM: &str = "/proc/net/rfcomm";
const SYS_BLUETOOTH: &str = "/sys/class/bluetooth";
const SYS_RFKILL: &str = "/sys/class/rfkill";
const DEV: &str = "/dev";

/// Carrier poll interval while the handshake is in flight.
const CARRIER_POLL: Duration = Duration::from_millis(100);

/// Radio backed by `/dev/rfcommN` bindings.
#[derive(Debug, Clone, Default)]
pub struct RfcommTtyRadio;

impl RfcommTtyRadio {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Radio for RfcommTtyRadio {
    async fn is_enabled(&self) -> bool {
        adapter_present().await && !bluetooth_rfkill_blocked().await
    }

    async fn resolve(&self, address: BtAddress) -> Result<DeviceHandle> {
        let node = find_rfcomm_node(address).await?.ok_or_else(|| {
            PrinterLinkError::Resolution(format!(
                "{address}: no rfcomm device bound (run `rfcomm bind 0 {address}`)"
            ))
        })?;
        tracing::debug!(%address, node = %node.display(), "Resolved rfcomm node");
        Ok(DeviceHandle {
            address,
            name: None,
            node: Some(node),
        })
    }

    async fn open(&self, device: &DeviceHandle, _secure: bool) -> Result<Link> {
        let node = device.node.clone().ok_or_else(|| {
            PrinterLinkError::Resolution(format!("{}: no rfcomm node", device.address))
        })?;

        let file = open_raw(&node)?;
        let file = wait_for_carrier(file, CARRIER_POLL, carrier_detected)
            .await
            .map_err(|e| {
                PrinterLinkError::Transport(format!("{}: link failed: {e}", node.display()))
            })?;

        let stream = TtyStream::new(file)?;
        Ok(Link::new(stream, device.name.clone()))
    }
}

/// Non-blocking tty registered with the Tokio reactor.
#[derive(Debug)]
pub struct TtyStream {
    fd: AsyncFd<File>,
}

impl TtyStream {
    /// `file` must already be in non-blocking mode.
    fn new(file: File) -> Result<Self> {
        let fd = AsyncFd::new(file).map_err(|e| PrinterLinkError::Transport(e.to_string()))?;
        Ok(Self { fd })
    }
}

impl AsyncRead for TtyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.fd.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.read(unfilled)
            }) {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for TtyStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = ready!(self.fd.poll_write_ready(cx))?;
            match guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.write(data)
            }) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Find the `/dev/rfcommN` node bound to `address`.
///
/// Checks `/proc/net/rfcomm` first and falls back to `rfcomm -a`.
pub async fn find_rfcomm_node(address: BtAddress) -> Result<Option<PathBuf>> {
    let mac = address.to_string();

    if let Ok(contents) = tokio::fs::read_to_string(PROC_RFCOMM).await {
        if let Some(node) = node_for_mac(&contents, &mac, Path::new(DEV)) {
            return Ok(Some(node));
        }
    }

    let output = match Command::new("rfcomm").arg("-a").output().await {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!("rfcomm -a unavailable: {e}");
            return Ok(None);
        }
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(node_for_mac(&stdout, &mac, Path::new(DEV)))
}

/// Scan `rfcommN: XX:XX:... channel N ...` lines for a bound node.
fn node_for_mac(listing: &str, mac: &str, dev_root: &Path) -> Option<PathBuf> {
    listing
        .lines()
        .filter(|line| line.to_uppercase().contains(mac))
        .filter_map(|line| line.split(':').next())
        .map(|dev| dev_root.join(dev.trim()))
        .find(|path| path.exists())
}

async fn adapter_present() -> bool {
    let Ok(mut entries) = tokio::fs::read_dir(SYS_BLUETOOTH).await else {
        return false;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with("hci") {
            return true;
        }
    }
    false
}

async fn bluetooth_rfkill_blocked() -> bool {
    let Ok(mut entries) = tokio::fs::read_dir(SYS_RFKILL).await else {
        return false;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let dir = entry.path();
        let kind = tokio::fs::read_to_string(dir.join("type")).await.unwrap_or_default();
        if kind.trim() != "bluetooth" {
            continue;
        }
        for flag in ["soft", "hard"] {
            let value = tokio::fs::read_to_string(dir.join(flag)).await.unwrap_or_default();
            if value.trim() == "1" {
                return true;
            }
        }
    }
    false
}

/// Open without waiting for the remote: the handshake continues in the
/// kernel and is torn down when the fd is closed.
fn open_raw(node: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(node)
        .map_err(|e| {
            PrinterLinkError::Transport(format!("Failed to open {}: {e}", node.display()))
        })?;
    configure_tty_raw(file.as_raw_fd())?;
    Ok(file)
}

/// Raw mode: no input/output processing, 8-bit, no echo, no canonical mode,
/// no XON/XOFF (0x11/0x13 occur in binary commands).
fn configure_tty_raw(fd: RawFd) -> Result<()> {
    use std::mem::MaybeUninit;

    let mut termios = MaybeUninit::uninit();
    // SAFETY: fd is an open descriptor owned by the caller; termios is only
    // read after tcgetattr reports success.
    let result = unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) };
    if result != 0 {
        return Err(PrinterLinkError::Transport(format!(
            "tcgetattr failed: {}",
            io::Error::last_os_error()
        )));
    }
    let mut termios = unsafe { termios.assume_init() };

    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);
    termios.c_oflag &= !libc::OPOST;
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    // SAFETY: termios was initialised by tcgetattr above.
    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) };
    if result != 0 {
        return Err(PrinterLinkError::Transport(format!(
            "tcsetattr failed: {}",
            io::Error::last_os_error()
        )));
    }
    Ok(())
}

/// Poll `carrier` until the link is up. The file moves into the returned
/// future, so dropping the future closes it.
async fn wait_for_carrier<F>(file: File, interval: Duration, mut carrier: F) -> io::Result<File>
where
    F: FnMut(&File) -> io::Result<bool>,
{
    loop {
        if carrier(&file)? {
            return Ok(file);
        }
        tokio::time::sleep(interval).await;
    }
}

/// DCD follows the RFCOMM DLC: raised once the remote accepts. A failed or
/// dropped DLC hangs the tty up, which makes TIOCMGET fail.
fn carrier_detected(file: &File) -> io::Result<bool> {
    let mut bits: libc::c_int = 0;
    // SAFETY: TIOCMGET writes a single c_int into `bits`.
    let result = unsafe { libc::ioctl(file.as_raw_fd(), libc::TIOCMGET, &mut bits as *mut libc::c_int) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(bits & libc::TIOCM_CD != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_for_mac_ignores_unbound_and_missing_nodes() {
        let listing = "rfcomm0: 1C:B8:57:50:01:D9 channel 1 clean\n\
                       rfcomm1: AA:BB:CC:DD:EE:FF channel 1 closed\n";
        let empty = tempfile::tempdir().unwrap();
        assert_eq!(node_for_mac(listing, "1C:B8:57:50:01:D9", empty.path()), None);
        assert_eq!(node_for_mac(listing, "00:00:00:00:00:01", empty.path()), None);
    }

    #[test]
    fn node_for_mac_finds_existing_node() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rfcomm1"), b"").unwrap();

        let listing = "rfcomm0: 1C:B8:57:50:01:D9 channel 1 clean\n\
                       rfcomm1: aa:bb:cc:dd:ee:ff channel 1 clean\n";
        let found = node_for_mac(listing, "AA:BB:CC:DD:EE:FF", dir.path()).unwrap();
        assert_eq!(found, dir.path().join("rfcomm1"));
    }

    #[tokio::test(start_paused = true)]
    async fn carrier_wait_returns_once_the_link_is_up() {
        let mut polls = 0;
        let start = tokio::time::Instant::now();
        let file = tempfile::tempfile().unwrap();

        let result = wait_for_carrier(file, CARRIER_POLL, |_| {
            polls += 1;
            Ok(polls == 3)
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(polls, 3);
        assert!(start.elapsed() >= CARRIER_POLL * 2);
    }

    #[tokio::test]
    async fn carrier_wait_fails_on_hangup() {
        let file = tempfile::tempfile().unwrap();
        let err = wait_for_carrier(file, CARRIER_POLL, |_| {
            Err(io::Error::from_raw_os_error(libc::EIO))
        })
        .await
        .unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EIO));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_carrier_wait_releases_the_node() {
        let held = std::sync::Arc::new(());
        let file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();

        let token = std::sync::Arc::clone(&held);
        let wait = wait_for_carrier(file, CARRIER_POLL, move |f| {
            assert!(std::sync::Arc::strong_count(&token) >= 2);
            assert_eq!(f.as_raw_fd(), fd);
            Ok(false)
        });
        let outcome = tokio::time::timeout(Duration::from_secs(5), wait).await;

        assert!(outcome.is_err());
        // The timed-out future dropped the file and the closure it owned.
        assert_eq!(std::sync::Arc::strong_count(&held), 1);
    }

    #[test]
    fn regular_file_has_no_carrier() {
        let file = tempfile::tempfile().unwrap();
        assert!(carrier_detected(&file).is_err());
    }

    #[tokio::test]
    async fn resolve_without_binding_is_a_resolution_failure() {
        let radio = RfcommTtyRadio::new();
        let address: BtAddress = "02:00:00:00:00:01".parse().unwrap();
        let err = radio.resolve(address).await.unwrap_err();
        assert!(matches!(err, PrinterLinkError::Resolution(_)));
    }
}
