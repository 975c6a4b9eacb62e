//! TCP endpoint server for an emulated device.
//!
//! Wire protocol, per connection:
//! 1. client connects and sends the device's exact command bytes
//! 2. server replies once with the ASCII decimal of one reading
//! 3. both sides close
//!
//! A single connection is handled at a time. Responses larger than one
//! read buffer are not supported; this is a protocol constraint, not a
//! limitation to fix.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::Ammeter;

/// Maximum command size read from a client.
const COMMAND_BUFFER_BYTES: usize = 1024;

/// How often the accept loop checks the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Read/write bound applied to accepted connections.
const CLIENT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP endpoint serving measurements for one emulated device.
pub struct DeviceServer {
    listener: TcpListener,
    device: Box<dyn Ammeter>,
    addr: SocketAddr,
}

impl DeviceServer {
    /// Binds the endpoint on the given address.
    ///
    /// Use port 0 for an ephemeral port (tests); the bound address is
    /// available through `local_addr`.
    pub fn bind(device: Box<dyn Ammeter>, addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            device,
            addr,
        })
    }

    /// The address this endpoint is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves requests until `running` is cleared.
    ///
    /// Accepts one connection at a time; the accept loop polls the flag so
    /// shutdown is observed within one poll interval.
    pub fn run(mut self, running: Arc<AtomicBool>) -> std::io::Result<()> {
        self.listener.set_nonblocking(true)?;
        info!(
            "{} endpoint listening on {}",
            self.device.kind(),
            self.addr
        );

        while running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!("{}: connection from {}", self.device.kind(), peer);
                    if let Err(e) = handle_client(stream, self.device.as_mut()) {
                        warn!("{}: client error: {}", self.device.kind(), e);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    warn!("{}: accept failed: {}", self.device.kind(), e);
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        info!("{} endpoint stopped", self.device.kind());
        Ok(())
    }
}

/// Reads one command and answers it if it matches the device's command.
///
/// A mismatched command closes the connection without a reply, which the
/// client observes as an empty response.
fn handle_client(mut stream: TcpStream, device: &mut dyn Ammeter) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(CLIENT_IO_TIMEOUT))?;
    stream.set_write_timeout(Some(CLIENT_IO_TIMEOUT))?;

    let mut buf = [0u8; COMMAND_BUFFER_BYTES];
    let n = stream.read(&mut buf)?;
    if n == 0 {
        return Ok(());
    }

    if &buf[..n] == device.kind().command() {
        let current = device.measure();
        stream.write_all(format!("{}", current).as_bytes())?;
        debug!("{}: replied {}", device.kind(), current);
    } else {
        debug!(
            "{}: ignoring unrecognized command ({} bytes)",
            device.kind(),
            n
        );
    }

    Ok(())
}
