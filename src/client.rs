//! Blocking measurement client for device endpoints.
//!
//! One request is one connection: connect, send the command bytes, read a
//! single reply of at most one buffer, parse it as a float, close. There is
//! no retry at this layer; retries, if any, belong to the caller.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::device::DeviceKind;

/// Bound applied to connect and to the single reply read.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum reply size; larger responses are not part of the protocol.
pub const MAX_RESPONSE_BYTES: usize = 1024;

/// Error type for a failed request/response exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Connect or read exceeded the bounded wait.
    Timeout(String),
    /// The peer refused the connection.
    ConnectionRefused(String),
    /// The peer closed without sending any bytes.
    EmptyResponse(String),
    /// The reply was not parseable as a floating-point number.
    InvalidPayload(String),
    /// Any other socket failure.
    Io(String),
}

impl ProtocolError {
    /// Stable lowercase name for error-event logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ProtocolError::Timeout(_) => "timeout",
            ProtocolError::ConnectionRefused(_) => "connection_refused",
            ProtocolError::EmptyResponse(_) => "empty_response",
            ProtocolError::InvalidPayload(_) => "invalid_payload",
            ProtocolError::Io(_) => "io",
        }
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Timeout(msg) => write!(f, "measurement timeout: {}", msg),
            ProtocolError::ConnectionRefused(msg) => write!(f, "connection refused: {}", msg),
            ProtocolError::EmptyResponse(msg) => write!(f, "empty response: {}", msg),
            ProtocolError::InvalidPayload(msg) => write!(f, "invalid payload: {}", msg),
            ProtocolError::Io(msg) => write!(f, "socket error: {}", msg),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Client for the one-shot request/response device protocol.
#[derive(Debug, Clone)]
pub struct MeasurementClient {
    timeout: Duration,
}

impl MeasurementClient {
    /// Creates a client with the protocol's default 5 second bound.
    pub fn new() -> Self {
        Self {
            timeout: RESPONSE_TIMEOUT,
        }
    }

    /// Creates a client with a custom bound. Useful for fast-failing tests.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Performs one request/response exchange and decodes the reply.
    ///
    /// # Arguments
    /// * `kind` - device kind, used only for error context
    /// * `addr` - endpoint address
    /// * `command` - exact command bytes to send
    pub fn request(
        &self,
        kind: DeviceKind,
        addr: SocketAddr,
        command: &[u8],
    ) -> Result<f64, ProtocolError> {
        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| connect_error(kind, &e))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| ProtocolError::Io(format!("{}: {}", kind, e)))?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| ProtocolError::Io(format!("{}: {}", kind, e)))?;

        stream
            .write_all(command)
            .map_err(|e| io_error(kind, &e))?;

        let mut buf = [0u8; MAX_RESPONSE_BYTES];
        let n = stream.read(&mut buf).map_err(|e| io_error(kind, &e))?;
        if n == 0 {
            return Err(ProtocolError::EmptyResponse(format!(
                "no data received from {}",
                kind
            )));
        }

        let text = std::str::from_utf8(&buf[..n]).map_err(|_| {
            ProtocolError::InvalidPayload(format!("{}: reply is not valid UTF-8", kind))
        })?;
        let value = text.trim().parse::<f64>().map_err(|_| {
            ProtocolError::InvalidPayload(format!("{}: cannot parse '{}' as float", kind, text.trim()))
        })?;

        debug!("{}: measured {}", kind, value);
        Ok(value)
    }
}

impl Default for MeasurementClient {
    fn default() -> Self {
        Self::new()
    }
}

fn connect_error(kind: DeviceKind, e: &std::io::Error) -> ProtocolError {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            ProtocolError::ConnectionRefused(format!("{} at {}", kind, e))
        }
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
            ProtocolError::Timeout(format!("{}: connect timed out", kind))
        }
        _ => ProtocolError::Io(format!("{}: {}", kind, e)),
    }
}

fn io_error(kind: DeviceKind, e: &std::io::Error) -> ProtocolError {
    match e.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
            ProtocolError::Timeout(format!("{}: no reply within bound", kind))
        }
        std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset => {
            ProtocolError::ConnectionRefused(format!("{}: {}", kind, e))
        }
        _ => ProtocolError::Io(format!("{}: {}", kind, e)),
    }
}
