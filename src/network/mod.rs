//! A network abstraction layer for embedded systems
//!
//! This module provides the traits the protocol clients are written against.
//! The byte-stream transports themselves (TCP sockets, serial lines) are
//! supplied by the platform: implement [`Connect`] for the TCP stack and
//! [`SerialBus`] for the serial driver, and every client in
//! [`application`] works on top of them.
//!

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Serial line configuration and discovery
pub mod serial;

/// Application layer protocol clients
pub mod application;

pub use serial::{FlowControl, Parity, PortInfo, SerialBus, SerialConfig, SerialPort};

use error::Error;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, Read, SerialBus, SerialPort, Write};
}

// Core synchronous traits
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
    /// Bound how long the next reads may block.
    ///
    /// Transports without a notion of timeout keep the default, which
    /// accepts and ignores the value.
    fn set_timeout(&mut self, _timeout_ms: u32) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}

/// A synchronous connector (client)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Open a connection to `remote`, given as `host:port`
    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error>;
    /// Switch an open connection to TLS.
    ///
    /// Connectors without a TLS stack keep the default and refuse.
    fn upgrade_tls(&mut self, _connection: &mut Self::Connection) -> Result<(), Error> {
        Err(Error::Unsupported)
    }
}

/// Fill `buf` completely from `reader`.
///
/// A zero-length read means the peer closed the stream. A read error before
/// the first byte is reported as [`Error::Timeout`], a read error in the middle
/// of the buffer as [`Error::ReadError`] since the stream is then out of step.
pub fn read_exact<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<(), Error> {
    let mut total_read = 0;
    while total_read < buf.len() {
        match reader.read(&mut buf[total_read..]) {
            Ok(0) => return Err(Error::ConnectionClosed),
            Ok(n) => total_read += n,
            Err(_) if total_read == 0 => return Err(Error::Timeout),
            Err(_) => return Err(Error::ReadError),
        }
    }
    Ok(())
}

/// Write all of `bytes` to `writer` and flush it.
pub fn write_all<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> Result<(), Error> {
    let mut written = 0;
    while written < bytes.len() {
        match writer.write(&bytes[written..]) {
            Ok(0) | Err(_) => return Err(Error::WriteError),
            Ok(n) => written += n,
        }
    }
    writer.flush().map_err(|_| Error::WriteError)
}

/// Format `host:port` into a fixed-capacity remote address.
pub(crate) fn remote_address(host: &str, port: u16) -> Result<heapless::String<64>, Error> {
    use core::fmt::Write as _;

    if host.is_empty() {
        return Err(Error::InvalidAddress);
    }
    let mut remote = heapless::String::new();
    write!(remote, "{host}:{port}").map_err(|_| Error::InvalidAddress)?;
    Ok(remote)
}
