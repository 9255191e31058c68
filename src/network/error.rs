//! Common error types for network operations

use core::fmt;

/// A common error type for network and protocol operations.
///
/// This enum defines the errors that can occur when talking to a device or a
/// broker through one of the protocol clients. It is designed to be simple and
/// portable for `no_std` environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// A connection attempt was refused.
    ConnectionRefused,
    /// A timeout occurred.
    Timeout,
    /// The connection was closed.
    ConnectionClosed,
    /// An invalid address was provided.
    InvalidAddress,
    /// No serial device matches the requested path.
    DeviceNotFound,
    /// A protocol-specific error occurred.
    ProtocolError,
    /// A received frame failed its checksum.
    Crc {
        /// CRC carried by the frame.
        expected: u16,
        /// CRC computed over the frame contents.
        actual: u16,
    },
    /// The remote device answered with a Modbus exception.
    Exception {
        /// Function code of the request that failed.
        function: u8,
        /// Exception code reported by the device.
        code: u8,
    },
    /// The requested operation or option is not supported.
    Unsupported,
    /// An argument is outside the range the protocol allows.
    InvalidArgument,
    /// A fixed-capacity buffer or table is full.
    BufferOverflow,
}

/// Coarse classification of an [`Error`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// The byte stream failed: connect, read, write or close.
    Transport,
    /// The peer sent something malformed or unexpected, or the request was invalid.
    Protocol,
    /// A fixed-capacity resource ran out.
    Resource,
}

impl Error {
    /// Returns the class this error belongs to.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::NotOpen
            | Error::WriteError
            | Error::ReadError
            | Error::ConnectionRefused
            | Error::Timeout
            | Error::ConnectionClosed
            | Error::InvalidAddress
            | Error::DeviceNotFound => ErrorKind::Transport,
            Error::ProtocolError
            | Error::Crc { .. }
            | Error::Exception { .. }
            | Error::Unsupported
            | Error::InvalidArgument => ErrorKind::Protocol,
            Error::BufferOverflow => ErrorKind::Resource,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotOpen => write!(f, "Connection not open"),
            Error::WriteError => write!(f, "Write failed"),
            Error::ReadError => write!(f, "Read failed"),
            Error::ConnectionRefused => write!(f, "Connection refused"),
            Error::Timeout => write!(f, "Timed out"),
            Error::ConnectionClosed => write!(f, "Connection closed by peer"),
            Error::InvalidAddress => write!(f, "Invalid address"),
            Error::DeviceNotFound => write!(f, "Serial device not found"),
            Error::ProtocolError => write!(f, "Protocol error"),
            Error::Crc { expected, actual } => write!(
                f,
                "Invalid CRC: expected = 0x{expected:0>4X}, actual = 0x{actual:0>4X}"
            ),
            Error::Exception { function, code } => write!(
                f,
                "Modbus exception 0x{code:0>2X} for function 0x{function:0>2X}"
            ),
            Error::Unsupported => write!(f, "Unsupported operation"),
            Error::InvalidArgument => write!(f, "Invalid argument"),
            Error::BufferOverflow => write!(f, "Buffer overflow"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            Error::DeviceNotFound => defmt::write!(f, "DeviceNotFound"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
            Error::Crc { expected, actual } => {
                defmt::write!(f, "Crc({=u16:#x}, {=u16:#x})", expected, actual)
            }
            Error::Exception { function, code } => {
                defmt::write!(f, "Exception({=u8:#x}, {=u8:#x})", function, code)
            }
            Error::Unsupported => defmt::write!(f, "Unsupported"),
            Error::InvalidArgument => defmt::write!(f, "InvalidArgument"),
            Error::BufferOverflow => defmt::write!(f, "BufferOverflow"),
        }
    }
}
