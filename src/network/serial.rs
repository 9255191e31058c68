//! Serial line configuration and discovery.
//!
//! Modbus RTU runs over a serial line that must be found by path, opened and
//! configured before the first frame goes out. The platform driver implements
//! [`SerialBus`] to list and open ports and [`SerialPort`] to apply a
//! [`SerialConfig`].

use super::Connection;
use super::error::Error;
use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

/// Maximum length of a serial device path.
pub const MAX_PORT_PATH_LEN: usize = 64;
/// Maximum number of ports reported by [`SerialBus::enumerate`].
pub const MAX_SERIAL_PORTS: usize = 16;

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// XON/XOFF.
    Software,
    /// RTS/CTS.
    Hardware,
}

/// Line settings applied when a serial port is opened.
///
/// The default is the common Modbus RTU setup: 9600 baud, 8N1, no flow
/// control, one second timeout.
///
/// ```rust
/// use libiot_comm::network::{Parity, SerialConfig};
///
/// let config = SerialConfig::from_json(
///     r#"{"baud_rate":19200,"parity":"even","stop_bits":1,"data_bits":8,"flow_control":"none","timeout_ms":250}"#,
/// )
/// .unwrap();
/// assert_eq!(config.baud_rate, 19200);
/// assert_eq!(config.parity, Parity::Even);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Line speed in bits per second.
    pub baud_rate: u32,
    /// Parity mode.
    pub parity: Parity,
    /// Number of stop bits, 1 or 2.
    pub stop_bits: u8,
    /// Number of data bits, 5 to 8.
    pub data_bits: u8,
    /// Flow control mode.
    pub flow_control: FlowControl,
    /// Read timeout in milliseconds.
    pub timeout_ms: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            parity: Parity::None,
            stop_bits: 1,
            data_bits: 8,
            flow_control: FlowControl::None,
            timeout_ms: 1000,
        }
    }
}

impl SerialConfig {
    /// Parse a configuration from a JSON object.
    ///
    /// All fields are required; out-of-range stop or data bits are rejected.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let (config, _): (Self, usize) =
            serde_json_core::from_str(json).map_err(|_| Error::InvalidArgument)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings against what a UART can do.
    pub fn validate(&self) -> Result<(), Error> {
        if self.baud_rate == 0
            || !(1..=2).contains(&self.stop_bits)
            || !(5..=8).contains(&self.data_bits)
        {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }
}

/// A serial device as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path, for example `/dev/ttyUSB0` or `COM3`.
    pub path: String<MAX_PORT_PATH_LEN>,
}

impl PortInfo {
    /// Describe the port at `path`.
    pub fn new(path: &str) -> Result<Self, Error> {
        Ok(Self {
            path: String::try_from(path).map_err(|_| Error::InvalidAddress)?,
        })
    }
}

/// An open serial line.
pub trait SerialPort: Connection {
    /// Apply line settings.
    fn configure(&mut self, config: &SerialConfig) -> Result<(), Error>;
}

/// Access to the serial devices of the platform.
pub trait SerialBus {
    /// Port type handed out by [`open`](SerialBus::open).
    type Port: SerialPort;
    /// Associated error type
    type Error: core::fmt::Debug;
    /// List the serial devices currently present.
    fn enumerate(&mut self) -> Result<Vec<PortInfo, MAX_SERIAL_PORTS>, Self::Error>;
    /// Open a previously enumerated device.
    fn open(&mut self, port: &PortInfo) -> Result<Self::Port, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_json() {
        let config = SerialConfig::from_json(
            r#"{"baud_rate":115200,"parity":"odd","stop_bits":2,"data_bits":7,"flow_control":"hardware","timeout_ms":50}"#,
        )
        .unwrap();
        assert_eq!(
            config,
            SerialConfig {
                baud_rate: 115200,
                parity: Parity::Odd,
                stop_bits: 2,
                data_bits: 7,
                flow_control: FlowControl::Hardware,
                timeout_ms: 50,
            }
        );
    }

    #[test]
    fn config_rejects_bad_framing() {
        let json = r#"{"baud_rate":9600,"parity":"none","stop_bits":3,"data_bits":8,"flow_control":"none","timeout_ms":50}"#;
        assert_eq!(SerialConfig::from_json(json), Err(Error::InvalidArgument));
        assert_eq!(SerialConfig::from_json("{"), Err(Error::InvalidArgument));
    }

    #[test]
    fn default_is_valid() {
        assert!(SerialConfig::default().validate().is_ok());
    }
}
