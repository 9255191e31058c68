//! Modbus client for TCP and RTU transports.
//!
//! The client speaks the four read functions (coils, discrete inputs, holding
//! registers, input registers) and the two multiple-write functions (coils,
//! holding registers). Framing follows the transport chosen at connect time:
//!
//! - **TCP**: 7-byte MBAP header (transaction id, protocol id, length, unit id)
//!   followed by the PDU. Responses are correlated by transaction id.
//! - **RTU**: unit id, PDU, CRC16 (low byte first). Responses are rejected on
//!   CRC mismatch.
//!
//! # Usage
//!
//! ```rust,no_run
//! use libiot_comm::network::application::modbus::{Client, DataType};
//! # use libiot_comm::network::{Close, Connect, Connection, Read, Write};
//! # struct Tcp;
//! # impl Connection for Tcp {}
//! # impl Read for Tcp {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl Write for Tcp {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl Close for Tcp {
//! #     type Error = ();
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct Network;
//! # impl Connect for Network {
//! #     type Connection = Tcp;
//! #     type Error = ();
//! #     fn connect(&mut self, _remote: &str) -> Result<Tcp, ()> { Ok(Tcp) }
//! # }
//! # fn main() -> Result<(), libiot_comm::network::error::Error> {
//! let mut network = Network;
//! let mut client = Client::new();
//! client.connect_tcp(&mut network, "192.168.1.50", 502)?;
//!
//! let response = client.read(DataType::HoldingRegister, 0x0000, 2)?;
//! for value in response.registers()? {
//!     // scale and publish the register value
//!     let _ = value;
//! }
//!
//! client.write_registers(0x0010, &[1500, 42])?;
//! client.disconnect()?;
//! # Ok(())
//! # }
//! ```

use crate::network::error::Error;
use heapless::Vec;

/// Modbus client implementation.
pub mod client;

/// Frame builders, CRC16 and response validation.
pub mod frame;

pub use client::{Client, State};
pub use frame::crc16;

/// Unit id used until [`Client::set_unit_id`] is called.
pub const DEFAULT_UNIT_ID: u8 = 1;
/// Response timeout used by the read and write helpers.
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;
/// Largest PDU (function code + data) allowed by the protocol.
pub const MAX_PDU_LEN: usize = 253;
/// Size of the Modbus TCP MBAP header.
pub const TCP_HEADER_LEN: usize = 7;
/// Largest request frame on either transport.
pub const MAX_FRAME_LEN: usize = TCP_HEADER_LEN + MAX_PDU_LEN;
/// Largest RTU frame; also the size of the single RTU receive read.
pub const MAX_RTU_FRAME_LEN: usize = 256;
/// Smallest valid RTU frame: unit id, function, one data byte, CRC.
pub const MIN_RTU_FRAME_LEN: usize = 5;

/// Read Coils function code.
pub const READ_COILS: u8 = 0x01;
/// Read Discrete Inputs function code.
pub const READ_DISCRETE_INPUTS: u8 = 0x02;
/// Read Holding Registers function code.
pub const READ_HOLDING_REGISTERS: u8 = 0x03;
/// Read Input Registers function code.
pub const READ_INPUT_REGISTERS: u8 = 0x04;
/// Write Multiple Coils function code.
pub const WRITE_MULTIPLE_COILS: u8 = 0x0F;
/// Write Multiple Registers function code.
pub const WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Bit set in the function code of an exception response.
const EXCEPTION_FLAG: u8 = 0x80;

/// The four Modbus data tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Single-bit read/write outputs.
    Coil,
    /// Single-bit read-only inputs.
    DiscreteInput,
    /// 16-bit read/write registers.
    HoldingRegister,
    /// 16-bit read-only registers.
    InputRegister,
}

impl DataType {
    /// Function code that reads this table.
    pub const fn read_function(self) -> u8 {
        match self {
            DataType::Coil => READ_COILS,
            DataType::DiscreteInput => READ_DISCRETE_INPUTS,
            DataType::HoldingRegister => READ_HOLDING_REGISTERS,
            DataType::InputRegister => READ_INPUT_REGISTERS,
        }
    }

    /// Function code that writes this table, if it is writable.
    pub const fn write_function(self) -> Option<u8> {
        match self {
            DataType::Coil => Some(WRITE_MULTIPLE_COILS),
            DataType::HoldingRegister => Some(WRITE_MULTIPLE_REGISTERS),
            DataType::DiscreteInput | DataType::InputRegister => None,
        }
    }

    const fn is_bit_table(self) -> bool {
        matches!(self, DataType::Coil | DataType::DiscreteInput)
    }
}

/// Framing used on the active connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Modbus TCP (MBAP header).
    Tcp,
    /// Modbus RTU (CRC16 trailer).
    Rtu,
}

/// A received response, stripped of its transport framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    unit_id: u8,
    pdu: Vec<u8, MAX_PDU_LEN>,
}

impl Response {
    /// Wrap a unit id and a non-empty PDU.
    pub fn new(unit_id: u8, pdu: &[u8]) -> Result<Self, Error> {
        if pdu.is_empty() {
            return Err(Error::ProtocolError);
        }
        Ok(Self {
            unit_id,
            pdu: Vec::from_slice(pdu).map_err(|_| Error::BufferOverflow)?,
        })
    }

    /// Unit id the response came from.
    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    /// Function code plus data.
    pub fn pdu(&self) -> &[u8] {
        &self.pdu
    }

    /// Function code of the response.
    pub fn function(&self) -> u8 {
        self.pdu[0]
    }

    /// Function-specific data following the function code.
    pub fn data(&self) -> &[u8] {
        &self.pdu[1..]
    }

    /// Whether the device answered with an exception.
    pub fn is_exception(&self) -> bool {
        self.function() & EXCEPTION_FLAG != 0
    }

    /// The exception as an [`Error`], if this is an exception response.
    pub fn exception(&self) -> Option<Error> {
        self.is_exception().then(|| Error::Exception {
            function: self.function() & !EXCEPTION_FLAG,
            code: self.data().first().copied().unwrap_or(0),
        })
    }

    /// The byte-count-prefixed value section of a read response.
    fn values(&self) -> Result<&[u8], Error> {
        let (&byte_count, values) = self.data().split_first().ok_or(Error::ProtocolError)?;
        if values.len() != usize::from(byte_count) {
            return Err(Error::ProtocolError);
        }
        Ok(values)
    }

    /// Decode the registers of a holding or input register read.
    pub fn registers(&self) -> Result<Vec<u16, { MAX_PDU_LEN / 2 }>, Error> {
        let values = self.values()?;
        if values.len() % 2 != 0 {
            return Err(Error::ProtocolError);
        }
        values
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .try_fold(Vec::new(), |mut registers, value| {
                registers.push(value).map_err(|_| Error::BufferOverflow)?;
                Ok(registers)
            })
    }

    /// Decode the first `quantity` bits of a coil or discrete input read.
    pub fn coils(&self, quantity: usize) -> Result<Vec<bool, { frame::MAX_READ_BITS as usize }>, Error> {
        let values = self.values()?;
        if quantity > values.len() * 8 {
            return Err(Error::ProtocolError);
        }
        let mut coils = Vec::new();
        for i in 0..quantity {
            coils
                .push(values[i / 8] >> (i % 8) & 0x01 != 0)
                .map_err(|_| Error::BufferOverflow)?;
        }
        Ok(coils)
    }
}
