//! Modbus frame encoding and validation.
//!
//! Everything here is pure: builders take the header fields and the PDU data
//! and return the bytes to put on the wire, validators take received bytes and
//! return the part worth keeping.

use super::{MAX_FRAME_LEN, MAX_PDU_LEN, MIN_RTU_FRAME_LEN};
use crate::network::error::Error;
use heapless::Vec;

/// A complete request ready for transmission.
pub type Frame = Vec<u8, MAX_FRAME_LEN>;

/// Function-specific request data (PDU without the function code).
pub type RequestData = Vec<u8, { MAX_PDU_LEN - 1 }>;

/// Largest quantity of coils or discrete inputs in one read.
pub const MAX_READ_BITS: u16 = 2000;
/// Largest quantity of registers in one read.
pub const MAX_READ_REGISTERS: u16 = 125;
/// Largest quantity of coils in one write.
pub const MAX_WRITE_COILS: usize = 1968;
/// Largest quantity of registers in one write.
pub const MAX_WRITE_REGISTERS: usize = 123;

/// Calculate the Modbus CRC16 of `data`.
///
/// The value is the raw register; on the wire it is sent low byte first.
///
/// ```rust
/// use libiot_comm::network::application::modbus::crc16;
///
/// let crc = crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]);
/// assert_eq!(crc, 0xCDC5);
/// assert_eq!(crc.to_le_bytes(), [0xC5, 0xCD]);
/// ```
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        crc ^= u16::from(*byte);
        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Build a Modbus TCP frame: MBAP header followed by the PDU.
///
/// The length field counts the PDU (function code and data).
pub fn tcp_frame(
    transaction_id: u16,
    unit_id: u8,
    function: u8,
    data: &[u8],
) -> Result<Frame, Error> {
    if data.len() + 1 > MAX_PDU_LEN {
        return Err(Error::BufferOverflow);
    }
    let length = (1 + data.len()) as u16;

    let mut frame = Frame::new();
    frame
        .extend_from_slice(&transaction_id.to_be_bytes())
        .map_err(|_| Error::BufferOverflow)?;
    frame
        .extend_from_slice(&[0, 0])
        .map_err(|_| Error::BufferOverflow)?;
    frame
        .extend_from_slice(&length.to_be_bytes())
        .map_err(|_| Error::BufferOverflow)?;
    frame
        .extend_from_slice(&[unit_id, function])
        .map_err(|_| Error::BufferOverflow)?;
    frame
        .extend_from_slice(data)
        .map_err(|_| Error::BufferOverflow)?;
    Ok(frame)
}

/// Build a Modbus RTU frame: unit id, PDU, CRC16 low byte first.
pub fn rtu_frame(unit_id: u8, function: u8, data: &[u8]) -> Result<Frame, Error> {
    if data.len() + 1 > MAX_PDU_LEN {
        return Err(Error::BufferOverflow);
    }

    let mut frame = Frame::new();
    frame
        .extend_from_slice(&[unit_id, function])
        .map_err(|_| Error::BufferOverflow)?;
    frame
        .extend_from_slice(data)
        .map_err(|_| Error::BufferOverflow)?;
    let crc = crc16(&frame);
    frame
        .extend_from_slice(&crc.to_le_bytes())
        .map_err(|_| Error::BufferOverflow)?;
    Ok(frame)
}

/// Validate a received RTU frame and strip its CRC.
///
/// Returns `[unit id, function, data...]`.
pub fn check_rtu(adu: &[u8]) -> Result<&[u8], Error> {
    if adu.len() < MIN_RTU_FRAME_LEN {
        return Err(Error::ProtocolError);
    }
    let (body, crc_bytes) = adu.split_at(adu.len() - 2);
    let expected = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    let actual = crc16(body);
    if expected != actual {
        return Err(Error::Crc { expected, actual });
    }
    Ok(body)
}

/// Request data for the read functions 0x01 to 0x04.
pub fn read_request(address: u16, quantity: u16) -> [u8; 4] {
    let [addr_hi, addr_lo] = address.to_be_bytes();
    let [qty_hi, qty_lo] = quantity.to_be_bytes();
    [addr_hi, addr_lo, qty_hi, qty_lo]
}

/// Request data for Write Multiple Coils (0x0F).
///
/// Coils are packed LSB first: the first value lands in bit 0 of the first
/// data byte.
pub fn write_coils_request<I>(address: u16, coils: I) -> Result<RequestData, Error>
where
    I: IntoIterator<Item = bool>,
    I::IntoIter: ExactSizeIterator,
{
    let coils = coils.into_iter();
    let bit_count = coils.len();
    if bit_count == 0 || bit_count > MAX_WRITE_COILS {
        return Err(Error::InvalidArgument);
    }
    let byte_count = bit_count.div_ceil(8);

    let mut data = RequestData::new();
    data.extend_from_slice(&address.to_be_bytes())
        .map_err(|_| Error::BufferOverflow)?;
    data.extend_from_slice(&(bit_count as u16).to_be_bytes())
        .map_err(|_| Error::BufferOverflow)?;
    data.push(byte_count as u8)
        .map_err(|_| Error::BufferOverflow)?;
    let packed_start = data.len();
    data.resize(packed_start + byte_count, 0)
        .map_err(|_| Error::BufferOverflow)?;
    for (i, on) in coils.enumerate() {
        if on {
            data[packed_start + i / 8] |= 1 << (i % 8);
        }
    }
    Ok(data)
}

/// Request data for Write Multiple Registers (0x10).
///
/// `registers` holds the raw big-endian register bytes.
pub fn write_registers_request(address: u16, registers: &[u8]) -> Result<RequestData, Error> {
    if registers.is_empty()
        || registers.len() % 2 != 0
        || registers.len() / 2 > MAX_WRITE_REGISTERS
    {
        return Err(Error::InvalidArgument);
    }
    let quantity = (registers.len() / 2) as u16;

    let mut data = RequestData::new();
    data.extend_from_slice(&address.to_be_bytes())
        .map_err(|_| Error::BufferOverflow)?;
    data.extend_from_slice(&quantity.to_be_bytes())
        .map_err(|_| Error::BufferOverflow)?;
    data.push(registers.len() as u8)
        .map_err(|_| Error::BufferOverflow)?;
    data.extend_from_slice(registers)
        .map_err(|_| Error::BufferOverflow)?;
    Ok(data)
}
