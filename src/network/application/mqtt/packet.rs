//! MQTT 3.1.1 control packet encoding and decoding.
//!
//! Builders return complete packets (fixed header, remaining length, variable
//! header, payload) ready to be written to the connection. Parsers take the
//! bytes following the fixed header.

use super::{MAX_PACKET_LEN, QoS};
use crate::network::error::Error;
use heapless::Vec;

// MQTT Control Packet types - these are the fixed header packet type values
/// MQTT CONNECT packet type identifier.
pub const CONNECT: u8 = 0x10;
/// MQTT CONNACK packet type identifier.
pub const CONNACK: u8 = 0x20;
/// MQTT PUBLISH packet type identifier.
pub const PUBLISH: u8 = 0x30;
/// MQTT PUBACK packet type identifier.
pub const PUBACK: u8 = 0x40;
/// MQTT SUBSCRIBE packet type identifier (with its mandatory flags).
pub const SUBSCRIBE: u8 = 0x82;
/// MQTT UNSUBSCRIBE packet type identifier (with its mandatory flags).
pub const UNSUBSCRIBE: u8 = 0xA2;
/// MQTT DISCONNECT packet type identifier.
pub const DISCONNECT: u8 = 0xE0;

/// Packet type number of PUBLISH, as found in the upper nibble.
pub const PUBLISH_TYPE: u8 = PUBLISH >> 4;
/// Packet type number of PUBACK, as found in the upper nibble.
pub const PUBACK_TYPE: u8 = PUBACK >> 4;

/// MQTT protocol name as defined in the specification.
const PROTOCOL_NAME: &[u8] = b"MQTT";
/// MQTT protocol level for version 3.1.1.
const PROTOCOL_LEVEL: u8 = 4;
/// Clean session bit of the CONNECT flags.
const CLEAN_SESSION: u8 = 0x02;
/// Retain bit of the PUBLISH fixed header.
const RETAIN: u8 = 0x01;

/// Largest value the remaining length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// An encoded control packet.
pub type Packet = Vec<u8, MAX_PACKET_LEN>;

/// Encode the remaining length field for an MQTT packet.
///
/// Each byte carries 7 bits, least significant group first; the high bit
/// says another byte follows.
///
/// ```rust
/// use libiot_comm::network::application::mqtt::packet::encode_remaining_length;
///
/// assert_eq!(&encode_remaining_length(127).unwrap()[..], &[0x7F]);
/// assert_eq!(&encode_remaining_length(128).unwrap()[..], &[0x80, 0x01]);
/// ```
pub fn encode_remaining_length(mut len: usize) -> Result<Vec<u8, 4>, Error> {
    if len > MAX_REMAINING_LENGTH {
        return Err(Error::InvalidArgument);
    }
    let mut encoded = Vec::new();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        // At most four bytes for values up to MAX_REMAINING_LENGTH.
        encoded.push(byte).map_err(|_| Error::InvalidArgument)?;
        if len == 0 {
            return Ok(encoded);
        }
    }
}

/// Decode a remaining length field from the start of `bytes`.
///
/// Returns `Ok(None)` while more bytes are needed, otherwise the value and
/// the number of bytes it occupied. A fifth continuation byte is malformed.
pub fn decode_remaining_length(bytes: &[u8]) -> Result<Option<(usize, usize)>, Error> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for (i, byte) in bytes.iter().enumerate() {
        if i == 4 {
            return Err(Error::ProtocolError);
        }
        value += usize::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
        multiplier *= 128;
    }
    if bytes.len() >= 4 {
        return Err(Error::ProtocolError);
    }
    Ok(None)
}

/// Start a packet with its fixed header.
fn start(header: u8, remaining_len: usize) -> Result<Packet, Error> {
    let mut packet = Packet::new();
    packet.push(header).map_err(|_| Error::BufferOverflow)?;
    packet
        .extend_from_slice(&encode_remaining_length(remaining_len)?)
        .map_err(|_| Error::BufferOverflow)?;
    Ok(packet)
}

fn put(packet: &mut Packet, bytes: &[u8]) -> Result<(), Error> {
    packet
        .extend_from_slice(bytes)
        .map_err(|_| Error::BufferOverflow)
}

/// Append a 2-byte length prefix and the bytes of `value`.
fn put_prefixed(packet: &mut Packet, value: &[u8]) -> Result<(), Error> {
    let len = u16::try_from(value.len()).map_err(|_| Error::InvalidArgument)?;
    put(packet, &len.to_be_bytes())?;
    put(packet, value)
}

/// Build a CONNECT packet without username, password or will.
pub fn connect(client_id: &str, keep_alive_seconds: u16, clean_session: bool) -> Result<Packet, Error> {
    let client_id = client_id.as_bytes();
    // protocol name (2 + 4), level, flags, keep-alive, client id
    let remaining_len = 2 + PROTOCOL_NAME.len() + 1 + 1 + 2 + 2 + client_id.len();

    let mut packet = start(CONNECT, remaining_len)?;
    put_prefixed(&mut packet, PROTOCOL_NAME)?;
    let flags = if clean_session { CLEAN_SESSION } else { 0 };
    put(&mut packet, &[PROTOCOL_LEVEL, flags])?;
    put(&mut packet, &keep_alive_seconds.to_be_bytes())?;
    put_prefixed(&mut packet, client_id)?;
    Ok(packet)
}

/// Check a CONNACK packet.
///
/// Return codes 1 to 5 are refusals by the broker; anything else that does not
/// look like `20 02 xx 00` is a protocol error.
pub fn check_connack(connack: &[u8; 4]) -> Result<(), Error> {
    if connack[0] != CONNACK || connack[1] != 0x02 {
        return Err(Error::ProtocolError);
    }
    match connack[3] {
        0 => Ok(()),
        1..=5 => Err(Error::ConnectionRefused),
        _ => Err(Error::ProtocolError),
    }
}

/// Build a PUBLISH packet.
///
/// `packet_id` is written only for QoS 1 and is mandatory there. The DUP flag
/// is never set.
pub fn publish(
    topic: &str,
    payload: &[u8],
    qos: QoS,
    retain: bool,
    packet_id: Option<u16>,
) -> Result<Packet, Error> {
    let packet_id = match (qos, packet_id) {
        (QoS::AtMostOnce, _) => None,
        (QoS::AtLeastOnce, Some(id)) if id != 0 => Some(id),
        (QoS::AtLeastOnce, _) => return Err(Error::InvalidArgument),
        (QoS::ExactlyOnce, _) => return Err(Error::Unsupported),
    };
    let remaining_len =
        2 + topic.len() + packet_id.map_or(0, |_| 2) + payload.len();

    let mut header = PUBLISH | ((qos as u8) << 1);
    if retain {
        header |= RETAIN;
    }
    let mut packet = start(header, remaining_len)?;
    put_prefixed(&mut packet, topic.as_bytes())?;
    if let Some(id) = packet_id {
        put(&mut packet, &id.to_be_bytes())?;
    }
    put(&mut packet, payload)?;
    Ok(packet)
}

/// Build a SUBSCRIBE packet for a single topic, requesting QoS 0.
pub fn subscribe(packet_id: u16, topic: &str) -> Result<Packet, Error> {
    let mut packet = start(SUBSCRIBE, 2 + 2 + topic.len() + 1)?;
    put(&mut packet, &packet_id.to_be_bytes())?;
    put_prefixed(&mut packet, topic.as_bytes())?;
    put(&mut packet, &[QoS::AtMostOnce as u8])?;
    Ok(packet)
}

/// Build an UNSUBSCRIBE packet for a single topic.
pub fn unsubscribe(packet_id: u16, topic: &str) -> Result<Packet, Error> {
    let mut packet = start(UNSUBSCRIBE, 2 + 2 + topic.len())?;
    put(&mut packet, &packet_id.to_be_bytes())?;
    put_prefixed(&mut packet, topic.as_bytes())?;
    Ok(packet)
}

/// Build a PUBACK packet.
pub fn puback(packet_id: u16) -> [u8; 4] {
    let [hi, lo] = packet_id.to_be_bytes();
    [PUBACK, 0x02, hi, lo]
}

/// Build a DISCONNECT packet.
pub const fn disconnect() -> [u8; 2] {
    [DISCONNECT, 0x00]
}

/// A PUBLISH received from the broker, borrowed from the packet body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publish<'a> {
    /// Topic the message was published to.
    pub topic: &'a str,
    /// Delivery guarantee requested by the sender.
    pub qos: QoS,
    /// Packet identifier, present for QoS 1.
    pub packet_id: Option<u16>,
    /// Whether the broker flagged the message as retained.
    pub retain: bool,
    /// Message bytes.
    pub payload: &'a [u8],
}

/// Parse the body of a PUBLISH whose fixed header carried `flags`.
pub fn parse_publish(flags: u8, body: &[u8]) -> Result<Publish<'_>, Error> {
    let qos = QoS::try_from((flags >> 1) & 0x03)?;
    if body.len() < 2 {
        return Err(Error::ProtocolError);
    }
    let topic_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
    let rest = &body[2..];
    if rest.len() < topic_len {
        return Err(Error::ProtocolError);
    }
    let (topic, rest) = rest.split_at(topic_len);
    let topic = core::str::from_utf8(topic).map_err(|_| Error::ProtocolError)?;

    // Only QoS 1 carries an identifier; everything else after the topic is payload.
    let (packet_id, payload) = if qos == QoS::AtLeastOnce {
        if rest.len() < 2 {
            return Err(Error::ProtocolError);
        }
        let (id, payload) = rest.split_at(2);
        (Some(u16::from_be_bytes([id[0], id[1]])), payload)
    } else {
        (None, rest)
    };

    Ok(Publish {
        topic,
        qos,
        packet_id,
        retain: flags & RETAIN != 0,
        payload,
    })
}
