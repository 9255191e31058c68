//! An MQTT client implementation based on the MQTT 3.1.1 specification.

use super::packet::{self, Packet};
use super::{
    MAX_CLIENT_ID_LEN, MAX_PACKET_LEN, MAX_PAYLOAD_LEN, MAX_PENDING, MAX_SUBSCRIPTIONS,
    MAX_TOPIC_LEN, MessageHandler, Options, QoS, RETRY_INTERVAL_MS,
};
use crate::network::error::Error;
use crate::network::{Connect, Connection, Read, read_exact, remote_address, write_all};
use crate::system::clock::Clock;
use core::fmt;
use heapless::{FnvIndexMap, String, Vec};

/// Connection state of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// No broker connection.
    Disconnected,
    /// CONNECT sent, waiting for CONNACK.
    Connecting,
    /// CONNACK accepted.
    Connected,
}

/// A QoS 1 message the broker has not acknowledged yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPublish {
    topic: String<MAX_TOPIC_LEN>,
    payload: Vec<u8, MAX_PAYLOAD_LEN>,
    retain: bool,
    last_sent_ms: u64,
}

impl PendingPublish {
    /// Topic the message is published to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Message bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether the message carries the retain flag.
    pub fn retain(&self) -> bool {
        self.retain
    }

    /// Clock reading of the most recent transmission.
    pub fn last_sent_ms(&self) -> u64 {
        self.last_sent_ms
    }
}

/// An MQTT 3.1.1 client for publish-subscribe messaging.
///
/// # Type Parameters
///
/// * `C` - The connection type implementing [`Connection`]
/// * `K` - The [`Clock`] driving QoS 1 retransmission
/// * `H` - The [`MessageHandler`] stored per subscription
///
/// The client is single-threaded and does no work on its own; inbound traffic
/// and retransmission only happen inside [`poll`](Client::poll). Handlers run
/// on the caller's thread, inside `poll`.
///
/// Any transport failure drops the connection and returns the client to
/// [`State::Disconnected`]. Subscriptions and unacknowledged messages are kept
/// and the messages are retransmitted after the next successful
/// [`connect`](Client::connect).
pub struct Client<C: Connection, K: Clock, H: MessageHandler> {
    client_id: String<MAX_CLIENT_ID_LEN>,
    keep_alive_seconds: u16,
    clean_session: bool,
    clock: K,
    connection: Option<C>,
    state: State,
    subscriptions: FnvIndexMap<String<MAX_TOPIC_LEN>, H, MAX_SUBSCRIPTIONS>,
    pending: FnvIndexMap<u16, PendingPublish, MAX_PENDING>,
    next_packet_id: u16,
}

impl<C: Connection, K: Clock, H: MessageHandler> Client<C, K, H> {
    /// Create a disconnected client.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] - The client id is longer than [`MAX_CLIENT_ID_LEN`]
    pub fn new(options: &Options<'_>, clock: K) -> Result<Self, Error> {
        Ok(Self {
            client_id: String::try_from(options.client_id).map_err(|_| Error::InvalidArgument)?,
            keep_alive_seconds: options.keep_alive_seconds,
            clean_session: options.clean_session,
            clock,
            connection: None,
            state: State::Disconnected,
            subscriptions: FnvIndexMap::new(),
            pending: FnvIndexMap::new(),
            next_packet_id: 1,
        })
    }

    /// Client identifier sent in CONNECT.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Keep-alive interval sent in CONNECT, in seconds.
    pub fn keep_alive_seconds(&self) -> u16 {
        self.keep_alive_seconds
    }

    /// Current connection state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Whether the broker accepted the session.
    pub fn is_connected(&self) -> bool {
        self.state == State::Connected
    }

    /// Number of QoS 1 messages awaiting PUBACK.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether the message with `packet_id` still awaits PUBACK.
    pub fn is_pending(&self, packet_id: u16) -> bool {
        self.pending.contains_key(&packet_id)
    }

    /// The unacknowledged message with `packet_id`.
    pub fn pending(&self, packet_id: u16) -> Option<&PendingPublish> {
        self.pending.get(&packet_id)
    }

    /// Number of subscribed topics.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// The handler registered for `topic`.
    pub fn subscription(&self, topic: &str) -> Option<&H> {
        let key = String::<MAX_TOPIC_LEN>::try_from(topic).ok()?;
        self.subscriptions.get(&key)
    }

    /// Mutable access to the handler registered for `topic`.
    pub fn subscription_mut(&mut self, topic: &str) -> Option<&mut H> {
        let key = String::<MAX_TOPIC_LEN>::try_from(topic).ok()?;
        self.subscriptions.get_mut(&key)
    }

    /// Open a connection to the broker at `host:port` and perform the MQTT
    /// handshake.
    ///
    /// With `use_tls` the connection is upgraded through
    /// [`Connect::upgrade_tls`] before CONNECT is sent. An already open
    /// connection is closed first, without sending DISCONNECT.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidAddress`] - Empty host
    /// * [`Error::ConnectionRefused`] - The transport could not connect, or
    ///   the broker answered with a refusal return code (1 to 5)
    /// * [`Error::ProtocolError`] - Malformed CONNACK
    /// * [`Error::WriteError`], [`Error::Timeout`], [`Error::ConnectionClosed`] -
    ///   Transport failure during the handshake
    pub fn connect<N>(
        &mut self,
        network: &mut N,
        host: &str,
        port: u16,
        use_tls: bool,
    ) -> Result<(), Error>
    where
        N: Connect<Connection = C>,
    {
        let remote = remote_address(host, port)?;
        self.close_active();
        self.state = State::Connecting;

        let mut connection = match network.connect(&remote) {
            Ok(connection) => connection,
            Err(_) => {
                error!("mqtt: connect to {} failed", remote.as_str());
                self.state = State::Disconnected;
                return Err(Error::ConnectionRefused);
            }
        };

        if let Err(err) = self.handshake(network, &mut connection, use_tls) {
            error!("mqtt: handshake with {} failed: {:?}", remote.as_str(), err);
            if connection.close().is_err() {
                warn!("mqtt: error while closing transport");
            }
            self.state = State::Disconnected;
            return Err(err);
        }

        self.connection = Some(connection);
        self.state = State::Connected;
        info!("mqtt: connected to {}", remote.as_str());
        Ok(())
    }

    fn handshake<N>(&self, network: &mut N, connection: &mut C, use_tls: bool) -> Result<(), Error>
    where
        N: Connect<Connection = C>,
    {
        if use_tls {
            network.upgrade_tls(connection)?;
        }
        let connect = packet::connect(&self.client_id, self.keep_alive_seconds, self.clean_session)?;
        write_all(connection, &connect)?;

        let mut connack = [0u8; 4];
        read_exact(connection, &mut connack)?;
        packet::check_connack(&connack)
    }

    /// Send DISCONNECT and close the connection.
    ///
    /// The connection is closed even if DISCONNECT cannot be written.
    pub fn disconnect(&mut self) -> Result<(), Error> {
        let Some(mut connection) = self.connection.take() else {
            return Err(Error::NotOpen);
        };
        if write_all(&mut connection, &packet::disconnect()).is_err() {
            warn!("mqtt: DISCONNECT could not be sent");
        }
        if connection.close().is_err() {
            warn!("mqtt: error while closing transport");
        }
        self.state = State::Disconnected;
        info!("mqtt: disconnected");
        Ok(())
    }

    /// Publish `payload` to `topic`.
    ///
    /// At QoS 0 the message is sent and forgotten; the result is `Ok(None)`.
    /// At QoS 1 the message is copied into the pending table once it has been
    /// sent and stays there until the broker's PUBACK arrives; the result is
    /// its packet id. A message whose first write fails is not retained.
    ///
    /// # Errors
    ///
    /// * [`Error::NotOpen`] - Not connected
    /// * [`Error::InvalidArgument`] - Empty or oversized topic, oversized payload
    /// * [`Error::Unsupported`] - QoS 2
    /// * [`Error::BufferOverflow`] - [`MAX_PENDING`] messages already await PUBACK
    /// * [`Error::WriteError`] - Transport failure; the connection is dropped
    pub fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<Option<u16>, Error> {
        self.ensure_connected()?;
        check_topic(topic)?;
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::InvalidArgument);
        }

        match qos {
            QoS::AtMostOnce => {
                let packet = packet::publish(topic, payload, qos, retain, None)?;
                self.send(&packet)?;
                trace!("mqtt: published to {}", topic);
                Ok(None)
            }
            QoS::AtLeastOnce => {
                if self.pending.len() >= MAX_PENDING {
                    warn!("mqtt: pending table full, publish to {} refused", topic);
                    return Err(Error::BufferOverflow);
                }
                let packet_id = self.allocate_packet_id();
                let packet = packet::publish(topic, payload, qos, retain, Some(packet_id))?;
                let topic_copy = String::try_from(topic).map_err(|_| Error::InvalidArgument)?;
                let payload_copy = Vec::from_slice(payload).map_err(|_| Error::InvalidArgument)?;
                self.send(&packet)?;
                let entry = PendingPublish {
                    topic: topic_copy,
                    payload: payload_copy,
                    retain,
                    last_sent_ms: self.clock.now_ms(),
                };
                self.pending
                    .insert(packet_id, entry)
                    .map_err(|_| Error::BufferOverflow)?;
                debug!("mqtt: published {} to {}", packet_id, topic);
                Ok(Some(packet_id))
            }
            QoS::ExactlyOnce => Err(Error::Unsupported),
        }
    }

    /// Subscribe to `topic` and route its messages to `handler`.
    ///
    /// Topics are matched exactly; wildcards are sent to the broker as-is but
    /// no local filter matching is done. Subscribing again to the same topic
    /// replaces the handler. The handler is registered before SUBSCRIBE goes
    /// out and stays registered if sending fails.
    ///
    /// # Errors
    ///
    /// * [`Error::NotOpen`] - Not connected
    /// * [`Error::InvalidArgument`] - Empty or oversized topic
    /// * [`Error::BufferOverflow`] - [`MAX_SUBSCRIPTIONS`] other topics are
    ///   already subscribed
    /// * [`Error::WriteError`] - Transport failure; the connection is dropped
    pub fn subscribe(&mut self, topic: &str, handler: H) -> Result<(), Error> {
        self.ensure_connected()?;
        check_topic(topic)?;
        let key = String::try_from(topic).map_err(|_| Error::InvalidArgument)?;
        self.subscriptions.insert(key, handler).map_err(|_| {
            warn!("mqtt: subscription table full, {} refused", topic);
            Error::BufferOverflow
        })?;

        let packet_id = self.allocate_packet_id();
        self.send(&packet::subscribe(packet_id, topic)?)?;
        debug!("mqtt: subscribed to {}", topic);
        Ok(())
    }

    /// Remove the handler for `topic` and send UNSUBSCRIBE.
    ///
    /// Unknown topics are not an error; the broker is told regardless.
    pub fn unsubscribe(&mut self, topic: &str) -> Result<(), Error> {
        self.ensure_connected()?;
        check_topic(topic)?;
        if let Ok(key) = String::<MAX_TOPIC_LEN>::try_from(topic) {
            self.subscriptions.remove(&key);
        }

        let packet_id = self.allocate_packet_id();
        self.send(&packet::unsubscribe(packet_id, topic)?)?;
        debug!("mqtt: unsubscribed from {}", topic);
        Ok(())
    }

    /// Run one processing cycle.
    ///
    /// Waits up to `timeout_ms` for an inbound packet and handles it:
    ///
    /// - PUBLISH: QoS 1 messages are acknowledged with PUBACK first, then the
    ///   handler registered for the exact topic is invoked. Messages on other
    ///   topics are dropped.
    /// - PUBACK: the matching pending message is released.
    /// - Anything else (SUBACK, UNSUBACK, PINGRESP, ...) is read and discarded.
    ///
    /// Then every pending message last sent at least [`RETRY_INTERVAL_MS`]
    /// ago is sent again, byte for byte.
    ///
    /// A quiet connection is not an error. Packets larger than
    /// [`MAX_PACKET_LEN`] are skipped and reported as
    /// [`Error::BufferOverflow`]; the connection stays usable.
    pub fn poll(&mut self, timeout_ms: u32) -> Result<(), Error> {
        self.ensure_connected()?;
        let inbound = self.process_inbound(timeout_ms);
        if self.state == State::Connected {
            self.retransmit_overdue()?;
        }
        inbound
    }

    fn process_inbound(&mut self, timeout_ms: u32) -> Result<(), Error> {
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;
        if connection.set_timeout(timeout_ms).is_err() {
            return Err(self.lose_connection(Error::ReadError));
        }

        let mut fixed_header = [0u8; 2];
        match read_exact(connection, &mut fixed_header) {
            Ok(()) => {}
            Err(Error::Timeout) => return Ok(()),
            Err(err) => return Err(self.lose_connection(err)),
        }

        let mut body = Packet::new();
        match read_body(connection, fixed_header[1], &mut body) {
            Ok(()) => {}
            Err(Error::BufferOverflow) => {
                warn!("mqtt: skipped oversized packet {}", fixed_header[0]);
                return Err(Error::BufferOverflow);
            }
            Err(err) => return Err(self.lose_connection(err)),
        }

        let flags = fixed_header[0] & 0x0F;
        match fixed_header[0] >> 4 {
            packet::PUBLISH_TYPE => self.handle_publish(flags, &body),
            packet::PUBACK_TYPE => self.handle_puback(&body),
            other => {
                trace!("mqtt: discarded packet type {}", other);
                Ok(())
            }
        }
    }

    fn handle_publish(&mut self, flags: u8, body: &[u8]) -> Result<(), Error> {
        let publish = packet::parse_publish(flags, body)?;
        match publish.qos {
            QoS::AtMostOnce => {}
            QoS::AtLeastOnce => {
                let packet_id = publish.packet_id.ok_or(Error::ProtocolError)?;
                self.send(&packet::puback(packet_id))?;
            }
            QoS::ExactlyOnce => {
                warn!("mqtt: QoS 2 publish on {} not acknowledged", publish.topic);
            }
        }

        let handler = String::<MAX_TOPIC_LEN>::try_from(publish.topic)
            .ok()
            .and_then(|key| self.subscriptions.get_mut(&key));
        match handler {
            Some(handler) => handler.on_message(publish.topic, publish.payload),
            None => trace!("mqtt: no handler for {}", publish.topic),
        }
        Ok(())
    }

    fn handle_puback(&mut self, body: &[u8]) -> Result<(), Error> {
        let [hi, lo] = body else {
            return Err(Error::ProtocolError);
        };
        let packet_id = u16::from_be_bytes([*hi, *lo]);
        if self.pending.remove(&packet_id).is_some() {
            debug!("mqtt: publish {} acknowledged", packet_id);
        } else {
            trace!("mqtt: PUBACK for unknown packet {}", packet_id);
        }
        Ok(())
    }

    /// Resend every pending message whose last transmission is overdue.
    fn retransmit_overdue(&mut self) -> Result<(), Error> {
        let now = self.clock.now_ms();
        let Some(connection) = self.connection.as_mut() else {
            return Ok(());
        };

        let mut failure = None;
        for (&packet_id, entry) in self.pending.iter_mut() {
            if now.saturating_sub(entry.last_sent_ms) < RETRY_INTERVAL_MS {
                continue;
            }
            let packet = packet::publish(
                &entry.topic,
                &entry.payload,
                QoS::AtLeastOnce,
                entry.retain,
                Some(packet_id),
            )?;
            if let Err(err) = write_all(connection, &packet) {
                failure = Some(err);
                break;
            }
            entry.last_sent_ms = now;
            debug!("mqtt: resent publish {}", packet_id);
        }

        match failure {
            Some(err) => Err(self.lose_connection(err)),
            None => Ok(()),
        }
    }

    /// Next packet id, skipping 0 and ids still awaiting PUBACK.
    fn allocate_packet_id(&mut self) -> u16 {
        loop {
            let packet_id = self.next_packet_id;
            self.next_packet_id = match self.next_packet_id.wrapping_add(1) {
                0 => 1,
                next => next,
            };
            if !self.pending.contains_key(&packet_id) {
                return packet_id;
            }
        }
    }

    fn ensure_connected(&self) -> Result<(), Error> {
        if self.state == State::Connected && self.connection.is_some() {
            Ok(())
        } else {
            Err(Error::NotOpen)
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;
        write_all(connection, bytes).map_err(|err| self.lose_connection(err))
    }

    fn close_active(&mut self) {
        if let Some(connection) = self.connection.take() {
            if connection.close().is_err() {
                warn!("mqtt: error while closing transport");
            }
        }
        self.state = State::Disconnected;
    }

    fn lose_connection(&mut self, err: Error) -> Error {
        error!("mqtt: transport failure {:?}, closing", err);
        self.close_active();
        err
    }
}

impl<C: Connection, K: Clock, H: MessageHandler> fmt::Debug for Client<C, K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("client_id", &self.client_id)
            .field("state", &self.state)
            .field("subscriptions", &self.subscriptions.len())
            .field("pending", &self.pending.len())
            .field("next_packet_id", &self.next_packet_id)
            .finish()
    }
}

fn check_topic(topic: &str) -> Result<(), Error> {
    if topic.is_empty() || topic.len() > MAX_TOPIC_LEN {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

/// Read the rest of the remaining length field and the body it announces.
///
/// A body larger than `body` can hold is drained from the stream and reported
/// as [`Error::BufferOverflow`].
fn read_body<R: Read + ?Sized>(
    reader: &mut R,
    first_length_byte: u8,
    body: &mut Packet,
) -> Result<(), Error> {
    let mut encoded: Vec<u8, 4> = Vec::new();
    encoded
        .push(first_length_byte)
        .map_err(|_| Error::ProtocolError)?;
    let remaining = loop {
        if let Some((len, _)) = packet::decode_remaining_length(&encoded)? {
            break len;
        }
        let mut byte = [0u8; 1];
        read_exact(reader, &mut byte).map_err(mid_packet)?;
        encoded.push(byte[0]).map_err(|_| Error::ProtocolError)?;
    };

    if remaining > MAX_PACKET_LEN {
        drain(reader, remaining)?;
        return Err(Error::BufferOverflow);
    }
    body.resize(remaining, 0)
        .map_err(|_| Error::BufferOverflow)?;
    read_exact(reader, body).map_err(mid_packet)
}

/// Discard `len` bytes from the stream.
fn drain<R: Read + ?Sized>(reader: &mut R, mut len: usize) -> Result<(), Error> {
    let mut scratch = [0u8; 64];
    while len > 0 {
        let chunk = len.min(scratch.len());
        read_exact(reader, &mut scratch[..chunk]).map_err(mid_packet)?;
        len -= chunk;
    }
    Ok(())
}

/// Once a fixed header has been read, silence means the stream is broken.
fn mid_packet(err: Error) -> Error {
    match err {
        Error::Timeout => Error::ReadError,
        other => other,
    }
}
