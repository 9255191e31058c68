//! MQTT 3.1.1 protocol implementation for embedded systems.
//!
//! This module provides a publish/subscribe client designed for `no_std`
//! environments. MQTT (Message Queuing Telemetry Transport) is a lightweight
//! publish-subscribe messaging protocol ideal for IoT applications.
//!
//! # Protocol Overview
//!
//! MQTT uses a publish-subscribe pattern where:
//! - **Publishers** send messages to topics
//! - **Subscribers** receive messages from topics they're interested in
//! - **Brokers** route messages between publishers and subscribers
//!
//! # Key Features
//!
//! - CONNECT/CONNACK handshake with optional TLS upgrade
//! - QoS 0 and QoS 1 publishing, with retransmission of unacknowledged QoS 1
//!   messages every [`RETRY_INTERVAL_MS`]
//! - Per-topic message handlers, dispatched on exact topic match
//! - Fixed-capacity tables for subscriptions and in-flight messages
//!
//! # Usage
//!
//! The application drives the client: it calls [`Client::poll`] periodically,
//! which reads at most one inbound packet, invokes the matching handler and
//! retransmits whatever is overdue.
//!
//! ```rust,no_run
//! use libiot_comm::network::application::mqtt::{Client, Options, QoS};
//! use libiot_comm::system::clock::Clock;
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
//! # struct Ticks;
//! # impl Clock for Ticks { fn now_ms(&self) -> u64 { 0 } }
//! # fn main() -> Result<(), libiot_comm::network::error::Error> {
//! let mut network = Network;
//! let options = Options::new("sensor_device_01");
//! let mut client = Client::new(&options, Ticks)?;
//!
//! client.connect(&mut network, "broker.local", 1883, false)?;
//! client.subscribe("commands/relay", |_topic: &str, payload: &[u8]| {
//!     // switch the relay according to `payload`
//!     let _ = payload;
//! })?;
//! client.publish("sensors/temperature", b"23.5", QoS::AtLeastOnce, false)?;
//!
//! loop {
//!     client.poll(100)?;
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

use crate::network::error::Error;
use serde::Deserialize;

/// MQTT client implementation.
pub mod client;

/// Control packet encoding and decoding.
pub mod packet;

pub use client::{Client, PendingPublish, State};

/// Longest client identifier accepted by [`Client::new`].
pub const MAX_CLIENT_ID_LEN: usize = 64;
/// Longest topic accepted for publishing or subscribing.
pub const MAX_TOPIC_LEN: usize = 128;
/// Largest payload accepted by [`Client::publish`].
pub const MAX_PAYLOAD_LEN: usize = 1024;
/// Largest packet the client builds or accepts.
pub const MAX_PACKET_LEN: usize = 1280;
/// Number of topics that can be subscribed at once.
pub const MAX_SUBSCRIPTIONS: usize = 8;
/// Number of QoS 1 messages that can await acknowledgement at once.
pub const MAX_PENDING: usize = 8;
/// Minimum age of an unacknowledged QoS 1 message before it is resent.
pub const RETRY_INTERVAL_MS: u64 = 5000;
/// Keep-alive used when none is configured.
pub const DEFAULT_KEEP_ALIVE_SECONDS: u16 = 60;

/// Quality of Service levels for MQTT messages.
///
/// QoS defines the guarantee of delivery for a specific message. The client
/// sends at QoS 0 and 1; QoS 2 is recognised on the wire but refused when
/// publishing.
///
/// ```rust
/// use libiot_comm::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::AtLeastOnce as u8, 1);
/// assert_eq!(QoS::try_from(2), Ok(QoS::ExactlyOnce));
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QoS {
    /// **QoS 0**: At most once delivery.
    ///
    /// Messages are delivered according to the best effort of the underlying network.
    /// Message loss can occur.
    AtMostOnce = 0,

    /// **QoS 1**: At least once delivery.
    ///
    /// Messages are kept until the broker acknowledges them and resent
    /// otherwise, so duplicates can occur.
    AtLeastOnce = 1,

    /// **QoS 2**: Exactly once delivery.
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(Error::ProtocolError),
        }
    }
}

/// Configuration options for MQTT client connection.
///
/// ```rust
/// use libiot_comm::network::application::mqtt::Options;
///
/// let options = Options::from_json(r#"{"client_id":"pump-7","keep_alive_seconds":30}"#).unwrap();
/// assert_eq!(options.client_id, "pump-7");
/// assert_eq!(options.keep_alive_seconds, 30);
/// assert!(options.clean_session);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Options<'a> {
    /// The client identifier, must be unique within the broker.
    ///
    /// If a client connects with a client identifier that is already in use by
    /// another client, the broker will disconnect the existing client.
    #[serde(borrow)]
    pub client_id: &'a str,

    /// The keep-alive time interval in seconds.
    ///
    /// Sent to the broker in CONNECT. A value of 0 disables keep-alive.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u16,

    /// Whether to start a clean session.
    ///
    /// - `true`: The broker will discard any previous session state and start fresh
    /// - `false`: The broker will resume the previous session if one exists
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,
}

fn default_keep_alive() -> u16 {
    DEFAULT_KEEP_ALIVE_SECONDS
}

fn default_clean_session() -> bool {
    true
}

impl<'a> Options<'a> {
    /// Options for `client_id` with the default keep-alive and a clean session.
    pub fn new(client_id: &'a str) -> Self {
        Self {
            client_id,
            keep_alive_seconds: DEFAULT_KEEP_ALIVE_SECONDS,
            clean_session: true,
        }
    }

    /// Parse options from a JSON object. Only `client_id` is required.
    pub fn from_json(json: &'a str) -> Result<Self, Error> {
        let (options, _): (Self, usize) =
            serde_json_core::from_str(json).map_err(|_| Error::InvalidArgument)?;
        Ok(options)
    }
}

/// Receives the messages published to a subscribed topic.
///
/// Closures taking `(&str, &[u8])` implement this trait, so most callers pass
/// one straight to [`Client::subscribe`].
pub trait MessageHandler {
    /// Called once per inbound PUBLISH on the subscribed topic.
    fn on_message(&mut self, topic: &str, payload: &[u8]);
}

impl<F> MessageHandler for F
where
    F: FnMut(&str, &[u8]),
{
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        self(topic, payload)
    }
}
