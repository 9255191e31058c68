//! # Application Layer Network Protocols
//!
//! Protocol clients for industrial and IoT messaging. Each client owns one
//! connection obtained from the platform through the core network traits and
//! keeps all of its state in fixed-capacity buffers.
//!
//! ## Available Protocols
//!
//! - **[`modbus`]**: Modbus master over TCP or RTU (serial) for polling PLCs,
//!   meters and drives
//! - **[`mqtt`]**: MQTT 3.1.1 client for lightweight publish-subscribe messaging
//!
//! ## Design Principles
//!
//! - **Connection Agnostic**: Work with any type implementing [`Connection`](crate::network::Connection)
//! - **No-std Compatible**: No heap allocation
//! - **Caller Driven**: No background tasks; every byte moves inside a method
//!   the application calls
//!
//! A gateway typically runs both side by side: read registers over Modbus and
//! publish the values over MQTT.

/// Modbus TCP and RTU client.
///
/// Reads coils, discrete inputs, holding and input registers and writes
/// coils and holding registers.
pub mod modbus;

/// MQTT client implementation.
///
/// Provides an MQTT 3.1.1 client for lightweight publish-subscribe messaging,
/// commonly used in IoT applications.
pub mod mqtt;
