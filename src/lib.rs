//! # libiot-comm - Modbus and MQTT for IoT devices
//!
//! Protocol clients for the two buses a typical IoT gateway sits between: a
//! Modbus master that polls field devices over TCP or a serial line, and an
//! MQTT 3.1.1 client that forwards the data to a broker. The library is
//! designed for embedded systems and supports `no_std` environments.
//!
//! ## Features
//!
//! ### Modbus Client
//! - TCP (MBAP header, transaction id correlation) and RTU (CRC16) framing
//! - Read coils, discrete inputs, holding and input registers
//! - Write multiple coils and multiple holding registers
//! - Exception responses surfaced as typed errors
//!
//! ### MQTT Client
//! - CONNECT/CONNACK handshake, optional TLS upgrade
//! - QoS 0 and QoS 1 publishing with automatic retransmission
//! - Exact-topic subscriptions with per-topic handlers
//! - Explicit, caller-driven poll cycle
//!
//! ### Transport Abstraction
//! - TCP stacks plug in through [`network::Connect`]
//! - Serial drivers plug in through [`network::SerialBus`]
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libiot-comm = { version = "0.1.0", features = ["log"] }
//! ```
//!
//! ### Modbus RTU Example
//!
//! ```rust,no_run
//! use libiot_comm::network::application::modbus::{Client, DataType};
//! use libiot_comm::network::SerialConfig;
//! # use libiot_comm::network::{Close, Connection, PortInfo, Read, SerialBus, SerialPort, Write};
//! # use libiot_comm::network::error::Error;
//! # struct Uart;
//! # impl Connection for Uart {}
//! # impl Read for Uart {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl Write for Uart {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl Close for Uart {
//! #     type Error = ();
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl SerialPort for Uart {
//! #     fn configure(&mut self, _config: &SerialConfig) -> Result<(), Error> { Ok(()) }
//! # }
//! # struct Ports;
//! # impl SerialBus for Ports {
//! #     type Port = Uart;
//! #     type Error = ();
//! #     fn enumerate(&mut self) -> Result<heapless::Vec<PortInfo, 16>, ()> {
//! #         let mut ports = heapless::Vec::new();
//! #         ports.push(PortInfo::new("/dev/ttyUSB0").map_err(|_| ())?).map_err(|_| ())?;
//! #         Ok(ports)
//! #     }
//! #     fn open(&mut self, _port: &PortInfo) -> Result<Uart, ()> { Ok(Uart) }
//! # }
//! # fn main() -> Result<(), Error> {
//! let mut ports = Ports;
//! let mut client = Client::new();
//! client.connect_rtu(&mut ports, "/dev/ttyUSB0", &SerialConfig::default())?;
//! client.set_unit_id(17);
//!
//! let response = client.read(DataType::InputRegister, 0x0000, 4)?;
//! let registers = response.registers()?;
//! # let _ = registers;
//! # Ok(())
//! # }
//! ```
//!
//! ### MQTT Client Example
//!
//! See [`network::application::mqtt`].
//!
//! ## Platform Support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers (ARM Cortex-M, RISC-V, etc.)
//! - Linux-based IoT devices (Raspberry Pi, etc.)
//! - Any platform supporting Rust's `core` library
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support, including [`system::clock::SystemClock`] (default: disabled)
//! - `log`: Emit diagnostics through the `log` facade
//! - `defmt`: Emit diagnostics through `defmt` and derive `defmt::Format` on public types

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![doc(html_root_url = "https://shishir-dey.github.io/libiot/")]

#[macro_use]
mod fmt;

/// Network abstraction layer and protocol clients.
///
/// Contains the transport traits the platform implements and the Modbus and
/// MQTT clients built on top of them.
pub mod network;

/// System utilities for embedded devices.
///
/// Currently the time source used by protocol timers.
pub mod system;
