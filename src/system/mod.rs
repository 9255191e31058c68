//! System utilities for embedded devices.
//!
//! This module provides the platform hooks the protocol clients need beyond
//! the byte stream itself.
//!
//! # Available Utilities
//!
//! - **[`clock`]**: Millisecond time source used for retransmission timing

/// Monotonic millisecond clock abstraction.
///
/// Provides the [`Clock`](clock::Clock) trait and, with the `std` feature, a
/// [`SystemClock`](clock::SystemClock) backed by `std::time::Instant`.
pub mod clock;
