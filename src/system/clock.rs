//! Time source for protocol timers.
//!
//! Clients never read a global clock. The caller hands one in, which keeps the
//! crate usable on targets without an OS timer and lets tests advance time by
//! hand.

/// A monotonic millisecond counter.
///
/// The origin is arbitrary; only differences between readings matter.
pub trait Clock {
    /// Milliseconds elapsed since the clock's origin.
    fn now_ms(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// A [`Clock`] backed by `std::time::Instant`.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl SystemClock {
    /// Start a clock at zero.
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}
