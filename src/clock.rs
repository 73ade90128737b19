//! Time source handed to every time-dependent routing operation.

use std::time::Instant;

/// Point-in-time reading of both clocks the core needs.
///
/// `uptime_ms` drives queue delays and beacon intervals, `unix_s` stamps
/// table entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Clock {
    pub uptime_ms: u64,
    pub unix_s: u64,
}

impl Clock {
    #[must_use]
    pub const fn new(uptime_ms: u64, unix_s: u64) -> Self {
        Self { uptime_ms, unix_s }
    }

    /// Read the process uptime relative to `started` and the wall clock.
    #[must_use]
    pub fn now(started: Instant) -> Self {
        let uptime_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let unix_s = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        Self { uptime_ms, unix_s }
    }

    /// Same wall clock, uptime advanced by `ms`.
    #[must_use]
    pub const fn advance_ms(self, ms: u64) -> Self {
        Self {
            uptime_ms: self.uptime_ms + ms,
            unix_s: self.unix_s + (self.uptime_ms + ms) / 1000 - self.uptime_ms / 1000,
        }
    }
}
