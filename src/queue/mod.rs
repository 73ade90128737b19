//! # Transmit Queue
//!
//! Bounded pending-delivery buffer shared by every producer (routing,
//! beacons, local TNC). Each entry names the channels it still has to reach
//! and a release delay for RF.
//!
//! The dispatcher runs once per scheduler tick and attempts each channel at
//! most once per entry. There is no retry: a bit is cleared as soon as
//! delivery was attempted, and entries older than [`ENTRY_TTL_MS`] are dropped
//! whatever is left.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use tracing::{debug, warn};

use crate::error::{GatewayError, Result};

/// Default number of queue slots
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Payload bytes kept per entry; longer payloads are truncated
pub const MAX_PAYLOAD_LEN: usize = 350;

/// Hard age ceiling for an entry
pub const ENTRY_TTL_MS: u64 = 60_000;

/// Destination channels of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelMask(u8);

impl ChannelMask {
    pub const NONE: Self = Self(0);
    pub const RF: Self = Self(1 << 0);
    pub const INTERNET: Self = Self(1 << 1);
    pub const TNC: Self = Self(1 << 2);
    /// Payload is a third-party wrapped frame; serviced together with RF
    pub const THIRD_PARTY: Self = Self(1 << 3);

    const DELIVERY: u8 = Self::RF.0 | Self::INTERNET.0 | Self::TNC.0;

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True when no delivery channel is left
    #[must_use]
    pub const fn is_delivered(self) -> bool {
        self.0 & Self::DELIVERY == 0
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for ChannelMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChannelMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ChannelMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::RF, "rf"),
            (Self::INTERNET, "inet"),
            (Self::TNC, "tnc"),
            (Self::THIRD_PARTY, "3rd"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&set.join("+"))
        }
    }
}

/// Delivery endpoints the dispatcher hands payloads to.
#[cfg_attr(test, mockall::automock)]
pub trait ChannelSink {
    /// APRS-IS uplink is logged in
    fn internet_connected(&self) -> bool;

    fn send_internet(&mut self, payload: &[u8]) -> Result<()>;

    /// Power up / PTT the transmitter before an RF send.
    fn key_transmitter(&mut self) {}

    fn send_rf(&mut self, payload: &[u8]) -> Result<()>;

    fn unkey_transmitter(&mut self) {}

    fn send_tnc(&mut self, payload: &[u8]) -> Result<()>;
}

/// One queue slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxEntry {
    pub active: bool,
    pub mask: ChannelMask,
    pub enqueued_ms: u64,
    pub delay_ms: u64,
    pub payload: Vec<u8>,
}

impl TxEntry {
    fn elapsed(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.enqueued_ms)
    }
}

/// What one dispatcher pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub tx_rf: u32,
    pub tx_internet: u32,
    pub tx_tnc: u32,
    /// Channel attempts dropped without delivery
    pub dropped: u32,
    pub errors: u32,
}

/// Fixed-capacity transmit queue.
#[derive(Debug, Clone)]
pub struct TxQueue {
    entries: Vec<TxEntry>,
}

impl Default for TxQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl TxQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![TxEntry::default(); capacity.max(1)],
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of active entries
    #[must_use]
    pub fn pending(&self) -> usize {
        self.entries.iter().filter(|e| e.active).count()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TxEntry> {
        self.entries.get(index).filter(|e| e.active)
    }

    pub fn active(&self) -> impl Iterator<Item = &TxEntry> {
        self.entries.iter().filter(|e| e.active)
    }

    /// Queue `payload` for the channels in `mask`, returning the slot used.
    ///
    /// Payloads without a `SRC>` header are rejected. The first inactive slot
    /// is reused; a full queue returns [`GatewayError::QueueFull`].
    pub fn enqueue(&mut self, payload: &[u8], delay_ms: u64, mask: ChannelMask, now_ms: u64) -> Result<usize> {
        if !payload.contains(&b'>') {
            return Err(GatewayError::MalformedPacket(format!(
                "missing '>' in {}",
                String::from_utf8_lossy(payload)
            )));
        }

        let index = self
            .entries
            .iter()
            .position(|e| !e.active)
            .ok_or(GatewayError::QueueFull)?;

        if payload.len() > MAX_PAYLOAD_LEN {
            debug!("Truncating {} byte payload to {}", payload.len(), MAX_PAYLOAD_LEN);
        }
        let payload = &payload[..payload.len().min(MAX_PAYLOAD_LEN)];

        let entry = &mut self.entries[index];
        entry.active = true;
        entry.mask = mask;
        entry.enqueued_ms = now_ms;
        entry.delay_ms = delay_ms;
        entry.payload.clear();
        entry.payload.extend_from_slice(payload);

        debug!("Queued [{}] delay={}ms slot={}: {}", mask, delay_ms, index, String::from_utf8_lossy(payload));
        Ok(index)
    }

    /// Service every active entry once.
    pub fn dispatch(&mut self, now_ms: u64, internet_enabled: bool, sink: &mut dyn ChannelSink) -> DispatchReport {
        let mut report = DispatchReport::default();

        for entry in self.entries.iter_mut().filter(|e| e.active) {
            let elapsed = entry.elapsed(now_ms);

            if entry.mask.contains(ChannelMask::INTERNET) {
                if internet_enabled && sink.internet_connected() {
                    match sink.send_internet(&entry.payload) {
                        Ok(()) => report.tx_internet += 1,
                        Err(e) => {
                            warn!("APRS-IS send failed: {}", e);
                            report.errors += 1;
                        }
                    }
                } else {
                    report.dropped += 1;
                }
                entry.mask.remove(ChannelMask::INTERNET);
            }

            if entry.mask.contains(ChannelMask::RF) && elapsed >= entry.delay_ms {
                sink.key_transmitter();
                let sent = sink.send_rf(&entry.payload);
                sink.unkey_transmitter();
                match sent {
                    Ok(()) => report.tx_rf += 1,
                    Err(e) => {
                        warn!("RF send failed: {}", e);
                        report.errors += 1;
                    }
                }
                entry.mask.remove(ChannelMask::RF);
                entry.mask.remove(ChannelMask::THIRD_PARTY);
            }

            if entry.mask.contains(ChannelMask::TNC) {
                match sink.send_tnc(&entry.payload) {
                    Ok(()) => report.tx_tnc += 1,
                    Err(e) => {
                        debug!("Local TNC send failed: {}", e);
                        report.errors += 1;
                    }
                }
                entry.mask.remove(ChannelMask::TNC);
            }

            if entry.mask.is_delivered() {
                entry.active = false;
            } else if elapsed > ENTRY_TTL_MS {
                debug!("Dropping expired entry [{}]: {}", entry.mask, String::from_utf8_lossy(&entry.payload));
                report.dropped += 1;
                entry.active = false;
            }
        }

        report
    }

    /// Cancel pending RF entries carrying the same frame as `candidate`.
    ///
    /// Frames match when the `SRC>` header and the information field after the
    /// first `:` are equal. Only entries still holding the RF bit are scanned;
    /// TNC-only copies are never cancelled. Returns true if anything was
    /// cancelled.
    pub fn duplicate_check(&mut self, candidate: &[u8]) -> bool {
        let Some((source, info)) = split_frame(candidate) else {
            return false;
        };

        let mut found = false;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.active && e.mask.contains(ChannelMask::RF))
        {
            if let Some((entry_source, entry_info)) = split_frame(&entry.payload) {
                if entry_source == source && entry_info == info {
                    debug!("Duplicate cancels pending: {}", String::from_utf8_lossy(&entry.payload));
                    entry.active = false;
                    found = true;
                }
            }
        }
        found
    }
}

/// Split a TNC2 frame into its `SRC>` prefix and information field.
fn split_frame(frame: &[u8]) -> Option<(&[u8], &[u8])> {
    let gt = frame.iter().position(|&b| b == b'>')?;
    let colon = gt + frame[gt..].iter().position(|&b| b == b':')?;
    Some((&frame[..=gt], &frame[colon + 1..]))
}
