//! Digipeater path processing.
//!
//! The first hop after the last `*` decides whether a frame is repeated:
//! our own call is consumed outright, `WIDEn-N`/`TRACEn-N` is decremented
//! and our call inserted in front of it.
//!
//! [`RecentRepeats`] remembers what went out so copies relayed back by other
//! digipeaters are not repeated a second time.

use std::collections::VecDeque;

use crate::aprs::{PathEntry, Tnc2Packet};

/// AX.25 carries at most eight repeater addresses
pub const MAX_PATH_LEN: usize = 8;

/// How long a repeated frame is remembered
pub const REPEAT_MEMORY_MS: u64 = 30_000;

/// Remembered frames; the oldest is forgotten first
const REPEAT_MEMORY_SLOTS: usize = 32;

/// Highest `n` accepted in `WIDEn-N`
const MAX_WIDE_HOPS: u8 = 7;

/// Frame to repeat and how it was addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digipeated {
    pub packet: Tnc2Packet,
    /// The consumed hop was our own call rather than a generic alias
    pub addressed: bool,
}

/// Rewrite `packet`'s path for repeating as `own_call`.
///
/// Returns `None` if the frame is not ours to repeat: no unused hop, an
/// unknown alias, an exhausted `WIDEn-N`, a path already through us, or a
/// path that would grow past eight entries.
#[must_use]
pub fn digipeat(packet: &Tnc2Packet, own_call: &str) -> Option<Digipeated> {
    let next = packet
        .path
        .iter()
        .rposition(|entry| entry.repeated)
        .map_or(0, |last| last + 1);

    if packet.path[..next]
        .iter()
        .any(|entry| entry.call.eq_ignore_ascii_case(own_call))
    {
        return None;
    }

    let hop = packet.path.get(next)?;
    let mut path = packet.path[..next].to_vec();
    let addressed;

    if hop.call.eq_ignore_ascii_case(own_call) {
        path.push(PathEntry::new(own_call, true));
        addressed = true;
    } else {
        let (alias, n, remaining) = parse_wide(&hop.call)?;
        path.push(PathEntry::new(own_call, true));
        if remaining > 1 {
            path.push(PathEntry::new(format!("{}{}-{}", alias, n, remaining - 1), false));
        } else {
            path.push(PathEntry::new(format!("{}{}", alias, n), true));
        }
        addressed = false;
    }

    path.extend_from_slice(&packet.path[next + 1..]);
    if path.len() > MAX_PATH_LEN {
        return None;
    }

    Some(Digipeated {
        packet: Tnc2Packet {
            path,
            ..packet.clone()
        },
        addressed,
    })
}

/// Frames repeated within the last [`REPEAT_MEMORY_MS`], keyed by source
/// and information field.
#[derive(Debug, Default)]
pub struct RecentRepeats {
    entries: VecDeque<(u64, String, Vec<u8>)>,
}

impl RecentRepeats {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if the same source and information field went out recently.
    pub fn contains(&mut self, packet: &Tnc2Packet, now_ms: u64) -> bool {
        self.expire(now_ms);
        self.entries
            .iter()
            .any(|(_, source, info)| source.eq_ignore_ascii_case(&packet.source) && *info == packet.info)
    }

    pub fn insert(&mut self, packet: &Tnc2Packet, now_ms: u64) {
        self.expire(now_ms);
        if self.entries.len() >= REPEAT_MEMORY_SLOTS {
            self.entries.pop_front();
        }
        self.entries.push_back((now_ms, packet.source.clone(), packet.info.clone()));
    }

    fn expire(&mut self, now_ms: u64) {
        while let Some(&(at, ..)) = self.entries.front() {
            if now_ms.saturating_sub(at) < REPEAT_MEMORY_MS {
                break;
            }
            self.entries.pop_front();
        }
    }
}

/// Split `WIDEn-N` / `TRACEn-N` into (alias, n, N) with `1 <= N <= n <= 7`.
fn parse_wide(call: &str) -> Option<(&'static str, u8, u8)> {
    let upper = call.to_ascii_uppercase();
    let (alias, rest) = if let Some(rest) = upper.strip_prefix("WIDE") {
        ("WIDE", rest)
    } else {
        ("TRACE", upper.strip_prefix("TRACE")?)
    };

    let (n, remaining) = rest.split_once('-')?;
    let n: u8 = n.parse().ok()?;
    let remaining: u8 = remaining.parse().ok()?;
    if !(1..=MAX_WIDE_HOPS).contains(&n) || remaining == 0 || remaining > n {
        return None;
    }
    Some((alias, n, remaining))
}
