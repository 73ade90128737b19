//! # Station Heard Table
//!
//! Fixed-capacity cache of recently heard stations, objects and items. When
//! full, the entry heard longest ago is overwritten.

use serde::Serialize;

use crate::aprs::PacketKind;
use crate::codec::geo;

/// Default number of station slots
pub const DEFAULT_STATION_CAPACITY: usize = 30;

/// Sentinel offset used when scanning for the oldest entry (1 day)
const EVICTION_SENTINEL_S: u64 = 86_400;

/// Signal metrics reported by the RF modem for a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SignalReport {
    pub audio_level: i16,
    pub rssi: f32,
    pub snr: f32,
    pub freq_error: f32,
}

/// Channel a station was heard on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum Origin {
    Rf(SignalReport),
    Internet,
}

impl Origin {
    /// Signal metrics, zeroed for Internet-heard stations.
    #[must_use]
    pub fn signal(&self) -> SignalReport {
        match self {
            Origin::Rf(report) => *report,
            Origin::Internet => SignalReport::default(),
        }
    }

    #[must_use]
    pub fn is_rf(&self) -> bool {
        matches!(self, Origin::Rf(_))
    }
}

/// One heard station, object or item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationRecord {
    pub callsign: String,
    pub object: Option<String>,
    pub kind: PacketKind,
    /// Epoch seconds of the last sighting
    pub last_heard: u64,
    pub hits: u32,
    pub origin: Origin,
    #[serde(skip)]
    pub raw: Vec<u8>,
    /// Last reported (latitude, longitude)
    pub position: Option<(f64, f64)>,
}

impl StationRecord {
    /// Distance (km) and bearing (degrees) from `(latitude, longitude)`.
    #[must_use]
    pub fn range_from(&self, latitude: f64, longitude: f64) -> Option<(f64, f64)> {
        let (lat, lon) = self.position?;
        Some((
            geo::distance_km(longitude, latitude, lon, lat),
            geo::bearing_degrees(longitude, latitude, lon, lat),
        ))
    }

    /// Raw packet as text
    #[must_use]
    pub fn raw_text(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }
}

/// One sighting, as handed to [`StationTable::update`].
#[derive(Debug, Clone, Copy)]
pub struct Sighting<'a> {
    pub callsign: &'a str,
    pub object: Option<&'a str>,
    pub raw: &'a [u8],
    pub kind: PacketKind,
    pub origin: Origin,
    pub position: Option<(f64, f64)>,
}

/// Bounded table of heard stations.
#[derive(Debug, Clone)]
pub struct StationTable {
    slots: Vec<Option<StationRecord>>,
    new_arrival: bool,
}

impl Default for StationTable {
    fn default() -> Self {
        Self::new(DEFAULT_STATION_CAPACITY)
    }
}

impl StationTable {
    /// Create a table with `capacity` slots (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            new_arrival: false,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the slot holding `callsign` (and `object`, for objects and items).
    ///
    /// Names compare equal when they differ only by trailing spaces or NULs.
    /// This is stricter than a prefix match: `N0CALL` does not find
    /// `N0CALL-9`, and object `STORM` does not find `STORM2`.
    /// Object and item lookups only match object and item records; plain
    /// station lookups never match them.
    #[must_use]
    pub fn find(&self, callsign: &str, object: Option<&str>, kind: PacketKind) -> Option<usize> {
        let named = kind.is_named() && object.is_some();
        self.slots.iter().position(|slot| {
            let Some(record) = slot else {
                return false;
            };
            if !padded_eq(&record.callsign, callsign) {
                return false;
            }
            match (named, object, record.object.as_deref()) {
                (true, Some(name), Some(stored)) => record.kind.is_named() && padded_eq(stored, name),
                (false, _, None) => true,
                _ => false,
            }
        })
    }

    /// Slot to reuse for a new key: the empty slot or the oldest entry,
    /// first found on ties.
    #[must_use]
    pub fn eviction_candidate(&self, now: u64) -> usize {
        let mut oldest = now.saturating_add(EVICTION_SENTINEL_S);
        let mut index = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            let stamp = slot.as_ref().map_or(0, |r| r.last_heard);
            if stamp < oldest {
                oldest = stamp;
                index = i;
            }
        }
        index
    }

    /// Record a sighting, returning the slot it landed in.
    ///
    /// Existing entries are refreshed in place; new keys reuse the eviction
    /// candidate. Raises the new-arrival flag.
    pub fn update(&mut self, sighting: Sighting<'_>, now: u64) -> usize {
        let object = sighting.object.filter(|_| sighting.kind.is_named());
        let index = match self.find(sighting.callsign, object, sighting.kind) {
            Some(index) => index,
            None => {
                let index = self.eviction_candidate(now);
                self.slots[index] = Some(StationRecord {
                    callsign: sighting.callsign.to_string(),
                    object: object.map(str::to_string),
                    kind: sighting.kind,
                    last_heard: now,
                    hits: 0,
                    origin: sighting.origin,
                    raw: Vec::new(),
                    position: None,
                });
                index
            }
        };

        if let Some(record) = self.slots[index].as_mut() {
            record.kind = sighting.kind;
            record.last_heard = now;
            record.hits = record.hits.saturating_add(1);
            record.origin = sighting.origin;
            record.raw = sighting.raw.to_vec();
            if sighting.position.is_some() {
                record.position = sighting.position;
            }
        }

        self.new_arrival = true;
        index
    }

    /// Consume the new-arrival flag.
    pub fn take_new_arrival(&mut self) -> bool {
        std::mem::take(&mut self.new_arrival)
    }

    /// Copy of the record at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<StationRecord> {
        self.slots.get(index)?.clone()
    }

    /// Copies of all records, most recently heard first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StationRecord> {
        let mut records: Vec<StationRecord> = self.slots.iter().flatten().cloned().collect();
        records.sort_by(|a, b| b.last_heard.cmp(&a.last_heard));
        records
    }
}

fn padded_eq(stored: &str, query: &str) -> bool {
    let pad: &[char] = &[' ', '\0'];
    stored.trim_end_matches(pad) == query.trim_end_matches(pad)
}
