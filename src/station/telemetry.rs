//! # Telemetry Table
//!
//! Last telemetry values, channel names, units and equations per remote
//! station. APRS spreads one station's telemetry over several packets
//! (`T#` values plus `PARM.`/`UNIT.`/`EQNS.`/`BITS.` messages); each one
//! updates part of the same record.

use serde::Serialize;

use crate::codec::telemetry as packed;

/// Default number of telemetry slots
pub const DEFAULT_TELEMETRY_CAPACITY: usize = 10;

/// Analog channels per record
pub const ANALOG_CHANNELS: usize = 5;

/// Sentinel offset used when scanning for the oldest entry (1 day)
const EVICTION_SENTINEL_S: u64 = 86_400;

/// One analog telemetry channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalogChannel {
    pub name: String,
    pub unit: String,
    pub value: f64,
    /// Coefficients `a, b, c` of `a*v^2 + b*v + c`
    pub eqns: [f64; 3],
}

impl Default for AnalogChannel {
    fn default() -> Self {
        Self {
            name: String::new(),
            unit: String::new(),
            value: 0.0,
            eqns: [0.0, 1.0, 0.0],
        }
    }
}

impl AnalogChannel {
    /// Value with the channel equation applied
    #[must_use]
    pub fn scaled(&self) -> f64 {
        let [a, b, c] = self.eqns;
        a * self.value * self.value + b * self.value + c
    }
}

/// Telemetry state of one remote station.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct TelemetryRecord {
    pub callsign: String,
    pub last_update: u64,
    pub seq: u16,
    pub channels: [AnalogChannel; ANALOG_CHANNELS],
    /// Digital bits, B1 in the most significant bit
    pub bits: u8,
    /// Bit sense mask from `BITS.`
    pub bits_sense: u8,
    pub project: String,
}

/// One parsed telemetry packet.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryReport {
    Values {
        seq: u16,
        analog: Vec<f64>,
        bits: Option<u8>,
    },
    Names(Vec<String>),
    Units(Vec<String>),
    Equations(Vec<[f64; 3]>),
    Bits {
        sense: u8,
        project: String,
    },
}

/// Extract telemetry from a packet sent by `source`.
///
/// Returns the station the telemetry belongs to (the addressee for
/// `PARM.`-style messages) together with the report.
#[must_use]
pub fn parse_report(source: &str, info: &[u8]) -> Option<(String, TelemetryReport)> {
    let text = std::str::from_utf8(info).ok()?;
    match info.first()? {
        b'T' => parse_values(text).map(|r| (source.to_string(), r)),
        b':' => parse_message(text),
        b'!' | b'=' | b'/' | b'@' | b'`' | b'\'' => {
            let values = packed::find_in_comment(text)?;
            let (seq, rest) = values.split_first()?;
            let analog = rest.iter().take(ANALOG_CHANNELS).map(|&v| f64::from(v)).collect();
            let bits = rest.get(ANALOG_CHANNELS).map(|&v| (v & 0xFF) as u8);
            Some((
                source.to_string(),
                TelemetryReport::Values {
                    seq: *seq,
                    analog,
                    bits,
                },
            ))
        }
        _ => None,
    }
}

/// `T#seq,a1,a2,a3,a4,a5,bbbbbbbb`
fn parse_values(text: &str) -> Option<TelemetryReport> {
    let body = text.strip_prefix("T#")?;
    let mut fields = body.split(',');
    let seq = fields.next()?.trim().parse::<u16>().unwrap_or(0);

    let mut analog = Vec::with_capacity(ANALOG_CHANNELS);
    let mut bits = None;
    for (i, field) in fields.enumerate() {
        let field = field.trim();
        if i < ANALOG_CHANNELS {
            analog.push(field.parse().ok()?);
        } else {
            bits = parse_bits(field);
            break;
        }
    }

    if analog.is_empty() {
        return None;
    }
    Some(TelemetryReport::Values { seq, analog, bits })
}

/// `:ADDRESSEE:PARM.`, `UNIT.`, `EQNS.` or `BITS.`
fn parse_message(text: &str) -> Option<(String, TelemetryReport)> {
    if text.as_bytes().get(10) != Some(&b':') {
        return None;
    }
    let addressee = text.get(1..10)?.trim_end().to_string();
    let body = text.get(11..)?;
    let (tag, rest) = (body.get(..5)?, body.get(5..)?);
    let labels = || rest.split(',').map(|s| s.trim().to_string()).collect::<Vec<_>>();

    let report = match tag {
        "PARM." => TelemetryReport::Names(labels()),
        "UNIT." => TelemetryReport::Units(labels()),
        "EQNS." => {
            let coefficients: Vec<f64> = rest
                .split(',')
                .map(|s| s.trim().parse().unwrap_or(0.0))
                .collect();
            TelemetryReport::Equations(
                coefficients
                    .chunks_exact(3)
                    .map(|c| [c[0], c[1], c[2]])
                    .collect(),
            )
        }
        "BITS." => {
            let (sense, project) = rest.split_once(',').unwrap_or((rest, ""));
            TelemetryReport::Bits {
                sense: parse_bits(sense.trim())?,
                project: project.trim().to_string(),
            }
        }
        _ => return None,
    };
    (!addressee.is_empty()).then_some((addressee, report))
}

/// `"10100000"` with B1 first; shorter strings are zero padded on the right.
fn parse_bits(field: &str) -> Option<u8> {
    if field.is_empty() || field.len() > 8 {
        return None;
    }
    field.bytes().enumerate().try_fold(0u8, |acc, (i, b)| match b {
        b'1' => Some(acc | (0x80 >> i)),
        b'0' => Some(acc),
        _ => None,
    })
}

/// Bounded table of remote telemetry.
#[derive(Debug, Clone)]
pub struct TelemetryTable {
    slots: Vec<Option<TelemetryRecord>>,
}

impl Default for TelemetryTable {
    fn default() -> Self {
        Self::new(DEFAULT_TELEMETRY_CAPACITY)
    }
}

impl TelemetryTable {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn find(&self, callsign: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|r| r.callsign == callsign))
    }

    /// Slot to reuse for a new station.
    ///
    /// Entries stamped later than `now` are cleared first, then the oldest
    /// (or first empty) slot is chosen.
    pub fn eviction_candidate(&mut self, now: u64) -> usize {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|r| r.last_update > now) {
                *slot = None;
            }
        }

        let mut oldest = now.saturating_add(EVICTION_SENTINEL_S);
        let mut index = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            let stamp = slot.as_ref().map_or(0, |r| r.last_update);
            if stamp < oldest {
                oldest = stamp;
                index = i;
            }
        }
        index
    }

    /// Merge `report` into the record for `callsign`, returning its slot.
    pub fn apply(&mut self, callsign: &str, report: TelemetryReport, now: u64) -> usize {
        let index = match self.find(callsign) {
            Some(index) => index,
            None => {
                let index = self.eviction_candidate(now);
                self.slots[index] = Some(TelemetryRecord {
                    callsign: callsign.to_string(),
                    ..TelemetryRecord::default()
                });
                index
            }
        };

        if let Some(record) = self.slots[index].as_mut() {
            record.last_update = now;
            match report {
                TelemetryReport::Values { seq, analog, bits } => {
                    record.seq = seq;
                    for (channel, value) in record.channels.iter_mut().zip(analog) {
                        channel.value = value;
                    }
                    if let Some(bits) = bits {
                        record.bits = bits;
                    }
                }
                TelemetryReport::Names(names) => {
                    for (channel, name) in record.channels.iter_mut().zip(names) {
                        channel.name = name;
                    }
                }
                TelemetryReport::Units(units) => {
                    for (channel, unit) in record.channels.iter_mut().zip(units) {
                        channel.unit = unit;
                    }
                }
                TelemetryReport::Equations(eqns) => {
                    for (channel, eqn) in record.channels.iter_mut().zip(eqns) {
                        channel.eqns = eqn;
                    }
                }
                TelemetryReport::Bits { sense, project } => {
                    record.bits_sense = sense;
                    record.project = project;
                }
            }
        }
        index
    }

    /// Copy of the record at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<TelemetryRecord> {
        self.slots.get(index)?.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<TelemetryRecord> {
        self.slots.iter().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values() {
        let (call, report) = parse_report("N0CALL-9", b"T#005,199,000,255,073,123,01101001").unwrap();
        assert_eq!(call, "N0CALL-9");
        assert_eq!(
            report,
            TelemetryReport::Values {
                seq: 5,
                analog: vec![199.0, 0.0, 255.0, 73.0, 123.0],
                bits: Some(0b0110_1001),
            }
        );
    }

    #[test]
    fn test_parse_values_partial_and_mic_seq() {
        let (_, report) = parse_report("N0CALL", b"T#MIC,12.5,3").unwrap();
        assert_eq!(
            report,
            TelemetryReport::Values {
                seq: 0,
                analog: vec![12.5, 3.0],
                bits: None,
            }
        );
        assert!(parse_report("N0CALL", b"T#001").is_none());
        assert!(parse_report("N0CALL", b"T#001,abc").is_none());
    }

    #[test]
    fn test_parse_messages() {
        let (call, report) = parse_report("N0CALL", b":N0CALL-9 :PARM.Battery,Temp,Rx,Tx,Digi,B1").unwrap();
        assert_eq!(call, "N0CALL-9");
        assert_eq!(
            report,
            TelemetryReport::Names(
                ["Battery", "Temp", "Rx", "Tx", "Digi", "B1"].map(String::from).to_vec()
            )
        );

        let (_, report) = parse_report("N0CALL", b":N0CALL-9 :UNIT.V,C,pkt").unwrap();
        assert_eq!(report, TelemetryReport::Units(["V", "C", "pkt"].map(String::from).to_vec()));

        let (_, report) = parse_report("N0CALL", b":N0CALL-9 :EQNS.0,0.1,0,0,1,-40").unwrap();
        assert_eq!(report, TelemetryReport::Equations(vec![[0.0, 0.1, 0.0], [0.0, 1.0, -40.0]]));

        let (_, report) = parse_report("N0CALL", b":N0CALL-9 :BITS.11110000,Weather station").unwrap();
        assert_eq!(
            report,
            TelemetryReport::Bits {
                sense: 0xF0,
                project: "Weather station".to_string(),
            }
        );
    }

    #[test]
    fn test_plain_messages_are_not_telemetry() {
        assert!(parse_report("N0CALL", b":N0CALL-9 :hello there").is_none());
        assert!(parse_report("N0CALL", b":SHORT:PARM.x").is_none());
        assert!(parse_report("N0CALL", b">status").is_none());
    }

    #[test]
    fn test_parse_compressed_comment() {
        let info = format!("!1234.56N/09876.54W#PHG2360{}", packed::pack("7,1,20,300,4000,8280,255"));
        let (_, report) = parse_report("N0CALL", info.as_bytes()).unwrap();
        assert_eq!(
            report,
            TelemetryReport::Values {
                seq: 7,
                analog: vec![1.0, 20.0, 300.0, 4000.0, 8280.0],
                bits: Some(255),
            }
        );
    }

    #[test]
    fn test_messages_build_one_record() {
        let mut table = TelemetryTable::new(3);
        for info in [
            &b"T#010,131,20,0,0,0,10000000"[..],
            b":N0CALL-9 :PARM.Battery,Temp",
            b":N0CALL-9 :UNIT.V,C",
            b":N0CALL-9 :EQNS.0,0.1,0,0,1,-40",
        ] {
            let (call, report) = parse_report("N0CALL-9", info).unwrap();
            table.apply(&call, report, 100);
        }

        assert_eq!(table.len(), 1);
        let record = table.get(table.find("N0CALL-9").unwrap()).unwrap();
        assert_eq!(record.seq, 10);
        assert_eq!(record.bits, 0x80);
        assert_eq!(record.channels[0].name, "Battery");
        assert_eq!(record.channels[1].unit, "C");
        assert!((record.channels[0].scaled() - 13.1).abs() < 1e-9);
        assert!((record.channels[1].scaled() + 20.0).abs() < 1e-9);
        assert_eq!(record.channels[2].scaled(), 0.0);
    }

    #[test]
    fn test_eviction_picks_oldest() {
        let mut table = TelemetryTable::new(2);
        let report = || TelemetryReport::Bits {
            sense: 0,
            project: String::new(),
        };
        table.apply("A1", report(), 10);
        table.apply("B2", report(), 20);
        let index = table.apply("C3", report(), 30);
        assert_eq!(index, 0);
        assert!(table.find("A1").is_none());
        assert_eq!(table.snapshot().len(), 2);
    }

    #[test]
    fn test_future_entries_are_reset() {
        let mut table = TelemetryTable::new(3);
        let report = || TelemetryReport::Names(vec!["x".to_string()]);
        table.apply("A1", report(), 500);
        table.apply("B2", report(), 5_000);
        table.apply("C3", report(), 400);

        // clock stepped back to 600: B2 is stamped in the future
        let index = table.eviction_candidate(600);
        assert_eq!(index, 1, "cleared slot is reused");
        assert!(table.find("B2").is_none());
        assert!(table.find("A1").is_some());
    }
}
