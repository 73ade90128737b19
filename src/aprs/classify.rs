//! # APRS Packet Classifier
//!
//! Assigns a [`PacketKind`] bit set to a raw APRS information field.
//!
//! The first byte of the information field is the APRS data-type identifier
//! (DTI). Byte offsets used by the weather checks below are relative to the
//! body that follows the DTI.
//!
//! | DTI | Kind |
//! |-----|------|
//! | `$` | POSITION (raw NMEA) |
//! | `'` `` ` `` | POSITION + MIC_E |
//! | `!` `=` | POSITION, + WEATHER if body\[10\] or body\[18\] is `_` |
//! | `/` `@` | POSITION, + WEATHER if body\[16\] or body\[25\] is `_`, or `r`,`g`,`t`,`P` appear in order |
//! | `:` | TELEMETRY for PARM/UNIT/EQNS/BITS messages, otherwise MESSAGE |
//! | `{` `<` `>` | STATUS |
//! | `?` | QUERY |
//! | `;` | OBJECT, + WEATHER if body\[35\] is `_` |
//! | `)` | ITEM |
//! | `}` | THIRD_PARTY, OR-ed with the kind of the wrapped packet |
//! | `T` | TELEMETRY |
//! | `#` `*` `_` | WEATHER |
//!
//! Every offset is bounds-checked, so truncated input simply fails to match.

use serde::Serialize;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Filter bit: object report (`;`)
pub const FILTER_OBJECT: u16 = 1 << 0;
/// Filter bit: item report (`)`)
pub const FILTER_ITEM: u16 = 1 << 1;
/// Filter bit: message (`:`)
pub const FILTER_MESSAGE: u16 = 1 << 2;
/// Filter bit: weather report
pub const FILTER_WEATHER: u16 = 1 << 3;
/// Filter bit: telemetry (`T` or PARM/UNIT/EQNS/BITS messages)
pub const FILTER_TELEMETRY: u16 = 1 << 4;
/// Filter bit: query (`?`)
pub const FILTER_QUERY: u16 = 1 << 5;
/// Filter bit: status (`>`, `<`, `{`)
pub const FILTER_STATUS: u16 = 1 << 6;
/// Filter bit: position report
pub const FILTER_POSITION: u16 = 1 << 7;
/// Filter bit: buoy (reserved, never produced by [`classify`])
pub const FILTER_BUOY: u16 = 1 << 8;
/// Filter bit: Mic-E encoded position
pub const FILTER_MIC_E: u16 = 1 << 9;
/// Filter bit: third-party wrapped packet (`}`)
pub const FILTER_THIRD_PARTY: u16 = 1 << 10;
/// Every filter bit
pub const FILTER_ALL: u16 = (1 << 11) - 1;

/// Nesting limit for third-party payloads (`}...}...`)
const MAX_THIRD_PARTY_DEPTH: usize = 4;

const TELEMETRY_MESSAGE_TAGS: [&[u8]; 4] = [b"PARM", b"UNIT", b"EQNS", b"BITS"];

/// Bit set of APRS packet categories.
///
/// An empty set means "unclassified": counted in statistics but never
/// matched by a routing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct PacketKind(u16);

impl PacketKind {
    pub const NONE: Self = Self(0);
    pub const OBJECT: Self = Self(FILTER_OBJECT);
    pub const ITEM: Self = Self(FILTER_ITEM);
    pub const MESSAGE: Self = Self(FILTER_MESSAGE);
    pub const WEATHER: Self = Self(FILTER_WEATHER);
    pub const TELEMETRY: Self = Self(FILTER_TELEMETRY);
    pub const QUERY: Self = Self(FILTER_QUERY);
    pub const STATUS: Self = Self(FILTER_STATUS);
    pub const POSITION: Self = Self(FILTER_POSITION);
    pub const BUOY: Self = Self(FILTER_BUOY);
    pub const MIC_E: Self = Self(FILTER_MIC_E);
    pub const THIRD_PARTY: Self = Self(FILTER_THIRD_PARTY);
    pub const ALL: Self = Self(FILTER_ALL);

    /// Builds a kind from raw filter bits, discarding unknown bits.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & FILTER_ALL)
    }

    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when `self` and `other` share at least one bit.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True when this packet passes a routing filter.
    ///
    /// Unclassified packets never pass.
    #[must_use]
    pub const fn matches_filter(self, filter: u16) -> bool {
        self.0 & filter != 0
    }

    /// True for object and item reports, which are keyed by name as well as source.
    #[must_use]
    pub const fn is_named(self) -> bool {
        self.0 & (FILTER_OBJECT | FILTER_ITEM) != 0
    }
}

impl BitOr for PacketKind {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PacketKind {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PacketKind {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(PacketKind, &str); 11] = [
            (PacketKind::OBJECT, "object"),
            (PacketKind::ITEM, "item"),
            (PacketKind::MESSAGE, "message"),
            (PacketKind::WEATHER, "weather"),
            (PacketKind::TELEMETRY, "telemetry"),
            (PacketKind::QUERY, "query"),
            (PacketKind::STATUS, "status"),
            (PacketKind::POSITION, "position"),
            (PacketKind::BUOY, "buoy"),
            (PacketKind::MIC_E, "mic-e"),
            (PacketKind::THIRD_PARTY, "third-party"),
        ];

        if self.is_empty() {
            return f.write_str("unknown");
        }

        let mut first = true;
        for (kind, name) in NAMES {
            if self.contains(kind) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Classify an APRS information field.
///
/// Pure and bounds-checked: never reads past `info`.
///
/// # Examples
///
/// ```
/// use aprs_gateway::aprs::classify::{classify, PacketKind};
///
/// let kind = classify(b"!1234.56N/09876.54W>Test");
/// assert_eq!(kind, PacketKind::POSITION);
///
/// assert_eq!(classify(b">Net tonight"), PacketKind::STATUS);
/// assert!(classify(b"").is_empty());
/// ```
#[must_use]
pub fn classify(info: &[u8]) -> PacketKind {
    classify_nested(info, 0)
}

fn classify_nested(info: &[u8], depth: usize) -> PacketKind {
    let Some((&dti, body)) = info.split_first() else {
        return PacketKind::NONE;
    };

    match dti {
        b'$' => PacketKind::POSITION,
        b'\'' | b'`' => PacketKind::POSITION | PacketKind::MIC_E,
        b'!' | b'=' => {
            let mut kind = PacketKind::POSITION;
            if byte_is(body, 10, b'_') || byte_is(body, 18, b'_') {
                kind |= PacketKind::WEATHER;
            }
            kind
        }
        b'/' | b'@' => {
            let mut kind = PacketKind::POSITION;
            // The in-order r,g,t,P scan catches weather payloads without a `_`
            // symbol; it also matches ordinary comments containing those letters.
            if byte_is(body, 16, b'_')
                || byte_is(body, 25, b'_')
                || contains_in_order(body, b"rgtP")
            {
                kind |= PacketKind::WEATHER;
            }
            kind
        }
        b':' => {
            let tag = body.get(10..14);
            if byte_is(body, 9, b':') && tag.is_some_and(|t| TELEMETRY_MESSAGE_TAGS.contains(&t)) {
                PacketKind::TELEMETRY
            } else {
                PacketKind::MESSAGE
            }
        }
        b'{' | b'<' | b'>' => PacketKind::STATUS,
        b'?' => PacketKind::QUERY,
        b';' => {
            let mut kind = PacketKind::OBJECT;
            if byte_is(body, 35, b'_') {
                kind |= PacketKind::WEATHER;
            }
            kind
        }
        b')' => PacketKind::ITEM,
        b'}' => {
            let mut kind = PacketKind::THIRD_PARTY;
            if depth < MAX_THIRD_PARTY_DEPTH {
                if let Some(colon) = body.iter().position(|&b| b == b':') {
                    kind |= classify_nested(&body[colon + 1..], depth + 1);
                }
            }
            kind
        }
        b'T' => PacketKind::TELEMETRY,
        b'#' | b'*' | b'_' => PacketKind::WEATHER,
        _ => PacketKind::NONE,
    }
}

fn byte_is(body: &[u8], index: usize, expected: u8) -> bool {
    body.get(index) == Some(&expected)
}

/// True when each byte of `needles` occurs in `haystack`, each one after the previous.
fn contains_in_order(haystack: &[u8], needles: &[u8]) -> bool {
    let mut rest = haystack;
    for &needle in needles {
        match rest.iter().position(|&b| b == needle) {
            Some(pos) => rest = &rest[pos + 1..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_unknown_input() {
        assert!(classify(b"").is_empty());
        assert!(classify(b"x").is_empty());
        assert!(classify(b"%garbage").is_empty());
    }

    #[test]
    fn test_raw_gps_and_mic_e() {
        assert_eq!(classify(b"$GPRMC,123519,A,4807.038,N"), PacketKind::POSITION);
        assert_eq!(classify(b"`(_fn\"Oj/]"), PacketKind::POSITION | PacketKind::MIC_E);
        assert_eq!(classify(b"'(_fn\"Oj/]"), PacketKind::POSITION | PacketKind::MIC_E);
    }

    #[test]
    fn test_position_without_timestamp() {
        assert_eq!(classify(b"!1234.56N/09876.54W>Test status"), PacketKind::POSITION);
        assert_eq!(classify(b"=1234.56N/09876.54W-Home"), PacketKind::POSITION);
    }

    #[test]
    fn test_position_weather_symbol_uncompressed() {
        // body[18] is the symbol code in the uncompressed form
        let kind = classify(b"!4903.50N/07201.75W_220/004g005t077r000p000P000h50b09900");
        assert!(kind.contains(PacketKind::POSITION));
        assert!(kind.contains(PacketKind::WEATHER));
    }

    #[test]
    fn test_position_weather_offset_ten() {
        let mut info = b"!".to_vec();
        info.extend_from_slice(b"0123456789_rest");
        assert!(classify(&info).contains(PacketKind::WEATHER));
    }

    #[test]
    fn test_timestamped_position_weather_symbol() {
        // body[25] holds the symbol in "@DDHHMMzDDMM.mmN/DDDMM.mmW_"
        let kind = classify(b"@092345z4903.50N/07201.75W_220/004g005t-07");
        assert!(kind.contains(PacketKind::WEATHER));
        assert!(kind.contains(PacketKind::POSITION));
    }

    #[test]
    fn test_timestamped_position_rgtp_heuristic() {
        let kind = classify(b"/092345z4903.50N/07201.75W>r000g005t077P000");
        assert!(kind.contains(PacketKind::WEATHER));

        // Letters out of order do not trigger
        let kind = classify(b"/092345z4903.50N/07201.75W>Ptgr");
        assert_eq!(kind, PacketKind::POSITION);
    }

    #[test]
    fn test_rgtp_heuristic_false_positive_is_preserved() {
        // Ordinary text containing r..g..t..P still counts as weather
        let kind = classify(b"@092345z4903.50N/07201.75W>ringing tone Pete");
        assert!(kind.contains(PacketKind::WEATHER));
    }

    #[test]
    fn test_message_and_telemetry_definitions() {
        assert_eq!(classify(b":N0CALL   :Hello there{01"), PacketKind::MESSAGE);
        assert_eq!(classify(b":N0CALL-9 :PARM.Vbat,Temp"), PacketKind::TELEMETRY);
        assert_eq!(classify(b":N0CALL-9 :UNIT.V,C"), PacketKind::TELEMETRY);
        assert_eq!(classify(b":N0CALL-9 :EQNS.0,1,0"), PacketKind::TELEMETRY);
        assert_eq!(classify(b":N0CALL-9 :BITS.11111111,Title"), PacketKind::TELEMETRY);
        // Truncated definition is a plain message
        assert_eq!(classify(b":N0CALL-9 :PA"), PacketKind::MESSAGE);
    }

    #[test]
    fn test_status_query_item() {
        assert_eq!(classify(b">On the air"), PacketKind::STATUS);
        assert_eq!(classify(b"<capabilities"), PacketKind::STATUS);
        assert_eq!(classify(b"{user defined"), PacketKind::STATUS);
        assert_eq!(classify(b"?APRS?"), PacketKind::QUERY);
        assert_eq!(classify(b")AID #2!4903.50N/07201.75WA"), PacketKind::ITEM);
    }

    #[test]
    fn test_object_with_and_without_weather() {
        assert_eq!(
            classify(b";LEADER   *092345z4903.50N/07201.75W>088/036"),
            PacketKind::OBJECT
        );
        let kind = classify(b";WXSTN    *092345z4903.50N/07201.75W_090/010g015t068");
        assert_eq!(kind, PacketKind::OBJECT | PacketKind::WEATHER);
    }

    #[test]
    fn test_third_party_recurses_into_payload() {
        let kind = classify(b"}N0CALL-9>APRS,TCPIP*:>status text");
        assert_eq!(kind, PacketKind::THIRD_PARTY | PacketKind::STATUS);

        // No colon: only the wrapper bit
        assert_eq!(classify(b"}N0CALL>APRS"), PacketKind::THIRD_PARTY);
    }

    #[test]
    fn test_third_party_nesting_is_bounded() {
        let mut info = Vec::new();
        for _ in 0..32 {
            info.extend_from_slice(b"}A>B:");
        }
        info.extend_from_slice(b">deep");
        let kind = classify(&info);
        assert!(kind.contains(PacketKind::THIRD_PARTY));
        assert!(!kind.contains(PacketKind::STATUS));
    }

    #[test]
    fn test_telemetry_and_weather_identifiers() {
        assert_eq!(classify(b"T#005,199,000,255,073,123,01101001"), PacketKind::TELEMETRY);
        assert_eq!(classify(b"_10090556c220s004g005t077"), PacketKind::WEATHER);
        assert_eq!(classify(b"#W1"), PacketKind::WEATHER);
        assert_eq!(classify(b"*W2"), PacketKind::WEATHER);
    }

    #[test]
    fn test_classify_is_deterministic_on_truncations() {
        let samples: [&[u8]; 6] = [
            b"!4903.50N/07201.75W_220/004g005t077",
            b"=4903.50N/07201.75W-",
            b";LEADER   *092345z4903.50N/07201.75W_088",
            b":N0CALL-9 :PARM.A,B",
            b")AID #2!4903.50N/07201.75WA",
            b"}N0CALL>APRS:>x",
        ];
        for sample in samples {
            for len in 0..=sample.len() {
                let slice = &sample[..len];
                assert_eq!(classify(slice), classify(slice), "len {}", len);
            }
        }
    }

    #[test]
    fn test_filter_matching() {
        let kind = PacketKind::POSITION | PacketKind::WEATHER;
        assert!(kind.matches_filter(FILTER_WEATHER));
        assert!(!kind.matches_filter(FILTER_MESSAGE));
        assert!(!PacketKind::NONE.matches_filter(FILTER_ALL));
        assert_eq!(PacketKind::from_bits(0xFFFF), PacketKind::ALL);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(PacketKind::NONE.to_string(), "unknown");
        assert_eq!((PacketKind::POSITION | PacketKind::MIC_E).to_string(), "position|mic-e");
    }
}
