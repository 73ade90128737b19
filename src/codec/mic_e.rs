//! # Mic-E Encoding
//!
//! Mic-E splits a position report across the AX.25 destination address and
//! the information field.
//!
//! ## Destination (6 characters)
//!
//! Latitude digits `DDMMhh`. Three message bits ride on characters 1-3, and
//! the north, longitude-offset and west flags on characters 4-6. A flagged
//! digit is shifted by 25 and remapped alphabetically (`0`→`P` ... `9`→`Y`).
//!
//! ## Information field
//!
//! ```text
//! | ` | d+28 | m+28 | h+28 | SP+28 | DC+28 | SE+28 | symbol | table | extension |
//! ```
//!
//! The optional extension is either telemetry (2 or 5 channels, hex) or an
//! altitude/status suffix, never both.

use super::base91;
use crate::error::{GatewayError, Result};

/// Data-type identifier for a current GPS fix
const DTI_CURRENT: char = '`';

/// Telemetry prefix for two channels
const TELEMETRY_TWO_CHANNELS: char = '\'';

/// Telemetry prefix for five channels
const TELEMETRY_FIVE_CHANNELS: char = '`';

/// Altitude is encoded as metres above -10 km
const ALTITUDE_OFFSET_M: f64 = 10_000.0;

/// Terminator after the three altitude digits
const ALTITUDE_TERMINATOR: char = '}';

/// Offset applied to every information-field byte
const BYTE_OFFSET: u8 = 28;

/// Optional data after the symbol.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MicEExtension {
    #[default]
    None,
    /// Raw telemetry channel values; exactly 2 or 5 bytes
    Telemetry(Vec<u8>),
    /// Altitude (metres) and/or free status text
    Status {
        altitude_m: Option<f64>,
        text: String,
    },
}

/// Inputs for [`encode`]
#[derive(Debug, Clone, PartialEq)]
pub struct MicEParams {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_knots: f64,
    pub course: u16,
    /// Three message bits (A B C, most significant first); 0b111 is "Off Duty"
    pub message: u8,
    pub symbol: u8,
    pub table: u8,
    pub extension: MicEExtension,
}

/// Encoded Mic-E report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicE {
    /// Six-character destination "callsign"
    pub destination: String,
    /// Information field
    pub info: String,
}

/// Split absolute degrees into (degrees, minutes, hundredths of a minute).
fn split_degrees(value: f64) -> (u32, u32, u32) {
    let total = (value.abs() * 6000.0).round() as u32;
    (total / 6000, (total % 6000) / 100, total % 100)
}

fn destination_char(digit: u32, flag: bool) -> char {
    let value = if flag { digit + 25 } else { digit };
    let c = if value < 10 {
        b'0' + value as u8
    } else {
        b'A' + (value - 10) as u8
    };
    c as char
}

/// Encode a Mic-E report.
///
/// # Errors
///
/// Returns [`GatewayError::MicE`] if telemetry does not hold exactly 2 or 5
/// values, or if the message code does not fit in three bits.
///
/// # Examples
///
/// ```
/// use aprs_gateway::codec::mic_e::{encode, MicEExtension, MicEParams};
///
/// let report = encode(&MicEParams {
///     latitude: 33.0 + 25.64 / 60.0,
///     longitude: -(72.0 + 7.74 / 60.0),
///     speed_knots: 20.0,
///     course: 251,
///     message: 0b100,
///     symbol: b'>',
///     table: b'/',
///     extension: MicEExtension::None,
/// })?;
/// assert_eq!(report.destination, "S32U6T");
/// # Ok::<(), aprs_gateway::error::GatewayError>(())
/// ```
pub fn encode(params: &MicEParams) -> Result<MicE> {
    if params.message > 0b111 {
        return Err(GatewayError::MicE(format!(
            "message code {} does not fit in three bits",
            params.message
        )));
    }
    if let MicEExtension::Telemetry(values) = &params.extension {
        if values.len() != 2 && values.len() != 5 {
            return Err(GatewayError::MicE(format!(
                "telemetry needs 2 or 5 channels, got {}",
                values.len()
            )));
        }
    }

    let (lat_deg, lat_min, lat_hun) = split_degrees(params.latitude.clamp(-90.0, 90.0));
    let (lon_deg, lon_min, lon_hun) = split_degrees(params.longitude.clamp(-180.0, 180.0));
    let lon_deg = lon_deg.min(179);

    let north = params.latitude >= 0.0;
    let west = params.longitude < 0.0;
    let lon_offset = !(10..=99).contains(&lon_deg);

    let digits = [
        lat_deg / 10,
        lat_deg % 10,
        lat_min / 10,
        lat_min % 10,
        lat_hun / 10,
        lat_hun % 10,
    ];
    let flags = [
        params.message & 0b100 != 0,
        params.message & 0b010 != 0,
        params.message & 0b001 != 0,
        north,
        lon_offset,
        west,
    ];
    let destination: String = digits
        .iter()
        .zip(flags)
        .map(|(&digit, flag)| destination_char(digit, flag))
        .collect();

    let degree_byte = match lon_deg {
        0..=9 => lon_deg + 118,
        10..=99 => lon_deg + 28,
        100..=109 => lon_deg + 8,
        _ => lon_deg - 72,
    };
    let minute_byte = if lon_min < 10 { lon_min + 88 } else { lon_min + 28 };
    let hundredths_byte = lon_hun + u32::from(BYTE_OFFSET);

    let speed = params.speed_knots.max(0.0).round().min(799.0) as u32;
    let course = u32::from(params.course % 360);
    let tens = speed / 10;
    let speed_byte = if tens < 20 {
        u32::from(b'l') + tens
    } else {
        u32::from(b'0') + (tens - 20)
    };
    let dc_byte = (speed % 10) * 10 + course / 100 + u32::from(BYTE_OFFSET);
    let se_byte = course % 100 + u32::from(BYTE_OFFSET);

    let mut info = String::with_capacity(32);
    info.push(DTI_CURRENT);
    for byte in [degree_byte, minute_byte, hundredths_byte, speed_byte, dc_byte, se_byte] {
        info.push(byte as u8 as char);
    }
    info.push(params.symbol as char);
    info.push(params.table as char);

    match &params.extension {
        MicEExtension::None => {}
        MicEExtension::Telemetry(values) => {
            info.push(if values.len() == 2 {
                TELEMETRY_TWO_CHANNELS
            } else {
                TELEMETRY_FIVE_CHANNELS
            });
            for value in values {
                info.push_str(&format!("{:02X}", value));
            }
        }
        MicEExtension::Status { altitude_m, text } => {
            if let Some(altitude) = altitude_m {
                let encoded = (altitude + ALTITUDE_OFFSET_M).round().max(0.0) as u32;
                let digits = base91::encode(encoded);
                for &c in &digits[1..] {
                    info.push(c as char);
                }
                info.push(ALTITUDE_TERMINATOR);
            }
            info.push_str(text);
        }
    }

    Ok(MicE { destination, info })
}

/// Decode a destination character into (digit, flag).
fn destination_digit(c: u8) -> Option<(u32, bool)> {
    match c {
        b'0'..=b'9' => Some((u32::from(c - b'0'), false)),
        b'A'..=b'J' => Some((u32::from(c - b'A'), true)),
        b'K' | b'L' | b'Z' => Some((0, false)),
        b'P'..=b'Y' => Some((u32::from(c - b'P'), true)),
        _ => None,
    }
}

/// Decode latitude/longitude from a Mic-E destination and information field.
#[must_use]
pub fn decode_position(destination: &str, info: &[u8]) -> Option<(f64, f64)> {
    let dest = destination.as_bytes();
    if dest.len() < 6 || info.len() < 4 {
        return None;
    }

    let mut digits = [0u32; 6];
    let mut flags = [false; 6];
    for i in 0..6 {
        let (digit, flag) = destination_digit(dest[i])?;
        digits[i] = digit;
        // Flags on characters 4-6 use only the P..Z range
        flags[i] = if i >= 3 { dest[i] >= b'P' } else { flag };
    }

    let lat_deg = digits[0] * 10 + digits[1];
    let lat_min = f64::from(digits[2] * 10 + digits[3]) + f64::from(digits[4] * 10 + digits[5]) / 100.0;
    let mut latitude = f64::from(lat_deg) + lat_min / 60.0;
    if !flags[3] {
        latitude = -latitude;
    }

    let mut lon_deg = u32::from(info[1].checked_sub(BYTE_OFFSET)?);
    if flags[4] {
        lon_deg += 100;
    }
    if (180..=189).contains(&lon_deg) {
        lon_deg -= 80;
    } else if (190..=199).contains(&lon_deg) {
        lon_deg -= 190;
    }
    let mut lon_min = u32::from(info[2].checked_sub(BYTE_OFFSET)?);
    if lon_min >= 60 {
        lon_min -= 60;
    }
    let lon_hun = u32::from(info[3].checked_sub(BYTE_OFFSET)?);

    let mut longitude = f64::from(lon_deg) + (f64::from(lon_min) + f64::from(lon_hun) / 100.0) / 60.0;
    if flags[5] {
        longitude = -longitude;
    }

    Some((latitude, longitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(latitude: f64, longitude: f64) -> MicEParams {
        MicEParams {
            latitude,
            longitude,
            speed_knots: 0.0,
            course: 0,
            message: 0b111,
            symbol: b'>',
            table: b'/',
            extension: MicEExtension::None,
        }
    }

    #[test]
    fn test_destination_reference_vector() {
        let report = encode(&MicEParams {
            message: 0b100,
            ..params(33.0 + 25.64 / 60.0, -(72.0 + 7.74 / 60.0))
        })
        .unwrap();
        assert_eq!(report.destination, "S32U6T");
    }

    #[test]
    fn test_southern_eastern_hemisphere() {
        let report = encode(&MicEParams {
            message: 0,
            ..params(-(33.0 + 25.64 / 60.0), 151.0 + 12.5 / 60.0)
        })
        .unwrap();
        // No message bits, south, offset for 151 degrees, east
        assert_eq!(report.destination, "3325V4");
    }

    #[test]
    fn test_longitude_degree_ranges() {
        for (lon, expected) in [(5.0, 5 + 118), (50.0, 50 + 28), (105.0, 105 + 8), (150.0, 150 - 72)] {
            let report = encode(&params(10.0, lon)).unwrap();
            assert_eq!(report.info.as_bytes()[1], expected as u8, "lon {}", lon);
        }
    }

    #[test]
    fn test_speed_and_course_bytes() {
        let report = encode(&MicEParams {
            speed_knots: 20.0,
            course: 251,
            ..params(10.0, 50.0)
        })
        .unwrap();
        let info = report.info.as_bytes();
        assert_eq!(info[0], b'`');
        assert_eq!(info[4], b'l' + 2, "speed tens under 200 knots use the 'l' base");
        assert_eq!(info[5], 2 + 28, "units 0, course hundreds 2");
        assert_eq!(info[6], 51 + 28);
        assert_eq!(info[7], b'>');
        assert_eq!(info[8], b'/');

        let fast = encode(&MicEParams {
            speed_knots: 250.0,
            ..params(10.0, 50.0)
        })
        .unwrap();
        assert_eq!(fast.info.as_bytes()[4], b'0' + 5, "speed tens 25 use the '0' base");
    }

    #[test]
    fn test_round_trip_position() {
        for (lat, lon) in [
            (13.7563, 100.5018),
            (-33.8688, 151.2093),
            (49.5, -72.75),
            (0.5, -5.25),
            (64.1466, -179.9),
        ] {
            let report = encode(&params(lat, lon)).unwrap();
            let (dlat, dlon) = decode_position(&report.destination, report.info.as_bytes()).unwrap();
            assert!((dlat - lat).abs() < 0.0002, "lat {} -> {}", lat, dlat);
            assert!((dlon - lon).abs() < 0.0002, "lon {} -> {}", lon, dlon);
        }
    }

    #[test]
    fn test_telemetry_extension() {
        let report = encode(&MicEParams {
            extension: MicEExtension::Telemetry(vec![0x12, 0xAB]),
            ..params(10.0, 50.0)
        })
        .unwrap();
        assert!(report.info.ends_with("'12AB"));

        let report = encode(&MicEParams {
            extension: MicEExtension::Telemetry(vec![1, 2, 3, 4, 255]),
            ..params(10.0, 50.0)
        })
        .unwrap();
        assert!(report.info.ends_with("`01020304FF"));
    }

    #[test]
    fn test_telemetry_channel_count_is_checked() {
        let result = encode(&MicEParams {
            extension: MicEExtension::Telemetry(vec![1, 2, 3]),
            ..params(10.0, 50.0)
        });
        assert!(matches!(result, Err(GatewayError::MicE(_))));
    }

    #[test]
    fn test_message_code_is_checked() {
        let result = encode(&MicEParams {
            message: 8,
            ..params(10.0, 50.0)
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_status_with_altitude() {
        let report = encode(&MicEParams {
            extension: MicEExtension::Status {
                altitude_m: Some(61.0),
                text: "Mobile".to_string(),
            },
            ..params(10.0, 50.0)
        })
        .unwrap();
        // 10061 = 1*8281 + 19*91 + 51 -> "\"4T"
        assert!(report.info.ends_with("\"4T}Mobile"), "info {}", report.info);
    }

    #[test]
    fn test_decode_rejects_bad_destination() {
        assert_eq!(decode_position("S32U6", b"`abc"), None);
        assert_eq!(decode_position("S3#U6T", b"`abc"), None);
    }
}
