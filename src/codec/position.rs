//! # Position Encoding
//!
//! Degree ⇄ `DDMM.mm` conversion and the APRS compressed position format.
//!
//! ## Compressed layout (13 bytes)
//!
//! ```text
//! | table | YYYY | XXXX | symbol | c | s | T |
//! ```
//!
//! `YYYY`/`XXXX` are Base-91 latitude/longitude, `cs` carries course/speed
//! (or altitude, or a range estimate) and `T` is the compression-type byte.

use super::base91;

/// Semicircles per degree (2³¹ / 180)
const SEMICIRCLES_PER_DEGREE: f64 = 2_147_483_648.0 / 180.0;

/// Offset that maps ±90° of latitude (or ±180° of longitude halved) onto 0..=2³¹
const SEMICIRCLE_OFFSET: i64 = 1_073_741_824;

/// Standard decoder scale for compressed latitude (units per degree)
const LATITUDE_SCALE: f64 = 380_926.0;

/// Standard decoder scale for compressed longitude (units per degree)
const LONGITUDE_SCALE: f64 = 190_463.0;

/// Logarithm base for compressed speed
const SPEED_LOG_BASE: f64 = 1.08;

/// Logarithm base for compressed altitude
const ALTITUDE_LOG_BASE: f64 = 1.002;

/// Range advertised in the `cs` bytes when there is no valid fix
const NO_FIX_RANGE_MILES: f64 = 10.0;

/// Speeds at or below this (knots) may carry altitude instead of course/speed
const ALTITUDE_SPEED_LIMIT_KNOTS: f64 = 5.0;

/// `c` byte marking a range estimate
const RANGE_MARKER: u8 = b'{';

// Compression type byte fields
const TYPE_FIX_CURRENT: u8 = 0b10_0000;
const TYPE_SOURCE_GGA: u8 = 0b1_0000;
const TYPE_SOURCE_RMC: u8 = 0b1_1000;
const TYPE_ORIGIN_SOFTWARE: u8 = 0b010;

/// Inputs for [`compress_position`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressParams {
    /// Latitude in decimal degrees (north positive)
    pub latitude: f64,
    /// Longitude in decimal degrees (east positive)
    pub longitude: f64,
    /// Altitude in feet; `Some` enables altitude reporting at low speed
    pub altitude_ft: Option<f64>,
    /// Course over ground in degrees
    pub course: u16,
    /// Speed over ground in knots
    pub speed_knots: f64,
    /// Symbol table identifier (`/`, `\` or an overlay)
    pub table: u8,
    /// Symbol code
    pub symbol: u8,
    /// Whether the position comes from a current GPS fix
    pub has_fix: bool,
}

/// Format a latitude as `DDMM.mmN` / `DDMM.mmS`.
///
/// # Examples
///
/// ```
/// use aprs_gateway::codec::position::latitude_to_dmm;
///
/// assert_eq!(latitude_to_dmm(12.576), "1234.56N");
/// assert_eq!(latitude_to_dmm(-33.5), "3330.00S");
/// ```
#[must_use]
pub fn latitude_to_dmm(degrees: f64) -> String {
    to_dmm(degrees, 2, 'N', 'S')
}

/// Format a longitude as `DDDMM.mmE` / `DDDMM.mmW`.
#[must_use]
pub fn longitude_to_dmm(degrees: f64) -> String {
    to_dmm(degrees, 3, 'E', 'W')
}

fn to_dmm(degrees: f64, width: usize, positive: char, negative: char) -> String {
    let hemisphere = if degrees < 0.0 { negative } else { positive };
    // Work in hundredths of a minute so rounding carries into degrees
    let total = (degrees.abs() * 6000.0).round() as u64;
    let whole = total / 6000;
    let minutes = (total % 6000) / 100;
    let hundredths = total % 100;
    format!(
        "{:0width$}{:02}.{:02}{}",
        whole,
        minutes,
        hundredths,
        hemisphere,
        width = width
    )
}

/// Parse `DDMM.mmH` or `DDDMM.mmH` back to signed decimal degrees.
///
/// Position ambiguity (spaces in place of digits) reads as zero.
#[must_use]
pub fn dmm_to_degrees(text: &str) -> Option<f64> {
    let text = text.trim();
    let hemisphere = text.chars().last()?;
    let number = text.get(..text.len() - 1)?.replace(' ', "0");

    let sign = match hemisphere {
        'N' | 'n' | 'E' | 'e' => 1.0,
        'S' | 's' | 'W' | 'w' => -1.0,
        _ => return None,
    };

    let dot = number.find('.')?;
    if dot < 3 {
        return None;
    }
    let degrees: f64 = number[..dot - 2].parse().ok()?;
    let minutes: f64 = number[dot - 2..].parse().ok()?;
    if minutes >= 60.0 {
        return None;
    }

    Some(sign * (degrees + minutes / 60.0))
}

/// Build the 13-byte compressed position block.
///
/// At or below 5 knots with altitude reporting enabled, the `cs` bytes carry
/// altitude (with a fix) or a coarse range estimate (without one) instead of
/// course and speed.
///
/// # Examples
///
/// ```
/// use aprs_gateway::codec::position::{compress_position, CompressParams};
///
/// let block = compress_position(&CompressParams {
///     latitude: 49.5,
///     longitude: -72.75,
///     altitude_ft: None,
///     course: 88,
///     speed_knots: 36.2,
///     table: b'/',
///     symbol: b'>',
///     has_fix: true,
/// });
/// assert_eq!(block.len(), 13);
/// assert!(block.starts_with('/'));
/// ```
#[must_use]
pub fn compress_position(params: &CompressParams) -> String {
    let lat_semicircles = (params.latitude.clamp(-90.0, 90.0) * SEMICIRCLES_PER_DEGREE) as i64;
    let lon_semicircles = (params.longitude.clamp(-180.0, 180.0) * SEMICIRCLES_PER_DEGREE) as i64;

    let y = (SEMICIRCLE_OFFSET - lat_semicircles).clamp(0, u32::MAX as i64) as u32;
    let x = (SEMICIRCLE_OFFSET + (lon_semicircles >> 1)).clamp(0, u32::MAX as i64) as u32;

    let mut out = Vec::with_capacity(13);
    out.push(params.table);
    out.extend_from_slice(&base91::encode_semicircle(y));
    out.extend_from_slice(&base91::encode_semicircle(x));
    out.push(params.symbol);

    let fix_bit = if params.has_fix { TYPE_FIX_CURRENT } else { 0 };

    match params.altitude_ft {
        Some(altitude) if params.speed_knots <= ALTITUDE_SPEED_LIMIT_KNOTS => {
            if params.has_fix {
                let encoded = (altitude.max(1.0).ln() / ALTITUDE_LOG_BASE.ln()).round();
                let encoded = encoded.clamp(0.0, f64::from(base91::BASE91_MAX_PAIR)) as u16;
                out.extend_from_slice(&base91::encode_pair(encoded));
                out.push(fix_bit | TYPE_SOURCE_GGA | TYPE_ORIGIN_SOFTWARE);
            } else {
                let range = ((NO_FIX_RANGE_MILES / 2.0).ln() / SPEED_LOG_BASE.ln()).round();
                out.push(RANGE_MARKER);
                out.push(range.clamp(0.0, 89.0) as u8 + base91::BASE91_OFFSET);
                out.push(TYPE_ORIGIN_SOFTWARE);
            }
        }
        _ => {
            let course = (params.course % 360) / 4;
            let speed = ((params.speed_knots.max(0.0) + 1.0).ln() / SPEED_LOG_BASE.ln()).round();
            out.push(course as u8 + base91::BASE91_OFFSET);
            out.push(speed.clamp(0.0, 89.0) as u8 + base91::BASE91_OFFSET);
            out.push(fix_bit | TYPE_SOURCE_RMC | TYPE_ORIGIN_SOFTWARE);
        }
    }

    // The type byte above was pushed raw; shift it into the Base-91 alphabet
    if let Some(last) = out.last_mut() {
        *last += base91::BASE91_OFFSET;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Decode the latitude/longitude of a compressed position block.
///
/// Accepts the block starting at the symbol table byte; only the first ten
/// bytes are required.
#[must_use]
pub fn decompress_position(block: &[u8]) -> Option<(f64, f64)> {
    let y = base91::decode(block.get(1..5)?)?;
    let x = base91::decode(block.get(5..9)?)?;
    let latitude = 90.0 - f64::from(y) / LATITUDE_SCALE;
    let longitude = -180.0 + f64::from(x) / LONGITUDE_SCALE;
    Some((latitude, longitude))
}
