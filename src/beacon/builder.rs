//! Text builders for locally originated packets.

use super::{WeatherReport, FEET_PER_METRE};
use crate::codec::mic_e::{self, MicEExtension, MicEParams};
use crate::codec::position::{compress_position, latitude_to_dmm, longitude_to_dmm, CompressParams};
use crate::config::PositionFormat;
use crate::error::Result;

/// Width of a message addressee field
const ADDRESSEE_LEN: usize = 9;

/// Inputs for a position beacon.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport<'a> {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: Option<f64>,
    pub course: u16,
    pub speed_knots: f64,
    pub table: char,
    pub symbol: char,
    pub comment: &'a str,
    pub format: PositionFormat,
    pub has_fix: bool,
    /// Mic-E message bits
    pub mic_e_message: u8,
}

/// Information field plus, for Mic-E, the destination it must be sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconPayload {
    pub destination: Option<String>,
    pub info: String,
}

/// Build a position report in the requested format.
pub fn position(report: &PositionReport<'_>) -> Result<BeaconPayload> {
    let altitude_ft = report.altitude_m.map(|m| m * FEET_PER_METRE);

    let info = match report.format {
        PositionFormat::Uncompressed => {
            let mut info = format!(
                "!{}{}{}{}",
                latitude_to_dmm(report.latitude),
                report.table,
                longitude_to_dmm(report.longitude),
                report.symbol
            );
            if report.speed_knots > 0.0 || report.course > 0 {
                info.push_str(&format!(
                    "{:03}/{:03}",
                    report.course % 360,
                    report.speed_knots.round().min(999.0) as u32
                ));
            }
            if let Some(ft) = altitude_ft {
                info.push_str(&format!("/A={:06}", ft.round() as i64));
            }
            info.push_str(report.comment);
            info
        }
        PositionFormat::Compressed => {
            let block = compress_position(&CompressParams {
                latitude: report.latitude,
                longitude: report.longitude,
                altitude_ft,
                course: report.course,
                speed_knots: report.speed_knots,
                table: report.table as u8,
                symbol: report.symbol as u8,
                has_fix: report.has_fix,
            });
            format!("!{}{}", block, report.comment)
        }
        PositionFormat::MicE => {
            let extension = if report.altitude_m.is_some() || !report.comment.is_empty() {
                MicEExtension::Status {
                    altitude_m: report.altitude_m,
                    text: report.comment.to_string(),
                }
            } else {
                MicEExtension::None
            };
            let encoded = mic_e::encode(&MicEParams {
                latitude: report.latitude,
                longitude: report.longitude,
                speed_knots: report.speed_knots,
                course: report.course,
                message: report.mic_e_message,
                symbol: report.symbol as u8,
                table: report.table as u8,
                extension,
            })?;
            return Ok(BeaconPayload {
                destination: Some(encoded.destination),
                info: encoded.info,
            });
        }
    };

    Ok(BeaconPayload {
        destination: None,
        info,
    })
}

/// `>text`
#[must_use]
pub fn status(text: &str) -> String {
    format!(">{}", text)
}

/// Assemble `SRC>DST[,PATH]:INFO`.
#[must_use]
pub fn frame(source: &str, destination: &str, path: &str, info: &str) -> String {
    if path.is_empty() {
        format!("{}>{}:{}", source, destination, info)
    } else {
        format!("{}>{},{}:{}", source, destination, path, info)
    }
}

/// Message addressee padded to nine characters.
#[must_use]
pub fn addressee(call: &str) -> String {
    format!("{:<width$}", call, width = ADDRESSEE_LEN)
}

/// `T#seq,a1,...,a5,bbbbbbbb`
#[must_use]
pub fn telemetry_values(seq: u16, analog: &[u32], bits: u8) -> String {
    let mut out = format!("T#{:03}", seq % 1000);
    for value in analog {
        out.push_str(&format!(",{}", value));
    }
    out.push_str(&format!(",{:08b}", bits));
    out
}

/// `PARM.`, `UNIT.` and `EQNS.` messages describing `call`'s telemetry.
#[must_use]
pub fn telemetry_definitions(call: &str, names: &[&str], units: &[&str], eqns: &[[f64; 3]]) -> [String; 3] {
    let to = addressee(call);
    let eqns: Vec<String> = eqns
        .iter()
        .flat_map(|e| e.iter().map(|c| format_coefficient(*c)))
        .collect();
    [
        format!(":{}:PARM.{}", to, names.join(",")),
        format!(":{}:UNIT.{}", to, units.join(",")),
        format!(":{}:EQNS.{}", to, eqns.join(",")),
    ]
}

fn format_coefficient(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Complete weather report at a fixed position.
#[must_use]
pub fn weather(latitude: f64, longitude: f64, report: &WeatherReport, comment: &str) -> String {
    fn field(value: Option<i64>, width: usize) -> String {
        match value {
            Some(v) => format!("{:0width$}", v, width = width),
            None => ".".repeat(width),
        }
    }

    let round = |v: Option<f64>| v.map(|v| v.round() as i64);
    let humidity = report.humidity.map(|h| if h >= 100 { 0 } else { i64::from(h) });
    let pressure = report.pressure_hpa.map(|p| (p * 10.0).round() as i64);

    format!(
        "!{}/{}_{}/{}g{}t{}r{}p{}P{}h{}b{}{}",
        latitude_to_dmm(latitude),
        longitude_to_dmm(longitude),
        field(report.wind_dir.map(|d| i64::from(d % 360)), 3),
        field(round(report.wind_speed_mph), 3),
        field(round(report.wind_gust_mph), 3),
        field(round(report.temperature_f), 3),
        field(report.rain_1h.map(i64::from), 3),
        field(report.rain_24h.map(i64::from), 3),
        field(report.rain_midnight.map(i64::from), 3),
        field(humidity, 2),
        field(pressure, 5),
        comment
    )
}
