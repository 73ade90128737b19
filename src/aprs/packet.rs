//! # TNC2 Packet Model
//!
//! Parsing and formatting of the textual `SRC>DST,PATH:INFO` form shared by
//! APRS-IS, TNC2-mode serial TNCs and the transmit queue.

use std::fmt;

use super::classify::{classify, PacketKind};
use crate::codec::{mic_e, position};

/// Path aliases that must never be gated from RF to the Internet
pub const NO_GATE_PATH: [&str; 4] = ["TCPIP", "TCPXX", "NOGATE", "RFONLY"];

/// First byte index searched for the header/info `:` in an APRS-IS line
const INTERNET_HEADER_MIN_LEN: usize = 10;

/// One repeater entry in a packet path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    /// Callsign or alias, without the `*` marker
    pub call: String,
    /// Has-been-repeated flag (`*`)
    pub repeated: bool,
}

impl PathEntry {
    #[must_use]
    pub fn new(call: impl Into<String>, repeated: bool) -> Self {
        Self {
            call: call.into(),
            repeated,
        }
    }

    /// Parse `CALL` or `CALL*`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.strip_suffix('*') {
            Some(call) => Self::new(call, true),
            None => Self::new(text, false),
        }
    }
}

impl fmt::Display for PathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.call)?;
        if self.repeated {
            f.write_str("*")?;
        }
        Ok(())
    }
}

/// An APRS packet in TNC2 form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tnc2Packet {
    pub source: String,
    pub destination: String,
    pub path: Vec<PathEntry>,
    pub info: Vec<u8>,
}

impl Tnc2Packet {
    /// Parse a TNC2 line: first `>` ends the source, first `:` after it ends the header.
    ///
    /// # Examples
    ///
    /// ```
    /// use aprs_gateway::aprs::packet::Tnc2Packet;
    ///
    /// let packet = Tnc2Packet::parse(b"N0CALL-9>APRS,WIDE1-1*,WIDE2-1:>status").unwrap();
    /// assert_eq!(packet.source, "N0CALL-9");
    /// assert_eq!(packet.path.len(), 2);
    /// assert!(packet.path[0].repeated);
    /// assert_eq!(packet.info, b">status");
    /// ```
    #[must_use]
    pub fn parse(line: &[u8]) -> Option<Self> {
        let line = trim_line_end(line);
        let gt = line.iter().position(|&b| b == b'>')?;
        let colon = gt + line[gt..].iter().position(|&b| b == b':')?;
        Self::from_parts(line, gt, colon)
    }

    fn from_parts(line: &[u8], gt: usize, colon: usize) -> Option<Self> {
        if gt == 0 || colon <= gt + 1 {
            return None;
        }

        let source = std::str::from_utf8(&line[..gt]).ok()?.trim();
        let header = std::str::from_utf8(&line[gt + 1..colon]).ok()?;
        let mut fields = header.split(',');
        let destination = fields.next()?.trim();

        if source.is_empty() || destination.is_empty() || source.contains(' ') {
            return None;
        }

        let path = fields
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(PathEntry::parse)
            .collect();

        Some(Self {
            source: source.to_string(),
            destination: destination.to_string(),
            path,
            info: line[colon + 1..].to_vec(),
        })
    }

    /// `SRC>DST,PATH` without the trailing colon
    #[must_use]
    pub fn header(&self) -> String {
        let mut header = format!("{}>{}", self.source, self.destination);
        for entry in &self.path {
            header.push(',');
            header.push_str(&entry.to_string());
        }
        header
    }

    /// Full TNC2 bytes, no line terminator
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header().into_bytes();
        out.push(b':');
        out.extend_from_slice(&self.info);
        out
    }

    #[must_use]
    pub fn kind(&self) -> PacketKind {
        classify(&self.info)
    }

    /// True when any path entry names one of `aliases` (ignoring `*`).
    #[must_use]
    pub fn path_contains_any(&self, aliases: &[&str]) -> bool {
        header_has_any(&self.path, aliases)
    }

    /// True when some hop has already been used.
    #[must_use]
    pub fn has_used_hop(&self) -> bool {
        self.path.iter().any(|entry| entry.repeated)
    }

    /// Object or item name carried by the information field.
    #[must_use]
    pub fn object_name(&self) -> Option<String> {
        object_name(&self.info)
    }

    /// Position reported by this packet, as (latitude, longitude).
    #[must_use]
    pub fn position(&self) -> Option<(f64, f64)> {
        extract_position(&self.destination, &self.info)
    }
}

impl fmt::Display for Tnc2Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.header(), String::from_utf8_lossy(&self.info))
    }
}

/// True for APRS-IS server comment lines (`# aprsc ...`).
#[must_use]
pub fn is_server_comment(line: &str) -> bool {
    line.starts_with('#')
}

/// Parse a line received from APRS-IS.
///
/// The header ends at the first `:` found at or after byte 10. Comment lines
/// and lines without the `>`/`:` delimiters yield `None`.
#[must_use]
pub fn parse_internet_line(line: &str) -> Option<Tnc2Packet> {
    if is_server_comment(line) {
        return None;
    }
    let bytes = trim_line_end(line.as_bytes());
    let gt = bytes.iter().position(|&b| b == b'>')?;
    let search_from = INTERNET_HEADER_MIN_LEN.max(gt + 1);
    let colon = search_from + bytes.get(search_from..)?.iter().position(|&b| b == b':')?;
    Tnc2Packet::from_parts(bytes, gt, colon)
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| b != b'\r' && b != b'\n')
        .map_or(0, |p| p + 1);
    &line[..end]
}

/// True when any path entry names one of `aliases`, ignoring case and `*`.
#[must_use]
pub fn header_has_any(path: &[PathEntry], aliases: &[&str]) -> bool {
    path.iter()
        .any(|entry| aliases.iter().any(|alias| entry.call.eq_ignore_ascii_case(alias)))
}

/// True when the callsign carries a numeric SSID (`CALL-7`).
#[must_use]
pub fn has_ssid(call: &str) -> bool {
    call.split_once('-')
        .is_some_and(|(_, ssid)| ssid.chars().next().is_some_and(|c| c.is_ascii_digit()))
}

/// Callsign without its SSID.
#[must_use]
pub fn base_call(call: &str) -> &str {
    call.split_once('-').map_or(call, |(base, _)| base)
}

/// `CALL` for SSID 0, `CALL-N` otherwise.
#[must_use]
pub fn with_ssid(call: &str, ssid: u8) -> String {
    if ssid == 0 {
        call.to_string()
    } else {
        format!("{}-{}", call, ssid)
    }
}

/// Name of an object (`;NAME_____*`) or item (`)NAME!`).
#[must_use]
pub fn object_name(info: &[u8]) -> Option<String> {
    let raw = match info.first()? {
        b';' => info.get(1..10)?,
        b')' => {
            let end = info
                .iter()
                .skip(1)
                .take(10)
                .position(|&b| b == b'!' || b == b'_')?;
            &info[1..1 + end]
        }
        _ => return None,
    };
    let name = String::from_utf8_lossy(raw).trim_end().to_string();
    (!name.is_empty()).then_some(name)
}

/// Position carried by an information field, as (latitude, longitude).
///
/// Understands uncompressed and compressed position/object/item reports and
/// Mic-E (which needs the destination address).
#[must_use]
pub fn extract_position(destination: &str, info: &[u8]) -> Option<(f64, f64)> {
    let body = match info.first()? {
        b'!' | b'=' => info.get(1..)?,
        b'/' | b'@' => info.get(8..)?,
        b';' => info.get(18..)?,
        b')' => {
            let end = info.iter().skip(1).position(|&b| b == b'!' || b == b'_')?;
            info.get(end + 2..)?
        }
        b'`' | b'\'' => return mic_e::decode_position(destination, info),
        _ => return None,
    };

    if body.first()?.is_ascii_digit() {
        let lat = std::str::from_utf8(body.get(0..8)?).ok()?;
        let lon = std::str::from_utf8(body.get(9..18)?).ok()?;
        Some((position::dmm_to_degrees(lat)?, position::dmm_to_degrees(lon)?))
    } else {
        position::decompress_position(body.get(..13)?)
    }
}
