//! # AX.25 UI Frames
//!
//! Byte layout of the frames carried inside KISS data frames, and conversion
//! to and from TNC2 text. Only UI frames (control 0x03, PID 0xF0) carry APRS.

use std::fmt;

use crate::aprs::{PathEntry, Tnc2Packet};
use crate::error::{GatewayError, Result};

/// Unnumbered information frame
pub const CONTROL_UI: u8 = 0x03;

/// No layer 3 protocol
pub const PID_NO_LAYER3: u8 = 0xF0;

/// Bytes per encoded address
pub const ADDRESS_LEN: usize = 7;

/// Destination, source and up to eight repeaters
pub const MAX_ADDRESSES: usize = 10;

/// Longest callsign an address field can hold
const MAX_CALL_LEN: usize = 6;

/// Highest SSID
const MAX_SSID: u8 = 15;

/// Command/has-been-repeated bit of the SSID byte
const H_BIT: u8 = 0x80;

/// Reserved bits, always set
const RESERVED_BITS: u8 = 0x60;

/// Address extension bit, set on the last address
const LAST_ADDRESS_BIT: u8 = 0x01;

/// A callsign with SSID as carried in an AX.25 address field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ax25Address {
    pub callsign: String,
    pub ssid: u8,
    /// Command bit on destination/source, has-been-repeated on repeaters
    pub h_bit: bool,
}

impl Ax25Address {
    /// Parse `CALL`, `CALL-SSID` or `CALL-SSID*`
    ///
    /// # Errors
    ///
    /// Returns error if the callsign is empty, longer than six characters,
    /// not alphanumeric, or the SSID is not 0-15
    pub fn parse(text: &str) -> Result<Self> {
        let (text, h_bit) = match text.strip_suffix('*') {
            Some(rest) => (rest, true),
            None => (text, false),
        };
        let (call, ssid) = match text.split_once('-') {
            Some((call, ssid)) => {
                let ssid = ssid
                    .parse::<u8>()
                    .ok()
                    .filter(|s| *s <= MAX_SSID)
                    .ok_or_else(|| GatewayError::MalformedPacket(format!("Invalid SSID in {}", text)))?;
                (call, ssid)
            }
            None => (text, 0),
        };

        if call.is_empty() || call.len() > MAX_CALL_LEN || !call.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(GatewayError::MalformedPacket(format!("Invalid AX.25 callsign: {}", text)));
        }

        Ok(Self {
            callsign: call.to_ascii_uppercase(),
            ssid,
            h_bit,
        })
    }

    /// Decode one 7-byte address field
    ///
    /// Returns the address and whether the extension bit marks it as last.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, bool)> {
        if bytes.len() < ADDRESS_LEN {
            return Err(GatewayError::MalformedPacket("Address field too short".to_string()));
        }

        let mut callsign = String::with_capacity(MAX_CALL_LEN);
        for &b in &bytes[..MAX_CALL_LEN] {
            if b & LAST_ADDRESS_BIT != 0 {
                return Err(GatewayError::MalformedPacket(format!(
                    "Extension bit inside callsign byte 0x{:02X}",
                    b
                )));
            }
            let c = (b >> 1) as char;
            if c != ' ' {
                callsign.push(c);
            }
        }
        if callsign.is_empty() {
            return Err(GatewayError::MalformedPacket("Empty callsign".to_string()));
        }

        let ssid_byte = bytes[MAX_CALL_LEN];
        Ok((
            Self {
                callsign,
                ssid: (ssid_byte >> 1) & 0x0F,
                h_bit: ssid_byte & H_BIT != 0,
            },
            ssid_byte & LAST_ADDRESS_BIT != 0,
        ))
    }

    /// Encode as a 7-byte address field
    pub fn to_bytes(&self, last: bool) -> [u8; ADDRESS_LEN] {
        let mut out = [b' ' << 1; ADDRESS_LEN];
        for (slot, b) in out.iter_mut().zip(self.callsign.bytes().take(MAX_CALL_LEN)) {
            *slot = b.to_ascii_uppercase() << 1;
        }
        let mut ssid_byte = RESERVED_BITS | ((self.ssid & 0x0F) << 1);
        if self.h_bit {
            ssid_byte |= H_BIT;
        }
        if last {
            ssid_byte |= LAST_ADDRESS_BIT;
        }
        out[MAX_CALL_LEN] = ssid_byte;
        out
    }

    /// TNC2 spelling, SSID 0 omitted
    pub fn call_text(&self) -> String {
        if self.ssid == 0 {
            self.callsign.clone()
        } else {
            format!("{}-{}", self.callsign, self.ssid)
        }
    }
}

impl fmt::Display for Ax25Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.call_text())
    }
}

/// An AX.25 UI frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ax25Frame {
    pub destination: Ax25Address,
    pub source: Ax25Address,
    pub path: Vec<Ax25Address>,
    pub info: Vec<u8>,
}

impl Ax25Frame {
    /// Decode frame bytes (no flags, no FCS)
    ///
    /// # Errors
    ///
    /// Returns error if the address block is truncated or too long, or the
    /// frame is not a UI frame with PID 0xF0
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut addresses = Vec::with_capacity(2);
        let mut offset = 0;
        loop {
            if addresses.len() == MAX_ADDRESSES {
                return Err(GatewayError::MalformedPacket("Too many addresses".to_string()));
            }
            let field = bytes
                .get(offset..offset + ADDRESS_LEN)
                .ok_or_else(|| GatewayError::MalformedPacket("Truncated address block".to_string()))?;
            let (address, last) = Ax25Address::from_bytes(field)?;
            addresses.push(address);
            offset += ADDRESS_LEN;
            if last {
                break;
            }
        }

        if addresses.len() < 2 {
            return Err(GatewayError::MalformedPacket("Missing source address".to_string()));
        }

        match bytes.get(offset..offset + 2) {
            Some([CONTROL_UI, PID_NO_LAYER3]) => {}
            Some([control, pid]) => {
                return Err(GatewayError::MalformedPacket(format!(
                    "Not an APRS UI frame: control 0x{:02X} pid 0x{:02X}",
                    control, pid
                )));
            }
            _ => return Err(GatewayError::MalformedPacket("Missing control/PID".to_string())),
        }

        let mut addresses = addresses.into_iter();
        let (Some(destination), Some(source)) = (addresses.next(), addresses.next()) else {
            return Err(GatewayError::MalformedPacket("Missing source address".to_string()));
        };

        Ok(Self {
            destination,
            source,
            path: addresses.collect(),
            info: bytes[offset + 2..].to_vec(),
        })
    }

    /// Encode to frame bytes (no flags, no FCS)
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity((2 + self.path.len()) * ADDRESS_LEN + 2 + self.info.len());

        let destination = Ax25Address {
            h_bit: true,
            ..self.destination.clone()
        };
        out.extend_from_slice(&destination.to_bytes(false));
        let source = Ax25Address {
            h_bit: false,
            ..self.source.clone()
        };
        out.extend_from_slice(&source.to_bytes(self.path.is_empty()));
        for (i, hop) in self.path.iter().enumerate() {
            out.extend_from_slice(&hop.to_bytes(i + 1 == self.path.len()));
        }

        out.push(CONTROL_UI);
        out.push(PID_NO_LAYER3);
        out.extend_from_slice(&self.info);
        out
    }

    /// Build from a TNC2 packet
    ///
    /// # Errors
    ///
    /// Returns error if any address cannot be carried in AX.25, or the path
    /// has more than eight entries
    pub fn from_tnc2(packet: &Tnc2Packet) -> Result<Self> {
        if packet.path.len() > MAX_ADDRESSES - 2 {
            return Err(GatewayError::MalformedPacket(format!(
                "Path has {} entries, AX.25 allows {}",
                packet.path.len(),
                MAX_ADDRESSES - 2
            )));
        }

        let path = packet
            .path
            .iter()
            .map(|entry| {
                let mut address = Ax25Address::parse(&entry.call)?;
                address.h_bit = entry.repeated;
                Ok(address)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            destination: Ax25Address::parse(&packet.destination)?,
            source: Ax25Address::parse(&packet.source)?,
            path,
            info: packet.info.clone(),
        })
    }

    /// TNC2 form of this frame
    ///
    /// Every repeater with the H-bit set is marked used.
    pub fn to_tnc2(&self) -> Tnc2Packet {
        Tnc2Packet {
            source: self.source.call_text(),
            destination: self.destination.call_text(),
            path: self
                .path
                .iter()
                .map(|hop| PathEntry::new(hop.call_text(), hop.h_bit))
                .collect(),
            info: self.info.clone(),
        }
    }
}
