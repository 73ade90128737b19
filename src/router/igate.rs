//! IGate gating rules between RF and APRS-IS.

use crate::aprs::packet::{has_ssid, NO_GATE_PATH};
use crate::aprs::Tnc2Packet;
use crate::beacon::builder;

/// Paths marking a packet that already came from the Internet
const INTERNET_PATH: [&str; 2] = ["TCPIP", "TCPXX"];

/// APRS-IS line for a packet heard on RF, or `None` if it must not be gated.
///
/// Packets routed via TCPIP/TCPXX/NOGATE/RFONLY, queries, and third-party
/// packets that came from the Internet stay on RF. Gated lines get
/// `,qAR,<igate call>` appended to the path.
#[must_use]
pub fn gate_to_internet(packet: &Tnc2Packet, igate_call: &str) -> Option<Vec<u8>> {
    if packet.path_contains_any(&NO_GATE_PATH) {
        return None;
    }

    match packet.info.first()? {
        b'?' => return None,
        b'}' => {
            let inner = Tnc2Packet::parse(&packet.info[1..])?;
            if inner.path_contains_any(&INTERNET_PATH) {
                return None;
            }
        }
        _ => {}
    }

    let mut line = format!("{},qAR,{}:", packet.header(), igate_call).into_bytes();
    line.extend_from_slice(&packet.info);
    Some(line)
}

/// Third-party RF frame for an APRS-IS line, or `None` if it must not be sent.
///
/// Lines from our own callsigns and sources without an SSID are skipped.
#[must_use]
pub fn gate_to_rf(
    packet: &Tnc2Packet,
    line: &str,
    igate_call: &str,
    tocall: &str,
    path: &str,
    own_calls: &[String],
) -> Option<String> {
    if own_calls
        .iter()
        .any(|call| call.eq_ignore_ascii_case(&packet.source))
    {
        return None;
    }
    if !has_ssid(&packet.source) {
        return None;
    }

    let original = line.trim_end_matches(['\r', '\n']);
    Some(builder::frame(igate_call, tocall, path, &format!("}}{}", original)))
}
