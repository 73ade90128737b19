//! # KISS Encoder
//!
//! Byte stuffing and framing for frames sent to a TNC.

use super::protocol::*;

/// Escape FEND and FESC inside frame contents
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8);
    for &b in data {
        match b {
            FEND => out.extend_from_slice(&[FESC, TFEND]),
            FESC => out.extend_from_slice(&[FESC, TFESC]),
            _ => out.push(b),
        }
    }
    out
}

/// Encode a complete KISS frame
///
/// # Returns
///
/// * `Vec<u8>` - `FEND type escaped-data FEND`
///
/// # Examples
///
/// ```
/// use aprs_gateway::kiss::encoder::encode_frame;
/// use aprs_gateway::kiss::KissFrame;
///
/// let frame = KissFrame::data(vec![0xC0, 0x41]).unwrap();
/// assert_eq!(encode_frame(&frame), vec![0xC0, 0x00, 0xDB, 0xDC, 0x41, 0xC0]);
/// ```
pub fn encode_frame(frame: &KissFrame) -> Vec<u8> {
    let escaped = escape(&frame.data);
    let mut out = Vec::with_capacity(escaped.len() + 3);
    out.push(FEND);
    out.push(frame.type_byte());
    out.extend_from_slice(&escaped);
    out.push(FEND);
    out
}

/// Encode `data` as a port 0 data frame
pub fn encode_data_frame(data: &[u8]) -> Vec<u8> {
    let escaped = escape(data);
    let mut out = Vec::with_capacity(escaped.len() + 3);
    out.push(FEND);
    out.push(CMD_DATA);
    out.extend_from_slice(&escaped);
    out.push(FEND);
    out
}
