//! # Base-91 Telemetry
//!
//! Compressed telemetry appended to position comments: `|ss1122334455bb|`,
//! where each value is two Base-91 digits.

use super::base91::{self, BASE91_MAX_PAIR};

/// Frame delimiter
const DELIMITER: char = '|';

/// Pack comma-separated integers as a `|...|` Base-91 telemetry block.
///
/// Each token is clamped to `0..=8280`; tokens that do not parse pack as zero.
///
/// # Examples
///
/// ```
/// use aprs_gateway::codec::telemetry::pack;
///
/// assert_eq!(pack("123,0,8280"), "|\"A!!{{|");
/// ```
#[must_use]
pub fn pack(values: &str) -> String {
    let mut out = String::with_capacity(2 + values.len() * 2);
    out.push(DELIMITER);
    for token in values.split(',') {
        let value = token.trim().parse::<i64>().unwrap_or(0);
        let value = value.clamp(0, i64::from(BASE91_MAX_PAIR)) as u16;
        for c in base91::encode_pair(value) {
            out.push(c as char);
        }
    }
    out.push(DELIMITER);
    out
}

/// Unpack a `|...|` block into its values.
///
/// Returns `None` unless the block is delimited, holds an even number of
/// digits, and contains between one and seven values.
#[must_use]
pub fn unpack(block: &str) -> Option<Vec<u16>> {
    let inner = block.strip_prefix(DELIMITER)?.strip_suffix(DELIMITER)?;
    let bytes = inner.as_bytes();
    if bytes.is_empty() || bytes.len() % 2 != 0 || bytes.len() > 14 {
        return None;
    }

    bytes
        .chunks(2)
        .map(|pair| base91::decode(pair).map(|v| v as u16))
        .collect()
}

/// Find and unpack a compressed telemetry block inside a comment.
#[must_use]
pub fn find_in_comment(comment: &str) -> Option<Vec<u16>> {
    let start = comment.find(DELIMITER)?;
    let end = comment[start + 1..].find(DELIMITER)? + start + 1;
    unpack(&comment[start..=end])
}
