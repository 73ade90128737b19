//! # Base-91 Numerals
//!
//! APRS Base-91 uses the printable characters `!` (0x21) through `{` (0x7B),
//! one digit per character, most significant digit first.
//!
//! Two four-digit encoders share the same greedy digit extraction:
//!
//! - [`encode`] uses plain powers of 91 and round-trips exactly through [`decode`].
//! - [`encode_semicircle`] uses weights pre-scaled for coordinates expressed in
//!   semicircles (2³¹ per 180°), so the compressed-position encoder can work on
//!   integer semicircle values directly while producing standard APRS digits.

/// ASCII value of Base-91 digit zero (`!`)
pub const BASE91_OFFSET: u8 = 33;

/// Largest digit value
pub const BASE91_MAX_DIGIT: u32 = 90;

/// Largest value representable in four digits (91⁴ − 1)
pub const BASE91_MAX_VALUE: u32 = 91 * 91 * 91 * 91 - 1;

/// Largest value representable in two digits (91² − 1)
pub const BASE91_MAX_PAIR: u16 = 91 * 91 - 1;

/// Digit weights for plain Base-91 (91³, 91², 91, 1)
const POWER_WEIGHTS: [u32; 4] = [753_571, 8_281, 91, 1];

/// Digit weights for semicircle-scaled coordinates
const SEMICIRCLE_WEIGHTS: [u32; 4] = [23_601_572, 259_358, 2_851, 32];

/// Encode a value as four Base-91 digits.
///
/// Values above 91⁴ − 1 saturate at `{{{{`.
///
/// # Examples
///
/// ```
/// use aprs_gateway::codec::base91::{decode, encode};
///
/// let digits = encode(12_345_678);
/// assert_eq!(decode(&digits), Some(12_345_678));
/// ```
#[must_use]
pub fn encode(value: u32) -> [u8; 4] {
    encode_with_weights(value.min(BASE91_MAX_VALUE), &POWER_WEIGHTS)
}

/// Encode a semicircle-scaled coordinate quantity as four Base-91 digits.
#[must_use]
pub fn encode_semicircle(value: u32) -> [u8; 4] {
    encode_with_weights(value, &SEMICIRCLE_WEIGHTS)
}

/// Encode a value as two Base-91 digits, saturating at 91² − 1.
#[must_use]
pub fn encode_pair(value: u16) -> [u8; 2] {
    let value = value.min(BASE91_MAX_PAIR);
    [
        (value / 91) as u8 + BASE91_OFFSET,
        (value % 91) as u8 + BASE91_OFFSET,
    ]
}

fn encode_with_weights(mut value: u32, weights: &[u32; 4]) -> [u8; 4] {
    let mut out = [BASE91_OFFSET; 4];
    for (slot, &weight) in out.iter_mut().zip(weights) {
        let digit = (value / weight).min(BASE91_MAX_DIGIT);
        value -= digit * weight;
        *slot = digit as u8 + BASE91_OFFSET;
    }
    out
}

/// Decode up to five Base-91 digits.
///
/// Returns `None` for an empty slice, a character outside `!`..=`{`, or
/// more digits than fit in a `u32`.
#[must_use]
pub fn decode(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() || digits.len() > 5 {
        return None;
    }

    digits.iter().try_fold(0u32, |acc, &c| {
        if !(BASE91_OFFSET..=BASE91_OFFSET + BASE91_MAX_DIGIT as u8).contains(&c) {
            return None;
        }
        acc.checked_mul(91)?.checked_add(u32::from(c - BASE91_OFFSET))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_zero_and_max() {
        assert_eq!(&encode(0), b"!!!!");
        assert_eq!(&encode(BASE91_MAX_VALUE), b"{{{{");
        assert_eq!(&encode(u32::MAX), b"{{{{");
    }

    #[test]
    fn test_round_trip_sampled_range() {
        // Stride through the full four-digit range plus its edges
        let mut v = 0u32;
        while v <= BASE91_MAX_VALUE {
            assert_eq!(decode(&encode(v)), Some(v), "value {}", v);
            v += 7_919;
        }
        for v in [1, 90, 91, 8_280, 8_281, 753_570, 753_571, BASE91_MAX_VALUE] {
            assert_eq!(decode(&encode(v)), Some(v), "value {}", v);
        }
    }

    #[test]
    fn test_digits_stay_in_alphabet() {
        for v in [0, 1, 12_345, 9_999_999, BASE91_MAX_VALUE] {
            for c in encode(v) {
                assert!((b'!'..=b'{').contains(&c));
            }
        }
        for v in [0u32, 1 << 20, 1 << 30, 1 << 31] {
            for c in encode_semicircle(v) {
                assert!((b'!'..=b'{').contains(&c));
            }
        }
    }

    #[test]
    fn test_semicircle_weights_track_standard_scale() {
        // 2^30 semicircles is 90 degrees of latitude, 90 * 380926 in standard units
        let scaled = decode(&encode_semicircle(1 << 30)).unwrap();
        let standard = 90 * 380_926;
        assert!((scaled as i64 - standard as i64).abs() < 91, "got {}", scaled);
    }

    #[test]
    fn test_encode_pair() {
        assert_eq!(&encode_pair(0), b"!!");
        assert_eq!(&encode_pair(123), b"\"A");
        assert_eq!(&encode_pair(8_280), b"{{");
        assert_eq!(&encode_pair(9_000), b"{{");
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert_eq!(decode(b""), None);
        assert_eq!(decode(b" !!!"), None);
        assert_eq!(decode(b"|"), None);
        assert_eq!(decode(b"!!!!!!"), None);
    }
}
