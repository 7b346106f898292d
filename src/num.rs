//! Numeric argument parsing and deterministic float formatting.
//!
//! Collections store numbers as byte strings, so every numeric command
//! round-trips through these helpers. Parsing is strict: no leading or
//! trailing junk, no leading zeros, no whitespace. Formatting is the
//! single deterministic formatter used everywhere a double becomes bytes
//! (replies, packed-sequence score entries, replication rewrites).

use crate::error::{Error, Result};

/// Parse a byte string as a 64-bit signed integer.
///
/// Accepts exactly the canonical decimal form: an optional minus sign,
/// then either a lone `0` or a non-zero leading digit. Anything else —
/// empty input, `+` signs, leading zeros, trailing bytes, overflow —
/// is rejected. This strictness is what makes integer-encoded packed
/// entries safe to re-render as strings.
pub fn parse_int(bytes: &[u8]) -> Result<i64> {
    if bytes.is_empty() {
        return Err(Error::NotAnInteger);
    }

    let (negative, digits) = match bytes[0] {
        b'-' => (true, &bytes[1..]),
        _ => (false, bytes),
    };

    if digits.is_empty() {
        return Err(Error::NotAnInteger);
    }

    // Single zero is fine; zero-padded numbers are not.
    if digits[0] == b'0' {
        return if digits.len() == 1 && !negative {
            Ok(0)
        } else {
            Err(Error::NotAnInteger)
        };
    }

    let mut magnitude: u64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(Error::NotAnInteger);
        }
        magnitude = magnitude
            .checked_mul(10)
            .and_then(|m| m.checked_add((b - b'0') as u64))
            .ok_or(Error::NotAnInteger)?;
    }

    if negative {
        // i64::MIN has magnitude i64::MAX + 1.
        if magnitude > i64::MAX as u64 + 1 {
            return Err(Error::NotAnInteger);
        }
        Ok((magnitude as i64).wrapping_neg())
    } else {
        if magnitude > i64::MAX as u64 {
            return Err(Error::NotAnInteger);
        }
        Ok(magnitude as i64)
    }
}

/// Parse a byte string as a double.
///
/// Infinities are accepted (`inf`, `+inf`, `-inf`, any case); NaN is not —
/// no score or increment in the engine may be NaN, so it is rejected at
/// the outermost parse.
pub fn parse_float(bytes: &[u8]) -> Result<f64> {
    let s = std::str::from_utf8(bytes).map_err(|_| Error::NotAFloat)?;
    let value: f64 = s.parse().map_err(|_| Error::NotAFloat)?;
    if value.is_nan() {
        return Err(Error::NotAFloat);
    }
    Ok(value)
}

/// Format a double as its canonical byte string.
///
/// Finite values use shortest-round-trip formatting (deterministic across
/// platforms, at most 17 significant digits, integral values render with
/// no decimal point). Infinities render as `inf` / `-inf`.
pub fn format_double(value: f64) -> Vec<u8> {
    if value.is_infinite() {
        return if value > 0.0 { b"inf".to_vec() } else { b"-inf".to_vec() };
    }
    debug_assert!(!value.is_nan(), "NaN must be rejected before formatting");
    format!("{value}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_canonical_forms() {
        assert_eq!(parse_int(b"0").unwrap(), 0);
        assert_eq!(parse_int(b"12345").unwrap(), 12345);
        assert_eq!(parse_int(b"-12345").unwrap(), -12345);
        assert_eq!(parse_int(b"9223372036854775807").unwrap(), i64::MAX);
        assert_eq!(parse_int(b"-9223372036854775808").unwrap(), i64::MIN);
    }

    #[test]
    fn parse_int_rejects_junk() {
        for bad in [
            &b""[..], b"-", b"+1", b"01", b"-0", b"1x", b" 1", b"1 ",
            b"9223372036854775808", b"-9223372036854775809",
        ] {
            assert!(parse_int(bad).is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn parse_float_accepts_inf_rejects_nan() {
        assert_eq!(parse_float(b"1.5").unwrap(), 1.5);
        assert_eq!(parse_float(b"inf").unwrap(), f64::INFINITY);
        assert_eq!(parse_float(b"-inf").unwrap(), f64::NEG_INFINITY);
        assert!(parse_float(b"nan").is_err());
        assert!(parse_float(b"").is_err());
        assert!(parse_float(b"1.5x").is_err());
    }

    #[test]
    fn format_double_is_shortest_form() {
        assert_eq!(format_double(2.0), b"2");
        assert_eq!(format_double(1.5), b"1.5");
        assert_eq!(format_double(22.0), b"22");
        assert_eq!(format_double(f64::INFINITY), b"inf");
        assert_eq!(format_double(f64::NEG_INFINITY), b"-inf");
        // Round-trips exactly.
        let x = 0.1 + 0.2;
        assert_eq!(parse_float(&format_double(x)).unwrap(), x);
    }
}
