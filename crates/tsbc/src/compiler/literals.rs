// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Numeric literal parsing.
//!
//! Literals arrive as raw source text. Integral literals are parsed to
//! arbitrary precision so that no magnitude is lost before the target type
//! decides how to truncate it.

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use thiserror::Error;

/// Why a literal could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiteralError {
    /// No digits after the sign and prefix.
    #[error("literal has no digits")]
    Empty,
    /// A digit is not valid for the radix.
    #[error("invalid digit in base {radix} literal '{text}'")]
    InvalidDigit {
        /// The radix in effect
        radix: u32,
        /// The literal
        text: String,
    },
    /// A `_` separator at the start, end, or next to another separator.
    #[error("misplaced numeric separator in '{0}'")]
    MisplacedSeparator(String),
}

/// A parsed numeric literal.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericLiteral {
    /// An integral value of any magnitude
    Integer(BigInt),
    /// A fractional or exponent literal
    Float(f64),
}

impl NumericLiteral {
    /// Negates the literal.
    pub fn negate(self) -> Self {
        match self {
            NumericLiteral::Integer(value) => NumericLiteral::Integer(-value),
            NumericLiteral::Float(value) => NumericLiteral::Float(-value),
        }
    }

    /// The literal as a double.
    pub fn to_f64(&self) -> f64 {
        match self {
            NumericLiteral::Integer(value) => value.to_f64().unwrap_or(f64::NAN),
            NumericLiteral::Float(value) => *value,
        }
    }

    /// Returns true when the value is zero.
    pub fn is_zero(&self) -> bool {
        match self {
            NumericLiteral::Integer(value) => value.is_zero(),
            NumericLiteral::Float(value) => *value == 0.0,
        }
    }
}

/// Splits an optional sign off the front of a literal.
fn split_sign(text: &str) -> (bool, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = text.strip_prefix('+') {
        (false, rest)
    } else {
        (false, text)
    }
}

/// Splits a radix prefix off the front of a literal.
fn split_radix(text: &str) -> (u32, &str) {
    let prefix = text.get(..2).map(str::to_ascii_lowercase);
    match prefix.as_deref() {
        Some("0x") => (16, &text[2..]),
        Some("0o") => (8, &text[2..]),
        Some("0b") => (2, &text[2..]),
        _ => (10, text),
    }
}

/// Removes `_` separators, rejecting leading, trailing and doubled ones.
fn strip_separators(digits: &str, original: &str) -> Result<String, LiteralError> {
    if digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return Err(LiteralError::MisplacedSeparator(original.to_string()));
    }
    Ok(digits.chars().filter(|c| *c != '_').collect())
}

fn parse_digits(digits: &str, radix: u32, original: &str) -> Result<BigInt, LiteralError> {
    if digits.is_empty() {
        return Err(LiteralError::Empty);
    }
    BigInt::parse_bytes(digits.as_bytes(), radix).ok_or_else(|| LiteralError::InvalidDigit {
        radix,
        text: original.to_string(),
    })
}

/// Parses a bigint literal such as `123n`, `-0xFF_FFn` or `0b1010`.
pub fn parse_bigint(raw: &str) -> Result<BigInt, LiteralError> {
    let text = raw.trim();
    let (negative, text) = split_sign(text);
    let text = text.strip_suffix('n').unwrap_or(text);
    let (radix, digits) = split_radix(text);
    let digits = strip_separators(digits, raw)?;
    let value = parse_digits(&digits, radix, raw)?;
    Ok(if negative { -value } else { value })
}

/// Parses a number literal such as `42`, `0x1F`, `1_000_000` or `2.5e-3`.
pub fn parse_number(raw: &str) -> Result<NumericLiteral, LiteralError> {
    let text = raw.trim();
    let (negative, text) = split_sign(text);
    let (radix, digits) = split_radix(text);
    let digits = strip_separators(digits, raw)?;

    let literal = if radix == 10 && digits.contains(['.', 'e', 'E']) {
        let value: f64 = digits.parse().map_err(|_| LiteralError::InvalidDigit {
            radix,
            text: raw.to_string(),
        })?;
        NumericLiteral::Float(value)
    } else {
        NumericLiteral::Integer(parse_digits(&digits, radix, raw)?)
    };
    Ok(if negative { literal.negate() } else { literal })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(text: &str) -> BigInt {
        BigInt::parse_bytes(text.as_bytes(), 10).unwrap()
    }

    #[test]
    fn test_bigint_decimal() {
        assert_eq!(parse_bigint("123n").unwrap(), big("123"));
        assert_eq!(parse_bigint("-42n").unwrap(), big("-42"));
        assert_eq!(parse_bigint("+7").unwrap(), big("7"));
        assert_eq!(
            parse_bigint("9223372036854775808n").unwrap(),
            big("9223372036854775808")
        );
    }

    #[test]
    fn test_bigint_radix_prefixes() {
        assert_eq!(parse_bigint("0xFFn").unwrap(), big("255"));
        assert_eq!(parse_bigint("0XffN".trim_end_matches('N')).unwrap(), big("255"));
        assert_eq!(parse_bigint("0o17n").unwrap(), big("15"));
        assert_eq!(parse_bigint("0b1010n").unwrap(), big("10"));
        assert_eq!(parse_bigint("-0x10n").unwrap(), big("-16"));
    }

    #[test]
    fn test_bigint_separators() {
        assert_eq!(parse_bigint("1_000_000n").unwrap(), big("1000000"));
        assert_eq!(parse_bigint("0xFF_FFn").unwrap(), big("65535"));
        assert!(matches!(
            parse_bigint("1__0n"),
            Err(LiteralError::MisplacedSeparator(_))
        ));
        assert!(matches!(
            parse_bigint("_10n"),
            Err(LiteralError::MisplacedSeparator(_))
        ));
    }

    #[test]
    fn test_bigint_invalid() {
        assert_eq!(parse_bigint("n"), Err(LiteralError::Empty));
        assert_eq!(parse_bigint("0x"), Err(LiteralError::Empty));
        assert!(matches!(
            parse_bigint("0b102n"),
            Err(LiteralError::InvalidDigit { radix: 2, .. })
        ));
    }

    #[test]
    fn test_number_integers() {
        assert_eq!(parse_number("42").unwrap(), NumericLiteral::Integer(big("42")));
        assert_eq!(parse_number("0x1F").unwrap(), NumericLiteral::Integer(big("31")));
        assert_eq!(
            parse_number("4294967296").unwrap(),
            NumericLiteral::Integer(big("4294967296"))
        );
    }

    #[test]
    fn test_number_floats() {
        assert_eq!(parse_number("2.5").unwrap(), NumericLiteral::Float(2.5));
        assert_eq!(parse_number("1e3").unwrap(), NumericLiteral::Float(1000.0));
        assert_eq!(parse_number("-1.5E-1").unwrap(), NumericLiteral::Float(-0.15));
        assert_eq!(parse_number("1_000.5").unwrap(), NumericLiteral::Float(1000.5));
    }
}
