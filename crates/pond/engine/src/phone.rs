//! Phone number normalization to E.164 handles.

use pond_types::PhoneHandle;
use std::fmt;
use thiserror::Error;

/// North American Numbering Plan country code.
pub const NANP_COUNTRY_CODE: u16 = 1;

const INTERNATIONAL_PREFIX: &str = "011";
const NANP_REGIONS: &[&str] = &["US", "CA"];

/// Two-digit ITU country codes; everything else outside 1 and 7 has three.
/// Only the country code is derived from it, to decide domestic or not.
const TWO_DIGIT_CODES: &[u16] = &[
    20, 27, 30, 31, 32, 33, 34, 36, 39, 40, 41, 43, 44, 45, 46, 47, 48, 49, 51, 52, 53, 54, 55,
    56, 57, 58, 60, 61, 62, 63, 64, 65, 66, 81, 82, 84, 86, 90, 91, 92, 93, 94, 95, 98,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneParseError {
    #[error("no digits in input")]
    Empty,

    #[error("unexpected character {0:?}")]
    InvalidCharacter(char),

    #[error("wrong number of digits: {0}")]
    InvalidLength(usize),

    #[error("not a valid number: {0}")]
    InvalidNumber(String),

    #[error("unsupported default region: {0}")]
    UnsupportedRegion(String),
}

/// A parsed number split into country code and national significant number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    pub country_code: u16,
    pub national: String,
}

impl PhoneNumber {
    pub fn is_domestic(&self) -> bool {
        self.country_code == NANP_COUNTRY_CODE
    }

    pub fn e164(&self) -> PhoneHandle {
        PhoneHandle::new(self.to_string())
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}{}", self.country_code, self.national)
    }
}

/// Turns free-form member input into a normalized number.
pub trait PhoneParser: Send + Sync {
    fn parse(&self, raw: &str, default_region: &str) -> Result<PhoneNumber, PhoneParseError>;
}

/// Parser for numbers written the way North American members type them.
///
/// Accepts common punctuation, an optional leading `1`, and international
/// numbers written with `+` or the `011` dialing prefix. International
/// numbers are only split into country code and subscriber digits; they are
/// not validated against foreign numbering plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct NanpPhoneParser;

impl NanpPhoneParser {
    pub fn new() -> Self {
        Self
    }

    fn digits(raw: &str) -> Result<(bool, String), PhoneParseError> {
        let trimmed = raw.trim();
        let (plus, rest) = match trimmed.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' | '/' => {}
                other => return Err(PhoneParseError::InvalidCharacter(other)),
            }
        }
        if digits.is_empty() {
            return Err(PhoneParseError::Empty);
        }
        Ok((plus, digits))
    }

    fn international(digits: &str) -> Result<PhoneNumber, PhoneParseError> {
        if !(8..=15).contains(&digits.len()) {
            return Err(PhoneParseError::InvalidLength(digits.len()));
        }
        let split = country_code_len(digits);
        let country_code = digits[..split]
            .parse::<u16>()
            .map_err(|_| PhoneParseError::InvalidNumber(digits.to_string()))?;
        if country_code == NANP_COUNTRY_CODE {
            return Self::national(&digits[split..]);
        }
        Ok(PhoneNumber {
            country_code,
            national: digits[split..].to_string(),
        })
    }

    fn national(digits: &str) -> Result<PhoneNumber, PhoneParseError> {
        let national = match digits.len() {
            10 => digits,
            11 if digits.starts_with('1') => &digits[1..],
            other => return Err(PhoneParseError::InvalidLength(other)),
        };

        let bytes = national.as_bytes();
        // Area code and exchange both start with 2-9.
        if !(b'2'..=b'9').contains(&bytes[0]) || !(b'2'..=b'9').contains(&bytes[3]) {
            return Err(PhoneParseError::InvalidNumber(national.to_string()));
        }

        Ok(PhoneNumber {
            country_code: NANP_COUNTRY_CODE,
            national: national.to_string(),
        })
    }
}

impl PhoneParser for NanpPhoneParser {
    fn parse(&self, raw: &str, default_region: &str) -> Result<PhoneNumber, PhoneParseError> {
        if !NANP_REGIONS
            .iter()
            .any(|region| region.eq_ignore_ascii_case(default_region))
        {
            return Err(PhoneParseError::UnsupportedRegion(default_region.to_string()));
        }

        let (plus, digits) = Self::digits(raw)?;
        if plus {
            return Self::international(&digits);
        }
        match digits.strip_prefix(INTERNATIONAL_PREFIX) {
            Some(rest) => Self::international(rest),
            None => Self::national(&digits),
        }
    }
}

fn country_code_len(digits: &str) -> usize {
    match digits.as_bytes()[0] {
        b'1' | b'7' => 1,
        _ => {
            let two = digits[..2].parse::<u16>().unwrap_or(0);
            if TWO_DIGIT_CODES.contains(&two) {
                2
            } else {
                3
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<PhoneNumber, PhoneParseError> {
        NanpPhoneParser::new().parse(raw, "US")
    }

    #[test]
    fn domestic_formats_normalize_to_e164() {
        for raw in [
            "555-234-5678",
            "(555) 234-5678",
            "5552345678",
            "1 555 234 5678",
            "+1 555.234.5678",
        ] {
            let number = parse(raw).unwrap();
            assert!(number.is_domestic(), "{raw}");
            assert_eq!(number.e164().as_str(), "+15552345678", "{raw}");
        }
    }

    #[test]
    fn international_numbers_are_not_domestic() {
        let uk = parse("+44 20 7946 0958").unwrap();
        assert_eq!(uk.country_code, 44);
        assert!(!uk.is_domestic());

        let mexico = parse("011 52 55 1234 5678").unwrap();
        assert_eq!(mexico.country_code, 52);

        let ireland = parse("+353 1 234 5678").unwrap();
        assert_eq!(ireland.country_code, 353);
    }

    #[test]
    fn three_digit_codes_next_to_two_digit_ones() {
        for (raw, code) in [
            ("+298 123456", 298),
            ("+299 32 1000", 299),
            ("+350 2001 2345", 350),
            ("+359 2 123 4567", 359),
            ("+7 495 123 4567", 7),
            ("+30 21 0123 4567", 30),
        ] {
            let number = parse(raw).unwrap();
            assert_eq!(number.country_code, code, "{raw}");
            assert!(!number.is_domestic(), "{raw}");
        }
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_eq!(parse("hello"), Err(PhoneParseError::InvalidCharacter('h')));
        assert_eq!(parse("555-1234"), Err(PhoneParseError::InvalidLength(7)));
        assert!(matches!(parse("055-234-5678"), Err(PhoneParseError::InvalidNumber(_))));
        assert!(matches!(parse("555-034-5678"), Err(PhoneParseError::InvalidNumber(_))));
        assert_eq!(parse(" - "), Err(PhoneParseError::Empty));
    }

    #[test]
    fn only_north_american_regions_are_supported() {
        assert!(NanpPhoneParser::new().parse("5552345678", "ca").is_ok());
        assert_eq!(
            NanpPhoneParser::new().parse("5552345678", "GB"),
            Err(PhoneParseError::UnsupportedRegion("GB".to_string()))
        );
    }
}
