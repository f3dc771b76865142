use serde::{Deserialize, Serialize};

use crate::model::estimate::MobileNumber;

/// A mobile number as clients send it: either one string such as
/// `"+971 50-123 4567"` or already split into its parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MobileInput {
    Text(String),
    Parts {
        #[serde(default)]
        country_code: Option<String>,
        number: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MobileError {
    #[error("mobile number is required")]
    Empty,
    #[error("mobile number contains invalid characters")]
    InvalidCharacters,
    #[error("invalid country code: {0}")]
    InvalidCountryCode(String),
    #[error("mobile number must have between 8 and 15 digits, got {0}")]
    InvalidLength(usize),
}

const MIN_DIGITS: usize = 8;
// Calling codes tried on compact numbers such as `+966551234567`. ITU codes
// are prefix-free so at most one can match.
const CALLING_CODES: &[&str] = &[
    "1", "7", "20", "27", "30", "31", "32", "33", "34", "36", "39", "40", "41", "43", "44", "45", "46", "47",
    "48", "49", "52", "55", "60", "61", "62", "63", "64", "65", "66", "81", "82", "84", "86", "90", "91",
    "92", "93", "94", "98", "212", "213", "216", "218", "234", "249", "254", "351", "353", "880", "961",
    "962", "963", "964", "965", "966", "967", "968", "970", "971", "972", "973", "974", "977",
];
const MAX_DIGITS: usize = 15;

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '-' | '.' | '(' | ')')
}

fn strip(raw: &str) -> Result<String, MobileError> {
    let mut digits = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !is_separator(c) {
            return Err(MobileError::InvalidCharacters);
        }
    }
    Ok(digits)
}

fn country_code(raw: &str) -> Result<String, MobileError> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(MobileError::InvalidCountryCode(raw.to_string()));
    }
    Ok(format!("+{}", digits))
}

fn split_compact<'a>(digits: &'a str, default_country_code: &str) -> Option<(&'a str, &'a str)> {
    let default = default_country_code.trim().trim_start_matches('+');
    std::iter::once(default)
        .chain(CALLING_CODES.iter().copied())
        .filter(|code| !code.is_empty())
        .find(|code| digits.starts_with(code))
        .map(|code| digits.split_at(code.len()))
}

fn number(raw: &str) -> Result<String, MobileError> {
    let digits = strip(raw)?;
    if digits.is_empty() {
        return Err(MobileError::Empty);
    }
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
        return Err(MobileError::InvalidLength(digits.len()));
    }
    Ok(digits)
}

/// Normalizes to `{country_code: "+NNN", number: "digits"}`.
///
/// A string starting with `+` or `00` carries its own country code: everything
/// before the first separator, or for compact numbers the default code or a
/// known calling code matched as a prefix. Anything else gets
/// `default_country_code`.
pub fn normalize(input: &MobileInput, default_country_code: &str) -> Result<MobileNumber, MobileError> {
    match input {
        MobileInput::Parts { country_code: code, number: raw } => {
            let code = match code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                Some(code) => country_code(code)?,
                None => country_code(default_country_code)?,
            };
            Ok(MobileNumber {
                country_code: code,
                number: number(raw)?,
            })
        }
        MobileInput::Text(raw) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(MobileError::Empty);
            }
            let international = raw
                .strip_prefix('+')
                .or_else(|| raw.strip_prefix("00"));
            match international {
                Some(rest) => {
                    let (code, local) = match rest.find(is_separator) {
                        Some(split) => rest.split_at(split),
                        None => split_compact(rest, default_country_code)
                            .ok_or_else(|| MobileError::InvalidCountryCode(raw.to_string()))?,
                    };
                    Ok(MobileNumber {
                        country_code: country_code(code)?,
                        number: number(local)?,
                    })
                }
                None => Ok(MobileNumber {
                    country_code: country_code(default_country_code)?,
                    number: number(raw.trim_start_matches('0'))?,
                }),
            }
        }
    }
}
