//! Input normalisation shared by the write paths.

use crate::errors::IntakeError;
use chrono::{NaiveDate, NaiveTime};

/// Parses an identifier supplied as text.
///
/// Clients send ids as `"7"`, `"7.0"` or occasionally the literal `"null"`; integral
/// floats are accepted, everything else is rejected with a message naming `name`.
pub fn parse_id(raw: &str, name: &str) -> Result<i64, IntakeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("undefined")
    {
        return Err(IntakeError::validation(format!("Missing {name}")));
    }
    if let Ok(id) = trimmed.parse::<i64>() {
        return Ok(id);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(integral_id)
        .ok_or_else(|| IntakeError::validation(format!("Invalid {name} {trimmed}")))
}

/// Converts a float id to `i64` when it is integral and representable.
///
/// `as` would saturate out-of-range values onto `i64::MIN`/`i64::MAX`, so those are rejected.
pub fn integral_id(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

/// Accepts `YYYY-MM-DD` or `MM/DD/YYYY` and returns `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Result<String, IntakeError> {
    let trimmed = raw.trim();
    let parsed = if trimmed.contains('-') {
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
    } else {
        NaiveDate::parse_from_str(trimmed, "%m/%d/%Y")
    };
    parsed
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| {
            IntakeError::validation("Invalid date format. Use YYYY-MM-DD or MM/DD/YYYY")
        })
}

/// Like [`parse_date`], treating a missing or blank value as absent.
pub fn parse_optional_date(raw: Option<&str>) -> Result<Option<String>, IntakeError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_date(s).map(Some),
    }
}

/// Accepts `HH:MM` or `HH:MM:SS` and returns `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Result<String, IntakeError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map(|t| t.format("%H:%M:%S").to_string())
        .map_err(|_| IntakeError::validation("Invalid date or time format"))
}

/// Keeps the digits of a phone number. An empty result means no phone.
pub fn normalize_phone(raw: Option<&str>) -> Option<String> {
    let digits: String = raw?.chars().filter(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}

/// Formats a phone number as E.164, assuming North American numbers when no country code is given.
pub fn to_e164(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if !trimmed.starts_with('+') && digits.len() == 10 {
        format!("+1{digits}")
    } else {
        format!("+{digits}")
    }
}

/// Trims a string and drops it when blank.
pub fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
