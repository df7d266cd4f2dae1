//! Value token parsing.

use thiserror::Error;

use crate::domain::RawToken;

/// A raw value token is present but not numeric.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("non-numeric value token '{token}'")]
pub struct ValueParseError {
    pub token: String,
}

/// Markers the sources use for "no observation" (FRED uses `.`).
const MISSING_MARKERS: [&str; 4] = [".", "-", "NA", "N/A"];

/// Parse a value token.
///
/// - `Ok(Some(v))`: finite number
/// - `Ok(None)`: explicitly missing (empty cell, `.`, `-`, `NA`)
/// - `Err(_)`: garbage; callers record the error and store a null
///
/// Thousands separators (`1,234.5`) are accepted.
pub fn parse_value_token(token: &RawToken) -> Result<Option<f64>, ValueParseError> {
    match token {
        RawToken::Missing => Ok(None),
        RawToken::Integer(v) => Ok(Some(*v as f64)),
        RawToken::Float(v) if v.is_finite() => Ok(Some(*v)),
        RawToken::Float(v) => Err(ValueParseError { token: v.to_string() }),
        RawToken::Text(s) => parse_value_str(s),
    }
}

pub fn parse_value_str(raw: &str) -> Result<Option<f64>, ValueParseError> {
    let s = raw.trim();
    if s.is_empty() || MISSING_MARKERS.iter().any(|m| s.eq_ignore_ascii_case(m)) {
        return Ok(None);
    }
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(ValueParseError { token: raw.to_string() }),
    }
}
