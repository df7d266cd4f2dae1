//! Date token parsing.
//!
//! Rules are tried in a fixed order, first match wins:
//!
//! 1. quarter marker (`2020Q1`, `2020-Q1`, `Q1 2020`) -> first month of the quarter
//! 2. 8 digits `YYYYMMDD` -> daily, day preserved
//! 3. 6 digits `YYYYMM` -> monthly
//! 4. 4 digits `YYYY` -> annual
//! 5. dotted `YYYY.MM` -> monthly
//! 6. generic ISO-like formats -> unknown frequency (or the caller's hint)
//!
//! Everything except rule 2 and the generic fallback is anchored to day 1.
//! Testing length 4 before length 8 would silently misparse daily tokens.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::domain::{NativeFrequency, RawToken};

/// A raw date token matched no rule and the generic fallback also failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized date token '{token}'")]
pub struct DateParseError {
    pub token: String,
}

impl DateParseError {
    fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

/// Result of parsing one date token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub date: NaiveDate,
    pub native_frequency: NativeFrequency,
}

impl ParsedDate {
    fn new(date: NaiveDate, native_frequency: NativeFrequency) -> Self {
        Self { date, native_frequency }
    }
}

const FALLBACK_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%d/%m/%Y", "%d-%m-%Y"];
const FALLBACK_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Parse a raw token (string or number).
///
/// `hint` is the caller's knowledge of the source cadence; it only replaces
/// `Unknown` on dates that needed the generic fallback.
pub fn parse_date_token(token: &RawToken, hint: Option<NativeFrequency>) -> Result<ParsedDate, DateParseError> {
    let text = token_text(token).ok_or_else(|| DateParseError::new(token.display()))?;
    parse_date_str(&text, hint)
}

/// Parse a textual date token.
pub fn parse_date_str(raw: &str, hint: Option<NativeFrequency>) -> Result<ParsedDate, DateParseError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(DateParseError::new(raw));
    }

    parse_quarter(s)
        .or_else(|| parse_compact_daily(s))
        .or_else(|| parse_compact_monthly(s))
        .or_else(|| parse_year(s))
        .or_else(|| parse_dotted_month(s))
        .or_else(|| {
            parse_generic(s).map(|date| ParsedDate::new(date, hint.unwrap_or(NativeFrequency::Unknown)))
        })
        .ok_or_else(|| DateParseError::new(raw))
}

/// Numbers come from spreadsheet-like providers. Whole floats are treated as
/// integers; fractional floats are read as `YYYY.MM` with a two-digit month,
/// since `2024.1` in such exports is the float rendering of `2024.10`.
fn token_text(token: &RawToken) -> Option<String> {
    match token {
        RawToken::Text(s) => Some(s.trim().to_string()),
        RawToken::Integer(v) => Some(v.to_string()),
        RawToken::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(format!("{}", *v as i64)),
        RawToken::Float(v) if v.is_finite() => Some(format!("{v:.2}")),
        RawToken::Float(_) | RawToken::Missing => None,
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_quarter(s: &str) -> Option<ParsedDate> {
    let compact: String = s
        .chars()
        .filter(|c| !matches!(c, '-' | '/' | ' ' | '.' | '_'))
        .collect::<String>()
        .to_ascii_uppercase();
    if !compact.is_ascii() || compact.len() != 6 || !compact.contains('Q') {
        return None;
    }

    // `YYYYQn` or `QnYYYY`
    let (year, quarter) = if compact.as_bytes()[4] == b'Q' {
        (&compact[..4], &compact[5..])
    } else if compact.as_bytes()[0] == b'Q' {
        (&compact[2..], &compact[1..2])
    } else {
        return None;
    };
    if !all_digits(year) || !all_digits(quarter) {
        return None;
    }

    let year: i32 = year.parse().ok()?;
    let quarter: u32 = quarter.parse().ok()?;
    if !(1..=4).contains(&quarter) {
        return None;
    }
    let month = (quarter - 1) * 3 + 1;
    ymd(year, month, 1).map(|d| ParsedDate::new(d, NativeFrequency::Quarterly))
}

fn parse_compact_daily(s: &str) -> Option<ParsedDate> {
    if s.len() != 8 || !all_digits(s) {
        return None;
    }
    let year = s[..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..].parse().ok()?;
    ymd(year, month, day).map(|d| ParsedDate::new(d, NativeFrequency::Daily))
}

fn parse_compact_monthly(s: &str) -> Option<ParsedDate> {
    if s.len() != 6 || !all_digits(s) {
        return None;
    }
    let year = s[..4].parse().ok()?;
    let month = s[4..].parse().ok()?;
    ymd(year, month, 1).map(|d| ParsedDate::new(d, NativeFrequency::Monthly))
}

fn parse_year(s: &str) -> Option<ParsedDate> {
    if s.len() != 4 || !all_digits(s) {
        return None;
    }
    let year = s.parse().ok()?;
    ymd(year, 1, 1).map(|d| ParsedDate::new(d, NativeFrequency::Annual))
}

fn parse_dotted_month(s: &str) -> Option<ParsedDate> {
    let (year, month) = s.split_once('.')?;
    if year.len() != 4 || !all_digits(year) || month.is_empty() || month.len() > 2 || !all_digits(month) {
        return None;
    }
    ymd(year.parse().ok()?, month.parse().ok()?, 1).map(|d| ParsedDate::new(d, NativeFrequency::Monthly))
}

fn parse_generic(s: &str) -> Option<NaiveDate> {
    for fmt in FALLBACK_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in FALLBACK_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    // `YYYY-MM` / `YYYY/MM` carry no day; anchor to the 1st.
    for sep in ['-', '/'] {
        if let Some((year, month)) = s.split_once(sep) {
            if year.len() == 4 && all_digits(year) && (1..=2).contains(&month.len()) && all_digits(month) {
                return ymd(year.parse().ok()?, month.parse().ok()?, 1);
            }
        }
    }
    None
}
