//! Calendar period arithmetic on the canonical grid.
//!
//! A period is identified by its first day:
//! - daily: the date itself
//! - weekly: the Monday of the ISO week
//! - monthly / quarterly / yearly: the 1st of the month / quarter / year

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::domain::{Frequency, NativeFrequency};

/// First day of the period containing `date`.
pub fn period_start(freq: Frequency, date: NaiveDate) -> NaiveDate {
    let anchored = match freq {
        Frequency::Daily => Some(date),
        Frequency::Weekly => date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday()))),
        Frequency::Monthly => date.with_day(1),
        Frequency::Quarterly => NaiveDate::from_ymd_opt(date.year(), quarter_of(date) * 3 - 2, 1),
        Frequency::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1),
    };
    anchored.unwrap_or(date)
}

/// First day of the period after the one containing `date`.
///
/// `None` only at the edge of chrono's representable range.
pub fn next_period_start(freq: Frequency, date: NaiveDate) -> Option<NaiveDate> {
    let start = period_start(freq, date);
    match freq {
        Frequency::Daily => start.checked_add_days(Days::new(1)),
        Frequency::Weekly => start.checked_add_days(Days::new(7)),
        Frequency::Monthly => start.checked_add_months(Months::new(1)),
        Frequency::Quarterly => start.checked_add_months(Months::new(3)),
        Frequency::Yearly => start.checked_add_months(Months::new(12)),
    }
}

/// Last calendar day of the period containing `date`.
pub fn period_last_day(freq: Frequency, date: NaiveDate) -> NaiveDate {
    next_period_start(freq, date)
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

/// Whether `date` is the first day of its period.
pub fn is_anchored(freq: Frequency, date: NaiveDate) -> bool {
    period_start(freq, date) == date
}

/// Every period start from the period containing `start` through the period
/// containing `end`, inclusive. Empty when `start > end`.
pub fn period_range(freq: Frequency, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    if start > end {
        return out;
    }
    let last = period_start(freq, end);
    let mut cur = Some(period_start(freq, start));
    while let Some(d) = cur {
        if d > last {
            break;
        }
        out.push(d);
        cur = next_period_start(freq, d);
    }
    out
}

pub fn count_periods(freq: Frequency, start: NaiveDate, end: NaiveDate) -> usize {
    period_range(freq, start, end).len()
}

/// Period start for a native cadence; unknown cadences keep the date as is.
pub fn native_period_start(native: NativeFrequency, date: NaiveDate) -> NaiveDate {
    match native.as_frequency() {
        Some(freq) => period_start(freq, date),
        None => date,
    }
}

pub fn native_period_last_day(native: NativeFrequency, date: NaiveDate) -> NaiveDate {
    match native.as_frequency() {
        Some(freq) => period_last_day(freq, date),
        None => date,
    }
}

/// Guess the cadence of a series from the median gap between distinct dates.
///
/// Used when every date came through the generic fallback parser.
pub fn infer_native_frequency(dates: &[NaiveDate]) -> NativeFrequency {
    let mut sorted: Vec<NaiveDate> = dates.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut gaps: Vec<i64> = sorted.windows(2).map(|w| (w[1] - w[0]).num_days()).collect();
    if gaps.is_empty() {
        return NativeFrequency::Unknown;
    }
    gaps.sort_unstable();
    let mid = gaps.len() / 2;
    let median = if gaps.len() % 2 == 0 {
        (gaps[mid - 1] + gaps[mid]) as f64 / 2.0
    } else {
        gaps[mid] as f64
    };

    match median {
        m if m <= 1.5 => NativeFrequency::Daily,
        m if m <= 10.0 => NativeFrequency::Weekly,
        m if m <= 45.0 => NativeFrequency::Monthly,
        m if m <= 135.0 => NativeFrequency::Quarterly,
        _ => NativeFrequency::Annual,
    }
}

fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}
