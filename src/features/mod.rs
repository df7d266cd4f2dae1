//! Derived Feature Computer.
//!
//! Appends calendar parts and percentage changes to a merged table. The date
//! axis and existing columns are never touched; a new table is returned.

use chrono::{Datelike, NaiveDate};

use crate::domain::Frequency;
use crate::error::MergeError;
use crate::merge::{Column, ColumnKind, MergedTable};
use crate::resample::period_last_day;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureOptions {
    /// ISO week number.
    pub include_week: bool,
    /// Monday = 0.
    pub include_day_of_week: bool,
    /// `is_month_end` / `is_quarter_end` flags (1 or 0).
    pub include_period_end: bool,
}

impl FeatureOptions {
    pub fn all() -> Self {
        Self {
            include_week: true,
            include_day_of_week: true,
            include_period_end: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CalendarPart {
    Year,
    Month,
    Quarter,
    Week,
    DayOfWeek,
    MonthEnd,
    QuarterEnd,
}

impl CalendarPart {
    fn name(self) -> &'static str {
        match self {
            CalendarPart::Year => "year",
            CalendarPart::Month => "month",
            CalendarPart::Quarter => "quarter",
            CalendarPart::Week => "week",
            CalendarPart::DayOfWeek => "day_of_week",
            CalendarPart::MonthEnd => "is_month_end",
            CalendarPart::QuarterEnd => "is_quarter_end",
        }
    }

    /// Value for the row dated `date` on a `freq` grid. The period-end flags
    /// are set when the row's period closes a month or quarter.
    fn of(self, date: NaiveDate, freq: Frequency) -> f64 {
        let closes = |outer: Frequency| period_last_day(freq, date) == period_last_day(outer, date);
        let v = match self {
            CalendarPart::Year => return f64::from(date.year()),
            CalendarPart::Month => date.month(),
            CalendarPart::Quarter => (date.month() - 1) / 3 + 1,
            CalendarPart::Week => date.iso_week().week(),
            CalendarPart::DayOfWeek => date.weekday().num_days_from_monday(),
            CalendarPart::MonthEnd => u32::from(closes(Frequency::Monthly)),
            CalendarPart::QuarterEnd => u32::from(closes(Frequency::Quarterly)),
        };
        f64::from(v)
    }
}

pub fn add_derived_features(table: &MergedTable, options: &FeatureOptions) -> Result<MergedTable, MergeError> {
    let mut out = table.clone();

    let mut calendar = vec![CalendarPart::Year, CalendarPart::Month, CalendarPart::Quarter];
    if options.include_week {
        calendar.push(CalendarPart::Week);
    }
    if options.include_day_of_week {
        calendar.push(CalendarPart::DayOfWeek);
    }
    if options.include_period_end {
        calendar.extend([CalendarPart::MonthEnd, CalendarPart::QuarterEnd]);
    }
    for part in calendar {
        let values = table.dates.iter().map(|d| Some(part.of(*d, table.frequency))).collect();
        out.add_column(Column::new(part.name(), ColumnKind::Calendar, values))?;
    }

    let yoy_lag = table.frequency.periods_per_year();
    for column in table.value_columns() {
        out.add_column(Column::new(
            format!("{}_pct_change", column.name),
            ColumnKind::PctChange,
            pct_change(&column.values, 1),
        ))?;
        out.add_column(Column::new(
            format!("{}_yoy", column.name),
            ColumnKind::YoY,
            pct_change(&column.values, yoy_lag),
        ))?;
    }

    Ok(out)
}

/// Percentage change against the value `lag` rows earlier, in percent.
///
/// Undefined (`None`) for the first `lag` rows, when either side is null, and
/// when the base is zero.
pub fn pct_change(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, current)| {
            let base = i.checked_sub(lag).and_then(|j| values.get(j).copied().flatten())?;
            let current = (*current)?;
            if base == 0.0 {
                return None;
            }
            let change = (current - base) / base * 100.0;
            change.is_finite().then_some(change)
        })
        .collect()
}
