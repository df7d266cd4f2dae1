//! Series Merger.
//!
//! Builds one canonical date axis (dense, strictly increasing, period starts
//! of a single frequency) and joins every series onto it by exact date
//! equality. A date the series has no observation for is a null cell; there
//! is no nearest-date matching anywhere in this module.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{ColumnNaming, Frequency, MergeMode, NativeFrequency, SeriesFrame};
use crate::error::MergeError;
use crate::resample::{Resampler, is_anchored, period_range, period_start};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// One per input series.
    Value,
    /// `year`, `month`, ...
    Calendar,
    PctChange,
    YoY,
    /// Anything else read back from a file.
    Other,
}

impl ColumnKind {
    /// Kind of a column from its name, for tables read back from disk.
    pub fn infer(name: &str) -> Self {
        match name {
            "year" | "month" | "quarter" | "week" | "day_of_week" | "is_month_end" | "is_quarter_end" => {
                ColumnKind::Calendar
            }
            n if n.ends_with("_pct_change") => ColumnKind::PctChange,
            n if n.ends_with("_yoy") => ColumnKind::YoY,
            n if n.ends_with("_value") => ColumnKind::Value,
            _ => ColumnKind::Other,
        }
    }
}

/// Where a value column came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    pub series: String,
    pub source: String,
    pub native_frequency: NativeFrequency,
    /// Non-null observations the series contributed.
    pub observations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub provenance: Option<Provenance>,
    pub values: Vec<Option<f64>>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            kind,
            provenance: None,
            values,
        }
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Date-keyed table: `dates[i]` is the row key for `columns[*].values[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedTable {
    pub frequency: Frequency,
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<Column>,
}

impl MergedTable {
    pub fn new(frequency: Frequency, dates: Vec<NaiveDate>) -> Self {
        Self {
            frequency,
            dates,
            columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn value_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.kind == ColumnKind::Value)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Append a column. Fails on a name clash or a length mismatch; existing
    /// columns are never replaced.
    pub fn add_column(&mut self, column: Column) -> Result<(), MergeError> {
        if let Some(existing) = self.column(&column.name) {
            return Err(MergeError::ColumnCollision {
                column: column.name.clone(),
                first: format!("{:?} column", existing.kind),
                second: format!("{:?} column", column.kind),
            });
        }
        if column.values.len() != self.dates.len() {
            return Err(MergeError::ColumnLength {
                column: column.name,
                expected: self.dates.len(),
                actual: column.values.len(),
            });
        }
        self.columns.push(column);
        Ok(())
    }

    /// Value of `column` at `date`, if the row exists.
    pub fn value_at(&self, column: &str, date: NaiveDate) -> Option<Option<f64>> {
        let col = self.column(column)?;
        let idx = self.dates.iter().position(|d| *d == date)?;
        col.values.get(idx).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    pub frequency: Frequency,
    pub mode: MergeMode,
    pub naming: ColumnNaming,
    /// Fixed `[start, end]` axis; overrides the mode's range rule.
    pub range: Option<(NaiveDate, NaiveDate)>,
}

impl MergeOptions {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            mode: MergeMode::default(),
            naming: ColumnNaming::default(),
            range: None,
        }
    }

    pub fn with_mode(mut self, mode: MergeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_naming(mut self, naming: ColumnNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_range(mut self, range: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.range = range;
        self
    }
}

/// Output column name of a series under a naming policy.
pub fn column_name(frame: &SeriesFrame, naming: ColumnNaming) -> String {
    match naming {
        ColumnNaming::SeriesName => format!("{}_value", frame.name),
        ColumnNaming::SourceQualified => format!("{}_{}_value", frame.source, frame.name),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SeriesMerger {
    options: MergeOptions,
}

impl SeriesMerger {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merge frames onto the target grid. Frames resampled to another
    /// frequency, or not resampled at all, are re-gridded first (see
    /// `Resampler`).
    ///
    /// Input frames are only read; the table owns copies of their values.
    pub fn merge(&self, frames: &[SeriesFrame]) -> Result<MergedTable, MergeError> {
        if frames.is_empty() {
            return Err(MergeError::NoSeries);
        }
        let freq = self.options.frequency;
        let aligned: Vec<Cow<'_, SeriesFrame>> = frames.iter().map(|f| self.on_grid(f)).collect();
        let frames: Vec<&SeriesFrame> = aligned.iter().map(|f| &**f).collect();

        let mut names: Vec<(String, String)> = Vec::with_capacity(frames.len());
        for &frame in &frames {
            self.validate(frame)?;
            let name = column_name(frame, self.options.naming);
            if let Some((_, first)) = names.iter().find(|(n, _)| *n == name) {
                return Err(MergeError::ColumnCollision {
                    column: name,
                    first: first.clone(),
                    second: series_label(frame),
                });
            }
            names.push((name, series_label(frame)));
        }

        let dates = match self.options.range {
            Some((start, end)) => {
                if start > end {
                    return Err(MergeError::InvalidRange { start, end });
                }
                period_range(freq, start, end)
            }
            None => match axis_bounds(&frames, self.options.mode) {
                Some((start, end)) => period_range(freq, start, end),
                None => Vec::new(),
            },
        };

        let index: HashMap<NaiveDate, usize> = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
        let mut table = MergedTable::new(freq, dates);

        for (frame, (name, _)) in frames.iter().zip(names) {
            let mut values = vec![None; table.len()];
            for obs in &frame.observations {
                if let Some(&i) = index.get(&obs.date) {
                    values[i] = obs.value;
                }
            }
            if frame.valid_count() == 0 {
                log::warn!("series '{}' has no valid observations; emitting an all-null column", frame.name);
            }
            let mut column = Column::new(name, ColumnKind::Value, values);
            column.provenance = Some(Provenance {
                series: frame.name.clone(),
                source: frame.source.clone(),
                native_frequency: frame.native_frequency,
                observations: frame.valid_count(),
            });
            table.add_column(column)?;
        }

        log::info!(
            "merged {} series onto {} {} rows ({:?})",
            frames.len(),
            table.len(),
            freq,
            self.options.mode
        );
        Ok(table)
    }

    /// The frame as it sits on the target grid. A frame already resampled to
    /// another grid is treated as native to the coarser of that grid and its
    /// own cadence, so quarterly values forward-fill rather than thin out.
    fn on_grid<'a>(&self, frame: &'a SeriesFrame) -> Cow<'a, SeriesFrame> {
        let freq = self.options.frequency;
        if frame.frequency == Some(freq) {
            return Cow::Borrowed(frame);
        }
        log::debug!(
            "series '{}' is on {} grid, re-gridding to {}",
            series_label(frame),
            frame.frequency.map_or("no", |g| g.label()),
            freq
        );
        let mut source = frame.clone();
        if let Some(grid) = frame.frequency {
            let native = frame.native_frequency.as_frequency().map_or(grid, |n| n.max(grid));
            source.native_frequency = native.into();
        }
        Cow::Owned(Resampler::new(freq).resample(&source))
    }

    fn validate(&self, frame: &SeriesFrame) -> Result<(), MergeError> {
        let freq = self.options.frequency;
        let mut prev: Option<NaiveDate> = None;
        for obs in &frame.observations {
            if !is_anchored(freq, obs.date) {
                return Err(MergeError::UnalignedDate {
                    series: series_label(frame),
                    date: obs.date,
                    frequency: freq,
                });
            }
            if let Some(p) = prev {
                if p == obs.date {
                    return Err(MergeError::DuplicateDate {
                        series: series_label(frame),
                        date: obs.date,
                    });
                }
                if p > obs.date {
                    return Err(MergeError::UnorderedSeries {
                        series: series_label(frame),
                        date: obs.date,
                    });
                }
            }
            prev = Some(obs.date);
        }
        Ok(())
    }
}

fn series_label(frame: &SeriesFrame) -> String {
    format!("{}/{}", frame.source, frame.name)
}

/// Axis span per merge mode. Empty frames never constrain the span.
fn axis_bounds(frames: &[&SeriesFrame], mode: MergeMode) -> Option<(NaiveDate, NaiveDate)> {
    let bounds = |f: &&SeriesFrame| Some((f.first_date()?, f.last_date()?));
    let non_empty: Vec<(NaiveDate, NaiveDate)> = frames.iter().filter_map(bounds).collect();

    match mode {
        MergeMode::Outer => {
            let start = non_empty.iter().map(|b| b.0).min()?;
            let end = non_empty.iter().map(|b| b.1).max()?;
            Some((start, end))
        }
        MergeMode::Inner => {
            let start = non_empty.iter().map(|b| b.0).max()?;
            let end = non_empty.iter().map(|b| b.1).min()?;
            (start <= end).then_some((start, end))
        }
        MergeMode::Left => frames.first().and_then(bounds),
        MergeMode::Right => frames.last().and_then(bounds),
    }
}

/// Canonical axis of a table: period starts from the first to the last date.
pub fn expected_axis(freq: Frequency, dates: &[NaiveDate]) -> Vec<NaiveDate> {
    let start = dates.iter().min().copied();
    let end = dates.iter().max().copied();
    match (start, end) {
        (Some(s), Some(e)) => period_range(freq, period_start(freq, s), e),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NormalizedObservation;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn monthly(name: &str, source: &str, points: &[(u32, Option<f64>)]) -> SeriesFrame {
        let obs = points
            .iter()
            .map(|&(m, v)| NormalizedObservation::new(d(2020, m), v, NativeFrequency::Monthly))
            .collect();
        let mut frame = SeriesFrame::from_observations(name, source, obs);
        frame.frequency = Some(Frequency::Monthly);
        frame
    }

    #[test]
    fn outer_merge_is_dense_and_null_filled() {
        let a = monthly("cpi", "bok", &[(1, Some(1.0)), (2, Some(2.0))]);
        let b = monthly("rate", "bok", &[(4, Some(0.5))]);
        let table = SeriesMerger::new(MergeOptions::new(Frequency::Monthly))
            .merge(&[a, b])
            .unwrap();

        assert_eq!(table.dates, vec![d(2020, 1), d(2020, 2), d(2020, 3), d(2020, 4)]);
        assert_eq!(table.column_names(), vec!["cpi_value", "rate_value"]);
        assert_eq!(table.column("cpi_value").unwrap().values, vec![Some(1.0), Some(2.0), None, None]);
        assert_eq!(table.value_at("rate_value", d(2020, 4)), Some(Some(0.5)));
    }

    #[test]
    fn inner_left_right_ranges() {
        let a = monthly("a", "x", &[(1, Some(1.0)), (2, Some(2.0)), (3, Some(3.0))]);
        let b = monthly("b", "x", &[(2, Some(20.0)), (3, Some(30.0)), (4, Some(40.0)), (5, Some(50.0))]);
        let frames = [a, b];
        let merge = |mode| {
            SeriesMerger::new(MergeOptions::new(Frequency::Monthly).with_mode(mode))
                .merge(&frames)
                .unwrap()
        };

        assert_eq!(merge(MergeMode::Inner).dates, vec![d(2020, 2), d(2020, 3)]);
        assert_eq!(merge(MergeMode::Left).len(), 3);
        assert_eq!(merge(MergeMode::Right).dates.first(), Some(&d(2020, 2)));
        assert_eq!(merge(MergeMode::Outer).len(), 5);
    }

    #[test]
    fn disjoint_inner_merge_is_empty() {
        let a = monthly("a", "x", &[(1, Some(1.0))]);
        let b = monthly("b", "x", &[(6, Some(1.0))]);
        let table = SeriesMerger::new(MergeOptions::new(Frequency::Monthly).with_mode(MergeMode::Inner))
            .merge(&[a, b])
            .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns.len(), 2);
    }

    #[test]
    fn same_name_from_two_sources_collides_unless_qualified() {
        let a = monthly("rate", "bok", &[(1, Some(1.0))]);
        let b = monthly("rate", "fred", &[(1, Some(2.0))]);

        let err = SeriesMerger::new(MergeOptions::new(Frequency::Monthly))
            .merge(&[a.clone(), b.clone()])
            .unwrap_err();
        assert!(matches!(err, MergeError::ColumnCollision { ref column, .. } if column == "rate_value"));

        let table = SeriesMerger::new(
            MergeOptions::new(Frequency::Monthly).with_naming(ColumnNaming::SourceQualified),
        )
        .merge(&[a, b])
        .unwrap();
        assert_eq!(table.column_names(), vec!["bok_rate_value", "fred_rate_value"]);
    }

    #[test]
    fn empty_series_still_gets_a_column() {
        let a = monthly("a", "x", &[(1, Some(1.0)), (3, Some(3.0))]);
        let empty = monthly("empty", "x", &[]);
        let table = SeriesMerger::new(MergeOptions::new(Frequency::Monthly))
            .merge(&[a, empty])
            .unwrap();
        let col = table.column("empty_value").unwrap();
        assert_eq!(col.values, vec![None, None, None]);
    }

    #[test]
    fn fixed_range_overrides_mode() {
        let a = monthly("a", "x", &[(3, Some(3.0))]);
        let options = MergeOptions::new(Frequency::Monthly).with_range(Some((d(2020, 1), d(2020, 4))));
        let table = SeriesMerger::new(options).merge(&[a]).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.column("a_value").unwrap().values[2], Some(3.0));

        let bad = MergeOptions::new(Frequency::Monthly).with_range(Some((d(2020, 4), d(2020, 1))));
        let a = monthly("a", "x", &[(3, Some(3.0))]);
        assert!(matches!(
            SeriesMerger::new(bad).merge(&[a]),
            Err(MergeError::InvalidRange { .. })
        ));
    }

    #[test]
    fn quarterly_grid_frame_is_forward_filled_onto_months() {
        let obs = vec![
            NormalizedObservation::new(d(2020, 1), Some(50.0), NativeFrequency::Quarterly),
            NormalizedObservation::new(d(2020, 4), Some(55.0), NativeFrequency::Quarterly),
        ];
        let raw = SeriesFrame::from_observations("gdp", "bok", obs);
        let quarterly = Resampler::new(Frequency::Quarterly).resample(&raw);
        let cpi = monthly("cpi", "bok", &[(1, Some(1.0)), (6, Some(6.0))]);

        let table = SeriesMerger::new(MergeOptions::new(Frequency::Monthly))
            .merge(&[cpi, quarterly])
            .unwrap();

        assert_eq!(table.dates, (1..=6).map(|m| d(2020, m)).collect::<Vec<_>>());
        assert_eq!(
            table.column("gdp_value").unwrap().values,
            vec![Some(50.0), Some(50.0), Some(50.0), Some(55.0), Some(55.0), Some(55.0)]
        );
        let provenance = table.column("gdp_value").unwrap().provenance.as_ref().unwrap();
        assert_eq!(provenance.native_frequency, NativeFrequency::Quarterly);
    }

    #[test]
    fn unresampled_daily_frame_is_aggregated_not_rejected() {
        let obs = vec![
            NormalizedObservation::new(NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(), Some(1.0), NativeFrequency::Daily),
            NormalizedObservation::new(NaiveDate::from_ymd_opt(2020, 1, 3).unwrap(), Some(3.0), NativeFrequency::Daily),
            NormalizedObservation::new(NaiveDate::from_ymd_opt(2020, 2, 3).unwrap(), Some(5.0), NativeFrequency::Daily),
        ];
        let daily = SeriesFrame::from_observations("fx", "bok", obs);

        let table = SeriesMerger::new(MergeOptions::new(Frequency::Monthly))
            .merge(&[daily])
            .unwrap();

        assert_eq!(table.dates, vec![d(2020, 1), d(2020, 2)]);
        assert_eq!(table.column("fx_value").unwrap().values, vec![Some(2.0), Some(5.0)]);
    }

    #[test]
    fn rejects_unanchored_and_duplicate_inputs() {
        let mut frame = monthly("a", "x", &[(1, Some(1.0))]);
        frame.observations[0].date = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        let err = SeriesMerger::new(MergeOptions::new(Frequency::Monthly))
            .merge(&[frame])
            .unwrap_err();
        assert!(matches!(err, MergeError::UnalignedDate { .. }));

        let mut frame = monthly("a", "x", &[(1, Some(1.0)), (2, Some(2.0))]);
        frame.observations[1].date = d(2020, 1);
        let err = SeriesMerger::new(MergeOptions::new(Frequency::Monthly))
            .merge(&[frame])
            .unwrap_err();
        assert!(matches!(err, MergeError::DuplicateDate { .. }));

        assert_eq!(
            SeriesMerger::new(MergeOptions::new(Frequency::Monthly)).merge(&[]),
            Err(MergeError::NoSeries)
        );
    }
}
