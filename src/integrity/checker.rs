//! Per-source and table-wide checks.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::domain::{SeriesFrame, Tolerance};
use crate::integrity::{
    Finding, FindingDetails, FindingKind, IntegrityReport, IntegritySource, MERGED_SOURCE, SourceValidation,
};
use crate::io::read_source_csv;
use crate::merge::MergedTable;
use crate::normalize::DateNormalizer;
use crate::resample::{Resampler, period_range};

/// Gaps longer than this many nominal periods are reported.
const GAP_FACTOR: f64 = 1.5;

/// Cap on dates listed inside aggregate findings.
const SAMPLE_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityChecker {
    tolerance: Tolerance,
}

impl IntegrityChecker {
    pub fn new(tolerance: Tolerance) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Full pass: every source, then the global invariants.
    ///
    /// An unreadable source never stops the remaining checks.
    pub fn check(&self, table: &MergedTable, sources: &[IntegritySource]) -> IntegrityReport {
        let mut report = IntegrityReport::new(table.frequency, table.len());
        for source in sources {
            self.check_source(table, source, &mut report);
        }
        self.check_global(table, &mut report);

        log::info!(
            "integrity: {} ({} critical, {} warnings) over {} sources",
            report.verdict().label(),
            report.critical_count(),
            report.warning_count(),
            sources.len()
        );
        report
    }

    /// Load, re-normalize and compare one source file.
    pub fn check_source(&self, table: &MergedTable, source: &IntegritySource, report: &mut IntegrityReport) {
        let file = match read_source_csv(&source.path, source.schema.as_ref()) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("integrity: source '{}' unavailable: {e}", source.name);
                report.push(Finding::new(
                    source.name.clone(),
                    FindingDetails::SourceUnavailable {
                        path: source.path.clone(),
                        reason: e.to_string(),
                    },
                ));
                return;
            }
        };

        let outcome = DateNormalizer::new().with_hint(source.hint).normalize(&file.records);
        let (dropped_dates, values_nulled) = (outcome.dropped_count(), outcome.nulled_count());
        if dropped_dates + values_nulled > 0 {
            log::warn!(
                "integrity: '{}' re-read with {dropped_dates} undated row(s) and {values_nulled} nulled value(s)",
                source.name
            );
        }
        let frame = outcome.into_frame(source.name.clone(), file.schema.label());
        let mut expected = Resampler::new(table.frequency)
            .with_aggregation(source.aggregation)
            .resample(&frame);
        if let Some((start, end)) = source.range {
            expected.observations.retain(|o| o.date >= start && o.date <= end);
        }

        self.check_series(table, &source.name, &source.column_name(), &expected, report);
        if let Some(validation) = report
            .validations
            .last_mut()
            .filter(|v| v.source_name == source.name)
        {
            validation.dropped_dates = dropped_dates;
            validation.values_nulled = values_nulled;
        }
    }

    /// Compare an expected series (already on the table's grid) with one
    /// merged column.
    pub fn check_series(
        &self,
        table: &MergedTable,
        source_name: &str,
        column: &str,
        expected: &SeriesFrame,
        report: &mut IntegrityReport,
    ) {
        let Some(merged) = table.column(column) else {
            report.push(Finding::new(
                source_name,
                FindingDetails::MissingColumn {
                    column: column.to_string(),
                },
            ));
            return;
        };

        // A null cell counts as "no row at that date".
        let cells: Vec<(NaiveDate, f64)> = table
            .dates
            .iter()
            .zip(&merged.values)
            .filter_map(|(d, v)| v.map(|v| (*d, v)))
            .collect();
        let by_date: HashMap<NaiveDate, f64> = cells.iter().copied().collect();

        let mut validation = SourceValidation {
            source_name: source_name.to_string(),
            column: column.to_string(),
            ..SourceValidation::default()
        };

        let expected_points: Vec<(NaiveDate, f64)> = expected
            .observations
            .iter()
            .filter_map(|o| o.value.map(|v| (o.date, v)))
            .collect();

        for obs in &expected.observations {
            let Some(value) = obs.value else { continue };
            validation.compared += 1;

            let actual = by_date.get(&obs.date).copied();
            if actual.is_some_and(|a| self.tolerance.matches(value, a)) {
                validation.matched += 1;
                continue;
            }

            // An empty cell, or one holding another period's value, points at a shift.
            let shifted = match actual {
                None => self.nearest_match(&cells, obs.date, value),
                Some(a) if self.belongs_elsewhere(&expected_points, obs.date, a) => {
                    self.nearest_match(&cells, obs.date, value)
                }
                Some(_) => None,
            };

            match (shifted, actual) {
                (Some(found), _) => {
                    validation.date_shifts += 1;
                    report.push(Finding::new(
                        source_name,
                        FindingDetails::DateShift {
                            expected_date: obs.date,
                            found_date: found,
                            days_shifted: (found - obs.date).num_days(),
                            value,
                        },
                    ));
                }
                (None, Some(actual)) => {
                    validation.value_mismatches += 1;
                    report.push(Finding::new(
                        source_name,
                        FindingDetails::ValueMismatch {
                            date: obs.date,
                            expected: value,
                            actual,
                            difference: actual - value,
                        },
                    ));
                }
                (None, None) => validation.missing += 1,
            }
        }

        if let Some(gap) = frequency_gaps(expected, table) {
            report.push(Finding::new(source_name, gap));
        }

        if validation.date_shifts > 0 {
            log::warn!(
                "integrity: '{source_name}' has {} shifted values in column '{column}'",
                validation.date_shifts
            );
        }
        report.validations.push(validation);
    }

    /// Nearest other date carrying `value` within tolerance; ties go to the
    /// earlier date.
    fn nearest_match(&self, cells: &[(NaiveDate, f64)], date: NaiveDate, value: f64) -> Option<NaiveDate> {
        cells
            .iter()
            .filter(|(d, v)| *d != date && self.tolerance.matches(value, *v))
            .map(|(d, _)| *d)
            .min_by_key(|d| ((*d - date).num_days().abs(), *d))
    }

    /// Whether `actual` is the expected value of some other date.
    fn belongs_elsewhere(&self, expected: &[(NaiveDate, f64)], date: NaiveDate, actual: f64) -> bool {
        expected
            .iter()
            .any(|(d, v)| *d != date && self.tolerance.matches(*v, actual))
    }

    /// Ordering, duplicates and missing periods of the merged axis.
    pub fn check_global(&self, table: &MergedTable, report: &mut IntegrityReport) {
        let dates = &table.dates;

        let decreases: Vec<NaiveDate> = dates.windows(2).filter(|w| w[1] < w[0]).map(|w| w[1]).collect();
        if let Some(&first_at) = decreases.first() {
            report.push(Finding::new(
                MERGED_SOURCE,
                FindingDetails::OrderingViolation {
                    count: decreases.len(),
                    first_at,
                },
            ));
        }

        let mut seen: HashSet<NaiveDate> = HashSet::with_capacity(dates.len());
        let mut duplicates: Vec<NaiveDate> = Vec::new();
        for d in dates {
            if !seen.insert(*d) {
                duplicates.push(*d);
            }
        }
        if !duplicates.is_empty() {
            let count = duplicates.len();
            duplicates.sort();
            duplicates.dedup();
            duplicates.truncate(SAMPLE_LIMIT);
            report.push(Finding::new(
                MERGED_SOURCE,
                FindingDetails::DuplicateDate {
                    count,
                    dates: duplicates,
                },
            ));
        }

        let (Some(&start), Some(&end)) = (dates.iter().min(), dates.iter().max()) else {
            return;
        };
        let missing: Vec<NaiveDate> = period_range(table.frequency, start, end)
            .into_iter()
            .filter(|p| !seen.contains(p))
            .collect();
        if !missing.is_empty() {
            report.push(Finding::new(
                MERGED_SOURCE,
                FindingDetails::MissingPeriod {
                    count: missing.len(),
                    sample: missing.into_iter().take(SAMPLE_LIMIT).collect(),
                },
            ));
        }
    }
}

/// One summary finding for all gaps in the populated dates of `expected`.
fn frequency_gaps(expected: &SeriesFrame, table: &MergedTable) -> Option<FindingDetails> {
    let threshold = table.frequency.nominal_days() as f64 * GAP_FACTOR;
    let populated: Vec<NaiveDate> = expected
        .observations
        .iter()
        .filter(|o| o.value.is_some())
        .map(|o| o.date)
        .collect();

    let gaps: Vec<(NaiveDate, NaiveDate, i64)> = populated
        .windows(2)
        .map(|w| (w[0], w[1], (w[1] - w[0]).num_days()))
        .filter(|(_, _, days)| *days as f64 > threshold)
        .collect();

    let &(after, before, largest) = gaps.iter().max_by_key(|(a, _, days)| (*days, std::cmp::Reverse(*a)))?;
    Some(FindingDetails::FrequencyGap {
        gaps: gaps.len(),
        largest_gap_days: largest,
        largest_gap_after: after,
        largest_gap_before: before,
        threshold_days: threshold,
    })
}
