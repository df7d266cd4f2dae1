//! Date Normalizer.
//!
//! Turns provider `RawRecord`s into `NormalizedObservation`s:
//!
//! - dates go through the ordered rules in `date`
//! - values go through `value`; unparseable values become `None` (the row is kept)
//! - rows whose date cannot be parsed are dropped, and every drop is recorded
//!   in the returned `NormalizeOutcome`

use crate::domain::{NativeFrequency, NormalizedObservation, RawRecord, SeriesFrame};

pub mod date;
pub mod value;

pub use date::{DateParseError, ParsedDate, parse_date_str, parse_date_token};
pub use value::{ValueParseError, parse_value_str, parse_value_token};

/// Everything the normalizer produced for one series, including what it had
/// to discard.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub observations: Vec<NormalizedObservation>,
    /// Records dropped because their date did not parse.
    pub dropped: Vec<DateParseError>,
    /// Records kept with a null value because their value did not parse.
    pub value_errors: Vec<ValueParseError>,
    pub records_read: usize,
}

impl NormalizeOutcome {
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    pub fn nulled_count(&self) -> usize {
        self.value_errors.len()
    }

    pub fn into_frame(self, name: impl Into<String>, source: impl Into<String>) -> SeriesFrame {
        SeriesFrame::from_observations(name, source, self.observations)
    }
}

/// Stateless normalizer, optionally carrying the source's cadence hint.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateNormalizer {
    hint: Option<NativeFrequency>,
}

impl DateNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hint(mut self, hint: Option<NativeFrequency>) -> Self {
        self.hint = hint;
        self
    }

    /// Normalize one record.
    ///
    /// Returns the observation plus the value error, if the value was nulled.
    pub fn normalize_record(
        &self,
        record: &RawRecord,
    ) -> Result<(NormalizedObservation, Option<ValueParseError>), DateParseError> {
        let parsed = parse_date_token(&record.raw_date, self.hint)?;
        let (value, value_error) = match parse_value_token(&record.raw_value) {
            Ok(v) => (v, None),
            Err(e) => (None, Some(e)),
        };
        Ok((
            NormalizedObservation::new(parsed.date, value, parsed.native_frequency),
            value_error,
        ))
    }

    pub fn normalize(&self, records: &[RawRecord]) -> NormalizeOutcome {
        let mut out = NormalizeOutcome {
            records_read: records.len(),
            ..NormalizeOutcome::default()
        };

        for record in records {
            match self.normalize_record(record) {
                Ok((obs, value_error)) => {
                    out.observations.push(obs);
                    out.value_errors.extend(value_error);
                }
                Err(e) => out.dropped.push(e),
            }
        }

        if !out.dropped.is_empty() {
            log::debug!(
                "normalizer dropped {} of {} records with unparseable dates",
                out.dropped.len(),
                out.records_read
            );
        }
        out
    }
}
