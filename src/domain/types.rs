//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - produced by data providers and the CSV ingest layer
//! - passed between the normalize / resample / merge stages
//! - exported to JSON alongside integrity reports

use std::collections::BTreeMap;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Target frequency of a canonical date axis.
///
/// Every period is identified by its first calendar day (month-start for
/// monthly, quarter-start for quarterly, and so on). Weeks start on Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 5] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Quarterly,
        Frequency::Yearly,
    ];

    /// Number of periods in one calendar year (the YoY lag).
    pub fn periods_per_year(self) -> usize {
        match self {
            Frequency::Daily => 365,
            Frequency::Weekly => 52,
            Frequency::Monthly => 12,
            Frequency::Quarterly => 4,
            Frequency::Yearly => 1,
        }
    }

    /// Approximate period length in days, used for gap detection.
    pub fn nominal_days(self) -> i64 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
            Frequency::Monthly => 30,
            Frequency::Quarterly => 91,
            Frequency::Yearly => 365,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Observation cadence a series was recorded at by its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NativeFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
    Unknown,
}

impl NativeFrequency {
    /// Map onto the grid frequency with the same period length.
    pub fn as_frequency(self) -> Option<Frequency> {
        match self {
            NativeFrequency::Daily => Some(Frequency::Daily),
            NativeFrequency::Weekly => Some(Frequency::Weekly),
            NativeFrequency::Monthly => Some(Frequency::Monthly),
            NativeFrequency::Quarterly => Some(Frequency::Quarterly),
            NativeFrequency::Annual => Some(Frequency::Yearly),
            NativeFrequency::Unknown => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NativeFrequency::Daily => "daily",
            NativeFrequency::Weekly => "weekly",
            NativeFrequency::Monthly => "monthly",
            NativeFrequency::Quarterly => "quarterly",
            NativeFrequency::Annual => "annual",
            NativeFrequency::Unknown => "unknown",
        }
    }
}

impl From<Frequency> for NativeFrequency {
    fn from(value: Frequency) -> Self {
        match value {
            Frequency::Daily => NativeFrequency::Daily,
            Frequency::Weekly => NativeFrequency::Weekly,
            Frequency::Monthly => NativeFrequency::Monthly,
            Frequency::Quarterly => NativeFrequency::Quarterly,
            Frequency::Yearly => NativeFrequency::Annual,
        }
    }
}

/// How finer-grained observations are collapsed into one target period.
///
/// `Mean` suits rates, `Last` suits stock levels, `Sum` suits flows/volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Mean,
    Sum,
    First,
    Last,
}

/// Join discipline for the canonical date axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Union of all series ranges.
    #[default]
    Outer,
    /// Intersection of all series ranges.
    Inner,
    /// Range of the first series.
    Left,
    /// Range of the last series.
    Right,
}

/// Output column naming policy for merged value columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnNaming {
    /// `{series}_value`
    #[default]
    SeriesName,
    /// `{source}_{series}_value`
    SourceQualified,
}

/// Known column-name sets of the statistical sources.
///
/// Adding a provider is a data addition here rather than a new branch in the
/// date parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSchema {
    /// Bank of Korea ECOS: `TIME` / `DATA_VALUE`.
    Ecos,
    /// Statistics Korea KOSIS: `PRD_DE` / `DT`.
    Kosis,
    /// FRED and other already-normalized exports: `date` / `value`.
    Fred,
    /// Anything else.
    Custom { date: String, value: String },
}

impl ProviderSchema {
    pub fn date_column(&self) -> &str {
        match self {
            ProviderSchema::Ecos => "TIME",
            ProviderSchema::Kosis => "PRD_DE",
            ProviderSchema::Fred => "date",
            ProviderSchema::Custom { date, .. } => date,
        }
    }

    pub fn value_column(&self) -> &str {
        match self {
            ProviderSchema::Ecos => "DATA_VALUE",
            ProviderSchema::Kosis => "DT",
            ProviderSchema::Fred => "value",
            ProviderSchema::Custom { value, .. } => value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ProviderSchema::Ecos => "ecos",
            ProviderSchema::Kosis => "kosis",
            ProviderSchema::Fred => "fred",
            ProviderSchema::Custom { .. } => "custom",
        }
    }

    /// Pick a known schema from a header row (case-insensitive).
    ///
    /// Checked in order ECOS, FRED, KOSIS; the first whose date *and* value
    /// columns are both present wins.
    pub fn detect<S: AsRef<str>>(headers: &[S]) -> Option<ProviderSchema> {
        let has = |name: &str| headers.iter().any(|h| h.as_ref().trim().eq_ignore_ascii_case(name));
        [ProviderSchema::Ecos, ProviderSchema::Fred, ProviderSchema::Kosis]
            .into_iter()
            .find(|schema| has(schema.date_column()) && has(schema.value_column()))
    }
}

/// A raw date or value token as handed over by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawToken {
    Integer(i64),
    Float(f64),
    Text(String),
    Missing,
}

impl RawToken {
    /// Text form used in diagnostics.
    pub fn display(&self) -> String {
        match self {
            RawToken::Integer(v) => v.to_string(),
            RawToken::Float(v) => v.to_string(),
            RawToken::Text(s) => s.clone(),
            RawToken::Missing => String::new(),
        }
    }
}

impl From<&str> for RawToken {
    fn from(value: &str) -> Self {
        RawToken::Text(value.to_string())
    }
}

impl From<String> for RawToken {
    fn from(value: String) -> Self {
        RawToken::Text(value)
    }
}

impl From<i64> for RawToken {
    fn from(value: i64) -> Self {
        RawToken::Integer(value)
    }
}

impl From<f64> for RawToken {
    fn from(value: f64) -> Self {
        RawToken::Float(value)
    }
}

impl<T: Into<RawToken>> From<Option<T>> for RawToken {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawToken::Missing)
    }
}

/// One source-provided observation, before any parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub raw_date: RawToken,
    pub raw_value: RawToken,
    /// Extra provider columns (unit, item name, ...), kept for provenance.
    #[serde(default)]
    pub provider_tags: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new(raw_date: impl Into<RawToken>, raw_value: impl Into<RawToken>) -> Self {
        Self {
            raw_date: raw_date.into(),
            raw_value: raw_value.into(),
            provider_tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.provider_tags.insert(key.into(), value.into());
        self
    }
}

/// A parsed observation on the calendar axis.
///
/// `value` is `None` when the source value was unparseable; the observation is
/// kept so that date alignment survives into the integrity checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedObservation {
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub native_frequency: NativeFrequency,
}

impl NormalizedObservation {
    pub fn new(date: NaiveDate, value: Option<f64>, native_frequency: NativeFrequency) -> Self {
        Self {
            date,
            value,
            native_frequency,
        }
    }
}

/// Ordered observations of one named indicator.
///
/// Observations are always sorted ascending by date. After resampling
/// (`frequency` is `Some`) there is at most one observation per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesFrame {
    pub name: String,
    /// Source identifier (e.g. `bok`, `fred`), used to disambiguate columns.
    pub source: String,
    pub native_frequency: NativeFrequency,
    /// Grid frequency once resampled.
    pub frequency: Option<Frequency>,
    pub observations: Vec<NormalizedObservation>,
}

impl SeriesFrame {
    /// Build a frame, sorting observations and deriving the native frequency
    /// as the most common per-observation frequency.
    pub fn from_observations(
        name: impl Into<String>,
        source: impl Into<String>,
        mut observations: Vec<NormalizedObservation>,
    ) -> Self {
        observations.sort_by_key(|o| o.date);
        let native_frequency = dominant_frequency(&observations);
        Self {
            name: name.into(),
            source: source.into(),
            native_frequency,
            frequency: None,
            observations,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Number of observations carrying a value.
    pub fn valid_count(&self) -> usize {
        self.observations.iter().filter(|o| o.value.is_some()).count()
    }
}

fn dominant_frequency(observations: &[NormalizedObservation]) -> NativeFrequency {
    let mut counts: Vec<(NativeFrequency, usize)> = Vec::new();
    for obs in observations {
        match counts.iter_mut().find(|(f, _)| *f == obs.native_frequency) {
            Some((_, n)) => *n += 1,
            None => counts.push((obs.native_frequency, 1)),
        }
    }
    // First-seen wins on ties so the result does not depend on hash order.
    let mut best: Option<(NativeFrequency, usize)> = None;
    for (freq, n) in counts {
        if best.is_none_or(|(_, m)| n > m) {
            best = Some((freq, n));
        }
    }
    best.map(|(f, _)| f).unwrap_or(NativeFrequency::Unknown)
}

/// Numeric tolerance used when comparing expected and merged values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "amount")]
pub enum Tolerance {
    /// `|a - b| <= amount`
    Absolute(f64),
    /// `|a - b| <= amount * max(|a|, |b|)`
    Relative(f64),
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::Absolute(0.01)
    }
}

impl Tolerance {
    pub fn matches(self, a: f64, b: f64) -> bool {
        let diff = (a - b).abs();
        match self {
            Tolerance::Absolute(amount) => diff <= amount,
            Tolerance::Relative(fraction) => diff <= fraction * a.abs().max(b.abs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_schema_prefers_ecos_then_fred_then_kosis() {
        assert_eq!(ProviderSchema::detect(&["TIME", "DATA_VALUE", "UNIT_NAME"]), Some(ProviderSchema::Ecos));
        assert_eq!(ProviderSchema::detect(&["realtime_start", "date", "value"]), Some(ProviderSchema::Fred));
        assert_eq!(ProviderSchema::detect(&["PRD_DE", "DT", "C1_NM"]), Some(ProviderSchema::Kosis));
        assert_eq!(ProviderSchema::detect(&["TIME", "value"]), None);
    }

    #[test]
    fn tolerance_absolute_and_relative() {
        assert!(Tolerance::Absolute(0.01).matches(100.0, 100.009));
        assert!(!Tolerance::Absolute(0.01).matches(100.0, 100.02));
        assert!(Tolerance::Relative(0.0001).matches(1_000_000.0, 1_000_050.0));
        assert!(!Tolerance::Relative(0.0001).matches(1.0, 1.01));
        assert!(Tolerance::Relative(0.0001).matches(0.0, 0.0));
    }

    #[test]
    fn frame_sorts_and_takes_dominant_frequency() {
        let d = |m| NaiveDate::from_ymd_opt(2020, m, 1).unwrap();
        let frame = SeriesFrame::from_observations(
            "cpi",
            "bok",
            vec![
                NormalizedObservation::new(d(3), Some(3.0), NativeFrequency::Monthly),
                NormalizedObservation::new(d(1), Some(1.0), NativeFrequency::Monthly),
                NormalizedObservation::new(d(2), None, NativeFrequency::Unknown),
            ],
        );
        assert_eq!(frame.dates(), vec![d(1), d(2), d(3)]);
        assert_eq!(frame.native_frequency, NativeFrequency::Monthly);
        assert_eq!(frame.valid_count(), 2);
    }
}
