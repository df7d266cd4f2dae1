//! Integrity Checker.
//!
//! Re-derives every source independently from its raw file and compares the
//! result against the merged table, then checks table-wide invariants. The
//! outcome is a structured `IntegrityReport`; nothing here fails fast.
//!
//! Finding kinds and default severities:
//!
//! | kind | severity |
//! | - | - |
//! | `DateShift` | critical |
//! | `ValueMismatch` | warning |
//! | `FrequencyGap` | warning |
//! | `OrderingViolation` | critical |
//! | `DuplicateDate` | critical |
//! | `MissingPeriod` | critical |
//! | `SourceUnavailable` | warning |
//! | `MissingColumn` | warning |

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{Aggregation, Frequency, NativeFrequency, ProviderSchema};

pub mod checker;

pub use checker::IntegrityChecker;

/// Source name used for table-wide findings.
pub const MERGED_SOURCE: &str = "merged";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FindingKind {
    DateShift,
    ValueMismatch,
    FrequencyGap,
    OrderingViolation,
    DuplicateDate,
    MissingPeriod,
    SourceUnavailable,
    MissingColumn,
}

impl FindingKind {
    pub fn severity(self) -> Severity {
        match self {
            FindingKind::DateShift
            | FindingKind::OrderingViolation
            | FindingKind::DuplicateDate
            | FindingKind::MissingPeriod => Severity::Critical,
            FindingKind::ValueMismatch
            | FindingKind::FrequencyGap
            | FindingKind::SourceUnavailable
            | FindingKind::MissingColumn => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

/// Kind-specific payload of a finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingDetails {
    DateShift {
        expected_date: NaiveDate,
        found_date: NaiveDate,
        days_shifted: i64,
        value: f64,
    },
    ValueMismatch {
        date: NaiveDate,
        expected: f64,
        actual: f64,
        difference: f64,
    },
    FrequencyGap {
        gaps: usize,
        largest_gap_days: i64,
        largest_gap_after: NaiveDate,
        largest_gap_before: NaiveDate,
        threshold_days: f64,
    },
    OrderingViolation {
        count: usize,
        first_at: NaiveDate,
    },
    DuplicateDate {
        count: usize,
        dates: Vec<NaiveDate>,
    },
    MissingPeriod {
        count: usize,
        sample: Vec<NaiveDate>,
    },
    SourceUnavailable {
        path: PathBuf,
        reason: String,
    },
    MissingColumn {
        column: String,
    },
}

impl FindingDetails {
    pub fn kind(&self) -> FindingKind {
        match self {
            FindingDetails::DateShift { .. } => FindingKind::DateShift,
            FindingDetails::ValueMismatch { .. } => FindingKind::ValueMismatch,
            FindingDetails::FrequencyGap { .. } => FindingKind::FrequencyGap,
            FindingDetails::OrderingViolation { .. } => FindingKind::OrderingViolation,
            FindingDetails::DuplicateDate { .. } => FindingKind::DuplicateDate,
            FindingDetails::MissingPeriod { .. } => FindingKind::MissingPeriod,
            FindingDetails::SourceUnavailable { .. } => FindingKind::SourceUnavailable,
            FindingDetails::MissingColumn { .. } => FindingKind::MissingColumn,
        }
    }

    /// The `count` carried by aggregate findings, 1 otherwise.
    pub fn count(&self) -> usize {
        match self {
            FindingDetails::FrequencyGap { gaps, .. } => *gaps,
            FindingDetails::OrderingViolation { count, .. }
            | FindingDetails::DuplicateDate { count, .. }
            | FindingDetails::MissingPeriod { count, .. } => *count,
            _ => 1,
        }
    }
}

/// One detected discrepancy. Immutable once pushed into a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub source_name: String,
    pub severity: Severity,
    pub details: FindingDetails,
}

impl Finding {
    pub fn new(source_name: impl Into<String>, details: FindingDetails) -> Self {
        let kind = details.kind();
        Self {
            kind,
            source_name: source_name.into(),
            severity: kind.severity(),
            details,
        }
    }
}

/// Per-source comparison tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceValidation {
    pub source_name: String,
    pub column: String,
    /// Expected (date, value) pairs compared.
    pub compared: usize,
    pub matched: usize,
    pub date_shifts: usize,
    pub value_mismatches: usize,
    /// Expected values with no merged counterpart anywhere.
    pub missing: usize,
    /// Source rows whose date token could not be parsed.
    pub dropped_dates: usize,
    /// Source rows whose value token was unparseable and became null.
    pub values_nulled: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Clean,
    PassedWithWarnings,
    Failed,
}

impl Verdict {
    pub fn passed(self) -> bool {
        !matches!(self, Verdict::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::Clean => "PASS",
            Verdict::PassedWithWarnings => "PASS (with warnings)",
            Verdict::Failed => "FAIL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub frequency: Frequency,
    pub rows: usize,
    pub findings: Vec<Finding>,
    pub validations: Vec<SourceValidation>,
}

impl IntegrityReport {
    pub fn new(frequency: Frequency, rows: usize) -> Self {
        Self {
            frequency,
            rows,
            findings: Vec::new(),
            validations: Vec::new(),
        }
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn verdict(&self) -> Verdict {
        if self.critical_count() > 0 {
            Verdict::Failed
        } else if self.findings.is_empty() {
            Verdict::Clean
        } else {
            Verdict::PassedWithWarnings
        }
    }

    pub fn critical_count(&self) -> usize {
        self.findings.iter().filter(|f| f.severity == Severity::Critical).count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings.iter().filter(|f| f.severity == Severity::Warning).count()
    }

    pub fn findings_of(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }

    pub fn count_of(&self, kind: FindingKind) -> usize {
        self.findings_of(kind).count()
    }
}

/// One raw source file to re-derive and compare.
#[derive(Debug, Clone)]
pub struct IntegritySource {
    pub name: String,
    pub path: PathBuf,
    /// `None` detects the schema from the header row.
    pub schema: Option<ProviderSchema>,
    /// Merged column to compare against; `{name}_value` by default.
    pub column: Option<String>,
    pub hint: Option<NativeFrequency>,
    /// Must match the aggregation the pipeline used for this source.
    pub aggregation: Aggregation,
    /// Only expected dates inside `[start, end]` are compared.
    pub range: Option<(NaiveDate, NaiveDate)>,
}

impl IntegritySource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            schema: None,
            column: None,
            hint: None,
            aggregation: Aggregation::default(),
            range: None,
        }
    }

    pub fn with_schema(mut self, schema: Option<ProviderSchema>) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_hint(mut self, hint: Option<NativeFrequency>) -> Self {
        self.hint = hint;
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_range(mut self, range: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.range = range;
        self
    }

    pub fn column_name(&self) -> String {
        self.column.clone().unwrap_or_else(|| format!("{}_value", self.name))
    }
}
