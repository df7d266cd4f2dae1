//! Terminal formatting for run summaries and integrity reports.
//!
//! Everything here returns a `String`; printing is the caller's business.

use chrono::NaiveDate;

use crate::app::pipeline::{RunOutput, SourceDiagnostics};
use crate::config::PipelineConfig;
use crate::domain::Tolerance;
use crate::integrity::{FindingDetails, IntegrityReport, Severity};
use crate::report::{ColumnCoverage, column_coverage};

/// Findings listed per kind before the rest is summarised.
const MAX_LISTED: usize = 10;

/// Format the full run summary (config + per-source diagnostics + coverage).
pub fn format_run_summary(run: &RunOutput, config: &PipelineConfig) -> String {
    let mut out = String::new();

    out.push_str("=== kmacro - merged series ===\n");
    out.push_str(&format!(
        "Frequency: {} | mode: {:?} | naming: {:?}\n",
        config.frequency, config.mode, config.naming
    ));
    if let Some((start, end)) = config.range {
        out.push_str(&format!("Range: {start} .. {end}\n"));
    }
    out.push_str(&format!(
        "Rows: {} | {}\n",
        run.table.len(),
        fmt_span(run.table.dates.first().copied(), run.table.dates.last().copied())
    ));
    out.push_str(&format!("Columns: {}\n", run.table.columns.len()));
    if config.run_integrity {
        out.push_str(&format!("Integrity tolerance: {}\n", fmt_tolerance(config.tolerance)));
    }

    out.push_str("\nSources:\n");
    out.push_str(&format_diagnostics(&run.diagnostics));

    out.push_str("\nCoverage:\n");
    out.push_str(&format_coverage(&column_coverage(&run.table)));

    out
}

/// Per-source table: rows in, rows dropped, values nulled, observations out.
pub fn format_diagnostics(rows: &[SourceDiagnostics]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<24} {:<10} {:<10} {:>7} {:>7} {:>7} {:>7}\n",
            "column", "source", "native", "rows", "dropped", "nulled", "obs"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<24} {:-<10} {:-<10} {:-<7} {:-<7} {:-<7} {:-<7}\n",
            "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for d in rows {
        out.push_str(&format!(
            "{:<24} {:<10} {:<10} {:>7} {:>7} {:>7} {:>7}\n",
            truncate(&d.column, 24),
            truncate(&d.source, 10),
            d.native_frequency.label(),
            d.rows_read,
            d.dropped_dates,
            d.values_nulled,
            d.valid_observations,
        ));
        if !d.dropped_samples.is_empty() {
            out.push_str(&format!("  unparseable dates: {}\n", d.dropped_samples.join(", ")));
        }
        if d.row_errors > 0 {
            out.push_str(&format!("  malformed CSV rows: {}\n", d.row_errors));
        }
    }

    out
}

pub fn format_coverage(rows: &[ColumnCoverage]) -> String {
    let mut out = String::new();
    for c in rows {
        out.push_str(&format!(
            "{:<24} {:>6} values | {}\n",
            truncate(&c.name, 24),
            c.valid,
            fmt_span(c.first, c.last)
        ));
    }
    out
}

/// Format an integrity report: verdict line, per-source tallies, findings.
pub fn format_integrity_report(report: &IntegrityReport) -> String {
    let mut out = String::new();

    out.push_str("=== Integrity check ===\n");
    out.push_str(&format!(
        "Verdict: {} | critical={} warnings={} | {} rows at {}\n",
        report.verdict().label(),
        report.critical_count(),
        report.warning_count(),
        report.rows,
        report.frequency
    ));

    if !report.validations.is_empty() {
        out.push('\n');
        out.push_str(
            format!(
                "{:<20} {:<24} {:>8} {:>8} {:>7} {:>9} {:>8} {:>8} {:>7}\n",
                "source", "column", "compared", "matched", "shifts", "mismatch", "missing", "undated", "nulled"
            )
            .trim_end(),
        );
        out.push('\n');
        for v in &report.validations {
            out.push_str(&format!(
                "{:<20} {:<24} {:>8} {:>8} {:>7} {:>9} {:>8} {:>8} {:>7}\n",
                truncate(&v.source_name, 20),
                truncate(&v.column, 24),
                v.compared,
                v.matched,
                v.date_shifts,
                v.value_mismatches,
                v.missing,
                v.dropped_dates,
                v.values_nulled,
            ));
        }
    }

    if report.findings.is_empty() {
        return out;
    }

    out.push_str("\nFindings:\n");
    let mut listed = 0usize;
    for f in &report.findings {
        if listed == MAX_LISTED {
            out.push_str(&format!("  ... and {} more\n", report.findings.len() - MAX_LISTED));
            break;
        }
        let tag = match f.severity {
            Severity::Critical => "CRIT",
            Severity::Warning => "WARN",
        };
        out.push_str(&format!(
            "  [{tag}] {:<18} {:<16} {}\n",
            format!("{:?}", f.kind),
            truncate(&f.source_name, 16),
            describe(&f.details)
        ));
        listed += 1;
    }

    out
}

fn describe(details: &FindingDetails) -> String {
    match details {
        FindingDetails::DateShift {
            expected_date,
            found_date,
            days_shifted,
            value,
        } => format!("{value} expected at {expected_date}, found at {found_date} ({days_shifted:+} days)"),
        FindingDetails::ValueMismatch {
            date,
            expected,
            actual,
            difference,
        } => format!("{date}: expected {expected}, merged {actual} (diff {difference:.4})"),
        FindingDetails::FrequencyGap {
            gaps,
            largest_gap_days,
            largest_gap_after,
            largest_gap_before,
            threshold_days,
        } => format!(
            "{gaps} gap(s) over {threshold_days:.1} days; largest {largest_gap_days} days ({largest_gap_after} -> {largest_gap_before})"
        ),
        FindingDetails::OrderingViolation { count, first_at } => {
            format!("{count} out-of-order date(s), first at {first_at}")
        }
        FindingDetails::DuplicateDate { count, dates } => format!("{count} duplicate(s): {}", fmt_dates(dates)),
        FindingDetails::MissingPeriod { count, sample } => {
            format!("{count} missing period(s): {}", fmt_dates(sample))
        }
        FindingDetails::SourceUnavailable { path, reason } => format!("{}: {reason}", path.display()),
        FindingDetails::MissingColumn { column } => format!("column '{column}' not in merged table"),
    }
}

fn fmt_tolerance(tolerance: Tolerance) -> String {
    match tolerance {
        Tolerance::Absolute(a) => format!("abs {a}"),
        Tolerance::Relative(r) => format!("rel {r}"),
    }
}

fn fmt_span(first: Option<NaiveDate>, last: Option<NaiveDate>) -> String {
    match (first, last) {
        (Some(a), Some(b)) => format!("{a} .. {b}"),
        _ => "empty".to_string(),
    }
}

fn fmt_dates(dates: &[NaiveDate]) -> String {
    let parts: Vec<String> = dates.iter().map(|d| d.to_string()).collect();
    parts.join(", ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
