//! Report and raw-record exports.
//!
//! - integrity reports as pretty JSON (verdict included, so a publish gate can
//!   read one field)
//! - fetched provider records as CSV in the provider's own column layout, so
//!   the integrity checker can later re-read them like any other source file

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{ProviderSchema, RawRecord};
use crate::error::IngestError;
use crate::integrity::{IntegrityReport, Verdict};

#[derive(Serialize)]
struct ReportDocument<'a> {
    verdict: Verdict,
    critical: usize,
    warnings: usize,
    #[serde(flatten)]
    report: &'a IntegrityReport,
}

pub fn report_json(report: &IntegrityReport) -> Result<String, serde_json::Error> {
    let doc = ReportDocument {
        verdict: report.verdict(),
        critical: report.critical_count(),
        warnings: report.warning_count(),
        report,
    };
    serde_json::to_string_pretty(&doc)
}

pub fn write_report_json(path: &Path, report: &IntegrityReport) -> Result<(), IngestError> {
    let write_err = |message: String| IngestError::Write {
        path: path.to_path_buf(),
        message,
    };
    let json = report_json(report).map_err(|e| write_err(e.to_string()))?;
    let mut file = File::create(path).map_err(|e| write_err(e.to_string()))?;
    writeln!(file, "{json}").map_err(|e| write_err(e.to_string()))
}

/// Write raw records with the schema's date/value headers, followed by every
/// provider tag seen (sorted).
pub fn write_records_csv(path: &Path, schema: &ProviderSchema, records: &[RawRecord]) -> Result<(), IngestError> {
    let write_err = |message: String| IngestError::Write {
        path: path.to_path_buf(),
        message,
    };
    let file = File::create(path).map_err(|e| write_err(e.to_string()))?;
    write_records(file, schema, records).map_err(write_err)
}

pub fn write_records<W: Write>(writer: W, schema: &ProviderSchema, records: &[RawRecord]) -> Result<(), String> {
    let tags: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.provider_tags.keys().map(String::as_str))
        .filter(|k| *k != schema.date_column() && *k != schema.value_column())
        .collect();

    let mut w = csv::Writer::from_writer(writer);
    let mut header = vec![schema.date_column(), schema.value_column()];
    header.extend(tags.iter().copied());
    w.write_record(&header).map_err(|e| e.to_string())?;

    for record in records {
        let mut row = vec![record.raw_date.display(), record.raw_value.display()];
        row.extend(
            tags.iter()
                .map(|t| record.provider_tags.get(*t).cloned().unwrap_or_default()),
        );
        w.write_record(&row).map_err(|e| e.to_string())?;
    }
    w.flush().map_err(|e| e.to_string())
}
