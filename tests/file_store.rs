use std::fs;
use std::path::Path;

use chrono::{Months, NaiveDate};
use tempfile::TempDir;

use kmacro::app::integrity_sources_from_manifest;
use kmacro::app::pipeline::{self, RunOutput};
use kmacro::config::{PipelineConfig, load_manifest};
use kmacro::data::{DataProvider, FetchRequest, ProviderRegistry, StaticProvider};
use kmacro::domain::{ColumnNaming, Frequency, ProviderSchema, RawRecord};
use kmacro::integrity::{FindingDetails, FindingKind, IntegrityChecker, IntegrityReport, IntegritySource, Verdict};
use kmacro::io::{read_source_csv, read_table_csv, write_records_csv, write_report_json, write_table_csv};
use kmacro::merge::ColumnKind;

fn d(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

fn write(dir: &Path, name: &str, text: &str) {
    fs::write(dir.join(name), text).unwrap();
}

/// Three raw files in three layouts plus a manifest.
fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "rate.csv",
        "TIME,DATA_VALUE,UNIT_NAME\n\
         202001,0.5,%\n202002,0.75,%\n202003,1.0,%\n202004,1.25,%\n202005,1.5,%\n202006,1.75,%\n",
    );
    write(
        dir.path(),
        "unemployment.csv",
        "PRD_DE,DT\n202003,3.8\n202004,4.1\n202005,-\n202006,4.0\n202007,3.9\n202008,3.7\n",
    );
    write(dir.path(), "gdp.csv", "TIME,DATA_VALUE\n2020Q1,50\n2020Q2,55\n");
    write(
        dir.path(),
        "sources.json",
        r#"{"sources": [
            {"name": "rate", "path": "rate.csv", "schema": "ecos", "source": "bok"},
            {"name": "unemployment", "path": "unemployment.csv", "source": "kosis"},
            {"name": "gdp", "path": "gdp.csv", "schema": "ecos", "aggregation": "last"}
        ]}"#,
    );
    dir
}

fn run_fixture(dir: &TempDir) -> RunOutput {
    let manifest = load_manifest(&dir.path().join("sources.json")).unwrap();
    let sources = pipeline::load_sources(&manifest, &ProviderRegistry::empty(), None).unwrap();
    pipeline::run(&sources, &PipelineConfig::default()).unwrap()
}

fn check_file(dir: &TempDir, table_path: &Path) -> IntegrityReport {
    let manifest = load_manifest(&dir.path().join("sources.json")).unwrap();
    let table = read_table_csv(table_path, None).unwrap();
    let span = table.dates.first().copied().zip(table.dates.last().copied());
    let sources: Vec<IntegritySource> = integrity_sources_from_manifest(&manifest, ColumnNaming::SeriesName)
        .into_iter()
        .map(|s| s.with_range(span))
        .collect();
    IntegrityChecker::default().check(&table, &sources)
}

#[test]
fn pipeline_over_files_passes_its_own_integrity_check() {
    let dir = fixture();
    let out = run_fixture(&dir);

    assert_eq!(out.table.dates, (1..=8).map(|m| d(2020, m)).collect::<Vec<_>>());
    assert_eq!(
        out.table.column("gdp_value").unwrap().values,
        vec![Some(50.0), Some(50.0), Some(50.0), Some(55.0), Some(55.0), Some(55.0), None, None]
    );

    let report = out.integrity.unwrap();
    assert_eq!(report.critical_count(), 0);
    assert_eq!(report.verdict(), Verdict::PassedWithWarnings);

    // The only warning is the hole the unemployment source itself has in May.
    let gaps: Vec<_> = report.findings_of(FindingKind::FrequencyGap).collect();
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].source_name, "unemployment");
    assert_eq!(report.findings.len(), 1);

    let compared: Vec<(String, usize, usize)> = report
        .validations
        .iter()
        .map(|v| (v.source_name.clone(), v.compared, v.matched))
        .collect();
    assert_eq!(
        compared,
        vec![
            ("rate".to_string(), 6, 6),
            ("unemployment".to_string(), 5, 5),
            ("gdp".to_string(), 6, 6),
        ]
    );
}

#[test]
fn merged_csv_round_trips_through_the_store() {
    let dir = fixture();
    let out = run_fixture(&dir);
    let path = dir.path().join("merged.csv");
    write_table_csv(&path, &out.table).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let header = text.lines().next().unwrap();
    assert!(header.starts_with("date,rate_value,unemployment_value,gdp_value,year,month,quarter"));
    assert!(text.contains("\n2020-05-01,1.5,,55,2020,5,2,"));

    let back = read_table_csv(&path, None).unwrap();
    assert_eq!(back.frequency, Frequency::Monthly);
    assert_eq!(back.dates, out.table.dates);
    assert_eq!(back.column_names(), out.table.column_names());
    assert_eq!(back.column("year").unwrap().kind, ColumnKind::Calendar);
    assert_eq!(back.column("rate_value_yoy").unwrap().kind, ColumnKind::YoY);
    assert_eq!(
        back.column("unemployment_value").unwrap().values,
        out.table.column("unemployment_value").unwrap().values
    );

    let report = check_file(&dir, &path);
    assert!(report.verdict().passed());
    assert_eq!(report.count_of(FindingKind::DateShift), 0);
}

#[test]
fn tampered_merged_file_is_caught() {
    let dir = fixture();
    let mut table = run_fixture(&dir).table;
    let rate = table.columns.iter_mut().find(|c| c.name == "rate_value").unwrap();
    rate.values.rotate_right(1);

    let path = dir.path().join("tampered.csv");
    write_table_csv(&path, &table).unwrap();
    let report = check_file(&dir, &path);

    assert_eq!(report.verdict(), Verdict::Failed);
    let first = report.findings_of(FindingKind::DateShift).next().unwrap();
    assert_eq!(first.source_name, "rate");
    assert_eq!(
        first.details,
        FindingDetails::DateShift {
            expected_date: d(2020, 1),
            found_date: d(2020, 2),
            days_shifted: 31,
            value: 0.5,
        }
    );
}

#[test]
fn merged_file_with_its_dates_moved_forward_is_caught() {
    let dir = fixture();
    let mut table = run_fixture(&dir).table;
    table.dates = table
        .dates
        .iter()
        .map(|d| d.checked_add_months(Months::new(1)).unwrap())
        .collect();

    let path = dir.path().join("moved.csv");
    write_table_csv(&path, &table).unwrap();
    let report = check_file(&dir, &path);

    assert_eq!(report.verdict(), Verdict::Failed);
    let rate = report.validations.iter().find(|v| v.source_name == "rate").unwrap();
    assert!(rate.date_shifts > 0);

    let first = report
        .findings_of(FindingKind::DateShift)
        .find(|f| f.source_name == "rate")
        .unwrap();
    assert_eq!(
        first.details,
        FindingDetails::DateShift {
            expected_date: d(2020, 3),
            found_date: d(2020, 4),
            days_shifted: 31,
            value: 1.0,
        }
    );
}

#[test]
fn rows_lost_while_reading_a_source_are_counted() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "cpi.csv",
        "TIME,DATA_VALUE\n202001,100\nbogus,101\n202002,abc\n202003,102\n",
    );
    write(
        dir.path(),
        "sources.json",
        r#"{"sources": [{"name": "cpi", "path": "cpi.csv", "schema": "ecos", "source": "bok"}]}"#,
    );
    let out = run_fixture(&dir);

    let report = out.integrity.unwrap();
    assert!(report.verdict().passed());
    let cpi = &report.validations[0];
    assert_eq!((cpi.compared, cpi.matched), (2, 2));
    assert_eq!(cpi.dropped_dates, 1);
    assert_eq!(cpi.values_nulled, 1);

    let json = serde_json::to_value(&report.validations).unwrap();
    assert_eq!(json[0]["dropped_dates"], 1);
    assert_eq!(json[0]["values_nulled"], 1);
}

#[test]
fn unreadable_source_is_a_warning_and_report_serializes() {
    let dir = fixture();
    let out = run_fixture(&dir);

    let ghost = IntegritySource::new("ghost", dir.path().join("missing.csv"));
    let report = IntegrityChecker::default().check(&out.table, &[ghost]);

    assert_eq!(report.verdict(), Verdict::PassedWithWarnings);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].kind, FindingKind::SourceUnavailable);

    let json_path = dir.path().join("report.json");
    write_report_json(&json_path, &report).unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["verdict"], "passed_with_warnings");
    assert_eq!(json["critical"], 0);
    assert_eq!(json["warnings"], 1);
    assert_eq!(json["findings"][0]["kind"], "SourceUnavailable");
    assert_eq!(json["findings"][0]["severity"], "warning");
}

#[test]
fn fetched_records_are_stored_in_the_provider_layout() {
    let provider = StaticProvider::new("fred", ProviderSchema::Fred).with_series(
        "CPIAUCSL",
        vec![
            RawRecord::new("2020-01-01", "258.7").with_tag("realtime_start", "2024-01-01"),
            RawRecord::new("2020-02-01", "."),
        ],
    );
    let records = provider.fetch(&FetchRequest::new("CPIAUCSL")).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cpi.csv");
    write_records_csv(&path, &provider.schema(), &records).unwrap();

    let file = read_source_csv(&path, None).unwrap();
    assert_eq!(file.schema, ProviderSchema::Fred);
    assert_eq!(file.records.len(), 2);
    assert_eq!(file.records[1].raw_value.display(), ".");
    assert_eq!(
        file.records[0].provider_tags.get("realtime_start").map(String::as_str),
        Some("2024-01-01")
    );
}
